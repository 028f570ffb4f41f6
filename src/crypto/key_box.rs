//! KeyBox 置换表与位置相关密钥流
//!
//! 密钥流字节只依赖 `(n + 1) mod 256`，因此任意连续子区间只要知道每个字节的
//! **绝对偏移**即可独立解密，无需任何运行时密码状态。流式模式分块解密依赖这一点。

/// 构建 256 字节置换表
///
/// `key` 必须非空（调用方负责校验）。每一步都是一次交换，
/// 结果始终是 0..=255 上的双射。
pub fn build_key_box(key: &[u8]) -> [u8; 256] {
    debug_assert!(!key.is_empty(), "KeyBox 派生密钥不能为空");

    let mut key_box = [0u8; 256];
    for (i, slot) in key_box.iter_mut().enumerate() {
        *slot = i as u8;
    }

    let mut last_byte: u8 = 0;
    let mut key_offset = 0;

    for i in 0..256 {
        let swap = key_box[i];
        let c = swap.wrapping_add(last_byte).wrapping_add(key[key_offset]);
        key_offset += 1;
        if key_offset >= key.len() {
            key_offset = 0;
        }
        key_box.swap(i, c as usize);
        last_byte = c;
    }

    key_box
}

/// 计算绝对偏移 `n` 处的密钥流字节
#[inline]
pub fn keystream_byte(key_box: &[u8; 256], n: u64) -> u8 {
    let j = ((n + 1) & 0xFF) as usize;
    let a = key_box[j] as usize;
    let b = key_box[(a + j) & 0xFF] as usize;
    key_box[(a + b) & 0xFF]
}

/// 单文件的 KeyBox 及预计算的密钥流周期表
///
/// 密钥流周期为256，构建时一次性展开，热循环只剩查表和异或。
#[derive(Clone)]
pub struct KeyBox {
    permutation: [u8; 256],
    stream: [u8; 256],
}

impl KeyBox {
    /// 从派生密钥构建
    pub fn new(key: &[u8]) -> Self {
        let permutation = build_key_box(key);
        let mut stream = [0u8; 256];
        for (n, byte) in stream.iter_mut().enumerate() {
            *byte = keystream_byte(&permutation, n as u64);
        }
        Self {
            permutation,
            stream,
        }
    }

    /// 底层置换表
    pub fn permutation(&self) -> &[u8; 256] {
        &self.permutation
    }

    /// 绝对偏移 `n` 处的密钥流字节
    #[inline]
    pub fn keystream_at(&self, n: u64) -> u8 {
        self.stream[(n & 0xFF) as usize]
    }

    /// 原地解密 `buf`，`offset` 为 `buf[0]` 在音频负载中的绝对偏移
    pub fn apply(&self, buf: &mut [u8], offset: u64) {
        let start = (offset & 0xFF) as usize;
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte ^= self.stream[(start + i) & 0xFF];
        }
    }
}

impl std::fmt::Debug for KeyBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 不输出密钥材料
        f.debug_struct("KeyBox").finish_non_exhaustive()
    }
}
