//! NCM 容器解析
//!
//! 文件结构（各段顺序紧邻）：
//!
//! ```text
//! | 魔数 8B "CTENFDAM" | 保留 2B |
//! | 密钥块长度 u32LE | 密钥块 (^0x64, AES-ECB core_key, 去填充, 去17B前缀) |
//! | 元数据长度 u32LE | 元数据块 (^0x63, 去22B前缀, Base64, AES-ECB meta_key, 去填充, 去6B前缀, JSON) |
//! | CRC 4B | 保留 5B |
//! | 封面长度 u32LE | 封面图片 |
//! | 音频负载（至文件末尾） |
//! ```
//!
//! 解析器对 `Read + Seek` 泛型：整文件模式从内存游标解析，
//! 流式模式直接从文件句柄解析，不加载音频负载。

pub mod metadata;

use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::crypto::{KeyBox, aes_ecb_decrypt, pkcs7_unpad};
use crate::error::{NcmError, NcmResult, key_error, truncated_error};

pub use metadata::DEFAULT_FORMAT;

/// 魔数 "CTENFDAM"
pub const NCM_MAGIC: [u8; 8] = [0x43, 0x54, 0x45, 0x4E, 0x46, 0x44, 0x41, 0x4D];

/// 密钥块异或掩码
pub const KEY_MASK: u8 = 0x64;

/// 元数据块异或掩码
pub const META_MASK: u8 = 0x63;

/// 密钥块解密后的固定前缀
pub const KEY_PREFIX: &[u8; 17] = b"neteasecloudmusic";

/// 元数据块的固定前缀（Base64 之前）
pub const META_PREFIX: &[u8; 22] = b"163 key(Don't modify):";

/// 元数据解密后 JSON 之前的固定前缀
pub const META_JSON_PREFIX: &[u8; 6] = b"music:";

/// 魔数之后的保留字节数
const RESERVED_AFTER_MAGIC: u64 = 2;

/// CRC(4B) + 保留(5B)
const CRC_AND_RESERVED: u64 = 4 + 5;

/// AES 核心密钥（用于解密密钥块）
const CORE_KEY: [u8; 16] = [
    0x68, 0x7A, 0x48, 0x52, 0x41, 0x6D, 0x73, 0x6F, 0x35, 0x6B, 0x49, 0x6E, 0x62, 0x61, 0x78, 0x57,
]; // "hzHRAmso5kInbaxW"

/// AES 元数据密钥
const META_KEY: [u8; 16] = [
    0x23, 0x31, 0x34, 0x6C, 0x6A, 0x6B, 0x5F, 0x21, 0x5C, 0x5D, 0x26, 0x30, 0x55, 0x3C, 0x27, 0x28,
]; // "#14ljk_!\]&0U<'("

/// 两把固定 AES 密钥，进程内不变
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct NcmKeySet {
    pub core_key: [u8; 16],
    pub meta_key: [u8; 16],
}

impl Default for NcmKeySet {
    fn default() -> Self {
        Self {
            core_key: CORE_KEY,
            meta_key: META_KEY,
        }
    }
}

impl std::fmt::Debug for NcmKeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NcmKeySet").finish_non_exhaustive()
    }
}

/// 单个文件解析出的布局信息
///
/// 解析完成后不可变，由发起解析的解码调用独占。
#[derive(Debug, Clone)]
pub struct ContainerLayout {
    /// 派生密钥（已去掉17字节前缀）
    pub key: Vec<u8>,
    /// 输出扩展名（不含点）
    pub format: String,
    /// 音频负载起始偏移
    pub payload_offset: u64,
    /// 音频负载长度
    pub payload_length: u64,
}

impl ContainerLayout {
    /// 为该文件构建 KeyBox
    pub fn key_box(&self) -> KeyBox {
        KeyBox::new(&self.key)
    }
}

/// 解析 NCM 头部，返回后读取位置停在音频负载起点
pub fn parse_container<R: Read + Seek>(
    reader: &mut R,
    keys: &NcmKeySet,
) -> NcmResult<ContainerLayout> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    // 1. 魔数
    let mut magic = [0u8; 8];
    if file_len < magic.len() as u64 {
        return Err(NcmError::InvalidFormat(format!(
            "文件长度({file_len})不足以容纳魔数"
        )));
    }
    reader.read_exact(&mut magic)?;
    if magic != NCM_MAGIC {
        return Err(NcmError::InvalidFormat(format!(
            "魔数不匹配: {magic:02X?}"
        )));
    }
    skip(reader, file_len, RESERVED_AFTER_MAGIC, "魔数后保留字节")?;

    // 2. 密钥块
    let key_block = read_block(reader, file_len, "密钥块")?;
    let key = decrypt_key_block(key_block, keys)?;

    // 3. 元数据块（长度为0表示没有元数据）
    let meta_block = read_block(reader, file_len, "元数据块")?;
    let format = if meta_block.is_empty() {
        DEFAULT_FORMAT.to_string()
    } else {
        metadata::decode_format(&meta_block, keys).unwrap_or_else(|e| {
            log::warn!("{e}，使用默认格式 {DEFAULT_FORMAT}");
            DEFAULT_FORMAT.to_string()
        })
    };

    // 4. CRC + 保留字节
    skip(reader, file_len, CRC_AND_RESERVED, "CRC")?;

    // 5. 封面（只跳过）
    let cover_len = read_length(reader, file_len, "封面")?;
    skip(reader, file_len, cover_len, "封面")?;

    // 6. 音频负载
    let payload_offset = reader.stream_position()?;

    Ok(ContainerLayout {
        key,
        format,
        payload_offset,
        payload_length: file_len - payload_offset,
    })
}

/// 解密密钥块：异或 → AES-ECB(core_key) → 去填充 → 去17字节前缀
fn decrypt_key_block(mut block: Vec<u8>, keys: &NcmKeySet) -> NcmResult<Vec<u8>> {
    for byte in &mut block {
        *byte ^= KEY_MASK;
    }

    let decrypted = aes_ecb_decrypt(&block, &keys.core_key)?;
    let plain = pkcs7_unpad(&decrypted);

    if plain.len() <= KEY_PREFIX.len() {
        return Err(key_error(
            "解密后的密钥长度不足，无法派生KeyBox",
            plain.len(),
        ));
    }
    if !plain.starts_with(KEY_PREFIX) {
        log::debug!("密钥块前缀不是 neteasecloudmusic，按固定长度丢弃");
    }

    Ok(plain[KEY_PREFIX.len()..].to_vec())
}

fn remaining<R: Seek>(reader: &mut R, file_len: u64) -> NcmResult<u64> {
    Ok(file_len.saturating_sub(reader.stream_position()?))
}

/// 读取 u32 小端长度字段，并校验不超过剩余文件大小
fn read_length<R: Read + Seek>(reader: &mut R, file_len: u64, what: &str) -> NcmResult<u64> {
    let len = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| truncated_error(&format!("读取{what}长度失败"), e))? as u64;

    let left = remaining(reader, file_len)?;
    if len > left {
        return Err(NcmError::Truncated(format!(
            "{what}声明长度({len})超过剩余文件大小({left})"
        )));
    }
    Ok(len)
}

/// 读取长度前缀的数据块
fn read_block<R: Read + Seek>(reader: &mut R, file_len: u64, what: &str) -> NcmResult<Vec<u8>> {
    let len = read_length(reader, file_len, what)?;
    let mut data = vec![0u8; len as usize];
    reader.read_exact(&mut data)?;
    Ok(data)
}

fn skip<R: Seek>(reader: &mut R, file_len: u64, count: u64, what: &str) -> NcmResult<()> {
    let left = remaining(reader, file_len)?;
    if count > left {
        return Err(NcmError::Truncated(format!(
            "跳过{what}({count}字节)超出文件末尾"
        )));
    }
    reader.seek(SeekFrom::Current(count as i64))?;
    Ok(())
}
