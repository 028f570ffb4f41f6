//! 流式模式
//!
//! 头部直接从文件句柄解析，随后循环：读最多 `buffer_size` 字节到复用缓冲区 →
//! 按**绝对偏移**原地解密 → 追加写入 → 每 `flush_interval` 个缓冲区强制 flush。
//!
//! 输入句柄和输出 writer 都是作用域内的 RAII 值，任何返回路径都会关闭。
//! 已知限制：写入中途发生 I/O 错误时可能留下不完整的输出文件，错误照常返回。

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::output_path_for;
use crate::container::{NcmKeySet, parse_container};
use crate::error::NcmResult;
use crate::tools::constants::streaming as limits;

/// 流式解码参数
///
/// 字段私有，只能经 [`StreamingOptions::new`] 或反序列化构造，两条路径都会夹紧。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawStreamingOptions")]
pub struct StreamingOptions {
    buffer_size: usize,
    flush_interval: usize,
}

/// 反序列化时的未校验形态
#[derive(Deserialize)]
#[serde(default)]
struct RawStreamingOptions {
    buffer_size: usize,
    flush_interval: usize,
}

impl Default for RawStreamingOptions {
    fn default() -> Self {
        Self {
            buffer_size: limits::DEFAULT_BUFFER_SIZE,
            flush_interval: limits::DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl From<RawStreamingOptions> for StreamingOptions {
    fn from(raw: RawStreamingOptions) -> Self {
        Self::new(raw.buffer_size, raw.flush_interval)
    }
}

impl Default for StreamingOptions {
    fn default() -> Self {
        Self {
            buffer_size: limits::DEFAULT_BUFFER_SIZE,
            flush_interval: limits::DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl StreamingOptions {
    /// 创建参数，越界值夹紧到有效范围
    pub fn new(buffer_size: usize, flush_interval: usize) -> Self {
        let clamped = Self {
            buffer_size: buffer_size.clamp(limits::MIN_BUFFER_SIZE, limits::MAX_BUFFER_SIZE),
            flush_interval: flush_interval
                .clamp(limits::MIN_FLUSH_INTERVAL, limits::MAX_FLUSH_INTERVAL),
        };
        if clamped.buffer_size != buffer_size || clamped.flush_interval != flush_interval {
            log::debug!(
                "流式参数已夹紧: buffer_size {buffer_size} -> {}, flush_interval {flush_interval} -> {}",
                clamped.buffer_size,
                clamped.flush_interval
            );
        }
        clamped
    }

    /// 单次读取的缓冲区大小（字节）
    #[inline]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// 每多少个缓冲区强制 flush 一次
    #[inline]
    pub fn flush_interval(&self) -> usize {
        self.flush_interval
    }
}

pub(super) fn decode(
    keys: &NcmKeySet,
    input: &Path,
    output_dir: &Path,
    options: &StreamingOptions,
) -> NcmResult<PathBuf> {
    let mut reader = File::open(input)?;
    let layout = parse_container(&mut reader, keys)?;
    let key_box = layout.key_box();

    // 头部解析成功后才创建输出文件
    let output_path = output_path_for(input, output_dir, &layout.format);
    fs::create_dir_all(output_dir)?;
    let mut writer = BufWriter::with_capacity(options.buffer_size(), File::create(&output_path)?);

    let mut buffer = vec![0u8; options.buffer_size()];
    let mut offset: u64 = 0;
    let mut buffers_written: usize = 0;

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        let chunk = &mut buffer[..read];
        key_box.apply(chunk, offset);
        writer.write_all(chunk)?;

        offset += read as u64;
        buffers_written += 1;
        if buffers_written % options.flush_interval() == 0 {
            writer.flush()?;
        }
    }

    writer.flush()?;

    if offset != layout.payload_length {
        log::warn!(
            "{}: 实际读取负载 {offset} 字节，头部解析时为 {} 字节",
            input.display(),
            layout.payload_length
        );
    }

    Ok(output_path)
}
