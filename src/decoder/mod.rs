//! 解码引擎
//!
//! 两种可互换的执行模式，对外契约一致：
//!
//! - **整文件模式**：一次读入、一次解密、一次写出。解析/解密失败时不会创建输出文件。
//! - **流式模式**：复用固定大小缓冲区分块解密，每 N 个缓冲区强制 flush，内存有界。
//!
//! [`NcmDecoder`] 是显式的服务对象，持有固定密钥，构建一次后按引用传给
//! worker 池和批处理协调器。

mod streaming;
mod whole_file;

use std::path::{Path, PathBuf};

use crate::container::NcmKeySet;
use crate::error::{ErrorCategory, NcmError, NcmErrorKind, NcmResult};
use crate::tools::utils;

pub use streaming::StreamingOptions;

/// 解码模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// 整文件读入内存后解密
    WholeFile,
    /// 有界内存的分块解密
    Streaming(StreamingOptions),
}

impl Default for DecodeMode {
    fn default() -> Self {
        DecodeMode::Streaming(StreamingOptions::default())
    }
}

/// 单个解码任务（由协调器创建，仅被一个 worker 消费）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeTask {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub mode: DecodeMode,
}

impl DecodeTask {
    pub fn new(input_path: PathBuf, output_dir: PathBuf, mode: DecodeMode) -> Self {
        Self {
            input_path,
            output_dir,
            mode,
        }
    }
}

/// 解码结果（带标签）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// 成功，携带输出文件路径
    Success { output_path: PathBuf },
    /// 失败，携带错误种类和原始错误信息
    Failure { kind: NcmErrorKind, message: String },
}

/// 单文件解码结果，产出后归协调器/调用方所有
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeResult {
    pub input_path: PathBuf,
    pub outcome: DecodeOutcome,
}

impl DecodeResult {
    pub fn success(input_path: PathBuf, output_path: PathBuf) -> Self {
        Self {
            input_path,
            outcome: DecodeOutcome::Success { output_path },
        }
    }

    pub fn failure(input_path: PathBuf, error: &NcmError) -> Self {
        Self {
            input_path,
            outcome: DecodeOutcome::Failure {
                kind: error.kind(),
                message: error.to_string(),
            },
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, DecodeOutcome::Success { .. })
    }

    /// 输出路径（失败时为 `None`）
    pub fn output_path(&self) -> Option<&Path> {
        match &self.outcome {
            DecodeOutcome::Success { output_path } => Some(output_path),
            DecodeOutcome::Failure { .. } => None,
        }
    }

    /// 错误信息（成功时为 `None`）
    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            DecodeOutcome::Success { .. } => None,
            DecodeOutcome::Failure { message, .. } => Some(message),
        }
    }

    pub fn error_kind(&self) -> Option<NcmErrorKind> {
        match &self.outcome {
            DecodeOutcome::Success { .. } => None,
            DecodeOutcome::Failure { kind, .. } => Some(*kind),
        }
    }

    /// 统计用的错误类别，由错误种类派生
    pub fn error_category(&self) -> Option<ErrorCategory> {
        self.error_kind().map(NcmErrorKind::category)
    }
}

/// NCM 解码服务
#[derive(Debug, Clone, Copy, Default)]
pub struct NcmDecoder {
    keys: NcmKeySet,
}

impl NcmDecoder {
    /// 使用标准密钥创建解码器
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用自定义密钥创建解码器
    pub fn with_keys(keys: NcmKeySet) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &NcmKeySet {
        &self.keys
    }

    /// 整文件模式解码
    pub fn decode(&self, input: impl AsRef<Path>, output_dir: impl AsRef<Path>) -> DecodeResult {
        self.decode_with_mode(input, output_dir, &DecodeMode::WholeFile)
    }

    /// 流式模式解码，越界参数会被夹紧到有效范围
    pub fn decode_streaming(
        &self,
        input: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        buffer_size: usize,
        flush_interval: usize,
    ) -> DecodeResult {
        let options = StreamingOptions::new(buffer_size, flush_interval);
        self.decode_with_mode(input, output_dir, &DecodeMode::Streaming(options))
    }

    /// 执行一个解码任务
    pub fn execute(&self, task: &DecodeTask) -> DecodeResult {
        self.decode_with_mode(&task.input_path, &task.output_dir, &task.mode)
    }

    /// 按指定模式解码，错误收敛到 `DecodeResult`
    pub fn decode_with_mode(
        &self,
        input: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        mode: &DecodeMode,
    ) -> DecodeResult {
        let input = input.as_ref();
        match self.try_decode(input, output_dir.as_ref(), mode) {
            Ok(output_path) => {
                log::debug!("{} -> {}", input.display(), output_path.display());
                DecodeResult::success(input.to_path_buf(), output_path)
            }
            Err(e) => {
                log::debug!("{} 解码失败: {e}", input.display());
                DecodeResult::failure(input.to_path_buf(), &e)
            }
        }
    }

    /// 按指定模式解码，返回输出路径或原始错误
    pub fn try_decode(&self, input: &Path, output_dir: &Path, mode: &DecodeMode) -> NcmResult<PathBuf> {
        if !input.is_file() {
            return Err(NcmError::FileNotFound(input.display().to_string()));
        }

        match mode {
            DecodeMode::WholeFile => whole_file::decode(&self.keys, input, output_dir),
            DecodeMode::Streaming(options) => {
                streaming::decode(&self.keys, input, output_dir, options)
            }
        }
    }
}

/// 计算输出路径：`<output_dir>/<去掉.ncm的文件名>.<format>`
pub fn output_path_for(input: &Path, output_dir: &Path, format: &str) -> PathBuf {
    let file_name = utils::extract_filename_lossy(input);
    let base_name = utils::strip_ncm_extension(&file_name);
    output_dir.join(format!("{base_name}.{format}"))
}
