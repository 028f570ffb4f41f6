//! NCM Batch Decoder
//!
//! 网易云音乐 `.ncm` 容器的解密工具库。
//!
//! ## 核心特性
//! - 容器解析：魔数校验、AES-128-ECB 密钥块、Base64/JSON 元数据、封面跳过
//! - RC4 变体密钥盒：按绝对偏移生成密钥流，分块解密与整块解密逐字节一致
//! - 两种解码模式：整文件模式与有界内存的流式模式
//! - 有界可复用 worker 池（FIFO 等待、panic 隔离、显式释放）
//! - 目录批处理：原子认领、单调有序的进度流

pub mod container;
pub mod crypto;
pub mod decoder;
pub mod error;
pub mod pool;
pub mod tools;

// 重新导出核心类型
pub use container::{ContainerLayout, NcmKeySet, parse_container};
pub use crypto::KeyBox;
pub use decoder::{DecodeMode, DecodeOutcome, DecodeResult, DecodeTask, NcmDecoder, StreamingOptions};
pub use error::{ErrorCategory, NcmError, NcmErrorKind, NcmResult};
pub use pool::{PoolStats, WorkerPool, WorkerState};
pub use tools::{BatchDecoder, BatchProgress, BatchRun, BatchSummary, DecodeSettings, scan_files};
