//! 统一错误处理框架
//!
//! NCM 解密链路与 worker 池共用的错误类型定义。
//! 单文件错误（格式、密钥、I/O）只影响该文件的 `DecodeResult`；
//! 池生命周期错误（`PoolDisposed`）直接返回给调用方。

use std::fmt;
use std::io;

/// NCM 解密相关的统一错误类型
#[derive(Debug)]
pub enum NcmError {
    /// 输入文件不存在
    FileNotFound(String),

    /// 魔数不匹配，不是 NCM 容器
    InvalidFormat(String),

    /// 头部字段或声明长度超出文件实际大小
    Truncated(String),

    /// 文件I/O错误
    IoError(io::Error),

    /// 密钥块 AES 解密/去填充失败
    CorruptKeyData(String),

    /// 元数据解析失败（非致命，调用方会降级为默认格式）
    MetadataError(String),

    /// worker 池已释放
    PoolDisposed,

    /// 单个任务失败（携带原始错误信息）
    TaskFailure(String),
}

impl fmt::Display for NcmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NcmError::FileNotFound(path) => write!(f, "文件不存在: {path}"),
            NcmError::InvalidFormat(msg) => write!(f, "不是有效的NCM文件: {msg}"),
            NcmError::Truncated(msg) => write!(f, "文件被截断: {msg}"),
            NcmError::IoError(err) => write!(f, "文件I/O错误: {err}"),
            NcmError::CorruptKeyData(msg) => write!(f, "密钥数据损坏: {msg}"),
            NcmError::MetadataError(msg) => write!(f, "元数据解析失败: {msg}"),
            NcmError::PoolDisposed => write!(f, "worker池已释放"),
            NcmError::TaskFailure(msg) => write!(f, "任务失败: {msg}"),
        }
    }
}

impl std::error::Error for NcmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NcmError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for NcmError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => NcmError::FileNotFound(err.to_string()),
            io::ErrorKind::UnexpectedEof => NcmError::Truncated(err.to_string()),
            _ => NcmError::IoError(err),
        }
    }
}

/// NCM 操作的标准Result类型
pub type NcmResult<T> = Result<T, NcmError>;

// ==================== 错误转换Helper函数 ====================

/// 创建截断错误的helper函数
#[inline]
pub fn truncated_error<E: fmt::Display>(context: &str, err: E) -> NcmError {
    NcmError::Truncated(format!("{context}: {err}"))
}

/// 创建密钥损坏错误的helper函数
#[inline]
pub fn key_error<E: fmt::Display>(context: &str, err: E) -> NcmError {
    NcmError::CorruptKeyData(format!("{context}: {err}"))
}

/// 创建元数据错误的helper函数
#[inline]
pub fn metadata_error<E: fmt::Display>(context: &str, err: E) -> NcmError {
    NcmError::MetadataError(format!("{context}: {err}"))
}

/// 错误种类（`NcmError` 去掉负载后的可复制标签，随 `DecodeResult` 一起传递）
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub enum NcmErrorKind {
    FileNotFound,
    InvalidFormat,
    Truncated,
    Io,
    CorruptKeyData,
    Metadata,
    PoolDisposed,
    TaskFailure,
}

impl NcmErrorKind {
    /// 所属的统计类别
    pub fn category(self) -> ErrorCategory {
        match self {
            Self::InvalidFormat | Self::Truncated => ErrorCategory::Format,
            Self::CorruptKeyData | Self::Metadata => ErrorCategory::Key,
            Self::FileNotFound | Self::Io => ErrorCategory::Io,
            Self::PoolDisposed => ErrorCategory::Resource,
            Self::TaskFailure => ErrorCategory::Other,
        }
    }
}

impl NcmError {
    pub fn kind(&self) -> NcmErrorKind {
        match self {
            NcmError::FileNotFound(_) => NcmErrorKind::FileNotFound,
            NcmError::InvalidFormat(_) => NcmErrorKind::InvalidFormat,
            NcmError::Truncated(_) => NcmErrorKind::Truncated,
            NcmError::IoError(_) => NcmErrorKind::Io,
            NcmError::CorruptKeyData(_) => NcmErrorKind::CorruptKeyData,
            NcmError::MetadataError(_) => NcmErrorKind::Metadata,
            NcmError::PoolDisposed => NcmErrorKind::PoolDisposed,
            NcmError::TaskFailure(_) => NcmErrorKind::TaskFailure,
        }
    }
}

// ==================== 错误分类系统 ====================
// 用于批量处理中的错误统计和分析

/// 错误类别枚举（用于批量处理统计）
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub enum ErrorCategory {
    /// 格式相关错误（魔数错误、文件截断）
    Format,
    /// 密钥相关错误
    Key,
    /// I/O相关错误（文件不存在、权限不足等）
    Io,
    /// 池资源错误
    Resource,
    /// 其他未分类错误
    Other,
}

impl ErrorCategory {
    /// 从NcmError提取错误类别
    pub fn from_ncm_error(e: &NcmError) -> Self {
        e.kind().category()
    }

    /// 获取错误类别的显示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Format => "格式错误",
            Self::Key => "密钥错误",
            Self::Io => "I/O错误",
            Self::Resource => "资源错误",
            Self::Other => "其他错误",
        }
    }
}
