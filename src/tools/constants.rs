//! 常量和默认配置集中管理
//!
//! 将所有重要常量集中定义，避免"默认值漂移"和重复定义

/// 流式解码参数
pub mod streaming {
    /// 默认缓冲区大小（256 KiB）
    ///
    /// 在 I/O 调用次数和常驻内存之间折中
    pub const DEFAULT_BUFFER_SIZE: usize = 256 * 1024;

    /// 最小缓冲区大小（64 KiB）
    pub const MIN_BUFFER_SIZE: usize = 64 * 1024;

    /// 最大缓冲区大小（1 MiB）
    pub const MAX_BUFFER_SIZE: usize = 1024 * 1024;

    /// 默认 flush 间隔（每8个缓冲区）
    pub const DEFAULT_FLUSH_INTERVAL: usize = 8;

    pub const MIN_FLUSH_INTERVAL: usize = 1;

    pub const MAX_FLUSH_INTERVAL: usize = 32;
}

/// 并发度限制常量
pub mod parallel_limits {
    /// 最小并发度
    ///
    /// 任何并行处理至少需要1个线程/工作单元
    pub const MIN_PARALLEL_DEGREE: usize = 1;

    /// 最大并发度
    ///
    /// worker 池与批处理并发度的硬上限
    pub const MAX_PARALLEL_DEGREE: usize = 32;
}

/// 输入文件扩展名（不区分大小写）
pub const NCM_EXTENSION: &str = "ncm";
