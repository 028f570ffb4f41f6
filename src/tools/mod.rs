//! 工具模块集合
//!
//! 包含CLI、目录扫描、批处理协调、格式化等工具模块，支持main.rs的流程控制。

pub mod batch;
pub mod batch_state;
pub mod cli;
pub mod constants;
pub mod formatter;
pub mod logger;
pub mod scanner;
pub mod utils;

// 重新导出主要的公共接口
pub use batch::{BatchDecoder, BatchRun, DecodeSettings};
pub use batch_state::{BatchProgress, BatchSummary};
pub use cli::{AppConfig, parse_args, show_completion_info, show_scan_results, show_startup_info};
pub use formatter::{failure_table, format_progress_line, format_result_line, summary_table};
pub use scanner::{scan_files, try_scan_files};
pub use utils::path;
