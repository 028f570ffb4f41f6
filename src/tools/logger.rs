//! 日志输出
//!
//! `log` 门面的终端实现：INFO 原样输出，其他级别带 `[WARNING]` 等标签；
//! verbose 模式额外显示 DEBUG 并附带模块与源码位置。

use log::{Level, LevelFilter, Metadata, Record};

struct Logger;

static LOGGER: Logger = Logger;

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        match (record.level(), log::max_level()) {
            (Level::Info, _) => println!("[INFO] {}", record.args()),
            (level, LevelFilter::Debug | LevelFilter::Trace) => {
                let location = match (record.file(), record.line()) {
                    (Some(file), Some(line)) => format!("[{file}:{line}]"),
                    _ => "[unk]".to_string(),
                };
                eprintln!(
                    "{} {} {location} {}",
                    label(level),
                    record.target(),
                    record.args()
                );
            }
            (level, _) => eprintln!("{} {}", label(level), record.args()),
        }
    }

    fn flush(&self) {}
}

fn label(level: Level) -> &'static str {
    match level {
        Level::Error => "[ERROR]",
        Level::Warn => "[WARNING]",
        Level::Info => "[INFO]",
        Level::Debug => "[DEBUG]",
        Level::Trace => "[TRACE]",
    }
}

/// 对应 verbose 开关的日志级别
pub fn level_for(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    }
}

/// 安装全局 logger（重复安装时只更新级别）
pub fn init(verbose: bool) {
    // 已有 logger 时 set_logger 失败，保留已有实现
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level_for(verbose));
}
