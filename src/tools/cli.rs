//! 命令行接口模块
//!
//! 负责命令行参数解析、配置管理和程序信息展示。

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use std::path::{Path, PathBuf};

use super::batch::DecodeSettings;
use super::constants::{parallel_limits, streaming};
use super::utils;
use crate::decoder::DecodeMode;

/// 应用程序版本信息
const VERSION: &str = env!("CARGO_PKG_VERSION");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// 应用程序配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 输入 `.ncm` 文件（单文件模式）或扫描目录（批量模式）
    pub input_path: PathBuf,

    /// 输出目录（未指定时与输入同目录）
    pub output_dir: Option<PathBuf>,

    /// 解码设置（并发度、流式参数、模式）
    pub settings: DecodeSettings,

    /// 是否显示详细信息
    pub verbose: bool,
}

impl AppConfig {
    /// 根据路径类型判断是否为批量模式
    #[inline]
    pub fn is_batch_mode(&self) -> bool {
        self.input_path.is_dir()
    }

    #[inline]
    pub fn decode_mode(&self) -> DecodeMode {
        self.settings.mode()
    }

    /// 实际输出目录
    ///
    /// 未指定 `--output` 时：批量模式写回输入目录，单文件模式写到文件所在目录。
    pub fn effective_output_dir(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None if self.is_batch_mode() => self.input_path.clone(),
            None => utils::get_parent_dir(&self.input_path).to_path_buf(),
        }
    }
}

/// 构建命令定义
pub fn build_command() -> Command {
    Command::new("ncm-decoder")
        .version(VERSION)
        .about(DESCRIPTION)
        .author("MacinMeter Team")
        .arg(
            Arg::new("INPUT")
                .help("NCM 文件或目录路径。如果不指定，将扫描可执行文件所在目录")
                .required(false)
                .index(1),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .help("输出目录（默认与输入同目录）")
                .value_name("DIR"),
        )
        .arg(
            Arg::new("jobs")
                .long("jobs")
                .short('j')
                .help(format!(
                    "并发解码的文件数（{}-{}，默认为CPU核心数）",
                    parallel_limits::MIN_PARALLEL_DEGREE,
                    parallel_limits::MAX_PARALLEL_DEGREE
                ))
                .value_name("N")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("buffer-size")
                .long("buffer-size")
                .help(format!(
                    "流式缓冲区大小，单位字节（{}-{}，默认 {}）",
                    streaming::MIN_BUFFER_SIZE,
                    streaming::MAX_BUFFER_SIZE,
                    streaming::DEFAULT_BUFFER_SIZE
                ))
                .value_name("BYTES")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("flush-interval")
                .long("flush-interval")
                .help(format!(
                    "每多少个缓冲区强制 flush 一次（{}-{}，默认 {}）",
                    streaming::MIN_FLUSH_INTERVAL,
                    streaming::MAX_FLUSH_INTERVAL,
                    streaming::DEFAULT_FLUSH_INTERVAL
                ))
                .value_name("N")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("whole-file")
                .long("whole-file")
                .help("整文件读入内存后解密（默认流式）")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("显示详细处理信息")
                .action(ArgAction::SetTrue),
        )
}

/// 从解析结果创建配置
pub fn config_from_matches(matches: &ArgMatches) -> AppConfig {
    // 双击启动模式：使用可执行文件所在目录
    let input_path = match matches.get_one::<String>("INPUT") {
        Some(input) => PathBuf::from(input),
        None => {
            let exe_path = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
            utils::get_parent_dir(&exe_path).to_path_buf()
        }
    };

    let defaults = DecodeSettings::default();
    let settings = DecodeSettings {
        concurrency: matches
            .get_one::<usize>("jobs")
            .copied()
            .unwrap_or(defaults.concurrency),
        buffer_size: matches
            .get_one::<usize>("buffer-size")
            .copied()
            .unwrap_or(defaults.buffer_size),
        flush_interval: matches
            .get_one::<usize>("flush-interval")
            .copied()
            .unwrap_or(defaults.flush_interval),
        whole_file: matches.get_flag("whole-file"),
    };

    AppConfig {
        input_path,
        output_dir: matches.get_one::<String>("output").map(PathBuf::from),
        settings,
        verbose: matches.get_flag("verbose"),
    }
}

/// 解析命令行参数并创建配置
pub fn parse_args() -> AppConfig {
    config_from_matches(&build_command().get_matches())
}

/// 显示程序启动信息
pub fn show_startup_info(config: &AppConfig) {
    println!("NCM Decoder v{VERSION}");
    println!("{DESCRIPTION}");
    if config.verbose {
        let mode = match config.decode_mode() {
            DecodeMode::WholeFile => "整文件 / whole-file".to_string(),
            DecodeMode::Streaming(options) => format!(
                "流式 / streaming (buffer {} bytes, flush every {} buffers)",
                options.buffer_size(),
                options.flush_interval()
            ),
        };
        println!("[INFO] 模式 / Mode: {mode}");
        println!(
            "[INFO] 并发度 / Parallelism: {}",
            config.settings.concurrency()
        );
    }
    println!();
}

/// 显示扫描结果
pub fn show_scan_results(input_dir: &Path, total: usize) {
    if total == 0 {
        println!(
            "[WARNING] 目录中没有 .ncm 文件 / No .ncm files found in: {}",
            input_dir.display()
        );
    } else {
        println!("[INFO] 发现 {total} 个 NCM 文件 / Found {total} NCM files");
    }
}

/// 显示程序完成信息
pub fn show_completion_info(config: &AppConfig) {
    if config.verbose {
        println!("[INFO] 所有任务处理完成 / All tasks completed");
    }
}
