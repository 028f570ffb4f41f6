//! NCM Decoder - 主程序入口
//!
//! 纯流程控制器，负责协调各个工具模块完成解密任务。

use anyhow::{Context, Result};
use ncm_batch_decoder::{
    NcmDecoder, WorkerPool,
    error::{ErrorCategory, NcmError},
    tools::{self, AppConfig, BatchDecoder, BatchSummary},
};
use std::process;
use std::sync::Arc;

/// 错误退出码定义
mod exit_codes {
    /// 通用错误（含批处理中存在失败文件）
    pub const GENERAL_ERROR: i32 = 1;
    /// 格式/输入错误
    pub const FORMAT_ERROR: i32 = 2;
    /// 密钥数据损坏
    pub const KEY_ERROR: i32 = 3;
    /// 资源/并发错误
    pub const RESOURCE_ERROR: i32 = 5;
}

/// 获取错误建议文本
fn get_error_suggestion(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Format => {
            "确认输入为网易云音乐下载的完整 .ncm 文件 / Make sure the input is a complete .ncm file"
        }
        ErrorCategory::Key => {
            "密钥块无法解密，文件可能已损坏 / Key block could not be decrypted, the file may be corrupted"
        }
        ErrorCategory::Io => {
            "检查文件路径是否正确，文件是否存在且可读，输出目录是否可写 / Check that paths exist and are readable/writable"
        }
        ErrorCategory::Resource => {
            "资源不可用，请重试；若持续失败请降低并发度（-j 1） / Resource unavailable, retry or reduce parallelism (-j 1)"
        }
        ErrorCategory::Other => {
            "请检查输入文件和参数设置 / Please check input file and parameter settings"
        }
    }
}

/// 错误处理和建议
fn handle_error(error: anyhow::Error) -> ! {
    eprintln!("[ERROR] 错误 / Error: {error:#}");

    let category = error
        .downcast_ref::<NcmError>()
        .map(ErrorCategory::from_ncm_error)
        .unwrap_or(ErrorCategory::Other);
    eprintln!("[INFO] 建议 / Suggestion: {}", get_error_suggestion(category));

    let exit_code = match category {
        ErrorCategory::Format => exit_codes::FORMAT_ERROR,
        ErrorCategory::Key => exit_codes::KEY_ERROR,
        ErrorCategory::Resource => exit_codes::RESOURCE_ERROR,
        ErrorCategory::Io | ErrorCategory::Other => exit_codes::GENERAL_ERROR,
    };

    process::exit(exit_code);
}

/// 批量解密目录
///
/// 返回汇总统计；单个文件失败不会中断批处理。
fn process_batch_mode(config: &AppConfig) -> Result<BatchSummary> {
    let output_dir = config.effective_output_dir();
    let concurrency = config.settings.concurrency();

    let pool = Arc::new(WorkerPool::new(concurrency, NcmDecoder::new()));
    let batch = BatchDecoder::with_pool(Arc::clone(&pool));

    let mut summary = BatchSummary::new();
    let mut announced = false;

    for progress in batch.decode_directory_with(&config.input_path, &output_dir, &config.settings) {
        if !announced {
            tools::show_scan_results(&config.input_path, progress.total);
            announced = true;
        }

        summary.record(&progress);

        // 静默模式只显示失败；verbose 显示认领与成功
        let show = config.verbose
            || progress
                .result
                .as_ref()
                .is_some_and(|result| !result.is_success());
        if show && let Some(line) = tools::format_progress_line(&progress) {
            println!("{line}");
        }
    }

    pool.dispose();

    if summary.total > 0 {
        println!();
        println!("{}", tools::summary_table(&summary));
        if let Some(failures) = tools::failure_table(&summary) {
            println!("{failures}");
        }
    }

    Ok(summary)
}

/// 单文件解密模式
fn process_single_mode(config: &AppConfig) -> Result<()> {
    let output_dir = config.effective_output_dir();
    let output_path = NcmDecoder::new()
        .try_decode(&config.input_path, &output_dir, &config.decode_mode())
        .with_context(|| format!("解密失败 / Failed to decode {}", config.input_path.display()))?;

    println!(
        "[OK] {} -> {}",
        config.input_path.display(),
        output_path.display()
    );
    Ok(())
}

/// 应用程序主逻辑（便于测试和复用）
///
/// 返回进程退出码。
fn run() -> Result<i32> {
    // 1. 解析命令行参数
    let config = tools::parse_args();
    tools::logger::init(config.verbose);

    // 2. 显示启动信息
    tools::show_startup_info(&config);

    // 3. 根据模式选择处理方式
    let exit_code = if config.is_batch_mode() {
        let summary = process_batch_mode(&config)?;
        if summary.failed > 0 {
            exit_codes::GENERAL_ERROR
        } else {
            0
        }
    } else {
        process_single_mode(&config)?;
        0
    };

    tools::show_completion_info(&config);
    Ok(exit_code)
}

fn main() {
    match run() {
        Ok(0) => {}
        Ok(code) => process::exit(code),
        Err(error) => handle_error(error),
    }
}
