//! 输出格式化模块
//!
//! 负责单文件结果行、批处理进度行和汇总表格的格式化。

use comfy_table::{Cell, CellAlignment, Table, presets::UTF8_FULL};

use super::batch_state::{BatchProgress, BatchSummary};
use super::utils;
use crate::decoder::DecodeResult;
use crate::error::ErrorCategory;

/// 格式化单个结果：`[OK] a.ncm -> a.flac` 或 `[FAIL] a.ncm - [格式错误] ...`
pub fn format_result_line(result: &DecodeResult) -> String {
    let name = utils::extract_filename_lossy(&result.input_path);
    match result.output_path() {
        Some(output) => format!("[OK] {name} -> {}", utils::extract_filename_lossy(output)),
        None => format!(
            "[FAIL] {name} - [{}] {}",
            result
                .error_category()
                .unwrap_or(ErrorCategory::Other)
                .display_name(),
            result.error_message().unwrap_or_default()
        ),
    }
}

/// 格式化进度快照
///
/// 认领快照显示 `[PROCESSING]`，完成快照显示结果行，最终快照返回 `None`。
pub fn format_progress_line(progress: &BatchProgress) -> Option<String> {
    let counter = format!("[{}/{}]", progress.processed(), progress.total);
    match (&progress.result, &progress.current_file) {
        (Some(result), _) => Some(format!("{counter} {}", format_result_line(result))),
        (None, Some(file)) => Some(format!("[PROCESSING] {counter} {file}")),
        (None, None) => None,
    }
}

/// 汇总表格
pub fn summary_table(summary: &BatchSummary) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["统计 / Metric", "数量 / Count"]);

    let mut add_row = |name: &str, value: String| {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    };

    add_row("总数 / Total", summary.total.to_string());
    add_row("成功 / Succeeded", summary.processed.to_string());
    add_row("失败 / Failed", summary.failed.to_string());
    add_row("成功率 / Success rate", format!("{:.1}%", summary.success_rate()));

    table
}

/// 失败文件明细（按错误类别排序，无失败时为 `None`）
pub fn failure_table(summary: &BatchSummary) -> Option<Table> {
    if summary.error_stats.is_empty() {
        return None;
    }

    let mut categories: Vec<_> = summary.error_stats.iter().collect();
    categories.sort_by_key(|(category, _)| **category);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["类别 / Category", "数量 / Count", "文件 / Files"]);
    for (category, files) in categories {
        table.add_row(vec![
            Cell::new(category.display_name()),
            Cell::new(files.len()).set_alignment(CellAlignment::Right),
            Cell::new(files.join("\n")),
        ]);
    }

    Some(table)
}
