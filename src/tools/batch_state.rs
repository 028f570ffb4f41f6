//! 批处理状态管理模块
//!
//! - [`BatchProgress`]：单次进度快照
//! - `ProgressTracker`：并行 worker 共享的计数器 + 有序进度通道
//! - [`BatchSummary`]：从结果流折叠出的成功/失败统计

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crossbeam_channel::Sender;

use crate::decoder::DecodeResult;
use crate::error::ErrorCategory;
use crate::tools::utils;

/// 批处理进度快照
///
/// `completed + failed` 单调不减且不超过 `total`；最后一个快照满足
/// `completed + failed == total`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    /// 文件总数
    pub total: usize,
    /// 成功数
    pub completed: usize,
    /// 失败数
    pub failed: usize,
    /// 刚认领或刚完成的文件名（最终快照为 `None`）
    pub current_file: Option<String>,
    /// 产生该快照的单文件结果（认领快照与最终快照为 `None`）
    pub result: Option<DecodeResult>,
}

impl BatchProgress {
    /// 已结束的文件数
    #[inline]
    pub fn processed(&self) -> usize {
        self.completed + self.failed
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.processed() == self.total
    }

    /// 完成比例 (0.0-1.0)，空批次视为已完成
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed() as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    completed: usize,
    failed: usize,
}

/// 并行进度跟踪（多线程安全）
///
/// 计数更新与快照发送在同一把锁内完成，通道里的顺序就是产生顺序，
/// 计数不会倒退。`finish` 消费自身，发送最终快照后关闭通道。
pub(crate) struct ProgressTracker {
    total: usize,
    counters: Mutex<Counters>,
    sender: Sender<BatchProgress>,
}

impl ProgressTracker {
    pub(crate) fn new(total: usize, sender: Sender<BatchProgress>) -> Self {
        Self {
            total,
            counters: Mutex::new(Counters::default()),
            sender,
        }
    }

    /// 扫描完成后确定文件总数
    pub(crate) fn with_total(self, total: usize) -> Self {
        Self { total, ..self }
    }

    fn emit(&self, counters: &Counters, current_file: Option<String>, result: Option<DecodeResult>) {
        // 接收端提前丢弃时静默忽略，批处理仍会跑完
        let _ = self.sender.send(BatchProgress {
            total: self.total,
            completed: counters.completed,
            failed: counters.failed,
            current_file,
            result,
        });
    }

    /// 报告某个文件已被认领
    pub(crate) fn report_claim(&self, file_name: String) {
        let counters = self
            .counters
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        self.emit(&counters, Some(file_name), None);
    }

    /// 报告某个文件已结束（成功或失败）
    pub(crate) fn report_result(&self, result: DecodeResult) {
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        if result.is_success() {
            counters.completed += 1;
        } else {
            counters.failed += 1;
        }
        let file_name = utils::extract_filename_lossy(&result.input_path);
        self.emit(&counters, Some(file_name), Some(result));
    }

    /// 发送最终快照并关闭通道
    pub(crate) fn finish(self) {
        let counters = self
            .counters
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        debug_assert_eq!(counters.completed + counters.failed, self.total);
        self.emit(&counters, None, None);
        // self 在此处 drop，发送端随之关闭
    }
}

/// 批处理统计汇总
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// 文件总数
    pub total: usize,
    /// 成功处理的文件数
    pub processed: usize,
    /// 失败的文件数
    pub failed: usize,
    /// 成功文件的输出路径
    pub outputs: Vec<PathBuf>,
    /// 错误分类统计（错误类型 -> 失败文件列表）
    pub error_stats: HashMap<ErrorCategory, Vec<String>>,
}

impl BatchSummary {
    /// 创建新的统计实例
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个进度快照
    pub fn record(&mut self, progress: &BatchProgress) {
        self.total = progress.total;
        if let Some(result) = &progress.result {
            self.record_result(result);
        }
    }

    /// 记录一个单文件结果
    pub fn record_result(&mut self, result: &DecodeResult) {
        match (result.output_path(), result.error_category()) {
            (Some(output), _) => {
                self.processed += 1;
                self.outputs.push(output.to_path_buf());
            }
            (None, category) => {
                self.failed += 1;
                self.error_stats
                    .entry(category.unwrap_or(ErrorCategory::Other))
                    .or_default()
                    .push(utils::extract_filename_lossy(&result.input_path));
            }
        }
    }

    /// 从进度流折叠
    pub fn from_progress(progress: impl IntoIterator<Item = BatchProgress>) -> Self {
        let mut summary = Self::new();
        for snapshot in progress {
            summary.record(&snapshot);
        }
        summary
    }

    /// 成功率（百分比）
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.processed as f64 / self.total as f64 * 100.0
        }
    }
}
