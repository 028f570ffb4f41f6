//! 批处理协调器
//!
//! 扫描目录 → 确保输出目录存在 → 夹紧并发度并预热 worker 池 →
//! C 个逻辑 worker 以原子下标认领文件，每个文件恰好被认领一次 →
//! 进度快照按产生顺序推送到 [`BatchRun`]。
//!
//! 单个文件失败只影响它自己的 `DecodeResult`，批处理继续；
//! 批处理中途池被释放时，之后认领的文件记为失败，而不是整体中止。

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};

use super::batch_state::{BatchProgress, BatchSummary, ProgressTracker};
use super::{scanner, utils};
use crate::decoder::{DecodeMode, DecodeResult, DecodeTask, NcmDecoder, StreamingOptions};
use crate::pool::WorkerPool;

/// 可序列化的解码设置（CLI 与批处理共用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeSettings {
    /// 并发度（夹紧到 1..=32）
    pub concurrency: usize,
    /// 流式缓冲区大小（字节）
    pub buffer_size: usize,
    /// 流式 flush 间隔（缓冲区个数）
    pub flush_interval: usize,
    /// 使用整文件模式
    pub whole_file: bool,
}

impl Default for DecodeSettings {
    fn default() -> Self {
        let streaming = StreamingOptions::default();
        Self {
            concurrency: utils::default_parallel_degree(),
            buffer_size: streaming.buffer_size(),
            flush_interval: streaming.flush_interval(),
            whole_file: false,
        }
    }
}

impl DecodeSettings {
    /// 对应的解码模式（流式参数已夹紧）
    pub fn mode(&self) -> DecodeMode {
        if self.whole_file {
            DecodeMode::WholeFile
        } else {
            DecodeMode::Streaming(StreamingOptions::new(self.buffer_size, self.flush_interval))
        }
    }

    /// 夹紧后的并发度
    pub fn concurrency(&self) -> usize {
        utils::clamp_parallel_degree(self.concurrency)
    }
}

/// 批处理协调器
///
/// 共享一个 worker 池；多个批次可以先后复用同一个协调器。
#[derive(Debug, Clone)]
pub struct BatchDecoder {
    pool: Arc<WorkerPool>,
}

impl BatchDecoder {
    /// 创建自有 worker 池，容量为硬件并行度
    pub fn new(decoder: NcmDecoder) -> Self {
        Self::with_pool(Arc::new(WorkerPool::with_default_size(decoder)))
    }

    /// 使用外部提供的 worker 池
    pub fn with_pool(pool: Arc<WorkerPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// 流式模式解码整个目录
    pub fn decode_directory(
        &self,
        input_dir: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        concurrency: usize,
        buffer_size: usize,
        flush_interval: usize,
    ) -> BatchRun {
        let settings = DecodeSettings {
            concurrency,
            buffer_size,
            flush_interval,
            whole_file: false,
        };
        self.decode_directory_with(input_dir, output_dir, &settings)
    }

    /// 按给定设置解码整个目录
    ///
    /// 立即返回；扫描与解码在后台协调线程进行。
    pub fn decode_directory_with(
        &self,
        input_dir: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        settings: &DecodeSettings,
    ) -> BatchRun {
        let job = BatchJob {
            pool: Arc::clone(&self.pool),
            input_dir: input_dir.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
            concurrency: settings.concurrency(),
            mode: settings.mode(),
        };
        BatchRun::start(job)
    }
}

/// 一次批处理的输入
struct BatchJob {
    pool: Arc<WorkerPool>,
    input_dir: PathBuf,
    output_dir: PathBuf,
    concurrency: usize,
    mode: DecodeMode,
}

impl BatchJob {
    fn run(self, tracker: ProgressTracker) {
        let files = scanner::scan_files(&self.input_dir);
        let tracker = tracker.with_total(files.len());

        // 空批次也保证输出目录存在
        if let Err(e) = std::fs::create_dir_all(&self.output_dir) {
            // 逐文件写出时会各自失败并计入统计
            log::warn!("无法创建输出目录 {}: {e}", self.output_dir.display());
        }

        if files.is_empty() {
            log::info!("目录中没有NCM文件: {}", self.input_dir.display());
            tracker.finish();
            return;
        }

        let workers = self.concurrency.min(files.len());
        if let Err(e) = self.pool.warm_up(workers) {
            log::warn!("worker池预热失败: {e}");
        }

        log::debug!(
            "批处理开始: {} 个文件, {workers} 个逻辑worker, 模式 {:?}",
            files.len(),
            self.mode
        );

        let next_index = AtomicUsize::new(0);
        let claim_loop = || {
            loop {
                let index = next_index.fetch_add(1, Ordering::Relaxed);
                let Some(input) = files.get(index) else { break };
                tracker.report_claim(utils::extract_filename_lossy(input));
                tracker.report_result(self.decode_one(input));
            }
        };

        thread::scope(|scope| {
            let mut spawned = 0;
            for id in 0..workers {
                match thread::Builder::new()
                    .name(format!("ncm-batch-{id}"))
                    .spawn_scoped(scope, claim_loop)
                {
                    Ok(_) => spawned += 1,
                    Err(e) => log::warn!("无法启动批处理线程 {id}: {e}"),
                }
            }
            // 一个线程都没起来时由协调线程自己认领剩余文件
            if spawned == 0 {
                claim_loop();
            }
        });

        tracker.finish();
    }

    fn decode_one(&self, input: &Path) -> DecodeResult {
        let task = DecodeTask::new(input.to_path_buf(), self.output_dir.clone(), self.mode);
        self.pool
            .run(task)
            .unwrap_or_else(|e| DecodeResult::failure(input.to_path_buf(), &e))
    }
}

type JobSlot = Mutex<Option<(BatchJob, ProgressTracker)>>;

fn take_job(slot: &JobSlot) -> Option<(BatchJob, ProgressTracker)> {
    slot.lock()
        .unwrap_or_else(|poison| poison.into_inner())
        .take()
}

/// 正在进行的批处理
///
/// 以迭代器形式产出 [`BatchProgress`]，最后一项是 `current_file` 为 `None`
/// 的最终快照。提前 drop 不会取消批处理，会等待其跑完。
pub struct BatchRun {
    receiver: Receiver<BatchProgress>,
    coordinator: Option<JoinHandle<()>>,
}

impl BatchRun {
    fn start(job: BatchJob) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let tracker = ProgressTracker::new(0, sender);
        let slot = Arc::new(Mutex::new(Some((job, tracker))));

        let spawned = thread::Builder::new().name("ncm-batch".to_string()).spawn({
            let slot = Arc::clone(&slot);
            move || {
                if let Some((job, tracker)) = take_job(&slot) {
                    job.run(tracker);
                }
            }
        });

        let coordinator = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                // 协调线程起不来时同步执行，进度全部缓存在通道里
                log::warn!("无法启动批处理协调线程: {e}");
                if let Some((job, tracker)) = take_job(&slot) {
                    job.run(tracker);
                }
                None
            }
        };

        Self {
            receiver,
            coordinator,
        }
    }

    /// 消费全部进度并汇总
    pub fn wait(self) -> BatchSummary {
        BatchSummary::from_progress(self)
    }

    fn join(&mut self) {
        if let Some(handle) = self.coordinator.take()
            && handle.join().is_err()
        {
            log::error!("批处理协调线程异常结束");
        }
    }
}

impl Iterator for BatchRun {
    type Item = BatchProgress;

    fn next(&mut self) -> Option<BatchProgress> {
        match self.receiver.recv() {
            Ok(progress) => Some(progress),
            Err(_) => {
                self.join();
                None
            }
        }
    }
}

impl Drop for BatchRun {
    fn drop(&mut self) {
        self.join();
    }
}
