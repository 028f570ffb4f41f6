//! 有界 worker 池
//!
//! ## 状态模型
//!
//! - 每个 worker 是 {Idle, Busy} 两态状态机，状态只在 `acquire`/`release`/`warm_up`/`dispose`
//!   中、持有同一把池锁时迁移；解码线程本身从不触碰池状态。
//! - 等待者是显式 FIFO 队列：池饱和时 `acquire` 入队并阻塞，`release` 把 worker
//!   直接交给最早的等待者（worker 保持 Busy，不经过一次多余的 Idle/Busy 翻转）。
//! - 存活 worker 数永不超过 `max_size`。
//!
//! ```text
//! acquire ─┬─ 有 Idle  ──────────────→ Busy
//!          ├─ 未满     ── spawn ─────→ Busy
//!          └─ 已满     ── 入队等待 ──→ (release 直接移交) → Busy
//! release ─┬─ 有等待者 ── 移交最早者 → Busy
//!          └─ 无等待者 ─────────────→ Idle
//! ```

mod worker;

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crossbeam_channel::Sender;

use crate::decoder::{DecodeResult, DecodeTask, NcmDecoder};
use crate::error::{NcmError, NcmResult};
use crate::tools::constants::parallel_limits;
use crate::tools::utils;

pub use worker::Worker;

/// 单个 worker 的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Busy,
}

/// 池状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub max_size: usize,
    pub live: usize,
    pub idle: usize,
    pub busy: usize,
    pub waiting: usize,
    pub disposed: bool,
}

#[derive(Default)]
struct PoolState {
    states: HashMap<usize, WorkerState>,
    idle: Vec<Worker>,
    waiters: VecDeque<Sender<Worker>>,
    next_id: usize,
    disposed: bool,
}

impl PoolState {
    fn spawn_worker(&mut self, decoder: NcmDecoder, state: WorkerState) -> NcmResult<Worker> {
        let id = self.next_id;
        let worker = Worker::spawn(id, decoder)?;
        self.next_id += 1;
        self.states.insert(id, state);
        Ok(worker)
    }
}

/// 有界可复用 worker 池
pub struct WorkerPool {
    decoder: NcmDecoder,
    max_size: usize,
    state: Mutex<PoolState>,
}

impl WorkerPool {
    /// 创建 worker 池，`max_size` 夹紧到 1..=32
    pub fn new(max_size: usize, decoder: NcmDecoder) -> Self {
        let max_size = max_size.clamp(
            parallel_limits::MIN_PARALLEL_DEGREE,
            parallel_limits::MAX_PARALLEL_DEGREE,
        );
        Self {
            decoder,
            max_size,
            state: Mutex::new(PoolState::default()),
        }
    }

    /// 以硬件并行度为上限创建 worker 池
    pub fn with_default_size(decoder: NcmDecoder) -> Self {
        Self::new(utils::default_parallel_degree(), decoder)
    }

    #[inline]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Mutex poison 降级：即使有线程 panic，也恢复状态继续服务
    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// 借出一个 worker
    ///
    /// 有空闲直接返回；未满则新建；已满则排队阻塞，直到 `release` 移交。
    /// 池已释放（包括排队期间被释放）时返回 `PoolDisposed`。
    pub fn acquire(&self) -> NcmResult<Worker> {
        let receiver = {
            let mut state = self.lock_state();
            if state.disposed {
                return Err(NcmError::PoolDisposed);
            }

            if let Some(worker) = state.idle.pop() {
                state.states.insert(worker.id(), WorkerState::Busy);
                return Ok(worker);
            }

            if state.states.len() < self.max_size {
                return state.spawn_worker(self.decoder, WorkerState::Busy);
            }

            let (sender, receiver) = crossbeam_channel::bounded(1);
            state.waiters.push_back(sender);
            receiver
        };

        // dispose 会丢弃所有等待者的发送端
        receiver.recv().map_err(|_| NcmError::PoolDisposed)
    }

    /// 归还 worker：优先移交最早的等待者，否则置为 Idle
    ///
    /// 池已释放时直接销毁该 worker。
    pub fn release(&self, worker: Worker) {
        let mut state = self.lock_state();

        if state.disposed {
            state.states.remove(&worker.id());
            drop(state);
            drop(worker);
            return;
        }

        let mut worker = worker;
        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.send(worker) {
                Ok(()) => return,
                // 等待者已经不在了，尝试下一个
                Err(crossbeam_channel::SendError(returned)) => worker = returned,
            }
        }

        state.states.insert(worker.id(), WorkerState::Idle);
        state.idle.push(worker);
    }

    /// 借出 worker 执行一个任务并归还
    pub fn run(&self, task: DecodeTask) -> NcmResult<DecodeResult> {
        let mut worker = self.acquire()?;
        let result = worker.run(task);
        self.release(worker);
        Ok(result)
    }

    /// 预热：提前创建 worker，使存活数达到 `min(count, max_size)`
    ///
    /// 返回本次新建的 worker 数。
    pub fn warm_up(&self, count: usize) -> NcmResult<usize> {
        let target = count.min(self.max_size);
        let mut state = self.lock_state();
        if state.disposed {
            return Err(NcmError::PoolDisposed);
        }

        let mut created = 0;
        while state.states.len() < target {
            let worker = state.spawn_worker(self.decoder, WorkerState::Idle)?;
            state.idle.push(worker);
            created += 1;
        }

        if created > 0 {
            log::debug!("worker池预热: 新建 {created} 个, 存活 {}", state.states.len());
        }
        Ok(created)
    }

    /// 释放池（终态）
    ///
    /// 所有排队者以 `PoolDisposed` 失败，空闲 worker 立即销毁，
    /// 借出中的 worker 在归还时销毁。之后的 `acquire` 立即失败。
    pub fn dispose(&self) {
        let (idle, waiters) = {
            let mut state = self.lock_state();
            if state.disposed {
                return;
            }
            state.disposed = true;

            let idle = std::mem::take(&mut state.idle);
            for worker in &idle {
                state.states.remove(&worker.id());
            }
            (idle, std::mem::take(&mut state.waiters))
        };

        if !waiters.is_empty() {
            log::warn!("worker池已释放，{} 个等待者被拒绝", waiters.len());
        }
        drop(waiters);
        // 在锁外 join 线程
        drop(idle);
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.lock_state().disposed
    }

    /// 当前状态快照
    pub fn stats(&self) -> PoolStats {
        let state = self.lock_state();
        let idle = state
            .states
            .values()
            .filter(|s| **s == WorkerState::Idle)
            .count();
        PoolStats {
            max_size: self.max_size,
            live: state.states.len(),
            idle,
            busy: state.states.len() - idle,
            waiting: state.waiters.len(),
            disposed: state.disposed,
        }
    }

    /// 指定 worker 的状态（不存在时为 `None`）
    pub fn worker_state(&self, id: usize) -> Option<WorkerState> {
        self.lock_state().states.get(&id).copied()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(max_size: usize) -> WorkerPool {
        WorkerPool::new(max_size, NcmDecoder::new())
    }

    #[test]
    fn test_max_size_is_clamped() {
        assert_eq!(pool(0).max_size(), 1);
        assert_eq!(pool(1000).max_size(), 32);
        assert_eq!(pool(4).max_size(), 4);
    }

    #[test]
    fn test_acquire_release_reuses_worker() {
        let pool = pool(2);

        let worker = pool.acquire().unwrap();
        let id = worker.id();
        assert_eq!(pool.worker_state(id), Some(WorkerState::Busy));

        pool.release(worker);
        assert_eq!(pool.worker_state(id), Some(WorkerState::Idle));

        let again = pool.acquire().unwrap();
        assert_eq!(again.id(), id, "空闲worker应被复用而不是新建");
        assert_eq!(pool.stats().live, 1);
        pool.release(again);
    }

    #[test]
    fn test_warm_up_is_bounded() {
        let pool = pool(3);
        assert_eq!(pool.warm_up(10).unwrap(), 3);
        assert_eq!(pool.warm_up(10).unwrap(), 0);

        let stats = pool.stats();
        assert_eq!(stats.live, 3);
        assert_eq!(stats.idle, 3);
        assert_eq!(stats.busy, 0);
    }

    #[test]
    fn test_dispose_is_terminal() {
        let pool = pool(2);
        pool.warm_up(1).unwrap();
        let held = pool.acquire().unwrap();

        pool.dispose();
        assert!(pool.is_disposed());
        assert!(matches!(pool.acquire(), Err(NcmError::PoolDisposed)));
        assert!(matches!(pool.warm_up(1), Err(NcmError::PoolDisposed)));

        // 借出中的 worker 归还时销毁
        assert_eq!(pool.stats().live, 1);
        pool.release(held);
        assert_eq!(pool.stats().live, 0);

        // 重复 dispose 无副作用
        pool.dispose();
    }
}
