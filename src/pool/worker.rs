//! 池内工作单元
//!
//! 每个 worker 是一个独立 OS 线程，内部运行请求/响应循环：
//! 收一个带 id 的任务 → 同步执行解码 → 回一个带相同 id 的结果。
//! 目前每个被借出的 worker 同一时刻只有一个未完成任务，id 为后续流水线化预留。

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::decoder::{DecodeResult, DecodeTask, NcmDecoder};
use crate::error::{NcmError, NcmResult};

/// 发往 worker 线程的消息
enum WorkerRequest {
    Decode { id: u64, task: DecodeTask },
    Shutdown,
}

/// worker 线程的回复
struct WorkerResponse {
    id: u64,
    result: DecodeResult,
}

/// 可复用的工作单元
///
/// drop 时通知线程退出并等待其结束。
pub struct Worker {
    id: usize,
    requests: Sender<WorkerRequest>,
    responses: Receiver<WorkerResponse>,
    handle: Option<JoinHandle<()>>,
    next_task_id: u64,
}

impl Worker {
    /// 启动一个新的 worker 线程
    pub(super) fn spawn(id: usize, decoder: NcmDecoder) -> NcmResult<Self> {
        Self::spawn_with(id, move |task| decoder.execute(task))
    }

    /// 以任意任务执行函数启动 worker 线程
    fn spawn_with<F>(id: usize, execute: F) -> NcmResult<Self>
    where
        F: Fn(&DecodeTask) -> DecodeResult + Send + 'static,
    {
        let (request_tx, request_rx) = crossbeam_channel::bounded(1);
        let (response_tx, response_rx) = crossbeam_channel::bounded(1);

        let handle = thread::Builder::new()
            .name(format!("ncm-worker-{id}"))
            .spawn(move || worker_loop(execute, request_rx, response_tx))
            .map_err(NcmError::IoError)?;

        log::debug!("worker {id} 已启动");

        Ok(Self {
            id,
            requests: request_tx,
            responses: response_rx,
            handle: Some(handle),
            next_task_id: 0,
        })
    }

    /// worker 标识
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// 在该 worker 上同步执行一个任务
    ///
    /// 线程异常退出等情况也会收敛为失败的 `DecodeResult`。
    pub fn run(&mut self, task: DecodeTask) -> DecodeResult {
        let id = self.next_task_id;
        self.next_task_id += 1;
        let input_path = task.input_path.clone();

        if self.requests.send(WorkerRequest::Decode { id, task }).is_err() {
            return DecodeResult::failure(
                input_path,
                &NcmError::TaskFailure(format!("worker {} 线程已退出", self.id)),
            );
        }

        match self.responses.recv() {
            Ok(response) if response.id == id => response.result,
            Ok(response) => DecodeResult::failure(
                input_path,
                &NcmError::TaskFailure(format!(
                    "worker {} 返回了不匹配的任务id: 期望 {id}, 实际 {}",
                    self.id, response.id
                )),
            ),
            Err(_) => DecodeResult::failure(
                input_path,
                &NcmError::TaskFailure(format!("worker {} 未返回结果", self.id)),
            ),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let _ = self.requests.send(WorkerRequest::Shutdown);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::warn!("worker {} 线程异常结束", self.id);
        }
        log::debug!("worker {} 已销毁", self.id);
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker").field("id", &self.id).finish()
    }
}

fn worker_loop<F>(execute: F, requests: Receiver<WorkerRequest>, responses: Sender<WorkerResponse>)
where
    F: Fn(&DecodeTask) -> DecodeResult,
{
    while let Ok(request) = requests.recv() {
        match request {
            WorkerRequest::Decode { id, task } => {
                // 单个文件的 panic 在任务边界收敛，worker 继续服务
                let result = panic::catch_unwind(AssertUnwindSafe(|| execute(&task)))
                    .unwrap_or_else(|payload| {
                        DecodeResult::failure(
                            task.input_path.clone(),
                            &NcmError::TaskFailure(panic_message(payload.as_ref())),
                        )
                    });

                if responses.send(WorkerResponse { id, result }).is_err() {
                    break;
                }
            }
            WorkerRequest::Shutdown => break,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("解码线程panic: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("解码线程panic: {msg}")
    } else {
        "解码线程panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::DecodeMode;
    use crate::error::NcmErrorKind;
    use std::path::PathBuf;

    #[test]
    fn test_worker_runs_many_tasks_sequentially() {
        let mut worker = Worker::spawn(7, NcmDecoder::new()).unwrap();
        assert_eq!(worker.id(), 7);

        for i in 0..3 {
            let task = DecodeTask::new(
                PathBuf::from(format!("/missing/{i}.ncm")),
                std::env::temp_dir(),
                DecodeMode::WholeFile,
            );
            let result = worker.run(task);
            assert!(!result.is_success());
            assert_eq!(result.input_path, PathBuf::from(format!("/missing/{i}.ncm")));
        }
        assert_eq!(worker.next_task_id, 3);
    }

    #[test]
    fn test_panicking_task_becomes_failure_and_worker_survives() {
        let mut worker = Worker::spawn_with(3, |task: &DecodeTask| {
            if task.input_path.ends_with("boom.ncm") {
                panic!("缓冲区越界");
            }
            DecodeResult::success(task.input_path.clone(), task.output_dir.join("ok.mp3"))
        })
        .unwrap();

        let task = |name: &str| {
            DecodeTask::new(PathBuf::from(name), std::env::temp_dir(), DecodeMode::WholeFile)
        };

        let failed = worker.run(task("boom.ncm"));
        assert_eq!(failed.input_path, PathBuf::from("boom.ncm"));
        assert_eq!(failed.error_kind(), Some(NcmErrorKind::TaskFailure));
        assert!(failed.error_message().unwrap().contains("缓冲区越界"));

        // 同一个 worker 继续服务后续任务
        let ok = worker.run(task("next.ncm"));
        assert!(ok.is_success(), "{ok:?}");
        assert_eq!(worker.next_task_id, 2);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert!(panic_message(payload.as_ref()).contains("boom"));

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert!(panic_message(payload.as_ref()).contains("bang"));

        let payload: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(payload.as_ref()), "解码线程panic");
    }
}
