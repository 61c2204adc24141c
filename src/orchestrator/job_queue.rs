//! 任务队列 - 编排层
//!
//! ## 职责
//!
//! 1. **入队**：校验查询编号，创建 Pending 记录，分配任务编号
//! 2. **并发控制**：Semaphore 限制同时运行的任务数，空闲前任务保持 Pending
//! 3. **状态查询**：通过状态板返回任务的对外状态
//! 4. **关闭**：停止接收新任务，等待已入队任务全部结束

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::sleep;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult, QueueError};
use crate::models::{Job, TaskStatus};
use crate::orchestrator::status_board::StatusBoard;
use crate::orchestrator::task_coordinator::TaskCoordinator;
use crate::services::RecordStore;

/// 查询编号最短长度
pub const MIN_QUERY_KEY_LEN: usize = 3;

/// 校验并规范化查询编号
pub fn validate_query_key(query_key: &str) -> AppResult<String> {
    let key = query_key.trim();
    if key.is_empty() {
        return Err(AppError::invalid_query_key("查询编号不能为空"));
    }
    if key.chars().count() < MIN_QUERY_KEY_LEN {
        return Err(AppError::invalid_query_key(format!(
            "查询编号至少需要 {} 个字符",
            MIN_QUERY_KEY_LEN
        )));
    }
    Ok(key.to_string())
}

pub struct JobQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    board: Arc<StatusBoard>,
    store: Arc<dyn RecordStore>,
}

impl JobQueue {
    /// 启动调度任务
    pub fn start(coordinator: Arc<TaskCoordinator>, worker_pool_size: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let board = Arc::new(StatusBoard::new());
        let store = coordinator.store().clone();
        let semaphore = Arc::new(Semaphore::new(worker_pool_size.max(1)));

        let dispatcher = tokio::spawn(dispatch(receiver, coordinator, board.clone(), semaphore));

        Self {
            sender: Mutex::new(Some(sender)),
            dispatcher: Mutex::new(Some(dispatcher)),
            board,
            store,
        }
    }

    /// 提交一个查询，返回任务编号
    pub async fn submit(&self, query_key: &str) -> AppResult<String> {
        let key = validate_query_key(query_key)?;

        let sender = self.sender.lock().await;
        let sender = sender.as_ref().ok_or(QueueError::Closed)?;

        let job_id = Uuid::new_v4().to_string();
        let job = self.store.create(&job_id, &key).await?;
        self.board.register(&job_id).await;
        sender.send(job).map_err(|_| QueueError::Closed)?;

        info!("📥 已入队: 编号 {} → 任务 {}", key, job_id);
        Ok(job_id)
    }

    /// 查询任务状态；本次运行之外创建的任务从存储中还原
    pub async fn poll_status(&self, job_id: &str) -> AppResult<Option<TaskStatus>> {
        if let Some(status) = self.board.get(job_id).await {
            return Ok(Some(status));
        }
        Ok(self
            .store
            .get_by_job_id(job_id)
            .await?
            .map(|job| TaskStatus::from(&job)))
    }

    /// 等待一组任务全部进入终态
    pub async fn wait_for(&self, job_ids: &[String], poll_interval: Duration) {
        while !self.board.all_terminal(job_ids).await {
            sleep(poll_interval).await;
        }
    }

    /// 停止接收新任务，等待已入队的任务执行完毕
    pub async fn shutdown(&self) {
        self.sender.lock().await.take();
        if let Some(dispatcher) = self.dispatcher.lock().await.take() {
            if let Err(e) = dispatcher.await {
                error!("调度任务异常退出: {}", e);
            }
        }
        info!("任务队列已关闭");
    }
}

async fn dispatch(
    mut receiver: mpsc::UnboundedReceiver<Job>,
    coordinator: Arc<TaskCoordinator>,
    board: Arc<StatusBoard>,
    semaphore: Arc<Semaphore>,
) {
    let mut workers = JoinSet::new();

    while let Some(job) = receiver.recv().await {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!("获取执行许可失败: {}", e);
                break;
            }
        };
        debug!("任务 {} 开始执行", job.job_id);

        let coordinator = coordinator.clone();
        let board = board.clone();
        workers.spawn(async move {
            let _permit = permit;
            let run = AssertUnwindSafe(coordinator.execute(&job, board.as_ref()));
            match run.catch_unwind().await {
                Ok(status) => status,
                Err(panic) => {
                    let reason = format!("任务执行异常中断: {}", panic_message(panic.as_ref()));
                    coordinator.abandon(&job, &reason, board.as_ref()).await
                }
            }
        });

        // 回收已结束的任务
        while let Some(joined) = workers.try_join_next() {
            if let Err(e) = joined {
                error!("任务执行失败: {}", e);
            }
        }
    }

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            error!("任务执行失败: {}", e);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "未知错误".to_string()
    }
}
