//! 任务状态板
//!
//! 保存每个任务对外可见的进度，供 pollStatus 查询。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::TaskStatus;

/// 进度上报
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, job_id: &str, status: TaskStatus);
}

#[derive(Default)]
pub struct StatusBoard {
    statuses: RwLock<HashMap<String, TaskStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, job_id: &str) {
        self.statuses
            .write()
            .await
            .insert(job_id.to_string(), TaskStatus::pending());
    }

    pub async fn get(&self, job_id: &str) -> Option<TaskStatus> {
        self.statuses.read().await.get(job_id).cloned()
    }

    pub async fn all_terminal(&self, job_ids: &[String]) -> bool {
        let statuses = self.statuses.read().await;
        job_ids
            .iter()
            .all(|id| statuses.get(id).is_some_and(|s| s.state.is_terminal()))
    }
}

#[async_trait]
impl ProgressReporter for StatusBoard {
    async fn report(&self, job_id: &str, status: TaskStatus) {
        let mut statuses = self.statuses.write().await;
        match statuses.get(job_id) {
            Some(current) if current.state.is_terminal() => {
                debug!("任务 {} 已结束，忽略状态更新: {}", job_id, status.status_text);
            }
            _ => {
                statuses.insert(job_id.to_string(), status);
            }
        }
    }
}
