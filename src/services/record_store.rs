//! 记录存储服务 - 业务能力层
//!
//! 任务创建后只有协调器会写入同一条记录；查询接口只读。
//! 存储层负责拒绝对终态记录的任何修改。

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult, StoreError};
use crate::models::{HistoryEntry, Job, JobStatus, ScrapedRecord};

/// 成功结果需要写入的内容
#[derive(Debug, Clone)]
pub struct SuccessUpdate {
    pub record: ScrapedRecord,
    pub screenshot_filename: String,
    pub screenshot_url: String,
    pub attempts_used: u32,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create(&self, job_id: &str, query_key: &str) -> AppResult<Job>;

    /// 进入 Running；已在 Running 时只刷新时间，`started_at` 保持首次值
    async fn mark_running(&self, job_id: &str) -> AppResult<Job>;

    async fn mark_success(&self, job_id: &str, update: SuccessUpdate) -> AppResult<Job>;

    async fn mark_failure(&self, job_id: &str, message: &str, attempts_used: u32) -> AppResult<Job>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Job>>;

    async fn get_by_job_id(&self, job_id: &str) -> AppResult<Option<Job>>;

    /// 按创建时间倒序
    async fn list_by_query_key(&self, query_key: &str, limit: usize) -> AppResult<Vec<Job>>;

    async fn append_history(&self, record: &ScrapedRecord) -> AppResult<HistoryEntry>;

    /// 按创建时间倒序
    async fn list_history(&self, query_key: &str, limit: usize) -> AppResult<Vec<HistoryEntry>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    jobs: Vec<Job>,
    history: Vec<HistoryEntry>,
}

impl StoreState {
    fn job_mut(&mut self, job_id: &str) -> Result<&mut Job, StoreError> {
        self.jobs
            .iter_mut()
            .find(|j| j.job_id == job_id)
            .ok_or_else(|| StoreError::NotFound {
                job_id: job_id.to_string(),
            })
    }

    /// 取出可修改的非终态记录
    fn open_job_mut(&mut self, job_id: &str) -> Result<&mut Job, StoreError> {
        let job = self.job_mut(job_id)?;
        if job.status.is_terminal() {
            return Err(StoreError::AlreadyTerminal {
                job_id: job_id.to_string(),
                status: job.status.to_string(),
            });
        }
        Ok(job)
    }
}

/// 内存记录存储，可选 JSON 快照文件
///
/// 每次修改后整体写入快照（先写临时文件再重命名）。
pub struct JsonRecordStore {
    state: RwLock<StoreState>,
    snapshot_path: Option<PathBuf>,
}

impl JsonRecordStore {
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            snapshot_path: None,
        }
    }

    /// 打开快照文件，不存在时从空状态开始
    pub async fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str::<StoreState>(&content)
                .map_err(|e| AppError::persist_failed(path.display().to_string(), e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => return Err(AppError::persist_failed(path.display().to_string(), e)),
        };

        info!(
            "📂 记录快照已加载: {} ({} 个任务, {} 条历史)",
            path.display(),
            state.jobs.len(),
            state.history.len()
        );

        Ok(Self {
            state: RwLock::new(state),
            snapshot_path: Some(path),
        })
    }

    async fn persist(&self, state: &StoreState) -> AppResult<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| AppError::persist_failed(path.display().to_string(), e))?;
        let tmp = path.with_extension("json.tmp");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::persist_failed(parent.display().to_string(), e))?;
        }
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| AppError::persist_failed(tmp.display().to_string(), e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| AppError::persist_failed(path.display().to_string(), e))?;

        debug!("记录快照已写入: {}", path.display());
        Ok(())
    }

    /// 修改单条记录并持久化；修改失败时不写快照
    async fn update_job<F>(&self, job_id: &str, apply: F) -> AppResult<Job>
    where
        F: FnOnce(&mut Job) + Send,
    {
        let mut state = self.state.write().await;
        let job = state.open_job_mut(job_id)?;
        apply(job);
        job.updated_at = Utc::now();
        let updated = job.clone();
        self.persist(&state).await?;
        Ok(updated)
    }
}

#[async_trait]
impl RecordStore for JsonRecordStore {
    async fn create(&self, job_id: &str, query_key: &str) -> AppResult<Job> {
        let mut state = self.state.write().await;
        if state.jobs.iter().any(|j| j.job_id == job_id) {
            return Err(StoreError::DuplicateJob {
                job_id: job_id.to_string(),
            }
            .into());
        }

        let job = Job::new(job_id, query_key);
        state.jobs.push(job.clone());
        self.persist(&state).await?;

        info!("创建任务记录: {} (编号 {})", job_id, query_key);
        Ok(job)
    }

    async fn mark_running(&self, job_id: &str) -> AppResult<Job> {
        self.update_job(job_id, |job| {
            job.status = JobStatus::Running;
            if job.started_at.is_none() {
                job.started_at = Some(Utc::now());
            }
        })
        .await
    }

    async fn mark_success(&self, job_id: &str, update: SuccessUpdate) -> AppResult<Job> {
        self.update_job(job_id, move |job| {
            job.status = JobStatus::Success;
            job.completed_at = Some(Utc::now());
            job.attempts_used = update.attempts_used;
            job.record = Some(update.record);
            job.screenshot_filename = Some(update.screenshot_filename);
            job.screenshot_url = Some(update.screenshot_url);
            job.error_message = None;
        })
        .await
    }

    async fn mark_failure(&self, job_id: &str, message: &str, attempts_used: u32) -> AppResult<Job> {
        let message = message.to_string();
        self.update_job(job_id, move |job| {
            job.status = JobStatus::Failure;
            job.completed_at = Some(Utc::now());
            job.attempts_used = attempts_used;
            job.error_message = Some(message);
        })
        .await
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Job>> {
        let state = self.state.read().await;
        Ok(state.jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn get_by_job_id(&self, job_id: &str) -> AppResult<Option<Job>> {
        let state = self.state.read().await;
        Ok(state.jobs.iter().find(|j| j.job_id == job_id).cloned())
    }

    async fn list_by_query_key(&self, query_key: &str, limit: usize) -> AppResult<Vec<Job>> {
        let state = self.state.read().await;
        let mut jobs: Vec<Job> = state
            .jobs
            .iter()
            .filter(|j| j.query_key == query_key)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(limit);
        Ok(jobs)
    }

    async fn append_history(&self, record: &ScrapedRecord) -> AppResult<HistoryEntry> {
        let mut state = self.state.write().await;
        let entry = HistoryEntry::new(record.clone());
        state.history.push(entry.clone());
        self.persist(&state).await?;
        Ok(entry)
    }

    async fn list_history(&self, query_key: &str, limit: usize) -> AppResult<Vec<HistoryEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<HistoryEntry> = state
            .history
            .iter()
            .filter(|h| h.record.query_key == query_key)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit);
        Ok(entries)
    }
}
