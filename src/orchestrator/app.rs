//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **组装**：识别器、浏览器门户、记录存储、截图目录、引擎、协调器、队列
//! 2. **批量查询**：把一组查询编号入队，等待全部结束后汇总
//! 3. **历史查询**：按查询编号列出任务记录与审计历史
//! 4. **资源管理**：关闭队列，等待在途任务结束

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{ChromePortal, ChromePortalOptions, PortalSelectors};
use crate::models::{HistoryEntry, Job, TaskState, TaskStatus};
use crate::orchestrator::job_queue::JobQueue;
use crate::orchestrator::task_coordinator::{CoordinatorSettings, TaskCoordinator};
use crate::services::{
    CaptchaSolver, FieldExtractor, JsonRecordStore, Portal, RecordStore, ScreenshotStore,
    TesseractSolver,
};
use crate::utils::logging;
use crate::workflow::{EngineSettings, ScrapeEngine};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// 单个查询编号的处理结果
#[derive(Debug, Clone, Serialize)]
pub struct QueryReport {
    pub query_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub status: TaskStatus,
}

/// 某个查询编号的全部记录
#[derive(Debug, Clone, Serialize)]
pub struct QueryRecords {
    pub query_key: String,
    pub jobs: Vec<Job>,
    pub history: Vec<HistoryEntry>,
}

/// 应用主结构
pub struct App {
    config: Config,
    store: Arc<dyn RecordStore>,
    queue: JobQueue,
}

impl App {
    /// 使用真实浏览器与 tesseract 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        logging::log_startup(&config);

        let portal = ChromePortal::new(
            ChromePortalOptions::from_config(&config),
            PortalSelectors::default(),
        );
        let solver = TesseractSolver::new(config.tesseract_cmd.clone())?;

        Ok(Self::with_components(config, Arc::new(portal), Arc::new(solver)).await?)
    }

    /// 使用给定的门户与识别器组装应用
    pub async fn with_components(
        config: Config,
        portal: Arc<dyn Portal>,
        solver: Arc<dyn CaptchaSolver>,
    ) -> AppResult<Self> {
        let store: Arc<dyn RecordStore> = match &config.record_store_path {
            Some(path) => Arc::new(JsonRecordStore::open(path).await?),
            None => Arc::new(JsonRecordStore::in_memory()),
        };

        cleanup_old_results(Path::new(&config.screenshot_folder)).await;

        let engine = ScrapeEngine::new(
            portal,
            solver,
            FieldExtractor::new(),
            EngineSettings::from_config(&config),
        );
        let coordinator = TaskCoordinator::new(
            engine,
            store.clone(),
            ScreenshotStore::new(&config.screenshot_folder, config.public_base_url.clone()),
            CoordinatorSettings::from_config(&config),
        );
        let queue = JobQueue::start(Arc::new(coordinator), config.worker_pool_size);

        Ok(Self {
            config,
            store,
            queue,
        })
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    /// 入队一组查询编号并等待全部结束
    pub async fn run(&self, query_keys: &[String]) -> Result<Vec<QueryReport>> {
        let mut reports = Vec::with_capacity(query_keys.len());
        let mut submitted = Vec::new();

        for key in query_keys {
            match self.queue.submit(key).await {
                Ok(job_id) => submitted.push((key.clone(), job_id)),
                Err(e) => {
                    warn!("⚠️ 跳过编号 {:?}: {}", key, e);
                    reports.push(QueryReport {
                        query_key: key.clone(),
                        job_id: None,
                        status: TaskStatus::failure(e.to_string(), 0),
                    });
                }
            }
        }

        logging::log_jobs_enqueued(submitted.len(), self.config.worker_pool_size);

        let job_ids: Vec<String> = submitted.iter().map(|(_, id)| id.clone()).collect();
        self.queue.wait_for(&job_ids, POLL_INTERVAL).await;

        for (query_key, job_id) in submitted {
            let status = self
                .queue
                .poll_status(&job_id)
                .await?
                .unwrap_or_else(TaskStatus::pending);
            reports.push(QueryReport {
                query_key,
                job_id: Some(job_id),
                status,
            });
        }

        let success = reports
            .iter()
            .filter(|r| r.status.state == TaskState::Success)
            .count();
        logging::print_final_stats(success, reports.len() - success, reports.len());

        Ok(reports)
    }

    /// 查询某个编号的任务记录与历史
    pub async fn records(&self, query_key: &str) -> Result<QueryRecords> {
        let limit = self.config.history_limit;
        Ok(QueryRecords {
            query_key: query_key.to_string(),
            jobs: self.store.list_by_query_key(query_key, limit).await?,
            history: self.store.list_history(query_key, limit).await?,
        })
    }

    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }
}

/// 旧截图清理，目前不删除任何文件
pub async fn cleanup_old_results(folder: &Path) -> usize {
    debug!("跳过旧截图清理: {}", folder.display());
    0
}
