//! 任务生命周期协调器 - 编排层
//!
//! ## 职责
//!
//! 把一次引擎运行包装成持久的工作单元：
//!
//! 1. **状态推进**：Pending → Running → {Success | Failure}
//! 2. **进度上报**：0 / 20 / 40 / 80 / 100 五个固定检查点
//! 3. **持久化**：截图、字段、审计历史、失败原因
//! 4. **基础设施重试**：会话无法建立或编排过程出错时，整体重跑，固定间隔
//!
//! 业务失败（次数用完）只落库一次，不重试。
//! 终态先写入存储，再对外上报。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::models::{Job, JobStatus, Outcome, TaskResult, TaskStatus};
use crate::orchestrator::status_board::ProgressReporter;
use crate::services::{RecordStore, ScreenshotStore, SuccessUpdate};
use crate::workflow::{JobCtx, ScrapeEngine};

/// 协调器参数
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub max_attempts: u32,
    pub per_attempt_timeout: Duration,
    pub infra_max_retries: u32,
    pub infra_retry_delay: Duration,
}

impl CoordinatorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts,
            per_attempt_timeout: config.per_attempt_timeout(),
            infra_max_retries: config.infra_max_retries,
            infra_retry_delay: config.infra_retry_delay(),
        }
    }
}

/// 任务生命周期协调器
///
/// 任务创建后，协调器是该记录唯一的写入方。
pub struct TaskCoordinator {
    engine: ScrapeEngine,
    store: Arc<dyn RecordStore>,
    screenshots: ScreenshotStore,
    settings: CoordinatorSettings,
}

impl TaskCoordinator {
    pub fn new(
        engine: ScrapeEngine,
        store: Arc<dyn RecordStore>,
        screenshots: ScreenshotStore,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            engine,
            store,
            screenshots,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// 执行一个任务直到终态，返回最终对外状态
    pub async fn execute(&self, job: &Job, reporter: &dyn ProgressReporter) -> TaskStatus {
        let ctx = JobCtx::from(job);
        let mut infra_retries = 0;

        loop {
            let reason = match self.run_once(&ctx, reporter).await {
                Ok(status) => return status,
                Err(reason) => reason,
            };

            if infra_retries >= self.settings.infra_max_retries {
                error!(
                    "{} ❌ 基础设施故障，重试 {} 次后放弃: {}",
                    ctx, infra_retries, reason
                );
                return self.finish_after_infra_failure(&ctx, &reason, reporter).await;
            }

            infra_retries += 1;
            warn!(
                "{} ⚠️ 基础设施故障: {}，{} 秒后第 {}/{} 次重试",
                ctx,
                reason,
                self.settings.infra_retry_delay.as_secs(),
                infra_retries,
                self.settings.infra_max_retries
            );
            // 只有存储中已是 Running 时才对外显示进度
            if self.stored_status(&ctx.job_id).await == Some(JobStatus::Running) {
                reporter
                    .report(
                        &ctx.job_id,
                        TaskStatus::progress(
                            0,
                            format!("基础设施故障，等待第 {} 次重试: {}", infra_retries, reason),
                        ),
                    )
                    .await;
            }
            sleep(self.settings.infra_retry_delay).await;
        }
    }

    /// 完整执行一轮；`Err` 表示需要基础设施重试
    async fn run_once(
        &self,
        ctx: &JobCtx,
        reporter: &dyn ProgressReporter,
    ) -> Result<TaskStatus, String> {
        // 终态记录不再执行（例如上一轮已落库但之后出错）
        if let Some(job) = self
            .store
            .get_by_job_id(&ctx.job_id)
            .await
            .map_err(|e| e.to_string())?
        {
            if job.status.is_terminal() {
                info!("{} 任务已处于终态 {}，跳过执行", ctx, job.status);
                let status = TaskStatus::from(&job);
                reporter.report(&ctx.job_id, status.clone()).await;
                return Ok(status);
            }
        }

        self.store
            .mark_running(&ctx.job_id)
            .await
            .map_err(|e| e.to_string())?;
        reporter
            .report(&ctx.job_id, TaskStatus::progress(0, "开始处理"))
            .await;

        reporter
            .report(&ctx.job_id, TaskStatus::progress(20, "浏览器会话准备中"))
            .await;
        reporter
            .report(&ctx.job_id, TaskStatus::progress(40, "正在识别验证码并查询"))
            .await;

        let outcome = self
            .engine
            .run(ctx, self.settings.max_attempts, self.settings.per_attempt_timeout)
            .await;

        match outcome {
            Outcome::Success {
                record,
                screenshot,
                attempts_used,
            } => {
                reporter
                    .report(&ctx.job_id, TaskStatus::progress(80, "正在保存结果"))
                    .await;

                let stored = self
                    .screenshots
                    .save(&ctx.query_key, &screenshot)
                    .await
                    .map_err(|e| e.to_string())?;

                let job = self
                    .store
                    .mark_success(
                        &ctx.job_id,
                        SuccessUpdate {
                            record: record.clone(),
                            screenshot_filename: stored.filename.clone(),
                            screenshot_url: stored.url.clone(),
                            attempts_used,
                        },
                    )
                    .await
                    .map_err(|e| e.to_string())?;

                // 审计副本失败不影响任务结果
                if let Err(e) = self.store.append_history(&record).await {
                    warn!("{} 写入历史记录失败: {}", ctx, e);
                }

                let status = TaskStatus::success(TaskResult {
                    record_id: job.id,
                    query_key: ctx.query_key.clone(),
                    filename: stored.filename,
                    screenshot_url: stored.url,
                    record,
                    attempts_used,
                });
                reporter.report(&ctx.job_id, status.clone()).await;
                info!("{} ✅ 任务完成，共尝试 {} 次", ctx, attempts_used);
                Ok(status)
            }
            Outcome::BudgetExhausted {
                reason,
                attempts_used,
            } => {
                self.store
                    .mark_failure(&ctx.job_id, &reason, attempts_used)
                    .await
                    .map_err(|e| e.to_string())?;

                let status = TaskStatus::failure(reason, attempts_used);
                reporter.report(&ctx.job_id, status.clone()).await;
                warn!("{} ❌ 任务失败，共尝试 {} 次", ctx, attempts_used);
                Ok(status)
            }
            Outcome::InfraFault { reason } => Err(reason),
        }
    }

    /// 执行过程异常中断（例如 panic）时把任务落为失败
    ///
    /// 已处于终态的记录保持不变，并按存储内容上报。
    pub async fn abandon(
        &self,
        job: &Job,
        reason: &str,
        reporter: &dyn ProgressReporter,
    ) -> TaskStatus {
        let ctx = JobCtx::from(job);
        error!("{} ❌ 任务执行中断: {}", ctx, reason);

        if let Ok(Some(stored)) = self.store.get_by_job_id(&ctx.job_id).await {
            if stored.status.is_terminal() {
                let status = TaskStatus::from(&stored);
                reporter.report(&ctx.job_id, status.clone()).await;
                return status;
            }
        }
        self.finish_after_infra_failure(&ctx, reason, reporter).await
    }

    async fn stored_status(&self, job_id: &str) -> Option<JobStatus> {
        match self.store.get_by_job_id(job_id).await {
            Ok(job) => job.map(|j| j.status),
            Err(e) => {
                warn!("读取任务 {} 状态失败: {}", job_id, e);
                None
            }
        }
    }

    async fn finish_after_infra_failure(
        &self,
        ctx: &JobCtx,
        reason: &str,
        reporter: &dyn ProgressReporter,
    ) -> TaskStatus {
        let status = match self.store.mark_failure(&ctx.job_id, reason, 0).await {
            Ok(_) => TaskStatus::failure(reason, 0),
            Err(e) => {
                error!("{} 写入失败状态出错: {}", ctx, e);
                TaskStatus::failure(format!("{}；记录写入失败: {}", reason, e), 0)
            }
        };
        reporter.report(&ctx.job_id, status.clone()).await;
        status
    }
}
