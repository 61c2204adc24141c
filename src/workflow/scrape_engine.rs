//! 查询尝试引擎 - 流程层
//!
//! 核心职责：在有限次数内反复"取验证码 → 识别 → 提交 → 等待结果"，
//! 并把一次运行归结为唯一的 [`Outcome`]。
//!
//! 单次尝试的状态流转：
//! ```text
//! Loaded → ChallengeFetched → Decoded → Submitted → { PanelFound → 结束, TimedOut → 下一次 }
//! InitialLoadFailed → 结束
//! ```
//!
//! 每一次尝试都消耗一次次数，无论失败原因是识别不清、元素缺失还是超时；
//! 失败原因只影响日志。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::models::{Outcome, ScrapedRecord};
use crate::services::captcha_solver::is_plausible;
use crate::services::{AttemptFault, CaptchaSolver, FieldExtractor, Portal, PortalSession};
use crate::workflow::job_ctx::JobCtx;

/// 引擎调优参数
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// 识别结果最小长度，低于此值直接进入下一次尝试
    pub min_captcha_len: usize,
    /// 失败后的停顿
    pub retry_pause: Duration,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_captcha_len: config.min_captcha_len,
            retry_pause: config.retry_pause(),
        }
    }
}

/// 查询尝试引擎
///
/// - 每次运行独占一个门户会话，所有退出路径都会释放
/// - 单次尝试的故障不会越过引擎边界
/// - 不持久化任何东西
pub struct ScrapeEngine {
    portal: Arc<dyn Portal>,
    solver: Arc<dyn CaptchaSolver>,
    extractor: FieldExtractor,
    settings: EngineSettings,
}

impl ScrapeEngine {
    pub fn new(
        portal: Arc<dyn Portal>,
        solver: Arc<dyn CaptchaSolver>,
        extractor: FieldExtractor,
        settings: EngineSettings,
    ) -> Self {
        Self {
            portal,
            solver,
            extractor,
            settings,
        }
    }

    pub async fn run(
        &self,
        ctx: &JobCtx,
        max_attempts: u32,
        per_attempt_timeout: Duration,
    ) -> Outcome {
        info!("{} 🌐 正在打开查询页面...", ctx);

        let mut session = match self.portal.open().await {
            Ok(session) => session,
            Err(e) => {
                error!("{} ❌ 查询页面加载失败: {}", ctx, e);
                return Outcome::InfraFault {
                    reason: format!("查询页面加载失败: {}", e),
                };
            }
        };

        let outcome = self
            .run_attempts(session.as_mut(), ctx, max_attempts, per_attempt_timeout)
            .await;

        session.close().await;
        outcome
    }

    async fn run_attempts(
        &self,
        session: &mut dyn PortalSession,
        ctx: &JobCtx,
        max_attempts: u32,
        per_attempt_timeout: Duration,
    ) -> Outcome {
        for attempt in 1..=max_attempts {
            info!("{} 第 {}/{} 次尝试", ctx, attempt, max_attempts);

            match self.attempt(session, ctx, per_attempt_timeout).await {
                Ok((record, screenshot)) => {
                    info!("{} ✅ 第 {} 次尝试获得结果", ctx, attempt);
                    return Outcome::Success {
                        record,
                        screenshot,
                        attempts_used: attempt,
                    };
                }
                Err(fault) => {
                    log_fault(ctx, attempt, &fault);
                    if attempt < max_attempts && !self.settings.retry_pause.is_zero() {
                        sleep(self.settings.retry_pause).await;
                    }
                }
            }
        }

        let reason = format!(
            "编号 {} 在 {} 次尝试后仍未获得结果",
            ctx.query_key, max_attempts
        );
        error!("{} ❌ {}", ctx, reason);
        Outcome::BudgetExhausted {
            reason,
            attempts_used: max_attempts,
        }
    }

    /// 一次完整尝试；结果面板第一次出现即视为成功，不检查字段是否完整
    async fn attempt(
        &self,
        session: &mut dyn PortalSession,
        ctx: &JobCtx,
        per_attempt_timeout: Duration,
    ) -> Result<(ScrapedRecord, Vec<u8>), AttemptFault> {
        let image = session.fetch_challenge().await?;

        let guess = self.solver.solve(&image).await;
        if !is_plausible(&guess, self.settings.min_captcha_len) {
            return Err(AttemptFault::CaptchaIllegible { guess });
        }
        debug!("{} 验证码识别为: {}", ctx, guess);

        let panel = session
            .submit(&guess, &ctx.query_key, per_attempt_timeout)
            .await?;

        let screenshot = panel.screenshot().await?;
        let record = self.extractor.extract(panel.as_ref(), &ctx.query_key).await;
        Ok((record, screenshot))
    }
}

fn log_fault(ctx: &JobCtx, attempt: u32, fault: &AttemptFault) {
    match fault {
        AttemptFault::CaptchaIllegible { .. } => {
            warn!("{} 第 {} 次: {}，重新获取验证码", ctx, attempt, fault)
        }
        AttemptFault::TimedOut { .. } => {
            warn!("{} 第 {} 次: 结果未出现，验证码可能错误 ({})", ctx, attempt, fault)
        }
        AttemptFault::ElementMissing(_) | AttemptFault::Browser(_) => {
            warn!("{} 第 {} 次: {}", ctx, attempt, fault)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{engine_with, Step};

    fn ctx() -> JobCtx {
        JobCtx::new("task-1", "3000123456")
    }

    #[tokio::test]
    async fn test_success_on_third_attempt_counts_illegible_attempts() {
        let (engine, stats) = engine_with(vec![Ok(vec![
            Step::guess(""),
            Step::guess("a1"),
            Step::guess("x7k9q").panel(),
        ])]);

        let outcome = engine.run(&ctx(), 5, Duration::from_millis(50)).await;

        match outcome {
            Outcome::Success {
                record,
                screenshot,
                attempts_used,
            } => {
                assert_eq!(attempts_used, 3);
                assert!(!screenshot.is_empty());
                assert_eq!(record.query_key, "3000123456");
                assert_eq!(record.name.as_deref(), Some("SITI AMINAH"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        // 不合格的识别结果不会被提交
        assert_eq!(stats.submitted(), vec!["x7k9q".to_string()]);
        assert_eq!(stats.opened(), 1);
        assert_eq!(stats.closed(), 1);
    }

    #[tokio::test]
    async fn test_budget_exhausted_after_timeouts() {
        let (engine, stats) = engine_with(vec![Ok(vec![
            Step::guess("abcd").timeout(),
            Step::guess("efgh").timeout(),
        ])]);

        let outcome = engine.run(&ctx(), 2, Duration::from_millis(50)).await;

        match &outcome {
            Outcome::BudgetExhausted {
                reason,
                attempts_used,
            } => {
                assert_eq!(*attempts_used, 2);
                assert!(!reason.is_empty());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(outcome.attempts_used(), 2);
        assert_eq!(stats.submitted().len(), 2);
        assert_eq!(stats.closed(), 1);
    }

    #[tokio::test]
    async fn test_initial_load_failure_is_infra_fault() {
        let (engine, stats) = engine_with(vec![Err(())]);

        let outcome = engine.run(&ctx(), 5, Duration::from_millis(50)).await;

        assert!(matches!(outcome, Outcome::InfraFault { .. }));
        assert_eq!(outcome.attempts_used(), 0);
        assert!(stats.submitted().is_empty());
        assert_eq!(stats.closed(), 0);
    }

    #[tokio::test]
    async fn test_missing_elements_consume_budget() {
        let (engine, stats) = engine_with(vec![Ok(vec![
            Step::missing_challenge(),
            Step::guess("abcd").missing_input(),
            Step::guess("wxyz").panel(),
        ])]);

        let outcome = engine.run(&ctx(), 3, Duration::from_millis(50)).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts_used(), 3);
        assert_eq!(stats.closed(), 1);
    }

    #[tokio::test]
    async fn test_attempts_never_exceed_budget() {
        // 脚本比次数多，多余的步骤不会执行
        let steps = (0..10).map(|_| Step::guess("abcd").timeout()).collect();
        let (engine, stats) = engine_with(vec![Ok(steps)]);

        let outcome = engine.run(&ctx(), 4, Duration::from_millis(10)).await;

        assert_eq!(outcome.attempts_used(), 4);
        assert_eq!(stats.submitted().len(), 4);
    }

    #[tokio::test]
    async fn test_panel_with_failing_fields_is_still_success() {
        let (engine, _stats) = engine_with(vec![Ok(vec![Step::guess("abcd").sparse_panel()])]);

        let outcome = engine.run(&ctx(), 2, Duration::from_millis(10)).await;

        match outcome {
            Outcome::Success {
                record,
                attempts_used,
                ..
            } => {
                assert_eq!(attempts_used, 1);
                assert!(record.missing_fields() > 0);
                assert!(record.name.is_some());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
