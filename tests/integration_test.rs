use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use porsi_lookup::error::PortalError;
use porsi_lookup::services::screenshot_store::is_screenshot_filename;
use porsi_lookup::services::{
    AttemptFault, CaptchaSolver, JsonRecordStore, PanelField, Portal, PortalSession, RecordStore,
    ResultPanel,
};
use porsi_lookup::utils::logging;
use porsi_lookup::{App, Config, JobStatus, TaskState};

/// 验证码画布上"画"的就是答案文本
struct TextSolver;

#[async_trait]
impl CaptchaSolver for TextSolver {
    async fn solve(&self, image: &[u8]) -> String {
        String::from_utf8_lossy(image).into_owned()
    }
}

struct Panel;

#[async_trait]
impl ResultPanel for Panel {
    async fn screenshot(&self) -> Result<Vec<u8>, AttemptFault> {
        Ok(b"\x89PNG panel".to_vec())
    }

    async fn text(&self, field: PanelField) -> Result<String, AttemptFault> {
        match field {
            PanelField::Name => Ok("AHMAD FAUZI".to_string()),
            PanelField::Province => Ok("JAWA BARAT".to_string()),
            PanelField::Quota => Ok("  ".to_string()),
            other => Err(AttemptFault::ElementMissing(other.label().to_string())),
        }
    }

    async fn fragments(&self, _field: PanelField) -> Result<Vec<String>, AttemptFault> {
        Ok(vec!["1448 H".to_string(), " / 2027 M".to_string()])
    }
}

/// 依次给出验证码，只有 `answer` 能得到结果面板
struct FakePortal {
    challenges: Vec<&'static str>,
    answer: &'static str,
    broken: bool,
    opened: AtomicUsize,
}

impl FakePortal {
    fn new(challenges: Vec<&'static str>, answer: &'static str) -> Self {
        Self {
            challenges,
            answer,
            broken: false,
            opened: AtomicUsize::new(0),
        }
    }

    fn broken() -> Self {
        Self {
            broken: true,
            ..Self::new(Vec::new(), "")
        }
    }
}

#[async_trait]
impl Portal for FakePortal {
    async fn open(&self) -> Result<Box<dyn PortalSession>, PortalError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            return Err(PortalError::LoadTimeout {
                url: "https://portal.test/".to_string(),
                secs: 30,
            });
        }
        Ok(Box::new(FakeSession {
            challenges: self.challenges.iter().copied().collect(),
            answer: self.answer,
        }))
    }
}

struct FakeSession {
    challenges: VecDeque<&'static str>,
    answer: &'static str,
}

#[async_trait]
impl PortalSession for FakeSession {
    async fn fetch_challenge(&mut self) -> Result<Vec<u8>, AttemptFault> {
        self.challenges
            .pop_front()
            .map(|c| c.as_bytes().to_vec())
            .ok_or_else(|| AttemptFault::ElementMissing("#canv".to_string()))
    }

    async fn submit(
        &mut self,
        guess: &str,
        _query_key: &str,
        timeout: Duration,
    ) -> Result<Box<dyn ResultPanel>, AttemptFault> {
        if guess == self.answer {
            Ok(Box::new(Panel))
        } else {
            Err(AttemptFault::timed_out("结果面板", timeout))
        }
    }

    async fn close(&mut self) {}
}

fn test_config(dir: &Path) -> Config {
    Config {
        screenshot_folder: dir.join("shots").to_string_lossy().into_owned(),
        record_store_path: Some(dir.join("records.json").to_string_lossy().into_owned()),
        per_attempt_timeout_secs: 1,
        retry_pause_ms: 0,
        form_settle_ms: 0,
        infra_retry_delay_secs: 0,
        ..Config::default()
    }
}

#[tokio::test]
async fn test_batch_run_persists_results() {
    logging::init(false);
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let portal = Arc::new(FakePortal::new(vec!["x", "WR0NG", "X7K9Q"], "X7K9Q"));

    let app = App::with_components(config.clone(), portal.clone(), Arc::new(TextSolver))
        .await
        .unwrap();
    let reports = app
        .run(&["3000123456".to_string(), "ab".to_string()])
        .await
        .unwrap();
    app.shutdown().await;

    assert_eq!(reports.len(), 2);
    let rejected = reports.iter().find(|r| r.query_key == "ab").unwrap();
    assert!(rejected.job_id.is_none());
    assert_eq!(rejected.status.state, TaskState::Failure);

    let done = reports.iter().find(|r| r.query_key == "3000123456").unwrap();
    assert_eq!(done.status.state, TaskState::Success);
    assert_eq!(done.status.attempts_used, Some(3));
    let result = done.status.result.clone().unwrap();
    assert!(is_screenshot_filename(&result.filename, "3000123456"));
    assert!(dir.path().join("shots").join(&result.filename).exists());
    assert_eq!(result.record.name.as_deref(), Some("AHMAD FAUZI"));
    assert_eq!(result.record.quota, None);
    assert_eq!(result.record.departure_estimate.as_deref(), Some("1448 H / 2027 M"));
    assert_eq!(portal.opened.load(Ordering::SeqCst), 1);

    let records = app.records("3000123456").await.unwrap();
    assert_eq!(records.jobs.len(), 1);
    assert_eq!(records.history.len(), 1);

    // 快照重新打开后记录仍在
    let reopened = JsonRecordStore::open(dir.path().join("records.json"))
        .await
        .unwrap();
    let job = reopened
        .get_by_job_id(done.job_id.as_deref().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.screenshot_filename.as_deref(), Some(result.filename.as_str()));
}

#[tokio::test]
async fn test_portal_outage_fails_after_infra_retries() {
    logging::init(false);
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        infra_max_retries: 2,
        ..test_config(dir.path())
    };
    let portal = Arc::new(FakePortal::broken());

    let app = App::with_components(config, portal.clone(), Arc::new(TextSolver))
        .await
        .unwrap();
    let reports = app.run(&["3000555555".to_string()]).await.unwrap();
    app.shutdown().await;

    let status = &reports[0].status;
    assert_eq!(status.state, TaskState::Failure);
    assert_eq!(status.attempts_used, Some(0));
    assert!(status.error.is_some());
    assert_eq!(portal.opened.load(Ordering::SeqCst), 3);

    let records = app.records("3000555555").await.unwrap();
    assert_eq!(records.jobs[0].status, JobStatus::Failure);
    assert!(records.history.is_empty());
}

#[tokio::test]
#[ignore] // 需要本机 Chromium、tesseract 与外网：cargo test -- --ignored
async fn test_real_portal_lookup() {
    logging::init(true);
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        screenshot_folder: dir.path().to_string_lossy().into_owned(),
        record_store_path: None,
        infra_max_retries: 0,
        ..Config::load().expect("加载配置失败")
    };

    let app = App::initialize(config).await.expect("初始化失败");
    let reports = app.run(&["3000123456".to_string()]).await.unwrap();
    app.shutdown().await;

    assert!(reports[0].status.state.is_terminal());
}
