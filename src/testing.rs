//! 单元测试用的脚本化门户、识别器与进度记录器

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::PortalError;
use crate::models::TaskStatus;
use crate::orchestrator::ProgressReporter;
use crate::services::portal::{AttemptFault, PanelField, Portal, PortalSession, ResultPanel};
use crate::services::{CaptchaSolver, FieldExtractor};
use crate::workflow::{EngineSettings, ScrapeEngine};

// ========== 结果面板 ==========

#[derive(Clone)]
pub struct FakePanel {
    texts: HashMap<PanelField, String>,
    fragments: Vec<String>,
    failing: HashSet<PanelField>,
}

impl FakePanel {
    pub fn complete() -> Self {
        let texts = [
            (PanelField::Name, "SITI AMINAH"),
            (PanelField::Regency, "KAB. MALANG"),
            (PanelField::Province, "JAWA TIMUR"),
            (PanelField::Quota, "1234"),
            (PanelField::PaymentStatus, "LUNAS"),
            (PanelField::RequestTime, "17-10-2026 10:00"),
        ]
        .into_iter()
        .map(|(f, t)| (f, t.to_string()))
        .collect();

        Self {
            texts,
            fragments: vec![
                "Estimasi keberangkatan".to_string(),
                " 1447 H / 2026 M ".to_string(),
            ],
            failing: HashSet::new(),
        }
    }

    pub fn failing(mut self, field: PanelField) -> Self {
        self.failing.insert(field);
        self
    }

    pub fn with_fragments(mut self, fragments: Vec<String>) -> Self {
        self.fragments = fragments;
        self
    }

    pub fn with_text(mut self, field: PanelField, text: &str) -> Self {
        self.texts.insert(field, text.to_string());
        self
    }
}

#[async_trait]
impl ResultPanel for FakePanel {
    async fn screenshot(&self) -> Result<Vec<u8>, AttemptFault> {
        Ok(b"\x89PNG fake panel".to_vec())
    }

    async fn text(&self, field: PanelField) -> Result<String, AttemptFault> {
        if self.failing.contains(&field) {
            return Err(AttemptFault::ElementMissing(field.label().to_string()));
        }
        self.texts
            .get(&field)
            .cloned()
            .ok_or_else(|| AttemptFault::ElementMissing(field.label().to_string()))
    }

    async fn fragments(&self, field: PanelField) -> Result<Vec<String>, AttemptFault> {
        if self.failing.contains(&field) {
            return Err(AttemptFault::ElementMissing(field.label().to_string()));
        }
        Ok(self.fragments.clone())
    }
}

// ========== 脚本化门户 ==========

#[derive(Debug, Clone, Copy)]
pub enum SubmitResult {
    Panel,
    SparsePanel,
    Timeout,
    MissingInput,
}

/// 一次尝试的脚本
#[derive(Debug, Clone)]
pub enum Step {
    MissingChallenge,
    Guess { text: String, result: SubmitResult },
}

impl Step {
    /// 验证码被识别为 `text`，默认提交后超时
    pub fn guess(text: &str) -> Self {
        Step::Guess {
            text: text.to_string(),
            result: SubmitResult::Timeout,
        }
    }

    pub fn missing_challenge() -> Self {
        Step::MissingChallenge
    }

    fn with_result(self, result: SubmitResult) -> Self {
        match self {
            Step::Guess { text, .. } => Step::Guess { text, result },
            other => other,
        }
    }

    pub fn panel(self) -> Self {
        self.with_result(SubmitResult::Panel)
    }

    pub fn sparse_panel(self) -> Self {
        self.with_result(SubmitResult::SparsePanel)
    }

    pub fn timeout(self) -> Self {
        self.with_result(SubmitResult::Timeout)
    }

    pub fn missing_input(self) -> Self {
        self.with_result(SubmitResult::MissingInput)
    }
}

#[derive(Default)]
pub struct PortalStats {
    opened: AtomicUsize,
    closed: AtomicUsize,
    submitted: Mutex<Vec<String>>,
}

impl PortalStats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }
}

/// 每次 `open()` 取出一个会话脚本；`Err(())` 表示入口页面加载失败。
/// 脚本用完后再打开一律失败。
pub struct ScriptedPortal {
    sessions: Mutex<VecDeque<Result<Vec<Step>, ()>>>,
    stats: Arc<PortalStats>,
}

impl ScriptedPortal {
    pub fn new(sessions: Vec<Result<Vec<Step>, ()>>) -> (Self, Arc<PortalStats>) {
        let stats = Arc::new(PortalStats::default());
        (
            Self {
                sessions: Mutex::new(sessions.into()),
                stats: stats.clone(),
            },
            stats,
        )
    }
}

#[async_trait]
impl Portal for ScriptedPortal {
    async fn open(&self) -> Result<Box<dyn PortalSession>, PortalError> {
        let next = self.sessions.lock().unwrap().pop_front();
        match next {
            Some(Ok(steps)) => {
                self.stats.opened.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(ScriptedSession {
                    steps: steps.into(),
                    pending: None,
                    stats: self.stats.clone(),
                }))
            }
            _ => Err(PortalError::LoadTimeout {
                url: "https://portal.test/".to_string(),
                secs: 30,
            }),
        }
    }
}

struct ScriptedSession {
    steps: VecDeque<Step>,
    pending: Option<SubmitResult>,
    stats: Arc<PortalStats>,
}

#[async_trait]
impl PortalSession for ScriptedSession {
    async fn fetch_challenge(&mut self) -> Result<Vec<u8>, AttemptFault> {
        match self.steps.pop_front() {
            Some(Step::Guess { text, result }) => {
                self.pending = Some(result);
                Ok(text.into_bytes())
            }
            Some(Step::MissingChallenge) | None => {
                self.pending = None;
                Err(AttemptFault::ElementMissing("#canv".to_string()))
            }
        }
    }

    async fn submit(
        &mut self,
        guess: &str,
        _query_key: &str,
        timeout: Duration,
    ) -> Result<Box<dyn ResultPanel>, AttemptFault> {
        self.stats.submitted.lock().unwrap().push(guess.to_string());
        match self.pending.take() {
            Some(SubmitResult::Panel) => Ok(Box::new(FakePanel::complete())),
            Some(SubmitResult::SparsePanel) => Ok(Box::new(
                FakePanel::complete()
                    .failing(PanelField::Quota)
                    .with_fragments(Vec::new()),
            )),
            Some(SubmitResult::MissingInput) => {
                Err(AttemptFault::ElementMissing("#captcha-input".to_string()))
            }
            Some(SubmitResult::Timeout) | None => Err(AttemptFault::timed_out("结果面板", timeout)),
        }
    }

    async fn close(&mut self) {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// 把图片字节原样当作识别结果
pub struct EchoSolver;

#[async_trait]
impl CaptchaSolver for EchoSolver {
    async fn solve(&self, image: &[u8]) -> String {
        String::from_utf8_lossy(image).into_owned()
    }
}

/// 识别时直接 panic
pub struct PanickingSolver;

#[async_trait]
impl CaptchaSolver for PanickingSolver {
    async fn solve(&self, _image: &[u8]) -> String {
        panic!("识别器崩溃")
    }
}

pub fn engine_with(sessions: Vec<Result<Vec<Step>, ()>>) -> (ScrapeEngine, Arc<PortalStats>) {
    engine_with_solver(sessions, Arc::new(EchoSolver))
}

pub fn engine_with_solver(
    sessions: Vec<Result<Vec<Step>, ()>>,
    solver: Arc<dyn CaptchaSolver>,
) -> (ScrapeEngine, Arc<PortalStats>) {
    let (portal, stats) = ScriptedPortal::new(sessions);
    let engine = ScrapeEngine::new(
        Arc::new(portal),
        solver,
        FieldExtractor::new(),
        EngineSettings {
            min_captcha_len: 3,
            retry_pause: Duration::ZERO,
        },
    );
    (engine, stats)
}

// ========== 进度记录 ==========

#[derive(Default)]
pub struct RecordingReporter {
    updates: Mutex<Vec<(String, TaskStatus)>>,
}

impl RecordingReporter {
    pub fn updates(&self) -> Vec<(String, TaskStatus)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn progress_points(&self) -> Vec<u8> {
        self.updates().iter().map(|(_, s)| s.progress).collect()
    }
}

#[async_trait]
impl ProgressReporter for RecordingReporter {
    async fn report(&self, job_id: &str, status: TaskStatus) {
        self.updates
            .lock()
            .unwrap()
            .push((job_id.to_string(), status));
    }
}
