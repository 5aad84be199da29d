//! Shared test doubles for provider and voice integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use aria_agent::agent::{
    AutomationSession, BrowserEngine, Computer, ComputerAction, ComputerConnector,
    ComputerEnvironment, ComputerModel, StepHandler, TaskSpec, ToolSpec,
};
use aria_agent::voice::{PlaySink, PlaybackOutcome};
use aria_agent::speech::TtsProvider;
use aria_agent::{ConversationItem, Error, Result};

/// Scripted automation session that records every call
#[derive(Default)]
pub struct FakeSession {
    pub visited: Arc<Mutex<Vec<String>>>,
    pub closed: Arc<AtomicUsize>,
    pub current: Arc<Mutex<String>>,
}

impl FakeSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            visited: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicUsize::new(0)),
            current: Arc::new(Mutex::new("about:blank".to_string())),
        }
    }
}

#[async_trait]
impl AutomationSession for FakeSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.visited.lock().unwrap().push(url.to_string());
        *self.current.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String> {
        Ok(self.current.lock().unwrap().clone())
    }

    async fn describe(&mut self) -> Result<String> {
        Ok(format!(
            "The current page is {}.",
            self.current.lock().unwrap()
        ))
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Engine returning a fixed summary; optionally fails every task
pub struct FakeEngine {
    pub summary: String,
    pub fail_with: Mutex<Option<Error>>,
    pub steps: Vec<String>,
    pub opened: Arc<AtomicUsize>,
    pub session_visits: Arc<Mutex<Vec<String>>>,
    pub session_closes: Arc<AtomicUsize>,
    pub tasks: Arc<Mutex<Vec<String>>>,
}

impl FakeEngine {
    #[must_use]
    pub fn new(summary: &str) -> Self {
        Self {
            summary: summary.to_string(),
            fail_with: Mutex::new(None),
            steps: vec!["Step one".to_string(), "Step two".to_string()],
            opened: Arc::new(AtomicUsize::new(0)),
            session_visits: Arc::new(Mutex::new(Vec::new())),
            session_closes: Arc::new(AtomicUsize::new(0)),
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn failing(error: Error) -> Self {
        let engine = Self::new("unused");
        *engine.fail_with.lock().unwrap() = Some(error);
        engine
    }
}

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn open_session(&self) -> Result<Box<dyn AutomationSession>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        // Share the bookkeeping handles so tests can observe the session
        // the provider owns.
        Ok(Box::new(FakeSession {
            visited: Arc::clone(&self.session_visits),
            closed: Arc::clone(&self.session_closes),
            current: Arc::new(Mutex::new("about:blank".to_string())),
        }))
    }

    async fn run_task(
        &self,
        _session: &mut dyn AutomationSession,
        spec: TaskSpec<'_>,
        on_step: &StepHandler,
    ) -> Result<String> {
        if let Some(error) = self.fail_with.lock().unwrap().take() {
            return Err(error);
        }
        self.tasks.lock().unwrap().push(spec.task.to_string());
        for step in &self.steps {
            on_step(step);
        }
        Ok(self.summary.clone())
    }
}

/// In-memory computer that records performed actions
pub struct FakeComputer {
    pub actions: Arc<Mutex<Vec<ComputerAction>>>,
    pub url: Arc<Mutex<String>>,
    pub closed: Arc<AtomicUsize>,
}

impl FakeComputer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            actions: Arc::new(Mutex::new(Vec::new())),
            url: Arc::new(Mutex::new("about:blank".to_string())),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Default for FakeComputer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Computer for FakeComputer {
    fn environment(&self) -> ComputerEnvironment {
        ComputerEnvironment::Browser
    }

    fn dimensions(&self) -> (u32, u32) {
        (1280, 720)
    }

    async fn perform(&self, action: &ComputerAction) -> Result<()> {
        if let ComputerAction::Goto { url } = action {
            *self.url.lock().unwrap() = url.clone();
        }
        self.actions.lock().unwrap().push(action.clone());
        Ok(())
    }

    async fn screenshot(&self) -> Result<String> {
        Ok("ZmFrZQ==".to_string())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.url.lock().unwrap().clone())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector handing out computers that share the given bookkeeping
pub struct FakeConnector {
    pub actions: Arc<Mutex<Vec<ComputerAction>>>,
    pub url: Arc<Mutex<String>>,
    pub closed: Arc<AtomicUsize>,
    pub connects: Arc<AtomicUsize>,
}

impl FakeConnector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            actions: Arc::new(Mutex::new(Vec::new())),
            url: Arc::new(Mutex::new("about:blank".to_string())),
            closed: Arc::new(AtomicUsize::new(0)),
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Default for FakeConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComputerConnector for FakeConnector {
    async fn connect(&self) -> Result<Box<dyn Computer>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeComputer {
            actions: Arc::clone(&self.actions),
            url: Arc::clone(&self.url),
            closed: Arc::clone(&self.closed),
        }))
    }
}

/// Model that plays back pre-scripted responses, one per call
pub struct ScriptedModel {
    responses: Mutex<Vec<Vec<ConversationItem>>>,
}

impl ScriptedModel {
    #[must_use]
    pub fn new(responses: Vec<Vec<ConversationItem>>) -> Self {
        Self {
            responses: Mutex::new(responses),
        }
    }
}

#[async_trait]
impl ComputerModel for ScriptedModel {
    async fn respond(
        &self,
        _context: &[ConversationItem],
        _tools: &[ToolSpec],
    ) -> Result<Vec<ConversationItem>> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(Error::Agent("scripted model exhausted".to_string()));
        }
        Ok(responses.remove(0))
    }
}

/// TTS double that writes a tiny file and counts synthesis calls
pub struct CountingTts {
    pub calls: AtomicUsize,
    dir: PathBuf,
}

impl CountingTts {
    #[must_use]
    pub fn new(dir: &Path) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            dir: dir.to_path_buf(),
        }
    }
}

#[async_trait]
impl TtsProvider for CountingTts {
    async fn synthesize(&self, text: &str, output_path: Option<&Path>) -> Result<PathBuf> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let path = output_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.dir.join(format!("clip-{n}.wav")));
        std::fs::write(&path, text.as_bytes())?;
        Ok(path)
    }

    fn file_extension(&self) -> &'static str {
        ".wav"
    }
}

/// Playback double that records the paths it was asked to play
#[derive(Default)]
pub struct RecordingSink {
    pub played: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl PlaySink for RecordingSink {
    async fn play(&self, path: &Path) -> Result<PlaybackOutcome> {
        self.played.lock().unwrap().push(path.to_path_buf());
        Ok(PlaybackOutcome::Completed)
    }
}

/// Step handler capturing narrated lines in order
#[must_use]
pub fn step_recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Send + Sync) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    (lines, move |line: &str| {
        sink.lock().unwrap().push(line.to_string());
    })
}

/// Computer call payload in the wire shape planning models emit
#[must_use]
pub fn computer_call(call_id: &str, action: Value, checks: &[&str]) -> ConversationItem {
    ConversationItem::structured(
        aria_agent::Role::ComputerCall,
        serde_json::json!({
            "call_id": call_id,
            "action": action,
            "pending_safety_checks": checks,
        }),
    )
}
