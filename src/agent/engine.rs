//! Seams between the turn protocol and planning backends
//!
//! The browser variant delegates whole tasks to a [`BrowserEngine`]; the
//! computer variant asks a [`ComputerModel`] for one batch of items at a
//! time and executes them itself. Both ship with offline fallbacks so the
//! binary works without any planning backend configured.

use async_trait::async_trait;

use super::StepHandler;
use super::computer::{ComputerModel, ToolSpec};
use crate::config::BrowserConfig;
use crate::conversation::ConversationItem;
use crate::Result;

/// One task handed to a browser engine
#[derive(Debug, Clone, Copy)]
pub struct TaskSpec<'a> {
    /// The user's current instruction
    pub task: &'a str,
    /// Prior user/agent exchanges, pre-rendered as context
    pub context: Option<&'a str>,
}

/// A persistent automation target a provider drives across turns
#[async_trait]
pub trait AutomationSession: Send {
    /// Navigate to `url` and wait for the load to settle
    async fn goto(&mut self, url: &str) -> Result<()>;

    /// URL currently displayed
    async fn current_url(&mut self) -> Result<String>;

    /// One-sentence description of the current page, for narration
    async fn describe(&mut self) -> Result<String>;

    /// Tear the session down. Must be idempotent.
    async fn close(&mut self) -> Result<()>;
}

/// Plans and executes a whole task inside a session
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Open the session this engine will drive
    async fn open_session(&self) -> Result<Box<dyn AutomationSession>>;

    /// Run `spec` to completion, reporting progress through `on_step`,
    /// and return a user-facing summary.
    async fn run_task(
        &self,
        session: &mut dyn AutomationSession,
        spec: TaskSpec<'_>,
        on_step: &StepHandler,
    ) -> Result<String>;
}

/// Fallback engine used when no planning backend is configured.
///
/// It cannot act on the page; it opens a real session, reads where it is,
/// and says so.
pub struct PageReaderEngine {
    config: BrowserConfig,
}

impl PageReaderEngine {
    #[must_use]
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrowserEngine for PageReaderEngine {
    async fn open_session(&self) -> Result<Box<dyn AutomationSession>> {
        let session = super::session::ChromiumSession::launch(&self.config).await?;
        Ok(Box::new(session))
    }

    async fn run_task(
        &self,
        session: &mut dyn AutomationSession,
        spec: TaskSpec<'_>,
        on_step: &StepHandler,
    ) -> Result<String> {
        on_step("Reading the current page...");
        let description = session.describe().await?;
        Ok(format!(
            "No planning engine is configured, so I can only read where we are. \
             {description} You asked: \"{}\".",
            spec.task
        ))
    }
}

/// Fallback planning model used when the computer variant has no backend.
///
/// Responds with a single assistant item so the turn terminates cleanly.
pub struct UnconfiguredModel;

#[async_trait]
impl ComputerModel for UnconfiguredModel {
    async fn respond(
        &self,
        _context: &[ConversationItem],
        _tools: &[ToolSpec],
    ) -> Result<Vec<ConversationItem>> {
        Ok(vec![ConversationItem::assistant(
            "No planning model is configured, so I took no action on the screen.",
        )])
    }
}
