//! Browser automation variant of the turn protocol
//!
//! Whole tasks are delegated to a [`BrowserEngine`]; the provider owns the
//! session lifecycle, the one-time start navigation, and the degrade path
//! when the engine fails mid-task.

use async_trait::async_trait;

use super::engine::{AutomationSession, BrowserEngine, TaskSpec};
use super::safety::{UrlBlocklist, check_blocklisted_url};
use super::{AgentProvider, StepHandler, history_context, validate_turn_input};
use crate::conversation::ConversationItem;
use crate::{Error, Result};

/// Turn protocol provider backed by a task-level browser engine
pub struct BrowserAutomationProvider {
    engine: Box<dyn BrowserEngine>,
    session: Option<Box<dyn AutomationSession>>,
    blocklist: UrlBlocklist,
    navigated: bool,
    closed: bool,
}

impl BrowserAutomationProvider {
    #[must_use]
    pub fn new(engine: Box<dyn BrowserEngine>, blocklist: UrlBlocklist) -> Self {
        Self {
            engine,
            session: None,
            blocklist,
            navigated: false,
            closed: false,
        }
    }
}

#[async_trait]
impl AgentProvider for BrowserAutomationProvider {
    async fn run_full_turn(
        &mut self,
        items: &[ConversationItem],
        start_url: Option<&str>,
        on_step: &StepHandler,
    ) -> Result<Vec<ConversationItem>> {
        let task = validate_turn_input(items)?;
        if self.closed {
            return Err(Error::Agent("provider is closed".to_string()));
        }
        let context = history_context(items);

        // The session is opened lazily so a text-only chat never pays for
        // a browser launch.
        if self.session.is_none() {
            tracing::info!("opening browser session");
            self.session = Some(self.engine.open_session().await?);
        }
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| Error::Agent("session unavailable after open".to_string()))?;

        // Start navigation happens exactly once per session, even when the
        // attempt fails.
        if !self.navigated {
            self.navigated = true;
            if let Some(url) = start_url {
                on_step(&format!("Opening {url}"));
                session.goto(url).await?;
                let current = session.current_url().await?;
                check_blocklisted_url(&current, &self.blocklist)?;
            }
        }

        let spec = TaskSpec {
            task: &task,
            context: context.as_deref(),
        };
        let summary = match self.engine.run_task(session.as_mut(), spec, on_step).await {
            Ok(summary) => summary,
            // Safety and blocklist violations always surface.
            Err(e @ (Error::SafetyCheckRejected(_) | Error::BlockedUrl(_))) => return Err(e),
            Err(e) => {
                tracing::error!(error = %e, "browser engine failed; degrading to summary");
                format!("The task did not complete cleanly: {e}")
            }
        };

        on_step(&summary);
        Ok(vec![ConversationItem::assistant(summary)])
    }

    async fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close().await {
                tracing::warn!(error = %e, "session close failed");
            }
        }
        self.closed = true;
    }
}
