//! Agent turn protocol and its provider implementations
//!
//! Every provider speaks the same contract: take the conversation so far,
//! run one full agent turn, stream progress through a step handler, and
//! return the items to append to the history.

pub mod actions;
pub mod browser;
pub mod computer;
pub mod engine;
pub mod safety;
pub mod session;

pub use actions::{ComputerAction, PathPoint};
pub use browser::BrowserAutomationProvider;
pub use computer::{
    Computer, ComputerAutomationProvider, ComputerConnector, ComputerEnvironment, ComputerModel,
    SafetyAckFn, ToolSpec,
};
pub use engine::{AutomationSession, BrowserEngine, PageReaderEngine, TaskSpec, UnconfiguredModel};
pub use safety::{UrlBlocklist, check_blocklisted_url};
pub use session::{ChromiumConnector, ChromiumSession, find_chrome};

use async_trait::async_trait;

use crate::conversation::{ConversationItem, Role};
use crate::{Error, Result};

/// Progress callback invoked once per agent step, in order
pub type StepHandler = dyn Fn(&str) + Send + Sync;

/// One conversational agent backend
#[async_trait]
pub trait AgentProvider: Send {
    /// Run one full agent turn.
    ///
    /// `items` is the conversation so far, ending with the current user
    /// message. `start_url` is honored on the first turn of a session
    /// only. Every user-facing line — progress steps and assistant
    /// replies alike — is forwarded through `on_step` synchronously, in
    /// execution order. Returns the new items to append to the history;
    /// the last is the assistant's user-facing reply.
    ///
    /// # Errors
    ///
    /// `Error::InvalidTurnInput` when `items` breaks the protocol shape;
    /// `Error::SafetyCheckRejected` and `Error::BlockedUrl` when safety
    /// gates fire. Other backend failures degrade to a summary reply.
    async fn run_full_turn(
        &mut self,
        items: &[ConversationItem],
        start_url: Option<&str>,
        on_step: &StepHandler,
    ) -> Result<Vec<ConversationItem>>;

    /// Release the provider's resources. Idempotent; never fails.
    async fn close(&mut self);
}

/// Check the protocol shape of a turn's input and pull out the current
/// task text.
///
/// # Errors
///
/// Returns `Error::InvalidTurnInput` when `items` is empty, does not end
/// with a user item, or the user item carries no usable text.
pub fn validate_turn_input(items: &[ConversationItem]) -> Result<String> {
    let Some(last) = items.last() else {
        return Err(Error::InvalidTurnInput(
            "conversation items cannot be empty".to_string(),
        ));
    };
    if last.role != Role::User {
        return Err(Error::InvalidTurnInput(
            "the last conversation item must be a user message".to_string(),
        ));
    }
    let task = last.content.spoken_text().trim().to_string();
    if task.is_empty() {
        return Err(Error::InvalidTurnInput(
            "the current user message is empty".to_string(),
        ));
    }
    Ok(task)
}

/// Render prior user/agent exchanges as context for a task-level engine.
///
/// Pairs a user item with the assistant item that directly follows it;
/// unpaired items and the current (final) user message are skipped.
#[must_use]
pub fn history_context(items: &[ConversationItem]) -> Option<String> {
    let prior = items.get(..items.len().saturating_sub(1))?;
    let mut exchanges = Vec::new();
    let mut i = 0;
    while i < prior.len() {
        if prior[i].role == Role::User
            && prior.get(i + 1).map(|item| item.role) == Some(Role::Assistant)
        {
            exchanges.push(format!(
                "User: {}\nAgent: {}",
                prior[i].content.spoken_text(),
                prior[i + 1].content.spoken_text()
            ));
            i += 2;
        } else {
            i += 1;
        }
    }
    if exchanges.is_empty() {
        None
    } else {
        Some(exchanges.join("\n\n"))
    }
}

/// Everything a provider might need, so the factory can hand out either
/// variant by name.
pub struct ProviderDeps {
    pub browser_engine: Box<dyn BrowserEngine>,
    pub computer_model: Box<dyn ComputerModel>,
    pub computer_connector: Box<dyn ComputerConnector>,
    pub safety_ack: SafetyAckFn,
    pub blocklist: UrlBlocklist,
}

/// Build a provider by its user-facing name.
///
/// Accepts the aliases users actually type: `browser`/`browser-use` and
/// `computer`/`computer-use`/`cua`.
///
/// # Errors
///
/// Returns `Error::Config` for an unknown name.
pub fn provider_from_name(name: &str, deps: ProviderDeps) -> Result<Box<dyn AgentProvider>> {
    match name.trim().to_lowercase().replace('_', "-").as_str() {
        "browser" | "browser-use" => Ok(Box::new(BrowserAutomationProvider::new(
            deps.browser_engine,
            deps.blocklist,
        ))),
        "computer" | "computer-use" | "cua" => Ok(Box::new(ComputerAutomationProvider::new(
            deps.computer_model,
            deps.computer_connector,
            deps.safety_ack,
            deps.blocklist,
        ))),
        other => Err(Error::Config(format!(
            "unknown agent provider '{other}' (expected 'browser' or 'computer')"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_rejected() {
        let err = validate_turn_input(&[]).unwrap_err();
        assert!(matches!(err, Error::InvalidTurnInput(_)));
    }

    #[test]
    fn non_user_tail_is_rejected() {
        let items = vec![
            ConversationItem::user("hi"),
            ConversationItem::assistant("hello"),
        ];
        assert!(matches!(
            validate_turn_input(&items),
            Err(Error::InvalidTurnInput(_))
        ));
    }

    #[test]
    fn blank_user_message_is_rejected() {
        let items = vec![ConversationItem::user("   ")];
        assert!(matches!(
            validate_turn_input(&items),
            Err(Error::InvalidTurnInput(_))
        ));
    }

    #[test]
    fn valid_input_yields_the_task() {
        let items = vec![ConversationItem::user("  open the news  ")];
        assert_eq!(validate_turn_input(&items).unwrap(), "open the news");
    }

    #[test]
    fn history_context_pairs_exchanges() {
        let items = vec![
            ConversationItem::user("find cheap flights"),
            ConversationItem::assistant("Found three options."),
            ConversationItem::user("book the first one"),
        ];
        let context = history_context(&items).unwrap();
        assert_eq!(
            context,
            "User: find cheap flights\nAgent: Found three options."
        );
    }

    #[test]
    fn history_context_skips_unpaired_items() {
        let items = vec![
            ConversationItem::system("prompt"),
            ConversationItem::user("only turn"),
        ];
        assert!(history_context(&items).is_none());
    }
}
