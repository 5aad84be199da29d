//! Computer automation variant of the turn protocol
//!
//! The provider loops against a [`ComputerModel`]: the model proposes
//! items, device calls are executed on a [`Computer`], screenshots flow
//! back, and the loop ends when the model produces a plain assistant
//! message. Safety acknowledgements and the URL blocklist gate every
//! device call.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};

use super::actions::ComputerAction;
use super::safety::{UrlBlocklist, check_blocklisted_url};
use super::{AgentProvider, StepHandler, validate_turn_input};
use crate::conversation::{ConversationItem, Role};
use crate::prompt::system_prompt;
use crate::{Error, Result};

/// Callback asking the user to confirm a pending safety check.
///
/// Returns `true` to acknowledge. A `false` fails the turn.
pub type SafetyAckFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Which kind of machine a [`Computer`] presents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputerEnvironment {
    Browser,
    Mac,
    Windows,
    Linux,
}

impl ComputerEnvironment {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Browser => "browser",
            Self::Mac => "mac",
            Self::Windows => "windows",
            Self::Linux => "linux",
        }
    }
}

/// A device the provider can act on: screen, pointer, keyboard
#[async_trait]
pub trait Computer: Send + Sync {
    fn environment(&self) -> ComputerEnvironment;

    /// Screen size as (width, height)
    fn dimensions(&self) -> (u32, u32);

    /// Execute one low-level action
    async fn perform(&self, action: &ComputerAction) -> Result<()>;

    /// Base64-encoded PNG of the current screen
    async fn screenshot(&self) -> Result<String>;

    /// Displayed URL; only meaningful in the browser environment
    async fn current_url(&self) -> Result<String>;

    /// Release the device. Must be idempotent.
    async fn close(&mut self) -> Result<()>;
}

/// Lazily connects the provider to its computer on first use
#[async_trait]
pub trait ComputerConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Computer>>;
}

/// Tool advertisement sent to the planning model, built fresh per turn
/// so concurrent sessions never share mutable tool state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub display_width: u32,
    pub display_height: u32,
    pub environment: String,
}

impl ToolSpec {
    /// Advertise `computer` as a usable tool
    #[must_use]
    pub fn for_computer(computer: &dyn Computer) -> Self {
        let (display_width, display_height) = computer.dimensions();
        Self {
            kind: "computer-preview".to_string(),
            display_width,
            display_height,
            environment: computer.environment().as_str().to_string(),
        }
    }
}

/// Plans device actions from conversation context
#[async_trait]
pub trait ComputerModel: Send + Sync {
    /// Produce the next batch of items given the context so far
    async fn respond(
        &self,
        context: &[ConversationItem],
        tools: &[ToolSpec],
    ) -> Result<Vec<ConversationItem>>;
}

/// Turn protocol provider backed by a planning model and a computer
pub struct ComputerAutomationProvider {
    model: Box<dyn ComputerModel>,
    connector: Box<dyn ComputerConnector>,
    computer: Option<Box<dyn Computer>>,
    safety_ack: SafetyAckFn,
    blocklist: UrlBlocklist,
    navigated: bool,
    closed: bool,
}

impl ComputerAutomationProvider {
    #[must_use]
    pub fn new(
        model: Box<dyn ComputerModel>,
        connector: Box<dyn ComputerConnector>,
        safety_ack: SafetyAckFn,
        blocklist: UrlBlocklist,
    ) -> Self {
        Self {
            model,
            connector,
            computer: None,
            safety_ack,
            blocklist,
            navigated: false,
            closed: false,
        }
    }

    /// Execute whatever `item` asks for and return the bookkeeping items
    /// to append after it.
    async fn handle_item(
        &self,
        item: &ConversationItem,
        computer: &dyn Computer,
        on_step: &StepHandler,
    ) -> Result<Vec<ConversationItem>> {
        match item.role {
            // Forwarded immediately so "I will scroll down..." is heard
            // before the scroll, not after the turn.
            Role::Assistant => {
                on_step(&item.content.spoken_text());
                Ok(Vec::new())
            }
            Role::FunctionCall => self.handle_function_call(item, computer, on_step).await,
            Role::ComputerCall => self.handle_computer_call(item, computer, on_step).await,
            _ => Ok(Vec::new()),
        }
    }

    async fn handle_function_call(
        &self,
        item: &ConversationItem,
        computer: &dyn Computer,
        on_step: &StepHandler,
    ) -> Result<Vec<ConversationItem>> {
        let payload = item
            .content
            .as_value()
            .ok_or_else(|| Error::Agent("function call without a payload".to_string()))?;
        let name = payload
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Agent("function call without a name".to_string()))?;
        let call_id = payload
            .get("call_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        // Arguments arrive either inline or as a JSON-encoded string.
        let args = match payload.get("arguments") {
            Some(Value::String(raw)) if !raw.trim().is_empty() => serde_json::from_str(raw)?,
            Some(value) => value.clone(),
            None => Value::Null,
        };

        let action = ComputerAction::from_function(name, &args)?;
        on_step(&action.describe());
        computer.perform(&action).await?;

        Ok(vec![ConversationItem::structured(
            Role::FunctionCallOutput,
            json!({"call_id": call_id, "output": "success"}),
        )])
    }

    async fn handle_computer_call(
        &self,
        item: &ConversationItem,
        computer: &dyn Computer,
        on_step: &StepHandler,
    ) -> Result<Vec<ConversationItem>> {
        let payload = item
            .content
            .as_value()
            .ok_or_else(|| Error::Agent("computer call without a payload".to_string()))?;
        let call_id = payload
            .get("call_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let action_value = payload
            .get("action")
            .ok_or_else(|| Error::Agent("computer call without an action".to_string()))?;

        let action = ComputerAction::parse(action_value)?;
        on_step(&action.describe());
        computer.perform(&action).await?;

        // Pending safety checks must be acknowledged before the action's
        // result is accepted into the turn.
        for check in pending_safety_checks(payload) {
            if !(self.safety_ack)(&check) {
                tracing::warn!(%check, "safety check rejected by user");
                return Err(Error::SafetyCheckRejected(check));
            }
        }

        let screenshot = computer.screenshot().await?;
        let mut output = json!({
            "call_id": call_id,
            "output": {
                "type": "input_image",
                "image_url": format!("data:image/png;base64,{screenshot}"),
            },
        });

        if computer.environment() == ComputerEnvironment::Browser {
            let url = computer.current_url().await?;
            check_blocklisted_url(&url, &self.blocklist)?;
            output["output"]["current_url"] = Value::String(url);
        }

        Ok(vec![ConversationItem::structured(
            Role::ComputerCallOutput,
            output,
        )])
    }
}

/// Extract pending safety check messages from a computer call payload.
///
/// Checks arrive as strings or as objects carrying a `message` field.
fn pending_safety_checks(payload: &Value) -> Vec<String> {
    payload
        .get("pending_safety_checks")
        .and_then(Value::as_array)
        .map(|checks| {
            checks
                .iter()
                .filter_map(|check| match check {
                    Value::String(message) => Some(message.clone()),
                    other => other
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl AgentProvider for ComputerAutomationProvider {
    async fn run_full_turn(
        &mut self,
        items: &[ConversationItem],
        start_url: Option<&str>,
        on_step: &StepHandler,
    ) -> Result<Vec<ConversationItem>> {
        validate_turn_input(items)?;
        if self.closed {
            return Err(Error::Agent("provider is closed".to_string()));
        }

        if self.computer.is_none() {
            tracing::info!("connecting to computer");
            self.computer = Some(self.connector.connect().await?);
        }

        // Navigation is attempted exactly once per session, even if the
        // attempt itself fails.
        if !self.navigated {
            self.navigated = true;
            if let Some(url) = start_url {
                let computer = self.computer.as_deref().ok_or_else(|| {
                    Error::Agent("computer unavailable after connect".to_string())
                })?;
                computer
                    .perform(&ComputerAction::Goto {
                        url: url.to_string(),
                    })
                    .await?;
                if computer.environment() == ComputerEnvironment::Browser {
                    let current = computer.current_url().await?;
                    check_blocklisted_url(&current, &self.blocklist)?;
                }
            }
        }

        let computer = self
            .computer
            .as_deref()
            .ok_or_else(|| Error::Agent("computer unavailable after connect".to_string()))?;
        let tools = vec![ToolSpec::for_computer(computer)];

        let mut base = vec![ConversationItem::system(system_prompt())];
        base.extend_from_slice(items);

        let mut new_items: Vec<ConversationItem> = Vec::new();
        while new_items.last().map(|item| item.role) != Some(Role::Assistant) {
            let context: Vec<ConversationItem> =
                base.iter().chain(new_items.iter()).cloned().collect();

            let response = match self.model.respond(&context, &tools).await {
                Ok(response) => response,
                Err(e @ (Error::SafetyCheckRejected(_) | Error::BlockedUrl(_))) => return Err(e),
                Err(e) => {
                    tracing::error!(error = %e, "planning model failed; degrading to summary");
                    let summary = "I ran into a problem planning the next step and had to stop.";
                    on_step(summary);
                    new_items.push(ConversationItem::assistant(summary));
                    break;
                }
            };
            if response.is_empty() {
                let summary = "The planning model returned no output.";
                on_step(summary);
                new_items.push(ConversationItem::assistant(summary));
                break;
            }

            for item in response {
                let followups = self.handle_item(&item, computer, on_step).await?;
                new_items.push(item);
                new_items.extend(followups);
            }
        }

        Ok(new_items)
    }

    async fn close(&mut self) {
        if let Some(mut computer) = self.computer.take() {
            if let Err(e) = computer.close().await {
                tracing::warn!(error = %e, "computer close failed");
            }
        }
        self.closed = true;
    }
}
