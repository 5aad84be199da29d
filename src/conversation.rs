//! Conversation history and the interactive session loop
//!
//! Turns are driven through an [`AgentProvider`]: the loop collects input
//! (voice or typed), appends it to the running history, hands the whole
//! history to the provider, and narrates whatever comes back.

use std::io::BufRead;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::agent::AgentProvider;
use crate::voice::{Narrator, PushToTalk};
use crate::{Error, Result};

/// Spoken when a voice session starts
const GREETING: &str = "Hold space to talk, release to send. Press escape to cancel.";
/// Spoken before each listening window
const WAITING_PROMPT: &str = "Waiting for input...";
/// Spoken when voice capture fails and the loop keeps going
const CAPTURE_TROUBLE: &str = "Sorry, I couldn't make that out. Please try again.";

/// Who produced a conversation item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Planning-backend function call awaiting execution
    FunctionCall,
    /// Result of an executed function call
    FunctionCallOutput,
    /// Planning-backend device action awaiting execution
    ComputerCall,
    /// Screenshot/result of an executed device action
    ComputerCallOutput,
}

/// Item payload: plain text for human-facing messages, structured JSON
/// for tool traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemContent {
    Text(String),
    Structured(Value),
}

impl ItemContent {
    /// Flatten the content to something a narrator can speak.
    ///
    /// Structured assistant output arrives as arrays of `{text: ...}`
    /// fragments; those are joined with spaces. Anything else falls back
    /// to its JSON rendering.
    #[must_use]
    pub fn spoken_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(Value::String(text)) => text.clone(),
            Self::Structured(Value::Array(parts)) => parts
                .iter()
                .map(|part| match part {
                    Value::String(text) => text.clone(),
                    other => other
                        .get("text")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| other.to_string()),
                })
                .collect::<Vec<_>>()
                .join(" "),
            Self::Structured(other) => other.to_string(),
        }
    }

    /// Structured payload, if any
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Text(_) => None,
            Self::Structured(value) => Some(value),
        }
    }
}

/// One entry in the conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    pub role: Role,
    pub content: ItemContent,
}

impl ConversationItem {
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: ItemContent::Text(text.into()),
        }
    }

    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: ItemContent::Text(text.into()),
        }
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: ItemContent::Text(text.into()),
        }
    }

    /// Tool-traffic item carrying a structured payload
    #[must_use]
    pub fn structured(role: Role, value: Value) -> Self {
        Self {
            role,
            content: ItemContent::Structured(value),
        }
    }

    /// Plain text content, when the item is not structured
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            ItemContent::Text(text) => Some(text.as_str()),
            ItemContent::Structured(_) => None,
        }
    }
}

/// Voice endpoints for a spoken session
pub struct VoiceIo {
    pub capture: PushToTalk,
    pub narrator: Arc<Narrator>,
}

/// The interactive session: input, agent turn, narrated output, repeat
pub struct ConversationLoop {
    provider: Box<dyn AgentProvider>,
    voice: Option<VoiceIo>,
    start_url: Option<String>,
    debug: bool,
    history: Vec<ConversationItem>,
}

impl ConversationLoop {
    #[must_use]
    pub fn new(
        provider: Box<dyn AgentProvider>,
        voice: Option<VoiceIo>,
        start_url: Option<String>,
        debug: bool,
    ) -> Self {
        Self {
            provider,
            voice,
            start_url,
            debug,
            history: Vec::new(),
        }
    }

    /// Run until the user exits or input ends.
    ///
    /// The provider is closed on every path out of the loop, including
    /// errors.
    ///
    /// # Errors
    ///
    /// Propagates turn failures only in debug mode; otherwise failures are
    /// reported to the user and the loop continues.
    pub async fn run(mut self) -> Result<()> {
        self.announce_ready().await;
        let outcome = self.drive().await;
        self.provider.close().await;
        outcome
    }

    async fn drive(&mut self) -> Result<()> {
        loop {
            let Some(input) = self.next_input().await? else {
                tracing::info!("input stream ended");
                return Ok(());
            };
            let input = input.trim().to_string();
            if input.is_empty() {
                continue;
            }
            if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
                self.say("Goodbye.").await;
                return Ok(());
            }

            tracing::info!(%input, "starting agent turn");
            self.history.push(ConversationItem::user(&input));
            if let Err(e) = self.turn().await {
                if self.debug {
                    return Err(e);
                }
                tracing::error!(error = %e, "agent turn failed");
                self.say(&format!("Something went wrong: {e}")).await;
            }
        }
    }

    /// One agent turn over the current history.
    ///
    /// Step narration is funneled through a channel so the (synchronous)
    /// step handler never blocks on audio; the narration task is drained
    /// before the next listening window opens. Providers forward every
    /// user-facing line (steps and assistant replies) through the handler
    /// in execution order.
    async fn turn(&mut self) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let narration = self.voice.as_ref().map(|voice| {
            let narrator = Arc::clone(&voice.narrator);
            tokio::spawn(async move {
                while let Some(line) = rx.recv().await {
                    if let Err(e) = narrator.speak(&line, false).await {
                        tracing::warn!(error = %e, "step narration failed");
                    }
                }
            })
        });
        let on_step = move |line: &str| {
            println!("{line}");
            let _ = tx.send(line.to_string());
        };

        let result = self
            .provider
            .run_full_turn(&self.history, self.start_url.as_deref(), &on_step)
            .await;

        let new_items = match result {
            Ok(items) => items,
            Err(e) => {
                drop(on_step);
                if let Some(task) = narration {
                    let _ = task.await;
                }
                return Err(e);
            }
        };

        // Every user-facing line, including the final assistant reply,
        // already flowed through the step handler in execution order;
        // nothing is re-narrated here.
        self.history.extend(new_items);

        drop(on_step);
        if let Some(task) = narration {
            let _ = task.await;
        }
        Ok(())
    }

    /// Next user utterance, or `None` when typed input hits end-of-stream.
    ///
    /// Voice capture failures degrade: the user is told, and an empty
    /// string comes back so the loop just listens again.
    async fn next_input(&self) -> Result<Option<String>> {
        let Some(voice) = &self.voice else {
            return read_typed_line().await;
        };

        if let Err(e) = voice.narrator.speak(WAITING_PROMPT, true).await {
            tracing::warn!(error = %e, "waiting prompt narration failed");
        }
        match voice.capture.capture().await {
            Ok(text) => Ok(Some(text)),
            Err(e) if self.debug => Err(e),
            Err(e) => {
                tracing::error!(error = %e, "voice capture failed");
                self.say(CAPTURE_TROUBLE).await;
                Ok(Some(String::new()))
            }
        }
    }

    async fn announce_ready(&self) {
        if self.voice.is_some() {
            println!("{GREETING}");
            self.say(GREETING).await;
        } else {
            println!("Type your instructions ('exit' to quit):");
        }
    }

    /// Best-effort narration; never fails the loop
    async fn say(&self, text: &str) {
        if let Some(voice) = &self.voice {
            if let Err(e) = voice.narrator.speak(text, true).await {
                tracing::warn!(error = %e, "narration failed");
            }
        }
    }
}

/// Read one line from stdin without blocking the runtime
async fn read_typed_line() -> Result<Option<String>> {
    print!("> ");
    use std::io::Write;
    std::io::stdout().flush()?;
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(line)),
            Err(e) => Err(Error::Io(e)),
        }
    })
    .await
    .map_err(|e| Error::Agent(format!("stdin reader task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn spoken_text_joins_structured_fragments() {
        let item = ConversationItem::structured(
            Role::Assistant,
            json!([{"type": "output_text", "text": "Hello"}, {"text": "world"}]),
        );
        assert_eq!(item.content.spoken_text(), "Hello world");
    }

    #[test]
    fn spoken_text_passes_plain_text_through() {
        assert_eq!(
            ConversationItem::assistant("All done.").content.spoken_text(),
            "All done."
        );
    }

    #[test]
    fn roles_serialize_snake_case() {
        let item = ConversationItem::structured(Role::ComputerCallOutput, json!({"call_id": "c1"}));
        let wire = serde_json::to_value(&item).unwrap();
        assert_eq!(wire["role"], "computer_call_output");
        assert_eq!(wire["content"]["call_id"], "c1");
    }

    #[test]
    fn text_is_none_for_structured_content() {
        let item = ConversationItem::structured(Role::FunctionCall, json!({"name": "back"}));
        assert!(item.text().is_none());
        assert!(item.content.as_value().is_some());
    }
}
