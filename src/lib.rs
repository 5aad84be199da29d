//! Aria - Voice-driven accessibility agent
//!
//! This library provides the core functionality for the aria agent:
//! - Push-to-talk voice capture and interruptible playback
//! - STT/TTS speech provider abstraction with a content-addressed TTS cache
//! - Agent provider turn protocol (browser and desktop automation variants)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                Conversation loop                     │
//! │   push-to-talk  │  stdin  │  narration (TTS cache)  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                Agent provider                        │
//! │   browser variant  │  computer variant  │  close()  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │      Automation engine (external collaborator)       │
//! │   task + context + step callback  →  summary         │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod config;
pub mod conversation;
pub mod error;
pub mod prompt;
pub mod speech;
pub mod voice;

pub use config::Config;
pub use conversation::{ConversationItem, ItemContent, Role};
pub use error::{Error, Result};
