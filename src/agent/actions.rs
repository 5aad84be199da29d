//! Typed low-level device actions for the computer automation variant
//!
//! Planning backends emit actions as tagged JSON objects; everything is
//! parsed into [`ComputerAction`] before it touches a device. An unknown or
//! malformed action is a checked error, never a silent no-op.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// A point on a drag path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathPoint {
    pub x: i64,
    pub y: i64,
}

/// One low-level action against a [`Computer`](super::Computer).
///
/// The wire shape is a JSON object tagged by `type`, e.g.
/// `{"type": "click", "x": 120, "y": 80, "button": "left"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComputerAction {
    Click {
        x: i64,
        y: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        button: Option<String>,
    },
    DoubleClick {
        x: i64,
        y: i64,
    },
    Move {
        x: i64,
        y: i64,
    },
    Drag {
        path: Vec<PathPoint>,
    },
    Scroll {
        x: i64,
        y: i64,
        #[serde(default)]
        scroll_x: i64,
        #[serde(default)]
        scroll_y: i64,
    },
    Type {
        text: String,
    },
    Keypress {
        keys: Vec<String>,
    },
    Wait {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ms: Option<u64>,
    },
    Screenshot,
    Goto {
        url: String,
    },
    Back,
}

impl ComputerAction {
    /// Parse an action object emitted by a planning backend.
    ///
    /// # Errors
    ///
    /// Returns `Error::Agent` naming the offending `type` when the object
    /// is not a recognized action.
    pub fn parse(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(|e| {
            let kind = value
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("<missing type>");
            Error::Agent(format!("unknown or malformed computer action '{kind}': {e}"))
        })
    }

    /// Build an action from a function-call style `name` plus argument
    /// object, the other shape planning backends use.
    ///
    /// # Errors
    ///
    /// Returns `Error::Agent` when the name or arguments don't form a
    /// recognized action.
    pub fn from_function(name: &str, args: &Value) -> Result<Self> {
        let mut object = match args {
            Value::Object(map) => map.clone(),
            Value::Null => serde_json::Map::new(),
            other => {
                return Err(Error::Agent(format!(
                    "arguments for action '{name}' must be an object, got {other}"
                )));
            }
        };
        object.insert("type".to_string(), Value::String(name.to_string()));
        Self::parse(&Value::Object(object))
    }

    /// Wire tag of this action
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Click { .. } => "click",
            Self::DoubleClick { .. } => "double_click",
            Self::Move { .. } => "move",
            Self::Drag { .. } => "drag",
            Self::Scroll { .. } => "scroll",
            Self::Type { .. } => "type",
            Self::Keypress { .. } => "keypress",
            Self::Wait { .. } => "wait",
            Self::Screenshot => "screenshot",
            Self::Goto { .. } => "goto",
            Self::Back => "back",
        }
    }

    /// Short human-readable form for step narration
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Click { x, y, .. } => format!("click({x}, {y})"),
            Self::DoubleClick { x, y } => format!("double_click({x}, {y})"),
            Self::Move { x, y } => format!("move({x}, {y})"),
            Self::Drag { path } => format!("drag({} points)", path.len()),
            Self::Scroll {
                x, y, scroll_x, scroll_y,
            } => format!("scroll({x}, {y}, by {scroll_x},{scroll_y})"),
            Self::Type { text } => format!("type({} chars)", text.chars().count()),
            Self::Keypress { keys } => format!("keypress({})", keys.join("+")),
            Self::Wait { ms } => format!("wait({}ms)", ms.unwrap_or(1000)),
            Self::Screenshot => "screenshot()".to_string(),
            Self::Goto { url } => format!("goto({url})"),
            Self::Back => "back()".to_string(),
        }
    }
}
