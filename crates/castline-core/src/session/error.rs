//! Recoverable failures absorbed by the controller.

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Event type used on the event bus for diagnostic error notifications.
pub const ERROR_EVENT_TYPE: &str = "session:error";

/// A failure in an external call, already recovered from locally.
///
/// These never escape as faults. The controller reflects them in state and
/// publishes them on the event bus.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A connect attempt failed; the session is back to Disconnected.
    #[error("Connection attempt failed: {0}")]
    TransientConnection(String),

    /// A teardown or playback-control call failed; local state advanced anyway.
    #[error("Best-effort call failed: {0}")]
    BestEffortTeardown(String),
}

/// Kind tag carried in error notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionErrorKind {
    TransientConnection,
    BestEffortTeardown,
}

impl SessionError {
    pub fn kind(&self) -> SessionErrorKind {
        match self {
            SessionError::TransientConnection(_) => SessionErrorKind::TransientConnection,
            SessionError::BestEffortTeardown(_) => SessionErrorKind::BestEffortTeardown,
        }
    }

    /// Payload published under [`ERROR_EVENT_TYPE`].
    pub fn to_payload(&self) -> Value {
        json!({
            "kind": self.kind(),
            "message": self.to_string(),
        })
    }
}
