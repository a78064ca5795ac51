//! The external collaborator that talks to the streaming server.
//!
//! The controller never touches the network itself. It calls a [`Transport`]
//! from a spawned task and applies the result back on its own loop.

mod simulated;

#[cfg(test)]
pub(crate) mod scripted;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use simulated::SimulatedTransport;

/// Identity reported by a server once a session is established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerIdentity {
    pub name: String,
}

impl ServerIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl std::fmt::Display for ServerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Server unreachable: {0}")]
    Unreachable(String),

    #[error("Server rejected the request: {0}")]
    Rejected(String),

    #[error("Timed out after {0:?}")]
    TimedOut(Duration),

    #[error("{0}")]
    Other(String),
}

/// Network/audio session management the controller depends on.
///
/// All calls may fail. `disconnect` and `set_playback_paused` are treated as
/// best-effort by the controller.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish a session and report who we connected to.
    async fn connect(&self) -> Result<ServerIdentity, TransportError>;

    /// Tear the session down.
    async fn disconnect(&self) -> Result<(), TransportError>;

    async fn set_playback_paused(&self, paused: bool) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_identity_displays_name() {
        assert_eq!(ServerIdentity::new("Studio").to_string(), "Studio");
    }

    #[test]
    fn timed_out_displays_duration() {
        let error = TransportError::TimedOut(Duration::from_millis(1500));
        assert_eq!(error.to_string(), "Timed out after 1.5s");
    }

    #[test]
    fn other_displays_message_verbatim() {
        let error = TransportError::Other("boom".to_string());
        assert_eq!(error.to_string(), "boom");
    }
}
