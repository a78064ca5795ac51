//! Connection and playback session.
//!
//! One session per running client. All mutation goes through a
//! [`SessionController`]; observers read snapshots and listen on the event bus.

mod controller;
mod error;
mod state;

pub use controller::{Outcome, SessionController};
pub use error::{SessionError, SessionErrorKind, ERROR_EVENT_TYPE};
pub use state::{
    changed_fields, ConnectionPhase, PlaybackPhase, Session, SessionField, SessionId,
    MAX_VOLUME, NO_TRACK_PLACEHOLDER, UNKNOWN_SERVER_NAME,
};
