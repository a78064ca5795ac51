//! # castline-core
//!
//! Core session logic for castline, a desktop client for streaming audio
//! servers.
//!
//! This crate is framework-agnostic and can be used by:
//! - a desktop UI (bind to the event bus, call controller operations)
//! - the headless daemon in `castline-daemon`
//!
//! ## Key Concepts
//!
//! - **Session**: connection and playback state for one server relationship
//! - **SessionController**: the only thing that mutates a Session; serializes
//!   every transition through one actor loop
//! - **Transport**: the network/audio collaborator the controller calls out to
//! - **EventBus**: field change and error notifications for observers

pub mod config;
pub mod event_bus;
pub mod logging;
pub mod paths;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use config::ControllerConfig;
pub use event_bus::EventBus;
pub use session::{Outcome, Session, SessionController, SessionField};
pub use transport::{SimulatedTransport, Transport};
