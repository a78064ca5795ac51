//! The client-side session record.
//!
//! `Session` is plain data. It is only ever mutated inside the controller's
//! apply loop; everything else works on snapshots.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Title shown when the server reports a track without a name.
pub const NO_TRACK_PLACEHOLDER: &str = "No track";

/// Server name used when a remote connect arrives without one.
pub const UNKNOWN_SERVER_NAME: &str = "Unknown server";

/// Upper bound of the volume scale.
pub const MAX_VOLUME: u8 = 100;

/// Unique identifier for a running controller's session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Connection state of the session. Exactly one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Playback state. Only meaningful while connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackPhase {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl PlaybackPhase {
    /// The phase a play/pause toggle moves to.
    ///
    /// Stopped counts as "not paused", so toggling it pauses.
    pub fn toggled(self) -> Self {
        match self {
            PlaybackPhase::Paused => PlaybackPhase::Playing,
            PlaybackPhase::Playing | PlaybackPhase::Stopped => PlaybackPhase::Paused,
        }
    }

    /// Playing or Paused, from a remote "is paused" flag.
    pub fn from_paused(paused: bool) -> Self {
        if paused {
            PlaybackPhase::Paused
        } else {
            PlaybackPhase::Playing
        }
    }
}

/// Names of the observable fields, stored and derived.
///
/// Notifications are keyed by these names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionField {
    ConnectionPhase,
    ServerName,
    PlaybackPhase,
    TrackTitle,
    TrackArtist,
    Volume,
    SelectedOutputDevice,
    ConnectionStatusText,
    PlayPauseLabel,
    PlaybackStatusText,
}

impl SessionField {
    /// Every field, stored fields first.
    pub const ALL: [SessionField; 10] = [
        SessionField::ConnectionPhase,
        SessionField::ServerName,
        SessionField::PlaybackPhase,
        SessionField::TrackTitle,
        SessionField::TrackArtist,
        SessionField::Volume,
        SessionField::SelectedOutputDevice,
        SessionField::ConnectionStatusText,
        SessionField::PlayPauseLabel,
        SessionField::PlaybackStatusText,
    ];

    /// The camelCase name used in event types and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionField::ConnectionPhase => "connectionPhase",
            SessionField::ServerName => "serverName",
            SessionField::PlaybackPhase => "playbackPhase",
            SessionField::TrackTitle => "trackTitle",
            SessionField::TrackArtist => "trackArtist",
            SessionField::Volume => "volume",
            SessionField::SelectedOutputDevice => "selectedOutputDevice",
            SessionField::ConnectionStatusText => "connectionStatusText",
            SessionField::PlayPauseLabel => "playPauseLabel",
            SessionField::PlaybackStatusText => "playbackStatusText",
        }
    }

    /// Whether the field is recomputed from other fields rather than stored.
    pub fn is_derived(&self) -> bool {
        matches!(
            self,
            SessionField::ConnectionStatusText
                | SessionField::PlayPauseLabel
                | SessionField::PlaybackStatusText
        )
    }

    /// Event type used on the event bus for changes to this field.
    pub fn event_type(&self) -> String {
        format!("session:field:{}", self.as_str())
    }
}

impl std::fmt::Display for SessionField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection and playback state for one logical server relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub connection_phase: ConnectionPhase,

    /// Identity of the connected server. Empty unless connected.
    pub server_name: String,

    pub playback_phase: PlaybackPhase,

    pub track_title: String,
    pub track_artist: String,

    /// Output volume, 0..=100.
    pub volume: u8,

    /// Audio sink chosen by the user, if any.
    pub selected_output_device: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::with_volume(MAX_VOLUME)
    }
}

impl Session {
    /// A disconnected session starting at `volume` (clamped to 0..=100).
    pub fn with_volume(volume: u8) -> Self {
        Self {
            connection_phase: ConnectionPhase::Disconnected,
            server_name: String::new(),
            playback_phase: PlaybackPhase::Stopped,
            track_title: String::new(),
            track_artist: String::new(),
            volume: volume.min(MAX_VOLUME),
            selected_output_device: None,
        }
    }

    /// Whether the connection phase is Connected.
    pub fn is_connected(&self) -> bool {
        self.connection_phase == ConnectionPhase::Connected
    }

    /// Drop back to Disconnected and clear everything tied to the connection.
    ///
    /// Volume and output device are local preferences and survive.
    pub fn reset_connection(&mut self) {
        self.connection_phase = ConnectionPhase::Disconnected;
        self.server_name.clear();
        self.playback_phase = PlaybackPhase::Stopped;
        self.track_title.clear();
        self.track_artist.clear();
    }

    /// Set track metadata, substituting the placeholder for an empty title.
    pub fn set_track(&mut self, title: &str, artist: &str) {
        self.track_title = if title.is_empty() {
            NO_TRACK_PLACEHOLDER.to_string()
        } else {
            title.to_string()
        };
        self.track_artist = artist.to_string();
    }

    /// "Connecting…", "Connected to {server}" or "Disconnected".
    pub fn connection_status_text(&self) -> String {
        match self.connection_phase {
            ConnectionPhase::Connecting => "Connecting…".to_string(),
            ConnectionPhase::Connected => format!("Connected to {}", self.server_name),
            ConnectionPhase::Disconnected => "Disconnected".to_string(),
        }
    }

    /// Label for the play/pause button: "Play" while paused, "Pause" otherwise.
    pub fn play_pause_label(&self) -> &'static str {
        if self.playback_phase == PlaybackPhase::Paused {
            "Play"
        } else {
            "Pause"
        }
    }

    /// "Paused" while paused, "Playing" otherwise.
    pub fn playback_status_text(&self) -> &'static str {
        if self.playback_phase == PlaybackPhase::Paused {
            "Paused"
        } else {
            "Playing"
        }
    }

    /// Current JSON value of a field, derived fields included.
    pub fn field_value(&self, field: SessionField) -> Value {
        match field {
            SessionField::ConnectionPhase => json!(self.connection_phase),
            SessionField::ServerName => json!(self.server_name),
            SessionField::PlaybackPhase => json!(self.playback_phase),
            SessionField::TrackTitle => json!(self.track_title),
            SessionField::TrackArtist => json!(self.track_artist),
            SessionField::Volume => json!(self.volume),
            SessionField::SelectedOutputDevice => json!(self.selected_output_device),
            SessionField::ConnectionStatusText => json!(self.connection_status_text()),
            SessionField::PlayPauseLabel => json!(self.play_pause_label()),
            SessionField::PlaybackStatusText => json!(self.playback_status_text()),
        }
    }

    /// Check the cross-field rules that must hold after every operation.
    pub fn invariants_hold(&self) -> bool {
        self.is_connected()
            || (self.playback_phase == PlaybackPhase::Stopped
                && self.track_title.is_empty()
                && self.track_artist.is_empty()
                && self.server_name.is_empty())
    }
}

/// Fields whose value differs between two snapshots, paired with the new value.
///
/// Returned in `SessionField::ALL` order, stored fields before derived ones.
pub fn changed_fields(before: &Session, after: &Session) -> Vec<(SessionField, Value)> {
    SessionField::ALL
        .iter()
        .filter_map(|&field| {
            let new_value = after.field_value(field);
            (before.field_value(field) != new_value).then_some((field, new_value))
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
