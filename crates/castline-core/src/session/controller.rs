//! SessionController - the single apply context for session state.
//!
//! A controller is a cheap cloneable handle to an actor task that owns the
//! [`Session`]. Every operation is a message in the actor's mailbox, so no two
//! transitions ever interleave their writes. Transport calls run in their own
//! tasks and hand their results back through the same mailbox before any
//! field is touched.
//!
//! Every connection phase change bumps an epoch counter. Results from
//! transport calls started under an older epoch are discarded rather than
//! applied, so a late reply can't resurrect a connection that was torn down
//! while it was in flight.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use super::error::{SessionError, ERROR_EVENT_TYPE};
use super::state::{
    changed_fields, ConnectionPhase, PlaybackPhase, Session, SessionField, SessionId, MAX_VOLUME,
    UNKNOWN_SERVER_NAME,
};
use crate::config::ControllerConfig;
use crate::event_bus::{BroadcastEvent, EventBus, FilteredReceiver};
use crate::logging::Transcript;
use crate::transport::{ServerIdentity, Transport, TransportError};

/// How an operation settled.
///
/// Failures of external calls are absorbed: they show up here and on the
/// event bus, never as an `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The operation ran and the session reflects it.
    Applied,

    /// Preconditions weren't met, the result was stale, or nothing changed.
    Ignored,

    /// An external call failed and the session was recovered locally.
    Recovered(SessionError),
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Applied => f.write_str("applied"),
            Outcome::Ignored => f.write_str("ignored"),
            Outcome::Recovered(e) => write!(f, "recovered ({})", e),
        }
    }
}

type Reply = oneshot::Sender<Outcome>;

enum Command {
    Connect {
        reply: Reply,
    },
    ConnectFinished {
        attempt: u64,
        result: Result<ServerIdentity, TransportError>,
        reply: Reply,
    },
    Disconnect {
        reply: Reply,
    },
    DisconnectFinished {
        epoch: u64,
        result: Result<(), TransportError>,
        reply: Reply,
    },
    TogglePlayPause {
        reply: Reply,
    },
    ToggleFinished {
        epoch: u64,
        target: PlaybackPhase,
        result: Result<(), TransportError>,
        reply: Reply,
    },
    TrackUpdate {
        title: String,
        artist: String,
        reply: Reply,
    },
    ConnectionUpdate {
        connected: bool,
        server_name: Option<String>,
        reply: Reply,
    },
    PlaybackUpdate {
        paused: bool,
        reply: Reply,
    },
    SetVolume {
        volume: u8,
        reply: Reply,
    },
    SelectOutputDevice {
        device: Option<String>,
        reply: Reply,
    },
    Shutdown,
}

/// Handle to a running session actor.
#[derive(Clone)]
pub struct SessionController {
    id: SessionId,
    mailbox: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<Session>,
    event_bus: Arc<EventBus>,
}

impl SessionController {
    /// Start a controller with its own event bus.
    ///
    /// Must be called within a Tokio runtime.
    pub fn spawn(transport: Arc<dyn Transport>, config: ControllerConfig) -> Self {
        let event_bus = Arc::new(EventBus::with_capacity(config.event_capacity));
        Self::spawn_with_event_bus(transport, config, event_bus)
    }

    /// Start a controller publishing onto an existing event bus.
    pub fn spawn_with_event_bus(
        transport: Arc<dyn Transport>,
        config: ControllerConfig,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let id = SessionId::new();
        let session = Session::with_volume(config.initial_volume);
        let (state_tx, state_rx) = watch::channel(session.clone());
        let (mailbox, inbox) = mpsc::unbounded_channel();
        let transcript = Transcript::open(config.log_dir.as_deref(), &id.0);

        let actor = SessionActor {
            id: id.clone(),
            session,
            state_tx,
            event_bus: Arc::clone(&event_bus),
            transport,
            transcript,
            config,
            mailbox: mailbox.downgrade(),
            epoch: 0,
            teardown_epoch: None,
            control_in_flight: false,
            queued_toggles: VecDeque::new(),
        };
        tokio::spawn(actor.run(inbox));

        Self {
            id,
            mailbox,
            state: state_rx,
            event_bus,
        }
    }

    /// Identifier of this session; also names its transcript file.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Snapshot of the current session.
    pub fn state(&self) -> Session {
        self.state.borrow().clone()
    }

    /// A receiver that observes every state change.
    pub fn watch(&self) -> watch::Receiver<Session> {
        self.state.clone()
    }

    /// The bus this controller publishes on.
    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    /// All notifications: field changes and errors.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.event_bus.subscribe()
    }

    /// Change notifications for one field.
    pub fn subscribe_field(&self, field: SessionField) -> FilteredReceiver {
        self.event_bus.subscribe_to(field.event_type())
    }

    /// Diagnostic notifications for absorbed failures.
    pub fn subscribe_errors(&self) -> FilteredReceiver {
        self.event_bus.subscribe_to(ERROR_EVENT_TYPE)
    }

    /// Connect if disconnected. Resolves once the attempt has settled.
    pub async fn connect(&self) -> Outcome {
        self.request(|reply| Command::Connect { reply }).await
    }

    /// Disconnect if connected. The local reset happens even if teardown fails.
    pub async fn disconnect(&self) -> Outcome {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    /// Flip between playing and paused while connected.
    pub async fn toggle_play_pause(&self) -> Outcome {
        self.request(|reply| Command::TogglePlayPause { reply }).await
    }

    /// Inbound track metadata from the server. An empty title shows the placeholder.
    pub async fn receive_track_update(
        &self,
        title: impl Into<String>,
        artist: impl Into<String>,
    ) -> Outcome {
        let (title, artist) = (title.into(), artist.into());
        self.request(|reply| Command::TrackUpdate {
            title,
            artist,
            reply,
        })
        .await
    }

    /// Inbound connection state from the server or session layer.
    pub async fn receive_connection_update(
        &self,
        connected: bool,
        server_name: Option<String>,
    ) -> Outcome {
        self.request(|reply| Command::ConnectionUpdate {
            connected,
            server_name,
            reply,
        })
        .await
    }

    /// Inbound playback state, e.g. another client paused the stream.
    pub async fn receive_playback_update(&self, paused: bool) -> Outcome {
        self.request(|reply| Command::PlaybackUpdate { paused, reply })
            .await
    }

    /// Set the output volume, clamped to 0..=100.
    pub async fn set_volume(&self, volume: u8) -> Outcome {
        self.request(|reply| Command::SetVolume { volume, reply })
            .await
    }

    /// Choose an audio sink, or `None` for the system default.
    pub async fn select_output_device(&self, device: Option<String>) -> Outcome {
        self.request(|reply| Command::SelectOutputDevice { device, reply })
            .await
    }

    /// Stop the actor. Later operations resolve as `Ignored`.
    pub fn shutdown(&self) {
        let _ = self.mailbox.send(Command::Shutdown);
    }

    async fn request(&self, build: impl FnOnce(Reply) -> Command) -> Outcome {
        let (reply, response) = oneshot::channel();
        if self.mailbox.send(build(reply)).is_err() {
            log::warn!("Session {} controller is no longer running", self.id);
            return Outcome::Ignored;
        }
        response.await.unwrap_or(Outcome::Ignored)
    }
}

struct SessionActor {
    id: SessionId,
    session: Session,
    state_tx: watch::Sender<Session>,
    event_bus: Arc<EventBus>,
    transport: Arc<dyn Transport>,
    transcript: Transcript,
    config: ControllerConfig,
    mailbox: mpsc::WeakUnboundedSender<Command>,

    /// Bumped on every connection phase change.
    epoch: u64,

    /// Epoch of the connection whose teardown is in flight.
    teardown_epoch: Option<u64>,

    control_in_flight: bool,
    queued_toggles: VecDeque<Reply>,
}

impl SessionActor {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Command>) {
        log::info!("Session {} started", self.id);

        while let Some(command) = inbox.recv().await {
            match command {
                Command::Connect { reply } => self.connect(reply),
                Command::ConnectFinished {
                    attempt,
                    result,
                    reply,
                } => self.finish_connect(attempt, result, reply),
                Command::Disconnect { reply } => self.disconnect(reply),
                Command::DisconnectFinished {
                    epoch,
                    result,
                    reply,
                } => self.finish_disconnect(epoch, result, reply),
                Command::TogglePlayPause { reply } => {
                    if self.control_in_flight {
                        self.queued_toggles.push_back(reply);
                    } else {
                        self.start_toggle(reply);
                    }
                }
                Command::ToggleFinished {
                    epoch,
                    target,
                    result,
                    reply,
                } => self.finish_toggle(epoch, target, result, reply),
                Command::TrackUpdate {
                    title,
                    artist,
                    reply,
                } => {
                    let outcome = if self.session.is_connected() {
                        self.apply_outcome(|s| s.set_track(&title, &artist))
                    } else {
                        log::debug!("Dropping track update while not connected");
                        Outcome::Ignored
                    };
                    let _ = reply.send(outcome);
                }
                Command::ConnectionUpdate {
                    connected,
                    server_name,
                    reply,
                } => {
                    let outcome = self.connection_update(connected, server_name);
                    let _ = reply.send(outcome);
                }
                Command::PlaybackUpdate { paused, reply } => {
                    let outcome = if self.session.is_connected() {
                        self.apply_outcome(|s| s.playback_phase = PlaybackPhase::from_paused(paused))
                    } else {
                        log::debug!("Dropping playback update while not connected");
                        Outcome::Ignored
                    };
                    let _ = reply.send(outcome);
                }
                Command::SetVolume { volume, reply } => {
                    let outcome = self.apply_outcome(|s| s.volume = volume.min(MAX_VOLUME));
                    let _ = reply.send(outcome);
                }
                Command::SelectOutputDevice { device, reply } => {
                    let device = device.filter(|d| !d.is_empty());
                    let outcome = self.apply_outcome(|s| s.selected_output_device = device);
                    let _ = reply.send(outcome);
                }
                Command::Shutdown => break,
            }
        }

        log::info!("Session {} stopped", self.id);
    }

    fn connect(&mut self, reply: Reply) {
        if self.session.connection_phase != ConnectionPhase::Disconnected {
            log::debug!(
                "Ignoring connect while {:?}",
                self.session.connection_phase
            );
            let _ = reply.send(Outcome::Ignored);
            return;
        }

        self.apply(|s| s.connection_phase = ConnectionPhase::Connecting);
        let attempt = self.epoch;
        log::info!("Connecting (attempt {})", attempt);

        let transport = Arc::clone(&self.transport);
        self.call_transport(
            "connect",
            self.config.connect_timeout(),
            async move { transport.connect().await },
            move |result| Command::ConnectFinished {
                attempt,
                result,
                reply,
            },
        );
    }

    fn finish_connect(
        &mut self,
        attempt: u64,
        result: Result<ServerIdentity, TransportError>,
        reply: Reply,
    ) {
        if attempt != self.epoch || self.session.connection_phase != ConnectionPhase::Connecting {
            log::debug!("Discarding stale connect result for attempt {}", attempt);
            let _ = reply.send(Outcome::Ignored);
            return;
        }

        let outcome = match result {
            Ok(identity) => {
                log::info!("Connected to {}", identity);
                self.apply(move |s| {
                    s.connection_phase = ConnectionPhase::Connected;
                    s.server_name = identity.name;
                    s.playback_phase = PlaybackPhase::Paused;
                });
                Outcome::Applied
            }
            Err(e) => {
                log::warn!("Connect failed: {}", e);
                self.apply(Session::reset_connection);
                let error = SessionError::TransientConnection(e.to_string());
                self.publish_error(&error);
                Outcome::Recovered(error)
            }
        };
        let _ = reply.send(outcome);
    }

    fn disconnect(&mut self, reply: Reply) {
        if !self.session.is_connected() || self.teardown_epoch == Some(self.epoch) {
            log::debug!("Ignoring disconnect while {:?}", self.session.connection_phase);
            let _ = reply.send(Outcome::Ignored);
            return;
        }

        let epoch = self.epoch;
        self.teardown_epoch = Some(epoch);
        log::info!("Disconnecting from {}", self.session.server_name);

        let transport = Arc::clone(&self.transport);
        self.call_transport(
            "disconnect",
            self.config.teardown_timeout(),
            async move { transport.disconnect().await },
            move |result| Command::DisconnectFinished {
                epoch,
                result,
                reply,
            },
        );
    }

    fn finish_disconnect(&mut self, epoch: u64, result: Result<(), TransportError>, reply: Reply) {
        if self.teardown_epoch == Some(epoch) {
            self.teardown_epoch = None;
        }

        if epoch != self.epoch {
            if let Err(e) = result {
                log::debug!("Teardown of a stale connection failed: {}", e);
            }
            let _ = reply.send(Outcome::Ignored);
            return;
        }

        let error = result.err().map(|e| {
            log::warn!("Teardown failed, disconnecting locally anyway: {}", e);
            SessionError::BestEffortTeardown(e.to_string())
        });
        self.apply(Session::reset_connection);

        let outcome = match error {
            Some(error) => {
                self.publish_error(&error);
                Outcome::Recovered(error)
            }
            None => Outcome::Applied,
        };
        let _ = reply.send(outcome);
    }

    fn start_toggle(&mut self, reply: Reply) {
        if !self.session.is_connected() {
            let _ = reply.send(Outcome::Ignored);
            return;
        }

        let target = self.session.playback_phase.toggled();
        let paused = target == PlaybackPhase::Paused;
        let epoch = self.epoch;
        self.control_in_flight = true;

        let transport = Arc::clone(&self.transport);
        self.call_transport(
            "set_playback_paused",
            self.config.control_timeout(),
            async move { transport.set_playback_paused(paused).await },
            move |result| Command::ToggleFinished {
                epoch,
                target,
                result,
                reply,
            },
        );
    }

    fn finish_toggle(
        &mut self,
        epoch: u64,
        target: PlaybackPhase,
        result: Result<(), TransportError>,
        reply: Reply,
    ) {
        self.control_in_flight = false;

        let outcome = if epoch != self.epoch || !self.session.is_connected() {
            log::debug!("Discarding playback flip for a connection that ended");
            Outcome::Ignored
        } else {
            let error = result.err().map(|e| {
                log::warn!("Playback control failed, flipping locally anyway: {}", e);
                SessionError::BestEffortTeardown(e.to_string())
            });
            self.apply(|s| s.playback_phase = target);
            match error {
                Some(error) => {
                    self.publish_error(&error);
                    Outcome::Recovered(error)
                }
                None => Outcome::Applied,
            }
        };
        let _ = reply.send(outcome);

        while !self.control_in_flight {
            let Some(next) = self.queued_toggles.pop_front() else {
                break;
            };
            self.start_toggle(next);
        }
    }

    fn connection_update(&mut self, connected: bool, server_name: Option<String>) -> Outcome {
        if !connected {
            return self.apply_outcome(Session::reset_connection);
        }

        self.apply_outcome(|s| {
            s.connection_phase = ConnectionPhase::Connected;
            match server_name.filter(|name| !name.is_empty()) {
                Some(name) => s.server_name = name,
                None if s.server_name.is_empty() => {
                    s.server_name = UNKNOWN_SERVER_NAME.to_string();
                }
                None => {}
            }
            if s.playback_phase == PlaybackPhase::Stopped {
                s.playback_phase = PlaybackPhase::Paused;
            }
        })
    }

    /// Run a transport call off the apply loop and post its result back.
    fn call_transport<T, F>(
        &self,
        operation: &'static str,
        timeout: Duration,
        call: F,
        finish: impl FnOnce(Result<T, TransportError>) -> Command + Send + 'static,
    ) where
        T: Debug + Send + 'static,
        F: Future<Output = Result<T, TransportError>> + Send + 'static,
    {
        let mailbox = self.mailbox.clone();
        let transcript = self.transcript.clone();

        tokio::spawn(async move {
            transcript.request(operation);
            // Inner task so a panicking transport surfaces as a JoinError.
            let mut call = tokio::spawn(call);
            let result = match tokio::time::timeout(timeout, &mut call).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    log::error!("Transport {} task failed: {}", operation, e);
                    Err(TransportError::Other(format!("transport task panicked: {}", e)))
                }
                Err(_) => {
                    call.abort();
                    Err(TransportError::TimedOut(timeout))
                }
            };
            transcript.response(operation, &result);

            match mailbox.upgrade() {
                Some(mailbox) => {
                    let _ = mailbox.send(finish(result));
                }
                None => log::debug!("Controller gone before {} finished", operation),
            }
        });
    }

    /// Mutate the session, then publish the new snapshot and one notification
    /// per changed field. Returns whether anything changed.
    fn apply(&mut self, mutate: impl FnOnce(&mut Session)) -> bool {
        let before = self.session.clone();
        mutate(&mut self.session);

        let changes = changed_fields(&before, &self.session);
        if changes.is_empty() {
            return false;
        }

        if before.connection_phase != self.session.connection_phase {
            self.epoch += 1;
        }
        if !self.session.invariants_hold() {
            log::error!("Session invariants violated: {:?}", self.session);
        }

        self.state_tx.send_replace(self.session.clone());
        for (field, value) in changes {
            self.event_bus.emit(&field.event_type(), &value);
        }
        true
    }

    fn apply_outcome(&mut self, mutate: impl FnOnce(&mut Session)) -> Outcome {
        if self.apply(mutate) {
            Outcome::Applied
        } else {
            Outcome::Ignored
        }
    }

    fn publish_error(&self, error: &SessionError) {
        self.event_bus.emit(ERROR_EVENT_TYPE, &error.to_payload());
    }
}

// ============================================================================
// TESTS
// ============================================================================
