//! Test transport with canned results, call counters and gates.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{ServerIdentity, Transport, TransportError};

pub(crate) struct ScriptedTransport {
    connect_results: Mutex<VecDeque<Result<ServerIdentity, TransportError>>>,
    disconnect_result: Mutex<Result<(), TransportError>>,
    control_result: Mutex<Result<(), TransportError>>,
    connect_gate: Option<Arc<Notify>>,
    disconnect_gate: Option<Arc<Notify>>,
    delay: Duration,
    panic_connect: bool,
    panic_disconnect: bool,
    panic_control: bool,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    control_calls: Mutex<Vec<bool>>,
}

impl ScriptedTransport {
    /// Every connect succeeds as "Studio" unless results are queued.
    pub fn new() -> Self {
        Self {
            connect_results: Mutex::new(VecDeque::new()),
            disconnect_result: Mutex::new(Ok(())),
            control_result: Mutex::new(Ok(())),
            connect_gate: None,
            disconnect_gate: None,
            delay: Duration::ZERO,
            panic_connect: false,
            panic_disconnect: false,
            panic_control: false,
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            control_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_connect_result(self, result: Result<ServerIdentity, TransportError>) -> Self {
        self.connect_results.lock().unwrap().push_back(result);
        self
    }

    pub fn with_disconnect_result(self, result: Result<(), TransportError>) -> Self {
        *self.disconnect_result.lock().unwrap() = result;
        self
    }

    pub fn with_control_result(self, result: Result<(), TransportError>) -> Self {
        *self.control_result.lock().unwrap() = result;
        self
    }

    /// Every call sleeps this long first.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// `connect` blocks until the returned Notify is signalled.
    pub fn gate_connect(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.connect_gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    /// `disconnect` blocks until the returned Notify is signalled.
    pub fn gate_disconnect(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.disconnect_gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    /// `connect` panics after counting the call.
    pub fn panicking_connect(mut self) -> Self {
        self.panic_connect = true;
        self
    }

    /// `disconnect` panics after counting the call.
    pub fn panicking_disconnect(mut self) -> Self {
        self.panic_disconnect = true;
        self
    }

    /// `set_playback_paused` panics after recording the call.
    pub fn panicking_control(mut self) -> Self {
        self.panic_control = true;
        self
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    /// The `paused` argument of every playback-control call, in order.
    pub fn control_calls(&self) -> Vec<bool> {
        self.control_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self) -> Result<ServerIdentity, TransportError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.connect_gate {
            gate.notified().await;
        }
        tokio::time::sleep(self.delay).await;
        if self.panic_connect {
            panic!("scripted connect failure");
        }
        let queued = self.connect_results.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| Ok(ServerIdentity::new("Studio")))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.disconnect_gate {
            gate.notified().await;
        }
        tokio::time::sleep(self.delay).await;
        if self.panic_disconnect {
            panic!("scripted disconnect failure");
        }
        self.disconnect_result.lock().unwrap().clone()
    }

    async fn set_playback_paused(&self, paused: bool) -> Result<(), TransportError> {
        self.control_calls.lock().unwrap().push(paused);
        tokio::time::sleep(self.delay).await;
        if self.panic_control {
            panic!("scripted control failure");
        }
        self.control_result.lock().unwrap().clone()
    }
}
