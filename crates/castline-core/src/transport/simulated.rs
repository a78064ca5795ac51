//! Stand-in transport for running without a real server.
//!
//! Every call sleeps for a fixed delay and then succeeds, unless a failure
//! rate is configured, in which case `connect` fails at random.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use super::{ServerIdentity, Transport, TransportError};

const DEFAULT_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    server_name: String,
    delay: Duration,
    failure_rate: f64,
}

impl SimulatedTransport {
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            delay: DEFAULT_DELAY,
            failure_rate: 0.0,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Probability in [0, 1] that a connect attempt fails. Out-of-range values are clamped.
    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = if failure_rate.is_nan() {
            0.0
        } else {
            failure_rate.clamp(0.0, 1.0)
        };
        self
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn failure_rate(&self) -> f64 {
        self.failure_rate
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn connect(&self) -> Result<ServerIdentity, TransportError> {
        tokio::time::sleep(self.delay).await;
        let failed = rand::thread_rng().gen_bool(self.failure_rate);
        if failed {
            return Err(TransportError::Unreachable(format!(
                "simulated failure reaching {}",
                self.server_name
            )));
        }
        Ok(ServerIdentity::new(self.server_name.clone()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn set_playback_paused(&self, _paused: bool) -> Result<(), TransportError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_rate_is_clamped() {
        assert_eq!(SimulatedTransport::new("a").with_failure_rate(3.0).failure_rate(), 1.0);
        assert_eq!(SimulatedTransport::new("a").with_failure_rate(-1.0).failure_rate(), 0.0);
        assert_eq!(SimulatedTransport::new("a").with_failure_rate(f64::NAN).failure_rate(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_succeeds_after_delay() {
        let transport = SimulatedTransport::new("Studio").with_delay(Duration::from_secs(2));
        let started = tokio::time::Instant::now();

        let identity = transport.connect().await.unwrap();

        assert_eq!(identity, ServerIdentity::new("Studio"));
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn connect_always_fails_at_full_failure_rate() {
        let transport = SimulatedTransport::new("Studio").with_failure_rate(1.0);
        let result = transport.connect().await;
        assert!(matches!(result, Err(TransportError::Unreachable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_and_control_succeed() {
        let transport = SimulatedTransport::new("Studio");
        assert!(transport.disconnect().await.is_ok());
        assert!(transport.set_playback_paused(true).await.is_ok());
    }
}
