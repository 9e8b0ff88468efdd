//! Stream manager configuration

use std::time::Duration;

use rand::Rng;

/// Tunables for the persistent-connection state machine.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket endpoint the manager connects to.
    pub url: String,
    /// Budget for a single transport handshake.
    pub connect_timeout: Duration,
    /// Interval at which the liveness marker checks the connection.
    pub heartbeat_interval: Duration,
    /// Delay before the first reconnection attempt.
    pub initial_reconnect_delay: Duration,
    /// Upper bound on any single reconnection delay.
    pub max_reconnect_delay: Duration,
    /// Multiplier applied per consecutive failed attempt.
    pub backoff_factor: f64,
    /// Consecutive failures tolerated before the manager gives up.
    pub max_reconnect_attempts: u32,
    /// Randomize reconnection delays to avoid thundering herds.
    pub jitter: bool,
}

impl StreamConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Delay before reconnection attempt `attempt` (1-based).
    ///
    /// Exponential in the attempt number, capped at `max_reconnect_delay`,
    /// then scaled by a random factor in `[0.5, 1.0]` when jitter is on.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63);
        let factor = self.backoff_factor.powi(exponent as i32);
        let raw = self.initial_reconnect_delay.as_secs_f64() * factor;
        let capped = Duration::from_secs_f64(raw).min(self.max_reconnect_delay);
        if !self.jitter {
            return capped;
        }
        let scale: f64 = rand::rng().random_range(0.5..=1.0);
        Duration::from_secs_f64(capped.as_secs_f64() * scale)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8000/ws".to_string(),
            connect_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            initial_reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            max_reconnect_attempts: 5,
            jitter: true,
        }
    }
}
