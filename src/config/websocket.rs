//! Realtime hub configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// WebSocket keepalive and queue sizing
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct WebSocketConfig {
    /// Transport ping period in seconds. Must stay below the idle timeout
    /// of any proxy in front of the service.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Bound on a single socket write in seconds
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,

    /// Per-connection outbound queue capacity
    #[serde(default = "default_send_queue_capacity")]
    pub send_queue_capacity: usize,

    /// Hub command queue capacity
    #[serde(default = "default_hub_queue_capacity")]
    pub hub_queue_capacity: usize,
}

impl WebSocketConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.ping_interval_secs == 0 {
            return Err(ValidationError::ZeroWebSocketSetting("ping_interval_secs"));
        }
        if self.write_timeout_secs == 0 {
            return Err(ValidationError::ZeroWebSocketSetting("write_timeout_secs"));
        }
        if self.send_queue_capacity == 0 {
            return Err(ValidationError::ZeroWebSocketSetting("send_queue_capacity"));
        }
        if self.hub_queue_capacity == 0 {
            return Err(ValidationError::ZeroWebSocketSetting("hub_queue_capacity"));
        }
        if self.write_timeout_secs >= self.ping_interval_secs {
            return Err(ValidationError::WriteTimeoutNotBelowPingInterval);
        }
        Ok(())
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval(),
            write_timeout_secs: default_write_timeout(),
            send_queue_capacity: default_send_queue_capacity(),
            hub_queue_capacity: default_hub_queue_capacity(),
        }
    }
}

fn default_ping_interval() -> u64 {
    30
}

fn default_write_timeout() -> u64 {
    10
}

fn default_send_queue_capacity() -> usize {
    256
}

fn default_hub_queue_capacity() -> usize {
    256
}
