//! Transport-agnostic WebSocket frames.
//!
//! The client pumps are written against `Sink<Frame>` / `Stream<Item =
//! Result<Frame, TransportError>>` so they run the same over an axum
//! socket and over in-memory channels.

use thiserror::Error;

/// RFC 6455 normal closure.
pub const CLOSE_NORMAL: u16 = 1000;

/// One transport frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    /// Protocol-level keepalive, distinct from the application `ping` message.
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close(Option<u16>),
}

impl Frame {
    pub fn normal_close() -> Self {
        Frame::Close(Some(CLOSE_NORMAL))
    }
}

/// Failures reading from or writing to a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("write timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("transport error: {0}")]
    Io(String),
}

impl TransportError {
    pub fn io(err: impl std::fmt::Display) -> Self {
        Self::Io(err.to_string())
    }
}
