//! Core error types.
//!
//! Comprehensive error handling for all reactor-core operations.

use std::io;
use thiserror::Error;

/// Main error type for reactor-core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Expected-terminal condition: the channel is already closed, or its
    /// registration was cancelled. Callers translate this to end-of-stream.
    #[error("socket closed")]
    SocketClosed,

    /// A blocked writer was interrupted; the channel is closed as a side
    /// effect and the thread's interrupt flag is preserved by the caller.
    #[error("socket closed (writer interrupted)")]
    Interrupted,

    /// Client `connect` failed.
    #[error("connect failed: {0}")]
    SocketConnect(#[source] io::Error),

    /// Unexpected transport failure; the channel is closed and the error
    /// propagates to the caller.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for reactor-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Check if this error is recoverable at the point it was raised (i.e.
    /// the caller may retry the same operation rather than tear the
    /// connection down).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }

    /// Check if this is a terminal connection error — the channel behind
    /// it is dead and must not be used again.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::SocketClosed | Self::Interrupted)
    }
}
