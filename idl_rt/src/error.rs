//! Error types for generated IPC stubs

use std::fmt;
use thiserror::Error;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RtError>;

/// Backend-independent classification of a failed transport operation.
///
/// Generated error checks branch on this enumeration instead of raw kernel
/// or socket status codes, so cleanup and loop-continue logic is the same
/// for every backend.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TransportErrorKind {
    /// The message could not be delivered
    SendFailed,
    /// No message could be received
    ReceiveFailed,
    /// The blocked operation was cancelled by the kernel
    Cancelled,
    /// The partner no longer exists
    PeerGone,
    /// A send or receive timeout expired
    TimedOut,
}

impl TransportErrorKind {
    /// Every kind, in a fixed order
    pub const ALL: [TransportErrorKind; 5] = [
        TransportErrorKind::SendFailed,
        TransportErrorKind::ReceiveFailed,
        TransportErrorKind::Cancelled,
        TransportErrorKind::PeerGone,
        TransportErrorKind::TimedOut,
    ];

    /// Stable lower-case name
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::SendFailed => "send_failed",
            TransportErrorKind::ReceiveFailed => "receive_failed",
            TransportErrorKind::Cancelled => "cancelled",
            TransportErrorKind::PeerGone => "peer_gone",
            TransportErrorKind::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while packing or unpacking messages
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RtError {
    /// A transport operation failed
    #[error("transport error: {0}")]
    Transport(TransportErrorKind),

    /// Message does not fit the buffer
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Access past the end of the message
    #[error("offset {offset} out of bounds for {len}-byte message")]
    OutOfBounds { offset: usize, len: usize },

    /// Sequence exceeds its declared bound
    #[error("sequence too long: {actual} elements (max: {max})")]
    SequenceTooLong { actual: usize, max: usize },

    /// Invalid message format
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<TransportErrorKind> for RtError {
    fn from(kind: TransportErrorKind) -> Self {
        RtError::Transport(kind)
    }
}

impl From<std::io::Error> for RtError {
    fn from(err: std::io::Error) -> Self {
        RtError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_have_distinct_names() {
        let mut names: Vec<_> = TransportErrorKind::ALL.iter().map(|k| k.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), TransportErrorKind::ALL.len());
    }

    #[test]
    fn transport_error_display() {
        let err: RtError = TransportErrorKind::PeerGone.into();
        assert_eq!(err.to_string(), "transport error: peer_gone");
    }
}
