//! Error types for the encoder and the reconnecting client.
//!
//! Decoder errors live next to the decoder in
//! [`parse::DecodeError`](crate::parse::DecodeError).

use thiserror::Error;

/// Boxed error returned by [`Transport`](crate::client::Transport)
/// implementations and their response bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for encoder operations.
pub type EncodeResult<T> = Result<T, EncodeError>;

/// Errors produced while encoding messages onto the wire.
#[derive(Error, Debug)]
pub enum EncodeError {
    /// The field name cannot appear on the wire.
    #[error("invalid field name {name:?}: {reason}")]
    InvalidFieldName { name: String, reason: &'static str },

    /// The field value cannot appear on the wire.
    #[error("invalid value for field {field:?}: {reason}")]
    InvalidFieldValue { field: String, reason: &'static str },

    /// Writing to the underlying sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EncodeError {
    pub(crate) fn invalid_name(name: &str, reason: &'static str) -> Self {
        Self::InvalidFieldName {
            name: name.to_string(),
            reason,
        }
    }

    pub(crate) fn invalid_value(field: &str, reason: &'static str) -> Self {
        Self::InvalidFieldValue {
            field: field.to_string(),
            reason,
        }
    }
}

/// Terminal conditions of an [`EventSource`](crate::client::EventSource).
///
/// Once one of these is returned from `read`, every later call returns the
/// same value and no further I/O is attempted. Transient failures (network
/// errors, 5xx responses, broken bodies) never surface here; they trigger a
/// reconnect instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventSourceError {
    /// The server answered 204 No Content: the stream is over.
    #[error("event stream ended by server")]
    EndOfStream,

    /// The client was closed by the caller.
    #[error("event source closed")]
    Closed,

    /// The server answered with a status that cannot be recovered from.
    #[error("endpoint returned unrecoverable status {0}")]
    UnexpectedStatus(http::StatusCode),

    /// The server answered 200 with something other than an event stream.
    #[error("invalid content type {0:?}")]
    InvalidContentType(String),

    /// The configuration was rejected at construction.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl EventSourceError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns `true` for the benign endings: server end-of-stream or caller
    /// close.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::EndOfStream | Self::Closed)
    }
}
