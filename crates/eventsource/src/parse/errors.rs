//! Error types used by the SSE decoder.

use thiserror::Error;

/// Errors produced by [`Decoder`](super::decoder::Decoder).
///
/// Either variant ends the message being parsed; any partially accumulated
/// fields are discarded.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError<E> {
    /// Something went wrong with the underlying stream.
    #[error("event stream transport error: {0}")]
    Transport(#[source] E),
    /// The stream ended before a blank line completed the message.
    #[error("unexpected end of event stream")]
    Eof,
}

impl<E> DecodeError<E> {
    /// Returns `true` if this is an end-of-stream condition.
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }
}
