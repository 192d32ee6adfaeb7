//! Common constants used across the SSE codec.

/// Newline byte
pub(crate) const LF: u8 = b'\n';
/// Carriage return byte
pub(crate) const CR: u8 = b'\r';
/// Field separator byte
pub(crate) const COLON: u8 = b':';
/// Optional space after the field separator
pub(crate) const SPACE: u8 = b' ';

/// Default event type applied by the client when none is sent (`"message"`).
pub(crate) const MESSAGE_EVENT: &[u8] = b"message";

/// Media type of an event stream body.
pub const EVENT_STREAM_MEDIA_TYPE: &str = "text/event-stream";
