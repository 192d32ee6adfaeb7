//! SSE wire codec.
//!
//! The decoder follows the event stream grammar: a message is a run of
//! `field: value` lines and `:` comments closed by a blank line. Only LF
//! and CRLF line endings are recognised. Of the field names, `id`, `event`
//! and `data` are applied; every other name, `retry` included, is parsed
//! and dropped.
//!
//! The encoder in [`crate::encode`] emits the same grammar, so
//! encode-then-decode reproduces any [`Message`](crate::Message) with
//! non-empty data.

pub(crate) mod constants;
pub mod decoder;
pub(crate) mod errors;
pub(crate) mod parser;

pub use constants::EVENT_STREAM_MEDIA_TYPE;
pub use decoder::Decoder;
pub use errors::DecodeError;
