//! # eventsource
//!
//! Server-Sent Events for Tokio: a streaming wire codec, a reconnecting
//! client and an axum response adapter.
//!
//! ## Features
//!
//! - **Decoder**: incremental, chunk-boundary agnostic parsing of the event
//!   stream grammar over any byte stream or [`AsyncRead`](tokio::io::AsyncRead)
//! - **Encoder**: field-exact serialization that the decoder reads back
//!   unchanged
//! - **Client**: [`EventSource`] with transparent reconnects, a fixed retry
//!   delay and `Last-Event-Id` resumption (feature `http` for the default
//!   reqwest transport)
//! - **Server**: [`server::respond`] turns an async handler into a streamed
//!   axum response (feature `server`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eventsource::{EventSource, EventSourceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EventSourceConfig::new("http://localhost:8080/events");
//!     let mut source = EventSource::new(config)?;
//!
//!     loop {
//!         match source.read().await {
//!             Ok(message) => println!("{:?}: {:?}", message.event_str(), message.data_str()),
//!             Err(err) if err.is_closed() => break,
//!             Err(err) => return Err(err.into()),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod encode;
pub mod error;
pub mod message;
pub mod parse;

#[cfg(feature = "server")]
pub mod server;

pub use client::{CloseHandle, EventSource, EventSourceConfig, EventSourceState, Transport};
#[cfg(feature = "http")]
pub use client::HttpTransport;
pub use encode::{Encoder, encode, encode_field};
pub use error::{BoxError, EncodeError, EncodeResult, EventSourceError};
pub use message::Message;
pub use parse::{DecodeError, Decoder, EVENT_STREAM_MEDIA_TYPE};
