//! Reconnecting SSE client.

mod config;
mod event_source;
mod transport;

pub use self::{
    config::EventSourceConfig,
    event_source::{CloseHandle, EventSource, EventSourceState},
    transport::{ResponseBody, Transport},
};

#[cfg(feature = "http")]
pub use self::transport::HttpTransport;
