//! The reconnecting event source.
//!
//! [`EventSource`] owns a [`Transport`] and at most one open response body.
//! Every call to [`read`](EventSource::read) drives the connection state
//! machine until it can hand back a message or hits a terminal condition:
//!
//! ```text
//! Disconnected ──► Connecting ──► Connected ──► (read messages)
//!      ▲               │               │
//!      └── 5xx / I/O ──┘◄── body ends ─┘
//!
//! Connecting ──► Closed(EndOfStream | UnexpectedStatus | InvalidContentType)
//! any state  ──► Closed(Closed)            (close / CloseHandle)
//! ```
//!
//! Transient failures never reach the caller. Once a stream has been opened,
//! every later attempt waits the configured retry delay first; before that,
//! failed attempts are retried at once. Every request carries the
//! `Last-Event-Id` of the last delivered message (empty before the first).

use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use bytes::Bytes;
use futures_core::Stream;
use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    config::EventSourceConfig,
    transport::{ResponseBody, Transport},
};
use crate::{
    error::{BoxError, EventSourceError},
    message::Message,
    parse::{
        Decoder,
        constants::{EVENT_STREAM_MEDIA_TYPE, MESSAGE_EVENT},
    },
};

const LAST_EVENT_ID: &str = "last-event-id";

/// Observable connection state of an [`EventSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSourceState {
    /// No connection is open; the next read will connect.
    Disconnected,
    /// A request is in flight or the retry delay is running.
    Connecting,
    /// A response body is open and being read.
    Connected,
    /// A terminal condition was reached; reads return it forever.
    Closed,
}

impl EventSourceState {
    /// Returns `true` if a response body is open.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` if the event source reached a terminal state.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

enum ConnectionState {
    Disconnected,
    Connecting { attempt: u32 },
    Connected(Decoder<SlotBody>),
    Closed(EventSourceError),
}

/// The open response body, shared with every [`CloseHandle`] so a close
/// from another task drops it immediately.
type BodySlot = Arc<Mutex<Option<ResponseBody>>>;

fn release(slot: &BodySlot) {
    let body = slot.lock().take();
    drop(body);
}

/// Reads the body held in the slot. Ends once the slot is emptied.
struct SlotBody {
    slot: BodySlot,
}

impl Stream for SlotBody {
    type Item = Result<Bytes, BoxError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.slot.lock().as_mut() {
            Some(body) => body.as_mut().poll_next(cx),
            None => Poll::Ready(None),
        }
    }
}

/// Outcome of inspecting a response's status line and headers.
enum Handshake {
    Ready(ResponseBody),
    Retry(StatusCode),
    Terminal(EventSourceError),
}

/// The request sent on every attempt. Only `Last-Event-Id` changes.
#[derive(Debug)]
struct RequestTemplate {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

impl RequestTemplate {
    fn new(config: &EventSourceConfig, uri: Uri) -> Self {
        let mut headers = config.headers.clone();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(EVENT_STREAM_MEDIA_TYPE),
        );
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(LAST_EVENT_ID, HeaderValue::from_static(""));

        Self {
            method: config.method.clone(),
            uri,
            headers,
            body: config.body.clone().unwrap_or_default(),
        }
    }

    fn set_last_event_id(&mut self, id: &[u8]) {
        let value = HeaderValue::from_bytes(id).unwrap_or_else(|err| {
            warn!(error = %err, "Last event ID is not a valid header value, sending empty");
            HeaderValue::from_static("")
        });
        self.headers.insert(LAST_EVENT_ID, value);
    }

    fn build(&self) -> http::Request<Bytes> {
        let mut request = http::Request::new(self.body.clone());
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();
        *request.headers_mut() = self.headers.clone();
        request
    }
}

/// Returns `true` if the `Content-Type` value names the event-stream media
/// type. Parameters such as `charset` are ignored.
fn is_event_stream(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|media| media.eq_ignore_ascii_case(EVENT_STREAM_MEDIA_TYPE))
}

fn classify(response: http::Response<ResponseBody>) -> Handshake {
    let status = response.status();
    if status.as_u16() >= 500 {
        return Handshake::Retry(status);
    }
    if status == StatusCode::NO_CONTENT {
        return Handshake::Terminal(EventSourceError::EndOfStream);
    }
    if status != StatusCode::OK {
        return Handshake::Terminal(EventSourceError::UnexpectedStatus(status));
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .unwrap_or_default();
    if !is_event_stream(&content_type) {
        return Handshake::Terminal(EventSourceError::InvalidContentType(content_type));
    }

    Handshake::Ready(response.into_body())
}

/// Closes an [`EventSource`] from another task.
///
/// Closing releases the open response body at once and interrupts a read
/// that is waiting on the network or sleeping before a retry; that read and
/// every later one return [`EventSourceError::Closed`].
#[derive(Clone)]
pub struct CloseHandle {
    token: CancellationToken,
    body: BodySlot,
}

impl CloseHandle {
    /// Close the event source. Idempotent.
    pub fn close(&self) {
        self.token.cancel();
        release(&self.body);
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// A client that delivers SSE messages from an endpoint, reconnecting
/// transparently until the stream ends or it is closed.
///
/// # Example
///
/// ```rust,ignore
/// use eventsource::{EventSource, EventSourceConfig};
///
/// let mut source = EventSource::new(EventSourceConfig::new("http://localhost:8080/events"))?;
/// while let Ok(message) = source.read().await {
///     println!("{:?}: {:?}", message.event_str(), message.data_str());
/// }
/// ```
pub struct EventSource<T> {
    transport: T,
    template: RequestTemplate,
    retry: Duration,
    state: ConnectionState,
    body: BodySlot,
    last_event_id: Bytes,
    attempts: u32,
    has_connected: bool,
    closer: CancellationToken,
}

#[cfg(feature = "http")]
impl EventSource<super::transport::HttpTransport> {
    /// Create an event source using the default HTTP transport.
    ///
    /// No connection is made until the first [`read`](Self::read).
    ///
    /// # Errors
    ///
    /// Returns [`EventSourceError::Config`] if the configuration is invalid
    /// or the HTTP client cannot be built.
    pub fn new(config: EventSourceConfig) -> Result<Self, EventSourceError> {
        let transport = super::transport::HttpTransport::new(config.connect_timeout)?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> EventSource<T> {
    /// Create an event source that issues its requests through `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`EventSourceError::Config`] if the configuration is invalid.
    pub fn with_transport(config: EventSourceConfig, transport: T) -> Result<Self, EventSourceError> {
        let uri = config.validate()?;
        Ok(Self {
            transport,
            template: RequestTemplate::new(&config, uri),
            retry: config.retry,
            state: ConnectionState::Disconnected,
            body: BodySlot::default(),
            last_event_id: Bytes::new(),
            attempts: 0,
            has_connected: false,
            closer: CancellationToken::new(),
        })
    }

    /// Current connection state. Reports [`EventSourceState::Closed`] as
    /// soon as a [`CloseHandle`] has closed the source.
    pub fn state(&self) -> EventSourceState {
        if self.closer.is_cancelled() {
            return EventSourceState::Closed;
        }
        match self.state {
            ConnectionState::Disconnected => EventSourceState::Disconnected,
            ConnectionState::Connecting { .. } => EventSourceState::Connecting,
            ConnectionState::Connected(_) => EventSourceState::Connected,
            ConnectionState::Closed(_) => EventSourceState::Closed,
        }
    }

    /// ID of the last delivered message that carried one. Empty if none
    /// has, or if the server reset it with an empty `id` field.
    pub fn last_event_id(&self) -> &[u8] {
        &self.last_event_id
    }

    /// A handle that closes this event source from another task.
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            token: self.closer.clone(),
            body: Arc::clone(&self.body),
        }
    }

    /// Close the event source and release any open response body.
    ///
    /// Every later [`read`](Self::read) returns [`EventSourceError::Closed`].
    pub fn close(&mut self) {
        self.closer.cancel();
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if !matches!(self.state, ConnectionState::Closed(EventSourceError::Closed)) {
            info!(url = %self.template.uri, "Event source closed");
        }
        self.state = ConnectionState::Closed(EventSourceError::Closed);
        release(&self.body);
    }

    fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
        release(&self.body);
    }

    /// Read the next message with non-empty data.
    ///
    /// Connects or reconnects as needed. Messages without a type are given
    /// the type `message`.
    ///
    /// # Errors
    ///
    /// Returns the terminal condition once one is reached, and keeps
    /// returning it on every later call.
    pub async fn read(&mut self) -> Result<Message, EventSourceError> {
        let closer = self.closer.clone();

        loop {
            if closer.is_cancelled() {
                self.shutdown();
            }

            let decoder = match &mut self.state {
                ConnectionState::Closed(err) => return Err(err.clone()),
                ConnectionState::Connected(decoder) => decoder,
                ConnectionState::Disconnected | ConnectionState::Connecting { .. } => {
                    self.connect().await;
                    continue;
                }
            };

            let decoded = tokio::select! {
                biased;

                () = closer.cancelled() => continue,
                decoded = decoder.read() => decoded,
            };

            match decoded {
                Ok(message) if message.data.is_empty() => {
                    debug!("Skipping message without data");
                }
                Ok(mut message) => {
                    if let Some(id) = &message.id {
                        self.last_event_id = id.clone();
                    }
                    if message.event.is_none() {
                        message.event = Some(Bytes::from_static(MESSAGE_EVENT));
                    }
                    debug!(
                        event = ?message.event_str(),
                        id = ?message.id_str(),
                        len = message.data.len(),
                        "Event source message received",
                    );
                    return Ok(message);
                }
                Err(err) => {
                    warn!(url = %self.template.uri, error = %err, "Event stream interrupted");
                    self.disconnect();
                }
            }
        }
    }

    /// Establish a connection, retrying transient failures.
    ///
    /// Leaves the state either `Connected` or `Closed`.
    async fn connect(&mut self) {
        let closer = self.closer.clone();

        loop {
            if closer.is_cancelled() {
                self.shutdown();
                return;
            }

            // Release any previous body before waiting.
            self.disconnect();

            if self.has_connected {
                warn!(
                    attempt = self.attempts,
                    delay_ms = u64::try_from(self.retry.as_millis()).unwrap_or(u64::MAX),
                    "Event source reconnecting after delay"
                );
                tokio::select! {
                    biased;

                    () = closer.cancelled() => continue,
                    () = tokio::time::sleep(self.retry) => {}
                }
            } else if self.attempts > 0 {
                // Retry at once, but let a transport that fails without
                // suspending give the runtime a turn.
                tokio::task::yield_now().await;
            }

            self.attempts = self.attempts.saturating_add(1);
            self.state = ConnectionState::Connecting {
                attempt: self.attempts,
            };
            self.template.set_last_event_id(&self.last_event_id);
            let request = self.template.build();

            info!(url = %self.template.uri, attempt = self.attempts, "Event source connecting");
            let result = tokio::select! {
                biased;

                () = closer.cancelled() => continue,
                result = self.transport.send(request) => result,
            };

            let response = match result {
                Ok(response) => response,
                Err(err) => {
                    warn!(url = %self.template.uri, error = %err, "Event source request failed");
                    continue;
                }
            };

            match classify(response) {
                Handshake::Ready(body) => {
                    info!(url = %self.template.uri, "Event source connected");
                    self.has_connected = true;
                    *self.body.lock() = Some(body);
                    self.state = ConnectionState::Connected(Decoder::new(SlotBody {
                        slot: Arc::clone(&self.body),
                    }));
                    return;
                }
                Handshake::Retry(status) => {
                    warn!(url = %self.template.uri, status = %status, "Event source endpoint unavailable");
                }
                Handshake::Terminal(EventSourceError::EndOfStream) => {
                    info!(url = %self.template.uri, "Event stream ended by server");
                    self.state = ConnectionState::Closed(EventSourceError::EndOfStream);
                    return;
                }
                Handshake::Terminal(err) => {
                    error!(url = %self.template.uri, error = %err, "Event source cannot continue");
                    self.state = ConnectionState::Closed(err);
                    return;
                }
            }
        }
    }

    /// Turn the event source into a [`Stream`] of messages.
    ///
    /// The stream yields messages until the terminal condition, yields that
    /// condition once as an error, and then ends.
    pub fn into_stream(self) -> impl Stream<Item = Result<Message, EventSourceError>> {
        futures_util::stream::unfold(Some(self), |source| async move {
            let mut source = source?;
            match source.read().await {
                Ok(message) => Some((Ok(message), Some(source))),
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}

impl<T> Drop for EventSource<T> {
    fn drop(&mut self) {
        release(&self.body);
    }
}

impl std::fmt::Debug for CloseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloseHandle")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl<T> std::fmt::Debug for EventSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            _ if self.closer.is_cancelled() => "Closed(event source closed)".to_string(),
            ConnectionState::Disconnected => "Disconnected".to_string(),
            ConnectionState::Connecting { attempt } => format!("Connecting({attempt})"),
            ConnectionState::Connected(_) => "Connected".to_string(),
            ConnectionState::Closed(err) => format!("Closed({err})"),
        };
        f.debug_struct("EventSource")
            .field("uri", &self.template.uri)
            .field("state", &state)
            .field("last_event_id", &self.last_event_id)
            .finish_non_exhaustive()
    }
}
