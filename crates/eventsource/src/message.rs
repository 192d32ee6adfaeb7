//! The message record shared by the decoder, encoder and client.

use bytes::Bytes;

/// One SSE message.
///
/// `id` and `event` distinguish absence (`None`, the field was not sent) from
/// an explicit empty value (`Some` of zero length). `data` is always present;
/// a message without data lines carries empty `data`, which the encoder and
/// the client both treat as "nothing to deliver".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Message {
    /// The event ID, if an `id` field was sent.
    pub id: Option<Bytes>,
    /// The event type, if an `event` field was sent.
    pub event: Option<Bytes>,
    /// The data payload. Multiple `data` lines are joined with LF.
    pub data: Bytes,
}

impl Message {
    /// Create a message carrying only data.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            id: None,
            event: None,
            data: data.into(),
        }
    }

    /// Set the event ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<Bytes>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the event type.
    #[must_use]
    pub fn with_event(mut self, event: impl Into<Bytes>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// The data as UTF-8, if it is valid UTF-8.
    pub fn data_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    /// The event type as UTF-8, if present and valid.
    pub fn event_str(&self) -> Option<&str> {
        self.event
            .as_deref()
            .and_then(|event| std::str::from_utf8(event).ok())
    }

    /// The event ID as UTF-8, if present and valid.
    pub fn id_str(&self) -> Option<&str> {
        self.id.as_deref().and_then(|id| std::str::from_utf8(id).ok())
    }
}
