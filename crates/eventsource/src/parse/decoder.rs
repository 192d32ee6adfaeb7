//! [`Decoder`] turns a stream of byte chunks into [`Message`]s.

use core::{
    pin::Pin,
    task::{Context, Poll, ready},
};

use bytes::{BufMut, Bytes, BytesMut};
use futures_core::Stream;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

use super::{
    constants::LF,
    errors::DecodeError,
    parser::{EventLine, FieldName, parse_line_from_buffer},
};
use crate::message::Message;

// ---------------------------------------------------------------------------
// MessageBuilder
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MessageBuilder {
    id: Option<Bytes>,
    event: Option<Bytes>,
    data: DataBuffer,
}

/// Data buffer for the message under construction.
///
/// Most messages carry a single `data:` line, so the first value is kept as
/// an immutable slice of the input and only copied into a mutable buffer when
/// a second line has to be joined onto it.
#[derive(Debug, Default)]
enum DataBuffer {
    #[default]
    Empty,
    Single(Bytes),
    Joined(BytesMut),
}

impl DataBuffer {
    fn push(&mut self, value: Bytes) {
        match self {
            Self::Empty => *self = Self::Single(value),
            Self::Single(first) => {
                let mut buf = BytesMut::with_capacity(first.len() + 1 + value.len());
                buf.extend_from_slice(first);
                buf.put_u8(LF);
                buf.extend_from_slice(&value);
                *self = Self::Joined(buf);
            }
            Self::Joined(buf) => {
                buf.put_u8(LF);
                buf.extend_from_slice(&value);
            }
        }
    }

    fn freeze(self) -> Bytes {
        match self {
            Self::Empty => Bytes::new(),
            Self::Single(value) => value,
            Self::Joined(buf) => buf.freeze(),
        }
    }
}

impl MessageBuilder {
    /// Apply one line. Returns `true` once the message is complete.
    fn add(&mut self, line: EventLine) -> bool {
        match line {
            EventLine::Empty => return true,
            EventLine::Field {
                field_name: FieldName::Id,
                field_value,
            } => self.id = Some(field_value),
            EventLine::Field {
                field_name: FieldName::Event,
                field_value,
            } => self.event = Some(field_value),
            EventLine::Field {
                field_name: FieldName::Data,
                field_value,
            } => self.data.push(field_value),
            // Comments and unknown fields are silently ignored.
            EventLine::Comment
            | EventLine::Field {
                field_name: FieldName::Ignored,
                ..
            } => {}
        }
        false
    }

    #[must_use]
    fn dispatch(&mut self) -> Message {
        let MessageBuilder { id, event, data } = core::mem::take(self);
        Message {
            id,
            event,
            data: data.freeze(),
        }
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

pin_project_lite::pin_project! {
    /// Reads SSE messages from an underlying stream of byte chunks.
    ///
    /// Lines may be split across chunks arbitrarily; the decoder buffers and
    /// reassembles them. Only LF and CRLF terminate a line.
    #[derive(Debug)]
    pub struct Decoder<S> {
        #[pin]
        stream: S,
        buffer: BytesMut,
        // Leading bytes of `buffer` already searched for an LF.
        scanned: usize,
        builder: MessageBuilder,
        terminated: bool,
    }
}

impl<S> Decoder<S> {
    /// Create a new [`Decoder`] from an underlying byte stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::new(),
            scanned: 0,
            builder: MessageBuilder::default(),
            terminated: false,
        }
    }

    /// Consume the decoder, returning the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<R: AsyncRead> Decoder<ReaderStream<R>> {
    /// Create a decoder reading from an [`AsyncRead`] source.
    pub fn from_reader(reader: R) -> Self {
        Self::new(ReaderStream::new(reader))
    }
}

impl<S, E, B> Decoder<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    /// Poll for the next complete message.
    ///
    /// Fails with [`DecodeError::Transport`] if the underlying stream fails
    /// and with [`DecodeError::Eof`] if it ends, including in the middle of
    /// a message. In both cases the partially parsed message is discarded.
    pub fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Message, DecodeError<E>>> {
        let mut this = self.project();

        loop {
            while let Some(line) = parse_line_from_buffer(this.buffer, this.scanned) {
                if this.builder.add(line) {
                    return Poll::Ready(Ok(this.builder.dispatch()));
                }
            }

            if *this.terminated {
                return Poll::Ready(Err(DecodeError::Eof));
            }

            match ready!(this.stream.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => this.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(err)) => {
                    this.buffer.clear();
                    *this.scanned = 0;
                    *this.builder = MessageBuilder::default();
                    return Poll::Ready(Err(DecodeError::Transport(err)));
                }
                None => {
                    *this.terminated = true;
                    this.buffer.clear();
                    *this.scanned = 0;
                    *this.builder = MessageBuilder::default();
                    return Poll::Ready(Err(DecodeError::Eof));
                }
            }
        }
    }

    /// Read the next complete message.
    pub async fn read(&mut self) -> Result<Message, DecodeError<E>>
    where
        S: Unpin,
    {
        std::future::poll_fn(|cx| Pin::new(&mut *self).poll_read(cx)).await
    }
}

impl<S, E, B> Stream for Decoder<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    type Item = Result<Message, DecodeError<E>>;

    /// Yields messages until the underlying stream ends, which ends this
    /// stream instead of yielding [`DecodeError::Eof`].
    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match ready!(self.poll_read(cx)) {
            Ok(message) => Poll::Ready(Some(Ok(message))),
            Err(DecodeError::Eof) => Poll::Ready(None),
            Err(err) => Poll::Ready(Some(Err(err))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use futures_util::{StreamExt, stream};

    use super::*;

    fn decoder(
        chunks: &[&'static str],
    ) -> Decoder<impl Stream<Item = Result<Bytes, ()>> + Unpin> {
        let chunks: Vec<Result<Bytes, ()>> = chunks
            .iter()
            .copied()
            .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes())))
            .collect();
        Decoder::new(stream::iter(chunks))
    }

    fn bytes(s: &'static str) -> Bytes {
        Bytes::from_static(s.as_bytes())
    }

    fn msg(id: Option<&'static str>, event: Option<&'static str>, data: &'static str) -> Message {
        Message {
            id: id.map(bytes),
            event: event.map(bytes),
            data: bytes(data),
        }
    }

    #[tokio::test]
    async fn crlf_messages_and_multiline_data() {
        let mut dec = decoder(&[
            "data: message 1\r\n\r\ndata: message\r\ndata:2\r\n\r\ndata: message 3\r\n\r\n",
        ]);

        assert_eq!(dec.read().await, Ok(msg(None, None, "message 1")));
        assert_eq!(dec.read().await, Ok(msg(None, None, "message\n2")));
        assert_eq!(dec.read().await, Ok(msg(None, None, "message 3")));
        assert_eq!(dec.read().await, Err(DecodeError::Eof));
    }

    #[tokio::test]
    async fn comment_only_message_has_no_fields() {
        let mut dec = decoder(&[
            ": this is a comment\r\n\r\ndata: space\r\n\r\ndata:nospace\r\n\r\n",
        ]);

        assert_eq!(dec.read().await, Ok(Message::default()));
        assert_eq!(dec.read().await, Ok(msg(None, None, "space")));
        assert_eq!(dec.read().await, Ok(msg(None, None, "nospace")));
        assert_eq!(dec.read().await, Err(DecodeError::Eof));
    }

    #[tokio::test]
    async fn comments_do_not_affect_fields() {
        let mut with_comment = decoder(&[": x\n\ndata: y\n\n"]);
        let mut without = decoder(&["data: y\n\n"]);

        assert_eq!(with_comment.read().await, Ok(Message::default()));
        assert_eq!(with_comment.read().await, without.read().await);
    }

    #[tokio::test]
    async fn event_names() {
        let mut dec = decoder(&[
            "event: add\ndata: 123\n\nevent: remove\ndata: 321\n\nevent: add\ndata: 123\n\n",
        ]);

        assert_eq!(dec.read().await, Ok(msg(None, Some("add"), "123")));
        assert_eq!(dec.read().await, Ok(msg(None, Some("remove"), "321")));
        assert_eq!(dec.read().await, Ok(msg(None, Some("add"), "123")));
    }

    #[tokio::test]
    async fn id_present_empty_and_absent() {
        let mut dec = decoder(&[
            "data: first event\nid: 1\n\ndata:second event\nid\n\ndata: third event\n\n",
        ]);

        assert_eq!(dec.read().await, Ok(msg(Some("1"), None, "first event")));
        assert_eq!(dec.read().await, Ok(msg(Some(""), None, "second event")));
        assert_eq!(dec.read().await, Ok(msg(None, None, "third event")));
    }

    #[tokio::test]
    async fn empty_data_lines() {
        let mut dec = decoder(&["data\n\ndata:\ndata:\n\ndata:\n"]);

        assert_eq!(dec.read().await, Ok(msg(None, None, "")));
        assert_eq!(dec.read().await, Ok(msg(None, None, "\n")));
        // The last message never sees its blank line.
        assert_eq!(dec.read().await, Err(DecodeError::Eof));
        assert_eq!(dec.read().await, Err(DecodeError::Eof));
    }

    #[tokio::test]
    async fn data_lines_join_with_single_lf() {
        let mut dec = decoder(&["data: a\ndata: b\n\n"]);
        assert_eq!(dec.read().await, Ok(msg(None, None, "a\nb")));
    }

    #[tokio::test]
    async fn unknown_fields_and_retry_are_ignored() {
        let mut dec = decoder(&["retry: 10\nfoo: bar\ndata: x\n\n"]);
        assert_eq!(dec.read().await, Ok(msg(None, None, "x")));
    }

    #[tokio::test]
    async fn lines_split_across_chunks() {
        let mut dec = decoder(&[
            "da",
            "ta: Hel",
            "",
            "lo\r",
            "\nid: 4",
            "2\n",
            "\n",
        ]);
        assert_eq!(dec.read().await, Ok(msg(Some("42"), None, "Hello")));
    }

    #[tokio::test]
    async fn long_line_is_reassembled() {
        let long = "a".repeat(10_000);
        let source = format!("data:{long}\n\n");
        let mut dec = Decoder::from_reader(source.as_bytes());

        let message = dec.read().await.expect("message");
        assert_eq!(message.data.len(), long.len());
        assert_eq!(message.data_str(), Some(long.as_str()));
        assert!(dec.read().await.expect_err("eof").is_eof());
    }

    #[tokio::test]
    async fn partial_message_at_eof_is_discarded() {
        let mut dec = decoder(&["id: 1\nevent: x\ndata: partial\n"]);
        assert_eq!(dec.read().await, Err(DecodeError::Eof));
    }

    #[tokio::test]
    async fn transport_error_is_propagated() {
        let mut dec = Decoder::new(stream::iter(vec![
            Ok(Bytes::from_static(b"data: ok\n\ndata: cut")),
            Err("connection reset"),
        ]));

        assert_eq!(dec.read().await, Ok(msg(None, None, "ok")));
        assert_eq!(
            dec.read().await,
            Err(DecodeError::Transport("connection reset"))
        );
        assert_eq!(dec.read().await, Err(DecodeError::Eof));
    }

    #[tokio::test]
    async fn stream_ends_at_eof() {
        let messages = decoder(&["data: one\n\ndata: two\n\ndata: tail"])
            .collect::<Vec<_>>()
            .await;

        assert_eq!(
            messages,
            vec![Ok(msg(None, None, "one")), Ok(msg(None, None, "two"))]
        );
    }
}
