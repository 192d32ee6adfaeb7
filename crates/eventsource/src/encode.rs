//! Writing SSE messages.
//!
//! [`Encoder`] mirrors the decoder's field-presence rules: an absent field is
//! not written at all, an empty field is written as its bare name, and
//! anything else as `name: value`. Values that cannot be carried on a single
//! line of UTF-8 text are rejected before any byte is written.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{
    error::{EncodeError, EncodeResult},
    message::Message,
    parse::constants::{COLON, CR, LF, SPACE},
};

fn validate_name(name: &str) -> EncodeResult<()> {
    if name.is_empty() {
        return Err(EncodeError::invalid_name(name, "field name is empty"));
    }
    if name.bytes().any(|b| b == COLON || b == CR || b == LF) {
        return Err(EncodeError::invalid_name(
            name,
            "field name contains ':' or a line break",
        ));
    }
    Ok(())
}

fn validate_line(field: &str, value: &[u8]) -> EncodeResult<()> {
    if memchr::memchr2(CR, LF, value).is_some() {
        return Err(EncodeError::invalid_value(field, "value contains a line break"));
    }
    Ok(())
}

fn validate_value(field: &str, value: &[u8]) -> EncodeResult<()> {
    if std::str::from_utf8(value).is_err() {
        return Err(EncodeError::invalid_value(field, "value is not valid UTF-8"));
    }
    validate_line(field, value)
}

/// Data may span lines; each LF becomes a separate `data` line.
fn validate_data(value: &[u8]) -> EncodeResult<()> {
    if std::str::from_utf8(value).is_err() {
        return Err(EncodeError::invalid_value("data", "value is not valid UTF-8"));
    }
    if memchr::memchr(CR, value).is_some() {
        return Err(EncodeError::invalid_value(
            "data",
            "value contains a carriage return",
        ));
    }
    Ok(())
}

fn put_field(buf: &mut BytesMut, name: &str, value: &[u8]) {
    buf.extend_from_slice(name.as_bytes());
    if !value.is_empty() {
        buf.put_u8(COLON);
        buf.put_u8(SPACE);
        buf.extend_from_slice(value);
    }
    buf.put_u8(LF);
}

/// Append a single field line to `buf`. A `None` value appends nothing.
///
/// # Errors
///
/// Fails if the name or value cannot be represented on one line of the wire.
pub fn encode_field(buf: &mut BytesMut, name: &str, value: Option<&[u8]>) -> EncodeResult<()> {
    let Some(value) = value else {
        return Ok(());
    };
    validate_name(name)?;
    validate_value(name, value)?;
    put_field(buf, name, value);
    Ok(())
}

fn encode_fields(buf: &mut BytesMut, message: &Message) -> EncodeResult<()> {
    if let Some(id) = &message.id {
        validate_value("id", id)?;
    }
    if let Some(event) = &message.event {
        validate_value("event", event)?;
    }
    validate_data(&message.data)?;

    if let Some(id) = &message.id {
        put_field(buf, "id", id);
    }
    if let Some(event) = &message.event {
        put_field(buf, "event", event);
    }
    for line in message.data.split(|&b| b == LF) {
        put_field(buf, "data", line);
    }
    Ok(())
}

/// Append a complete message, blank-line terminator included, to `buf`.
///
/// A message with empty data appends nothing. The whole message is
/// validated first, so on error `buf` is left untouched.
///
/// # Errors
///
/// Fails if `id` or `event` is not single-line UTF-8, or if `data` is not
/// UTF-8 or contains a carriage return.
pub fn encode(buf: &mut BytesMut, message: &Message) -> EncodeResult<()> {
    if message.data.is_empty() {
        return Ok(());
    }
    encode_fields(buf, message)?;
    buf.put_u8(LF);
    Ok(())
}

/// Writes SSE messages to an [`AsyncWrite`] sink.
#[derive(Debug)]
pub struct Encoder<W> {
    writer: W,
    buffer: BytesMut,
}

impl<W> Encoder<W> {
    /// Create an encoder writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buffer: BytesMut::new(),
        }
    }

    /// Reference to the underlying sink.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Consume the encoder, returning the underlying sink.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: AsyncWrite + Unpin> Encoder<W> {
    /// Write a single field. A `None` value is a no-op; an empty value is
    /// written as the bare field name.
    pub async fn write_field(&mut self, name: &str, value: Option<&[u8]>) -> EncodeResult<()> {
        self.buffer.clear();
        encode_field(&mut self.buffer, name, value)?;
        if !self.buffer.is_empty() {
            self.writer.write_all(&self.buffer).await?;
        }
        Ok(())
    }

    /// Write a comment line. Decoders drop comments, which makes them
    /// suitable as keep-alives when followed by [`flush`](Self::flush).
    pub async fn write_comment(&mut self, text: &str) -> EncodeResult<()> {
        validate_line("comment", text.as_bytes())?;
        self.buffer.clear();
        self.buffer.put_u8(COLON);
        if !text.is_empty() {
            self.buffer.put_u8(SPACE);
            self.buffer.extend_from_slice(text.as_bytes());
        }
        self.buffer.put_u8(LF);
        self.writer.write_all(&self.buffer).await?;
        Ok(())
    }

    /// Write a message and flush it. A message with empty data writes
    /// nothing.
    pub async fn write(&mut self, message: &Message) -> EncodeResult<()> {
        if message.data.is_empty() {
            return Ok(());
        }
        self.buffer.clear();
        encode_fields(&mut self.buffer, message)?;
        self.writer.write_all(&self.buffer).await?;
        self.flush().await
    }

    /// Terminate the current message with a blank line and flush the sink.
    pub async fn flush(&mut self) -> EncodeResult<()> {
        self.writer.write_all(&[LF]).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
