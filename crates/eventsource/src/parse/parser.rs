//! Byte-level line parser for SSE streams.

use bytes::{Buf, Bytes, BytesMut};

use super::constants::{COLON, CR, LF, SPACE};

/// A full line from an SSE stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RawEventLine<'a> {
    /// Comment line (starts with `:`)
    Comment,
    /// A field line. The value is empty when the line carries no colon.
    Field {
        field_name: &'a [u8],
        field_value: &'a [u8],
    },
    /// An empty line (message delimiter).
    Empty,
}

/// Field names the decoder acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldName {
    Event,
    Data,
    Id,
    Ignored,
}

impl FieldName {
    pub(crate) fn from_bytes(name: &[u8]) -> Self {
        match name {
            b"event" => Self::Event,
            b"data" => Self::Data,
            b"id" => Self::Id,
            // `retry` lands here as well: it is never applied.
            _ => Self::Ignored,
        }
    }
}

/// Parsed line that owns its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EventLine {
    Comment,
    Empty,
    Field {
        field_name: FieldName,
        field_value: Bytes,
    },
}

/// Finds the next end-of-line in `bytes`, scanning from `from`.
///
/// Returns `(line_end, remainder_start)`: the non-inclusive end of the line
/// with any CR before the LF excluded, and the start of the remainder.
/// Returns `None` when the buffer holds no LF yet. A lone CR is not a line
/// terminator.
fn find_eol(bytes: &[u8], from: usize) -> Option<(usize, usize)> {
    let lf = from + memchr::memchr(LF, &bytes[from..])?;
    let line_end = if lf > 0 && bytes[lf - 1] == CR {
        lf - 1
    } else {
        lf
    };
    Some((line_end, lf + 1))
}

pub(crate) fn read_line(bytes: &[u8]) -> RawEventLine<'_> {
    if bytes.is_empty() {
        return RawEventLine::Empty;
    }

    match memchr::memchr(COLON, bytes) {
        Some(0) => RawEventLine::Comment,
        Some(colon_pos) => {
            let value = &bytes[colon_pos + 1..];
            // Strip a single leading space if present.
            let value = match value {
                [SPACE, rest @ ..] => rest,
                _ => value,
            };
            RawEventLine::Field {
                field_name: &bytes[..colon_pos],
                field_value: value,
            }
        }
        None => RawEventLine::Field {
            field_name: bytes,
            field_value: &[],
        },
    }
}

/// Reads the next [`EventLine`] from the buffer, then advances the buffer
/// past the corresponding EOL.
///
/// Returns `None` if the buffer contains no complete line yet; the partial
/// line stays buffered until more bytes arrive. `scanned` holds how many
/// leading bytes are already known to contain no LF, so a long line fed in
/// small chunks is scanned only once.
pub(crate) fn parse_line_from_buffer(
    buffer: &mut BytesMut,
    scanned: &mut usize,
) -> Option<EventLine> {
    let from = (*scanned).min(buffer.len());
    let Some((line_end, rem_start)) = find_eol(buffer, from) else {
        *scanned = buffer.len();
        return None;
    };
    *scanned = 0;

    let line = buffer.split_to(line_end).freeze();
    buffer.advance(rem_start - line_end);

    let parsed = match read_line(&line) {
        RawEventLine::Empty => EventLine::Empty,
        RawEventLine::Comment => EventLine::Comment,
        RawEventLine::Field {
            field_name,
            field_value,
        } => EventLine::Field {
            field_name: FieldName::from_bytes(field_name),
            field_value: line.slice_ref(field_value),
        },
    };
    Some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_line_variants() {
        assert_eq!(read_line(b""), RawEventLine::Empty);
        assert_eq!(read_line(b": keepalive"), RawEventLine::Comment);
        assert_eq!(read_line(b":"), RawEventLine::Comment);
        assert_eq!(
            read_line(b"data: hello"),
            RawEventLine::Field {
                field_name: b"data",
                field_value: b"hello"
            }
        );
        assert_eq!(
            read_line(b"data:hello"),
            RawEventLine::Field {
                field_name: b"data",
                field_value: b"hello"
            }
        );
        assert_eq!(
            read_line(b"id"),
            RawEventLine::Field {
                field_name: b"id",
                field_value: b""
            }
        );
    }

    #[test]
    fn test_only_one_leading_space_stripped() {
        assert_eq!(
            read_line(b"data:  two"),
            RawEventLine::Field {
                field_name: b"data",
                field_value: b" two"
            }
        );
    }

    #[test]
    fn test_value_keeps_later_colons() {
        assert_eq!(
            read_line(b"data: a:b: c"),
            RawEventLine::Field {
                field_name: b"data",
                field_value: b"a:b: c"
            }
        );
    }

    #[test]
    fn test_field_names() {
        assert_eq!(FieldName::from_bytes(b"id"), FieldName::Id);
        assert_eq!(FieldName::from_bytes(b"event"), FieldName::Event);
        assert_eq!(FieldName::from_bytes(b"data"), FieldName::Data);
        assert_eq!(FieldName::from_bytes(b"retry"), FieldName::Ignored);
        assert_eq!(FieldName::from_bytes(b"Data"), FieldName::Ignored);
    }

    #[test]
    fn test_parse_line_lf_and_crlf() {
        let mut buffer = BytesMut::from(&b"data: a\r\nid: 1\nrest"[..]);
        let mut scanned = 0;

        assert_eq!(
            parse_line_from_buffer(&mut buffer, &mut scanned),
            Some(EventLine::Field {
                field_name: FieldName::Data,
                field_value: Bytes::from_static(b"a"),
            })
        );
        assert_eq!(
            parse_line_from_buffer(&mut buffer, &mut scanned),
            Some(EventLine::Field {
                field_name: FieldName::Id,
                field_value: Bytes::from_static(b"1"),
            })
        );
        // No terminator yet: the partial line stays buffered.
        assert_eq!(parse_line_from_buffer(&mut buffer, &mut scanned), None);
        assert_eq!(&buffer[..], b"rest");
        assert_eq!(scanned, 4);
    }

    #[test]
    fn test_scan_resumes_after_partial_line() {
        let mut buffer = BytesMut::from(&b"data: ab"[..]);
        let mut scanned = 0;

        assert_eq!(parse_line_from_buffer(&mut buffer, &mut scanned), None);
        assert_eq!(scanned, 8);

        buffer.extend_from_slice(b"c\r");
        assert_eq!(parse_line_from_buffer(&mut buffer, &mut scanned), None);
        assert_eq!(scanned, 10);

        // The CR before the LF sits inside the already scanned prefix.
        buffer.extend_from_slice(b"\nid: 1\n");
        assert_eq!(
            parse_line_from_buffer(&mut buffer, &mut scanned),
            Some(EventLine::Field {
                field_name: FieldName::Data,
                field_value: Bytes::from_static(b"abc"),
            })
        );
        assert_eq!(scanned, 0);
        assert_eq!(&buffer[..], b"id: 1\n");
    }

    #[test]
    fn test_lone_cr_is_not_a_terminator() {
        let mut buffer = BytesMut::from(&b"data: a\rdata: b\n"[..]);
        let mut scanned = 0;
        assert_eq!(
            parse_line_from_buffer(&mut buffer, &mut scanned),
            Some(EventLine::Field {
                field_name: FieldName::Data,
                field_value: Bytes::from_static(b"a\rdata: b"),
            })
        );
    }

    #[test]
    fn test_blank_crlf_line() {
        let mut buffer = BytesMut::from(&b"\r\n"[..]);
        let mut scanned = 0;
        assert_eq!(parse_line_from_buffer(&mut buffer, &mut scanned), Some(EventLine::Empty));
        assert!(buffer.is_empty());
    }
}
