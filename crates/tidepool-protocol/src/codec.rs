//! Newline-delimited line codec.
//!
//! Frames are UTF-8 text terminated by `\n`. A trailing `\r` before the
//! terminator is stripped so CRLF peers interoperate, and does not count
//! towards the length limit.
//!
//! [`LineCodec`] implements the `tokio_util` codec traits, so a connection
//! can be driven with `Framed`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use crate::response::Response;

/// Maximum length of a single line, terminator excluded (64 KiB).
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Line terminator.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Protocol errors that can occur while framing lines.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Line exceeds the configured maximum length.
    #[error("Line length {0} exceeds maximum {1}")]
    LineTooLong(usize, usize),

    /// Line is not valid UTF-8.
    #[error("Line is not valid UTF-8")]
    InvalidUtf8,

    /// The underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Append `line` followed by the terminator to `buf`.
pub fn encode_line(line: &str, buf: &mut BytesMut) {
    buf.reserve(line.len() + 1);
    buf.extend_from_slice(line.as_bytes());
    buf.put_u8(LINE_TERMINATOR);
}

/// Try to decode one line from a buffer, advancing it if successful.
///
/// Returns `Ok(Some(line))` if a complete line was decoded and
/// `Ok(None)` if more data is needed.
///
/// # Errors
///
/// Returns an error if the line is too long or not valid UTF-8.
pub fn decode_line_from(buf: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
    decode_line_with_limit(buf, MAX_LINE_LENGTH)
}

/// Like [`decode_line_from`], with an explicit length limit.
///
/// # Errors
///
/// Returns an error if the line is too long or not valid UTF-8.
pub fn decode_line_with_limit(
    buf: &mut BytesMut,
    max_length: usize,
) -> Result<Option<String>, ProtocolError> {
    match buf.iter().position(|b| *b == LINE_TERMINATOR) {
        Some(pos) => {
            let len = content_len(&buf[..pos]);
            if len > max_length {
                return Err(ProtocolError::LineTooLong(len, max_length));
            }
            let line = buf.split_to(pos);
            buf.advance(1);
            into_string(line).map(Some)
        }
        None => {
            let len = content_len(buf);
            if len > max_length {
                return Err(ProtocolError::LineTooLong(len, max_length));
            }
            Ok(None)
        }
    }
}

/// Decode whatever remains in the buffer once the peer has closed the stream.
///
/// A final line without a terminator is still a line. An empty buffer yields
/// `Ok(None)`.
///
/// # Errors
///
/// Returns an error if the remaining bytes are too long or not valid UTF-8.
pub fn decode_eof(buf: &mut BytesMut, max_length: usize) -> Result<Option<String>, ProtocolError> {
    if let Some(line) = decode_line_with_limit(buf, max_length)? {
        return Ok(Some(line));
    }
    if buf.is_empty() {
        return Ok(None);
    }
    let rest = buf.split();
    into_string(rest).map(Some)
}

/// Length of a raw line without a trailing `\r`.
fn content_len(raw: &[u8]) -> usize {
    match raw.last() {
        Some(b'\r') => raw.len() - 1,
        _ => raw.len(),
    }
}

fn into_string(mut raw: BytesMut) -> Result<String, ProtocolError> {
    if raw.last() == Some(&b'\r') {
        raw.truncate(raw.len() - 1);
    }
    String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}

/// Line codec carrying a per-connection length limit.
#[derive(Debug, Clone, Copy)]
pub struct LineCodec {
    max_length: usize,
}

impl LineCodec {
    /// Create a codec with the default limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    /// Create a codec with a specific line length limit.
    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self { max_length }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        decode_line_with_limit(src, self.max_length)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        decode_eof(src, self.max_length)
    }
}

impl<'a> Encoder<&'a Response> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: &'a Response, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        item.encode_into(dst);
        Ok(())
    }
}

/// Pre-encoded lines pass through untouched.
impl Encoder<Bytes> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        dst.extend_from_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_needs_terminator() {
        let mut buf = BytesMut::from(&b"PUBLI"[..]);
        assert_eq!(decode_line_from(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 5);

        buf.extend_from_slice(b"SH\n");
        assert_eq!(decode_line_from(&mut buf).unwrap().as_deref(), Some("PUBLISH"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_streaming_decode() {
        let mut buf = BytesMut::new();
        encode_line("CONSUME", &mut buf);
        encode_line("orders", &mut buf);
        encode_line("", &mut buf);

        assert_eq!(decode_line_from(&mut buf).unwrap().as_deref(), Some("CONSUME"));
        assert_eq!(decode_line_from(&mut buf).unwrap().as_deref(), Some("orders"));
        assert_eq!(decode_line_from(&mut buf).unwrap().as_deref(), Some(""));
        assert_eq!(decode_line_from(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_crlf_is_stripped() {
        let mut buf = BytesMut::from(&b"orders\r\n"[..]);
        assert_eq!(decode_line_from(&mut buf).unwrap().as_deref(), Some("orders"));
    }

    #[test]
    fn test_line_too_long() {
        let mut codec = LineCodec::with_max_length(4);

        let mut terminated = BytesMut::from(&b"abcdef\n"[..]);
        assert!(matches!(
            codec.decode(&mut terminated),
            Err(ProtocolError::LineTooLong(6, 4))
        ));

        // Unterminated garbage past the limit fails without waiting for more.
        let mut open = BytesMut::from(&b"abcdef"[..]);
        assert!(matches!(
            codec.decode(&mut open),
            Err(ProtocolError::LineTooLong(_, 4))
        ));
    }

    #[test]
    fn test_limit_ignores_carriage_return() {
        let mut codec = LineCodec::with_max_length(4);

        let mut lf = BytesMut::from(&b"abcd\n"[..]);
        assert_eq!(codec.decode(&mut lf).unwrap().as_deref(), Some("abcd"));

        let mut crlf = BytesMut::from(&b"abcd\r\n"[..]);
        assert_eq!(codec.decode(&mut crlf).unwrap().as_deref(), Some("abcd"));

        // A full-length line whose `\n` has not arrived yet keeps waiting.
        let mut partial = BytesMut::from(&b"abcd\r"[..]);
        assert_eq!(codec.decode(&mut partial).unwrap(), None);
        partial.extend_from_slice(b"\n");
        assert_eq!(codec.decode(&mut partial).unwrap().as_deref(), Some("abcd"));

        let mut over = BytesMut::from(&b"abcde\r\n"[..]);
        assert!(matches!(
            codec.decode(&mut over),
            Err(ProtocolError::LineTooLong(5, 4))
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut buf = BytesMut::from(&[0xff, 0xfe, b'\n'][..]);
        assert!(matches!(
            decode_line_from(&mut buf),
            Err(ProtocolError::InvalidUtf8)
        ));
    }

    #[test]
    fn test_decode_eof_returns_unterminated_tail() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"CONSUME"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(codec.decode_eof(&mut buf).unwrap().as_deref(), Some("CONSUME"));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_encoder_writes_response_lines() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();

        codec.encode(&Response::TopicNotFound, &mut buf).unwrap();
        codec.encode(Bytes::from_static(b"orders\n"), &mut buf).unwrap();
        assert_eq!(&buf[..], b"Topic not found.\norders\n");
    }
}
