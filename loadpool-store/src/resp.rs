//! Minimal RESP2 codec for talking to a Redis server.
//!
//! Only the client side is needed: commands go out as arrays of bulk
//! strings, replies come back as any RESP2 type.

use std::io::Cursor;

use bytes::{BufMut, Bytes, BytesMut};

use crate::errors::{Result, StoreError};

const MAX_NESTING_DEPTH: usize = 32;

/// A single RESP2 reply or request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Array(Vec<Frame>),
    /// `$-1` or `*-1`
    Null,
}

impl Frame {
    /// Builds a command frame out of string tokens.
    pub fn command<I, S>(tokens: I) -> Frame
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Frame::Array(
            tokens
                .into_iter()
                .map(|t| Frame::Bulk(Bytes::copy_from_slice(t.as_ref().as_bytes())))
                .collect(),
        )
    }

    pub fn serialize(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(s) => {
                dst.put_u8(b'+');
                dst.put_slice(s.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Error(msg) => {
                dst.put_u8(b'-');
                dst.put_slice(msg.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Integer(n) => {
                dst.put_u8(b':');
                dst.put_slice(n.to_string().as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Bulk(data) => {
                dst.put_u8(b'$');
                dst.put_slice(data.len().to_string().as_bytes());
                dst.put_slice(b"\r\n");
                dst.put_slice(data);
                dst.put_slice(b"\r\n");
            }
            Frame::Array(items) => {
                dst.put_u8(b'*');
                dst.put_slice(items.len().to_string().as_bytes());
                dst.put_slice(b"\r\n");
                for item in items {
                    item.serialize(dst);
                }
            }
            Frame::Null => dst.put_slice(b"$-1\r\n"),
        }
    }

    /// Reads the frame as UTF-8 text, for bulk and simple strings.
    pub fn into_string(self) -> Result<String> {
        match self {
            Frame::Simple(s) => Ok(s),
            Frame::Bulk(data) => String::from_utf8(data.to_vec())
                .map_err(|_| StoreError::Protocol("invalid utf-8 in bulk string".into())),
            other => Err(unexpected(&other)),
        }
    }

    pub fn into_integer(self) -> Result<i64> {
        match self {
            Frame::Integer(n) => Ok(n),
            other => Err(unexpected(&other)),
        }
    }

    /// Turns an error reply into `StoreError::Backend`, passing everything else through.
    pub fn into_result(self) -> Result<Frame> {
        match self {
            Frame::Error(msg) if msg.starts_with("WRONGTYPE") => Err(StoreError::WrongType(msg)),
            Frame::Error(msg) => Err(StoreError::Backend(msg)),
            other => Ok(other),
        }
    }
}

pub(crate) fn unexpected(frame: &Frame) -> StoreError {
    StoreError::Protocol(format!("unexpected reply: {:?}", frame))
}

enum ParseError {
    Incomplete,
    Invalid(String),
}

/// Parses one frame from the front of `buf`.
///
/// Returns `Ok(Some((frame, consumed)))` for a complete frame, `Ok(None)` when
/// more bytes are needed, or a protocol error for malformed input.
pub fn parse_frame(buf: &[u8]) -> Result<Option<(Frame, usize)>> {
    if buf.is_empty() {
        return Ok(None);
    }

    let mut cursor = Cursor::new(buf);
    match try_parse(&mut cursor, 0) {
        Ok(frame) => Ok(Some((frame, cursor.position() as usize))),
        Err(ParseError::Incomplete) => Ok(None),
        Err(ParseError::Invalid(msg)) => Err(StoreError::Protocol(msg)),
    }
}

fn try_parse(cursor: &mut Cursor<&[u8]>, depth: usize) -> std::result::Result<Frame, ParseError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(ParseError::Invalid("frame nested too deeply".into()));
    }

    let prefix = read_byte(cursor)?;
    match prefix {
        b'+' => Ok(Frame::Simple(read_text_line(cursor)?)),
        b'-' => Ok(Frame::Error(read_text_line(cursor)?)),
        b':' => Ok(Frame::Integer(read_integer_line(cursor)?)),
        b'$' => {
            let len = read_integer_line(cursor)?;
            if len == -1 {
                return Ok(Frame::Null);
            }
            if len < 0 {
                return Err(ParseError::Invalid(format!("invalid bulk length {}", len)));
            }
            let len = len as usize;
            let start = cursor.position() as usize;
            let buf = *cursor.get_ref();
            if buf.len() < start + len + 2 {
                return Err(ParseError::Incomplete);
            }
            if &buf[start + len..start + len + 2] != b"\r\n" {
                return Err(ParseError::Invalid("bulk string missing terminator".into()));
            }
            cursor.set_position((start + len + 2) as u64);
            Ok(Frame::Bulk(Bytes::copy_from_slice(&buf[start..start + len])))
        }
        b'*' => {
            let count = read_integer_line(cursor)?;
            if count == -1 {
                return Ok(Frame::Null);
            }
            if count < 0 {
                return Err(ParseError::Invalid(format!("invalid array length {}", count)));
            }
            let mut items = Vec::with_capacity((count as usize).min(1024));
            for _ in 0..count {
                items.push(try_parse(cursor, depth + 1)?);
            }
            Ok(Frame::Array(items))
        }
        other => Err(ParseError::Invalid(format!(
            "invalid type prefix: {:#04x}",
            other
        ))),
    }
}

fn read_byte(cursor: &mut Cursor<&[u8]>) -> std::result::Result<u8, ParseError> {
    let pos = cursor.position() as usize;
    let byte = *cursor.get_ref().get(pos).ok_or(ParseError::Incomplete)?;
    cursor.set_position((pos + 1) as u64);
    Ok(byte)
}

fn read_line<'a>(cursor: &mut Cursor<&'a [u8]>) -> std::result::Result<&'a [u8], ParseError> {
    let buf: &'a [u8] = *cursor.get_ref();
    let start = cursor.position() as usize;
    let end = buf[start..]
        .windows(2)
        .position(|w| w == b"\r\n")
        .ok_or(ParseError::Incomplete)?;
    cursor.set_position((start + end + 2) as u64);
    Ok(&buf[start..start + end])
}

fn read_text_line(cursor: &mut Cursor<&[u8]>) -> std::result::Result<String, ParseError> {
    let line = read_line(cursor)?;
    std::str::from_utf8(line)
        .map(str::to_owned)
        .map_err(|_| ParseError::Invalid("invalid utf-8 in line".into()))
}

fn read_integer_line(cursor: &mut Cursor<&[u8]>) -> std::result::Result<i64, ParseError> {
    let line = read_text_line(cursor)?;
    line.parse::<i64>()
        .map_err(|_| ParseError::Invalid(format!("invalid integer: {}", line)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_serializes_as_bulk_array() {
        let mut buf = BytesMut::new();
        Frame::command(["SADD", "SLM:SOCKET:SET", "abc"]).serialize(&mut buf);

        assert_eq!(
            &buf[..],
            b"*3\r\n$4\r\nSADD\r\n$14\r\nSLM:SOCKET:SET\r\n$3\r\nabc\r\n"
        );
    }

    #[test]
    fn parses_each_reply_type() {
        let cases: Vec<(&[u8], Frame)> = vec![
            (&b"+OK\r\n"[..], Frame::Simple("OK".into())),
            (&b"-ERR nope\r\n"[..], Frame::Error("ERR nope".into())),
            (&b":42\r\n"[..], Frame::Integer(42)),
            (&b"$5\r\nhello\r\n"[..], Frame::Bulk(Bytes::from_static(b"hello"))),
            (&b"$-1\r\n"[..], Frame::Null),
            (&b"*-1\r\n"[..], Frame::Null),
            (
                &b"*2\r\n$1\r\na\r\n$1\r\nb\r\n"[..],
                Frame::Array(vec![
                    Frame::Bulk(Bytes::from_static(b"a")),
                    Frame::Bulk(Bytes::from_static(b"b")),
                ]),
            ),
        ];

        for (input, expected) in cases {
            let (frame, consumed) = parse_frame(input).unwrap().unwrap();
            assert_eq!(frame, expected);
            assert_eq!(consumed, input.len());
        }
    }

    #[test]
    fn partial_input_needs_more_data() {
        assert!(parse_frame(b"").unwrap().is_none());
        assert!(parse_frame(b"$5\r\nhel").unwrap().is_none());
        assert!(parse_frame(b"*2\r\n$1\r\na\r\n").unwrap().is_none());
        assert!(parse_frame(b":12").unwrap().is_none());
    }

    #[test]
    fn consumes_only_the_first_frame() {
        let (frame, consumed) = parse_frame(b":1\r\n:2\r\n").unwrap().unwrap();
        assert_eq!(frame, Frame::Integer(1));
        assert_eq!(consumed, 4);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_frame(b"?what\r\n").is_err());
        assert!(parse_frame(b":abc\r\n").is_err());
        assert!(parse_frame(b"$3\r\nabcd\r\n").is_err());
    }

    #[test]
    fn error_replies_become_store_errors() {
        assert!(matches!(
            Frame::Error("WRONGTYPE Operation against a key".into()).into_result(),
            Err(StoreError::WrongType(_))
        ));
        assert!(matches!(
            Frame::Error("ERR unknown command".into()).into_result(),
            Err(StoreError::Backend(_))
        ));
        assert_eq!(
            Frame::Integer(1).into_result().unwrap(),
            Frame::Integer(1)
        );
    }
}
