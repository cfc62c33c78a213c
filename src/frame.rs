// https://redis.io/docs/reference/protocol-spec

use std::fmt;

use bytes::Buf;
use bytes::Bytes;
use std::io::Cursor;
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("invalid frame data type: {0:#04x}")]
    InvalidDataType(u8),
    /// Top level simple strings, errors and integers are never sent by clients nor written to the
    /// append-only file, so they are rejected instead of guessing what they mean.
    #[error("decoding a top level {0:?} frame is not yet supported")]
    Unsupported(DataType),
    #[error("stream ended in the middle of a frame, {0} bytes left over")]
    Truncated(usize),
    #[error("protocol error; {0}")]
    Protocol(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Array(Vec<Frame>),
}

impl Frame {
    pub fn simple(text: impl Into<String>) -> Frame {
        Frame::Simple(text.into())
    }

    pub fn error(text: impl Into<String>) -> Frame {
        Frame::Error(text.into())
    }

    pub fn integer(n: i64) -> Frame {
        Frame::Integer(n)
    }

    pub fn bulk(data: impl Into<Bytes>) -> Frame {
        Frame::Bulk(data.into())
    }

    /// An empty array, filled through [`Frame::push`].
    pub fn array() -> Frame {
        Frame::Array(Vec::new())
    }

    /// Appends `frame` to an array. Does nothing for any other variant.
    pub fn push(&mut self, frame: Frame) {
        if let Frame::Array(frames) = self {
            frames.push(frame);
        }
    }

    pub fn kind(&self) -> DataType {
        match self {
            Frame::Simple(_) => DataType::SimpleString,
            Frame::Error(_) => DataType::SimpleError,
            Frame::Integer(_) => DataType::Integer,
            Frame::Bulk(_) => DataType::BulkString,
            Frame::Array(_) => DataType::Array,
        }
    }

    /// The children of an array, or an empty slice for any other variant.
    pub fn as_array(&self) -> &[Frame] {
        match self {
            Frame::Array(frames) => frames,
            _ => &[],
        }
    }

    /// The payload of a bulk string as text, or an empty string for any other variant.
    pub fn as_bulk_text(&self) -> String {
        match self {
            Frame::Bulk(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            _ => String::new(),
        }
    }

    /// The payload of a bulk string, or empty bytes for any other variant.
    pub fn as_bulk_bytes(&self) -> Bytes {
        match self {
            Frame::Bulk(bytes) => bytes.clone(),
            _ => Bytes::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Frame::Error(_))
    }
}

// Protocol specification: https://redis.io/docs/reference/protocol-spec/
impl Frame {
    /// Parses one request frame starting at the cursor position. On success the cursor is left
    /// right after the frame, so its position is the number of bytes consumed.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        // The first byte in an RESP-serialized payload always identifies its type.
        // Subsequent bytes constitute the type's contents.
        let data_type = DataType::try_from(get_byte(src)?)?;

        match data_type {
            DataType::BulkString | DataType::Array => parse_body(src, data_type),
            data_type => Err(Error::Unsupported(data_type)),
        }
    }

    /// Parses one frame from the start of `buf` and returns it with the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), Error> {
        let mut cursor = Cursor::new(buf);
        let frame = Self::parse(&mut cursor)?;
        Ok((frame, cursor.position() as usize))
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Frame::Simple(s) => {
                let mut bytes = Vec::with_capacity(1 + s.len() + CRLF.len());
                bytes.push(u8::from(DataType::SimpleString));
                bytes.extend_from_slice(s.as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Frame::Error(s) => {
                let mut bytes = Vec::with_capacity(1 + s.len() + CRLF.len());
                bytes.push(u8::from(DataType::SimpleError));
                bytes.extend_from_slice(s.as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Frame::Integer(i) => {
                let digits = i.to_string();
                let mut bytes = Vec::with_capacity(1 + digits.len() + CRLF.len());
                bytes.push(u8::from(DataType::Integer));
                bytes.extend_from_slice(digits.as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes
            }
            // $<length>\r\n<data>\r\n
            Frame::Bulk(data) => {
                let length_str = data.len().to_string();
                let mut bytes =
                    Vec::with_capacity(1 + length_str.len() + CRLF.len() + data.len() + CRLF.len());
                bytes.push(u8::from(DataType::BulkString));
                bytes.extend_from_slice(length_str.as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes.extend_from_slice(data);
                bytes.extend_from_slice(CRLF);
                bytes
            }
            // *<number-of-elements>\r\n<element-1>...<element-n>
            Frame::Array(arr) => {
                let length_str = arr.len().to_string();
                let mut bytes = Vec::with_capacity(1 + length_str.len() + CRLF.len());
                bytes.push(u8::from(DataType::Array));
                bytes.extend_from_slice(length_str.as_bytes());
                bytes.extend_from_slice(CRLF);
                for frame in arr {
                    bytes.extend(frame.serialize());
                }
                bytes
            }
        }
    }
}

impl From<Frame> for Vec<u8> {
    fn from(frame: Frame) -> Self {
        frame.serialize()
    }
}

/// Compact rendering for logs and test failures, e.g. `[$'SET,$'key,$'value]`.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "+'{}", s),
            Frame::Error(s) => write!(f, "-'{}", s),
            Frame::Integer(i) => write!(f, ":'{}", i),
            Frame::Bulk(bytes) => write!(f, "$'{}", String::from_utf8_lossy(bytes)),
            Frame::Array(arr) => {
                write!(f, "[")?;
                for (i, frame) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", frame)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Parses any frame nested inside an array. Unlike [`Frame::parse`] every data type is accepted.
fn parse_value(src: &mut Cursor<&[u8]>) -> Result<Frame, Error> {
    let data_type = DataType::try_from(get_byte(src)?)?;
    parse_body(src, data_type)
}

fn parse_body(src: &mut Cursor<&[u8]>, data_type: DataType) -> Result<Frame, Error> {
    match data_type {
        DataType::SimpleString => {
            let line = get_line(src)?;
            Ok(Frame::Simple(to_string(line)?))
        }
        DataType::SimpleError => {
            let line = get_line(src)?;
            Ok(Frame::Error(to_string(line)?))
        }
        DataType::Integer => Ok(Frame::Integer(get_decimal(src)?)),
        // $<length>\r\n<data>\r\n
        DataType::BulkString => {
            let length = get_decimal(src)?;
            let length = usize::try_from(length)
                .map_err(|_| Error::Protocol(format!("invalid bulk string length {}", length)))?;

            let start = src.position() as usize;
            let buf = *src.get_ref();
            if buf.len() < start + length + CRLF.len() {
                return Err(Error::Incomplete);
            }

            let end = start + length;
            if &buf[end..end + CRLF.len()] != CRLF {
                return Err(Error::Protocol(
                    "bulk string payload is not followed by CRLF".to_string(),
                ));
            }

            let data = Bytes::copy_from_slice(&buf[start..end]);
            src.set_position((end + CRLF.len()) as u64);

            Ok(Frame::Bulk(data))
        }
        // *<number-of-elements>\r\n<element-1>...<element-n>
        DataType::Array => {
            let length = get_decimal(src)?;
            let length = usize::try_from(length)
                .map_err(|_| Error::Protocol(format!("invalid array length {}", length)))?;

            // The count comes from the peer, do not trust it for the allocation size.
            let mut frames = Vec::with_capacity(length.min(64));
            for _ in 0..length {
                frames.push(parse_value(src)?);
            }

            Ok(Frame::Array(frames))
        }
    }
}

/// Returns the bytes up to the next CRLF, excluding it, and moves the cursor past the CRLF.
fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let buf = *src.get_ref();

    let cr = match buf[start.min(buf.len())..].iter().position(|b| *b == b'\r') {
        Some(offset) => start + offset,
        None => return Err(Error::Incomplete),
    };

    match buf.get(cr + 1) {
        Some(b'\n') => {
            src.set_position((cr + CRLF.len()) as u64);
            Ok(&buf[start..cr])
        }
        Some(_) => Err(Error::Protocol(
            "line contains '\\r' not followed by '\\n'".to_string(),
        )),
        None => Err(Error::Incomplete),
    }
}

fn get_decimal(src: &mut Cursor<&[u8]>) -> Result<i64, Error> {
    let line = get_line(src)?;
    let line = std::str::from_utf8(line)
        .map_err(|_| Error::Protocol("invalid frame format".to_string()))?;

    line.parse::<i64>()
        .map_err(|e| Error::Protocol(format!("invalid integer {:?}: {}", line, e)))
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

fn to_string(bytes: &[u8]) -> Result<String, Error> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| Error::Protocol("invalid frame format".to_string()))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    SimpleString, // '+'
    SimpleError,  // '-'
    Integer,      // ':'
    BulkString,   // '$'
    Array,        // '*'
}

impl TryFrom<u8> for DataType {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'+' => Ok(Self::SimpleString),
            b'-' => Ok(Self::SimpleError),
            b':' => Ok(Self::Integer),
            b'$' => Ok(Self::BulkString),
            b'*' => Ok(Self::Array),
            _ => Err(Error::InvalidDataType(byte)),
        }
    }
}

impl From<DataType> for u8 {
    fn from(value: DataType) -> Self {
        match value {
            DataType::SimpleString => b'+',
            DataType::SimpleError => b'-',
            DataType::Integer => b':',
            DataType::BulkString => b'$',
            DataType::Array => b'*',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(data: &[u8]) -> Result<Frame, Error> {
        let mut cursor = Cursor::new(data);
        Frame::parse(&mut cursor)
    }

    #[test]
    fn parse_bulk_string_frame() {
        let frame = parse(b"$6\r\nfoobar\r\n");

        assert!(matches!(
            frame,
            Ok(Frame::Bulk(ref b)) if b == &Bytes::from("foobar")
        ));
    }

    #[test]
    fn parse_bulk_string_frame_empty() {
        let frame = parse(b"$0\r\n\r\n");

        assert!(matches!(
            frame,
            Ok(Frame::Bulk(ref b)) if b == &Bytes::from("")
        ));
    }

    #[test]
    fn parse_bulk_string_frame_binary_safe() {
        let frame = parse(b"$4\r\na\r\nb\r\n");

        assert!(matches!(
            frame,
            Ok(Frame::Bulk(ref b)) if b == &Bytes::from("a\r\nb")
        ));
    }

    #[test]
    fn parse_bulk_string_frame_short_payload() {
        let frame = parse(b"$5\r\nabc");

        assert!(matches!(frame, Err(Error::Incomplete)));
    }

    #[test]
    fn parse_bulk_string_frame_missing_crlf() {
        let frame = parse(b"$3\r\nabcde\r\n");

        assert!(matches!(frame, Err(Error::Protocol(_))));
    }

    #[test]
    fn parse_bulk_string_frame_negative_length() {
        let frame = parse(b"$-1\r\n");

        assert!(matches!(frame, Err(Error::Protocol(_))));
    }

    #[test]
    fn parse_array_frame_empty() {
        let frame = parse(b"*0\r\n");

        assert!(matches!(frame, Ok(Frame::Array(ref a)) if a.is_empty()));
    }

    #[test]
    fn parse_array_frame() {
        let frame = parse(b"*2\r\n$5\r\nhello\r\n$5\r\nworld\r\n").unwrap();

        assert_eq!(
            frame,
            Frame::Array(vec![
                Frame::Bulk(Bytes::from("hello")),
                Frame::Bulk(Bytes::from("world")),
            ])
        );
    }

    #[test]
    fn parse_array_frame_nested() {
        let data = b"*2\r\n*3\r\n:1\r\n:2\r\n:3\r\n*2\r\n+Hello\r\n-World\r\n";

        let frame = parse(data).unwrap();

        assert_eq!(
            frame,
            Frame::Array(vec![
                Frame::Array(vec![
                    Frame::Integer(1),
                    Frame::Integer(2),
                    Frame::Integer(3)
                ]),
                Frame::Array(vec![
                    Frame::Simple("Hello".to_string()),
                    Frame::Error("World".to_string())
                ]),
            ])
        );
    }

    #[test]
    fn parse_array_frame_element_failure() {
        let frame = parse(b"*2\r\n$5\r\nhello\r\n?oops\r\n");

        assert!(matches!(frame, Err(Error::InvalidDataType(b'?'))));
    }

    #[test]
    fn parse_top_level_simple_types_unsupported() {
        assert!(matches!(
            parse(b"+OK\r\n"),
            Err(Error::Unsupported(DataType::SimpleString))
        ));
        assert!(matches!(
            parse(b"-Error message\r\n"),
            Err(Error::Unsupported(DataType::SimpleError))
        ));
        assert!(matches!(
            parse(b":1000\r\n"),
            Err(Error::Unsupported(DataType::Integer))
        ));
    }

    #[test]
    fn parse_unknown_data_type() {
        assert!(matches!(parse(b"!3\r\nfoo\r\n"), Err(Error::InvalidDataType(b'!'))));
    }

    #[test]
    fn parse_carriage_return_without_line_feed() {
        assert!(matches!(parse(b"*1\rx\n"), Err(Error::Protocol(_))));
    }

    #[test]
    fn parse_malformed_length() {
        assert!(matches!(parse(b"*two\r\n"), Err(Error::Protocol(_))));
    }

    #[test]
    fn parse_empty_input() {
        assert!(matches!(parse(b""), Err(Error::Incomplete)));
    }

    #[test]
    fn decode_reports_consumed_bytes() {
        let data = b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n";

        let (frame, consumed) = Frame::decode(data).unwrap();

        assert_eq!(frame, Frame::Array(vec![Frame::bulk("PING")]));
        assert_eq!(consumed, 14);
    }

    #[test]
    fn serialize_frames() {
        assert_eq!(Frame::simple("OK").serialize(), b"+OK\r\n");
        assert_eq!(Frame::error("error").serialize(), b"-error\r\n");
        assert_eq!(Frame::integer(7734).serialize(), b":7734\r\n");
        assert_eq!(Frame::integer(-666).serialize(), b":-666\r\n");
        assert_eq!(Frame::bulk("hello").serialize(), b"$5\r\nhello\r\n");

        let mut array = Frame::array();
        array.push(Frame::bulk("hello"));
        array.push(Frame::integer(7734));
        assert_eq!(array.serialize(), b"*2\r\n$5\r\nhello\r\n:7734\r\n");
    }

    #[test]
    fn round_trip() {
        let frames = vec![
            Frame::bulk("value"),
            Frame::bulk(""),
            Frame::array(),
            Frame::Array(vec![
                Frame::bulk("HSET"),
                Frame::Array(vec![Frame::integer(-42), Frame::array()]),
                Frame::simple("OK"),
            ]),
        ];

        for frame in frames {
            let bytes = frame.serialize();
            let (parsed, consumed) = Frame::decode(&bytes).unwrap();
            assert_eq!(parsed, frame);
            assert_eq!(consumed, bytes.len());
        }
    }

    #[test]
    fn accessors_default_on_wrong_variant() {
        let frame = Frame::integer(1);

        assert!(frame.as_array().is_empty());
        assert_eq!(frame.as_bulk_text(), "");
        assert_eq!(frame.as_bulk_bytes(), Bytes::new());
        assert_eq!(frame.kind(), DataType::Integer);

        let mut simple = Frame::simple("OK");
        simple.push(Frame::bulk("ignored"));
        assert_eq!(simple, Frame::simple("OK"));
    }

    #[test]
    fn display() {
        let frame = Frame::Array(vec![
            Frame::simple("OK"),
            Frame::error("ERR"),
            Frame::integer(3),
            Frame::bulk("v"),
            Frame::Array(vec![Frame::bulk("a"), Frame::bulk("b")]),
        ]);

        assert_eq!(frame.to_string(), "[+'OK,-'ERR,:'3,$'v,[$'a,$'b]]");
        assert_eq!(Frame::array().to_string(), "[]");
    }
}
