//! RESP2 Framing
//!
//! Incremental parser and encoder for the Redis serialization protocol,
//! shared by the client connection and the in-memory server. Bulk strings are
//! binary-safe `Bytes`.

use crate::command::Command;
use crate::error::{Error, Result};
use crate::value::Value;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Nested arrays deeper than this are rejected.
const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Option<Bytes>),
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    pub fn null() -> Self {
        RespValue::BulkString(None)
    }

    pub fn bulk(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(Some(data.into()))
    }

    pub fn err(msg: impl Into<String>) -> Self {
        RespValue::Error(msg.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::BulkString(None) | RespValue::Array(None))
    }

    /// Converts a scalar reply. Arrays are a protocol error here.
    pub fn into_value(self) -> Result<Value> {
        match self {
            RespValue::SimpleString(s) => Ok(Value::from(s)),
            RespValue::Integer(n) => Ok(Value::Int(n)),
            RespValue::BulkString(Some(b)) => Ok(Value::Data(b)),
            RespValue::BulkString(None) | RespValue::Array(None) => Ok(Value::Nil),
            RespValue::Error(e) => Err(Error::Server(e)),
            RespValue::Array(Some(_)) => Err(Error::protocol("expected a scalar reply, got an array")),
        }
    }

    /// Converts an array reply; a null array becomes empty.
    pub fn into_array(self) -> Result<Vec<RespValue>> {
        match self {
            RespValue::Array(Some(items)) => Ok(items),
            RespValue::Array(None) | RespValue::BulkString(None) => Ok(Vec::new()),
            RespValue::Error(e) => Err(Error::Server(e)),
            other => Err(Error::protocol(format!("expected an array reply, got {:?}", other))),
        }
    }

    /// Converts an array of scalars.
    pub fn into_values(self) -> Result<Vec<Value>> {
        self.into_array()?.into_iter().map(RespValue::into_value).collect()
    }

    pub fn into_int(self) -> Result<i64> {
        match self {
            RespValue::Integer(n) => Ok(n),
            RespValue::BulkString(None) => Ok(0),
            RespValue::Error(e) => Err(Error::Server(e)),
            other => {
                let v = other.into_value()?;
                crate::Codec::decode(v)
            }
        }
    }

    pub fn into_float(self) -> Result<f64> {
        crate::Codec::decode(self.into_value()?)
    }

    /// `:1` / `+OK` are true; `:0` / null are false.
    pub fn into_bool(self) -> Result<bool> {
        match self {
            RespValue::Integer(n) => Ok(n != 0),
            RespValue::SimpleString(_) => Ok(true),
            RespValue::BulkString(None) | RespValue::Array(None) => Ok(false),
            RespValue::Error(e) => Err(Error::Server(e)),
            other => crate::Codec::decode(other.into_value()?),
        }
    }
}

// ============================================================================
// Parsing
// ============================================================================

pub struct RespParser;

impl RespParser {
    /// Parses one value from the front of `buf`.
    ///
    /// Returns `Ok(None)` when the buffer holds an incomplete frame, and the
    /// number of bytes consumed otherwise.
    pub fn parse(buf: &[u8]) -> Result<Option<(RespValue, usize)>> {
        Self::parse_at(buf, 0, 0)
    }

    fn parse_at(buf: &[u8], pos: usize, depth: usize) -> Result<Option<(RespValue, usize)>> {
        if depth > MAX_DEPTH {
            return Err(Error::protocol("nesting too deep"));
        }
        let (line, next) = match read_line(buf, pos) {
            Some(found) => found,
            None => return Ok(None),
        };
        if line.is_empty() {
            return Err(Error::protocol("empty frame header"));
        }
        let payload = &line[1..];
        match line[0] {
            b'+' => Ok(Some((RespValue::SimpleString(utf8(payload)?), next))),
            b'-' => Ok(Some((RespValue::Error(utf8(payload)?), next))),
            b':' => Ok(Some((RespValue::Integer(parse_i64(payload)?), next))),
            b'$' => {
                let len = parse_i64(payload)?;
                if len < 0 {
                    return Ok(Some((RespValue::BulkString(None), next)));
                }
                let len = len as usize;
                if buf.len() < next + len + 2 {
                    return Ok(None);
                }
                if &buf[next + len..next + len + 2] != b"\r\n" {
                    return Err(Error::protocol("bulk string missing CRLF"));
                }
                let data = Bytes::copy_from_slice(&buf[next..next + len]);
                Ok(Some((RespValue::BulkString(Some(data)), next + len + 2)))
            }
            b'*' => {
                let len = parse_i64(payload)?;
                if len < 0 {
                    return Ok(Some((RespValue::Array(None), next)));
                }
                let mut items = Vec::with_capacity((len as usize).min(1024));
                let mut cursor = next;
                for _ in 0..len {
                    match Self::parse_at(buf, cursor, depth + 1)? {
                        Some((item, after)) => {
                            items.push(item);
                            cursor = after;
                        }
                        None => return Ok(None),
                    }
                }
                Ok(Some((RespValue::Array(Some(items)), cursor)))
            }
            other => Err(Error::protocol(format!("invalid type marker: {:#x}", other))),
        }
    }

    pub fn encode(value: &RespValue) -> Vec<u8> {
        let mut buf = BytesMut::new();
        Self::encode_into(value, &mut buf);
        buf.to_vec()
    }

    pub fn encode_into(value: &RespValue, buf: &mut BytesMut) {
        match value {
            RespValue::SimpleString(s) => {
                buf.put_u8(b'+');
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::Error(s) => {
                buf.put_u8(b'-');
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::Integer(n) => {
                buf.put_u8(b':');
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::BulkString(None) => buf.extend_from_slice(b"$-1\r\n"),
            RespValue::BulkString(Some(data)) => put_bulk(buf, data),
            RespValue::Array(None) => buf.extend_from_slice(b"*-1\r\n"),
            RespValue::Array(Some(items)) => {
                buf.put_u8(b'*');
                buf.extend_from_slice(items.len().to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
                for item in items {
                    Self::encode_into(item, buf);
                }
            }
        }
    }

    /// Encodes a command as an array of bulk strings.
    pub fn encode_command(cmd: &Command, buf: &mut BytesMut) {
        buf.put_u8(b'*');
        buf.extend_from_slice((cmd.args().len() + 1).to_string().as_bytes());
        buf.extend_from_slice(b"\r\n");
        put_bulk(buf, cmd.name().as_bytes());
        for arg in cmd.args() {
            put_bulk(buf, arg);
        }
    }
}

fn put_bulk(buf: &mut BytesMut, data: &[u8]) {
    buf.put_u8(b'$');
    buf.extend_from_slice(data.len().to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(data);
    buf.extend_from_slice(b"\r\n");
}

fn read_line(buf: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    let rest = buf.get(pos..)?;
    let nl = memchr::memchr(b'\n', rest)?;
    if nl == 0 || rest[nl - 1] != b'\r' {
        // A bare LF: hand back the whole line and let the header check fail.
        return Some((&rest[..nl], pos + nl + 1));
    }
    Some((&rest[..nl - 1], pos + nl + 1))
}

fn utf8(data: &[u8]) -> Result<String> {
    String::from_utf8(data.to_vec()).map_err(|_| Error::protocol("invalid UTF-8 in simple string"))
}

fn parse_i64(data: &[u8]) -> Result<i64> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| Error::protocol("invalid length or integer"))
}

// ============================================================================
// tokio-util codec
// ============================================================================

/// Frames a byte stream into [`RespValue`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct RespCodec;

impl Decoder for RespCodec {
    type Item = RespValue;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<RespValue>> {
        match RespParser::parse(src)? {
            Some((value, consumed)) => {
                src.advance(consumed);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<RespValue> for RespCodec {
    type Error = Error;

    fn encode(&mut self, item: RespValue, dst: &mut BytesMut) -> Result<()> {
        RespParser::encode_into(&item, dst);
        Ok(())
    }
}

impl Encoder<Command> for RespCodec {
    type Error = Error;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<()> {
        RespParser::encode_command(&item, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_and_integer() {
        let (v, n) = RespParser::parse(b"+OK\r\n").unwrap().unwrap();
        assert_eq!(v, RespValue::ok());
        assert_eq!(n, 5);
        let (v, _) = RespParser::parse(b":-12\r\n").unwrap().unwrap();
        assert_eq!(v, RespValue::Integer(-12));
    }

    #[test]
    fn test_parse_bulk_is_binary_safe() {
        let (v, n) = RespParser::parse(b"$4\r\na\r\nb\r\n").unwrap().unwrap();
        assert_eq!(v, RespValue::bulk(Bytes::from_static(b"a\r\nb")));
        assert_eq!(n, 10);
    }

    #[test]
    fn test_incomplete_frames() {
        assert!(RespParser::parse(b"$5\r\nhel").unwrap().is_none());
        assert!(RespParser::parse(b"*2\r\n:1\r\n").unwrap().is_none());
        assert!(RespParser::parse(b"+OK").unwrap().is_none());
    }

    #[test]
    fn test_null_replies() {
        let (v, _) = RespParser::parse(b"$-1\r\n").unwrap().unwrap();
        assert!(v.is_null());
        let (v, _) = RespParser::parse(b"*-1\r\n").unwrap().unwrap();
        assert_eq!(v, RespValue::Array(None));
    }

    #[test]
    fn test_invalid_marker() {
        assert!(RespParser::parse(b"?what\r\n").is_err());
    }

    #[test]
    fn test_nested_array_encode_parse() {
        let value = RespValue::Array(Some(vec![
            RespValue::bulk("a"),
            RespValue::Array(Some(vec![RespValue::Integer(1), RespValue::null()])),
        ]));
        let bytes = RespParser::encode(&value);
        let (parsed, n) = RespParser::parse(&bytes).unwrap().unwrap();
        assert_eq!(parsed, value);
        assert_eq!(n, bytes.len());
    }

    #[test]
    fn test_encode_command() {
        let cmd = Command::new("GET").arg("key");
        let mut buf = BytesMut::new();
        RespParser::encode_command(&cmd, &mut buf);
        assert_eq!(&buf[..], b"*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n");
    }

    #[test]
    fn test_codec_decodes_pipelined_frames() {
        let mut codec = RespCodec;
        let mut buf = BytesMut::from(&b"+OK\r\n:3\r\n$1\r"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(RespValue::ok()));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(RespValue::Integer(3)));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"\nx\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(RespValue::bulk("x")));
    }

    #[test]
    fn test_reply_conversions() {
        assert_eq!(RespValue::Integer(0).into_bool().unwrap(), false);
        assert_eq!(RespValue::ok().into_bool().unwrap(), true);
        assert_eq!(RespValue::null().into_value().unwrap(), Value::Nil);
        assert!(matches!(
            RespValue::err("WRONGTYPE").into_value(),
            Err(Error::Server(_))
        ));
        assert_eq!(RespValue::bulk("12").into_int().unwrap(), 12);
        assert_eq!(RespValue::bulk("1.5").into_float().unwrap(), 1.5);
    }
}
