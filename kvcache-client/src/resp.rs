//! # RESP2 Encoding and Parsing
//!
//! Purpose: Encode client commands and parse server replies, keeping
//! allocations under control.
//!
//! ## Design Principles
//! 1. **State-Free Parsing**: Replies are parsed top-down with minimal state.
//! 2. **Buffer Reuse**: Caller provides buffers to avoid per-call allocations.
//! 3. **Binary-Safe**: Bulk strings are treated as raw bytes.
//! 4. **Fail Fast**: Invalid framing returns protocol errors immediately.

use std::io::BufRead;

use crate::error::{ClientError, ClientResult};

/// Deepest array nesting accepted in a reply.
const MAX_DEPTH: usize = 8;

/// RESP reply value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// +OK or +PONG style replies.
    Simple(Vec<u8>),
    /// -ERR ... replies.
    Error(Vec<u8>),
    /// :123 replies.
    Integer(i64),
    /// $... bulk strings, with None for null.
    Bulk(Option<Vec<u8>>),
    /// *... arrays; a null array is returned as empty.
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Unwraps an integer reply.
    pub fn into_integer(self) -> ClientResult<i64> {
        match self {
            RespValue::Integer(value) => Ok(value),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Unwraps a bulk reply, keeping null as `None`.
    pub fn into_bulk(self) -> ClientResult<Option<Vec<u8>>> {
        match self {
            RespValue::Bulk(data) => Ok(data),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Unwraps an array reply.
    pub fn into_array(self) -> ClientResult<Vec<RespValue>> {
        match self {
            RespValue::Array(items) => Ok(items),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Accepts a `+OK` style status reply.
    pub fn into_status(self) -> ClientResult<Vec<u8>> {
        match self {
            RespValue::Simple(text) => Ok(text),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

/// Encodes a RESP2 array command into the provided buffer.
pub fn encode_command(args: &[&[u8]], out: &mut Vec<u8>) {
    push_header(out, b'*', args.len());
    for arg in args {
        push_header(out, b'$', arg.len());
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
}

/// Reads one RESP value from the buffered reader.
pub fn read_response<R: BufRead>(reader: &mut R, line_buf: &mut Vec<u8>) -> ClientResult<RespValue> {
    read_value(reader, line_buf, 0)
}

fn read_value<R: BufRead>(
    reader: &mut R,
    line_buf: &mut Vec<u8>,
    depth: usize,
) -> ClientResult<RespValue> {
    read_line(reader, line_buf)?;
    let (&kind, rest) = line_buf.split_first().ok_or(ClientError::Protocol)?;

    match kind {
        b'+' => Ok(RespValue::Simple(rest.to_vec())),
        b'-' => Ok(RespValue::Error(rest.to_vec())),
        b':' => Ok(RespValue::Integer(parse_i64(rest)?)),
        b'$' => {
            let len = parse_i64(rest)?;
            read_bulk(reader, len)
        }
        b'*' => {
            let len = parse_i64(rest)?;
            if depth >= MAX_DEPTH {
                return Err(ClientError::Protocol);
            }
            read_array(reader, len, line_buf, depth)
        }
        _ => Err(ClientError::Protocol),
    }
}

fn read_bulk<R: BufRead>(reader: &mut R, len: i64) -> ClientResult<RespValue> {
    if len < 0 {
        return Ok(RespValue::Bulk(None));
    }

    let mut data = vec![0u8; len as usize + 2];
    reader.read_exact(&mut data)?;
    if !data.ends_with(b"\r\n") {
        return Err(ClientError::Protocol);
    }
    data.truncate(len as usize);
    Ok(RespValue::Bulk(Some(data)))
}

fn read_array<R: BufRead>(
    reader: &mut R,
    len: i64,
    line_buf: &mut Vec<u8>,
    depth: usize,
) -> ClientResult<RespValue> {
    if len <= 0 {
        return Ok(RespValue::Array(Vec::new()));
    }

    (0..len)
        .map(|_| read_value(reader, line_buf, depth + 1))
        .collect::<ClientResult<Vec<_>>>()
        .map(RespValue::Array)
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> ClientResult<()> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        // Peer closed the connection between replies.
        return Err(ClientError::Protocol);
    }
    if !buf.ends_with(b"\r\n") {
        return Err(ClientError::Protocol);
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn parse_i64(data: &[u8]) -> ClientResult<i64> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or(ClientError::Protocol)
}

fn push_header(out: &mut Vec<u8>, kind: u8, len: usize) {
    out.push(kind);
    out.extend_from_slice(IntArg::new(len as i64).as_bytes());
    out.extend_from_slice(b"\r\n");
}

/// Integer rendered into a stack buffer, ready to be sent as an argument.
pub struct IntArg {
    buf: [u8; 20],
    start: usize,
}

impl IntArg {
    pub fn new(value: i64) -> Self {
        let mut buf = [0u8; 20];
        let mut start = buf.len();
        let mut rest = value.unsigned_abs();
        loop {
            start -= 1;
            buf[start] = b'0' + (rest % 10) as u8;
            rest /= 10;
            if rest == 0 {
                break;
            }
        }
        if value < 0 {
            start -= 1;
            buf[start] = b'-';
        }
        IntArg { buf, start }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[self.start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(input: &[u8]) -> ClientResult<RespValue> {
        let mut reader = Cursor::new(input.to_vec());
        let mut line = Vec::new();
        read_response(&mut reader, &mut line)
    }

    #[test]
    fn encodes_command() {
        let mut buf = Vec::new();
        encode_command(&[b"LRANGE", b"list", b"0", b"-1"], &mut buf);
        assert_eq!(&buf, b"*4\r\n$6\r\nLRANGE\r\n$4\r\nlist\r\n$1\r\n0\r\n$2\r\n-1\r\n");
    }

    #[test]
    fn renders_integer_arguments() {
        assert_eq!(IntArg::new(0).as_bytes(), b"0");
        assert_eq!(IntArg::new(600).as_bytes(), b"600");
        assert_eq!(IntArg::new(-1).as_bytes(), b"-1");
        assert_eq!(IntArg::new(i64::MIN).as_bytes(), b"-9223372036854775808");
    }

    #[test]
    fn parses_scalar_replies() {
        assert_eq!(parse(b"+OK\r\n").unwrap(), RespValue::Simple(b"OK".to_vec()));
        assert_eq!(parse(b"-ERR bad\r\n").unwrap(), RespValue::Error(b"ERR bad".to_vec()));
        assert_eq!(parse(b":-2\r\n").unwrap(), RespValue::Integer(-2));
        assert_eq!(parse(b"$5\r\nhello\r\n").unwrap(), RespValue::Bulk(Some(b"hello".to_vec())));
        assert_eq!(parse(b"$-1\r\n").unwrap(), RespValue::Bulk(None));
    }

    #[test]
    fn parses_array_with_null_members() {
        let resp = parse(b"*3\r\n$1\r\na\r\n$-1\r\n$1\r\nc\r\n").unwrap();
        assert_eq!(
            resp,
            RespValue::Array(vec![
                RespValue::Bulk(Some(b"a".to_vec())),
                RespValue::Bulk(None),
                RespValue::Bulk(Some(b"c".to_vec())),
            ])
        );
        assert_eq!(parse(b"*-1\r\n").unwrap(), RespValue::Array(Vec::new()));
    }

    #[test]
    fn rejects_broken_framing() {
        assert!(matches!(parse(b"+OK\n"), Err(ClientError::Protocol)));
        assert!(matches!(parse(b"?what\r\n"), Err(ClientError::Protocol)));
        assert!(matches!(parse(b":12x\r\n"), Err(ClientError::Protocol)));
        assert!(matches!(parse(b"$3\r\nabcd\r\n"), Err(ClientError::Protocol)));
        assert!(matches!(parse(b""), Err(ClientError::Protocol)));
    }

    #[test]
    fn typed_accessors_reject_mismatches() {
        assert_eq!(RespValue::Integer(3).into_integer().unwrap(), 3);
        assert!(matches!(
            RespValue::Simple(b"OK".to_vec()).into_bulk(),
            Err(ClientError::UnexpectedResponse)
        ));
    }
}
