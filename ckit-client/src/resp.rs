//! RESP encoding and reply parsing for the blocking client.
//!
//! Commands go out as arrays of bulk strings; replies come back as any of
//! the five frame kinds. Parsing reads line-by-line off a `BufRead`, which
//! is all a blocking client needs.

use std::io::BufRead;

use crate::client::{ClientError, ClientResult};

/// One server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+...` line.
    Simple(Vec<u8>),
    /// `-...` line.
    Error(Vec<u8>),
    /// `:n` line.
    Integer(i64),
    /// `$n` bulk payload; None is the absent reply.
    Bulk(Option<Vec<u8>>),
    /// `*n` array of nested replies.
    Array(Vec<Reply>),
}

/// Encodes one command as an array of bulk strings.
pub fn encode_command(args: &[&[u8]], out: &mut Vec<u8>) {
    out.push(b'*');
    out.extend_from_slice(args.len().to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
    for arg in args {
        out.push(b'$');
        out.extend_from_slice(arg.len().to_string().as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
}

/// Reads one reply, recursing into arrays. `line` is a scratch buffer the
/// caller owns so repeated reads reuse one allocation.
pub fn read_reply<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> ClientResult<Reply> {
    read_line(reader, line)?;
    let Some((&marker, rest)) = line.split_first() else {
        return Err(ClientError::Protocol);
    };
    match marker {
        b'+' => Ok(Reply::Simple(rest.to_vec())),
        b'-' => Ok(Reply::Error(rest.to_vec())),
        b':' => Ok(Reply::Integer(parse_i64(rest)?)),
        b'$' => {
            let len = parse_i64(rest)?;
            read_bulk(reader, len)
        }
        b'*' => {
            let len = parse_i64(rest)?;
            read_array(reader, len, line)
        }
        _ => Err(ClientError::Protocol),
    }
}

fn read_bulk<R: BufRead>(reader: &mut R, len: i64) -> ClientResult<Reply> {
    if len < 0 {
        return Ok(Reply::Bulk(None));
    }
    let mut data = vec![0u8; len as usize];
    reader.read_exact(&mut data)?;
    let mut crlf = [0u8; 2];
    reader.read_exact(&mut crlf)?;
    if crlf != [b'\r', b'\n'] {
        return Err(ClientError::Protocol);
    }
    Ok(Reply::Bulk(Some(data)))
}

fn read_array<R: BufRead>(reader: &mut R, len: i64, line: &mut Vec<u8>) -> ClientResult<Reply> {
    if len <= 0 {
        return Ok(Reply::Array(Vec::new()));
    }
    let mut items = Vec::with_capacity(len as usize);
    for _ in 0..len {
        items.push(read_reply(reader, line)?);
    }
    Ok(Reply::Array(items))
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> ClientResult<()> {
    buf.clear();
    let n = reader.read_until(b'\n', buf)?;
    if n == 0 {
        return Err(ClientError::ConnectionClosed);
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(ClientError::Protocol);
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn parse_i64(bytes: &[u8]) -> ClientResult<i64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or(ClientError::Protocol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(bytes: &[u8]) -> Reply {
        let mut reader = Cursor::new(bytes.to_vec());
        let mut line = Vec::new();
        read_reply(&mut reader, &mut line).expect("parse")
    }

    #[test]
    fn encodes_commands() {
        let mut buf = Vec::new();
        encode_command(&[b"GET", b"key"], &mut buf);
        assert_eq!(buf, b"*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n");
    }

    #[test]
    fn parses_every_reply_kind() {
        assert_eq!(parse(b"+OK\r\n"), Reply::Simple(b"OK".to_vec()));
        assert_eq!(parse(b"-ERR bad\r\n"), Reply::Error(b"ERR bad".to_vec()));
        assert_eq!(parse(b":42\r\n"), Reply::Integer(42));
        assert_eq!(parse(b"$5\r\nhello\r\n"), Reply::Bulk(Some(b"hello".to_vec())));
        assert_eq!(parse(b"$-1\r\n"), Reply::Bulk(None));
        assert_eq!(
            parse(b"*2\r\n$1\r\na\r\n:1\r\n"),
            Reply::Array(vec![Reply::Bulk(Some(b"a".to_vec())), Reply::Integer(1)])
        );
    }

    #[test]
    fn rejects_bad_framing() {
        let mut reader = Cursor::new(b"?what\r\n".to_vec());
        let mut line = Vec::new();
        assert!(read_reply(&mut reader, &mut line).is_err());

        let mut reader = Cursor::new(b"$5\r\nhelloXX".to_vec());
        assert!(read_reply(&mut reader, &mut line).is_err());
    }
}
