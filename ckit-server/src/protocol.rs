//! # RESP Wire Codec
//!
//! Incremental parser and reply writer for the five-frame text protocol:
//! `+` simple string, `-` error, `:` integer, `$` bulk string, `*` array,
//! with `$-1`/`*-1` as the absent frame and a telnet-friendly inline
//! fallback for lines that start with none of the markers.
//!
//! ## Parsing Discipline
//! The parser owns a growable buffer and a cursor. `feed` appends bytes,
//! compacting consumed data first; `parse` either yields one whole frame
//! and advances the cursor, or reports that more bytes are needed and
//! leaves the cursor untouched. Arrays save the cursor before descending
//! and rewind it when any child comes up short, so a frame is never
//! half-consumed.

use bytes::BytesMut;

use ckit_common::FrameError;

/// Bulk payloads and length prefixes above this are treated as corruption,
/// not as a request to allocate.
pub const MAX_BULK_LEN: usize = 64 * 1024 * 1024;

/// One logical message on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Simple(Vec<u8>),
    Error(Vec<u8>),
    Integer(i64),
    Bulk(Vec<u8>),
    /// Absent bulk string or absent array.
    Null,
    Array(Vec<Frame>),
}

/// Incremental frame parser over a growable byte buffer.
#[derive(Debug, Default)]
pub struct RespParser {
    buf: BytesMut,
    pos: usize,
}

impl RespParser {
    pub fn new() -> Self {
        RespParser {
            buf: BytesMut::with_capacity(4096),
            pos: 0,
        }
    }

    /// Appends newly read bytes, first discarding everything already
    /// consumed so the buffer does not grow without bound.
    pub fn feed(&mut self, data: &[u8]) {
        if self.pos > 0 {
            let _ = self.buf.split_to(self.pos);
            self.pos = 0;
        }
        self.buf.extend_from_slice(data);
    }

    /// Tries to extract one frame. `Ok(None)` means the buffer holds only a
    /// prefix of a frame; feed more bytes and retry. Errors poison the
    /// stream and the connection should be dropped after replying.
    pub fn parse(&mut self) -> Result<Option<Frame>, FrameError> {
        if self.pos >= self.buf.len() {
            return Ok(None);
        }
        let saved = self.pos;
        match self.parse_value() {
            Ok(Some(frame)) => Ok(Some(frame)),
            Ok(None) => {
                self.pos = saved;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn parse_value(&mut self) -> Result<Option<Frame>, FrameError> {
        if self.pos >= self.buf.len() {
            return Ok(None);
        }
        match self.buf[self.pos] {
            b'+' => Ok(self.parse_line(1)?.map(Frame::Simple)),
            b'-' => Ok(self.parse_line(1)?.map(Frame::Error)),
            b':' => self.parse_integer(),
            b'$' => self.parse_bulk(),
            b'*' => self.parse_array(),
            // inline command: the whole line is one simple-string frame
            _ => Ok(self.parse_line(0)?.map(Frame::Simple)),
        }
    }

    /// Index of the `\r` of the next CRLF at or after `from`.
    fn find_crlf(&self, from: usize) -> Option<usize> {
        if self.buf.len() < 2 {
            return None;
        }
        (from..self.buf.len() - 1)
            .find(|&i| self.buf[i] == b'\r' && self.buf[i + 1] == b'\n')
    }

    /// Line content starting `skip` bytes past the cursor, up to CRLF.
    fn parse_line(&mut self, skip: usize) -> Result<Option<Vec<u8>>, FrameError> {
        let start = self.pos + skip;
        let Some(crlf) = self.find_crlf(start) else {
            return Ok(None);
        };
        let line = self.buf[start..crlf].to_vec();
        self.pos = crlf + 2;
        Ok(Some(line))
    }

    fn parse_integer(&mut self) -> Result<Option<Frame>, FrameError> {
        let Some(line) = self.parse_line(1)? else {
            return Ok(None);
        };
        let value = ckit_common::parse_i64(&line).ok_or(FrameError::Malformed)?;
        Ok(Some(Frame::Integer(value)))
    }

    /// Signed decimal length prefix for `$` and `*` headers.
    fn parse_len(line: &[u8]) -> Result<i64, FrameError> {
        ckit_common::parse_i64(line).ok_or(FrameError::BadLength)
    }

    fn parse_bulk(&mut self) -> Result<Option<Frame>, FrameError> {
        let Some(crlf) = self.find_crlf(self.pos + 1) else {
            return Ok(None);
        };
        let len = Self::parse_len(&self.buf[self.pos + 1..crlf])?;
        if len < 0 {
            self.pos = crlf + 2;
            return Ok(Some(Frame::Null));
        }
        let len = len as usize;
        if len > MAX_BULK_LEN {
            return Err(FrameError::Oversized);
        }

        let data_start = crlf + 2;
        if data_start + len + 2 > self.buf.len() {
            return Ok(None);
        }
        if &self.buf[data_start + len..data_start + len + 2] != b"\r\n" {
            return Err(FrameError::Malformed);
        }
        let data = self.buf[data_start..data_start + len].to_vec();
        self.pos = data_start + len + 2;
        Ok(Some(Frame::Bulk(data)))
    }

    fn parse_array(&mut self) -> Result<Option<Frame>, FrameError> {
        let Some(crlf) = self.find_crlf(self.pos + 1) else {
            return Ok(None);
        };
        let count = Self::parse_len(&self.buf[self.pos + 1..crlf])?;
        if count < 0 {
            self.pos = crlf + 2;
            return Ok(Some(Frame::Null));
        }

        // speculative descent: rewind to here if any element is incomplete
        let saved = self.pos;
        self.pos = crlf + 2;

        // capacity hint only; a hostile count must not drive the allocation
        let mut items = Vec::with_capacity((count as usize).min(64));
        for _ in 0..count {
            match self.parse_value()? {
                Some(frame) => items.push(frame),
                None => {
                    self.pos = saved;
                    return Ok(None);
                }
            }
        }
        Ok(Some(Frame::Array(items)))
    }
}

/// Growable reply buffer exposing the five reply kinds.
#[derive(Debug, Default)]
pub struct ReplyBuf {
    buf: BytesMut,
}

impl ReplyBuf {
    pub fn new() -> Self {
        ReplyBuf {
            buf: BytesMut::with_capacity(256),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn write_simple(&mut self, msg: &str) {
        self.buf.extend_from_slice(b"+");
        self.buf.extend_from_slice(msg.as_bytes());
        self.buf.extend_from_slice(b"\r\n");
    }

    pub fn write_error(&mut self, msg: &str) {
        self.buf.extend_from_slice(b"-");
        self.buf.extend_from_slice(msg.as_bytes());
        self.buf.extend_from_slice(b"\r\n");
    }

    pub fn write_integer(&mut self, value: i64) {
        self.buf.extend_from_slice(b":");
        self.buf.extend_from_slice(value.to_string().as_bytes());
        self.buf.extend_from_slice(b"\r\n");
    }

    pub fn write_bulk(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(b"$");
        self.buf.extend_from_slice(data.len().to_string().as_bytes());
        self.buf.extend_from_slice(b"\r\n");
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\r\n");
    }

    pub fn write_null(&mut self) {
        self.buf.extend_from_slice(b"$-1\r\n");
    }

    /// Writes `*N\r\n`; the N values follow via the other writers. The
    /// declared count is not enforced.
    pub fn write_array_header(&mut self, count: usize) {
        self.buf.extend_from_slice(b"*");
        self.buf.extend_from_slice(count.to_string().as_bytes());
        self.buf.extend_from_slice(b"\r\n");
    }

    /// Serializes an arbitrary frame, mainly for tests and tooling.
    pub fn write_frame(&mut self, frame: &Frame) {
        match frame {
            Frame::Simple(s) => {
                self.buf.extend_from_slice(b"+");
                self.buf.extend_from_slice(s);
                self.buf.extend_from_slice(b"\r\n");
            }
            Frame::Error(s) => {
                self.buf.extend_from_slice(b"-");
                self.buf.extend_from_slice(s);
                self.buf.extend_from_slice(b"\r\n");
            }
            Frame::Integer(n) => self.write_integer(*n),
            Frame::Bulk(data) => self.write_bulk(data),
            Frame::Null => self.write_null(),
            Frame::Array(items) => {
                self.write_array_header(items.len());
                for item in items {
                    self.write_frame(item);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(input: &[u8]) -> Vec<Frame> {
        let mut parser = RespParser::new();
        parser.feed(input);
        let mut frames = Vec::new();
        while let Some(frame) = parser.parse().expect("valid input") {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn parses_each_frame_kind() {
        assert_eq!(parse_all(b"+OK\r\n"), vec![Frame::Simple(b"OK".to_vec())]);
        assert_eq!(
            parse_all(b"-ERR nope\r\n"),
            vec![Frame::Error(b"ERR nope".to_vec())]
        );
        assert_eq!(parse_all(b":-42\r\n"), vec![Frame::Integer(-42)]);
        assert_eq!(
            parse_all(b"$5\r\nhello\r\n"),
            vec![Frame::Bulk(b"hello".to_vec())]
        );
        assert_eq!(parse_all(b"$-1\r\n"), vec![Frame::Null]);
        assert_eq!(parse_all(b"*-1\r\n"), vec![Frame::Null]);
        assert_eq!(parse_all(b"$0\r\n\r\n"), vec![Frame::Bulk(Vec::new())]);
        assert_eq!(parse_all(b"*0\r\n"), vec![Frame::Array(Vec::new())]);
    }

    #[test]
    fn parses_command_array() {
        let frames = parse_all(b"*2\r\n$3\r\nGET\r\n$1\r\nx\r\n");
        assert_eq!(
            frames,
            vec![Frame::Array(vec![
                Frame::Bulk(b"GET".to_vec()),
                Frame::Bulk(b"x".to_vec()),
            ])]
        );
    }

    #[test]
    fn inline_line_is_a_simple_frame() {
        assert_eq!(
            parse_all(b"PING extra\r\n"),
            vec![Frame::Simple(b"PING extra".to_vec())]
        );
    }

    #[test]
    fn needs_more_without_consuming() {
        let mut parser = RespParser::new();
        parser.feed(b"*2\r\n$3\r\nGET\r\n$1");
        assert_eq!(parser.parse().unwrap(), None);
        // retry still sees the full prefix
        assert_eq!(parser.parse().unwrap(), None);
        parser.feed(b"\r\nx\r\n");
        let frame = parser.parse().unwrap().expect("complete now");
        assert_eq!(
            frame,
            Frame::Array(vec![
                Frame::Bulk(b"GET".to_vec()),
                Frame::Bulk(b"x".to_vec()),
            ])
        );
        assert_eq!(parser.parse().unwrap(), None);
    }

    #[test]
    fn byte_at_a_time_matches_single_feed() {
        let input = b"*3\r\n$3\r\nSET\r\n$1\r\nx\r\n$1\r\n1\r\n+OK\r\n:7\r\n";
        let expected = parse_all(input);

        let mut parser = RespParser::new();
        let mut frames = Vec::new();
        for &byte in input.iter() {
            parser.feed(&[byte]);
            while let Some(frame) = parser.parse().expect("valid input") {
                frames.push(frame);
            }
        }
        assert_eq!(frames, expected);
        assert_eq!(frames.len(), 3);
    }

    #[test]
    fn pipelined_frames_come_out_in_order() {
        let frames = parse_all(b"*1\r\n$4\r\nPING\r\n*1\r\n$6\r\nDBSIZE\r\n");
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn nested_arrays_roundtrip() {
        let frame = Frame::Array(vec![
            Frame::Integer(1),
            Frame::Array(vec![Frame::Bulk(b"a".to_vec()), Frame::Null]),
            Frame::Simple(b"done".to_vec()),
        ]);
        let mut out = ReplyBuf::new();
        out.write_frame(&frame);
        assert_eq!(parse_all(out.as_bytes()), vec![frame]);
    }

    #[test]
    fn roundtrip_every_kind() {
        let frames = vec![
            Frame::Simple(b"OK".to_vec()),
            Frame::Error(b"ERR broken".to_vec()),
            Frame::Integer(i64::MIN),
            Frame::Bulk(b"bytes \x00\xff here".to_vec()),
            Frame::Null,
            Frame::Array(Vec::new()),
        ];
        let mut out = ReplyBuf::new();
        for frame in &frames {
            out.write_frame(frame);
        }
        assert_eq!(parse_all(out.as_bytes()), frames);
    }

    #[test]
    fn bad_length_prefix_is_an_error() {
        let mut parser = RespParser::new();
        parser.feed(b"$abc\r\n");
        assert_eq!(parser.parse(), Err(FrameError::BadLength));

        let mut parser = RespParser::new();
        parser.feed(b"*x\r\n");
        assert_eq!(parser.parse(), Err(FrameError::BadLength));
    }

    #[test]
    fn oversized_bulk_is_rejected() {
        let mut parser = RespParser::new();
        parser.feed(b"$67108865\r\n");
        assert_eq!(parser.parse(), Err(FrameError::Oversized));
    }

    #[test]
    fn missing_bulk_terminator_is_malformed() {
        let mut parser = RespParser::new();
        parser.feed(b"$3\r\nabcXY");
        assert_eq!(parser.parse(), Err(FrameError::Malformed));
    }

    #[test]
    fn writer_emits_expected_bytes() {
        let mut out = ReplyBuf::new();
        out.write_simple("OK");
        out.write_error("ERR bad");
        out.write_integer(42);
        out.write_bulk(b"hi");
        out.write_null();
        out.write_array_header(2);
        assert_eq!(
            out.as_bytes(),
            b"+OK\r\n-ERR bad\r\n:42\r\n$2\r\nhi\r\n$-1\r\n*2\r\n".as_slice()
        );
        out.clear();
        assert!(out.is_empty());
    }
}
