//! Blocking client over one TCP connection.
//!
//! `command` sends any argument vector and returns the raw [`Reply`]; the
//! typed helpers cover the verbs the tests lean on and turn `-ERR` replies
//! into [`ClientError::Server`].

use std::io::{BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;

use crate::resp::{encode_command, read_reply, Reply};

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error")]
    Protocol,
    #[error("connection closed")]
    ConnectionClosed,
    #[error("server error: {}", String::from_utf8_lossy(.0))]
    Server(Vec<u8>),
    #[error("unexpected reply type")]
    UnexpectedReply,
}

/// TTL state reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Key missing or already expired (`:-2`).
    Missing,
    /// Key exists without a deadline (`:-1`).
    NoExpiry,
    /// Seconds until expiry.
    ExpiresIn(u64),
}

pub struct Client {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
    wbuf: Vec<u8>,
    line: Vec<u8>,
}

impl Client {
    pub fn connect(addr: impl ToSocketAddrs) -> ClientResult<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Client {
            writer: stream,
            reader,
            wbuf: Vec::with_capacity(256),
            line: Vec::with_capacity(128),
        })
    }

    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> ClientResult<()> {
        self.writer.set_read_timeout(timeout)?;
        Ok(())
    }

    /// Sends one command and reads one reply.
    pub fn command(&mut self, args: &[&[u8]]) -> ClientResult<Reply> {
        self.wbuf.clear();
        encode_command(args, &mut self.wbuf);
        self.writer.write_all(&self.wbuf)?;
        read_reply(&mut self.reader, &mut self.line)
    }

    /// Like [`Client::command`], but `-ERR` replies become errors.
    fn command_checked(&mut self, args: &[&[u8]]) -> ClientResult<Reply> {
        match self.command(args)? {
            Reply::Error(msg) => Err(ClientError::Server(msg)),
            reply => Ok(reply),
        }
    }

    pub fn ping(&mut self) -> ClientResult<()> {
        match self.command_checked(&[b"PING"])? {
            Reply::Simple(msg) if msg == b"PONG" => Ok(()),
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    pub fn set(&mut self, key: &[u8], value: &[u8]) -> ClientResult<()> {
        match self.command_checked(&[b"SET", key, value])? {
            Reply::Simple(_) => Ok(()),
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    pub fn set_ex(&mut self, key: &[u8], value: &[u8], seconds: u64) -> ClientResult<()> {
        let secs = seconds.to_string();
        match self.command_checked(&[b"SET", key, value, b"EX", secs.as_bytes()])? {
            Reply::Simple(_) => Ok(()),
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    pub fn get(&mut self, key: &[u8]) -> ClientResult<Option<Vec<u8>>> {
        match self.command_checked(&[b"GET", key])? {
            Reply::Bulk(value) => Ok(value),
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    pub fn del(&mut self, key: &[u8]) -> ClientResult<i64> {
        self.integer_command(&[b"DEL", key])
    }

    pub fn incr(&mut self, key: &[u8]) -> ClientResult<i64> {
        self.integer_command(&[b"INCR", key])
    }

    pub fn decr(&mut self, key: &[u8]) -> ClientResult<i64> {
        self.integer_command(&[b"DECR", key])
    }

    pub fn expire(&mut self, key: &[u8], seconds: i64) -> ClientResult<bool> {
        let secs = seconds.to_string();
        Ok(self.integer_command(&[b"EXPIRE", key, secs.as_bytes()])? == 1)
    }

    pub fn ttl(&mut self, key: &[u8]) -> ClientResult<Ttl> {
        match self.integer_command(&[b"TTL", key])? {
            -2 => Ok(Ttl::Missing),
            -1 => Ok(Ttl::NoExpiry),
            secs if secs >= 0 => Ok(Ttl::ExpiresIn(secs as u64)),
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    pub fn dbsize(&mut self) -> ClientResult<i64> {
        self.integer_command(&[b"DBSIZE"])
    }

    fn integer_command(&mut self, args: &[&[u8]]) -> ClientResult<i64> {
        match self.command_checked(args)? {
            Reply::Integer(n) => Ok(n),
            _ => Err(ClientError::UnexpectedReply),
        }
    }
}
