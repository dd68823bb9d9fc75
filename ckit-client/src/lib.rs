//! # Synchronous Client
//!
//! A compact blocking client for CacheKit: encode a command array, write it,
//! read back one reply. One TCP connection per client; callers that want
//! concurrency open more clients.

pub mod client;
pub mod resp;

pub use client::{Client, ClientError, ClientResult, Ttl};
pub use resp::Reply;
