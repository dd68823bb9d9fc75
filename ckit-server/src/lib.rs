//! # CacheKit Server
//!
//! The RESP-facing half of CacheKit: the incremental wire codec, the
//! command dispatcher over the storage engine, the tokio connection loop,
//! and the counters INFO reports.

pub mod command;
pub mod protocol;
pub mod server;
pub mod stats;

pub use command::ServerCtx;
pub use protocol::{Frame, ReplyBuf, RespParser};
