//! # Shared Types and Helpers
//!
//! Small pieces used by both the storage engine and the server: the error
//! taxonomy, the KEYS glob matcher, wall-clock helpers, and strict integer
//! parsing for protocol arguments.

pub mod error;
pub mod glob;
pub mod num;
pub mod time;

pub use error::{FrameError, SnapshotError, StoreError};
pub use glob::glob_match;
pub use num::parse_i64;
pub use time::{unix_ms, unix_secs};
