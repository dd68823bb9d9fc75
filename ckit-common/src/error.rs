//! # Error Taxonomy
//!
//! One enum per failure domain. The store errors carry the exact text a
//! client sees after the leading `-`, so the dispatcher can forward them
//! without reformatting.

use thiserror::Error;

/// Per-key operation failures surfaced to clients.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Operation targets a key whose kind forbids it.
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
    /// Value cannot be treated as a signed 64-bit integer.
    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,
}

/// Snapshot save/load failures. Load errors abandon the rest of the file but
/// keep whatever was already reconstructed.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid snapshot magic")]
    BadMagic,
    #[error("unsupported snapshot version {0}")]
    BadVersion(u32),
    #[error("unknown type marker 0x{0:02x}")]
    UnknownTag(u8),
    #[error("truncated snapshot record")]
    Truncated,
    #[error("record length {0} exceeds sanity limit")]
    OversizedRecord(u32),
}

/// Wire framing failures. Any of these close the connection after an error
/// reply is attempted.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid length prefix")]
    BadLength,
    #[error("frame exceeds maximum size")]
    Oversized,
    #[error("malformed frame")]
    Malformed,
}
