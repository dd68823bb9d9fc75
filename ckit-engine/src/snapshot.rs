//! # Binary Snapshot
//!
//! Point-in-time serialization of the whole keyspace to a single file:
//! 8-byte magic, u32 version, u64 unix-seconds stamp, then one record per
//! live entry (type tag, length-prefixed key, payload, i64 deadline), closed
//! by a 0xFF terminator. All integers little-endian, length prefixes u32.
//!
//! The writer targets `<path>.tmp` and swaps it in with remove-then-rename,
//! so readers observe either the old file or the new one. The reader
//! reconstructs entries through the store's own insertion primitives and
//! leaves whatever it managed to load in place when it hits a bad record.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use ckit_common::{unix_secs, SnapshotError};

use crate::store::Store;
use crate::value::Value;

pub const SNAPSHOT_MAGIC: &[u8; 8] = b"CACHEKIT";
pub const SNAPSHOT_VERSION: u32 = 1;

const TAG_STRING: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_LIST: u8 = 0x03;
const TAG_HASH: u8 = 0x04;
const TAG_EOF: u8 = 0xFF;

/// Length-prefix sanity cap; anything larger marks a corrupt file.
const MAX_RECORD_LEN: u32 = 64 * 1024 * 1024;

fn write_bytes(w: &mut impl Write, data: &[u8]) -> Result<(), SnapshotError> {
    w.write_all(&(data.len() as u32).to_le_bytes())?;
    w.write_all(data)?;
    Ok(())
}

/// Saves every live, non-expired entry to `path`.
pub fn save(store: &Store, path: &Path) -> Result<(), SnapshotError> {
    let tmp = tmp_path(path);
    let mut w = BufWriter::new(File::create(&tmp)?);

    w.write_all(SNAPSHOT_MAGIC)?;
    w.write_all(&SNAPSHOT_VERSION.to_le_bytes())?;
    w.write_all(&unix_secs().to_le_bytes())?;

    let now = ckit_common::unix_ms();
    let mut written = 0usize;
    for (key, entry) in store.iter() {
        if entry.is_expired(now) {
            continue;
        }
        match &entry.value {
            Value::Str(s) => {
                w.write_all(&[TAG_STRING])?;
                write_bytes(&mut w, key)?;
                write_bytes(&mut w, s)?;
            }
            Value::Int(n) => {
                w.write_all(&[TAG_INT])?;
                write_bytes(&mut w, key)?;
                w.write_all(&n.to_le_bytes())?;
            }
            Value::List(list) => {
                w.write_all(&[TAG_LIST])?;
                write_bytes(&mut w, key)?;
                w.write_all(&(list.len() as u32).to_le_bytes())?;
                for item in list.iter() {
                    write_bytes(&mut w, item)?;
                }
            }
            Value::Hash(map) => {
                w.write_all(&[TAG_HASH])?;
                write_bytes(&mut w, key)?;
                w.write_all(&(map.len() as u32).to_le_bytes())?;
                for (field, value) in map.iter() {
                    write_bytes(&mut w, field)?;
                    write_bytes(&mut w, value)?;
                }
            }
        }
        w.write_all(&entry.expire_at.unwrap_or(0).to_le_bytes())?;
        written += 1;
    }

    w.write_all(&[TAG_EOF])?;
    w.flush()?;
    drop(w);

    // remove-then-rename: readers see either the old file or the new one
    let _ = fs::remove_file(path);
    fs::rename(&tmp, path)?;

    info!(path = %path.display(), keys = written, "saved snapshot");
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn read_exact(r: &mut impl Read, buf: &mut [u8]) -> Result<(), SnapshotError> {
    r.read_exact(buf).map_err(|err| {
        if err.kind() == ErrorKind::UnexpectedEof {
            SnapshotError::Truncated
        } else {
            SnapshotError::Io(err)
        }
    })
}

fn read_u32(r: &mut impl Read) -> Result<u32, SnapshotError> {
    let mut buf = [0u8; 4];
    read_exact(r, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(r: &mut impl Read) -> Result<u64, SnapshotError> {
    let mut buf = [0u8; 8];
    read_exact(r, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_i64(r: &mut impl Read) -> Result<i64, SnapshotError> {
    let mut buf = [0u8; 8];
    read_exact(r, &mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

fn read_bytes(r: &mut impl Read) -> Result<Vec<u8>, SnapshotError> {
    let len = read_u32(r)?;
    if len > MAX_RECORD_LEN {
        return Err(SnapshotError::OversizedRecord(len));
    }
    let mut buf = vec![0u8; len as usize];
    read_exact(r, &mut buf)?;
    Ok(buf)
}

/// Loads a snapshot into `store`, returning the number of keys restored.
///
/// A bad record aborts the load with an error but keeps everything restored
/// before it.
pub fn load(store: &mut Store, path: &Path) -> Result<usize, SnapshotError> {
    let mut r = BufReader::new(File::open(path)?);

    let mut magic = [0u8; 8];
    read_exact(&mut r, &mut magic)?;
    if &magic != SNAPSHOT_MAGIC {
        return Err(SnapshotError::BadMagic);
    }
    let version = read_u32(&mut r)?;
    if version != SNAPSHOT_VERSION {
        return Err(SnapshotError::BadVersion(version));
    }
    let _timestamp = read_u64(&mut r)?;

    let mut loaded = 0usize;
    loop {
        let mut tag = [0u8; 1];
        // plain EOF at a record boundary is as good as the terminator
        let n = r.read(&mut tag).map_err(SnapshotError::Io)?;
        if n == 0 || tag[0] == TAG_EOF {
            break;
        }

        let key = read_bytes(&mut r)?;
        match tag[0] {
            TAG_STRING => {
                let value = read_bytes(&mut r)?;
                store.set(&key, &value);
            }
            TAG_INT => {
                let value = read_i64(&mut r)?;
                store.set_int(&key, value);
            }
            TAG_LIST => {
                let count = read_u32(&mut r)?;
                for _ in 0..count {
                    let item = read_bytes(&mut r)?;
                    store
                        .rpush(&key, &item)
                        .expect("fresh key restored as list");
                }
            }
            TAG_HASH => {
                let count = read_u32(&mut r)?;
                for _ in 0..count {
                    let field = read_bytes(&mut r)?;
                    let value = read_bytes(&mut r)?;
                    store
                        .hset(&key, &field, &value)
                        .expect("fresh key restored as hash");
                }
            }
            other => return Err(SnapshotError::UnknownTag(other)),
        }

        let expire_at = read_i64(&mut r)?;
        if expire_at > 0 {
            store.restore_expire_at(&key, expire_at);
        }
        loaded += 1;
    }

    info!(path = %path.display(), keys = loaded, "loaded snapshot");
    Ok(loaded)
}
