//! Typed value entries. One [`Entry`] per live key: the payload variant,
//! the expiration deadline, the last-access stamp used by eviction, and the
//! approximate byte footprint used by the memory accounting.

use crate::seqlist::SeqList;
use crate::table::HashTable;

/// Payload of a keyspace entry. Each arm owns its data, so dropping the
/// entry reclaims everything without manual dispatch.
#[derive(Debug)]
pub enum Value {
    Str(Vec<u8>),
    Int(i64),
    List(SeqList),
    Hash(HashTable<Vec<u8>>),
}

/// Kind tag, for type checks and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Str,
    Int,
    List,
    Hash,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Str(_) => ValueKind::Str,
            Value::Int(_) => ValueKind::Int,
            Value::List(_) => ValueKind::List,
            Value::Hash(_) => ValueKind::Hash,
        }
    }
}

/// One record per live key.
#[derive(Debug)]
pub struct Entry {
    pub value: Value,
    /// Absolute unix-millisecond deadline; None = no expiry.
    pub expire_at: Option<i64>,
    /// Unix-millisecond stamp of the last access that resolved this key.
    pub last_access: i64,
    /// Approximate bytes attributed to this entry (header + key copy +
    /// payload + per-node overhead). Consistent across the entry's lifetime,
    /// not exact.
    pub mem_usage: usize,
}

impl Entry {
    /// Builds a fresh entry and charges its initial footprint: the entry
    /// header, the key copy, and whatever the payload starts out holding.
    pub fn new(value: Value, key_len: usize, now: i64) -> Self {
        let payload = match &value {
            Value::Str(s) => s.len(),
            Value::Int(_) => 0,
            Value::List(list) => {
                std::mem::size_of::<SeqList>()
                    + list.iter().map(|v| v.len() + SeqList::NODE_OVERHEAD).sum::<usize>()
            }
            Value::Hash(map) => {
                std::mem::size_of::<HashTable<Vec<u8>>>()
                    + map.iter().map(|(f, v)| f.len() + v.len()).sum::<usize>()
            }
        };
        Entry {
            value,
            expire_at: None,
            last_access: now,
            mem_usage: std::mem::size_of::<Entry>() + key_len + payload,
        }
    }

    /// True once `now` has reached the deadline.
    pub fn is_expired(&self, now: i64) -> bool {
        match self.expire_at {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_match_variants() {
        assert_eq!(Value::Str(Vec::new()).kind(), ValueKind::Str);
        assert_eq!(Value::Int(0).kind(), ValueKind::Int);
        assert_eq!(Value::List(SeqList::new()).kind(), ValueKind::List);
        assert_eq!(Value::Hash(HashTable::new()).kind(), ValueKind::Hash);
    }

    #[test]
    fn expiry_checks_against_deadline() {
        let mut entry = Entry::new(Value::Int(1), 1, 1_000);
        assert!(!entry.is_expired(i64::MAX));
        entry.expire_at = Some(2_000);
        assert!(!entry.is_expired(1_999));
        assert!(entry.is_expired(2_000));
        assert!(entry.is_expired(2_001));
    }

    #[test]
    fn footprint_scales_with_payload() {
        let small = Entry::new(Value::Str(vec![0; 4]), 3, 0);
        let large = Entry::new(Value::Str(vec![0; 400]), 3, 0);
        assert_eq!(large.mem_usage - small.mem_usage, 396);
    }
}
