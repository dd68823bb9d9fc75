//! # Keyspace Store
//!
//! Owns the primary hash table of typed entries and everything that hangs
//! off it: lazy and active expiration, per-entry memory accounting against
//! an embedded used-memory counter, and the per-type operation surface the
//! command layer calls into.
//!
//! ## Design Principles
//! 1. **Single Resolution Path**: Every key access goes through
//!    [`Store::live_entry`], which deletes expired entries and stamps
//!    `last_access`. TTL and PERSIST resolve the same way as data reads.
//! 2. **Settled Accounting**: Each mutation adjusts the entry's footprint
//!    and the store counter in the same operation; destruction subtracts the
//!    entry's full footprint. The counter saturates at zero.
//! 3. **Auto-Delete On Empty**: A list or hash entry that drains to zero
//!    elements is removed from the keyspace.

use rand::rngs::SmallRng;
use rand::SeedableRng;

use ckit_common::{glob_match, parse_i64, unix_ms, StoreError};

use crate::seqlist::SeqList;
use crate::table::HashTable;
use crate::value::{Entry, Value, ValueKind};

/// Initial capacity of the primary table.
const KEYSPACE_INITIAL_CAPACITY: usize = 64;

/// Initial capacity of hash-valued entries.
const SUBMAP_INITIAL_CAPACITY: usize = 16;

/// The keyspace: primary index, memory budget, and sampling RNG.
#[derive(Debug)]
pub struct Store {
    data: HashTable<Entry>,
    /// Byte budget; 0 = unlimited.
    maxmemory: usize,
    /// Approximate bytes held by live entries.
    used_memory: usize,
    rng: SmallRng,
}

impl Store {
    pub fn new() -> Self {
        Self::with_maxmemory(0)
    }

    pub fn with_maxmemory(maxmemory: usize) -> Self {
        Store {
            data: HashTable::with_capacity(KEYSPACE_INITIAL_CAPACITY),
            maxmemory,
            used_memory: 0,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn maxmemory(&self) -> usize {
        self.maxmemory
    }

    pub fn used_memory(&self) -> usize {
        self.used_memory
    }

    pub fn dbsize(&self) -> usize {
        self.data.len()
    }

    /// Borrowing walk over every entry, expired or not. Snapshot save skips
    /// the expired ones itself.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &Entry)> {
        self.data.iter()
    }

    /// Removes an entry and settles its footprint.
    fn remove_entry(&mut self, key: &[u8]) -> Option<Entry> {
        let entry = self.data.remove(key)?;
        self.used_memory = self.used_memory.saturating_sub(entry.mem_usage);
        Some(entry)
    }

    /// Inserts a fresh entry, charging it and releasing whatever it replaced.
    fn insert_entry(&mut self, key: &[u8], entry: Entry) {
        self.used_memory += entry.mem_usage;
        if let Some(old) = self.data.insert(key.to_vec(), entry) {
            self.used_memory = self.used_memory.saturating_sub(old.mem_usage);
        }
    }

    /// Lazy expiration: drops the entry behind `key` if its deadline passed.
    fn drop_if_expired(&mut self, key: &[u8]) {
        let expired = self
            .data
            .get(key)
            .map_or(false, |e| e.is_expired(unix_ms()));
        if expired {
            self.remove_entry(key);
        }
    }

    /// Resolves a live entry: expired entries are deleted and reported
    /// absent, live ones get their access stamp refreshed.
    fn live_entry(&mut self, key: &[u8]) -> Option<&mut Entry> {
        self.drop_if_expired(key);
        let now = unix_ms();
        let entry = self.data.get_mut(key)?;
        entry.last_access = now;
        Some(entry)
    }

    // ---- string / integer ----

    /// Replaces any entry with a fresh string entry; expiration is cleared.
    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        let entry = Entry::new(Value::Str(value.to_vec()), key.len(), unix_ms());
        self.insert_entry(key, entry);
    }

    /// Replaces any entry with a fresh integer entry; expiration is cleared.
    pub fn set_int(&mut self, key: &[u8], value: i64) {
        let entry = Entry::new(Value::Int(value), key.len(), unix_ms());
        self.insert_entry(key, entry);
    }

    /// Fetches a string or integer value. Integers render as decimal text.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let Some(entry) = self.live_entry(key) else {
            return Ok(None);
        };
        match &entry.value {
            Value::Str(s) => Ok(Some(s.clone())),
            Value::Int(n) => Ok(Some(n.to_string().into_bytes())),
            _ => Err(StoreError::WrongType),
        }
    }

    pub fn del(&mut self, key: &[u8]) -> bool {
        self.remove_entry(key).is_some()
    }

    pub fn exists(&mut self, key: &[u8]) -> bool {
        self.live_entry(key).is_some()
    }

    /// Kind of the live entry behind `key`, if any.
    pub fn kind(&mut self, key: &[u8]) -> Option<ValueKind> {
        self.live_entry(key).map(|e| e.value.kind())
    }

    pub fn incr(&mut self, key: &[u8]) -> Result<i64, StoreError> {
        self.add_delta(key, 1)
    }

    pub fn decr(&mut self, key: &[u8]) -> Result<i64, StoreError> {
        self.add_delta(key, -1)
    }

    /// Shared INCR/DECR body. A missing key starts from zero; an integer
    /// adds; a parseable string is converted. The result is written back as
    /// a fresh integer entry, so expiration is cleared.
    fn add_delta(&mut self, key: &[u8], delta: i64) -> Result<i64, StoreError> {
        self.drop_if_expired(key);
        let current = match self.data.get(key) {
            None => None,
            Some(entry) => match &entry.value {
                Value::Int(n) => Some(*n),
                Value::Str(s) => Some(parse_i64(s).ok_or(StoreError::NotAnInteger)?),
                _ => return Err(StoreError::NotAnInteger),
            },
        };
        let next = match current {
            None => delta,
            Some(n) => n.checked_add(delta).ok_or(StoreError::NotAnInteger)?,
        };
        self.set_int(key, next);
        Ok(next)
    }

    // ---- expiration ----

    /// Sets an absolute deadline `seconds` from now. Returns false when the
    /// key is absent. Non-positive seconds delete the key immediately and
    /// still return true.
    pub fn expire(&mut self, key: &[u8], seconds: i64) -> bool {
        let now = unix_ms();
        let Some(entry) = self.live_entry(key) else {
            return false;
        };
        if seconds <= 0 {
            self.remove_entry(key);
            return true;
        }
        entry.expire_at = Some(now + seconds.saturating_mul(1000));
        true
    }

    /// Remaining lifetime in whole seconds: -2 missing or expired, -1 no
    /// expiry.
    pub fn ttl(&mut self, key: &[u8]) -> i64 {
        let now = unix_ms();
        let Some(entry) = self.live_entry(key) else {
            return -2;
        };
        match entry.expire_at {
            None => -1,
            Some(deadline) => ((deadline - now) / 1000).max(0),
        }
    }

    /// Clears any deadline. Returns false only when the key is absent.
    pub fn persist(&mut self, key: &[u8]) -> bool {
        match self.live_entry(key) {
            Some(entry) => {
                entry.expire_at = None;
                true
            }
            None => false,
        }
    }

    /// Active expiration: samples up to `sample_size` random keys and
    /// deletes the expired ones. Returns how many were dropped.
    pub fn expire_cycle(&mut self, sample_size: usize) -> usize {
        let mut dropped = 0;
        for _ in 0..sample_size {
            let Some(key) = self.data.random_key(&mut self.rng).map(<[u8]>::to_vec) else {
                break;
            };
            let expired = self
                .data
                .get(&key)
                .map_or(false, |e| e.is_expired(unix_ms()));
            if expired {
                self.remove_entry(&key);
                dropped += 1;
            }
        }
        dropped
    }

    // ---- lists ----

    /// Makes sure `key` holds a list, creating an empty one when missing.
    /// Fails without mutating when the key holds something else.
    fn ensure_list(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.drop_if_expired(key);
        match self.data.get(key) {
            Some(entry) if !matches!(entry.value, Value::List(_)) => Err(StoreError::WrongType),
            Some(_) => Ok(()),
            None => {
                let entry = Entry::new(Value::List(SeqList::new()), key.len(), unix_ms());
                self.insert_entry(key, entry);
                Ok(())
            }
        }
    }

    pub fn lpush(&mut self, key: &[u8], value: &[u8]) -> Result<usize, StoreError> {
        self.list_push(key, value, true)
    }

    pub fn rpush(&mut self, key: &[u8], value: &[u8]) -> Result<usize, StoreError> {
        self.list_push(key, value, false)
    }

    fn list_push(&mut self, key: &[u8], value: &[u8], front: bool) -> Result<usize, StoreError> {
        self.ensure_list(key)?;
        let added = value.len() + SeqList::NODE_OVERHEAD;
        let len = {
            let entry = self.data.get_mut(key).expect("list ensured above");
            entry.last_access = unix_ms();
            match &mut entry.value {
                Value::List(list) => {
                    if front {
                        list.push_front(value.to_vec());
                    } else {
                        list.push_back(value.to_vec());
                    }
                    entry.mem_usage += added;
                    list.len()
                }
                _ => return Err(StoreError::WrongType),
            }
        };
        self.used_memory += added;
        Ok(len)
    }

    pub fn lpop(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        self.list_pop(key, true)
    }

    pub fn rpop(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        self.list_pop(key, false)
    }

    /// Pops one end. Absent for missing keys and non-list entries. The
    /// entry is deleted once its last element is gone.
    fn list_pop(&mut self, key: &[u8], front: bool) -> Option<Vec<u8>> {
        let (popped, emptied) = {
            let entry = self.live_entry(key)?;
            let Value::List(list) = &mut entry.value else {
                return None;
            };
            let popped = if front { list.pop_front() } else { list.pop_back() }?;
            let freed = popped.len() + SeqList::NODE_OVERHEAD;
            entry.mem_usage = entry.mem_usage.saturating_sub(freed);
            (popped, list.is_empty())
        };
        let freed = popped.len() + SeqList::NODE_OVERHEAD;
        self.used_memory = self.used_memory.saturating_sub(freed);
        if emptied {
            self.remove_entry(key);
        }
        Some(popped)
    }

    /// Inclusive slice; empty for missing keys and non-list entries.
    pub fn lrange(&mut self, key: &[u8], start: i64, stop: i64) -> Vec<Vec<u8>> {
        let Some(entry) = self.live_entry(key) else {
            return Vec::new();
        };
        match &entry.value {
            Value::List(list) => list.range(start, stop).into_iter().map(<[u8]>::to_vec).collect(),
            _ => Vec::new(),
        }
    }

    /// Length; 0 for missing keys and non-list entries.
    pub fn llen(&mut self, key: &[u8]) -> usize {
        match self.live_entry(key) {
            Some(entry) => match &entry.value {
                Value::List(list) => list.len(),
                _ => 0,
            },
            None => 0,
        }
    }

    // ---- hashes ----

    fn ensure_hash(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.drop_if_expired(key);
        match self.data.get(key) {
            Some(entry) if !matches!(entry.value, Value::Hash(_)) => Err(StoreError::WrongType),
            Some(_) => Ok(()),
            None => {
                let entry = Entry::new(
                    Value::Hash(HashTable::with_capacity(SUBMAP_INITIAL_CAPACITY)),
                    key.len(),
                    unix_ms(),
                );
                self.insert_entry(key, entry);
                Ok(())
            }
        }
    }

    /// Creates or updates a field. Returns true when the field is new.
    pub fn hset(&mut self, key: &[u8], field: &[u8], value: &[u8]) -> Result<bool, StoreError> {
        self.ensure_hash(key)?;
        let (is_new, grew, shrank) = {
            let entry = self.data.get_mut(key).expect("hash ensured above");
            entry.last_access = unix_ms();
            let map = match &mut entry.value {
                Value::Hash(map) => map,
                _ => return Err(StoreError::WrongType),
            };
            match map.insert(field.to_vec(), value.to_vec()) {
                None => {
                    let grew = field.len() + value.len();
                    entry.mem_usage += grew;
                    (true, grew, 0)
                }
                Some(old) => {
                    // replace: settle the value-length delta only
                    entry.mem_usage = (entry.mem_usage + value.len()).saturating_sub(old.len());
                    (false, value.len(), old.len())
                }
            }
        };
        self.used_memory = (self.used_memory + grew).saturating_sub(shrank);
        Ok(is_new)
    }

    pub fn hget(&mut self, key: &[u8], field: &[u8]) -> Option<Vec<u8>> {
        let entry = self.live_entry(key)?;
        match &entry.value {
            Value::Hash(map) => map.get(field).cloned(),
            _ => None,
        }
    }

    /// Deletes a field; the entry goes with it once the hash drains. Returns
    /// false for missing keys, missing fields, and non-hash entries.
    pub fn hdel(&mut self, key: &[u8], field: &[u8]) -> bool {
        let (freed, emptied) = {
            let Some(entry) = self.live_entry(key) else {
                return false;
            };
            let Value::Hash(map) = &mut entry.value else {
                return false;
            };
            let Some(old) = map.remove(field) else {
                return false;
            };
            let freed = field.len() + old.len();
            entry.mem_usage = entry.mem_usage.saturating_sub(freed);
            (freed, map.is_empty())
        };
        self.used_memory = self.used_memory.saturating_sub(freed);
        if emptied {
            self.remove_entry(key);
        }
        true
    }

    /// Every (field, value) pair; empty for missing keys and non-hash
    /// entries.
    pub fn hgetall(&mut self, key: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let Some(entry) = self.live_entry(key) else {
            return Vec::new();
        };
        match &entry.value {
            Value::Hash(map) => map
                .iter()
                .map(|(f, v)| (f.to_vec(), v.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    // ---- keyspace ----

    /// Keys matching a `*`/`?` glob, skipping expired entries without
    /// deleting them.
    pub fn keys(&self, pattern: &[u8]) -> Vec<Vec<u8>> {
        let now = unix_ms();
        self.data
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .filter(|(key, _)| glob_match(pattern, key))
            .map(|(key, _)| key.to_vec())
            .collect()
    }

    /// Destroys every entry and zeroes the accounting.
    pub fn flushdb(&mut self) {
        let total: usize = self.data.iter().map(|(_, e)| e.mem_usage).sum();
        self.used_memory = self.used_memory.saturating_sub(total);
        self.data = HashTable::with_capacity(KEYSPACE_INITIAL_CAPACITY);
    }

    // ---- hooks for eviction and snapshot ----

    pub(crate) fn rng_and_table(&mut self) -> (&mut SmallRng, &HashTable<Entry>) {
        (&mut self.rng, &self.data)
    }

    pub(crate) fn entry(&self, key: &[u8]) -> Option<&Entry> {
        self.data.get(key)
    }

    pub(crate) fn evict_key(&mut self, key: &[u8]) -> bool {
        self.remove_entry(key).is_some()
    }

    /// Restores a deadline read back from a snapshot, without touching the
    /// access stamp.
    pub(crate) fn restore_expire_at(&mut self, key: &[u8], deadline_ms: i64) {
        if let Some(entry) = self.data.get_mut(key) {
            entry.expire_at = Some(deadline_ms);
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
