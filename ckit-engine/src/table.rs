//! # Robin Hood Hash Table
//!
//! Open-addressed map from byte-string keys to values of any owned type,
//! used both as the primary keyspace index and as the backing container for
//! hash-valued entries.
//!
//! ## Design Principles
//! 1. **Robin Hood Probing**: Insertions displace occupants with a smaller
//!    probe distance, keeping probe sequences short and uniform.
//! 2. **Backward-Shift Deletion**: Deletes re-pack the following run instead
//!    of leaving tombstones, so lookups never degrade over time.
//! 3. **Cached Hashes**: Each slot stores its 32-bit hash; probing compares
//!    hashes before keys to skip most byte comparisons.
//! 4. **Owned Values**: Values are dropped in place on replace and delete;
//!    `insert` hands the displaced value back so callers can settle
//!    accounting before it goes away.

use rand::rngs::SmallRng;
use rand::Rng;

/// Capacity floor; the table never shrinks below this.
pub const MIN_CAPACITY: usize = 16;

/// Grow by doubling when (count + 1) / capacity exceeds this.
const LOAD_GROW: f64 = 0.70;

/// Shrink by halving when count / capacity drops below this after a delete.
const LOAD_SHRINK: f64 = 0.10;

/// 32-bit FNV-1a over the key bytes.
fn fnv1a(key: &[u8]) -> u32 {
    let mut h: u32 = 2_166_136_261;
    for &b in key {
        h ^= u32::from(b);
        h = h.wrapping_mul(16_777_619);
    }
    h
}

#[derive(Debug)]
struct Slot<V> {
    key: Vec<u8>,
    value: V,
    hash: u32,
    /// Probe sequence length: distance from this slot back to the hash's
    /// ideal slot.
    psl: u32,
}

/// Open-addressed hash table with Robin Hood probing.
#[derive(Debug)]
pub struct HashTable<V> {
    slots: Vec<Option<Slot<V>>>,
    count: usize,
}

impl<V> HashTable<V> {
    pub fn new() -> Self {
        Self::with_capacity(MIN_CAPACITY)
    }

    /// Creates a table with at least `capacity` slots, rounded up to a power
    /// of two and floored at [`MIN_CAPACITY`].
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY).next_power_of_two();
        HashTable {
            slots: (0..capacity).map(|_| None).collect(),
            count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Inserts or replaces. Returns the previous value when the key already
    /// existed.
    pub fn insert(&mut self, key: Vec<u8>, value: V) -> Option<V> {
        if (self.count + 1) as f64 / self.slots.len() as f64 > LOAD_GROW {
            self.resize(self.slots.len() * 2);
        }
        let hash = fnv1a(&key);
        self.insert_slot(Slot {
            key,
            value,
            hash,
            psl: 0,
        })
    }

    /// Probe loop shared by insert and rehash. `incoming.psl` must be 0.
    fn insert_slot(&mut self, mut incoming: Slot<V>) -> Option<V> {
        let mask = self.slots.len() - 1;
        let mut idx = incoming.hash as usize & mask;

        loop {
            match &mut self.slots[idx] {
                empty @ None => {
                    *empty = Some(incoming);
                    self.count += 1;
                    return None;
                }
                Some(occupant) => {
                    if occupant.hash == incoming.hash && occupant.key == incoming.key {
                        return Some(std::mem::replace(&mut occupant.value, incoming.value));
                    }
                    // Robin Hood: steal from slots richer than the carried
                    // record, then keep probing with the displaced one.
                    if incoming.psl > occupant.psl {
                        std::mem::swap(occupant, &mut incoming);
                    }
                }
            }
            incoming.psl += 1;
            idx = (idx + 1) & mask;
        }
    }

    /// Locates the slot holding `key`, if any. Stops early once the probe
    /// distance exceeds the occupant's PSL.
    fn find_index(&self, key: &[u8]) -> Option<usize> {
        let hash = fnv1a(key);
        let mask = self.slots.len() - 1;
        let mut idx = hash as usize & mask;
        let mut psl: u32 = 0;

        loop {
            match &self.slots[idx] {
                None => return None,
                Some(slot) => {
                    if psl > slot.psl {
                        return None;
                    }
                    if slot.hash == hash && slot.key == key {
                        return Some(idx);
                    }
                }
            }
            psl += 1;
            idx = (idx + 1) & mask;
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<&V> {
        let idx = self.find_index(key)?;
        self.slots[idx].as_ref().map(|slot| &slot.value)
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut V> {
        let idx = self.find_index(key)?;
        self.slots[idx].as_mut().map(|slot| &mut slot.value)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.find_index(key).is_some()
    }

    /// Removes `key`, returning its value. Backward-shifts the following run
    /// so the Robin Hood invariant holds without tombstones.
    pub fn remove(&mut self, key: &[u8]) -> Option<V> {
        let idx = self.find_index(key)?;
        let removed = self.slots[idx].take().expect("find_index returned occupied slot");
        self.count -= 1;

        let mask = self.slots.len() - 1;
        let mut prev = idx;
        let mut cur = (idx + 1) & mask;
        loop {
            let shift = matches!(&self.slots[cur], Some(slot) if slot.psl > 0);
            if !shift {
                break;
            }
            let mut moved = self.slots[cur].take().expect("checked occupied");
            moved.psl -= 1;
            self.slots[prev] = Some(moved);
            prev = cur;
            cur = (cur + 1) & mask;
        }

        if self.slots.len() > MIN_CAPACITY
            && (self.count as f64 / self.slots.len() as f64) < LOAD_SHRINK
        {
            self.resize(self.slots.len() / 2);
        }

        Some(removed.value)
    }

    fn resize(&mut self, new_capacity: usize) {
        let new_capacity = new_capacity.max(MIN_CAPACITY);
        let old = std::mem::replace(
            &mut self.slots,
            (0..new_capacity).map(|_| None).collect(),
        );
        self.count = 0;
        for slot in old.into_iter().flatten() {
            self.insert_slot(Slot { psl: 0, ..slot });
        }
    }

    /// Walks occupied slots in slot order. Order is unspecified and not
    /// stable across mutation.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &V)> {
        self.slots
            .iter()
            .flatten()
            .map(|slot| (slot.key.as_slice(), &slot.value))
    }

    /// Clones every key into a fresh vector, for callers that need ownership
    /// while the table keeps changing underneath them.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.slots
            .iter()
            .flatten()
            .map(|slot| slot.key.clone())
            .collect()
    }

    /// Returns a random occupied key, or None when the table is empty.
    ///
    /// Picks a uniform random slot and scans forward (wrapping) to the first
    /// occupied one. Keys that follow long empty runs are picked more often;
    /// good enough for the approximate sampling this backs.
    pub fn random_key(&self, rng: &mut SmallRng) -> Option<&[u8]> {
        if self.count == 0 {
            return None;
        }
        let capacity = self.slots.len();
        let start = rng.gen_range(0..capacity);
        for offset in 0..capacity {
            let idx = (start + offset) & (capacity - 1);
            if let Some(slot) = &self.slots[idx] {
                return Some(&slot.key);
            }
        }
        None
    }
}

impl<V> Default for HashTable<V> {
    fn default() -> Self {
        Self::new()
    }
}
