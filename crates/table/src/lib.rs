//! # Table
//!
//! The in-memory hash table behind the key-value store.
//!
//! Every key lives in exactly one bucket slot, chosen by hashing the key with
//! djb2 and masking the hash with `capacity - 1`. Keys that collide share a
//! singly linked chain hanging off the slot; new keys are pushed onto the
//! front of their chain.
//!
//! ## Key properties
//! - **Power-of-two capacity**: starts at 32 slots and only ever doubles.
//! - **Grow before insert**: inserting a new key while `len / capacity >= 0.75`
//!   doubles the slot array and rehashes every entry first. Updates never grow.
//! - **Binary-safe values**: values are opaque byte buffers whose length is
//!   authoritative; embedded zero bytes are preserved.
//! - **Fallible allocation**: slot arrays and entry buffers are allocated with
//!   `try_reserve_exact`, so allocation failure surfaces as
//!   [`TableError::OutOfMemory`] instead of aborting, and leaves the table as
//!   it was.
//!
//! ## Example
//! ```rust
//! use table::HashTable;
//!
//! let mut t = HashTable::new();
//! t.set("hello", b"world").unwrap();
//! assert_eq!(t.get("hello"), Some(b"world".as_slice()));
//!
//! t.delete("hello").unwrap();
//! assert!(t.get("hello").is_none());
//! ```

use std::fmt;

use thiserror::Error;
use tracing::debug;

/// Number of slots a freshly created table starts with.
pub const INITIAL_CAPACITY: usize = 32;

/// Load factor threshold, as the fraction `3 / 4`.
pub const MAX_LOAD_NUMERATOR: usize = 3;
pub const MAX_LOAD_DENOMINATOR: usize = 4;

/// Seed of the djb2 accumulator.
const DJB2_SEED: u64 = 5381;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("key not found")]
    KeyNotFound,
    #[error("out of memory")]
    OutOfMemory,
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

/// Hashes raw key bytes with djb2 (`acc = acc * 33 + byte`, wrapping).
pub fn hash_key(key: &[u8]) -> u64 {
    key.iter().fold(DJB2_SEED, |acc, &b| {
        acc.wrapping_mul(33).wrapping_add(u64::from(b))
    })
}

/// A single key/value pair and the link to the next entry in its chain.
struct Entry {
    key: Box<str>,
    value: Vec<u8>,
    next: Option<Box<Entry>>,
}

type Link = Option<Box<Entry>>;

/// A chained-bucket hash table mapping text keys to byte values.
///
/// The table exclusively owns its slots, each slot owns its chain, and each
/// entry owns its key and value buffers. Dropping the table releases all of
/// them.
pub struct HashTable {
    slots: Vec<Link>,
    len: usize,
}

impl HashTable {
    /// Creates an empty table with [`INITIAL_CAPACITY`] slots.
    ///
    /// Allocation failure aborts the process here, as with any `Vec`; use
    /// [`try_new`](HashTable::try_new) to observe it instead.
    pub fn new() -> Self {
        Self {
            slots: empty_slots_infallible(INITIAL_CAPACITY),
            len: 0,
        }
    }

    /// Creates an empty table with [`INITIAL_CAPACITY`] slots, reporting
    /// allocation failure as [`TableError::OutOfMemory`].
    pub fn try_new() -> Result<Self, TableError> {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    /// Creates an empty table with at least `capacity` slots.
    ///
    /// The capacity is rounded up to the next power of two (minimum 1) so the
    /// slot index can be computed with a mask.
    pub fn with_capacity(capacity: usize) -> Result<Self, TableError> {
        let capacity = capacity
            .max(1)
            .checked_next_power_of_two()
            .ok_or(TableError::OutOfMemory)?;
        Ok(Self {
            slots: empty_slots(capacity)?,
            len: 0,
        })
    }

    /// Inserts or updates `key`.
    ///
    /// An existing key has its value replaced in place and never causes
    /// growth. A new key first grows the table if the load factor has been
    /// reached, then is pushed onto the front of its chain.
    ///
    /// # Errors
    ///
    /// - [`TableError::InvalidArgument`] if the key contains a NUL byte or is
    ///   longer than `u32::MAX` bytes.
    /// - [`TableError::OutOfMemory`] if any allocation fails. The table is left
    ///   exactly as it was before the call.
    pub fn set(&mut self, key: &str, value: &[u8]) -> Result<(), TableError> {
        validate_key(key)?;

        let hash = hash_key(key.as_bytes());
        if let Some(entry) = self.find_mut(hash, key) {
            // A failed copy leaves the old value in place.
            entry.value = copy_bytes(value)?;
            return Ok(());
        }

        // Copied before growing; a failure here leaves the table untouched.
        let owned_key = copy_str(key)?;
        let owned_value = copy_bytes(value)?;

        if self.at_max_load() {
            self.grow()?;
        }

        let index = self.slot_index(hash);
        let slot = &mut self.slots[index];
        let next = slot.take();
        *slot = Some(Box::new(Entry {
            key: owned_key,
            value: owned_value,
            next,
        }));
        self.len += 1;
        Ok(())
    }

    /// Returns a view of the value stored under `key`, or `None`.
    ///
    /// No copy is made; the borrow ends before the table can be mutated again.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.find(hash_key(key.as_bytes()), key)
            .map(|entry| entry.value.as_slice())
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes `key` and frees its entry.
    ///
    /// Capacity is never reduced.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::KeyNotFound`] if the key is not present.
    pub fn delete(&mut self, key: &str) -> Result<(), TableError> {
        let index = self.slot_index(hash_key(key.as_bytes()));

        let mut link = &mut self.slots[index];
        while link
            .as_ref()
            .is_some_and(|entry| &*entry.key != key)
        {
            if let Some(entry) = link {
                link = &mut entry.next;
            }
        }

        let mut removed = link.take().ok_or(TableError::KeyNotFound)?;
        *link = removed.next.take();
        self.len -= 1;
        Ok(())
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of bucket slots. Always a power of two.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns `len / capacity`.
    pub fn load_factor(&self) -> f64 {
        self.len as f64 / self.slots.len() as f64
    }

    /// Iterates over all entries in slot order, each chain head to tail.
    ///
    /// This order is an artifact of hashing; it matches neither insertion
    /// order nor key order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            slots: self.slots.iter(),
            chain: None,
        }
    }

    /// Iterates over all keys, in the same order as [`iter`](HashTable::iter).
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(k, _)| k)
    }

    fn slot_index(&self, hash: u64) -> usize {
        (hash as usize) & (self.slots.len() - 1)
    }

    fn at_max_load(&self) -> bool {
        self.len.saturating_mul(MAX_LOAD_DENOMINATOR)
            >= self.slots.len().saturating_mul(MAX_LOAD_NUMERATOR)
    }

    fn find(&self, hash: u64, key: &str) -> Option<&Entry> {
        let mut link = self.slots[self.slot_index(hash)].as_deref();
        while let Some(entry) = link {
            if &*entry.key == key {
                return Some(entry);
            }
            link = entry.next.as_deref();
        }
        None
    }

    fn find_mut(&mut self, hash: u64, key: &str) -> Option<&mut Entry> {
        let index = self.slot_index(hash);
        let mut link = self.slots[index].as_deref_mut();
        while let Some(entry) = link {
            if &*entry.key == key {
                return Some(entry);
            }
            link = entry.next.as_deref_mut();
        }
        None
    }

    /// Doubles the slot array and moves every entry into it.
    ///
    /// Entries are relinked, not copied. If the new array cannot be allocated
    /// the table keeps its old array and capacity.
    fn grow(&mut self) -> Result<(), TableError> {
        let old_capacity = self.slots.len();
        let new_capacity = old_capacity
            .checked_mul(2)
            .ok_or(TableError::OutOfMemory)?;
        let mut slots = empty_slots(new_capacity)?;
        let mask = new_capacity - 1;

        for slot in &mut self.slots {
            let mut link = slot.take();
            while let Some(mut entry) = link {
                link = entry.next.take();
                let index = (hash_key(entry.key.as_bytes()) as usize) & mask;
                entry.next = slots[index].take();
                slots[index] = Some(entry);
            }
        }

        self.slots = slots;
        debug!(
            old_capacity,
            new_capacity,
            len = self.len,
            "hash table grown"
        );
        Ok(())
    }
}

impl Default for HashTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HashTable {
    fn drop(&mut self) {
        // Unlink chains one entry at a time; the default recursive drop of a
        // long chain could overflow the stack.
        for slot in &mut self.slots {
            let mut link = slot.take();
            while let Some(mut entry) = link {
                link = entry.next.take();
            }
        }
    }
}

impl fmt::Debug for HashTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashTable")
            .field("len", &self.len)
            .field("capacity", &self.slots.len())
            .finish()
    }
}

impl<'a> IntoIterator for &'a HashTable {
    type Item = (&'a str, &'a [u8]);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over `(key, value)` pairs of a [`HashTable`].
pub struct Iter<'a> {
    slots: std::slice::Iter<'a, Link>,
    chain: Option<&'a Entry>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.chain {
                self.chain = entry.next.as_deref();
                return Some((&*entry.key, entry.value.as_slice()));
            }
            self.chain = self.slots.next()?.as_deref();
        }
    }
}

fn validate_key(key: &str) -> Result<(), TableError> {
    if key.as_bytes().contains(&0) {
        return Err(TableError::InvalidArgument("key contains a NUL byte"));
    }
    if u32::try_from(key.len()).is_err() {
        return Err(TableError::InvalidArgument("key longer than u32::MAX bytes"));
    }
    Ok(())
}

fn empty_slots(capacity: usize) -> Result<Vec<Link>, TableError> {
    let mut slots = Vec::new();
    slots
        .try_reserve_exact(capacity)
        .map_err(|_| TableError::OutOfMemory)?;
    slots.resize_with(capacity, || None);
    Ok(slots)
}

fn empty_slots_infallible(capacity: usize) -> Vec<Link> {
    let mut slots = Vec::with_capacity(capacity);
    slots.resize_with(capacity, || None);
    slots
}

/// Copies `bytes` into a buffer of exactly `bytes.len()`; an empty slice
/// yields a buffer with no allocation.
fn copy_bytes(bytes: &[u8]) -> Result<Vec<u8>, TableError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(bytes.len())
        .map_err(|_| TableError::OutOfMemory)?;
    buf.extend_from_slice(bytes);
    Ok(buf)
}

fn copy_str(s: &str) -> Result<Box<str>, TableError> {
    let mut buf = String::new();
    buf.try_reserve_exact(s.len())
        .map_err(|_| TableError::OutOfMemory)?;
    buf.push_str(s);
    Ok(buf.into_boxed_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------- Hashing --------------------

    #[test]
    fn djb2_of_empty_key_is_seed() {
        assert_eq!(hash_key(b""), 5381);
    }

    #[test]
    fn djb2_known_values() {
        // 5381 * 33 + 'a'
        assert_eq!(hash_key(b"a"), 177_670);
        // (5381 * 33 + 'a') * 33 + 'b'
        assert_eq!(hash_key(b"ab"), 5_863_208);
    }

    #[test]
    fn djb2_wraps_instead_of_overflowing() {
        let long = vec![0xFFu8; 4096];
        // Must not panic in debug builds.
        let _ = hash_key(&long);
    }

    // -------------------- Basic CRUD --------------------

    #[test]
    fn new_table_is_empty() {
        let t = HashTable::new();
        assert_eq!(t.len(), 0);
        assert!(t.is_empty());
        assert_eq!(t.capacity(), INITIAL_CAPACITY);
    }

    #[test]
    fn set_and_get_single_key() {
        let mut t = HashTable::new();
        t.set("k1", b"v1").unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.get("k1"), Some(b"v1".as_slice()));
    }

    #[test]
    fn get_missing_key_returns_none() {
        let t = HashTable::new();
        assert!(t.get("nonexistent").is_none());
        assert!(!t.contains_key("nonexistent"));
    }

    #[test]
    fn set_overwrites_existing_value() {
        let mut t = HashTable::new();
        t.set("k", b"a much longer first value").unwrap();
        t.set("k", b"v2").unwrap();
        assert_eq!(t.get("k"), Some(b"v2".as_slice()));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn delete_removes_key() {
        let mut t = HashTable::new();
        t.set("k", b"v").unwrap();
        t.delete("k").unwrap();
        assert!(t.get("k").is_none());
        assert_eq!(t.len(), 0);
    }

    #[test]
    fn delete_twice_reports_key_not_found() {
        let mut t = HashTable::new();
        t.set("k", b"v").unwrap();
        t.delete("k").unwrap();
        assert_eq!(t.delete("k"), Err(TableError::KeyNotFound));
    }

    #[test]
    fn delete_missing_key_reports_key_not_found() {
        let mut t = HashTable::new();
        assert_eq!(t.delete("nope"), Err(TableError::KeyNotFound));
    }

    #[test]
    fn set_after_delete_reinserts() {
        let mut t = HashTable::new();
        t.set("k", b"v1").unwrap();
        t.delete("k").unwrap();
        t.set("k", b"v2").unwrap();
        assert_eq!(t.get("k"), Some(b"v2".as_slice()));
        assert_eq!(t.len(), 1);
    }

    // -------------------- Edge cases --------------------

    #[test]
    fn empty_key() {
        let mut t = HashTable::new();
        t.set("", b"val").unwrap();
        assert_eq!(t.get(""), Some(b"val".as_slice()));
    }

    #[test]
    fn empty_value() {
        let mut t = HashTable::new();
        t.set("k", b"").unwrap();
        assert_eq!(t.get("k"), Some(b"".as_slice()));
    }

    #[test]
    fn update_to_empty_value() {
        let mut t = HashTable::new();
        t.set("k", b"something").unwrap();
        t.set("k", b"").unwrap();
        assert_eq!(t.get("k").map(<[u8]>::len), Some(0));
    }

    #[test]
    fn value_with_embedded_zero_bytes() {
        let mut t = HashTable::new();
        let value = [0x41, 0x42, 0x00, 0x43, 0x44];
        t.set("binary", &value).unwrap();
        let got = t.get("binary").unwrap();
        assert_eq!(got.len(), 5);
        assert_eq!(got, value);
    }

    #[test]
    fn non_ascii_keys() {
        let mut t = HashTable::new();
        t.set("ключ", b"1").unwrap();
        t.set("鍵", b"2").unwrap();
        assert_eq!(t.get("ключ"), Some(b"1".as_slice()));
        assert_eq!(t.get("鍵"), Some(b"2".as_slice()));
    }

    #[test]
    fn key_with_nul_byte_is_invalid() {
        let mut t = HashTable::new();
        assert!(matches!(
            t.set("a\0b", b"v"),
            Err(TableError::InvalidArgument(_))
        ));
        assert!(t.is_empty());
    }

    #[test]
    fn large_value() {
        let mut t = HashTable::new();
        let val = vec![b'x'; 1_000_000];
        t.set("big", &val).unwrap();
        assert_eq!(t.get("big").unwrap().len(), 1_000_000);
    }

    // -------------------- Collisions & chains --------------------

    #[test]
    fn colliding_keys_share_a_chain() {
        // Capacity 1: every key lands in slot 0.
        let mut t = HashTable::with_capacity(1).unwrap();
        assert_eq!(t.capacity(), 1);
        t.set("a", b"1").unwrap();
        // len 1 >= 0.75 * 1, so the next insert grows first.
        t.set("b", b"2").unwrap();
        assert_eq!(t.capacity(), 2);
        assert_eq!(t.get("a"), Some(b"1".as_slice()));
        assert_eq!(t.get("b"), Some(b"2".as_slice()));
    }

    #[test]
    fn delete_from_middle_of_chain() {
        let mut t = HashTable::new();
        // Find three keys that share a slot at capacity 32.
        let mut same_slot = Vec::new();
        let target = hash_key(b"k0") as usize & 31;
        for i in 0.. {
            let key = format!("k{}", i);
            if hash_key(key.as_bytes()) as usize & 31 == target {
                same_slot.push(key);
                if same_slot.len() == 3 {
                    break;
                }
            }
        }
        for k in &same_slot {
            t.set(k, k.as_bytes()).unwrap();
        }
        t.delete(&same_slot[1]).unwrap();
        assert!(t.get(&same_slot[1]).is_none());
        assert_eq!(t.get(&same_slot[0]), Some(same_slot[0].as_bytes()));
        assert_eq!(t.get(&same_slot[2]), Some(same_slot[2].as_bytes()));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn new_entries_go_to_chain_front() {
        let mut t = HashTable::with_capacity(4).unwrap();
        let target = hash_key(b"x0") as usize & 3;
        let keys: Vec<String> = (0..)
            .map(|i| format!("x{}", i))
            .filter(|k| hash_key(k.as_bytes()) as usize & 3 == target)
            .take(2)
            .collect();
        t.set(&keys[0], b"first").unwrap();
        t.set(&keys[1], b"second").unwrap();
        let order: Vec<&str> = t.keys().collect();
        assert_eq!(order, vec![keys[1].as_str(), keys[0].as_str()]);
    }

    // -------------------- Growth --------------------

    #[test]
    fn grows_when_load_factor_reached() {
        let mut t = HashTable::new();
        // 24 / 32 == 0.75: the 25th distinct key triggers growth.
        for i in 0..24 {
            t.set(&format!("key{}", i), b"v").unwrap();
        }
        assert_eq!(t.capacity(), 32);
        t.set("key24", b"v").unwrap();
        assert_eq!(t.capacity(), 64);
        for i in 0..25 {
            assert_eq!(t.get(&format!("key{}", i)), Some(b"v".as_slice()));
        }
    }

    #[test]
    fn update_at_max_load_does_not_grow() {
        let mut t = HashTable::new();
        for i in 0..24 {
            t.set(&format!("key{}", i), b"v").unwrap();
        }
        t.set("key0", b"updated").unwrap();
        assert_eq!(t.capacity(), 32);
        assert_eq!(t.get("key0"), Some(b"updated".as_slice()));
    }

    #[test]
    fn delete_never_shrinks() {
        let mut t = HashTable::new();
        for i in 0..100 {
            t.set(&format!("key{}", i), b"v").unwrap();
        }
        let cap = t.capacity();
        for i in 0..100 {
            t.delete(&format!("key{}", i)).unwrap();
        }
        assert_eq!(t.capacity(), cap);
        assert!(t.is_empty());
    }

    #[test]
    fn capacity_stays_power_of_two() {
        let mut t = HashTable::new();
        for i in 0..10_000 {
            t.set(&format!("key{}", i), b"v").unwrap();
            assert!(t.capacity().is_power_of_two());
            assert!(t.load_factor() <= 0.75 + 1.0 / t.capacity() as f64);
        }
        assert_eq!(t.len(), 10_000);
    }

    #[test]
    fn with_capacity_past_largest_power_of_two_is_out_of_memory() {
        assert_eq!(
            HashTable::with_capacity(usize::MAX).unwrap_err(),
            TableError::OutOfMemory
        );
    }

    #[test]
    fn unallocatable_slot_array_is_out_of_memory() {
        // A power of two, but far beyond what `try_reserve_exact` accepts.
        assert_eq!(
            HashTable::with_capacity(1 << (usize::BITS - 1)).unwrap_err(),
            TableError::OutOfMemory
        );
    }

    #[test]
    fn with_capacity_rounds_up() {
        assert_eq!(HashTable::with_capacity(0).unwrap().capacity(), 1);
        assert_eq!(HashTable::with_capacity(33).unwrap().capacity(), 64);
        assert_eq!(HashTable::try_new().unwrap().capacity(), 32);
    }

    // -------------------- Scenario --------------------

    #[test]
    fn name_project_scenario() {
        let mut t = HashTable::new();
        t.set("name", b"Francis").unwrap();
        t.set("project", b"kv-store").unwrap();
        let name = t.get("name").unwrap();
        assert_eq!(name, b"Francis");
        assert_eq!(name.len(), 7);

        t.set("name", b"Gemini").unwrap();
        assert_eq!(t.get("name"), Some(b"Gemini".as_slice()));

        t.delete("project").unwrap();
        assert!(t.get("project").is_none());

        for i in 0..30 {
            t.set(&format!("extra_key_{}", i), format!("value_{}", i).as_bytes())
                .unwrap();
        }
        assert_eq!(t.capacity(), 64);
        assert_eq!(t.len(), 31);
        assert_eq!(t.get("name"), Some(b"Gemini".as_slice()));
        for i in 0..30 {
            assert_eq!(
                t.get(&format!("extra_key_{}", i)),
                Some(format!("value_{}", i).as_bytes())
            );
        }
    }

    // -------------------- Iteration --------------------

    #[test]
    fn iter_visits_every_live_entry_once() {
        let mut t = HashTable::new();
        for i in 0..200 {
            t.set(&format!("k{}", i), &[i as u8]).unwrap();
        }
        t.delete("k7").unwrap();

        let mut seen: Vec<String> = t.keys().map(str::to_owned).collect();
        assert_eq!(seen.len(), 199);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 199);
        assert!(!seen.contains(&"k7".to_string()));
    }

    #[test]
    fn iter_empty_table() {
        let t = HashTable::new();
        assert_eq!(t.iter().count(), 0);
        assert_eq!((&t).into_iter().count(), 0);
    }

    // -------------------- Drop --------------------

    #[test]
    fn dropping_large_table() {
        let mut t = HashTable::new();
        for i in 0..200_000 {
            t.set(&format!("k{}", i), b"").unwrap();
        }
        assert_eq!(t.len(), 200_000);
        drop(t);
    }

    #[test]
    fn fully_colliding_keys() {
        // "Aa" and "B@" have the same djb2 hash, and so does every
        // concatenation of such blocks: 2^10 keys land in one chain.
        let mut keys = vec![String::new()];
        for _ in 0..10 {
            keys = keys
                .iter()
                .flat_map(|k| [format!("{}Aa", k), format!("{}B@", k)])
                .collect();
        }
        let h = hash_key(keys[0].as_bytes());
        assert!(keys.iter().all(|k| hash_key(k.as_bytes()) == h));

        let mut t = HashTable::new();
        for k in &keys {
            t.set(k, k.as_bytes()).unwrap();
        }
        assert_eq!(t.len(), 1024);
        for k in keys.iter().step_by(2) {
            t.delete(k).unwrap();
        }
        for (i, k) in keys.iter().enumerate() {
            if i % 2 == 0 {
                assert!(t.get(k).is_none());
            } else {
                assert_eq!(t.get(k), Some(k.as_bytes()));
            }
        }
        assert_eq!(t.len(), 512);
    }

    #[test]
    fn debug_shows_len_and_capacity() {
        let mut t = HashTable::new();
        t.set("a", b"1").unwrap();
        let s = format!("{:?}", t);
        assert!(s.contains("len: 1"));
        assert!(s.contains("capacity: 32"));
    }
}
