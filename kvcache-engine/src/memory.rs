//! # In-Memory Store
//!
//! Provide the in-memory backend with sharded locking, TTL-aware lookups,
//! and Redis-compatible string, hash, and list values.
//!
//! ## Usage
//!
//! - Use `MemoryStore::new()` for a default sharded store on the system clock.
//! - Use `MemoryStore::with_clock(ManualClock::new())` in tests that need to
//!   step over expirations without sleeping.
//! - Use `start_expirer` to enable active TTL cleanup in the background.
//!
//! ## Design Principles
//!
//! 1. **Sharded Locks**: Per-shard locks reduce contention under concurrency.
//! 2. **Arc-backed Keys**: Keys are `Arc<[u8]>` so lookups borrow `&[u8]` directly.
//! 3. **TTL Fast Path**: Expiration is checked on access for O(1) reads.
//! 4. **Typed Values**: Each key holds exactly one value kind; mismatches fail
//!    with `WrongType` instead of coercing.
//!
//! ## Structure Overview
//!
//! ```text
//! MemoryStore<C: Clock>
//!   ├── clock: C
//!   └── shards: Vec<Shard>
//!         └── Shard
//!               └── inner: RwLock<HashMap<Arc<[u8]>, Entry>>
//!                     └── Entry { value: String | Hash | List, expires_at }
//! ```

use std::hash::{BuildHasher, Hasher};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use ahash::RandomState;
use hashbrown::HashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::error::{EngineError, EngineResult};

/// Default shards = CPU count * multiplier to reduce lock contention.
const DEFAULT_SHARD_MULTIPLIER: usize = 4;

/// TTL state for a key, mirroring Redis `TTL`/`PTTL` semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlStatus {
    /// Key is missing or already expired.
    Missing,
    /// Key exists without expiration.
    NoExpiry,
    /// Key expires after the provided duration.
    ExpiresIn(Duration),
}

/// Value kinds a key can hold.
#[derive(Debug)]
enum StoredValue {
    String(Arc<[u8]>),
    Hash(HashMap<Vec<u8>, Vec<u8>>),
    List(Vec<Vec<u8>>),
}

/// Single keyspace entry.
#[derive(Debug)]
struct Entry {
    value: StoredValue,
    // Absolute expiration timestamp taken from the store clock.
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: StoredValue) -> Self {
        Entry {
            value,
            expires_at: None,
        }
    }

    /// Returns true when the entry has expired at `now`.
    fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }

    /// Hashes and lists disappear once their last element is removed.
    fn is_empty_container(&self) -> bool {
        match &self.value {
            StoredValue::String(_) => false,
            StoredValue::Hash(hash) => hash.is_empty(),
            StoredValue::List(list) => list.is_empty(),
        }
    }

    fn as_hash(&self) -> EngineResult<&HashMap<Vec<u8>, Vec<u8>>> {
        match &self.value {
            StoredValue::Hash(hash) => Ok(hash),
            _ => Err(EngineError::WrongType),
        }
    }

    fn as_hash_mut(&mut self) -> EngineResult<&mut HashMap<Vec<u8>, Vec<u8>>> {
        match &mut self.value {
            StoredValue::Hash(hash) => Ok(hash),
            _ => Err(EngineError::WrongType),
        }
    }

    fn as_list(&self) -> EngineResult<&Vec<Vec<u8>>> {
        match &self.value {
            StoredValue::List(list) => Ok(list),
            _ => Err(EngineError::WrongType),
        }
    }

    fn as_list_mut(&mut self) -> EngineResult<&mut Vec<Vec<u8>>> {
        match &mut self.value {
            StoredValue::List(list) => Ok(list),
            _ => Err(EngineError::WrongType),
        }
    }
}

type EntryMap = HashMap<Arc<[u8]>, Entry, RandomState>;

/// Per-shard lock wrapper.
#[derive(Debug)]
struct Shard {
    inner: RwLock<EntryMap>,
}

/// Drops `key` if it has expired. Returns true when an entry was dropped.
fn purge_if_expired(map: &mut EntryMap, key: &[u8], now: Instant) -> bool {
    let expired = map
        .get(key)
        .map(|entry| entry.is_expired(now))
        .unwrap_or(false);
    if expired {
        map.remove(key);
    }
    expired
}

/// Returns the live entry for `key`, treating expired entries as missing.
fn live<'a>(map: &'a mut EntryMap, key: &[u8], now: Instant) -> Option<&'a mut Entry> {
    if purge_if_expired(map, key, now) {
        return None;
    }
    map.get_mut(key)
}

/// Returns the live entry for `key`, creating it from `init` when absent.
fn live_or_insert<'a>(
    map: &'a mut EntryMap,
    key: &[u8],
    now: Instant,
    init: impl FnOnce() -> StoredValue,
) -> &'a mut Entry {
    purge_if_expired(map, key, now);
    map.entry(Arc::from(key))
        .or_insert_with(|| Entry::new(init()))
}

fn remove_if_empty(map: &mut EntryMap, key: &[u8]) {
    let empty = map
        .get(key)
        .map(Entry::is_empty_container)
        .unwrap_or(false);
    if empty {
        map.remove(key);
    }
}

/// Sharded in-memory store with Redis-style value types.
#[derive(Debug)]
pub struct MemoryStore<C = SystemClock> {
    /// Per-shard storage.
    shards: Vec<Shard>,
    /// Bitmask for fast shard selection (power-of-two shard count).
    shard_mask: usize,
    /// Hash state used to pick shards deterministically.
    hash_state: RandomState,
    /// Time source for every expiry decision.
    clock: C,
}

/// Handle for the background expiration sweeper.
///
/// Call `stop` to signal shutdown and join the thread.
pub struct ExpirationHandle {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ExpirationHandle {
    /// Stops the sweeper and waits for the thread to finish.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl MemoryStore<SystemClock> {
    /// Creates a store on the system clock with a shard count based on CPU
    /// parallelism.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Creates a store on the system clock with a caller-provided shard count.
    pub fn with_shard_count(shards: usize) -> Self {
        Self::with_shard_count_and_clock(shards, SystemClock)
    }
}

impl Default for MemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryStore<C> {
    /// Creates a store driven by `clock` with the default shard count.
    pub fn with_clock(clock: C) -> Self {
        let threads = std::thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1);
        Self::with_shard_count_and_clock(threads.saturating_mul(DEFAULT_SHARD_MULTIPLIER), clock)
    }

    /// Creates a store with an explicit shard count and clock.
    ///
    /// The count is normalized to the next power of two to enable fast masking.
    pub fn with_shard_count_and_clock(shards: usize, clock: C) -> Self {
        let shard_count = normalize_shard_count(shards);
        let hash_state = RandomState::new();
        let mut shard_vec = Vec::with_capacity(shard_count);
        for _ in 0..shard_count {
            shard_vec.push(Shard {
                inner: RwLock::new(HashMap::with_hasher(hash_state.clone())),
            });
        }

        MemoryStore {
            shards: shard_vec,
            shard_mask: shard_count - 1,
            hash_state,
            clock,
        }
    }

    /// Returns the store clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Hashes a key to its owning shard index.
    fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = self.hash_state.build_hasher();
        hasher.write(key);
        (hasher.finish() as usize) & self.shard_mask
    }

    fn shard_for(&self, key: &[u8]) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Removes expired entries across all shards.
    ///
    /// This is an O(n) scan intended for a periodic background sweep.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        for shard in &self.shards {
            let mut inner = shard.inner.write();
            let before = inner.len();
            inner.retain(|_, entry| !entry.is_expired(now));
            removed += before - inner.len();
        }
        if removed > 0 {
            debug!(removed, "purged expired keys");
        }
        removed
    }

    /// Fetches a string value.
    pub fn get(&self, key: &[u8]) -> EngineResult<Option<Arc<[u8]>>> {
        let now = self.clock.now();
        let mut inner = self.shard_for(key).inner.write();
        match live(&mut inner, key, now) {
            Some(entry) => match &entry.value {
                StoredValue::String(value) => Ok(Some(Arc::clone(value))),
                _ => Err(EngineError::WrongType),
            },
            None => Ok(None),
        }
    }

    /// Stores a string value, replacing any previous value and TTL.
    pub fn set(&self, key: Vec<u8>, value: Vec<u8>) {
        self.insert_string(key, value, None);
    }

    /// Stores a string value that expires after `ttl`.
    ///
    /// Fails without touching the key when the deadline overflows.
    pub fn set_with_ttl(&self, key: Vec<u8>, value: Vec<u8>, ttl: Duration) -> EngineResult<()> {
        let deadline = self
            .clock
            .now()
            .checked_add(ttl)
            .ok_or(EngineError::InvalidExpireTime { command: "set" })?;
        self.insert_string(key, value, Some(deadline));
        Ok(())
    }

    fn insert_string(&self, key: Vec<u8>, value: Vec<u8>, expires_at: Option<Instant>) {
        let mut inner = self.shard_for(&key).inner.write();
        inner.insert(
            Arc::from(key),
            Entry {
                value: StoredValue::String(Arc::from(value)),
                expires_at,
            },
        );
    }

    /// Deletes a key of any type. Returns whether a live entry was removed.
    pub fn delete(&self, key: &[u8]) -> bool {
        let now = self.clock.now();
        let mut inner = self.shard_for(key).inner.write();
        match inner.remove(key) {
            Some(entry) => !entry.is_expired(now),
            None => false,
        }
    }

    /// Sets a TTL on an existing key. Returns false when the key is missing.
    pub fn expire(&self, key: &[u8], ttl: Duration) -> EngineResult<bool> {
        let now = self.clock.now();
        let deadline = now
            .checked_add(ttl)
            .ok_or(EngineError::InvalidExpireTime { command: "expire" })?;
        let mut inner = self.shard_for(key).inner.write();
        match live(&mut inner, key, now) {
            Some(entry) => {
                entry.expires_at = Some(deadline);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns TTL state for a key.
    pub fn ttl(&self, key: &[u8]) -> TtlStatus {
        let now = self.clock.now();
        let mut inner = self.shard_for(key).inner.write();
        match live(&mut inner, key, now) {
            Some(entry) => match entry.expires_at {
                Some(deadline) => TtlStatus::ExpiresIn(deadline - now),
                None => TtlStatus::NoExpiry,
            },
            None => TtlStatus::Missing,
        }
    }

    /// Upserts hash fields. Returns the number of fields that were new.
    pub fn hset(&self, key: &[u8], pairs: Vec<(Vec<u8>, Vec<u8>)>) -> EngineResult<usize> {
        if pairs.is_empty() {
            return Ok(0);
        }
        let now = self.clock.now();
        let mut inner = self.shard_for(key).inner.write();
        let entry = live_or_insert(&mut inner, key, now, || StoredValue::Hash(HashMap::new()));
        let hash = entry.as_hash_mut()?;

        let mut added = 0;
        for (field, value) in pairs {
            if hash.insert(field, value).is_none() {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Fetches one hash field.
    pub fn hget(&self, key: &[u8], field: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        let now = self.clock.now();
        let mut inner = self.shard_for(key).inner.write();
        match live(&mut inner, key, now) {
            Some(entry) => Ok(entry.as_hash()?.get(field).cloned()),
            None => Ok(None),
        }
    }

    /// Fetches several hash fields, aligned to the order of `fields`.
    pub fn hmget(&self, key: &[u8], fields: &[&[u8]]) -> EngineResult<Vec<Option<Vec<u8>>>> {
        let now = self.clock.now();
        let mut inner = self.shard_for(key).inner.write();
        match live(&mut inner, key, now) {
            Some(entry) => {
                let hash = entry.as_hash()?;
                Ok(fields.iter().map(|field| hash.get(*field).cloned()).collect())
            }
            None => Ok(vec![None; fields.len()]),
        }
    }

    /// Returns all field names of a hash.
    pub fn hkeys(&self, key: &[u8]) -> EngineResult<Vec<Vec<u8>>> {
        let now = self.clock.now();
        let mut inner = self.shard_for(key).inner.write();
        match live(&mut inner, key, now) {
            Some(entry) => Ok(entry.as_hash()?.keys().cloned().collect()),
            None => Ok(Vec::new()),
        }
    }

    /// Returns all field/value pairs of a hash.
    pub fn hgetall(&self, key: &[u8]) -> EngineResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let now = self.clock.now();
        let mut inner = self.shard_for(key).inner.write();
        match live(&mut inner, key, now) {
            Some(entry) => Ok(entry
                .as_hash()?
                .iter()
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect()),
            None => Ok(Vec::new()),
        }
    }

    /// Removes hash fields. Returns how many existed.
    pub fn hdel(&self, key: &[u8], fields: &[&[u8]]) -> EngineResult<usize> {
        let now = self.clock.now();
        let mut inner = self.shard_for(key).inner.write();
        let removed = match live(&mut inner, key, now) {
            Some(entry) => {
                let hash = entry.as_hash_mut()?;
                let mut removed = 0;
                for field in fields {
                    if hash.remove(*field).is_some() {
                        removed += 1;
                    }
                }
                removed
            }
            None => return Ok(0),
        };
        remove_if_empty(&mut inner, key);
        Ok(removed)
    }

    /// Appends values to the tail of a list. Returns the new length.
    pub fn rpush(&self, key: &[u8], values: Vec<Vec<u8>>) -> EngineResult<usize> {
        if values.is_empty() {
            return self.llen(key);
        }
        let now = self.clock.now();
        let mut inner = self.shard_for(key).inner.write();
        let entry = live_or_insert(&mut inner, key, now, || StoredValue::List(Vec::new()));
        let list = entry.as_list_mut()?;
        list.extend(values);
        Ok(list.len())
    }

    /// Overwrites the element at `index`. Negative indexes count from the tail.
    pub fn lset(&self, key: &[u8], index: i64, value: Vec<u8>) -> EngineResult<()> {
        let now = self.clock.now();
        let mut inner = self.shard_for(key).inner.write();
        let entry = live(&mut inner, key, now).ok_or(EngineError::NoSuchKey)?;
        let list = entry.as_list_mut()?;
        let idx = normalize_index(index, list.len()).ok_or(EngineError::IndexOutOfRange)?;
        list[idx] = value;
        Ok(())
    }

    /// Returns the inclusive range `[start, stop]` with Redis index rules.
    pub fn lrange(&self, key: &[u8], start: i64, stop: i64) -> EngineResult<Vec<Vec<u8>>> {
        let now = self.clock.now();
        let mut inner = self.shard_for(key).inner.write();
        let list = match live(&mut inner, key, now) {
            Some(entry) => entry.as_list()?,
            None => return Ok(Vec::new()),
        };
        match range_bounds(start, stop, list.len()) {
            Some((from, to)) => Ok(list[from..=to].to_vec()),
            None => Ok(Vec::new()),
        }
    }

    /// Removes elements equal to `value`.
    ///
    /// `count == 0` removes all, `count > 0` scans from the head, and
    /// `count < 0` scans from the tail, each stopping after `|count|` removals.
    pub fn lrem(&self, key: &[u8], count: i64, value: &[u8]) -> EngineResult<usize> {
        let now = self.clock.now();
        let mut inner = self.shard_for(key).inner.write();
        let removed = match live(&mut inner, key, now) {
            Some(entry) => remove_matching(entry.as_list_mut()?, count, value),
            None => return Ok(0),
        };
        remove_if_empty(&mut inner, key);
        Ok(removed)
    }

    /// Returns the list length, 0 when missing.
    pub fn llen(&self, key: &[u8]) -> EngineResult<usize> {
        let now = self.clock.now();
        let mut inner = self.shard_for(key).inner.write();
        match live(&mut inner, key, now) {
            Some(entry) => Ok(entry.as_list()?.len()),
            None => Ok(0),
        }
    }
}

impl<C: Clock + 'static> MemoryStore<C> {
    /// Starts a background thread that periodically removes expired entries.
    ///
    /// The returned handle must be stopped to avoid leaking the thread.
    pub fn start_expirer(self: &Arc<Self>, interval: Duration) -> ExpirationHandle {
        let interval = if interval.is_zero() {
            Duration::from_millis(1)
        } else {
            interval
        };

        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = Arc::clone(&stop);
        let store = Arc::clone(self);

        let join = std::thread::spawn(move || {
            while !stop_thread.load(Ordering::Acquire) {
                std::thread::sleep(interval);
                store.purge_expired();
            }
        });

        ExpirationHandle {
            stop,
            join: Some(join),
        }
    }
}

/// Normalizes shard counts to a power of two for fast masking.
fn normalize_shard_count(count: usize) -> usize {
    count.max(1).next_power_of_two()
}

/// Maps a possibly negative index onto `[0, len)`.
fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if index < 0 { index + len } else { index };
    if idx < 0 || idx >= len {
        None
    } else {
        Some(idx as usize)
    }
}

/// Resolves an inclusive LRANGE window, or `None` when it selects nothing.
fn range_bounds(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (start + len).max(0) } else { start };
    let stop = if stop < 0 { stop + len } else { stop };
    if start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop.min(len - 1) as usize))
}

fn remove_matching(list: &mut Vec<Vec<u8>>, count: i64, value: &[u8]) -> usize {
    let limit = if count == 0 {
        usize::MAX
    } else {
        count.unsigned_abs() as usize
    };
    let mut removed = 0;

    if count >= 0 {
        list.retain(|item| {
            if removed < limit && item.as_slice() == value {
                removed += 1;
                false
            } else {
                true
            }
        });
    } else {
        let mut idx = list.len();
        while idx > 0 && removed < limit {
            idx -= 1;
            if list[idx].as_slice() == value {
                list.remove(idx);
                removed += 1;
            }
        }
    }

    removed
}
