/*!
 * In-Memory Keyspace
 *
 * The authoritative key -> entry map. Besides the map itself the keyspace
 * owns two indexes that must always agree with it:
 *
 * - the expiry index, a deadline heap driving active expiration
 * - the scan order, keys sorted by (xxh3 hash, key), which gives SCAN a
 *   stable position for every key that survives a full pass
 *
 * Expired entries are treated as absent on every access and removed on the
 * spot (lazy expiration). `count` purges everything that is due before
 * reporting, so DBSIZE never includes logically expired keys.
 */

use crate::error::{Result, StoreError};
use crate::expiry::ExpiryIndex;
use crate::value::{TypeTag, Value};
use ahash::RandomState;
use bytes::Bytes;
use hashbrown::HashMap;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use xxhash_rust::xxh3::xxh3_64;

/// A stored value with its optional absolute deadline
#[derive(Debug, Clone)]
pub struct Entry {
    pub value: Value,
    pub expires_at: Option<Instant>,
}

impl Entry {
    #[inline]
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// Position of a key in the scan order
#[inline]
pub fn scan_hash(key: &[u8]) -> u64 {
    xxh3_64(key)
}

#[derive(Default)]
pub struct Keyspace {
    pub(crate) map: HashMap<Bytes, Entry, RandomState>,
    expiry: ExpiryIndex,
    order: BTreeSet<(u64, Bytes)>,
}

impl Keyspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove `k` if its deadline has passed. Returns true when removed.
    fn expire_if_due(&mut self, k: &[u8], now: Instant) -> bool {
        let due = matches!(self.map.get(k), Some(e) if e.is_expired(now));
        if due {
            self.remove_entry(k);
        }
        due
    }

    /// Drop an entry and its scan position; expiry pairs go stale on their own
    fn remove_entry(&mut self, k: &[u8]) -> Option<Entry> {
        let (key, entry) = self.map.remove_entry(k)?;
        self.order.remove(&(scan_hash(&key), key));
        Some(entry)
    }

    /// Get a live value by key
    ///
    /// # Returns
    /// * `Some(&Value)` if the key exists and has not expired
    /// * `None` otherwise; an expired entry is removed as a side effect
    #[inline]
    pub fn get(&mut self, k: &[u8]) -> Option<&Value> {
        self.expire_if_due(k, Instant::now());
        self.map.get(k).map(|e| &e.value)
    }

    /// Mutable access to a live value, used by in-place updates
    #[inline]
    pub fn get_mut(&mut self, k: &[u8]) -> Option<&mut Value> {
        self.expire_if_due(k, Instant::now());
        self.map.get_mut(k).map(|e| &mut e.value)
    }

    /// Get the live value under `k` or create it with `init` (no expiry)
    pub fn get_or_insert_with<F>(&mut self, k: &Bytes, init: F) -> &mut Value
    where
        F: FnOnce() -> Value,
    {
        self.expire_if_due(k, Instant::now());
        if !self.map.contains_key(k) {
            self.order.insert((scan_hash(k), k.clone()));
        }
        &mut self
            .map
            .entry(k.clone())
            .or_insert_with(|| Entry {
                value: init(),
                expires_at: None,
            })
            .value
    }

    /// Replace or create the entry under `k`.
    ///
    /// A previous deadline is dropped unless `expires_at` supplies a new one.
    pub fn set(&mut self, k: Bytes, value: Value, expires_at: Option<Instant>) {
        if let Some(at) = expires_at {
            self.expiry.schedule(k.clone(), at);
        }
        let hash = scan_hash(&k);
        if self.map.insert(k.clone(), Entry { value, expires_at }).is_none() {
            self.order.insert((hash, k));
        }
        self.maybe_compact();
    }

    /// Delete a key
    ///
    /// # Returns
    /// * `true` if a live entry existed and was removed
    /// * `false` if the key was absent or already expired
    pub fn delete(&mut self, k: &[u8]) -> bool {
        let now = Instant::now();
        match self.remove_entry(k) {
            Some(e) => !e.is_expired(now),
            None => false,
        }
    }

    #[inline]
    pub fn exists(&mut self, k: &[u8]) -> bool {
        self.get(k).is_some()
    }

    pub fn type_of(&mut self, k: &[u8]) -> Option<TypeTag> {
        self.get(k).map(Value::tag)
    }

    /// Set a relative TTL on an existing key. A TTL past the clock's range
    /// is refused.
    pub fn set_expiry(&mut self, k: &[u8], ttl: Duration) -> bool {
        match Instant::now().checked_add(ttl) {
            Some(at) => self.expire_at(k, at),
            None => false,
        }
    }

    /// Set an absolute deadline on an existing key.
    ///
    /// A deadline that is already in the past deletes the key immediately.
    pub fn expire_at(&mut self, k: &[u8], at: Instant) -> bool {
        let now = Instant::now();
        if self.expire_if_due(k, now) || !self.map.contains_key(k) {
            return false;
        }
        if at <= now {
            self.remove_entry(k);
            return true;
        }
        let Some((key, entry)) = self.map.get_key_value_mut(k) else {
            return false;
        };
        entry.expires_at = Some(at);
        self.expiry.schedule(key.clone(), at);
        self.maybe_compact();
        true
    }

    /// Deadline of a live key, `None` if absent or persistent
    pub fn expiry_of(&mut self, k: &[u8]) -> Option<Instant> {
        self.expire_if_due(k, Instant::now());
        self.map.get(k).and_then(|e| e.expires_at)
    }

    /// Clear the deadline of a live key. True iff one was removed.
    pub fn persist(&mut self, k: &[u8]) -> bool {
        self.expire_if_due(k, Instant::now());
        match self.map.get_mut(k) {
            Some(e) => e.expires_at.take().is_some(),
            None => false,
        }
    }

    /// Move the entry at `from` (deadline included) to `to`, replacing it
    pub fn rename(&mut self, from: &[u8], to: Bytes) -> Result<()> {
        let now = Instant::now();
        self.expire_if_due(from, now);
        if from == &to[..] {
            return if self.map.contains_key(from) {
                Ok(())
            } else {
                Err(StoreError::NoSuchKey)
            };
        }
        let entry = self.remove_entry(from).ok_or(StoreError::NoSuchKey)?;
        self.remove_entry(&to);
        self.set(to, entry.value, entry.expires_at);
        Ok(())
    }

    /// Number of live entries.
    ///
    /// Everything due is purged first so the answer never counts expired keys.
    pub fn count(&mut self) -> usize {
        self.purge_expired(Instant::now(), usize::MAX);
        self.map.len()
    }

    /// Remove up to `limit` keys whose deadline is at or before `now`.
    ///
    /// A key can sit in the heap twice with the same deadline (RENAME a b,
    /// then b a), so only keys actually removed from the map are counted.
    pub fn purge_expired(&mut self, now: Instant, limit: usize) -> usize {
        let mut removed = 0;
        while removed < limit {
            let map = &self.map;
            let next = self
                .expiry
                .pop_due(now, |k, at| matches!(map.get(k), Some(e) if e.expires_at == Some(at)))
                .next();
            let Some(k) = next else { break };
            if self.remove_entry(&k).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Earliest pending deadline, used by the sweeper to size its sleep
    pub fn next_deadline(&self) -> Option<Instant> {
        self.expiry.next_deadline()
    }

    /// Visit keys in scan order starting at hash position `from`.
    ///
    /// Expired keys are reported too; callers filter with [`Keyspace::is_live`].
    pub(crate) fn scan_from(&self, from: u64) -> impl Iterator<Item = (u64, &Bytes)> + '_ {
        self.order.range((from, Bytes::new())..).map(|(h, k)| (*h, k))
    }

    pub(crate) fn is_live(&self, k: &[u8], now: Instant) -> bool {
        matches!(self.map.get(k), Some(e) if !e.is_expired(now))
    }

    /// Read-only view of a live value, leaving expired entries in place.
    ///
    /// Lets multi-key readers hold several values at once.
    pub(crate) fn peek(&self, k: &[u8], now: Instant) -> Option<&Value> {
        self.map.get(k).filter(|e| !e.is_expired(now)).map(|e| &e.value)
    }

    /// Drop every entry and all index state
    pub fn flush(&mut self) {
        self.map.clear();
        self.order.clear();
        self.expiry.clear();
    }

    // Stale heap pairs pile up when deadlines are rewritten; rebuild once
    // they clearly outnumber the keys that could still be current.
    fn maybe_compact(&mut self) {
        if self.expiry.len() > 64 && self.expiry.len() > 2 * self.map.len() {
            let map = &self.map;
            self.expiry
                .compact(|k, at| matches!(map.get(k), Some(e) if e.expires_at == Some(at)));
        }
    }
}
