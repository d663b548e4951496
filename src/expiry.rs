/*!
 * Expiry Index
 *
 * Min-heap of (deadline, key) pairs used to find keys whose TTL has run out
 * without walking the whole keyspace. Entries are never removed eagerly when
 * a key is deleted, persisted or rescheduled; the owner supplies an
 * `is_current` check and stale pairs are dropped when they surface.
 */

use bytes::Bytes;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

#[derive(Debug, Default)]
pub struct ExpiryIndex {
    heap: BinaryHeap<Reverse<(Instant, Bytes)>>,
}

impl ExpiryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scheduled pairs, stale ones included
    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn schedule(&mut self, key: Bytes, at: Instant) {
        self.heap.push(Reverse((at, key)));
    }

    /// Earliest scheduled deadline, possibly stale
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse((at, _))| *at)
    }

    /// Lazily yield and remove every key due at or before `now`.
    ///
    /// `is_current(key, deadline)` must return true only when the key is
    /// still mapped and still carries exactly that deadline. Pairs failing
    /// the check are discarded without being yielded. Pairs not yet pulled
    /// from the iterator stay in the heap.
    pub fn pop_due<F>(&mut self, now: Instant, is_current: F) -> PopDue<'_, F>
    where
        F: FnMut(&Bytes, Instant) -> bool,
    {
        PopDue {
            index: self,
            now,
            is_current,
        }
    }

    /// Rebuild the heap keeping only pairs that are still current
    pub fn compact<F>(&mut self, mut is_current: F)
    where
        F: FnMut(&Bytes, Instant) -> bool,
    {
        let heap = std::mem::take(&mut self.heap);
        self.heap = heap
            .into_vec()
            .into_iter()
            .filter(|Reverse((at, key))| is_current(key, *at))
            .collect();
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

/// Iterator returned by [`ExpiryIndex::pop_due`]
pub struct PopDue<'a, F> {
    index: &'a mut ExpiryIndex,
    now: Instant,
    is_current: F,
}

impl<'a, F> Iterator for PopDue<'a, F>
where
    F: FnMut(&Bytes, Instant) -> bool,
{
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        loop {
            match self.index.heap.peek() {
                Some(Reverse((at, _))) if *at <= self.now => {}
                _ => return None,
            }
            let Reverse((at, key)) = self.index.heap.pop()?;
            if (self.is_current)(&key, at) {
                return Some(key);
            }
        }
    }
}
