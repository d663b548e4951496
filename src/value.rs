/*!
 * Stored Value Types
 *
 * The five data shapes a key can hold. Collections use hashbrown maps with
 * AHash, matching the keyspace itself.
 */

use ahash::RandomState;
use bytes::Bytes;
use hashbrown::{HashMap, HashSet};
use std::cmp::Ordering;
use std::collections::{BTreeSet, VecDeque};

pub type HashValue = HashMap<Bytes, Bytes, RandomState>;
pub type SetValue = HashSet<Bytes, RandomState>;
pub type ListValue = VecDeque<Bytes>;

/// A value stored under a single key
#[derive(Debug, Clone)]
pub enum Value {
    /// String/binary data
    Str(Bytes),
    /// Field -> value mapping
    Hash(HashValue),
    /// Ordered sequence with O(1) push/pop at both ends
    List(ListValue),
    /// Unordered unique members
    Set(SetValue),
    /// Members ordered by (score, member)
    ZSet(SortedSet),
}

/// Type tag reported by TYPE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Str,
    Hash,
    List,
    Set,
    ZSet,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Str => "string",
            TypeTag::Hash => "hash",
            TypeTag::List => "list",
            TypeTag::Set => "set",
            TypeTag::ZSet => "zset",
        }
    }
}

impl Value {
    #[inline]
    pub fn tag(&self) -> TypeTag {
        match self {
            Value::Str(_) => TypeTag::Str,
            Value::Hash(_) => TypeTag::Hash,
            Value::List(_) => TypeTag::List,
            Value::Set(_) => TypeTag::Set,
            Value::ZSet(_) => TypeTag::ZSet,
        }
    }
}

/// Sorted-set score with a total order.
///
/// NaN is rejected before a score is ever stored, so `total_cmp` agrees with
/// numeric comparison for every value in the index.
#[derive(Debug, Clone, Copy)]
pub struct Score(pub f64);

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// One end of a ZRANGEBYSCORE interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBound {
    pub value: f64,
    pub exclusive: bool,
}

impl ScoreBound {
    pub fn inclusive(value: f64) -> Self {
        Self { value, exclusive: false }
    }

    pub fn exclusive(value: f64) -> Self {
        Self { value, exclusive: true }
    }

    fn admits_from_below(&self, score: f64) -> bool {
        if self.exclusive { score > self.value } else { score >= self.value }
    }

    fn admits_from_above(&self, score: f64) -> bool {
        if self.exclusive { score < self.value } else { score <= self.value }
    }
}

/// Member -> score map plus an order index on (score, member).
///
/// Both structures are only touched together, so every member in `scores`
/// has exactly one `(score, member)` pair in `order`.
#[derive(Debug, Clone, Default)]
pub struct SortedSet {
    scores: HashMap<Bytes, f64, RandomState>,
    order: BTreeSet<(Score, Bytes)>,
}

// -0.0 and 0.0 must land on the same index position
#[inline]
fn normalize(score: f64) -> f64 {
    if score == 0.0 { 0.0 } else { score }
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Insert or overwrite `member`. Returns true when the member is new.
    pub fn insert(&mut self, member: Bytes, score: f64) -> bool {
        let score = normalize(score);
        match self.scores.insert(member.clone(), score) {
            Some(old) => {
                self.order.remove(&(Score(old), member.clone()));
                self.order.insert((Score(score), member));
                false
            }
            None => {
                self.order.insert((Score(score), member));
                true
            }
        }
    }

    /// Add `delta` to the member's score, starting from 0 when absent.
    /// Returns `None` when the result would be NaN (inf + -inf).
    pub fn incr(&mut self, member: Bytes, delta: f64) -> Option<f64> {
        let current = self.scores.get(&member).copied().unwrap_or(0.0);
        let next = current + delta;
        if next.is_nan() {
            return None;
        }
        self.insert(member, next);
        Some(normalize(next))
    }

    pub fn remove(&mut self, member: &[u8]) -> bool {
        match self.scores.remove_entry(member) {
            Some((member, score)) => {
                self.order.remove(&(Score(score), member));
                true
            }
            None => false,
        }
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// 0-based ascending position in the (score, member) order
    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let (member, score) = self.scores.get_key_value(member)?;
        Some(self.order.range(..(Score(*score), member.clone())).count())
    }

    pub fn rev_rank(&self, member: &[u8]) -> Option<usize> {
        self.rank(member).map(|r| self.len() - 1 - r)
    }

    /// Members between two already normalized inclusive rank positions
    pub fn range_by_rank(&self, start: usize, stop: usize, reverse: bool) -> Vec<(Bytes, f64)> {
        let take = stop + 1 - start;
        let pick = |(s, m): &(Score, Bytes)| (m.clone(), s.0);
        if reverse {
            self.order.iter().rev().skip(start).take(take).map(pick).collect()
        } else {
            self.order.iter().skip(start).take(take).map(pick).collect()
        }
    }

    /// Members with `min <= score <= max` (bounds may be exclusive), ascending
    pub fn range_by_score(&self, min: ScoreBound, max: ScoreBound) -> Vec<(Bytes, f64)> {
        if min.value.is_nan() || max.value.is_nan() {
            return Vec::new();
        }
        self.order
            .range((Score(min.value), Bytes::new())..)
            .skip_while(|(s, _)| !min.admits_from_below(s.0))
            .take_while(|(s, _)| max.admits_from_above(s.0))
            .map(|(s, m)| (m.clone(), s.0))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zset(pairs: &[(&'static str, f64)]) -> SortedSet {
        let mut z = SortedSet::new();
        for (m, s) in pairs {
            z.insert(Bytes::from_static(m.as_bytes()), *s);
        }
        z
    }

    #[test]
    fn insert_is_upsert_and_keeps_index_consistent() {
        let mut z = zset(&[("a", 10.0), ("b", 20.0)]);
        assert!(!z.insert(Bytes::from_static(b"a"), 30.0));
        assert_eq!(z.len(), 2);
        assert_eq!(z.order.len(), 2);
        assert_eq!(z.score(b"a"), Some(30.0));
        assert_eq!(z.rank(b"a"), Some(1));
        assert_eq!(z.rank(b"b"), Some(0));
    }

    #[test]
    fn equal_scores_break_ties_by_member() {
        let z = zset(&[("c", 1.0), ("a", 1.0), ("b", 1.0)]);
        let members: Vec<_> = z.range_by_rank(0, 2, false).into_iter().map(|(m, _)| m).collect();
        assert_eq!(members, vec!["a", "b", "c"]);
        assert_eq!(z.rev_rank(b"a"), Some(2));
    }

    #[test]
    fn incr_defaults_to_zero_and_rejects_nan() {
        let mut z = SortedSet::new();
        assert_eq!(z.incr(Bytes::from_static(b"m"), 2.5), Some(2.5));
        assert_eq!(z.incr(Bytes::from_static(b"m"), f64::INFINITY), Some(f64::INFINITY));
        assert_eq!(z.incr(Bytes::from_static(b"m"), f64::NEG_INFINITY), None);
        assert_eq!(z.score(b"m"), Some(f64::INFINITY));
    }

    #[test]
    fn negative_zero_matches_zero() {
        let mut z = zset(&[("a", 0.0)]);
        z.insert(Bytes::from_static(b"b"), -0.0);
        assert_eq!(z.range_by_score(ScoreBound::inclusive(0.0), ScoreBound::inclusive(0.0)).len(), 2);
    }

    #[test]
    fn score_range_with_exclusive_bounds() {
        let z = zset(&[("a", 10.0), ("b", 20.0), ("c", 15.0)]);
        let got = z.range_by_score(ScoreBound::exclusive(10.0), ScoreBound::inclusive(20.0));
        assert_eq!(got, vec![(Bytes::from_static(b"c"), 15.0), (Bytes::from_static(b"b"), 20.0)]);
        let got = z.range_by_score(ScoreBound::inclusive(f64::NEG_INFINITY), ScoreBound::exclusive(15.0));
        assert_eq!(got, vec![(Bytes::from_static(b"a"), 10.0)]);
    }

    #[test]
    fn remove_clears_both_structures() {
        let mut z = zset(&[("a", 1.0)]);
        assert!(z.remove(b"a"));
        assert!(!z.remove(b"a"));
        assert!(z.is_empty());
        assert!(z.order.is_empty());
    }
}
