//! Sorted set commands over [`SortedSet`]

use super::{ensure_key, normalize_range};
use crate::error::{Result, StoreError};
use crate::storage::Keyspace;
use crate::value::{ScoreBound, SortedSet, Value};
use bytes::Bytes;

fn existing<'a>(ks: &'a mut Keyspace, key: &[u8]) -> Result<Option<&'a mut SortedSet>> {
    ensure_key(key)?;
    match ks.get_mut(key) {
        None => Ok(None),
        Some(Value::ZSet(z)) => Ok(Some(z)),
        Some(_) => Err(StoreError::TypeMismatch),
    }
}

fn created<'a>(ks: &'a mut Keyspace, key: &Bytes) -> Result<&'a mut SortedSet> {
    ensure_key(key)?;
    match ks.get_or_insert_with(key, || Value::ZSet(SortedSet::new())) {
        Value::ZSet(z) => Ok(z),
        _ => Err(StoreError::TypeMismatch),
    }
}

/// ZADD: overwrites existing scores, returns the number of new members
pub fn zadd(ks: &mut Keyspace, key: &Bytes, pairs: Vec<(f64, Bytes)>) -> Result<i64> {
    if pairs.is_empty() {
        return Err(StoreError::WrongArity("zadd".into()));
    }
    if pairs.iter().any(|(s, _)| s.is_nan()) {
        return Err(StoreError::NotAFloat);
    }
    let z = created(ks, key)?;
    Ok(pairs.into_iter().filter(|(s, m)| z.insert(m.clone(), *s)).count() as i64)
}

/// ZINCRBY: adds to the current score, a missing member starts at 0
pub fn zincrby(ks: &mut Keyspace, key: &Bytes, delta: f64, member: Bytes) -> Result<f64> {
    if delta.is_nan() {
        return Err(StoreError::NotAFloat);
    }
    created(ks, key)?.incr(member, delta).ok_or(StoreError::NanScore)
}

pub fn zscore(ks: &mut Keyspace, key: &[u8], member: &[u8]) -> Result<Option<f64>> {
    Ok(existing(ks, key)?.and_then(|z| z.score(member)))
}

/// ZRANK / ZREVRANK: 0-based position, `None` when key or member is absent
pub fn zrank(ks: &mut Keyspace, key: &[u8], member: &[u8], reverse: bool) -> Result<Option<i64>> {
    Ok(existing(ks, key)?
        .and_then(|z| if reverse { z.rev_rank(member) } else { z.rank(member) })
        .map(|r| r as i64))
}

/// ZRANGE / ZREVRANGE by inclusive rank, negative indices from the end
pub fn zrange(
    ks: &mut Keyspace,
    key: &[u8],
    start: i64,
    stop: i64,
    reverse: bool,
) -> Result<Vec<(Bytes, f64)>> {
    let Some(z) = existing(ks, key)? else {
        return Ok(Vec::new());
    };
    Ok(match normalize_range(start, stop, z.len()) {
        Some((from, to)) => z.range_by_rank(from, to, reverse),
        None => Vec::new(),
    })
}

/// ZRANGEBYSCORE, ascending
pub fn zrangebyscore(
    ks: &mut Keyspace,
    key: &[u8],
    min: ScoreBound,
    max: ScoreBound,
) -> Result<Vec<(Bytes, f64)>> {
    Ok(existing(ks, key)?
        .map(|z| z.range_by_score(min, max))
        .unwrap_or_default())
}

/// ZREM: removing the last member removes the key
pub fn zrem(ks: &mut Keyspace, key: &[u8], members: &[Bytes]) -> Result<i64> {
    let Some(z) = existing(ks, key)? else {
        return Ok(0);
    };
    let removed = members.iter().filter(|m| z.remove(m)).count() as i64;
    if z.is_empty() {
        ks.delete(key);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &'static str) -> Bytes {
        Bytes::from_static(s.as_bytes())
    }

    fn board() -> Keyspace {
        let mut ks = Keyspace::new();
        let pairs = vec![
            (1500.0, b("Alice")),
            (2300.0, b("Bob")),
            (1800.0, b("Carol")),
            (2100.0, b("David")),
            (1950.0, b("Eve")),
        ];
        assert_eq!(zadd(&mut ks, &b("lb"), pairs).unwrap(), 5);
        ks
    }

    #[test]
    fn reverse_range_orders_by_score_desc() {
        let mut ks = Keyspace::new();
        zadd(&mut ks, &b("z"), vec![(10.0, b("a")), (20.0, b("b")), (15.0, b("c"))]).unwrap();
        assert_eq!(
            zrange(&mut ks, b"z", 0, -1, true).unwrap(),
            vec![(b("b"), 20.0), (b("c"), 15.0), (b("a"), 10.0)]
        );
        assert_eq!(
            zrangebyscore(&mut ks, b"z", ScoreBound::inclusive(12.0), ScoreBound::inclusive(20.0)).unwrap(),
            vec![(b("c"), 15.0), (b("b"), 20.0)]
        );
    }

    #[test]
    fn zadd_overwrites_while_zincrby_adds() {
        let mut ks = board();
        assert_eq!(zadd(&mut ks, &b("lb"), vec![(100.0, b("Alice"))]).unwrap(), 0);
        assert_eq!(zscore(&mut ks, b"lb", b"Alice").unwrap(), Some(100.0));
        assert_eq!(zincrby(&mut ks, &b("lb"), 300.0, b("Alice")).unwrap(), 400.0);
        assert_eq!(zincrby(&mut ks, &b("lb"), 5.0, b("Zed")).unwrap(), 5.0);
    }

    #[test]
    fn ranks_in_both_directions() {
        let mut ks = board();
        assert_eq!(zrank(&mut ks, b"lb", b"Carol", true).unwrap(), Some(3));
        assert_eq!(zrank(&mut ks, b"lb", b"Carol", false).unwrap(), Some(1));
        assert_eq!(zrank(&mut ks, b"lb", b"Nobody", false).unwrap(), None);
        assert_eq!(zrank(&mut ks, b"none", b"Carol", false).unwrap(), None);
    }

    #[test]
    fn score_window_is_inclusive() {
        let mut ks = board();
        let got = zrangebyscore(&mut ks, b"lb", ScoreBound::inclusive(1800.0), ScoreBound::inclusive(2200.0)).unwrap();
        let names: Vec<_> = got.into_iter().map(|(m, _)| m).collect();
        assert_eq!(names, vec![b("Carol"), b("Eve"), b("David")]);
    }

    #[test]
    fn nan_is_rejected() {
        let mut ks = Keyspace::new();
        assert_eq!(zadd(&mut ks, &b("z"), vec![(f64::NAN, b("a"))]), Err(StoreError::NotAFloat));
        assert!(!ks.exists(b"z"));
        zadd(&mut ks, &b("z"), vec![(f64::INFINITY, b("a"))]).unwrap();
        assert_eq!(zincrby(&mut ks, &b("z"), f64::NEG_INFINITY, b("a")), Err(StoreError::NanScore));
    }

    #[test]
    fn zrem_last_member_removes_key() {
        let mut ks = Keyspace::new();
        zadd(&mut ks, &b("z"), vec![(1.0, b("a"))]).unwrap();
        assert_eq!(zrem(&mut ks, b"z", &[b("a"), b("b")]).unwrap(), 1);
        assert!(!ks.exists(b"z"));
    }
}
