//! String commands: SET/GET/INCRBY/MSET/MGET/SETEX

use super::ensure_key;
use crate::error::{Result, StoreError};
use crate::storage::Keyspace;
use crate::value::Value;
use bytes::Bytes;
use std::time::{Duration, Instant};

/// Parse a stored or supplied value as a signed 64-bit integer
pub(crate) fn parse_int(b: &[u8]) -> Option<i64> {
    if b.is_empty() || b.len() > 20 || b[0] == b'+' {
        return None;
    }
    std::str::from_utf8(b).ok()?.parse().ok()
}

/// GET: `None` for a missing key, `TypeMismatch` for a non-string
pub fn get(ks: &mut Keyspace, key: &[u8]) -> Result<Option<Bytes>> {
    ensure_key(key)?;
    match ks.get(key) {
        None => Ok(None),
        Some(Value::Str(v)) => Ok(Some(v.clone())),
        Some(_) => Err(StoreError::TypeMismatch),
    }
}

/// SET with an optional TTL. Any previous deadline is replaced.
///
/// A key holding another shape must be deleted first.
pub fn set(ks: &mut Keyspace, key: Bytes, value: Bytes, ttl: Option<Duration>) -> Result<()> {
    ensure_key(&key)?;
    if !matches!(ks.get(&key), Some(Value::Str(_)) | None) {
        return Err(StoreError::TypeMismatch);
    }
    let expires_at = match ttl {
        Some(t) => Some(Instant::now().checked_add(t).ok_or(StoreError::InvalidExpire("set"))?),
        None => None,
    };
    ks.set(key, Value::Str(value), expires_at);
    Ok(())
}

/// SETEX: TTL in whole seconds, which must be positive
pub fn setex(ks: &mut Keyspace, key: Bytes, secs: i64, value: Bytes) -> Result<()> {
    if secs <= 0 {
        return Err(StoreError::InvalidExpire("setex"));
    }
    set(ks, key, value, Some(Duration::from_secs(secs as u64)))
}

/// INCRBY: a missing key counts as 0. The deadline of an existing key is kept.
pub fn incr_by(ks: &mut Keyspace, key: &Bytes, delta: i64) -> Result<i64> {
    ensure_key(key)?;
    match ks.get_mut(key) {
        Some(Value::Str(v)) => {
            let current = parse_int(v).ok_or(StoreError::NotAnInteger)?;
            let next = current.checked_add(delta).ok_or(StoreError::Overflow)?;
            *v = Bytes::from(next.to_string());
            Ok(next)
        }
        Some(_) => Err(StoreError::TypeMismatch),
        None => {
            ks.set(key.clone(), Value::Str(Bytes::from(delta.to_string())), None);
            Ok(delta)
        }
    }
}

/// MSET: every key is checked before any is written, so a type error leaves
/// the keyspace untouched
pub fn mset(ks: &mut Keyspace, pairs: Vec<(Bytes, Bytes)>) -> Result<()> {
    for (k, _) in &pairs {
        ensure_key(k)?;
        if let Some(v) = ks.get(k) {
            if !matches!(v, Value::Str(_)) {
                return Err(StoreError::TypeMismatch);
            }
        }
    }
    for (k, v) in pairs {
        ks.set(k, Value::Str(v), None);
    }
    Ok(())
}

/// MGET: missing and non-string keys both read as `None`
pub fn mget(ks: &mut Keyspace, keys: &[Bytes]) -> Result<Vec<Option<Bytes>>> {
    keys.iter()
        .map(|k| {
            ensure_key(k)?;
            Ok(match ks.get(k) {
                Some(Value::Str(v)) => Some(v.clone()),
                _ => None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &'static str) -> Bytes {
        Bytes::from_static(s.as_bytes())
    }

    #[test]
    fn incr_starts_from_zero_and_keeps_ttl() {
        let mut ks = Keyspace::new();
        assert_eq!(incr_by(&mut ks, &b("n"), 5).unwrap(), 5);
        set(&mut ks, b("age"), b("28"), Some(Duration::from_secs(60))).unwrap();
        assert_eq!(incr_by(&mut ks, &b("age"), 1).unwrap(), 29);
        assert_eq!(get(&mut ks, b"age").unwrap(), Some(b("29")));
        assert!(ks.expiry_of(b"age").is_some());
    }

    #[test]
    fn incr_rejects_non_integers_and_overflow() {
        let mut ks = Keyspace::new();
        set(&mut ks, b("s"), b("John Doe"), None).unwrap();
        assert_eq!(incr_by(&mut ks, &b("s"), 1), Err(StoreError::NotAnInteger));
        set(&mut ks, b("max"), Bytes::from(i64::MAX.to_string()), None).unwrap();
        assert_eq!(incr_by(&mut ks, &b("max"), 1), Err(StoreError::Overflow));
        set(&mut ks, b("plus"), b("+3"), None).unwrap();
        assert_eq!(incr_by(&mut ks, &b("plus"), 1), Err(StoreError::NotAnInteger));
    }

    #[test]
    fn set_refuses_to_change_type() {
        let mut ks = Keyspace::new();
        ks.set(b("l"), Value::List(Default::default()), None);
        assert_eq!(set(&mut ks, b("l"), b("x"), None), Err(StoreError::TypeMismatch));
        assert_eq!(get(&mut ks, b"l"), Err(StoreError::TypeMismatch));
    }

    #[test]
    fn mset_is_all_or_nothing() {
        let mut ks = Keyspace::new();
        ks.set(b("h"), Value::Hash(Default::default()), None);
        let err = mset(&mut ks, vec![(b("a"), b("1")), (b("h"), b("2"))]);
        assert_eq!(err, Err(StoreError::TypeMismatch));
        assert!(!ks.exists(b"a"));

        mset(&mut ks, vec![(b("config:timeout"), b("30")), (b("config:retries"), b("3"))]).unwrap();
        let got = mget(&mut ks, &[b("config:timeout"), b("missing"), b("h"), b("config:retries")]).unwrap();
        assert_eq!(got, vec![Some(b("30")), None, None, Some(b("3"))]);
    }

    #[test]
    fn setex_requires_positive_ttl() {
        let mut ks = Keyspace::new();
        assert_eq!(setex(&mut ks, b("k"), 0, b("v")), Err(StoreError::InvalidExpire("setex")));
        setex(&mut ks, b("k"), 300, b("active")).unwrap();
        assert!(ks.expiry_of(b"k").is_some());
    }

    #[test]
    fn empty_key_is_an_error() {
        let mut ks = Keyspace::new();
        assert_eq!(set(&mut ks, Bytes::new(), b("v"), None), Err(StoreError::EmptyKey));
        assert_eq!(get(&mut ks, b""), Err(StoreError::EmptyKey));
        assert_eq!(mget(&mut ks, &[b("a"), Bytes::new()]), Err(StoreError::EmptyKey));
    }
}
