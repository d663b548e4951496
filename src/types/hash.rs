//! Hash commands. A hash with no fields is never retained.

use super::ensure_key;
use super::string::parse_int;
use crate::error::{Result, StoreError};
use crate::storage::Keyspace;
use crate::value::{HashValue, Value};
use bytes::Bytes;

fn existing<'a>(ks: &'a mut Keyspace, key: &[u8]) -> Result<Option<&'a mut HashValue>> {
    ensure_key(key)?;
    match ks.get_mut(key) {
        None => Ok(None),
        Some(Value::Hash(h)) => Ok(Some(h)),
        Some(_) => Err(StoreError::TypeMismatch),
    }
}

fn created<'a>(ks: &'a mut Keyspace, key: &Bytes) -> Result<&'a mut HashValue> {
    ensure_key(key)?;
    match ks.get_or_insert_with(key, || Value::Hash(HashValue::default())) {
        Value::Hash(h) => Ok(h),
        _ => Err(StoreError::TypeMismatch),
    }
}

/// HSET: returns the number of fields that did not exist before
pub fn hset(ks: &mut Keyspace, key: &Bytes, pairs: Vec<(Bytes, Bytes)>) -> Result<i64> {
    if pairs.is_empty() {
        return Err(StoreError::WrongArity("hset".into()));
    }
    let h = created(ks, key)?;
    let mut added = 0;
    for (field, value) in pairs {
        if h.insert(field, value).is_none() {
            added += 1;
        }
    }
    Ok(added)
}

/// HGET: `None` for a missing key or field
pub fn hget(ks: &mut Keyspace, key: &[u8], field: &[u8]) -> Result<Option<Bytes>> {
    Ok(existing(ks, key)?.and_then(|h| h.get(field).cloned()))
}

/// HGETALL: field/value pairs in no particular order
pub fn hgetall(ks: &mut Keyspace, key: &[u8]) -> Result<Vec<(Bytes, Bytes)>> {
    Ok(existing(ks, key)?
        .map(|h| h.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
        .unwrap_or_default())
}

/// HDEL: returns how many of `fields` were removed. Removing the last field
/// removes the key.
pub fn hdel(ks: &mut Keyspace, key: &[u8], fields: &[Bytes]) -> Result<i64> {
    let Some(h) = existing(ks, key)? else {
        return Ok(0);
    };
    let mut removed = 0;
    for f in fields {
        if h.remove(f).is_some() {
            removed += 1;
        }
    }
    if h.is_empty() {
        ks.delete(key);
    }
    Ok(removed)
}

/// HINCRBY: a missing key or field counts as 0
pub fn hincrby(ks: &mut Keyspace, key: &Bytes, field: Bytes, delta: i64) -> Result<i64> {
    let h = created(ks, key)?;
    let current = match h.get(&field) {
        Some(v) => parse_int(v).ok_or(StoreError::NotAnInteger)?,
        None => 0,
    };
    let next = current.checked_add(delta).ok_or(StoreError::Overflow)?;
    h.insert(field, Bytes::from(next.to_string()));
    Ok(next)
}
