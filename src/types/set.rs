//! Set commands. SINTER/SUNION/SDIFF are pure reads that return a fresh set.

use super::ensure_key;
use crate::error::{Result, StoreError};
use crate::storage::Keyspace;
use crate::value::{SetValue, Value};
use bytes::Bytes;
use std::time::Instant;

/// SADD: returns how many members were not already present
pub fn sadd(ks: &mut Keyspace, key: &Bytes, members: Vec<Bytes>) -> Result<i64> {
    ensure_key(key)?;
    if members.is_empty() {
        return Err(StoreError::WrongArity("sadd".into()));
    }
    let set = match ks.get_or_insert_with(key, || Value::Set(SetValue::default())) {
        Value::Set(s) => s,
        _ => return Err(StoreError::TypeMismatch),
    };
    Ok(members.into_iter().filter(|m| set.insert(m.clone())).count() as i64)
}

/// SMEMBERS: unordered snapshot, empty for a missing key
pub fn smembers(ks: &mut Keyspace, key: &[u8]) -> Result<Vec<Bytes>> {
    ensure_key(key)?;
    match ks.get(key) {
        None => Ok(Vec::new()),
        Some(Value::Set(s)) => Ok(s.iter().cloned().collect()),
        Some(_) => Err(StoreError::TypeMismatch),
    }
}

/// Borrow every named set at once. Missing keys read as `None`; a key of
/// another type fails the whole operation.
fn lookup<'a>(ks: &'a Keyspace, keys: &[Bytes]) -> Result<Vec<Option<&'a SetValue>>> {
    let now = Instant::now();
    keys.iter()
        .map(|k| {
            ensure_key(k)?;
            match ks.peek(k, now) {
                None => Ok(None),
                Some(Value::Set(s)) => Ok(Some(s)),
                Some(_) => Err(StoreError::TypeMismatch),
            }
        })
        .collect()
}

/// SINTER: members present in every named set
pub fn sinter(ks: &Keyspace, keys: &[Bytes]) -> Result<SetValue> {
    let sets = lookup(ks, keys)?;
    if sets.iter().any(Option::is_none) {
        return Ok(SetValue::default());
    }
    let mut sets: Vec<&SetValue> = sets.into_iter().flatten().collect();
    sets.sort_by_key(|s| s.len());
    let Some((smallest, rest)) = sets.split_first() else {
        return Ok(SetValue::default());
    };
    Ok(smallest
        .iter()
        .filter(|m| rest.iter().all(|s| s.contains(*m)))
        .cloned()
        .collect())
}

/// SUNION: members present in any named set
pub fn sunion(ks: &Keyspace, keys: &[Bytes]) -> Result<SetValue> {
    let mut out = SetValue::default();
    for s in lookup(ks, keys)?.into_iter().flatten() {
        out.extend(s.iter().cloned());
    }
    Ok(out)
}

/// SDIFF: members of the first set absent from all the others
pub fn sdiff(ks: &Keyspace, keys: &[Bytes]) -> Result<SetValue> {
    let sets = lookup(ks, keys)?;
    let Some((Some(first), rest)) = sets.split_first() else {
        return Ok(SetValue::default());
    };
    Ok(first
        .iter()
        .filter(|m| rest.iter().flatten().all(|s| !s.contains(*m)))
        .cloned()
        .collect())
}
