//! List commands. Popping the last element deletes the key.

use super::{ensure_key, normalize_range};
use crate::error::{Result, StoreError};
use crate::storage::Keyspace;
use crate::value::{ListValue, Value};
use bytes::Bytes;

fn existing<'a>(ks: &'a mut Keyspace, key: &[u8]) -> Result<Option<&'a mut ListValue>> {
    ensure_key(key)?;
    match ks.get_mut(key) {
        None => Ok(None),
        Some(Value::List(l)) => Ok(Some(l)),
        Some(_) => Err(StoreError::TypeMismatch),
    }
}

#[derive(Clone, Copy)]
enum End {
    Left,
    Right,
}

fn push(ks: &mut Keyspace, key: &Bytes, values: Vec<Bytes>, end: End) -> Result<i64> {
    ensure_key(key)?;
    if values.is_empty() {
        let name = match end {
            End::Left => "lpush",
            End::Right => "rpush",
        };
        return Err(StoreError::WrongArity(name.into()));
    }
    let list = match ks.get_or_insert_with(key, || Value::List(ListValue::new())) {
        Value::List(l) => l,
        _ => return Err(StoreError::TypeMismatch),
    };
    for v in values {
        match end {
            End::Left => list.push_front(v),
            End::Right => list.push_back(v),
        }
    }
    Ok(list.len() as i64)
}

fn pop(ks: &mut Keyspace, key: &[u8], end: End) -> Result<Option<Bytes>> {
    let Some(list) = existing(ks, key)? else {
        return Ok(None);
    };
    let item = match end {
        End::Left => list.pop_front(),
        End::Right => list.pop_back(),
    };
    if list.is_empty() {
        ks.delete(key);
    }
    Ok(item)
}

/// LPUSH: values are pushed one by one, so the last argument ends up first
pub fn lpush(ks: &mut Keyspace, key: &Bytes, values: Vec<Bytes>) -> Result<i64> {
    push(ks, key, values, End::Left)
}

pub fn rpush(ks: &mut Keyspace, key: &Bytes, values: Vec<Bytes>) -> Result<i64> {
    push(ks, key, values, End::Right)
}

/// LPOP: `None` on a missing key
pub fn lpop(ks: &mut Keyspace, key: &[u8]) -> Result<Option<Bytes>> {
    pop(ks, key, End::Left)
}

pub fn rpop(ks: &mut Keyspace, key: &[u8]) -> Result<Option<Bytes>> {
    pop(ks, key, End::Right)
}

/// LRANGE with inclusive bounds; negative indices count from the tail
pub fn lrange(ks: &mut Keyspace, key: &[u8], start: i64, stop: i64) -> Result<Vec<Bytes>> {
    let Some(list) = existing(ks, key)? else {
        return Ok(Vec::new());
    };
    Ok(match normalize_range(start, stop, list.len()) {
        Some((from, to)) => list.range(from..=to).cloned().collect(),
        None => Vec::new(),
    })
}

pub fn llen(ks: &mut Keyspace, key: &[u8]) -> Result<i64> {
    Ok(existing(ks, key)?.map_or(0, |l| l.len() as i64))
}
