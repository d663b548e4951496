/*!
 * Type Operation Handlers
 *
 * One module per value shape. Every handler takes the keyspace it operates
 * on, fails with `TypeMismatch` when the key holds another shape, and spells
 * out its own missing-key behavior.
 */

pub mod hash;
pub mod list;
pub mod set;
pub mod string;
pub mod zset;

use crate::error::{Result, StoreError};

/// Reject the empty key before touching the keyspace
#[inline]
pub(crate) fn ensure_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        Err(StoreError::EmptyKey)
    } else {
        Ok(())
    }
}

/// Resolve inclusive `start..=stop` indices, negative counting from the end.
///
/// Returns `None` when the clamped range is empty.
pub(crate) fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}
