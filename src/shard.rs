/*!
 * Command Execution Shard
 *
 * A shard owns one keyspace behind a mutex and executes commands against it.
 * Single commands and whole batches each take the lock exactly once, which
 * is what makes a batch atomic: no other caller can observe or interleave
 * with its intermediate states.
 */

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::protocol::{Cmd, Reply};
use crate::scan::{self, Pattern, ScanIter};
use crate::storage::Keyspace;
use crate::types::{ensure_key, hash, list, set, string, zset};
use bytes::Bytes;
use log::{debug, trace};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A shard represents a single execution unit
///
/// The store runs one shard per process; the id only labels log lines.
#[repr(align(64))]
pub struct Shard {
    /// Identifier used in log output
    pub id: usize,
    keyspace: Mutex<Keyspace>,
    config: Config,
}

impl Shard {
    /// Create an empty shard with default configuration
    pub fn new(id: usize) -> Self {
        Self::with_config(id, Config::default())
    }

    pub fn with_config(id: usize, config: Config) -> Self {
        Self {
            id,
            keyspace: Mutex::new(Keyspace::new()),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Execute one parsed command under the shard lock
    ///
    /// # Arguments
    /// * `cmd` - Parsed command to execute
    ///
    /// # Returns
    /// * The command's reply; failures come back as `Reply::Error`
    pub fn exec(&self, cmd: Cmd) -> Reply {
        let mut ks = self.keyspace.lock();
        self.apply(&mut ks, cmd)
    }

    /// Parse an argument vector and execute it.
    ///
    /// ```
    /// use lodestore::{Reply, Shard};
    ///
    /// let shard = Shard::new(0);
    /// assert_eq!(shard.execute(&["SET", "user:1000:name", "Alice"]), Reply::ok());
    /// assert_eq!(shard.execute(&["GET", "user:1000:name"]), Reply::bulk("Alice"));
    /// ```
    pub fn execute<A: AsRef<[u8]>>(&self, args: &[A]) -> Reply {
        match Cmd::from_args(args) {
            Ok(cmd) => self.exec(cmd),
            Err(e) => e.into(),
        }
    }

    /// Execute `cmds` in order under a single lock acquisition.
    ///
    /// A failing command yields an `Error` in its own slot and does not stop
    /// or undo the rest of the batch.
    pub fn exec_batch(&self, cmds: Vec<Cmd>) -> Vec<Reply> {
        self.run_locked(cmds.into_iter().map(Ok).collect(), None)
            .unwrap_or_default()
    }

    fn run_locked(&self, slots: Vec<Result<Cmd>>, cancel: Option<&CancelToken>) -> Option<Vec<Reply>> {
        let mut ks = self.keyspace.lock();
        if cancel.is_some_and(CancelToken::is_cancelled) {
            debug!("shard {}: batch of {} cancelled before execution", self.id, slots.len());
            return None;
        }
        debug!("shard {}: executing batch of {}", self.id, slots.len());
        Some(
            slots
                .into_iter()
                .map(|slot| match slot {
                    Ok(cmd) => self.apply(&mut ks, cmd),
                    Err(e) => e.into(),
                })
                .collect(),
        )
    }

    /// One SCAN step under the lock, used by [`ScanIter`]
    pub fn scan_batch(&self, cursor: u64, pattern: Option<&Pattern>, count: usize) -> (u64, Vec<Bytes>) {
        let ks = self.keyspace.lock();
        scan::scan(&ks, cursor, pattern, count)
    }

    /// Lazily iterate every live key matching `pattern`
    pub fn scan_iter(&self, pattern: Option<&[u8]>, count: Option<usize>) -> ScanIter<'_> {
        ScanIter::new(
            self,
            pattern.map(Pattern::new),
            count.unwrap_or(self.config.scan_count),
        )
    }

    /// Active expiration round: remove up to `limit` due keys
    pub fn sweep_expired(&self, limit: usize) -> usize {
        let removed = self.keyspace.lock().purge_expired(Instant::now(), limit);
        if removed > 0 {
            trace!("shard {}: swept {} expired keys", self.id, removed);
        }
        removed
    }

    /// Earliest pending deadline, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.keyspace.lock().next_deadline()
    }

    fn apply(&self, ks: &mut Keyspace, cmd: Cmd) -> Reply {
        self.dispatch(ks, cmd).unwrap_or_else(Reply::from)
    }

    fn dispatch(&self, ks: &mut Keyspace, cmd: Cmd) -> Result<Reply> {
        let reply = match cmd {
            Cmd::Ping => Reply::Status("PONG"),

            // Strings
            Cmd::Get(k) => Reply::bulk_or_nil(string::get(ks, &k)?),
            Cmd::Set(k, v, ttl) => {
                string::set(ks, k, v, ttl)?;
                Reply::ok()
            }
            Cmd::SetEx(k, secs, v) => {
                string::setex(ks, k, secs, v)?;
                Reply::ok()
            }
            Cmd::IncrBy(k, delta) => Reply::Integer(string::incr_by(ks, &k, delta)?),
            Cmd::MSet(pairs) => {
                string::mset(ks, pairs)?;
                Reply::ok()
            }
            Cmd::MGet(keys) => Reply::Array(
                string::mget(ks, &keys)?
                    .into_iter()
                    .map(Reply::bulk_or_nil)
                    .collect(),
            ),

            // Expiration
            Cmd::Expire(k, secs) => expire(ks, &k, secs, Duration::from_secs, "expire")?,
            Cmd::PExpire(k, ms) => expire(ks, &k, ms, Duration::from_millis, "pexpire")?,
            Cmd::Ttl(k) => Reply::Integer(remaining(ks, &k, 1_000_000_000)?),
            Cmd::PTtl(k) => Reply::Integer(remaining(ks, &k, 1_000_000)?),
            Cmd::Persist(k) => {
                ensure_key(&k)?;
                Reply::Integer(ks.persist(&k) as i64)
            }

            // Hashes
            Cmd::HSet(k, pairs) => Reply::Integer(hash::hset(ks, &k, pairs)?),
            Cmd::HGet(k, f) => Reply::bulk_or_nil(hash::hget(ks, &k, &f)?),
            Cmd::HGetAll(k) => Reply::array_of(
                hash::hgetall(ks, &k)?
                    .into_iter()
                    .flat_map(|(f, v)| [f, v]),
            ),
            Cmd::HDel(k, fields) => Reply::Integer(hash::hdel(ks, &k, &fields)?),
            Cmd::HIncrBy(k, f, delta) => Reply::Integer(hash::hincrby(ks, &k, f, delta)?),

            // Lists
            Cmd::LPush(k, values) => Reply::Integer(list::lpush(ks, &k, values)?),
            Cmd::RPush(k, values) => Reply::Integer(list::rpush(ks, &k, values)?),
            Cmd::LPop(k) => Reply::bulk_or_nil(list::lpop(ks, &k)?),
            Cmd::RPop(k) => Reply::bulk_or_nil(list::rpop(ks, &k)?),
            Cmd::LRange(k, start, stop) => Reply::array_of(list::lrange(ks, &k, start, stop)?),
            Cmd::LLen(k) => Reply::Integer(list::llen(ks, &k)?),

            // Sets
            Cmd::SAdd(k, members) => Reply::Integer(set::sadd(ks, &k, members)?),
            Cmd::SMembers(k) => Reply::array_of(set::smembers(ks, &k)?),
            Cmd::SInter(keys) => Reply::array_of(set::sinter(ks, &keys)?),
            Cmd::SUnion(keys) => Reply::array_of(set::sunion(ks, &keys)?),
            Cmd::SDiff(keys) => Reply::array_of(set::sdiff(ks, &keys)?),

            // Sorted sets
            Cmd::ZAdd(k, pairs) => Reply::Integer(zset::zadd(ks, &k, pairs)?),
            Cmd::ZIncrBy(k, delta, m) => Reply::score(zset::zincrby(ks, &k, delta, m)?),
            Cmd::ZScore(k, m) => zset::zscore(ks, &k, &m)?.map_or(Reply::Nil, Reply::score),
            Cmd::ZRank(k, m) => Reply::integer_or_nil(zset::zrank(ks, &k, &m, false)?),
            Cmd::ZRevRank(k, m) => Reply::integer_or_nil(zset::zrank(ks, &k, &m, true)?),
            Cmd::ZRange { key, start, stop, with_scores } => {
                Reply::scored(zset::zrange(ks, &key, start, stop, false)?, with_scores)
            }
            Cmd::ZRevRange { key, start, stop, with_scores } => {
                Reply::scored(zset::zrange(ks, &key, start, stop, true)?, with_scores)
            }
            Cmd::ZRangeByScore { key, min, max, with_scores } => {
                Reply::scored(zset::zrangebyscore(ks, &key, min, max)?, with_scores)
            }
            Cmd::ZRem(k, members) => Reply::Integer(zset::zrem(ks, &k, &members)?),

            // Keyspace
            Cmd::Scan { cursor, pattern, count } => {
                let pattern = pattern.as_deref().map(Pattern::new);
                let count = count.unwrap_or(self.config.scan_count);
                let (next, keys) = scan::scan(ks, cursor, pattern.as_ref(), count);
                Reply::Array(vec![
                    Reply::bulk(next.to_string()),
                    Reply::array_of(keys),
                ])
            }
            Cmd::Keys(p) => Reply::array_of(scan::keys(ks, &Pattern::new(&p))),
            Cmd::Del(keys) => {
                keys.iter().try_for_each(|k| ensure_key(k))?;
                Reply::Integer(keys.iter().filter(|k| ks.delete(k)).count() as i64)
            }
            Cmd::Exists(keys) => {
                keys.iter().try_for_each(|k| ensure_key(k))?;
                Reply::Integer(keys.iter().filter(|k| ks.exists(k)).count() as i64)
            }
            Cmd::Type(k) => {
                ensure_key(&k)?;
                Reply::Status(ks.type_of(&k).map_or("none", |t| t.as_str()))
            }
            Cmd::Rename(from, to) => {
                ensure_key(&from)?;
                ensure_key(&to)?;
                ks.rename(&from, to)?;
                Reply::ok()
            }
            Cmd::DbSize => Reply::Integer(ks.count() as i64),
            Cmd::FlushDb => {
                let dropped = ks.count();
                ks.flush();
                debug!("shard {}: flushed {} keys", self.id, dropped);
                Reply::ok()
            }
        };
        Ok(reply)
    }
}

/// EXPIRE / PEXPIRE. A non-positive amount deletes the key at once.
fn expire(
    ks: &mut Keyspace,
    key: &[u8],
    amount: i64,
    unit: fn(u64) -> Duration,
    name: &'static str,
) -> Result<Reply> {
    ensure_key(key)?;
    let now = Instant::now();
    let at = if amount <= 0 {
        now
    } else {
        now.checked_add(unit(amount as u64))
            .ok_or(StoreError::InvalidExpire(name))?
    };
    Ok(Reply::Integer(ks.expire_at(key, at) as i64))
}

/// TTL / PTTL in units of `unit_nanos`, rounded up.
///
/// -2 for a missing key, -1 for a key without a deadline.
fn remaining(ks: &mut Keyspace, key: &[u8], unit_nanos: u128) -> Result<i64> {
    ensure_key(key)?;
    if !ks.exists(key) {
        return Ok(-2);
    }
    let Some(at) = ks.expiry_of(key) else {
        return Ok(-1);
    };
    let nanos = at.saturating_duration_since(Instant::now()).as_nanos();
    let units = (nanos + unit_nanos - 1) / unit_nanos;
    Ok(i64::try_from(units).unwrap_or(i64::MAX).max(1))
}

/// Shared flag that lets another thread call off a queued batch
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Commands queued client-side and executed atomically as one batch.
///
/// Parse failures are kept in their slot and reported as that slot's
/// `Error` reply; they never prevent the other commands from running.
#[derive(Debug, Default)]
pub struct Pipeline {
    slots: Vec<Result<Cmd>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw argument vector
    pub fn push<A: AsRef<[u8]>>(&mut self, args: &[A]) -> &mut Self {
        self.slots.push(Cmd::from_args(args));
        self
    }

    /// Queue an already-built command
    pub fn push_cmd(&mut self, cmd: Cmd) -> &mut Self {
        self.slots.push(Ok(cmd));
        self
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Execute every queued command, one reply per slot
    pub fn run(self, shard: &Shard) -> Vec<Reply> {
        shard.run_locked(self.slots, None).unwrap_or_default()
    }

    /// Like [`Pipeline::run`], unless `token` is cancelled by the time the
    /// shard lock is acquired; then nothing runs and `None` is returned.
    pub fn run_unless_cancelled(self, shard: &Shard, token: &CancelToken) -> Option<Vec<Reply>> {
        shard.run_locked(self.slots, Some(token))
    }
}
