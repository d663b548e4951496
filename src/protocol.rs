/*!
 * Command Surface
 *
 * The in-process call contract of the store: an argument vector is parsed
 * into a typed [`Cmd`], executed by a shard, and answered with a [`Reply`].
 * Argument count and shape are validated here so handlers only ever see
 * well-formed input.
 */

use crate::error::{Result, StoreError};
use crate::value::ScoreBound;
use bytes::Bytes;
use std::time::Duration;

/// Commands supported by the store
///
/// Keys, fields, members and values are kept as `Bytes` so text and binary
/// data are handled alike.
#[derive(Debug, Clone, PartialEq)]
pub enum Cmd {
    /// PING
    Ping,

    // Strings
    /// GET key
    Get(Bytes),
    /// SET key value [EX seconds | PX milliseconds]
    Set(Bytes, Bytes, Option<Duration>),
    /// SETEX key seconds value
    SetEx(Bytes, i64, Bytes),
    /// INCR / INCRBY / DECR / DECRBY, normalized to a signed delta
    IncrBy(Bytes, i64),
    /// MSET key value [key value ...]
    MSet(Vec<(Bytes, Bytes)>),
    /// MGET key [key ...]
    MGet(Vec<Bytes>),

    // Expiration
    /// EXPIRE key seconds
    Expire(Bytes, i64),
    /// PEXPIRE key milliseconds
    PExpire(Bytes, i64),
    /// TTL key
    Ttl(Bytes),
    /// PTTL key
    PTtl(Bytes),
    /// PERSIST key
    Persist(Bytes),

    // Hashes
    /// HSET key field value [field value ...]
    HSet(Bytes, Vec<(Bytes, Bytes)>),
    /// HGET key field
    HGet(Bytes, Bytes),
    /// HGETALL key
    HGetAll(Bytes),
    /// HDEL key field [field ...]
    HDel(Bytes, Vec<Bytes>),
    /// HINCRBY key field delta
    HIncrBy(Bytes, Bytes, i64),

    // Lists
    LPush(Bytes, Vec<Bytes>),
    RPush(Bytes, Vec<Bytes>),
    LPop(Bytes),
    RPop(Bytes),
    /// LRANGE key start stop
    LRange(Bytes, i64, i64),
    LLen(Bytes),

    // Sets
    SAdd(Bytes, Vec<Bytes>),
    SMembers(Bytes),
    SInter(Vec<Bytes>),
    SUnion(Vec<Bytes>),
    SDiff(Vec<Bytes>),

    // Sorted sets
    /// ZADD key score member [score member ...]
    ZAdd(Bytes, Vec<(f64, Bytes)>),
    /// ZINCRBY key delta member
    ZIncrBy(Bytes, f64, Bytes),
    ZScore(Bytes, Bytes),
    ZRank(Bytes, Bytes),
    ZRevRank(Bytes, Bytes),
    /// ZRANGE key start stop [WITHSCORES]
    ZRange { key: Bytes, start: i64, stop: i64, with_scores: bool },
    /// ZREVRANGE key start stop [WITHSCORES]
    ZRevRange { key: Bytes, start: i64, stop: i64, with_scores: bool },
    /// ZRANGEBYSCORE key min max [WITHSCORES]
    ZRangeByScore { key: Bytes, min: ScoreBound, max: ScoreBound, with_scores: bool },
    ZRem(Bytes, Vec<Bytes>),

    // Keyspace
    /// SCAN cursor [MATCH pattern] [COUNT count]
    Scan { cursor: u64, pattern: Option<Bytes>, count: Option<usize> },
    Keys(Bytes),
    Del(Vec<Bytes>),
    Exists(Vec<Bytes>),
    Type(Bytes),
    Rename(Bytes, Bytes),
    DbSize,
    FlushDb,
}

/// Result of executing one command
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Absent value
    Nil,
    /// Status line such as OK, PONG or a type name
    Status(&'static str),
    Integer(i64),
    Bulk(Bytes),
    Array(Vec<Reply>),
    /// Failure message for this command only
    Error(String),
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Status("OK")
    }

    pub fn bulk(b: impl Into<Bytes>) -> Self {
        Reply::Bulk(b.into())
    }

    /// Bulk for `Some`, Nil for `None`
    pub fn bulk_or_nil(b: Option<Bytes>) -> Self {
        b.map_or(Reply::Nil, Reply::Bulk)
    }

    pub fn integer_or_nil(i: Option<i64>) -> Self {
        i.map_or(Reply::Nil, Reply::Integer)
    }

    /// Scores are returned as bulk strings, `2300` rather than `2300.0`
    pub fn score(s: f64) -> Self {
        Reply::Bulk(Bytes::from(format_score(s)))
    }

    pub fn array_of(items: impl IntoIterator<Item = Bytes>) -> Self {
        Reply::Array(items.into_iter().map(Reply::Bulk).collect())
    }

    /// Flatten (member, score) pairs, optionally dropping the scores
    pub fn scored(pairs: Vec<(Bytes, f64)>, with_scores: bool) -> Self {
        let mut out = Vec::with_capacity(if with_scores { pairs.len() * 2 } else { pairs.len() });
        for (m, s) in pairs {
            out.push(Reply::Bulk(m));
            if with_scores {
                out.push(Reply::score(s));
            }
        }
        Reply::Array(out)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Reply::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Reply::Bulk(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Vec<Reply>> {
        match self {
            Reply::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<StoreError> for Reply {
    fn from(e: StoreError) -> Self {
        Reply::Error(e.to_string())
    }
}

impl std::fmt::Display for Reply {
    /// redis-cli style rendering, used by the walkthrough binary
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Nil => write!(f, "(nil)"),
            Reply::Status(s) => write!(f, "{s}"),
            Reply::Integer(i) => write!(f, "(integer) {i}"),
            Reply::Bulk(b) => write!(f, "\"{}\"", String::from_utf8_lossy(b)),
            Reply::Error(e) => write!(f, "(error) {e}"),
            Reply::Array(items) if items.is_empty() => write!(f, "(empty array)"),
            Reply::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {item}", i + 1)?;
                }
                Ok(())
            }
        }
    }
}

pub fn format_score(s: f64) -> String {
    if s.is_infinite() {
        if s > 0.0 { "inf".into() } else { "-inf".into() }
    } else {
        s.to_string()
    }
}

fn int(b: &[u8]) -> Result<i64> {
    crate::types::string::parse_int(b).ok_or(StoreError::NotAnInteger)
}

fn float(b: &[u8]) -> Result<f64> {
    let s = std::str::from_utf8(b).map_err(|_| StoreError::NotAFloat)?;
    let v = match s.to_ascii_lowercase().as_str() {
        "inf" | "+inf" => f64::INFINITY,
        "-inf" => f64::NEG_INFINITY,
        other => other.parse::<f64>().map_err(|_| StoreError::NotAFloat)?,
    };
    if v.is_nan() {
        return Err(StoreError::NotAFloat);
    }
    Ok(v)
}

/// `(` prefix marks an exclusive bound
fn score_bound(b: &[u8]) -> Result<ScoreBound> {
    match b.split_first() {
        Some((b'(', rest)) => Ok(ScoreBound::exclusive(float(rest)?)),
        _ => Ok(ScoreBound::inclusive(float(b)?)),
    }
}

fn pairs(items: &[Bytes]) -> Vec<(Bytes, Bytes)> {
    items.chunks_exact(2).map(|p| (p[0].clone(), p[1].clone())).collect()
}

/// Trailing WITHSCORES flag; anything else is a syntax error
fn with_scores(rest: &[Bytes]) -> Result<bool> {
    match rest {
        [] => Ok(false),
        [flag] if flag.eq_ignore_ascii_case(b"WITHSCORES") => Ok(true),
        _ => Err(StoreError::Syntax),
    }
}

fn ttl_option(rest: &[Bytes]) -> Result<Option<Duration>> {
    match rest {
        [] => Ok(None),
        [opt, n] => {
            let n = int(n)?;
            if n <= 0 {
                return Err(StoreError::InvalidExpire("set"));
            }
            if opt.eq_ignore_ascii_case(b"EX") {
                Ok(Some(Duration::from_secs(n as u64)))
            } else if opt.eq_ignore_ascii_case(b"PX") {
                Ok(Some(Duration::from_millis(n as u64)))
            } else {
                Err(StoreError::Syntax)
            }
        }
        _ => Err(StoreError::Syntax),
    }
}

fn scan_options(rest: &[Bytes]) -> Result<(Option<Bytes>, Option<usize>)> {
    let (mut pattern, mut count) = (None, None);
    for opt in rest.chunks(2) {
        let [name, value] = opt else {
            return Err(StoreError::Syntax);
        };
        if name.eq_ignore_ascii_case(b"MATCH") {
            pattern = Some(value.clone());
        } else if name.eq_ignore_ascii_case(b"COUNT") {
            let n = int(value)?;
            if n < 1 {
                return Err(StoreError::Syntax);
            }
            count = Some(n as usize);
        } else {
            return Err(StoreError::Syntax);
        }
    }
    Ok((pattern, count))
}

impl Cmd {
    /// Parse an argument vector (`items[0]` is the command name).
    ///
    /// Names are matched case-insensitively. Arity is checked before any
    /// argument is interpreted.
    pub fn parse(items: &[Bytes]) -> Result<Cmd> {
        let Some((name, args)) = items.split_first() else {
            return Err(StoreError::Syntax);
        };
        let upper = name.to_ascii_uppercase();
        let n = args.len();
        let arity_err = || StoreError::WrongArity(String::from_utf8_lossy(name).to_lowercase());
        let need = |ok: bool| if ok { Ok(()) } else { Err(arity_err()) };
        let a = |i: usize| args[i].clone();

        let cmd = match upper.as_slice() {
            b"PING" => Cmd::Ping,

            b"GET" => {
                need(n == 1)?;
                Cmd::Get(a(0))
            }
            b"SET" => {
                need(n >= 2)?;
                Cmd::Set(a(0), a(1), ttl_option(&args[2..])?)
            }
            b"SETEX" => {
                need(n == 3)?;
                Cmd::SetEx(a(0), int(&args[1])?, a(2))
            }
            b"INCR" | b"DECR" => {
                need(n == 1)?;
                let delta = if upper.as_slice() == b"INCR" { 1 } else { -1 };
                Cmd::IncrBy(a(0), delta)
            }
            b"INCRBY" => {
                need(n == 2)?;
                Cmd::IncrBy(a(0), int(&args[1])?)
            }
            b"DECRBY" => {
                need(n == 2)?;
                let delta = int(&args[1])?.checked_neg().ok_or(StoreError::Overflow)?;
                Cmd::IncrBy(a(0), delta)
            }
            b"MSET" => {
                need(n >= 2 && n % 2 == 0)?;
                Cmd::MSet(pairs(args))
            }
            b"MGET" => {
                need(n >= 1)?;
                Cmd::MGet(args.to_vec())
            }

            b"EXPIRE" | b"PEXPIRE" => {
                need(n == 2)?;
                let t = int(&args[1])?;
                if upper.as_slice() == b"EXPIRE" {
                    Cmd::Expire(a(0), t)
                } else {
                    Cmd::PExpire(a(0), t)
                }
            }
            b"TTL" => {
                need(n == 1)?;
                Cmd::Ttl(a(0))
            }
            b"PTTL" => {
                need(n == 1)?;
                Cmd::PTtl(a(0))
            }
            b"PERSIST" => {
                need(n == 1)?;
                Cmd::Persist(a(0))
            }

            b"HSET" => {
                need(n >= 3 && n % 2 == 1)?;
                Cmd::HSet(a(0), pairs(&args[1..]))
            }
            b"HGET" => {
                need(n == 2)?;
                Cmd::HGet(a(0), a(1))
            }
            b"HGETALL" => {
                need(n == 1)?;
                Cmd::HGetAll(a(0))
            }
            b"HDEL" => {
                need(n >= 2)?;
                Cmd::HDel(a(0), args[1..].to_vec())
            }
            b"HINCRBY" => {
                need(n == 3)?;
                Cmd::HIncrBy(a(0), a(1), int(&args[2])?)
            }

            b"LPUSH" | b"RPUSH" => {
                need(n >= 2)?;
                let values = args[1..].to_vec();
                if upper.as_slice() == b"LPUSH" {
                    Cmd::LPush(a(0), values)
                } else {
                    Cmd::RPush(a(0), values)
                }
            }
            b"LPOP" => {
                need(n == 1)?;
                Cmd::LPop(a(0))
            }
            b"RPOP" => {
                need(n == 1)?;
                Cmd::RPop(a(0))
            }
            b"LRANGE" => {
                need(n == 3)?;
                Cmd::LRange(a(0), int(&args[1])?, int(&args[2])?)
            }
            b"LLEN" => {
                need(n == 1)?;
                Cmd::LLen(a(0))
            }

            b"SADD" => {
                need(n >= 2)?;
                Cmd::SAdd(a(0), args[1..].to_vec())
            }
            b"SMEMBERS" => {
                need(n == 1)?;
                Cmd::SMembers(a(0))
            }
            b"SINTER" => {
                need(n >= 1)?;
                Cmd::SInter(args.to_vec())
            }
            b"SUNION" => {
                need(n >= 1)?;
                Cmd::SUnion(args.to_vec())
            }
            b"SDIFF" => {
                need(n >= 1)?;
                Cmd::SDiff(args.to_vec())
            }

            b"ZADD" => {
                need(n >= 3 && n % 2 == 1)?;
                let members = args[1..]
                    .chunks_exact(2)
                    .map(|p| Ok((float(&p[0])?, p[1].clone())))
                    .collect::<Result<Vec<_>>>()?;
                Cmd::ZAdd(a(0), members)
            }
            b"ZINCRBY" => {
                need(n == 3)?;
                Cmd::ZIncrBy(a(0), float(&args[1])?, a(2))
            }
            b"ZSCORE" => {
                need(n == 2)?;
                Cmd::ZScore(a(0), a(1))
            }
            b"ZRANK" => {
                need(n == 2)?;
                Cmd::ZRank(a(0), a(1))
            }
            b"ZREVRANK" => {
                need(n == 2)?;
                Cmd::ZRevRank(a(0), a(1))
            }
            b"ZRANGE" | b"ZREVRANGE" => {
                need(n == 3 || n == 4)?;
                let (key, start, stop) = (a(0), int(&args[1])?, int(&args[2])?);
                let with_scores = with_scores(&args[3..])?;
                if upper.as_slice() == b"ZRANGE" {
                    Cmd::ZRange { key, start, stop, with_scores }
                } else {
                    Cmd::ZRevRange { key, start, stop, with_scores }
                }
            }
            b"ZRANGEBYSCORE" => {
                need(n == 3 || n == 4)?;
                Cmd::ZRangeByScore {
                    key: a(0),
                    min: score_bound(&args[1])?,
                    max: score_bound(&args[2])?,
                    with_scores: with_scores(&args[3..])?,
                }
            }
            b"ZREM" => {
                need(n >= 2)?;
                Cmd::ZRem(a(0), args[1..].to_vec())
            }

            b"SCAN" => {
                need(n >= 1)?;
                let cursor = std::str::from_utf8(&args[0])
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .ok_or(StoreError::InvalidCursor)?;
                let (pattern, count) = scan_options(&args[1..])?;
                Cmd::Scan { cursor, pattern, count }
            }
            b"KEYS" => {
                need(n == 1)?;
                Cmd::Keys(a(0))
            }
            b"DEL" => {
                need(n >= 1)?;
                Cmd::Del(args.to_vec())
            }
            b"EXISTS" => {
                need(n >= 1)?;
                Cmd::Exists(args.to_vec())
            }
            b"TYPE" => {
                need(n == 1)?;
                Cmd::Type(a(0))
            }
            b"RENAME" => {
                need(n == 2)?;
                Cmd::Rename(a(0), a(1))
            }
            b"DBSIZE" => {
                need(n == 0)?;
                Cmd::DbSize
            }
            b"FLUSHDB" => {
                need(n == 0)?;
                Cmd::FlushDb
            }

            _ => return Err(StoreError::UnknownCommand(String::from_utf8_lossy(name).into_owned())),
        };
        Ok(cmd)
    }

    /// Parse from anything byte-like, e.g. `&["SET", "k", "v"]`
    pub fn from_args<A: AsRef<[u8]>>(args: &[A]) -> Result<Cmd> {
        let items: Vec<Bytes> = args.iter().map(|a| Bytes::copy_from_slice(a.as_ref())).collect();
        Cmd::parse(&items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cmd> {
        Cmd::from_args(args)
    }

    #[test]
    fn names_are_case_insensitive() {
        assert_eq!(parse(&["ping"]).unwrap(), Cmd::Ping);
        assert_eq!(parse(&["gEt", "k"]).unwrap(), Cmd::Get(Bytes::from_static(b"k")));
    }

    #[test]
    fn arity_is_checked() {
        assert_eq!(parse(&["GET"]), Err(StoreError::WrongArity("get".into())));
        assert_eq!(parse(&["MSET", "a", "1", "b"]), Err(StoreError::WrongArity("mset".into())));
        assert_eq!(parse(&["HSET", "h", "f"]), Err(StoreError::WrongArity("hset".into())));
        assert_eq!(parse(&["DBSIZE", "x"]), Err(StoreError::WrongArity("dbsize".into())));
        assert_eq!(parse(&[]), Err(StoreError::Syntax));
        assert!(matches!(parse(&["NOPE"]), Err(StoreError::UnknownCommand(_))));
    }

    #[test]
    fn numeric_arguments_are_validated() {
        assert_eq!(parse(&["INCRBY", "k", "x"]), Err(StoreError::NotAnInteger));
        assert_eq!(parse(&["ZADD", "z", "abc", "m"]), Err(StoreError::NotAFloat));
        assert_eq!(parse(&["ZADD", "z", "nan", "m"]), Err(StoreError::NotAFloat));
        assert_eq!(parse(&["SCAN", "-1"]), Err(StoreError::InvalidCursor));
        assert_eq!(parse(&["DECRBY", "k", "5"]).unwrap(), Cmd::IncrBy(Bytes::from_static(b"k"), -5));
    }

    #[test]
    fn set_options() {
        assert_eq!(
            parse(&["SET", "k", "v", "EX", "10"]).unwrap(),
            Cmd::Set(Bytes::from_static(b"k"), Bytes::from_static(b"v"), Some(Duration::from_secs(10)))
        );
        assert_eq!(parse(&["SET", "k", "v", "px", "0"]), Err(StoreError::InvalidExpire("set")));
        assert_eq!(parse(&["SET", "k", "v", "KEEP"]), Err(StoreError::Syntax));
    }

    #[test]
    fn score_bounds_and_withscores() {
        let cmd = parse(&["ZRANGEBYSCORE", "z", "(1800", "+inf", "withscores"]).unwrap();
        assert_eq!(
            cmd,
            Cmd::ZRangeByScore {
                key: Bytes::from_static(b"z"),
                min: ScoreBound::exclusive(1800.0),
                max: ScoreBound::inclusive(f64::INFINITY),
                with_scores: true,
            }
        );
        assert_eq!(parse(&["ZREVRANGE", "z", "0", "-1", "SCORES"]), Err(StoreError::Syntax));
    }

    #[test]
    fn scan_options_parse() {
        assert_eq!(
            parse(&["SCAN", "0", "MATCH", "user:*", "COUNT", "100"]).unwrap(),
            Cmd::Scan { cursor: 0, pattern: Some(Bytes::from_static(b"user:*")), count: Some(100) }
        );
        assert_eq!(parse(&["SCAN", "0", "COUNT", "0"]), Err(StoreError::Syntax));
        assert_eq!(parse(&["SCAN", "0", "MATCH"]), Err(StoreError::Syntax));
    }

    #[test]
    fn reply_rendering() {
        assert_eq!(Reply::score(2300.0), Reply::bulk("2300"));
        assert_eq!(Reply::score(1.5), Reply::bulk("1.5"));
        assert_eq!(Reply::score(f64::NEG_INFINITY), Reply::bulk("-inf"));
        let r = Reply::scored(vec![(Bytes::from_static(b"a"), 1.0)], true);
        assert_eq!(r.to_string(), "1) \"a\"\n2) \"1\"");
        assert_eq!(Reply::from(StoreError::Syntax), Reply::Error("ERR syntax error".into()));
    }
}
