use bytes::Bytes;
use lodestore::*;

fn bulk(s: &str) -> Reply {
    Reply::bulk(Bytes::copy_from_slice(s.as_bytes()))
}

fn bulks(items: &[&str]) -> Reply {
    Reply::Array(items.iter().map(|s| bulk(s)).collect())
}

#[test]
fn set_get_del_cycle() {
    let s = Shard::new(0);
    assert_eq!(s.execute(&["SET", "a", "1"]), Reply::ok());
    assert_eq!(s.execute(&["GET", "a"]), bulk("1"));
    assert_eq!(s.execute(&["DEL", "a"]), Reply::Integer(1));
    assert_eq!(s.execute(&["GET", "a"]), Reply::Nil);
    assert_eq!(s.execute(&["DEL", "a"]), Reply::Integer(0));
}

#[test]
fn rename_exists_incr() {
    let s = Shard::new(0);
    s.execute(&["SET", "x", "41"]);
    assert_eq!(s.execute(&["EXISTS", "x"]), Reply::Integer(1));
    assert_eq!(s.execute(&["INCR", "x"]), Reply::Integer(42));
    assert_eq!(s.execute(&["RENAME", "x", "y"]), Reply::ok());
    assert_eq!(s.execute(&["GET", "y"]), bulk("42"));
    assert_eq!(s.execute(&["EXISTS", "x", "y", "y"]), Reply::Integer(2));
    assert_eq!(
        s.execute(&["RENAME", "x", "z"]),
        Reply::Error("ERR no such key".into())
    );
}

#[test]
fn counters() {
    let s = Shard::new(0);
    assert_eq!(s.execute(&["INCRBY", "c", "10"]), Reply::Integer(10));
    assert_eq!(s.execute(&["DECR", "c"]), Reply::Integer(9));
    assert_eq!(s.execute(&["DECRBY", "c", "20"]), Reply::Integer(-11));
    s.execute(&["SET", "max", "9223372036854775807"]);
    assert_eq!(
        s.execute(&["INCR", "max"]),
        Reply::Error("ERR increment or decrement would overflow".into())
    );
    assert_eq!(s.execute(&["GET", "max"]), bulk("9223372036854775807"));
}

#[test]
fn mset_mget() {
    let s = Shard::new(0);
    assert_eq!(
        s.execute(&["MSET", "config:timeout", "30", "config:retries", "3"]),
        Reply::ok()
    );
    s.execute(&["LPUSH", "list", "x"]);
    assert_eq!(
        s.execute(&["MGET", "config:timeout", "missing", "config:retries", "list"]),
        Reply::Array(vec![bulk("30"), Reply::Nil, bulk("3"), Reply::Nil])
    );
}

#[test]
fn binary_values_round_trip() {
    let s = Shard::new(0);
    let value: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
    assert_eq!(s.execute(&[&b"SET"[..], &b"blob"[..], &value[..]]), Reply::ok());
    assert_eq!(s.execute(&[&b"GET"[..], &b"blob"[..]]), Reply::bulk(value));
}

#[test]
fn json_document_stored_as_string() {
    let s = Shard::new(0);
    let doc = r#"{"id":"prod_001","specs":{"ram":"16GB"},"tags":["electronics"],"in_stock":true}"#;
    s.execute(&["SET", "product:001", doc]);
    assert_eq!(s.execute(&["GET", "product:001"]), bulk(doc));
}

#[test]
fn type_and_keyspace_commands() {
    let s = Shard::new(0);
    s.execute(&["SET", "s", "v"]);
    s.execute(&["HSET", "h", "f", "v"]);
    s.execute(&["RPUSH", "l", "v"]);
    s.execute(&["SADD", "st", "v"]);
    s.execute(&["ZADD", "z", "1", "v"]);
    for (key, kind) in [("s", "string"), ("h", "hash"), ("l", "list"), ("st", "set"), ("z", "zset"), ("nope", "none")] {
        assert_eq!(s.execute(&["TYPE", key]), Reply::Status(kind));
    }
    assert_eq!(s.execute(&["DBSIZE"]), Reply::Integer(5));
    assert_eq!(s.execute(&["DEL", "s", "h", "nope"]), Reply::Integer(2));
    assert_eq!(s.execute(&["FLUSHDB"]), Reply::ok());
    assert_eq!(s.execute(&["DBSIZE"]), Reply::Integer(0));
}

#[test]
fn set_over_another_shape_is_rejected() {
    let s = Shard::new(0);
    s.execute(&["LPUSH", "l", "a"]);
    assert_eq!(
        s.execute(&["SET", "l", "v"]),
        Reply::Error("WRONGTYPE Operation against a key holding the wrong kind of value".into())
    );
    assert_eq!(s.execute(&["LRANGE", "l", "0", "-1"]), bulks(&["a"]));
}

#[test]
fn bad_input_never_panics() {
    let s = Shard::new(0);
    for args in [
        &[][..],
        &["SET"][..],
        &["SET", "", "v"][..],
        &["LRANGE", "l", "a", "b"][..],
        &["ZADD", "z", "x", "m"][..],
        &["SCAN", "abc"][..],
        &["SETEX", "k", "-5", "v"][..],
        &["EXPIRE", "k", "nan"][..],
        &["whatever"][..],
    ] {
        assert!(s.execute(args).is_error(), "{args:?}");
    }
    assert_eq!(s.execute(&["DBSIZE"]), Reply::Integer(0));
}

#[test]
fn empty_key_is_rejected_by_keyspace_commands() {
    let s = Shard::new(0);
    s.execute(&["SET", "a", "1"]);
    let empty = Reply::from(StoreError::EmptyKey);
    for args in [
        &["MGET", ""][..],
        &["MGET", "a", ""][..],
        &["EXPIRE", "", "10"][..],
        &["PEXPIRE", "", "10"][..],
        &["TTL", ""][..],
        &["PTTL", ""][..],
        &["PERSIST", ""][..],
        &["DEL", ""][..],
        &["DEL", "a", ""][..],
        &["EXISTS", "a", ""][..],
        &["TYPE", ""][..],
        &["RENAME", "", "b"][..],
        &["RENAME", "a", ""][..],
    ] {
        assert_eq!(s.execute(args), empty, "{args:?}");
    }
    // a rejected DEL removes nothing, not even its valid keys
    assert_eq!(s.execute(&["GET", "a"]), bulk("1"));
}
