/*!
 * lodestore Walkthrough
 *
 * Runs a guided tour of every value shape against an in-process shard with
 * the active expirer running, printing each command and its reply the way
 * redis-cli would.
 */

use anyhow::{bail, Result};
use lodestore::*;
use std::sync::Arc;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const PRODUCT_JSON: &str = r#"{"id":"prod_001","name":"Laptop","price":999.99,"specs":{"ram":"16GB","storage":"512GB SSD","processor":"Intel i7"},"tags":["electronics","computers","portable"],"in_stock":true}"#;

fn section(title: &str) {
    println!("\n{}\n{title}\n{}", "=".repeat(60), "=".repeat(60));
}

/// Execute one command, echo it and its reply
fn run(shard: &Shard, args: &[&str]) -> Reply {
    let shown: Vec<String> = args
        .iter()
        .map(|a| if a.contains(' ') || a.is_empty() { format!("{a:?}") } else { a.to_string() })
        .collect();
    let reply = shard.execute(args);
    println!("> {}\n{reply}", shown.join(" "));
    reply
}

/// Hash fields of `key` as (field, value) strings
fn fields(shard: &Shard, key: &[u8]) -> Vec<(String, String)> {
    let items = shard
        .execute(&[&b"HGETALL"[..], key])
        .into_array()
        .unwrap_or_default();
    items
        .chunks_exact(2)
        .filter_map(|p| Some((text(p[0].as_bytes()?), text(p[1].as_bytes()?))))
        .collect()
}

fn text(b: &[u8]) -> String {
    String::from_utf8_lossy(b).into_owned()
}

fn field<'a>(doc: &'a [(String, String)], name: &str) -> Option<&'a str> {
    doc.iter().find(|(f, _)| f == name).map(|(_, v)| v.as_str())
}

fn main() -> Result<()> {
    // Initialize logging - respects RUST_LOG environment variable
    env_logger::init();

    let config = Config::from_env();
    let shard = Arc::new(Shard::with_config(DEFAULT_SHARD, config.clone()));
    let expirer = spawn_expirer(shard.clone(), &config)?;
    let s = shard.as_ref();

    run(s, &["PING"]);
    section("CLEARING PREVIOUS DATA");
    run(s, &["FLUSHDB"]);

    section("1. STRINGS");
    run(s, &["SET", "user:1000:name", "John Doe"]);
    run(s, &["SET", "user:1000:email", "john@example.com"]);
    run(s, &["SET", "user:1000:age", "28"]);
    run(s, &["GET", "user:1000:name"]);
    run(s, &["INCR", "user:1000:age"]);
    run(s, &["MSET", "config:timeout", "30", "config:retries", "3"]);
    run(s, &["MGET", "config:timeout", "config:retries"]);

    section("2. HASHES");
    let users = [
        ["1", "Alice Johnson", "alice@example.com", "25", "New York", "developer"],
        ["2", "Bob Smith", "bob@example.com", "32", "San Francisco", "designer"],
        ["3", "Carol White", "carol@example.com", "28", "New York", "developer"],
        ["4", "David Brown", "david@example.com", "35", "Boston", "manager"],
    ];
    for [id, name, email, age, city, role] in users {
        let key = format!("user:{id}");
        run(
            s,
            &["HSET", key.as_str(), "name", name, "email", email, "age", age, "city", city, "role", role],
        );
    }
    run(s, &["HGETALL", "user:1"]);
    run(s, &["HGET", "user:2", "name"]);
    run(s, &["HSET", "user:1", "age", "26"]);
    run(s, &["HSET", "user:1", "department", "Engineering"]);
    run(s, &["HDEL", "user:2", "city"]);
    run(s, &["DEL", "user:4"]);

    section("3. LISTS");
    run(s, &["RPUSH", "tasks:pending", "Task 1: Design database schema"]);
    run(s, &["RPUSH", "tasks:pending", "Task 2: Implement API"]);
    run(s, &["RPUSH", "tasks:pending", "Task 3: Write tests"]);
    run(s, &["LPUSH", "tasks:pending", "Task 0: Setup project"]);
    run(s, &["LRANGE", "tasks:pending", "0", "-1"]);
    run(s, &["LLEN", "tasks:pending"]);
    run(s, &["LPOP", "tasks:pending"]);
    run(s, &["LRANGE", "tasks:pending", "0", "-1"]);

    section("4. SETS");
    run(s, &["SADD", "skills:python", "Alice", "Bob", "Carol"]);
    run(s, &["SADD", "skills:javascript", "Bob", "Carol", "David"]);
    run(s, &["SADD", "skills:java", "Alice", "David"]);
    run(s, &["SMEMBERS", "skills:python"]);
    run(s, &["SINTER", "skills:python", "skills:javascript"]);
    run(s, &["SUNION", "skills:python", "skills:java"]);
    run(s, &["SDIFF", "skills:python", "skills:javascript"]);

    section("5. SORTED SETS");
    run(
        s,
        &["ZADD", "leaderboard:game1", "1500", "Alice", "2300", "Bob", "1800", "Carol", "2100", "David", "1950", "Eve"],
    );
    run(s, &["ZREVRANGE", "leaderboard:game1", "0", "-1", "WITHSCORES"]);
    run(s, &["ZRANGEBYSCORE", "leaderboard:game1", "1800", "2200", "WITHSCORES"]);
    run(s, &["ZREVRANK", "leaderboard:game1", "Carol"]);
    run(s, &["ZINCRBY", "leaderboard:game1", "300", "Alice"]);
    run(s, &["ZSCORE", "leaderboard:game1", "Alice"]);

    section("6. SEARCH & FILTER");
    run(s, &["SCAN", "0", "MATCH", "user:*", "COUNT", "100"]);
    run(s, &["KEYS", "user:*"]);
    let user_keys: Vec<_> = s.scan_iter(Some(&b"user:*"[..]), None).collect();
    println!("found {} user keys", user_keys.len());
    println!("developers in New York:");
    for key in &user_keys {
        let doc = fields(s, key);
        if field(&doc, "role") == Some("developer") && field(&doc, "city") == Some("New York") {
            println!("  {} -> {}", text(key), field(&doc, "name").unwrap_or_default());
        }
    }
    println!("users aged 25-30:");
    for key in &user_keys {
        let doc = fields(s, key);
        let age: i64 = field(&doc, "age").and_then(|a| a.parse().ok()).unwrap_or(0);
        if (25..=30).contains(&age) {
            println!("  {} (age {age})", field(&doc, "name").unwrap_or_default());
        }
    }

    section("7. JSON AS A STRING");
    run(s, &["SET", "product:001", PRODUCT_JSON]);
    let stored = run(s, &["GET", "product:001"]);
    if stored.as_bytes().map(|b| &b[..]) != Some(PRODUCT_JSON.as_bytes()) {
        bail!("product:001 did not round trip");
    }

    section("8. EXPIRATION & TTL");
    run(s, &["SETEX", "session:user123", "300", "active"]);
    run(s, &["TTL", "session:user123"]);
    run(s, &["SET", "temp:data", "temporary value"]);
    run(s, &["EXPIRE", "temp:data", "60"]);
    run(s, &["TTL", "temp:data"]);

    section("9. ATOMIC BATCH");
    let mut transfer = Pipeline::new();
    transfer
        .push(&["HINCRBY", "user:1", "points", "-100"])
        .push(&["HINCRBY", "user:2", "points", "100"]);
    for reply in transfer.run(s) {
        println!("{reply}");
    }
    run(s, &["HGET", "user:1", "points"]);
    run(s, &["HGET", "user:2", "points"]);

    section("10. KEY MANAGEMENT");
    run(s, &["DBSIZE"]);
    run(s, &["EXISTS", "user:1"]);
    run(s, &["TYPE", "user:1"]);
    for key in s.scan_iter(None, Some(10)).take(5) {
        let kind = s.execute(&[&b"TYPE"[..], &key[..]]);
        println!("  {} ({kind})", text(&key));
    }

    expirer.stop();
    println!("\nwalkthrough complete");
    Ok(())
}
