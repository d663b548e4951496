/*!
 * Cursor-Based Key Iteration
 *
 * SCAN walks the keyspace's scan order, keys sorted by (xxh3 hash, key).
 * The cursor is the hash at which the next batch starts; a batch never stops
 * inside a run of keys sharing one hash. A key that exists for the whole
 * pass keeps its position, so it is visited exactly once no matter what is
 * inserted or deleted between calls. Keys added or removed mid-pass may or
 * may not show up.
 *
 * Cursor 0 starts a pass, and a returned cursor of 0 ends it.
 */

use crate::shard::Shard;
use crate::storage::Keyspace;
use bytes::Bytes;
use std::collections::VecDeque;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// `*`, any run of bytes
    Star,
    /// exactly one byte
    Byte(ByteMatch),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ByteMatch {
    Literal(u8),
    /// `?`
    Any,
    /// `[...]` as inclusive byte ranges
    Class { negate: bool, ranges: Vec<(u8, u8)> },
}

impl ByteMatch {
    fn matches(&self, c: u8) -> bool {
        match self {
            ByteMatch::Literal(l) => *l == c,
            ByteMatch::Any => true,
            ByteMatch::Class { negate, ranges } => {
                ranges.iter().any(|(lo, hi)| (*lo..=*hi).contains(&c)) != *negate
            }
        }
    }
}

/// Compiled glob pattern matched against whole keys.
///
/// Supports `*`, `?`, `[abc]`, `[a-z]`, `[^a]` / `[!a]`, and `\` escapes.
/// An unterminated `[` is taken literally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    tokens: Vec<Token>,
}

impl Pattern {
    pub fn new(pattern: &[u8]) -> Self {
        let mut tokens = Vec::with_capacity(pattern.len());
        let mut i = 0;
        while i < pattern.len() {
            match pattern[i] {
                b'*' => {
                    // runs of stars collapse into one
                    if tokens.last() != Some(&Token::Star) {
                        tokens.push(Token::Star);
                    }
                }
                b'?' => tokens.push(Token::Byte(ByteMatch::Any)),
                b'\\' if i + 1 < pattern.len() => {
                    i += 1;
                    tokens.push(Token::Byte(ByteMatch::Literal(pattern[i])));
                }
                b'[' => match parse_class(&pattern[i + 1..]) {
                    Some((class, used)) => {
                        tokens.push(Token::Byte(class));
                        i += used;
                    }
                    None => tokens.push(Token::Byte(ByteMatch::Literal(b'['))),
                },
                c => tokens.push(Token::Byte(ByteMatch::Literal(c))),
            }
            i += 1;
        }
        Self { tokens }
    }

    /// True when the pattern is a lone `*`
    pub fn matches_all(&self) -> bool {
        self.tokens == [Token::Star]
    }

    pub fn matches(&self, text: &[u8]) -> bool {
        let (mut p, mut t) = (0, 0);
        // pattern index after the latest star, and the text index it resumes at
        let mut backtrack: Option<(usize, usize)> = None;

        while t < text.len() {
            match self.tokens.get(p) {
                Some(Token::Star) => {
                    backtrack = Some((p + 1, t));
                    p += 1;
                    continue;
                }
                Some(Token::Byte(m)) if m.matches(text[t]) => {
                    p += 1;
                    t += 1;
                    continue;
                }
                _ => {}
            }
            match backtrack {
                Some((after_star, from)) => {
                    p = after_star;
                    t = from + 1;
                    backtrack = Some((after_star, from + 1));
                }
                None => return false,
            }
        }
        self.tokens[p.min(self.tokens.len())..]
            .iter()
            .all(|tok| *tok == Token::Star)
    }
}

/// Parse the body of a `[...]` class. `body` starts right after `[`.
/// Returns the class and the number of bytes consumed including `]`.
fn parse_class(body: &[u8]) -> Option<(ByteMatch, usize)> {
    let mut i = 0;
    let negate = matches!(body.first(), Some(b'^') | Some(b'!'));
    if negate {
        i += 1;
    }
    let mut ranges = Vec::new();
    while i < body.len() {
        let mut c = body[i];
        if c == b']' {
            return Some((ByteMatch::Class { negate, ranges }, i + 1));
        }
        if c == b'\\' && i + 1 < body.len() {
            i += 1;
            c = body[i];
        }
        if i + 2 < body.len() && body[i + 1] == b'-' && body[i + 2] != b']' {
            let hi = body[i + 2];
            ranges.push((c.min(hi), c.max(hi)));
            i += 3;
        } else {
            ranges.push((c, c));
            i += 1;
        }
    }
    None
}

/// One SCAN step: visit at least `count` keys from `cursor` on.
///
/// Returns the cursor for the next call (0 once the pass is complete) and the
/// live keys among those visited that match `pattern`.
pub fn scan(ks: &Keyspace, cursor: u64, pattern: Option<&Pattern>, count: usize) -> (u64, Vec<Bytes>) {
    let now = Instant::now();
    let count = count.max(1);
    let pattern = pattern.filter(|p| !p.matches_all());
    let mut visited = 0;
    let mut last: Option<u64> = None;
    let mut out = Vec::new();

    for (hash, key) in ks.scan_from(cursor) {
        if visited >= count && last != Some(hash) {
            return (hash, out);
        }
        visited += 1;
        last = Some(hash);
        if ks.is_live(key, now) && pattern.map_or(true, |p| p.matches(key)) {
            out.push(key.clone());
        }
    }
    (0, out)
}

/// KEYS: every live key matching `pattern`, in scan order
pub fn keys(ks: &Keyspace, pattern: &Pattern) -> Vec<Bytes> {
    let now = Instant::now();
    ks.scan_from(0)
        .filter(|(_, k)| ks.is_live(k, now) && pattern.matches(k))
        .map(|(_, k)| k.clone())
        .collect()
}

/// Lazy full pass over a shard, one SCAN call per refill.
///
/// The shard lock is held only while a batch is collected.
pub struct ScanIter<'a> {
    shard: &'a Shard,
    pattern: Option<Pattern>,
    count: usize,
    cursor: u64,
    buf: VecDeque<Bytes>,
    done: bool,
}

impl<'a> ScanIter<'a> {
    pub fn new(shard: &'a Shard, pattern: Option<Pattern>, count: usize) -> Self {
        Self {
            shard,
            pattern,
            count,
            cursor: 0,
            buf: VecDeque::new(),
            done: false,
        }
    }
}

impl<'a> Iterator for ScanIter<'a> {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        loop {
            if let Some(k) = self.buf.pop_front() {
                return Some(k);
            }
            if self.done {
                return None;
            }
            let (next, batch) = self.shard.scan_batch(self.cursor, self.pattern.as_ref(), self.count);
            self.buf.extend(batch);
            self.cursor = next;
            self.done = next == 0;
        }
    }
}
