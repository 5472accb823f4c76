use super::{StoreConnector, StoreDriver, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DATABASES: &str = "16";

/// A value held by the in-memory keyspace, one variant per shape.
#[derive(Debug, Clone)]
enum StoredValue {
    Str(Vec<u8>),
    Hash(BTreeMap<Vec<u8>, Vec<u8>>),
    List(Vec<Vec<u8>>),
    Set(BTreeSet<Vec<u8>>),
    /// Kept sorted by (score, member).
    ZSet(Vec<(Vec<u8>, f64)>),
    /// A key of a kind with no shape here (a stream, a module type). Holds its tag.
    Other(String),
}

impl StoredValue {
    fn type_tag(&self) -> &str {
        match self {
            StoredValue::Str(_) => "string",
            StoredValue::Hash(_) => "hash",
            StoredValue::List(_) => "list",
            StoredValue::Set(_) => "set",
            StoredValue::ZSet(_) => "zset",
            StoredValue::Other(tag) => tag,
        }
    }

    fn encoding(&self) -> &str {
        const SMALL_LEN: usize = 128;
        const SMALL_ITEM: usize = 64;
        match self {
            StoredValue::Str(s) => {
                let is_int = s.len() <= 20
                    && std::str::from_utf8(s).map_or(false, |t| t.parse::<i64>().is_ok());
                if is_int {
                    "int"
                } else if s.len() <= 44 {
                    "embstr"
                } else {
                    "raw"
                }
            }
            StoredValue::Hash(h) => {
                if h.len() <= SMALL_LEN
                    && h.iter().all(|(f, v)| f.len() <= SMALL_ITEM && v.len() <= SMALL_ITEM)
                {
                    "listpack"
                } else {
                    "hashtable"
                }
            }
            StoredValue::List(l) => {
                if l.len() <= SMALL_LEN && l.iter().all(|v| v.len() <= SMALL_ITEM) {
                    "listpack"
                } else {
                    "quicklist"
                }
            }
            StoredValue::Set(s) => {
                let all_ints = s.iter().all(|m| {
                    std::str::from_utf8(m).map_or(false, |t| t.parse::<i64>().is_ok())
                });
                if all_ints && s.len() <= 512 {
                    "intset"
                } else if s.len() <= SMALL_LEN && s.iter().all(|m| m.len() <= SMALL_ITEM) {
                    "listpack"
                } else {
                    "hashtable"
                }
            }
            StoredValue::ZSet(z) => {
                if z.len() <= SMALL_LEN && z.iter().all(|(m, _)| m.len() <= SMALL_ITEM) {
                    "listpack"
                } else {
                    "skiplist"
                }
            }
            StoredValue::Other(tag) => tag,
        }
    }
}

/// Keyspace entry with optional expiry time.
#[derive(Debug, Clone)]
struct Entry {
    value: StoredValue,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: StoredValue) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self) -> bool {
        if let Some(expires_at) = self.expires_at {
            Instant::now() > expires_at
        } else {
            false
        }
    }
}

#[derive(Default)]
struct Inner {
    data: DashMap<String, Entry>,
    calls: DashMap<&'static str, u64>,
    failures: DashMap<String, String>,
}

/// In-memory store driver using a concurrent hashmap.
///
/// Clones share the same keyspace, so the store doubles as its own connector:
/// every `connect()` hands out another handle onto the same data. Expired keys
/// are removed lazily on access. Each driver call is counted by command name.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times the named command (lowercase, e.g. `"get"`) was issued.
    pub fn command_count(&self, command: &str) -> u64 {
        self.inner.calls.get(command).map(|c| *c).unwrap_or(0)
    }

    /// Make every later call of `command` fail with an error reply carrying `message`.
    pub fn fail_command(&self, command: &str, message: impl Into<String>) {
        self.inner.failures.insert(command.to_string(), message.into());
    }

    /// Create `key` as a value of a kind the store can report but not read,
    /// answering `TYPE` with `type_tag`. Every typed command on it fails with
    /// WRONGTYPE.
    pub fn insert_unsupported(&self, key: &str, type_tag: &str) {
        self.inner
            .data
            .insert(key.to_string(), Entry::new(StoredValue::Other(type_tag.to_string())));
    }

    fn record(&self, command: &'static str) -> Result<(), StoreError> {
        *self.inner.calls.entry(command).or_insert(0) += 1;
        match self.inner.failures.get(command) {
            Some(message) => Err(StoreError::CommandFailed(message.clone())),
            None => Ok(()),
        }
    }

    /// Run `f` against a live entry; expired entries are purged and treated as absent.
    fn live<R>(&self, key: &str, f: impl FnOnce(&Entry) -> R) -> Option<R> {
        let expired = match self.inner.data.get(key) {
            Some(entry) if !entry.is_expired() => return Some(f(entry.value())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.inner.data.remove(key);
        }
        None
    }

    fn read<R>(
        &self,
        key: &str,
        missing: R,
        f: impl FnOnce(&StoredValue) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        self.live(key, |entry| f(&entry.value))
            .unwrap_or(Ok(missing))
    }

    fn write<R>(
        &self,
        key: &str,
        create: impl FnOnce() -> StoredValue,
        f: impl FnOnce(&mut StoredValue) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        self.inner.data.remove_if(key, |_, entry| entry.is_expired());
        let mut entry = self
            .inner
            .data
            .entry(key.to_owned())
            .or_insert_with(|| Entry::new(create()));
        f(&mut entry.value)
    }

    fn sorted_live_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .data
            .iter()
            .filter(|entry| !entry.value().is_expired())
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StoreConnector for MemoryStore {
    async fn connect(&self) -> Result<Box<dyn StoreDriver>, StoreError> {
        Ok(Box::new(self.clone()))
    }
}

fn wrong_type() -> StoreError {
    StoreError::CommandFailed(
        "WRONGTYPE Operation against a key holding the wrong kind of value".to_string(),
    )
}

fn wrong_args(command: &str) -> StoreError {
    StoreError::CommandFailed(format!(
        "ERR wrong number of arguments for '{}' command",
        command
    ))
}

/// Resolve an inclusive Redis-style index range against a sequence length.
fn range_bounds(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

fn slice_range<T: Clone>(items: &[T], start: i64, stop: i64) -> Vec<T> {
    match range_bounds(items.len(), start, stop) {
        Some((from, to)) => items[from..=to].to_vec(),
        None => Vec::new(),
    }
}

/// Glob-style matching with the store's `SCAN MATCH` rules: `*`, `?`,
/// `[abc]`, `[^abc]`, `[a-z]` and backslash escapes.
pub fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let mut p = 0;
    let mut t = 0;

    while p < pattern.len() {
        match pattern[p] {
            b'*' => {
                while p + 1 < pattern.len() && pattern[p + 1] == b'*' {
                    p += 1;
                }
                if p + 1 == pattern.len() {
                    return true;
                }
                return (t..=text.len()).any(|from| glob_match(&pattern[p + 1..], &text[from..]));
            }
            b'?' => {
                if t >= text.len() {
                    return false;
                }
                t += 1;
            }
            b'[' => {
                let Some(&c) = text.get(t) else {
                    return false;
                };
                p += 1;
                let negate = pattern.get(p) == Some(&b'^');
                if negate {
                    p += 1;
                }
                let mut matched = false;
                while p < pattern.len() && pattern[p] != b']' {
                    if pattern[p] == b'\\' && p + 1 < pattern.len() {
                        p += 1;
                        matched |= pattern[p] == c;
                    } else if p + 2 < pattern.len() && pattern[p + 1] == b'-' {
                        let (lo, hi) = if pattern[p] <= pattern[p + 2] {
                            (pattern[p], pattern[p + 2])
                        } else {
                            (pattern[p + 2], pattern[p])
                        };
                        matched |= (lo..=hi).contains(&c);
                        p += 2;
                    } else {
                        matched |= pattern[p] == c;
                    }
                    p += 1;
                }
                if matched == negate {
                    return false;
                }
                t += 1;
            }
            other => {
                let expected = if other == b'\\' && p + 1 < pattern.len() {
                    p += 1;
                    pattern[p]
                } else {
                    other
                };
                if text.get(t) != Some(&expected) {
                    return false;
                }
                t += 1;
            }
        }
        p += 1;
    }

    t == text.len()
}

#[async_trait]
impl StoreDriver for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.record("exists")?;
        Ok(self.live(key, |_| ()).is_some())
    }

    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        self.record("ttl")?;
        Ok(self
            .live(key, |entry| match entry.expires_at {
                Some(at) => {
                    let millis = at.saturating_duration_since(Instant::now()).as_millis();
                    ((millis + 500) / 1000) as i64
                }
                None => -1,
            })
            .unwrap_or(-2))
    }

    async fn object_encoding(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.record("object")?;
        Ok(self.live(key, |entry| entry.value.encoding().to_string()))
    }

    async fn key_type(&self, key: &str) -> Result<String, StoreError> {
        self.record("type")?;
        Ok(self
            .live(key, |entry| entry.value.type_tag().to_string())
            .unwrap_or_else(|| "none".to_string()))
    }

    async fn strlen(&self, key: &str) -> Result<i64, StoreError> {
        self.record("strlen")?;
        self.read(key, 0, |value| match value {
            StoredValue::Str(s) => Ok(s.len() as i64),
            _ => Err(wrong_type()),
        })
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.record("get")?;
        self.read(key, None, |value| match value {
            StoredValue::Str(s) => Ok(Some(s.clone())),
            _ => Err(wrong_type()),
        })
    }

    async fn set(&self, key: &str, value: &[u8], expiry: Option<Duration>) -> Result<(), StoreError> {
        self.record("set")?;
        let entry = Entry {
            value: StoredValue::Str(value.to_vec()),
            expires_at: expiry.map(|ttl| Instant::now() + ttl),
        };
        self.inner.data.insert(key.to_owned(), entry);
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        self.record("hgetall")?;
        self.read(key, Vec::new(), |value| match value {
            StoredValue::Hash(h) => Ok(h.iter().map(|(f, v)| (f.clone(), v.clone())).collect()),
            _ => Err(wrong_type()),
        })
    }

    async fn hlen(&self, key: &str) -> Result<i64, StoreError> {
        self.record("hlen")?;
        self.read(key, 0, |value| match value {
            StoredValue::Hash(h) => Ok(h.len() as i64),
            _ => Err(wrong_type()),
        })
    }

    async fn hset(&self, key: &str, fields: &[(Vec<u8>, Vec<u8>)]) -> Result<i64, StoreError> {
        self.record("hset")?;
        if fields.is_empty() {
            return Err(wrong_args("hset"));
        }
        self.write(key, || StoredValue::Hash(BTreeMap::new()), |value| match value {
            StoredValue::Hash(h) => Ok(fields
                .iter()
                .filter(|(f, v)| h.insert(f.clone(), v.clone()).is_none())
                .count() as i64),
            _ => Err(wrong_type()),
        })
    }

    async fn llen(&self, key: &str) -> Result<i64, StoreError> {
        self.record("llen")?;
        self.read(key, 0, |value| match value {
            StoredValue::List(l) => Ok(l.len() as i64),
            _ => Err(wrong_type()),
        })
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Vec<u8>>, StoreError> {
        self.record("lrange")?;
        self.read(key, Vec::new(), |value| match value {
            StoredValue::List(l) => Ok(slice_range(l, start, stop)),
            _ => Err(wrong_type()),
        })
    }

    async fn rpush(&self, key: &str, values: &[Vec<u8>]) -> Result<i64, StoreError> {
        self.record("rpush")?;
        if values.is_empty() {
            return Err(wrong_args("rpush"));
        }
        self.write(key, || StoredValue::List(Vec::new()), |value| match value {
            StoredValue::List(l) => {
                l.extend(values.iter().cloned());
                Ok(l.len() as i64)
            }
            _ => Err(wrong_type()),
        })
    }

    async fn smembers(&self, key: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        self.record("smembers")?;
        self.read(key, Vec::new(), |value| match value {
            StoredValue::Set(s) => Ok(s.iter().cloned().collect()),
            _ => Err(wrong_type()),
        })
    }

    async fn scard(&self, key: &str) -> Result<i64, StoreError> {
        self.record("scard")?;
        self.read(key, 0, |value| match value {
            StoredValue::Set(s) => Ok(s.len() as i64),
            _ => Err(wrong_type()),
        })
    }

    async fn sadd(&self, key: &str, members: &[Vec<u8>]) -> Result<i64, StoreError> {
        self.record("sadd")?;
        if members.is_empty() {
            return Err(wrong_args("sadd"));
        }
        self.write(key, || StoredValue::Set(BTreeSet::new()), |value| match value {
            StoredValue::Set(s) => Ok(members.iter().filter(|m| s.insert((*m).clone())).count() as i64),
            _ => Err(wrong_type()),
        })
    }

    async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Vec<u8>>, StoreError> {
        self.record("zrange")?;
        self.read(key, Vec::new(), |value| match value {
            StoredValue::ZSet(z) => Ok(slice_range(z, start, stop)
                .into_iter()
                .map(|(member, _)| member)
                .collect()),
            _ => Err(wrong_type()),
        })
    }

    async fn zrange_with_scores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<(Vec<u8>, f64)>, StoreError> {
        self.record("zrange")?;
        self.read(key, Vec::new(), |value| match value {
            StoredValue::ZSet(z) => Ok(slice_range(z, start, stop)),
            _ => Err(wrong_type()),
        })
    }

    async fn zscore(&self, key: &str, member: &[u8]) -> Result<Option<f64>, StoreError> {
        self.record("zscore")?;
        self.read(key, None, |value| match value {
            StoredValue::ZSet(z) => Ok(z.iter().find(|(m, _)| m == member).map(|(_, s)| *s)),
            _ => Err(wrong_type()),
        })
    }

    async fn zcard(&self, key: &str) -> Result<i64, StoreError> {
        self.record("zcard")?;
        self.read(key, 0, |value| match value {
            StoredValue::ZSet(z) => Ok(z.len() as i64),
            _ => Err(wrong_type()),
        })
    }

    async fn zadd(&self, key: &str, members: &[(f64, Vec<u8>)]) -> Result<i64, StoreError> {
        self.record("zadd")?;
        if members.is_empty() {
            return Err(wrong_args("zadd"));
        }
        self.write(key, || StoredValue::ZSet(Vec::new()), |value| match value {
            StoredValue::ZSet(z) => {
                let mut added = 0;
                for (score, member) in members {
                    match z.iter_mut().find(|(m, _)| m == member) {
                        Some(existing) => existing.1 = *score,
                        None => {
                            z.push((member.clone(), *score));
                            added += 1;
                        }
                    }
                }
                z.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
                Ok(added)
            }
            _ => Err(wrong_type()),
        })
    }

    async fn del(&self, keys: &[String]) -> Result<i64, StoreError> {
        self.record("del")?;
        let removed = keys
            .iter()
            .filter(|key| {
                self.inner
                    .data
                    .remove(key.as_str())
                    .map_or(false, |(_, entry)| !entry.is_expired())
            })
            .count();
        Ok(removed as i64)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.record("expire")?;
        if self.live(key, |_| ()).is_none() {
            return Ok(false);
        }
        if ttl.is_zero() {
            self.inner.data.remove(key);
        } else if let Some(mut entry) = self.inner.data.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(true)
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: u64) -> Result<(Vec<String>, u64), StoreError> {
        self.record("scan")?;
        let keys = self.sorted_live_keys();
        let start = cursor as usize;
        if start >= keys.len() {
            return Ok((Vec::new(), 0));
        }
        let count = if count == 0 { 10 } else { count as usize };
        let end = (start + count).min(keys.len());
        let matched = keys[start..end]
            .iter()
            .filter(|key| glob_match(pattern.as_bytes(), key.as_bytes()))
            .cloned()
            .collect();
        let next = if end >= keys.len() { 0 } else { end as u64 };
        Ok((matched, next))
    }

    async fn info(&self) -> Result<String, StoreError> {
        self.record("info")?;
        let keys = self.sorted_live_keys();
        let expires = keys
            .iter()
            .filter(|key| self.live(key, |entry| entry.expires_at.is_some()) == Some(true))
            .count();
        Ok(format!(
            "# Server\r\nredis_version:7.2.0\r\nredis_mode:standalone\r\n\r\n# Keyspace\r\ndb0:keys={},expires={},avg_ttl=0\r\n",
            keys.len(),
            expires
        ))
    }

    async fn config_get(&self, parameter: &str) -> Result<Vec<(String, String)>, StoreError> {
        self.record("config")?;
        let known = [("databases", DATABASES), ("maxmemory", "0")];
        Ok(known
            .iter()
            .filter(|(name, _)| glob_match(parameter.as_bytes(), name.as_bytes()))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }
}
