use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::format::{format_hash_text, format_scalar, ContentFormat};
use super::ttl::format_ttl;
use super::value_type::ValueType;
use crate::config::DEFAULT_MAX_CONTENT_SIZE;
use crate::metrics::{Metrics, Timer};
use crate::store::{StoreConnector, StoreDriver, StoreError};

/// Placeholder shown instead of a scalar that exceeds the display limit.
pub const TOO_LARGE_PLACEHOLDER: &str = "too large to display";

/// A sorted-set member with its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

/// Rendered content of a key, shaped by its type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Fields(BTreeMap<String, String>),
    Items(Vec<String>),
    Scored(Vec<ScoredMember>),
}

impl Default for Content {
    fn default() -> Self {
        Content::Text(String::new())
    }
}

/// Everything the inspector learned about one key.
///
/// A failed lookup leaves its field at the default and records the message
/// in `error`; fields gathered before the failure are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContentResult {
    pub exists: bool,
    pub content: Content,
    pub ttl: String,
    pub encoding: String,
    pub size: i64,
    pub error: String,
    #[serde(serialize_with = "empty_when_none")]
    pub format: Option<ContentFormat>,
    #[serde(rename = "type", serialize_with = "empty_when_none")]
    pub value_type: Option<ValueType>,
}

fn empty_when_none<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(v) => v.serialize(serializer),
        None => serializer.serialize_str(""),
    }
}

impl ContentResult {
    fn capture<T: Default>(&mut self, result: Result<T, StoreError>) -> T {
        match result {
            Ok(value) => value,
            Err(e) => {
                if self.error.is_empty() {
                    self.error = e.to_string();
                }
                T::default()
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InspectOptions {
    /// Skip fetching scalars longer than `max_content_size`.
    pub size_guard: bool,
    /// Return scalars as stored instead of running them through the formatter.
    pub raw: bool,
    pub max_content_size: u64,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            size_guard: true,
            raw: false,
            max_content_size: DEFAULT_MAX_CONTENT_SIZE,
        }
    }
}

fn lossy(raw: Vec<u8>) -> String {
    String::from_utf8_lossy(&raw).into_owned()
}

/// Look up a key and render its content for display.
///
/// A missing key yields `exists: false` with every other field empty, and no
/// further commands are sent.
pub async fn display_content<C>(connector: &C, key: &str, options: InspectOptions) -> ContentResult
where
    C: StoreConnector + ?Sized,
{
    let timer = Timer::new();
    let result = match connector.connect().await {
        Ok(driver) => inspect(driver.as_ref(), key, options).await,
        Err(e) => ContentResult {
            error: e.to_string(),
            ..Default::default()
        },
    };

    let metrics = Metrics::get();
    metrics.record_operation("inspect", timer.elapsed_seconds());
    if result.error.is_empty() {
        debug!("Inspected key {:?} (exists: {})", key, result.exists);
    } else {
        metrics.record_error("store", "inspect");
        warn!("Inspecting key {:?} failed: {}", key, result.error);
    }
    result
}

async fn inspect(driver: &dyn StoreDriver, key: &str, options: InspectOptions) -> ContentResult {
    let mut result = ContentResult::default();

    match driver.exists(key).await {
        Ok(true) => result.exists = true,
        Ok(false) => return result,
        Err(e) => {
            result.error = e.to_string();
            return result;
        }
    }

    let ttl = driver.ttl(key).await.map(format_ttl);
    result.ttl = result.capture(ttl);
    let encoding = driver.object_encoding(key).await.map(Option::unwrap_or_default);
    result.encoding = result.capture(encoding);

    let tag = match driver.key_type(key).await {
        Ok(tag) => tag,
        Err(e) => {
            result.capture::<()>(Err(e));
            return result;
        }
    };
    let value_type = ValueType::from_tag(&tag);
    result.value_type = Some(value_type);

    match value_type {
        ValueType::String => {
            let size = driver.strlen(key).await;
            result.size = result.capture(size);
            if options.size_guard && result.size > options.max_content_size as i64 {
                result.content = Content::Text(TOO_LARGE_PLACEHOLDER.to_string());
                result.format = Some(ContentFormat::TooLarge);
            } else {
                match driver.get(key).await {
                    Ok(value) => {
                        let raw = value.unwrap_or_default();
                        if options.raw {
                            result.content = Content::Text(lossy(raw));
                        } else {
                            let (text, format) = format_scalar(&raw);
                            result.content = Content::Text(text);
                            result.format = Some(format);
                        }
                    }
                    Err(e) => result.capture::<()>(Err(e)),
                }
            }
        }
        ValueType::Hash => {
            let pairs = driver.hgetall(key).await;
            let fields: BTreeMap<String, String> = result
                .capture(pairs)
                .into_iter()
                .map(|(field, value)| (format_hash_text(&field), format_hash_text(&value)))
                .collect();
            result.content = Content::Fields(fields);
            let size = driver.hlen(key).await;
            result.size = result.capture(size);
        }
        ValueType::List => {
            let items = driver.lrange(key, 0, -1).await;
            result.content = Content::Items(result.capture(items).into_iter().map(lossy).collect());
            let size = driver.llen(key).await;
            result.size = result.capture(size);
        }
        ValueType::Set => {
            let members = driver.smembers(key).await;
            result.content =
                Content::Items(result.capture(members).into_iter().map(lossy).collect());
            let size = driver.scard(key).await;
            result.size = result.capture(size);
        }
        ValueType::SortedSet => {
            let members = driver.zrange_with_scores(key, 0, -1).await;
            result.content = Content::Scored(
                result
                    .capture(members)
                    .into_iter()
                    .map(|(member, score)| ScoredMember {
                        member: lossy(member),
                        score,
                    })
                    .collect(),
            );
            let size = driver.zcard(key).await;
            result.size = result.capture(size);
        }
        ValueType::Unknown => {
            result.content = Content::Text(format!("unknown type {}", tag));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::time::Duration;

    #[tokio::test]
    async fn test_missing_key_is_all_defaults() {
        let store = MemoryStore::new();
        let result = display_content(&store, "nope", InspectOptions::default()).await;

        assert_eq!(result, ContentResult::default());
        assert_eq!(store.command_count("ttl"), 0);
        assert_eq!(store.command_count("type"), 0);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "exists": false,
                "content": "",
                "ttl": "",
                "encoding": "",
                "size": 0,
                "error": "",
                "format": "",
                "type": ""
            })
        );
    }

    #[tokio::test]
    async fn test_plain_string() {
        let store = MemoryStore::new();
        store.set("greeting", b"hello", None).await.unwrap();

        let result = display_content(&store, "greeting", InspectOptions::default()).await;
        assert!(result.exists);
        assert_eq!(result.content, Content::Text("hello".to_string()));
        assert_eq!(result.format, Some(ContentFormat::Plain));
        assert_eq!(result.value_type, Some(ValueType::String));
        assert_eq!(result.ttl, "-1s");
        assert_eq!(result.encoding, "embstr");
        assert_eq!(result.size, 5);
        assert!(result.error.is_empty());
    }

    #[tokio::test]
    async fn test_json_string_with_ttl() {
        let store = MemoryStore::new();
        store
            .set("doc", br#"{"a":1}"#, Some(Duration::from_secs(90)))
            .await
            .unwrap();

        let result = display_content(&store, "doc", InspectOptions::default()).await;
        assert_eq!(result.content, Content::Text("{\n\t\"a\": 1\n}".to_string()));
        assert_eq!(result.format, Some(ContentFormat::Structured));
        assert_eq!(result.ttl, "1m30s");
    }

    #[tokio::test]
    async fn test_raw_skips_formatter() {
        let store = MemoryStore::new();
        store.set("doc", br#"{"a":1}"#, None).await.unwrap();

        let options = InspectOptions {
            raw: true,
            ..Default::default()
        };
        let result = display_content(&store, "doc", options).await;
        assert_eq!(result.content, Content::Text(r#"{"a":1}"#.to_string()));
        assert_eq!(result.format, None);
    }

    #[tokio::test]
    async fn test_size_guard_never_fetches_value() {
        let store = MemoryStore::new();
        store.set("big", &[b'x'; 64], None).await.unwrap();

        let options = InspectOptions {
            size_guard: true,
            raw: false,
            max_content_size: 16,
        };
        let result = display_content(&store, "big", options).await;
        assert_eq!(result.content, Content::Text(TOO_LARGE_PLACEHOLDER.to_string()));
        assert_eq!(result.format, Some(ContentFormat::TooLarge));
        assert_eq!(result.size, 64);
        assert_eq!(store.command_count("get"), 0);

        let unguarded = InspectOptions {
            size_guard: false,
            ..options
        };
        let result = display_content(&store, "big", unguarded).await;
        assert_eq!(result.format, Some(ContentFormat::Plain));
        assert_eq!(store.command_count("get"), 1);
    }

    #[tokio::test]
    async fn test_hash_fields_are_escaped_without_beautifying() {
        let store = MemoryStore::new();
        store
            .hset(
                "h",
                &[
                    (b"name".to_vec(), b"coral".to_vec()),
                    (b"bin\x01".to_vec(), b"\x00\xff".to_vec()),
                ],
            )
            .await
            .unwrap();

        let result = display_content(&store, "h", InspectOptions::default()).await;
        let mut expected = BTreeMap::new();
        expected.insert("name".to_string(), "coral".to_string());
        expected.insert("bin\\x01".to_string(), "\\x00\\xff".to_string());
        assert_eq!(result.content, Content::Fields(expected));
        assert_eq!(result.size, 2);
        assert_eq!(result.format, None);
    }

    #[tokio::test]
    async fn test_collections() {
        let store = MemoryStore::new();
        store.rpush("l", &[b"b".to_vec(), b"a".to_vec()]).await.unwrap();
        store.sadd("s", &[b"x".to_vec()]).await.unwrap();
        store
            .zadd("z", &[(2.0, b"two".to_vec()), (1.5, b"one".to_vec())])
            .await
            .unwrap();

        let list = display_content(&store, "l", InspectOptions::default()).await;
        assert_eq!(list.content, Content::Items(vec!["b".to_string(), "a".to_string()]));
        assert_eq!(list.size, 2);

        let set = display_content(&store, "s", InspectOptions::default()).await;
        assert_eq!(set.content, Content::Items(vec!["x".to_string()]));
        assert_eq!(set.value_type, Some(ValueType::Set));

        let zset = display_content(&store, "z", InspectOptions::default()).await;
        assert_eq!(
            zset.content,
            Content::Scored(vec![
                ScoredMember { member: "one".to_string(), score: 1.5 },
                ScoredMember { member: "two".to_string(), score: 2.0 },
            ])
        );
        let json = serde_json::to_value(&zset).unwrap();
        assert_eq!(json["content"][0], serde_json::json!({"member": "one", "score": 1.5}));
        assert_eq!(json["type"], "zset");
    }

    #[tokio::test]
    async fn test_error_keeps_partial_fields() {
        let store = MemoryStore::new();
        store.rpush("l", &[b"a".to_vec()]).await.unwrap();
        store.fail_command("lrange", "ERR range failed");

        let result = display_content(&store, "l", InspectOptions::default()).await;
        assert!(result.exists);
        assert_eq!(result.error, "ERR range failed");
        assert_eq!(result.ttl, "-1s");
        assert_eq!(result.encoding, "listpack");
        assert_eq!(result.size, 1);
        assert_eq!(result.content, Content::Items(Vec::new()));
    }

    #[tokio::test]
    async fn test_unknown_type_placeholder() {
        let store = MemoryStore::new();
        store.insert_unsupported("events", "stream");

        let result = display_content(&store, "events", InspectOptions::default()).await;
        assert!(result.exists);
        assert_eq!(result.value_type, Some(ValueType::Unknown));
        assert_eq!(result.content, Content::Text("unknown type stream".to_string()));
        assert_eq!(result.format, None);
        assert_eq!(result.size, 0);
        assert_eq!(result.ttl, "-1s");
        assert_eq!(result.encoding, "stream");
        assert!(result.error.is_empty());
        assert_eq!(store.command_count("get"), 0);
        assert_eq!(store.command_count("strlen"), 0);
    }
}
