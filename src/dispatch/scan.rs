use serde::Serialize;
use tracing::{debug, warn};

use super::value_type::ValueType;
use crate::metrics::{Metrics, Timer};
use crate::store::{StoreConnector, StoreDriver, StoreError};

/// Page size hint passed to each `SCAN` call.
pub const SCAN_PAGE_SIZE: u64 = 10;

/// One key found by a scan, with its type and a type-specific length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyRecord {
    pub key: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    /// String length, field count, element count or member count; `-1` for
    /// an unrecognised type.
    pub length: i64,
}

/// Where a scan stands. Cursor 0 alone cannot tell a fresh scan from a
/// finished one, so the two are separate states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "cursor", rename_all = "snake_case")]
pub enum ScanStatus {
    /// Nothing fetched yet; the next page starts at cursor 0.
    #[default]
    NotStarted,
    /// The store reported the end of the keyspace.
    Complete,
    /// The record limit was reached; resume from this cursor.
    InProgress(u64),
}

impl ScanStatus {
    /// Cursor for the next `list_keys` call, or `None` once the scan is done.
    pub fn resume_cursor(&self) -> Option<u64> {
        match self {
            ScanStatus::NotStarted => Some(0),
            ScanStatus::InProgress(cursor) => Some(*cursor),
            ScanStatus::Complete => None,
        }
    }

    fn from_cursor(cursor: u64) -> Self {
        if cursor == 0 {
            ScanStatus::Complete
        } else {
            ScanStatus::InProgress(cursor)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KeysResult {
    pub keys: Vec<KeyRecord>,
    /// Cursor returned by the last page fetched; 0 once the scan is complete.
    pub cursor: u64,
    pub status: ScanStatus,
}

/// Length of a value by its type, using the matching count command.
pub(crate) async fn value_length(
    driver: &dyn StoreDriver,
    key: &str,
    value_type: ValueType,
) -> Result<i64, StoreError> {
    match value_type {
        ValueType::String => driver.strlen(key).await,
        ValueType::Hash => driver.hlen(key).await,
        ValueType::List => driver.llen(key).await,
        ValueType::Set => driver.scard(key).await,
        ValueType::SortedSet => driver.zcard(key).await,
        ValueType::Unknown => Ok(-1),
    }
}

/// Enumerate keys matching `pattern`, starting at `cursor`.
///
/// Pages are fetched until the store returns cursor 0 or, when `limit` is
/// non-zero, until at least `limit` records have been gathered. The last
/// page is kept whole, so the result may exceed `limit`. Any failure
/// discards everything gathered so far.
pub async fn list_keys<C>(
    connector: &C,
    cursor: u64,
    pattern: &str,
    limit: usize,
) -> Result<KeysResult, StoreError>
where
    C: StoreConnector + ?Sized,
{
    let timer = Timer::new();
    let result = scan_pages(connector, cursor, pattern, limit).await;

    let metrics = Metrics::get();
    metrics.record_operation("scan", timer.elapsed_seconds());
    match &result {
        Ok(found) => {
            metrics.record_keys_scanned(found.keys.len() as u64);
            debug!(
                "Scanned {} keys matching {:?}, next cursor {}",
                found.keys.len(),
                pattern,
                found.cursor
            );
        }
        Err(e) => {
            metrics.record_error(e.kind(), "scan");
            warn!("Scan of {:?} from cursor {} failed: {}", pattern, cursor, e);
        }
    }
    result
}

async fn scan_pages<C>(
    connector: &C,
    cursor: u64,
    pattern: &str,
    limit: usize,
) -> Result<KeysResult, StoreError>
where
    C: StoreConnector + ?Sized,
{
    let driver = connector.connect().await?;
    let mut records = Vec::new();
    let mut cursor = cursor;

    loop {
        let (keys, next) = driver.scan(cursor, pattern, SCAN_PAGE_SIZE).await?;
        cursor = next;

        for key in keys {
            let value_type = ValueType::from_tag(&driver.key_type(&key).await?);
            let length = value_length(driver.as_ref(), &key, value_type).await?;
            records.push(KeyRecord {
                key,
                value_type,
                length,
            });
        }

        if cursor == 0 || (limit > 0 && records.len() >= limit) {
            break;
        }
    }

    Ok(KeysResult {
        keys: records,
        cursor,
        status: ScanStatus::from_cursor(cursor),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn seeded(count: usize) -> MemoryStore {
        let store = MemoryStore::new();
        for i in 0..count {
            store
                .set(&format!("user:{:02}", i), b"value", None)
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_scan_until_complete() {
        let store = seeded(25).await;

        let result = list_keys(&store, 0, "*", 0).await.unwrap();
        assert_eq!(result.keys.len(), 25);
        assert_eq!(result.cursor, 0);
        assert_eq!(result.status, ScanStatus::Complete);
        assert_eq!(store.command_count("scan"), 3);
    }

    #[tokio::test]
    async fn test_scan_stops_at_limit() {
        let store = seeded(25).await;

        let first = list_keys(&store, 0, "*", 5).await.unwrap();
        assert_eq!(first.keys.len(), 10);
        assert_eq!(first.cursor, 10);
        assert_eq!(first.status, ScanStatus::InProgress(10));

        let rest = list_keys(&store, first.cursor, "*", 0).await.unwrap();
        assert_eq!(rest.keys.len(), 15);
        assert_eq!(rest.status, ScanStatus::Complete);
        assert_eq!(rest.keys[0].key, "user:10");
    }

    #[tokio::test]
    async fn test_scan_annotates_type_and_length() {
        let store = MemoryStore::new();
        store.set("s", b"hello", None).await.unwrap();
        store
            .hset("h", &[(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), b"2".to_vec())])
            .await
            .unwrap();
        store.rpush("l", &[b"x".to_vec()]).await.unwrap();
        store.sadd("t", &[b"m1".to_vec(), b"m2".to_vec(), b"m3".to_vec()]).await.unwrap();
        store.zadd("z", &[(1.0, b"a".to_vec())]).await.unwrap();

        let result = list_keys(&store, 0, "*", 0).await.unwrap();
        let summary: Vec<(String, ValueType, i64)> = result
            .keys
            .into_iter()
            .map(|r| (r.key, r.value_type, r.length))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("h".to_string(), ValueType::Hash, 2),
                ("l".to_string(), ValueType::List, 1),
                ("s".to_string(), ValueType::String, 5),
                ("t".to_string(), ValueType::Set, 3),
                ("z".to_string(), ValueType::SortedSet, 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_scan_pattern() {
        let store = seeded(3).await;
        store.set("session:1", b"x", None).await.unwrap();

        let result = list_keys(&store, 0, "session:*", 0).await.unwrap();
        assert_eq!(result.keys.len(), 1);
        assert_eq!(result.keys[0].key, "session:1");
    }

    #[tokio::test]
    async fn test_scan_failure_discards_records() {
        let store = seeded(15).await;
        store.fail_command("strlen", "ERR boom");

        let err = list_keys(&store, 0, "*", 0).await.unwrap_err();
        assert_eq!(err.to_string(), "ERR boom");
    }

    #[tokio::test]
    async fn test_scan_empty_store() {
        let store = MemoryStore::new();
        let result = list_keys(&store, 0, "*", 0).await.unwrap();
        assert!(result.keys.is_empty());
        assert_eq!(result.status, ScanStatus::Complete);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&ScanStatus::InProgress(7)).unwrap(),
            r#"{"state":"in_progress","cursor":7}"#
        );
        assert_eq!(
            serde_json::to_string(&ScanStatus::Complete).unwrap(),
            r#"{"state":"complete"}"#
        );
        assert_eq!(
            serde_json::to_string(&ScanStatus::NotStarted).unwrap(),
            r#"{"state":"not_started"}"#
        );
    }

    #[tokio::test]
    async fn test_resume_until_complete() {
        let store = seeded(25).await;

        let mut status = ScanStatus::default();
        assert_eq!(status, ScanStatus::NotStarted);
        let mut pages = 0;
        let mut found = 0;
        while let Some(cursor) = status.resume_cursor() {
            let page = list_keys(&store, cursor, "*", 1).await.unwrap();
            found += page.keys.len();
            status = page.status;
            pages += 1;
        }
        assert_eq!(pages, 3);
        assert_eq!(found, 25);
        assert_eq!(status.resume_cursor(), None);
    }

    #[tokio::test]
    async fn test_scan_unknown_type_has_no_length() {
        let store = MemoryStore::new();
        store.insert_unsupported("events", "stream");
        store.set("name", b"ada", None).await.unwrap();

        let result = list_keys(&store, 0, "*", 0).await.unwrap();
        assert_eq!(
            result.keys,
            vec![
                KeyRecord {
                    key: "events".to_string(),
                    value_type: ValueType::Unknown,
                    length: -1,
                },
                KeyRecord {
                    key: "name".to_string(),
                    value_type: ValueType::String,
                    length: 3,
                },
            ]
        );
    }
}
