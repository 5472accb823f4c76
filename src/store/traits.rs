use async_trait::async_trait;
use std::time::Duration;

/// Primitive per-key operations offered by a key-value store.
///
/// Values are raw bytes; key names are text. Every method maps onto a single
/// store command, so multi-step sequences built on top of this trait are not
/// atomic.
#[async_trait]
pub trait StoreDriver: Send + Sync {
    /// Check whether a key exists and is not expired.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Remaining time-to-live in whole seconds. `-1` means no expiry, `-2`
    /// means the key does not exist.
    async fn ttl(&self, key: &str) -> Result<i64, StoreError>;

    /// Internal representation hint, or None if the key does not exist.
    async fn object_encoding(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Type tag as reported by the store (`"none"` for a missing key).
    async fn key_type(&self, key: &str) -> Result<String, StoreError>;

    async fn strlen(&self, key: &str) -> Result<i64, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store a scalar, replacing whatever was at the key.
    async fn set(&self, key: &str, value: &[u8], expiry: Option<Duration>) -> Result<(), StoreError>;

    async fn hgetall(&self, key: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;

    async fn hlen(&self, key: &str) -> Result<i64, StoreError>;

    /// Set several hash fields at once. Returns the number of new fields.
    async fn hset(&self, key: &str, fields: &[(Vec<u8>, Vec<u8>)]) -> Result<i64, StoreError>;

    async fn llen(&self, key: &str) -> Result<i64, StoreError>;

    /// Inclusive range with Redis index semantics (negative counts from the end).
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Vec<u8>>, StoreError>;

    /// Append values to the tail. Returns the new length.
    async fn rpush(&self, key: &str, values: &[Vec<u8>]) -> Result<i64, StoreError>;

    async fn smembers(&self, key: &str) -> Result<Vec<Vec<u8>>, StoreError>;

    async fn scard(&self, key: &str) -> Result<i64, StoreError>;

    /// Add members. Returns the number actually added.
    async fn sadd(&self, key: &str, members: &[Vec<u8>]) -> Result<i64, StoreError>;

    /// Members in ascending score order.
    async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Vec<u8>>, StoreError>;

    async fn zrange_with_scores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<(Vec<u8>, f64)>, StoreError>;

    async fn zscore(&self, key: &str, member: &[u8]) -> Result<Option<f64>, StoreError>;

    async fn zcard(&self, key: &str) -> Result<i64, StoreError>;

    /// Add or update scored members. Returns the number of new members.
    async fn zadd(&self, key: &str, members: &[(f64, Vec<u8>)]) -> Result<i64, StoreError>;

    /// Delete keys. Returns how many were actually removed.
    async fn del(&self, keys: &[String]) -> Result<i64, StoreError>;

    /// Set a TTL on an existing key. Returns false if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// One page of a cursor-based scan. Returns the matched keys and the next
    /// cursor; a next cursor of 0 means the iteration is complete.
    async fn scan(&self, cursor: u64, pattern: &str, count: u64) -> Result<(Vec<String>, u64), StoreError>;

    /// Raw server information text.
    async fn info(&self) -> Result<String, StoreError>;

    /// Read configuration parameters as name/value pairs.
    async fn config_get(&self, parameter: &str) -> Result<Vec<(String, String)>, StoreError>;
}

/// Opens a fresh driver connection per operation.
///
/// The returned box owns the connection; dropping it releases the connection.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn StoreDriver>, StoreError>;
}

/// Errors that can occur while talking to the store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    ConnectionError(String),
    #[error("Protocol error: {0}")]
    ProtocolError(String),
    /// Error reply from the store, carried verbatim.
    #[error("{0}")]
    CommandFailed(String),
    #[error("Store operation failed: {0}")]
    OperationFailed(String),
}

impl StoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::ConnectionError(_) => "connection",
            StoreError::ProtocolError(_) => "protocol",
            StoreError::CommandFailed(_) => "command",
            StoreError::OperationFailed(_) => "operation",
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::InvalidData => StoreError::ProtocolError(err.to_string()),
            _ => StoreError::ConnectionError(err.to_string()),
        }
    }
}
