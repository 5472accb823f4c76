use super::{StoreConnector, StoreDriver, StoreError};
use crate::config::ServerConfig;
use crate::metrics::{Metrics, Timer};
use crate::protocol::{format_double, RespParser, RespValue};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

struct Connection<S> {
    stream: S,
    parser: RespParser,
}

/// Store driver speaking RESP2 over a byte stream.
///
/// One request is in flight at a time; the connection closes when the
/// driver is dropped.
pub struct RespStore<S> {
    conn: Mutex<Connection<S>>,
}

impl RespStore<TcpStream> {
    /// Open a TCP connection and run the AUTH/SELECT handshake.
    pub async fn connect(server: &ServerConfig) -> Result<Self, StoreError> {
        let address = server.address();
        let stream = TcpStream::connect(&address)
            .await
            .map_err(|e| StoreError::ConnectionError(format!("{}: {}", address, e)))?;
        debug!("Connected to {}", address);

        let store = Self::new(stream);
        store.handshake(server.password.as_deref(), server.db).await?;
        Ok(store)
    }
}

impl<S> RespStore<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            conn: Mutex::new(Connection {
                stream,
                parser: RespParser::new(),
            }),
        }
    }

    /// Authenticate and select the database, skipping steps left at their defaults.
    pub async fn handshake(&self, password: Option<&str>, db: u32) -> Result<(), StoreError> {
        if let Some(password) = password {
            expect_ok(self.execute(&[b"AUTH".as_slice(), password.as_bytes()]).await?)?;
        }
        if db != 0 {
            let db = db.to_string();
            expect_ok(self.execute(&[b"SELECT".as_slice(), db.as_bytes()]).await?)?;
        }
        Ok(())
    }

    /// Send one command and wait for its reply. Error replies become
    /// `StoreError::CommandFailed`.
    pub async fn execute<A: AsRef<[u8]>>(&self, args: &[A]) -> Result<RespValue, StoreError> {
        let name = args
            .first()
            .map(|a| String::from_utf8_lossy(a.as_ref()).to_lowercase())
            .unwrap_or_default();
        let metrics = Metrics::get();

        let timer = Timer::new();
        let result = match self.round_trip(RespValue::command(args)).await {
            Ok(RespValue::Error(message)) => Err(StoreError::CommandFailed(message)),
            other => other,
        };
        metrics.record_store_command(&name, timer.elapsed_seconds());

        if let Err(e) = &result {
            warn!("Store command {} failed: {}", name, e);
            metrics.record_store_error(&name, e.kind());
        }
        result
    }

    async fn round_trip(&self, request: RespValue) -> Result<RespValue, StoreError> {
        let mut conn = self.conn.lock().await;
        conn.stream.write_all(&request.to_bytes()).await?;
        conn.stream.flush().await?;

        let mut buffer = [0u8; 4096];
        loop {
            match conn.parser.parse() {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(e) => {
                    conn.parser.reset();
                    return Err(e.into());
                }
            }

            let n = conn.stream.read(&mut buffer).await?;
            if n == 0 {
                return Err(StoreError::ConnectionError(
                    "connection closed by server".to_string(),
                ));
            }
            conn.parser.add_data(&buffer[..n]);
        }
    }
}

fn unexpected(expected: &str, value: &RespValue) -> StoreError {
    StoreError::ProtocolError(format!("expected {}, got {:?}", expected, value))
}

fn expect_ok(value: RespValue) -> Result<(), StoreError> {
    match value {
        RespValue::SimpleString(_) => Ok(()),
        other => Err(unexpected("status reply", &other)),
    }
}

fn into_integer(value: RespValue) -> Result<i64, StoreError> {
    match value {
        RespValue::Integer(i) => Ok(i),
        other => Err(unexpected("integer", &other)),
    }
}

fn into_bulk(value: RespValue) -> Result<Option<Vec<u8>>, StoreError> {
    match value {
        RespValue::BulkString(data) => Ok(data),
        RespValue::SimpleString(s) => Ok(Some(s.into_bytes())),
        RespValue::Null => Ok(None),
        other => Err(unexpected("bulk string", &other)),
    }
}

fn into_text(value: RespValue) -> Result<String, StoreError> {
    match into_bulk(value)? {
        Some(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
        None => Ok(String::new()),
    }
}

fn into_array(value: RespValue) -> Result<Vec<RespValue>, StoreError> {
    match value {
        RespValue::Array(Some(items)) => Ok(items),
        RespValue::Array(None) | RespValue::Null => Ok(Vec::new()),
        other => Err(unexpected("array", &other)),
    }
}

fn into_byte_list(value: RespValue) -> Result<Vec<Vec<u8>>, StoreError> {
    into_array(value)?
        .into_iter()
        .map(|item| into_bulk(item).map(Option::unwrap_or_default))
        .collect()
}

fn into_pairs(value: RespValue) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
    let items = into_byte_list(value)?;
    if items.len() % 2 != 0 {
        return Err(StoreError::ProtocolError(
            "odd number of elements in pair reply".to_string(),
        ));
    }
    let mut iter = items.into_iter();
    let mut pairs = Vec::new();
    while let (Some(first), Some(second)) = (iter.next(), iter.next()) {
        pairs.push((first, second));
    }
    Ok(pairs)
}

fn parse_score(raw: &[u8]) -> Result<f64, StoreError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| {
            StoreError::ProtocolError(format!(
                "invalid score: {}",
                String::from_utf8_lossy(raw)
            ))
        })
}

fn into_score(value: RespValue) -> Result<Option<f64>, StoreError> {
    match value {
        RespValue::Double(d) => Ok(Some(d)),
        other => into_bulk(other)?.map(|raw| parse_score(&raw)).transpose(),
    }
}

/// Millisecond precision is only used when the duration has a sub-second part.
fn expiry_args(ttl: Duration) -> (&'static [u8], String) {
    if ttl.subsec_nanos() == 0 {
        (b"EX".as_slice(), ttl.as_secs().to_string())
    } else {
        (b"PX".as_slice(), ttl.as_millis().max(1).to_string())
    }
}

#[async_trait]
impl<S> StoreDriver for RespStore<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(into_integer(self.execute(&[b"EXISTS".as_slice(), key.as_bytes()]).await?)? > 0)
    }

    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        into_integer(self.execute(&[b"TTL".as_slice(), key.as_bytes()]).await?)
    }

    async fn object_encoding(&self, key: &str) -> Result<Option<String>, StoreError> {
        let reply = self
            .execute(&[b"OBJECT".as_slice(), b"ENCODING", key.as_bytes()])
            .await?;
        Ok(into_bulk(reply)?.map(|raw| String::from_utf8_lossy(&raw).into_owned()))
    }

    async fn key_type(&self, key: &str) -> Result<String, StoreError> {
        into_text(self.execute(&[b"TYPE".as_slice(), key.as_bytes()]).await?)
    }

    async fn strlen(&self, key: &str) -> Result<i64, StoreError> {
        into_integer(self.execute(&[b"STRLEN".as_slice(), key.as_bytes()]).await?)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        into_bulk(self.execute(&[b"GET".as_slice(), key.as_bytes()]).await?)
    }

    async fn set(&self, key: &str, value: &[u8], expiry: Option<Duration>) -> Result<(), StoreError> {
        let reply = match expiry {
            Some(ttl) => {
                let (unit, amount) = expiry_args(ttl);
                self.execute(&[b"SET".as_slice(), key.as_bytes(), value, unit, amount.as_bytes()])
                    .await?
            }
            None => self.execute(&[b"SET".as_slice(), key.as_bytes(), value]).await?,
        };
        expect_ok(reply)
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        into_pairs(self.execute(&[b"HGETALL".as_slice(), key.as_bytes()]).await?)
    }

    async fn hlen(&self, key: &str) -> Result<i64, StoreError> {
        into_integer(self.execute(&[b"HLEN".as_slice(), key.as_bytes()]).await?)
    }

    async fn hset(&self, key: &str, fields: &[(Vec<u8>, Vec<u8>)]) -> Result<i64, StoreError> {
        let mut args: Vec<&[u8]> = vec![b"HSET".as_slice(), key.as_bytes()];
        for (field, value) in fields {
            args.push(field);
            args.push(value);
        }
        into_integer(self.execute(&args).await?)
    }

    async fn llen(&self, key: &str) -> Result<i64, StoreError> {
        into_integer(self.execute(&[b"LLEN".as_slice(), key.as_bytes()]).await?)
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Vec<u8>>, StoreError> {
        let (start, stop) = (start.to_string(), stop.to_string());
        into_byte_list(
            self.execute(&[b"LRANGE".as_slice(), key.as_bytes(), start.as_bytes(), stop.as_bytes()])
                .await?,
        )
    }

    async fn rpush(&self, key: &str, values: &[Vec<u8>]) -> Result<i64, StoreError> {
        let mut args: Vec<&[u8]> = vec![b"RPUSH".as_slice(), key.as_bytes()];
        args.extend(values.iter().map(Vec::as_slice));
        into_integer(self.execute(&args).await?)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        into_byte_list(self.execute(&[b"SMEMBERS".as_slice(), key.as_bytes()]).await?)
    }

    async fn scard(&self, key: &str) -> Result<i64, StoreError> {
        into_integer(self.execute(&[b"SCARD".as_slice(), key.as_bytes()]).await?)
    }

    async fn sadd(&self, key: &str, members: &[Vec<u8>]) -> Result<i64, StoreError> {
        let mut args: Vec<&[u8]> = vec![b"SADD".as_slice(), key.as_bytes()];
        args.extend(members.iter().map(Vec::as_slice));
        into_integer(self.execute(&args).await?)
    }

    async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Vec<u8>>, StoreError> {
        let (start, stop) = (start.to_string(), stop.to_string());
        into_byte_list(
            self.execute(&[b"ZRANGE".as_slice(), key.as_bytes(), start.as_bytes(), stop.as_bytes()])
                .await?,
        )
    }

    async fn zrange_with_scores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<(Vec<u8>, f64)>, StoreError> {
        let (start, stop) = (start.to_string(), stop.to_string());
        let reply = self
            .execute(&[
                b"ZRANGE".as_slice(),
                key.as_bytes(),
                start.as_bytes(),
                stop.as_bytes(),
                b"WITHSCORES",
            ])
            .await?;
        into_pairs(reply)?
            .into_iter()
            .map(|(member, score)| Ok((member, parse_score(&score)?)))
            .collect()
    }

    async fn zscore(&self, key: &str, member: &[u8]) -> Result<Option<f64>, StoreError> {
        into_score(self.execute(&[b"ZSCORE".as_slice(), key.as_bytes(), member]).await?)
    }

    async fn zcard(&self, key: &str) -> Result<i64, StoreError> {
        into_integer(self.execute(&[b"ZCARD".as_slice(), key.as_bytes()]).await?)
    }

    async fn zadd(&self, key: &str, members: &[(f64, Vec<u8>)]) -> Result<i64, StoreError> {
        let scores: Vec<String> = members.iter().map(|(score, _)| format_double(*score)).collect();
        let mut args: Vec<&[u8]> = vec![b"ZADD".as_slice(), key.as_bytes()];
        for (score, (_, member)) in scores.iter().zip(members) {
            args.push(score.as_bytes());
            args.push(member);
        }
        into_integer(self.execute(&args).await?)
    }

    async fn del(&self, keys: &[String]) -> Result<i64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut args: Vec<&[u8]> = vec![b"DEL".as_slice()];
        args.extend(keys.iter().map(|k| k.as_bytes()));
        into_integer(self.execute(&args).await?)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let reply = if ttl.subsec_nanos() == 0 {
            let secs = ttl.as_secs().to_string();
            self.execute(&[b"EXPIRE".as_slice(), key.as_bytes(), secs.as_bytes()]).await?
        } else {
            let millis = ttl.as_millis().max(1).to_string();
            self.execute(&[b"PEXPIRE".as_slice(), key.as_bytes(), millis.as_bytes()]).await?
        };
        Ok(into_integer(reply)? == 1)
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: u64) -> Result<(Vec<String>, u64), StoreError> {
        let (cursor, count) = (cursor.to_string(), count.to_string());
        let reply = self
            .execute(&[
                b"SCAN".as_slice(),
                cursor.as_bytes(),
                b"MATCH",
                pattern.as_bytes(),
                b"COUNT",
                count.as_bytes(),
            ])
            .await?;

        let mut parts = into_array(reply)?.into_iter();
        let (Some(next), Some(keys)) = (parts.next(), parts.next()) else {
            return Err(StoreError::ProtocolError("malformed SCAN reply".to_string()));
        };
        let next = into_text(next)?;
        let next = next
            .parse::<u64>()
            .map_err(|_| StoreError::ProtocolError(format!("invalid scan cursor: {}", next)))?;
        let keys = into_byte_list(keys)?
            .into_iter()
            .map(|k| String::from_utf8_lossy(&k).into_owned())
            .collect();
        Ok((keys, next))
    }

    async fn info(&self) -> Result<String, StoreError> {
        into_text(self.execute(&[b"INFO".as_slice()]).await?)
    }

    async fn config_get(&self, parameter: &str) -> Result<Vec<(String, String)>, StoreError> {
        let reply = self
            .execute(&[b"CONFIG".as_slice(), b"GET", parameter.as_bytes()])
            .await?;
        Ok(into_pairs(reply)?
            .into_iter()
            .map(|(name, value)| {
                (
                    String::from_utf8_lossy(&name).into_owned(),
                    String::from_utf8_lossy(&value).into_owned(),
                )
            })
            .collect())
    }
}

/// Connects a fresh [`RespStore`] over TCP for every operation.
#[derive(Debug, Clone)]
pub struct RespConnector {
    server: ServerConfig,
}

impl RespConnector {
    pub fn new(server: ServerConfig) -> Self {
        Self { server }
    }
}

#[async_trait]
impl StoreConnector for RespConnector {
    async fn connect(&self) -> Result<Box<dyn StoreDriver>, StoreError> {
        Ok(Box::new(RespStore::connect(&self.server).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_exists_round_trip() {
        let mock = Builder::new()
            .write(b"*2\r\n$6\r\nEXISTS\r\n$3\r\nfoo\r\n")
            .read(b":1\r\n")
            .build();
        let store = RespStore::new(mock);

        assert!(store.exists("foo").await.unwrap());
    }

    #[tokio::test]
    async fn test_reply_split_across_reads() {
        let mock = Builder::new()
            .write(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n")
            .read(b"$5\r\nhel")
            .read(b"lo\r\n")
            .build();
        let store = RespStore::new(mock);

        assert_eq!(store.get("foo").await.unwrap(), Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_error_reply_becomes_command_failed() {
        let mock = Builder::new()
            .write(b"*2\r\n$7\r\nHGETALL\r\n$3\r\nfoo\r\n")
            .read(b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n")
            .build();
        let store = RespStore::new(mock);

        match store.hgetall("foo").await {
            Err(StoreError::CommandFailed(msg)) => assert!(msg.starts_with("WRONGTYPE")),
            other => panic!("Expected CommandFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_scan_reply() {
        let mock = Builder::new()
            .write(b"*6\r\n$4\r\nSCAN\r\n$1\r\n0\r\n$5\r\nMATCH\r\n$6\r\nuser:*\r\n$5\r\nCOUNT\r\n$2\r\n10\r\n")
            .read(b"*2\r\n$2\r\n17\r\n*2\r\n$6\r\nuser:1\r\n$6\r\nuser:2\r\n")
            .build();
        let store = RespStore::new(mock);

        let (keys, cursor) = store.scan(0, "user:*", 10).await.unwrap();
        assert_eq!(keys, vec!["user:1".to_string(), "user:2".to_string()]);
        assert_eq!(cursor, 17);
    }

    #[tokio::test]
    async fn test_zrange_with_scores() {
        let mock = Builder::new()
            .write(b"*5\r\n$6\r\nZRANGE\r\n$1\r\nz\r\n$1\r\n0\r\n$2\r\n-1\r\n$10\r\nWITHSCORES\r\n")
            .read(b"*4\r\n$1\r\na\r\n$1\r\n1\r\n$1\r\nb\r\n$3\r\n2.5\r\n")
            .build();
        let store = RespStore::new(mock);

        let members = store.zrange_with_scores("z", 0, -1).await.unwrap();
        assert_eq!(members, vec![(b"a".to_vec(), 1.0), (b"b".to_vec(), 2.5)]);
    }

    #[tokio::test]
    async fn test_set_with_expiry_uses_ex() {
        let mock = Builder::new()
            .write(b"*5\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nEX\r\n$2\r\n10\r\n")
            .read(b"+OK\r\n")
            .build();
        let store = RespStore::new(mock);

        store.set("k", b"v", Some(Duration::from_secs(10))).await.unwrap();
    }

    #[tokio::test]
    async fn test_expire_subsecond_uses_pexpire() {
        let mock = Builder::new()
            .write(b"*3\r\n$7\r\nPEXPIRE\r\n$1\r\nk\r\n$4\r\n1500\r\n")
            .read(b":1\r\n")
            .build();
        let store = RespStore::new(mock);

        assert!(store.expire("k", Duration::from_millis(1500)).await.unwrap());
    }

    #[tokio::test]
    async fn test_handshake_auth_and_select() {
        let mock = Builder::new()
            .write(b"*2\r\n$4\r\nAUTH\r\n$6\r\nsecret\r\n")
            .read(b"+OK\r\n")
            .write(b"*2\r\n$6\r\nSELECT\r\n$1\r\n2\r\n")
            .read(b"+OK\r\n")
            .build();
        let store = RespStore::new(mock);

        store.handshake(Some("secret"), 2).await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_connection() {
        let mock = Builder::new()
            .write(b"*2\r\n$4\r\nTYPE\r\n$3\r\nfoo\r\n")
            .build();
        let store = RespStore::new(mock);

        assert!(matches!(
            store.key_type("foo").await,
            Err(StoreError::ConnectionError(_))
        ));
    }
}
