use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::escape::unquote;
use super::ttl::parse_ttl;
use super::value_type::ValueType;
use crate::error::OperationError;
use crate::metrics::{Metrics, Timer};
use crate::protocol::format_double;
use crate::store::{StoreConnector, StoreDriver};

/// A decoded payload, ready to be written.
#[derive(Debug, Clone, PartialEq)]
enum NewValue {
    Scalar(Vec<u8>),
    Hash(Vec<(Vec<u8>, Vec<u8>)>),
    List(Vec<Vec<u8>>),
    Set(Vec<Vec<u8>>),
    SortedSet(Vec<(f64, Vec<u8>)>),
}

/// One sorted-set entry. The member is required so a misspelt field name
/// fails validation instead of storing an empty member.
#[derive(Debug, Deserialize)]
struct ScoredEntry {
    #[serde(alias = "Member")]
    member: Value,
    #[serde(default, alias = "Score")]
    score: f64,
}

/// Stringify a JSON scalar the way it is stored: numbers in plain decimal,
/// booleans as `1`/`0`, null as empty.
fn scalar_bytes(value: &Value) -> Result<Vec<u8>, OperationError> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                format_double(n.as_f64().unwrap_or_default())
            }
        }
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => {
            return Err(OperationError::InvalidPayload(format!(
                "nested value {} cannot be stored",
                value
            )))
        }
    };
    Ok(text.into_bytes())
}

fn scalar_list(payload: &str) -> Result<Vec<Vec<u8>>, OperationError> {
    let items: Vec<Value> = serde_json::from_str(payload)?;
    items.iter().map(scalar_bytes).collect()
}

fn decode_payload(value_type: ValueType, tag: &str, payload: &str) -> Result<NewValue, OperationError> {
    match value_type {
        ValueType::String => {
            // The payload must be a JSON string; its bytes come from unquoting
            // the literal itself.
            serde_json::from_str::<String>(payload)?;
            let bytes = unquote(payload).map_err(OperationError::InvalidPayload)?;
            Ok(NewValue::Scalar(bytes))
        }
        ValueType::Hash => {
            let fields: Map<String, Value> = serde_json::from_str(payload)?;
            let pairs = fields
                .iter()
                .map(|(field, value)| Ok((field.clone().into_bytes(), scalar_bytes(value)?)))
                .collect::<Result<Vec<_>, OperationError>>()?;
            Ok(NewValue::Hash(pairs))
        }
        ValueType::List => Ok(NewValue::List(scalar_list(payload)?)),
        ValueType::Set => Ok(NewValue::Set(scalar_list(payload)?)),
        ValueType::SortedSet => {
            let entries: Vec<ScoredEntry> = serde_json::from_str(payload)?;
            let members = entries
                .iter()
                .map(|entry| Ok((entry.score, scalar_bytes(&entry.member)?)))
                .collect::<Result<Vec<_>, OperationError>>()?;
            Ok(NewValue::SortedSet(members))
        }
        ValueType::Unknown => Err(OperationError::UnsupportedType(tag.to_string())),
    }
}

/// Replace `key` with a value of type `type_tag` decoded from `payload`.
///
/// The TTL text uses the duration grammar of [`parse_ttl`]; `-1s` or empty
/// means no expiry. Input is validated before anything is written, then the
/// key is deleted and recreated. Collection types get their TTL from a
/// separate expire after the write.
pub async fn create_key<C>(
    connector: &C,
    type_tag: &str,
    key: &str,
    ttl: &str,
    payload: &str,
) -> Result<(), OperationError>
where
    C: StoreConnector + ?Sized,
{
    let timer = Timer::new();
    let result = write_key(connector, type_tag, key, ttl, payload).await;

    let metrics = Metrics::get();
    metrics.record_operation("import", timer.elapsed_seconds());
    match &result {
        Ok(()) => info!("Created {} key {:?} (ttl {:?})", type_tag, key, ttl),
        Err(e) => {
            metrics.record_error(e.kind().as_str(), "import");
            warn!("Creating {} key {:?} failed: {}", type_tag, key, e);
        }
    }
    result
}

async fn write_key<C>(
    connector: &C,
    type_tag: &str,
    key: &str,
    ttl: &str,
    payload: &str,
) -> Result<(), OperationError>
where
    C: StoreConnector + ?Sized,
{
    let expiry = parse_ttl(ttl).map_err(OperationError::InvalidTtl)?;
    let value = decode_payload(ValueType::from_tag(type_tag), type_tag, payload)?;

    let driver = connector.connect().await?;
    let removed = driver.del(&[key.to_string()]).await?;
    debug!("Replacing key {:?} ({} removed)", key, removed);

    write_value(driver.as_ref(), key, value, expiry).await
}

async fn write_value(
    driver: &dyn StoreDriver,
    key: &str,
    value: NewValue,
    expiry: Option<Duration>,
) -> Result<(), OperationError> {
    match value {
        NewValue::Scalar(bytes) => {
            driver.set(key, &bytes, expiry).await?;
            return Ok(());
        }
        NewValue::Hash(fields) => {
            driver.hset(key, &fields).await?;
        }
        NewValue::List(items) => {
            driver.rpush(key, &items).await?;
        }
        NewValue::Set(members) => {
            driver.sadd(key, &members).await?;
        }
        NewValue::SortedSet(members) => {
            driver.zadd(key, &members).await?;
        }
    }

    if let Some(ttl) = expiry {
        driver.expire(key, ttl).await?;
    }
    Ok(())
}

/// Delete keys. Succeeds whether or not they existed and returns how many
/// were actually removed.
pub async fn delete_keys<C>(connector: &C, keys: &[String]) -> Result<i64, OperationError>
where
    C: StoreConnector + ?Sized,
{
    let timer = Timer::new();
    let result = remove_keys(connector, keys).await;

    let metrics = Metrics::get();
    metrics.record_operation("delete", timer.elapsed_seconds());
    match &result {
        Ok(removed) => info!("Deleted {} of {} keys", removed, keys.len()),
        Err(e) => {
            metrics.record_error(e.kind().as_str(), "delete");
            warn!("Deleting {} keys failed: {}", keys.len(), e);
        }
    }
    result
}

async fn remove_keys<C>(connector: &C, keys: &[String]) -> Result<i64, OperationError>
where
    C: StoreConnector + ?Sized,
{
    let driver = connector.connect().await?;
    Ok(driver.del(keys).await?)
}
