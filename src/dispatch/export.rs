use serde::Serialize;
use serde_json::{Map, Value};
use std::str::FromStr;
use tracing::{debug, warn};

use super::escape::quote;
use super::value_type::ValueType;
use crate::error::OperationError;
use crate::metrics::{Metrics, Timer};
use crate::protocol::format_double;
use crate::store::{StoreConnector, StoreDriver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// One write command per line, replayable against an empty store.
    Redis,
    /// A JSON object keyed by key name.
    Json,
}

impl FromStr for ExportFormat {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Redis" | "redis" => Ok(ExportFormat::Redis),
            "JSON" | "json" => Ok(ExportFormat::Json),
            other => Err(OperationError::InvalidPayload(format!(
                "unknown export format {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExportOutput {
    Commands(Vec<String>),
    Tree(Map<String, Value>),
}

/// Parse a JSON array of key names.
pub fn parse_key_list(keys_json: &str) -> Result<Vec<String>, OperationError> {
    Ok(serde_json::from_str(keys_json)?)
}

/// Export the keys named by a JSON array.
pub async fn export_keys<C>(
    connector: &C,
    keys_json: &str,
    format: ExportFormat,
) -> Result<ExportOutput, OperationError>
where
    C: StoreConnector + ?Sized,
{
    let keys = parse_key_list(keys_json)?;
    export_key_list(connector, &keys, format).await
}

/// Export keys in the requested format. Keys that are missing or of an
/// unrecognised type are left out.
pub async fn export_key_list<C>(
    connector: &C,
    keys: &[String],
    format: ExportFormat,
) -> Result<ExportOutput, OperationError>
where
    C: StoreConnector + ?Sized,
{
    let timer = Timer::new();
    let result = run_export(connector, keys, format).await;

    let metrics = Metrics::get();
    metrics.record_operation("export", timer.elapsed_seconds());
    match &result {
        Ok(_) => debug!("Exported {} keys as {:?}", keys.len(), format),
        Err(e) => {
            metrics.record_error(e.kind().as_str(), "export");
            warn!("Export of {} keys failed: {}", keys.len(), e);
        }
    }
    result
}

async fn run_export<C>(
    connector: &C,
    keys: &[String],
    format: ExportFormat,
) -> Result<ExportOutput, OperationError>
where
    C: StoreConnector + ?Sized,
{
    let driver = connector.connect().await?;
    match format {
        ExportFormat::Redis => Ok(ExportOutput::Commands(export_commands(driver.as_ref(), keys).await?)),
        ExportFormat::Json => Ok(ExportOutput::Tree(export_tree(driver.as_ref(), keys).await?)),
    }
}

fn lossy(raw: &[u8]) -> Value {
    Value::String(String::from_utf8_lossy(raw).into_owned())
}

async fn export_tree(driver: &dyn StoreDriver, keys: &[String]) -> Result<Map<String, Value>, OperationError> {
    let mut tree = Map::new();
    for key in keys {
        let value = match ValueType::from_tag(&driver.key_type(key).await?) {
            ValueType::String => lossy(&driver.get(key).await?.unwrap_or_default()),
            ValueType::Hash => Value::Object(
                driver
                    .hgetall(key)
                    .await?
                    .into_iter()
                    .map(|(field, value)| (String::from_utf8_lossy(&field).into_owned(), lossy(&value)))
                    .collect(),
            ),
            ValueType::List => Value::Array(driver.lrange(key, 0, -1).await?.iter().map(|v| lossy(v)).collect()),
            ValueType::Set => Value::Array(driver.smembers(key).await?.iter().map(|m| lossy(m)).collect()),
            // Member names only; scores are not exported in this format.
            ValueType::SortedSet => Value::Array(driver.zrange(key, 0, -1).await?.iter().map(|m| lossy(m)).collect()),
            ValueType::Unknown => continue,
        };
        tree.insert(key.clone(), value);
    }
    Ok(tree)
}

async fn export_commands(driver: &dyn StoreDriver, keys: &[String]) -> Result<Vec<String>, OperationError> {
    let mut lines = Vec::new();
    for key in keys {
        let quoted_key = quote(key.as_bytes());
        match ValueType::from_tag(&driver.key_type(key).await?) {
            ValueType::String => {
                let value = driver.get(key).await?.unwrap_or_default();
                lines.push(format!("SET {} {}", quoted_key, quote(&value)));
            }
            ValueType::Hash => {
                for (field, value) in driver.hgetall(key).await? {
                    lines.push(format!("HSET {} {} {}", quoted_key, quote(&field), quote(&value)));
                }
            }
            ValueType::List => {
                for value in driver.lrange(key, 0, -1).await? {
                    lines.push(format!("RPUSH {} {}", quoted_key, quote(&value)));
                }
            }
            ValueType::Set => {
                for member in driver.smembers(key).await? {
                    // Set lines carry a literal `\r\n` suffix.
                    lines.push(format!("SADD {} {}\\r\\n", quoted_key, quote(&member)));
                }
            }
            ValueType::SortedSet => {
                for member in driver.zrange(key, 0, -1).await? {
                    // A member removed since the range read has no score to export.
                    if let Some(score) = driver.zscore(key, &member).await? {
                        lines.push(format!(
                            "ZADD {} {} {}",
                            quoted_key,
                            format_double(score),
                            quote(&member)
                        ));
                    }
                }
            }
            ValueType::Unknown => {}
        }
    }
    Ok(lines)
}
