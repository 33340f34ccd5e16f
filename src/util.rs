//! Small helpers shared by the entity model and the CLI.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Parses the ISO-8601 timestamps emitted by MWDB.
///
/// Older servers omit the UTC offset; those timestamps are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// serde adapter for [`parse_timestamp`]
pub fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
}

pub fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw))),
        None => Ok(None),
    }
}

fn sha256_hex(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

/// Textual form of a scalar as the dhash algorithm expects it
fn scalar_repr(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn dhash_value(value: &Value) -> String {
    match value {
        Value::Array(items) => {
            let mut hashes: Vec<String> = items.iter().map(dhash_value).collect();
            hashes.sort();
            let listed: Vec<String> = hashes.iter().map(|h| format!("'{}'", h)).collect();
            sha256_hex(&format!("[{}]", listed.join(", ")))
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let pairs: Vec<Value> = keys
                .into_iter()
                .map(|key| {
                    Value::Array(vec![
                        Value::String(key.clone()),
                        Value::String(dhash_value(&map[key])),
                    ])
                })
                .collect();
            dhash_value(&Value::Array(pairs))
        }
        scalar => sha256_hex(&scalar_repr(scalar)),
    }
}

/// Computes the deduplication hash MWDB assigns to a static configuration.
///
/// Inline blobs in top-level `{"in-blob": {...}}` values are replaced by the
/// sha256 of their content before hashing.
pub fn config_dhash(config: &Value) -> String {
    match config {
        Value::Object(map) => {
            let mut resolved = map.clone();
            for value in resolved.values_mut() {
                let blob_content = value
                    .as_object()
                    .filter(|reference| reference.len() == 1)
                    .and_then(|reference| reference.get("in-blob"))
                    .and_then(Value::as_object)
                    .and_then(|blob| blob.get("content"))
                    .map(scalar_repr);
                if let Some(content) = blob_content {
                    *value = serde_json::json!({ "in-blob": sha256_hex(&content) });
                }
            }
            dhash_value(&Value::Object(resolved))
        }
        other => dhash_value(other),
    }
}
