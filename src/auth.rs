//! Bearer token handling.
//!
//! MWDB issues JWT tokens for both interactive sessions and API keys. The
//! client never verifies the signature; it only needs the expiry and the login
//! carried by the token to decide whether a request can be sent at all.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::{MwdbError, Result};

/// Decoded JWT bearer token
#[derive(Debug, Clone, PartialEq)]
pub struct AuthToken {
    value: String,
    header: Map<String, Value>,
    payload: Map<String, Value>,
}

fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    let trimmed = segment.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .ok()
}

fn invalid_token(reason: &str) -> MwdbError {
    MwdbError::InvalidCredentials {
        message: format!("malformed authentication token: {}", reason),
    }
}

impl AuthToken {
    /// Parses the token structure: three dot separated base64 segments with a
    /// JSON object as payload.
    pub fn parse(value: &str) -> Result<AuthToken> {
        let segments: Vec<&str> = value.trim().split('.').collect();
        if segments.len() != 3 {
            return Err(invalid_token("expected three segments"));
        }

        let decoded: Vec<Vec<u8>> = segments
            .iter()
            .map(|segment| decode_segment(segment))
            .collect::<Option<_>>()
            .ok_or_else(|| invalid_token("segment is not valid base64"))?;

        let header = serde_json::from_slice::<Map<String, Value>>(&decoded[0]).unwrap_or_default();
        let payload = serde_json::from_slice::<Map<String, Value>>(&decoded[1])
            .map_err(|_| invalid_token("payload is not a JSON object"))?;

        Ok(AuthToken {
            value: value.trim().to_string(),
            header,
            payload,
        })
    }

    /// The raw token as sent in the `Authorization` header
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn username(&self) -> Option<&str> {
        self.payload.get("login").and_then(Value::as_str)
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.payload
            .get("exp")
            .or_else(|| self.header.get("exp"))
            .and_then(Value::as_i64)
            .and_then(|timestamp| DateTime::from_timestamp(timestamp, 0))
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry() {
            Some(expiry) => expiry <= now,
            None => false,
        }
    }
}
