use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MwdbError, Result};
use crate::object::ObjectRef;
use crate::util::deserialize_optional_timestamp;

const RUNNING: &str = "running";

#[derive(Debug, Deserialize)]
struct AnalysisPayload {
    id: String,
    status: String,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    arguments: Map<String, Value>,
    #[serde(default)]
    processing_in: Map<String, Value>,
}

/// Karton analysis of an object
#[derive(Debug, Clone, Serialize)]
pub struct KartonAnalysis {
    pub id: String,
    pub status: String,
    pub last_update: Option<DateTime<Utc>>,
    pub arguments: Map<String, Value>,
    /// Karton services still processing the analysis, keyed by service name
    pub processing_in: Map<String, Value>,
    #[serde(skip)]
    parent: ObjectRef,
}

impl KartonAnalysis {
    pub(crate) fn from_payload(parent: ObjectRef, payload: Value) -> Result<Self> {
        let payload: AnalysisPayload =
            serde_json::from_value(payload).map_err(|cause| MwdbError::InvalidField {
                field: "analyses".to_string(),
                cause,
            })?;
        Ok(Self {
            id: payload.id,
            status: payload.status,
            last_update: payload.last_update,
            arguments: payload.arguments,
            processing_in: payload.processing_in,
            parent,
        })
    }

    pub fn parent(&self) -> &ObjectRef {
        &self.parent
    }

    pub fn is_running(&self) -> bool {
        self.status == RUNNING
    }
}
