//! Text blob objects.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::api::ApiClient;
use crate::config::MwdbConfig;
use crate::error::{MwdbError, Result};
use crate::object::{Object, ObjectKind, ObjectState};
use crate::util::parse_timestamp;

#[derive(Debug, Clone)]
pub struct MwdbBlob {
    state: ObjectState,
}

impl MwdbBlob {
    pub fn new(api: Arc<ApiClient>, payload: Map<String, Value>) -> Result<Self> {
        Ok(Self {
            state: ObjectState::new(api, ObjectKind::Blob, payload)?,
        })
    }

    pub fn from_id(api: Arc<ApiClient>, id: &str) -> Self {
        Self {
            state: ObjectState::from_id(api, id, ObjectKind::Blob),
        }
    }

    pub fn blob_name(&mut self) -> Result<String> {
        self.state.field("blob_name")
    }

    pub fn blob_size(&mut self) -> Result<u64> {
        self.state.field("blob_size")
    }

    pub fn blob_type(&mut self) -> Result<String> {
        self.state.field("blob_type")
    }

    /// Content as text
    pub fn text(&mut self) -> Result<String> {
        self.state.field("content")
    }

    /// Latest configuration that referenced this blob
    pub fn latest_config(&mut self) -> Result<Option<MwdbConfig>> {
        self.state.latest_config()
    }

    pub fn last_seen(&mut self) -> Result<DateTime<Utc>> {
        let raw: String = self.state.field("last_seen")?;
        parse_timestamp(&raw)
            .ok_or_else(|| MwdbError::BadResponse(format!("invalid last_seen '{}'", raw)))
    }
}

impl Object for MwdbBlob {
    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }

    /// Blob text encoded as UTF-8
    fn content(&mut self) -> Result<Vec<u8>> {
        Ok(self.text()?.into_bytes())
    }
}
