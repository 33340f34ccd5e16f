//! Static configuration objects.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::ApiClient;
use crate::blob::MwdbBlob;
use crate::error::{MwdbError, Result};
use crate::object::{Object, ObjectKind, ObjectState};

/// Value of a configuration entry, with `in-blob` references resolved to
/// blob objects
#[derive(Debug, Clone)]
pub enum ConfigValue {
    Value(Value),
    Blob(MwdbBlob),
}

/// Malware configuration extracted from a sample
#[derive(Debug, Clone)]
pub struct MwdbConfig {
    state: ObjectState,
}

impl MwdbConfig {
    pub fn new(api: Arc<ApiClient>, payload: Map<String, Value>) -> Result<Self> {
        Ok(Self {
            state: ObjectState::new(api, ObjectKind::Config, payload)?,
        })
    }

    pub fn from_id(api: Arc<ApiClient>, id: &str) -> Self {
        Self {
            state: ObjectState::from_id(api, id, ObjectKind::Config),
        }
    }

    pub fn family(&mut self) -> Result<String> {
        self.state.field("family")
    }

    /// `static` or `dynamic`
    pub fn config_type(&mut self) -> Result<String> {
        self.state.field("config_type")
    }

    /// Configuration as stored, `in-blob` references left untouched
    pub fn config_dict(&mut self) -> Result<Map<String, Value>> {
        self.state.field("cfg")
    }

    /// Configuration with `in-blob` references mapped to blob objects
    pub fn config(&mut self) -> Result<BTreeMap<String, ConfigValue>> {
        let api = self.state.api().clone();
        let config = self.config_dict()?;
        Ok(config
            .into_iter()
            .map(|(key, value)| {
                let blob_id = value
                    .as_object()
                    .and_then(|reference| reference.get("in-blob"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let value = match blob_id {
                    Some(blob_id) => ConfigValue::Blob(MwdbBlob::from_id(api.clone(), &blob_id)),
                    None => ConfigValue::Value(value),
                };
                (key, value)
            })
            .collect())
    }
}

impl Object for MwdbConfig {
    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }

    /// The configuration as indented JSON
    fn content(&mut self) -> Result<Vec<u8>> {
        let config = self.config_dict()?;
        let mut content = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut content, PrettyFormatter::with_indent(b"    "));
        config
            .serialize(&mut serializer)
            .map_err(|cause| MwdbError::InvalidField {
                field: "cfg".to_string(),
                cause,
            })?;
        Ok(content)
    }
}
