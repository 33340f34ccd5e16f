//! File objects.

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::api::ApiClient;
use crate::config::MwdbConfig;
use crate::error::{MwdbError, Result};
use crate::object::{Object, ObjectKind, ObjectState};
use crate::version::{Feature, Strategy};

/// Sample stored in MWDB, identified by its sha256
#[derive(Debug, Clone)]
pub struct MwdbFile {
    state: ObjectState,
    /// Downloaded content, kept apart from the JSON field cache
    content: Option<Vec<u8>>,
}

impl MwdbFile {
    pub fn new(api: Arc<ApiClient>, payload: Map<String, Value>) -> Result<Self> {
        Ok(Self {
            state: ObjectState::new(api, ObjectKind::File, payload)?,
            content: None,
        })
    }

    pub fn from_id(api: Arc<ApiClient>, id: &str) -> Self {
        Self {
            state: ObjectState::from_id(api, id, ObjectKind::File),
            content: None,
        }
    }

    pub fn md5(&mut self) -> Result<String> {
        self.state.field("md5")
    }

    pub fn sha1(&mut self) -> Result<String> {
        self.state.field("sha1")
    }

    pub fn sha256(&self) -> &str {
        self.state.id()
    }

    pub fn sha512(&mut self) -> Result<String> {
        self.state.field("sha512")
    }

    pub fn crc32(&mut self) -> Result<String> {
        self.state.field("crc32")
    }

    pub fn ssdeep(&mut self) -> Result<Option<String>> {
        self.state.field("ssdeep")
    }

    /// Original file name of the sample
    pub fn file_name(&mut self) -> Result<String> {
        self.state.field("file_name")
    }

    pub fn file_size(&mut self) -> Result<u64> {
        self.state.field("file_size")
    }

    /// Type as reported by libmagic
    pub fn file_type(&mut self) -> Result<String> {
        self.state.field("file_type")
    }

    /// Alternative names the sample was uploaded with
    pub fn alt_names(&mut self) -> Result<Vec<String>> {
        self.state.field("alt_names")
    }

    /// Most recent configuration extracted from this sample
    pub fn latest_config(&mut self) -> Result<Option<MwdbConfig>> {
        self.state.latest_config()
    }

    /// Downloads the sample.
    ///
    /// Servers from 2.2.0 hand out a one-time download token; older servers
    /// use the `request/sample` endpoint instead.
    pub fn download(&mut self) -> Result<Vec<u8>> {
        if let Some(content) = &self.content {
            return Ok(content.clone());
        }

        let api = self.state.api().clone();
        let id = self.state.id().to_string();
        let content = api.run_versioned(Feature::FileDownload, |strategy| match strategy {
            Strategy::Current => {
                let response = api.post(format!("file/{}/download", id)).send()?;
                let token = string_field(&response, "token")?;
                api.get(format!("file/{}/download", id))
                    .query("token", token)
                    .send_raw()
            }
            Strategy::Legacy => {
                let response = api.post(format!("request/sample/{}", id)).send()?;
                let url = string_field(&response, "url")?;
                let token = url.rsplit('/').next().unwrap_or(url);
                api.get(format!("download/{}", token)).send_raw()
            }
        })?;

        self.content = Some(content.clone());
        Ok(content)
    }
}

fn string_field<'a>(response: &'a Value, key: &str) -> Result<&'a str> {
    response
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| MwdbError::BadResponse(format!("response does not contain '{}'", key)))
}

impl Object for MwdbFile {
    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }

    fn content(&mut self) -> Result<Vec<u8>> {
        self.download()
    }

    fn flush(&mut self) {
        self.state.flush();
        self.content = None;
    }
}
