//! Lazily loaded MWDB objects.
//!
//! An object is a partial snapshot of a remote record. Accessors return the
//! cached value when present and otherwise fetch it, merging the response into
//! the cache. Fields that live on dedicated sub-resources (tags, comments,
//! shares, attributes, analyses) are stored under their own key and are never
//! filled in as a side effect of loading the object details. Mutators send one
//! write and evict the cache entries the write invalidates.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use strum::EnumIter;
use tracing::trace;

use crate::api::ApiClient;
use crate::blob::MwdbBlob;
use crate::comment::Comment;
use crate::config::MwdbConfig;
use crate::error::{MwdbError, Result};
use crate::file::MwdbFile;
use crate::karton::KartonAnalysis;
use crate::share::Share;
use crate::util::parse_timestamp;
use crate::version::{Feature, Strategy};

pub(crate) const TAGS: &str = "tags";
pub(crate) const COMMENTS: &str = "comments";
pub(crate) const SHARES: &str = "shares";
pub(crate) const ATTRIBUTES: &str = "attributes";
pub(crate) const ANALYSES: &str = "analyses";
pub(crate) const PARENTS: &str = "parents";
pub(crate) const CHILDREN: &str = "children";

/// Cache keys filled only from their own endpoints
const SUBRESOURCE_KEYS: [&str; 5] = [TAGS, COMMENTS, SHARES, ATTRIBUTES, ANALYSES];

/// Object type discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum ObjectKind {
    File,
    Config,
    Blob,
}

impl ObjectKind {
    /// Value of the `type` field in API payloads
    pub fn type_name(&self) -> &'static str {
        match self {
            ObjectKind::File => "file",
            ObjectKind::Config => "static_config",
            ObjectKind::Blob => "text_blob",
        }
    }

    /// First path segment of the kind specific endpoints
    pub fn url_segment(&self) -> &'static str {
        match self {
            ObjectKind::File => "file",
            ObjectKind::Config => "config",
            ObjectKind::Blob => "blob",
        }
    }

    pub fn from_type_name(name: &str) -> Result<ObjectKind> {
        match name {
            "file" => Ok(ObjectKind::File),
            "static_config" | "config" => Ok(ObjectKind::Config),
            "text_blob" | "blob" => Ok(ObjectKind::Blob),
            other => Err(MwdbError::UnsupportedType(other.to_string())),
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Lightweight reference to an object, held by sub-entities
#[derive(Debug, Clone)]
pub struct ObjectRef {
    api: Arc<ApiClient>,
    id: String,
    kind: ObjectKind,
}

impl ObjectRef {
    pub fn new(api: Arc<ApiClient>, id: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            api,
            id: id.into(),
            kind,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    /// Unloaded object for this reference
    pub fn object(&self) -> MwdbObject {
        MwdbObject::from_id(self.api.clone(), &self.id, self.kind)
    }
}

/// Field cache shared by all object kinds
#[derive(Debug, Clone)]
pub struct ObjectState {
    api: Arc<ApiClient>,
    id: String,
    kind: ObjectKind,
    fields: Map<String, Value>,
    /// Set once the detail payload has been merged, so absent keys stay absent
    details_loaded: bool,
}

impl ObjectState {
    pub(crate) fn new(api: Arc<ApiClient>, kind: ObjectKind, mut fields: Map<String, Value>) -> Result<Self> {
        let id = fields
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| MwdbError::BadResponse("object payload without an id".to_string()))?;
        fields.insert("type".to_string(), Value::String(kind.type_name().to_string()));
        Ok(Self {
            api,
            id,
            kind,
            fields,
            details_loaded: false,
        })
    }

    pub(crate) fn from_id(api: Arc<ApiClient>, id: &str, kind: ObjectKind) -> Self {
        let mut state = Self {
            api,
            id: id.to_string(),
            kind,
            fields: Map::new(),
            details_loaded: false,
        };
        state.flush();
        state
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    /// Currently cached fields
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn is_loaded(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn detail_endpoint(&self) -> String {
        format!("{}/{}", self.kind.url_segment(), self.id)
    }

    pub(crate) fn object_endpoint(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            format!("object/{}", self.id)
        } else {
            format!("object/{}/{}", self.id, suffix)
        }
    }

    /// Merges a detail payload, leaving sub-resource keys alone
    fn merge_details(&mut self, details: Map<String, Value>) {
        for (key, value) in details {
            if SUBRESOURCE_KEYS.contains(&key.as_str()) || key == "id" || key == "type" {
                continue;
            }
            self.fields.insert(key, value);
        }
    }

    /// Fetches the canonical detail payload and merges it into the cache
    pub fn load(&mut self) -> Result<()> {
        trace!("Loading details of {} {}", self.kind, self.id);
        let response = self.api.get(self.detail_endpoint()).send()?;
        match response {
            Value::Object(details) => {
                self.merge_details(details);
                self.details_loaded = true;
                Ok(())
            }
            other => Err(MwdbError::BadResponse(format!(
                "expected object details, got {}",
                other
            ))),
        }
    }

    /// Raw value of a field of the detail payload
    pub fn field_value(&mut self, key: &str) -> Result<&Value> {
        if !self.fields.contains_key(key) && !self.details_loaded {
            self.load()?;
        }
        self.fields.get(key).ok_or_else(|| MwdbError::MissingField {
            field: key.to_string(),
        })
    }

    /// Typed value of a field of the detail payload
    pub fn field<T: DeserializeOwned>(&mut self, key: &str) -> Result<T> {
        let value = self.field_value(key)?.clone();
        serde_json::from_value(value).map_err(|cause| MwdbError::InvalidField {
            field: key.to_string(),
            cause,
        })
    }

    /// Value of a sub-resource, fetched with `load` when not cached
    pub(crate) fn subresource(
        &mut self,
        key: &str,
        load: impl FnOnce(&ApiClient, &str) -> Result<Value>,
    ) -> Result<Value> {
        if let Some(value) = self.fields.get(key) {
            return Ok(value.clone());
        }
        trace!("Loading {} of {} {}", key, self.kind, self.id);
        let value = load(self.api.as_ref(), &self.id)?;
        self.fields.insert(key.to_string(), value.clone());
        Ok(value)
    }

    pub fn evict(&mut self, key: &str) {
        self.fields.remove(key);
        if !SUBRESOURCE_KEYS.contains(&key) {
            self.details_loaded = false;
        }
    }

    /// Forgets everything except the identity
    pub fn flush(&mut self) {
        self.details_loaded = false;
        self.fields.clear();
        self.fields.insert("id".to_string(), Value::String(self.id.clone()));
        self.fields.insert(
            "type".to_string(),
            Value::String(self.kind.type_name().to_string()),
        );
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.api.clone(), self.id.clone(), self.kind)
    }

    pub(crate) fn related_objects(&mut self, key: &str) -> Result<Vec<MwdbObject>> {
        let api = self.api.clone();
        let items = self.field::<Vec<Value>>(key)?;
        items
            .into_iter()
            .map(|item| MwdbObject::create(api.clone(), item))
            .collect()
    }

    pub(crate) fn latest_config(&mut self) -> Result<Option<MwdbConfig>> {
        let api = self.api.clone();
        match self.field_value("latest_config")?.clone() {
            Value::Object(payload) => Ok(Some(MwdbConfig::new(api, payload)?)),
            _ => Ok(None),
        }
    }
}

/// Pulls a list out of a sub-resource response, which is either the list
/// itself or an object wrapping it under `key`
pub(crate) fn extract_list(mut response: Value, key: &str) -> Result<Value> {
    if response.is_array() {
        return Ok(response);
    }
    match response.get_mut(key).map(Value::take) {
        Some(list @ Value::Array(_)) => Ok(list),
        _ => Err(MwdbError::BadResponse(format!(
            "response does not contain a '{}' list",
            key
        ))),
    }
}

/// Behavior shared by every object kind
pub trait Object {
    fn state(&self) -> &ObjectState;

    fn state_mut(&mut self) -> &mut ObjectState;

    /// Raw content of the object
    fn content(&mut self) -> Result<Vec<u8>>;

    fn id(&self) -> &str {
        self.state().id()
    }

    fn kind(&self) -> ObjectKind {
        self.state().kind()
    }

    fn object_ref(&self) -> ObjectRef {
        self.state().object_ref()
    }

    fn upload_time(&mut self) -> Result<DateTime<Utc>> {
        let raw: String = self.state_mut().field("upload_time")?;
        parse_timestamp(&raw)
            .ok_or_else(|| MwdbError::BadResponse(format!("invalid upload time '{}'", raw)))
    }

    fn parents(&mut self) -> Result<Vec<MwdbObject>> {
        self.state_mut().related_objects(PARENTS)
    }

    fn children(&mut self) -> Result<Vec<MwdbObject>> {
        self.state_mut().related_objects(CHILDREN)
    }

    fn tags(&mut self) -> Result<Vec<String>> {
        let tags = self.state_mut().subresource(TAGS, |api, id| {
            api.get(format!("object/{}/tag", id)).send()
        })?;
        Ok(tags
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("tag").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn comments(&mut self) -> Result<Vec<Comment>> {
        let parent = self.object_ref();
        let comments = self.state_mut().subresource(COMMENTS, |api, id| {
            api.get(format!("object/{}/comment", id)).send()
        })?;
        let comments = extract_list(comments, COMMENTS)?;
        let comments = comments
            .as_array()
            .into_iter()
            .flatten()
            .map(|item| Comment::from_payload(parent.clone(), item.clone()))
            .collect();
        comments
    }

    fn shares(&mut self) -> Result<Vec<Share>> {
        let parent = self.object_ref();
        let shares = self.state_mut().subresource(SHARES, |api, id| {
            extract_list(api.get(format!("object/{}/share", id)).send()?, SHARES)
        })?;
        let shares = shares
            .as_array()
            .into_iter()
            .flatten()
            .map(|item| Share::from_payload(parent.clone(), item.clone()))
            .collect();
        shares
    }

    /// Attributes grouped by key. Servers older than 2.6.0 expose them as
    /// metakeys, which are presented the same way.
    fn attributes(&mut self) -> Result<BTreeMap<String, Vec<Value>>> {
        let attributes = self.state_mut().subresource(ATTRIBUTES, |api, id| {
            api.run_versioned(Feature::Attributes, |strategy| match strategy {
                Strategy::Current => extract_list(
                    api.get(format!("object/{}/attribute", id)).send()?,
                    ATTRIBUTES,
                ),
                Strategy::Legacy => {
                    extract_list(api.get(format!("object/{}/meta", id)).send()?, "metakeys")
                }
            })
        })?;

        let mut grouped: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        for item in attributes.as_array().into_iter().flatten() {
            if let Some(key) = item.get("key").and_then(Value::as_str) {
                let value = item.get("value").cloned().unwrap_or(Value::Null);
                grouped.entry(key.to_string()).or_default().push(value);
            }
        }
        Ok(grouped)
    }

    /// Karton analyses the object took part in
    fn analyses(&mut self) -> Result<Vec<KartonAnalysis>> {
        let parent = self.object_ref();
        let analyses = self.state_mut().subresource(ANALYSES, |api, id| {
            api.run_versioned(Feature::KartonAnalyses, |_| {
                extract_list(api.get(format!("object/{}/karton", id)).send()?, ANALYSES)
            })
        })?;
        let analyses = analyses
            .as_array()
            .into_iter()
            .flatten()
            .map(|item| KartonAnalysis::from_payload(parent.clone(), item.clone()))
            .collect();
        analyses
    }

    fn add_tag(&mut self, tag: &str) -> Result<()> {
        let state = self.state_mut();
        state
            .api()
            .put(state.object_endpoint("tag"))
            .json(json!({ "tag": tag }))
            .send()?;
        state.evict(TAGS);
        Ok(())
    }

    fn remove_tag(&mut self, tag: &str) -> Result<()> {
        let state = self.state_mut();
        state
            .api()
            .delete(state.object_endpoint("tag"))
            .query("tag", tag)
            .send()?;
        state.evict(TAGS);
        Ok(())
    }

    fn add_comment(&mut self, comment: &str) -> Result<()> {
        let state = self.state_mut();
        state
            .api()
            .post(state.object_endpoint("comment"))
            .json(json!({ "comment": comment }))
            .send()?;
        state.evict(COMMENTS);
        Ok(())
    }

    fn remove_comment(&mut self, comment_id: u64) -> Result<()> {
        let state = self.state_mut();
        state
            .api()
            .delete(state.object_endpoint(&format!("comment/{}", comment_id)))
            .send()?;
        state.evict(COMMENTS);
        Ok(())
    }

    /// Adds an attribute, using the metakey API on servers older than 2.6.0
    fn add_attribute(&mut self, key: &str, value: Value) -> Result<()> {
        let state = self.state_mut();
        let api = state.api().clone();
        let id = state.id().to_string();
        api.run_versioned(Feature::Attributes, |strategy| match strategy {
            Strategy::Current => api
                .post(format!("object/{}/attribute", id))
                .json(json!({ "key": key, "value": value }))
                .send(),
            Strategy::Legacy => {
                let value = match &value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                api.post(format!("object/{}/meta", id))
                    .json(json!({ "key": key, "value": value }))
                    .send()
            }
        })?;
        state.evict(ATTRIBUTES);
        Ok(())
    }

    fn share_with(&mut self, group: &str) -> Result<()> {
        let state = self.state_mut();
        state
            .api()
            .put(state.object_endpoint("share"))
            .json(json!({ "group": group }))
            .send()?;
        state.evict(SHARES);
        Ok(())
    }

    fn add_child(&mut self, child: &str) -> Result<()> {
        let state = self.state_mut();
        state
            .api()
            .put(state.object_endpoint(&format!("child/{}", child)))
            .send()?;
        state.evict(CHILDREN);
        Ok(())
    }

    fn remove_child(&mut self, child: &str) -> Result<()> {
        let state = self.state_mut();
        state
            .api()
            .delete(state.object_endpoint(&format!("child/{}", child)))
            .send()?;
        state.evict(CHILDREN);
        Ok(())
    }

    /// Submits the object for another Karton analysis
    fn reanalyze(&mut self, arguments: Option<Map<String, Value>>) -> Result<KartonAnalysis> {
        let state = self.state_mut();
        let api = state.api().clone();
        let endpoint = state.object_endpoint("karton");
        let arguments = Value::Object(arguments.unwrap_or_default());
        let response = api.run_versioned(Feature::KartonAnalyses, |_| {
            api.post(endpoint.clone())
                .json(json!({ "arguments": arguments }))
                .send()
        })?;
        state.evict(ANALYSES);
        KartonAnalysis::from_payload(state.object_ref(), response)
    }

    fn flush(&mut self) {
        self.state_mut().flush();
    }

    /// Deletes the object from the repository. The local instance should not
    /// be used afterwards.
    fn remove(&mut self) -> Result<()> {
        {
            let state = self.state();
            state.api().delete(state.object_endpoint("")).send()?;
        }
        self.flush();
        Ok(())
    }
}

/// An object of any kind
#[derive(Debug, Clone)]
pub enum MwdbObject {
    File(MwdbFile),
    Config(MwdbConfig),
    Blob(MwdbBlob),
}

impl MwdbObject {
    /// Wraps an API payload into the object kind named by its `type` field
    pub fn create(api: Arc<ApiClient>, payload: Value) -> Result<MwdbObject> {
        let payload = match payload {
            Value::Object(map) => map,
            other => {
                return Err(MwdbError::BadResponse(format!(
                    "expected an object payload, got {}",
                    other
                )))
            }
        };
        let type_name = payload
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| MwdbError::UnsupportedType("<missing>".to_string()))?;

        Ok(match ObjectKind::from_type_name(type_name)? {
            ObjectKind::File => MwdbObject::File(MwdbFile::new(api, payload)?),
            ObjectKind::Config => MwdbObject::Config(MwdbConfig::new(api, payload)?),
            ObjectKind::Blob => MwdbObject::Blob(MwdbBlob::new(api, payload)?),
        })
    }

    /// Unloaded object of a known kind
    pub fn from_id(api: Arc<ApiClient>, id: &str, kind: ObjectKind) -> MwdbObject {
        match kind {
            ObjectKind::File => MwdbObject::File(MwdbFile::from_id(api, id)),
            ObjectKind::Config => MwdbObject::Config(MwdbConfig::from_id(api, id)),
            ObjectKind::Blob => MwdbObject::Blob(MwdbBlob::from_id(api, id)),
        }
    }

    pub fn as_file(&mut self) -> Option<&mut MwdbFile> {
        match self {
            MwdbObject::File(file) => Some(file),
            _ => None,
        }
    }

    pub fn as_config(&mut self) -> Option<&mut MwdbConfig> {
        match self {
            MwdbObject::Config(config) => Some(config),
            _ => None,
        }
    }

    pub fn as_blob(&mut self) -> Option<&mut MwdbBlob> {
        match self {
            MwdbObject::Blob(blob) => Some(blob),
            _ => None,
        }
    }
}

impl Object for MwdbObject {
    fn state(&self) -> &ObjectState {
        match self {
            MwdbObject::File(file) => file.state(),
            MwdbObject::Config(config) => config.state(),
            MwdbObject::Blob(blob) => blob.state(),
        }
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        match self {
            MwdbObject::File(file) => file.state_mut(),
            MwdbObject::Config(config) => config.state_mut(),
            MwdbObject::Blob(blob) => blob.state_mut(),
        }
    }

    fn content(&mut self) -> Result<Vec<u8>> {
        match self {
            MwdbObject::File(file) => file.content(),
            MwdbObject::Config(config) => config.content(),
            MwdbObject::Blob(blob) => blob.content(),
        }
    }

    fn flush(&mut self) {
        match self {
            MwdbObject::File(file) => file.flush(),
            MwdbObject::Config(config) => config.flush(),
            MwdbObject::Blob(blob) => blob.flush(),
        }
    }
}

/// Conversion from a generic object into a specific kind, used by the typed
/// query and listing helpers
pub trait ObjectType: Object + Sized {
    /// Kind served by the endpoints of this type, `None` for any kind
    const KIND: Option<ObjectKind>;

    fn from_object(object: MwdbObject) -> Result<Self>;

    fn url_segment() -> &'static str {
        Self::KIND.map(|kind| kind.url_segment()).unwrap_or("object")
    }
}

impl ObjectType for MwdbObject {
    const KIND: Option<ObjectKind> = None;

    fn from_object(object: MwdbObject) -> Result<Self> {
        Ok(object)
    }
}

fn kind_mismatch(expected: ObjectKind, object: &MwdbObject) -> MwdbError {
    MwdbError::TypeConflict {
        message: format!("expected {}, got {} {}", expected, object.kind(), object.id()),
    }
}

impl ObjectType for MwdbFile {
    const KIND: Option<ObjectKind> = Some(ObjectKind::File);

    fn from_object(object: MwdbObject) -> Result<Self> {
        match object {
            MwdbObject::File(file) => Ok(file),
            other => Err(kind_mismatch(ObjectKind::File, &other)),
        }
    }
}

impl ObjectType for MwdbConfig {
    const KIND: Option<ObjectKind> = Some(ObjectKind::Config);

    fn from_object(object: MwdbObject) -> Result<Self> {
        match object {
            MwdbObject::Config(config) => Ok(config),
            other => Err(kind_mismatch(ObjectKind::Config, &other)),
        }
    }
}

impl ObjectType for MwdbBlob {
    const KIND: Option<ObjectKind> = Some(ObjectKind::Blob);

    fn from_object(object: MwdbObject) -> Result<Self> {
        match object {
            MwdbObject::Blob(blob) => Ok(blob),
            other => Err(kind_mismatch(ObjectKind::Blob, &other)),
        }
    }
}
