//! Options shared by the upload endpoints.

use serde_json::{json, Map, Value};

use crate::api::ApiClient;
use crate::error::{MwdbError, Result};

/// Group the uploaded object is shared with
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ShareMode {
    /// Every group of the uploader (`*`)
    #[default]
    Default,
    Group(String),
    /// Only the uploader
    Private,
    /// Everyone
    Public,
}

impl ShareMode {
    /// Builds the mode from the mutually exclusive CLI style switches
    pub fn from_flags(share_with: Option<&str>, private: bool, public: bool) -> Result<ShareMode> {
        let selected = [share_with.is_some(), private, public]
            .iter()
            .filter(|flag| **flag)
            .count();
        if selected > 1 {
            return Err(MwdbError::Validation {
                message: "'share_with', 'private' and 'public' options are exclusive".to_string(),
            });
        }

        Ok(match (share_with, private, public) {
            (Some(group), _, _) => ShareMode::Group(group.to_string()),
            (None, true, _) => ShareMode::Private,
            (None, false, true) => ShareMode::Public,
            _ => ShareMode::Default,
        })
    }

    fn upload_as(&self, api: &ApiClient) -> Result<String> {
        match self {
            ShareMode::Default => Ok("*".to_string()),
            ShareMode::Group(group) => Ok(group.clone()),
            ShareMode::Public => Ok("public".to_string()),
            ShareMode::Private => api
                .logged_in_user()
                .ok_or_else(|| MwdbError::not_authenticated("private upload requires a logged in user")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadOptions {
    /// Identifier of the parent object
    pub parent: Option<String>,
    pub tags: Vec<String>,
    pub attributes: Vec<(String, Value)>,
    /// Legacy metakeys, exclusive with `attributes`
    pub metakeys: Vec<(String, String)>,
    pub share: ShareMode,
    /// Attach the object to an existing Karton analysis
    pub karton_id: Option<String>,
    pub karton_arguments: Option<Map<String, Value>>,
}

impl UploadOptions {
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.push((key.into(), value));
        self
    }

    pub fn metakey(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metakeys.push((key.into(), value.into()));
        self
    }

    pub fn share(mut self, share: ShareMode) -> Self {
        self.share = share;
        self
    }

    /// Request parameters understood by every upload endpoint
    pub fn to_params(&self, api: &ApiClient) -> Result<Map<String, Value>> {
        if !self.attributes.is_empty() && !self.metakeys.is_empty() {
            return Err(MwdbError::Validation {
                message: "'attributes' and 'metakeys' must be used exclusively".to_string(),
            });
        }

        let mut params = Map::new();
        params.insert(
            "parent".to_string(),
            self.parent.clone().map(Value::String).unwrap_or(Value::Null),
        );
        params.insert("upload_as".to_string(), Value::String(self.share.upload_as(api)?));

        if !self.tags.is_empty() {
            let tags = self.tags.iter().map(|tag| json!({ "tag": tag })).collect();
            params.insert("tags".to_string(), Value::Array(tags));
        }
        if !self.attributes.is_empty() {
            let attributes = self
                .attributes
                .iter()
                .map(|(key, value)| json!({ "key": key, "value": value }))
                .collect();
            params.insert("attributes".to_string(), Value::Array(attributes));
        }
        if !self.metakeys.is_empty() {
            let metakeys = self
                .metakeys
                .iter()
                .map(|(key, value)| json!({ "key": key, "value": value }))
                .collect();
            params.insert("metakeys".to_string(), Value::Array(metakeys));
        }
        if let Some(karton_id) = &self.karton_id {
            params.insert("karton_id".to_string(), Value::String(karton_id.clone()));
        }
        if let Some(arguments) = &self.karton_arguments {
            params.insert("karton_arguments".to_string(), Value::Object(arguments.clone()));
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_flags_are_exclusive() {
        assert!(ShareMode::from_flags(Some("cert"), true, false).is_err());
        assert!(ShareMode::from_flags(None, true, true).is_err());
        assert_eq!(ShareMode::from_flags(None, false, false).unwrap(), ShareMode::Default);
        assert_eq!(ShareMode::from_flags(None, false, true).unwrap(), ShareMode::Public);
        assert_eq!(
            ShareMode::from_flags(Some("cert"), false, false).unwrap(),
            ShareMode::Group("cert".to_string())
        );
    }
}
