use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MwdbError, Result};
use crate::object::ObjectRef;
use crate::util::deserialize_timestamp;

#[derive(Debug, Deserialize)]
struct CommentPayload {
    id: u64,
    author: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    timestamp: DateTime<Utc>,
    comment: String,
}

/// Comment attached to an object
#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: u64,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub comment: String,
    #[serde(skip)]
    parent: ObjectRef,
}

impl Comment {
    pub(crate) fn from_payload(parent: ObjectRef, payload: Value) -> Result<Self> {
        let payload: CommentPayload = serde_json::from_value(payload).map_err(|cause| {
            MwdbError::InvalidField {
                field: "comments".to_string(),
                cause,
            }
        })?;
        Ok(Self {
            id: payload.id,
            author: payload.author,
            timestamp: payload.timestamp,
            comment: payload.comment,
            parent,
        })
    }

    /// Object the comment belongs to
    pub fn parent(&self) -> &ObjectRef {
        &self.parent
    }

    /// Deletes the comment. Cached comment lists of other instances of the
    /// parent object are not refreshed.
    pub fn delete(&self) -> Result<()> {
        self.parent
            .api()
            .delete(format!("object/{}/comment/{}", self.parent.id(), self.id))
            .send()?;
        Ok(())
    }
}
