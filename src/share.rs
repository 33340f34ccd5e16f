//! Share entries: which group has access to an object and why.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{MwdbError, Result};
use crate::object::{MwdbObject, ObjectKind, ObjectRef};
use crate::util::deserialize_timestamp;

#[derive(Debug, Deserialize)]
struct SharePayload {
    group_name: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    access_time: DateTime<Utc>,
    reason_type: String,
    related_object_dhash: String,
    related_object_type: String,
    related_user_login: String,
}

/// Why the group got access
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareReason {
    /// `added`, `queried`, `shared` or `migrated`
    pub reason_type: String,
    pub related_object_dhash: String,
    pub related_object_type: String,
    pub related_user_login: String,
}

impl ShareReason {
    /// Action that granted the access
    pub fn why(&self) -> &str {
        &self.reason_type
    }

    /// User who performed the action
    pub fn who(&self) -> &str {
        &self.related_user_login
    }
}

impl fmt::Display for ShareReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}:{}",
            self.related_user_login,
            self.reason_type,
            self.related_object_type,
            self.related_object_dhash
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Share {
    pub group_name: String,
    pub access_time: DateTime<Utc>,
    pub reason: ShareReason,
    #[serde(skip)]
    parent: ObjectRef,
}

impl Share {
    pub(crate) fn from_payload(parent: ObjectRef, payload: Value) -> Result<Self> {
        let payload: SharePayload =
            serde_json::from_value(payload).map_err(|cause| MwdbError::InvalidField {
                field: "shares".to_string(),
                cause,
            })?;
        Ok(Self {
            group_name: payload.group_name,
            access_time: payload.access_time,
            reason: ShareReason {
                reason_type: payload.reason_type,
                related_object_dhash: payload.related_object_dhash,
                related_object_type: payload.related_object_type,
                related_user_login: payload.related_user_login,
            },
            parent,
        })
    }

    pub fn parent(&self) -> &ObjectRef {
        &self.parent
    }

    /// Object through which the access was granted
    pub fn related_object(&self) -> Result<MwdbObject> {
        let kind = ObjectKind::from_type_name(&self.reason.related_object_type)?;
        Ok(MwdbObject::from_id(
            self.parent.api().clone(),
            &self.reason.related_object_dhash,
            kind,
        ))
    }
}
