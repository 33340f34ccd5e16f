//! Error taxonomy of the MWDB client.
//!
//! HTTP failures are mapped onto typed variants by [`map_http_error`], which
//! looks at the status code and, for the ambiguous 403 and 404 codes, at the
//! message returned by the server.

use serde_json::Value;
use thiserror::Error;

/// Result alias used across the library
pub type Result<T, E = MwdbError> = std::result::Result<T, E>;

const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid login or password";
const MAINTENANCE_MESSAGE: &str = "Maintenance underway";
const USER_PENDING_MESSAGE: &str = "User registration is pending";
const USER_DISABLED_MESSAGE: &str = "User account is disabled";
const ENDPOINT_NOT_FOUND_MESSAGE: &str = "The requested URL was not found on the server";

/// Errors reported by the MWDB client
#[derive(Debug, Error)]
pub enum MwdbError {
    /// Malformed query or request parameters (400)
    #[error("validation error: {message}")]
    Validation { message: String },
    /// Missing or expired credentials (401)
    #[error("not authenticated: {message}")]
    NotAuthenticated { message: String },
    /// Rejected login or a malformed token
    #[error("invalid credentials: {message}")]
    InvalidCredentials { message: String },
    #[error("maintenance underway: {message}")]
    MaintenanceUnderway { message: String },
    #[error("user registration is pending: {message}")]
    UserPending { message: String },
    #[error("user account is disabled: {message}")]
    UserDisabled { message: String },
    /// Insufficient rights (generic 403)
    #[error("permission denied: {message}")]
    PermissionDenied { message: String },
    /// The object does not exist (404)
    #[error("object not found: {message}")]
    ObjectNotFound { message: String },
    /// The endpoint does not exist on this server version (404)
    #[error("endpoint not found: {message}")]
    EndpointNotFound { message: String },
    /// The identity exists with a different kind (409)
    #[error("object type conflict: {message}")]
    TypeConflict { message: String },
    /// Rate limit hit (429)
    #[error("rate limit exceeded: {message}")]
    LimitExceeded {
        message: String,
        retry_after: Option<u64>,
    },
    /// Bad gateway or gateway timeout (502, 504)
    #[error("gateway error ({status}): {message}")]
    Gateway { status: u16, message: String },
    /// Transport level failure, no response was received
    #[error("connection error: {0}")]
    Connection(String),
    /// Any other non-successful status
    #[error("internal server error ({status}): {message}")]
    Internal { status: u16, message: String },
    /// The request could not be assembled, nothing was sent
    #[error("failed to build request: {0}")]
    Request(String),
    /// The server answered with something that is not the expected JSON
    #[error("bad response: {0}")]
    BadResponse(String),
    /// Unknown object type discriminant
    #[error("unsupported object type: {0}")]
    UnsupportedType(String),
    #[error("{feature} requires MWDB {required}, server runs {actual}")]
    VersionMismatch {
        feature: String,
        required: String,
        actual: String,
    },
    /// A loaded payload does not contain the requested field
    #[error("field '{field}' is missing from the server response")]
    MissingField { field: String },
    #[error("field '{field}' has an unexpected format: {cause}")]
    InvalidField {
        field: String,
        cause: serde_json::Error,
    },
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl MwdbError {
    /// Conditions worth waiting out when the retry policy allows it
    pub fn is_downtime(&self) -> bool {
        matches!(self, MwdbError::Gateway { .. } | MwdbError::Connection(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MwdbError::ObjectNotFound { .. })
    }

    /// Whether the error is related to authentication state
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            MwdbError::NotAuthenticated { .. }
                | MwdbError::InvalidCredentials { .. }
                | MwdbError::UserPending { .. }
                | MwdbError::UserDisabled { .. }
        )
    }

    pub(crate) fn not_authenticated(message: impl Into<String>) -> Self {
        MwdbError::NotAuthenticated {
            message: message.into(),
        }
    }
}

/// Turns `ObjectNotFound` into `Ok(None)` for lookups where absence is expected.
pub trait NotFoundExt<T> {
    fn found(self) -> Result<Option<T>>;
}

impl<T> NotFoundExt<T> for Result<T> {
    fn found(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Extracts the human readable message from an MWDB error body.
///
/// MWDB answers with `{"message": ...}` for most errors and with
/// `{"errors": {...}}` for schema validation failures.
pub fn error_message(status: u16, body: &[u8]) -> String {
    let parsed = serde_json::from_slice::<Value>(body).ok();
    let message = parsed.as_ref().and_then(|json| {
        json.get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| json.get("errors").map(Value::to_string))
    });

    message.unwrap_or_else(|| {
        reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status))
    })
}

/// Maps a non-successful HTTP response onto the error taxonomy
pub fn map_http_error(status: u16, body: &[u8], retry_after: Option<u64>) -> MwdbError {
    let message = error_message(status, body);
    match status {
        400 => MwdbError::Validation { message },
        401 => MwdbError::NotAuthenticated { message },
        403 => {
            if message.contains(INVALID_CREDENTIALS_MESSAGE) {
                MwdbError::InvalidCredentials { message }
            } else if message.contains(MAINTENANCE_MESSAGE) {
                MwdbError::MaintenanceUnderway { message }
            } else if message.contains(USER_PENDING_MESSAGE) {
                MwdbError::UserPending { message }
            } else if message.contains(USER_DISABLED_MESSAGE) {
                MwdbError::UserDisabled { message }
            } else {
                MwdbError::PermissionDenied { message }
            }
        }
        404 => {
            if message.contains(ENDPOINT_NOT_FOUND_MESSAGE) {
                MwdbError::EndpointNotFound { message }
            } else {
                MwdbError::ObjectNotFound { message }
            }
        }
        409 => MwdbError::TypeConflict { message },
        429 => MwdbError::LimitExceeded {
            message,
            retry_after,
        },
        502 | 504 => MwdbError::Gateway { status, message },
        _ => MwdbError::Internal { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(message: &str) -> Vec<u8> {
        serde_json::json!({ "message": message }).to_string().into_bytes()
    }

    #[test]
    fn test_forbidden_is_disambiguated_by_message() {
        assert!(matches!(
            map_http_error(403, &body("Invalid login or password."), None),
            MwdbError::InvalidCredentials { .. }
        ));
        assert!(matches!(
            map_http_error(403, &body("Maintenance underway. Please come back later."), None),
            MwdbError::MaintenanceUnderway { .. }
        ));
        assert!(matches!(
            map_http_error(403, &body("User registration is pending"), None),
            MwdbError::UserPending { .. }
        ));
        assert!(matches!(
            map_http_error(403, &body("User account is disabled."), None),
            MwdbError::UserDisabled { .. }
        ));
        assert!(matches!(
            map_http_error(403, &body("You don't have permission"), None),
            MwdbError::PermissionDenied { .. }
        ));
    }

    #[test]
    fn test_not_found_is_disambiguated_by_message() {
        let endpoint = map_http_error(
            404,
            &body("The requested URL was not found on the server. If you entered the URL manually please check your spelling and try again."),
            None,
        );
        assert!(matches!(endpoint, MwdbError::EndpointNotFound { .. }));

        let object = map_http_error(404, &body("Object not found"), None);
        assert!(object.is_not_found());
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(map_http_error(400, b"{}", None), MwdbError::Validation { .. }));
        assert!(matches!(map_http_error(401, b"{}", None), MwdbError::NotAuthenticated { .. }));
        assert!(matches!(map_http_error(409, b"{}", None), MwdbError::TypeConflict { .. }));
        assert!(matches!(
            map_http_error(429, b"{}", Some(5)),
            MwdbError::LimitExceeded { retry_after: Some(5), .. }
        ));
        assert!(map_http_error(502, b"", None).is_downtime());
        assert!(map_http_error(504, b"", None).is_downtime());
        assert!(matches!(
            map_http_error(500, b"", None),
            MwdbError::Internal { status: 500, .. }
        ));
    }

    #[test]
    fn test_error_message_sources() {
        assert_eq!(error_message(400, &body("bad query")), "bad query");

        let errors = serde_json::json!({ "errors": { "tag": ["Missing data"] } }).to_string();
        assert_eq!(error_message(400, errors.as_bytes()), r#"{"tag":["Missing data"]}"#);

        assert_eq!(error_message(502, b"<html>"), "Bad Gateway");
    }

    #[test]
    fn test_found_swallows_only_not_found() {
        let missing: Result<u32> = Err(MwdbError::ObjectNotFound {
            message: "nope".into(),
        });
        assert!(missing.found().unwrap().is_none());

        let denied: Result<u32> = Err(MwdbError::PermissionDenied {
            message: "nope".into(),
        });
        assert!(denied.found().is_err());
    }
}
