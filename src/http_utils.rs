//! HTTP plumbing for the MWDB client.
//!
//! The session engine talks to the network only through the [`HttpBackend`]
//! trait and waits only through the [`Sleeper`] trait, so the retry logic can
//! be exercised without a server. [`ReqwestBackend`] is the production
//! implementation built on the blocking reqwest client.

use reqwest::blocking::{multipart, Client};
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use serde_json::Value;
use std::time::Duration;
use strum::Display;
use tracing::{debug, trace};
use url::Url;

pub const DEFAULT_USER_AGENT: &str = concat!("mwdb-rs/", env!("CARGO_PKG_VERSION"));

/// HTTP verbs used by the MWDB API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// POST is the only verb MWDB uses for non-idempotent writes
    pub fn is_idempotent(&self) -> bool {
        !matches!(self, Method::Post)
    }
}

/// One part of a multipart upload
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartField {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: mime::Mime,
    pub content: Vec<u8>,
}

impl MultipartField {
    pub fn file(name: &str, file_name: &str, content: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            file_name: Some(file_name.to_string()),
            content_type: mime::APPLICATION_OCTET_STREAM,
            content,
        }
    }

    pub fn json(name: &str, value: &Value) -> Self {
        Self {
            name: name.to_string(),
            file_name: None,
            content_type: mime::APPLICATION_JSON,
            content: value.to_string().into_bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(Vec<MultipartField>),
}

/// A fully resolved request handed to the backend
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub bearer_token: Option<String>,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    /// Path of the request URL relative to the given base, used for logging
    /// and by test doubles
    pub fn relative_path(&self, base: &Url) -> String {
        base.make_relative(&self.url)
            .unwrap_or_else(|| self.url.path().to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Value of the `Retry-After` header in seconds, if present and numeric
    pub retry_after: Option<u64>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure to obtain any HTTP response
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{0}")]
    Connection(String),
    #[error("failed to build request: {0}")]
    Request(String),
}

/// Executes a single HTTP exchange. Implementations must not retry.
pub trait HttpBackend: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocks the calling thread between retries
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Configuration of the underlying HTTP client
#[derive(Debug, Clone)]
pub struct HttpRequestConfig {
    pub verify_tls: bool,
    /// Socket timeout in seconds, `None` keeps the reqwest default
    pub timeout: Option<u64>,
    pub user_agent: String,
}

impl Default for HttpRequestConfig {
    fn default() -> Self {
        Self {
            verify_tls: true,
            timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// [`HttpBackend`] on top of `reqwest::blocking`
#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: Client,
}

impl ReqwestBackend {
    pub fn new(config: &HttpRequestConfig) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .danger_accept_invalid_certs(!config.verify_tls);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    fn multipart_form(fields: &[MultipartField]) -> Result<multipart::Form, TransportError> {
        let mut form = multipart::Form::new();
        for field in fields {
            let mut part = multipart::Part::bytes(field.content.clone())
                .mime_str(field.content_type.as_ref())
                .map_err(|e| TransportError::Request(e.to_string()))?;
            if let Some(file_name) = &field.file_name {
                part = part.file_name(file_name.clone());
            }
            form = form.part(field.name.clone(), part);
        }
        Ok(form)
    }
}

fn transport_error(error: reqwest::Error) -> TransportError {
    if error.is_builder() {
        TransportError::Request(error.to_string())
    } else {
        TransportError::Connection(error.to_string())
    }
}

impl HttpBackend for ReqwestBackend {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, request.url.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &request.bearer_token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(fields) => builder.multipart(Self::multipart_form(fields)?),
        };

        debug!("{} {}", request.method, request.url);
        let response = builder.send().map_err(transport_error)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());
        let body = response.bytes().map_err(transport_error)?.to_vec();

        trace!("Response status: {}", status);
        trace!("Raw response body: {}", String::from_utf8_lossy(&body));

        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_post_is_non_idempotent() {
        assert!(Method::Get.is_idempotent());
        assert!(Method::Put.is_idempotent());
        assert!(Method::Delete.is_idempotent());
        assert!(!Method::Post.is_idempotent());
    }

    #[test]
    fn test_method_display_is_uppercase() {
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_relative_path() {
        let base = Url::parse("https://mwdb.example/api/").unwrap();
        let request = HttpRequest {
            method: Method::Get,
            url: base.join("object/abc/tag").unwrap(),
            bearer_token: None,
            query: vec![],
            body: RequestBody::Empty,
        };
        assert_eq!(request.relative_path(&base), "object/abc/tag");
    }

    #[test]
    fn test_multipart_field_constructors() {
        let file = MultipartField::file("file", "sample.exe", vec![0x4d, 0x5a]);
        assert_eq!(file.file_name.as_deref(), Some("sample.exe"));
        assert_eq!(file.content_type, mime::APPLICATION_OCTET_STREAM);

        let options = MultipartField::json("options", &serde_json::json!({"tags": []}));
        assert_eq!(options.content, br#"{"tags":[]}"#.to_vec());
    }

    #[test]
    fn test_backend_builds_without_tls_verification() {
        let config = HttpRequestConfig {
            verify_tls: false,
            timeout: Some(5),
            ..Default::default()
        };
        assert!(ReqwestBackend::new(&config).is_ok());
    }
}
