//! Scripted HTTP backend shared by the integration tests.
#![allow(dead_code)]

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use mwdb::api::{ApiClient, ApiClientOptions, RetryPolicy};
use mwdb::http_utils::{HttpBackend, HttpRequest, HttpResponse, Method, Sleeper, TransportError};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const API_URL: &str = "https://mwdb.test/api/";

/// Token valid until 2100
pub fn token(login: &str) -> String {
    token_expiring(login, 4102444800)
}

pub fn token_expiring(login: &str, exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(json!({"alg": "HS512", "typ": "JWT"}).to_string());
    let payload = URL_SAFE_NO_PAD.encode(json!({"login": login, "exp": exp}).to_string());
    format!("{}.{}.c2lnbmF0dXJl", header, payload)
}

enum Reply {
    Response(HttpResponse),
    Connection,
}

struct Expectation {
    method: Method,
    path: String,
    reply: Reply,
}

#[derive(Default)]
struct MockState {
    script: VecDeque<Expectation>,
    requests: Vec<HttpRequest>,
}

/// Replies to requests in the scripted order and panics on anything else
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    fn push(&self, method: Method, path: &str, reply: Reply) -> &Self {
        self.state.lock().unwrap().script.push_back(Expectation {
            method,
            path: path.to_string(),
            reply,
        });
        self
    }

    pub fn reply(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        self.reply_raw(method, path, status, body.to_string().as_bytes())
    }

    pub fn reply_raw(&self, method: Method, path: &str, status: u16, body: &[u8]) -> &Self {
        self.push(
            method,
            path,
            Reply::Response(HttpResponse {
                status,
                retry_after: None,
                body: body.to_vec(),
            }),
        )
    }

    pub fn fail(&self, method: Method, path: &str, status: u16, message: &str) -> &Self {
        self.reply(method, path, status, json!({ "message": message }))
    }

    pub fn rate_limit(&self, method: Method, path: &str, retry_after: Option<u64>) -> &Self {
        self.push(
            method,
            path,
            Reply::Response(HttpResponse {
                status: 429,
                retry_after,
                body: json!({"message": "Rate limit exceeded"}).to_string().into_bytes(),
            }),
        )
    }

    pub fn connection_error(&self, method: Method, path: &str) -> &Self {
        self.push(method, path, Reply::Connection)
    }

    /// Server metadata answer used by the version fallback
    pub fn server_version(&self, version: &str) -> &Self {
        self.reply(
            Method::Get,
            "server",
            200,
            json!({ "server_version": version, "is_authenticated": true }),
        )
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Requests as `METHOD path`
    pub fn calls(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|request| format!("{} {}", request.method, relative_path(request)))
            .collect()
    }

    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().script.len()
    }
}

fn relative_path(request: &HttpRequest) -> String {
    request
        .url
        .path()
        .trim_start_matches("/api/")
        .to_string()
}

impl HttpBackend for MockBackend {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());
        let path = relative_path(request);
        let expectation = match state.script.pop_front() {
            Some(expectation) => expectation,
            None => {
                drop(state);
                panic!("unexpected request {} {}", request.method, path);
            }
        };
        if expectation.method != request.method || expectation.path != path {
            drop(state);
            panic!(
                "expected {} {}, got {} {}",
                expectation.method, expectation.path, request.method, path
            );
        }
        match expectation.reply {
            Reply::Response(response) => Ok(response),
            Reply::Connection => Err(TransportError::Connection("connection refused".to_string())),
        }
    }
}

/// Records requested sleeps instead of sleeping
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

pub fn client_with_policy(
    backend: &MockBackend,
    sleeper: &RecordingSleeper,
    retry: RetryPolicy,
) -> Arc<ApiClient> {
    let options = ApiClientOptions {
        api_url: API_URL.to_string(),
        retry,
        ..Default::default()
    };
    Arc::new(ApiClient::with_backend(options, backend.clone(), sleeper.clone()).unwrap())
}

/// Client authenticated with a non-expiring API key
pub fn api_key_client(backend: &MockBackend, sleeper: &RecordingSleeper) -> Arc<ApiClient> {
    let api = client_with_policy(backend, sleeper, RetryPolicy::default());
    api.authenticate_with_token(&token("analyst")).unwrap();
    api
}

pub fn sha256(seed: char) -> String {
    std::iter::repeat(seed).take(64).collect()
}

pub fn file_payload(id: &str, upload_time: &str) -> Value {
    json!({
        "id": id,
        "type": "file",
        "sha256": id,
        "file_name": format!("{}.bin", &id[..8]),
        "file_size": 1024,
        "upload_time": upload_time,
    })
}
