//! Authenticated request engine for the MWDB REST API.
//!
//! [`ApiClient`] owns the session (bearer token and remembered credentials)
//! and the retry policy. Every request goes through [`ApiClient::dispatch`],
//! which transparently
//!
//! * logs in again when the server reports an expired session and the client
//!   remembers the credentials used to open it,
//! * waits out rate limiting according to the `Retry-After` header,
//! * retries connection failures and gateway errors when asked to.
//!
//! The client is shared between entities behind an `Arc` and can be used from
//! several threads; the session is guarded by a mutex and re-authentication is
//! serialized so that concurrent 401 responses result in a single login.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, trace, warn};
use url::Url;

use crate::auth::AuthToken;
use crate::error::{map_http_error, MwdbError, Result};
use crate::http_utils::{
    HttpBackend, HttpRequest, HttpRequestConfig, HttpResponse, Method, MultipartField,
    ReqwestBackend, RequestBody, Sleeper, ThreadSleeper, TransportError,
};
use crate::version::{Feature, ServerVersion, Strategy};

pub const DEFAULT_API_URL: &str = "https://mwdb.cert.pl/api/";

/// Wait time used when a 429 response carries no usable `Retry-After` header
pub const DEFAULT_RETRY_AFTER: u64 = 60;

/// How the client reacts to transient failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Sleep and retry on 429 instead of failing
    pub obey_rate_limit: bool,
    /// Retry on connection errors and 502/504 responses
    pub retry_on_downtime: bool,
    pub max_downtime_retries: u32,
    /// Seconds to wait between downtime retries
    pub downtime_timeout: u64,
    /// When false, POST requests are never retried on downtime
    pub retry_idempotent: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            obey_rate_limit: true,
            retry_on_downtime: false,
            max_downtime_retries: 5,
            downtime_timeout: 10,
            retry_idempotent: true,
        }
    }
}

/// Construction time options of [`ApiClient`]
#[derive(Debug, Clone, PartialEq)]
pub struct ApiClientOptions {
    pub api_url: String,
    pub verify_tls: bool,
    /// HTTP socket timeout in seconds
    pub timeout: Option<u64>,
    pub retry: RetryPolicy,
}

impl Default for ApiClientOptions {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            verify_tls: true,
            timeout: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// Parses the API URL and makes sure it ends with a slash, so that relative
/// endpoints are joined below it.
pub fn normalize_api_url(api_url: &str) -> Result<Url> {
    let mut api_url = api_url.trim().to_string();
    if !api_url.ends_with('/') {
        api_url.push('/');
    }
    let url = Url::parse(&api_url)?;
    if !url.path().ends_with("/api/") {
        warn!(
            "API URL {} does not end with /api/, requests will probably fail",
            url
        );
    }
    Ok(url)
}

/// Information published by the server on the unauthenticated `server` endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMetadata {
    pub server_version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenSource {
    Login,
    ApiKey,
}

#[derive(Default)]
struct Session {
    token: Option<AuthToken>,
    source: Option<TokenSource>,
    credentials: Option<Credentials>,
    /// Bumped on every token change so a re-login can tell whether another
    /// thread already replaced the token it saw rejected
    generation: u64,
}

impl Session {
    fn can_relogin(&self) -> bool {
        self.source == Some(TokenSource::Login) && self.credentials.is_some()
    }

    fn replace_token(&mut self, token: Option<AuthToken>, source: Option<TokenSource>) {
        self.token = token;
        self.source = source;
        self.generation += 1;
    }
}

/// A request relative to the API base URL
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: String,
    pub require_auth: bool,
    /// Return the body as bytes instead of parsing it as JSON
    pub raw: bool,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            require_auth: true,
            raw: false,
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }
}

/// Successful response of [`ApiClient::dispatch`]
#[derive(Debug, Clone, PartialEq)]
pub enum ApiPayload {
    Json(Value),
    Raw(Vec<u8>),
}

impl ApiPayload {
    pub fn into_json(self) -> Result<Value> {
        match self {
            ApiPayload::Json(value) => Ok(value),
            ApiPayload::Raw(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| MwdbError::BadResponse(e.to_string())),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            ApiPayload::Json(value) => value.to_string().into_bytes(),
            ApiPayload::Raw(bytes) => bytes,
        }
    }
}

/// Fluent request construction returned by the verb methods of [`ApiClient`]
pub struct ApiRequestBuilder<'a> {
    client: &'a ApiClient,
    request: ApiRequest,
}

impl<'a> ApiRequestBuilder<'a> {
    /// Send the request without the `Authorization` header
    pub fn noauth(mut self) -> Self {
        self.request.require_auth = false;
        self
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.request.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    pub fn json(mut self, body: Value) -> Self {
        self.request.body = RequestBody::Json(body);
        self
    }

    pub fn multipart(mut self, fields: Vec<MultipartField>) -> Self {
        self.request.body = RequestBody::Multipart(fields);
        self
    }

    pub fn request(&self) -> &ApiRequest {
        &self.request
    }

    /// Dispatch and parse the response as JSON
    pub fn send(self) -> Result<Value> {
        self.client.dispatch(&self.request)?.into_json()
    }

    /// Dispatch and return the raw response body
    pub fn send_raw(mut self) -> Result<Vec<u8>> {
        self.request.raw = true;
        Ok(self.client.dispatch(&self.request)?.into_bytes())
    }
}

/// Session and transport engine of the MWDB client
pub struct ApiClient {
    base_url: Url,
    retry: RetryPolicy,
    backend: Box<dyn HttpBackend>,
    sleeper: Box<dyn Sleeper>,
    session: Mutex<Session>,
    relogin_lock: Mutex<()>,
    server_metadata: Mutex<Option<ServerMetadata>>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates a client talking to the network through reqwest
    pub fn new(options: ApiClientOptions) -> Result<Self> {
        let backend = ReqwestBackend::new(&HttpRequestConfig {
            verify_tls: options.verify_tls,
            timeout: options.timeout,
            ..Default::default()
        })?;
        Self::with_backend(options, backend, ThreadSleeper)
    }

    /// Creates a client on top of any HTTP backend and sleeper
    pub fn with_backend(
        options: ApiClientOptions,
        backend: impl HttpBackend + 'static,
        sleeper: impl Sleeper + 'static,
    ) -> Result<Self> {
        Ok(Self {
            base_url: normalize_api_url(&options.api_url)?,
            retry: options.retry,
            backend: Box::new(backend),
            sleeper: Box::new(sleeper),
            session: Mutex::new(Session::default()),
            relogin_lock: Mutex::new(()),
            server_metadata: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cached_metadata(&self) -> MutexGuard<'_, Option<ServerMetadata>> {
        self.server_metadata
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Exchanges credentials for a session token.
    ///
    /// The credentials are remembered so the session can be re-opened when the
    /// server reports it as expired.
    pub fn authenticate_with_credentials(&self, username: &str, password: &str) -> Result<()> {
        debug!("Logging in as {}", username);
        let response = self
            .post("auth/login")
            .noauth()
            .json(json!({ "login": username, "password": password }))
            .send()?;

        let token = response
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                MwdbError::BadResponse("login response does not contain a token".to_string())
            })?;
        let token = AuthToken::parse(token)?;

        let mut session = self.session();
        session.credentials = Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        });
        session.replace_token(Some(token), Some(TokenSource::Login));
        Ok(())
    }

    /// Uses a pre-issued token (API key). Only its structure is checked here;
    /// whether the server accepts it is discovered on the first request.
    pub fn authenticate_with_token(&self, token: &str) -> Result<()> {
        let token = AuthToken::parse(token)?;
        self.session()
            .replace_token(Some(token), Some(TokenSource::ApiKey));
        Ok(())
    }

    /// Drops the current token, remembered credentials are kept
    pub fn clear_session(&self) {
        self.session().replace_token(None, None);
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().token.is_some()
    }

    /// Login of the user owning the current token
    pub fn logged_in_user(&self) -> Option<String> {
        self.session()
            .token
            .as_ref()
            .and_then(|token| token.username().map(str::to_string))
    }

    /// Server metadata, fetched once per client
    pub fn server_metadata(&self) -> Result<ServerMetadata> {
        if let Some(metadata) = self.cached_metadata().clone() {
            return Ok(metadata);
        }
        let response = self.get("server").noauth().send()?;
        let metadata: ServerMetadata = serde_json::from_value(response)
            .map_err(|e| MwdbError::BadResponse(format!("invalid server metadata: {}", e)))?;
        *self.cached_metadata() = Some(metadata.clone());
        Ok(metadata)
    }

    pub fn server_version(&self) -> Result<ServerVersion> {
        self.server_metadata()?.server_version.parse()
    }

    fn cached_server_version(&self) -> Option<ServerVersion> {
        self.cached_metadata()
            .as_ref()
            .and_then(|metadata| metadata.server_version.parse().ok())
    }

    pub fn get(&self, endpoint: impl Into<String>) -> ApiRequestBuilder<'_> {
        self.request(Method::Get, endpoint)
    }

    pub fn post(&self, endpoint: impl Into<String>) -> ApiRequestBuilder<'_> {
        self.request(Method::Post, endpoint)
    }

    pub fn put(&self, endpoint: impl Into<String>) -> ApiRequestBuilder<'_> {
        self.request(Method::Put, endpoint)
    }

    pub fn delete(&self, endpoint: impl Into<String>) -> ApiRequestBuilder<'_> {
        self.request(Method::Delete, endpoint)
    }

    pub fn request(&self, method: Method, endpoint: impl Into<String>) -> ApiRequestBuilder<'_> {
        ApiRequestBuilder {
            client: self,
            request: ApiRequest::new(method, endpoint),
        }
    }

    pub(crate) fn sleep(&self, duration: Duration) {
        self.sleeper.sleep(duration);
    }

    /// Sends a request, handling re-authentication, rate limiting and
    /// downtime according to the retry policy.
    pub fn dispatch(&self, request: &ApiRequest) -> Result<ApiPayload> {
        let url = self
            .base_url
            .join(request.endpoint.trim_start_matches('/'))?;
        let mut downtime_retries = self.retry.max_downtime_retries;

        loop {
            let (bearer_token, generation) = if request.require_auth {
                let (token, generation) = self.current_token()?;
                (Some(token), generation)
            } else {
                (None, 0)
            };

            let http_request = HttpRequest {
                method: request.method,
                url: url.clone(),
                bearer_token,
                query: request.query.clone(),
                body: request.body.clone(),
            };
            trace!("Dispatching {} {}", request.method, request.endpoint);

            let error = match self.backend.execute(&http_request) {
                Ok(response) if response.is_success() => {
                    return decode_response(&url, response, request.raw)
                }
                Ok(response) => map_http_error(response.status, &response.body, response.retry_after),
                Err(TransportError::Connection(message)) => MwdbError::Connection(message),
                Err(TransportError::Request(message)) => return Err(MwdbError::Request(message)),
            };

            match error {
                MwdbError::NotAuthenticated { .. } if request.require_auth => {
                    self.recover_session(generation, error)?;
                }
                MwdbError::LimitExceeded { retry_after, .. } if self.retry.obey_rate_limit => {
                    let wait = retry_after.unwrap_or(DEFAULT_RETRY_AFTER);
                    warn!(
                        "Rate limit exceeded on {} {}, retrying in {} seconds",
                        request.method, request.endpoint, wait
                    );
                    self.sleeper.sleep(Duration::from_secs(wait));
                }
                error
                    if error.is_downtime()
                        && self.may_retry_downtime(request.method, downtime_retries) =>
                {
                    downtime_retries -= 1;
                    warn!(
                        "{} on {} {}, retrying in {} seconds ({} retries left)",
                        error,
                        request.method,
                        request.endpoint,
                        self.retry.downtime_timeout,
                        downtime_retries
                    );
                    self.sleeper
                        .sleep(Duration::from_secs(self.retry.downtime_timeout));
                }
                error => return Err(error),
            }
        }
    }

    fn may_retry_downtime(&self, method: Method, retries_left: u32) -> bool {
        self.retry.retry_on_downtime
            && retries_left > 0
            && (self.retry.retry_idempotent || method.is_idempotent())
    }

    /// Token to send with an authenticated request, re-opening an expired
    /// session when the credentials are known.
    fn current_token(&self) -> Result<(String, u64)> {
        let generation = {
            let session = self.session();
            match &session.token {
                None => {
                    return Err(MwdbError::not_authenticated(
                        "authentication required, log in or provide an API key first",
                    ))
                }
                Some(token) if !token.is_expired() => {
                    return Ok((token.as_str().to_string(), session.generation))
                }
                Some(_) if !session.can_relogin() => {
                    return Err(MwdbError::not_authenticated("authentication token expired"))
                }
                Some(_) => session.generation,
            }
        };

        debug!("Session token expired, logging in again");
        self.relogin(generation)?;

        let session = self.session();
        match &session.token {
            Some(token) if !token.is_expired() => {
                Ok((token.as_str().to_string(), session.generation))
            }
            _ => Err(MwdbError::not_authenticated("authentication token expired")),
        }
    }

    /// Reaction to a 401 response received with the token of `generation`
    fn recover_session(&self, generation: u64, error: MwdbError) -> Result<()> {
        let (source, has_credentials) = {
            let session = self.session();
            (session.source, session.credentials.is_some())
        };

        match source {
            Some(TokenSource::ApiKey) => {
                warn!("The API key was rejected by the server");
                Err(error)
            }
            _ if !has_credentials => {
                self.clear_session();
                Err(error)
            }
            _ => {
                debug!("Session was rejected by the server, logging in again");
                self.relogin(generation)
            }
        }
    }

    fn relogin(&self, seen_generation: u64) -> Result<()> {
        let _guard = self
            .relogin_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let credentials = {
            let mut session = self.session();
            if session.generation != seen_generation {
                // The token was replaced while we were waiting for the lock
                return Ok(());
            }
            session.replace_token(None, None);
            session.credentials.clone()
        };

        match credentials {
            Some(credentials) => {
                self.authenticate_with_credentials(&credentials.username, &credentials.password)
            }
            None => Err(MwdbError::not_authenticated("no credentials to log in again")),
        }
    }

    /// Runs a version-gated operation.
    ///
    /// The current implementation is tried first unless the server is already
    /// known to be too old for it. An `EndpointNotFound` answer makes the
    /// client look up the server version and fall back to the legacy
    /// implementation when the version calls for it.
    pub fn run_versioned<T>(
        &self,
        feature: Feature,
        mut operation: impl FnMut(Strategy) -> Result<T>,
    ) -> Result<T> {
        let gate = feature.gate();

        let version = match self.cached_server_version() {
            Some(version) if !gate.supports_current(&version) => version,
            _ => match operation(Strategy::Current) {
                Err(error @ MwdbError::EndpointNotFound { .. }) => {
                    let version = self.server_version()?;
                    if gate.supports_current(&version) {
                        return Err(error);
                    }
                    version
                }
                result => return result,
            },
        };

        if gate.supports_legacy(&version) {
            debug!("Using legacy {} API for MWDB {}", feature, version);
            return operation(Strategy::Legacy);
        }

        Err(MwdbError::VersionMismatch {
            feature: feature.to_string(),
            required: gate.minimum(),
            actual: version.to_string(),
        })
    }
}

fn decode_response(url: &Url, response: HttpResponse, raw: bool) -> Result<ApiPayload> {
    if raw {
        return Ok(ApiPayload::Raw(response.body));
    }
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ApiPayload::Json(Value::Null));
    }
    serde_json::from_slice(&response.body)
        .map(ApiPayload::Json)
        .map_err(|_| {
            MwdbError::BadResponse(format!(
                "{} did not return JSON, make sure the API URL points to the MWDB API and not to the web interface",
                url
            ))
        })
}
