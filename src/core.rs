//! High level entry point of the library.
//!
//! [`Mwdb`] wraps a shared [`ApiClient`] and offers lookups, listings,
//! searches, counters and uploads returning lazily loaded objects.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::api::{ApiClient, ApiClientOptions};
use crate::blob::MwdbBlob;
use crate::config::MwdbConfig;
use crate::error::{MwdbError, Result};
use crate::file::MwdbFile;
use crate::http_utils::MultipartField;
use crate::object::{MwdbObject, ObjectType};
use crate::upload::UploadOptions;

const SHA256_HEX_LENGTH: usize = 64;

#[derive(Debug, Clone)]
pub struct Mwdb {
    api: Arc<ApiClient>,
}

impl Mwdb {
    pub fn new(api: ApiClient) -> Self {
        Self { api: Arc::new(api) }
    }

    pub fn from_shared(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// Creates a client talking to the network with the given options
    pub fn connect(options: ApiClientOptions) -> Result<Self> {
        Ok(Self::new(ApiClient::new(options)?))
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn login(&self, username: &str, password: &str) -> Result<()> {
        self.api.authenticate_with_credentials(username, password)
    }

    pub fn login_with_api_key(&self, api_key: &str) -> Result<()> {
        self.api.authenticate_with_token(api_key)
    }

    pub fn logout(&self) {
        self.api.clear_session();
    }

    fn wrap<T: ObjectType>(&self, mut payload: Value) -> Result<T> {
        if let (Some(kind), Some(fields)) = (T::KIND, payload.as_object_mut()) {
            fields
                .entry("type")
                .or_insert_with(|| Value::String(kind.type_name().to_string()));
        }
        T::from_object(MwdbObject::create(self.api.clone(), payload)?)
    }

    /// Looks an object up by identifier on the endpoints of `T`
    pub fn query_typed<T: ObjectType>(&self, id: &str) -> Result<T> {
        let payload = self
            .api
            .get(format!("{}/{}", T::url_segment(), id))
            .send()?;
        self.wrap(payload)
    }

    /// Looks an object up by hash. Hashes other than sha256 can only
    /// identify files.
    pub fn query(&self, hash: &str) -> Result<MwdbObject> {
        if hash.len() != SHA256_HEX_LENGTH {
            return Ok(MwdbObject::File(self.query_file(hash)?));
        }
        self.query_typed::<MwdbObject>(hash)
    }

    /// Looks a file up by md5, sha1, sha256 or sha512
    pub fn query_file(&self, hash: &str) -> Result<MwdbFile> {
        self.query_typed(hash)
    }

    pub fn query_config(&self, hash: &str) -> Result<MwdbConfig> {
        self.query_typed(hash)
    }

    pub fn query_blob(&self, hash: &str) -> Result<MwdbBlob> {
        self.query_typed(hash)
    }

    /// Newest objects of type `T`, optionally filtered by a search query
    pub fn recent<T: ObjectType>(&self, query: Option<&str>) -> Recent<T> {
        Recent::new(self.api.clone(), query.map(str::to_string))
    }

    pub fn recent_objects(&self) -> Recent<MwdbObject> {
        self.recent(None)
    }

    pub fn recent_files(&self) -> Recent<MwdbFile> {
        self.recent(None)
    }

    pub fn recent_configs(&self) -> Recent<MwdbConfig> {
        self.recent(None)
    }

    pub fn recent_blobs(&self) -> Recent<MwdbBlob> {
        self.recent(None)
    }

    pub fn search_objects(&self, query: &str) -> Recent<MwdbObject> {
        self.recent(Some(query))
    }

    pub fn search_files(&self, query: &str) -> Recent<MwdbFile> {
        self.recent(Some(query))
    }

    pub fn search_configs(&self, query: &str) -> Recent<MwdbConfig> {
        self.recent(Some(query))
    }

    pub fn search_blobs(&self, query: &str) -> Recent<MwdbBlob> {
        self.recent(Some(query))
    }

    /// Number of objects of type `T` matching the query
    pub fn count<T: ObjectType>(&self, query: Option<&str>) -> Result<u64> {
        let response = self
            .api
            .get(format!("{}/count", T::url_segment()))
            .query_opt("query", query)
            .send()?;
        response
            .get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| MwdbError::BadResponse("count response without a count".to_string()))
    }

    pub fn count_objects(&self, query: Option<&str>) -> Result<u64> {
        self.count::<MwdbObject>(query)
    }

    pub fn count_files(&self, query: Option<&str>) -> Result<u64> {
        self.count::<MwdbFile>(query)
    }

    pub fn count_configs(&self, query: Option<&str>) -> Result<u64> {
        self.count::<MwdbConfig>(query)
    }

    pub fn count_blobs(&self, query: Option<&str>) -> Result<u64> {
        self.count::<MwdbBlob>(query)
    }

    pub fn upload_file(
        &self,
        name: &str,
        content: Vec<u8>,
        options: &UploadOptions,
    ) -> Result<MwdbFile> {
        let params = options.to_params(&self.api)?;
        let response = self
            .api
            .post("file")
            .multipart(vec![
                MultipartField::file("file", name, content),
                MultipartField::json("options", &Value::Object(params)),
            ])
            .send()?;
        self.wrap(response)
    }

    pub fn upload_config(
        &self,
        family: &str,
        cfg: Map<String, Value>,
        config_type: &str,
        options: &UploadOptions,
    ) -> Result<MwdbConfig> {
        let mut params = options.to_params(&self.api)?;
        params.insert("family".to_string(), json!(family));
        params.insert("cfg".to_string(), Value::Object(cfg));
        params.insert("config_type".to_string(), json!(config_type));
        let response = self.api.post("config").json(Value::Object(params)).send()?;
        self.wrap(response)
    }

    pub fn upload_blob(
        &self,
        name: &str,
        blob_type: &str,
        content: &str,
        options: &UploadOptions,
    ) -> Result<MwdbBlob> {
        let mut params = options.to_params(&self.api)?;
        params.insert("blob_name".to_string(), json!(name));
        params.insert("blob_type".to_string(), json!(blob_type));
        params.insert("content".to_string(), json!(content));
        let response = self.api.post("blob").json(Value::Object(params)).send()?;
        self.wrap(response)
    }

    /// Iterator over objects uploaded after `last`, oldest first.
    ///
    /// Without `last` the newest existing object is the starting point. In
    /// blocking mode the iterator polls the server every `interval` and never
    /// ends; otherwise it ends after the first poll.
    pub fn listen<T: ObjectType>(
        &self,
        last: Option<&str>,
        blocking: bool,
        interval: Duration,
        query: Option<&str>,
    ) -> Result<Listener<T>> {
        let pivot = match last {
            Some(id) => Some(self.query_typed::<T>(id)?),
            None => self.recent::<T>(query).next().transpose()?,
        };
        let pivot = match pivot {
            Some(mut object) => Some(Pivot {
                id: object.id().to_string(),
                upload_time: object.upload_time()?,
            }),
            None => None,
        };

        Ok(Listener {
            api: self.api.clone(),
            query: query.map(str::to_string),
            pivot,
            blocking,
            interval,
            polled: false,
            pending: VecDeque::new(),
            done: false,
        })
    }

    pub fn listen_for_objects(
        &self,
        last: Option<&str>,
        blocking: bool,
        interval: Duration,
    ) -> Result<Listener<MwdbObject>> {
        self.listen(last, blocking, interval, None)
    }

    pub fn listen_for_files(
        &self,
        last: Option<&str>,
        blocking: bool,
        interval: Duration,
    ) -> Result<Listener<MwdbFile>> {
        self.listen(last, blocking, interval, None)
    }

    pub fn listen_for_configs(
        &self,
        last: Option<&str>,
        blocking: bool,
        interval: Duration,
    ) -> Result<Listener<MwdbConfig>> {
        self.listen(last, blocking, interval, None)
    }

    pub fn listen_for_blobs(
        &self,
        last: Option<&str>,
        blocking: bool,
        interval: Duration,
    ) -> Result<Listener<MwdbBlob>> {
        self.listen(last, blocking, interval, None)
    }
}

pub const DEFAULT_LISTEN_INTERVAL: Duration = Duration::from_secs(15);

/// Paginated listing of objects, newest first.
///
/// Pages are requested lazily with the `older_than` cursor; iteration stops
/// at the first empty page.
pub struct Recent<T> {
    api: Arc<ApiClient>,
    query: Option<String>,
    older_than: Option<String>,
    page: VecDeque<Value>,
    exhausted: bool,
    kind: PhantomData<T>,
}

impl<T: ObjectType> Recent<T> {
    fn new(api: Arc<ApiClient>, query: Option<String>) -> Self {
        Self {
            api,
            query,
            older_than: None,
            page: VecDeque::new(),
            exhausted: false,
            kind: PhantomData,
        }
    }

    /// Fetches the next page, returns false when there is none
    fn fetch_page(&mut self) -> Result<bool> {
        let segment = T::url_segment();
        let response = self
            .api
            .get(segment)
            .query_opt("older_than", self.older_than.as_deref())
            .query_opt("query", self.query.as_deref())
            .send();

        let mut response = match response {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        };

        let key = format!("{}s", segment);
        let items = match response.get_mut(&key).map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(MwdbError::BadResponse(format!(
                    "listing response does not contain '{}'",
                    key
                )))
            }
        };
        debug!("Fetched {} {} older than {:?}", items.len(), key, self.older_than);

        if let Some(last) = items.last() {
            let id = last.get("id").and_then(Value::as_str).ok_or_else(|| {
                MwdbError::BadResponse(format!("listed {} entry without an id", segment))
            })?;
            self.older_than = Some(id.to_string());
        }
        self.page.extend(items);
        Ok(!self.page.is_empty())
    }

    fn wrap(&self, mut payload: Value) -> Result<T> {
        if let (Some(kind), Some(fields)) = (T::KIND, payload.as_object_mut()) {
            fields
                .entry("type")
                .or_insert_with(|| Value::String(kind.type_name().to_string()));
        }
        T::from_object(MwdbObject::create(self.api.clone(), payload)?)
    }
}

impl<T: ObjectType> Iterator for Recent<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.page.is_empty() && !self.exhausted {
            match self.fetch_page() {
                Ok(true) => {}
                Ok(false) => self.exhausted = true,
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
        self.page.pop_front().map(|payload| self.wrap(payload))
    }
}

struct Pivot {
    id: String,
    upload_time: DateTime<Utc>,
}

/// Iterator returned by [`Mwdb::listen`]
pub struct Listener<T> {
    api: Arc<ApiClient>,
    query: Option<String>,
    pivot: Option<Pivot>,
    blocking: bool,
    interval: Duration,
    polled: bool,
    pending: VecDeque<T>,
    done: bool,
}

impl<T: ObjectType> Listener<T> {
    /// Objects newer than the pivot, oldest first
    fn poll(&mut self) -> Result<()> {
        let mut fresh = Vec::new();
        for object in Recent::<T>::new(self.api.clone(), self.query.clone()) {
            let mut object = object?;
            if let Some(pivot) = &self.pivot {
                if object.id() == pivot.id {
                    break;
                }
                let upload_time = object.upload_time()?;
                if upload_time < pivot.upload_time {
                    return Err(MwdbError::BadResponse(format!(
                        "newly fetched object {} is older than the pivot {}",
                        object.id(),
                        pivot.id
                    )));
                }
            }
            fresh.push(object);
        }

        if let Some(newest) = fresh.first_mut() {
            self.pivot = Some(Pivot {
                id: newest.id().to_string(),
                upload_time: newest.upload_time()?,
            });
        }
        self.pending.extend(fresh.into_iter().rev());
        Ok(())
    }
}

impl<T: ObjectType> Iterator for Listener<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(object) = self.pending.pop_front() {
                return Some(Ok(object));
            }
            if self.done {
                return None;
            }
            if self.polled {
                if !self.blocking {
                    self.done = true;
                    return None;
                }
                self.api.sleep(self.interval);
            }
            self.polled = true;
            if let Err(e) = self.poll() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}
