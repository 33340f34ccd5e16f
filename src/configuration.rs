//! Persistent settings of the command line client.
//!
//! The configuration lives in `config.yml` inside the `mwdb` directory of the
//! platform configuration folder, or inside `$MWDB_CONFIG_DIR` when set.
//! Global client options can be overridden per MWDB instance, and each
//! instance remembers the user that logged in. Secrets go to the system
//! keyring unless `use_keyring` is switched off.

use crate::{
    api::{ApiClientOptions, RetryPolicy, DEFAULT_API_URL},
    format::{Formattable, FormattingError, OutputFormat},
    keyring::{Keyring, KeyringError, SecretKind},
};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::debug;

pub const DEFAULT_APPLICATION_ID: &str = "mwdb";
pub const DEFAULT_CONFIGURATION_FILE_NAME: &str = "config.yml";
pub const CONFIGURATION_DIRECTORY_ENV: &str = "MWDB_CONFIG_DIR";

const MASKED_SECRET: &str = "********";

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("failed to resolve the configuration directory")]
    FailedToFindConfigurationDirectory,
    #[error("failed to load configuration data, because of: {cause}")]
    FailedToLoadData { cause: Box<dyn std::error::Error> },
    #[error("failed to write configuration data to file, because of: {cause}")]
    FailedToWriteData { cause: Box<dyn std::error::Error> },
    #[error("missing value for property {name:?}")]
    MissingRequiredPropertyValue { name: String },
    #[error("{0}")]
    Keyring(#[from] KeyringError),
}

/// Settings specific to one MWDB instance, keyed by its API URL
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Plaintext API key, only used when the keyring is disabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Plaintext password, only used when the keyring is disabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_tls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
}

impl InstanceConfiguration {
    fn is_empty(&self) -> bool {
        self == &InstanceConfiguration::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Secret {
    ApiKey(String),
    Password(String),
}

impl Secret {
    fn kind(&self) -> SecretKind {
        match self {
            Secret::ApiKey(_) => SecretKind::ApiKey,
            Secret::Password(_) => SecretKind::Password,
        }
    }

    fn value(&self) -> &str {
        match self {
            Secret::ApiKey(value) | Secret::Password(value) => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredentials {
    pub username: String,
    pub secret: Secret,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    api_url: String,
    verify_tls: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<u64>,
    use_keyring: bool,
    retry: RetryPolicy,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    instances: BTreeMap<String, InstanceConfiguration>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            verify_tls: true,
            timeout: None,
            use_keyring: true,
            retry: RetryPolicy::default(),
            instances: BTreeMap::new(),
        }
    }
}

/// Canonical form of an API URL used as the instance key
pub fn instance_key(api_url: &str) -> String {
    let mut key = api_url.trim().to_string();
    if !key.ends_with('/') {
        key.push('/');
    }
    key
}

impl Configuration {
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn set_api_url(&mut self, api_url: &str) {
        self.api_url = instance_key(api_url);
    }

    pub fn use_keyring(&self) -> bool {
        self.use_keyring
    }

    pub fn set_use_keyring(&mut self, use_keyring: bool) {
        self.use_keyring = use_keyring;
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn instance(&self, api_url: &str) -> Option<&InstanceConfiguration> {
        self.instances.get(&instance_key(api_url))
    }

    pub fn instance_mut(&mut self, api_url: &str) -> &mut InstanceConfiguration {
        self.instances.entry(instance_key(api_url)).or_default()
    }

    /// Client options for the given instance, or for the configured default
    /// instance, with the per-instance overrides applied
    pub fn client_options(&self, api_url: Option<&str>) -> ApiClientOptions {
        let api_url = instance_key(api_url.unwrap_or(&self.api_url));
        let instance = self.instance(&api_url);

        ApiClientOptions {
            verify_tls: instance
                .and_then(|instance| instance.verify_tls)
                .unwrap_or(self.verify_tls),
            timeout: self.timeout,
            retry: instance
                .and_then(|instance| instance.retry.clone())
                .unwrap_or_else(|| self.retry.clone()),
            api_url,
        }
    }

    /// Remembers the user of an instance together with its secret
    pub fn store_credentials(
        &mut self,
        keyring: &Keyring,
        api_url: &str,
        username: &str,
        secret: Secret,
    ) -> Result<(), ConfigurationError> {
        let key = instance_key(api_url);
        if self.use_keyring {
            keyring.put(secret.kind(), &key, username, secret.value())?;
        }

        let use_keyring = self.use_keyring;
        let instance = self.instance_mut(&key);
        instance.username = Some(username.to_string());
        instance.api_key = None;
        instance.password = None;
        if !use_keyring {
            match secret {
                Secret::ApiKey(value) => instance.api_key = Some(value),
                Secret::Password(value) => instance.password = Some(value),
            }
        }
        Ok(())
    }

    /// Credentials remembered for an instance; API keys win over passwords
    pub fn stored_credentials(
        &self,
        keyring: &Keyring,
        api_url: &str,
    ) -> Result<Option<StoredCredentials>, ConfigurationError> {
        let key = instance_key(api_url);
        let instance = match self.instance(&key) {
            Some(instance) => instance,
            None => return Ok(None),
        };
        let username = match &instance.username {
            Some(username) => username.clone(),
            None => return Ok(None),
        };

        let secret = if self.use_keyring {
            match keyring.get(SecretKind::ApiKey, &key, &username)? {
                Some(api_key) => Some(Secret::ApiKey(api_key)),
                None => keyring
                    .get(SecretKind::Password, &key, &username)?
                    .map(Secret::Password),
            }
        } else {
            instance
                .api_key
                .clone()
                .map(Secret::ApiKey)
                .or_else(|| instance.password.clone().map(Secret::Password))
        };

        Ok(secret.map(|secret| StoredCredentials { username, secret }))
    }

    /// Forgets the user and secrets of an instance
    pub fn clear_credentials(
        &mut self,
        keyring: &Keyring,
        api_url: &str,
    ) -> Result<(), ConfigurationError> {
        let key = instance_key(api_url);
        let username = self
            .instance(&key)
            .and_then(|instance| instance.username.clone());

        if let (Some(username), true) = (&username, self.use_keyring) {
            keyring.delete(SecretKind::ApiKey, &key, username)?;
            keyring.delete(SecretKind::Password, &key, username)?;
        }

        if let Some(instance) = self.instances.get_mut(&key) {
            instance.username = None;
            instance.api_key = None;
            instance.password = None;
            if instance.is_empty() {
                self.instances.remove(&key);
            }
        }
        Ok(())
    }

    pub fn get_default_configuration_file_path() -> Result<PathBuf, ConfigurationError> {
        if let Ok(config_dir_str) = std::env::var(CONFIGURATION_DIRECTORY_ENV) {
            let mut config_path = PathBuf::from(config_dir_str);
            config_path.push(DEFAULT_CONFIGURATION_FILE_NAME);
            return Ok(config_path);
        }

        match config_dir() {
            Some(mut path) => {
                path.push(DEFAULT_APPLICATION_ID);
                path.push(DEFAULT_CONFIGURATION_FILE_NAME);
                Ok(path)
            }
            None => Err(ConfigurationError::FailedToFindConfigurationDirectory),
        }
    }

    pub fn load_default() -> Result<Configuration, ConfigurationError> {
        let path = Configuration::get_default_configuration_file_path()?;
        Configuration::load_from_file(path)
    }

    /// Loads the configuration at `path`, writing the defaults there when the
    /// file does not exist yet
    pub fn load_or_create(path: &Path) -> Result<Configuration, ConfigurationError> {
        debug!("Loading or creating configuration from {}...", path.display());
        if path.exists() {
            return Configuration::load_from_file(path.to_path_buf());
        }

        debug!("Configuration file not found, creating default configuration");
        let configuration = Configuration::default();
        configuration.save(path)?;
        Ok(configuration)
    }

    pub fn load_or_create_default() -> Result<Configuration, ConfigurationError> {
        Configuration::load_or_create(&Configuration::get_default_configuration_file_path()?)
    }

    pub fn load_from_file(path: PathBuf) -> Result<Configuration, ConfigurationError> {
        debug!("Loading configuration from {}...", path.display());
        let content = fs::read_to_string(&path)
            .map_err(|cause| ConfigurationError::FailedToLoadData { cause: Box::new(cause) })?;
        serde_yaml::from_str(&content)
            .map_err(|cause| ConfigurationError::FailedToLoadData { cause: Box::new(cause) })
    }

    pub fn write(&self, writer: Box<dyn Write>) -> Result<(), ConfigurationError> {
        serde_yaml::to_writer(writer, self)
            .map_err(|e| ConfigurationError::FailedToWriteData { cause: Box::new(e) })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigurationError> {
        // create the parent directory if it is not there yet
        match path.parent() {
            Some(directory) => fs::create_dir_all(directory)
                .map_err(|_| ConfigurationError::FailedToFindConfigurationDirectory)?,
            None => return Err(ConfigurationError::FailedToFindConfigurationDirectory),
        }

        let file = File::create(path)
            .map_err(|e| ConfigurationError::FailedToWriteData { cause: Box::new(e) })?;
        self.write(Box::new(file))
    }

    pub fn save_to_default(&self) -> Result<(), ConfigurationError> {
        self.save(&Self::get_default_configuration_file_path()?)
    }

    /// Copy that is safe to display
    fn masked(&self) -> Configuration {
        let mut masked = self.clone();
        for instance in masked.instances.values_mut() {
            if instance.api_key.is_some() {
                instance.api_key = Some(MASKED_SECRET.to_string());
            }
            if instance.password.is_some() {
                instance.password = Some(MASKED_SECRET.to_string());
            }
        }
        masked
    }
}

impl Formattable for Configuration {
    fn format(&self, f: &OutputFormat) -> Result<String, FormattingError> {
        match f {
            OutputFormat::Json(options) => {
                let masked = self.masked();
                if options.pretty {
                    Ok(serde_json::to_string_pretty(&masked)?)
                } else {
                    Ok(serde_json::to_string(&masked)?)
                }
            }
            OutputFormat::Csv(options) => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                if options.with_headers {
                    wtr.write_record(["API_URL", "USERNAME", "VERIFY_TLS", "USE_KEYRING"])?;
                }
                let default_key = instance_key(&self.api_url);
                let mut urls: Vec<&String> = self.instances.keys().collect();
                if !self.instances.contains_key(&default_key) {
                    urls.insert(0, &default_key);
                }
                for url in urls {
                    let options = self.client_options(Some(url));
                    let username = self
                        .instance(url)
                        .and_then(|instance| instance.username.clone())
                        .unwrap_or_default();
                    wtr.serialize((url, username, options.verify_tls, self.use_keyring))?;
                }
                Ok(String::from_utf8(wtr.into_inner()?)?)
            }
            OutputFormat::Tree(_) => Err(FormattingError::UnsupportedOutputFormat(f.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::OutputFormatOptions;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_round_trip() {
        let directory = tempdir().unwrap();
        let path = directory.path().join("nested").join(DEFAULT_CONFIGURATION_FILE_NAME);

        let mut configuration = Configuration::default();
        configuration.set_api_url("https://mwdb.example/api");
        configuration.instance_mut("https://mwdb.example/api/").verify_tls = Some(false);
        configuration.save(&path).unwrap();

        let loaded = Configuration::load_from_file(path).unwrap();
        assert_eq!(loaded, configuration);
        assert_eq!(loaded.api_url(), "https://mwdb.example/api/");
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let directory = tempdir().unwrap();
        let path = directory.path().join(DEFAULT_CONFIGURATION_FILE_NAME);

        let configuration = Configuration::load_or_create(&path).unwrap();
        assert_eq!(configuration, Configuration::default());
        assert!(path.exists());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let configuration: Configuration = serde_yaml::from_str("use_keyring: false\n").unwrap();
        assert!(!configuration.use_keyring());
        assert_eq!(configuration.api_url(), DEFAULT_API_URL);
        assert!(configuration.retry_policy().obey_rate_limit);
    }

    #[test]
    fn test_instance_overrides_client_options() {
        let mut configuration = Configuration::default();
        let instance = configuration.instance_mut("https://local/api");
        instance.verify_tls = Some(false);
        instance.retry = Some(RetryPolicy {
            retry_on_downtime: true,
            ..Default::default()
        });

        let options = configuration.client_options(Some("https://local/api/"));
        assert_eq!(options.api_url, "https://local/api/");
        assert!(!options.verify_tls);
        assert!(options.retry.retry_on_downtime);

        let defaults = configuration.client_options(None);
        assert_eq!(defaults.api_url, DEFAULT_API_URL);
        assert!(defaults.verify_tls);
        assert!(!defaults.retry.retry_on_downtime);
    }

    #[test]
    fn test_plaintext_credentials() {
        let keyring = Keyring::default();
        let mut configuration = Configuration::default();
        configuration.set_use_keyring(false);

        configuration
            .store_credentials(&keyring, "https://local/api", "analyst", Secret::Password("s3cret".into()))
            .unwrap();
        let stored = configuration
            .stored_credentials(&keyring, "https://local/api/")
            .unwrap()
            .unwrap();
        assert_eq!(stored.username, "analyst");
        assert_eq!(stored.secret, Secret::Password("s3cret".into()));

        configuration
            .store_credentials(&keyring, "https://local/api", "analyst", Secret::ApiKey("key".into()))
            .unwrap();
        let stored = configuration
            .stored_credentials(&keyring, "https://local/api")
            .unwrap()
            .unwrap();
        assert_eq!(stored.secret, Secret::ApiKey("key".into()));
        assert_eq!(configuration.instance("https://local/api").unwrap().password, None);

        configuration.clear_credentials(&keyring, "https://local/api").unwrap();
        assert!(configuration
            .stored_credentials(&keyring, "https://local/api")
            .unwrap()
            .is_none());
        assert!(configuration.instance("https://local/api").is_none());
    }

    #[test]
    fn test_json_output_masks_secrets() {
        let keyring = Keyring::default();
        let mut configuration = Configuration::default();
        configuration.set_use_keyring(false);
        configuration
            .store_credentials(&keyring, "https://local/api", "analyst", Secret::ApiKey("key".into()))
            .unwrap();

        let output = configuration
            .format(&OutputFormat::Json(OutputFormatOptions::default()))
            .unwrap();
        assert!(output.contains(MASKED_SECRET));
        assert!(!output.contains("\"key\""));
    }
}
