//! Credentials kept in the operating system keyring.
//!
//! API keys are stored under the `mwdb-apikey:<api_url>` service and
//! passwords under `mwdb:<api_url>`, both keyed by user name.

use keyring::Entry;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum KeyringError {
    #[error("cannot access the keyring entry {service}/{username}: {cause}")]
    CannotAccessKeyringEntity {
        service: String,
        username: String,
        cause: keyring::Error,
    },
}

/// Kind of secret stored for an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    ApiKey,
    Password,
}

impl SecretKind {
    pub fn service(&self, api_url: &str) -> String {
        match self {
            SecretKind::ApiKey => format!("mwdb-apikey:{}", api_url),
            SecretKind::Password => format!("mwdb:{}", api_url),
        }
    }
}

#[derive(Debug, Default)]
pub struct Keyring {}

impl Keyring {
    fn entry(&self, service: &str, username: &str) -> Result<Entry, KeyringError> {
        Entry::new(service, username).map_err(|cause| KeyringError::CannotAccessKeyringEntity {
            service: service.to_string(),
            username: username.to_string(),
            cause,
        })
    }

    pub fn get(
        &self,
        kind: SecretKind,
        api_url: &str,
        username: &str,
    ) -> Result<Option<String>, KeyringError> {
        let service = kind.service(api_url);
        let entry = self.entry(&service, username)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(cause) => Err(KeyringError::CannotAccessKeyringEntity {
                service,
                username: username.to_string(),
                cause,
            }),
        }
    }

    pub fn put(
        &self,
        kind: SecretKind,
        api_url: &str,
        username: &str,
        value: &str,
    ) -> Result<(), KeyringError> {
        let service = kind.service(api_url);
        debug!("Storing secret for {} in {}", username, service);
        self.entry(&service, username)?
            .set_password(value)
            .map_err(|cause| KeyringError::CannotAccessKeyringEntity {
                service,
                username: username.to_string(),
                cause,
            })
    }

    /// Removes the secret, a missing entry is not an error
    pub fn delete(&self, kind: SecretKind, api_url: &str, username: &str) -> Result<(), KeyringError> {
        let service = kind.service(api_url);
        match self.entry(&service, username)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(cause) => Err(KeyringError::CannotAccessKeyringEntity {
                service,
                username: username.to_string(),
                cause,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_names() {
        let url = "https://mwdb.cert.pl/api/";
        assert_eq!(SecretKind::ApiKey.service(url), "mwdb-apikey:https://mwdb.cert.pl/api/");
        assert_eq!(SecretKind::Password.service(url), "mwdb:https://mwdb.cert.pl/api/");
    }
}
