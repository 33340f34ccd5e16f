//! Client library and CLI for the MWDB malware repository.
//!
//! The crate is split in two layers:
//!
//! - the transport ([`api`]): an authenticated session that speaks JSON to
//!   the REST API, re-authenticates when a token expires and retries
//!   requests during rate limiting or maintenance;
//! - the object model ([`core`], [`object`] and the typed objects): lazily
//!   loaded files, configurations and blobs whose relations, tags, comments,
//!   attributes and shares are fetched on first access.
//!
//! The remaining modules back the `mwdb` command line tool.
//!
//! ```no_run
//! use mwdb::{Mwdb, Object};
//!
//! # fn main() -> mwdb::Result<()> {
//! let mwdb = Mwdb::connect(Default::default())?;
//! mwdb.login_with_api_key("eyJ...")?;
//! for file in mwdb.search_files("tag:emotet").take(5) {
//!     let mut file = file?;
//!     let tags = file.tags()?;
//!     println!("{} {:?}", file.sha256(), tags);
//! }
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod api;
pub mod auth;
pub mod blob;
pub mod comment;
pub mod commands;
pub mod config;
pub mod configuration;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod file;
pub mod format;
pub mod http_utils;
pub mod karton;
pub mod keyring;
pub mod model;
pub mod object;
pub mod share;
pub mod upload;
pub mod util;
pub mod version;

pub use crate::api::{ApiClient, ApiClientOptions, RetryPolicy};
pub use crate::blob::MwdbBlob;
pub use crate::comment::Comment;
pub use crate::config::MwdbConfig;
pub use crate::core::{Listener, Mwdb, Recent};
pub use crate::error::{MwdbError, Result};
pub use crate::file::MwdbFile;
pub use crate::karton::KartonAnalysis;
pub use crate::object::{MwdbObject, Object, ObjectKind, ObjectType};
pub use crate::share::{Share, ShareReason};
pub use crate::upload::{ShareMode, UploadOptions};
