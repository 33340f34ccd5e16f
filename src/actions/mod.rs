//! Implementations of the CLI commands.
//!
//! Every action receives the [`CliContext`] built from the global options and
//! the matches of its own subcommand.

use crate::commands::params::{
    PARAMETER_API_URL, PARAMETER_CONFIG_PATH, PARAMETER_FORMAT, PARAMETER_HEADERS,
    PARAMETER_PRETTY,
};
use crate::configuration::{instance_key, Configuration, ConfigurationError, Secret};
use crate::core::Mwdb;
use crate::error::MwdbError;
use crate::exit_codes::MwdbExitCode;
use crate::format::{Formattable, FormattingError, OutputFormat, OutputFormatOptions};
use crate::keyring::Keyring;
use clap::ArgMatches;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

pub mod config;
pub mod objects;
pub mod session;
pub mod upload;

#[derive(Debug, Error)]
pub enum CliActionError {
    #[error("{0}")]
    MwdbError(#[from] MwdbError),

    #[error("{0}")]
    ConfigurationError(#[from] ConfigurationError),

    #[error("{0}")]
    FormattingError(#[from] FormattingError),

    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("invalid glob pattern: {0}")]
    PatternError(#[from] glob::PatternError),

    #[error("prompt failed: {0}")]
    PromptError(#[from] inquire::InquireError),

    #[error("Missing required argument: {0}")]
    MissingRequiredArgument(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl CliActionError {
    pub fn exit_code(&self) -> MwdbExitCode {
        match self {
            CliActionError::MwdbError(e) => MwdbExitCode::from(e),
            CliActionError::ConfigurationError(_) => MwdbExitCode::ConfigError,
            CliActionError::FormattingError(_) | CliActionError::JsonError(_) => {
                MwdbExitCode::DataError
            }
            CliActionError::IoError(_) => MwdbExitCode::NoInput,
            CliActionError::PatternError(_)
            | CliActionError::PromptError(_)
            | CliActionError::MissingRequiredArgument(_)
            | CliActionError::InvalidArgument(_) => MwdbExitCode::UsageError,
        }
    }
}

/// Global state shared by the actions
pub struct CliContext {
    pub configuration: Configuration,
    pub configuration_path: PathBuf,
    /// Instance the command talks to
    pub api_url: String,
    pub format: OutputFormat,
    pub keyring: Keyring,
}

impl CliContext {
    pub fn from_matches(matches: &ArgMatches) -> Result<CliContext, CliActionError> {
        let configuration_path = match matches.get_one::<PathBuf>(PARAMETER_CONFIG_PATH) {
            Some(path) => path.clone(),
            None => Configuration::get_default_configuration_file_path()?,
        };
        let configuration = Configuration::load_or_create(&configuration_path)?;

        let api_url = instance_key(
            matches
                .get_one::<String>(PARAMETER_API_URL)
                .map(String::as_str)
                .unwrap_or(configuration.api_url()),
        );

        Ok(CliContext {
            configuration,
            configuration_path,
            api_url,
            format: output_format(matches)?,
            keyring: Keyring::default(),
        })
    }

    /// Client for the selected instance, logged in with the stored
    /// credentials when there are any
    pub fn connect(&self) -> Result<Mwdb, CliActionError> {
        let mwdb = Mwdb::connect(self.configuration.client_options(Some(&self.api_url)))?;

        match self
            .configuration
            .stored_credentials(&self.keyring, &self.api_url)?
        {
            Some(credentials) => match credentials.secret {
                Secret::ApiKey(api_key) => mwdb.login_with_api_key(&api_key)?,
                Secret::Password(password) => mwdb.login(&credentials.username, &password)?,
            },
            None => debug!("No credentials stored for {}, continuing anonymously", self.api_url),
        }
        Ok(mwdb)
    }

    pub fn print(&self, value: &impl Formattable) -> Result<(), CliActionError> {
        println!("{}", value.format(&self.format)?);
        Ok(())
    }

    pub fn save_configuration(&self) -> Result<(), CliActionError> {
        Ok(self.configuration.save(&self.configuration_path)?)
    }
}

fn output_format(matches: &ArgMatches) -> Result<OutputFormat, CliActionError> {
    let format_str = matches
        .get_one::<String>(PARAMETER_FORMAT)
        .map(String::as_str)
        .unwrap_or(crate::format::JSON);
    let options = OutputFormatOptions {
        with_headers: matches.get_flag(PARAMETER_HEADERS),
        pretty: matches.get_flag(PARAMETER_PRETTY),
    };
    Ok(OutputFormat::from_string_with_options(format_str, options)?)
}
