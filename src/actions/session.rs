//! Login, logout and server information.

use crate::actions::{CliActionError, CliContext};
use crate::auth::AuthToken;
use crate::commands::params::{PARAMETER_API_KEY, PARAMETER_PASSWORD, PARAMETER_USERNAME};
use crate::configuration::Secret;
use crate::core::Mwdb;
use crate::error::MwdbError;
use crate::model::FieldMap;
use clap::ArgMatches;
use color_print::cprintln;
use serde_json::Value;
use tracing::{debug, trace};

pub fn login(context: &mut CliContext, sub_matches: &ArgMatches) -> Result<(), CliActionError> {
    trace!("Executing 'login' command");

    let api_key = sub_matches.get_one::<String>(PARAMETER_API_KEY).cloned();
    let username = sub_matches.get_one::<String>(PARAMETER_USERNAME).cloned();

    let (username, secret) = match api_key {
        Some(api_key) => {
            let token = AuthToken::parse(&api_key)?;
            let username = match username.or_else(|| token.username().map(str::to_string)) {
                Some(username) => username,
                None => inquire::Text::new("Username:").prompt()?,
            };
            (username, Secret::ApiKey(api_key))
        }
        None => {
            let username = match username {
                Some(username) => username,
                None => inquire::Text::new("Username:").prompt()?,
            };
            let password = match sub_matches.get_one::<String>(PARAMETER_PASSWORD) {
                Some(password) => password.clone(),
                None => inquire::Password::new("Password:")
                    .without_confirmation()
                    .prompt()?,
            };

            // make sure the password works before remembering it
            let mwdb = Mwdb::connect(context.configuration.client_options(Some(&context.api_url)))?;
            mwdb.login(&username, &password)?;
            (username, Secret::Password(password))
        }
    };

    let api_url = context.api_url.clone();
    context
        .configuration
        .store_credentials(&context.keyring, &api_url, &username, secret)?;
    context.save_configuration()?;

    cprintln!("Logged in as <bold>{}</bold> on {}", username, api_url);
    Ok(())
}

pub fn logout(context: &mut CliContext) -> Result<(), CliActionError> {
    trace!("Executing 'logout' command");

    let api_url = context.api_url.clone();
    context
        .configuration
        .clear_credentials(&context.keyring, &api_url)?;
    context.save_configuration()?;

    cprintln!("Logged out from {}", api_url);
    Ok(())
}

pub fn print_version(context: &CliContext) -> Result<(), CliActionError> {
    cprintln!("<bold>mwdb</bold> client version {}", env!("CARGO_PKG_VERSION"));

    let mwdb = Mwdb::connect(context.configuration.client_options(Some(&context.api_url)))?;
    match mwdb.api().server_version() {
        Ok(version) => cprintln!("<bold>MWDB</bold> server version {} ({})", version, context.api_url),
        Err(e) => {
            debug!("Cannot get the server version: {}", e);
            cprintln!("<y>MWDB server at {} is not reachable</y>", context.api_url);
        }
    }
    Ok(())
}

pub fn print_server_metadata(context: &CliContext) -> Result<(), CliActionError> {
    let mwdb = Mwdb::connect(context.configuration.client_options(Some(&context.api_url)))?;
    let metadata = mwdb.api().server_metadata()?;

    match serde_json::to_value(metadata)? {
        Value::Object(fields) => context.print(&FieldMap(fields)),
        other => Err(MwdbError::BadResponse(format!("unexpected server metadata {}", other)).into()),
    }
}
