use clap::ArgMatches;
use mwdb::actions::{config, objects, session, upload, CliActionError, CliContext};
use mwdb::commands::params::{
    COMMAND_ATTRIBUTE, COMMAND_COMMENT, COMMAND_CONFIG, COMMAND_COUNT, COMMAND_FETCH, COMMAND_GET,
    COMMAND_LINK, COMMAND_LIST, COMMAND_LOGIN, COMMAND_LOGOUT, COMMAND_PATH, COMMAND_REANALYZE,
    COMMAND_REMOVE, COMMAND_SEARCH, COMMAND_SERVER, COMMAND_SHARE, COMMAND_SHOW, COMMAND_TAG,
    COMMAND_UPLOAD, COMMAND_VERSION,
};
use mwdb::exit_codes::MwdbExitCode;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Undefined or unsupported subcommand: {0}")]
    UnsupportedSubcommand(String),
    #[error("{0}")]
    ActionError(#[from] CliActionError),
}

impl CliError {
    pub fn exit_code(&self) -> MwdbExitCode {
        match self {
            CliError::UnsupportedSubcommand(_) => MwdbExitCode::UsageError,
            CliError::ActionError(e) => e.exit_code(),
        }
    }
}

fn extract_subcommand_name(sub_matches: &ArgMatches) -> String {
    let message = match sub_matches.subcommand() {
        Some(m) => m.0,
        None => "unknown",
    };

    message.to_string()
}

pub fn execute_command(matches: &ArgMatches) -> Result<(), CliError> {
    let mut context = CliContext::from_matches(matches)?;
    trace!("Using MWDB instance {}", context.api_url);

    match matches.subcommand() {
        // Session
        Some((COMMAND_LOGIN, sub_matches)) => session::login(&mut context, sub_matches)?,
        Some((COMMAND_LOGOUT, _)) => session::logout(&mut context)?,
        Some((COMMAND_VERSION, _)) => session::print_version(&context)?,
        Some((COMMAND_SERVER, _)) => session::print_server_metadata(&context)?,

        // Objects
        Some((COMMAND_GET, sub_matches)) => objects::get_object(&context, sub_matches)?,
        Some((COMMAND_FETCH, sub_matches)) => objects::fetch_object(&context, sub_matches)?,
        Some((COMMAND_LIST, sub_matches)) => objects::list_objects(&context, sub_matches)?,
        Some((COMMAND_SEARCH, sub_matches)) => objects::search_objects(&context, sub_matches)?,
        Some((COMMAND_COUNT, sub_matches)) => objects::count_objects(&context, sub_matches)?,
        Some((COMMAND_UPLOAD, sub_matches)) => upload::upload(&context, sub_matches)?,
        Some((COMMAND_TAG, sub_matches)) => objects::tag_object(&context, sub_matches)?,
        Some((COMMAND_COMMENT, sub_matches)) => objects::comment_object(&context, sub_matches)?,
        Some((COMMAND_LINK, sub_matches)) => objects::link_objects(&context, sub_matches)?,
        Some((COMMAND_ATTRIBUTE, sub_matches)) => objects::add_attribute(&context, sub_matches)?,
        Some((COMMAND_SHARE, sub_matches)) => objects::share_object(&context, sub_matches)?,
        Some((COMMAND_REANALYZE, sub_matches)) => {
            objects::reanalyze_object(&context, sub_matches)?
        }
        Some((COMMAND_REMOVE, sub_matches)) => objects::remove_object(&context, sub_matches)?,

        // Configuration
        Some((COMMAND_CONFIG, sub_matches)) => match sub_matches.subcommand() {
            Some((COMMAND_SHOW, _)) => config::show_configuration(&context)?,
            Some((COMMAND_PATH, _)) => config::print_configuration_path(&context)?,
            _ => {
                return Err(CliError::UnsupportedSubcommand(extract_subcommand_name(
                    sub_matches,
                )))
            }
        },

        _ => return Err(CliError::UnsupportedSubcommand(extract_subcommand_name(matches))),
    }

    Ok(())
}
