//! Session command definitions.

use crate::commands::params::{
    PARAMETER_API_KEY, PARAMETER_PASSWORD, PARAMETER_USERNAME, COMMAND_LOGIN, COMMAND_LOGOUT,
};
use clap::{Arg, ArgGroup, Command};

/// Create the login command.
///
/// Missing values are asked for interactively.
pub fn login_command() -> Command {
    Command::new(COMMAND_LOGIN)
        .about("Store credentials for the MWDB instance")
        .arg(
            Arg::new(PARAMETER_USERNAME)
                .short('u')
                .long(PARAMETER_USERNAME)
                .num_args(1)
                .required(false)
                .help("MWDB user name"),
        )
        .arg(
            Arg::new(PARAMETER_PASSWORD)
                .short('p')
                .long(PARAMETER_PASSWORD)
                .num_args(1)
                .required(false)
                .help("MWDB password"),
        )
        .arg(
            Arg::new(PARAMETER_API_KEY)
                .short('A')
                .long(PARAMETER_API_KEY)
                .num_args(1)
                .required(false)
                .help("API key to use instead of the password"),
        )
        .group(
            ArgGroup::new("secret")
                .args([PARAMETER_PASSWORD, PARAMETER_API_KEY])
                .multiple(false),
        )
}

pub fn logout_command() -> Command {
    Command::new(COMMAND_LOGOUT).about("Forget the credentials stored for the MWDB instance")
}
