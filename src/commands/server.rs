use crate::commands::params::{COMMAND_SERVER, COMMAND_VERSION};
use clap::Command;

pub fn version_command() -> Command {
    Command::new(COMMAND_VERSION).about("Show client and server versions")
}

pub fn server_command() -> Command {
    Command::new(COMMAND_SERVER).about("Show the metadata published by the MWDB server")
}
