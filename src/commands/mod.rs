//! CLI command definitions and argument parsing.
//!
//! Commands are built with the clap builder API, one module per command group.

use clap::{ArgMatches, Command};

pub mod auth;
pub mod config;
pub mod object;
pub mod params;
pub mod server;
pub mod upload;

/// Create the complete command line interface.
pub fn build_cli() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .propagate_version(true)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(params::verbose_parameter())
        .arg(params::api_url_parameter())
        .arg(params::config_path_parameter())
        .arg(params::format_parameter())
        .arg(params::format_pretty_parameter())
        .arg(params::format_with_headers_parameter())
        .subcommand(auth::login_command())
        .subcommand(auth::logout_command())
        .subcommand(server::version_command())
        .subcommand(server::server_command())
        .subcommand(object::get_command())
        .subcommand(object::fetch_command())
        .subcommand(object::list_command())
        .subcommand(object::search_command())
        .subcommand(object::count_command())
        .subcommand(upload::upload_command())
        .subcommand(object::tag_command())
        .subcommand(object::comment_command())
        .subcommand(object::link_command())
        .subcommand(object::attribute_command())
        .subcommand(object::share_command())
        .subcommand(object::reanalyze_command())
        .subcommand(object::remove_command())
        .subcommand(config::config_command())
}

/// Parse the process arguments.
pub fn create_cli_commands() -> ArgMatches {
    build_cli().get_matches()
}
