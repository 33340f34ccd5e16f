use color_print::ceprintln;
use mwdb::commands::create_cli_commands;
use mwdb::commands::params::PARAMETER_VERBOSE;
use tracing_subscriber::EnvFilter;

mod cli;
use cli::execute_command;

/// Main entry point for the program
fn main() {
    let matches = create_cli_commands();

    // --verbose only applies when RUST_LOG does not say otherwise
    let filter = if matches.get_flag(PARAMETER_VERBOSE) && std::env::var_os("RUST_LOG").is_none() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = execute_command(&matches) {
        ceprintln!("<r>ERROR</r>: {}", e);
        ::std::process::exit(e.exit_code().code());
    }
}
