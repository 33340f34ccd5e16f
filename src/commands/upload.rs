//! Upload command definitions.

use crate::commands::params::{
    attribute_parameter, continue_on_error_parameter, parent_parameter, private_parameter,
    progress_parameter, public_parameter, share_mode_group, share_with_parameter, tag_parameter,
    COMMAND_BLOB, COMMAND_CONFIG, COMMAND_FILE, COMMAND_UPLOAD, PARAMETER_BLOB_TYPE,
    PARAMETER_CONFIG_TYPE, PARAMETER_FAMILY, PARAMETER_FILE, PARAMETER_FILES, PARAMETER_NAME,
};
use clap::{Arg, Command};
use std::path::PathBuf;

/// Options every upload accepts
fn with_upload_options(command: Command) -> Command {
    command
        .arg(parent_parameter())
        .arg(tag_parameter())
        .arg(attribute_parameter())
        .arg(share_with_parameter())
        .arg(private_parameter())
        .arg(public_parameter())
        .group(share_mode_group())
}

fn input_file_parameter(help: &'static str) -> Arg {
    Arg::new(PARAMETER_FILE)
        .num_args(1)
        .required(true)
        .help(help)
        .value_parser(clap::value_parser!(PathBuf))
}

/// Create the upload command with all its subcommands.
pub fn upload_command() -> Command {
    Command::new(COMMAND_UPLOAD)
        .about("Upload objects")
        .subcommand_required(true)
        .subcommand(with_upload_options(
            Command::new(COMMAND_FILE)
                .about("Upload files, glob patterns are expanded")
                .arg(
                    Arg::new(PARAMETER_FILES)
                        .num_args(1..)
                        .required(true)
                        .help("Files or glob patterns (e.g., \"samples/*.exe\")"),
                )
                .arg(
                    Arg::new(PARAMETER_NAME)
                        .long(PARAMETER_NAME)
                        .num_args(1)
                        .required(false)
                        .help("File name to use instead of the local one (single file only)"),
                )
                .arg(progress_parameter())
                .arg(continue_on_error_parameter()),
        ))
        .subcommand(with_upload_options(
            Command::new(COMMAND_CONFIG)
                .about("Upload a configuration from a JSON file")
                .arg(
                    Arg::new(PARAMETER_FAMILY)
                        .num_args(1)
                        .required(true)
                        .help("Malware family"),
                )
                .arg(input_file_parameter("JSON file with the configuration, '-' for standard input"))
                .arg(
                    Arg::new(PARAMETER_CONFIG_TYPE)
                        .long(PARAMETER_CONFIG_TYPE)
                        .num_args(1)
                        .default_value("static")
                        .value_parser(["static", "dynamic"])
                        .help("Configuration type"),
                ),
        ))
        .subcommand(with_upload_options(
            Command::new(COMMAND_BLOB)
                .about("Upload a text blob")
                .arg(
                    Arg::new(PARAMETER_BLOB_TYPE)
                        .num_args(1)
                        .required(true)
                        .help("Blob type (e.g., dump, raw_cfg)"),
                )
                .arg(input_file_parameter("Text file with the blob content, '-' for standard input"))
                .arg(
                    Arg::new(PARAMETER_NAME)
                        .long(PARAMETER_NAME)
                        .num_args(1)
                        .required(false)
                        .help("Blob name, defaults to the file name"),
                ),
        ))
}
