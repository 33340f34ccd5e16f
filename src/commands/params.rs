//! Shared command parameters for all CLI commands.
//!
//! Parameter names are defined once here together with the builders of the
//! arguments reused by several commands.

use crate::format::OutputFormat;
use clap::{Arg, ArgAction, ArgGroup};
use std::path::PathBuf;

// Session commands
pub const COMMAND_LOGIN: &str = "login";
pub const COMMAND_LOGOUT: &str = "logout";
pub const COMMAND_VERSION: &str = "version";
pub const COMMAND_SERVER: &str = "server";

// Object commands
pub const COMMAND_GET: &str = "get";
pub const COMMAND_FETCH: &str = "fetch";
pub const COMMAND_LIST: &str = "list";
pub const COMMAND_SEARCH: &str = "search";
pub const COMMAND_COUNT: &str = "count";
pub const COMMAND_TAG: &str = "tag";
pub const COMMAND_COMMENT: &str = "comment";
pub const COMMAND_LINK: &str = "link";
pub const COMMAND_ATTRIBUTE: &str = "attribute";
pub const COMMAND_SHARE: &str = "share";
pub const COMMAND_REANALYZE: &str = "reanalyze";
pub const COMMAND_REMOVE: &str = "remove";
pub const COMMAND_ADD: &str = "add";

// `get` subjects
pub const COMMAND_DETAILS: &str = "details";
pub const COMMAND_TAGS: &str = "tags";
pub const COMMAND_COMMENTS: &str = "comments";
pub const COMMAND_SHARES: &str = "shares";
pub const COMMAND_ATTRIBUTES: &str = "attributes";
pub const COMMAND_PARENTS: &str = "parents";
pub const COMMAND_CHILDREN: &str = "children";
pub const COMMAND_ANALYSES: &str = "analyses";

// Upload commands
pub const COMMAND_UPLOAD: &str = "upload";
pub const COMMAND_FILE: &str = "file";
pub const COMMAND_CONFIG: &str = "config";
pub const COMMAND_BLOB: &str = "blob";

// Config commands
pub const COMMAND_SHOW: &str = "show";
pub const COMMAND_PATH: &str = "path";

// Global parameter names
pub const PARAMETER_API_URL: &str = "api-url";
pub const PARAMETER_CONFIG_PATH: &str = "config-path";
pub const PARAMETER_VERBOSE: &str = "verbose";
pub const PARAMETER_FORMAT: &str = "format";
pub const PARAMETER_PRETTY: &str = "pretty";
pub const PARAMETER_HEADERS: &str = "headers";

// Parameter names
pub const PARAMETER_ID: &str = "id";
pub const PARAMETER_USERNAME: &str = "username";
pub const PARAMETER_PASSWORD: &str = "password";
pub const PARAMETER_API_KEY: &str = "api-key";
pub const PARAMETER_OUTPUT: &str = "output";
pub const PARAMETER_TYPE: &str = "type";
pub const PARAMETER_LIMIT: &str = "limit";
pub const PARAMETER_QUERY: &str = "query";
pub const PARAMETER_TAG: &str = "tag";
pub const PARAMETER_TEXT: &str = "text";
pub const PARAMETER_PARENT: &str = "parent";
pub const PARAMETER_CHILD: &str = "child";
pub const PARAMETER_UNLINK: &str = "unlink";
pub const PARAMETER_KEY: &str = "key";
pub const PARAMETER_VALUE: &str = "value";
pub const PARAMETER_GROUP: &str = "group";
pub const PARAMETER_ARGUMENTS: &str = "arguments";
pub const PARAMETER_FILES: &str = "files";
pub const PARAMETER_FILE: &str = "file";
pub const PARAMETER_NAME: &str = "name";
pub const PARAMETER_FAMILY: &str = "family";
pub const PARAMETER_CONFIG_TYPE: &str = "config-type";
pub const PARAMETER_BLOB_TYPE: &str = "blob-type";
pub const PARAMETER_ATTRIBUTE: &str = "attribute";
pub const PARAMETER_SHARE_WITH: &str = "share-with";
pub const PARAMETER_PRIVATE: &str = "private";
pub const PARAMETER_PUBLIC: &str = "public";
pub const PARAMETER_PROGRESS: &str = "progress";
pub const PARAMETER_CONTINUE_ON_ERROR: &str = "continue-on-error";

pub const OBJECT_TYPES: [&str; 4] = ["object", "file", "config", "blob"];

/// Create the global format parameter.
pub fn format_parameter() -> Arg {
    Arg::new(PARAMETER_FORMAT)
        .short('f')
        .long(PARAMETER_FORMAT)
        .num_args(1)
        .required(false)
        .env("MWDB_FORMAT")
        .default_value("json")
        .global(true)
        .help("Output data format")
        .value_parser(OutputFormat::names())
}

pub fn format_pretty_parameter() -> Arg {
    Arg::new(PARAMETER_PRETTY)
        .long(PARAMETER_PRETTY)
        .action(ArgAction::SetTrue)
        .required(false)
        .global(true)
        .help("Format the output pretty")
}

pub fn format_with_headers_parameter() -> Arg {
    Arg::new(PARAMETER_HEADERS)
        .long(PARAMETER_HEADERS)
        .action(ArgAction::SetTrue)
        .required(false)
        .global(true)
        .env("MWDB_HEADERS")
        .help("Format the output with headers")
}

pub fn api_url_parameter() -> Arg {
    Arg::new(PARAMETER_API_URL)
        .long(PARAMETER_API_URL)
        .num_args(1)
        .required(false)
        .global(true)
        .env("MWDB_API_URL")
        .help("MWDB API URL (e.g., https://mwdb.cert.pl/api/)")
}

pub fn config_path_parameter() -> Arg {
    Arg::new(PARAMETER_CONFIG_PATH)
        .long(PARAMETER_CONFIG_PATH)
        .num_args(1)
        .required(false)
        .global(true)
        .help("Path of the configuration file")
        .value_parser(clap::value_parser!(PathBuf))
}

pub fn verbose_parameter() -> Arg {
    Arg::new(PARAMETER_VERBOSE)
        .short('v')
        .long(PARAMETER_VERBOSE)
        .action(ArgAction::SetTrue)
        .global(true)
        .help("Enable verbose output for debugging")
}

/// Object identifier: sha256 for any object, or md5/sha1/sha512 for files
pub fn id_parameter() -> Arg {
    Arg::new(PARAMETER_ID)
        .num_args(1)
        .required(true)
        .help("Object identifier (sha256, or md5/sha1/sha512 of a file)")
}

pub fn object_type_parameter() -> Arg {
    Arg::new(PARAMETER_TYPE)
        .short('t')
        .long(PARAMETER_TYPE)
        .num_args(1)
        .required(false)
        .default_value("object")
        .help("Object type")
        .value_parser(OBJECT_TYPES)
}

pub fn limit_parameter() -> Arg {
    Arg::new(PARAMETER_LIMIT)
        .short('n')
        .long(PARAMETER_LIMIT)
        .num_args(1)
        .required(false)
        .default_value("10")
        .help("Maximum number of objects to list")
        .value_parser(clap::value_parser!(usize))
}

pub fn output_file_parameter() -> Arg {
    Arg::new(PARAMETER_OUTPUT)
        .short('o')
        .long(PARAMETER_OUTPUT)
        .num_args(1)
        .required(false)
        .help("Output file path, '-' for standard output")
        .value_parser(clap::value_parser!(PathBuf))
}

pub fn parent_parameter() -> Arg {
    Arg::new(PARAMETER_PARENT)
        .long(PARAMETER_PARENT)
        .num_args(1)
        .required(false)
        .help("Identifier of the parent object")
}

pub fn tag_parameter() -> Arg {
    Arg::new(PARAMETER_TAG)
        .long(PARAMETER_TAG)
        .num_args(1)
        .action(ArgAction::Append)
        .required(false)
        .help("Tag to add to the uploaded object (repeatable)")
}

pub fn attribute_parameter() -> Arg {
    Arg::new(PARAMETER_ATTRIBUTE)
        .long(PARAMETER_ATTRIBUTE)
        .num_args(1)
        .action(ArgAction::Append)
        .required(false)
        .help("Attribute in KEY=VALUE form, VALUE may be JSON (repeatable)")
}

pub fn share_with_parameter() -> Arg {
    Arg::new(PARAMETER_SHARE_WITH)
        .long(PARAMETER_SHARE_WITH)
        .num_args(1)
        .required(false)
        .help("Share the uploaded object with this group only")
}

pub fn private_parameter() -> Arg {
    Arg::new(PARAMETER_PRIVATE)
        .long(PARAMETER_PRIVATE)
        .action(ArgAction::SetTrue)
        .required(false)
        .help("Keep the uploaded object visible to the uploader only")
}

pub fn public_parameter() -> Arg {
    Arg::new(PARAMETER_PUBLIC)
        .long(PARAMETER_PUBLIC)
        .action(ArgAction::SetTrue)
        .required(false)
        .help("Share the uploaded object with everybody")
}

/// At most one of --share-with, --private and --public
pub fn share_mode_group() -> ArgGroup {
    ArgGroup::new("share-mode")
        .args([PARAMETER_SHARE_WITH, PARAMETER_PRIVATE, PARAMETER_PUBLIC])
        .multiple(false)
        .required(false)
}

pub fn progress_parameter() -> Arg {
    Arg::new(PARAMETER_PROGRESS)
        .long(PARAMETER_PROGRESS)
        .action(ArgAction::SetTrue)
        .required(false)
        .help("Show a progress bar")
}

pub fn continue_on_error_parameter() -> Arg {
    Arg::new(PARAMETER_CONTINUE_ON_ERROR)
        .long(PARAMETER_CONTINUE_ON_ERROR)
        .action(ArgAction::SetTrue)
        .required(false)
        .help("Continue uploading other files if one fails")
}
