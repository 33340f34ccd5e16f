//! Object command definitions.
//!
//! Lookups, listings and the mutations applied to a single object.

use crate::commands::params::{
    id_parameter, limit_parameter, object_type_parameter, output_file_parameter,
    COMMAND_ADD, COMMAND_ANALYSES, COMMAND_ATTRIBUTE, COMMAND_ATTRIBUTES, COMMAND_CHILDREN,
    COMMAND_COMMENT, COMMAND_COMMENTS, COMMAND_COUNT, COMMAND_DETAILS, COMMAND_FETCH,
    COMMAND_GET, COMMAND_LINK, COMMAND_LIST, COMMAND_PARENTS, COMMAND_REANALYZE, COMMAND_REMOVE,
    COMMAND_SEARCH, COMMAND_SHARE, COMMAND_SHARES, COMMAND_TAG, COMMAND_TAGS, PARAMETER_ARGUMENTS,
    PARAMETER_CHILD, PARAMETER_GROUP, PARAMETER_KEY, PARAMETER_PARENT, PARAMETER_QUERY,
    PARAMETER_TAG, PARAMETER_TEXT, PARAMETER_UNLINK, PARAMETER_VALUE,
};
use clap::{Arg, ArgAction, Command};

/// Create the get command, one subcommand per object facet.
pub fn get_command() -> Command {
    let subject = |name: &'static str, about: &'static str| {
        Command::new(name).about(about).arg(id_parameter())
    };

    Command::new(COMMAND_GET)
        .about("Show information about an object")
        .subcommand_required(true)
        .subcommand(subject(COMMAND_DETAILS, "Show object details"))
        .subcommand(subject(COMMAND_TAGS, "List object tags"))
        .subcommand(subject(COMMAND_COMMENTS, "List object comments"))
        .subcommand(subject(COMMAND_SHARES, "List groups the object is shared with"))
        .subcommand(subject(COMMAND_ATTRIBUTES, "List object attributes"))
        .subcommand(subject(COMMAND_PARENTS, "List parents of the object"))
        .subcommand(subject(COMMAND_CHILDREN, "List children of the object"))
        .subcommand(subject(COMMAND_ANALYSES, "List Karton analyses of the object"))
}

pub fn fetch_command() -> Command {
    Command::new(COMMAND_FETCH)
        .about("Download object content")
        .arg(id_parameter())
        .arg(output_file_parameter())
}

pub fn list_command() -> Command {
    Command::new(COMMAND_LIST)
        .about("List the most recent objects")
        .visible_alias("ls")
        .arg(object_type_parameter())
        .arg(limit_parameter())
}

pub fn search_command() -> Command {
    Command::new(COMMAND_SEARCH)
        .about("Search objects using a Lucene query")
        .arg(
            Arg::new(PARAMETER_QUERY)
                .num_args(1)
                .required(true)
                .help("Search query (e.g., 'tag:emotet AND file.size:>1000')"),
        )
        .arg(object_type_parameter())
        .arg(limit_parameter())
}

pub fn count_command() -> Command {
    Command::new(COMMAND_COUNT)
        .about("Count objects, optionally matching a query")
        .arg(
            Arg::new(PARAMETER_QUERY)
                .num_args(1)
                .required(false)
                .help("Search query"),
        )
        .arg(object_type_parameter())
}

pub fn tag_command() -> Command {
    let tag_arg = || {
        Arg::new(PARAMETER_TAG)
            .num_args(1)
            .required(true)
            .help("Tag name")
    };

    Command::new(COMMAND_TAG)
        .about("Manage object tags")
        .subcommand_required(true)
        .subcommand(
            Command::new(COMMAND_ADD)
                .about("Add a tag")
                .arg(id_parameter())
                .arg(tag_arg()),
        )
        .subcommand(
            Command::new(COMMAND_REMOVE)
                .about("Remove a tag")
                .arg(id_parameter())
                .arg(tag_arg()),
        )
}

pub fn comment_command() -> Command {
    Command::new(COMMAND_COMMENT)
        .about("Add a comment to an object")
        .arg(id_parameter())
        .arg(
            Arg::new(PARAMETER_TEXT)
                .num_args(1)
                .required(true)
                .help("Comment text"),
        )
}

pub fn link_command() -> Command {
    Command::new(COMMAND_LINK)
        .about("Make an object the child of another one")
        .arg(
            Arg::new(PARAMETER_PARENT)
                .num_args(1)
                .required(true)
                .help("Parent object identifier"),
        )
        .arg(
            Arg::new(PARAMETER_CHILD)
                .num_args(1)
                .required(true)
                .help("Child object identifier"),
        )
        .arg(
            Arg::new(PARAMETER_UNLINK)
                .long(PARAMETER_UNLINK)
                .action(ArgAction::SetTrue)
                .help("Remove the relation instead of adding it"),
        )
}

pub fn attribute_command() -> Command {
    Command::new(COMMAND_ATTRIBUTE)
        .about("Add an attribute to an object")
        .arg(id_parameter())
        .arg(
            Arg::new(PARAMETER_KEY)
                .num_args(1)
                .required(true)
                .help("Attribute key"),
        )
        .arg(
            Arg::new(PARAMETER_VALUE)
                .num_args(1)
                .required(true)
                .help("Attribute value, parsed as JSON when possible"),
        )
}

pub fn share_command() -> Command {
    Command::new(COMMAND_SHARE)
        .about("Share an object with a group")
        .arg(id_parameter())
        .arg(
            Arg::new(PARAMETER_GROUP)
                .num_args(1)
                .required(true)
                .help("Group name"),
        )
}

pub fn reanalyze_command() -> Command {
    Command::new(COMMAND_REANALYZE)
        .about("Submit an object for another Karton analysis")
        .arg(id_parameter())
        .arg(
            Arg::new(PARAMETER_ARGUMENTS)
                .long(PARAMETER_ARGUMENTS)
                .num_args(1)
                .required(false)
                .help("Analysis arguments as a JSON object"),
        )
}

pub fn remove_command() -> Command {
    Command::new(COMMAND_REMOVE)
        .about("Remove an object from the repository")
        .visible_alias("rm")
        .arg(id_parameter())
}
