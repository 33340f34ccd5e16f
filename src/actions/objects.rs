//! Object lookups, listings and mutations.

use crate::actions::{CliActionError, CliContext};
use crate::blob::MwdbBlob;
use crate::commands::params::{
    COMMAND_ADD, COMMAND_ANALYSES, COMMAND_ATTRIBUTES, COMMAND_CHILDREN, COMMAND_COMMENTS,
    COMMAND_DETAILS, COMMAND_PARENTS, COMMAND_REMOVE, COMMAND_SHARES, COMMAND_TAGS,
    PARAMETER_ARGUMENTS, PARAMETER_CHILD, PARAMETER_GROUP, PARAMETER_ID, PARAMETER_KEY,
    PARAMETER_LIMIT, PARAMETER_OUTPUT, PARAMETER_PARENT, PARAMETER_QUERY, PARAMETER_TAG,
    PARAMETER_TEXT, PARAMETER_TYPE, PARAMETER_UNLINK, PARAMETER_VALUE,
};
use crate::config::MwdbConfig;
use crate::core::Mwdb;
use crate::error::Result as MwdbResult;
use crate::file::MwdbFile;
use crate::model::{
    AnalysisList, AttributeList, CommentList, FieldMap, ObjectList, ObjectSummary, RelationTree,
    ShareList, TagList,
};
use crate::object::{MwdbObject, Object, ObjectType};
use clap::ArgMatches;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, trace};

const STDOUT_PATH: &str = "-";

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a String, CliActionError> {
    matches
        .get_one::<String>(name)
        .ok_or_else(|| CliActionError::MissingRequiredArgument(name.to_string()))
}

fn summarize<T, I>(objects: I, limit: usize) -> MwdbResult<ObjectList>
where
    T: ObjectType,
    I: Iterator<Item = MwdbResult<T>>,
{
    objects
        .take(limit)
        .map(|object| object.map(|object| ObjectSummary::from_object(&object)))
        .collect()
}

/// Newest objects of the selected type, optionally filtered by a query
fn recent_objects(
    mwdb: &Mwdb,
    object_type: &str,
    query: Option<&str>,
    limit: usize,
) -> Result<ObjectList, CliActionError> {
    let objects = match object_type {
        "file" => summarize(mwdb.recent::<MwdbFile>(query), limit),
        "config" => summarize(mwdb.recent::<MwdbConfig>(query), limit),
        "blob" => summarize(mwdb.recent::<MwdbBlob>(query), limit),
        _ => summarize(mwdb.recent::<MwdbObject>(query), limit),
    };
    Ok(objects?)
}

pub fn list_objects(context: &CliContext, sub_matches: &ArgMatches) -> Result<(), CliActionError> {
    trace!("Executing 'list' command");

    let object_type = required(sub_matches, PARAMETER_TYPE)?;
    let limit = sub_matches.get_one::<usize>(PARAMETER_LIMIT).copied().unwrap_or(10);

    let mwdb = context.connect()?;
    context.print(&recent_objects(&mwdb, object_type, None, limit)?)
}

pub fn search_objects(context: &CliContext, sub_matches: &ArgMatches) -> Result<(), CliActionError> {
    trace!("Executing 'search' command");

    let query = required(sub_matches, PARAMETER_QUERY)?;
    let object_type = required(sub_matches, PARAMETER_TYPE)?;
    let limit = sub_matches.get_one::<usize>(PARAMETER_LIMIT).copied().unwrap_or(10);

    let mwdb = context.connect()?;
    context.print(&recent_objects(&mwdb, object_type, Some(query), limit)?)
}

pub fn count_objects(context: &CliContext, sub_matches: &ArgMatches) -> Result<(), CliActionError> {
    let query = sub_matches.get_one::<String>(PARAMETER_QUERY).map(String::as_str);
    let object_type = required(sub_matches, PARAMETER_TYPE)?;

    let mwdb = context.connect()?;
    let count = match object_type.as_str() {
        "file" => mwdb.count_files(query)?,
        "config" => mwdb.count_configs(query)?,
        "blob" => mwdb.count_blobs(query)?,
        _ => mwdb.count_objects(query)?,
    };
    println!("{}", count);
    Ok(())
}

/// Prints one facet of an object, selected by the `get` subcommand
pub fn get_object(context: &CliContext, sub_matches: &ArgMatches) -> Result<(), CliActionError> {
    let (subject, subject_matches) = match sub_matches.subcommand() {
        Some(subcommand) => subcommand,
        None => return Err(CliActionError::MissingRequiredArgument("subject".to_string())),
    };
    trace!("Executing 'get {}' command", subject);

    let id = required(subject_matches, PARAMETER_ID)?;
    let mwdb = context.connect()?;
    let mut object = mwdb.query(id)?;

    match subject {
        COMMAND_DETAILS => context.print(&FieldMap(object.state().fields().clone())),
        COMMAND_TAGS => context.print(&TagList(object.tags()?)),
        COMMAND_COMMENTS => context.print(&CommentList(object.comments()?)),
        COMMAND_SHARES => context.print(&ShareList(object.shares()?)),
        COMMAND_ATTRIBUTES => context.print(&AttributeList(object.attributes()?)),
        COMMAND_ANALYSES => context.print(&AnalysisList(object.analyses()?)),
        COMMAND_PARENTS => {
            let parents = object.parents()?;
            context.print(&RelationTree {
                object: ObjectSummary::from_object(&object),
                parents: Some(parents.iter().map(ObjectSummary::from_object).collect()),
                children: None,
            })
        }
        COMMAND_CHILDREN => {
            let children = object.children()?;
            context.print(&RelationTree {
                object: ObjectSummary::from_object(&object),
                parents: None,
                children: Some(children.iter().map(ObjectSummary::from_object).collect()),
            })
        }
        other => Err(CliActionError::InvalidArgument(format!("unknown subject {}", other))),
    }
}

/// Downloads object content into a file named after the object, or to the
/// given path
pub fn fetch_object(context: &CliContext, sub_matches: &ArgMatches) -> Result<(), CliActionError> {
    trace!("Executing 'fetch' command");

    let id = required(sub_matches, PARAMETER_ID)?;
    let mwdb = context.connect()?;
    let mut object = mwdb.query(id)?;
    let content = object.content()?;

    let output = sub_matches
        .get_one::<PathBuf>(PARAMETER_OUTPUT)
        .cloned()
        .unwrap_or_else(|| PathBuf::from(object.id()));

    if output.as_os_str() == STDOUT_PATH {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&content)?;
        stdout.flush()?;
    } else {
        std::fs::write(&output, &content)?;
        debug!("Wrote {} bytes to {}", content.len(), output.display());
        println!("{}", output.display());
    }
    Ok(())
}

pub fn tag_object(context: &CliContext, sub_matches: &ArgMatches) -> Result<(), CliActionError> {
    let (action, action_matches) = match sub_matches.subcommand() {
        Some(subcommand) => subcommand,
        None => return Err(CliActionError::MissingRequiredArgument("action".to_string())),
    };
    let id = required(action_matches, PARAMETER_ID)?;
    let tag = required(action_matches, PARAMETER_TAG)?;

    let mwdb = context.connect()?;
    let mut object = mwdb.query(id)?;
    match action {
        COMMAND_ADD => object.add_tag(tag)?,
        COMMAND_REMOVE => object.remove_tag(tag)?,
        other => return Err(CliActionError::InvalidArgument(format!("unknown action {}", other))),
    }
    context.print(&TagList(object.tags()?))
}

pub fn comment_object(context: &CliContext, sub_matches: &ArgMatches) -> Result<(), CliActionError> {
    let id = required(sub_matches, PARAMETER_ID)?;
    let text = required(sub_matches, PARAMETER_TEXT)?;

    let mwdb = context.connect()?;
    let mut object = mwdb.query(id)?;
    object.add_comment(text)?;
    context.print(&CommentList(object.comments()?))
}

pub fn link_objects(context: &CliContext, sub_matches: &ArgMatches) -> Result<(), CliActionError> {
    let parent = required(sub_matches, PARAMETER_PARENT)?;
    let child = required(sub_matches, PARAMETER_CHILD)?;

    let mwdb = context.connect()?;
    let mut parent = mwdb.query(parent)?;
    // the child may be given by a non-sha256 file hash
    let child = mwdb.query(child)?;

    if sub_matches.get_flag(PARAMETER_UNLINK) {
        parent.remove_child(child.id())?;
    } else {
        parent.add_child(child.id())?;
    }

    let children = parent.children()?;
    context.print(&RelationTree {
        object: ObjectSummary::from_object(&parent),
        parents: None,
        children: Some(children.iter().map(ObjectSummary::from_object).collect()),
    })
}

/// Attribute value given on the command line, JSON when it parses as such
fn attribute_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub fn add_attribute(context: &CliContext, sub_matches: &ArgMatches) -> Result<(), CliActionError> {
    let id = required(sub_matches, PARAMETER_ID)?;
    let key = required(sub_matches, PARAMETER_KEY)?;
    let value = attribute_value(required(sub_matches, PARAMETER_VALUE)?);

    let mwdb = context.connect()?;
    let mut object = mwdb.query(id)?;
    object.add_attribute(key, value)?;
    context.print(&AttributeList(object.attributes()?))
}

pub fn share_object(context: &CliContext, sub_matches: &ArgMatches) -> Result<(), CliActionError> {
    let id = required(sub_matches, PARAMETER_ID)?;
    let group = required(sub_matches, PARAMETER_GROUP)?;

    let mwdb = context.connect()?;
    let mut object = mwdb.query(id)?;
    object.share_with(group)?;
    context.print(&ShareList(object.shares()?))
}

pub fn reanalyze_object(context: &CliContext, sub_matches: &ArgMatches) -> Result<(), CliActionError> {
    let id = required(sub_matches, PARAMETER_ID)?;
    let arguments = match sub_matches.get_one::<String>(PARAMETER_ARGUMENTS) {
        Some(raw) => match serde_json::from_str::<Value>(raw)? {
            Value::Object(arguments) => Some(arguments),
            _ => {
                return Err(CliActionError::InvalidArgument(
                    "analysis arguments must be a JSON object".to_string(),
                ))
            }
        },
        None => None::<Map<String, Value>>,
    };

    let mwdb = context.connect()?;
    let mut object = mwdb.query(id)?;
    let analysis = object.reanalyze(arguments)?;
    context.print(&AnalysisList(vec![analysis]))
}

pub fn remove_object(context: &CliContext, sub_matches: &ArgMatches) -> Result<(), CliActionError> {
    let id = required(sub_matches, PARAMETER_ID)?;

    let mwdb = context.connect()?;
    let mut object = mwdb.query(id)?;
    let summary = ObjectSummary::from_object(&object);
    object.remove()?;
    context.print(&ObjectList(vec![summary]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_values() {
        assert_eq!(attribute_value("42"), Value::from(42));
        assert_eq!(attribute_value("{\"a\": 1}")["a"], 1);
        assert_eq!(attribute_value("http://evil"), Value::from("http://evil"));
    }
}
