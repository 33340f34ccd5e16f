//! Uploads of files, configurations and blobs.

use crate::actions::{CliActionError, CliContext};
use crate::commands::params::{
    COMMAND_BLOB, COMMAND_CONFIG, COMMAND_FILE, PARAMETER_ATTRIBUTE, PARAMETER_BLOB_TYPE,
    PARAMETER_CONFIG_TYPE, PARAMETER_CONTINUE_ON_ERROR, PARAMETER_FAMILY, PARAMETER_FILE,
    PARAMETER_FILES, PARAMETER_NAME, PARAMETER_PARENT, PARAMETER_PRIVATE, PARAMETER_PROGRESS,
    PARAMETER_PUBLIC, PARAMETER_SHARE_WITH, PARAMETER_TAG,
};
use crate::model::{ObjectList, ObjectSummary};
use crate::upload::{ShareMode, UploadOptions};
use clap::ArgMatches;
use color_print::ceprintln;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, error, trace, warn};

const STDIN_PATH: &str = "-";

pub fn upload(context: &CliContext, sub_matches: &ArgMatches) -> Result<(), CliActionError> {
    match sub_matches.subcommand() {
        Some((COMMAND_FILE, file_matches)) => upload_files(context, file_matches),
        Some((COMMAND_CONFIG, config_matches)) => upload_config(context, config_matches),
        Some((COMMAND_BLOB, blob_matches)) => upload_blob(context, blob_matches),
        Some((other, _)) => Err(CliActionError::InvalidArgument(format!(
            "unknown upload kind {}",
            other
        ))),
        None => Err(CliActionError::MissingRequiredArgument("kind".to_string())),
    }
}

/// Splits `KEY=VALUE`, reading the value as JSON when possible
fn parse_attribute(raw: &str) -> Result<(String, Value), CliActionError> {
    let (key, value) = raw.split_once('=').ok_or_else(|| {
        CliActionError::InvalidArgument(format!("attribute '{}' is not in KEY=VALUE form", raw))
    })?;
    if key.is_empty() {
        return Err(CliActionError::InvalidArgument(format!(
            "attribute '{}' has an empty key",
            raw
        )));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn upload_options(matches: &ArgMatches) -> Result<UploadOptions, CliActionError> {
    let share = ShareMode::from_flags(
        matches.get_one::<String>(PARAMETER_SHARE_WITH).map(String::as_str),
        matches.get_flag(PARAMETER_PRIVATE),
        matches.get_flag(PARAMETER_PUBLIC),
    )?;

    let mut options = UploadOptions::default().share(share);
    if let Some(parent) = matches.get_one::<String>(PARAMETER_PARENT) {
        options = options.parent(parent);
    }
    for tag in matches.get_many::<String>(PARAMETER_TAG).into_iter().flatten() {
        options = options.tag(tag);
    }
    for attribute in matches.get_many::<String>(PARAMETER_ATTRIBUTE).into_iter().flatten() {
        let (key, value) = parse_attribute(attribute)?;
        options = options.attribute(key, value);
    }
    Ok(options)
}

/// Expands glob patterns, keeping plain paths that match nothing so that
/// the read reports them
fn expand_patterns<'a>(patterns: impl Iterator<Item = &'a String>) -> Result<Vec<PathBuf>, CliActionError> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let mut matched = false;
        for entry in glob::glob(pattern)? {
            match entry {
                Ok(path) if path.is_file() => {
                    matched = true;
                    paths.push(path);
                }
                Ok(path) => debug!("Skipping {}, not a file", path.display()),
                Err(e) => warn!("Cannot read {}: {}", e.path().display(), e.error()),
            }
        }
        if !matched {
            paths.push(PathBuf::from(pattern));
        }
    }
    Ok(paths)
}

fn file_name(path: &Path) -> Result<String, CliActionError> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            CliActionError::InvalidArgument(format!("{} has no file name", path.display()))
        })
}

fn read_input(path: &Path) -> Result<Vec<u8>, CliActionError> {
    if path.as_os_str() == STDIN_PATH {
        let mut content = Vec::new();
        std::io::stdin().lock().read_to_end(&mut content)?;
        Ok(content)
    } else {
        Ok(std::fs::read(path)?)
    }
}

fn upload_files(context: &CliContext, matches: &ArgMatches) -> Result<(), CliActionError> {
    trace!("Executing 'upload file' command");

    let paths = expand_patterns(matches.get_many::<String>(PARAMETER_FILES).into_iter().flatten())?;
    let name_override = matches.get_one::<String>(PARAMETER_NAME);
    if name_override.is_some() && paths.len() > 1 {
        return Err(CliActionError::InvalidArgument(
            "--name can only be used when uploading a single file".to_string(),
        ));
    }
    let continue_on_error = matches.get_flag(PARAMETER_CONTINUE_ON_ERROR);
    let options = upload_options(matches)?;
    let mwdb = context.connect()?;

    let progress = if matches.get_flag(PARAMETER_PROGRESS) {
        let bar = ProgressBar::new(paths.len() as u64);
        match ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            Ok(style) => bar.set_style(style.progress_chars("#>-")),
            Err(e) => debug!("Falling back to the default progress style: {}", e),
        }
        Some(bar)
    } else {
        None
    };

    let mut uploaded = Vec::new();
    let mut failures = 0usize;
    for path in &paths {
        let name = match name_override {
            Some(name) => name.clone(),
            None => file_name(path)?,
        };
        if let Some(bar) = &progress {
            bar.set_message(name.clone());
        }

        let result = read_input(path).and_then(|content| {
            mwdb.upload_file(&name, content, &options)
                .map_err(CliActionError::from)
        });
        match result {
            Ok(file) => {
                debug!("Uploaded {} as {}", path.display(), file.sha256());
                uploaded.push(ObjectSummary::from_object(&file));
            }
            Err(e) if continue_on_error => {
                failures += 1;
                error!("Failed to upload {}: {}", path.display(), e);
                ceprintln!("<y>Skipping</y> {}: {}", path.display(), e);
            }
            Err(e) => {
                if let Some(bar) = &progress {
                    bar.abandon();
                }
                return Err(e);
            }
        }
        if let Some(bar) = &progress {
            bar.inc(1);
        }
    }
    if let Some(bar) = progress {
        bar.finish_with_message(format!("{} uploaded, {} failed", uploaded.len(), failures));
    }

    context.print(&ObjectList(uploaded))
}

fn upload_config(context: &CliContext, matches: &ArgMatches) -> Result<(), CliActionError> {
    trace!("Executing 'upload config' command");

    let family = matches
        .get_one::<String>(PARAMETER_FAMILY)
        .ok_or_else(|| CliActionError::MissingRequiredArgument(PARAMETER_FAMILY.to_string()))?;
    let path = matches
        .get_one::<PathBuf>(PARAMETER_FILE)
        .ok_or_else(|| CliActionError::MissingRequiredArgument(PARAMETER_FILE.to_string()))?;
    let config_type = matches
        .get_one::<String>(PARAMETER_CONFIG_TYPE)
        .map(String::as_str)
        .unwrap_or("static");

    let cfg = match serde_json::from_slice::<Value>(&read_input(path)?)? {
        Value::Object(cfg) => cfg,
        _ => {
            return Err(CliActionError::InvalidArgument(format!(
                "{} does not contain a JSON object",
                path.display()
            )))
        }
    };

    let options = upload_options(matches)?;
    let mwdb = context.connect()?;
    let config = mwdb.upload_config(family, cfg, config_type, &options)?;
    context.print(&ObjectList(vec![ObjectSummary::from_object(&config)]))
}

fn upload_blob(context: &CliContext, matches: &ArgMatches) -> Result<(), CliActionError> {
    trace!("Executing 'upload blob' command");

    let blob_type = matches
        .get_one::<String>(PARAMETER_BLOB_TYPE)
        .ok_or_else(|| CliActionError::MissingRequiredArgument(PARAMETER_BLOB_TYPE.to_string()))?;
    let path = matches
        .get_one::<PathBuf>(PARAMETER_FILE)
        .ok_or_else(|| CliActionError::MissingRequiredArgument(PARAMETER_FILE.to_string()))?;

    let name = match matches.get_one::<String>(PARAMETER_NAME) {
        Some(name) => name.clone(),
        None if path.as_os_str() == STDIN_PATH => {
            return Err(CliActionError::MissingRequiredArgument(PARAMETER_NAME.to_string()))
        }
        None => file_name(path)?,
    };
    let content = String::from_utf8(read_input(path)?).map_err(|_| {
        CliActionError::InvalidArgument(format!("{} is not valid UTF-8 text", path.display()))
    })?;

    let options = upload_options(matches)?;
    let mwdb = context.connect()?;
    let blob = mwdb.upload_blob(&name, blob_type, &content, &options)?;
    context.print(&ObjectList(vec![ObjectSummary::from_object(&blob)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attribute() {
        let (key, value) = parse_attribute("url=http://evil/x?a=b").unwrap();
        assert_eq!(key, "url");
        assert_eq!(value, Value::from("http://evil/x?a=b"));

        let (_, value) = parse_attribute("ports=[80, 443]").unwrap();
        assert_eq!(value, serde_json::json!([80, 443]));

        assert!(parse_attribute("no-separator").is_err());
        assert!(parse_attribute("=value").is_err());
    }

    #[test]
    fn test_missing_patterns_are_kept() {
        let missing = "definitely/not/here.bin".to_string();
        let paths = expand_patterns([&missing].into_iter()).unwrap();
        assert_eq!(paths, vec![PathBuf::from(&missing)]);
    }

    #[test]
    fn test_glob_expansion() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.exe"), b"MZ").unwrap();
        std::fs::write(dir.path().join("b.exe"), b"MZ").unwrap();
        std::fs::write(dir.path().join("c.txt"), b"text").unwrap();

        let pattern = format!("{}/*.exe", dir.path().display());
        let mut paths = expand_patterns([&pattern].into_iter()).unwrap();
        paths.sort();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("a.exe"));
    }
}
