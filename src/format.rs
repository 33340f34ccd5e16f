//! Output formatting for the command line client.
//!
//! Results are printed as JSON, CSV or, for object relations, as a tree.

use csv::Writer;
use ptree::TreeItem;
use serde::Serialize;
use std::str::FromStr;
use strum::EnumIter;

pub const JSON: &str = "json";
pub const CSV: &str = "csv";
pub const TREE: &str = "tree";

/// Error types that can occur during formatting operations
#[derive(Debug, thiserror::Error)]
pub enum FormattingError {
    /// Error when an unsupported output format is requested
    #[error("invalid output format {0}")]
    UnsupportedOutputFormat(String),
    /// General error when formatting fails
    #[error("failed to format output due to: {cause}")]
    FormatFailure { cause: Box<dyn std::error::Error> },
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),
    #[error("JSON serialization error: {0}")]
    JsonSerializationError(#[from] serde_json::Error),
    #[error("CSV writer into inner error: {0}")]
    CsvIntoInnerError(#[from] csv::IntoInnerError<csv::Writer<Vec<u8>>>),
}

#[derive(Debug, Clone, Default, PartialEq, PartialOrd)]
pub struct OutputFormatOptions {
    pub with_headers: bool,
    pub pretty: bool,
}

/// Enum representing the supported output formats
#[derive(Debug, Clone, PartialEq, PartialOrd, EnumIter)]
pub enum OutputFormat {
    Csv(OutputFormatOptions),
    Json(OutputFormatOptions),
    /// Tree format for object relations
    Tree(OutputFormatOptions),
}

impl OutputFormat {
    /// Returns a vector of all supported format names as strings
    pub fn names() -> Vec<&'static str> {
        vec![JSON, CSV, TREE]
    }

    pub fn from_string_with_options(
        format_str: &str,
        options: OutputFormatOptions,
    ) -> Result<OutputFormat, FormattingError> {
        let normalized_format = format_str.to_lowercase();
        match normalized_format.as_str() {
            JSON => Ok(OutputFormat::Json(options)),
            CSV => Ok(OutputFormat::Csv(options)),
            TREE => Ok(OutputFormat::Tree(options)),
            _ => Err(FormattingError::UnsupportedOutputFormat(normalized_format)),
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Json(OutputFormatOptions::default())
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            OutputFormat::Csv(_) => write!(f, "{}", CSV),
            OutputFormat::Json(_) => write!(f, "{}", JSON),
            OutputFormat::Tree(_) => write!(f, "{}", TREE),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = FormattingError;

    fn from_str(format_str: &str) -> Result<OutputFormat, FormattingError> {
        Self::from_string_with_options(format_str, OutputFormatOptions::default())
    }
}

/// Trait for producing CSV records from data
pub trait CsvRecordProducer {
    /// Returns the header row for the CSV output
    fn csv_header() -> Vec<String>;

    /// Converts the data into CSV records
    fn as_csv_records(&self) -> Vec<Vec<String>>;

    /// Produces CSV output with or without a header row
    fn to_csv(&self, with_header: bool) -> Result<String, FormattingError> {
        let mut wtr = Writer::from_writer(vec![]);
        if with_header {
            wtr.write_record(Self::csv_header())?;
        }
        for record in self.as_csv_records() {
            wtr.write_record(&record)?;
        }
        Ok(String::from_utf8(wtr.into_inner()?)?)
    }
}

pub trait Formattable {
    fn format(&self, f: &OutputFormat) -> Result<String, FormattingError>;
}

pub fn to_json<T: Serialize + ?Sized>(
    value: &T,
    options: &OutputFormatOptions,
) -> Result<String, FormattingError> {
    if options.pretty {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(serde_json::to_string(value)?)
    }
}

/// Formats tabular data, which has no tree representation
pub fn format_records<T>(value: &T, f: &OutputFormat) -> Result<String, FormattingError>
where
    T: Serialize + CsvRecordProducer,
{
    match f {
        OutputFormat::Json(options) => to_json(value, options),
        OutputFormat::Csv(options) => value.to_csv(options.with_headers),
        OutputFormat::Tree(_) => Err(FormattingError::UnsupportedOutputFormat(f.to_string())),
    }
}

/// Renders a tree into a string
pub fn render_tree<T: TreeItem>(tree: &T) -> Result<String, FormattingError> {
    let mut buffer = Vec::new();
    ptree::write_tree_with(tree, &mut buffer, &ptree::PrintConfig::default())
        .map_err(|e| FormattingError::FormatFailure { cause: Box::new(e) })?;
    Ok(String::from_utf8(buffer)?)
}
