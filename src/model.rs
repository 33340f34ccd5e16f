//! Printable views of MWDB objects and their sub-resources.
//!
//! Views are built from data already cached on the objects, so formatting
//! never triggers requests on its own.

use crate::comment::Comment;
use crate::format::{
    format_records, render_tree, to_json, CsvRecordProducer, Formattable, FormattingError,
    OutputFormat,
};
use crate::karton::KartonAnalysis;
use crate::object::{Object, ObjectKind, ObjectState};
use crate::share::Share;
use ptree::TreeBuilder;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

fn string_field(state: &ObjectState, key: &str) -> Option<String> {
    state.fields().get(key).and_then(Value::as_str).map(str::to_string)
}

/// CSV cell for an arbitrary JSON value
fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// One line description of an object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// File type, config type or blob type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_time: Option<String>,
}

impl ObjectSummary {
    pub fn from_object<O: Object + ?Sized>(object: &O) -> ObjectSummary {
        let state = object.state();
        let (name, size, description) = match state.kind() {
            ObjectKind::File => ("file_name", Some("file_size"), "file_type"),
            ObjectKind::Config => ("family", None, "config_type"),
            ObjectKind::Blob => ("blob_name", Some("blob_size"), "blob_type"),
        };

        ObjectSummary {
            id: state.id().to_string(),
            kind: state.kind().to_string(),
            name: string_field(state, name),
            size: size.and_then(|key| state.fields().get(key).and_then(Value::as_u64)),
            description: string_field(state, description),
            upload_time: string_field(state, "upload_time"),
        }
    }

    fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} {} ({})", self.kind, self.id, name),
            None => format!("{} {}", self.kind, self.id),
        }
    }

    fn record(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.kind.clone(),
            self.name.clone().unwrap_or_default(),
            self.size.map(|size| size.to_string()).unwrap_or_default(),
            self.description.clone().unwrap_or_default(),
            self.upload_time.clone().unwrap_or_default(),
        ]
    }

    fn header() -> Vec<String> {
        ["ID", "TYPE", "NAME", "SIZE", "DESCRIPTION", "UPLOAD_TIME"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ObjectList(pub Vec<ObjectSummary>);

impl FromIterator<ObjectSummary> for ObjectList {
    fn from_iter<I: IntoIterator<Item = ObjectSummary>>(iter: I) -> Self {
        ObjectList(iter.into_iter().collect())
    }
}

impl CsvRecordProducer for ObjectList {
    fn csv_header() -> Vec<String> {
        ObjectSummary::header()
    }

    fn as_csv_records(&self) -> Vec<Vec<String>> {
        self.0.iter().map(ObjectSummary::record).collect()
    }
}

impl Formattable for ObjectList {
    fn format(&self, f: &OutputFormat) -> Result<String, FormattingError> {
        format_records(self, f)
    }
}

/// Flat field listing, used for object details and server metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldMap(pub Map<String, Value>);

impl CsvRecordProducer for FieldMap {
    fn csv_header() -> Vec<String> {
        vec!["FIELD".to_string(), "VALUE".to_string()]
    }

    fn as_csv_records(&self) -> Vec<Vec<String>> {
        self.0
            .iter()
            .map(|(key, value)| vec![key.clone(), cell(value)])
            .collect()
    }
}

impl Formattable for FieldMap {
    fn format(&self, f: &OutputFormat) -> Result<String, FormattingError> {
        format_records(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TagList(pub Vec<String>);

impl CsvRecordProducer for TagList {
    fn csv_header() -> Vec<String> {
        vec!["TAG".to_string()]
    }

    fn as_csv_records(&self) -> Vec<Vec<String>> {
        self.0.iter().map(|tag| vec![tag.clone()]).collect()
    }
}

impl Formattable for TagList {
    fn format(&self, f: &OutputFormat) -> Result<String, FormattingError> {
        format_records(self, f)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct CommentList(pub Vec<Comment>);

impl CsvRecordProducer for CommentList {
    fn csv_header() -> Vec<String> {
        ["ID", "AUTHOR", "TIMESTAMP", "COMMENT"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn as_csv_records(&self) -> Vec<Vec<String>> {
        self.0
            .iter()
            .map(|comment| {
                vec![
                    comment.id.to_string(),
                    comment.author.clone(),
                    comment.timestamp.to_rfc3339(),
                    comment.comment.clone(),
                ]
            })
            .collect()
    }
}

impl Formattable for CommentList {
    fn format(&self, f: &OutputFormat) -> Result<String, FormattingError> {
        format_records(self, f)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct ShareList(pub Vec<Share>);

impl CsvRecordProducer for ShareList {
    fn csv_header() -> Vec<String> {
        ["GROUP", "ACCESS_TIME", "REASON", "USER", "RELATED_TYPE", "RELATED_ID"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn as_csv_records(&self) -> Vec<Vec<String>> {
        self.0
            .iter()
            .map(|share| {
                vec![
                    share.group_name.clone(),
                    share.access_time.to_rfc3339(),
                    share.reason.why().to_string(),
                    share.reason.who().to_string(),
                    share.reason.related_object_type.clone(),
                    share.reason.related_object_dhash.clone(),
                ]
            })
            .collect()
    }
}

impl Formattable for ShareList {
    fn format(&self, f: &OutputFormat) -> Result<String, FormattingError> {
        format_records(self, f)
    }
}

/// Attribute values grouped by key
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AttributeList(pub BTreeMap<String, Vec<Value>>);

impl CsvRecordProducer for AttributeList {
    fn csv_header() -> Vec<String> {
        vec!["KEY".to_string(), "VALUE".to_string()]
    }

    fn as_csv_records(&self) -> Vec<Vec<String>> {
        self.0
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |value| vec![key.clone(), cell(value)]))
            .collect()
    }
}

impl Formattable for AttributeList {
    fn format(&self, f: &OutputFormat) -> Result<String, FormattingError> {
        format_records(self, f)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct AnalysisList(pub Vec<KartonAnalysis>);

impl CsvRecordProducer for AnalysisList {
    fn csv_header() -> Vec<String> {
        ["ID", "STATUS", "LAST_UPDATE", "PROCESSING_IN"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn as_csv_records(&self) -> Vec<Vec<String>> {
        self.0
            .iter()
            .map(|analysis| {
                let processing_in: Vec<&str> =
                    analysis.processing_in.keys().map(String::as_str).collect();
                vec![
                    analysis.id.clone(),
                    analysis.status.clone(),
                    analysis
                        .last_update
                        .map(|time| time.to_rfc3339())
                        .unwrap_or_default(),
                    processing_in.join(";"),
                ]
            })
            .collect()
    }
}

impl Formattable for AnalysisList {
    fn format(&self, f: &OutputFormat) -> Result<String, FormattingError> {
        format_records(self, f)
    }
}

/// An object with its parents and/or children
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationTree {
    pub object: ObjectSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<ObjectSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<ObjectSummary>>,
}

impl RelationTree {
    fn branches(&self) -> impl Iterator<Item = (&'static str, &Vec<ObjectSummary>)> {
        [("parents", &self.parents), ("children", &self.children)]
            .into_iter()
            .filter_map(|(name, branch)| branch.as_ref().map(|branch| (name, branch)))
    }
}

impl CsvRecordProducer for RelationTree {
    fn csv_header() -> Vec<String> {
        let mut header = vec!["RELATION".to_string()];
        header.extend(ObjectSummary::header());
        header
    }

    fn as_csv_records(&self) -> Vec<Vec<String>> {
        let relation = |name: &str, summary: &ObjectSummary| {
            let mut record = vec![name.to_string()];
            record.extend(summary.record());
            record
        };
        self.branches()
            .flat_map(|(name, branch)| {
                let name = if name == "parents" { "parent" } else { "child" };
                branch.iter().map(move |summary| relation(name, summary))
            })
            .collect()
    }
}

impl Formattable for RelationTree {
    fn format(&self, f: &OutputFormat) -> Result<String, FormattingError> {
        match f {
            OutputFormat::Json(options) => to_json(self, options),
            OutputFormat::Csv(options) => self.to_csv(options.with_headers),
            OutputFormat::Tree(_) => {
                let mut tree = TreeBuilder::new(self.object.label());
                for (name, branch) in self.branches() {
                    tree.begin_child(name.to_string());
                    for summary in branch {
                        tree.add_empty_child(summary.label());
                    }
                    tree.end_child();
                }
                render_tree(&tree.build())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::OutputFormatOptions;

    fn summary(id: &str, kind: &str, name: Option<&str>) -> ObjectSummary {
        ObjectSummary {
            id: id.to_string(),
            kind: kind.to_string(),
            name: name.map(str::to_string),
            size: None,
            description: None,
            upload_time: None,
        }
    }

    #[test]
    fn test_attribute_rows_are_flattened() {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            "url".to_string(),
            vec![Value::from("http://a"), Value::from("http://b")],
        );
        attributes.insert("score".to_string(), vec![Value::from(7)]);

        let records = AttributeList(attributes).as_csv_records();
        assert_eq!(
            records,
            vec![
                vec!["score".to_string(), "7".to_string()],
                vec!["url".to_string(), "http://a".to_string()],
                vec!["url".to_string(), "http://b".to_string()],
            ]
        );
    }

    #[test]
    fn test_relation_tree_rendering() {
        let tree = RelationTree {
            object: summary("abc", "file", Some("sample.exe")),
            parents: None,
            children: Some(vec![summary("def", "static_config", Some("emotet"))]),
        };

        let rendered = tree
            .format(&OutputFormat::Tree(OutputFormatOptions::default()))
            .unwrap();
        assert!(rendered.starts_with("file abc (sample.exe)"));
        assert!(rendered.contains("children"));
        assert!(rendered.contains("static_config def (emotet)"));
        assert!(!rendered.contains("parents"));

        let csv = tree.to_csv(false).unwrap();
        assert_eq!(csv, "child,def,static_config,emotet,,,\n");
    }

    #[test]
    fn test_summary_list_json() {
        let list = ObjectList(vec![summary("abc", "text_blob", None)]);
        let json = list
            .format(&OutputFormat::Json(OutputFormatOptions::default()))
            .unwrap();
        assert_eq!(json, r#"[{"id":"abc","type":"text_blob"}]"#);
    }
}
