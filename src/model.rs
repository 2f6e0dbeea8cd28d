use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ServiceError;
use crate::metrics::Metrics;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    #[default]
    Simple,
    Group,
    List,
}

impl AttributeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Group => "group",
            Self::List => "list",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationMethod {
    Exact,
    NumericExact,
    Fuzzy,
    Semantic,
    Llm,
    Hungarian,
}

impl EvaluationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "EXACT",
            Self::NumericExact => "NUMERIC_EXACT",
            Self::Fuzzy => "FUZZY",
            Self::Semantic => "SEMANTIC",
            Self::Llm => "LLM",
            Self::Hungarian => "HUNGARIAN",
        }
    }
}

impl fmt::Display for EvaluationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attribute of a document-class schema, as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "attributeType", alias = "type", default)]
    pub attribute_type: AttributeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_method: Option<EvaluationMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_threshold: Option<f64>,
    /// Method for list item children that do not declare their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hungarian_comparator: Option<EvaluationMethod>,
    #[serde(rename = "groupAttributes", default, skip_serializing_if = "Vec::is_empty")]
    pub group_attributes: Vec<AttributeSpec>,
    #[serde(rename = "listItemTemplate", default, skip_serializing_if = "Option::is_none")]
    pub list_item_template: Option<ListItemTemplate>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListItemTemplate {
    #[serde(rename = "itemAttributes", default)]
    pub item_attributes: Vec<AttributeSpec>,
}

impl AttributeSpec {
    pub fn simple(name: &str, method: EvaluationMethod) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            attribute_type: AttributeType::Simple,
            evaluation_method: Some(method),
            evaluation_threshold: None,
            hungarian_comparator: None,
            group_attributes: Vec::new(),
            list_item_template: None,
        }
    }

    pub fn group(name: &str, children: Vec<AttributeSpec>) -> Self {
        Self {
            attribute_type: AttributeType::Group,
            evaluation_method: None,
            group_attributes: children,
            ..Self::simple(name, EvaluationMethod::Exact)
        }
    }

    pub fn list(name: &str, method: Option<EvaluationMethod>, items: Vec<AttributeSpec>) -> Self {
        Self {
            attribute_type: AttributeType::List,
            evaluation_method: method,
            list_item_template: Some(ListItemTemplate {
                item_attributes: items,
            }),
            ..Self::simple(name, EvaluationMethod::Exact)
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.evaluation_threshold = Some(threshold);
        self
    }

    pub fn item_attributes(&self) -> &[AttributeSpec] {
        self.list_item_template
            .as_ref()
            .map(|template| template.item_attributes.as_slice())
            .unwrap_or(&[])
    }
}

/// The comparator configuration a single leaf resolves to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedAttribute {
    pub name: String,
    pub description: Option<String>,
    pub method: EvaluationMethod,
    pub threshold: Option<f64>,
    pub discovered: bool,
    /// Type of the top-level attribute this leaf belongs to.
    pub root_type: AttributeType,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.to_string()));
        Self(segments)
    }

    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Reporting form, `items[0].price`.
    pub fn display(&self) -> String {
        let mut out = String::new();
        for segment in &self.0 {
            match segment {
                PathSegment::Key(key) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(key);
                }
                PathSegment::Index(index) => {
                    out.push('[');
                    out.push_str(&index.to_string());
                    out.push(']');
                }
            }
        }
        out
    }

    /// Change-tracking form without list indices, `items.price`.
    pub fn tracking_key(&self) -> String {
        self.0
            .iter()
            .filter_map(|segment| match segment {
                PathSegment::Key(key) => Some(key.as_str()),
                PathSegment::Index(_) => None,
            })
            .collect::<Vec<&str>>()
            .join(".")
    }

    /// Replaces the list index at `depth`; other segments are kept.
    pub fn with_index_at(mut self, depth: usize, index: usize) -> Self {
        if let Some(PathSegment::Index(slot)) = self.0.get_mut(depth) {
            *slot = index;
        }
        self
    }

    pub fn leaf_name(&self) -> Option<&str> {
        self.0.iter().rev().find_map(|segment| match segment {
            PathSegment::Key(key) => Some(key.as_str()),
            PathSegment::Index(_) => None,
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedField {
    pub path: FieldPath,
    /// Location of the leaf in the actual tree. List items paired out of order keep their own
    /// index here; `None` when no actual item was paired with the expected one.
    pub actual_path: Option<FieldPath>,
    pub actual: Option<Value>,
    pub expected: Option<Value>,
    pub attribute: ResolvedAttribute,
}

impl FlattenedField {
    pub fn expected_present(&self) -> bool {
        !is_absent(self.expected.as_ref())
    }

    pub fn actual_present(&self) -> bool {
        !is_absent(self.actual.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonOutcome {
    pub matched: bool,
    pub score: f64,
    pub reason: String,
    pub method: EvaluationMethod,
    pub threshold: Option<f64>,
    /// Service error behind a degraded outcome.
    #[serde(skip)]
    pub failure: Option<ServiceError>,
}

impl ComparisonOutcome {
    pub fn new(
        matched: bool,
        score: f64,
        reason: impl Into<String>,
        method: EvaluationMethod,
        threshold: Option<f64>,
    ) -> Self {
        Self {
            matched,
            score: score.clamp(0.0, 1.0),
            reason: reason.into(),
            method,
            threshold,
            failure: None,
        }
    }

    pub fn failed(
        reason: impl Into<String>,
        method: EvaluationMethod,
        threshold: Option<f64>,
        failure: ServiceError,
    ) -> Self {
        Self {
            failure: Some(failure),
            ..Self::not_matched(reason, method, threshold)
        }
    }

    pub fn not_matched(
        reason: impl Into<String>,
        method: EvaluationMethod,
        threshold: Option<f64>,
    ) -> Self {
        Self::new(false, 0.0, reason, method, threshold)
    }
}

/// Null, missing, and blank strings all count as absent.
pub fn is_absent(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(_) => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    StructuralMismatch,
    MissingInput,
    ComparatorFailure,
    Discovery,
    Timeout,
    PageConflict,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentInput {
    pub document_id: String,
    #[serde(default)]
    pub sections: Vec<SectionInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionInput {
    pub section_id: String,
    pub document_class: String,
    #[serde(default)]
    pub actual: Option<Value>,
    #[serde(default)]
    pub expected: Option<Value>,
    #[serde(default)]
    pub confidence: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttributeResult {
    pub name: String,
    pub tracking_key: String,
    pub expected: Option<Value>,
    pub actual: Option<Value>,
    pub matched: bool,
    pub score: f64,
    pub evaluation_method: EvaluationMethod,
    pub evaluation_threshold: Option<f64>,
    pub reason: String,
    /// Actual-tree location when it differs from `name`, as for reordered list items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub attribute_type: AttributeType,
    pub discovered: bool,
    pub evaluated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedPair {
    pub actual_index: usize,
    pub expected_index: usize,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListMatchSummary {
    pub path: String,
    pub pairs: Vec<MatchedPair>,
    pub unmatched_actual: Vec<usize>,
    pub unmatched_expected: Vec<usize>,
    pub total_score: f64,
    pub mean_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionMetrics {
    pub section: Metrics,
    pub by_attribute_type: BTreeMap<String, Metrics>,
    pub by_attribute: BTreeMap<String, Metrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionResult {
    pub section_id: String,
    pub document_class: String,
    pub attributes: Vec<AttributeResult>,
    pub list_matches: Vec<ListMatchSummary>,
    pub metrics: SectionMetrics,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedSection {
    pub section_id: String,
    pub document_class: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentMetrics {
    pub document: Metrics,
    pub by_attribute_type: BTreeMap<String, Metrics>,
    pub by_document_class: BTreeMap<String, Metrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentEvaluationResult {
    pub document_id: String,
    pub sections: Vec<SectionResult>,
    pub skipped_sections: Vec<SkippedSection>,
    pub metrics: DocumentMetrics,
    pub timed_out: bool,
}
