use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::model::{AttributeSpec, AttributeType, EvaluationMethod, ResolvedAttribute};

pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.8;
pub const DEFAULT_SEMANTIC_THRESHOLD: f64 = 0.8;
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_SERVICE_TIMEOUT_MS: u64 = 30_000;

/// Marker carried in the reason of every outcome for an undeclared attribute.
pub const DISCOVERY_MARKER: &str = "[auto-discovered: attribute not declared in configuration]";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub evaluation: EvaluatorSettings,
    #[serde(default)]
    pub classes: Vec<DocumentClassConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentClassConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorSettings {
    /// Method for declared leaves that name none.
    pub default_method: EvaluationMethod,
    /// Method for attributes found in the data but not in the configuration.
    pub discovery_method: EvaluationMethod,
    pub fuzzy_threshold: f64,
    pub semantic_threshold: f64,
    pub max_concurrency: usize,
    pub timeout_ms: u64,
    pub envelope_keys: Vec<String>,
    pub count_both_absent_as_true_negative: bool,
    pub llm: ServiceSettings,
    pub embedding: ServiceSettings,
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            default_method: EvaluationMethod::Exact,
            discovery_method: EvaluationMethod::Llm,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            semantic_threshold: DEFAULT_SEMANTIC_THRESHOLD,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            envelope_keys: vec!["inference_result".to_string()],
            count_both_absent_as_true_negative: false,
            llm: ServiceSettings::default(),
            embedding: ServiceSettings::default(),
        }
    }
}

impl EvaluatorSettings {
    pub fn default_threshold(&self, method: EvaluationMethod) -> Option<f64> {
        match method {
            EvaluationMethod::Fuzzy => Some(self.fuzzy_threshold),
            EvaluationMethod::Semantic => Some(self.semantic_threshold),
            EvaluationMethod::Exact
            | EvaluationMethod::NumericExact
            | EvaluationMethod::Llm
            | EvaluationMethod::Hungarian => None,
        }
    }
}

/// Connection settings for an external model service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    /// Name of the environment variable holding the bearer token.
    pub api_key_env: Option<String>,
    pub timeout_ms: u64,
    pub dimensions: Option<usize>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: None,
            api_key_env: None,
            timeout_ms: DEFAULT_SERVICE_TIMEOUT_MS,
            dimensions: None,
        }
    }
}

impl ExtractionConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: ExtractionConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn class(&self, name: &str) -> Option<&DocumentClassConfig> {
        self.classes
            .iter()
            .find(|class| class.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn validate(&self) -> Result<()> {
        validate_settings(&self.evaluation)?;

        let mut class_names = HashSet::<String>::new();
        for class in &self.classes {
            let class_name = class.name.trim();
            if class_name.is_empty() {
                return Err(EvalError::configuration("classes", "class name is empty"));
            }
            if !class_names.insert(class_name.to_ascii_lowercase()) {
                return Err(EvalError::configuration(
                    class_name,
                    "duplicate document class name",
                ));
            }
            validate_class(class)?;
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<ExtractionConfig> {
    let raw = fs::read_to_string(path)?;
    ExtractionConfig::from_json_str(&raw)
}

pub fn validate_class(class: &DocumentClassConfig) -> Result<()> {
    validate_siblings(&class.name, &class.attributes)
}

fn validate_settings(settings: &EvaluatorSettings) -> Result<()> {
    for (name, value) in [
        ("fuzzy_threshold", settings.fuzzy_threshold),
        ("semantic_threshold", settings.semantic_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(EvalError::configuration(
                format!("evaluation.{name}"),
                format!("threshold {value} is outside [0, 1]"),
            ));
        }
    }

    for (name, method) in [
        ("default_method", settings.default_method),
        ("discovery_method", settings.discovery_method),
    ] {
        if method == EvaluationMethod::Hungarian {
            return Err(EvalError::configuration(
                format!("evaluation.{name}"),
                "HUNGARIAN only applies to list attributes",
            ));
        }
    }

    if settings.max_concurrency == 0 {
        return Err(EvalError::configuration(
            "evaluation.max_concurrency",
            "must be at least 1",
        ));
    }

    Ok(())
}

fn validate_siblings(parent: &str, attributes: &[AttributeSpec]) -> Result<()> {
    let mut names = HashSet::<&str>::new();
    for attribute in attributes {
        let name = attribute.name.trim();
        if name.is_empty() {
            return Err(EvalError::configuration(parent, "attribute name is empty"));
        }
        if !names.insert(name) {
            return Err(EvalError::configuration(
                format!("{parent}.{name}"),
                "duplicate attribute name",
            ));
        }
        validate_attribute(&format!("{parent}.{name}"), attribute)?;
    }
    Ok(())
}

fn validate_attribute(path: &str, attribute: &AttributeSpec) -> Result<()> {
    if let Some(threshold) = attribute.evaluation_threshold
        && !(0.0..=1.0).contains(&threshold)
    {
        return Err(EvalError::configuration(
            path,
            format!("evaluation_threshold {threshold} is outside [0, 1]"),
        ));
    }

    match attribute.attribute_type {
        AttributeType::Simple => {
            if !attribute.group_attributes.is_empty() || attribute.list_item_template.is_some() {
                return Err(EvalError::configuration(
                    path,
                    "simple attribute declares nested attributes",
                ));
            }
            if attribute.evaluation_method == Some(EvaluationMethod::Hungarian) {
                return Err(EvalError::configuration(
                    path,
                    "HUNGARIAN only applies to list attributes",
                ));
            }
            Ok(())
        }
        AttributeType::Group => {
            if attribute.group_attributes.is_empty() {
                return Err(EvalError::configuration(
                    path,
                    "group attribute has no groupAttributes",
                ));
            }
            if attribute.evaluation_method == Some(EvaluationMethod::Hungarian) {
                return Err(EvalError::configuration(
                    path,
                    "HUNGARIAN only applies to list attributes",
                ));
            }
            validate_siblings(path, &attribute.group_attributes)
        }
        AttributeType::List => {
            if attribute.item_attributes().is_empty() {
                return Err(EvalError::configuration(
                    path,
                    "list attribute has no listItemTemplate.itemAttributes",
                ));
            }
            if let Some(method) = attribute.evaluation_method
                && method != EvaluationMethod::Hungarian
            {
                return Err(EvalError::configuration(
                    path,
                    format!("list attribute cannot use {method}; use HUNGARIAN or omit the method"),
                ));
            }
            if attribute.hungarian_comparator == Some(EvaluationMethod::Hungarian) {
                return Err(EvalError::configuration(
                    path,
                    "hungarian_comparator must be a leaf method",
                ));
            }
            validate_siblings(path, attribute.item_attributes())
        }
    }
}

/// Resolves the comparator every leaf path uses.
#[derive(Debug, Clone, Copy)]
pub struct AttributeConfigResolver<'a> {
    settings: &'a EvaluatorSettings,
}

impl<'a> AttributeConfigResolver<'a> {
    pub fn new(settings: &'a EvaluatorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &'a EvaluatorSettings {
        self.settings
    }

    /// `inherited` is the enclosing list's sub-comparator, if any.
    pub fn resolve_declared(
        &self,
        spec: &AttributeSpec,
        inherited: Option<EvaluationMethod>,
        root_type: AttributeType,
    ) -> ResolvedAttribute {
        let method = spec
            .evaluation_method
            .or(inherited)
            .unwrap_or(self.settings.default_method);
        ResolvedAttribute {
            name: spec.name.clone(),
            description: spec.description.clone(),
            method,
            threshold: spec
                .evaluation_threshold
                .or_else(|| self.settings.default_threshold(method)),
            discovered: false,
            root_type,
        }
    }

    pub fn resolve_discovered(&self, name: &str, root_type: AttributeType) -> ResolvedAttribute {
        let method = self.settings.discovery_method;
        ResolvedAttribute {
            name: name.to_string(),
            description: None,
            method,
            threshold: self.settings.default_threshold(method),
            discovered: true,
            root_type,
        }
    }
}
