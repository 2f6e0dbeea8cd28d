//! Document-level evaluation: sections, bounded concurrency, deadline handling and confidence
//! annotation around the flatten → compare → aggregate pipeline.

use std::time::{Duration, Instant};

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::compare::{ComparatorSuite, HungarianAligner};
use crate::config::{AttributeConfigResolver, ExtractionConfig};
use crate::error::{EvalError, Result};
use crate::flatten::{TreeFlattener, unwrap_envelope};
use crate::metrics::MetricsAggregator;
use crate::model::{
    AttributeResult, AttributeSpec, Diagnostic, DiagnosticKind, DocumentEvaluationResult,
    DocumentInput, FieldPath, FlattenedField, PathSegment, SectionInput, SectionResult,
    SkippedSection, is_absent,
};
use crate::service::{embedding_provider_from_settings, llm_client_from_settings};

pub const NOT_EVALUATED_REASON: &str = "not evaluated: evaluation deadline passed";

pub struct Evaluator {
    config: ExtractionConfig,
    suite: ComparatorSuite,
}

impl Evaluator {
    /// Rejects invalid configurations before any section is flattened.
    pub fn new(config: ExtractionConfig, suite: ComparatorSuite) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, suite })
    }

    /// Builds the comparator suite from the service settings in `config`.
    pub fn from_config(config: ExtractionConfig) -> Result<Self> {
        let settings = &config.evaluation;
        let embedder = embedding_provider_from_settings(&settings.embedding)
            .map_err(|err| EvalError::configuration("evaluation.embedding", err.to_string()))?;
        let llm = llm_client_from_settings(&settings.llm)
            .map_err(|err| EvalError::configuration("evaluation.llm", err.to_string()))?;
        Self::new(config, ComparatorSuite::new(embedder, llm))
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn evaluate_document(&self, document: &DocumentInput) -> DocumentEvaluationResult {
        let settings = &self.config.evaluation;
        let deadline = Instant::now() + Duration::from_millis(settings.timeout_ms);

        match ThreadPoolBuilder::new()
            .num_threads(settings.max_concurrency)
            .build()
        {
            Ok(pool) => pool.install(|| self.evaluate_sections(document, deadline)),
            Err(err) => {
                warn!(
                    error = %err,
                    "failed to build comparison thread pool; evaluating on the global pool"
                );
                self.evaluate_sections(document, deadline)
            }
        }
    }

    fn evaluate_sections(
        &self,
        document: &DocumentInput,
        deadline: Instant,
    ) -> DocumentEvaluationResult {
        let aggregator = MetricsAggregator::new(
            self.config.evaluation.count_both_absent_as_true_negative,
        );
        let mut sections = Vec::with_capacity(document.sections.len());
        let mut skipped_sections = Vec::new();

        for section in &document.sections {
            if let Some(error) = missing_input(section) {
                warn!(document = %document.document_id, error = %error, "section skipped");
                skipped_sections.push(SkippedSection {
                    section_id: section.section_id.clone(),
                    document_class: section.document_class.clone(),
                    reason: error.to_string(),
                });
                continue;
            }
            sections.push(self.evaluate_section(section, deadline, &aggregator));
        }

        let metrics = aggregator.document_metrics(&sections);
        let timed_out = sections
            .iter()
            .flat_map(|section| &section.attributes)
            .any(|attribute| !attribute.evaluated);
        info!(
            document = %document.document_id,
            sections = sections.len(),
            skipped = skipped_sections.len(),
            precision = ?metrics.document.precision,
            recall = ?metrics.document.recall,
            f1 = ?metrics.document.f1,
            timed_out,
            "document evaluated"
        );

        DocumentEvaluationResult {
            document_id: document.document_id.clone(),
            sections,
            skipped_sections,
            metrics,
            timed_out,
        }
    }

    fn evaluate_section(
        &self,
        section: &SectionInput,
        deadline: Instant,
        aggregator: &MetricsAggregator,
    ) -> SectionResult {
        let settings = &self.config.evaluation;
        let mut diagnostics = Vec::new();

        let (document_class, attributes): (&str, &[AttributeSpec]) =
            match self.config.class(&section.document_class) {
                Some(class) => (class.name.as_str(), class.attributes.as_slice()),
                None => {
                    warn!(
                        section = %section.section_id,
                        document_class = %section.document_class,
                        "document class not configured; every attribute is discovered"
                    );
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::Discovery,
                        "",
                        format!(
                            "document class {} is not configured; all attributes use {}",
                            section.document_class, settings.discovery_method
                        ),
                    ));
                    (section.document_class.as_str(), [].as_slice())
                }
            };

        let aligner = HungarianAligner::new(&self.suite, Some(document_class), Some(deadline));
        let flattener = TreeFlattener::new(AttributeConfigResolver::new(settings), &aligner);
        let tree = flattener.flatten(
            attributes,
            section.actual.as_ref(),
            section.expected.as_ref(),
        );
        diagnostics.extend(tree.diagnostics.iter().cloned());
        let list_matches = tree.list_matches.clone();

        let confidence = section
            .confidence
            .as_ref()
            .map(|value| unwrap_envelope(value, &settings.envelope_keys));
        let evaluated = tree
            .fields()
            .par_iter()
            .map(|field| {
                let (mut result, failure) = evaluate_field(&aligner, field, deadline);
                result.confidence = confidence
                    .zip(field.actual_path.as_ref())
                    .and_then(|(value, path)| confidence_for(value, path));
                (result, failure)
            })
            .collect::<Vec<(AttributeResult, Option<Diagnostic>)>>();

        let mut results = Vec::with_capacity(evaluated.len());
        for (result, failure) in evaluated {
            diagnostics.extend(failure);
            results.push(result);
        }

        let skipped = results.iter().filter(|result| !result.evaluated).count();
        if skipped > 0 {
            warn!(
                section = %section.section_id,
                skipped,
                "evaluation deadline passed; remaining fields not compared"
            );
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::Timeout,
                "",
                format!("{skipped} field(s) not compared before the evaluation deadline"),
            ));
        }

        let metrics = aggregator.section_metrics(&results);
        debug!(
            section = %section.section_id,
            document_class,
            fields = results.len(),
            f1 = ?metrics.section.f1,
            "section evaluated"
        );

        SectionResult {
            section_id: section.section_id.clone(),
            document_class: document_class.to_string(),
            attributes: results,
            list_matches,
            metrics,
            diagnostics,
        }
    }
}

/// Compares one leaf unless the deadline has passed; a degraded outcome yields a diagnostic.
fn evaluate_field(
    aligner: &HungarianAligner<'_>,
    field: &FlattenedField,
    deadline: Instant,
) -> (AttributeResult, Option<Diagnostic>) {
    let attribute = &field.attribute;
    let mut result = AttributeResult {
        name: field.path.display(),
        tracking_key: field.path.tracking_key(),
        expected: field.expected.clone(),
        actual: field.actual.clone(),
        matched: false,
        score: 0.0,
        evaluation_method: attribute.method,
        evaluation_threshold: attribute.threshold,
        reason: NOT_EVALUATED_REASON.to_string(),
        actual_path: field
            .actual_path
            .as_ref()
            .filter(|path| **path != field.path)
            .map(FieldPath::display),
        confidence: None,
        attribute_type: attribute.root_type,
        discovered: attribute.discovered,
        evaluated: false,
    };
    if Instant::now() >= deadline {
        return (result, None);
    }

    let outcome = aligner.compare_field(field);
    let failure = outcome.failure.clone().map(|source| {
        let error = EvalError::ComparatorFailure {
            method: outcome.method.to_string(),
            source,
        };
        Diagnostic::new(
            DiagnosticKind::ComparatorFailure,
            field.path.display(),
            error.to_string(),
        )
    });

    result.matched = outcome.matched;
    result.score = outcome.score;
    result.evaluation_threshold = outcome.threshold;
    result.reason = outcome.reason;
    result.evaluated = true;
    (result, failure)
}

fn missing_input(section: &SectionInput) -> Option<EvalError> {
    let message = match (
        is_absent(section.actual.as_ref()),
        is_absent(section.expected.as_ref()),
    ) {
        (true, true) => "actual and expected data are both missing",
        (true, false) => "actual data is missing",
        (false, true) => "expected data is missing",
        (false, false) => return None,
    };
    Some(EvalError::MissingInput {
        section_id: section.section_id.clone(),
        message: message.to_string(),
    })
}

/// Confidence for `path`, from a flat map keyed by display path or from a tree mirroring the data.
pub fn confidence_for(confidence: &Value, path: &FieldPath) -> Option<f64> {
    if let Some(found) = confidence
        .as_object()
        .and_then(|object| object.get(&path.display()))
        .and_then(confidence_value)
    {
        return Some(found);
    }

    let mut current = confidence;
    for segment in path.segments() {
        current = match segment {
            PathSegment::Key(key) => current.get(key.as_str())?,
            PathSegment::Index(index) => current.get(*index)?,
        };
    }
    confidence_value(current)
}

fn confidence_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::Object(object) => object.get("confidence").and_then(Value::as_f64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::compare::{LlmClient, UnconfiguredLlm};
    use crate::config::{DISCOVERY_MARKER, DocumentClassConfig, EvaluatorSettings};
    use crate::error::ServiceError;
    use crate::model::{AttributeType, EvaluationMethod};
    use crate::semantic::LocalHashEmbedder;

    struct AlwaysMatch;

    impl LlmClient for AlwaysMatch {
        fn complete(&self, _prompt: &str) -> std::result::Result<String, ServiceError> {
            Ok("{\"match\": true, \"score\": 1.0, \"reason\": \"equivalent\"}".to_string())
        }
    }

    /// Matches when both values in the prompt are equal; counts calls and can be slowed down.
    struct EchoLlm {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl EchoLlm {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl LlmClient for EchoLlm {
        fn complete(&self, prompt: &str) -> std::result::Result<String, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            let value = |label: &str| prompt.lines().find_map(|line| line.strip_prefix(label));
            let matched = value("Expected value: ") == value("Extracted value: ");
            Ok(format!("{{\"match\": {matched}}}"))
        }
    }

    fn llm_items_evaluator(settings: EvaluatorSettings, llm: Arc<dyn LlmClient>) -> Evaluator {
        let config = ExtractionConfig {
            evaluation: settings,
            classes: vec![DocumentClassConfig {
                name: "Invoice".to_string(),
                description: None,
                attributes: vec![AttributeSpec::list(
                    "Items",
                    Some(EvaluationMethod::Hungarian),
                    vec![AttributeSpec::simple("Sku", EvaluationMethod::Llm)],
                )],
            }],
        };
        let suite = ComparatorSuite::new(Arc::new(LocalHashEmbedder::default()), llm);
        Evaluator::new(config, suite).expect("valid configuration")
    }

    fn skus(values: &[&str]) -> Value {
        Value::Array(values.iter().map(|sku| json!({"Sku": sku})).collect())
    }

    fn invoice_config(settings: EvaluatorSettings) -> ExtractionConfig {
        ExtractionConfig {
            evaluation: settings,
            classes: vec![DocumentClassConfig {
                name: "Invoice".to_string(),
                description: None,
                attributes: vec![
                    AttributeSpec::simple("Amount", EvaluationMethod::NumericExact),
                    AttributeSpec::group(
                        "Vendor",
                        vec![AttributeSpec::simple("Name", EvaluationMethod::Fuzzy)],
                    ),
                    AttributeSpec::list(
                        "Items",
                        Some(EvaluationMethod::Hungarian),
                        vec![AttributeSpec::simple("Sku", EvaluationMethod::Exact)],
                    ),
                ],
            }],
        }
    }

    fn evaluator_with(settings: EvaluatorSettings, llm: Arc<dyn LlmClient>) -> Evaluator {
        let suite = ComparatorSuite::new(Arc::new(LocalHashEmbedder::default()), llm);
        Evaluator::new(invoice_config(settings), suite).expect("valid configuration")
    }

    fn document(sections: Vec<Value>) -> DocumentInput {
        serde_json::from_value(json!({"document_id": "doc-1", "sections": sections}))
            .expect("document input")
    }

    #[test]
    fn currency_formatted_amount_matches_numerically() {
        let evaluator = evaluator_with(EvaluatorSettings::default(), Arc::new(UnconfiguredLlm));
        let result = evaluator.evaluate_document(&document(vec![json!({
            "section_id": "s1",
            "document_class": "Invoice",
            "actual": {"Amount": "$10.00"},
            "expected": {"Amount": "10.00"}
        })]));

        let amount = &result.sections[0].attributes[0];
        assert_eq!(amount.name, "Amount");
        assert!(amount.matched);
        assert_eq!(amount.score, 1.0);
        assert_eq!(amount.evaluation_method, EvaluationMethod::NumericExact);
        assert_eq!(result.metrics.document.true_positive, 1);
        assert!(!result.timed_out);
    }

    #[test]
    fn undeclared_attributes_use_llm_with_discovery_marker() {
        let evaluator = evaluator_with(EvaluatorSettings::default(), Arc::new(AlwaysMatch));
        let result = evaluator.evaluate_document(&document(vec![json!({
            "section_id": "s1",
            "document_class": "invoice",
            "actual": {"Amount": "1", "PaymentTerms": "Net 30"},
            "expected": {"Amount": "1", "PaymentTerms": "30 days net"}
        })]));

        let section = &result.sections[0];
        assert_eq!(section.document_class, "Invoice");
        let terms = section
            .attributes
            .iter()
            .find(|attribute| attribute.name == "PaymentTerms")
            .expect("discovered attribute evaluated");
        assert!(terms.discovered);
        assert!(terms.matched);
        assert_eq!(terms.evaluation_method, EvaluationMethod::Llm);
        assert!(terms.reason.contains(DISCOVERY_MARKER));
    }

    #[test]
    fn hungarian_lists_and_missing_values_feed_metrics() {
        let evaluator = evaluator_with(EvaluatorSettings::default(), Arc::new(UnconfiguredLlm));
        let result = evaluator.evaluate_document(&document(vec![json!({
            "section_id": "s1",
            "document_class": "Invoice",
            "actual": {
                "Amount": "5",
                "Items": [{"Sku": "B"}, {"Sku": "A"}, {"Sku": "Z"}]
            },
            "expected": {
                "Amount": "5",
                "Vendor": {"Name": "Acme"},
                "Items": [{"Sku": "A"}, {"Sku": "B"}]
            }
        })]));

        let section = &result.sections[0];
        let names = section
            .attributes
            .iter()
            .map(|attribute| attribute.name.as_str())
            .collect::<Vec<&str>>();
        assert_eq!(
            names,
            vec!["Amount", "Vendor.Name", "Items[0].Sku", "Items[1].Sku", "Items[2].Sku"]
        );

        let counts = section.metrics.section.counts();
        assert_eq!(counts.true_positive, 3);
        assert_eq!(counts.false_negative, 1);
        assert_eq!(counts.false_positive, 1);
        assert_eq!(section.list_matches[0].unmatched_actual, vec![2]);
        assert_eq!(section.list_matches[0].mean_score, Some(1.0));

        let list = &section.metrics.by_attribute_type["list"];
        assert_eq!(list.true_positive, 2);
        assert_eq!(list.false_positive, 1);
        assert_eq!(section.metrics.by_attribute["Items.Sku"].true_positive, 2);
        assert_eq!(section.attributes[1].attribute_type, AttributeType::Group);
    }

    #[test]
    fn missing_sections_are_skipped_and_others_still_aggregate() {
        let evaluator = evaluator_with(EvaluatorSettings::default(), Arc::new(UnconfiguredLlm));
        let result = evaluator.evaluate_document(&document(vec![
            json!({
                "section_id": "s1",
                "document_class": "Invoice",
                "actual": {"Amount": "1"}
            }),
            json!({
                "section_id": "s2",
                "document_class": "Invoice",
                "actual": {"Amount": "1"},
                "expected": {"Amount": "2"}
            }),
        ]));

        assert_eq!(result.skipped_sections.len(), 1);
        assert_eq!(result.skipped_sections[0].section_id, "s1");
        assert!(result.skipped_sections[0].reason.contains("expected data is missing"));
        assert_eq!(result.sections.len(), 1);
        assert_eq!(result.metrics.document.false_negative, 1);
        assert_eq!(result.metrics.by_document_class["Invoice"].false_negative, 1);
    }

    #[test]
    fn comparator_failures_become_diagnostics() {
        let evaluator = evaluator_with(EvaluatorSettings::default(), Arc::new(UnconfiguredLlm));
        let result = evaluator.evaluate_document(&document(vec![json!({
            "section_id": "s1",
            "document_class": "Invoice",
            "actual": {"Amount": "1", "Notes": "a"},
            "expected": {"Amount": "1", "Notes": "b"}
        })]));

        let section = &result.sections[0];
        let notes = section
            .attributes
            .iter()
            .find(|attribute| attribute.name == "Notes")
            .expect("discovered attribute");
        assert!(!notes.matched);
        assert!(notes.evaluated);
        assert!(section.diagnostics.iter().any(|diagnostic| {
            diagnostic.kind == DiagnosticKind::ComparatorFailure && diagnostic.path == "Notes"
        }));
        assert_eq!(section.attributes[0].score, 1.0);
    }

    #[test]
    fn expired_deadline_marks_fields_unevaluated() {
        let settings = EvaluatorSettings {
            timeout_ms: 0,
            ..EvaluatorSettings::default()
        };
        let evaluator = evaluator_with(settings, Arc::new(UnconfiguredLlm));
        let result = evaluator.evaluate_document(&document(vec![json!({
            "section_id": "s1",
            "document_class": "Invoice",
            "actual": {"Amount": "1"},
            "expected": {"Amount": "1"}
        })]));

        assert!(result.timed_out);
        let amount = &result.sections[0].attributes[0];
        assert!(!amount.evaluated);
        assert_eq!(amount.reason, NOT_EVALUATED_REASON);
        assert_eq!(result.metrics.document.counts().total(), 0);
        assert!(
            result.sections[0]
                .diagnostics
                .iter()
                .any(|diagnostic| diagnostic.kind == DiagnosticKind::Timeout)
        );
    }

    #[test]
    fn confidence_is_attached_from_flat_maps_and_trees() {
        let evaluator = evaluator_with(EvaluatorSettings::default(), Arc::new(UnconfiguredLlm));
        let result = evaluator.evaluate_document(&document(vec![
            json!({
                "section_id": "flat",
                "document_class": "Invoice",
                "actual": {"Amount": "1", "Items": [{"Sku": "A"}]},
                "expected": {"Amount": "2", "Items": [{"Sku": "A"}]},
                "confidence": {"Amount": 0.4, "Items[0].Sku": {"confidence": 0.9}}
            }),
            json!({
                "section_id": "tree",
                "document_class": "Invoice",
                "actual": {"Vendor": {"Name": "Acme"}},
                "expected": {"Vendor": {"Name": "Acme"}},
                "confidence": {"inference_result": {"Vendor": {"Name": {"confidence": 0.75}}}}
            }),
        ]));

        let flat = &result.sections[0].attributes;
        assert_eq!(flat[0].confidence, Some(0.4));
        assert!(!flat[0].matched);
        let sku = flat
            .iter()
            .find(|attribute| attribute.name == "Items[0].Sku")
            .expect("list leaf");
        assert_eq!(sku.confidence, Some(0.9));

        let vendor = result.sections[1]
            .attributes
            .iter()
            .find(|attribute| attribute.name == "Vendor.Name")
            .expect("group leaf");
        assert_eq!(vendor.confidence, Some(0.75));
        assert!(vendor.matched);
    }

    #[test]
    fn confidence_follows_reordered_list_items() {
        let evaluator = evaluator_with(EvaluatorSettings::default(), Arc::new(UnconfiguredLlm));
        let result = evaluator.evaluate_document(&document(vec![
            json!({
                "section_id": "tree",
                "document_class": "Invoice",
                "actual": {"Items": [{"Sku": "B"}, {"Sku": "A"}]},
                "expected": {"Items": [{"Sku": "A"}, {"Sku": "B"}, {"Sku": "C"}]},
                "confidence": {"Items": [{"Sku": 0.11}, {"Sku": 0.99}]}
            }),
            json!({
                "section_id": "flat",
                "document_class": "Invoice",
                "actual": {"Items": [{"Sku": "B"}, {"Sku": "A"}]},
                "expected": {"Items": [{"Sku": "A"}, {"Sku": "B"}]},
                "confidence": {"Items[0].Sku": 0.11, "Items[1].Sku": 0.99}
            }),
        ]));

        for section in &result.sections {
            let find = |name: &str| {
                section
                    .attributes
                    .iter()
                    .find(|attribute| attribute.name == name)
                    .expect("list leaf")
            };
            let first = find("Items[0].Sku");
            assert_eq!(first.actual, Some(json!("A")));
            assert_eq!(first.confidence, Some(0.99), "{}", section.section_id);
            assert_eq!(first.actual_path.as_deref(), Some("Items[1].Sku"));

            let second = find("Items[1].Sku");
            assert_eq!(second.actual, Some(json!("B")));
            assert_eq!(second.confidence, Some(0.11), "{}", section.section_id);
            assert_eq!(second.actual_path.as_deref(), Some("Items[0].Sku"));
        }

        let missing = result.sections[0]
            .attributes
            .iter()
            .find(|attribute| attribute.name == "Items[2].Sku")
            .expect("unmatched expected item");
        assert_eq!(missing.actual, None);
        assert_eq!(missing.confidence, None);
        assert_eq!(missing.actual_path, None);
    }

    #[test]
    fn list_matching_stops_scoring_once_the_deadline_passes() {
        let settings = EvaluatorSettings {
            timeout_ms: 50,
            max_concurrency: 1,
            ..EvaluatorSettings::default()
        };
        let llm = EchoLlm::new(Duration::from_millis(100));
        let evaluator = llm_items_evaluator(settings, llm.clone());
        let started = Instant::now();
        let result = evaluator.evaluate_document(&document(vec![json!({
            "section_id": "s1",
            "document_class": "Invoice",
            "actual": {"Items": skus(&["A", "B", "C", "D", "E"])},
            "expected": {"Items": skus(&["E", "D", "C", "B", "A"])}
        })]));

        assert!(started.elapsed() < Duration::from_millis(1_000));
        assert!(llm.calls() <= 2, "{} calls", llm.calls());
        assert!(result.timed_out);

        let section = &result.sections[0];
        assert!(section.list_matches.is_empty());
        assert!(section.attributes.iter().all(|attribute| !attribute.evaluated));
        assert!(section.diagnostics.iter().any(|diagnostic| {
            diagnostic.kind == DiagnosticKind::Timeout && diagnostic.path == "Items"
        }));
    }

    #[test]
    fn matched_list_items_are_not_compared_twice() {
        let llm = EchoLlm::new(Duration::ZERO);
        let evaluator = llm_items_evaluator(EvaluatorSettings::default(), llm.clone());
        let result = evaluator.evaluate_document(&document(vec![json!({
            "section_id": "s1",
            "document_class": "Invoice",
            "actual": {"Items": skus(&["B", "A"])},
            "expected": {"Items": skus(&["A", "B"])}
        })]));

        let section = &result.sections[0];
        assert!(section.attributes.iter().all(|attribute| attribute.matched));
        assert_eq!(section.list_matches[0].mean_score, Some(1.0));
        assert_eq!(llm.calls(), 4);
    }

    #[test]
    fn invalid_configuration_is_rejected_before_evaluation() {
        let mut config = invoice_config(EvaluatorSettings::default());
        config.classes[0].attributes.push(AttributeSpec::list("Broken", None, Vec::new()));
        let result = Evaluator::new(config, ComparatorSuite::offline());
        assert!(matches!(result, Err(EvalError::Configuration { .. })));
    }

    #[test]
    fn unknown_class_discovers_every_attribute() {
        let settings = EvaluatorSettings {
            discovery_method: EvaluationMethod::Exact,
            ..EvaluatorSettings::default()
        };
        let evaluator = evaluator_with(settings, Arc::new(UnconfiguredLlm));
        let result = evaluator.evaluate_document(&document(vec![json!({
            "section_id": "s1",
            "document_class": "Receipt",
            "actual": {"Total": "4"},
            "expected": {"Total": "4"}
        })]));

        let section = &result.sections[0];
        assert_eq!(section.document_class, "Receipt");
        assert!(section.attributes[0].discovered);
        assert!(section.attributes[0].matched);
        assert_eq!(section.diagnostics[0].kind, DiagnosticKind::Discovery);
    }
}
