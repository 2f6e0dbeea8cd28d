//! Comparator strategies.
//!
//! Every comparator honours the same absence contract: when one side is absent it returns a
//! deterministic non-matching outcome instead of failing, and two absent sides count as a match
//! that the metrics later exclude.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::config::DISCOVERY_MARKER;
use crate::model::{
    ComparisonOutcome, EvaluationMethod, FlattenedField, ResolvedAttribute, is_absent,
};
use crate::semantic::{EmbeddingProvider, LocalHashEmbedder, normalize_whitespace};
use crate::service::RetryPolicy;

mod exact;
mod fuzzy;
mod hungarian;
mod llm;
mod numeric;
mod semantic;

pub use exact::ExactComparator;
pub use fuzzy::{FuzzyComparator, levenshtein_distance, similarity_ratio};
pub use hungarian::{HungarianAligner, optimal_assignment};
pub use llm::{LlmClient, LlmComparator, UnconfiguredLlm, build_llm_prompt, parse_llm_verdict};
pub use numeric::{NUMERIC_EPSILON, NumericExactComparator, parse_numeric};
pub use semantic::SemanticComparator;

/// Per-call inputs besides the two values.
#[derive(Debug, Clone, Copy)]
pub struct CompareParams<'a> {
    pub attribute: &'a ResolvedAttribute,
    pub document_class: Option<&'a str>,
}

impl CompareParams<'_> {
    pub fn threshold(&self) -> Option<f64> {
        self.attribute.threshold
    }
}

pub trait Comparator: Send + Sync {
    fn method(&self) -> EvaluationMethod;

    fn compare(
        &self,
        actual: Option<&Value>,
        expected: Option<&Value>,
        params: &CompareParams<'_>,
    ) -> ComparisonOutcome;
}

/// Outcome for pairs where at least one side is absent, `None` when both are present.
pub fn absence_outcome(
    actual: Option<&Value>,
    expected: Option<&Value>,
    method: EvaluationMethod,
    threshold: Option<f64>,
) -> Option<ComparisonOutcome> {
    match (is_absent(actual), is_absent(expected)) {
        (true, true) => Some(ComparisonOutcome::new(
            true,
            1.0,
            "both values are absent",
            method,
            threshold,
        )),
        (true, false) => Some(ComparisonOutcome::not_matched(
            "actual value is missing",
            method,
            threshold,
        )),
        (false, true) => Some(ComparisonOutcome::not_matched(
            "unexpected value: expected value is absent",
            method,
            threshold,
        )),
        (false, false) => None,
    }
}

/// Renders a leaf value as comparable text.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

/// Collapses whitespace and strips terminal punctuation.
pub fn normalize_text(input: &str) -> String {
    let collapsed = normalize_whitespace(input);
    collapsed
        .trim_end_matches(|character: char| matches!(character, '.' | ',' | ';' | ':' | '!' | '?'))
        .trim_end()
        .to_string()
}

/// Dispatches each evaluation method to its strategy.
pub struct ComparatorSuite {
    exact: ExactComparator,
    numeric: NumericExactComparator,
    fuzzy: FuzzyComparator,
    semantic: SemanticComparator,
    llm: LlmComparator,
}

impl ComparatorSuite {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, llm: Arc<dyn LlmClient>) -> Self {
        Self::with_retry_policy(embedder, llm, RetryPolicy::default())
    }

    pub fn with_retry_policy(
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmClient>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            exact: ExactComparator,
            numeric: NumericExactComparator,
            fuzzy: FuzzyComparator,
            semantic: SemanticComparator::new(embedder, retry),
            llm: LlmComparator::new(llm, retry),
        }
    }

    /// Local embeddings and no LLM service.
    pub fn offline() -> Self {
        Self::new(Arc::new(LocalHashEmbedder::default()), Arc::new(UnconfiguredLlm))
    }

    /// `None` for HUNGARIAN, which only applies to lists as a whole.
    pub fn comparator(&self, method: EvaluationMethod) -> Option<&dyn Comparator> {
        match method {
            EvaluationMethod::Exact => Some(&self.exact),
            EvaluationMethod::NumericExact => Some(&self.numeric),
            EvaluationMethod::Fuzzy => Some(&self.fuzzy),
            EvaluationMethod::Semantic => Some(&self.semantic),
            EvaluationMethod::Llm => Some(&self.llm),
            EvaluationMethod::Hungarian => None,
        }
    }

    pub fn compare_field(
        &self,
        field: &FlattenedField,
        document_class: Option<&str>,
    ) -> ComparisonOutcome {
        let attribute = &field.attribute;
        let params = CompareParams {
            attribute,
            document_class,
        };

        let mut outcome = match self.comparator(attribute.method) {
            Some(comparator) => {
                comparator.compare(field.actual.as_ref(), field.expected.as_ref(), &params)
            }
            None => {
                warn!(path = %field.path, "HUNGARIAN cannot compare a single leaf");
                ComparisonOutcome::not_matched(
                    "HUNGARIAN applies to list attributes, not leaves",
                    attribute.method,
                    attribute.threshold,
                )
            }
        };

        if attribute.discovered {
            outcome.reason = format!("{} {}", outcome.reason, DISCOVERY_MARKER);
        }
        outcome
    }
}
