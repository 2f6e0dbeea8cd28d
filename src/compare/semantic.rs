use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use super::{CompareParams, Comparator, absence_outcome, normalize_text, value_text};
use crate::config::DEFAULT_SEMANTIC_THRESHOLD;
use crate::model::{ComparisonOutcome, EvaluationMethod};
use crate::semantic::{EmbeddingProvider, cosine_similarity};
use crate::service::{RetryPolicy, with_retry};

pub struct SemanticComparator {
    embedder: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
}

impl SemanticComparator {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, retry: RetryPolicy) -> Self {
        Self { embedder, retry }
    }
}

impl Comparator for SemanticComparator {
    fn method(&self) -> EvaluationMethod {
        EvaluationMethod::Semantic
    }

    fn compare(
        &self,
        actual: Option<&Value>,
        expected: Option<&Value>,
        params: &CompareParams<'_>,
    ) -> ComparisonOutcome {
        let method = self.method();
        let threshold = params.threshold().unwrap_or(DEFAULT_SEMANTIC_THRESHOLD);
        if let Some(outcome) = absence_outcome(actual, expected, method, Some(threshold)) {
            return outcome;
        }

        let actual_text = normalize_text(&actual.map(value_text).unwrap_or_default());
        let expected_text = normalize_text(&expected.map(value_text).unwrap_or_default());
        if actual_text.eq_ignore_ascii_case(&expected_text) {
            return ComparisonOutcome::new(
                true,
                1.0,
                "embedding similarity: identical text",
                method,
                Some(threshold),
            );
        }

        let embeddings = with_retry(&self.retry, "embed", || self.embedder.embed(&actual_text))
            .and_then(|actual_vector| {
                with_retry(&self.retry, "embed", || self.embedder.embed(&expected_text))
                    .map(|expected_vector| (actual_vector, expected_vector))
            });

        let (actual_vector, expected_vector) = match embeddings {
            Ok(vectors) => vectors,
            Err(err) => {
                warn!(
                    attribute = %params.attribute.name,
                    provider = self.embedder.name(),
                    error = %err,
                    "embedding request failed"
                );
                return ComparisonOutcome::failed(
                    format!("embedding similarity unavailable: {err}"),
                    method,
                    Some(threshold),
                    err,
                );
            }
        };

        let Some(similarity) = cosine_similarity(&actual_vector, &expected_vector) else {
            return ComparisonOutcome::not_matched(
                "embedding similarity unavailable: vectors are not comparable",
                method,
                Some(threshold),
            );
        };

        let score = similarity.clamp(0.0, 1.0);
        ComparisonOutcome::new(
            score >= threshold,
            score,
            format!("embedding similarity {score:.3}"),
            method,
            Some(threshold),
        )
    }
}
