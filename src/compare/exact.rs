use serde_json::Value;

use super::{CompareParams, Comparator, absence_outcome, normalize_text, value_text};
use crate::model::{ComparisonOutcome, EvaluationMethod};

#[derive(Debug, Clone, Copy, Default)]
pub struct ExactComparator;

impl Comparator for ExactComparator {
    fn method(&self) -> EvaluationMethod {
        EvaluationMethod::Exact
    }

    fn compare(
        &self,
        actual: Option<&Value>,
        expected: Option<&Value>,
        params: &CompareParams<'_>,
    ) -> ComparisonOutcome {
        let method = self.method();
        if let Some(outcome) = absence_outcome(actual, expected, method, None) {
            return outcome;
        }
        let (Some(actual), Some(expected)) = (actual, expected) else {
            return ComparisonOutcome::not_matched("value is missing", method, None);
        };

        let actual_norm = normalize_text(&value_text(actual));
        let expected_norm = normalize_text(&value_text(expected));
        if actual_norm == expected_norm {
            ComparisonOutcome::new(true, 1.0, "exact match after normalization", method, None)
        } else {
            ComparisonOutcome::not_matched(
                format!(
                    "values differ for {}: expected \"{expected_norm}\", got \"{actual_norm}\"",
                    params.attribute.name
                ),
                method,
                None,
            )
        }
    }
}
