use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{CompareParams, Comparator, absence_outcome};
use crate::model::{ComparisonOutcome, EvaluationMethod};

/// Absolute tolerance used to absorb rounding differences.
pub const NUMERIC_EPSILON: f64 = 1e-6;

static CURRENCY_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Z]{3}\s*)?(?P<body>.*?)(?:\s*[A-Z]{3})?$")
        .expect("currency code pattern is valid")
});

static CANONICAL_DECIMAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)$")
        .expect("decimal pattern is valid")
});

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₹', '₩', '₽', '¢', '₺', '₪'];

#[derive(Debug, Clone, Copy, Default)]
pub struct NumericExactComparator;

impl Comparator for NumericExactComparator {
    fn method(&self) -> EvaluationMethod {
        EvaluationMethod::NumericExact
    }

    fn compare(
        &self,
        actual: Option<&Value>,
        expected: Option<&Value>,
        _params: &CompareParams<'_>,
    ) -> ComparisonOutcome {
        let method = self.method();
        if let Some(outcome) = absence_outcome(actual, expected, method, None) {
            return outcome;
        }

        let actual_number = actual.and_then(numeric_value);
        let expected_number = expected.and_then(numeric_value);
        match (actual_number, expected_number) {
            (Some(actual), Some(expected)) if (actual - expected).abs() <= NUMERIC_EPSILON => {
                let reason = format!("numeric match: {expected}");
                ComparisonOutcome::new(true, 1.0, reason, method, None)
            }
            (Some(actual), Some(expected)) => ComparisonOutcome::not_matched(
                format!("numeric values differ: expected {expected}, got {actual}"),
                method,
                None,
            ),
            (None, _) => {
                ComparisonOutcome::not_matched("actual value is not numeric", method, None)
            }
            (_, None) => {
                ComparisonOutcome::not_matched("expected value is not numeric", method, None)
            }
        }
    }
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_numeric(text),
        _ => None,
    }
}

/// Parses amounts such as `$1,250.00`, `(12.50)`, `EUR 9.99` or `15%` into a plain number.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let mut text = raw.trim();
    let mut negative = false;
    if let Some(inner) = text.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')) {
        negative = true;
        text = inner.trim();
    }

    let body = CURRENCY_CODE
        .captures(text)
        .and_then(|captures| captures.name("body"))
        .map(|body| body.as_str())
        .unwrap_or(text);

    let cleaned = body
        .chars()
        .filter(|character| {
            !CURRENCY_SYMBOLS.contains(character)
                && !character.is_whitespace()
                && !matches!(*character, ',' | '_' | '\'' | '%')
        })
        .collect::<String>();

    if !CANONICAL_DECIMAL.is_match(&cleaned) {
        return None;
    }

    let value = cleaned.parse::<f64>().ok()?;
    Some(if negative { -value } else { value })
}
