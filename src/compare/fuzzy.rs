use serde_json::Value;

use super::{CompareParams, Comparator, absence_outcome, normalize_text, value_text};
use crate::config::DEFAULT_FUZZY_THRESHOLD;
use crate::model::{ComparisonOutcome, EvaluationMethod};

#[derive(Debug, Clone, Copy, Default)]
pub struct FuzzyComparator;

impl Comparator for FuzzyComparator {
    fn method(&self) -> EvaluationMethod {
        EvaluationMethod::Fuzzy
    }

    fn compare(
        &self,
        actual: Option<&Value>,
        expected: Option<&Value>,
        params: &CompareParams<'_>,
    ) -> ComparisonOutcome {
        let method = self.method();
        let threshold = params.threshold().unwrap_or(DEFAULT_FUZZY_THRESHOLD);
        if let Some(outcome) = absence_outcome(actual, expected, method, Some(threshold)) {
            return outcome;
        }

        let actual_text = actual.map(value_text).unwrap_or_default();
        let expected_text = expected.map(value_text).unwrap_or_default();
        let score = similarity_ratio(
            &normalize_text(&actual_text).to_lowercase(),
            &normalize_text(&expected_text).to_lowercase(),
        );
        let matched = score >= threshold;
        ComparisonOutcome::new(
            matched,
            score,
            format!(
                "edit similarity {score:.3} {} threshold {threshold:.2}",
                if matched { ">=" } else { "<" }
            ),
            method,
            Some(threshold),
        )
    }
}

/// `1 - distance / longest length`, computed over characters.
pub fn similarity_ratio(left: &str, right: &str) -> f64 {
    let longest = left.chars().count().max(right.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(left, right) as f64 / longest as f64
}

pub fn levenshtein_distance(left: &str, right: &str) -> usize {
    let left = left.chars().collect::<Vec<char>>();
    let right = right.chars().collect::<Vec<char>>();
    if left.is_empty() {
        return right.len();
    }
    if right.is_empty() {
        return left.len();
    }

    let mut previous = (0..=right.len()).collect::<Vec<usize>>();
    let mut current = vec![0_usize; right.len() + 1];
    for (i, left_char) in left.iter().enumerate() {
        current[0] = i + 1;
        for (j, right_char) in right.iter().enumerate() {
            let cost = usize::from(left_char != right_char);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[right.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_matches_known_distances() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
    }

    #[test]
    fn ratio_is_bounded() {
        assert_eq!(similarity_ratio("", ""), 1.0);
        assert_eq!(similarity_ratio("abc", "xyz"), 0.0);
        let ratio = similarity_ratio("acme corp", "acme corp.");
        assert!(ratio > 0.89 && ratio < 1.0);
    }
}
