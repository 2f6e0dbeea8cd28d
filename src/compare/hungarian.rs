//! Optimal list item pairing for HUNGARIAN list attributes.
//!
//! The score of pairing actual item `i` with expected item `j` is the mean leaf score of the
//! item pair under the item template's comparators. Kuhn–Munkres then picks the one-to-one
//! assignment with the highest total score. Leaf outcomes computed for the matrix are kept and
//! handed back when the chosen pairs are reported, so no leaf pair is compared twice.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Instant;

use pathfinding::kuhn_munkres::{Weights, kuhn_munkres};
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, warn};

use super::ComparatorSuite;
use crate::flatten::{Alignment, ItemAligner, ListContext, TreeFlattener, positional_pairs};
use crate::model::{
    ComparisonOutcome, Diagnostic, DiagnosticKind, FlattenedField, ListMatchSummary, MatchedPair,
};

const WEIGHT_SCALE: f64 = 1_000_000.0;

/// Identifies one leaf comparison independently of the list slot it was reported under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct OutcomeKey {
    tracking_key: String,
    method: &'static str,
    discovered: bool,
    actual: Option<String>,
    expected: Option<String>,
}

impl OutcomeKey {
    fn of(field: &FlattenedField) -> Self {
        Self {
            tracking_key: field.path.tracking_key(),
            method: field.attribute.method.as_str(),
            discovered: field.attribute.discovered,
            actual: field.actual.as_ref().map(Value::to_string),
            expected: field.expected.as_ref().map(Value::to_string),
        }
    }
}

pub struct HungarianAligner<'a> {
    suite: &'a ComparatorSuite,
    document_class: Option<&'a str>,
    deadline: Option<Instant>,
    outcomes: Mutex<HashMap<OutcomeKey, ComparisonOutcome>>,
}

impl<'a> HungarianAligner<'a> {
    pub fn new(
        suite: &'a ComparatorSuite,
        document_class: Option<&'a str>,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            suite,
            document_class,
            deadline,
            outcomes: Mutex::new(HashMap::new()),
        }
    }

    fn expired(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }

    /// Compares one leaf, reusing the outcome already computed while scoring list items.
    pub fn compare_field(&self, field: &FlattenedField) -> ComparisonOutcome {
        let key = OutcomeKey::of(field);
        if let Ok(outcomes) = self.outcomes.lock()
            && let Some(outcome) = outcomes.get(&key)
        {
            return outcome.clone();
        }

        let outcome = self.suite.compare_field(field, self.document_class);
        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.insert(key, outcome.clone());
        }
        outcome
    }

    /// Mean leaf score of one item pair; pairs of absent leaves do not count.
    ///
    /// `None` when the deadline passes before every leaf has been compared.
    fn item_score(
        &self,
        flattener: &TreeFlattener<'_>,
        context: ListContext<'_>,
        actual: &Value,
        expected: &Value,
    ) -> Option<f64> {
        let item_path = context.path.index(0);
        let tree = flattener.flatten_item(context, &item_path, Some(actual), Some(expected));

        let mut total = 0.0;
        let mut compared = 0_usize;
        for field in tree.fields() {
            if !field.actual_present() && !field.expected_present() {
                continue;
            }
            if self.expired() {
                return None;
            }
            total += self.compare_field(field).score;
            compared += 1;
        }

        Some(if compared == 0 {
            0.0
        } else {
            total / compared as f64
        })
    }

    fn positional(
        &self,
        context: ListContext<'_>,
        actual: usize,
        expected: usize,
        message: &str,
    ) -> Alignment {
        warn!(path = %context.path, reason = message, "list items paired by position");
        Alignment {
            pairs: positional_pairs(actual, expected),
            summary: None,
            diagnostics: vec![Diagnostic::new(
                DiagnosticKind::Timeout,
                context.path.display(),
                message,
            )],
        }
    }
}

impl ItemAligner for HungarianAligner<'_> {
    fn align(
        &self,
        flattener: &TreeFlattener<'_>,
        context: ListContext<'_>,
        actual: &[Value],
        expected: &[Value],
    ) -> Alignment {
        if self.expired() {
            return self.positional(
                context,
                actual.len(),
                expected.len(),
                "deadline passed before list matching; items paired by position",
            );
        }

        let columns = expected.len();
        let cells = (0..actual.len())
            .flat_map(|row| (0..columns).map(move |column| (row, column)))
            .collect::<Vec<(usize, usize)>>();
        let flat_scores = cells
            .par_iter()
            .map(|(row, column)| {
                if self.expired() {
                    return None;
                }
                self.item_score(flattener, context, &actual[*row], &expected[*column])
            })
            .collect::<Option<Vec<f64>>>();
        let Some(flat_scores) = flat_scores else {
            return self.positional(
                context,
                actual.len(),
                expected.len(),
                "deadline passed while scoring list items; items paired by position",
            );
        };
        let scores = if columns == 0 {
            vec![Vec::new(); actual.len()]
        } else {
            flat_scores
                .chunks(columns)
                .map(|row| row.to_vec())
                .collect::<Vec<Vec<f64>>>()
        };

        let assignment = optimal_assignment(&scores);
        debug!(
            path = %context.path,
            actual = actual.len(),
            expected = expected.len(),
            pairs = assignment.len(),
            "list items matched"
        );

        let mut by_expected = vec![None; expected.len()];
        for (row, column) in &assignment {
            by_expected[*column] = Some(*row);
        }
        let assigned_actual = assignment
            .iter()
            .map(|(row, _)| *row)
            .collect::<BTreeSet<usize>>();
        let unmatched_actual = (0..actual.len())
            .filter(|row| !assigned_actual.contains(row))
            .collect::<Vec<usize>>();

        let mut pairs = by_expected
            .iter()
            .enumerate()
            .map(|(column, row)| (*row, Some(column)))
            .collect::<Vec<(Option<usize>, Option<usize>)>>();
        pairs.extend(unmatched_actual.iter().map(|row| (Some(*row), None)));

        let matched_pairs = assignment
            .iter()
            .map(|(row, column)| MatchedPair {
                actual_index: *row,
                expected_index: *column,
                score: scores[*row][*column],
            })
            .collect::<Vec<MatchedPair>>();
        let total_score = matched_pairs.iter().map(|pair| pair.score).sum::<f64>();
        let mean_score =
            (!matched_pairs.is_empty()).then(|| total_score / matched_pairs.len() as f64);

        Alignment {
            pairs,
            summary: Some(ListMatchSummary {
                path: context.path.display(),
                pairs: matched_pairs,
                unmatched_actual,
                unmatched_expected: by_expected
                    .iter()
                    .enumerate()
                    .filter(|(_, row)| row.is_none())
                    .map(|(column, _)| column)
                    .collect(),
                total_score,
                mean_score,
            }),
            diagnostics: Vec::new(),
        }
    }
}

/// Score matrix in the orientation Kuhn–Munkres expects (rows never outnumber columns).
struct ScoreMatrix {
    rows: usize,
    columns: usize,
    data: Vec<i64>,
}

impl Weights<i64> for ScoreMatrix {
    fn rows(&self) -> usize {
        self.rows
    }

    fn columns(&self) -> usize {
        self.columns
    }

    fn at(&self, row: usize, col: usize) -> i64 {
        self.data[row * self.columns + col]
    }

    fn neg(&self) -> Self {
        Self {
            rows: self.rows,
            columns: self.columns,
            data: self.data.iter().map(|value| -value).collect(),
        }
    }
}

/// Maximum-total-score one-to-one assignment as `(row, column)` pairs sorted by row.
///
/// Rows are actual items and columns expected items; the smaller side is fully assigned.
pub fn optimal_assignment(scores: &[Vec<f64>]) -> Vec<(usize, usize)> {
    let rows = scores.len();
    let columns = scores.iter().map(Vec::len).max().unwrap_or(0);
    if rows == 0 || columns == 0 {
        return Vec::new();
    }

    let transpose = rows > columns;
    let (matrix_rows, matrix_columns) = if transpose {
        (columns, rows)
    } else {
        (rows, columns)
    };

    let mut data = Vec::<i64>::with_capacity(matrix_rows * matrix_columns);
    for matrix_row in 0..matrix_rows {
        for matrix_column in 0..matrix_columns {
            let (row, column) = if transpose {
                (matrix_column, matrix_row)
            } else {
                (matrix_row, matrix_column)
            };
            let score = scores
                .get(row)
                .and_then(|cells| cells.get(column))
                .copied()
                .unwrap_or(0.0);
            data.push(to_weight(score));
        }
    }

    let matrix = ScoreMatrix {
        rows: matrix_rows,
        columns: matrix_columns,
        data,
    };
    let (_, assignment) = kuhn_munkres(&matrix);

    let mut pairs = assignment
        .into_iter()
        .enumerate()
        .map(|(matrix_row, matrix_column)| {
            if transpose {
                (matrix_column, matrix_row)
            } else {
                (matrix_row, matrix_column)
            }
        })
        .collect::<Vec<(usize, usize)>>();
    pairs.sort_unstable();
    pairs
}

fn to_weight(score: f64) -> i64 {
    let bounded = if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    };
    (bounded * WEIGHT_SCALE).round() as i64
}
