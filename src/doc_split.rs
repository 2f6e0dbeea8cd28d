//! Document split and classification accuracy.
//!
//! Compares how pages were grouped into sections and which class each section received, at page
//! level and at section level with and without regard to page order. Pure calculation; it does
//! not depend on attribute evaluation.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{Diagnostic, DiagnosticKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSplitRecord {
    pub section_id: String,
    pub document_class: String,
    #[serde(default)]
    pub page_indices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageDetail {
    pub page_index: usize,
    pub expected_class: Option<String>,
    pub predicted_class: Option<String>,
    pub matched: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageLevelAccuracy {
    pub accuracy: Option<f64>,
    pub total: usize,
    pub correct: usize,
    pub pages: Vec<PageDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionMatchDetail {
    pub section_id: String,
    pub document_class: String,
    pub page_indices: Vec<usize>,
    pub matched: bool,
    pub predicted_section_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitAccuracy {
    pub accuracy: Option<f64>,
    pub total: usize,
    pub correct: usize,
    pub sections: Vec<SectionMatchDetail>,
    /// Predicted sections no ground-truth section claimed.
    pub unmatched_predicted: Vec<SectionSplitRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocSplitResult {
    pub page_level_accuracy: PageLevelAccuracy,
    pub split_accuracy_without_order: SplitAccuracy,
    pub split_accuracy_with_order: SplitAccuracy,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageOrder {
    Ignored,
    Required,
}

pub fn evaluate_doc_split(
    ground_truth: &[SectionSplitRecord],
    predicted: &[SectionSplitRecord],
) -> DocSplitResult {
    let mut diagnostics = Vec::new();
    let expected_pages = page_classes("ground_truth", ground_truth, &mut diagnostics);
    let predicted_pages = page_classes("predicted", predicted, &mut diagnostics);

    let result = DocSplitResult {
        page_level_accuracy: page_level_accuracy(&expected_pages, &predicted_pages),
        split_accuracy_without_order: split_accuracy(ground_truth, predicted, PageOrder::Ignored),
        split_accuracy_with_order: split_accuracy(ground_truth, predicted, PageOrder::Required),
        diagnostics,
    };
    debug!(
        pages = result.page_level_accuracy.total,
        sections = ground_truth.len(),
        predicted_sections = predicted.len(),
        "doc split evaluated"
    );
    result
}

/// Class of every page on one side; the first section listing a page wins.
fn page_classes<'r>(
    side: &str,
    sections: &'r [SectionSplitRecord],
    diagnostics: &mut Vec<Diagnostic>,
) -> BTreeMap<usize, &'r SectionSplitRecord> {
    let mut pages = BTreeMap::<usize, &SectionSplitRecord>::new();
    for section in sections {
        for page in &section.page_indices {
            if let Some(owner) = pages.get(page) {
                if owner.section_id != section.section_id {
                    warn!(
                        side,
                        page = *page,
                        kept = %owner.section_id,
                        ignored = %section.section_id,
                        "page listed in more than one section"
                    );
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::PageConflict,
                        format!("{side}.pages[{page}]"),
                        format!(
                            "page also listed in section {}; kept section {}",
                            section.section_id, owner.section_id
                        ),
                    ));
                }
                continue;
            }
            pages.insert(*page, section);
        }
    }
    pages
}

fn page_level_accuracy(
    expected: &BTreeMap<usize, &SectionSplitRecord>,
    predicted: &BTreeMap<usize, &SectionSplitRecord>,
) -> PageLevelAccuracy {
    let page_indices = expected
        .keys()
        .chain(predicted.keys())
        .copied()
        .collect::<BTreeSet<usize>>();

    let pages = page_indices
        .into_iter()
        .map(|page_index| {
            let expected_class = expected
                .get(&page_index)
                .map(|section| section.document_class.clone());
            let predicted_class = predicted
                .get(&page_index)
                .map(|section| section.document_class.clone());
            let matched = match (&expected_class, &predicted_class) {
                (Some(expected), Some(predicted)) => same_class(expected, predicted),
                _ => false,
            };
            PageDetail {
                page_index,
                expected_class,
                predicted_class,
                matched,
            }
        })
        .collect::<Vec<PageDetail>>();

    let correct = pages.iter().filter(|page| page.matched).count();
    PageLevelAccuracy {
        accuracy: ratio(correct, pages.len()),
        total: pages.len(),
        correct,
        pages,
    }
}

fn split_accuracy(
    ground_truth: &[SectionSplitRecord],
    predicted: &[SectionSplitRecord],
    order: PageOrder,
) -> SplitAccuracy {
    let mut consumed = vec![false; predicted.len()];
    let mut sections = Vec::with_capacity(ground_truth.len());

    for expected in ground_truth {
        let found = (0..predicted.len()).find(|index| {
            let candidate = &predicted[*index];
            !consumed[*index]
                && same_class(&expected.document_class, &candidate.document_class)
                && same_pages(&expected.page_indices, &candidate.page_indices, order)
        });
        if let Some(index) = found {
            consumed[index] = true;
        }
        sections.push(SectionMatchDetail {
            section_id: expected.section_id.clone(),
            document_class: expected.document_class.clone(),
            page_indices: expected.page_indices.clone(),
            matched: found.is_some(),
            predicted_section_id: found.map(|index| predicted[index].section_id.clone()),
        });
    }

    let unmatched_predicted = predicted
        .iter()
        .zip(&consumed)
        .filter(|(_, consumed)| !**consumed)
        .map(|(section, _)| section.clone())
        .collect::<Vec<SectionSplitRecord>>();
    let correct = sections.iter().filter(|section| section.matched).count();

    SplitAccuracy {
        accuracy: ratio(correct, ground_truth.len()),
        total: ground_truth.len(),
        correct,
        sections,
        unmatched_predicted,
    }
}

fn same_class(expected: &str, predicted: &str) -> bool {
    expected.trim() == predicted.trim()
}

fn same_pages(expected: &[usize], predicted: &[usize], order: PageOrder) -> bool {
    match order {
        PageOrder::Required => expected == predicted,
        PageOrder::Ignored => sorted_pages(expected) == sorted_pages(predicted),
    }
}

fn sorted_pages(pages: &[usize]) -> Vec<usize> {
    let mut sorted = pages.to_vec();
    sorted.sort_unstable();
    sorted
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str, class: &str, pages: &[usize]) -> SectionSplitRecord {
        SectionSplitRecord {
            section_id: id.to_string(),
            document_class: class.to_string(),
            page_indices: pages.to_vec(),
        }
    }

    #[test]
    fn page_order_only_matters_for_ordered_split() {
        let result = evaluate_doc_split(
            &[section("gt-1", "Invoice", &[0, 1, 2])],
            &[section("p-1", "Invoice", &[2, 0, 1])],
        );

        assert!(result.split_accuracy_without_order.sections[0].matched);
        assert_eq!(result.split_accuracy_without_order.accuracy, Some(1.0));
        assert!(!result.split_accuracy_with_order.sections[0].matched);
        assert_eq!(result.split_accuracy_with_order.accuracy, Some(0.0));
        assert_eq!(result.page_level_accuracy.accuracy, Some(1.0));
    }

    #[test]
    fn pages_missing_on_one_side_count_as_incorrect() {
        let result = evaluate_doc_split(
            &[section("a", "Invoice", &[0, 1]), section("b", "Receipt", &[2])],
            &[
                section("x", "Invoice", &[0]),
                section("y", "Receipt", &[1, 2]),
                section("z", "Receipt", &[3]),
            ],
        );

        let pages = &result.page_level_accuracy;
        assert_eq!(pages.total, 4);
        assert_eq!(pages.correct, 2);
        assert_eq!(pages.accuracy, Some(0.5));
        assert_eq!(pages.pages[3].expected_class, None);
        assert_eq!(pages.pages[3].predicted_class.as_deref(), Some("Receipt"));

        let split = &result.split_accuracy_without_order;
        assert_eq!(split.correct, 0);
        assert_eq!(split.unmatched_predicted.len(), 3);
    }

    #[test]
    fn identical_predictions_are_consumed_lowest_index_first() {
        let result = evaluate_doc_split(
            &[section("gt-1", "Invoice", &[4, 5])],
            &[
                section("p-1", "Invoice", &[5, 4]),
                section("p-2", "Invoice", &[5, 4]),
            ],
        );

        let split = &result.split_accuracy_without_order;
        assert_eq!(split.sections[0].predicted_section_id.as_deref(), Some("p-1"));
        assert_eq!(split.accuracy, Some(1.0));
        assert_eq!(split.unmatched_predicted, vec![section("p-2", "Invoice", &[5, 4])]);
    }

    #[test]
    fn repeated_pages_must_repeat_equally_to_match() {
        let result = evaluate_doc_split(
            &[section("gt-1", "Invoice", &[0, 0, 1])],
            &[section("p-1", "Invoice", &[0, 1, 1])],
        );
        assert!(!result.split_accuracy_without_order.sections[0].matched);
        assert_eq!(result.split_accuracy_without_order.accuracy, Some(0.0));
    }

    #[test]
    fn class_mismatch_prevents_split_match() {
        let result = evaluate_doc_split(
            &[section("gt-1", "Invoice", &[0])],
            &[section("p-1", "Receipt", &[0])],
        );
        assert_eq!(result.split_accuracy_without_order.accuracy, Some(0.0));
        assert_eq!(result.page_level_accuracy.correct, 0);
    }

    #[test]
    fn conflicting_pages_keep_first_section_and_are_reported() {
        let result = evaluate_doc_split(
            &[section("a", "Invoice", &[0, 1]), section("b", "Receipt", &[1])],
            &[section("x", "Invoice", &[0, 1])],
        );

        assert_eq!(result.page_level_accuracy.accuracy, Some(1.0));
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::PageConflict);
        assert_eq!(result.diagnostics[0].path, "ground_truth.pages[1]");
    }

    #[test]
    fn empty_inputs_leave_accuracy_undefined() {
        let result = evaluate_doc_split(&[], &[section("p", "Invoice", &[0])]);
        assert_eq!(result.split_accuracy_without_order.accuracy, None);
        assert_eq!(result.split_accuracy_with_order.total, 0);
        assert_eq!(result.page_level_accuracy.accuracy, Some(0.0));
        assert_eq!(result.split_accuracy_with_order.unmatched_predicted.len(), 1);
    }
}
