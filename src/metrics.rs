//! Confusion counts and the rates derived from them.
//!
//! Every scope (attribute type, tracking key, section, document, document class) uses the same
//! formulas over its own count set. Rates with a zero denominator are reported as `None`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{AttributeResult, DocumentMetrics, SectionMetrics, SectionResult, is_absent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    TruePositive,
    FalsePositive,
    FalseNegative,
    TrueNegative,
    /// Both sides absent and not counted.
    Excluded,
}

/// Maps one evaluated outcome onto the confusion matrix.
pub fn classify(
    expected_present: bool,
    actual_present: bool,
    matched: bool,
    count_both_absent_as_true_negative: bool,
) -> Classification {
    match (expected_present, actual_present) {
        (true, _) if matched => Classification::TruePositive,
        (true, _) => Classification::FalseNegative,
        (false, true) => Classification::FalsePositive,
        (false, false) if count_both_absent_as_true_negative => Classification::TrueNegative,
        (false, false) => Classification::Excluded,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionCounts {
    pub true_positive: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_negative: usize,
}

impl ConfusionCounts {
    pub fn record(&mut self, classification: Classification) {
        match classification {
            Classification::TruePositive => self.true_positive += 1,
            Classification::FalsePositive => self.false_positive += 1,
            Classification::FalseNegative => self.false_negative += 1,
            Classification::TrueNegative => self.true_negative += 1,
            Classification::Excluded => {}
        }
    }

    pub fn merge(&mut self, other: &ConfusionCounts) {
        self.true_positive += other.true_positive;
        self.false_positive += other.false_positive;
        self.false_negative += other.false_negative;
        self.true_negative += other.true_negative;
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.false_negative + self.true_negative
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub true_positive: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_negative: usize,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1: Option<f64>,
    pub accuracy: Option<f64>,
    pub false_alarm_rate: Option<f64>,
    pub false_discovery_rate: Option<f64>,
}

impl Metrics {
    pub fn from_counts(counts: ConfusionCounts) -> Self {
        let ConfusionCounts {
            true_positive: tp,
            false_positive: fp,
            false_negative: fn_,
            true_negative: tn,
        } = counts;

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = match (precision, recall) {
            (Some(p), Some(r)) if p + r == 0.0 => Some(0.0),
            (Some(p), Some(r)) => Some(2.0 * p * r / (p + r)),
            _ => None,
        };

        Self {
            true_positive: tp,
            false_positive: fp,
            false_negative: fn_,
            true_negative: tn,
            precision,
            recall,
            f1,
            accuracy: ratio(tp + tn, counts.total()),
            false_alarm_rate: ratio(fp, fp + tn),
            false_discovery_rate: ratio(fp, fp + tp),
        }
    }

    pub fn counts(&self) -> ConfusionCounts {
        ConfusionCounts {
            true_positive: self.true_positive,
            false_positive: self.false_positive,
            false_negative: self.false_negative,
            true_negative: self.true_negative,
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsAggregator {
    count_both_absent_as_true_negative: bool,
}

impl MetricsAggregator {
    pub fn new(count_both_absent_as_true_negative: bool) -> Self {
        Self {
            count_both_absent_as_true_negative,
        }
    }

    /// `None` for results that never reached a comparator.
    pub fn classify_result(&self, result: &AttributeResult) -> Option<Classification> {
        if !result.evaluated {
            return None;
        }
        Some(classify(
            !is_absent(result.expected.as_ref()),
            !is_absent(result.actual.as_ref()),
            result.matched,
            self.count_both_absent_as_true_negative,
        ))
    }

    pub fn counts_for<'r>(
        &self,
        results: impl IntoIterator<Item = &'r AttributeResult>,
    ) -> ConfusionCounts {
        let mut counts = ConfusionCounts::default();
        for classification in results
            .into_iter()
            .filter_map(|result| self.classify_result(result))
        {
            counts.record(classification);
        }
        counts
    }

    pub fn section_metrics(&self, attributes: &[AttributeResult]) -> SectionMetrics {
        let mut by_type = BTreeMap::<String, ConfusionCounts>::new();
        let mut by_key = BTreeMap::<String, ConfusionCounts>::new();
        let mut section = ConfusionCounts::default();

        for result in attributes {
            let Some(classification) = self.classify_result(result) else {
                continue;
            };
            section.record(classification);
            by_type
                .entry(result.attribute_type.as_str().to_string())
                .or_default()
                .record(classification);
            by_key
                .entry(result.tracking_key.clone())
                .or_default()
                .record(classification);
        }

        SectionMetrics {
            section: Metrics::from_counts(section),
            by_attribute_type: into_metrics(by_type),
            by_attribute: into_metrics(by_key),
        }
    }

    /// Pools the section counts; nothing is recomputed from attribute results.
    pub fn document_metrics(&self, sections: &[SectionResult]) -> DocumentMetrics {
        let mut document = ConfusionCounts::default();
        let mut by_type = BTreeMap::<String, ConfusionCounts>::new();
        let mut by_class = BTreeMap::<String, ConfusionCounts>::new();

        for section in sections {
            let counts = section.metrics.section.counts();
            document.merge(&counts);
            by_class
                .entry(section.document_class.clone())
                .or_default()
                .merge(&counts);
            for (attribute_type, metrics) in &section.metrics.by_attribute_type {
                by_type
                    .entry(attribute_type.clone())
                    .or_default()
                    .merge(&metrics.counts());
            }
        }

        DocumentMetrics {
            document: Metrics::from_counts(document),
            by_attribute_type: into_metrics(by_type),
            by_document_class: into_metrics(by_class),
        }
    }
}

fn into_metrics(counts: BTreeMap<String, ConfusionCounts>) -> BTreeMap<String, Metrics> {
    counts
        .into_iter()
        .map(|(key, counts)| (key, Metrics::from_counts(counts)))
        .collect()
}
