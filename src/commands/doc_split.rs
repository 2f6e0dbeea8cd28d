use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use extraction_eval::doc_split::{DocSplitResult, SectionSplitRecord, evaluate_doc_split};

use crate::cli::DocSplitArgs;
use crate::util::{now_utc_string, read_json, sha256_file, write_json_pretty, write_json_stdout};

const REPORT_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
pub struct DocSplitReport {
    pub report_version: u32,
    pub generated_at: String,
    pub ground_truth_path: String,
    pub ground_truth_sha256: String,
    pub predicted_path: String,
    pub predicted_sha256: String,
    pub result: DocSplitResult,
}

pub fn run(args: DocSplitArgs) -> Result<()> {
    let ground_truth: Vec<SectionSplitRecord> = read_json(&args.ground_truth)?;
    let predicted: Vec<SectionSplitRecord> = read_json(&args.predicted)?;
    info!(
        ground_truth_sections = ground_truth.len(),
        predicted_sections = predicted.len(),
        "doc split evaluation started"
    );

    let result = evaluate_doc_split(&ground_truth, &predicted);
    for diagnostic in &result.diagnostics {
        warn!(path = %diagnostic.path, message = %diagnostic.message, "page conflict");
    }
    info!(
        page_accuracy = ?result.page_level_accuracy.accuracy,
        split_accuracy_without_order = ?result.split_accuracy_without_order.accuracy,
        split_accuracy_with_order = ?result.split_accuracy_with_order.accuracy,
        unmatched_predicted = result.split_accuracy_without_order.unmatched_predicted.len(),
        "doc split summary"
    );

    let report = DocSplitReport {
        report_version: REPORT_VERSION,
        generated_at: now_utc_string(),
        ground_truth_path: args.ground_truth.display().to_string(),
        ground_truth_sha256: sha256_file(&args.ground_truth)?,
        predicted_path: args.predicted.display().to_string(),
        predicted_sha256: sha256_file(&args.predicted)?,
        result,
    };

    match args.output.as_deref() {
        Some(path) => {
            write_json_pretty(path, &report)?;
            info!(path = %path.display(), "wrote doc split report");
            Ok(())
        }
        None => write_json_stdout(&report),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::{Value, json};

    use super::*;

    #[test]
    fn writes_split_accuracies() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ground_truth = dir.path().join("ground_truth.json");
        let predicted = dir.path().join("predicted.json");
        let output = dir.path().join("split.json");
        fs::write(
            &ground_truth,
            json!([{"section_id": "1", "document_class": "Invoice", "page_indices": [0, 1, 2]}])
                .to_string(),
        )
        .expect("write ground truth");
        fs::write(
            &predicted,
            json!([{"section_id": "a", "document_class": "Invoice", "page_indices": [2, 0, 1]}])
                .to_string(),
        )
        .expect("write predicted");

        run(DocSplitArgs {
            ground_truth,
            predicted,
            output: Some(output.clone()),
        })
        .expect("doc split succeeds");

        let report: Value = read_json(&output).expect("report written");
        let result = &report["result"];
        assert_eq!(result["split_accuracy_without_order"]["accuracy"], json!(1.0));
        assert_eq!(result["split_accuracy_with_order"]["accuracy"], json!(0.0));
        assert_eq!(result["page_level_accuracy"]["correct"], json!(3));
    }
}
