use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use extraction_eval::Evaluator;
use extraction_eval::config::{EvaluatorSettings, load_config};
use extraction_eval::model::{DocumentEvaluationResult, DocumentInput};

use crate::cli::EvaluateArgs;
use crate::util::{now_utc_string, read_json, sha256_file, write_json_pretty, write_json_stdout};

const REPORT_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
pub struct EvaluationReport {
    pub report_version: u32,
    pub generated_at: String,
    pub config_path: String,
    pub config_sha256: String,
    pub document_path: String,
    pub document_sha256: String,
    pub result: DocumentEvaluationResult,
}

pub fn run(args: EvaluateArgs) -> Result<()> {
    let mut config = load_config(&args.config)
        .with_context(|| format!("failed to load configuration {}", args.config.display()))?;
    apply_overrides(&mut config.evaluation, &args);

    let document: DocumentInput = read_json(&args.document)?;
    info!(
        document = %document.document_id,
        sections = document.sections.len(),
        classes = config.classes.len(),
        max_concurrency = config.evaluation.max_concurrency,
        timeout_ms = config.evaluation.timeout_ms,
        "evaluation started"
    );

    let evaluator = Evaluator::from_config(config).context("invalid evaluation configuration")?;
    let result = evaluator.evaluate_document(&document);
    if result.timed_out {
        warn!(
            document = %result.document_id,
            "evaluation deadline passed; report contains unevaluated fields"
        );
    }

    let report = EvaluationReport {
        report_version: REPORT_VERSION,
        generated_at: now_utc_string(),
        config_path: args.config.display().to_string(),
        config_sha256: sha256_file(&args.config)?,
        document_path: args.document.display().to_string(),
        document_sha256: sha256_file(&args.document)?,
        result,
    };
    log_summary(&report.result);

    match args.output.as_deref() {
        Some(path) => write_report(path, &report),
        None => write_json_stdout(&report),
    }
}

fn apply_overrides(settings: &mut EvaluatorSettings, args: &EvaluateArgs) {
    if let Some(max_concurrency) = args.max_concurrency {
        settings.max_concurrency = max_concurrency;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        settings.timeout_ms = timeout_ms;
    }
    if let Some(method) = args.discovery_method {
        settings.discovery_method = method.as_method();
    }
    if let Some(endpoint) = &args.llm_endpoint {
        settings.llm.endpoint = Some(endpoint.clone());
    }
    if let Some(model) = &args.llm_model {
        settings.llm.model = Some(model.clone());
    }
    if let Some(endpoint) = &args.embedding_endpoint {
        settings.embedding.endpoint = Some(endpoint.clone());
    }
    if args.count_both_absent_as_true_negative {
        settings.count_both_absent_as_true_negative = true;
    }
}

fn log_summary(result: &DocumentEvaluationResult) {
    for section in &result.sections {
        let metrics = &section.metrics.section;
        info!(
            section = %section.section_id,
            document_class = %section.document_class,
            attributes = section.attributes.len(),
            true_positive = metrics.true_positive,
            false_positive = metrics.false_positive,
            false_negative = metrics.false_negative,
            f1 = ?metrics.f1,
            diagnostics = section.diagnostics.len(),
            "section summary"
        );
    }
    for skipped in &result.skipped_sections {
        warn!(section = %skipped.section_id, reason = %skipped.reason, "section skipped");
    }

    let document = &result.metrics.document;
    info!(
        document = %result.document_id,
        precision = ?document.precision,
        recall = ?document.recall,
        f1 = ?document.f1,
        accuracy = ?document.accuracy,
        false_alarm_rate = ?document.false_alarm_rate,
        false_discovery_rate = ?document.false_discovery_rate,
        "document summary"
    );
}

fn write_report(path: &Path, report: &EvaluationReport) -> Result<()> {
    write_json_pretty(path, report)?;
    info!(path = %path.display(), "wrote evaluation report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::{Value, json};

    use super::*;
    use crate::cli::LeafMethod;

    fn args(config: &Path, document: &Path, output: &Path) -> EvaluateArgs {
        EvaluateArgs {
            config: config.to_path_buf(),
            document: document.to_path_buf(),
            output: Some(output.to_path_buf()),
            max_concurrency: Some(2),
            timeout_ms: None,
            discovery_method: Some(LeafMethod::Fuzzy),
            llm_endpoint: None,
            llm_model: None,
            embedding_endpoint: None,
            count_both_absent_as_true_negative: false,
        }
    }

    #[test]
    fn overrides_replace_file_settings() {
        let mut settings = EvaluatorSettings::default();
        let dir = Path::new("unused");
        let mut cli = args(dir, dir, dir);
        cli.llm_endpoint = Some("http://localhost:8080/v1/chat/completions".to_string());
        cli.count_both_absent_as_true_negative = true;

        apply_overrides(&mut settings, &cli);
        assert_eq!(settings.max_concurrency, 2);
        assert_eq!(
            settings.discovery_method,
            extraction_eval::model::EvaluationMethod::Fuzzy
        );
        assert!(settings.llm.endpoint.is_some());
        assert!(settings.count_both_absent_as_true_negative);
    }

    #[test]
    fn writes_report_with_provenance() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = dir.path().join("config.json");
        let document = dir.path().join("document.json");
        let output = dir.path().join("out").join("report.json");
        fs::write(
            &config,
            json!({"classes": [{"name": "Invoice", "attributes": [
                {"name": "Amount", "evaluation_method": "NUMERIC_EXACT"}
            ]}]})
            .to_string(),
        )
        .expect("write config");
        fs::write(
            &document,
            json!({"document_id": "doc-7", "sections": [{
                "section_id": "s1",
                "document_class": "Invoice",
                "actual": {"Amount": "$10.00"},
                "expected": {"Amount": "10.00"}
            }]})
            .to_string(),
        )
        .expect("write document");

        run(args(&config, &document, &output)).expect("evaluation succeeds");

        let report: Value = crate::util::read_json(&output).expect("report written");
        assert_eq!(report["report_version"], json!(1));
        assert_eq!(report["config_sha256"].as_str().map(str::len), Some(64));
        assert_eq!(report["result"]["document_id"], json!("doc-7"));
        assert_eq!(
            report["result"]["sections"][0]["attributes"][0]["matched"],
            json!(true)
        );
        assert_eq!(report["result"]["metrics"]["document"]["precision"], json!(1.0));
    }
}
