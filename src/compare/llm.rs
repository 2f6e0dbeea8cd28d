use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::{CompareParams, Comparator, absence_outcome, value_text};
use crate::error::ServiceError;
use crate::model::{ComparisonOutcome, EvaluationMethod};
use crate::service::{RetryPolicy, with_retry};

/// A language model reachable with a single prompt.
pub trait LlmClient: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String, ServiceError>;
}

/// Stand-in used when no LLM endpoint is configured; every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredLlm;

impl LlmClient for UnconfiguredLlm {
    fn complete(&self, _prompt: &str) -> Result<String, ServiceError> {
        Err(ServiceError::Unavailable(
            "no LLM endpoint configured".to_string(),
        ))
    }
}

const PROMPT_TEMPLATE: &str = "You are evaluating document extraction quality.
Document class: {document_class}
Attribute: {attribute_name}
Attribute description: {attribute_description}

Expected value: {expected}
Extracted value: {actual}

Decide whether the extracted value conveys the same information as the expected value.
Ignore differences in formatting, casing and abbreviations that do not change meaning.
Respond with only a JSON object: {\"match\": true or false, \"score\": number between 0 and 1, \"reason\": \"short explanation\"}";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LlmVerdict {
    #[serde(rename = "match", alias = "matched")]
    pub matched: bool,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub reason: Option<String>,
}

pub fn build_llm_prompt(
    actual: &Value,
    expected: &Value,
    params: &CompareParams<'_>,
) -> String {
    PROMPT_TEMPLATE
        .replace("{document_class}", params.document_class.unwrap_or("unknown"))
        .replace("{attribute_name}", &params.attribute.name)
        .replace(
            "{attribute_description}",
            params
                .attribute
                .description
                .as_deref()
                .unwrap_or("not provided"),
        )
        .replace("{expected}", &value_text(expected))
        .replace("{actual}", &value_text(actual))
}

/// Extracts the verdict object from a model reply that may wrap it in prose or code fences.
pub fn parse_llm_verdict(raw: &str) -> Result<LlmVerdict, ServiceError> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(ServiceError::MalformedResponse(
            "no JSON object in response".to_string(),
        ));
    };
    if end < start {
        return Err(ServiceError::MalformedResponse(
            "no JSON object in response".to_string(),
        ));
    }

    let verdict: LlmVerdict = serde_json::from_str(&raw[start..=end])
        .map_err(|err| ServiceError::MalformedResponse(err.to_string()))?;
    if let Some(score) = verdict.score
        && !score.is_finite()
    {
        return Err(ServiceError::MalformedResponse(format!(
            "score is not a finite number: {score}"
        )));
    }
    Ok(verdict)
}

pub struct LlmComparator {
    client: Arc<dyn LlmClient>,
    retry: RetryPolicy,
}

impl LlmComparator {
    pub fn new(client: Arc<dyn LlmClient>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }
}

impl Comparator for LlmComparator {
    fn method(&self) -> EvaluationMethod {
        EvaluationMethod::Llm
    }

    fn compare(
        &self,
        actual: Option<&Value>,
        expected: Option<&Value>,
        params: &CompareParams<'_>,
    ) -> ComparisonOutcome {
        let method = self.method();
        let threshold = params.threshold();
        if let Some(outcome) = absence_outcome(actual, expected, method, threshold) {
            return outcome;
        }
        let (Some(actual), Some(expected)) = (actual, expected) else {
            return ComparisonOutcome::not_matched("value is missing", method, threshold);
        };

        let prompt = build_llm_prompt(actual, expected, params);
        let verdict = with_retry(&self.retry, "llm_compare", || self.client.complete(&prompt))
            .and_then(|raw| parse_llm_verdict(&raw));

        match verdict {
            Ok(verdict) => {
                let score = verdict
                    .score
                    .unwrap_or(if verdict.matched { 1.0 } else { 0.0 });
                let reason = verdict
                    .reason
                    .filter(|reason| !reason.trim().is_empty())
                    .unwrap_or_else(|| "LLM verdict without explanation".to_string());
                // A configured threshold overrides the model's own decision.
                let matched = match threshold {
                    Some(threshold) => score >= threshold,
                    None => verdict.matched,
                };
                ComparisonOutcome::new(matched, score, reason, method, threshold)
            }
            Err(ServiceError::MalformedResponse(detail)) => {
                warn!(
                    attribute = %params.attribute.name,
                    detail = %detail,
                    "unparseable LLM response"
                );
                ComparisonOutcome::failed(
                    format!("could not parse LLM response: {detail}"),
                    method,
                    threshold,
                    ServiceError::MalformedResponse(detail),
                )
            }
            Err(err) => {
                warn!(attribute = %params.attribute.name, error = %err, "LLM comparison failed");
                ComparisonOutcome::failed(
                    format!("LLM comparison failed: {err}"),
                    method,
                    threshold,
                    err,
                )
            }
        }
    }
}
