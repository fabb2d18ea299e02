use crate::generation::explanation::{ExplanationCategory, FieldExplanation};
use crate::services::llm::{GenerationRequest, LlmError, TextGenerator};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Most questions kept in a category summary
pub const MAX_CATEGORY_QUESTIONS: usize = 5;

/// Errors raised while summarizing a category
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("No field explanations to aggregate for {0}")]
    EmptyInput(ExplanationCategory),

    #[error("Aggregation call failed: {0}")]
    Collaborator(#[from] LlmError),

    #[error("Aggregation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to decode aggregation reply: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Aggregation reply for {0} has no suggested questions")]
    NoQuestions(ExplanationCategory),
}

/// Display-level summary of one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: ExplanationCategory,
    pub matching_evidence: String,
    pub check_points: String,
    pub suggested_questions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SummaryReply {
    matching_evidence: String,
    check_points: String,
    #[serde(default)]
    suggested_questions: Vec<String>,
}

/// Summarizes field explanations into one category in a single call
#[derive(Clone)]
pub struct Aggregator {
    generator: Arc<dyn TextGenerator>,
    call_timeout: Duration,
}

impl Aggregator {
    pub fn new(generator: Arc<dyn TextGenerator>, call_timeout: Duration) -> Self {
        Self {
            generator,
            call_timeout,
        }
    }

    /// Merge field explanations into a category summary
    ///
    /// Not retried; any failure goes back to the caller.
    ///
    /// # Arguments
    /// * `category` - The category being summarized
    /// * `field_results` - Explanations of the fields belonging to the category
    pub async fn aggregate(
        &self,
        category: ExplanationCategory,
        field_results: &[FieldExplanation],
    ) -> Result<CategorySummary, AggregationError> {
        if field_results.is_empty() {
            return Err(AggregationError::EmptyInput(category));
        }

        let request = Self::request(category, field_results);
        let value = tokio::time::timeout(self.call_timeout, self.generator.generate(&request))
            .await
            .map_err(|_| AggregationError::Timeout(self.call_timeout))??;
        let reply: SummaryReply = serde_json::from_value(value)?;

        let mut suggested_questions: Vec<String> = reply
            .suggested_questions
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        if suggested_questions.is_empty() {
            return Err(AggregationError::NoQuestions(category));
        }
        suggested_questions.truncate(MAX_CATEGORY_QUESTIONS);

        tracing::debug!(
            "Aggregated {} from {} fields ({} questions)",
            category,
            field_results.len(),
            suggested_questions.len()
        );

        Ok(CategorySummary {
            category,
            matching_evidence: reply.matching_evidence,
            check_points: reply.check_points,
            suggested_questions,
        })
    }

    fn request(
        category: ExplanationCategory,
        field_results: &[FieldExplanation],
    ) -> GenerationRequest {
        let field_context = field_results
            .iter()
            .map(|fr| {
                format!(
                    "Field: {}\nMatching Reason: {}\nRisk/Gap: {}\nQuestions: {}",
                    fr.field,
                    fr.matching_reason,
                    fr.risk_or_gap,
                    fr.suggested_questions.join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let system = "You are an HR analyst writing executive-level match explanations. Merge the \
            field analyses into one coherent category explanation: matching_evidence tells the \
            story of why the category matches, check_points lists what to verify, and \
            suggested_questions picks the 3-5 most useful distinct questions.";

        let prompt = format!(
            "Category: {}\n\nField-level Analysis Results:\n{}\n\n\
             Aggregate these field results into a category-level explanation.",
            category, field_context
        );

        let schema = json!({
            "type": "object",
            "properties": {
                "matching_evidence": { "type": "string" },
                "check_points": { "type": "string" },
                "suggested_questions": {
                    "type": "array",
                    "minItems": 1,
                    "maxItems": MAX_CATEGORY_QUESTIONS,
                    "items": { "type": "string" }
                }
            },
            "required": ["matching_evidence", "check_points", "suggested_questions"],
            "additionalProperties": false
        });

        GenerationRequest::new(system, prompt)
            .with_schema(schema)
            .with_temperature(0.3)
    }
}
