use crate::services::llm::{GenerationRequest, LlmError, TextGenerator};
use crate::services::session::{Dimension, InterviewPhase, InterviewSession, SessionHandle};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Dimensions each scripted exploration question measures
const EXPLORATION_TARGETS: [&[Dimension]; 3] = [
    &[Dimension::WorkStyle, Dimension::Communication],
    &[Dimension::ProblemSolving, Dimension::StressResponse],
    &[Dimension::Learning],
];

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Answer analysis failed: {0}")]
    Collaborator(#[from] LlmError),

    #[error("Answer analysis timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to decode analysis: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Interview is already finished")]
    Finished,
}

/// One detected trait signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitSignal {
    pub dimension: Dimension,
    #[serde(rename = "trait")]
    pub trait_name: String,
    pub score: f64,
}

/// Scored reading of one answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerAnalysis {
    pub reasoning: String,
    #[serde(default)]
    pub traits: Vec<TraitSignal>,
}

impl AnswerAnalysis {
    /// Signals grouped by dimension, limited to the measured dimensions
    ///
    /// Scores are clamped to [0, 1]; non-finite scores are dropped.
    pub fn detected(&self, targets: &[Dimension]) -> BTreeMap<Dimension, BTreeMap<String, f64>> {
        let mut detected: BTreeMap<Dimension, BTreeMap<String, f64>> = BTreeMap::new();
        for signal in &self.traits {
            if !targets.contains(&signal.dimension) || !signal.score.is_finite() {
                continue;
            }
            *detected
                .entry(signal.dimension)
                .or_default()
                .entry(signal.trait_name.clone())
                .or_insert(0.0) += signal.score.clamp(0.0, 1.0);
        }
        detected
    }
}

/// Dimensions measured by the question currently open in a session
pub fn current_targets(session: &InterviewSession) -> Vec<Dimension> {
    match session.phase() {
        InterviewPhase::Exploration => EXPLORATION_TARGETS[session.qa_history.len()].to_vec(),
        InterviewPhase::DeepDive => vec![session.persona.dominant_trait().dimension],
        InterviewPhase::Validation => vec![session.persona.least_clear_dimension()],
        InterviewPhase::Finished => Vec::new(),
    }
}

/// Scores situational answers into persona traits
#[derive(Clone)]
pub struct AnswerAnalyzer {
    generator: Arc<dyn TextGenerator>,
    call_timeout: Duration,
}

impl AnswerAnalyzer {
    pub fn new(generator: Arc<dyn TextGenerator>, call_timeout: Duration) -> Self {
        Self {
            generator,
            call_timeout,
        }
    }

    pub async fn analyze(
        &self,
        question: &str,
        answer: &str,
        targets: &[Dimension],
    ) -> Result<AnswerAnalysis, AnalysisError> {
        let request = analysis_request(question, answer, targets);
        let value = tokio::time::timeout(self.call_timeout, self.generator.generate(&request))
            .await
            .map_err(|_| AnalysisError::Timeout(self.call_timeout))??;
        Ok(serde_json::from_value(value)?)
    }

    /// Analyze an answer and fold it into the session
    ///
    /// # Returns
    /// The analysis and the trait scores it contributed
    pub async fn submit_answer(
        &self,
        session: &SessionHandle,
        question: &str,
        answer: &str,
    ) -> Result<(AnswerAnalysis, BTreeMap<Dimension, BTreeMap<String, f64>>), AnalysisError> {
        let mut session = session.lock().await;
        if session.phase() == InterviewPhase::Finished {
            return Err(AnalysisError::Finished);
        }

        let targets = current_targets(&session);
        let analysis = self.analyze(question, answer, &targets).await?;
        let detected = analysis.detected(&targets);

        for (dimension, traits) in &detected {
            session.persona.merge(*dimension, traits);
        }
        session.record_answer(question, answer);

        tracing::debug!(
            "Session {} answer {} scored {} dimensions",
            session.session_id,
            session.qa_history.len(),
            detected.len()
        );

        Ok((analysis, detected))
    }
}

fn analysis_request(question: &str, answer: &str, targets: &[Dimension]) -> GenerationRequest {
    let criteria = Dimension::ALL
        .iter()
        .map(|dimension| {
            let traits = dimension
                .traits()
                .iter()
                .map(|(name, signals)| format!("  - {}: {}", name, signals))
                .collect::<Vec<_>>()
                .join("\n");
            format!("{} ({}):\n{}", dimension_key(*dimension), dimension.label(), traits)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let system = format!(
        "You are an HR expert judging a candidate's culture-fit tendencies.\n\
         Criteria:\n{criteria}\n\
         Score each detected trait from 0.0 to 1.0: strong signal 0.7-1.0, medium 0.4-0.6, weak \
         0.0-0.3. Scores need not sum to 1. Only analyze what the answer actually shows."
    );

    let target_keys = targets
        .iter()
        .map(|d| dimension_key(*d))
        .collect::<Vec<_>>()
        .join(", ");
    let prompt = format!(
        "Question: {question}\nAnswer: {answer}\nMeasured dimensions: {target_keys}\n\n\
         Report trait scores only for the measured dimensions."
    );

    GenerationRequest::new(system, prompt)
        .with_schema(analysis_schema())
        .with_temperature(0.3)
}

fn dimension_key(dimension: Dimension) -> String {
    serde_json::to_value(dimension)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn analysis_schema() -> Value {
    let dimensions: Vec<String> = Dimension::ALL.iter().map(|d| dimension_key(*d)).collect();
    json!({
        "type": "object",
        "properties": {
            "reasoning": { "type": "string" },
            "traits": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "dimension": { "type": "string", "enum": dimensions },
                        "trait": { "type": "string" },
                        "score": { "type": "number" }
                    },
                    "required": ["dimension", "trait", "score"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["reasoning", "traits"],
        "additionalProperties": false
    })
}
