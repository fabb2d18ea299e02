use crate::generation::controller::{AttemptRecord, GenerationTask};
use crate::generation::prompts::{retry_context, verdict_schema, EVALUATOR_SYSTEM};
use crate::generation::validation::{Artifact, HeuristicRule};
use crate::services::llm::GenerationRequest;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Character bounds of the matching reason
const REASON_CHARS: (usize, usize) = (20, 400);

/// Character bounds of the risk description
const RISK_CHARS: (usize, usize) = (10, 400);

/// Character bounds of each suggested question
const QUESTION_CHARS: (usize, usize) = (10, 200);

/// Profile aspect compared between a candidate and a posting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplanationField {
    Roles,
    Skills,
    Growth,
    Career,
    Vision,
    Culture,
}

impl ExplanationField {
    pub const ALL: [ExplanationField; 6] = [
        ExplanationField::Roles,
        ExplanationField::Skills,
        ExplanationField::Growth,
        ExplanationField::Career,
        ExplanationField::Vision,
        ExplanationField::Culture,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Roles => "roles",
            Self::Skills => "skills",
            Self::Growth => "growth",
            Self::Career => "career",
            Self::Vision => "vision",
            Self::Culture => "culture",
        }
    }

    /// Category this field is aggregated into
    pub fn category(&self) -> ExplanationCategory {
        match self {
            Self::Roles | Self::Skills => ExplanationCategory::JobFit,
            Self::Growth | Self::Career | Self::Vision => ExplanationCategory::GrowthPotential,
            Self::Culture => ExplanationCategory::CultureFit,
        }
    }
}

impl fmt::Display for ExplanationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Group of fields summarized together for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExplanationCategory {
    #[serde(rename = "직무 적합성")]
    JobFit,
    #[serde(rename = "성장 가능성")]
    GrowthPotential,
    #[serde(rename = "문화 적합성")]
    CultureFit,
}

impl ExplanationCategory {
    pub const ALL: [ExplanationCategory; 3] = [
        ExplanationCategory::JobFit,
        ExplanationCategory::GrowthPotential,
        ExplanationCategory::CultureFit,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::JobFit => "직무 적합성",
            Self::GrowthPotential => "성장 가능성",
            Self::CultureFit => "문화 적합성",
        }
    }

    pub fn fields(&self) -> Vec<ExplanationField> {
        ExplanationField::ALL
            .iter()
            .copied()
            .filter(|field| field.category() == *self)
            .collect()
    }
}

impl fmt::Display for ExplanationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What one field explanation is generated from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInput {
    pub field: ExplanationField,
    pub talent_summary: String,
    pub job_summary: String,
    /// Cosine similarity of the two field embeddings, in [0, 1]
    pub similarity: f64,
}

/// Generated explanation of one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldExplanation {
    pub field: ExplanationField,
    pub matching_reason: String,
    pub risk_or_gap: String,
    pub suggested_questions: Vec<String>,
}

impl Artifact for FieldExplanation {
    fn items(&self) -> Vec<&str> {
        self.suggested_questions.iter().map(String::as_str).collect()
    }
}

fn check_length(label: &str, text: &str, (min, max): (usize, usize)) -> Option<String> {
    let len = text.trim().chars().count();
    if len < min {
        Some(format!("{} is too short (minimum {} characters)", label, min))
    } else if len > max {
        Some(format!("{} is too long (maximum {} characters)", label, max))
    } else {
        None
    }
}

/// Generation task explaining why one field matches
#[derive(Debug, Clone)]
pub struct FieldExplanationTask {
    input: FieldInput,
}

impl FieldExplanationTask {
    pub fn new(input: FieldInput) -> Self {
        Self { input }
    }

    pub fn input(&self) -> &FieldInput {
        &self.input
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "field": { "type": "string", "enum": [self.input.field.as_str()] },
                "matching_reason": { "type": "string" },
                "risk_or_gap": { "type": "string" },
                "suggested_questions": {
                    "type": "array",
                    "minItems": 1,
                    "maxItems": 3,
                    "items": { "type": "string" }
                }
            },
            "required": ["field", "matching_reason", "risk_or_gap", "suggested_questions"],
            "additionalProperties": false
        })
    }

    fn field_context(&self) -> String {
        format!(
            "Field: {}\nSimilarity Score: {:.3}\n\nTalent Summary:\n{}\n\nJob Summary:\n{}",
            self.input.field,
            self.input.similarity,
            self.input.talent_summary,
            self.input.job_summary
        )
    }
}

impl GenerationTask for FieldExplanationTask {
    type Output = FieldExplanation;

    fn name(&self) -> &str {
        self.input.field.as_str()
    }

    fn generation_request(&self, history: &[AttemptRecord<FieldExplanation>]) -> GenerationRequest {
        let system = "You are an HR analyst explaining a talent and job match for one field. \
            Using only the provided summaries, write matching_reason (why they match), \
            risk_or_gap (risks or gaps to watch) and 2-3 suggested_questions an interviewer can \
            ask to validate the match. Be specific and evidence based, and keep each explanation \
            concise.";

        let prompt = format!(
            "{}\n\nAnalyze this field and provide structured output.{}",
            self.field_context(),
            retry_context(history)
        );

        GenerationRequest::new(system, prompt)
            .with_schema(self.schema())
            .with_temperature(0.3)
    }

    fn heuristic_rules(&self) -> Vec<HeuristicRule> {
        vec![
            HeuristicRule::CountRange { min: 1, max: 3 },
            HeuristicRule::LengthBounds {
                min: QUESTION_CHARS.0,
                max: QUESTION_CHARS.1,
            },
            HeuristicRule::UniqueItems,
        ]
    }

    fn extra_checks(&self, artifact: &FieldExplanation) -> Vec<String> {
        let mut errors = Vec::new();

        if artifact.field != self.input.field {
            errors.push(format!(
                "Field must be {}, got {}",
                self.input.field, artifact.field
            ));
        }
        errors.extend(check_length("Matching reason", &artifact.matching_reason, REASON_CHARS));
        errors.extend(check_length("Risk or gap", &artifact.risk_or_gap, RISK_CHARS));

        errors
    }

    fn semantic_request(&self, artifact: &FieldExplanation) -> GenerationRequest {
        let prompt = format!(
            "[Criteria]\n\
             1. matching_reason is supported by both summaries and does not invent facts.\n\
             2. risk_or_gap names a concrete gap rather than a generic caveat.\n\
             3. suggested_questions would help an interviewer validate this field.\n\
             4. The tone matches the similarity score.\n\n\
             [Input]\n{}\n\n[Explanation]\nmatching_reason: {}\nrisk_or_gap: {}\n\
             suggested_questions: {}",
            self.field_context(),
            artifact.matching_reason,
            artifact.risk_or_gap,
            artifact.suggested_questions.join(" | ")
        );

        GenerationRequest::new(EVALUATOR_SYSTEM, prompt)
            .with_schema(verdict_schema())
            .with_temperature(0.0)
    }

    fn fallback_artifact(&self) -> FieldExplanation {
        FieldExplanation {
            field: self.input.field,
            matching_reason: format!(
                "The {} summaries have a similarity of {:.2}; no detailed explanation could be \
                 generated.",
                self.input.field, self.input.similarity
            ),
            risk_or_gap: "Not assessed.".to_string(),
            suggested_questions: vec![format!(
                "Can you describe your experience related to {}?",
                self.input.field
            )],
        }
    }
}
