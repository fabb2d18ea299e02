use crate::generation::{ExplanationField, QuestionKind};
use crate::models::domain::{
    CandidateAttributes, PostingCandidate, RankingMode, RequirementAttributes, SeekerCandidate,
    Vector,
};
use crate::services::session::QaPair;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use validator::{Validate, ValidationError};

fn validate_weights(weights: &HashMap<String, f64>) -> Result<(), ValidationError> {
    if weights.values().all(|w| w.is_finite() && *w >= 0.0) {
        Ok(())
    } else {
        Err(ValidationError::new("weights_must_be_non_negative"))
    }
}

fn validate_similarities(scores: &BTreeMap<ExplanationField, f64>) -> Result<(), ValidationError> {
    if scores.values().all(|s| (0.0..=1.0).contains(s)) {
        Ok(())
    } else {
        Err(ValidationError::new("similarity_out_of_range"))
    }
}

/// Score one pair of embeddings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScoreRequest {
    #[validate(length(min = 1))]
    pub vector_a: Vector,
    #[validate(length(min = 1))]
    pub vector_b: Vector,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub alpha: Option<f64>,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub beta: Option<f64>,
}

/// Evaluate structured compatibility of a candidate with a requirement
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EvaluateRequest {
    pub candidate: CandidateAttributes,
    pub requirement: RequirementAttributes,
    #[serde(default)]
    #[validate(custom(function = "validate_weights"))]
    pub weights: Option<HashMap<String, f64>>,
}

/// Which side is ranked against which
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "direction", rename_all = "snake_case")]
pub enum RankSubject {
    /// Rank job seekers for one posting
    SeekersForPosting {
        posting: PostingCandidate,
        seekers: Vec<SeekerCandidate>,
    },
    /// Rank postings for one job seeker
    PostingsForSeeker {
        seeker: SeekerCandidate,
        postings: Vec<PostingCandidate>,
    },
}

/// Rank a candidate pool
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RankRequest {
    #[serde(flatten)]
    pub subject: RankSubject,
    #[serde(default)]
    pub mode: Option<RankingMode>,
    #[serde(default)]
    #[validate(range(min = 1))]
    pub top_n: Option<usize>,
    #[serde(default)]
    #[validate(custom(function = "validate_weights"))]
    pub weights: Option<HashMap<String, f64>>,
}

/// Explain a talent/job match from per-field summaries
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExplainRequest {
    #[validate(length(min = 1))]
    pub talent_id: String,
    #[validate(length(min = 1))]
    pub job_id: String,
    #[serde(default)]
    pub talent_summaries: BTreeMap<ExplanationField, String>,
    #[serde(default)]
    pub job_summaries: BTreeMap<ExplanationField, String>,
    #[serde(default)]
    #[validate(custom(function = "validate_similarities"))]
    pub similarity_scores: BTreeMap<ExplanationField, f64>,
}

/// Generate interview questions
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionRequest {
    #[serde(flatten)]
    pub kind: QuestionKind,
    /// Summary of the profile or company the questions are about
    #[validate(length(min = 1))]
    pub context: String,
    #[serde(default)]
    pub previous_questions: Vec<String>,
    #[serde(default)]
    pub qa_history: Vec<QaPair>,
}

/// Texts to embed
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EmbedRequest {
    #[validate(length(min = 1))]
    pub texts: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_score_request_rejects_negative_alpha() {
        let request: ScoreRequest = serde_json::from_value(json!({
            "vector_a": [1.0, 0.0],
            "vector_b": [0.0, 1.0],
            "alpha": -0.5
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_rank_request_direction_tag() {
        let request: RankRequest = serde_json::from_value(json!({
            "direction": "postings_for_seeker",
            "seeker": {"id": "s1", "vector": [1.0], "attributes": {}},
            "postings": [],
            "top_n": 5
        }))
        .unwrap();

        assert!(matches!(request.subject, RankSubject::PostingsForSeeker { .. }));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let request: EvaluateRequest = serde_json::from_value(json!({
            "candidate": {},
            "requirement": {},
            "weights": {"salary": -1.0}
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_question_request_kind_tag() {
        let request: QuestionRequest = serde_json::from_value(json!({
            "kind": "talent_technical",
            "skill": "Rust",
            "question_number": 2,
            "context": "백엔드 개발자"
        }))
        .unwrap();

        assert_eq!(
            request.kind,
            QuestionKind::TalentTechnical { skill: "Rust".to_string(), question_number: 2 }
        );
    }

    #[test]
    fn test_explain_request_similarity_range() {
        let request: ExplainRequest = serde_json::from_value(json!({
            "talent_id": "t1",
            "job_id": "j1",
            "similarity_scores": {"roles": 1.2}
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }
}
