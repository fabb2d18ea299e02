use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed-length embedding vector
pub type Vector = Vec<f64>;

/// Score of one vector pair
///
/// `score = alpha * cosine_similarity - beta * euclidean_distance`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchingScore {
    pub score: f64,
    pub cosine_similarity: f64,
    pub euclidean_distance: f64,
    pub alpha: f64,
    pub beta: f64,
}

/// Compatibility band for a field score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompatibilityLevel {
    Perfect,
    Excellent,
    Good,
    Fair,
    Poor,
    Incompatible,
}

impl CompatibilityLevel {
    /// Classify a score in [0, 1] into its fixed band
    pub fn from_score(score: f64) -> Self {
        if score >= 1.0 {
            Self::Perfect
        } else if score >= 0.9 {
            Self::Excellent
        } else if score >= 0.7 {
            Self::Good
        } else if score >= 0.5 {
            Self::Fair
        } else if score >= 0.2 {
            Self::Poor
        } else {
            Self::Incompatible
        }
    }
}

/// Compatibility of one field for one candidate pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCompatibility {
    pub field: String,
    pub score: f64,
    pub level: CompatibilityLevel,
    pub reason: String,
    pub penalty: f64,
}

impl FieldCompatibility {
    /// Build a field result; the score is clamped into [0, 1] and the level
    /// and penalty are derived from it
    pub fn new(field: impl Into<String>, score: f64, reason: impl Into<String>) -> Self {
        let score = if score.is_nan() { 0.5 } else { score.clamp(0.0, 1.0) };
        Self {
            field: field.into(),
            score,
            level: CompatibilityLevel::from_score(score),
            reason: reason.into(),
            penalty: 1.0 - score,
        }
    }
}

/// Weighted compatibility of a candidate against a set of requirements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityResult {
    pub overall_score: f64,
    pub field_scores: Vec<FieldCompatibility>,
    pub applied_weights: BTreeMap<String, f64>,
    pub summary: String,
}

/// Inclusive salary range, in the posting's currency unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: f64,
    pub max: f64,
}

/// Language proficiency levels (1 = basic .. 5 = native)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageLevels {
    #[serde(default)]
    pub korean: Option<u8>,
    #[serde(default)]
    pub english: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentType {
    #[serde(alias = "정규직")]
    FullTime,
    #[serde(alias = "계약직")]
    Contract,
    #[serde(alias = "프리랜서")]
    Freelance,
    #[serde(alias = "외주")]
    Outsourcing,
    #[serde(alias = "인턴")]
    Intern,
}

impl EmploymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullTime => "full_time",
            Self::Contract => "contract",
            Self::Freelance => "freelance",
            Self::Outsourcing => "outsourcing",
            Self::Intern => "intern",
        }
    }
}

/// Structured attributes of a job seeker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateAttributes {
    #[serde(default)]
    pub preferred_locations: Vec<String>,
    #[serde(default)]
    pub remote_work_ok: Option<bool>,
    #[serde(default)]
    pub years_experience: Option<f64>,
    #[serde(default)]
    pub salary_expectation: Option<SalaryRange>,
    #[serde(default)]
    pub preferred_employment_types: Vec<EmploymentType>,
    #[serde(default)]
    pub language_levels: Option<LanguageLevels>,
    #[serde(default)]
    pub visa_status: Option<String>,
}

/// Structured requirements of a job posting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequirementAttributes {
    #[serde(default)]
    pub work_locations: Vec<String>,
    #[serde(default)]
    pub remote_work_allowed: Option<bool>,
    #[serde(default)]
    pub min_experience_years: Option<f64>,
    #[serde(default)]
    pub max_experience_years: Option<f64>,
    #[serde(default)]
    pub salary_range: Option<SalaryRange>,
    #[serde(default)]
    pub employment_types: Vec<EmploymentType>,
    #[serde(default)]
    pub language_requirements: Option<LanguageLevels>,
    #[serde(default)]
    pub visa_requirements: Vec<String>,
}

/// One side of a ranking batch: an id, its embedding and its attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankCandidate<A> {
    pub id: String,
    #[serde(default)]
    pub vector: Option<Vector>,
    pub attributes: A,
}

/// A job seeker to be ranked against a posting
pub type SeekerCandidate = RankCandidate<CandidateAttributes>;
/// A posting to be ranked against a seeker
pub type PostingCandidate = RankCandidate<RequirementAttributes>;

/// How per-pair scores are turned into a ranking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingMode {
    /// `vector_score * compatibility`, nothing is excluded
    #[default]
    Integrated,
    /// Hard pass/fail rules first, then vector score only
    Structural,
}

/// Per-result details kept for explainability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchMetadata {
    pub vector: MatchingScore,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<CompatibilityResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_optional_rules: Vec<String>,
}

/// A ranked match between the query subject and one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingResult {
    pub subject_id: String,
    pub candidate_id: String,
    pub score: f64,
    pub rank: Option<usize>,
    pub metadata: MatchMetadata,
}

/// Why a candidate was left out of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    MissingVector,
    DimensionMismatch { expected: usize, actual: usize },
    /// The vector holds NaN or an infinity
    NonFinite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedCandidate {
    pub candidate_id: String,
    pub reason: SkipReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_bands() {
        assert_eq!(CompatibilityLevel::from_score(1.0), CompatibilityLevel::Perfect);
        assert_eq!(CompatibilityLevel::from_score(0.95), CompatibilityLevel::Excellent);
        assert_eq!(CompatibilityLevel::from_score(0.9), CompatibilityLevel::Excellent);
        assert_eq!(CompatibilityLevel::from_score(0.7), CompatibilityLevel::Good);
        assert_eq!(CompatibilityLevel::from_score(0.69), CompatibilityLevel::Fair);
        assert_eq!(CompatibilityLevel::from_score(0.2), CompatibilityLevel::Poor);
        assert_eq!(CompatibilityLevel::from_score(0.19), CompatibilityLevel::Incompatible);
    }

    #[test]
    fn test_field_compatibility_clamps() {
        let high = FieldCompatibility::new("custom", 1.7, "too high");
        assert_eq!(high.score, 1.0);
        assert_eq!(high.penalty, 0.0);

        let nan = FieldCompatibility::new("custom", f64::NAN, "nan");
        assert_eq!(nan.score, 0.5);
        assert_eq!(nan.level, CompatibilityLevel::Fair);
    }

    #[test]
    fn test_employment_type_accepts_korean_labels() {
        let types: Vec<EmploymentType> = serde_json::from_str(r#"["정규직", "contract"]"#).unwrap();
        assert_eq!(types, vec![EmploymentType::FullTime, EmploymentType::Contract]);
    }
}
