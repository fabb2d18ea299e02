use crate::models::{CandidateAttributes, EmploymentType, FieldCompatibility, RequirementAttributes};
use thiserror::Error;

pub const LOCATION: &str = "location";
pub const EXPERIENCE: &str = "experience";
pub const SALARY: &str = "salary";
pub const EMPLOYMENT: &str = "employment";
pub const LANGUAGE: &str = "language";
pub const REMOTE_WORK: &str = "remote_work";

/// Tokens a candidate uses to say they accept remote work
const REMOTE_TOKENS: &[&str] = &["remote", "원격"];

/// Metropolitan areas close enough to commute between
const REGION_GROUPS: &[&[&str]] = &[
    &["서울", "경기", "인천"],
    &["부산", "울산", "경남"],
    &["대구", "경북"],
    &["대전", "충남", "충북"],
    &["광주", "전남", "전북"],
];

/// Employment types that are interchangeable enough to score partially
const SIMILAR_EMPLOYMENT: &[&[EmploymentType]] = &[
    &[EmploymentType::FullTime, EmploymentType::Contract],
    &[
        EmploymentType::Freelance,
        EmploymentType::Outsourcing,
        EmploymentType::Contract,
    ],
    &[EmploymentType::Intern, EmploymentType::Contract],
];

/// Language level assumed when a side does not state one
const DEFAULT_LANGUAGE_LEVEL: u8 = 1;

/// Errors a field calculator can raise
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    /// Some of the inputs the rule needs are absent
    #[error("Missing inputs: {}", missing.join(", "))]
    Missing { missing: Vec<String>, expected: usize },

    #[error("Invalid input: {0}")]
    Invalid(String),
}

/// A named scoring rule for one field
///
/// Implementations are pure functions of the two attribute sets.
pub trait FieldCalculator: Send + Sync {
    fn field(&self) -> &str;

    fn calculate(
        &self,
        candidate: &CandidateAttributes,
        requirement: &RequirementAttributes,
    ) -> Result<FieldCompatibility, FieldError>;
}

/// Collects absent inputs so calculators can report all of them at once
struct MissingInputs {
    missing: Vec<String>,
    expected: usize,
}

impl MissingInputs {
    fn new(expected: usize) -> Self {
        Self {
            missing: Vec::new(),
            expected,
        }
    }

    fn require(&mut self, present: bool, name: &str) {
        if !present {
            self.missing.push(name.to_string());
        }
    }

    fn into_error(self) -> FieldError {
        FieldError::Missing {
            missing: self.missing,
            expected: self.expected,
        }
    }

    fn check(self) -> Result<(), FieldError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(self.into_error())
        }
    }
}

/// Whether the candidate opted into remote work, by flag or by a remote location entry
pub(crate) fn accepts_remote(candidate: &CandidateAttributes) -> bool {
    candidate.remote_work_ok.unwrap_or(false)
        || candidate
            .preferred_locations
            .iter()
            .any(|loc| REMOTE_TOKENS.contains(&loc.trim().to_lowercase().as_str()))
}

fn share_group<T: PartialEq>(groups: &[&[T]], left: &[T], right: &[T]) -> bool {
    groups.iter().any(|group| {
        left.iter().any(|item| group.contains(item))
            && right.iter().any(|item| group.contains(item))
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocationCalculator;

impl FieldCalculator for LocationCalculator {
    fn field(&self) -> &str {
        LOCATION
    }

    fn calculate(
        &self,
        candidate: &CandidateAttributes,
        requirement: &RequirementAttributes,
    ) -> Result<FieldCompatibility, FieldError> {
        let mut inputs = MissingInputs::new(2);
        inputs.require(!candidate.preferred_locations.is_empty(), "preferred_locations");
        inputs.require(!requirement.work_locations.is_empty(), "work_locations");
        inputs.check()?;

        let shared = candidate
            .preferred_locations
            .iter()
            .any(|loc| requirement.work_locations.contains(loc));
        if shared {
            return Ok(FieldCompatibility::new(LOCATION, 1.0, "Location preferences match exactly"));
        }

        if requirement.remote_work_allowed.unwrap_or(false) && accepts_remote(candidate) {
            return Ok(FieldCompatibility::new(
                LOCATION,
                0.9,
                "Remote work available and preferred",
            ));
        }

        let candidate_locs: Vec<&str> =
            candidate.preferred_locations.iter().map(String::as_str).collect();
        let work_locs: Vec<&str> = requirement.work_locations.iter().map(String::as_str).collect();
        if share_group(REGION_GROUPS, &candidate_locs, &work_locs) {
            return Ok(FieldCompatibility::new(LOCATION, 0.7, "Nearby area, commuting possible"));
        }

        Ok(FieldCompatibility::new(LOCATION, 0.2, "Location mismatch, relocation required"))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExperienceCalculator;

impl FieldCalculator for ExperienceCalculator {
    fn field(&self) -> &str {
        EXPERIENCE
    }

    fn calculate(
        &self,
        candidate: &CandidateAttributes,
        requirement: &RequirementAttributes,
    ) -> Result<FieldCompatibility, FieldError> {
        let mut inputs = MissingInputs::new(2);
        inputs.require(candidate.years_experience.is_some(), "years_experience");
        inputs.require(requirement.min_experience_years.is_some(), "min_experience_years");
        inputs.check()?;

        let years = candidate.years_experience.unwrap_or_default();
        let floor = requirement.min_experience_years.unwrap_or_default();
        let ceiling = requirement.max_experience_years.unwrap_or(f64::INFINITY);

        if years < 0.0 || floor < 0.0 || ceiling < floor {
            return Err(FieldError::Invalid(format!(
                "experience bounds are inconsistent (candidate={}, floor={}, ceiling={})",
                years, floor, ceiling
            )));
        }

        if years < floor {
            let gap = floor - years;
            let score = (1.0 - gap / floor * 0.8).max(0.1);
            let reason = if score >= 0.6 {
                format!("Slightly below requirement ({}y < {}y)", years, floor)
            } else {
                format!("Significantly below requirement ({}y << {}y)", years, floor)
            };
            return Ok(FieldCompatibility::new(EXPERIENCE, score, reason));
        }

        if years > ceiling {
            return Ok(FieldCompatibility::new(
                EXPERIENCE,
                0.7,
                format!("Overqualified ({}y > {}y)", years, ceiling),
            ));
        }

        if years >= floor * 1.5 {
            Ok(FieldCompatibility::new(
                EXPERIENCE,
                1.0,
                format!("Experience exceeds requirement ({}y >= {}y)", years, floor),
            ))
        } else {
            Ok(FieldCompatibility::new(
                EXPERIENCE,
                0.9,
                format!("Experience meets requirement ({}y >= {}y)", years, floor),
            ))
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SalaryCalculator;

impl FieldCalculator for SalaryCalculator {
    fn field(&self) -> &str {
        SALARY
    }

    fn calculate(
        &self,
        candidate: &CandidateAttributes,
        requirement: &RequirementAttributes,
    ) -> Result<FieldCompatibility, FieldError> {
        let mut inputs = MissingInputs::new(2);
        inputs.require(candidate.salary_expectation.is_some(), "salary_expectation");
        inputs.require(requirement.salary_range.is_some(), "salary_range");
        let (expected, offer) = match (candidate.salary_expectation, requirement.salary_range) {
            (Some(expected), Some(offer)) => (expected, offer),
            _ => return Err(inputs.into_error()),
        };

        if expected.min > expected.max || offer.min > offer.max {
            return Err(FieldError::Invalid("salary range has min above max".to_string()));
        }

        if expected.min > offer.max {
            if offer.max == 0.0 {
                return Err(FieldError::Invalid("offer ceiling is zero".to_string()));
            }
            let gap_ratio = (expected.min - offer.max) / offer.max;
            let score = (1.0 - gap_ratio).max(0.2);
            return Ok(FieldCompatibility::new(
                SALARY,
                score,
                format!("Candidate expects higher salary ({:.1}% gap)", gap_ratio * 100.0),
            ));
        }

        if expected.max <= offer.min {
            return Ok(FieldCompatibility::new(
                SALARY,
                0.9,
                "Candidate salary expectation is within budget",
            ));
        }

        let overlap_min = expected.min.max(offer.min);
        let overlap_max = expected.max.min(offer.max);
        let overlap_ratio = (overlap_max - overlap_min) / (expected.max - expected.min + 1.0);
        let score = 0.7 + overlap_ratio * 0.3;

        Ok(FieldCompatibility::new(
            SALARY,
            score,
            format!("Salary ranges overlap ({:.1}% match)", overlap_ratio * 100.0),
        ))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EmploymentCalculator;

impl FieldCalculator for EmploymentCalculator {
    fn field(&self) -> &str {
        EMPLOYMENT
    }

    fn calculate(
        &self,
        candidate: &CandidateAttributes,
        requirement: &RequirementAttributes,
    ) -> Result<FieldCompatibility, FieldError> {
        let mut inputs = MissingInputs::new(2);
        inputs.require(
            !candidate.preferred_employment_types.is_empty(),
            "preferred_employment_types",
        );
        inputs.require(!requirement.employment_types.is_empty(), "employment_types");
        inputs.check()?;

        let shared = candidate
            .preferred_employment_types
            .iter()
            .any(|t| requirement.employment_types.contains(t));
        if shared {
            return Ok(FieldCompatibility::new(
                EMPLOYMENT,
                1.0,
                "Employment type preferences match",
            ));
        }

        if share_group(
            SIMILAR_EMPLOYMENT,
            &candidate.preferred_employment_types,
            &requirement.employment_types,
        ) {
            return Ok(FieldCompatibility::new(
                EMPLOYMENT,
                0.7,
                "Similar employment types available",
            ));
        }

        Ok(FieldCompatibility::new(EMPLOYMENT, 0.3, "Employment type mismatch"))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LanguageCalculator;

impl LanguageCalculator {
    fn level_score(candidate: Option<u8>, required: Option<u8>) -> f64 {
        let required = required.unwrap_or(DEFAULT_LANGUAGE_LEVEL);
        if required == 0 {
            return 1.0;
        }
        let candidate = candidate.unwrap_or(DEFAULT_LANGUAGE_LEVEL);
        (candidate as f64 / required as f64).min(1.0)
    }
}

impl FieldCalculator for LanguageCalculator {
    fn field(&self) -> &str {
        LANGUAGE
    }

    fn calculate(
        &self,
        candidate: &CandidateAttributes,
        requirement: &RequirementAttributes,
    ) -> Result<FieldCompatibility, FieldError> {
        let mut inputs = MissingInputs::new(2);
        inputs.require(candidate.language_levels.is_some(), "language_levels");
        inputs.require(requirement.language_requirements.is_some(), "language_requirements");
        inputs.check()?;

        let levels = candidate.language_levels.unwrap_or_default();
        let required = requirement.language_requirements.unwrap_or_default();

        let korean = Self::level_score(levels.korean, required.korean);
        let english = Self::level_score(levels.english, required.english);
        let score = (korean + english) / 2.0;

        let reason = if score >= 0.9 {
            "Language requirements fully met"
        } else if score >= 0.7 {
            "Language requirements mostly met"
        } else if score >= 0.5 {
            "Language requirements partially met"
        } else {
            "Language requirements not met"
        };

        Ok(FieldCompatibility::new(LANGUAGE, score, reason))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteWorkCalculator;

impl FieldCalculator for RemoteWorkCalculator {
    fn field(&self) -> &str {
        REMOTE_WORK
    }

    fn calculate(
        &self,
        candidate: &CandidateAttributes,
        requirement: &RequirementAttributes,
    ) -> Result<FieldCompatibility, FieldError> {
        let mut inputs = MissingInputs::new(2);
        inputs.require(candidate.remote_work_ok.is_some(), "remote_work_ok");
        inputs.require(requirement.remote_work_allowed.is_some(), "remote_work_allowed");
        inputs.check()?;

        let wants_remote = candidate.remote_work_ok.unwrap_or(false);
        let allows_remote = requirement.remote_work_allowed.unwrap_or(false);

        let (score, reason) = match (wants_remote, allows_remote) {
            (true, true) => (1.0, "Remote work preferred and available"),
            (false, false) => (1.0, "Both prefer office work"),
            (true, false) => (0.6, "Candidate prefers remote but office required"),
            (false, true) => (0.8, "Remote work available as option"),
        };

        Ok(FieldCompatibility::new(REMOTE_WORK, score, reason))
    }
}

/// The built-in calculators in evaluation order
pub fn default_calculators() -> Vec<Box<dyn FieldCalculator>> {
    vec![
        Box::new(LocationCalculator),
        Box::new(ExperienceCalculator),
        Box::new(SalaryCalculator),
        Box::new(EmploymentCalculator),
        Box::new(LanguageCalculator),
        Box::new(RemoteWorkCalculator),
    ]
}
