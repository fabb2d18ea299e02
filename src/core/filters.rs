use crate::core::calculators::accepts_remote;
use crate::models::{CandidateAttributes, EmploymentType, RequirementAttributes};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Comparison applied by a filter rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    GreaterEqual,
    LessEqual,
    /// Passes when the field shares at least one value with the rule
    In,
    NotIn,
    Contains,
}

/// A value read from an attribute set or held by a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Flag(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl FilterValue {
    fn as_list(&self) -> Option<Vec<&str>> {
        match self {
            Self::Text(s) => Some(vec![s.as_str()]),
            Self::List(items) => Some(items.iter().map(String::as_str).collect()),
            _ => None,
        }
    }
}

/// A hard pass/fail condition on one named field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRule {
    pub field: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
    pub required: bool,
}

impl FilterRule {
    pub fn new(field: &str, operator: FilterOperator, value: FilterValue, required: bool) -> Self {
        Self {
            field: field.to_string(),
            operator,
            value,
            required,
        }
    }
}

/// Result of running a rule set against one subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOutcome {
    pub passed: bool,
    pub failed_rules: Vec<String>,
    pub reason: String,
}

/// Anything whose fields can be checked by name
pub trait Filterable {
    fn field_value(&self, field: &str) -> Option<FilterValue>;
}

fn employment_list(types: &[EmploymentType]) -> Option<FilterValue> {
    if types.is_empty() {
        None
    } else {
        Some(FilterValue::List(
            types.iter().map(|t| t.as_str().to_string()).collect(),
        ))
    }
}

/// Location value that stands for "works remotely"
const REMOTE_LOCATION: &str = "remote";

fn text_list(items: &[String]) -> Option<FilterValue> {
    if items.is_empty() {
        None
    } else {
        Some(FilterValue::List(items.to_vec()))
    }
}

impl Filterable for CandidateAttributes {
    fn field_value(&self, field: &str) -> Option<FilterValue> {
        match field {
            "preferred_locations" => text_list(&self.preferred_locations),
            // Preferred locations, plus the remote marker when remote work is accepted
            "accepted_locations" => {
                let mut locations = self.preferred_locations.clone();
                if accepts_remote(self) {
                    locations.push(REMOTE_LOCATION.to_string());
                }
                text_list(&locations)
            }
            "remote_work_ok" => self.remote_work_ok.map(FilterValue::Flag),
            "years_experience" => self.years_experience.map(FilterValue::Number),
            "salary_expectation_min" => self.salary_expectation.map(|s| FilterValue::Number(s.min)),
            "salary_expectation_max" => self.salary_expectation.map(|s| FilterValue::Number(s.max)),
            "preferred_employment_types" => employment_list(&self.preferred_employment_types),
            "korean_level" => self
                .language_levels
                .and_then(|l| l.korean)
                .map(|v| FilterValue::Number(v as f64)),
            "english_level" => self
                .language_levels
                .and_then(|l| l.english)
                .map(|v| FilterValue::Number(v as f64)),
            "visa_status" => self.visa_status.clone().map(FilterValue::Text),
            _ => None,
        }
    }
}

impl Filterable for RequirementAttributes {
    fn field_value(&self, field: &str) -> Option<FilterValue> {
        match field {
            "work_locations" => text_list(&self.work_locations),
            "offered_locations" => {
                let mut locations = self.work_locations.clone();
                if self.remote_work_allowed.unwrap_or(false) {
                    locations.push(REMOTE_LOCATION.to_string());
                }
                text_list(&locations)
            }
            "remote_work_allowed" => self.remote_work_allowed.map(FilterValue::Flag),
            "min_experience_years" => self.min_experience_years.map(FilterValue::Number),
            "max_experience_years" => self.max_experience_years.map(FilterValue::Number),
            "salary_range_min" => self.salary_range.map(|s| FilterValue::Number(s.min)),
            "salary_range_max" => self.salary_range.map(|s| FilterValue::Number(s.max)),
            "employment_types" => employment_list(&self.employment_types),
            "visa_requirements" => text_list(&self.visa_requirements),
            _ => None,
        }
    }
}

/// Rules a job seeker must satisfy for a posting
///
/// Only constraints the posting actually states produce a rule.
pub fn requirement_rules(requirement: &RequirementAttributes) -> Vec<FilterRule> {
    let mut rules = Vec::new();

    if !requirement.work_locations.is_empty() {
        let rule = if requirement.remote_work_allowed.unwrap_or(false) {
            let mut locations = requirement.work_locations.clone();
            locations.push(REMOTE_LOCATION.to_string());
            FilterRule::new(
                "accepted_locations",
                FilterOperator::In,
                FilterValue::List(locations),
                true,
            )
        } else {
            FilterRule::new(
                "preferred_locations",
                FilterOperator::In,
                FilterValue::List(requirement.work_locations.clone()),
                true,
            )
        };
        rules.push(rule);
    }

    if let Some(floor) = requirement.min_experience_years {
        rules.push(FilterRule::new(
            "years_experience",
            FilterOperator::GreaterEqual,
            FilterValue::Number(floor),
            true,
        ));
    }

    if let Some(range) = requirement.salary_range {
        rules.push(FilterRule::new(
            "salary_expectation_max",
            FilterOperator::GreaterEqual,
            FilterValue::Number(range.min),
            false,
        ));
    }

    if let Some(FilterValue::List(types)) = employment_list(&requirement.employment_types) {
        rules.push(FilterRule::new(
            "preferred_employment_types",
            FilterOperator::In,
            FilterValue::List(types),
            true,
        ));
    }

    if let Some(languages) = requirement.language_requirements {
        if let Some(level) = languages.korean {
            rules.push(FilterRule::new(
                "korean_level",
                FilterOperator::GreaterEqual,
                FilterValue::Number(level as f64),
                true,
            ));
        }
        if let Some(level) = languages.english {
            rules.push(FilterRule::new(
                "english_level",
                FilterOperator::GreaterEqual,
                FilterValue::Number(level as f64),
                false,
            ));
        }
    }

    if !requirement.visa_requirements.is_empty() {
        rules.push(FilterRule::new(
            "visa_status",
            FilterOperator::In,
            FilterValue::List(requirement.visa_requirements.clone()),
            true,
        ));
    }

    debug!("Built {} requirement rules", rules.len());
    rules
}

/// Rules a posting must satisfy for a job seeker's preferences
pub fn preference_rules(candidate: &CandidateAttributes) -> Vec<FilterRule> {
    let mut rules = Vec::new();

    if !candidate.preferred_locations.is_empty() {
        let rule = if accepts_remote(candidate) {
            let mut locations = candidate.preferred_locations.clone();
            locations.push(REMOTE_LOCATION.to_string());
            FilterRule::new(
                "offered_locations",
                FilterOperator::In,
                FilterValue::List(locations),
                true,
            )
        } else {
            FilterRule::new(
                "work_locations",
                FilterOperator::In,
                FilterValue::List(candidate.preferred_locations.clone()),
                true,
            )
        };
        rules.push(rule);
    }

    if let Some(expected) = candidate.salary_expectation {
        rules.push(FilterRule::new(
            "salary_range_max",
            FilterOperator::GreaterEqual,
            FilterValue::Number(expected.min),
            false,
        ));
    }

    if let Some(FilterValue::List(types)) = employment_list(&candidate.preferred_employment_types) {
        rules.push(FilterRule::new(
            "employment_types",
            FilterOperator::In,
            FilterValue::List(types),
            true,
        ));
    }

    debug!("Built {} preference rules", rules.len());
    rules
}

/// Check one rule; `None` means the operator does not apply to the values
fn compare(field_value: &FilterValue, rule: &FilterRule) -> Option<bool> {
    use FilterOperator::*;
    use FilterValue::*;

    match (rule.operator, field_value, &rule.value) {
        (Equals, left, right) => Some(left == right),
        (GreaterEqual, Number(left), Number(right)) => Some(left >= right),
        (LessEqual, Number(left), Number(right)) => Some(left <= right),
        (In, left, right) => {
            let left = left.as_list()?;
            let right = right.as_list()?;
            Some(left.iter().any(|item| right.contains(item)))
        }
        (NotIn, left, right) => {
            let left = left.as_list()?;
            let right = right.as_list()?;
            Some(!left.iter().any(|item| right.contains(item)))
        }
        (Contains, Text(haystack), Text(needle)) => Some(haystack.contains(needle.as_str())),
        (Contains, List(items), Text(needle)) => Some(items.contains(needle)),
        _ => None,
    }
}

/// Check a single rule against a subject
///
/// A missing field passes only when the rule is optional.
pub fn check_rule<T: Filterable + ?Sized>(subject: &T, rule: &FilterRule) -> bool {
    let Some(value) = subject.field_value(&rule.field) else {
        return !rule.required;
    };

    match compare(&value, rule) {
        Some(passed) => passed,
        None => {
            warn!(
                "Rule {} cannot compare {:?} with {:?}",
                rule.field, value, rule.value
            );
            !rule.required
        }
    }
}

/// Apply a rule set; the first failed required rule rejects the subject
pub fn apply_filters<T: Filterable + ?Sized>(subject: &T, rules: &[FilterRule]) -> FilterOutcome {
    let mut failed_rules = Vec::new();

    for rule in rules {
        if check_rule(subject, rule) {
            continue;
        }

        if rule.required {
            return FilterOutcome {
                passed: false,
                failed_rules: vec![rule.field.clone()],
                reason: format!("Required condition failed: {}", rule.field),
            };
        }

        failed_rules.push(rule.field.clone());
    }

    FilterOutcome {
        passed: true,
        failed_rules,
        reason: "All required conditions met".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LanguageLevels, SalaryRange};

    fn create_requirement() -> RequirementAttributes {
        RequirementAttributes {
            work_locations: vec!["서울".to_string(), "경기".to_string()],
            min_experience_years: Some(3.0),
            salary_range: Some(SalaryRange { min: 4000.0, max: 6000.0 }),
            employment_types: vec![EmploymentType::FullTime],
            language_requirements: Some(LanguageLevels { korean: Some(3), english: Some(4) }),
            ..Default::default()
        }
    }

    fn create_candidate() -> CandidateAttributes {
        CandidateAttributes {
            preferred_locations: vec!["서울".to_string()],
            years_experience: Some(5.0),
            salary_expectation: Some(SalaryRange { min: 3000.0, max: 3500.0 }),
            preferred_employment_types: vec![EmploymentType::FullTime],
            language_levels: Some(LanguageLevels { korean: Some(5), english: Some(2) }),
            ..Default::default()
        }
    }

    #[test]
    fn test_requirement_rules_built_from_stated_constraints() {
        let rules = requirement_rules(&create_requirement());
        let fields: Vec<&str> = rules.iter().map(|r| r.field.as_str()).collect();

        assert_eq!(
            fields,
            vec![
                "preferred_locations",
                "years_experience",
                "salary_expectation_max",
                "preferred_employment_types",
                "korean_level",
                "english_level",
            ]
        );
    }

    #[test]
    fn test_optional_failures_are_recorded() {
        let rules = requirement_rules(&create_requirement());
        let outcome = apply_filters(&create_candidate(), &rules);

        assert!(outcome.passed);
        assert_eq!(outcome.failed_rules, vec!["salary_expectation_max", "english_level"]);
    }

    #[test]
    fn test_required_failure_rejects() {
        let mut candidate = create_candidate();
        candidate.years_experience = Some(1.0);

        let outcome = apply_filters(&candidate, &requirement_rules(&create_requirement()));

        assert!(!outcome.passed);
        assert_eq!(outcome.failed_rules, vec!["years_experience"]);
    }

    #[test]
    fn test_missing_required_field_fails() {
        let mut candidate = create_candidate();
        candidate.preferred_locations.clear();

        let outcome = apply_filters(&candidate, &requirement_rules(&create_requirement()));
        assert!(!outcome.passed);
    }

    #[test]
    fn test_missing_optional_field_passes() {
        let rule = FilterRule::new(
            "english_level",
            FilterOperator::GreaterEqual,
            FilterValue::Number(3.0),
            false,
        );
        assert!(check_rule(&CandidateAttributes::default(), &rule));
    }

    #[test]
    fn test_preference_rules_filter_postings() {
        let candidate = CandidateAttributes {
            preferred_locations: vec!["부산".to_string()],
            ..Default::default()
        };

        let outcome = apply_filters(&create_requirement(), &preference_rules(&candidate));
        assert!(!outcome.passed);
        assert_eq!(outcome.reason, "Required condition failed: work_locations");
    }

    #[test]
    fn test_remote_posting_passes_remote_candidates() {
        let requirement = RequirementAttributes {
            remote_work_allowed: Some(true),
            ..create_requirement()
        };
        let by_token = CandidateAttributes {
            preferred_locations: vec!["Remote".to_string()],
            ..create_candidate()
        };
        let by_flag = CandidateAttributes {
            preferred_locations: vec!["부산".to_string()],
            remote_work_ok: Some(true),
            ..create_candidate()
        };
        let onsite_elsewhere = CandidateAttributes {
            preferred_locations: vec!["부산".to_string()],
            ..create_candidate()
        };

        let rules = requirement_rules(&requirement);
        assert_eq!(rules[0].field, "accepted_locations");
        assert!(apply_filters(&by_token, &rules).passed);
        assert!(apply_filters(&by_flag, &rules).passed);
        assert!(apply_filters(&create_candidate(), &rules).passed);

        let outcome = apply_filters(&onsite_elsewhere, &rules);
        assert!(!outcome.passed);
        assert_eq!(outcome.failed_rules, vec!["accepted_locations"]);
    }

    #[test]
    fn test_remote_candidate_keeps_remote_postings() {
        let candidate = CandidateAttributes {
            preferred_locations: vec!["원격".to_string()],
            ..Default::default()
        };
        let remote = RequirementAttributes {
            remote_work_allowed: Some(true),
            ..create_requirement()
        };

        let rules = preference_rules(&candidate);
        assert!(apply_filters(&remote, &rules).passed);
        assert!(!apply_filters(&create_requirement(), &rules).passed);
    }

    #[test]
    fn test_visa_in_rule() {
        let requirement = RequirementAttributes {
            visa_requirements: vec!["F-2".to_string(), "F-5".to_string()],
            ..Default::default()
        };
        let candidate = CandidateAttributes {
            visa_status: Some("F-5".to_string()),
            ..Default::default()
        };

        assert!(apply_filters(&candidate, &requirement_rules(&requirement)).passed);
    }
}
