use crate::core::calculators::{
    default_calculators, FieldCalculator, FieldError, EMPLOYMENT, EXPERIENCE, LANGUAGE, LOCATION,
    REMOTE_WORK, SALARY,
};
use crate::models::{
    CandidateAttributes, CompatibilityResult, FieldCompatibility, RequirementAttributes,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Score used when a field cannot be evaluated
pub const NEUTRAL_SCORE: f64 = 0.5;

/// How much a field counts and how absent inputs are treated
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    pub importance: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub required: bool,
}

fn default_enabled() -> bool {
    true
}

impl FieldRule {
    pub fn new(importance: f64, required: bool) -> Self {
        Self {
            importance,
            enabled: true,
            required,
        }
    }
}

/// Default importance of each built-in field
pub fn default_rules() -> BTreeMap<String, FieldRule> {
    [
        (LOCATION, FieldRule::new(0.8, true)),
        (EXPERIENCE, FieldRule::new(0.9, true)),
        (SALARY, FieldRule::new(0.7, false)),
        (EMPLOYMENT, FieldRule::new(0.6, true)),
        (LANGUAGE, FieldRule::new(0.5, false)),
        (REMOTE_WORK, FieldRule::new(0.3, false)),
    ]
    .into_iter()
    .map(|(name, rule)| (name.to_string(), rule))
    .collect()
}

/// Turn one calculator result into the value that enters the aggregate
///
/// Returns `None` when the field should be left out entirely.
fn reduce_field(
    field: &str,
    rule: &FieldRule,
    result: Result<FieldCompatibility, FieldError>,
) -> Option<FieldCompatibility> {
    match result {
        Ok(compat) => Some(compat),
        Err(FieldError::Missing { .. }) if !rule.required => {
            debug!("Skipping optional field {}: inputs missing", field);
            None
        }
        Err(FieldError::Missing { missing, expected }) => {
            let expected = expected.max(1);
            let score = 1.0 - missing.len().min(expected) as f64 / expected as f64;
            warn!(
                "Required field {} is missing {} of {} inputs",
                field,
                missing.len(),
                expected
            );
            Some(FieldCompatibility::new(
                field,
                score,
                format!("Required inputs missing: {}", missing.join(", ")),
            ))
        }
        Err(err) => {
            warn!("Failed to calculate {} compatibility: {}", field, err);
            Some(FieldCompatibility::new(
                field,
                NEUTRAL_SCORE,
                format!("Calculation error: {}", err),
            ))
        }
    }
}

/// Summary line for an overall score
pub fn summarize(overall_score: f64) -> &'static str {
    if overall_score >= 0.9 {
        "Excellent match - highly compatible"
    } else if overall_score >= 0.7 {
        "Good match - mostly compatible with minor gaps"
    } else if overall_score >= 0.5 {
        "Fair match - some compatibility issues"
    } else if overall_score >= 0.3 {
        "Poor match - significant compatibility issues"
    } else {
        "Incompatible - major mismatches"
    }
}

/// Weighted multi-field compatibility ("soft filter")
///
/// Calculators run in registration order. The evaluator never fails: every
/// calculator error is reduced to a neutral or penalized field score.
pub struct CompatibilityEvaluator {
    calculators: Vec<Box<dyn FieldCalculator>>,
    rules: BTreeMap<String, FieldRule>,
}

impl CompatibilityEvaluator {
    pub fn new(rules: BTreeMap<String, FieldRule>) -> Self {
        Self {
            calculators: default_calculators(),
            rules,
        }
    }

    /// Register a calculator, replacing any existing one with the same name
    ///
    /// A field without a rule gets importance 1.0 and is optional.
    pub fn with_calculator(mut self, calculator: Box<dyn FieldCalculator>) -> Self {
        let field = calculator.field().to_string();
        self.rules
            .entry(field.clone())
            .or_insert_with(|| FieldRule::new(1.0, false));

        match self.calculators.iter().position(|c| c.field() == field) {
            Some(idx) => self.calculators[idx] = calculator,
            None => self.calculators.push(calculator),
        }
        self
    }

    /// Update the rule of a registered field; unknown fields are ignored
    pub fn with_rule(mut self, field: &str, rule: FieldRule) -> Self {
        if let Some(existing) = self.rules.get_mut(field) {
            *existing = rule;
        }
        self
    }

    pub fn rules(&self) -> &BTreeMap<String, FieldRule> {
        &self.rules
    }

    /// Effective rules after applying per-call importance overrides
    fn merged_rules(&self, weights: Option<&HashMap<String, f64>>) -> BTreeMap<String, FieldRule> {
        let mut rules = self.rules.clone();

        if let Some(weights) = weights {
            for (field, importance) in weights {
                if !importance.is_finite() || *importance < 0.0 {
                    warn!("Ignoring invalid weight {} for field {}", importance, field);
                    continue;
                }
                match rules.get_mut(field) {
                    Some(rule) => rule.importance = *importance,
                    None => debug!("No calculator for weighted field {}, ignoring", field),
                }
            }
        }

        rules
    }

    /// Evaluate a candidate against a set of requirements
    ///
    /// # Arguments
    /// * `candidate` - Attributes of the job seeker
    /// * `requirement` - Requirements of the posting
    /// * `weights` - Optional importance overrides by field name
    ///
    /// # Returns
    /// CompatibilityResult with an overall score in [0, 1]
    pub fn evaluate(
        &self,
        candidate: &CandidateAttributes,
        requirement: &RequirementAttributes,
        weights: Option<&HashMap<String, f64>>,
    ) -> CompatibilityResult {
        let rules = self.merged_rules(weights);

        let mut field_scores = Vec::with_capacity(self.calculators.len());
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;

        for calculator in &self.calculators {
            let field = calculator.field();
            let Some(rule) = rules.get(field) else {
                continue;
            };
            if !rule.enabled {
                continue;
            }

            let result = calculator.calculate(candidate, requirement);
            if let Some(compat) = reduce_field(field, rule, result) {
                weighted_sum += compat.score * rule.importance;
                total_weight += rule.importance;
                field_scores.push(compat);
            }
        }

        let overall_score = if total_weight > 0.0 {
            (weighted_sum / total_weight).clamp(0.0, 1.0)
        } else {
            NEUTRAL_SCORE
        };

        let applied_weights = rules
            .iter()
            .filter(|(_, rule)| rule.enabled)
            .map(|(field, rule)| (field.clone(), rule.importance))
            .collect();

        debug!(
            "Compatibility evaluated - fields: {}, overall: {:.4}",
            field_scores.len(),
            overall_score
        );

        CompatibilityResult {
            overall_score,
            field_scores,
            applied_weights,
            summary: summarize(overall_score).to_string(),
        }
    }
}

impl Default for CompatibilityEvaluator {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl std::fmt::Debug for CompatibilityEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompatibilityEvaluator")
            .field(
                "calculators",
                &self.calculators.iter().map(|c| c.field()).collect::<Vec<_>>(),
            )
            .field("rules", &self.rules)
            .finish()
    }
}
