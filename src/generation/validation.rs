use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Debug;

/// A generated value whose text items can be checked by heuristic rules
pub trait Artifact: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The texts each heuristic rule is applied to, in order
    fn items(&self) -> Vec<&str>;
}

/// Writing system a text is expected to be dominated by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Hangul,
    Latin,
}

fn is_hangul(c: char) -> bool {
    ('가'..='힣').contains(&c)
}

fn is_latin(c: char) -> bool {
    c.is_ascii_alphabetic()
}

/// Count Hangul syllables and Latin letters in a text
pub fn script_counts(text: &str) -> (usize, usize) {
    text.chars().fold((0, 0), |(hangul, latin), c| {
        (hangul + is_hangul(c) as usize, latin + is_latin(c) as usize)
    })
}

/// Deterministic local check on a generated artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeuristicRule {
    ExactCount(usize),
    CountRange { min: usize, max: usize },
    /// Character count bounds for every item, after trimming
    LengthBounds { min: usize, max: usize },
    DominantScript(Script),
    UniqueItems,
    /// No item may repeat an earlier attempt or an already asked item
    DistinctFromPrevious,
}

impl HeuristicRule {
    /// Violations of this rule, as readable messages
    pub fn check(&self, items: &[&str], previous: &[String]) -> Vec<String> {
        match self {
            Self::ExactCount(expected) => {
                if items.len() == *expected {
                    vec![]
                } else {
                    vec![format!("Expected exactly {} items, got {}", expected, items.len())]
                }
            }
            Self::CountRange { min, max } => {
                if (*min..=*max).contains(&items.len()) {
                    vec![]
                } else {
                    vec![format!(
                        "Expected between {} and {} items, got {}",
                        min,
                        max,
                        items.len()
                    )]
                }
            }
            Self::LengthBounds { min, max } => items
                .iter()
                .enumerate()
                .filter_map(|(idx, item)| {
                    let len = item.trim().chars().count();
                    if len < *min {
                        Some(format!("Item {} is too short (minimum {} characters)", idx + 1, min))
                    } else if len > *max {
                        Some(format!("Item {} is too long (maximum {} characters)", idx + 1, max))
                    } else {
                        None
                    }
                })
                .collect(),
            Self::DominantScript(script) => items
                .iter()
                .enumerate()
                .filter_map(|(idx, item)| {
                    let (hangul, latin) = script_counts(item);
                    let dominant = match script {
                        Script::Hangul => hangul > latin,
                        Script::Latin => latin > hangul,
                    };
                    (!dominant).then(|| {
                        format!("Item {} must be primarily written in {:?}", idx + 1, script)
                    })
                })
                .collect(),
            Self::UniqueItems => {
                let mut seen = HashSet::new();
                items
                    .iter()
                    .enumerate()
                    .filter(|(_, item)| !seen.insert(normalize(item)))
                    .map(|(idx, _)| format!("Item {} duplicates an earlier item", idx + 1))
                    .collect()
            }
            Self::DistinctFromPrevious => {
                let previous: HashSet<String> = previous.iter().map(|p| normalize(p)).collect();
                items
                    .iter()
                    .enumerate()
                    .filter(|(_, item)| previous.contains(&normalize(item)))
                    .map(|(idx, _)| format!("Item {} repeats a previous question", idx + 1))
                    .collect()
            }
        }
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Run every rule and collect all violations
pub fn run_heuristics(rules: &[HeuristicRule], items: &[&str], previous: &[String]) -> Vec<String> {
    rules
        .iter()
        .flat_map(|rule| rule.check(items, previous))
        .collect()
}

/// Reply decoded from a semantic evaluation request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticVerdict {
    pub is_valid: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

/// Output of one validator for one attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Heuristic(Vec<String>),
    Semantic {
        is_valid: bool,
        issues: Vec<String>,
        reasoning: String,
    },
}

impl From<SemanticVerdict> for ValidationOutcome {
    fn from(verdict: SemanticVerdict) -> Self {
        Self::Semantic {
            is_valid: verdict.is_valid,
            issues: verdict.issues,
            reasoning: verdict.reasoning,
        }
    }
}

/// Combined decision over all validator outcomes of one attempt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decision {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub feedback: String,
}

/// Reduce validator outcomes to one decision
///
/// Valid only when a semantic outcome is present, every semantic outcome is
/// valid without issues, and no heuristic violation was found.
pub fn decide(outcomes: &[ValidationOutcome]) -> Decision {
    let mut decision = Decision {
        is_valid: outcomes
            .iter()
            .any(|o| matches!(o, ValidationOutcome::Semantic { .. })),
        ..Default::default()
    };

    for outcome in outcomes {
        match outcome {
            ValidationOutcome::Heuristic(violations) => {
                decision.is_valid &= violations.is_empty();
                decision.errors.extend(violations.iter().cloned());
            }
            ValidationOutcome::Semantic {
                is_valid,
                issues,
                reasoning,
            } => {
                decision.is_valid &= *is_valid && issues.is_empty();
                decision.errors.extend(issues.iter().cloned());
                if !reasoning.is_empty() {
                    if !decision.feedback.is_empty() {
                        decision.feedback.push('\n');
                    }
                    decision.feedback.push_str(reasoning);
                }
            }
        }
    }

    decision
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_count() {
        let rule = HeuristicRule::ExactCount(3);
        assert!(rule.check(&["a", "b", "c"], &[]).is_empty());
        assert_eq!(rule.check(&["a", "b"], &[]), vec!["Expected exactly 3 items, got 2"]);
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let rule = HeuristicRule::LengthBounds { min: 5, max: 10 };
        // 5 Hangul syllables are 15 bytes
        assert!(rule.check(&["가나다라마"], &[]).is_empty());
        assert_eq!(rule.check(&["가나"], &[]).len(), 1);
    }

    #[test]
    fn test_length_counts_trimmed_text() {
        let rule = HeuristicRule::LengthBounds { min: 5, max: 6 };
        assert!(rule.check(&["  가나다라마  "], &[]).is_empty());
        assert_eq!(rule.check(&["가나    "], &[]).len(), 1);
        assert_eq!(rule.check(&["  가나다라마바사\n"], &[]).len(), 1);
    }

    #[test]
    fn test_dominant_script() {
        let rule = HeuristicRule::DominantScript(Script::Hangul);
        assert!(rule.check(&["Redis 캐싱 전략을 어떻게 설계하셨나요?"], &[]).is_empty());
        assert_eq!(rule.check(&["How did you design the cache?"], &[]).len(), 1);
    }

    #[test]
    fn test_unique_items_ignores_whitespace_differences() {
        let rule = HeuristicRule::UniqueItems;
        let violations = rule.check(&["같은 질문입니다", "같은  질문입니다 "], &[]);
        assert_eq!(violations, vec!["Item 2 duplicates an earlier item"]);
    }

    #[test]
    fn test_distinct_from_previous() {
        let rule = HeuristicRule::DistinctFromPrevious;
        let previous = vec!["이미 물어본 질문".to_string()];
        assert_eq!(rule.check(&["이미 물어본 질문", "새 질문"], &previous).len(), 1);
    }

    #[test]
    fn test_decide_requires_semantic_and_heuristic() {
        let semantic_ok = ValidationOutcome::Semantic {
            is_valid: true,
            issues: vec![],
            reasoning: "looks good".to_string(),
        };

        let decision = decide(&[ValidationOutcome::Heuristic(vec![]), semantic_ok.clone()]);
        assert!(decision.is_valid);
        assert_eq!(decision.feedback, "looks good");

        let heuristic = ValidationOutcome::Heuristic(vec!["too short".into()]);
        let decision = decide(&[heuristic, semantic_ok]);
        assert!(!decision.is_valid);
        assert_eq!(decision.errors, vec!["too short"]);

        let decision = decide(&[ValidationOutcome::Heuristic(vec![])]);
        assert!(!decision.is_valid);
    }

    #[test]
    fn test_semantic_issues_invalidate() {
        let decision = decide(&[
            ValidationOutcome::Heuristic(vec![]),
            ValidationOutcome::Semantic {
                is_valid: true,
                issues: vec!["vague".into()],
                reasoning: String::new(),
            },
        ]);
        assert!(!decision.is_valid);
    }
}
