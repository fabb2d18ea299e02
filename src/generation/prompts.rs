use crate::generation::controller::AttemptRecord;
use serde::Serialize;
use serde_json::{json, Value};

/// Shared system prompt for every semantic evaluation
pub const EVALUATOR_SYSTEM: &str = "You are a strict reviewer. Evaluate the artifact against the \
listed criteria. Reply with is_valid, a list of concrete issues (empty when valid) and a short \
reasoning.";

/// JSON schema of a semantic verdict
pub fn verdict_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "is_valid": { "type": "boolean" },
            "issues": { "type": "array", "items": { "type": "string" } },
            "reasoning": { "type": "string" }
        },
        "required": ["is_valid", "issues", "reasoning"],
        "additionalProperties": false
    })
}

/// Render the previous attempt so the next prompt can correct it
///
/// Empty on the first attempt.
pub fn retry_context<A: Serialize>(history: &[AttemptRecord<A>]) -> String {
    let Some(last) = history.last() else {
        return String::new();
    };

    let mut context = format!("\n\nPrevious attempt #{} was rejected.\n", last.attempt);

    if !last.errors.is_empty() {
        context.push_str("Problems to fix:\n");
        for error in &last.errors {
            context.push_str(&format!("- {}\n", error));
        }
    }

    if !last.feedback.is_empty() {
        context.push_str(&format!("Reviewer feedback: {}\n", last.feedback));
    }

    if let Some(artifact) = &last.artifact {
        if let Ok(rendered) = serde_json::to_string(artifact) {
            context.push_str(&format!("Rejected output: {}\n", rendered));
        }
    }

    context.push_str("Produce a new output that fixes every problem above.");
    context
}

/// Bullet list of items, or a placeholder when there are none
pub fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items
            .iter()
            .map(|item| format!("- {}", item))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_context_empty_on_first_attempt() {
        let history: Vec<AttemptRecord<Vec<String>>> = vec![];
        assert!(retry_context(&history).is_empty());
    }

    #[test]
    fn test_retry_context_includes_errors_and_artifact() {
        let history = vec![AttemptRecord {
            attempt: 1,
            artifact: Some(vec!["짧음".to_string()]),
            errors: vec!["Item 1 is too short (minimum 15 characters)".to_string()],
            feedback: "Needs more detail".to_string(),
        }];

        let context = retry_context(&history);
        assert!(context.contains("attempt #1"));
        assert!(context.contains("too short"));
        assert!(context.contains("Needs more detail"));
        assert!(context.contains("짧음"));
    }
}
