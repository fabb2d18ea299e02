use crate::config::GenerationSettings;
use crate::generation::cancel::CancellationToken;
use crate::generation::validation::{
    decide, run_heuristics, Artifact, HeuristicRule, SemanticVerdict, ValidationOutcome,
};
use crate::services::llm::{GenerationRequest, LlmError, TextGenerator};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default bound on generate/validate cycles per task
pub const MAX_ATTEMPTS: u32 = 5;

/// Default timeout for one collaborator call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(90);

/// Reasons a single attempt failed before it could be validated
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] LlmError),

    #[error("Collaborator call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to decode reply: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One finished attempt, fed back into the next prompt
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord<A> {
    pub attempt: u32,
    pub artifact: Option<A>,
    pub errors: Vec<String>,
    pub feedback: String,
}

/// A quality-gated generation step
///
/// The controller owns the loop; a task only describes prompts, rules and
/// the fallback.
pub trait GenerationTask: Send + Sync {
    type Output: Artifact;

    fn name(&self) -> &str;

    /// Prompt for the next attempt, given every earlier attempt
    fn generation_request(&self, history: &[AttemptRecord<Self::Output>]) -> GenerationRequest;

    fn heuristic_rules(&self) -> Vec<HeuristicRule>;

    /// Checks that do not fit a generic rule
    fn extra_checks(&self, _artifact: &Self::Output) -> Vec<String> {
        Vec::new()
    }

    /// Items asked earlier outside this task, e.g. in the same interview
    fn previous_items(&self) -> Vec<String> {
        Vec::new()
    }

    /// Request whose reply decodes into a `SemanticVerdict`
    fn semantic_request(&self, artifact: &Self::Output) -> GenerationRequest;

    /// Returned when no attempt produced an artifact
    fn fallback_artifact(&self) -> Self::Output;

    /// Tighter attempt bound for this task; never exceeds the controller's
    fn max_attempts(&self) -> Option<u32> {
        None
    }
}

/// States of the generate/validate loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Generating,
    HeuristicValidating,
    SemanticValidating,
    Deciding,
    Done,
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Accepted,
    Exhausted,
    Cancelled,
}

/// Mutable state of one generation run
#[derive(Debug, Clone)]
pub struct GenerationState<A> {
    pub attempts: u32,
    pub current_artifact: Option<A>,
    pub validation_errors: Vec<String>,
    pub feedback: String,
    pub is_valid: bool,
    pub final_artifact: Option<A>,
    pub history: Vec<AttemptRecord<A>>,
}

impl<A> Default for GenerationState<A> {
    fn default() -> Self {
        Self {
            attempts: 0,
            current_artifact: None,
            validation_errors: Vec::new(),
            feedback: String::new(),
            is_valid: false,
            final_artifact: None,
            history: Vec::new(),
        }
    }
}

/// Result of a generation run; always carries an artifact
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome<A> {
    pub final_artifact: A,
    pub attempts: u32,
    pub is_valid: bool,
    pub termination: Termination,
    pub validation_errors: Vec<String>,
    pub feedback: String,
}

/// Generic generate -> validate -> decide loop with bounded retries
#[derive(Clone)]
pub struct GenerationController {
    generator: Arc<dyn TextGenerator>,
    max_attempts: u32,
    call_timeout: Duration,
}

impl GenerationController {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            max_attempts: MAX_ATTEMPTS,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn from_settings(generator: Arc<dyn TextGenerator>, settings: &GenerationSettings) -> Self {
        Self::new(generator)
            .with_max_attempts(settings.max_attempts)
            .with_call_timeout(Duration::from_secs(settings.call_timeout_secs))
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn generator(&self) -> &Arc<dyn TextGenerator> {
        &self.generator
    }

    /// Call the collaborator once, under the call timeout, and decode the reply
    pub async fn call<R: DeserializeOwned>(
        &self,
        request: &GenerationRequest,
    ) -> Result<R, GenerationError> {
        let value = tokio::time::timeout(self.call_timeout, self.generator.generate(request))
            .await
            .map_err(|_| GenerationError::Timeout(self.call_timeout))??;

        Ok(serde_json::from_value(value)?)
    }

    /// Drive a task until its artifact is accepted, attempts run out, or the
    /// token is cancelled
    ///
    /// # Arguments
    /// * `task` - The generation task describing prompts and rules
    /// * `cancel` - Optional token checked before every generation
    ///
    /// # Returns
    /// GenerationOutcome with the accepted, last generated, or fallback artifact
    pub async fn run<T: GenerationTask>(
        &self,
        task: &T,
        cancel: Option<&CancellationToken>,
    ) -> GenerationOutcome<T::Output> {
        let mut state: GenerationState<T::Output> = GenerationState::default();
        let mut outcomes: Vec<ValidationOutcome> = Vec::new();
        let mut last_artifact: Option<T::Output> = None;
        let mut termination = Termination::Exhausted;
        let mut phase = Phase::Generating;
        let max_attempts = task
            .max_attempts()
            .map_or(self.max_attempts, |limit| limit.min(self.max_attempts))
            .max(1);

        info!(
            "Starting generation task {} (max {} attempts)",
            task.name(),
            max_attempts
        );

        while phase != Phase::Done {
            debug!("Task {} entering {:?} (attempt {})", task.name(), phase, state.attempts);

            phase = match phase {
                Phase::Generating => {
                    if cancel.is_some_and(CancellationToken::is_cancelled) {
                        info!("Generation task {} cancelled", task.name());
                        termination = Termination::Cancelled;
                        Phase::Done
                    } else {
                        state.attempts += 1;
                        outcomes.clear();

                        let request = task.generation_request(&state.history);
                        match self.call::<T::Output>(&request).await {
                            Ok(artifact) => {
                                state.current_artifact = Some(artifact);
                                Phase::HeuristicValidating
                            }
                            Err(e) => {
                                warn!(
                                    "Task {} attempt {} failed to generate: {}",
                                    task.name(),
                                    state.attempts,
                                    e
                                );
                                state.current_artifact = None;
                                outcomes.push(ValidationOutcome::Heuristic(vec![format!(
                                    "Generation failed: {}",
                                    e
                                )]));
                                Phase::Deciding
                            }
                        }
                    }
                }

                Phase::HeuristicValidating => match &state.current_artifact {
                    Some(artifact) => {
                        let mut previous = task.previous_items();
                        previous.extend(
                            state
                                .history
                                .iter()
                                .filter_map(|record| record.artifact.as_ref())
                                .flat_map(|a| a.items().into_iter().map(str::to_string)),
                        );

                        let mut violations =
                            run_heuristics(&task.heuristic_rules(), &artifact.items(), &previous);
                        violations.extend(task.extra_checks(artifact));

                        if !violations.is_empty() {
                            debug!("Task {} heuristic violations: {:?}", task.name(), violations);
                        }
                        outcomes.push(ValidationOutcome::Heuristic(violations));
                        Phase::SemanticValidating
                    }
                    None => Phase::Deciding,
                },

                Phase::SemanticValidating => {
                    if let Some(artifact) = &state.current_artifact {
                        let request = task.semantic_request(artifact);
                        let outcome = match self.call::<SemanticVerdict>(&request).await {
                            Ok(verdict) => verdict.into(),
                            Err(e) => {
                                warn!("Task {} semantic validation failed: {}", task.name(), e);
                                ValidationOutcome::Semantic {
                                    is_valid: false,
                                    issues: vec![format!("Semantic validation failed: {}", e)],
                                    reasoning: String::new(),
                                }
                            }
                        };
                        outcomes.push(outcome);
                    }
                    Phase::Deciding
                }

                Phase::Deciding => {
                    let decision = decide(&outcomes);
                    state.is_valid = decision.is_valid;
                    state.validation_errors = decision.errors;
                    state.feedback = decision.feedback;

                    if let Some(artifact) = &state.current_artifact {
                        last_artifact = Some(artifact.clone());
                    }
                    state.history.push(AttemptRecord {
                        attempt: state.attempts,
                        artifact: state.current_artifact.clone(),
                        errors: state.validation_errors.clone(),
                        feedback: state.feedback.clone(),
                    });

                    if state.is_valid {
                        state.final_artifact = state.current_artifact.take();
                        termination = Termination::Accepted;
                        Phase::Done
                    } else if state.attempts >= max_attempts {
                        warn!(
                            "Task {} exhausted {} attempts, using last artifact",
                            task.name(),
                            max_attempts
                        );
                        Phase::Done
                    } else {
                        debug!(
                            "Task {} invalid, regenerating ({}/{})",
                            task.name(),
                            state.attempts,
                            max_attempts
                        );
                        Phase::Generating
                    }
                }

                Phase::Done => Phase::Done,
            };
        }

        let is_valid = termination == Termination::Accepted && state.is_valid;
        let final_artifact = state
            .final_artifact
            .or(last_artifact)
            .unwrap_or_else(|| {
                warn!("Task {} produced no artifact, using fallback", task.name());
                task.fallback_artifact()
            });

        info!(
            "Generation task {} finished: {:?} after {} attempts (valid: {})",
            task.name(),
            termination,
            state.attempts,
            is_valid
        );

        GenerationOutcome {
            final_artifact,
            attempts: state.attempts,
            is_valid,
            termination,
            validation_errors: state.validation_errors,
            feedback: state.feedback,
        }
    }
}
