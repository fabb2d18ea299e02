// Quality-gated text generation: controller, tasks and pipelines
pub mod aggregate;
pub mod cancel;
pub mod controller;
pub mod explain;
pub mod explanation;
pub mod persona;
pub mod prompts;
pub mod questions;
pub mod validation;

pub use aggregate::{AggregationError, Aggregator, CategorySummary};
pub use cancel::CancellationToken;
pub use controller::{
    AttemptRecord, GenerationController, GenerationError, GenerationOutcome, GenerationTask,
    Phase, Termination, MAX_ATTEMPTS,
};
pub use explain::{ExplainError, ExplanationMetadata, MatchExplainer, MatchExplanation};
pub use explanation::{
    ExplanationCategory, ExplanationField, FieldExplanation, FieldExplanationTask, FieldInput,
};
pub use persona::{AnalysisError, AnswerAnalysis, AnswerAnalyzer};
pub use questions::{
    generate_for_session, plan_situational, InterviewQuestion, NextQuestion, QuestionKind,
    QuestionSet, QuestionTask,
};
pub use validation::{Artifact, Decision, HeuristicRule, Script, SemanticVerdict, ValidationOutcome};
