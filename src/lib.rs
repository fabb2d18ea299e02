//! Talent Match - matching engine for job seekers and job postings
//!
//! Ranks candidates by embedding similarity combined with structured
//! compatibility, and generates quality-gated explanations and interview
//! questions through an LLM behind a retrying validation loop.

pub mod cli;
pub mod config;
pub mod core;
pub mod generation;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use core::{CompatibilityEvaluator, RankingEngine, RankingOutcome, ScoringError, VectorScorer};
pub use generation::{GenerationController, GenerationOutcome, GenerationTask, MatchExplainer};
pub use models::{
    CandidateAttributes, MatchingResult, MatchingScore, RankingMode, RequirementAttributes,
};
