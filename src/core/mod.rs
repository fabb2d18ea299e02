// Core algorithm exports
pub mod calculators;
pub mod compatibility;
pub mod filters;
pub mod matcher;
pub mod vector;

pub use calculators::{FieldCalculator, FieldError};
pub use compatibility::{CompatibilityEvaluator, FieldRule};
pub use filters::{
    apply_filters, FilterOperator, FilterOutcome, FilterRule, FilterValue, Filterable,
};
pub use matcher::{RankingEngine, RankingOutcome};
pub use vector::{ScoringError, VectorScorer};
