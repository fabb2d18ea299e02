use crate::generation::aggregate::{AggregationError, Aggregator, CategorySummary};
use crate::generation::cancel::CancellationToken;
use crate::generation::controller::GenerationController;
use crate::generation::explanation::{
    ExplanationCategory, ExplanationField, FieldExplanation, FieldExplanationTask, FieldInput,
};
use crate::models::ExplainRequest;
use crate::services::cache::{request_hash, ExplanationCache};
use futures::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ExplainError {
    #[error("Aggregation failed: {0}")]
    Aggregation(#[from] AggregationError),

    #[error("Explanation cancelled")]
    Cancelled,
}

/// Bookkeeping attached to a match explanation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationMetadata {
    pub total_fields: usize,
    pub total_categories: usize,
    /// Fields whose explanation never passed validation
    pub degraded_fields: Vec<ExplanationField>,
    pub cached: bool,
}

/// Full explanation of one talent/job match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchExplanation {
    #[serde(rename = "직무 적합성")]
    pub job_fit: CategorySummary,
    #[serde(rename = "성장 가능성")]
    pub growth_potential: CategorySummary,
    #[serde(rename = "문화 적합성")]
    pub culture_fit: CategorySummary,
    pub field_results: Vec<FieldExplanation>,
    pub metadata: ExplanationMetadata,
}

/// Two-stage explanation pipeline: per-field generation, then per-category
/// aggregation
pub struct MatchExplainer {
    controller: GenerationController,
    aggregator: Aggregator,
    cache: Option<Arc<ExplanationCache>>,
}

impl MatchExplainer {
    pub fn new(controller: GenerationController, aggregator: Aggregator) -> Self {
        Self {
            controller,
            aggregator,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<ExplanationCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    async fn cached(&self, request: &ExplainRequest, hash: &str) -> Option<MatchExplanation> {
        let cache = self.cache.as_ref()?;
        match cache.get(&request.talent_id, &request.job_id, hash).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Explanation cache lookup failed: {}", e);
                None
            }
        }
    }

    /// Explain why a talent matches a job
    ///
    /// # Arguments
    /// * `request` - Field summaries and similarities of both sides
    /// * `cancel` - Optional token shared by every field generation
    ///
    /// # Returns
    /// MatchExplanation with three category summaries and six field results
    pub async fn explain(
        &self,
        request: &ExplainRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<MatchExplanation, ExplainError> {
        let hash = match request_hash(request) {
            Ok(hash) => Some(hash),
            Err(e) => {
                warn!("Could not hash explanation request: {}", e);
                None
            }
        };

        if let Some(hash) = &hash {
            if let Some(mut hit) = self.cached(request, hash).await {
                info!("Serving cached explanation for {}/{}", request.talent_id, request.job_id);
                hit.metadata.cached = true;
                return Ok(hit);
            }
        }

        // Stage 1: every field independently
        let tasks: Vec<FieldExplanationTask> = ExplanationField::ALL
            .iter()
            .map(|field| FieldExplanationTask::new(field_input(request, *field)))
            .collect();
        let outcomes = join_all(tasks.iter().map(|task| self.controller.run(task, cancel))).await;

        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(ExplainError::Cancelled);
        }

        let mut degraded_fields = Vec::new();
        let mut field_results = Vec::with_capacity(outcomes.len());
        for (task, outcome) in tasks.iter().zip(outcomes) {
            if !outcome.is_valid {
                warn!(
                    "Field {} explanation not validated after {} attempts",
                    task.input().field,
                    outcome.attempts
                );
                degraded_fields.push(task.input().field);
            }
            field_results.push(outcome.final_artifact);
        }

        // Stage 2: categories in parallel
        let summaries = try_join_all(ExplanationCategory::ALL.iter().map(|category| {
            let members: Vec<FieldExplanation> = field_results
                .iter()
                .filter(|r| r.field.category() == *category)
                .cloned()
                .collect();
            async move { self.aggregator.aggregate(*category, &members).await }
        }))
        .await?;

        let mut summaries = summaries.into_iter();
        let (Some(job_fit), Some(growth_potential), Some(culture_fit)) =
            (summaries.next(), summaries.next(), summaries.next())
        else {
            return Err(AggregationError::EmptyInput(ExplanationCategory::JobFit).into());
        };

        let explanation = MatchExplanation {
            job_fit,
            growth_potential,
            culture_fit,
            metadata: ExplanationMetadata {
                total_fields: field_results.len(),
                total_categories: ExplanationCategory::ALL.len(),
                degraded_fields,
                cached: false,
            },
            field_results,
        };

        info!(
            "Explained {}/{} ({} degraded fields)",
            request.talent_id,
            request.job_id,
            explanation.metadata.degraded_fields.len()
        );

        // Degraded explanations are regenerated next time
        let degraded = !explanation.metadata.degraded_fields.is_empty();
        if let (Some(cache), Some(hash), false) = (&self.cache, &hash, degraded) {
            if let Err(e) = cache
                .put(&request.talent_id, &request.job_id, hash, &explanation)
                .await
            {
                warn!("Failed to cache explanation: {}", e);
            }
        }

        Ok(explanation)
    }
}

fn field_input(request: &ExplainRequest, field: ExplanationField) -> FieldInput {
    FieldInput {
        field,
        talent_summary: request.talent_summaries.get(&field).cloned().unwrap_or_default(),
        job_summary: request.job_summaries.get(&field).cloned().unwrap_or_default(),
        similarity: request
            .similarity_scores
            .get(&field)
            .copied()
            .filter(|s| s.is_finite())
            .map_or(0.0, |s| s.clamp(0.0, 1.0)),
    }
}
