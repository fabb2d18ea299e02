use crate::core::{
    compatibility::CompatibilityEvaluator,
    filters::{apply_filters, preference_rules, requirement_rules, FilterRule, Filterable},
    vector::{ScoringError, VectorScorer},
};
use crate::models::{
    CompatibilityResult, MatchMetadata, MatchingResult, PostingCandidate, RankCandidate,
    RankingMode, SeekerCandidate, SkippedCandidate,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Result of ranking one subject against a candidate pool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankingOutcome {
    pub results: Vec<MatchingResult>,
    pub total_candidates: usize,
    pub skipped: Vec<SkippedCandidate>,
    pub filtered_out: usize,
}

/// Ranking orchestrator combining vector similarity and compatibility
///
/// # Pipeline Stages
/// 1. Structural hard filters (structural mode only)
/// 2. Vector scoring, skipping malformed candidates
/// 3. Compatibility weighting (integrated mode only)
/// 4. Sorting, ranking and truncation
#[derive(Debug, Default)]
pub struct RankingEngine {
    scorer: VectorScorer,
    evaluator: CompatibilityEvaluator,
}

impl RankingEngine {
    pub fn new(scorer: VectorScorer, evaluator: CompatibilityEvaluator) -> Self {
        Self { scorer, evaluator }
    }

    pub fn scorer(&self) -> &VectorScorer {
        &self.scorer
    }

    pub fn evaluator(&self) -> &CompatibilityEvaluator {
        &self.evaluator
    }

    /// Rank job seekers for a posting
    ///
    /// # Arguments
    /// * `posting` - The posting being filled, with its vector and requirements
    /// * `seekers` - Candidate job seekers
    /// * `mode` - Integrated (multiplicative) or structural (hard filter)
    /// * `top_n` - Maximum number of results to keep
    /// * `weights` - Optional compatibility importance overrides
    ///
    /// # Returns
    /// RankingOutcome with results sorted best first and ranked from 1
    pub fn rank(
        &self,
        posting: &PostingCandidate,
        seekers: &[SeekerCandidate],
        mode: RankingMode,
        top_n: Option<usize>,
        weights: Option<&HashMap<String, f64>>,
    ) -> Result<RankingOutcome, ScoringError> {
        self.rank_with(
            posting,
            seekers,
            mode,
            top_n,
            || requirement_rules(&posting.attributes),
            |seeker| {
                self.evaluator
                    .evaluate(&seeker.attributes, &posting.attributes, weights)
            },
        )
    }

    /// Rank postings for a job seeker
    pub fn rank_postings(
        &self,
        seeker: &SeekerCandidate,
        postings: &[PostingCandidate],
        mode: RankingMode,
        top_n: Option<usize>,
        weights: Option<&HashMap<String, f64>>,
    ) -> Result<RankingOutcome, ScoringError> {
        self.rank_with(
            seeker,
            postings,
            mode,
            top_n,
            || preference_rules(&seeker.attributes),
            |posting| {
                self.evaluator
                    .evaluate(&seeker.attributes, &posting.attributes, weights)
            },
        )
    }

    fn rank_with<Q, C, R, E>(
        &self,
        subject: &RankCandidate<Q>,
        candidates: &[RankCandidate<C>],
        mode: RankingMode,
        top_n: Option<usize>,
        build_rules: R,
        evaluate: E,
    ) -> Result<RankingOutcome, ScoringError>
    where
        C: Filterable,
        R: FnOnce() -> Vec<FilterRule>,
        E: Fn(&RankCandidate<C>) -> CompatibilityResult,
    {
        let query = match subject.vector.as_deref() {
            Some(v) if !v.is_empty() => v,
            _ => return Err(ScoringError::EmptyVector),
        };
        if !query.iter().all(|x| x.is_finite()) {
            return Err(ScoringError::NonFinite);
        }

        let total_candidates = candidates.len();
        let rules = match mode {
            RankingMode::Structural => build_rules(),
            RankingMode::Integrated => Vec::new(),
        };

        let mut outcome = RankingOutcome {
            total_candidates,
            ..Default::default()
        };

        for candidate in candidates {
            // Stage 1: hard filters
            let failed_optional_rules = if mode == RankingMode::Structural {
                let filter = apply_filters(&candidate.attributes, &rules);
                if !filter.passed {
                    debug!("Candidate {} filtered out: {}", candidate.id, filter.reason);
                    outcome.filtered_out += 1;
                    continue;
                }
                filter.failed_rules
            } else {
                Vec::new()
            };

            // Stage 2: vector score
            let vector_score = match self.scorer.score_candidate(
                query,
                &candidate.id,
                candidate.vector.as_deref(),
            ) {
                Ok(score) => score,
                Err(skipped) => {
                    outcome.skipped.push(skipped);
                    continue;
                }
            };

            // Stage 3: compatibility
            let (score, compatibility) = match mode {
                RankingMode::Integrated => {
                    let compat = evaluate(candidate);
                    (vector_score.score * compat.overall_score, Some(compat))
                }
                RankingMode::Structural => (vector_score.score, None),
            };

            outcome.results.push(MatchingResult {
                subject_id: subject.id.clone(),
                candidate_id: candidate.id.clone(),
                score,
                rank: None,
                metadata: MatchMetadata {
                    vector: vector_score,
                    compatibility,
                    failed_optional_rules,
                },
            });
        }

        // Stage 4: sort by score (descending), then id (ascending)
        outcome.results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.candidate_id.cmp(&b.candidate_id))
        });

        for (i, result) in outcome.results.iter_mut().enumerate() {
            result.rank = Some(i + 1);
        }

        if let Some(limit) = top_n {
            outcome.results.truncate(limit);
        }

        info!(
            "Ranked {} of {} candidates for {} ({:?} mode, {} skipped, {} filtered out)",
            outcome.results.len(),
            total_candidates,
            subject.id,
            mode,
            outcome.skipped.len(),
            outcome.filtered_out
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidateAttributes, EmploymentType, RequirementAttributes, SkipReason};

    fn create_posting(vector: Vec<f64>) -> PostingCandidate {
        PostingCandidate {
            id: "job-1".to_string(),
            vector: Some(vector),
            attributes: RequirementAttributes {
                work_locations: vec!["서울".to_string()],
                min_experience_years: Some(3.0),
                employment_types: vec![EmploymentType::FullTime],
                ..Default::default()
            },
        }
    }

    fn create_seeker(id: &str, vector: Option<Vec<f64>>, years: f64) -> SeekerCandidate {
        SeekerCandidate {
            id: id.to_string(),
            vector,
            attributes: CandidateAttributes {
                preferred_locations: vec!["서울".to_string()],
                years_experience: Some(years),
                preferred_employment_types: vec![EmploymentType::FullTime],
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_rank_sorted_and_dense() {
        let engine = RankingEngine::default();
        let posting = create_posting(vec![1.0, 0.0]);
        let seekers = vec![
            create_seeker("far", Some(vec![0.0, 1.0]), 5.0),
            create_seeker("near", Some(vec![1.0, 0.1]), 5.0),
            create_seeker("same", Some(vec![1.0, 0.0]), 5.0),
        ];

        let outcome = engine
            .rank(&posting, &seekers, RankingMode::Integrated, None, None)
            .unwrap();

        let ids: Vec<&str> = outcome.results.iter().map(|r| r.candidate_id.as_str()).collect();
        assert_eq!(ids, vec!["same", "near", "far"]);
        for (i, result) in outcome.results.iter().enumerate() {
            assert_eq!(result.rank, Some(i + 1));
        }
        assert!(outcome.results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_integrated_score_is_product() {
        let engine = RankingEngine::default();
        let posting = create_posting(vec![1.0, 0.0]);
        let seekers = vec![create_seeker("a", Some(vec![0.6, 0.8]), 2.0)];

        let outcome = engine
            .rank(&posting, &seekers, RankingMode::Integrated, None, None)
            .unwrap();
        let result = &outcome.results[0];
        let compat = result.metadata.compatibility.as_ref().unwrap();

        assert_eq!(result.score, result.metadata.vector.score * compat.overall_score);
    }

    #[test]
    fn test_skips_malformed_candidates() {
        let engine = RankingEngine::default();
        let posting = create_posting(vec![1.0, 0.0]);
        let seekers = vec![
            create_seeker("ok", Some(vec![1.0, 0.0]), 5.0),
            create_seeker("none", None, 5.0),
            create_seeker("short", Some(vec![1.0]), 5.0),
        ];

        let outcome = engine
            .rank(&posting, &seekers, RankingMode::Integrated, None, None)
            .unwrap();

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.total_candidates, 3);
        assert_eq!(outcome.skipped.len(), 2);
        assert_eq!(outcome.skipped[0].reason, SkipReason::MissingVector);
    }

    #[test]
    fn test_nan_candidate_never_ranked() {
        let engine = RankingEngine::default();
        let posting = create_posting(vec![1.0, 0.0]);
        let seekers = vec![
            create_seeker("same", Some(vec![1.0, 0.0]), 5.0),
            create_seeker("nan", Some(vec![f64::NAN, 0.0]), 5.0),
        ];

        let outcome = engine
            .rank(&posting, &seekers, RankingMode::Integrated, None, None)
            .unwrap();

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].candidate_id, "same");
        assert_eq!(outcome.results[0].rank, Some(1));
        assert_eq!(outcome.skipped[0].reason, SkipReason::NonFinite);
        assert!(outcome.results.iter().all(|r| r.score.is_finite()));
    }

    #[test]
    fn test_non_finite_query_is_error() {
        let engine = RankingEngine::default();
        let posting = create_posting(vec![f64::INFINITY, 0.0]);
        let seekers = vec![create_seeker("a", Some(vec![1.0, 0.0]), 5.0)];

        let err = engine
            .rank(&posting, &seekers, RankingMode::Integrated, None, None)
            .unwrap_err();
        assert_eq!(err, ScoringError::NonFinite);
    }

    #[test]
    fn test_empty_query_vector_is_error() {
        let engine = RankingEngine::default();
        let posting = create_posting(vec![]);

        let err = engine
            .rank(&posting, &[], RankingMode::Integrated, None, None)
            .unwrap_err();
        assert_eq!(err, ScoringError::EmptyVector);
    }

    #[test]
    fn test_empty_candidates() {
        let engine = RankingEngine::default();
        let outcome = engine
            .rank(&create_posting(vec![1.0]), &[], RankingMode::Integrated, Some(5), None)
            .unwrap();

        assert!(outcome.results.is_empty());
        assert_eq!(outcome.total_candidates, 0);
    }

    #[test]
    fn test_structural_mode_drops_required_failures() {
        let engine = RankingEngine::default();
        let posting = create_posting(vec![1.0, 0.0]);
        let seekers = vec![
            create_seeker("junior", Some(vec![1.0, 0.0]), 1.0),
            create_seeker("senior", Some(vec![0.8, 0.2]), 6.0),
        ];

        let outcome = engine
            .rank(&posting, &seekers, RankingMode::Structural, None, None)
            .unwrap();

        assert_eq!(outcome.filtered_out, 1);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].candidate_id, "senior");
        assert_eq!(outcome.results[0].score, outcome.results[0].metadata.vector.score);
        assert!(outcome.results[0].metadata.compatibility.is_none());
    }

    #[test]
    fn test_truncation_keeps_prefix() {
        let engine = RankingEngine::default();
        let posting = create_posting(vec![1.0, 0.0]);
        let seekers: Vec<SeekerCandidate> = (0..10)
            .map(|i| create_seeker(&format!("s{}", i), Some(vec![1.0, i as f64 * 0.1]), 5.0))
            .collect();

        let full = engine
            .rank(&posting, &seekers, RankingMode::Integrated, None, None)
            .unwrap();
        let top = engine
            .rank(&posting, &seekers, RankingMode::Integrated, Some(3), None)
            .unwrap();

        assert_eq!(top.results.len(), 3);
        assert_eq!(top.results[..], full.results[..3]);
    }

    #[test]
    fn test_ties_broken_by_id() {
        let engine = RankingEngine::default();
        let posting = create_posting(vec![1.0, 0.0]);
        let seekers = vec![
            create_seeker("b", Some(vec![1.0, 0.0]), 5.0),
            create_seeker("a", Some(vec![1.0, 0.0]), 5.0),
        ];

        let outcome = engine
            .rank(&posting, &seekers, RankingMode::Integrated, None, None)
            .unwrap();
        assert_eq!(outcome.results[0].candidate_id, "a");
    }

    #[test]
    fn test_rank_postings_for_seeker() {
        let engine = RankingEngine::default();
        let seeker = create_seeker("me", Some(vec![1.0, 0.0]), 5.0);
        let mut busan = create_posting(vec![1.0, 0.0]);
        busan.id = "busan".to_string();
        busan.attributes.work_locations = vec!["부산".to_string()];
        let mut seoul = create_posting(vec![0.9, 0.1]);
        seoul.id = "seoul".to_string();

        let outcome = engine
            .rank_postings(&seeker, &[busan, seoul], RankingMode::Structural, None, None)
            .unwrap();

        assert_eq!(outcome.filtered_out, 1);
        assert_eq!(outcome.results[0].candidate_id, "seoul");
        assert_eq!(outcome.results[0].subject_id, "me");
    }
}
