use crate::models::{MatchingScore, SkipReason, SkippedCandidate};
use thiserror::Error;

/// Default weight of the cosine term
pub const DEFAULT_ALPHA: f64 = 0.7;
/// Default weight of the distance term
pub const DEFAULT_BETA: f64 = 0.3;

/// Errors raised by vector scoring
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("Vector dimension mismatch: left={left}, right={right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("Query vector is empty")]
    EmptyVector,

    #[error("Vector contains a non-finite value")]
    NonFinite,
}

fn max_abs<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    values.into_iter().fold(0.0, |acc, x| acc.max(x.abs()))
}

/// Cosine similarity in [-1, 1]
///
/// Defined as 0 when either vector has zero magnitude. Components are
/// rescaled by their largest magnitude first, so very large or very small
/// finite vectors neither overflow nor underflow. Callers must pass vectors
/// of equal length.
#[inline]
pub fn cosine_similarity(u: &[f64], v: &[f64]) -> f64 {
    let scale_u = max_abs(u.iter().copied());
    let scale_v = max_abs(v.iter().copied());
    if scale_u == 0.0 || scale_v == 0.0 {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_u = 0.0;
    let mut norm_v = 0.0;

    for (a, b) in u.iter().zip(v) {
        let (a, b) = (a / scale_u, b / scale_v);
        dot += a * b;
        norm_u += a * a;
        norm_v += b * b;
    }

    (dot / (norm_u.sqrt() * norm_v.sqrt())).clamp(-1.0, 1.0)
}

/// Euclidean distance between two vectors of equal length
///
/// Differences are rescaled by the largest one before squaring.
#[inline]
pub fn euclidean_distance(u: &[f64], v: &[f64]) -> f64 {
    let scale = max_abs(u.iter().zip(v).map(|(a, b)| a - b));
    if scale == 0.0 {
        return 0.0;
    }

    let sum: f64 = u
        .iter()
        .zip(v)
        .map(|(a, b)| ((a - b) / scale).powi(2))
        .sum();
    scale * sum.sqrt()
}

/// Outcome of scoring one query against many candidates
#[derive(Debug, Clone, Default)]
pub struct BatchScores {
    pub scored: Vec<(String, MatchingScore)>,
    pub skipped: Vec<SkippedCandidate>,
}

/// Combines cosine similarity and Euclidean distance into one ranking signal
///
/// `score = alpha * cos(u, v) - beta * ||u - v||`
///
/// The scale is unbounded and only meaningful for relative ordering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorScorer {
    alpha: f64,
    beta: f64,
}

impl VectorScorer {
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self { alpha, beta }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Score a pair with this scorer's weights
    pub fn score(&self, u: &[f64], v: &[f64]) -> Result<MatchingScore, ScoringError> {
        score_with(u, v, self.alpha, self.beta)
    }

    /// Score a pair, overriding either weight for this call only
    ///
    /// An explicit override of `0.0` is honored.
    pub fn score_pair(
        &self,
        u: &[f64],
        v: &[f64],
        alpha: Option<f64>,
        beta: Option<f64>,
    ) -> Result<MatchingScore, ScoringError> {
        score_with(u, v, alpha.unwrap_or(self.alpha), beta.unwrap_or(self.beta))
    }

    /// Score one candidate of a batch
    ///
    /// A missing vector or a wrong dimension is logged and returned as the
    /// reason the candidate was skipped.
    pub fn score_candidate(
        &self,
        query: &[f64],
        id: &str,
        vector: Option<&[f64]>,
    ) -> Result<MatchingScore, SkippedCandidate> {
        let Some(vector) = vector else {
            tracing::warn!("Candidate {} has no vector, skipping", id);
            return Err(SkippedCandidate {
                candidate_id: id.to_string(),
                reason: SkipReason::MissingVector,
            });
        };

        self.score(query, vector).map_err(|e| {
            tracing::warn!("Failed to score candidate {}: {}", id, e);
            let reason = match e {
                ScoringError::NonFinite => SkipReason::NonFinite,
                _ => SkipReason::DimensionMismatch {
                    expected: query.len(),
                    actual: vector.len(),
                },
            };
            SkippedCandidate {
                candidate_id: id.to_string(),
                reason,
            }
        })
    }

    /// Score one query vector against many candidates
    ///
    /// Malformed candidates are skipped; they never abort the batch.
    pub fn score_batch<'a, I>(&self, query: &[f64], candidates: I) -> BatchScores
    where
        I: IntoIterator<Item = (&'a str, Option<&'a [f64]>)>,
    {
        let mut batch = BatchScores::default();

        for (id, vector) in candidates {
            match self.score_candidate(query, id, vector) {
                Ok(score) => batch.scored.push((id.to_string(), score)),
                Err(skipped) => batch.skipped.push(skipped),
            }
        }

        batch
    }
}

impl Default for VectorScorer {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA, DEFAULT_BETA)
    }
}

/// Score a pair with explicit weights
///
/// NaN or infinite components, and pairs whose score is not finite, are
/// rejected rather than ranked.
pub fn score_with(
    u: &[f64],
    v: &[f64],
    alpha: f64,
    beta: f64,
) -> Result<MatchingScore, ScoringError> {
    if u.len() != v.len() {
        return Err(ScoringError::DimensionMismatch {
            left: u.len(),
            right: v.len(),
        });
    }
    if !u.iter().chain(v).all(|x| x.is_finite()) {
        return Err(ScoringError::NonFinite);
    }

    let cosine = cosine_similarity(u, v);
    let distance = euclidean_distance(u, v);
    let score = alpha * cosine - beta * distance;
    if !score.is_finite() {
        return Err(ScoringError::NonFinite);
    }

    tracing::trace!(
        "Similarity calculated - cosine: {:.4}, euclidean: {:.4}, score: {:.4}",
        cosine,
        distance,
        score
    );

    Ok(MatchingScore {
        score,
        cosine_similarity: cosine,
        euclidean_distance: distance,
        alpha,
        beta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_vectors() {
        let u = vec![0.2, 0.4, 0.6];
        let result = VectorScorer::default().score(&u, &u).unwrap();

        assert!((result.cosine_similarity - 1.0).abs() < 1e-12);
        assert!(result.euclidean_distance.abs() < 1e-12);
        assert!((result.score - DEFAULT_ALPHA).abs() < 1e-12);
    }

    #[test]
    fn test_orthogonal_vectors() {
        let result = score_with(&[1.0, 0.0], &[0.0, 1.0], 0.7, 0.3).unwrap();

        assert!(result.cosine_similarity.abs() < 1e-12);
        assert!((result.euclidean_distance - 2.0_f64.sqrt()).abs() < 1e-12);
        assert!((result.score + 0.3 * 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_zero_vector_has_zero_cosine() {
        let result = score_with(&[0.0, 0.0], &[3.0, 4.0], 0.7, 0.3).unwrap();

        assert_eq!(result.cosine_similarity, 0.0);
        assert!((result.euclidean_distance - 5.0).abs() < 1e-12);
        assert!(!result.score.is_nan());
    }

    #[test]
    fn test_large_vectors_do_not_overflow() {
        let result = VectorScorer::new(1.0, 0.0)
            .score(&[1e200, 0.0], &[1e200, 0.0])
            .unwrap();

        assert!((result.cosine_similarity - 1.0).abs() < 1e-12);
        assert!((result.score - 1.0).abs() < 1e-12);

        let far = score_with(&[3e200, 0.0], &[0.0, 4e200], 0.7, 0.0).unwrap();
        assert!(far.cosine_similarity.abs() < 1e-12);
        assert!((far.euclidean_distance / 5e200 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_tiny_vectors_do_not_underflow() {
        let result = score_with(&[1e-200, 1e-200], &[2e-200, 2e-200], 0.7, 0.3).unwrap();
        assert!((result.cosine_similarity - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_components_rejected() {
        let scorer = VectorScorer::default();

        assert_eq!(
            scorer.score(&[f64::NAN, 0.0], &[1.0, 0.0]).unwrap_err(),
            ScoringError::NonFinite
        );
        assert_eq!(
            scorer.score(&[1.0, 0.0], &[f64::INFINITY, 0.0]).unwrap_err(),
            ScoringError::NonFinite
        );
    }

    #[test]
    fn test_candidate_with_nan_is_skipped() {
        let skipped = VectorScorer::default()
            .score_candidate(&[1.0, 0.0], "nan", Some(&[f64::NAN, 0.0]))
            .unwrap_err();
        assert_eq!(skipped.reason, SkipReason::NonFinite);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = VectorScorer::default().score(&[1.0, 2.0], &[1.0]).unwrap_err();
        assert_eq!(err, ScoringError::DimensionMismatch { left: 2, right: 1 });
    }

    #[test]
    fn test_zero_override_is_honored() {
        let scorer = VectorScorer::default();
        let result = scorer.score_pair(&[1.0, 0.0], &[0.0, 1.0], None, Some(0.0)).unwrap();

        assert_eq!(result.beta, 0.0);
        assert!(result.score.abs() < 1e-12);
    }

    #[test]
    fn test_batch_skips_malformed_candidates() {
        let scorer = VectorScorer::default();
        let query = vec![1.0, 0.0, 0.0];
        let good = vec![1.0, 0.0, 0.0];
        let short = vec![1.0];

        let batch = scorer.score_batch(
            &query,
            vec![
                ("good", Some(good.as_slice())),
                ("short", Some(short.as_slice())),
                ("missing", None),
            ],
        );

        assert_eq!(batch.scored.len(), 1);
        assert_eq!(batch.scored[0].0, "good");
        assert_eq!(batch.skipped.len(), 2);
        assert_eq!(batch.skipped[1].reason, SkipReason::MissingVector);
    }
}
