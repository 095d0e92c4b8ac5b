//! Layer 2: rubric-weighted semantic scoring.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::backend::{ReferenceBackend, ScoreCategory, ScoreOutcome, ScoringBackend};
use crate::error::{GraderError, GraderResult};
use crate::model::{CodeSubmission, Layer1Result, Layer2Result, Rubric};

/// Subtracted from functionality when Layer 1 failed.
pub const LAYER1_FAILURE_PENALTY: u32 = 30;
/// Subtracted from functionality per security violation.
pub const SECURITY_VIOLATION_PENALTY: u32 = 15;
/// Subtracted from functionality per syntax error.
pub const SYNTAX_ERROR_PENALTY: u32 = 10;
/// Maximum suggestions kept in a [`Layer2Result`].
pub const MAX_SUGGESTIONS: usize = 10;

/// Runs the scoring backend once per category and combines the scores.
#[derive(Clone)]
pub struct SemanticAnalyzer {
    backend: Arc<dyn ScoringBackend>,
    timeout: Option<Duration>,
    fallback: Option<ReferenceBackend>,
}

impl SemanticAnalyzer {
    pub fn new(backend: Arc<dyn ScoringBackend>) -> Self {
        Self {
            backend,
            timeout: None,
            fallback: None,
        }
    }

    /// Fail a category call that takes longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Score failed or timed-out categories with the reference backend
    /// instead of failing the whole analysis.
    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback = enabled.then(ReferenceBackend::new);
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Score all four categories concurrently with seeds `seed..seed+3`.
    pub async fn analyze(
        &self,
        submission: &CodeSubmission,
        rubric: &Rubric,
        layer1: &Layer1Result,
        seed: u64,
    ) -> GraderResult<Layer2Result> {
        let code = submission.combined_code();
        let [functionality, quality, best_practices, innovation] = ScoreCategory::ALL;

        let (f, q, bp, i) = tokio::try_join!(
            self.score_category(&code, functionality, seed),
            self.score_category(&code, quality, seed.wrapping_add(1)),
            self.score_category(&code, best_practices, seed.wrapping_add(2)),
            self.score_category(&code, innovation, seed.wrapping_add(3)),
        )?;

        let functionality_score = adjust_functionality(f.score, layer1);
        let weighted = weighted_score(
            functionality_score,
            q.score,
            bp.score,
            i.score,
            rubric,
        );

        debug!(
            backend = self.backend.name(),
            seed,
            raw_functionality = f.score,
            functionality = functionality_score,
            quality = q.score,
            best_practices = bp.score,
            innovation = i.score,
            weighted,
            "layer 2 complete"
        );

        let outcomes = [f, q, bp, i];
        let feedback = outcomes
            .iter()
            .map(|o| o.feedback.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let suggestions = outcomes
            .iter()
            .flat_map(|o| o.suggestions.iter().cloned())
            .take(MAX_SUGGESTIONS)
            .collect();
        let [_, q, bp, i] = outcomes;

        Ok(Layer2Result {
            functionality_score,
            quality_score: q.score,
            best_practices_score: bp.score,
            innovation_score: i.score,
            weighted_score: weighted,
            feedback,
            suggestions,
        })
    }

    async fn score_category(
        &self,
        code: &str,
        category: ScoreCategory,
        seed: u64,
    ) -> GraderResult<ScoreOutcome> {
        let call = self.backend.analyze(code, category.prompt(), seed);
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(GraderError::Timeout { after: limit }),
            },
            None => call.await,
        };

        match outcome {
            Ok(mut outcome) => {
                outcome.score = outcome.score.min(100);
                Ok(outcome)
            }
            Err(e) => match &self.fallback {
                Some(fallback) => {
                    warn!(
                        backend = self.backend.name(),
                        category = %category,
                        error = %e,
                        "scoring backend failed, using fallback score"
                    );
                    Ok(fallback.score(code, category.prompt(), seed))
                }
                None => Err(e),
            },
        }
    }
}

/// Functionality after Layer 1 penalties, applied in sequence and floored at 0.
pub fn adjust_functionality(score: u32, layer1: &Layer1Result) -> u32 {
    let mut score = score;
    if !layer1.passed {
        score = score.saturating_sub(LAYER1_FAILURE_PENALTY);
    }
    score = score.saturating_sub(
        SECURITY_VIOLATION_PENALTY.saturating_mul(layer1.security_violations.len() as u32),
    );
    score.saturating_sub(SYNTAX_ERROR_PENALTY.saturating_mul(layer1.syntax_errors.len() as u32))
}

/// `round(f*w_f + q*w_q + bp*w_bp + i*w_i)`, clamped to 0..=100.
pub fn weighted_score(
    functionality: u32,
    quality: u32,
    best_practices: u32,
    innovation: u32,
    rubric: &Rubric,
) -> u32 {
    let raw = f64::from(functionality) * rubric.functionality
        + f64::from(quality) * rubric.quality
        + f64::from(best_practices) * rubric.best_practices
        + f64::from(innovation) * rubric.innovation;
    raw.round().clamp(0.0, 100.0) as u32
}
