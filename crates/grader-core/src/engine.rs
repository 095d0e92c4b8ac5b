//! Grading engine: cache lookup, both analysis layers, threshold decision.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::backend::{ReferenceBackend, ScoringBackend};
use crate::cache::{cache_key, CacheLookup, CacheStats, ResultCache};
use crate::config::EngineConfig;
use crate::error::{GraderError, GraderResult};
use crate::model::{CodeSubmission, GradingRequest, GradingResult, Rubric};
use crate::rubric::{self, passing_threshold, validate_rubric};
use crate::semantic::SemanticAnalyzer;
use crate::structural::StructuralAnalyzer;

/// Entry point for grading submissions.
///
/// Each engine owns its backend, cache tiers and default rubric.
pub struct GradingEngine {
    analyzer: StructuralAnalyzer,
    semantic: SemanticAnalyzer,
    cache: ResultCache,
    default_rubric: RwLock<Rubric>,
    config: EngineConfig,
}

impl GradingEngine {
    /// Engine with the reference backend and the tiers described by `config`.
    pub async fn from_config(config: EngineConfig) -> GraderResult<Self> {
        let backend = ReferenceBackend::new().with_simulated_latency(config.simulate_latency);
        let cache = ResultCache::from_config(&config).await?;
        Ok(Self::with_components(Arc::new(backend), cache, config))
    }

    /// Engine over explicit components.
    pub fn with_components(
        backend: Arc<dyn ScoringBackend>,
        cache: ResultCache,
        config: EngineConfig,
    ) -> Self {
        let mut semantic =
            SemanticAnalyzer::new(backend).with_fallback(config.fallback_on_backend_error);
        if let Some(timeout) = config.judge_timeout() {
            semantic = semantic.with_timeout(timeout);
        }

        Self {
            analyzer: StructuralAnalyzer::new(),
            semantic,
            cache,
            default_rubric: RwLock::new(rubric::DEFAULT_RUBRIC),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Grade one submission.
    ///
    /// Cache hits return immediately with `cached = true`. On a miss both
    /// layers run, the result is written to the keyed cache tiers and
    /// returned with `cached = false`.
    pub async fn judge(&self, request: GradingRequest) -> GraderResult<GradingResult> {
        let GradingRequest {
            submission,
            rubric,
            seed,
        } = request;
        let rubric = rubric.unwrap_or_else(|| self.default_rubric());
        let key = cache_key(&submission, &rubric);

        let lookup = CacheLookup {
            key: &key,
            submission: &submission,
            rubric: &rubric,
        };
        if let Some(hit) = self.cache.get(&lookup).await {
            info!(
                session_id = %submission.session_id,
                milestone = submission.milestone,
                score = hit.overall_score,
                passed = hit.passed,
                "served grading result from cache"
            );
            return Ok(hit);
        }

        let seed = seed.unwrap_or_else(time_seed);
        debug!(session_id = %submission.session_id, seed, key = %key, "grading submission");

        let layer1 = self.analyzer.analyze(&submission);
        let layer2 = self
            .semantic
            .analyze(&submission, &rubric, &layer1, seed)
            .await?;

        let threshold = passing_threshold(&rubric);
        let passed = layer1.passed && layer2.weighted_score >= threshold;
        let result = GradingResult {
            session_id: submission.session_id.clone(),
            milestone: submission.milestone,
            passed,
            overall_score: layer2.weighted_score,
            layer1,
            layer2,
            rubric,
            timestamp: Utc::now(),
            cached: false,
        };

        self.cache.set(&key, &result).await;

        info!(
            session_id = %result.session_id,
            milestone = result.milestone,
            backend = self.semantic.backend_name(),
            score = result.overall_score,
            threshold,
            passed,
            "graded submission"
        );
        Ok(result)
    }

    /// Grade requests one after another. Failed items are logged and left out.
    pub async fn judge_batch(&self, requests: Vec<GradingRequest>) -> Vec<GradingResult> {
        let total = requests.len();
        let mut results = Vec::with_capacity(total);
        for (index, request) in requests.into_iter().enumerate() {
            let session_id = request.submission.session_id.clone();
            match self.judge(request).await {
                Ok(result) => results.push(result),
                Err(e) => warn!(
                    index,
                    session_id = %session_id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "batch item failed, skipping"
                ),
            }
        }
        debug!(total, succeeded = results.len(), "batch complete");
        results
    }

    /// Drop the cached result for `submission` under `rubric` (default rubric when `None`).
    pub async fn invalidate_cache(&self, submission: &CodeSubmission, rubric: Option<&Rubric>) {
        let rubric = rubric.copied().unwrap_or_else(|| self.default_rubric());
        self.cache.invalidate(&cache_key(submission, &rubric)).await;
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
        info!("grading cache cleared");
    }

    /// Replace the rubric used for requests without one.
    pub fn set_default_rubric(&self, rubric: Rubric) -> GraderResult<()> {
        if !validate_rubric(&rubric) {
            return Err(GraderError::Validation {
                message: format!(
                    "weights must each lie in [0, 1] and sum to 1.0 (got {:.3})",
                    rubric.weight_sum()
                ),
            });
        }
        *self
            .default_rubric
            .write()
            .unwrap_or_else(PoisonError::into_inner) = rubric;
        info!(?rubric, "default rubric updated");
        Ok(())
    }

    pub fn default_rubric(&self) -> Rubric {
        *self
            .default_rubric
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Report for `result`, judged against the rubric it was graded with.
    pub fn generate_report(&self, result: &GradingResult) -> String {
        rubric::generate_report(result, &result.rubric)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ScoreOutcome;
    use crate::model::SubmissionFile;
    use crate::rubric::STRICT_RUBRIC;
    use async_trait::async_trait;

    struct FixedBackend(u32);

    #[async_trait]
    impl ScoringBackend for FixedBackend {
        async fn analyze(&self, _: &str, _: &str, _: u64) -> GraderResult<ScoreOutcome> {
            Ok(ScoreOutcome {
                score: self.0,
                feedback: format!("fixed {}", self.0),
                suggestions: vec![],
            })
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn engine(score: u32) -> GradingEngine {
        GradingEngine::with_components(
            Arc::new(FixedBackend(score)),
            ResultCache::memory_only(16),
            EngineConfig::default().with_heuristic_templates(false),
        )
    }

    fn submission(code: &str) -> CodeSubmission {
        CodeSubmission {
            user_id: "u1".into(),
            session_id: "sess".into(),
            milestone: 2,
            files: vec![SubmissionFile::new("src/main.js", code, "javascript")],
        }
    }

    #[tokio::test]
    async fn pass_requires_clean_layer1_and_threshold() {
        let engine = engine(80);
        let result = engine
            .judge(GradingRequest::new(submission("const a = 1;")).with_seed(1))
            .await
            .unwrap();
        assert!(result.layer1.passed);
        assert_eq!(result.overall_score, 80);
        assert!(result.passed);
        assert!(!result.cached);

        // Security violation: layer 1 fails, functionality drops by 45.
        let result = engine
            .judge(GradingRequest::new(submission("eval(input);")).with_seed(1))
            .await
            .unwrap();
        assert!(!result.layer1.passed);
        assert_eq!(result.layer2.functionality_score, 35);
        assert!(!result.passed);
    }

    #[tokio::test]
    async fn explicit_rubric_is_used_and_recorded() {
        let engine = engine(80);
        let result = engine
            .judge(
                GradingRequest::new(submission("const a = 1;"))
                    .with_rubric(STRICT_RUBRIC)
                    .with_seed(1),
            )
            .await
            .unwrap();
        assert_eq!(result.rubric, STRICT_RUBRIC);
        // 80 < 85
        assert!(!result.passed);
        assert!(engine
            .generate_report(&result)
            .contains("FAILED, passing threshold 85"));
    }

    #[tokio::test]
    async fn default_rubric_validation() {
        let engine = engine(80);
        let err = engine
            .set_default_rubric(Rubric::new(0.3, 0.3, 0.2, 0.1))
            .unwrap_err();
        assert!(matches!(err, GraderError::Validation { .. }));
        assert!(!err.is_retryable());
        assert_eq!(engine.default_rubric(), rubric::DEFAULT_RUBRIC);

        engine.set_default_rubric(STRICT_RUBRIC).unwrap();
        assert_eq!(engine.default_rubric(), STRICT_RUBRIC);
        let result = engine
            .judge(GradingRequest::new(submission("const a = 1;")))
            .await
            .unwrap();
        assert_eq!(result.rubric, STRICT_RUBRIC);
    }

    #[tokio::test]
    async fn changing_default_rubric_changes_cache_key() {
        let engine = engine(80);
        let sub = submission("const a = 1;");
        engine
            .judge(GradingRequest::new(sub.clone()).with_seed(1))
            .await
            .unwrap();
        engine.set_default_rubric(STRICT_RUBRIC).unwrap();
        let second = engine
            .judge(GradingRequest::new(sub).with_seed(1))
            .await
            .unwrap();
        assert!(!second.cached);
        assert_eq!(engine.cache_stats().misses, 2);
    }

    #[tokio::test]
    async fn clear_cache_forces_regrade() {
        let engine = engine(70);
        let request = GradingRequest::new(submission("const a = 1;")).with_seed(3);
        engine.judge(request.clone()).await.unwrap();
        assert!(engine.judge(request.clone()).await.unwrap().cached);

        engine.clear_cache().await;
        assert!(!engine.judge(request).await.unwrap().cached);

        let stats = engine.cache_stats();
        assert_eq!(stats.memory_hits, 1);
        assert_eq!(stats.writes, 2);
    }

    #[tokio::test]
    async fn from_config_uses_reference_backend() {
        let engine = GradingEngine::from_config(EngineConfig::default().with_heuristic_templates(false))
            .await
            .unwrap();
        let result = engine
            .judge(GradingRequest::new(submission("const a = 1;")).with_seed(9))
            .await
            .unwrap();
        assert!(result.overall_score <= 100);
        assert_eq!(engine.config().cache_capacity, 1000);
    }
}
