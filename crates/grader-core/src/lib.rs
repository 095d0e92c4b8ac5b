//! Milestone grading pipeline.
//!
//! Grades a learner's code submission in two layers and caches the outcome:
//!
//! - Layer 1: pattern-based structural and security scan
//! - Layer 2: four category scores from a pluggable scoring backend, combined
//!   with rubric weights
//! - Rubric-derived passing threshold and a plain-text report
//! - Result cache (in-process → distributed → heuristic template match)
//!
//! # Quick Start
//!
//! ```no_run
//! use grader_core::{CodeSubmission, EngineConfig, GradingEngine, GradingRequest, SubmissionFile};
//!
//! # async fn example() -> grader_core::GraderResult<()> {
//! let engine = GradingEngine::from_config(EngineConfig::from_env()).await?;
//!
//! let submission = CodeSubmission {
//!     user_id: "learner-1".into(),
//!     session_id: "session-42".into(),
//!     milestone: 3,
//!     files: vec![SubmissionFile::new("src/app.ts", "export const add = (a: number, b: number) => a + b;", "typescript")],
//! };
//!
//! let result = engine.judge(GradingRequest::new(submission).with_seed(7)).await?;
//! println!("{}", engine.generate_report(&result));
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `GRADER_CACHE_CAPACITY` | In-process cache entries (default: 1000) |
//! | `GRADER_CACHE_URL` | Distributed cache base URL (default: disabled) |
//! | `GRADER_CACHE_TTL` | Distributed entry expiry in seconds (default: 3600) |
//! | `GRADER_CACHE_TIMEOUT` | Distributed cache request timeout in seconds (default: 2) |
//! | `GRADER_TEMPLATES` | Heuristic template matches (default: true) |
//! | `GRADER_JUDGE_TIMEOUT` | Backend timeout per category in seconds, 0 disables (default: 30) |
//! | `GRADER_BACKEND_FALLBACK` | Score with the reference backend when the backend fails |
//! | `GRADER_SIMULATE_LATENCY` | Make the reference backend sleep like a remote one |

pub mod backend;
pub mod cache;
pub mod config;
mod digest;
pub mod engine;
pub mod error;
pub mod model;
pub mod rubric;
pub mod semantic;
pub mod structural;

// Re-export main types
pub use backend::{ReferenceBackend, ScoreCategory, ScoreOutcome, ScoringBackend};
pub use cache::{
    cache_key, CacheLookup, CacheStats, CacheTier, MemoryTier, RemoteTier, ResultCache,
    TemplateTier, TierKind,
};
pub use config::EngineConfig;
pub use engine::GradingEngine;
pub use error::{GraderError, GraderResult};
pub use model::{
    CacheEntry, CodeSubmission, GradingRequest, GradingResult, Layer1Result, Layer2Result, Rubric,
    SubmissionFile,
};
pub use rubric::{
    adapt_for_difficulty, create_rubric, generate_report, passing_threshold, validate_rubric,
    Difficulty, RubricOverrides, RubricPreset, CREATIVE_RUBRIC, DEFAULT_RUBRIC, STRICT_RUBRIC,
};
pub use semantic::{adjust_functionality, weighted_score, SemanticAnalyzer};
pub use structural::{fingerprint, StructuralAnalyzer, MAX_ANALYZED_BYTES};
