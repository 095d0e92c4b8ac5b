//! Submission, rubric and result types exchanged with the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One source file of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionFile {
    /// Path relative to the project root (e.g., "src/App.tsx").
    pub path: String,

    /// Full file content.
    pub content: String,

    /// Declared language (e.g., "typescript"). May be empty.
    #[serde(default)]
    pub language: String,
}

impl SubmissionFile {
    pub fn new(
        path: impl Into<String>,
        content: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            language: language.into(),
        }
    }
}

/// Code submitted by a learner for one milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSubmission {
    pub user_id: String,
    pub session_id: String,
    pub milestone: u32,
    pub files: Vec<SubmissionFile>,
}

impl CodeSubmission {
    /// Files ordered by path, the canonical order for hashing.
    pub fn sorted_files(&self) -> Vec<&SubmissionFile> {
        let mut files: Vec<&SubmissionFile> = self.files.iter().collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    /// All file contents joined in submission order.
    pub fn combined_code(&self) -> String {
        self.files
            .iter()
            .map(|f| f.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Category weights used to combine sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    pub functionality: f64,
    pub quality: f64,
    pub best_practices: f64,
    pub innovation: f64,
}

impl Rubric {
    pub const fn new(functionality: f64, quality: f64, best_practices: f64, innovation: f64) -> Self {
        Self {
            functionality,
            quality,
            best_practices,
            innovation,
        }
    }

    pub fn weight_sum(&self) -> f64 {
        self.functionality + self.quality + self.best_practices + self.innovation
    }
}

impl Default for Rubric {
    fn default() -> Self {
        crate::rubric::DEFAULT_RUBRIC
    }
}

/// Layer 1 (structural) outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer1Result {
    pub passed: bool,
    pub syntax_errors: Vec<String>,
    pub structural_issues: Vec<String>,
    pub security_violations: Vec<String>,
    pub file_count: usize,
    pub total_lines: usize,
    pub fingerprint: String,
}

/// Layer 2 (semantic) outcome. All scores are 0-100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer2Result {
    pub functionality_score: u32,
    pub quality_score: u32,
    pub best_practices_score: u32,
    pub innovation_score: u32,
    pub weighted_score: u32,
    pub feedback: String,
    pub suggestions: Vec<String>,
}

/// Final grading outcome returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingResult {
    pub session_id: String,
    pub milestone: u32,
    pub passed: bool,
    pub overall_score: u32,
    pub layer1: Layer1Result,
    pub layer2: Layer2Result,
    pub rubric: Rubric,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub cached: bool,
}

/// A cached grading result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub result: GradingResult,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub hits: u64,
}

impl CacheEntry {
    pub fn new(result: GradingResult) -> Self {
        Self {
            result,
            created_at: Utc::now(),
            hits: 0,
        }
    }
}

/// A single call into the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingRequest {
    pub submission: CodeSubmission,
    #[serde(default)]
    pub rubric: Option<Rubric>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl GradingRequest {
    pub fn new(submission: CodeSubmission) -> Self {
        Self {
            submission,
            rubric: None,
            seed: None,
        }
    }

    pub fn with_rubric(mut self, rubric: Rubric) -> Self {
        self.rubric = Some(rubric);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_files_orders_by_path() {
        let sub = CodeSubmission {
            user_id: "u".into(),
            session_id: "s".into(),
            milestone: 1,
            files: vec![
                SubmissionFile::new("src/z.ts", "", "typescript"),
                SubmissionFile::new("src/a.ts", "", "typescript"),
            ],
        };
        let paths: Vec<&str> = sub.sorted_files().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/a.ts", "src/z.ts"]);
        // Input order untouched.
        assert_eq!(sub.files[0].path, "src/z.ts");
    }

    #[test]
    fn grading_result_serializes_flat_top_level_fields() {
        let result = GradingResult {
            session_id: "s1".into(),
            milestone: 2,
            passed: true,
            overall_score: 81,
            layer1: Layer1Result {
                passed: true,
                syntax_errors: vec![],
                structural_issues: vec![],
                security_violations: vec![],
                file_count: 1,
                total_lines: 3,
                fingerprint: "abc".into(),
            },
            layer2: Layer2Result {
                functionality_score: 80,
                quality_score: 80,
                best_practices_score: 85,
                innovation_score: 80,
                weighted_score: 81,
                feedback: String::new(),
                suggestions: vec![],
            },
            rubric: Rubric::default(),
            timestamp: Utc::now(),
            cached: false,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["overall_score"], 81);
        assert_eq!(json["passed"], true);
        assert_eq!(json["cached"], false);
        assert_eq!(json["rubric"]["functionality"], 0.4);
    }
}
