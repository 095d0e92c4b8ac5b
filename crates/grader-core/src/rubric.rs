//! Rubric presets, validation, thresholds and report rendering.

use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GraderError;
use crate::model::{GradingResult, Rubric};

/// Allowed distance of the weight sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

pub const DEFAULT_RUBRIC: Rubric = Rubric::new(0.4, 0.3, 0.2, 0.1);
pub const STRICT_RUBRIC: Rubric = Rubric::new(0.5, 0.3, 0.15, 0.05);
pub const CREATIVE_RUBRIC: Rubric = Rubric::new(0.3, 0.25, 0.25, 0.2);

/// Named rubric presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RubricPreset {
    Default,
    Strict,
    Creative,
}

impl RubricPreset {
    pub fn rubric(self) -> Rubric {
        match self {
            Self::Default => DEFAULT_RUBRIC,
            Self::Strict => STRICT_RUBRIC,
            Self::Creative => CREATIVE_RUBRIC,
        }
    }
}

impl FromStr for RubricPreset {
    type Err = GraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "strict" => Ok(Self::Strict),
            "creative" => Ok(Self::Creative),
            other => Err(GraderError::Config {
                message: format!("unknown rubric preset: {}", other),
            }),
        }
    }
}

/// Learner level used to reshape a rubric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl FromStr for Difficulty {
    type Err = GraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(GraderError::Config {
                message: format!("unknown difficulty: {}", other),
            }),
        }
    }
}

/// Partially specified rubric; missing weights come from [`DEFAULT_RUBRIC`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RubricOverrides {
    #[serde(default)]
    pub functionality: Option<f64>,
    #[serde(default)]
    pub quality: Option<f64>,
    #[serde(default)]
    pub best_practices: Option<f64>,
    #[serde(default)]
    pub innovation: Option<f64>,
}

/// Fill unspecified weights from the default preset. The result is not validated.
pub fn create_rubric(overrides: RubricOverrides) -> Rubric {
    Rubric {
        functionality: overrides
            .functionality
            .unwrap_or(DEFAULT_RUBRIC.functionality),
        quality: overrides.quality.unwrap_or(DEFAULT_RUBRIC.quality),
        best_practices: overrides
            .best_practices
            .unwrap_or(DEFAULT_RUBRIC.best_practices),
        innovation: overrides.innovation.unwrap_or(DEFAULT_RUBRIC.innovation),
    }
}

/// True iff every weight is a finite value in [0, 1] and they sum to 1.0 ± 0.01.
pub fn validate_rubric(rubric: &Rubric) -> bool {
    let weights = [
        rubric.functionality,
        rubric.quality,
        rubric.best_practices,
        rubric.innovation,
    ];
    weights
        .iter()
        .all(|w| w.is_finite() && (0.0..=1.0).contains(w))
        && (rubric.weight_sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
}

/// Minimum weighted score to pass. Innovation-heavy rubrics are checked first.
pub fn passing_threshold(rubric: &Rubric) -> u32 {
    if rubric.innovation > 0.15 {
        60
    } else if rubric.functionality > 0.45 {
        85
    } else {
        70
    }
}

/// Rubric for a learner level. Always a new value; `_rubric` is left untouched.
pub fn adapt_for_difficulty(_rubric: &Rubric, level: Difficulty) -> Rubric {
    match level {
        Difficulty::Beginner => Rubric::new(0.5, 0.3, 0.2, 0.0),
        Difficulty::Intermediate => Rubric::new(0.4, 0.3, 0.2, 0.1),
        Difficulty::Advanced => Rubric::new(0.35, 0.25, 0.2, 0.2),
    }
}

fn percent(weight: f64) -> u32 {
    (weight * 100.0).round() as u32
}

/// Human-readable breakdown of `result` judged against `rubric`.
///
/// The status is recomputed against `rubric`'s threshold rather than read
/// from `result.passed`. A failed Layer 1 always reports FAILED.
pub fn generate_report(result: &GradingResult, rubric: &Rubric) -> String {
    let threshold = passing_threshold(rubric);
    let passed = result.layer1.passed && result.overall_score >= threshold;
    let status = if passed { "PASSED" } else { "FAILED" };
    let l2 = &result.layer2;
    let l1 = &result.layer1;

    let mut out = String::new();
    let _ = writeln!(out, "Grading Report - Milestone {}", result.milestone);
    let _ = writeln!(
        out,
        "Overall Score: {}/100 ({}, passing threshold {})",
        result.overall_score, status, threshold
    );
    if result.cached {
        let _ = writeln!(out, "(served from cache)");
    }
    out.push('\n');

    let _ = writeln!(out, "Category Scores:");
    let rows = [
        ("Functionality", l2.functionality_score, rubric.functionality),
        ("Code Quality", l2.quality_score, rubric.quality),
        ("Best Practices", l2.best_practices_score, rubric.best_practices),
        ("Innovation", l2.innovation_score, rubric.innovation),
    ];
    for (name, score, weight) in rows {
        let _ = writeln!(out, "  - {}: {}/100 (weight {}%)", name, score, percent(weight));
    }

    let findings = [
        ("Security Violations", &l1.security_violations),
        ("Syntax Errors", &l1.syntax_errors),
        ("Structural Issues", &l1.structural_issues),
    ];
    for (title, items) in findings {
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{}:", title);
        for item in items {
            let _ = writeln!(out, "  - {}", item);
        }
    }

    let _ = writeln!(out, "\nFeedback:\n{}", l2.feedback);

    if !l2.suggestions.is_empty() {
        let _ = writeln!(out, "\nSuggestions:");
        for (n, suggestion) in l2.suggestions.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}", n + 1, suggestion);
        }
    }

    out
}
