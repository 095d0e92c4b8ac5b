//! Scoring backends.
//!
//! The semantic layer only talks to a [`ScoringBackend`]. The deterministic
//! [`ReferenceBackend`] ships with the crate; AI-backed implementations plug
//! in behind the same trait.

mod reference;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{GraderError, GraderResult};

pub use reference::ReferenceBackend;

/// Outcome of scoring one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    /// 0-100.
    pub score: u32,
    pub feedback: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[async_trait]
pub trait ScoringBackend: Send + Sync {
    /// Score `code` for the category described by `category_prompt`.
    /// Identical inputs must produce identical outcomes.
    async fn analyze(
        &self,
        code: &str,
        category_prompt: &str,
        seed: u64,
    ) -> GraderResult<ScoreOutcome>;

    fn name(&self) -> &'static str;
}

/// The four rubric categories scored by the semantic layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoreCategory {
    Functionality,
    Quality,
    BestPractices,
    Innovation,
}

impl ScoreCategory {
    /// Fixed evaluation order; category `i` is scored with `seed + i`.
    pub const ALL: [ScoreCategory; 4] = [
        ScoreCategory::Functionality,
        ScoreCategory::Quality,
        ScoreCategory::BestPractices,
        ScoreCategory::Innovation,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Functionality => "Functionality",
            Self::Quality => "Code Quality",
            Self::BestPractices => "Best Practices",
            Self::Innovation => "Innovation",
        }
    }

    /// Prompt sent to the backend for this category.
    pub fn prompt(self) -> &'static str {
        match self {
            Self::Functionality => {
                "Evaluate functionality: does the code implement the milestone requirements correctly, handle errors and edge cases, and include tests?"
            }
            Self::Quality => {
                "Evaluate code quality: readability, naming, comments, type annotations and overall structure."
            }
            Self::BestPractices => {
                "Evaluate best-practices: security hygiene, input validation, module boundaries and idiomatic use of the language."
            }
            Self::Innovation => {
                "Evaluate innovation: modern language features, asynchronous patterns and creative problem solving."
            }
        }
    }

    /// Recognize the category a prompt is about.
    pub fn from_prompt(prompt: &str) -> Option<Self> {
        let lower = prompt.to_ascii_lowercase();
        if lower.contains("functionality") {
            Some(Self::Functionality)
        } else if lower.contains("best-practices") || lower.contains("best practices") {
            Some(Self::BestPractices)
        } else if lower.contains("innovation") {
            Some(Self::Innovation)
        } else if lower.contains("quality") {
            Some(Self::Quality)
        } else {
            None
        }
    }
}

impl fmt::Display for ScoreCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ScoreCategory {
    type Err = GraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "functionality" => Ok(Self::Functionality),
            "quality" => Ok(Self::Quality),
            "best-practices" => Ok(Self::BestPractices),
            "innovation" => Ok(Self::Innovation),
            other => Err(GraderError::Config {
                message: format!("unknown score category: {}", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_prompt_maps_back_to_its_category() {
        for category in ScoreCategory::ALL {
            assert_eq!(ScoreCategory::from_prompt(category.prompt()), Some(category));
        }
        assert_eq!(ScoreCategory::from_prompt("rate this"), None);
    }

    #[test]
    fn parse_category_names() {
        assert_eq!(
            "best_practices".parse::<ScoreCategory>().unwrap(),
            ScoreCategory::BestPractices
        );
        assert!("style".parse::<ScoreCategory>().is_err());
    }
}
