use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

use super::{ScoreCategory, ScoreOutcome, ScoringBackend};
use crate::error::GraderResult;

const BASE_SCORE: i64 = 55;
const EMPHASIS_BONUS: i64 = 4;
const MAX_COMPLEXITY_PENALTY: i64 = 15;
const COMPLEXITY_ALLOWANCE: i64 = 10;
const MAX_LENGTH_BONUS: i64 = 8;

lazy_static! {
    static ref COMMENTS: Regex = Regex::new(r"//|/\*").unwrap();
    static ref ERROR_HANDLING: Regex =
        Regex::new(r"\btry\s*\{|\bcatch\s*\(|\.catch\s*\(|\bthrow\b").unwrap();
    static ref TYPE_ANNOTATIONS: Regex = Regex::new(
        r"[\w)]\s*:\s*(?:string|number|boolean|void|unknown|[A-Z]\w*)\b|\binterface\s+\w+|\btype\s+\w+\s*="
    )
    .unwrap();
    static ref TESTS: Regex = Regex::new(r"\b(?:describe|it|test)\s*\(|\bexpect\s*\(").unwrap();
    static ref MODERN: Regex =
        Regex::new(r"=>|\bconst\b|\blet\b|\.\.\.|\?\.|\?\?").unwrap();
    static ref ASYNC: Regex = Regex::new(r"\basync\b|\bawait\b|\bPromise\b").unwrap();
    static ref SECURITY_HYGIENE: Regex = Regex::new(
        r"(?i)\b(?:sanitize\w*|escape\w*|validate\w*|encodeURIComponent|crypto)\b"
    )
    .unwrap();
    static ref MODULES: Regex = Regex::new(r"\b(?:import|export)\b").unwrap();
    static ref CONDITIONALS: Regex = Regex::new(r"\b(?:if|switch|case)\b").unwrap();
    static ref LOOPS: Regex = Regex::new(r"\b(?:for|while|do)\b").unwrap();
    static ref FUNCTIONS: Regex = Regex::new(r"\bfunction\b|=>").unwrap();
}

/// Characteristics extracted from code text.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CodeTraits {
    comments: bool,
    error_handling: bool,
    type_annotations: bool,
    tests: bool,
    modern: bool,
    asynchronous: bool,
    security_hygiene: bool,
    modules: bool,
    complexity: i64,
    lines: i64,
}

impl CodeTraits {
    fn extract(code: &str) -> Self {
        let mut depth = 0_i64;
        let mut max_depth = 0_i64;
        for c in code.chars() {
            match c {
                '{' => {
                    depth += 1;
                    max_depth = max_depth.max(depth);
                }
                '}' => depth = (depth - 1).max(0),
                _ => {}
            }
        }
        let complexity = CONDITIONALS.find_iter(code).count() as i64
            + 2 * LOOPS.find_iter(code).count() as i64
            + FUNCTIONS.find_iter(code).count() as i64
            + max_depth;

        Self {
            comments: COMMENTS.is_match(code),
            error_handling: ERROR_HANDLING.is_match(code),
            type_annotations: TYPE_ANNOTATIONS.is_match(code),
            tests: TESTS.is_match(code),
            modern: MODERN.is_match(code),
            asynchronous: ASYNC.is_match(code),
            security_hygiene: SECURITY_HYGIENE.is_match(code),
            modules: MODULES.is_match(code),
            complexity,
            lines: code.lines().filter(|l| !l.trim().is_empty()).count() as i64,
        }
    }

    fn complexity_penalty(&self) -> i64 {
        (self.complexity - COMPLEXITY_ALLOWANCE).clamp(0, MAX_COMPLEXITY_PENALTY)
    }

    fn length_bonus(&self) -> i64 {
        (self.lines / 10).min(MAX_LENGTH_BONUS)
    }
}

/// One scored characteristic: bonus, praise when present, advice when absent.
struct Signal {
    present: bool,
    bonus: i64,
    strength: &'static str,
    weakness: &'static str,
    suggestion: &'static str,
}

/// Deterministic, offline scoring backend.
///
/// Scores come from fixed bonuses for recognizable traits of the code plus a
/// bounded seed-derived jitter, so the same `(code, prompt, seed)` always
/// yields the same outcome while different seeds spread the score.
#[derive(Debug, Clone, Default)]
pub struct ReferenceBackend {
    simulate_latency: bool,
}

impl ReferenceBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep `seed % 500 + 100` ms per call to mimic a remote backend.
    pub fn with_simulated_latency(mut self, enabled: bool) -> Self {
        self.simulate_latency = enabled;
        self
    }

    /// Synchronous scoring; used by [`ScoringBackend::analyze`] and as the
    /// degraded fallback when another backend fails.
    pub fn score(&self, code: &str, category_prompt: &str, seed: u64) -> ScoreOutcome {
        let traits = CodeTraits::extract(code);
        let category = ScoreCategory::from_prompt(category_prompt);
        let signals = signals(&traits);

        let mut score = BASE_SCORE;
        for signal in signals.iter().filter(|s| s.present) {
            score += signal.bonus;
        }
        if let Some(category) = category {
            score += emphasized(category, &signals)
                .filter(|s| s.present)
                .count() as i64
                * EMPHASIS_BONUS;
        }
        score -= traits.complexity_penalty();
        score += traits.length_bonus();
        score += (seed % 15) as i64 - 7;
        let score = score.clamp(0, 100) as u32;

        let strengths: Vec<&str> = signals
            .iter()
            .filter(|s| s.present)
            .map(|s| s.strength)
            .collect();
        let mut weaknesses: Vec<&str> = signals
            .iter()
            .filter(|s| !s.present)
            .map(|s| s.weakness)
            .collect();
        if traits.complexity_penalty() > 0 {
            weaknesses.push("high control-flow complexity");
        }

        let label = category.map(ScoreCategory::label).unwrap_or("Overall");
        let mut feedback = format!("{} ({}/100):", label, score);
        if !strengths.is_empty() {
            feedback.push_str(&format!(" Strengths: {}.", strengths.join(", ")));
        }
        if !weaknesses.is_empty() {
            feedback.push_str(&format!(" Needs work: {}.", weaknesses.join(", ")));
        }

        let mut suggestions: Vec<String> = match category {
            Some(category) => emphasized(category, &signals)
                .filter(|s| !s.present)
                .map(|s| s.suggestion.to_string())
                .collect(),
            None => signals
                .iter()
                .filter(|s| !s.present)
                .map(|s| s.suggestion.to_string())
                .collect(),
        };
        if traits.complexity_penalty() > 0
            && matches!(category, None | Some(ScoreCategory::Quality))
        {
            suggestions.push(
                "Reduce complexity by extracting helpers and flattening nested branches"
                    .to_string(),
            );
        }

        ScoreOutcome {
            score,
            feedback,
            suggestions,
        }
    }
}

#[async_trait]
impl ScoringBackend for ReferenceBackend {
    async fn analyze(
        &self,
        code: &str,
        category_prompt: &str,
        seed: u64,
    ) -> GraderResult<ScoreOutcome> {
        if self.simulate_latency {
            tokio::time::sleep(Duration::from_millis(seed % 500 + 100)).await;
        }
        Ok(self.score(code, category_prompt, seed))
    }

    fn name(&self) -> &'static str {
        "reference"
    }
}

fn signals(t: &CodeTraits) -> [Signal; 8] {
    [
        Signal {
            present: t.error_handling,
            bonus: 8,
            strength: "handles errors",
            weakness: "no error handling",
            suggestion: "Wrap fallible operations in try/catch and surface useful error messages",
        },
        Signal {
            present: t.tests,
            bonus: 7,
            strength: "includes tests",
            weakness: "no tests",
            suggestion: "Add unit tests that cover the main behaviour and edge cases",
        },
        Signal {
            present: t.comments,
            bonus: 5,
            strength: "documented with comments",
            weakness: "no comments",
            suggestion: "Add comments explaining non-obvious logic",
        },
        Signal {
            present: t.type_annotations,
            bonus: 6,
            strength: "uses type annotations",
            weakness: "missing type annotations",
            suggestion: "Add explicit types to function parameters and return values",
        },
        Signal {
            present: t.security_hygiene,
            bonus: 5,
            strength: "validates or sanitizes input",
            weakness: "no input validation",
            suggestion: "Validate and sanitize external input before using it",
        },
        Signal {
            present: t.modules,
            bonus: 3,
            strength: "organized into modules",
            weakness: "no module structure",
            suggestion: "Split code into modules with explicit imports and exports",
        },
        Signal {
            present: t.modern,
            bonus: 4,
            strength: "uses modern syntax",
            weakness: "dated syntax",
            suggestion: "Prefer const/let, arrow functions and optional chaining",
        },
        Signal {
            present: t.asynchronous,
            bonus: 0,
            strength: "uses async patterns",
            weakness: "no asynchronous patterns",
            suggestion: "Use async/await for I/O instead of blocking or nested callbacks",
        },
    ]
}

/// Signals a category weighs twice, by index into [`signals`].
fn emphasized(
    category: ScoreCategory,
    signals: &[Signal; 8],
) -> impl Iterator<Item = &Signal> + '_ {
    let picks: [usize; 2] = match category {
        ScoreCategory::Functionality => [0, 1],
        ScoreCategory::Quality => [2, 3],
        ScoreCategory::BestPractices => [4, 5],
        ScoreCategory::Innovation => [6, 7],
    };
    picks.into_iter().map(move |i| &signals[i])
}
