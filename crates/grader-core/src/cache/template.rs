//! Heuristic template tier: canned results for recognizable code shapes.

use async_trait::async_trait;
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::{CacheLookup, CacheTier, TierKind};
use crate::error::GraderResult;
use crate::model::{CacheEntry, CodeSubmission, GradingResult, Layer1Result, Layer2Result, Rubric};
use crate::rubric::passing_threshold;
use crate::semantic::weighted_score;
use crate::structural::StructuralAnalyzer;

struct Template {
    name: &'static str,
    shape: &'static Regex,
    scores: [u32; 4],
    feedback: &'static str,
    suggestions: &'static [&'static str],
}

lazy_static! {
    /// Hook call on a line that does not start as a comment.
    static ref HOOKS: Regex =
        Regex::new(r"(?m)^[ \t]*(?:[^/\s*][^\n]*?)?\buse(?:State|Effect|Reducer)\s*\(").unwrap();
    /// Top-level `interface X {` or `type X =` declaration.
    static ref TYPE_DECL: Regex = Regex::new(
        r"(?m)^[ \t]*(?:export\s+)?(?:interface\s+\w+(?:<[^>\n]*>)?(?:\s+extends\s+[^{\n]+)?\s*\{|type\s+\w+(?:<[^>\n]*>)?\s*=)"
    )
    .unwrap();

    /// Ordered; the first matching shape wins.
    static ref TEMPLATES: Vec<Template> = vec![
        Template {
            name: "react-component-with-hooks",
            shape: &HOOKS,
            scores: [75, 70, 72, 65],
            feedback: "Matches a standard React component built on hooks. State handling follows the common pattern.",
            suggestions: &[
                "Extract repeated effect logic into a custom hook",
                "Add tests for state transitions",
            ],
        },
        Template {
            name: "typescript-basic-component",
            shape: &TYPE_DECL,
            scores: [70, 75, 78, 60],
            feedback: "Matches a basic typed TypeScript module. Type declarations are in place.",
            suggestions: &["Add error handling around external calls"],
        },
    ];
}

/// Read-only tier answering from [`TEMPLATES`].
///
/// Only the semantic scores are canned. The structural scan always runs, and
/// a submission that fails it is never answered here.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateTier {
    analyzer: StructuralAnalyzer,
}

impl TemplateTier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the first template whose shape appears in `code`.
    pub fn match_name(code: &str) -> Option<&'static str> {
        find(code).map(|t| t.name)
    }
}

fn find(code: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.shape.is_match(code))
}

fn canned_result(
    template: &Template,
    submission: &CodeSubmission,
    layer1: Layer1Result,
    rubric: &Rubric,
) -> GradingResult {
    let [f, q, bp, i] = template.scores;
    let weighted = weighted_score(f, q, bp, i, rubric);

    GradingResult {
        session_id: submission.session_id.clone(),
        milestone: submission.milestone,
        passed: layer1.passed && weighted >= passing_threshold(rubric),
        overall_score: weighted,
        layer1,
        layer2: Layer2Result {
            functionality_score: f,
            quality_score: q,
            best_practices_score: bp,
            innovation_score: i,
            weighted_score: weighted,
            feedback: template.feedback.to_string(),
            suggestions: template.suggestions.iter().map(|s| s.to_string()).collect(),
        },
        rubric: *rubric,
        timestamp: Utc::now(),
        cached: true,
    }
}

#[async_trait]
impl CacheTier for TemplateTier {
    fn kind(&self) -> TierKind {
        TierKind::Template
    }

    async fn get(&self, lookup: &CacheLookup<'_>) -> GraderResult<Option<CacheEntry>> {
        let code = lookup.submission.combined_code();
        let Some(template) = find(&code) else {
            return Ok(None);
        };

        let layer1 = self.analyzer.analyze(lookup.submission);
        if !layer1.passed {
            debug!(template = template.name, "template shape matched but layer 1 failed, skipping");
            return Ok(None);
        }

        debug!(template = template.name, "template match");
        Ok(Some(CacheEntry::new(canned_result(
            template,
            lookup.submission,
            layer1,
            lookup.rubric,
        ))))
    }

    async fn set(&self, _key: &str, _entry: &CacheEntry) -> GraderResult<()> {
        Ok(())
    }

    async fn del(&self, _key: &str) -> GraderResult<()> {
        Ok(())
    }

    async fn clear(&self) -> GraderResult<()> {
        Ok(())
    }
}
