//! Layer 1: structural and security scan.
//!
//! Regex rules plus a brace-depth scan, no parsing. A submission passes Layer 1 iff it has no
//! syntax errors and no security violations; structural issues are reported
//! but do not fail it.

mod blocks;
mod patterns;

use tracing::debug;

use crate::digest::{sha256_hex, sha256_hex_joined};
use crate::model::{CodeSubmission, Layer1Result, SubmissionFile};

use patterns::{line_of, Category, DELIMITERS, RULES};

/// Files above this size are reported as analysis failures instead of scanned.
pub const MAX_ANALYZED_BYTES: usize = 1024 * 1024;

const RECOGNIZED_LANGUAGES: [&str; 6] = ["javascript", "typescript", "js", "ts", "jsx", "tsx"];

/// Why a single file could not be scanned.
#[derive(Debug, thiserror::Error)]
enum FileScanError {
    #[error("file is {0} bytes, limit is {1}")]
    TooLarge(usize, usize),

    #[error("file contains binary content")]
    Binary,
}

#[derive(Debug, Default)]
struct FileFindings {
    syntax_errors: Vec<String>,
    structural_issues: Vec<String>,
    security_violations: Vec<String>,
}

/// Layer 1 analyzer.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralAnalyzer;

impl StructuralAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Scan every recognized file. Never fails: a file that cannot be scanned
    /// becomes a syntax error scoped to its path.
    pub fn analyze(&self, submission: &CodeSubmission) -> Layer1Result {
        let mut syntax_errors = Vec::new();
        let mut structural_issues = Vec::new();
        let mut security_violations = Vec::new();

        for file in &submission.files {
            if !is_recognized(file) {
                debug!(path = %file.path, language = %file.language, "skipping unrecognized file");
                continue;
            }
            match scan_file(file) {
                Ok(findings) => {
                    syntax_errors.extend(findings.syntax_errors);
                    structural_issues.extend(findings.structural_issues);
                    security_violations.extend(findings.security_violations);
                }
                Err(e) => syntax_errors.push(format!("{}: analysis failed - {}", file.path, e)),
            }
        }

        let total_lines = submission.files.iter().map(|f| f.content.lines().count()).sum();
        let passed = syntax_errors.is_empty() && security_violations.is_empty();

        debug!(
            session_id = %submission.session_id,
            milestone = submission.milestone,
            passed,
            syntax = syntax_errors.len(),
            structural = structural_issues.len(),
            security = security_violations.len(),
            "layer 1 complete"
        );

        Layer1Result {
            passed,
            syntax_errors,
            structural_issues,
            security_violations,
            file_count: submission.files.len(),
            total_lines,
            fingerprint: fingerprint(submission),
        }
    }
}

/// Content fingerprint: SHA-256 over `path:length:checksum` of path-sorted files.
pub fn fingerprint(submission: &CodeSubmission) -> String {
    let parts: Vec<String> = submission
        .sorted_files()
        .into_iter()
        .map(|f| {
            format!(
                "{}:{}:{}",
                f.path,
                f.content.len(),
                sha256_hex(f.content.as_bytes())
            )
        })
        .collect();
    sha256_hex_joined(parts.iter().map(String::as_str), b"|")
}

fn is_recognized(file: &SubmissionFile) -> bool {
    let language = if file.language.trim().is_empty() {
        file.path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
    } else {
        file.language.trim()
    };
    RECOGNIZED_LANGUAGES
        .iter()
        .any(|l| l.eq_ignore_ascii_case(language))
}

fn scan_file(file: &SubmissionFile) -> Result<FileFindings, FileScanError> {
    let content = file.content.as_str();
    if content.len() > MAX_ANALYZED_BYTES {
        return Err(FileScanError::TooLarge(content.len(), MAX_ANALYZED_BYTES));
    }
    if content.contains('\0') {
        return Err(FileScanError::Binary);
    }

    let mut findings = FileFindings::default();
    for rule in RULES.iter() {
        let target = match rule.category {
            Category::Security => &mut findings.security_violations,
            Category::Structural => &mut findings.structural_issues,
            Category::Syntax => &mut findings.syntax_errors,
        };
        for m in rule.pattern.find_iter(content) {
            target.push(format!(
                "{}:{} - {}",
                file.path,
                line_of(content, m.start()),
                rule.message
            ));
        }
    }

    for finding in blocks::scan(content) {
        findings.structural_issues.push(format!(
            "{}:{} - {}",
            file.path,
            line_of(content, finding.offset),
            finding.message
        ));
    }

    for (open, close, name) in DELIMITERS {
        let opening = content.chars().filter(|&c| c == open).count();
        let closing = content.chars().filter(|&c| c == close).count();
        if opening != closing {
            findings.syntax_errors.push(format!(
                "{}: Unmatched {} ({} opening, {} closing)",
                file.path, name, opening, closing
            ));
        }
    }

    Ok(findings)
}
