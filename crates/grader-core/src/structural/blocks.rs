//! Brace-depth scan for findings a single regex cannot see: function bodies
//! with inner blocks and conditionals nested through intervening statements.
//!
//! Strings, template literals and comments are skipped so braces inside them
//! do not open blocks. Unbalanced input is tolerated; the delimiter check
//! reports it separately.

use lazy_static::lazy_static;
use regex::Regex;

/// Function bodies longer than this many chars are flagged.
pub(crate) const MAX_FUNCTION_BODY: usize = 400;
/// Conditional nesting level at which a finding is reported.
pub(crate) const MAX_IF_DEPTH: usize = 3;

pub(crate) const LONG_FUNCTION_MESSAGE: &str =
    "Inline function body is too long; split it into smaller functions";
pub(crate) const NESTED_IF_MESSAGE: &str =
    "Deeply nested conditionals (3+ levels); consider early returns";

lazy_static! {
    /// `if (...)` header, optionally preceded by `else`.
    static ref IF_HEADER: Regex = Regex::new(r"(?s)\bif\s*\(.*\)\s*$").unwrap();
    /// `function name(...)`, `(...) =>` or `name(...)` method header.
    static ref FUNCTION_HEADER: Regex = Regex::new(
        r"(?s)(?:\bfunction\b[^{;]*\)(?:\s*:[^{;=]+)?|=>|^(?:(?:async|static|get|set|public|private|protected)\s+)*[A-Za-z_$][\w$]*\s*\([^;]*\)(?:\s*:[^{;=]+)?)\s*$"
    )
    .unwrap();
    static ref CONTROL_KEYWORD: Regex =
        Regex::new(r"^(?:if|for|while|switch|catch|with|else|do|return)\b").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    If,
    Function,
    Other,
}

#[derive(Debug)]
struct Frame {
    kind: BlockKind,
    /// Offset of the header keyword, used for the reported line.
    header: usize,
    /// Offset of the opening brace.
    open: usize,
    if_depth: usize,
}

/// A finding at a byte offset of the scanned content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlockFinding {
    pub(crate) offset: usize,
    pub(crate) message: &'static str,
}

fn classify(header: &str, header_start: usize) -> (BlockKind, usize) {
    if let Some(m) = IF_HEADER.find(header) {
        return (BlockKind::If, header_start + m.start());
    }
    let trimmed = header.trim_start();
    let lead = header.len() - trimmed.len();
    if !CONTROL_KEYWORD.is_match(trimmed) && FUNCTION_HEADER.is_match(trimmed) {
        return (BlockKind::Function, header_start + lead);
    }
    (BlockKind::Other, header_start + lead)
}

/// Skip past a quoted literal starting at `start`; returns the offset after it.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            b'\n' if quote != b'`' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Scan `content` and return findings ordered by offset.
pub(crate) fn scan(content: &str) -> Vec<BlockFinding> {
    let bytes = content.as_bytes();
    let mut stack: Vec<Frame> = Vec::new();
    let mut findings = Vec::new();
    let mut stmt_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' | b'`' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = content[i..].find('\n').map_or(bytes.len(), |n| i + n + 1);
                stmt_start = i;
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = content[i + 2..].find("*/").map_or(bytes.len(), |n| i + 2 + n + 2);
                stmt_start = i;
                continue;
            }
            b'{' => {
                let (kind, header) = classify(&content[stmt_start..i], stmt_start);
                let parent = stack.last().map_or(0, |f| f.if_depth);
                let if_depth = parent + usize::from(kind == BlockKind::If);
                if kind == BlockKind::If && if_depth == MAX_IF_DEPTH {
                    findings.push(BlockFinding {
                        offset: header,
                        message: NESTED_IF_MESSAGE,
                    });
                }
                stack.push(Frame {
                    kind,
                    header,
                    open: i,
                    if_depth,
                });
                stmt_start = i + 1;
            }
            b'}' => {
                if let Some(frame) = stack.pop() {
                    let body = content[frame.open + 1..i].chars().count();
                    if frame.kind == BlockKind::Function && body >= MAX_FUNCTION_BODY {
                        findings.push(BlockFinding {
                            offset: frame.header,
                            message: LONG_FUNCTION_MESSAGE,
                        });
                    }
                }
                stmt_start = i + 1;
            }
            b';' => stmt_start = i + 1,
            _ => {}
        }
        i += 1;
    }

    findings.sort_by_key(|f| f.offset);
    findings
}
