//! Layer 1 pattern table.
//!
//! Each rule is a regex plus the message reported for every match. Block
//! nesting and function length are measured in [`blocks`](super::blocks).
//! Rules are
//! grouped by the list they feed in [`Layer1Result`](crate::model::Layer1Result):
//! security violations fail the submission, syntax errors fail the submission,
//! structural issues are advisory.

use lazy_static::lazy_static;
use regex::Regex;

/// Which finding list a rule feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Category {
    Security,
    Structural,
    Syntax,
}

pub(crate) struct PatternRule {
    pub(crate) category: Category,
    pub(crate) pattern: &'static Regex,
    pub(crate) message: &'static str,
}

lazy_static! {
    static ref EVAL_CALL: Regex = Regex::new(r"\beval\s*\(").unwrap();
    static ref INNER_HTML: Regex = Regex::new(r"\.(?:inner|outer)HTML\s*=[^=]").unwrap();
    static ref DANGEROUS_HTML: Regex = Regex::new(r"\bdangerouslySetInnerHTML\b").unwrap();
    /// Sensitive-looking key written to browser storage.
    static ref STORAGE_SECRET: Regex = Regex::new(
        r#"(?i)\b(?:local|session)Storage\.setItem\(\s*['"`][^'"`]*(?:token|secret|password|passwd|private|api[_-]?key|key)"#
    )
    .unwrap();
    static ref MATH_RANDOM: Regex = Regex::new(r"\bMath\.random\s*\(\s*\)").unwrap();

    static ref CONSOLE_DEBUG: Regex = Regex::new(r"\bconsole\.(?:log|debug)\s*\(").unwrap();
    static ref ANY_TYPE: Regex = Regex::new(r":\s*any\b").unwrap();
    static ref TS_DIRECTIVE: Regex = Regex::new(r"@ts-(?:ignore|nocheck)\b").unwrap();

    static ref WORK_MARKER: Regex = Regex::new(r"\b(?:TODO|FIXME)\b").unwrap();
    static ref WILDCARD_IMPORT: Regex = Regex::new(r"\bimport\s+\*\s+as\s+\w+").unwrap();

    pub(crate) static ref RULES: Vec<PatternRule> = vec![
        PatternRule {
            category: Category::Security,
            pattern: &EVAL_CALL,
            message: "Use of eval() allows arbitrary code execution",
        },
        PatternRule {
            category: Category::Security,
            pattern: &INNER_HTML,
            message: "Unsanitized HTML assigned to innerHTML (XSS risk)",
        },
        PatternRule {
            category: Category::Security,
            pattern: &DANGEROUS_HTML,
            message: "dangerouslySetInnerHTML bypasses HTML escaping (XSS risk)",
        },
        PatternRule {
            category: Category::Security,
            pattern: &STORAGE_SECRET,
            message: "Sensitive value written to browser storage",
        },
        PatternRule {
            category: Category::Security,
            pattern: &MATH_RANDOM,
            message: "Math.random() is not cryptographically secure; use crypto.getRandomValues()",
        },
        PatternRule {
            category: Category::Structural,
            pattern: &CONSOLE_DEBUG,
            message: "Debug console statement left in code",
        },
        PatternRule {
            category: Category::Structural,
            pattern: &ANY_TYPE,
            message: "Use of 'any' type disables type checking",
        },
        PatternRule {
            category: Category::Structural,
            pattern: &TS_DIRECTIVE,
            message: "Type checking suppressed with @ts-ignore/@ts-nocheck",
        },
        PatternRule {
            category: Category::Syntax,
            pattern: &WORK_MARKER,
            message: "Unfinished work marker (TODO/FIXME)",
        },
        PatternRule {
            category: Category::Syntax,
            pattern: &WILDCARD_IMPORT,
            message: "Wildcard import; import the names you use",
        },
    ];
}

/// 1-based line of `offset` in `content`.
pub(crate) fn line_of(content: &str, offset: usize) -> usize {
    content.as_bytes()[..offset]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

/// Delimiter pairs checked for balance, with the name used in messages.
pub(crate) const DELIMITERS: [(char, char, &str); 3] = [
    ('{', '}', "braces"),
    ('(', ')', "parentheses"),
    ('[', ']', "brackets"),
];
