//! Cache key derivation.

use crate::digest::sha256_hex_joined;
use crate::model::{CodeSubmission, Rubric};

/// Content-addressed, rubric-aware key for a grading result.
///
/// Format (before hashing):
///
/// ```text
/// <path>:<len>|<path>:<len>|...|<session_id>|<milestone>|<rubric json>
/// ```
///
/// Files are sorted by path. Only the content *length* takes part, so two
/// submissions whose files differ but have equal lengths share a key.
pub fn cache_key(submission: &CodeSubmission, rubric: &Rubric) -> String {
    let files: Vec<String> = submission
        .sorted_files()
        .iter()
        .map(|f| format!("{}:{}", f.path, f.content.len()))
        .collect();
    let milestone = submission.milestone.to_string();
    let rubric_json = serde_json::to_string(rubric).unwrap_or_else(|_| format!("{:?}", rubric));

    let parts = files
        .iter()
        .map(String::as_str)
        .chain([
            submission.session_id.as_str(),
            milestone.as_str(),
            rubric_json.as_str(),
        ]);
    sha256_hex_joined(parts, b"|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SubmissionFile;
    use crate::rubric::STRICT_RUBRIC;

    fn submission(files: &[(&str, &str)]) -> CodeSubmission {
        CodeSubmission {
            user_id: "u1".into(),
            session_id: "session-1".into(),
            milestone: 2,
            files: files
                .iter()
                .map(|(p, c)| SubmissionFile::new(*p, *c, "typescript"))
                .collect(),
        }
    }

    #[test]
    fn stable_and_order_independent() {
        let a = submission(&[("src/a.ts", "let x = 1;"), ("src/b.ts", "let y = 2;")]);
        let b = submission(&[("src/b.ts", "let y = 2;"), ("src/a.ts", "let x = 1;")]);
        let rubric = Rubric::default();

        let key = cache_key(&a, &rubric);
        assert_eq!(key.len(), 64);
        assert_eq!(key, cache_key(&a, &rubric));
        assert_eq!(key, cache_key(&b, &rubric));
    }

    #[test]
    fn inputs_that_change_the_key() {
        let base = submission(&[("src/a.ts", "let x = 1;")]);
        let rubric = Rubric::default();
        let key = cache_key(&base, &rubric);

        let longer = submission(&[("src/a.ts", "let x = 10;")]);
        assert_ne!(key, cache_key(&longer, &rubric));

        assert_ne!(key, cache_key(&base, &STRICT_RUBRIC));

        let mut other_session = base.clone();
        other_session.session_id = "session-2".into();
        assert_ne!(key, cache_key(&other_session, &rubric));

        let mut other_milestone = base.clone();
        other_milestone.milestone = 3;
        assert_ne!(key, cache_key(&other_milestone, &rubric));
    }

    #[test]
    fn same_length_content_collides() {
        let a = submission(&[("src/a.ts", "let x = 1;")]);
        let b = submission(&[("src/a.ts", "let y = 2;")]);
        assert_eq!(cache_key(&a, &Rubric::default()), cache_key(&b, &Rubric::default()));
    }

    #[test]
    fn user_id_does_not_take_part() {
        let a = submission(&[("src/a.ts", "x")]);
        let mut b = a.clone();
        b.user_id = "someone-else".into();
        assert_eq!(cache_key(&a, &Rubric::default()), cache_key(&b, &Rubric::default()));
    }
}
