//! Read-only guard for ad-hoc user queries.
//!
//! The downstream query layer may pass user-written graph queries through
//! the core. Before any such query reaches a backend it must pass this
//! blocklist of write keywords.

use thiserror::Error;

/// Keywords that mutate the graph or invoke procedures.
const WRITE_KEYWORDS: &[&str] = &[
    "CREATE", "MERGE", "DELETE", "DETACH", "SET", "REMOVE", "DROP", "CALL",
];

#[derive(Error, Debug, PartialEq, Eq)]
#[error("query rejected: write keyword '{keyword}' is not allowed in read-only queries")]
pub struct ReadOnlyViolation {
    pub keyword: &'static str,
}

/// Reject queries containing write keywords. Keywords are matched as whole
/// words, case-insensitively, outside of string literals.
pub fn ensure_read_only(query: &str) -> Result<(), ReadOnlyViolation> {
    for word in words_outside_strings(query) {
        let upper = word.to_ascii_uppercase();
        if let Some(keyword) = WRITE_KEYWORDS.iter().find(|k| **k == upper) {
            return Err(ReadOnlyViolation { keyword });
        }
    }
    Ok(())
}

/// Split a query into identifier-like words, skipping quoted literals.
fn words_outside_strings(query: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_string: Option<char> = None;

    for ch in query.chars() {
        match in_string {
            Some(quote) => {
                if ch == quote {
                    in_string = None;
                }
            }
            None => {
                if ch == '\'' || ch == '"' {
                    in_string = Some(ch);
                    flush(&mut current, &mut words);
                } else if ch.is_alphanumeric() || ch == '_' {
                    current.push(ch);
                } else {
                    flush(&mut current, &mut words);
                }
            }
        }
    }
    flush(&mut current, &mut words);
    words
}

fn flush(current: &mut String, words: &mut Vec<String>) {
    if !current.is_empty() {
        words.push(std::mem::take(current));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_reads_pass() {
        assert!(ensure_read_only("MATCH (f:Function) RETURN f.name").is_ok());
        assert!(
            ensure_read_only("MATCH (a)-[:CALLS]->(b) WHERE a.name = 'foo' RETURN b").is_ok()
        );
    }

    #[test]
    fn write_keywords_rejected_case_insensitively() {
        for query in [
            "CREATE (n:File {path: '/x'})",
            "match (n) delete n",
            "MATCH (n) SET n.x = 1",
            "merge (n:Module {name: 'os'})",
            "MATCH (n) REMOVE n.x",
            "DROP CONSTRAINT file_path",
            "CALL db.labels()",
            "MATCH (n) DETACH DELETE n",
        ] {
            assert!(ensure_read_only(query).is_err(), "should reject: {query}");
        }
    }

    #[test]
    fn keywords_inside_string_literals_are_fine() {
        assert!(
            ensure_read_only("MATCH (f) WHERE f.name = 'delete_user' RETURN f").is_ok()
        );
        assert!(
            ensure_read_only("MATCH (f) WHERE f.doc = \"we MERGE things\" RETURN f").is_ok()
        );
    }

    #[test]
    fn keyword_substrings_are_not_keywords() {
        // `created_at` contains CREATE but is a property name.
        assert!(ensure_read_only("MATCH (j) RETURN j.created_at").is_ok());
        assert!(ensure_read_only("MATCH (s:Selector) RETURN s.offset").is_ok());
    }
}
