//! `KEY=VALUE` line parsing

use super::EnvParseError;
use std::fmt;

/// One raw key/value pair in input order
#[derive(Clone, PartialEq, Eq)]
pub struct RawPair {
    pub key: String,
    pub value: String,
}

impl fmt::Debug for RawPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawPair")
            .field("key", &self.key)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Parses `.env`-style text
///
/// Blank lines and `#` comments are skipped, an optional `export ` prefix is dropped, the
/// line is split on its first `=`, and one layer of matching quotes around the value is
/// removed. Entries with an empty value are skipped. When a key repeats, the last value
/// wins but the key keeps its first position.
pub fn parse_env_lines(text: &str) -> Result<Vec<RawPair>, EnvParseError> {
    let mut pairs: Vec<RawPair> = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);

        let (key, value) = line.split_once('=').ok_or_else(|| EnvParseError {
            line: idx + 1,
            content: line.to_string(),
        })?;
        let key = key.trim();
        if key.is_empty() || key.chars().any(char::is_whitespace) {
            return Err(EnvParseError {
                line: idx + 1,
                content: line.to_string(),
            });
        }

        let value = unquote(value.trim());
        if value.is_empty() {
            continue;
        }

        match pairs.iter_mut().find(|p| p.key == key) {
            Some(existing) => existing.value = value.to_string(),
            None => pairs.push(RawPair {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }

    Ok(pairs)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys_values(text: &str) -> Vec<(String, String)> {
        parse_env_lines(text)
            .unwrap()
            .into_iter()
            .map(|p| (p.key, p.value))
            .collect()
    }

    #[test]
    fn test_skips_comments_and_blanks() {
        let pairs = keys_values("# comment\n\nDEBUG=false\n   # indented comment\nTIMEOUT=30\n");
        assert_eq!(
            pairs,
            vec![
                ("DEBUG".to_string(), "false".to_string()),
                ("TIMEOUT".to_string(), "30".to_string())
            ]
        );
    }

    #[test]
    fn test_splits_on_first_equals_and_unquotes() {
        let pairs = keys_values("URL=\"postgres://u:p@h/db?sslmode=require\"\nNAME='it''s'\n");
        assert_eq!(pairs[0].1, "postgres://u:p@h/db?sslmode=require");
        assert_eq!(pairs[1].1, "it''s");
    }

    #[test]
    fn test_export_prefix_and_repeats() {
        let pairs = keys_values("export A=1\nB=2\nA=3\n");
        assert_eq!(
            pairs,
            vec![
                ("A".to_string(), "3".to_string()),
                ("B".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn test_empty_value_is_skipped() {
        assert!(keys_values("EMPTY=\nQUOTED=\"\"\n").is_empty());
    }

    #[test]
    fn test_line_without_equals_fails() {
        let err = parse_env_lines("GOOD=1\nthis is not valid\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.content, "this is not valid");
    }
}
