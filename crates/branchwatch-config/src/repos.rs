//! Repo list parsing.
//!
//! One repository per line: `<name> <url> <command...>`. The command is the rest
//! of the line and may contain spaces. Blank lines and `#` comments are skipped.

use crate::{ConfigError, ConfigResult};
use branchwatch_core::RepoEntry;
use std::path::Path;
use tracing::warn;

/// A repo list line that could not be parsed. The line is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoEntryParseError {
    /// 1-based line number.
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for RepoEntryParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Parsed repo list: good entries plus diagnostics for skipped lines.
#[derive(Debug, Clone, Default)]
pub struct RepoList {
    pub entries: Vec<RepoEntry>,
    pub errors: Vec<RepoEntryParseError>,
}

/// Parse repo list text. Never fails; bad lines end up in `errors`.
pub fn parse_repo_list(text: &str) -> RepoList {
    parse_repo_list_bytes(text.as_bytes())
}

/// Parse raw repo list bytes. A line that is not valid UTF-8 is reported like
/// any other bad line.
pub fn parse_repo_list_bytes(bytes: &[u8]) -> RepoList {
    let mut list = RepoList::default();

    for (idx, raw) in bytes.split(|b| *b == b'\n').enumerate() {
        let parsed = match std::str::from_utf8(raw) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                parse_line(line)
            }
            Err(_) => Err("line is not valid UTF-8".to_string()),
        };

        match parsed {
            Ok(entry) => list.entries.push(entry),
            Err(message) => {
                let error = RepoEntryParseError {
                    line: idx + 1,
                    message,
                };
                warn!(line = error.line, error = %error.message, "Skipping repo list line");
                list.errors.push(error);
            }
        }
    }

    list
}

fn parse_line(line: &str) -> Result<RepoEntry, String> {
    let (name, rest) = split_field(line);
    let (url, command) = split_field(rest);

    if url.is_empty() || command.is_empty() {
        return Err(format!(
            "expected `<name> <url> <command>`, got `{}`",
            line
        ));
    }

    Ok(RepoEntry::new(name, url, command))
}

fn split_field(s: &str) -> (&str, &str) {
    match s.split_once(char::is_whitespace) {
        Some((field, rest)) => (field, rest.trim_start()),
        None => (s, ""),
    }
}

/// Read and parse a repo list file.
pub fn load_repo_list(path: &Path) -> ConfigResult<RepoList> {
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_repo_list_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repo_list() {
        let text = r#"
            # project   url                               command
            demo        https://example/repo.git          make
            tools       git@example.com:org/tools.git     cargo test --workspace
        "#;

        let list = parse_repo_list(text);
        assert!(list.errors.is_empty());
        assert_eq!(list.entries.len(), 2);
        assert_eq!(
            list.entries[0],
            RepoEntry::new("demo", "https://example/repo.git", "make")
        );
        assert_eq!(list.entries[1].name, "tools");
        assert_eq!(list.entries[1].url, "git@example.com:org/tools.git");
        assert_eq!(list.entries[1].command, "cargo test --workspace");
    }

    #[test]
    fn test_bad_lines_reported_with_line_number() {
        let text = "demo https://example/repo.git make\nbroken https://example/x.git\n\nlonely\nok https://example/ok.git ./build.sh\n";

        let list = parse_repo_list(text);
        assert_eq!(list.entries.len(), 2);
        assert_eq!(list.entries[1].name, "ok");

        let lines: Vec<usize> = list.errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![2, 4]);
        assert!(list.errors[0].to_string().starts_with("line 2:"));
    }

    #[test]
    fn test_tabs_and_extra_spacing() {
        let list = parse_repo_list("demo\t\thttps://example/repo.git\t make  all \n");
        assert_eq!(list.entries.len(), 1);
        assert_eq!(list.entries[0].command, "make  all");
    }

    #[test]
    fn test_load_skips_line_with_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repos.list");
        let mut bytes = b"demo https://example/repo.git make\n".to_vec();
        bytes.extend_from_slice(b"caf\xe9 https://example/cafe.git make\n");
        bytes.extend_from_slice(b"ok https://example/ok.git ./build.sh\n");
        std::fs::write(&path, bytes).unwrap();

        let list = load_repo_list(&path).unwrap();
        let names: Vec<&str> = list.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["demo", "ok"]);
        assert_eq!(list.errors.len(), 1);
        assert_eq!(list.errors[0].line, 2);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_repo_list(&dir.path().join("nope.list")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
