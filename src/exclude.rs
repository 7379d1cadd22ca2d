use glob::Pattern;
use std::path::Path;
use tracing::debug;

/// One `exclude_logs` rule.
///
/// A rule matches a path when it globs the whole path, globs the file name,
/// or ends with `/` and is a prefix of the path.
#[derive(Debug, Clone)]
pub struct ExcludeRule {
    raw: String,
    pattern: Option<Pattern>,
}

impl ExcludeRule {
    pub fn new(raw: &str) -> Self {
        let pattern = match Pattern::new(raw) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                debug!(rule = raw, error = %e, "exclude rule is not a valid glob");
                None
            }
        };
        Self {
            raw: raw.to_string(),
            pattern,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        if self.raw.ends_with('/') && path.starts_with(&self.raw) {
            return true;
        }
        let Some(pattern) = &self.pattern else {
            return path == self.raw;
        };
        if pattern.matches(path) {
            return true;
        }
        Path::new(path)
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| pattern.matches(name))
    }
}

/// Parses every non-empty rule.
pub fn parse_rules<S: AsRef<str>>(rules: &[S]) -> Vec<ExcludeRule> {
    rules
        .iter()
        .map(|rule| rule.as_ref().trim())
        .filter(|rule| !rule.is_empty())
        .map(ExcludeRule::new)
        .collect()
}

/// Whether any rule matches `path`.
pub fn is_excluded(rules: &[ExcludeRule], path: &str) -> bool {
    rules.iter().any(|rule| rule.matches(path))
}
