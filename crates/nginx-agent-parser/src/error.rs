//! Error types for the configuration loader.
//!
//! Errors are split into two stages:
//!
//! - [`GrammarError`]: failures while turning one file's text into statements
//!   (unterminated strings, unbalanced braces, input no rule accepts).
//! - [`LoadError`]: per-file failures recorded by the loader. These are never
//!   returned from [`ConfigLoader::load`](crate::ConfigLoader::load); they are
//!   accumulated next to the merged tree so one bad file cannot abort the rest.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// An error that occurs while applying the grammar to a single file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    /// A quoted string was opened but never closed before end-of-file.
    #[error("Unterminated string starting at line {line}")]
    UnterminatedString { line: usize },

    /// A `{` was opened but never closed before end-of-file.
    #[error("Unclosed block starting at line {line}")]
    UnclosedBlock { line: usize },

    /// A `}` was found without a matching `{`.
    #[error("Unmatched closing brace at line {line}")]
    UnmatchedCloseBrace { line: usize },

    /// No statement rule accepted the input at this position.
    #[error("Unexpected input '{found}' at line {line}")]
    UnexpectedInput { found: String, line: usize },
}

impl GrammarError {
    /// Returns the 1-based source line where this error occurred.
    pub fn line(&self) -> usize {
        match self {
            GrammarError::UnterminatedString { line } => *line,
            GrammarError::UnclosedBlock { line } => *line,
            GrammarError::UnmatchedCloseBrace { line } => *line,
            GrammarError::UnexpectedInput { line, .. } => *line,
        }
    }

    /// Short name of the failure class, used in recorded load errors.
    pub fn class(&self) -> &'static str {
        match self {
            GrammarError::UnterminatedString { .. } => "UnterminatedString",
            GrammarError::UnclosedBlock { .. } => "UnclosedBlock",
            GrammarError::UnmatchedCloseBrace { .. } => "UnmatchedCloseBrace",
            GrammarError::UnexpectedInput { .. } => "UnexpectedInput",
        }
    }
}

/// A per-file failure recorded by the loader.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The file could not be stat'ed or read. The file is marked broken.
    #[error("failed to read {} due to: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },

    /// The file exceeds the size ceiling. It stays registered and is retried
    /// by the next loader.
    #[error("failed to read {} due to: too large, {size} bytes", .path.display())]
    TooLarge { path: PathBuf, size: u64 },

    /// The grammar rejected the file. Its statements are discarded.
    #[error("failed to parse {} due to {}", .path.display(), .source.class())]
    Syntax {
        path: PathBuf,
        #[source]
        source: GrammarError,
    },
}

impl LoadError {
    /// Returns the file this error is about.
    pub fn path(&self) -> &Path {
        match self {
            LoadError::Unreadable { path, .. } => path,
            LoadError::TooLarge { path, .. } => path,
            LoadError::Syntax { path, .. } => path,
        }
    }
}

/// Result type alias for grammar operations
pub type GrammarResult<T> = Result<T, GrammarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_messages() {
        let err = LoadError::TooLarge {
            path: PathBuf::from("/etc/nginx/big.conf"),
            size: 30_000_000,
        };
        assert_eq!(
            err.to_string(),
            "failed to read /etc/nginx/big.conf due to: too large, 30000000 bytes"
        );

        let err = LoadError::Syntax {
            path: PathBuf::from("/etc/nginx/bad.conf"),
            source: GrammarError::UnclosedBlock { line: 3 },
        };
        assert_eq!(
            err.to_string(),
            "failed to parse /etc/nginx/bad.conf due to UnclosedBlock"
        );
        assert_eq!(err.path(), Path::new("/etc/nginx/bad.conf"));
    }

    #[test]
    fn test_grammar_error_line() {
        let err = GrammarError::UnexpectedInput {
            found: "}".to_string(),
            line: 7,
        };
        assert_eq!(err.line(), 7);
        assert_eq!(err.class(), "UnexpectedInput");
    }
}
