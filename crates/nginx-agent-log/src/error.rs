use thiserror::Error;

/// An error building a log matcher.
#[derive(Debug, Error)]
pub enum LogError {
    /// The matcher generated from a log format did not compile.
    #[error("Invalid log format '{format}': {source}")]
    InvalidFormat {
        format: String,
        #[source]
        source: regex::Error,
    },

    /// A built-in error-log pattern did not compile.
    #[error("Invalid error log pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: &'static str,
        #[source]
        source: regex::Error,
    },

    /// A level name that is not one of nginx's error log levels.
    #[error("Unknown error log level '{0}'")]
    UnknownLevel(String),
}
