use crate::error::LogError;
use crate::level::ErrorLogLevel;
use regex::Regex;

pub const REQUEST_BUFFERED: &str = "nginx.http.request.buffered";
pub const UPSTREAM_RESPONSE_BUFFERED: &str = "nginx.upstream.response.buffered";
pub const UPSTREAM_RESPONSE_FAILED: &str = "nginx.upstream.response.failed";
pub const UPSTREAM_REQUEST_FAILED: &str = "nginx.upstream.request.failed";

/// Message pattern, counter name and the severity nginx logs it at.
const RULES: &[(&str, &str, ErrorLogLevel)] = &[
    (
        "a client request body is buffered to a temporary file",
        REQUEST_BUFFERED,
        ErrorLogLevel::Warn,
    ),
    (
        "an upstream response is buffered to a temporary file",
        UPSTREAM_RESPONSE_BUFFERED,
        ErrorLogLevel::Warn,
    ),
    (
        "upstream prematurely closed connection\
         |upstream sent (?:invalid|too big) header\
         |while reading (?:response header from )?upstream",
        UPSTREAM_RESPONSE_FAILED,
        ErrorLogLevel::Error,
    ),
    (
        "while (?:connecting to|sending request to|SSL handshaking to) upstream\
         |no live upstreams",
        UPSTREAM_REQUEST_FAILED,
        ErrorLogLevel::Error,
    ),
];

/// Maps error log lines to counter names.
///
/// Only rules whose severity is at or above the configured level are active;
/// a log written at `error` never contains the `warn` buffering messages.
#[derive(Debug, Clone)]
pub struct ErrorLineClassifier {
    level: ErrorLogLevel,
    rules: Vec<(Regex, &'static str)>,
}

impl ErrorLineClassifier {
    pub fn new(level: ErrorLogLevel) -> Result<Self, LogError> {
        let rules = RULES
            .iter()
            .filter(|(_, _, severity)| *severity >= level)
            .map(|(pattern, metric, _)| {
                Regex::new(pattern)
                    .map(|regex| (regex, *metric))
                    .map_err(|source| LogError::InvalidPattern {
                        pattern: *pattern,
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { level, rules })
    }

    pub fn level(&self) -> ErrorLogLevel {
        self.level
    }

    /// Counter names this classifier can produce.
    pub fn metrics(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|(_, metric)| *metric)
    }

    /// The counter for `line`, or `None` if no active rule matches.
    pub fn classify(&self, line: &str) -> Option<&'static str> {
        self.rules
            .iter()
            .find(|(regex, _)| regex.is_match(line))
            .map(|(_, metric)| *metric)
    }
}
