//! nginx log line parsing.
//!
//! - [`CompiledLogFormat`] / [`LogFormatCompiler`]: turn a `log_format`
//!   string into an anchored matcher with typed fields
//! - [`AccessLineParser`]: apply a compiled format to access log lines
//! - [`ErrorLineClassifier`]: map error log lines to counter names
//!
//! ```
//! use nginx_agent_log::{AccessLineParser, FieldValue, LogFormatCompiler};
//!
//! let mut compiler = LogFormatCompiler::new();
//! let format = compiler.compile("$remote_addr \"$request\" $status").unwrap();
//! let parsed = AccessLineParser::new(format).parse("10.0.0.1 \"GET / HTTP/1.1\" 200");
//! assert_eq!(parsed.get("request_method"), Some(&FieldValue::Str("GET".into())));
//! assert!(!parsed.malformed);
//! ```

pub mod access;
pub mod error;
pub mod errorlog;
pub mod format;
pub mod level;

pub use access::{AccessLineParser, FieldValue, ParsedLine};
pub use error::LogError;
pub use errorlog::ErrorLineClassifier;
pub use format::{COMBINED_FORMAT, CompiledLogFormat, FieldRule, LogFormatCompiler};
pub use level::ErrorLogLevel;
