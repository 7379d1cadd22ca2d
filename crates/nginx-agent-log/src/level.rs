use crate::error::LogError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// nginx error log severity, from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ErrorLogLevel {
    Debug,
    Info,
    Notice,
    Warn,
    /// nginx's default when `error_log` names no level.
    #[default]
    Error,
    Crit,
    Alert,
    Emerg,
}

impl ErrorLogLevel {
    pub const ALL: [ErrorLogLevel; 8] = [
        ErrorLogLevel::Debug,
        ErrorLogLevel::Info,
        ErrorLogLevel::Notice,
        ErrorLogLevel::Warn,
        ErrorLogLevel::Error,
        ErrorLogLevel::Crit,
        ErrorLogLevel::Alert,
        ErrorLogLevel::Emerg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorLogLevel::Debug => "debug",
            ErrorLogLevel::Info => "info",
            ErrorLogLevel::Notice => "notice",
            ErrorLogLevel::Warn => "warn",
            ErrorLogLevel::Error => "error",
            ErrorLogLevel::Crit => "crit",
            ErrorLogLevel::Alert => "alert",
            ErrorLogLevel::Emerg => "emerg",
        }
    }
}

impl FromStr for ErrorLogLevel {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorLogLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| LogError::UnknownLevel(s.to_string()))
    }
}

impl fmt::Display for ErrorLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_order() {
        assert_eq!("warn".parse::<ErrorLogLevel>().unwrap(), ErrorLogLevel::Warn);
        assert!("warning".parse::<ErrorLogLevel>().is_err());
        assert!(ErrorLogLevel::Debug < ErrorLogLevel::Warn);
        assert!(ErrorLogLevel::Emerg > ErrorLogLevel::Error);
        assert_eq!(ErrorLogLevel::default(), ErrorLogLevel::Error);
        assert_eq!(ErrorLogLevel::Crit.to_string(), "crit");
    }
}
