//! Compiles `log_format` strings into line matchers.
//!
//! A format such as
//!
//! ```text
//! $remote_addr - $remote_user [$time_local] "$request" $status
//! ```
//!
//! becomes one anchored regular expression with a named group per variable
//! and a [`FieldRule`] per variable describing how its captured text is typed.

use crate::error::LogError;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

/// nginx's predefined `combined` format, used when an access log names none.
pub const COMBINED_FORMAT: &str = "$remote_addr - $remote_user [$time_local] \"$request\" \
                                   $status $body_bytes_sent \"$http_referer\" \"$http_user_agent\"";

/// How a captured value is converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Float,
    Str,
}

/// How many values a captured field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    Single,
    /// `*_time` fields: comma-separated floats, one per upstream try.
    TimeList,
    /// Split into a list of strings when the value contains a comma.
    CommaList,
}

/// Match fragment and type of the variables with known shapes.
const KNOWN_FIELDS: &[(&str, &str, FieldKind)] = &[
    ("request", ".+", FieldKind::Str),
    ("body_bytes_sent", r"\d+", FieldKind::Int),
    ("bytes_sent", r"\d+", FieldKind::Int),
    ("connection", r"[\d\s]+", FieldKind::Str),
    ("connection_requests", r"\d+", FieldKind::Int),
    ("msec", ".+", FieldKind::Float),
    ("pipe", r"[p|\.]", FieldKind::Str),
    ("request_length", r"\d+", FieldKind::Int),
    ("request_time", ".+", FieldKind::Str),
    ("status", r"\d+", FieldKind::Str),
    ("time_iso8601", ".+", FieldKind::Str),
    ("time_local", ".+", FieldKind::Str),
    ("upstream_response_time", ".+", FieldKind::Str),
    ("upstream_response_length", ".+", FieldKind::Int),
    ("upstream_connect_time", ".+", FieldKind::Str),
    ("upstream_header_time", ".+", FieldKind::Str),
    ("upstream_status", ".+", FieldKind::Str),
    ("upstream_cache_status", ".+", FieldKind::Str),
    ("gzip_ratio", ".+", FieldKind::Float),
];

const DEFAULT_FIELD: (&str, FieldKind) = (".+", FieldKind::Str);

const COMMA_SEPARATED_FIELDS: &[&str] = &["upstream_addr", "upstream_status"];

/// Maximum accepted value of a `*_time` field; larger values are dropped.
pub const MAX_TIME_VALUE: f64 = 10_000_000.0;

/// One variable occurrence in a format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    /// Variable name without `$` or braces.
    pub name: String,
    /// Capture group name. Equal to `name` for the first occurrence.
    pub group: String,
    /// 1-based occurrence of `name` within the format.
    pub occurrence: usize,
    pub kind: FieldKind,
    pub multiplicity: Multiplicity,
}

impl FieldRule {
    fn new(name: String, occurrence: usize) -> Self {
        let kind = KNOWN_FIELDS
            .iter()
            .find(|(known, _, _)| *known == name)
            .map(|(_, _, kind)| *kind)
            .unwrap_or(DEFAULT_FIELD.1);

        let multiplicity = if name.ends_with("_time") {
            Multiplicity::TimeList
        } else if COMMA_SEPARATED_FIELDS.contains(&name.as_str()) {
            Multiplicity::CommaList
        } else {
            Multiplicity::Single
        };

        let group = if occurrence > 1 {
            format!("{name}_occurrence_{occurrence}")
        } else {
            name.clone()
        };

        Self {
            name,
            group,
            occurrence,
            kind,
            multiplicity,
        }
    }

    fn fragment(&self) -> &'static str {
        KNOWN_FIELDS
            .iter()
            .find(|(known, _, _)| *known == self.name)
            .map(|(_, fragment, _)| *fragment)
            .unwrap_or(DEFAULT_FIELD.0)
    }
}

/// A log format compiled into a matcher. Immutable once built.
#[derive(Debug, Clone)]
pub struct CompiledLogFormat {
    raw: String,
    fields: Vec<FieldRule>,
    regex: Regex,
}

impl CompiledLogFormat {
    /// Compile a raw format string.
    ///
    /// # Example
    ///
    /// ```
    /// use nginx_agent_log::CompiledLogFormat;
    ///
    /// let format = CompiledLogFormat::compile("$status $status ${body_bytes_sent}").unwrap();
    /// assert_eq!(format.keys().collect::<Vec<_>>(), ["status", "status", "body_bytes_sent"]);
    /// ```
    pub fn compile(raw: &str) -> Result<Self, LogError> {
        let raw = raw.trim_end();
        let mut fields: Vec<FieldRule> = Vec::new();
        let mut pattern = String::from("^");
        let mut current: Option<String> = None;

        for ch in raw.chars() {
            if let Some(mut key) = current.take() {
                if ch.is_alphanumeric() || ch == '_' || (ch == '{' && key == "$") {
                    key.push(ch);
                    current = Some(key);
                    continue;
                }
                if ch == '}' && key.starts_with("${") {
                    key.push(ch);
                    push_field(key, &mut fields, &mut pattern);
                    continue;
                }
                push_field(key, &mut fields, &mut pattern);
            }

            if ch == '$' {
                current = Some(String::from('$'));
            } else {
                pattern.push_str(&regex::escape(ch.encode_utf8(&mut [0; 4])));
            }
        }
        if let Some(key) = current {
            push_field(key, &mut fields, &mut pattern);
        }

        let regex = Regex::new(&pattern).map_err(|source| LogError::InvalidFormat {
            format: raw.to_string(),
            source,
        })?;

        Ok(Self {
            raw: raw.to_string(),
            fields,
            regex,
        })
    }

    /// The format string this matcher was built from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Field names in format order, duplicates included.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    pub fn fields(&self) -> &[FieldRule] {
        &self.fields
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

/// Appends the capture group for a finished `$name` or `${name}` key.
fn push_field(key: String, fields: &mut Vec<FieldRule>, pattern: &mut String) {
    let name: String = key
        .chars()
        .filter(|c| !matches!(c, '$' | '{' | '}'))
        .collect();
    if name.is_empty() {
        // a lone `$` is literal text
        pattern.push_str(&regex::escape(&key));
        return;
    }
    let occurrence = fields.iter().filter(|f| f.name == name).count() + 1;
    let rule = FieldRule::new(name, occurrence);
    pattern.push_str(&format!("(?P<{}>{})", rule.group, rule.fragment()));
    fields.push(rule);
}

/// Compiles formats on demand and keeps one compiled instance per distinct
/// format string.
///
/// The cache belongs to the compiler instance; separate compilers never share
/// entries.
#[derive(Debug, Default)]
pub struct LogFormatCompiler {
    cache: HashMap<String, Arc<CompiledLogFormat>>,
}

impl LogFormatCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the compiled matcher for `raw`, building it on first use.
    pub fn compile(&mut self, raw: &str) -> Result<Arc<CompiledLogFormat>, LogError> {
        if let Some(compiled) = self.cache.get(raw) {
            return Ok(Arc::clone(compiled));
        }
        let compiled = Arc::new(CompiledLogFormat::compile(raw)?);
        self.cache.insert(raw.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
