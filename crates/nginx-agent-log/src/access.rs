use crate::format::{CompiledLogFormat, FieldKind, MAX_TIME_VALUE, Multiplicity};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Float(f64),
    FloatList(Vec<f64>),
    StrList(Vec<String>),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(value) => Some(value),
            _ => None,
        }
    }
}

/// Result of parsing one access log line.
///
/// An empty field mapping means the line did not match the format at all;
/// `malformed` is only set for a matched line whose `request` field does not
/// split into method, URI and protocol.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedLine {
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
    pub malformed: bool,
}

impl ParsedLine {
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Whether the line matched the format.
    pub fn is_match(&self) -> bool {
        !self.fields.is_empty()
    }
}

/// Applies a compiled log format to access log lines.
///
/// Cheap to clone; clones share the compiled matcher.
#[derive(Debug, Clone)]
pub struct AccessLineParser {
    format: Arc<CompiledLogFormat>,
}

impl AccessLineParser {
    pub fn new(format: Arc<CompiledLogFormat>) -> Self {
        Self { format }
    }

    pub fn format(&self) -> &CompiledLogFormat {
        &self.format
    }

    /// Parse one line. Never fails; see [`ParsedLine`].
    pub fn parse(&self, line: &str) -> ParsedLine {
        let mut parsed = ParsedLine::default();

        let Some(captures) = self.format.regex().captures(line) else {
            debug!(line, pattern = self.format.regex().as_str(), "line does not match log format");
            return parsed;
        };

        // the first occurrence of a repeated variable wins
        for field in self.format.fields().iter().filter(|f| f.occurrence == 1) {
            let Some(raw) = captures.name(&field.group).map(|m| m.as_str()) else {
                continue;
            };

            let value = match field.multiplicity {
                Multiplicity::TimeList => match time_list(raw) {
                    Some(times) => FieldValue::FloatList(times),
                    None => continue,
                },
                Multiplicity::CommaList if raw.contains(',') => FieldValue::StrList(
                    raw.replace(' ', "").split(',').map(String::from).collect(),
                ),
                _ => convert(raw, field.kind),
            };
            parsed.fields.insert(field.name.clone(), value);
        }

        if let Some(FieldValue::Str(request)) = parsed.fields.get("request").cloned() {
            split_request(&request, &mut parsed);
        }

        parsed
    }
}

/// Numeric conversion failures resolve to zero.
fn convert(raw: &str, kind: FieldKind) -> FieldValue {
    match kind {
        FieldKind::Int => FieldValue::Int(raw.trim().parse().unwrap_or(0)),
        FieldKind::Float => FieldValue::Float(raw.trim().parse().unwrap_or(0.0)),
        FieldKind::Str => FieldValue::Str(raw.to_string()),
    }
}

/// `0.001, 0.002` -> `[0.001, 0.002]`. Values above [`MAX_TIME_VALUE`] and
/// elements that are not numbers are dropped; `None` when nothing is left.
fn time_list(raw: &str) -> Option<Vec<f64>> {
    let times: Vec<f64> = raw
        .replace(' ', "")
        .split(',')
        .filter_map(|value| value.parse::<f64>().ok())
        .filter(|value| *value <= MAX_TIME_VALUE)
        .collect();
    (!times.is_empty()).then_some(times)
}

fn split_request(request: &str, parsed: &mut ParsedLine) {
    let parts: Vec<&str> = request.split(' ').collect();
    let [method, uri, protocol] = parts.as_slice() else {
        parsed.malformed = true;
        return;
    };

    if method.len() < 3 {
        parsed.malformed = true;
    }
    parsed
        .fields
        .insert("request_method".to_string(), FieldValue::Str(method.to_string()));
    parsed
        .fields
        .insert("request_uri".to_string(), FieldValue::Str(uri.to_string()));
    parsed
        .fields
        .insert("server_protocol".to_string(), FieldValue::Str(protocol.to_string()));
}
