use std::fmt;
use std::ops::RangeInclusive;

use regex::Regex;
use serde_json::{Number, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Boolean,
    Integer,
    Float,
    String,
    Enum,
}

impl FieldKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

/// A committed, kind-typed field value. "No value" is modelled as `None` around it.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl FieldValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(value) => Value::Bool(*value),
            Self::Int(value) => Value::from(*value),
            Self::Float(value) => Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Str(value) => Value::String(value.clone()),
        }
    }

    fn matches_json(&self, value: &Value) -> bool {
        match self {
            Self::Bool(expected) => value.as_bool() == Some(*expected),
            Self::Int(expected) => value.as_i64() == Some(*expected),
            Self::Float(expected) => value.is_f64() && value.as_f64() == Some(*expected),
            Self::Str(expected) => value.as_str() == Some(expected.as_str()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Str(value) => write!(f, "{value}"),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Constraints {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub range: Option<RangeInclusive<i64>>,
    pub allowed: Vec<FieldValue>,
    pub pattern: Option<Regex>,
    /// `Some(None)` is an explicit "no value" default.
    pub default: Option<Option<FieldValue>>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn range(mut self, range: RangeInclusive<i64>) -> Self {
        self.range = Some(range);
        self
    }

    pub fn allowed<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        self.allowed = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn with_default(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(Some(value.into()));
        self
    }

    pub fn without_default(mut self) -> Self {
        self.default = Some(None);
        self
    }
}

#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: String,
    pub kind: FieldKind,
    pub constraints: Constraints,
}

impl FieldDefinition {
    pub fn new(kind: FieldKind, name: impl Into<String>, constraints: Constraints) -> Self {
        Self {
            name: name.into(),
            kind,
            constraints,
        }
    }

    /// Starting value: explicit default, then `min`, then the first `range`
    /// element, then the first allowed value, then the kind's zero value.
    pub fn initial(&self) -> Option<FieldValue> {
        if let Some(default) = &self.constraints.default {
            return default.clone();
        }
        if self.kind.is_numeric() {
            if let Some(min) = self.constraints.min {
                return Some(match self.kind {
                    FieldKind::Integer => FieldValue::Int(min.ceil() as i64),
                    _ => FieldValue::Float(min),
                });
            }
        }
        match self.kind {
            FieldKind::Integer => self
                .constraints
                .range
                .as_ref()
                .map(|range| FieldValue::Int(*range.start())),
            FieldKind::Enum => self.constraints.allowed.first().cloned(),
            FieldKind::Boolean => Some(FieldValue::Bool(false)),
            FieldKind::String => Some(FieldValue::Str(String::new())),
            FieldKind::Float => None,
        }
    }

    /// Best-effort coercion toward this field's kind. Input that cannot be
    /// coerced is returned unchanged so that `validate` rejects it.
    pub fn sanitize(&self, raw: Value) -> Value {
        match self.kind {
            FieldKind::Boolean => sanitize_boolean(raw),
            FieldKind::Integer => sanitize_integer(raw),
            FieldKind::Float => sanitize_float(raw),
            FieldKind::String => sanitize_string(raw),
            FieldKind::Enum => self.sanitize_enum(raw),
        }
    }

    pub fn validate(&self, value: &Value) -> bool {
        if value.is_null() {
            return self.initial().is_none();
        }
        let constraints = &self.constraints;
        match self.kind {
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Integer => {
                let Some(number) = value.as_i64() else {
                    return false;
                };
                if !within_bounds(number as f64, constraints) {
                    return false;
                }
                constraints
                    .range
                    .as_ref()
                    .map(|range| range.contains(&number))
                    .unwrap_or(true)
            }
            FieldKind::Float => value
                .as_f64()
                .map(|number| number.is_finite() && within_bounds(number, constraints))
                .unwrap_or(false),
            FieldKind::String => {
                let Some(text) = value.as_str() else {
                    return false;
                };
                constraints
                    .pattern
                    .as_ref()
                    .map(|pattern| pattern.is_match(text))
                    .unwrap_or(true)
            }
            FieldKind::Enum => constraints
                .allowed
                .iter()
                .any(|allowed| allowed.matches_json(value)),
        }
    }

    /// Converts an already validated JSON value into the stored representation.
    pub(crate) fn typed(&self, value: &Value) -> Option<FieldValue> {
        match (self.kind, value) {
            (_, Value::Null) => None,
            (FieldKind::Boolean, Value::Bool(flag)) => Some(FieldValue::Bool(*flag)),
            (FieldKind::Integer, _) => value.as_i64().map(FieldValue::Int),
            (FieldKind::Float, _) => value.as_f64().map(FieldValue::Float),
            (FieldKind::String, Value::String(text)) => Some(FieldValue::Str(text.clone())),
            (FieldKind::Enum, _) => self
                .constraints
                .allowed
                .iter()
                .find(|allowed| allowed.matches_json(value))
                .cloned(),
            _ => None,
        }
    }

    fn sanitize_enum(&self, raw: Value) -> Value {
        let Value::String(text) = &raw else {
            return raw;
        };
        let trimmed = text.trim();
        self.constraints
            .allowed
            .iter()
            .find(|allowed| allowed.to_string() == trimmed)
            .map(FieldValue::to_json)
            .unwrap_or(raw)
    }
}

fn within_bounds(number: f64, constraints: &Constraints) -> bool {
    if constraints.min.is_some_and(|min| number < min) {
        return false;
    }
    if constraints.max.is_some_and(|max| number > max) {
        return false;
    }
    true
}

fn sanitize_boolean(raw: Value) -> Value {
    let Value::String(text) = &raw else {
        return raw;
    };
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Value::Bool(true),
        "false" | "no" | "0" => Value::Bool(false),
        _ => raw,
    }
}

fn sanitize_integer(raw: Value) -> Value {
    match &raw {
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(raw),
        _ => raw,
    }
}

fn sanitize_float(raw: Value) -> Value {
    let parsed = match &raw {
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Number(number) => number.as_f64(),
        _ => None,
    };
    parsed
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(raw)
}

fn sanitize_string(raw: Value) -> Value {
    match raw {
        Value::Number(number) => Value::String(number.to_string()),
        Value::Bool(flag) => Value::String(flag.to_string()),
        other => other,
    }
}
