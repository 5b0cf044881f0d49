//! Flow Record - open field mapping produced by the flow meter
//!
//! The meter may emit any subset of the canonical names, plus arbitrary
//! extra fields. Values are kept as-is; numeric coercion happens lazily
//! through [`FieldLookup`] and never fails.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

// ============================================================================
// FIELD VALUE
// ============================================================================

/// A single field as received from the flow source
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Bool(bool),
    Text(String),
    Null,
    /// Arrays / nested objects: kept so the field counts as present
    Other,
}

impl FieldValue {
    /// Numeric coercion: `None` when the value has no numeric reading
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
            FieldValue::Null | FieldValue::Other => None,
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(n) => n.as_f64().map(FieldValue::Number).unwrap_or(FieldValue::Other),
            Value::Bool(b) => FieldValue::Bool(b),
            Value::String(s) => FieldValue::Text(s),
            Value::Null => FieldValue::Null,
            Value::Array(_) | Value::Object(_) => FieldValue::Other,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

// ============================================================================
// LOOKUP CAPABILITY
// ============================================================================

/// Capability the assembler needs from a flow representation.
///
/// Returns `None` when the field is absent or has no numeric reading.
pub trait FieldLookup {
    fn get_numeric(&self, name: &str) -> Option<f64>;
}

impl FieldLookup for HashMap<String, f64> {
    fn get_numeric(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

// ============================================================================
// NORMALIZATION
// ============================================================================

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("flow payload is not valid JSON: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("flow payload is a JSON {0}, expected an object")]
    NotAnObject(&'static str),
}

/// Maps meter field names onto canonical feature names
#[derive(Debug, Clone, Default)]
pub struct FieldAliases {
    map: HashMap<String, String>,
}

impl FieldAliases {
    pub fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// One observed flow, as a plain field mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowRecord {
    fields: HashMap<String, FieldValue>,
}

impl FlowRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for tests and in-process producers
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parse one meter line into a record.
    ///
    /// Meters may emit `Infinity`, `NaN` or out-of-range literals such as
    /// `1e400`, which strict JSON rejects. Those lines are retried with bare
    /// numeric tokens quoted, so the value goes through text coercion and only
    /// that field is affected.
    pub fn from_json_str(payload: &str) -> Result<Self, NormalizeError> {
        let value: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(strict) => {
                serde_json::from_str(&quote_bare_numbers(payload)).map_err(|_| strict)?
            }
        };
        Self::from_json_value(value)
    }

    /// Keep only public fields: keys starting with `_` are private to the meter
    pub fn from_json_value(value: Value) -> Result<Self, NormalizeError> {
        let object = match value {
            Value::Object(object) => object,
            Value::Array(_) => return Err(NormalizeError::NotAnObject("array")),
            Value::String(_) => return Err(NormalizeError::NotAnObject("string")),
            Value::Number(_) => return Err(NormalizeError::NotAnObject("number")),
            Value::Bool(_) => return Err(NormalizeError::NotAnObject("bool")),
            Value::Null => return Err(NormalizeError::NotAnObject("null")),
        };

        let fields = object
            .into_iter()
            .filter(|(key, _)| !key.starts_with('_'))
            .map(|(key, value)| (key, FieldValue::from(value)))
            .collect();

        Ok(Self { fields })
    }

    /// Copy aliased fields onto their canonical names.
    /// A canonical field already present in the record wins.
    pub fn apply_aliases(&mut self, aliases: &FieldAliases) {
        for (source, canonical) in &aliases.map {
            if self.fields.contains_key(canonical) {
                continue;
            }
            if let Some(value) = self.fields.get(source).cloned() {
                self.fields.insert(canonical.clone(), value);
            }
        }
    }
}

/// Wrap every bare numeric-looking token outside string literals in quotes
fn quote_bare_numbers(payload: &str) -> String {
    let mut out = String::with_capacity(payload.len() + 16);
    let mut chars = payload.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '-' | '+' | '0'..='9' | 'N' | 'I' => {
                out.push('"');
                out.push(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || matches!(next, '.' | '+' | '-') {
                        out.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push('"');
            }
            _ => out.push(c),
        }
    }

    out
}

impl FieldLookup for FlowRecord {
    fn get_numeric(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(FieldValue::to_f64)
    }
}
