//! Runtime value type for the template language.
//!
//! The language is dynamically typed; every operator and statement decides at
//! evaluation time whether a value is usable.  The coercion helpers here are
//! strict: a string never silently becomes a number.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::RuntimeError;

/// A template runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    /// Produced by hex literals and bitwise operators.
    Int(i64),
    Str(String),
    List(Vec<Value>),
    /// Objects loaded from the context file.
    Map(BTreeMap<String, Value>),
    DateTime(DateTime<Utc>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            // f64's Display already drops the trailing `.0` of integral values.
            Value::Number(x) => write!(f, "{x}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Value::DateTime(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

impl Value {
    /// Name of the type, used in coercion error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Int(_) => "integer",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::DateTime(_) => "datetime",
        }
    }

    /// Textual form for message writes: `None` for `Null`, the default
    /// textual representation otherwise.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    // ── Coercions ─────────────────────────────────────────────────────────────

    /// Coerce to `f64`.  `Null` lifts to `None`.
    pub fn to_number(&self) -> Result<Option<f64>, RuntimeError> {
        match self {
            Value::Null => Ok(None),
            Value::Number(x) => Ok(Some(*x)),
            Value::Int(n) => Ok(Some(*n as f64)),
            other => Err(coercion_error(other, "number")),
        }
    }

    /// Coerce to `i64`.  Floating-point numbers must be integral.
    pub fn to_integer(&self) -> Result<Option<i64>, RuntimeError> {
        match self {
            Value::Null => Ok(None),
            Value::Int(n) => Ok(Some(*n)),
            Value::Number(x) if x.fract() == 0.0 && x.abs() < i64::MAX as f64 => Ok(Some(*x as i64)),
            other => Err(coercion_error(other, "integer")),
        }
    }

    /// Coerce to `bool`.  `Null` lifts to `None`.
    pub fn to_bool(&self) -> Result<Option<bool>, RuntimeError> {
        match self {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(*b)),
            other => Err(coercion_error(other, "bool")),
        }
    }
}

pub(crate) fn coercion_error(value: &Value, target: &str) -> RuntimeError {
    RuntimeError::internal(format!("cannot coerce {} to {target}", value.type_name()))
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Number(x)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::DateTime(t)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// JSON numbers always become `Number`; the context file has no integers.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => {
                Value::Map(entries.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
