//! The tagged value variant and its coercion rules.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A script value. Leaves are strings or numbers; `Array` carries a whole
/// subtree keyed by index/property segment.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Num(f64),
    Array(BTreeMap<String, Value>),
}

impl Value {
    pub fn empty() -> Self {
        Value::Str(String::new())
    }

    /// Numeric form, if one exists. Strings parse after trimming; arrays have
    /// no numeric form.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::Str(s) => s.trim().parse::<f64>().ok(),
            Value::Array(_) => None,
        }
    }

    /// Numeric form with non-numeric input collapsing to 0.
    pub fn number_lossy(&self) -> f64 {
        self.to_number().unwrap_or(0.0)
    }

    /// String form. Numbers render canonically (integers without a decimal
    /// point); arrays render empty, they must be indexed before use.
    pub fn to_text(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Num(n) => format_number(*n),
            Value::Array(_) => String::new(),
        }
    }

    /// Truthiness: a non-zero number or a non-empty string. Arrays are never
    /// directly truthy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Num(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) => false,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Num(if b { 1.0 } else { 0.0 })
    }
}

/// Canonical decimal rendering: values with no fractional part render as
/// integers, everything else falls back to the shortest float form.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Comparison used by the relational operators: numeric when both sides have
/// a numeric form, lexicographic otherwise.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a.to_number(), b.to_number()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.to_text().cmp(&b.to_text()),
    }
}
