//! Values produced by evaluating constant expressions.

use std::fmt;

use smol_str::SmolStr;

/// A PHP value that can appear in a constant expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(SmolStr),
    /// Ordered key/value pairs, as PHP arrays are.
    Array(Vec<(ArrayKey, Value)>),
}

/// An array key: PHP normalises keys to integers or strings.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArrayKey {
    Int(i64),
    String(SmolStr),
}

impl fmt::Display for ArrayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayKey::Int(i) => write!(f, "{i}"),
            ArrayKey::String(s) => f.write_str(s),
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
        }
    }

    /// PHP truthiness.
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !(s.is_empty() || s == "0"),
            Value::Array(items) => !items.is_empty(),
        }
    }

    /// String conversion as done by `.`; arrays have none.
    pub fn to_php_string(&self) -> Option<SmolStr> {
        match self {
            Value::Null | Value::Bool(false) => Some(SmolStr::default()),
            Value::Bool(true) => Some(SmolStr::new_inline("1")),
            Value::Int(i) => Some(SmolStr::new(i.to_string())),
            Value::Float(f) => Some(SmolStr::new(format_float(*f))),
            Value::String(s) => Some(s.clone()),
            Value::Array(_) => None,
        }
    }

    /// Numeric conversion for arithmetic: `None` for arrays and
    /// non-numeric strings.
    pub fn to_number(&self) -> Option<Number> {
        match self {
            Value::Null | Value::Bool(false) => Some(Number::Int(0)),
            Value::Bool(true) => Some(Number::Int(1)),
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            Value::String(s) => parse_numeric(s),
            Value::Array(_) => None,
        }
    }

    /// Key normalisation for array literals.
    pub fn to_array_key(&self) -> Option<ArrayKey> {
        match self {
            Value::Null => Some(ArrayKey::String(SmolStr::default())),
            Value::Bool(b) => Some(ArrayKey::Int(i64::from(*b))),
            Value::Int(i) => Some(ArrayKey::Int(*i)),
            Value::Float(f) => Some(ArrayKey::Int(f.trunc() as i64)),
            Value::String(s) => match s.parse::<i64>() {
                Ok(i) if i.to_string() == s.as_str() => Some(ArrayKey::Int(i)),
                _ => Some(ArrayKey::String(s.clone())),
            },
            Value::Array(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, (key, value)) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key} => {value}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Int or float operand of an arithmetic operator.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Number::Int(i) => Value::Int(i),
            Number::Float(f) => Value::Float(f),
        }
    }
}

/// PHP prints floats with up to 17 significant digits and drops a `.0`.
fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "NAN".to_owned();
    }
    if f.is_infinite() {
        return if f > 0.0 { "INF" } else { "-INF" }.to_owned();
    }
    if f.fract() == 0.0 && f.abs() < 1e15 {
        return format!("{}", f as i64);
    }
    format!("{f}")
}

/// Leading/trailing whitespace is allowed; anything else must be a number.
fn parse_numeric(s: &str) -> Option<Number> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Number::Int(i));
    }
    let looks_numeric = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if looks_numeric {
        trimmed.parse::<f64>().ok().map(Number::Float)
    } else {
        None
    }
}
