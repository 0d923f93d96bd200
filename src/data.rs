use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::schema::ColumnType;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
}

impl Value {
    /// Text used in CSV output. Whole floats keep a `.0` suffix so the column
    /// is re-read as floating point.
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(_) => None,
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::String(_) => ColumnType::String,
            Value::Integer(_) => ColumnType::Integer,
            Value::Float(_) => ColumnType::Float,
        }
    }

    /// Stable textual identity used when values take part in hash keys.
    /// Integer and float spellings of the same number stay distinct.
    pub fn key_fragment(&self) -> String {
        match self {
            Value::String(s) => format!("s:{s}"),
            Value::Integer(i) => format!("i:{i}"),
            Value::Float(f) => format!("f:{}", f.to_bits()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

pub fn parse_typed_value(value: &str, ty: &ColumnType) -> Result<Option<Value>> {
    if value.is_empty() {
        return Ok(None);
    }
    let parsed = match ty {
        ColumnType::String => Value::String(value.to_string()),
        ColumnType::Integer => {
            let trimmed = value.trim();
            let parsed: i64 = match trimmed.parse() {
                Ok(parsed) => parsed,
                // Nullable integer columns written by other tools may carry `.0`.
                Err(_) => match trimmed.parse::<f64>() {
                    Ok(f) if f.fract() == 0.0 => f as i64,
                    _ => {
                        return Err(anyhow::anyhow!("Failed to parse '{value}' as integer"));
                    }
                },
            };
            Value::Integer(parsed)
        }
        ColumnType::Float => {
            let parsed: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse '{value}' as float"))?;
            Value::Float(parsed)
        }
    };
    Ok(Some(parsed))
}

/// Converts an existing value into `ty`, used by the final type coercion.
pub fn coerce_value(value: Value, ty: &ColumnType) -> Result<Value> {
    match (value, ty) {
        (Value::Integer(i), ColumnType::Float) => Ok(Value::Float(i as f64)),
        (Value::Float(f), ColumnType::Integer) if f.fract() == 0.0 => Ok(Value::Integer(f as i64)),
        (Value::String(s), ty) if *ty != ColumnType::String => parse_typed_value(&s, ty)?
            .with_context(|| format!("Empty text cannot be coerced to {ty:?}")),
        (Value::Integer(i), ColumnType::String) => Ok(Value::String(i.to_string())),
        (Value::Float(f), ColumnType::String) => Ok(Value::String(format_float(f))),
        (other, ty) if other.column_type() == *ty => Ok(other),
        (other, ty) => Err(anyhow::anyhow!("Cannot coerce {other:?} to {ty:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_display_keeps_float_marker() {
        assert_eq!(Value::Float(0.0).as_display(), "0.0");
        assert_eq!(Value::Float(0.739).as_display(), "0.739");
        assert_eq!(Value::Integer(1234567).as_display(), "1234567");
    }

    #[test]
    fn parse_typed_value_handles_empty_and_nullable_integers() {
        assert_eq!(parse_typed_value("", &ColumnType::Integer).unwrap(), None);
        assert_eq!(
            parse_typed_value("42.0", &ColumnType::Integer).unwrap(),
            Some(Value::Integer(42))
        );
        assert!(parse_typed_value("42.5", &ColumnType::Integer).is_err());
        assert!(parse_typed_value("abc", &ColumnType::Float).is_err());
    }

    #[test]
    fn coerce_value_switches_numeric_kinds() {
        assert_eq!(
            coerce_value(Value::Integer(3), &ColumnType::Float).unwrap(),
            Value::Float(3.0)
        );
        assert_eq!(
            coerce_value(Value::Float(7.0), &ColumnType::Integer).unwrap(),
            Value::Integer(7)
        );
        assert!(coerce_value(Value::Float(7.5), &ColumnType::Integer).is_err());
    }

    #[test]
    fn key_fragment_distinguishes_numeric_kinds() {
        assert_ne!(
            Value::Integer(1).key_fragment(),
            Value::Float(1.0).key_fragment()
        );
        assert_eq!(
            Value::String("A".into()).key_fragment(),
            Value::String("A".into()).key_fragment()
        );
    }
}
