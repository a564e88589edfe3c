use std::cmp::Ordering;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Supported SQL column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Int,
    Text,
    Float,
    Boolean,
}

impl Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "INT"),
            DataType::Text => write!(f, "TEXT"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Boolean => write!(f, "BOOLEAN"),
        }
    }
}

/// Runtime value for a single cell.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// Structural equality with numeric cross-compare: `Integer(2) == Float(2.0)`.
/// Two nulls are equal here; WHERE-level null semantics live in the
/// expression evaluator, not in this impl.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                *a as f64 == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Dynamic type of the value; `None` for null.
    pub fn datatype(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Integer(_) => Some(DataType::Int),
            Value::Float(_) => Some(DataType::Float),
            Value::String(_) => Some(DataType::Text),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Orders two values when they are comparable: same-tag natural order,
    /// integer/float numeric. Nulls and mixed tags are incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Fits the value to a declared column type. Integers widen to FLOAT;
    /// null passes through (NOT NULL is a constraint check, not a type
    /// check). Anything else is an incompatible assignment.
    pub fn coerce(self, datatype: DataType) -> Option<Value> {
        match (self, datatype) {
            (Value::Null, _) => Some(Value::Null),
            (Value::Integer(i), DataType::Int) => Some(Value::Integer(i)),
            (Value::Integer(i), DataType::Float) => Some(Value::Float(i as f64)),
            (Value::Float(f), DataType::Float) => Some(Value::Float(f)),
            (Value::String(s), DataType::Text) => Some(Value::String(s)),
            (Value::Boolean(b), DataType::Boolean) => Some(Value::Boolean(b)),
            _ => None,
        }
    }

    /// Renders the value as a JSON value for the on-disk files and the
    /// facade's result rows.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::String(s) => serde_json::Value::from(s.clone()),
        }
    }

    /// Reads a stored JSON value back under the column's declared type.
    /// Integral JSON numbers load into FLOAT columns as floats.
    pub fn from_json(value: &serde_json::Value, datatype: DataType) -> Result<Value> {
        let out = match (value, datatype) {
            (serde_json::Value::Null, _) => Value::Null,
            (serde_json::Value::Bool(b), DataType::Boolean) => Value::Boolean(*b),
            (serde_json::Value::Number(n), DataType::Int) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => {
                    return Err(Error::Io(format!(
                        "stored value {} is not a valid INT",
                        n
                    )))
                }
            },
            (serde_json::Value::Number(n), DataType::Float) => match n.as_f64() {
                Some(f) => Value::Float(f),
                None => {
                    return Err(Error::Io(format!(
                        "stored value {} is not a valid FLOAT",
                        n
                    )))
                }
            },
            (serde_json::Value::String(s), DataType::Text) => Value::String(s.clone()),
            (other, datatype) => {
                return Err(Error::Io(format!(
                    "stored value {} does not match column type {}",
                    other, datatype
                )))
            }
        };
        Ok(out)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(true) => write!(f, "TRUE"),
            Value::Boolean(false) => write!(f, "FALSE"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

/// A row is a vector of values in schema column order.
pub type Row = Vec<Value>;

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::{DataType, Value};

    #[test]
    fn test_numeric_cross_compare() {
        assert_eq!(Value::Integer(2), Value::Float(2.0));
        assert_ne!(Value::Integer(2), Value::Float(2.5));
        assert_eq!(
            Value::Integer(1).compare(&Value::Float(1.5)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::String("a".into()).compare(&Value::Integer(1)), None);
        assert_eq!(Value::Null.compare(&Value::Null), None);
    }

    #[test]
    fn test_coerce() {
        assert_eq!(
            Value::Integer(3).coerce(DataType::Float),
            Some(Value::Float(3.0))
        );
        assert_eq!(Value::Float(3.5).coerce(DataType::Int), None);
        assert_eq!(
            Value::String("5".into()).coerce(DataType::Int),
            None
        );
        assert_eq!(Value::Null.coerce(DataType::Int), Some(Value::Null));
    }

    #[test]
    fn test_json_round_trip() {
        let vals = [
            (Value::Integer(42), DataType::Int),
            (Value::Float(0.1), DataType::Float),
            (Value::Float(2.0), DataType::Float),
            (Value::String("Alice".into()), DataType::Text),
            (Value::Boolean(true), DataType::Boolean),
            (Value::Null, DataType::Int),
        ];
        for (val, datatype) in vals {
            let json = val.to_json();
            let back = Value::from_json(&json, datatype).unwrap();
            assert_eq!(val, back);
        }
    }

    #[test]
    fn test_integral_json_loads_as_float() {
        let json = serde_json::Value::from(2i64);
        assert_eq!(
            Value::from_json(&json, DataType::Float).unwrap(),
            Value::Float(2.0)
        );
    }
}
