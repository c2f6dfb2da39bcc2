//! Typed values carried through the pipeline
//!
//! Values are self-describing and totally ordered so that sort keys,
//! group buckets, and merge cursors can compare them without consulting
//! the schema. NULL sorts first under the default `Ord`; per-key null
//! placement is handled by the ordering module on top of this.

use crate::data_type::DataType;
use crate::error::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single typed value.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    I128(i128),
    F64(f64),
    Decimal(Decimal),
    Str(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Create an I64 value (most common integer type)
    pub fn integer(i: i64) -> Self {
        Value::I64(i)
    }

    /// Create a string value
    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if value is any integer type
    pub fn is_integer(&self) -> bool {
        matches!(self, Value::I32(_) | Value::I64(_) | Value::I128(_))
    }

    /// Check if value is any numeric type
    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, Value::F64(_) | Value::Decimal(_))
    }

    /// Convert any integer to i128 for comparison and accumulation
    pub fn to_i128(&self) -> Result<i128> {
        match self {
            Value::I32(v) => Ok(*v as i128),
            Value::I64(v) => Ok(*v as i128),
            Value::I128(v) => Ok(*v),
            _ => Err(Error::TypeMismatch {
                expected: "integer".into(),
                found: format!("{:?}", self),
            }),
        }
    }

    /// Convert any numeric value to a Decimal
    pub fn to_decimal(&self) -> Result<Decimal> {
        match self {
            Value::I32(v) => Ok(Decimal::from(*v)),
            Value::I64(v) => Ok(Decimal::from(*v)),
            Value::I128(v) => Ok(Decimal::from(*v)),
            Value::Decimal(d) => Ok(*d),
            Value::F64(v) => Decimal::try_from(*v)
                .map_err(|_| Error::InvalidValue(format!("{} not representable as decimal", v))),
            _ => Err(Error::TypeMismatch {
                expected: "numeric".into(),
                found: format!("{:?}", self),
            }),
        }
    }

    /// Convert value to boolean (predicate results)
    pub fn to_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Null => Ok(false),
            _ => Err(Error::TypeMismatch {
                expected: "boolean".into(),
                found: format!("{:?}", self),
            }),
        }
    }

    /// Get the data type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Nullable(Box::new(DataType::I64)),
            Value::Bool(_) => DataType::Bool,
            Value::I32(_) => DataType::I32,
            Value::I64(_) => DataType::I64,
            Value::I128(_) => DataType::I128,
            Value::F64(_) => DataType::F64,
            Value::Decimal(_) => DataType::Decimal,
            Value::Str(_) => DataType::Str,
            Value::Date(_) => DataType::Date,
            Value::Timestamp(_) => DataType::Timestamp,
        }
    }

    /// Narrow an integer magnitude back to the smallest of the given
    /// widths that holds it, preferring the wider operand's type.
    fn integer_result(v: i128, a: &Value, b: &Value) -> Value {
        let wide = matches!(a, Value::I128(_)) || matches!(b, Value::I128(_));
        if !wide {
            if let Ok(v64) = i64::try_from(v) {
                if matches!(a, Value::I32(_)) && matches!(b, Value::I32(_)) {
                    if let Ok(v32) = i32::try_from(v) {
                        return Value::I32(v32);
                    }
                }
                return Value::I64(v64);
            }
        }
        // Overflowed the operand width, promote.
        Value::I128(v)
    }

    /// Checked addition; NULL propagates, integer overflow widens.
    pub fn add(&self, other: &Value) -> Result<Value> {
        self.binary_numeric(other, "add", |a, b| a.checked_add(b), |a, b| a + b, |a, b| {
            a.checked_add(b)
        })
    }

    /// Checked subtraction; NULL propagates, integer overflow widens.
    pub fn subtract(&self, other: &Value) -> Result<Value> {
        self.binary_numeric(other, "subtract", |a, b| a.checked_sub(b), |a, b| a - b, |a, b| {
            a.checked_sub(b)
        })
    }

    /// Checked multiplication; NULL propagates, integer overflow widens.
    pub fn multiply(&self, other: &Value) -> Result<Value> {
        self.binary_numeric(other, "multiply", |a, b| a.checked_mul(b), |a, b| a * b, |a, b| {
            a.checked_mul(b)
        })
    }

    /// Division. Integer operands use integer division; Decimal and
    /// float operands divide exactly in their own type.
    pub fn divide(&self, other: &Value) -> Result<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        match (self, other) {
            (a, b) if a.is_integer() && b.is_integer() => {
                let (x, y) = (a.to_i128()?, b.to_i128()?);
                if y == 0 {
                    return Err(Error::DivisionByZero);
                }
                Ok(Self::integer_result(x / y, a, b))
            }
            (Value::F64(_), _) | (_, Value::F64(_)) => {
                let (x, y) = (self.to_f64()?, other.to_f64()?);
                if y == 0.0 {
                    return Err(Error::DivisionByZero);
                }
                Ok(Value::F64(x / y))
            }
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let (x, y) = (a.to_decimal()?, b.to_decimal()?);
                x.checked_div(y)
                    .map(Value::Decimal)
                    .ok_or(Error::DivisionByZero)
            }
            _ => Err(Error::TypeMismatch {
                expected: "numeric".into(),
                found: format!("{:?} / {:?}", self, other),
            }),
        }
    }

    fn to_f64(&self) -> Result<f64> {
        match self {
            Value::I32(v) => Ok(*v as f64),
            Value::I64(v) => Ok(*v as f64),
            Value::I128(v) => Ok(*v as f64),
            Value::F64(v) => Ok(*v),
            Value::Decimal(d) => Ok(d.to_string().parse().unwrap_or(f64::NAN)),
            _ => Err(Error::TypeMismatch {
                expected: "numeric".into(),
                found: format!("{:?}", self),
            }),
        }
    }

    fn binary_numeric(
        &self,
        other: &Value,
        op: &str,
        int_op: impl Fn(i128, i128) -> Option<i128>,
        f64_op: impl Fn(f64, f64) -> f64,
        dec_op: impl Fn(Decimal, Decimal) -> Option<Decimal>,
    ) -> Result<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        match (self, other) {
            (a, b) if a.is_integer() && b.is_integer() => {
                let v = int_op(a.to_i128()?, b.to_i128()?).ok_or_else(|| {
                    Error::InvalidValue(format!("integer overflow in {}", op))
                })?;
                Ok(Self::integer_result(v, a, b))
            }
            (Value::F64(_), _) | (_, Value::F64(_)) => {
                Ok(Value::F64(f64_op(self.to_f64()?, other.to_f64()?)))
            }
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let v = dec_op(a.to_decimal()?, b.to_decimal()?).ok_or_else(|| {
                    Error::InvalidValue(format!("decimal overflow in {}", op))
                })?;
                Ok(Value::Decimal(v))
            }
            _ => Err(Error::TypeMismatch {
                expected: "numeric".into(),
                found: format!("{:?} {} {:?}", self, op, other),
            }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::I32(i) => write!(f, "{}", i),
            Value::I64(i) => write!(f, "{}", i),
            Value::I128(i) => write!(f, "{}", i),
            Value::F64(v) => write!(f, "{}", v),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Str(s) => write!(f, "'{}'", s),
            Value::Date(d) => write!(f, "{}", d),
            Value::Timestamp(ts) => write!(f, "{}", ts),
        }
    }
}

// Debug matches the variant-tagged style used in test assertions
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::I32(i) => write!(f, "I32({})", i),
            Value::I64(i) => write!(f, "I64({})", i),
            Value::I128(i) => write!(f, "I128({})", i),
            Value::F64(v) => write!(f, "F64({})", v),
            Value::Decimal(d) => write!(f, "Decimal({})", d),
            Value::Str(s) => write!(f, "Str({})", s),
            Value::Date(d) => write!(f, "Date({})", d),
            Value::Timestamp(ts) => write!(f, "Timestamp({})", ts),
        }
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0.hash(state),
            Value::Bool(b) => b.hash(state),
            Value::I32(i) => (*i as i128).hash(state),
            Value::I64(i) => (*i as i128).hash(state),
            Value::I128(i) => i.hash(state),
            Value::F64(v) => v.to_bits().hash(state),
            Value::Decimal(d) => d.hash(state),
            Value::Str(s) => s.hash(state),
            Value::Date(d) => d.hash(state),
            Value::Timestamp(ts) => ts.hash(state),
        }
    }
}

impl Eq for Value {}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;

        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,

            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),

            // Cross-width integer comparison via i128
            (a, b) if a.is_integer() && b.is_integer() => {
                match (a.to_i128(), b.to_i128()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => Ordering::Equal,
                }
            }
            (Value::F64(a), Value::F64(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::Decimal(a), Value::Decimal(b)) => a.cmp(b),

            // Mixed numeric types compare as decimals
            (a, b) if a.is_numeric() && b.is_numeric() => {
                match (a.to_decimal(), b.to_decimal()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => Ordering::Equal,
                }
            }

            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),

            // Different types - consider them equal for total ordering
            _ => Ordering::Equal,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_widening_on_overflow() {
        let v = Value::I64(i64::MAX).add(&Value::I64(1)).unwrap();
        assert_eq!(v, Value::I128(i64::MAX as i128 + 1));
    }

    #[test]
    fn test_i32_arithmetic_stays_narrow() {
        assert_eq!(Value::I32(2).add(&Value::I32(3)).unwrap(), Value::I32(5));
        assert_eq!(
            Value::I32(i32::MAX).add(&Value::I32(1)).unwrap(),
            Value::I64(i32::MAX as i64 + 1)
        );
    }

    #[test]
    fn test_null_propagates_through_arithmetic() {
        assert_eq!(Value::Null.add(&Value::I64(1)).unwrap(), Value::Null);
        assert_eq!(Value::I64(1).divide(&Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            Value::I64(1).divide(&Value::I64(0)),
            Err(Error::DivisionByZero)
        );
    }

    #[test]
    fn test_cross_width_ordering() {
        assert!(Value::I32(5) < Value::I64(6));
        assert!(Value::I128(7) > Value::I64(6));
        assert!(Value::Null < Value::I32(i32::MIN));
    }

    #[test]
    fn test_decimal_division_is_exact() {
        let avg = Value::Decimal(Decimal::new(5, 0))
            .divide(&Value::I64(2))
            .unwrap();
        assert_eq!(avg, Value::Decimal(Decimal::new(25, 1)));
    }
}
