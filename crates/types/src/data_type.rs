//! Column data types

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of column types the execution core understands.
///
/// `Nullable` wraps any other type; a bare type is implicitly non-null
/// only at the schema level, values themselves may always be `Null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    I32,
    I64,
    I128,
    F64,
    Decimal,
    Str,
    Date,
    Timestamp,
    Nullable(Box<DataType>),
}

impl DataType {
    /// Strip the `Nullable` wrapper, if any.
    pub fn base(&self) -> &DataType {
        match self {
            DataType::Nullable(inner) => inner.base(),
            other => other,
        }
    }

    /// Whether this is an integer type of any width.
    pub fn is_integer(&self) -> bool {
        matches!(self.base(), DataType::I32 | DataType::I64 | DataType::I128)
    }

    /// The next wider integer type, used by SUM accumulation to avoid
    /// overflow. I128 is the top of the ladder.
    pub fn widened(&self) -> DataType {
        match self.base() {
            DataType::I32 => DataType::I64,
            DataType::I64 | DataType::I128 => DataType::I128,
            other => other.clone(),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Bool => write!(f, "BOOLEAN"),
            DataType::I32 => write!(f, "INT"),
            DataType::I64 => write!(f, "BIGINT"),
            DataType::I128 => write!(f, "HUGEINT"),
            DataType::F64 => write!(f, "DOUBLE"),
            DataType::Decimal => write!(f, "DECIMAL"),
            DataType::Str => write!(f, "TEXT"),
            DataType::Date => write!(f, "DATE"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
            DataType::Nullable(inner) => write!(f, "{} NULL", inner),
        }
    }
}
