//! Sort keys and row comparators
//!
//! Null placement is configurable per key and independent of the sort
//! direction: `NULLS FIRST` puts nulls ahead of every non-null value
//! whether the key is ascending or descending.

use crate::batch::Row;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NullOrder {
    NullsFirst,
    NullsLast,
}

/// One entry of a sort specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: usize,
    pub direction: Direction,
    pub nulls: NullOrder,
}

impl SortKey {
    pub fn asc(column: usize) -> Self {
        Self {
            column,
            direction: Direction::Ascending,
            nulls: NullOrder::NullsFirst,
        }
    }

    pub fn desc(column: usize) -> Self {
        Self {
            column,
            direction: Direction::Descending,
            nulls: NullOrder::NullsFirst,
        }
    }

    pub fn with_nulls(mut self, nulls: NullOrder) -> Self {
        self.nulls = nulls;
        self
    }
}

/// Compare two values under a single key's direction and null placement.
pub fn compare_values(key: &SortKey, a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => {
            return match key.nulls {
                NullOrder::NullsFirst => Ordering::Less,
                NullOrder::NullsLast => Ordering::Greater,
            };
        }
        (false, true) => {
            return match key.nulls {
                NullOrder::NullsFirst => Ordering::Greater,
                NullOrder::NullsLast => Ordering::Less,
            };
        }
        (false, false) => {}
    }
    let ord = a.cmp(b);
    match key.direction {
        Direction::Ascending => ord,
        Direction::Descending => ord.reverse(),
    }
}

/// Compare two rows under a full sort specification, applying keys in
/// order. Only the declared key columns determine the result.
pub fn compare_rows(keys: &[SortKey], a: &Row, b: &Row) -> Ordering {
    for key in keys {
        let (x, y) = match (a.get(key.column), b.get(key.column)) {
            (Some(x), Some(y)) => (x, y),
            _ => return Ordering::Equal,
        };
        match compare_values(key, x, y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nulls_first_is_direction_independent() {
        let asc = SortKey::asc(0);
        let desc = SortKey::desc(0);
        assert_eq!(compare_values(&asc, &Value::Null, &Value::I64(1)), Ordering::Less);
        assert_eq!(compare_values(&desc, &Value::Null, &Value::I64(1)), Ordering::Less);

        let asc_last = SortKey::asc(0).with_nulls(NullOrder::NullsLast);
        assert_eq!(
            compare_values(&asc_last, &Value::Null, &Value::I64(1)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_descending_reverses_non_null_order() {
        let key = SortKey::desc(0);
        assert_eq!(
            compare_values(&key, &Value::I64(1), &Value::I64(2)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_multi_key_tiebreak() {
        let keys = vec![SortKey::asc(0), SortKey::desc(1)];
        let a = vec![Value::I64(1), Value::I64(5)];
        let b = vec![Value::I64(1), Value::I64(9)];
        assert_eq!(compare_rows(&keys, &a, &b), Ordering::Greater);
    }
}
