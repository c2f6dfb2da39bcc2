//! Minimal expression evaluation
//!
//! The execution core only needs expressions as residual join
//! predicates, select predicates, and projection targets; full SQL
//! expression semantics live in the planner outside this crate.
//! Comparisons follow SQL three-valued logic: any comparison against
//! NULL yields NULL, which predicates treat as false.

use crate::error::{Error, Result};
use tessera_types::{Row, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Constant(Value),
    /// Zero-based column reference into the input row.
    Column(usize),

    Equal(Box<Expression>, Box<Expression>),
    NotEqual(Box<Expression>, Box<Expression>),
    LessThan(Box<Expression>, Box<Expression>),
    GreaterThan(Box<Expression>, Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    IsNull(Box<Expression>),

    Add(Box<Expression>, Box<Expression>),
    Subtract(Box<Expression>, Box<Expression>),
    Multiply(Box<Expression>, Box<Expression>),
    Divide(Box<Expression>, Box<Expression>),
}

impl Expression {
    /// Convenience: `left_col = right_col`.
    pub fn columns_equal(left: usize, right: usize) -> Self {
        Expression::Equal(
            Box::new(Expression::Column(left)),
            Box::new(Expression::Column(right)),
        )
    }
}

/// Evaluate an expression against a row.
pub fn evaluate(expr: &Expression, row: &Row) -> Result<Value> {
    match expr {
        Expression::Constant(val) => Ok(val.clone()),

        Expression::Column(index) => row
            .get(*index)
            .cloned()
            .ok_or(Error::ColumnOutOfBounds(*index)),

        Expression::Equal(left, right) => compare(left, right, row, |o| o == std::cmp::Ordering::Equal),
        Expression::NotEqual(left, right) => compare(left, right, row, |o| o != std::cmp::Ordering::Equal),
        Expression::LessThan(left, right) => compare(left, right, row, |o| o == std::cmp::Ordering::Less),
        Expression::GreaterThan(left, right) => {
            compare(left, right, row, |o| o == std::cmp::Ordering::Greater)
        }

        Expression::And(left, right) => {
            let l = evaluate(left, row)?;
            let r = evaluate(right, row)?;
            match (&l, &r) {
                (Value::Bool(false), _) | (_, Value::Bool(false)) => Ok(Value::Bool(false)),
                (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
                _ => Ok(Value::Bool(l.to_bool()? && r.to_bool()?)),
            }
        }
        Expression::Or(left, right) => {
            let l = evaluate(left, row)?;
            let r = evaluate(right, row)?;
            match (&l, &r) {
                (Value::Bool(true), _) | (_, Value::Bool(true)) => Ok(Value::Bool(true)),
                (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
                _ => Ok(Value::Bool(l.to_bool()? || r.to_bool()?)),
            }
        }
        Expression::Not(inner) => match evaluate(inner, row)? {
            Value::Null => Ok(Value::Null),
            v => Ok(Value::Bool(!v.to_bool()?)),
        },
        Expression::IsNull(inner) => Ok(Value::Bool(evaluate(inner, row)?.is_null())),

        Expression::Add(left, right) => {
            Ok(evaluate(left, row)?.add(&evaluate(right, row)?)?)
        }
        Expression::Subtract(left, right) => {
            Ok(evaluate(left, row)?.subtract(&evaluate(right, row)?)?)
        }
        Expression::Multiply(left, right) => {
            Ok(evaluate(left, row)?.multiply(&evaluate(right, row)?)?)
        }
        Expression::Divide(left, right) => {
            Ok(evaluate(left, row)?.divide(&evaluate(right, row)?)?)
        }
    }
}

/// Evaluate a predicate: NULL counts as false.
pub fn matches(expr: &Expression, row: &Row) -> Result<bool> {
    match evaluate(expr, row)? {
        Value::Bool(b) => Ok(b),
        Value::Null => Ok(false),
        v => Err(Error::InvalidValue(format!(
            "predicate returned {}, expected boolean",
            v
        ))),
    }
}

fn compare(
    left: &Expression,
    right: &Expression,
    row: &Row,
    test: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<Value> {
    let l = evaluate(left, row)?;
    let r = evaluate(right, row)?;
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::Bool(test(l.cmp(&r))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_comparison() {
        let row = vec![Value::I64(1), Value::I64(2)];
        let expr = Expression::columns_equal(0, 1);
        assert_eq!(evaluate(&expr, &row).unwrap(), Value::Bool(false));
        assert!(!matches(&expr, &row).unwrap());

        let expr = Expression::LessThan(
            Box::new(Expression::Column(0)),
            Box::new(Expression::Column(1)),
        );
        assert!(matches(&expr, &row).unwrap());
    }

    #[test]
    fn test_null_never_equals_null() {
        let row = vec![Value::Null, Value::Null];
        let expr = Expression::columns_equal(0, 1);
        assert_eq!(evaluate(&expr, &row).unwrap(), Value::Null);
        assert!(!matches(&expr, &row).unwrap());
    }

    #[test]
    fn test_three_valued_and_or() {
        let row = vec![Value::Null];
        let null = || Box::new(Expression::Column(0));
        let t = || Box::new(Expression::Constant(Value::Bool(true)));
        let f = || Box::new(Expression::Constant(Value::Bool(false)));

        assert_eq!(
            evaluate(&Expression::And(null(), f()), &row).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            evaluate(&Expression::And(null(), t()), &row).unwrap(),
            Value::Null
        );
        assert_eq!(
            evaluate(&Expression::Or(null(), t()), &row).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            evaluate(&Expression::Or(null(), f()), &row).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_column_out_of_bounds_is_fatal() {
        let row = vec![Value::I64(1)];
        assert_eq!(
            evaluate(&Expression::Column(5), &row),
            Err(Error::ColumnOutOfBounds(5))
        );
    }
}
