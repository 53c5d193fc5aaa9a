//! Unary and binary operators.
//!
//! Arithmetic works on `f64`, bitwise operators on `i64`.  A `Null` operand
//! lifts arithmetic and bitwise results to `Null`; comparisons with `Null`
//! are `false` and logical operators read `Null` as `false`.

use super::syntax::{BinaryOp, UnaryOp};
use super::value::{coercion_error, Value};
use crate::error::RuntimeError;

pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, RuntimeError> {
    Ok(match op {
        UnaryOp::NumericNegate => match operand {
            Value::Int(n) => Value::Int(n.wrapping_neg()),
            other => other.to_number()?.map_or(Value::Null, |x| Value::Number(-x)),
        },
        UnaryOp::LogicalNegate => operand.to_bool()?.map_or(Value::Null, |b| Value::Bool(!b)),
        UnaryOp::BitwiseNegate => operand.to_integer()?.map_or(Value::Null, |n| Value::Int(!n)),
    })
}

pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    match op {
        BinaryOp::Plus => match left {
            Value::Str(s) => Ok(Value::Str(format!("{s}{right}"))),
            _ => arithmetic(left, right, |a, b| a + b),
        },
        BinaryOp::Minus => arithmetic(left, right, |a, b| a - b),
        BinaryOp::Multiply => arithmetic(left, right, |a, b| a * b),
        BinaryOp::Divide => arithmetic(left, right, |a, b| a / b),
        BinaryOp::Modulus => arithmetic(left, right, |a, b| a % b),
        BinaryOp::Pow => {
            let base = left.to_number()?.ok_or_else(|| coercion_error(left, "number"))?;
            let exp = right.to_number()?.ok_or_else(|| coercion_error(right, "number"))?;
            Ok(Value::Number(base.powf(exp)))
        }
        BinaryOp::BitwiseAnd => bitwise(left, right, |a, b| a & b),
        BinaryOp::BitwiseOr => bitwise(left, right, |a, b| a | b),
        BinaryOp::LogicalAnd => Ok(Value::Bool(truthy(left)? & truthy(right)?)),
        BinaryOp::LogicalOr => Ok(Value::Bool(truthy(left)? | truthy(right)?)),
        BinaryOp::LessThan => compare(left, right, |a, b| a < b),
        BinaryOp::GreaterThan => compare(left, right, |a, b| a > b),
    }
}

/// Condition value: `Null` is `false`, anything but a bool is an error.
pub fn truthy(value: &Value) -> Result<bool, RuntimeError> {
    Ok(value.to_bool()?.unwrap_or(false))
}

fn arithmetic(left: &Value, right: &Value, f: fn(f64, f64) -> f64) -> Result<Value, RuntimeError> {
    let (a, b) = (left.to_number()?, right.to_number()?);
    Ok(match (a, b) {
        (Some(a), Some(b)) => Value::Number(f(a, b)),
        _ => Value::Null,
    })
}

fn bitwise(left: &Value, right: &Value, f: fn(i64, i64) -> i64) -> Result<Value, RuntimeError> {
    let (a, b) = (left.to_integer()?, right.to_integer()?);
    Ok(match (a, b) {
        (Some(a), Some(b)) => Value::Int(f(a, b)),
        _ => Value::Null,
    })
}

fn compare(left: &Value, right: &Value, f: fn(f64, f64) -> bool) -> Result<Value, RuntimeError> {
    let (a, b) = (left.to_number()?, right.to_number()?);
    Ok(Value::Bool(match (a, b) {
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    }))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
