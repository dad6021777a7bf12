//! Operator application on resolved values.
//!
//! These run after operand resolution, so they never see a stream: mixed
//! operands are combined first and the operator is re-applied per emission.

use std::cmp::Ordering;

use ripple_ast::{BinaryOp, UnaryOp};

use crate::error::EvalError;
use crate::value::Value;

pub fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let out = match op {
        BinaryOp::Add => match (left, right) {
            (Value::Str(_), _) | (_, Value::Str(_)) => Value::Str(
                format!("{}{}", left.to_display_string(), right.to_display_string()).into(),
            ),
            (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => {
                Value::Str(
                    format!("{}{}", left.to_display_string(), right.to_display_string())
                        .into(),
                )
            }
            _ => Value::Number(left.to_number() + right.to_number()),
        },
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Pow => Value::Number(left.to_number().powf(right.to_number())),

        BinaryOp::Eq => Value::Bool(left.loose_eq(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_eq(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_eq(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_eq(right)),

        BinaryOp::Lt => compare(left, right, |o| o == Ordering::Less),
        BinaryOp::LtEq => compare(left, right, |o| o != Ordering::Greater),
        BinaryOp::Gt => compare(left, right, |o| o == Ordering::Greater),
        BinaryOp::GtEq => compare(left, right, |o| o != Ordering::Less),

        BinaryOp::BitAnd => Value::Number(f64::from(left.to_i32() & right.to_i32())),
        BinaryOp::BitOr => Value::Number(f64::from(left.to_i32() | right.to_i32())),
        BinaryOp::BitXor => Value::Number(f64::from(left.to_i32() ^ right.to_i32())),
        BinaryOp::Shl => {
            Value::Number(f64::from(left.to_i32() << (right.to_u32() & 31)))
        }
        BinaryOp::Shr => {
            Value::Number(f64::from(left.to_i32() >> (right.to_u32() & 31)))
        }
        BinaryOp::UShr => {
            Value::Number(f64::from(left.to_u32() >> (right.to_u32() & 31)))
        }

        BinaryOp::In => match right {
            Value::Object(o) => Value::Bool(o.has(&left.to_key())),
            Value::Array(a) => Value::Bool(
                left.to_key()
                    .parse::<usize>()
                    .map(|i| i < a.len())
                    .unwrap_or(false),
            ),
            Value::Reactive(rx) => Value::Bool(rx.has(&left.to_key())),
            other => {
                return Err(EvalError::Type(format!(
                    "cannot use `in` on a value of type {}",
                    other.type_name()
                )))
            }
        },
    };
    Ok(out)
}

fn compare(left: &Value, right: &Value, pick: impl Fn(Ordering) -> bool) -> Value {
    if let (Value::Str(a), Value::Str(b)) = (left, right) {
        return Value::Bool(pick(a.cmp(b)));
    }
    match left.to_number().partial_cmp(&right.to_number()) {
        Some(ordering) => Value::Bool(pick(ordering)),
        // Comparisons against NaN are always false.
        None => Value::Bool(false),
    }
}

pub fn apply_unary(op: UnaryOp, operand: &Value) -> Result<Value, EvalError> {
    let out = match op {
        UnaryOp::Neg => Value::Number(-operand.to_number()),
        UnaryOp::Plus => Value::Number(operand.to_number()),
        UnaryOp::Not => Value::Bool(!operand.is_truthy()),
        UnaryOp::BitNot => Value::Number(f64::from(!operand.to_i32())),
        UnaryOp::TypeOf => Value::Str(type_of(operand).into()),
        UnaryOp::Void => Value::Undefined,
    };
    Ok(out)
}

/// `typeof` vocabulary: data structures (reactive ones included) all read
/// as "object", like the host language this expression dialect mirrors.
fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Undefined => "undefined",
        Value::Null | Value::Array(_) | Value::Object(_) | Value::Stream(_)
        | Value::Reactive(_) => "object",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::Str(_) => "string",
        Value::Function(_) => "function",
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(BinaryOp::Add, Value::Number(2.0), Value::Number(3.0), Value::Number(5.0))]
    #[case(BinaryOp::Add, Value::str("a"), Value::Number(1.0), Value::str("a1"))]
    #[case(BinaryOp::Add, Value::Number(1.0), Value::str("a"), Value::str("1a"))]
    #[case(BinaryOp::Sub, Value::str("5"), Value::Number(2.0), Value::Number(3.0))]
    #[case(BinaryOp::Mul, Value::Bool(true), Value::Number(8.0), Value::Number(8.0))]
    #[case(BinaryOp::Pow, Value::Number(2.0), Value::Number(10.0), Value::Number(1024.0))]
    #[case(BinaryOp::Rem, Value::Number(7.0), Value::Number(4.0), Value::Number(3.0))]
    fn arithmetic(
        #[case] op: BinaryOp,
        #[case] left: Value,
        #[case] right: Value,
        #[case] expected: Value,
    ) {
        assert_eq!(apply_binary(op, &left, &right), Ok(expected));
    }

    #[rstest]
    #[case(BinaryOp::Lt, Value::str("a"), Value::str("b"), true)]
    #[case(BinaryOp::Lt, Value::str("10"), Value::Number(9.0), false)]
    #[case(BinaryOp::GtEq, Value::Number(3.0), Value::Number(3.0), true)]
    #[case(BinaryOp::Lt, Value::Undefined, Value::Number(1.0), false)]
    #[case(BinaryOp::GtEq, Value::Undefined, Value::Number(1.0), false)]
    fn comparisons(
        #[case] op: BinaryOp,
        #[case] left: Value,
        #[case] right: Value,
        #[case] expected: bool,
    ) {
        assert_eq!(apply_binary(op, &left, &right), Ok(Value::Bool(expected)));
    }

    #[test]
    fn division_by_zero_is_infinite() {
        let out = apply_binary(BinaryOp::Div, &Value::Number(1.0), &Value::Number(0.0));
        assert_eq!(out, Ok(Value::Number(f64::INFINITY)));
    }

    #[test]
    fn bitwise_wraps_to_int32() {
        let out = apply_binary(
            BinaryOp::BitOr,
            &Value::Number(4294967296.0),
            &Value::Number(0.0),
        );
        assert_eq!(out, Ok(Value::Number(0.0)));
        let shifted = apply_binary(BinaryOp::UShr, &Value::Number(-1.0), &Value::Number(0.0));
        assert_eq!(shifted, Ok(Value::Number(4294967295.0)));
    }

    #[test]
    fn in_checks_key_presence() {
        let obj = Value::object(vec![("a".into(), Value::Number(1.0))]);
        assert_eq!(
            apply_binary(BinaryOp::In, &Value::str("a"), &obj),
            Ok(Value::Bool(true))
        );
        let arr = Value::array(vec![Value::Number(9.0)]);
        assert_eq!(
            apply_binary(BinaryOp::In, &Value::Number(0.0), &arr),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            apply_binary(BinaryOp::In, &Value::Number(1.0), &arr),
            Ok(Value::Bool(false))
        );
        assert!(apply_binary(BinaryOp::In, &Value::str("x"), &Value::Number(1.0)).is_err());
    }

    #[test]
    fn unary_forms() {
        assert_eq!(
            apply_unary(UnaryOp::Neg, &Value::str("3")),
            Ok(Value::Number(-3.0))
        );
        assert_eq!(apply_unary(UnaryOp::Not, &Value::str("")), Ok(Value::Bool(true)));
        assert_eq!(
            apply_unary(UnaryOp::BitNot, &Value::Number(0.0)),
            Ok(Value::Number(-1.0))
        );
        assert_eq!(
            apply_unary(UnaryOp::TypeOf, &Value::Null),
            Ok(Value::str("object"))
        );
        assert_eq!(
            apply_unary(UnaryOp::TypeOf, &Value::Undefined),
            Ok(Value::str("undefined"))
        );
        assert_eq!(apply_unary(UnaryOp::Void, &Value::Number(9.0)), Ok(Value::Undefined));
    }

    fn is_true(result: Result<Value, EvalError>) -> bool {
        result == Ok(Value::Bool(true))
    }

    proptest! {
        #[test]
        fn ordering_is_consistent(a in -1e9f64..1e9, b in -1e9f64..1e9) {
            let l = Value::Number(a);
            let r = Value::Number(b);
            prop_assert_eq!(
                is_true(apply_binary(BinaryOp::Lt, &l, &r)),
                is_true(apply_binary(BinaryOp::Gt, &r, &l))
            );
            prop_assert_ne!(
                is_true(apply_binary(BinaryOp::Lt, &l, &r)),
                is_true(apply_binary(BinaryOp::GtEq, &l, &r))
            );
        }

        #[test]
        fn double_negation_round_trips_int32(n in -1e12f64..1e12) {
            let twice = apply_unary(UnaryOp::BitNot, &Value::Number(n))
                .and_then(|once| apply_unary(UnaryOp::BitNot, &once));
            prop_assert_eq!(twice, Ok(Value::Number(f64::from(n.trunc() as i64 as u32 as i32))));
        }

        #[test]
        fn strict_equality_is_reflexive_for_numbers(n in -1e9f64..1e9) {
            prop_assert!(is_true(apply_binary(BinaryOp::StrictEq, &Value::Number(n), &Value::Number(n))));
        }
    }
}
