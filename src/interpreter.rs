use crate::ast::*;
use crate::error::ExprError;
use crate::value::Value;

/// Evaluate a parsed expression. The only runtime error is a reference to
/// an unknown name; everything else coerces.
pub fn evaluate(expr: &Expr) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Name { name, begin, end } => Err(ExprError::reference_error(name, *begin, *end)),
        Expr::Unary { op, operand } => {
            let value = evaluate(operand)?;
            Ok(apply_unary(*op, &value))
        }
        Expr::Binary { op, left, right } => {
            let left = evaluate(left)?;
            let right = evaluate(right)?;
            Ok(apply_binary(*op, &left, &right))
        }
        // Short-circuit: the right side is only evaluated when needed, and
        // the result is the deciding operand itself.
        Expr::Logical { op, left, right } => {
            let left = evaluate(left)?;
            match (op, left.is_truthy()) {
                (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                _ => evaluate(right),
            }
        }
    }
}

fn apply_unary(op: UnaryOp, value: &Value) -> Value {
    match op {
        UnaryOp::Not => Value::Bool(!value.is_truthy()),
        UnaryOp::Neg => Value::Number(-value.to_number()),
        UnaryOp::Plus => Value::Number(value.to_number()),
    }
}

fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Lt => compare(left, right, |o| o == std::cmp::Ordering::Less),
        BinaryOp::Le => compare(left, right, |o| o != std::cmp::Ordering::Greater),
        BinaryOp::Gt => compare(left, right, |o| o == std::cmp::Ordering::Greater),
        BinaryOp::Ge => compare(left, right, |o| o != std::cmp::Ordering::Less),
        BinaryOp::Eq => Value::Bool(left.loose_eq(right)),
        BinaryOp::Ne => Value::Bool(!left.loose_eq(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_eq(right)),
        BinaryOp::StrictNe => Value::Bool(!left.strict_eq(right)),
    }
}

/// `+` concatenates when either side is a string, otherwise adds.
fn add(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::String(_), _) | (_, Value::String(_)) => {
            Value::String(format!("{}{}", left, right))
        }
        _ => Value::Number(left.to_number() + right.to_number()),
    }
}

/// Relational comparison: two strings compare lexicographically, anything
/// else numerically. A NaN on either side makes every comparison false.
fn compare(left: &Value, right: &Value, accept: impl Fn(std::cmp::Ordering) -> bool) -> Value {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    };
    Value::Bool(ordering.map_or(false, accept))
}
