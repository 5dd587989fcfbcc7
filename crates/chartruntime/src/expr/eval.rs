use super::parser::{BinaryOp, Expr, UnaryOp};
use crate::Environment;
use chartcore::{EvalError, Value};

/// Tree-walking evaluation against the current environment.
pub fn eval(expr: &Expr, env: &Environment) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Ident(name) => env.get(name).cloned(),
        Expr::Unary { op, operand } => {
            let value = eval(operand, env)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
                UnaryOp::Neg => match value.as_number() {
                    Some(n) => Ok(Value::Number(-n)),
                    None => Err(mismatch("unary -", "number", value)),
                },
            }
        }
        Expr::Binary { op, left, right } => eval_binary(*op, left, right, env),
    }
}

fn eval_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    env: &Environment,
) -> Result<Value, EvalError> {
    // Logical operators short-circuit; the right side may never run.
    if op == BinaryOp::And {
        let l = eval(left, env)?;
        if !l.truthy() {
            return Ok(Value::Bool(false));
        }
        return Ok(Value::Bool(eval(right, env)?.truthy()));
    }
    if op == BinaryOp::Or {
        let l = eval(left, env)?;
        if l.truthy() {
            return Ok(Value::Bool(true));
        }
        return Ok(Value::Bool(eval(right, env)?.truthy()));
    }

    let l = eval(left, env)?;
    let r = eval(right, env)?;

    match op {
        // `+` doubles as string concatenation, like the editor's host eval
        BinaryOp::Add => match (&l, &r) {
            (Value::Str(a), b) => Ok(Value::Str(format!("{}{}", a, b))),
            (a, Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            _ => Err(mismatch("+", "number or string", l.clone())),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            let (a, b) = numeric_operands(op, &l, &r)?;
            // Division by zero follows IEEE 754 (infinity / NaN), matching
            // the behavior the editor inherited from its host runtime.
            let result = match op {
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Mod => a % b,
                _ => unreachable!(),
            };
            Ok(Value::Number(result))
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordered = match (&l, &r) {
                (Value::Number(a), Value::Number(b)) => compare(op, a.partial_cmp(b)),
                (Value::Str(a), Value::Str(b)) => compare(op, a.partial_cmp(b)),
                _ => {
                    let found = if matches!(l, Value::Number(_)) {
                        r.clone()
                    } else {
                        l.clone()
                    };
                    return Err(mismatch(op.symbol(), "two numbers or two strings", found));
                }
            };
            Ok(Value::Bool(ordered))
        }
        BinaryOp::Eq => Ok(Value::Bool(l == r)),
        BinaryOp::Ne => Ok(Value::Bool(l != r)),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn numeric_operands(op: BinaryOp, l: &Value, r: &Value) -> Result<(f64, f64), EvalError> {
    match (l.as_number(), r.as_number()) {
        (Some(a), Some(b)) => Ok((a, b)),
        (None, _) => Err(mismatch(op.symbol(), "number", l.clone())),
        (_, None) => Err(mismatch(op.symbol(), "number", r.clone())),
    }
}

fn compare(op: BinaryOp, ordering: Option<std::cmp::Ordering>) -> bool {
    // NaN comparisons are always false
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Ge => ordering.is_ge(),
        _ => unreachable!(),
    }
}

fn mismatch(operation: &str, expected: &'static str, found: Value) -> EvalError {
    EvalError::TypeMismatch {
        operation: operation.to_string(),
        expected,
        found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{parse, tokenize};

    fn eval_text(text: &str, env: &Environment) -> Result<Value, EvalError> {
        eval(&parse(text, tokenize(text).unwrap())?, env)
    }

    #[test]
    fn equality_across_types_is_unequal_not_an_error() {
        let env = Environment::new();
        assert_eq!(eval_text("1 == \"1\"", &env).unwrap(), Value::Bool(false));
        assert_eq!(eval_text("1 != \"1\"", &env).unwrap(), Value::Bool(true));
        assert_eq!(eval_text("true == true", &env).unwrap(), Value::Bool(true));
    }

    #[test]
    fn short_circuit_skips_the_right_side() {
        // `missing` is unbound; && must not evaluate it when left is false
        let env = Environment::new();
        assert_eq!(
            eval_text("1 > 2 && missing", &env).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            eval_text("2 > 1 || missing", &env).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn string_ordering_is_lexicographic() {
        let env = Environment::new();
        assert_eq!(
            eval_text("\"apple\" < \"banana\"", &env).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn ordering_across_types_is_an_error() {
        let env = Environment::new();
        assert!(matches!(
            eval_text("\"apple\" < 3", &env),
            Err(EvalError::TypeMismatch { .. })
        ));
    }
}
