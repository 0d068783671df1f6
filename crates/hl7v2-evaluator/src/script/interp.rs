// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Script interpreter
//!
//! A tree walk over the parsed script. Unknown variables evaluate to null
//! rather than failing: templates routinely guard on `isNotBlank` against
//! vars that resolved to nothing.

use super::ast::{BinaryOp, ScriptExpr, UnaryOp};
use crate::error::{FieldError, FieldResult};
use crate::functions::{CallEnv, FunctionRegistry};
use crate::scope::Scope;
use serde_json::Value;

/// Evaluate a script expression against the scope
pub fn evaluate_script(
    expr: &ScriptExpr,
    scope: &Scope<'_>,
    registry: &FunctionRegistry,
    env: &CallEnv<'_>,
) -> FieldResult<Value> {
    match expr {
        ScriptExpr::Literal(value) => Ok(value.clone()),
        ScriptExpr::Identifier(name) => {
            Ok(scope.var(name).cloned().unwrap_or(Value::Null))
        }
        ScriptExpr::Call { name, args } => {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(evaluate_script(arg, scope, registry, env)?);
            }
            registry.call(env, name, &evaluated)
        }
        ScriptExpr::Unary { op, operand } => {
            let value = evaluate_script(operand, scope, registry, env)?;
            apply_unary(*op, value)
        }
        ScriptExpr::Binary { op, left, right } => match op {
            // Short-circuit forms evaluate the right side lazily
            BinaryOp::And => {
                let left = evaluate_script(left, scope, registry, env)?;
                if !is_truthy(&left) {
                    return Ok(Value::Bool(false));
                }
                let right = evaluate_script(right, scope, registry, env)?;
                Ok(Value::Bool(is_truthy(&right)))
            }
            BinaryOp::Or => {
                let left = evaluate_script(left, scope, registry, env)?;
                if is_truthy(&left) {
                    return Ok(Value::Bool(true));
                }
                let right = evaluate_script(right, scope, registry, env)?;
                Ok(Value::Bool(is_truthy(&right)))
            }
            _ => {
                let left = evaluate_script(left, scope, registry, env)?;
                let right = evaluate_script(right, scope, registry, env)?;
                apply_binary(*op, left, right)
            }
        },
        ScriptExpr::Conditional {
            condition,
            then_expr,
            else_expr,
        } => {
            let condition = evaluate_script(condition, scope, registry, env)?;
            if is_truthy(&condition) {
                evaluate_script(then_expr, scope, registry, env)
            } else {
                evaluate_script(else_expr, scope, registry, env)
            }
        }
    }
}

/// Truthiness: false, null, zero and blank strings are falsy
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

fn apply_unary(op: UnaryOp, value: Value) -> FieldResult<Value> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!is_truthy(&value))),
        UnaryOp::Negate => match as_f64(&value) {
            Some(n) => Ok(number(-n)),
            None => Err(FieldError::script(format!("cannot negate {value}"))),
        },
    }
}

fn apply_binary(op: BinaryOp, left: Value, right: Value) -> FieldResult<Value> {
    match op {
        BinaryOp::Add => {
            if let (Some(l), Some(r)) = (as_f64(&left), as_f64(&right)) {
                return Ok(number(l + r));
            }
            // String concatenation; nulls contribute nothing
            Ok(Value::String(format!(
                "{}{}",
                as_concat_text(&left),
                as_concat_text(&right)
            )))
        }
        BinaryOp::Subtract => {
            let (Some(l), Some(r)) = (as_f64(&left), as_f64(&right)) else {
                return Err(FieldError::script(format!(
                    "arithmetic on non-numeric values {left} and {right}"
                )));
            };
            Ok(number(l - r))
        }
        BinaryOp::Equal => Ok(Value::Bool(loose_equal(&left, &right))),
        BinaryOp::NotEqual => Ok(Value::Bool(!loose_equal(&left, &right))),
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            let ordering = compare(&left, &right)?;
            Ok(Value::Bool(match op {
                BinaryOp::Less => ordering.is_lt(),
                BinaryOp::LessEqual => ordering.is_le(),
                BinaryOp::Greater => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit forms handled by caller"),
    }
}

fn loose_equal(left: &Value, right: &Value) -> bool {
    if let (Some(l), Some(r)) = (as_f64(left), as_f64(right)) {
        return l == r;
    }
    left == right
}

fn compare(left: &Value, right: &Value) -> FieldResult<std::cmp::Ordering> {
    if let (Some(l), Some(r)) = (as_f64(left), as_f64(right)) {
        return l.partial_cmp(&r).ok_or_else(|| {
            FieldError::script("comparison of incomparable numbers")
        });
    }
    if let (Value::String(l), Value::String(r)) = (left, right) {
        return Ok(l.cmp(r));
    }
    Err(FieldError::script(format!(
        "cannot compare {left} and {right}"
    )))
}

fn as_f64(value: &Value) -> Option<f64> {
    value.as_f64()
}

fn as_concat_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < (i64::MAX as f64) {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SequentialIdProvider;
    use crate::scope::Frame;
    use crate::script::parse_script;
    use serde_json::json;

    fn run(source: &str, scope: &Scope<'_>) -> FieldResult<Value> {
        let ids = SequentialIdProvider::new("id");
        let registry = FunctionRegistry::standard();
        let env = CallEnv { ids: &ids };
        let expr = parse_script(source)?;
        evaluate_script(&expr, scope, &registry, &env)
    }

    #[test]
    fn test_ternary_with_host_function() {
        let scope = Scope::with_frame(
            Frame::new().with_var("discharge".to_string(), json!("201209122222")),
        );
        let value = run(
            "StringUtils.isNotBlank(discharge) ? 'finished' : 'in-progress'",
            &scope,
        )
        .unwrap();
        assert_eq!(value, json!("finished"));

        let empty = Scope::new();
        let value = run(
            "StringUtils.isNotBlank(discharge) ? 'finished' : 'in-progress'",
            &empty,
        )
        .unwrap();
        assert_eq!(value, json!("in-progress"));
    }

    #[test]
    fn test_unknown_variable_is_null() {
        let scope = Scope::new();
        assert_eq!(run("missing", &scope).unwrap(), Value::Null);
    }

    #[test]
    fn test_string_concatenation() {
        let scope = Scope::with_frame(Frame::new().with_var("a".to_string(), json!("x")));
        assert_eq!(run("a + '-' + a", &scope).unwrap(), json!("x-x"));
        // Null contributes nothing to concatenation
        assert_eq!(run("a + missing", &scope).unwrap(), json!("x"));
    }

    #[test]
    fn test_arithmetic() {
        let scope = Scope::new();
        assert_eq!(run("1 + 2 - 4", &scope).unwrap(), json!(-1));
        assert_eq!(run("1.5 + 1", &scope).unwrap(), json!(2.5));
        assert!(run("'a' - 1", &scope).is_err());
    }

    #[test]
    fn test_equality_and_comparison() {
        let scope = Scope::with_frame(Frame::new().with_var("n".to_string(), json!(5)));
        assert_eq!(run("n == 5", &scope).unwrap(), json!(true));
        assert_eq!(run("n != 5", &scope).unwrap(), json!(false));
        assert_eq!(run("n > 3 && n <= 5", &scope).unwrap(), json!(true));
        assert_eq!(run("'a' < 'b'", &scope).unwrap(), json!(true));
    }

    #[test]
    fn test_short_circuit() {
        let scope = Scope::new();
        // The right side would fail, but is never evaluated
        assert_eq!(run("false && ('a' - 1)", &scope).unwrap(), json!(false));
        assert_eq!(run("true || ('a' - 1)", &scope).unwrap(), json!(true));
    }

    #[test]
    fn test_unary() {
        let scope = Scope::new();
        assert_eq!(run("!''", &scope).unwrap(), json!(true));
        assert_eq!(run("-3 + 5", &scope).unwrap(), json!(2));
    }
}
