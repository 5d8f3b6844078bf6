//! Expression evaluation seam. The expression language itself lives outside the core.

use serde_json::Value;

use crate::error::EvalError;
use crate::stack::{Input, Stack};

pub trait EvalContext: Send + Sync {
    /// Evaluates `expr` in the scope of `stack`. When `outputs` is given it is
    /// exposed as the `outputs` namespace.
    fn eval(&self, stack: &Stack, expr: &str, outputs: Option<&Value>) -> Result<Value, EvalError>;
}

/// Evaluates an input's `from_stack_id`, which must be a string.
pub fn eval_from_stack_id(
    ctx: &dyn EvalContext,
    stack: &Stack,
    input: &Input,
) -> Result<String, EvalError> {
    match ctx.eval(stack, &input.from_stack_id, None)? {
        Value::String(id) => Ok(id),
        other => Err(EvalError::NotAString {
            expr: input.from_stack_id.clone(),
            got: type_name(&other).to_string(),
        }),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Minimal evaluator for unit tests: quoted strings are literals,
    //! `outputs.a.b` walks the outputs document, everything else is an error.

    use super::*;

    pub struct LiteralEval;

    impl EvalContext for LiteralEval {
        fn eval(
            &self,
            _stack: &Stack,
            expr: &str,
            outputs: Option<&Value>,
        ) -> Result<Value, EvalError> {
            let expr = expr.trim();
            if let Some(s) = expr.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
                return Ok(Value::String(s.to_string()));
            }
            if let Some(path) = expr.strip_prefix("outputs.") {
                let mut cur = outputs.ok_or_else(|| EvalError::Expr {
                    expr: expr.to_string(),
                    reason: "outputs not available".into(),
                })?;
                for key in path.split('.') {
                    cur = cur.get(key).ok_or_else(|| EvalError::Expr {
                        expr: expr.to_string(),
                        reason: format!("unknown attribute {key}"),
                    })?;
                }
                return Ok(cur.clone());
            }
            serde_json::from_str(expr).map_err(|e| EvalError::Expr {
                expr: expr.to_string(),
                reason: e.to_string(),
            })
        }
    }
}
