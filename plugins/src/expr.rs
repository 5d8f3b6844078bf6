//! A small evaluator for manifest expressions.
//!
//! Supported forms:
//! - JSON literals: `"net"`, `42`, `true`, `["a", "b"]`, `{"k": 1}`
//! - `outputs.<path>`: lookup into a sharing backend's output document;
//!   numeric segments index lists (`outputs.subnets.0`)
//! - `stack.<field>`: `id`, `path`, `name`, `description`, `tags`
//! - `env.<NAME>`: a variable of the stackflow process environment

use std::collections::HashMap;

use serde_json::Value;
use stackflow_core::api::{EvalContext, EvalError, Stack};

#[derive(Debug, Clone, Default)]
pub struct PathEvaluator {
    /// Fixed environment; `None` reads the process environment.
    env: Option<HashMap<String, String>>,
}

impl PathEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env(env: HashMap<String, String>) -> Self {
        Self { env: Some(env) }
    }

    fn env_var(&self, name: &str) -> Option<String> {
        match &self.env {
            Some(env) => env.get(name).cloned(),
            None => std::env::var(name).ok(),
        }
    }

    /// Evaluates `expr` and renders the result as a plain string, for
    /// environment values and the like. Only scalars are accepted.
    pub fn eval_string(&self, stack: &Stack, expr: &str) -> Result<String, EvalError> {
        match self.eval(stack, expr, None)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(EvalError::NotAString {
                expr: expr.to_string(),
                got: other.to_string(),
            }),
        }
    }

    /// Replaces every `${expr}` in `template`.
    pub fn interpolate(&self, stack: &Stack, template: &str) -> Result<String, EvalError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                return Err(EvalError::Expr {
                    expr: template.to_string(),
                    reason: "unterminated ${".to_string(),
                });
            };
            out.push_str(&self.eval_string(stack, after[..end].trim())?);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

impl EvalContext for PathEvaluator {
    fn eval(&self, stack: &Stack, expr: &str, outputs: Option<&Value>) -> Result<Value, EvalError> {
        let expr = expr.trim();
        let err = |reason: String| EvalError::Expr {
            expr: expr.to_string(),
            reason,
        };

        if let Some(path) = expr.strip_prefix("outputs.") {
            let root = outputs.ok_or_else(|| err("outputs are not available here".into()))?;
            return lookup(root, path).cloned().ok_or_else(|| err("no such output".into()));
        }

        if let Some(field) = expr.strip_prefix("stack.") {
            return match field {
                "id" => Ok(Value::String(stack.id.clone())),
                "path" => Ok(Value::String(stack.dir.clone())),
                "name" => Ok(Value::String(stack.name.clone())),
                "description" => Ok(Value::String(stack.description.clone())),
                "tags" => Ok(Value::from(stack.tags.clone())),
                other => Err(err(format!("unknown stack field {other:?}"))),
            };
        }

        if let Some(name) = expr.strip_prefix("env.") {
            return self
                .env_var(name)
                .map(Value::String)
                .ok_or_else(|| err(format!("environment variable {name} is not set")));
        }

        serde_json::from_str(expr).map_err(|e| err(e.to_string()))
    }
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |cur, seg| match cur {
        Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => cur.get(seg),
    })
}
