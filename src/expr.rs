//! Key expressions - JMESPath queries used to derive keys
//!
//! Any JMESPath expression compiles: `name`, `address.city`, `tags[-1]`,
//! `"zip code"`, `length(tags)`, `join('-', [name, city])`, filters and
//! pipes. The result is coerced to a key string; `null`, arrays and
//! objects are not keys.

use crate::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// A compiled key expression.
pub struct KeyExpr {
    text: String,
    compiled: jmespath::Expression<'static>,
}

impl KeyExpr {
    /// Compile an expression string
    pub fn compile(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(Error::InvalidExpression {
                expr: text.to_string(),
                reason: "expression is empty".to_string(),
            });
        }

        let compiled = jmespath::compile(text).map_err(|e| Error::InvalidExpression {
            expr: text.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            text: text.to_string(),
            compiled,
        })
    }

    /// The source text this expression was compiled from
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Evaluate against a field mapping. Missing paths yield `null`.
    ///
    /// Fails only when a function is applied to arguments of the wrong type.
    pub fn evaluate(&self, value: &Value) -> Result<Value> {
        let found = self
            .compiled
            .search(value)
            .map_err(|e| Error::InvalidKey(format!("`{}`: {}", self.text, e)))?;
        serde_json::to_value(&*found).map_err(Error::Serialize)
    }

    /// Evaluate and coerce the result to a key string
    pub fn evaluate_key(&self, value: &Value) -> Result<String> {
        key_string(&self.evaluate(value)?).map_err(|kind| {
            Error::InvalidKey(format!("`{}` evaluated to {}", self.text, kind))
        })
    }
}

impl PartialEq for KeyExpr {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for KeyExpr {}

impl fmt::Debug for KeyExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyExpr").field(&self.text).finish()
    }
}

impl fmt::Display for KeyExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Coerce a scalar JSON value to its key form.
///
/// On failure returns a short description of what was found instead.
pub fn key_string(value: &Value) -> std::result::Result<String, &'static str> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Err("null"),
        Value::Array(_) => Err("an array"),
        Value::Object(_) => Err("an object"),
    }
}

/// Compiled expressions, memoized by source text.
#[derive(Debug, Default)]
pub struct ExprCache {
    compiled: Mutex<HashMap<String, Arc<KeyExpr>>>,
}

impl ExprCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the compiled form of `text`, compiling it on first use
    pub fn get(&self, text: &str) -> Result<Arc<KeyExpr>> {
        let mut compiled = self.compiled.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(expr) = compiled.get(text) {
            return Ok(Arc::clone(expr));
        }
        let expr = Arc::new(KeyExpr::compile(text)?);
        compiled.insert(text.to_string(), Arc::clone(&expr));
        Ok(expr)
    }

    pub fn len(&self) -> usize {
        self.compiled.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
