// ABOUTME: Placeholder interpolation over step executor payloads
// ABOUTME: Substitutes ${NAME} references with literal parameter or output values

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

use super::error::{InterpError, Result};
use super::scope::Scope;
use crate::parser::ExecutorSpec;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex"));

/// Single-pass `${NAME}` substitution. The substituted text is a literal
/// value; placeholders inside it are never re-evaluated.
#[derive(Debug, Clone, Default)]
pub struct Interpolator;

impl Interpolator {
    pub fn new() -> Self {
        Self
    }

    /// Resolve every placeholder in a string against the scope.
    pub fn resolve_str(&self, input: &str, scope: &Scope) -> Result<String> {
        let mut out = String::with_capacity(input.len());
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(input) {
            let whole = caps.get(0).expect("capture 0");
            let name = &caps[1];
            let value = scope
                .lookup(name)
                .ok_or_else(|| InterpError::UnresolvedReference {
                    name: name.to_string(),
                })?;

            out.push_str(&input[last..whole.start()]);
            out.push_str(value);
            last = whole.end();
        }
        out.push_str(&input[last..]);

        Ok(out)
    }

    /// Recursively resolve placeholders in a JSON payload. Strings are
    /// substituted, arrays and object values are descended into; numbers,
    /// booleans, and nulls pass through unchanged.
    pub fn resolve_json(&self, value: &JsonValue, scope: &Scope) -> Result<JsonValue> {
        match value {
            JsonValue::String(s) => Ok(JsonValue::String(self.resolve_str(s, scope)?)),
            JsonValue::Array(arr) => {
                let resolved: Result<Vec<JsonValue>> =
                    arr.iter().map(|v| self.resolve_json(v, scope)).collect();
                Ok(JsonValue::Array(resolved?))
            }
            JsonValue::Object(obj) => {
                let mut resolved_obj = serde_json::Map::new();
                for (key, val) in obj {
                    resolved_obj.insert(key.clone(), self.resolve_json(val, scope)?);
                }
                Ok(JsonValue::Object(resolved_obj))
            }
            other => Ok(other.clone()),
        }
    }

    /// Resolve a step's executor payload into the plain structured form
    /// handed to the runtime backend.
    pub fn resolve_payload(&self, executor: &ExecutorSpec, scope: &Scope) -> Result<JsonValue> {
        let raw = serde_json::to_value(executor)
            .map_err(|e| InterpError::PayloadError(e.to_string()))?;
        self.resolve_json(&raw, scope)
    }

    /// Check if a string contains placeholder references
    pub fn has_placeholders(&self, text: &str) -> bool {
        PLACEHOLDER.is_match(text)
    }
}
