//! Hook for an external schema validator.
//!
//! The engine does not validate values itself. A [`Validator`] receives the
//! extracted value and the validation copy of the schema, and reports
//! problems with JSON-pointer or URI-fragment paths; the tree maps those
//! back onto its nodes.

use crate::error::Result;
use crate::node::NodeId;
use crate::tree::FormTree;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One problem reported by a validator.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
}

/// Validates a value against a schema; `None` means valid.
pub trait Validator {
    fn validate(&self, value: &Value, schema: &Value) -> Option<ValidationReport>;
}

impl<F> Validator for F
where
    F: Fn(&Value, &Value) -> Option<ValidationReport>,
{
    fn validate(&self, value: &Value, schema: &Value) -> Option<ValidationReport> {
        self(value, schema)
    }
}

/// A validation issue located in the tree.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldIssue {
    /// Concrete key path, when the reported path could be mapped.
    pub key: Option<String>,
    /// The node bound to `key`, when it is rendered.
    pub node: Option<NodeId>,
    pub issue: ValidationIssue,
}

impl FormTree {
    /// Extract the current values and run `validator` over them.
    pub fn validate(&self, validator: &dyn Validator) -> Result<Vec<FieldIssue>> {
        let value = self.values()?;
        let Some(report) = validator.validate(&value, self.validation_schema()) else {
            return Ok(Vec::new());
        };
        Ok(report
            .errors
            .into_iter()
            .map(|issue| {
                let key = issue
                    .path
                    .as_deref()
                    .or(issue.uri.as_deref())
                    .and_then(pointer_to_key);
                let node = key.as_deref().and_then(|k| self.find_by_key(k));
                FieldIssue { key, node, issue }
            })
            .collect())
    }
}

/// `/a/0/b`, `#/a/0/b` or `urn:x#/a/0/b` → `a[0].b`.
pub fn pointer_to_key(pointer: &str) -> Option<String> {
    let pointer = match pointer.rfind('#') {
        Some(pos) => &pointer[pos + 1..],
        None => pointer,
    };
    let mut key = String::new();
    for token in pointer.split('/').filter(|t| !t.is_empty()) {
        let token = token.replace("~1", "/").replace("~0", "~");
        if !key.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
            key.push('[');
            key.push_str(&token);
            key.push(']');
        } else {
            if !key.is_empty() {
                key.push('.');
            }
            key.push_str(&token);
        }
    }
    (!key.is_empty()).then_some(key)
}
