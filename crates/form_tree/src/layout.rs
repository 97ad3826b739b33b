//! Layout descriptions: which fields to show, in what order, nested how.
//!
//! A layout is either the wildcard string `"*"` (one field per top-level
//! schema property) or a list of entries. An entry is a bare key string
//! (shorthand for `{ "key": ... }`), the wildcard, or a full [`LayoutNode`].

use crate::error::{LayoutError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The wildcard marker.
pub const WILDCARD: &str = "*";

/// One layout element as supplied by the caller.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutNode {
    /// Template key path (`a.b[].c`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Element kind; derived from the schema when absent.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<LayoutItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, alias = "readonly", skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub notitle: bool,
    /// Layout-level initial value, used when nothing was submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Explicit option list (array of values / `{value, title}` or a map).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_map: Option<Map<String, Value>>,
    /// This field's value becomes the legend of its array item.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub value_in_legend: bool,
    /// Keep empty strings instead of extracting them as `null`.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub allow_empty: bool,
    /// Per-kind configuration the engine passes through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LayoutNode {
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_items(mut self, items: Vec<LayoutItem>) -> Self {
        self.items = items;
        self
    }
}

/// An entry of a layout list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayoutItem {
    Key(String),
    Node(LayoutNode),
}

impl LayoutItem {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, LayoutItem::Key(key) if key == WILDCARD)
    }

    /// Expand the key shorthand into a node.
    pub fn into_node(self) -> LayoutNode {
        match self {
            LayoutItem::Key(key) => LayoutNode::with_key(key),
            LayoutItem::Node(node) => node,
        }
    }
}

impl From<LayoutNode> for LayoutItem {
    fn from(node: LayoutNode) -> Self {
        LayoutItem::Node(node)
    }
}

impl From<&str> for LayoutItem {
    fn from(key: &str) -> Self {
        LayoutItem::Key(key.to_string())
    }
}

/// A whole layout: the top-level entry list.
#[derive(Clone, Debug, PartialEq)]
pub struct Layout {
    pub items: Vec<LayoutItem>,
}

impl Default for Layout {
    fn default() -> Self {
        Self::wildcard()
    }
}

impl Layout {
    pub fn wildcard() -> Self {
        Self {
            items: vec![LayoutItem::Key(WILDCARD.to_string())],
        }
    }

    pub fn new(items: Vec<LayoutItem>) -> Self {
        Self { items }
    }

    /// Read a layout from JSON: `"*"`, or an array of entries.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) if s == WILDCARD => Ok(Self::wildcard()),
            Value::Array(_) => Ok(Self {
                items: serde_json::from_value(value.clone())?,
            }),
            Value::Null => Ok(Self::wildcard()),
            other => Err(LayoutError::InvalidEntry(format!(
                "a layout must be \"*\" or an array, found {other}"
            ))
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_mixed_entries() {
        let layout = Layout::from_value(&json!([
            "*",
            "name",
            {"key": "age", "type": "range", "readonly": true, "step": 5}
        ]))
        .unwrap();

        assert!(layout.items[0].is_wildcard());
        assert_eq!(layout.items[1], LayoutItem::Key("name".into()));
        let LayoutItem::Node(node) = &layout.items[2] else {
            panic!("expected a node");
        };
        assert_eq!(node.kind.as_deref(), Some("range"));
        assert_eq!(node.read_only, Some(true));
        assert_eq!(node.extra.get("step"), Some(&json!(5)));
    }

    #[test]
    fn wildcard_string_is_a_layout() {
        assert_eq!(Layout::from_value(&json!("*")).unwrap(), Layout::wildcard());
        assert!(Layout::from_value(&json!(42)).is_err());
    }
}
