//! Resolved layout elements.
//!
//! A [`FormElement`] is the outcome of binding one layout entry to the
//! schema. Elements live in an [`ElementArena`] and are shared by every
//! [`FormNode`](crate::node::FormNode) instantiated from them, including all
//! clones of an array's child template. Nothing writes to an element after
//! it has been resolved; per-instance state lives on the node.

use crate::kind::{display, ElementKind};
use crate::layout::LayoutNode;
use crate::path::KeyPath;
use crate::schema::SchemaId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub(crate) usize);

impl ElementId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A selectable option of a choice field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptionItem {
    pub value: Value,
    pub title: String,
}

impl OptionItem {
    pub fn new(value: Value, title: impl Into<String>) -> Self {
        Self {
            value,
            title: title.into(),
        }
    }

    /// Accept either `{value, title}` or a bare value.
    pub fn from_value(raw: &Value) -> Self {
        match raw {
            Value::Object(map) if map.contains_key("value") => {
                let value = map.get("value").cloned().unwrap_or(Value::Null);
                let title = map
                    .get("title")
                    .map(display)
                    .unwrap_or_else(|| display(&value));
                Self { value, title }
            }
            other => Self::new(other.clone(), display(other)),
        }
    }
}

/// A layout entry bound to its schema location.
#[derive(Clone, Debug)]
pub struct FormElement {
    pub kind: ElementKind,
    /// Template key (`a[].b`), if the element is bound to the schema.
    pub key: Option<KeyPath>,
    pub schema: Option<SchemaId>,
    /// Explicit identifier from the layout.
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub legend: Option<String>,
    pub help_value: Option<String>,
    pub placeholder: Option<String>,
    pub read_only: bool,
    pub notitle: bool,
    /// Layout-level initial value.
    pub value: Option<Value>,
    pub options: Vec<OptionItem>,
    pub value_in_legend: bool,
    /// Whether the enclosing object schema lists this property as required.
    pub required: bool,
    pub children: Vec<ElementId>,
    /// Layout of one array item, resolved lazily into the child template.
    pub item_layout: Option<LayoutNode>,
    pub extra: Map<String, Value>,
}

impl FormElement {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            key: None,
            schema: None,
            id: None,
            title: None,
            description: None,
            legend: None,
            help_value: None,
            placeholder: None,
            read_only: false,
            notitle: false,
            value: None,
            options: Vec::new(),
            value_in_legend: false,
            required: false,
            children: Vec::new(),
            item_layout: None,
            extra: Map::new(),
        }
    }
}

/// Owning store of every resolved element of one tree.
#[derive(Clone, Debug, Default)]
pub struct ElementArena {
    elements: Vec<FormElement>,
}

impl ElementArena {
    pub fn get(&self, id: ElementId) -> &FormElement {
        &self.elements[id.0]
    }

    pub(crate) fn alloc(&mut self, element: FormElement) -> ElementId {
        self.elements.push(element);
        ElementId(self.elements.len() - 1)
    }

    /// The first element bound to `template` (a key with `[]` placeholders).
    pub fn find_by_key(&self, template: &KeyPath) -> Option<ElementId> {
        self.elements
            .iter()
            .position(|e| e.key.as_ref() == Some(template))
            .map(ElementId)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
