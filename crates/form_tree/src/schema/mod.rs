//! Data schema handling.
//!
//! A raw JSON schema goes through three stages:
//!
//! 1. [`normalize::expand_shorthand`] wraps a bare property map into an
//!    object schema.
//! 2. [`normalize::rewrite_legacy`] rewrites draft-3 conventions
//!    (`readonly`, boolean `required`, tuple `items`) into canonical form.
//!    The result is kept verbatim for external validators.
//! 3. [`compile`] copies the rewritten schema into a [`SchemaArena`],
//!    resolving `#/definitions/...` references by sharing arena ids.
//!
//! The arena is read-only afterwards except for [`SchemaMarkers`], which the
//! tree builder sets to flag special value encodings.

mod compile;
pub mod lookup;
pub mod normalize;

pub use compile::compile;
pub use lookup::{resolve_schema_path, schema_default_at, FieldSchema, SchemaLookup};

use crate::error::Result;
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};
use tracing::{debug, warn};

/// Index of a [`SchemaNode`] inside its [`SchemaArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(pub(crate) usize);

impl SchemaId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// JSON schema primitive types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum SchemaType {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
    Null,
}

/// How a multi-checkbox field reports its state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckboxEncoding {
    /// Each checked box carries the option value itself.
    Value,
    /// Each box only reports "checked"; the value comes from the enum.
    Presence,
}

/// Internal markers set while building the tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchemaMarkers {
    pub checkboxes_as_array: Option<CheckboxEncoding>,
    pub tagsinput: bool,
    pub allow_empty: bool,
}

/// One normalized schema location.
#[derive(Clone, Debug, Default)]
pub struct SchemaNode {
    pub ty: Option<SchemaType>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Object properties in declaration order.
    pub properties: Vec<(String, SchemaId)>,
    /// Shared definition of every array item.
    pub items: Option<SchemaId>,
    pub enum_values: Option<Vec<Value>>,
    pub default: Option<Value>,
    /// Names of required properties (object schemas only).
    pub required: Vec<String>,
    pub read_only: bool,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<Value>,
    pub exclusive_maximum: Option<Value>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    /// Set when this node stands for a `$ref` that could not be resolved.
    pub unresolved_ref: Option<String>,
    /// Keywords the engine does not interpret (format, pattern, ...).
    pub extra: Map<String, Value>,
    pub markers: SchemaMarkers,
}

impl SchemaNode {
    pub fn property(&self, name: &str) -> Option<SchemaId> {
        self.properties
            .iter()
            .find(|(prop, _)| prop == name)
            .map(|(_, id)| *id)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// An object schema with its own property list.
    pub fn is_structured_object(&self) -> bool {
        self.ty == Some(SchemaType::Object) && !self.properties.is_empty()
    }

    pub fn type_name(&self) -> &str {
        self.ty.as_ref().map(|t| t.as_ref()).unwrap_or("any")
    }
}

/// Owning store of every compiled schema node.
#[derive(Clone, Debug, Default)]
pub struct SchemaArena {
    nodes: Vec<SchemaNode>,
    root: Option<SchemaId>,
}

impl SchemaArena {
    pub fn root(&self) -> SchemaId {
        self.root.unwrap_or(SchemaId(0))
    }

    pub fn get(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    pub(crate) fn get_mut(&mut self, id: SchemaId) -> &mut SchemaNode {
        &mut self.nodes[id.0]
    }

    pub(crate) fn alloc(&mut self, node: SchemaNode) -> SchemaId {
        self.nodes.push(node);
        SchemaId(self.nodes.len() - 1)
    }

    pub(crate) fn set_root(&mut self, id: SchemaId) {
        self.root = Some(id);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Output of [`normalize`].
#[derive(Clone, Debug)]
pub struct NormalizedSchema {
    pub arena: SchemaArena,
    /// Post-rewrite schema with references untouched, for validators.
    pub validation: Value,
    /// `$ref` targets that were left unresolved.
    pub unresolved_refs: Vec<String>,
}

/// Run the whole normalization pipeline over a caller-owned schema.
pub fn normalize(raw: &Value) -> Result<NormalizedSchema> {
    let mut rewritten = normalize::expand_shorthand(raw)?;
    normalize::rewrite_legacy(&mut rewritten)?;

    let (arena, unresolved_refs) = compile(&rewritten)?;
    for reference in &unresolved_refs {
        warn!(%reference, "schema reference left unresolved");
    }
    debug!(nodes = arena.len(), "schema normalized");

    Ok(NormalizedSchema {
        arena,
        validation: rewritten,
        unresolved_refs,
    })
}
