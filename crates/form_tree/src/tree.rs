//! The form tree: owner of the schema, the resolved elements and the live
//! nodes.

use crate::build::TreeBuilder;
use crate::compute::ComputeArgs;
use crate::element::{ElementArena, ElementId, FormElement};
use crate::error::Result;
use crate::extract::{extract, FieldEntry, RawValue};
use crate::kind::KindRegistry;
use crate::layout::Layout;
use crate::node::{FormNode, NodeArena, NodeId};
use crate::schema::{self, NormalizedSchema, SchemaArena, SchemaNode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// Caller configuration of one tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormTreeOptions {
    /// Prefix of every generated identifier.
    pub prefix: String,
    /// Schema keys left out of wildcard and schema-driven expansion.
    pub non_default_form_items: Vec<String>,
    /// Extra names visible to templates.
    pub tpldata: Map<String, Value>,
    /// Appended to string defaults cut down to `maxLength`.
    pub ellipsis: String,
}

impl Default for FormTreeOptions {
    fn default() -> Self {
        Self {
            prefix: "jsonform".into(),
            non_default_form_items: Vec::new(),
            tpldata: Map::new(),
            ellipsis: "…".into(),
        }
    }
}

/// The single JSON document a host hands over: schema, layout, previous
/// values and options side by side.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDescriptor {
    pub schema: Value,
    #[serde(default)]
    pub form: Option<Value>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(flatten)]
    pub options: FormTreeOptions,
}

impl FormDescriptor {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn into_tree(self) -> Result<FormTree> {
        let layout = match &self.form {
            Some(form) => Layout::from_value(form)?,
            None => Layout::wildcard(),
        };
        let mut builder = FormTree::builder(self.schema)
            .layout(layout)
            .options(self.options);
        if let Some(value) = self.value {
            builder = builder.values(value);
        }
        builder.build()
    }
}

/// Builder for a [`FormTree`].
pub struct FormTreeBuilder {
    schema: Value,
    layout: Layout,
    values: Option<Value>,
    options: FormTreeOptions,
    registry: KindRegistry,
}

impl FormTreeBuilder {
    fn new(schema: Value) -> Self {
        Self {
            schema,
            layout: Layout::wildcard(),
            values: None,
            options: FormTreeOptions::default(),
            registry: KindRegistry::standard(),
        }
    }

    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Previously submitted values.
    pub fn values(mut self, values: Value) -> Self {
        self.values = Some(values);
        self
    }

    pub fn options(mut self, options: FormTreeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(mut self, registry: KindRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Normalize the schema, build the tree and compute initial values.
    pub fn build(self) -> Result<FormTree> {
        let normalized = schema::normalize(&self.schema)?;
        let mut tree = FormTree {
            schema: normalized,
            elements: ElementArena::default(),
            nodes: NodeArena::default(),
            root: NodeId(0),
            item_elements: HashMap::new(),
            templates: HashMap::new(),
            options: self.options,
            registry: self.registry,
            next_id: 0,
        };

        let root_element = TreeBuilder::new(&mut tree).resolve_root(&self.layout)?;
        tree.root = tree.instantiate(root_element, None, 0);
        tree.compute(
            tree.root,
            ComputeArgs {
                values: self.values.as_ref(),
                ignore_defaults: false,
                top_default_array_level: 0,
            },
        )?;

        debug!(
            elements = tree.elements.len(),
            nodes = tree.nodes.live(),
            "form tree built"
        );
        Ok(tree)
    }
}

/// A schema and layout turned into a live, mutable node tree.
#[derive(Debug)]
pub struct FormTree {
    pub(crate) schema: NormalizedSchema,
    pub(crate) elements: ElementArena,
    pub(crate) nodes: NodeArena,
    pub(crate) root: NodeId,
    /// Array element → resolved element of one item.
    pub(crate) item_elements: HashMap<ElementId, ElementId>,
    /// Array element → pristine item prototype.
    pub(crate) templates: HashMap<ElementId, NodeId>,
    pub(crate) options: FormTreeOptions,
    pub(crate) registry: KindRegistry,
    pub(crate) next_id: usize,
}

impl FormTree {
    pub fn builder(schema: Value) -> FormTreeBuilder {
        FormTreeBuilder::new(schema)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&FormNode> {
        self.nodes.get(id)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn element(&self, id: ElementId) -> &FormElement {
        self.elements.get(id)
    }

    pub fn element_of(&self, id: NodeId) -> Option<&FormElement> {
        self.nodes.get(id).map(|n| self.elements.get(n.element))
    }

    pub fn schema_of(&self, id: NodeId) -> Option<&SchemaNode> {
        let schema = self.element_of(id)?.schema?;
        Some(self.schema.arena.get(schema))
    }

    pub fn schema(&self) -> &SchemaArena {
        &self.schema.arena
    }

    /// The rewritten schema, references untouched, for external validators.
    pub fn validation_schema(&self) -> &Value {
        &self.schema.validation
    }

    pub fn unresolved_refs(&self) -> &[String] {
        &self.schema.unresolved_refs
    }

    pub fn options(&self) -> &FormTreeOptions {
        &self.options
    }

    pub fn is_array(&self, id: NodeId) -> bool {
        self.element_of(id)
            .map(|e| self.registry.behavior(e.kind).is_array())
            .unwrap_or(false)
    }

    /// Number of live nodes, child templates included.
    pub fn node_count(&self) -> usize {
        self.nodes.live()
    }

    /// Depth-first, pre-order visit of the rendered tree.
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(NodeId, &FormNode, usize),
    {
        let mut stack = vec![(self.root, 0)];
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            visit(id, node, depth);
            for child in node.children.iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
    }

    pub fn find_by_key(&self, key: &str) -> Option<NodeId> {
        self.find(|node| node.key.as_deref() == Some(key))
    }

    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        self.find(|node| node.id.as_deref() == Some(id))
    }

    pub(crate) fn find(&self, mut predicate: impl FnMut(&FormNode) -> bool) -> Option<NodeId> {
        let mut found = None;
        self.walk(|id, node, _| {
            if found.is_none() && predicate(node) {
                found = Some(id);
            }
        });
        found
    }

    /// True for nodes whose value is a single field value.
    pub(crate) fn holds_value(&self, id: NodeId) -> bool {
        let Some(element) = self.element_of(id) else {
            return false;
        };
        let behavior = self.registry.behavior(element.kind);
        element.key.is_some() && !behavior.is_array() && !behavior.is_container()
    }

    /// Current `(key, value)` pairs of every valued field, in tree order.
    pub fn field_entries(&self) -> Vec<FieldEntry> {
        self.subtree_entries(self.root)
    }

    pub(crate) fn subtree_entries(&self, from: NodeId) -> Vec<FieldEntry> {
        let mut entries = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if self.holds_value(id) {
                if let (Some(key), Some(value)) = (&node.key, &node.value) {
                    entries.push(FieldEntry::new(key.clone(), RawValue::Value(value.clone())));
                }
            }
            stack.extend(node.children.iter().rev().copied());
        }
        entries
    }

    /// The structured value currently held by the tree.
    pub fn values(&self) -> Result<Value> {
        extract(self.field_entries(), &self.schema.arena)
    }
}
