//! Layout → element resolution and element → node instantiation.

use crate::element::{ElementId, FormElement};
use crate::error::{ArrayError, LayoutError, Result, SchemaError};
use crate::kind::ElementKind;
use crate::layout::{Layout, LayoutItem, LayoutNode};
use crate::node::{FormNode, NodeId};
use crate::path::KeyPath;
use crate::schema::{resolve_schema_path, SchemaId};
use crate::tree::FormTree;
use tracing::{trace, warn};

/// Binds layout entries to the schema, producing shared [`FormElement`]s.
pub(crate) struct TreeBuilder<'a> {
    tree: &'a mut FormTree,
    /// Object schemas whose properties are being expanded right now.
    expanding: Vec<SchemaId>,
}

impl<'a> TreeBuilder<'a> {
    pub(crate) fn new(tree: &'a mut FormTree) -> Self {
        Self {
            tree,
            expanding: Vec::new(),
        }
    }

    /// The root is a keyless section holding the top-level entries.
    pub(crate) fn resolve_root(&mut self, layout: &Layout) -> Result<ElementId> {
        let children = self.resolve_items(&layout.items)?;
        let mut root = FormElement::new(ElementKind::Section);
        root.children = children;
        Ok(self.tree.elements.alloc(root))
    }

    fn resolve_items(&mut self, items: &[LayoutItem]) -> Result<Vec<ElementId>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            if item.is_wildcard() {
                let root = self.tree.schema.arena.root();
                let names: Vec<String> = self
                    .tree
                    .schema
                    .arena
                    .get(root)
                    .properties
                    .iter()
                    .map(|(name, _)| name.clone())
                    .filter(|name| !self.is_excluded(name))
                    .collect();
                for name in names {
                    out.push(self.resolve(LayoutNode::with_key(name))?);
                }
            } else {
                out.push(self.resolve(item.clone().into_node())?);
            }
        }
        Ok(out)
    }

    fn is_excluded(&self, key: &str) -> bool {
        self.tree
            .options
            .non_default_form_items
            .iter()
            .any(|excluded| excluded == key)
    }

    pub(crate) fn resolve(&mut self, layout: LayoutNode) -> Result<ElementId> {
        let key = layout.key.as_deref().map(KeyPath::parse).transpose()?;
        let schema = match &key {
            Some(key) => Some(
                resolve_schema_path(&self.tree.schema.arena, key)?
                    .ok_or_else(|| SchemaError::UnknownKey(key.to_string()))?,
            ),
            None => None,
        };

        let kind = match (&layout.kind, schema) {
            (Some(name), _) => name
                .parse::<ElementKind>()
                .map_err(|_| LayoutError::UnknownKind(name.clone()))?,
            (None, Some(id)) => {
                let arena = &self.tree.schema.arena;
                ElementKind::infer(arena, arena.get(id))
            }
            (None, None) if !layout.items.is_empty() => ElementKind::Section,
            (None, None) => {
                return Err(LayoutError::InvalidEntry(
                    "an entry needs a key, a type or child items".into(),
                )
                .into())
            }
        };

        let behavior = self.tree.registry.shared(kind);
        match (&key, schema) {
            (None, _) if behavior.is_input_field() => {
                return Err(LayoutError::MissingKey {
                    kind: kind.to_string(),
                }
                .into())
            }
            (Some(key), Some(id)) if !behavior.accepts(self.tree.schema.arena.get(id)) => {
                return Err(LayoutError::IncompatibleKind {
                    kind: kind.to_string(),
                    key: key.to_string(),
                    schema_type: self.tree.schema.arena.get(id).type_name().to_string(),
                }
                .into())
            }
            _ => {}
        }

        if let Some(id) = schema {
            behavior.mark_schema(&layout, &mut self.tree.schema.arena, id);
        }

        let arena = &self.tree.schema.arena;
        let schema_node = schema.map(|id| arena.get(id));
        let mut element = FormElement::new(kind);
        element.options = behavior.prepare_options(&layout, arena, schema);
        element.title = layout
            .title
            .clone()
            .or_else(|| schema_node.and_then(|s| s.title.clone()));
        element.description = layout
            .description
            .clone()
            .or_else(|| schema_node.and_then(|s| s.description.clone()));
        element.read_only = layout
            .read_only
            .unwrap_or_else(|| schema_node.map(|s| s.read_only).unwrap_or(false));
        element.required = key
            .as_ref()
            .map(|key| self.is_required(key))
            .unwrap_or(false);
        element.schema = schema;
        element.id = layout.id.clone();
        element.legend = layout.legend.clone();
        element.help_value = layout.help_value.clone();
        element.placeholder = layout.placeholder.clone();
        element.notitle = layout.notitle;
        element.value = layout.value.clone();
        element.value_in_legend = layout.value_in_legend;
        element.extra = layout.extra.clone();

        if behavior.is_array() {
            element.item_layout = Some(item_layout(&layout, key.as_ref())?);
        } else if !layout.items.is_empty() {
            element.children = self.resolve_items(&layout.items)?;
        } else if let (true, Some(key), Some(id)) = (behavior.is_container(), &key, schema) {
            element.children = self.expand_properties(key, id)?;
        }
        element.key = key;

        trace!(kind = %element.kind, key = ?element.key, "element resolved");
        Ok(self.tree.elements.alloc(element))
    }

    /// One child entry per schema property, in schema order.
    fn expand_properties(&mut self, key: &KeyPath, id: SchemaId) -> Result<Vec<ElementId>> {
        let schema = self.tree.schema.arena.get(id);
        if !schema.is_structured_object() {
            return Ok(Vec::new());
        }
        if self.expanding.contains(&id) {
            warn!(%key, "recursive object schema is not expanded further");
            return Ok(Vec::new());
        }

        let child_keys: Vec<String> = schema
            .properties
            .iter()
            .map(|(name, _)| format!("{key}.{name}"))
            .filter(|child| !self.is_excluded(child))
            .collect();

        self.expanding.push(id);
        let mut children = Vec::with_capacity(child_keys.len());
        for child in child_keys {
            match self.resolve(LayoutNode::with_key(child)) {
                Ok(element) => children.push(element),
                Err(err) => {
                    self.expanding.pop();
                    return Err(err);
                }
            }
        }
        self.expanding.pop();
        Ok(children)
    }

    /// Whether the object schema enclosing `key` lists its last segment.
    fn is_required(&self, key: &KeyPath) -> bool {
        let Some(last) = key.last() else {
            return false;
        };
        if !last.indices.is_empty() {
            return false;
        }
        let arena = &self.tree.schema.arena;
        let parent = match key.parent() {
            Some(parent) if !parent.is_empty() => resolve_schema_path(arena, &parent).ok().flatten(),
            _ => Some(arena.root()),
        };
        parent
            .map(|id| arena.get(id).is_required(&last.name))
            .unwrap_or(false)
    }
}

/// The layout of a single array item.
fn item_layout(layout: &LayoutNode, key: Option<&KeyPath>) -> Result<LayoutNode> {
    match layout.items.as_slice() {
        [single] => Ok(single.clone().into_node()),
        [] => match key {
            Some(key) => Ok(LayoutNode::with_key(format!("{key}[]"))),
            None => Err(LayoutError::InvalidEntry(
                "an array entry needs a key or item entries".into(),
            )
            .into()),
        },
        several => Ok(LayoutNode::default()
            .with_kind(ElementKind::Section.as_ref())
            .with_items(several.to_vec())),
    }
}

impl FormTree {
    /// Create the node subtree of `element`. Arrays start empty.
    pub(crate) fn instantiate(
        &mut self,
        element: ElementId,
        parent: Option<NodeId>,
        child_pos: usize,
    ) -> NodeId {
        let resolved = self.elements.get(element);
        let mut node = FormNode::new(element, resolved.required);
        node.parent = parent;
        node.child_pos = child_pos;
        let children = if self.registry.behavior(resolved.kind).is_array() {
            Vec::new()
        } else {
            resolved.children.clone()
        };

        let id = self.nodes.alloc(node);
        for (pos, child) in children.into_iter().enumerate() {
            let child_id = self.instantiate(child, Some(id), pos);
            self.nodes[id].children.push(child_id);
        }
        id
    }

    /// Resolve the item element of an array element once.
    pub(crate) fn item_element(&mut self, array: ElementId) -> Result<ElementId> {
        if let Some(item) = self.item_elements.get(&array) {
            return Ok(*item);
        }
        let layout = self
            .elements
            .get(array)
            .item_layout
            .clone()
            .ok_or_else(|| LayoutError::InvalidEntry("array element without item layout".into()))?;
        let item = TreeBuilder::new(self).resolve(layout)?;
        self.item_elements.insert(array, item);
        Ok(item)
    }

    /// The pristine item prototype of an array node, built on first use.
    pub(crate) fn child_template(&mut self, array: NodeId) -> Result<NodeId> {
        if !self.is_array(array) {
            return Err(ArrayError::NotAnArray(array.index()).into());
        }
        let element = self.nodes[array].element;
        let template = match self.templates.get(&element) {
            Some(template) => *template,
            None => {
                let item = self.item_element(element)?;
                let template = self.instantiate(item, None, 0);
                self.templates.insert(element, template);
                template
            }
        };
        self.nodes[array].child_template = Some(template);
        Ok(template)
    }

    /// Copy the structure of `source` under `parent`; shared elements and
    /// templates are referenced, computed state is not copied.
    pub(crate) fn clone_subtree(&mut self, source: NodeId, parent: NodeId, child_pos: usize) -> NodeId {
        let original = &self.nodes[source];
        let mut node = FormNode::new(original.element, original.required);
        node.parent = Some(parent);
        node.child_pos = child_pos;
        node.child_template = original.child_template;
        let children = original.children.clone();

        let id = self.nodes.alloc(node);
        for (pos, child) in children.into_iter().enumerate() {
            let copy = self.clone_subtree(child, id, pos);
            self.nodes[id].children.push(copy);
        }
        id
    }

    pub(crate) fn free_subtree(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.release(id) {
            for child in node.children {
                self.free_subtree(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{FormError, LayoutError, SchemaError};
    use crate::layout::Layout;
    use crate::tree::{FormTree, FormTreeOptions};
    use serde_json::{json, Value};

    fn build(schema: Value, form: Value) -> crate::error::Result<FormTree> {
        FormTree::builder(schema)
            .layout(Layout::from_value(&form)?)
            .build()
    }

    #[test]
    fn wildcard_expands_in_schema_order_and_skips_excluded_keys() {
        let tree = FormTree::builder(json!({
            "b": {"type": "string"},
            "secret": {"type": "string"},
            "a": {"type": "boolean", "title": "Flag"}
        }))
        .options(FormTreeOptions {
            non_default_form_items: vec!["secret".into()],
            ..FormTreeOptions::default()
        })
        .build()
        .unwrap();

        let keys: Vec<_> = tree
            .children(tree.root())
            .iter()
            .filter_map(|id| tree.node(*id).and_then(|n| n.key.clone()))
            .collect();
        assert_eq!(keys, ["b", "a"]);

        let flag = tree.element_of(tree.find_by_key("a").unwrap()).unwrap();
        assert_eq!(flag.kind.as_ref(), "checkbox");
        assert_eq!(flag.title.as_deref(), Some("Flag"));
    }

    #[test]
    fn required_comes_from_the_enclosing_object() {
        let tree = build(
            json!({
                "type": "object",
                "properties": {
                    "person": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string", "required": true},
                            "nick": {"type": "string"}
                        }
                    }
                }
            }),
            json!(["person"]),
        )
        .unwrap();

        let required = |key| tree.node(tree.find_by_key(key).unwrap()).unwrap().required;
        assert!(required("person.name"));
        assert!(!required("person.nick"));
        assert!(!required("person"));
    }

    #[test]
    fn unknown_keys_and_kinds_are_rejected() {
        let schema = json!({"name": {"type": "string"}});
        let err = build(schema.clone(), json!(["missing"])).unwrap_err();
        assert!(matches!(err, FormError::Schema(SchemaError::UnknownKey(ref k)) if k == "missing"));

        let err = build(schema.clone(), json!([{"key": "name", "type": "spinner"}])).unwrap_err();
        assert!(matches!(err, FormError::Layout(LayoutError::UnknownKind(_))));

        let err = build(schema, json!([{"type": "text"}])).unwrap_err();
        assert!(matches!(err, FormError::Layout(LayoutError::MissingKey { .. })));
    }

    #[test]
    fn kinds_must_fit_the_schema_type() {
        let schema = json!({
            "name": {"type": "string"},
            "address": {"type": "object", "properties": {"city": {"type": "string"}}}
        });
        let err = build(schema.clone(), json!([{"key": "name", "type": "fieldset"}])).unwrap_err();
        assert!(matches!(err, FormError::Layout(LayoutError::IncompatibleKind { .. })));

        let err = build(schema, json!([{"key": "address", "type": "text"}])).unwrap_err();
        assert!(matches!(
            err,
            FormError::Layout(LayoutError::IncompatibleKind { ref schema_type, .. }) if schema_type == "object"
        ));
    }

    #[test]
    fn explicit_items_override_schema_expansion() {
        let tree = build(
            json!({
                "address": {
                    "type": "object",
                    "properties": {"city": {"type": "string"}, "zip": {"type": "string"}}
                }
            }),
            json!([{"key": "address", "type": "fieldset", "items": ["address.zip"]}]),
        )
        .unwrap();

        let address = tree.find_by_key("address").unwrap();
        assert_eq!(tree.children(address).len(), 1);
        assert!(tree.find_by_key("address.city").is_none());
    }

    #[test]
    fn recursive_schemas_build_lazily() {
        let tree = build(
            json!({
                "type": "object",
                "definitions": {
                    "node": {
                        "type": "object",
                        "properties": {
                            "label": {"type": "string"},
                            "children": {"type": "array", "items": {"$ref": "#/definitions/node"}}
                        }
                    }
                },
                "properties": {"tree": {"$ref": "#/definitions/node"}}
            }),
            json!(["*"]),
        )
        .unwrap();

        assert!(tree.find_by_key("tree.label").is_some());
        assert!(tree.find_by_key("tree.children[0].label").is_some());
    }
}
