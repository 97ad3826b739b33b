//! Initial value computation.
//!
//! Runs over a node subtree assigning array paths, concrete keys,
//! identifiers, templated presentation strings and initial values, and
//! sizes every array node to the number of items the submitted values (or
//! the defaults) call for. Running it twice with the same input yields the
//! same result: array children are reconciled rather than appended.

use crate::element::ElementId;
use crate::error::Result;
use crate::kind::display;
use crate::node::{ArrayPath, NodeId};
use crate::path::{self, apply_array_path, KeyPath};
use crate::schema::{resolve_schema_path, schema_default_at, SchemaId};
use crate::template::{has_template, render, render_value, TemplateContext};
use crate::tree::FormTree;
use serde_json::Value;
use tracing::{trace, warn};

/// Nesting limit of `getValue` chains; deeper lookups render empty.
const MAX_LOOKUP_DEPTH: usize = 8;

/// Inputs of one computation pass.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ComputeArgs<'v> {
    /// Previously submitted values.
    pub values: Option<&'v Value>,
    /// Skip layout values and schema defaults.
    pub ignore_defaults: bool,
    /// Collection defaults of array levels up to this one are not consulted.
    pub top_default_array_level: usize,
}

/// Where a value lives: its element, schema and concrete position.
struct Slot<'k> {
    element: Option<ElementId>,
    schema: Option<SchemaId>,
    key: &'k KeyPath,
    array_path: &'k [usize],
    idx: usize,
}

/// Rendered per-instance presentation strings.
#[derive(Default)]
struct Presentation {
    title: Option<String>,
    description: Option<String>,
    legend: Option<String>,
    help_value: Option<String>,
    placeholder: Option<String>,
}

impl FormTree {
    pub(crate) fn compute(&mut self, id: NodeId, args: ComputeArgs<'_>) -> Result<()> {
        let array_path = self.inherited_array_path(id);
        let element_id = self.nodes[id].element;
        let element = self.elements.get(element_id);

        let key = element.key.as_ref().map(|k| k.apply_indices(&array_path));
        let idx = position_idx(&array_path, self.nodes[id].child_pos);
        let value = match &key {
            Some(key) if self.holds_value(id) => {
                let slot = Slot {
                    element: Some(element_id),
                    schema: element.schema,
                    key,
                    array_path: &array_path,
                    idx,
                };
                self.initial_value(&slot, args, 0)
            }
            _ => None,
        };
        let presentation = self.render_presentation(element_id, &array_path, idx, value.as_ref(), args);

        let key_string = key.as_ref().map(ToString::to_string);
        let dom_id = element
            .id
            .as_deref()
            .map(|explicit| apply_array_path(explicit, &array_path))
            .or_else(|| {
                key_string
                    .as_deref()
                    .map(|k| format!("{}-elt-{}", self.options.prefix, slug(k)))
            });
        let dom_id = match dom_id {
            Some(dom_id) => Some(dom_id),
            None if self.nodes[id].id.is_none() => Some(self.fresh_id()),
            None => None,
        };
        let value_in_legend = self.elements.get(element_id).value_in_legend;

        let node = &mut self.nodes[id];
        node.array_path = array_path;
        node.key = key_string;
        if dom_id.is_some() {
            node.id = dom_id;
        }
        node.value = value.clone();
        node.title = presentation.title;
        node.description = presentation.description;
        node.legend = presentation.legend;
        node.help_value = presentation.help_value;
        node.placeholder = presentation.placeholder;
        trace!(node = %id, key = ?node.key, "node computed");

        if let (true, Some(value)) = (value_in_legend, value) {
            self.propagate_legend(id, &value, args);
        }

        if self.is_array(id) {
            self.reconcile_items(id, args)?;
        }

        let children = self.nodes[id].children.clone();
        for child in children {
            self.compute(child, args)?;
        }
        Ok(())
    }

    /// The parent's array path, extended by our position when the parent
    /// is an array.
    fn inherited_array_path(&self, id: NodeId) -> ArrayPath {
        let node = &self.nodes[id];
        let Some(parent) = node.parent else {
            return ArrayPath::new();
        };
        let mut array_path = self.nodes[parent].array_path.clone();
        if self.is_array(parent) {
            array_path.push(node.child_pos);
        }
        array_path
    }

    /// Submitted value, else layout value, else schema default. Templates
    /// in the latter two are expanded and string defaults are cut to
    /// `maxLength`.
    fn initial_value(&self, slot: &Slot<'_>, args: ComputeArgs<'_>, depth: usize) -> Option<Value> {
        if let Some(found) = submitted(args.values, slot.key) {
            return Some(found.clone());
        }
        if args.ignore_defaults {
            return None;
        }

        let lookup = |other: &str| self.lookup_value(other, slot.array_path, args, depth + 1);
        let ctx = TemplateContext {
            idx: slot.idx,
            value: None,
            tpldata: &self.options.tpldata,
            get_value: &lookup,
        };
        if let Some(value) = slot.element.and_then(|e| self.elements.get(e).value.as_ref()) {
            return Some(render_value(value, &ctx));
        }
        let default = schema_default_at(&self.schema.arena, slot.key, args.top_default_array_level)?;
        Some(self.truncate_to_max_length(slot.schema, render_value(&default, &ctx)))
    }

    /// `getValue(key)` as seen from a node at `array_path`: the initial
    /// value the other field has, or would get.
    fn lookup_value(
        &self,
        key: &str,
        array_path: &[usize],
        args: ComputeArgs<'_>,
        depth: usize,
    ) -> Option<Value> {
        if depth > MAX_LOOKUP_DEPTH {
            warn!(%key, "template lookups nest too deeply");
            return None;
        }
        let parsed = match KeyPath::parse(key) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(%key, %err, "template refers to an invalid key");
                return None;
            }
        };
        let concrete = parsed.apply_indices(array_path);
        let scope = concrete.concrete_indices();

        let element = self.elements.find_by_key(&parsed.to_template());
        let schema = element
            .and_then(|e| self.elements.get(e).schema)
            .or_else(|| resolve_schema_path(&self.schema.arena, &concrete).ok().flatten());
        let child_pos = element
            .and_then(|e| self.find(|node| node.element == e))
            .map(|node| self.nodes[node].child_pos)
            .unwrap_or(0);
        let slot = Slot {
            element,
            schema,
            key: &concrete,
            array_path: &scope,
            idx: position_idx(&scope, child_pos),
        };
        self.initial_value(&slot, args, depth)
    }

    fn truncate_to_max_length(&self, schema: Option<SchemaId>, value: Value) -> Value {
        let max = schema.and_then(|id| self.schema.arena.get(id).max_length);
        match (max, &value) {
            (Some(max), Value::String(text)) if text.chars().count() > max => {
                let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
                cut.push_str(&self.options.ellipsis);
                Value::String(cut)
            }
            _ => value,
        }
    }

    fn render_presentation(
        &self,
        element_id: ElementId,
        array_path: &[usize],
        idx: usize,
        value: Option<&Value>,
        args: ComputeArgs<'_>,
    ) -> Presentation {
        let element = self.elements.get(element_id);
        let lookup = |other: &str| self.lookup_value(other, array_path, args, 0);
        let ctx = TemplateContext {
            idx,
            value,
            tpldata: &self.options.tpldata,
            get_value: &lookup,
        };
        let expand = |text: &Option<String>| {
            text.as_deref().map(|t| {
                if has_template(t) {
                    render(t, &ctx)
                } else {
                    t.to_string()
                }
            })
        };
        Presentation {
            title: expand(&element.title),
            description: expand(&element.description),
            legend: expand(&element.legend),
            help_value: expand(&element.help_value),
            placeholder: expand(&element.placeholder),
        }
    }

    /// Show `value` as the legend of the array item containing `from`.
    fn propagate_legend(&mut self, from: NodeId, value: &Value, args: ComputeArgs<'_>) {
        let mut cursor = Some(from);
        let mut item = None;
        while let Some(current) = cursor {
            let parent = self.nodes[current].parent;
            if parent.map(|p| self.is_array(p)).unwrap_or(false) {
                item = Some(current);
                break;
            }
            cursor = parent;
        }
        let Some(item) = item else {
            return;
        };

        let node = &self.nodes[item];
        let array_path = node.array_path.clone();
        let idx = position_idx(&array_path, node.child_pos);
        let legend = match &self.elements.get(node.element).legend {
            Some(template) => {
                let lookup = |other: &str| self.lookup_value(other, &array_path, args, 0);
                let ctx = TemplateContext {
                    idx,
                    value: Some(value),
                    tpldata: &self.options.tpldata,
                    get_value: &lookup,
                };
                render(template, &ctx)
            }
            None => display(value),
        };
        self.nodes[item].legend = Some(legend);
    }

    /// Grow or shrink the children of an array node to the wanted count.
    fn reconcile_items(&mut self, id: NodeId, args: ComputeArgs<'_>) -> Result<()> {
        let template = self.child_template(id)?;
        let count = self.item_count(id, args);
        while self.nodes[id].children.len() > count {
            if let Some(last) = self.nodes[id].children.pop() {
                self.free_subtree(last);
            }
        }
        while self.nodes[id].children.len() < count {
            let pos = self.nodes[id].children.len();
            let item = self.clone_subtree(template, id, pos);
            self.nodes[id].children.push(item);
        }
        Ok(())
    }

    fn item_count(&self, id: NodeId, args: ComputeArgs<'_>) -> usize {
        let node = &self.nodes[id];
        let keys: Vec<KeyPath> = self
            .collection_keys(node.element, node.array_path.len())
            .into_iter()
            .map(|k| k.apply_indices(&node.array_path))
            .collect();

        if let Some(values) = args.values {
            let submitted = keys
                .iter()
                .filter_map(|k| path::read(values, k).and_then(Value::as_array))
                .map(Vec::len)
                .max();
            if let Some(len) = submitted {
                return len;
            }
        }

        let min_items = keys
            .first()
            .and_then(|k| resolve_schema_path(&self.schema.arena, k).ok().flatten())
            .and_then(|s| self.schema.arena.get(s).min_items)
            .unwrap_or(0);
        if args.ignore_defaults {
            return min_items;
        }
        let default = keys
            .first()
            .and_then(|k| schema_default_at(&self.schema.arena, k, args.top_default_array_level));
        if let Some(Value::Array(items)) = default {
            return items.len();
        }
        if self.is_recursive_array(id) {
            return min_items;
        }
        min_items.max(1)
    }

    /// Template keys of the collection(s) an array element iterates over:
    /// its own key and every item key cut at the array's level.
    pub(crate) fn collection_keys(&self, array: ElementId, depth: usize) -> Vec<KeyPath> {
        let mut keys: Vec<KeyPath> = Vec::new();
        if let Some(key) = &self.elements.get(array).key {
            keys.push(key.clone());
        }
        let mut stack: Vec<ElementId> = self.item_elements.get(&array).copied().into_iter().collect();
        while let Some(current) = stack.pop() {
            let element = self.elements.get(current);
            if let Some(owner) = element.key.as_ref().and_then(|k| k.up_to_level(depth)) {
                if !keys.contains(&owner) {
                    keys.push(owner);
                }
            }
            stack.extend(element.children.iter().rev().copied());
        }
        keys
    }

    /// An array nested (through items) inside an array of the same schema.
    fn is_recursive_array(&self, id: NodeId) -> bool {
        let Some(schema) = self.elements.get(self.nodes[id].element).schema else {
            return false;
        };
        let mut cursor = self.nodes[id].parent;
        while let Some(current) = cursor {
            let node = &self.nodes[current];
            if self.elements.get(node.element).schema == Some(schema) {
                return true;
            }
            cursor = node.parent;
        }
        false
    }

    fn fresh_id(&mut self) -> String {
        self.next_id += 1;
        format!("{}-{}", self.options.prefix, self.next_id)
    }
}

/// 1-based position inside the nearest enclosing array, or among the
/// siblings outside any array.
fn position_idx(array_path: &[usize], child_pos: usize) -> usize {
    array_path.last().copied().unwrap_or(child_pos) + 1
}

fn submitted<'v>(values: Option<&'v Value>, key: &KeyPath) -> Option<&'v Value> {
    values
        .and_then(|v| path::read(v, key))
        .filter(|v| !v.is_null())
}

/// Identifier-safe form of a key: `a.b[0]` → `a-b-0`.
fn slug(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;
    use crate::tree::FormTreeOptions;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn value_of(tree: &FormTree, key: &str) -> Option<Value> {
        tree.node(tree.find_by_key(key)?)?.value.clone()
    }

    #[test]
    fn slugs_are_identifier_safe() {
        assert_eq!(slug("a.b[0].c"), "a-b-0-c");
        assert_eq!(slug("list[12]"), "list-12");
    }

    #[test]
    fn defaults_are_templated_and_truncated() {
        let tree = FormTree::builder(json!({
            "greeting": {"type": "string", "default": "Hello {{site}}!", "maxLength": 8}
        }))
        .options(FormTreeOptions {
            tpldata: serde_json::from_value(json!({"site": "world"})).unwrap(),
            ..FormTreeOptions::default()
        })
        .build()
        .unwrap();
        assert_eq!(value_of(&tree, "greeting"), Some(json!("Hello w…")));
    }

    #[test]
    fn titles_see_the_item_position_and_other_values() {
        let tree = FormTree::builder(json!({
            "owner": {"type": "string"},
            "pets": {"type": "array", "items": {"type": "string"}}
        }))
        .layout(
            Layout::from_value(&json!([
                "owner",
                {"key": "pets", "items": [{"key": "pets[]", "title": "Pet {{idx}} of {{values.owner}}"}]}
            ]))
            .unwrap(),
        )
        .values(json!({"owner": "Ada", "pets": ["cat", "dog"]}))
        .build()
        .unwrap();

        let second = tree.node(tree.find_by_key("pets[1]").unwrap()).unwrap();
        assert_eq!(second.title.as_deref(), Some("Pet 2 of Ada"));
        assert_eq!(second.value, Some(json!("dog")));
    }

    #[test]
    fn lookups_see_the_expanded_and_truncated_value() {
        let tree = FormTree::builder(json!({
            "a": {"type": "string", "default": "item {{idx}} of many", "maxLength": 8},
            "b": {"type": "string"}
        }))
        .layout(Layout::from_value(&json!(["a", {"key": "b", "title": "see {{values.a}}"}])).unwrap())
        .build()
        .unwrap();

        assert_eq!(value_of(&tree, "a"), Some(json!("item 1 …")));
        let b = tree.node(tree.find_by_key("b").unwrap()).unwrap();
        assert_eq!(b.title.as_deref(), Some("see item 1 …"));
    }

    #[test]
    fn self_referencing_defaults_terminate() {
        let tree = FormTree::builder(json!({
            "loop": {"type": "string", "default": "{{values.loop}}x"}
        }))
        .build()
        .unwrap();
        let value = value_of(&tree, "loop").unwrap();
        assert!(value.as_str().is_some_and(|v| v.ends_with('x')), "{value}");
    }

    #[test]
    fn idx_outside_arrays_is_the_sibling_position() {
        let tree = FormTree::builder(json!({
            "first": {"type": "string"},
            "second": {"type": "string", "title": "Field {{idx}}", "default": "value {{idx}}"}
        }))
        .build()
        .unwrap();

        let second = tree.node(tree.find_by_key("second").unwrap()).unwrap();
        assert_eq!(second.title.as_deref(), Some("Field 2"));
        assert_eq!(second.value, Some(json!("value 2")));
    }

    #[test]
    fn keyless_arrays_take_their_collection_from_item_keys() {
        let tree = FormTree::builder(json!({
            "friends": {
                "type": "array",
                "items": {"type": "object", "properties": {"name": {"type": "string"}}}
            }
        }))
        .layout(
            Layout::from_value(&json!([{"type": "array", "items": [{"key": "friends[].name"}]}]))
            .unwrap(),
        )
        .values(json!({"friends": [{"name": "a"}, {"name": "b"}, {"name": "c"}]}))
        .build()
        .unwrap();

        let array = tree.children(tree.root())[0];
        assert_eq!(tree.children(array).len(), 3);
        assert_eq!(value_of(&tree, "friends[2].name"), Some(json!("c")));
    }

    #[test]
    fn value_in_legend_labels_the_item() {
        let tree = FormTree::builder(json!({
            "people": {
                "type": "array",
                "items": {"type": "object", "properties": {"name": {"type": "string"}}}
            }
        }))
        .layout(
            Layout::from_value(&json!([{
                "key": "people",
                "items": [{
                    "type": "section",
                    "legend": "#{{idx}}: {{value}}",
                    "items": [{"key": "people[].name", "valueInLegend": true}]
                }]
            }]))
            .unwrap(),
        )
        .values(json!({"people": [{"name": "Ada"}, {"name": "Grace"}]}))
        .build()
        .unwrap();

        let people = tree.find_by_key("people").unwrap();
        let second = tree.children(people)[1];
        assert_eq!(tree.node(second).unwrap().legend.as_deref(), Some("#2: Grace"));
    }

    #[test]
    fn recomputing_is_idempotent() {
        let mut tree = FormTree::builder(json!({
            "title": {"type": "string"},
            "items": {"type": "array", "items": {"type": "number"}}
        }))
        .build()
        .unwrap();
        let values = json!({"title": "x", "items": [1, 2]});
        let args = ComputeArgs {
            values: Some(&values),
            ..ComputeArgs::default()
        };

        tree.compute(tree.root(), args).unwrap();
        let mut first = Vec::new();
        tree.walk(|_, n, _| first.push((n.id.clone(), n.key.clone(), n.value.clone())));

        tree.compute(tree.root(), args).unwrap();
        let mut second = Vec::new();
        tree.walk(|_, n, _| second.push((n.id.clone(), n.key.clone(), n.value.clone())));

        assert_eq!(first, second);
        assert_eq!(value_of(&tree, "items[1]"), Some(json!(2)));
    }
}
