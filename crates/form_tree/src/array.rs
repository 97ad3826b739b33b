//! Runtime mutation of array nodes.
//!
//! Items are never re-keyed in place: a node's position, array path and key
//! stay fixed for its whole life. Inserting appends a fresh item and shifts
//! values towards the end; deleting shifts values towards the front and
//! drops the last item.

use crate::compute::ComputeArgs;
use crate::error::{ArrayError, Result};
use crate::extract::{extract_into, FieldEntry, RawValue};
use crate::node::{ArrayPath, FormNode, NodeId};
use crate::path::{self, KeyPath};
use crate::schema::resolve_schema_path;
use crate::tree::FormTree;
use serde_json::{Map, Value};
use tracing::debug;

/// Cardinality constraints of one array node; `None` means unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArrayBounds {
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

impl ArrayBounds {
    pub fn can_insert(&self, len: usize) -> bool {
        self.max_items.map_or(true, |max| len < max)
    }

    pub fn can_delete(&self, len: usize) -> bool {
        len > 0 && self.min_items.map_or(true, |min| len > min)
    }
}

impl FormTree {
    /// Insert a new item at `index`; the items from `index` on move one
    /// position down. Returns the node now at `index`.
    pub fn insert(&mut self, parent: NodeId, index: usize) -> Result<NodeId> {
        let len = self.array_len(parent)?;
        if index > len {
            return Err(ArrayError::IndexOutOfRange { index, len }.into());
        }
        let bounds = self.array_bounds(parent)?;
        if let (false, Some(max)) = (bounds.can_insert(len), bounds.max_items) {
            return Err(ArrayError::MaxItems { max }.into());
        }

        let template = self.child_template(parent)?;
        let item = self.clone_subtree(template, parent, len);
        self.nodes[parent].children.push(item);
        let item_level = self.nodes[parent].array_path.len() + 1;
        self.compute(
            item,
            ComputeArgs {
                values: None,
                ignore_defaults: true,
                top_default_array_level: item_level,
            },
        )?;

        let children = self.nodes[parent].children.clone();
        for i in (index..len).rev() {
            self.move_values_to(children[i], children[i + 1])?;
        }

        let fresh = children[index];
        self.reset_values(fresh);
        self.compute(
            fresh,
            ComputeArgs {
                values: None,
                ignore_defaults: false,
                top_default_array_level: item_level,
            },
        )?;
        debug!(array = %parent, index, len = len + 1, "array item inserted");
        Ok(fresh)
    }

    /// Remove the item at `index`; later items move one position up.
    pub fn delete(&mut self, parent: NodeId, index: usize) -> Result<()> {
        let len = self.array_len(parent)?;
        if index >= len {
            return Err(ArrayError::IndexOutOfRange { index, len }.into());
        }
        let bounds = self.array_bounds(parent)?;
        if let (false, Some(min)) = (bounds.can_delete(len), bounds.min_items) {
            return Err(ArrayError::MinItems { min }.into());
        }

        let children = self.nodes[parent].children.clone();
        for i in index..len - 1 {
            self.move_values_to(children[i + 1], children[i])?;
        }
        if let Some(last) = self.nodes[parent].children.pop() {
            self.free_subtree(last);
        }
        debug!(array = %parent, index, len = len - 1, "array item deleted");
        Ok(())
    }

    /// Move the item at `from` to position `to` by adjacent swaps.
    pub fn move_item(&mut self, parent: NodeId, from: usize, to: usize) -> Result<()> {
        let len = self.array_len(parent)?;
        for index in [from, to] {
            if index >= len {
                return Err(ArrayError::IndexOutOfRange { index, len }.into());
            }
        }
        let children = self.nodes[parent].children.clone();
        if from < to {
            for i in from..to {
                self.switch_values_with(children[i], children[i + 1])?;
            }
        } else {
            for i in (to..from).rev() {
                self.switch_values_with(children[i + 1], children[i])?;
            }
        }
        debug!(array = %parent, from, to, "array item moved");
        Ok(())
    }

    /// Replace the values of `target`'s subtree with those of `source`.
    pub fn move_values_to(&mut self, source: NodeId, target: NodeId) -> Result<()> {
        let values = self.transplanted_values(source, target)?;
        self.apply_values(target, &values)
    }

    /// Exchange the values of two subtrees of the same shape.
    pub fn switch_values_with(&mut self, a: NodeId, b: NodeId) -> Result<()> {
        let for_b = self.transplanted_values(a, b)?;
        let for_a = self.transplanted_values(b, a)?;
        self.apply_values(a, &for_a)?;
        self.apply_values(b, &for_b)
    }

    /// Bounds of an array node, from the schema of every collection its
    /// items bind to: the largest minimum and the smallest maximum win.
    pub fn array_bounds(&self, parent: NodeId) -> Result<ArrayBounds> {
        if !self.is_array(parent) {
            return Err(ArrayError::NotAnArray(parent.index()).into());
        }
        let node = &self.nodes[parent];
        let arena = &self.schema.arena;
        let mut bounds = ArrayBounds::default();
        for key in self.collection_keys(node.element, node.array_path.len()) {
            let Some(id) = resolve_schema_path(arena, &key)? else {
                continue;
            };
            let schema = arena.get(id);
            for min in [schema.min_items, schema.min_length].into_iter().flatten() {
                bounds.min_items = Some(bounds.min_items.map_or(min, |m| m.max(min)));
            }
            for max in [schema.max_items, schema.max_length].into_iter().flatten() {
                bounds.max_items = Some(bounds.max_items.map_or(max, |m| m.min(max)));
            }
        }
        Ok(bounds)
    }

    /// Clear computed values in a subtree.
    pub(crate) fn reset_values(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &mut self.nodes[current];
            node.reset();
            stack.extend(node.children.iter().copied());
        }
    }

    fn live_node(&self, id: NodeId) -> Result<&FormNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| ArrayError::UnknownNode(id.index()).into())
    }

    fn array_len(&self, parent: NodeId) -> Result<usize> {
        if !self.is_array(parent) {
            return Err(ArrayError::NotAnArray(parent.index()).into());
        }
        Ok(self.nodes[parent].children.len())
    }

    /// The values of `source`'s subtree, re-keyed onto `target`'s position.
    fn transplanted_values(&self, source: NodeId, target: NodeId) -> Result<Value> {
        let from = self.live_node(source)?.array_path.clone();
        let to = self.live_node(target)?.array_path.clone();
        let rebase = |array_path: &ArrayPath| -> ArrayPath {
            let mut out = to.clone();
            out.extend(array_path.iter().skip(from.len()).copied());
            out
        };

        let mut values = Value::Object(Map::new());
        let mut entries = Vec::new();
        let mut stack = vec![source];
        while let Some(current) = stack.pop() {
            let node = &self.nodes[current];
            let element = self.elements.get(node.element);
            if self.is_array(current) {
                // Keep the item count even when the items hold no values.
                let seeds = self.collection_keys(node.element, node.array_path.len());
                for key in seeds {
                    let key = key.apply_indices(&rebase(&node.array_path));
                    if path::read(&values, &key).is_none() {
                        let slots = vec![Value::Null; node.children.len()];
                        path::write(&mut values, &key, Value::Array(slots))?;
                    }
                }
            } else if self.holds_value(current) {
                if let (Some(template), Some(value)) = (&element.key, &node.value) {
                    let key: KeyPath = template.apply_indices(&rebase(&node.array_path));
                    entries.push(FieldEntry::new(key.to_string(), RawValue::Value(value.clone())));
                }
            }
            stack.extend(node.children.iter().rev().copied());
        }

        extract_into(&mut values, entries, &self.schema.arena)?;
        Ok(values)
    }

    fn apply_values(&mut self, target: NodeId, values: &Value) -> Result<()> {
        self.reset_values(target);
        self.compute(
            target,
            ComputeArgs {
                values: Some(values),
                ignore_defaults: true,
                top_default_array_level: 0,
            },
        )
    }
}
