//! Live tree nodes.

use crate::element::ElementId;
use serde_json::Value;
use smallvec::SmallVec;

/// Indices of the enclosing array items, outermost first.
pub type ArrayPath = SmallVec<[usize; 4]>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One instance of a [`FormElement`](crate::element::FormElement) in the
/// tree. Everything except `element`, the structural links and `required`
/// is filled in by the value computation.
#[derive(Clone, Debug)]
pub struct FormNode {
    pub element: ElementId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub child_pos: usize,
    pub array_path: ArrayPath,
    pub id: Option<String>,
    /// Concrete key path.
    pub key: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub legend: Option<String>,
    pub help_value: Option<String>,
    pub placeholder: Option<String>,
    pub required: bool,
    pub value: Option<Value>,
    /// Pristine prototype of one array item (array-kind nodes only).
    pub child_template: Option<NodeId>,
}

impl FormNode {
    pub(crate) fn new(element: ElementId, required: bool) -> Self {
        Self {
            element,
            parent: None,
            children: Vec::new(),
            child_pos: 0,
            array_path: ArrayPath::new(),
            id: None,
            key: None,
            title: None,
            description: None,
            legend: None,
            help_value: None,
            placeholder: None,
            required,
            value: None,
            child_template: None,
        }
    }

    /// Forget everything the value computation assigned, keeping the
    /// identifier so recomputation stays stable.
    pub(crate) fn reset(&mut self) {
        self.value = None;
        self.legend = None;
    }
}

/// Slot storage for nodes; removed subtrees leave reusable holes.
#[derive(Clone, Debug, Default)]
pub(crate) struct NodeArena {
    slots: Vec<Option<FormNode>>,
    free: Vec<usize>,
}

impl NodeArena {
    pub(crate) fn alloc(&mut self, node: FormNode) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        }
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&FormNode> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut FormNode> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    pub(crate) fn release(&mut self, id: NodeId) -> Option<FormNode> {
        let node = self.slots.get_mut(id.0)?.take()?;
        self.free.push(id.0);
        Some(node)
    }

    pub(crate) fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

impl std::ops::Index<NodeId> for NodeArena {
    type Output = FormNode;

    fn index(&self, id: NodeId) -> &FormNode {
        match self.get(id) {
            Some(node) => node,
            None => panic!("stale node id {id}"),
        }
    }
}

impl std::ops::IndexMut<NodeId> for NodeArena {
    fn index_mut(&mut self, id: NodeId) -> &mut FormNode {
        match self.get_mut(id) {
            Some(node) => node,
            None => panic!("stale node id {id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_slots_are_reused() {
        let mut arena = NodeArena::default();
        let a = arena.alloc(FormNode::new(ElementId(0), false));
        let b = arena.alloc(FormNode::new(ElementId(1), false));
        assert_eq!(arena.live(), 2);

        assert!(arena.release(a).is_some());
        assert!(arena.get(a).is_none());
        assert!(arena.release(a).is_none());

        let c = arena.alloc(FormNode::new(ElementId(2), true));
        assert_eq!(c, a);
        assert_eq!(arena.get(c).map(|n| n.element), Some(ElementId(2)));
        assert_eq!(arena.get(b).map(|n| n.element), Some(ElementId(1)));
    }
}
