//! Schema- and layout-driven form trees.
//!
//! The crate turns a JSON schema plus a layout description into a live
//! tree of form nodes. The tree can be walked to drive any renderer, knows
//! the initial value of every field (from previous values, layout values or
//! schema defaults), supports inserting, deleting and reordering array
//! items at runtime, and turns a flat list of field values back into a
//! structured, type-coerced value.
//!
//! # Example
//!
//! ```ignore
//! use form_tree::{FormTree, Layout};
//! use serde_json::json;
//!
//! let mut tree = FormTree::builder(json!({
//!     "name": {"type": "string", "required": true},
//!     "tags": {"type": "array", "items": {"type": "string"}}
//! }))
//! .values(json!({"name": "Ada", "tags": ["math"]}))
//! .build()?;
//!
//! let tags = tree.find_by_key("tags").unwrap();
//! tree.insert(tags, 0)?;
//! let value = tree.values()?;
//! ```

pub mod array;
mod build;
mod compute;
pub mod element;
pub mod error;
pub mod extract;
pub mod kind;
pub mod layout;
pub mod node;
pub mod path;
pub mod schema;
pub mod template;
pub mod tree;
pub mod validate;

// Re-export main types
pub use array::ArrayBounds;
pub use element::{ElementArena, ElementId, FormElement, OptionItem};
pub use error::{ArrayError, FormError, LayoutError, PathError, Result, SchemaError};
pub use extract::{extract, extract_into, FieldEntry, RawValue};
pub use kind::{ElementBehavior, ElementKind, KindRegistry};
pub use layout::{Layout, LayoutItem, LayoutNode};
pub use node::{ArrayPath, FormNode, NodeId};
pub use path::{apply_array_path, KeyPath, PathSegment};
pub use schema::{normalize, NormalizedSchema, SchemaArena, SchemaId, SchemaNode, SchemaType};
pub use tree::{FormDescriptor, FormTree, FormTreeBuilder, FormTreeOptions};
pub use validate::{FieldIssue, ValidationIssue, ValidationReport, Validator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic_workflow() {
        let mut tree = FormTree::builder(json!({
            "name": {"type": "string", "required": true},
            "tags": {"type": "array", "items": {"type": "string"}}
        }))
        .values(json!({"name": "Ada", "tags": ["math"]}))
        .build()
        .unwrap();

        let name = tree.find_by_key("name").unwrap();
        assert!(tree.node(name).unwrap().required);

        let tags = tree.find_by_key("tags").unwrap();
        let fresh = tree.insert(tags, 0).unwrap();
        assert_eq!(tree.node(fresh).unwrap().key.as_deref(), Some("tags[0]"));
        // The new first item has no value yet and leaves a hole.
        assert_eq!(tree.values().unwrap(), json!({"name": "Ada", "tags": [null, "math"]}));
    }
}
