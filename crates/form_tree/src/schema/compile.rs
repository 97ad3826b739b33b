//! Copy a rewritten JSON schema into a [`SchemaArena`].
//!
//! `{"$ref": "#/definitions/X"}` nodes become the arena id of definition
//! `X`. Each definition is compiled at most once: its id is reserved before
//! its body is compiled, so self-referencing definitions terminate.

use super::{SchemaArena, SchemaId, SchemaNode, SchemaType};
use crate::error::Result;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::trace;

const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// Keywords consumed into typed [`SchemaNode`] fields.
const KNOWN_KEYWORDS: &[&str] = &[
    "type",
    "title",
    "description",
    "properties",
    "items",
    "enum",
    "default",
    "required",
    "readOnly",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "minLength",
    "maxLength",
    "minItems",
    "maxItems",
    "definitions",
    "$ref",
];

/// Compile `schema`; returns the arena and the references left unresolved.
pub fn compile(schema: &Value) -> Result<(SchemaArena, Vec<String>)> {
    let empty = Map::new();
    let definitions = schema
        .get("definitions")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let mut compiler = Compiler {
        arena: SchemaArena::default(),
        definitions,
        resolved: HashMap::new(),
        unresolved: Vec::new(),
    };
    let root = compiler.compile(schema);
    compiler.arena.set_root(root);
    Ok((compiler.arena, compiler.unresolved))
}

struct Compiler<'a> {
    arena: SchemaArena,
    definitions: &'a Map<String, Value>,
    resolved: HashMap<String, SchemaId>,
    unresolved: Vec<String>,
}

impl<'a> Compiler<'a> {
    fn compile(&mut self, value: &Value) -> SchemaId {
        if let Some(reference) = value.get("$ref").and_then(Value::as_str) {
            return self.resolve_reference(reference);
        }
        let id = self.arena.alloc(SchemaNode::default());
        self.compile_into(id, value);
        id
    }

    fn resolve_reference(&mut self, reference: &str) -> SchemaId {
        if let Some(id) = self.resolved.get(reference) {
            return *id;
        }

        let definition = reference
            .strip_prefix(DEFINITIONS_PREFIX)
            .and_then(|name| self.definitions.get(name));
        let id = self.arena.alloc(SchemaNode::default());
        self.resolved.insert(reference.to_string(), id);

        match definition {
            Some(definition) => {
                trace!(%reference, "resolving schema reference");
                self.compile_into(id, definition);
            }
            None => {
                self.arena.get_mut(id).unresolved_ref = Some(reference.to_string());
                self.unresolved.push(reference.to_string());
            }
        }
        id
    }

    fn compile_into(&mut self, id: SchemaId, value: &Value) {
        let Some(obj) = value.as_object() else {
            // `true` / `{}`-like schemas accept anything.
            return;
        };

        let mut node = SchemaNode {
            ty: schema_type(obj.get("type")),
            title: string(obj, "title"),
            description: string(obj, "description"),
            enum_values: obj.get("enum").and_then(Value::as_array).cloned(),
            default: obj.get("default").cloned(),
            required: obj
                .get("required")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            read_only: obj.get("readOnly").and_then(Value::as_bool).unwrap_or(false),
            minimum: obj.get("minimum").and_then(Value::as_f64),
            maximum: obj.get("maximum").and_then(Value::as_f64),
            exclusive_minimum: obj.get("exclusiveMinimum").cloned(),
            exclusive_maximum: obj.get("exclusiveMaximum").cloned(),
            min_length: count(obj, "minLength"),
            max_length: count(obj, "maxLength"),
            min_items: count(obj, "minItems"),
            max_items: count(obj, "maxItems"),
            extra: obj
                .iter()
                .filter(|(k, _)| !KNOWN_KEYWORDS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            ..SchemaNode::default()
        };

        if let Some(props) = obj.get("properties").and_then(Value::as_object) {
            node.properties = props
                .iter()
                .map(|(name, child)| (name.clone(), self.compile(child)))
                .collect();
        }
        if let Some(items) = obj.get("items") {
            node.items = Some(self.compile(items));
        }

        *self.arena.get_mut(id) = node;
    }
}

fn schema_type(value: Option<&Value>) -> Option<SchemaType> {
    match value? {
        Value::String(name) => name.parse().ok(),
        // `["string", "null"]`: the first non-null member drives the form.
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|name| name.parse::<SchemaType>().ok())
            .find(|ty| *ty != SchemaType::Null),
        _ => None,
    }
}

fn string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn count(obj: &Map<String, Value>, key: &str) -> Option<usize> {
    obj.get(key)
        .and_then(Value::as_u64)
        .map(|n| n as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn references_share_one_arena_node() {
        let (arena, unresolved) = compile(&json!({
            "type": "object",
            "definitions": {"address": {"type": "object", "properties": {"city": {"type": "string"}}}},
            "properties": {
                "home": {"$ref": "#/definitions/address"},
                "work": {"$ref": "#/definitions/address"}
            }
        }))
        .unwrap();
        assert!(unresolved.is_empty());

        let root = arena.get(arena.root());
        assert_eq!(root.property("home"), root.property("work"));
        let home = arena.get(root.property("home").unwrap());
        assert_eq!(home.ty, Some(SchemaType::Object));
        assert!(home.property("city").is_some());
    }

    #[test]
    fn recursive_definitions_terminate() {
        let (arena, _) = compile(&json!({
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
        }))
        .unwrap();

        let root = arena.get(arena.root());
        let tree = root.property("tree").unwrap();
        let children = arena.get(tree).property("children").unwrap();
        assert_eq!(arena.get(children).items, Some(tree));
    }

    #[test]
    fn external_references_are_reported() {
        let (arena, unresolved) = compile(&json!({
            "type": "object",
            "properties": {"remote": {"$ref": "http://example.com/schema.json"}}
        }))
        .unwrap();
        assert_eq!(unresolved, ["http://example.com/schema.json"]);
        let root = arena.get(arena.root());
        let remote = arena.get(root.property("remote").unwrap());
        assert_eq!(
            remote.unresolved_ref.as_deref(),
            Some("http://example.com/schema.json")
        );
    }

    #[test]
    fn nullable_type_lists_pick_the_concrete_type() {
        let (arena, _) = compile(&json!({
            "type": "object",
            "properties": {"n": {"type": ["null", "integer"], "format": "int32"}}
        }))
        .unwrap();
        let root = arena.get(arena.root());
        let n = arena.get(root.property("n").unwrap());
        assert_eq!(n.ty, Some(SchemaType::Integer));
        assert_eq!(n.extra.get("format"), Some(&json!("int32")));
    }
}
