//! Shorthand expansion and legacy (draft-3 style) rewriting.
//!
//! Both passes work on plain JSON values. A parsed JSON document is a tree,
//! so sub-schemas are never aliased at this stage; sharing only appears once
//! references are resolved in the arena.

use crate::error::{Result, SchemaError};
use serde_json::{json, Map, Value};
use tracing::trace;

/// Wrap a bare property map into `{type: "object", properties: ...}`.
///
/// A root that already declares `properties`, or declares itself an object,
/// is returned as is.
pub fn expand_shorthand(raw: &Value) -> Result<Value> {
    let Some(root) = raw.as_object() else {
        return Err(SchemaError::InvalidRoot(describe(raw)).into());
    };
    let declares_object = root.get("type").and_then(Value::as_str) == Some("object");
    if root.contains_key("properties") || declares_object {
        return Ok(raw.clone());
    }
    trace!("expanding shorthand schema");
    Ok(json!({
        "type": "object",
        "properties": raw.clone(),
    }))
}

/// Rewrite legacy conventions in place, starting at the root.
pub fn rewrite_legacy(schema: &mut Value) -> Result<()> {
    rewrite_node(schema, "", false)?;
    Ok(())
}

/// Returns true when the node carried `required: true` that the caller
/// (its parent object) must hoist.
fn rewrite_node(
    node: &mut Value,
    path: &str,
    has_parent_object: bool,
) -> Result<bool, SchemaError> {
    let Some(obj) = node.as_object_mut() else {
        return Ok(false);
    };

    if let Some(read_only) = obj.shift_remove("readonly") {
        obj.entry("readOnly").or_insert(read_only);
    }

    unwrap_tuple_items(obj, path)?;

    let mut hoisted = Vec::new();
    if let Some(Value::Object(props)) = obj.get_mut("properties") {
        for (name, child) in props.iter_mut() {
            let child_path = join(path, name);
            if rewrite_node(child, &child_path, true)? {
                hoisted.push(name.clone());
            }
        }
    }
    if let Some(items) = obj.get_mut("items") {
        rewrite_node(items, &format!("{path}[]"), false)?;
    }
    if let Some(additional) = obj.get_mut("additionalProperties") {
        rewrite_node(additional, &join(path, "*"), false)?;
    }
    if let Some(Value::Object(definitions)) = obj.get_mut("definitions") {
        for (name, definition) in definitions.iter_mut() {
            rewrite_node(definition, &format!("#/definitions/{name}"), false)?;
        }
    }

    let mut flagged = false;
    let mut required: Vec<Value> = Vec::new();
    match obj.shift_remove("required") {
        None | Some(Value::Bool(false)) => {}
        Some(Value::Bool(true)) => {
            if has_parent_object {
                flagged = true;
            } else if obj.get("type").and_then(Value::as_str) == Some("string") {
                let min = obj.get("minLength").and_then(Value::as_u64).unwrap_or(0);
                obj.insert("minLength".into(), json!(min.max(1)));
            }
        }
        Some(Value::Array(list)) => required = list,
        Some(other) => {
            return Err(SchemaError::MalformedRequired {
                path: display_path(path),
                found: describe(&other),
            })
        }
    }

    for name in hoisted {
        if !required.iter().any(|r| r.as_str() == Some(name.as_str())) {
            required.push(Value::String(name));
        }
    }
    if !required.is_empty() {
        obj.insert("required".into(), Value::Array(required));
    }

    Ok(flagged)
}

fn unwrap_tuple_items(obj: &mut Map<String, Value>, path: &str) -> Result<(), SchemaError> {
    let Some(Value::Array(list)) = obj.get_mut("items") else {
        return Ok(());
    };
    let replacement = match list.len() {
        0 => json!({}),
        1 => list.remove(0),
        count => {
            return Err(SchemaError::HeterogeneousItems {
                path: display_path(path),
                count,
            })
        }
    };
    obj.insert("items".into(), replacement);
    Ok(())
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "<root>".into()
    } else {
        path.to_string()
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(_) => "a boolean".into(),
        Value::Number(n) => format!("the number {n}"),
        Value::String(s) => format!("the string {s:?}"),
        Value::Array(_) => "an array".into(),
        Value::Object(_) => "an object".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormError;
    use pretty_assertions::assert_eq;

    fn rewrite(mut schema: Value) -> Result<Value> {
        rewrite_legacy(&mut schema)?;
        Ok(schema)
    }

    #[test]
    fn shorthand_is_wrapped_into_an_object() {
        let expanded = expand_shorthand(&json!({"name": {"type": "string"}})).unwrap();
        assert_eq!(
            expanded,
            json!({"type": "object", "properties": {"name": {"type": "string"}}})
        );
    }

    #[test]
    fn readonly_is_renamed() {
        let out = rewrite(json!({
            "type": "object",
            "properties": {"a": {"type": "string", "readonly": true}}
        }))
        .unwrap();
        assert_eq!(out["properties"]["a"], json!({"type": "string", "readOnly": true}));
    }

    #[test]
    fn nested_required_flags_merge_with_existing_lists() {
        let out = rewrite(json!({
            "type": "object",
            "required": ["b"],
            "properties": {
                "a": {"type": "string", "required": true},
                "b": {"type": "string"},
                "c": {
                    "type": "object",
                    "required": true,
                    "properties": {"d": {"type": "number", "required": true}}
                },
                "e": {"type": "string", "required": false}
            }
        }))
        .unwrap();
        assert_eq!(out["required"], json!(["b", "a", "c"]));
        assert_eq!(out["properties"]["c"]["required"], json!(["d"]));
        assert!(out["properties"]["e"].get("required").is_none());
    }

    #[test]
    fn required_string_without_parent_object_gets_min_length() {
        let out = rewrite(json!({
            "type": "object",
            "properties": {
                "tags": {"type": "array", "items": {"type": "string", "required": true}}
            }
        }))
        .unwrap();
        assert_eq!(
            out["properties"]["tags"]["items"],
            json!({"type": "string", "minLength": 1})
        );
    }

    #[test]
    fn empty_required_list_is_dropped() {
        let out = rewrite(json!({"type": "object", "required": [], "properties": {}})).unwrap();
        assert!(out.get("required").is_none());
    }

    #[test]
    fn malformed_required_is_rejected() {
        let err = rewrite(json!({
            "type": "object",
            "properties": {"a": {"type": "string", "required": "yes"}}
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            FormError::Schema(SchemaError::MalformedRequired { ref path, .. }) if path == "a"
        ));
    }

    #[test]
    fn tuple_items_are_unwrapped_or_rejected() {
        let out = rewrite(json!({
            "type": "object",
            "properties": {
                "one": {"type": "array", "items": [{"type": "string"}]},
                "none": {"type": "array", "items": []}
            }
        }))
        .unwrap();
        assert_eq!(out["properties"]["one"]["items"], json!({"type": "string"}));
        assert_eq!(out["properties"]["none"]["items"], json!({}));

        let err = rewrite(json!({
            "type": "object",
            "properties": {"two": {"type": "array", "items": [{}, {}]}}
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            FormError::Schema(SchemaError::HeterogeneousItems { count: 2, .. })
        ));
    }
}
