use anyhow::{anyhow, Context as _, Result};
use form_tree::{extract, FieldEntry, FormDescriptor, FormTree, NodeId, RawValue};
use serde_json::Value;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::info;

/// Read a form descriptor file and build its tree.
pub fn load(path: &Path) -> Result<FormTree> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read descriptor {}", path.display()))?;
    let descriptor = FormDescriptor::from_json(&text)
        .with_context(|| format!("failed to parse descriptor {}", path.display()))?;
    let tree = descriptor
        .into_tree()
        .with_context(|| format!("failed to build form tree from {}", path.display()))?;
    info!(path = %path.display(), nodes = tree.node_count(), "descriptor loaded");
    Ok(tree)
}

pub fn pretty(value: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// One line per rendered node: kind, key, id and value.
pub fn outline(tree: &FormTree) -> String {
    let mut out = String::new();
    tree.walk(|id, node, depth| {
        let Some(element) = tree.element_of(id) else {
            return;
        };
        let _ = write!(out, "{}{}", "  ".repeat(depth), element.kind);
        if let Some(key) = &node.key {
            let _ = write!(out, " {key}");
        }
        if let Some(id) = &node.id {
            let _ = write!(out, " #{id}");
        }
        if node.required {
            out.push_str(" *");
        }
        if let Some(value) = &node.value {
            let _ = write!(out, " = {value}");
        }
        out.push('\n');
    });
    out.trim_end().to_string()
}

/// Read `{"key": raw, ...}` (or `[["key", raw], ...]`) and extract it.
pub fn extract_file(tree: &FormTree, path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read field file {}", path.display()))?;
    let raw: Value = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse field file {}", path.display()))?;
    let entries = field_entries(raw)?;
    Ok(extract(entries, tree.schema())?)
}

fn field_entries(raw: Value) -> Result<Vec<FieldEntry>> {
    match raw {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(key, value)| FieldEntry::new(key, RawValue::from(value)))
            .collect()),
        Value::Array(pairs) => pairs
            .into_iter()
            .map(|pair| match pair {
                Value::Array(mut kv) if kv.len() == 2 => {
                    let value = kv.pop().unwrap_or(Value::Null);
                    match kv.pop() {
                        Some(Value::String(key)) => Ok(FieldEntry::new(key, RawValue::from(value))),
                        _ => Err(anyhow!("field pair keys must be strings")),
                    }
                }
                other => Err(anyhow!("expected a [key, value] pair, found {other}")),
            })
            .collect(),
        other => Err(anyhow!("a field file must be an object or a list of pairs, found {other}")),
    }
}

fn array_node(tree: &FormTree, key: &str) -> Result<NodeId> {
    tree.find_by_key(key)
        .ok_or_else(|| anyhow!("no node with key '{key}'"))
}

pub fn insert(tree: &mut FormTree, key: &str, index: usize) -> Result<Value> {
    let array = array_node(tree, key)?;
    tree.insert(array, index)
        .with_context(|| format!("failed to insert into '{key}' at {index}"))?;
    Ok(tree.values()?)
}

pub fn delete(tree: &mut FormTree, key: &str, index: usize) -> Result<Value> {
    let array = array_node(tree, key)?;
    tree.delete(array, index)
        .with_context(|| format!("failed to delete '{key}' item {index}"))?;
    Ok(tree.values()?)
}

pub fn bounds(tree: &FormTree, key: &str) -> Result<String> {
    let bounds = tree.array_bounds(array_node(tree, key)?)?;
    let show = |bound: Option<usize>| bound.map_or_else(|| "none".to_string(), |b| b.to_string());
    Ok(format!(
        "minItems: {}\nmaxItems: {}",
        show(bounds.min_items),
        show(bounds.max_items)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file(content: &Value) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        file
    }

    fn descriptor() -> NamedTempFile {
        file(&json!({
            "schema": {
                "name": {"type": "string", "required": true},
                "scores": {"type": "array", "maxItems": 3, "items": {"type": "number"}}
            },
            "value": {"name": "Ada", "scores": [1, 2]}
        }))
    }

    #[test]
    fn outline_lists_every_node() {
        let tree = load(descriptor().path()).unwrap();
        let outline = outline(&tree);
        let lines: Vec<_> = outline.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "  text name #jsonform-elt-name * = \"Ada\"");
        assert_eq!(lines[4], "    number scores[1] #jsonform-elt-scores-1 = 2");
    }

    #[test]
    fn extract_reads_objects_and_pairs() {
        let tree = load(descriptor().path()).unwrap();

        let fields = file(&json!({"name": "Grace", "scores[0]": "4.5"}));
        assert_eq!(
            extract_file(&tree, fields.path()).unwrap(),
            json!({"name": "Grace", "scores": [4.5]})
        );

        let pairs = file(&json!([["scores[1]", "2"], ["name", ""]]));
        assert_eq!(
            extract_file(&tree, pairs.path()).unwrap(),
            json!({"scores": [null, 2]})
        );
    }

    #[test]
    fn array_previews_and_bounds() {
        let mut tree = load(descriptor().path()).unwrap();
        assert_eq!(bounds(&tree, "scores").unwrap(), "minItems: none\nmaxItems: 3");
        assert_eq!(
            delete(&mut tree, "scores", 0).unwrap(),
            json!({"name": "Ada", "scores": [2]})
        );
        assert!(insert(&mut tree, "missing", 0).is_err());
    }

    #[test]
    fn unreadable_descriptors_report_the_path() {
        let broken = file(&json!("not a descriptor"));
        let err = load(broken.path()).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse descriptor"));
    }
}
