//! Mapping key paths onto schema locations.

use super::{SchemaArena, SchemaId, SchemaMarkers, SchemaType};
use crate::error::{Result, SchemaError};
use crate::path::{self, KeyPath, PathSegment, ReadMode};
use serde_json::Value;

/// Resolve `key` (template or concrete) to its schema node.
///
/// Each property step descends into `properties`, each array level into the
/// shared `items` definition. `Ok(None)` means the key does not exist;
/// landing on (or passing through) an unresolved reference is an error.
pub fn resolve_schema_path(arena: &SchemaArena, key: &KeyPath) -> Result<Option<SchemaId>> {
    let mut current = arena.root();
    for segment in key.segments() {
        check_resolved(arena, current, key)?;
        let Some(next) = arena.get(current).property(&segment.name) else {
            return Ok(None);
        };
        current = next;
        for _ in &segment.indices {
            check_resolved(arena, current, key)?;
            let Some(items) = arena.get(current).items else {
                return Ok(None);
            };
            current = items;
        }
    }
    check_resolved(arena, current, key)?;
    Ok(Some(current))
}

fn check_resolved(arena: &SchemaArena, id: SchemaId, key: &KeyPath) -> Result<(), SchemaError> {
    match &arena.get(id).unresolved_ref {
        Some(reference) => Err(SchemaError::UnresolvedRef {
            key: key.to_string(),
            reference: reference.clone(),
        }),
        None => Ok(()),
    }
}

/// Look up the schema default for a concrete `key`.
///
/// Array levels are numbered from 1 (outermost). A collection-level
/// `default` on an array schema is consulted only for levels deeper than
/// `top_default_array_level`; the outermost consulted level that yields a
/// value wins over inner levels and over the leaf's own `default`.
pub fn schema_default_at(
    arena: &SchemaArena,
    key: &KeyPath,
    top_default_array_level: usize,
) -> Option<Value> {
    let segments = key.segments();
    let mut current = arena.root();
    let mut level = 0;

    for (pos, segment) in segments.iter().enumerate() {
        current = arena.get(current).property(&segment.name)?;
        for (depth, index) in segment.indices.iter().enumerate() {
            level += 1;
            let array = arena.get(current);
            if level > top_default_array_level {
                if let (Some(default), Some(index)) = (&array.default, index) {
                    let tail = TailPath {
                        indices: &segment.indices[depth + 1..],
                        segments: &segments[pos + 1..],
                    };
                    if let Some(found) = default.get(*index).and_then(|item| tail.read(item)) {
                        return Some(found.clone());
                    }
                }
            }
            current = array.items?;
        }
    }

    arena.get(current).default.clone()
}

/// The remainder of a key path after a given array level.
struct TailPath<'a> {
    indices: &'a [Option<usize>],
    segments: &'a [PathSegment],
}

impl TailPath<'_> {
    fn read<'v>(&self, mut value: &'v Value) -> Option<&'v Value> {
        for index in self.indices {
            value = value.as_array()?.get((*index)?)?;
        }
        let rest = KeyPath::from_segments(self.segments.to_vec());
        path::read(value, &rest)
    }
}

/// Schema facts the value extractor needs about one field.
#[derive(Clone, Debug, Default)]
pub struct FieldSchema<'a> {
    pub ty: Option<SchemaType>,
    pub enum_values: Option<&'a [Value]>,
    pub markers: SchemaMarkers,
}

/// Anything that can describe the schema of a key path.
pub trait SchemaLookup {
    fn field_schema(&self, key: &KeyPath) -> Result<Option<FieldSchema<'_>>>;
}

impl SchemaLookup for SchemaArena {
    fn field_schema(&self, key: &KeyPath) -> Result<Option<FieldSchema<'_>>> {
        let Some(id) = resolve_schema_path(self, key)? else {
            return Ok(None);
        };
        let node = self.get(id);
        Ok(Some(FieldSchema {
            ty: node.ty,
            enum_values: node.enum_values.as_deref(),
            markers: node.markers,
        }))
    }
}

/// Raw JSON schemas (e.g. the validator copy) are looked up through the
/// schema addressing convention with the tuple fallback enabled.
impl SchemaLookup for Value {
    fn field_schema(&self, key: &KeyPath) -> Result<Option<FieldSchema<'_>>> {
        let Some(fragment) = resolve_in_json(self, key)? else {
            return Ok(None);
        };
        let ty = match fragment.get("type") {
            Some(Value::String(name)) => name.parse().ok(),
            Some(Value::Array(names)) => names
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|n| n.parse::<SchemaType>().ok())
                .find(|t| *t != SchemaType::Null),
            _ => None,
        };
        Ok(Some(FieldSchema {
            ty,
            enum_values: fragment.get("enum").and_then(Value::as_array).map(Vec::as_slice),
            markers: SchemaMarkers::default(),
        }))
    }
}

/// Resolve `key` against a raw JSON schema document.
pub fn resolve_in_json<'a>(schema: &'a Value, key: &KeyPath) -> Result<Option<&'a Value>> {
    let schema_path = key.to_schema_path();
    let found = path::read_with(schema, &schema_path, ReadMode::SchemaFallback);
    if let Some(reference) = found.and_then(|f| f.get("$ref")).and_then(Value::as_str) {
        return Err(SchemaError::UnresolvedRef {
            key: key.to_string(),
            reference: reference.to_string(),
        }
        .into());
    }
    Ok(found)
}
