//! Flat `(key, raw value)` pairs back into a structured, typed value.

use crate::error::Result;
use crate::path::{self, KeyPath};
use crate::schema::{CheckboxEncoding, FieldSchema, SchemaLookup, SchemaType};
use serde_json::{Map, Number, Value};
use tracing::{trace, warn};

/// The raw state of one field as a renderer reports it.
#[derive(Clone, Debug, PartialEq)]
pub enum RawValue {
    /// Text typed into (or selected in) a widget.
    Text(String),
    /// The item list of a tag-style widget.
    Items(Vec<Value>),
    /// An already structured value.
    Value(Value),
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => RawValue::Text(text),
            Value::Array(items) => RawValue::Items(items),
            other => RawValue::Value(other),
        }
    }
}

impl From<&str> for RawValue {
    fn from(text: &str) -> Self {
        RawValue::Text(text.to_string())
    }
}

impl RawValue {
    fn into_value(self) -> Value {
        match self {
            RawValue::Text(text) => Value::String(text),
            RawValue::Items(items) => Value::Array(items),
            RawValue::Value(value) => value,
        }
    }

    /// Whether a presence-only checkbox reports "checked".
    fn is_checked(&self) -> bool {
        match self {
            RawValue::Text(text) => matches!(text.as_str(), "1" | "true" | "on"),
            RawValue::Value(Value::Bool(checked)) => *checked,
            RawValue::Value(Value::Number(n)) => n.as_i64() == Some(1),
            _ => false,
        }
    }
}

/// One field of a flat collection.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldEntry {
    /// Concrete key path; a trailing `[]` appends to the array.
    pub key: String,
    pub raw: RawValue,
}

impl FieldEntry {
    pub fn new(key: impl Into<String>, raw: impl Into<RawValue>) -> Self {
        Self {
            key: key.into(),
            raw: raw.into(),
        }
    }
}

/// Build a fresh value object out of `entries`.
pub fn extract<I, S>(entries: I, schema: &S) -> Result<Value>
where
    I: IntoIterator<Item = FieldEntry>,
    S: SchemaLookup + ?Sized,
{
    let mut out = Value::Object(Map::new());
    extract_into(&mut out, entries, schema)?;
    Ok(out)
}

/// Write `entries` into an existing value object.
pub fn extract_into<I, S>(target: &mut Value, entries: I, schema: &S) -> Result<()>
where
    I: IntoIterator<Item = FieldEntry>,
    S: SchemaLookup + ?Sized,
{
    for entry in entries {
        let key = KeyPath::parse(&entry.key)?;

        match key.without_last_index() {
            // `tags[]`: append to the array, once per distinct value.
            Some((owner, None)) => {
                let Some(field) = schema.field_schema(&owner)? else {
                    trace!(key = %entry.key, "no schema, skipped");
                    continue;
                };
                if field.ty != Some(SchemaType::Array) {
                    continue;
                }
                let item = schema.field_schema(&key)?.unwrap_or_default();
                let value = coerce(entry.raw.into_value(), &item);
                if !value.is_null() {
                    push(target, &owner, value, true)?;
                }
                continue;
            }
            // `choices[2]` of a multi-checkbox field.
            Some((owner, Some(index))) => {
                if let Some(item) = schema.field_schema(&key)? {
                    if let Some(encoding) = item.markers.checkboxes_as_array {
                        let value = match encoding {
                            CheckboxEncoding::Value => Some(coerce(entry.raw.into_value(), &item)),
                            CheckboxEncoding::Presence if entry.raw.is_checked() => {
                                item.enum_values.and_then(|e| e.get(index)).cloned()
                            }
                            CheckboxEncoding::Presence => None,
                        };
                        if let Some(value) = value.filter(|v| !v.is_null()) {
                            push(target, &owner, value, false)?;
                        }
                        continue;
                    }
                }
            }
            None => {}
        }

        let Some(field) = schema.field_schema(&key)? else {
            trace!(key = %entry.key, "no schema, skipped");
            continue;
        };
        let value = if field.markers.tagsinput {
            tags(entry.raw)
        } else {
            coerce(entry.raw.into_value(), &field)
        };
        if !value.is_null() {
            path::write(target, &key, value)?;
        }
    }
    Ok(())
}

fn push(target: &mut Value, owner: &KeyPath, value: Value, dedup: bool) -> Result<()> {
    let mut items = match path::read(target, owner) {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    if !(dedup && items.contains(&value)) {
        items.push(value);
    }
    path::write(target, owner, Value::Array(items))
}

fn tags(raw: RawValue) -> Value {
    match raw {
        RawValue::Items(items) => Value::Array(items),
        RawValue::Text(text) if text.trim().is_empty() => Value::Null,
        RawValue::Text(text) => Value::Array(
            text.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(|t| Value::String(t.to_string()))
                .collect(),
        ),
        RawValue::Value(value) => value,
    }
}

/// Convert a textual value to the field's schema type. Structured values
/// pass through untouched.
pub fn coerce(value: Value, field: &FieldSchema<'_>) -> Value {
    let Value::String(text) = value else {
        return value;
    };

    match field.ty {
        Some(SchemaType::Boolean) => match text.as_str() {
            "" => Value::Null,
            "0" | "false" => Value::Bool(false),
            _ => Value::Bool(true),
        },
        Some(SchemaType::Number | SchemaType::Integer) => parse_number(text.trim()),
        Some(SchemaType::Object) => {
            if text.is_empty() {
                Value::Null
            } else if text.trim_start().starts_with('{') {
                parse_json(&text, Value::Object(Map::new()))
            } else {
                warn!(%text, "object field holds a non-JSON string");
                Value::Object(Map::new())
            }
        }
        Some(SchemaType::Array) => {
            if text.trim_start().starts_with('[') {
                parse_json(&text, Value::Array(Vec::new()))
            } else {
                Value::Null
            }
        }
        Some(SchemaType::Null) => Value::Null,
        Some(SchemaType::String) | None => {
            if text.is_empty() && !field.markers.allow_empty {
                Value::Null
            } else {
                Value::String(text)
            }
        }
    }
}

fn parse_number(text: &str) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    if let Ok(int) = text.parse::<i64>() {
        return Value::from(int);
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn parse_json(text: &str, fallback: Value) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(parsed) if std::mem::discriminant(&parsed) == std::mem::discriminant(&fallback) => parsed,
        Ok(_) => fallback,
        Err(err) => {
            warn!(%err, "embedded JSON could not be parsed");
            fallback
        }
    }
}
