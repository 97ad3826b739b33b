//! Integration tests for building trees and computing/extracting values:
//! - key-path template round trips
//! - array paths and array ancestors
//! - value priority (submitted > layout > schema default)
//! - flat field round trips through `extract`
//! - layout-driven encodings: tag lists, option checkboxes, allowEmpty

use form_tree::path::template_of;
use form_tree::{
    apply_array_path, extract, normalize, FieldEntry, FormDescriptor, FormTree, KeyPath, Layout,
    NodeId, RawValue,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn groups_schema() -> Value {
    json!({
        "groups": {
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "members": {"type": "array", "items": {"type": "string"}}
                }
            }
        }
    })
}

fn value_at(tree: &FormTree, key: &str) -> Option<Value> {
    tree.node(tree.find_by_key(key)?)?.value.clone()
}

#[test]
fn templates_survive_binding_and_unbinding() {
    let cases: [(&str, &[usize]); 4] = [
        ("a[].b[].c", &[0, 1]),
        ("list[]", &[41]),
        ("grid[][]", &[3, 7]),
        ("plain.key", &[]),
    ];
    for (template, indices) in cases {
        let concrete = apply_array_path(template, indices);
        assert!(KeyPath::parse_concrete(&concrete).is_ok(), "{concrete}");
        assert_eq!(template_of(&concrete), template);
    }
}

#[test]
fn array_path_length_matches_array_ancestors() {
    let tree = FormTree::builder(groups_schema())
        .values(json!({
            "groups": [
                {"name": "a", "members": ["x", "y"]},
                {"name": "b", "members": ["z"]}
            ]
        }))
        .build()
        .unwrap();

    let mut checked = 0;
    tree.walk(|id, node, _| {
        let mut arrays = 0;
        let mut cursor = node.parent;
        while let Some(parent) = cursor {
            if tree.is_array(parent) {
                arrays += 1;
            }
            cursor = tree.node(parent).and_then(|p| p.parent);
        }
        assert_eq!(node.array_path.len(), arrays, "node {id}");
        checked += 1;
    });
    assert!(checked > 8);

    let member: NodeId = tree.find_by_key("groups[0].members[1]").unwrap();
    assert_eq!(tree.node(member).unwrap().array_path.as_slice(), &[0, 1]);
    assert_eq!(value_at(&tree, "groups[1].members[0]"), Some(json!("z")));
}

#[test]
fn required_flags_are_hoisted() {
    let normalized = normalize(&json!({
        "type": "object",
        "properties": {"a": {"type": "string", "required": true}}
    }))
    .unwrap();
    assert_eq!(normalized.validation["required"], json!(["a"]));
    assert!(normalized.validation["properties"]["a"].get("required").is_none());
}

#[test]
fn submitted_beats_layout_beats_schema_default() {
    let schema = json!({
        "motto": {"type": "string", "default": "Carpe diem quam minimum", "maxLength": 10}
    });
    let with_layout_value = || Layout::from_value(&json!([{"key": "motto", "value": "Y"}])).unwrap();

    let tree = FormTree::builder(schema.clone())
        .layout(with_layout_value())
        .values(json!({"motto": "X"}))
        .build()
        .unwrap();
    assert_eq!(value_at(&tree, "motto"), Some(json!("X")));

    let tree = FormTree::builder(schema.clone())
        .layout(with_layout_value())
        .build()
        .unwrap();
    assert_eq!(value_at(&tree, "motto"), Some(json!("Y")));

    let tree = FormTree::builder(schema).build().unwrap();
    assert_eq!(value_at(&tree, "motto"), Some(json!("Carpe die…")));
}

#[test]
fn flat_fields_round_trip_through_extract() {
    let schema = json!({
        "name": {"type": "string"},
        "age": {"type": "integer"},
        "ratio": {"type": "number"},
        "active": {"type": "boolean"}
    });
    let tree = FormTree::builder(schema)
        .values(json!({"name": "Ada", "age": "36", "ratio": 0.5, "active": false}))
        .build()
        .unwrap();

    let entries = tree.field_entries();
    assert_eq!(entries.len(), 4);
    let value = extract(entries, tree.schema()).unwrap();
    assert_eq!(
        value,
        json!({"name": "Ada", "age": 36, "ratio": 0.5, "active": false})
    );
}

#[test]
fn renderer_text_is_coerced_on_extraction() {
    let tree = FormTree::builder(json!({
        "nick": {"type": "string"},
        "score": {"type": "number"},
        "extra": {"type": "object"}
    }))
    .build()
    .unwrap();

    let value = extract(
        vec![
            FieldEntry::new("nick", ""),
            FieldEntry::new("score", "3.5"),
            FieldEntry::new("extra", "{"),
        ],
        tree.schema(),
    )
    .unwrap();
    assert_eq!(value, json!({"score": 3.5, "extra": {}}));
}

#[test]
fn checkbox_lists_accumulate_enum_members() {
    let tree = FormTree::builder(json!({
        "colors": {"type": "array", "items": {"type": "string", "enum": ["red", "green", "blue"]}}
    }))
    .build()
    .unwrap();

    let colors = tree.element_of(tree.find_by_key("colors").unwrap()).unwrap();
    assert_eq!(colors.kind.as_ref(), "checkboxes");
    assert_eq!(colors.options.len(), 3);

    let value = extract(
        vec![
            FieldEntry::new("colors[0]", "1"),
            FieldEntry::new("colors[1]", "0"),
            FieldEntry::new("colors[2]", "1"),
        ],
        tree.schema(),
    )
    .unwrap();
    assert_eq!(value, json!({"colors": ["red", "blue"]}));
}

#[test]
fn descriptors_carry_layout_values_and_options() {
    let descriptor = FormDescriptor::from_json(
        r#"{
            "schema": {"title": {"type": "string", "title": "Title for {{owner}}"}},
            "form": [{"key": "title", "placeholder": "{{idx}}"}],
            "value": {"title": "Draft"},
            "tpldata": {"owner": "Ada"}
        }"#,
    )
    .unwrap();
    let tree = descriptor.into_tree().unwrap();
    let node = tree.node(tree.find_by_key("title").unwrap()).unwrap();
    assert_eq!(node.title.as_deref(), Some("Title for Ada"));
    assert_eq!(node.placeholder.as_deref(), Some("1"));
    assert_eq!(node.value, Some(json!("Draft")));
}

fn with_layout(schema: Value, form: Value) -> FormTree {
    FormTree::builder(schema)
        .layout(Layout::from_value(&form).unwrap())
        .build()
        .unwrap()
}

#[test]
fn tag_inputs_split_text_and_keep_item_lists() {
    let tree = with_layout(
        json!({"tags": {"type": "array", "items": {"type": "string"}}}),
        json!([{"key": "tags", "type": "tagsinput"}]),
    );

    let from_text = extract(vec![FieldEntry::new("tags", "a, b,, ")], tree.schema()).unwrap();
    assert_eq!(from_text, json!({"tags": ["a", "b"]}));

    let from_items = extract(
        vec![FieldEntry::new("tags", RawValue::Items(vec![json!("x"), json!("y z")]))],
        tree.schema(),
    )
    .unwrap();
    assert_eq!(from_items, json!({"tags": ["x", "y z"]}));

    let blank = extract(vec![FieldEntry::new("tags", "  ")], tree.schema()).unwrap();
    assert_eq!(blank, json!({}));
}

#[test]
fn option_checkboxes_carry_their_own_values() {
    let tree = with_layout(
        json!({
            "colors": {"type": "array", "items": {"type": "string", "enum": ["red", "green", "blue"]}}
        }),
        json!([{"key": "colors", "type": "checkboxes", "options": ["blue", "red"]}]),
    );
    let colors = tree.element_of(tree.find_by_key("colors").unwrap()).unwrap();
    assert_eq!(colors.options.len(), 2);

    let value = extract(
        vec![
            FieldEntry::new("colors[0]", "blue"),
            FieldEntry::new("colors[1]", ""),
            FieldEntry::new("colors[2]", "red"),
        ],
        tree.schema(),
    )
    .unwrap();
    assert_eq!(value, json!({"colors": ["blue", "red"]}));
}

#[test]
fn allow_empty_keeps_blank_strings() {
    let schema = json!({"nick": {"type": "string"}, "name": {"type": "string"}});
    let tree = with_layout(schema, json!([{"key": "nick", "allowEmpty": true}, "name"]));

    let value = extract(
        vec![FieldEntry::new("nick", ""), FieldEntry::new("name", "")],
        tree.schema(),
    )
    .unwrap();
    assert_eq!(value, json!({"nick": ""}));
}
