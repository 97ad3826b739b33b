//! Element kinds and their capabilities.
//!
//! [`ElementKind`] is the closed set of layout `type` strings. Each kind maps
//! to one [`ElementBehavior`] implementation through the [`KindRegistry`],
//! which answers the structural questions the builder and the computer ask
//! (container? array? input?) and carries the kind-specific option and
//! schema-marker quirks.

use crate::element::OptionItem;
use crate::layout::LayoutNode;
use crate::schema::{CheckboxEncoding, SchemaArena, SchemaId, SchemaNode, SchemaType};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// Every element kind a layout may name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ElementKind {
    Text,
    Password,
    Email,
    Url,
    Tel,
    Date,
    Datetime,
    #[strum(serialize = "datetime-local")]
    DatetimeLocal,
    Time,
    Color,
    Hidden,
    Textarea,
    Wysihtml5,
    Number,
    Range,
    Checkbox,
    Checkboxes,
    Radios,
    Radiobuttons,
    Select,
    Imageselect,
    Question,
    Tagsinput,
    File,
    Fieldset,
    Section,
    Actions,
    Tabs,
    Selectfieldset,
    Array,
    Tabarray,
    Help,
    Submit,
    Button,
}

impl ElementKind {
    /// The kind used when a bound layout element does not name one.
    pub fn infer(arena: &SchemaArena, schema: &SchemaNode) -> Self {
        if schema.enum_values.is_some() {
            return ElementKind::Select;
        }
        match schema.ty {
            Some(SchemaType::Number | SchemaType::Integer) => ElementKind::Number,
            Some(SchemaType::Boolean) => ElementKind::Checkbox,
            Some(SchemaType::Object) if schema.properties.is_empty() => ElementKind::Textarea,
            Some(SchemaType::Object) => ElementKind::Fieldset,
            Some(SchemaType::Array) => {
                let item_enum = schema
                    .items
                    .map(|items| arena.get(items).enum_values.is_some())
                    .unwrap_or(false);
                if item_enum {
                    ElementKind::Checkboxes
                } else {
                    ElementKind::Array
                }
            }
            Some(SchemaType::String | SchemaType::Null) | None => ElementKind::Text,
        }
    }
}

/// Capabilities of one element kind.
pub trait ElementBehavior: Send + Sync {
    fn is_container(&self) -> bool {
        false
    }

    fn is_array(&self) -> bool {
        false
    }

    fn is_input_field(&self) -> bool {
        false
    }

    /// Whether a keyed element of this kind may be bound to `schema`.
    fn accepts(&self, _schema: &SchemaNode) -> bool {
        true
    }

    /// Build the normalized `{value, title}` option list.
    fn prepare_options(
        &self,
        layout: &LayoutNode,
        arena: &SchemaArena,
        schema: Option<SchemaId>,
    ) -> Vec<OptionItem> {
        let enum_values = schema.and_then(|id| arena.get(id).enum_values.as_deref());
        standard_options(layout, enum_values)
    }

    /// Flag the schema with the value encoding this kind produces.
    fn mark_schema(&self, layout: &LayoutNode, arena: &mut SchemaArena, schema: SchemaId) {
        if layout.allow_empty {
            arena.get_mut(schema).markers.allow_empty = true;
        }
    }
}

/// Options priority: explicit list, then title map over the enumeration,
/// then the raw enumeration.
pub fn standard_options(layout: &LayoutNode, enum_values: Option<&[Value]>) -> Vec<OptionItem> {
    if let Some(options) = &layout.options {
        return match options {
            Value::Array(list) => list.iter().map(OptionItem::from_value).collect(),
            Value::Object(map) => map
                .iter()
                .map(|(value, title)| OptionItem::new(Value::String(value.clone()), display(title)))
                .collect(),
            _ => Vec::new(),
        };
    }

    if let Some(title_map) = &layout.title_map {
        return match enum_values {
            Some(values) => values
                .iter()
                .map(|value| {
                    let title = title_map
                        .get(&display(value))
                        .map(display)
                        .unwrap_or_else(|| display(value));
                    OptionItem::new(value.clone(), title)
                })
                .collect(),
            None => title_map
                .iter()
                .map(|(value, title)| OptionItem::new(Value::String(value.clone()), display(title)))
                .collect(),
        };
    }

    enum_values
        .map(|values| {
            values
                .iter()
                .map(|value| OptionItem::new(value.clone(), display(value)))
                .collect()
        })
        .unwrap_or_default()
}

/// Render a JSON value the way it is shown as an option title.
pub(crate) fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

struct InputField;

impl ElementBehavior for InputField {
    fn is_input_field(&self) -> bool {
        true
    }

    fn accepts(&self, schema: &SchemaNode) -> bool {
        !schema.is_structured_object()
    }
}

struct CheckboxesField;

impl ElementBehavior for CheckboxesField {
    fn is_input_field(&self) -> bool {
        true
    }

    fn accepts(&self, schema: &SchemaNode) -> bool {
        schema.ty == Some(SchemaType::Array)
    }

    fn prepare_options(
        &self,
        layout: &LayoutNode,
        arena: &SchemaArena,
        schema: Option<SchemaId>,
    ) -> Vec<OptionItem> {
        let enum_values = schema
            .and_then(|id| arena.get(id).items)
            .and_then(|items| arena.get(items).enum_values.as_deref());
        standard_options(layout, enum_values)
    }

    fn mark_schema(&self, layout: &LayoutNode, arena: &mut SchemaArena, schema: SchemaId) {
        let Some(items) = arena.get(schema).items else {
            return;
        };
        let encoding = if layout.options.is_some() {
            CheckboxEncoding::Value
        } else {
            CheckboxEncoding::Presence
        };
        arena.get_mut(items).markers.checkboxes_as_array = Some(encoding);
    }
}

struct TagsField;

impl ElementBehavior for TagsField {
    fn is_input_field(&self) -> bool {
        true
    }

    fn accepts(&self, schema: &SchemaNode) -> bool {
        schema.ty == Some(SchemaType::Array)
    }

    fn mark_schema(&self, _layout: &LayoutNode, arena: &mut SchemaArena, schema: SchemaId) {
        arena.get_mut(schema).markers.tagsinput = true;
    }
}

struct ContainerField;

impl ElementBehavior for ContainerField {
    fn is_container(&self) -> bool {
        true
    }

    fn accepts(&self, schema: &SchemaNode) -> bool {
        schema.ty == Some(SchemaType::Object)
    }
}

struct ArrayField;

impl ElementBehavior for ArrayField {
    fn is_container(&self) -> bool {
        true
    }

    fn is_array(&self) -> bool {
        true
    }

    fn accepts(&self, schema: &SchemaNode) -> bool {
        schema.ty == Some(SchemaType::Array)
    }
}

/// Buttons, help text: no value, no structure.
struct StaticField;

impl ElementBehavior for StaticField {}

/// Kind → behavior table, built once per tree.
#[derive(Clone)]
pub struct KindRegistry {
    behaviors: HashMap<ElementKind, Arc<dyn ElementBehavior>>,
}

impl KindRegistry {
    pub fn standard() -> Self {
        let input: Arc<dyn ElementBehavior> = Arc::new(InputField);
        let container: Arc<dyn ElementBehavior> = Arc::new(ContainerField);
        let array: Arc<dyn ElementBehavior> = Arc::new(ArrayField);
        let checkboxes: Arc<dyn ElementBehavior> = Arc::new(CheckboxesField);
        let tags: Arc<dyn ElementBehavior> = Arc::new(TagsField);
        let inert: Arc<dyn ElementBehavior> = Arc::new(StaticField);

        let behaviors = ElementKind::iter()
            .map(|kind| {
                let behavior = match kind {
                    ElementKind::Fieldset
                    | ElementKind::Section
                    | ElementKind::Actions
                    | ElementKind::Tabs
                    | ElementKind::Selectfieldset => container.clone(),
                    ElementKind::Array | ElementKind::Tabarray => array.clone(),
                    ElementKind::Checkboxes => checkboxes.clone(),
                    ElementKind::Tagsinput => tags.clone(),
                    ElementKind::Help | ElementKind::Submit | ElementKind::Button => inert.clone(),
                    _ => input.clone(),
                };
                (kind, behavior)
            })
            .collect();

        Self { behaviors }
    }

    pub fn behavior(&self, kind: ElementKind) -> &dyn ElementBehavior {
        self.behaviors
            .get(&kind)
            .map(|b| b.as_ref())
            .unwrap_or(&StaticField)
    }

    pub(crate) fn shared(&self, kind: ElementKind) -> Arc<dyn ElementBehavior> {
        self.behaviors
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Arc::new(StaticField))
    }

    /// Replace the behavior of a kind (host-specific widgets).
    pub fn register(&mut self, kind: ElementKind, behavior: Arc<dyn ElementBehavior>) {
        self.behaviors.insert(kind, behavior);
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for KindRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindRegistry")
            .field("kinds", &self.behaviors.len())
            .finish()
    }
}
