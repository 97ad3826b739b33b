//! `{{ expression }}` templates in presentation strings and defaults.
//!
//! Supported expressions:
//!
//! - `idx`: 1-based position inside the nearest enclosing array
//! - `value`: the node's own computed value
//! - `getValue("a[].b")` / `values.a[].b`: another field's initial value,
//!   with `[]` bound to the node's array path
//! - any other dotted name is looked up in the caller-supplied `tpldata`
//!
//! An expression that cannot be evaluated renders as an empty string.

use crate::kind::display;
use crate::path;
use serde_json::{Map, Value};
use tracing::warn;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Everything a template may refer to.
pub struct TemplateContext<'a> {
    pub idx: usize,
    pub value: Option<&'a Value>,
    pub tpldata: &'a Map<String, Value>,
    pub get_value: &'a dyn Fn(&str) -> Option<Value>,
}

pub fn has_template(text: &str) -> bool {
    text.contains(OPEN)
}

/// Render `template`, leaving text without placeholders untouched.
pub fn render(template: &str, ctx: &TemplateContext<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];
        let Some(end) = after.find(CLOSE) else {
            out.push_str(&rest[start..]);
            return out;
        };
        let expr = after[..end].trim();
        match evaluate(expr, ctx) {
            Some(value) => out.push_str(&display(&value)),
            None => warn!(%expr, %template, "template expression left empty"),
        }
        rest = &after[end + CLOSE.len()..];
    }
    out.push_str(rest);
    out
}

/// Render a JSON value when it is a templated string, else clone it.
pub fn render_value(value: &Value, ctx: &TemplateContext<'_>) -> Value {
    match value {
        Value::String(s) if has_template(s) => Value::String(render(s, ctx)),
        other => other.clone(),
    }
}

fn evaluate(expr: &str, ctx: &TemplateContext<'_>) -> Option<Value> {
    match expr {
        "idx" => return Some(Value::from(ctx.idx)),
        "value" => return ctx.value.cloned(),
        _ => {}
    }
    if let Some(key) = expr.strip_prefix("values.") {
        return (ctx.get_value)(key);
    }
    if let Some(key) = call_argument(expr, "getValue") {
        return (ctx.get_value)(key);
    }

    let name = expr.strip_prefix("tpldata.").unwrap_or(expr);
    let (head, tail) = match name.split_once('.') {
        Some((head, tail)) => (head, Some(tail)),
        None => (name, None),
    };
    let root = ctx.tpldata.get(head)?;
    match tail {
        None => Some(root.clone()),
        Some(tail) => path::read_str(root, tail).ok().flatten().cloned(),
    }
}

/// `name("arg")` or `name('arg')` → `arg`.
fn call_argument<'e>(expr: &'e str, name: &str) -> Option<&'e str> {
    let inner = expr.strip_prefix(name)?.trim_start();
    let inner = inner.strip_prefix('(')?.strip_suffix(')')?.trim();
    inner
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| inner.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_context<R>(f: impl FnOnce(&TemplateContext<'_>) -> R) -> R {
        let tpldata = json!({"site": {"name": "Forge"}, "unit": "kg"});
        let Value::Object(tpldata) = tpldata else {
            unreachable!()
        };
        let value = json!(42);
        let lookup = |key: &str| match key {
            "person.name" => Some(json!("Ada")),
            _ => None,
        };
        let ctx = TemplateContext {
            idx: 3,
            value: Some(&value),
            tpldata: &tpldata,
            get_value: &lookup,
        };
        f(&ctx)
    }

    #[test]
    fn renders_builtin_names() {
        with_context(|ctx| {
            assert_eq!(render("Item {{idx}}", ctx), "Item 3");
            assert_eq!(render("{{ value }} {{unit}}", ctx), "42 kg");
            assert_eq!(render("{{site.name}}", ctx), "Forge");
            assert_eq!(render("{{tpldata.site.name}}", ctx), "Forge");
        });
    }

    #[test]
    fn values_references_become_lookups() {
        with_context(|ctx| {
            assert_eq!(render("Hello {{values.person.name}}", ctx), "Hello Ada");
            assert_eq!(render("{{ getValue('person.name') }}!", ctx), "Ada!");
            assert_eq!(render("{{getValue(\"person.name\")}}", ctx), "Ada");
        });
    }

    #[test]
    fn unknown_and_unterminated_expressions() {
        with_context(|ctx| {
            assert_eq!(render("a{{nope}}b", ctx), "ab");
            assert_eq!(render("open {{idx", ctx), "open {{idx");
            assert_eq!(render("plain", ctx), "plain");
        });
    }

    #[test]
    fn only_templated_strings_are_rewritten() {
        with_context(|ctx| {
            assert_eq!(render_value(&json!("#{{idx}}"), ctx), json!("#3"));
            assert_eq!(render_value(&json!(7), ctx), json!(7));
        });
    }
}
