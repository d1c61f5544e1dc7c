//! Template engine for derived fields
//!
//! A template is literal text with `{field}` or `{field.sub | filter | ...}`
//! expressions rendered against one raw record. Filters: lowercase,
//! uppercase, slug, sort, join:sep, default:val.

use super::traits::AdapterError;
use super::types::RawRecord;
use serde_json::Value;

/// Render a template against a raw record.
///
/// Returns `Ok(None)` when an expression resolves to null or an absent
/// field and no `default` filter supplied a value; the derived field is
/// then left out.
pub(crate) fn render_template(
    template: &str,
    record: &RawRecord,
) -> Result<Option<String>, AdapterError> {
    let mut result = String::new();
    let mut chars = template.chars();

    while let Some(ch) = chars.next() {
        if ch == '{' {
            let mut expr = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(c) => expr.push(c),
                    None => {
                        return Err(AdapterError::Template(format!(
                            "unclosed template expression in: {}",
                            template
                        )))
                    }
                }
            }
            match eval_expression(expr.trim(), record)? {
                Some(rendered) => result.push_str(&rendered),
                None => return Ok(None),
            }
        } else {
            result.push(ch);
        }
    }

    Ok(Some(result))
}

/// Check that every `{` is closed and every filter is known.
pub(crate) fn validate_template(template: &str) -> Result<(), AdapterError> {
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| {
            AdapterError::Template(format!("unclosed template expression in: {}", template))
        })?;
        let expr = &after[..end];
        for filter in expr.split('|').skip(1) {
            let name = filter.split(':').next().unwrap_or_default().trim();
            if !KNOWN_FILTERS.contains(&name) {
                return Err(AdapterError::Template(format!("unknown template filter: {}", name)));
            }
        }
        rest = &after[end + 1..];
    }
    Ok(())
}

const KNOWN_FILTERS: [&str; 6] = ["lowercase", "uppercase", "slug", "sort", "join", "default"];

/// Evaluate a single template expression (the part between { and }).
fn eval_expression(expr: &str, record: &RawRecord) -> Result<Option<String>, AdapterError> {
    let mut parts = expr.split('|');
    let accessor = parts.next().unwrap_or_default().trim();

    let mut current = resolve_accessor(accessor, record);
    for filter in parts {
        current = apply_single_filter(&current, filter.trim())?;
    }

    match current {
        Value::Null => Ok(None),
        other => value_to_string(&other).map(Some),
    }
}

/// Resolve a dotted accessor into the record; absent resolves to null.
fn resolve_accessor(accessor: &str, record: &RawRecord) -> Value {
    let mut segments = accessor.split('.');
    let Some(first) = segments.next() else {
        return Value::Null;
    };
    let mut current = match record.get(first) {
        Some(v) => v,
        None => return Value::Null,
    };
    for segment in segments {
        match current.get(segment) {
            Some(v) => current = v,
            None => return Value::Null,
        }
    }
    current.clone()
}

/// Convert a JSON value to its string representation for template output.
pub(crate) fn value_to_string(value: &Value) -> Result<String, AdapterError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Array(arr) => {
            let items: Result<Vec<String>, _> = arr.iter().map(value_to_string).collect();
            Ok(items?.join(","))
        }
        Value::Object(_) => Err(AdapterError::Template(
            "cannot render object as string in template".to_string(),
        )),
    }
}

fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    let mut pending_dash = false;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn map_string(value: &Value, filter: &str, f: impl Fn(&str) -> String) -> Result<Value, AdapterError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(Value::String(f(s))),
        Value::Number(n) => Ok(Value::String(f(&n.to_string()))),
        _ => Err(AdapterError::Template(format!(
            "{} filter requires a string value",
            filter
        ))),
    }
}

fn string_items(arr: &[Value]) -> Vec<String> {
    arr.iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            _ => None,
        })
        .collect()
}

/// Apply a single filter to a JSON value.
fn apply_single_filter(value: &Value, filter: &str) -> Result<Value, AdapterError> {
    let (name, arg) = match filter.split_once(':') {
        Some((n, a)) => (n.trim(), Some(a.trim())),
        None => (filter.trim(), None),
    };

    match name {
        "lowercase" => map_string(value, name, str::to_lowercase),
        "uppercase" => map_string(value, name, str::to_uppercase),
        "slug" => map_string(value, name, slugify),
        "sort" => match value {
            Value::Null => Ok(Value::Null),
            Value::Array(arr) => {
                let mut sorted = string_items(arr);
                sorted.sort();
                Ok(Value::Array(sorted.into_iter().map(Value::String).collect()))
            }
            _ => Err(AdapterError::Template(
                "sort filter requires an array value".to_string(),
            )),
        },
        "join" => {
            let sep = arg.unwrap_or(",");
            match value {
                Value::Null => Ok(Value::Null),
                Value::Array(arr) => Ok(Value::String(string_items(arr).join(sep))),
                _ => Err(AdapterError::Template(
                    "join filter requires an array value".to_string(),
                )),
            }
        }
        "default" => {
            let default_val = arg.unwrap_or("");
            match value {
                Value::Null => Ok(Value::String(default_val.to_string())),
                Value::String(s) if s.is_empty() => Ok(Value::String(default_val.to_string())),
                other => Ok(other.clone()),
            }
        }
        _ => Err(AdapterError::Template(format!(
            "unknown template filter: {}",
            name
        ))),
    }
}
