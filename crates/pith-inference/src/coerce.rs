//! Schema coercion layer.
//!
//! Model output drifts: keys arrive in camelCase, enum values capitalized or
//! paraphrased, numbers quoted, booleans spelled as confidence words. This
//! layer rewrites a parsed value tree before validation so one mislabeled
//! claim never aborts a whole book.
//!
//! Coercion runs in two modes. `Strict` applies the safe rewrites (key
//! case, numeric and boolean parsing, enum exact/normalized/alias match).
//! `FuzzyEnums` is the retry mode: it additionally matches enum values by
//! substring and, as a last resort, substitutes the first declared value
//! (logged, never fatal).

use serde_json::{Map, Value as JsonValue};
use tracing::warn;

use crate::schema::{Field, Shape};

/// Coercion strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionMode {
    Strict,
    FuzzyEnums,
}

/// Fixed alias table for enum drift that normalization alone cannot fix.
/// Keys are normalized (lowercase, underscores) alias spellings.
const ENUM_ALIASES: &[(&str, &str)] = &[
    ("core", "core_insight"),
    ("coreinsight", "core_insight"),
    ("key_insight", "core_insight"),
    ("supporting", "supporting_insight"),
    ("supportinginsight", "supporting_insight"),
    ("secondary", "supporting_insight"),
    ("duplicate", "redundant"),
    ("redundancy", "redundant"),
    ("noise", "filler"),
    ("principal", "principle"),
    ("recommend", "recommendation"),
    ("advice", "recommendation"),
    ("cause", "causal"),
    ("causality", "causal"),
    ("clarifies", "clarifies_application"),
    ("disambiguates", "removes_ambiguity"),
    ("hi", "high"),
    ("med", "medium"),
    ("lo", "low"),
];

/// Rewrite a parsed value tree to fit `shape`.
///
/// Never fails; values it cannot make sense of pass through unchanged and
/// are caught by validation.
pub fn coerce(value: &JsonValue, shape: &Shape, mode: CoercionMode) -> JsonValue {
    coerce_value(value, shape, mode).unwrap_or(JsonValue::Null)
}

/// Coerce one value; `None` means "drop to absent" (nulls, unparseable
/// numerics like "not specified").
fn coerce_value(value: &JsonValue, shape: &Shape, mode: CoercionMode) -> Option<JsonValue> {
    if value.is_null() {
        return None;
    }

    match shape {
        Shape::Object(fields) => Some(coerce_object(value, fields, mode)),
        Shape::Array(inner) => match value {
            JsonValue::Array(items) => Some(JsonValue::Array(
                items
                    .iter()
                    .filter_map(|item| coerce_value(item, inner, mode))
                    .collect(),
            )),
            other => Some(other.clone()),
        },
        Shape::Integer | Shape::Number => coerce_number(value),
        Shape::Boolean => Some(coerce_boolean(value)),
        Shape::Enum(values) => Some(coerce_enum(value, values, mode)),
        Shape::String => Some(value.clone()),
    }
}

fn coerce_object(value: &JsonValue, fields: &[Field], mode: CoercionMode) -> JsonValue {
    let JsonValue::Object(map) = value else {
        return value.clone();
    };

    let mut out = Map::new();
    for (key, val) in map {
        let snake = snake_case_key(key);
        match fields.iter().find(|f| f.name == snake) {
            Some(field) => {
                if let Some(coerced) = coerce_value(val, &field.shape, mode) {
                    out.insert(snake, coerced);
                }
            }
            // Unknown keys pass through (validation ignores them).
            None => {
                if !val.is_null() {
                    out.insert(snake, val.clone());
                }
            }
        }
    }
    JsonValue::Object(out)
}

/// camelCase / PascalCase / spaced keys → snake_case.
fn snake_case_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for c in key.chars() {
        if c == ' ' || c == '-' {
            if !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
        } else if c.is_uppercase() {
            if prev_lower && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

fn coerce_number(value: &JsonValue) -> Option<JsonValue> {
    match value {
        JsonValue::Number(_) => Some(value.clone()),
        JsonValue::String(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                return Some(JsonValue::from(i));
            }
            if let Ok(f) = trimmed.parse::<f64>() {
                return serde_json::Number::from_f64(f).map(JsonValue::Number);
            }
            // "not specified", "unknown", "n/a": drop to absent.
            None
        }
        _ => Some(value.clone()),
    }
}

fn coerce_boolean(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Bool(_) => value.clone(),
        JsonValue::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "high" | "medium" => JsonValue::Bool(true),
            "false" | "low" | "none" => JsonValue::Bool(false),
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}

fn coerce_enum(value: &JsonValue, values: &[&str], mode: CoercionMode) -> JsonValue {
    let JsonValue::String(s) = value else {
        return value.clone();
    };

    // Exact match first.
    if values.contains(&s.as_str()) {
        return value.clone();
    }

    // Normalized: lowercase, spaces/dashes → underscores.
    let normalized = normalize_enum(s);
    if values.contains(&normalized.as_str()) {
        return JsonValue::String(normalized);
    }

    // Fixed alias table.
    if let Some((_, canonical)) = ENUM_ALIASES
        .iter()
        .find(|(alias, canonical)| *alias == normalized && values.contains(canonical))
    {
        return JsonValue::String(canonical.to_string());
    }

    if mode == CoercionMode::FuzzyEnums {
        // Substring match in either direction.
        if let Some(candidate) = values
            .iter()
            .find(|v| v.contains(normalized.as_str()) || normalized.contains(**v))
        {
            return JsonValue::String(candidate.to_string());
        }
        // Last resort: substitute the first declared value so downstream
        // processing can continue.
        warn!(value = %s, substituted = values[0], "Unrecognized enum value substituted");
        return JsonValue::String(values[0].to_string());
    }

    value.clone()
}

fn normalize_enum(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_underscore = false;
    for c in s.trim().chars() {
        let c = if c == ' ' || c == '-' { '_' } else { c };
        if c == '_' {
            if !prev_underscore && !out.is_empty() {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.extend(c.to_lowercase());
            prev_underscore = false;
        }
    }
    out.trim_end_matches('_').to_string()
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Validate a (coerced) value against a shape. Returns a dotted-path error
/// message on the first mismatch.
pub fn validate(value: &JsonValue, shape: &Shape) -> Result<(), String> {
    validate_at(value, shape, "$")
}

fn validate_at(value: &JsonValue, shape: &Shape, path: &str) -> Result<(), String> {
    match shape {
        Shape::String => value
            .is_string()
            .then_some(())
            .ok_or_else(|| format!("{}: expected string", path)),
        Shape::Integer | Shape::Number => value
            .is_number()
            .then_some(())
            .ok_or_else(|| format!("{}: expected number", path)),
        Shape::Boolean => value
            .is_boolean()
            .then_some(())
            .ok_or_else(|| format!("{}: expected boolean", path)),
        Shape::Enum(values) => match value.as_str() {
            Some(s) if values.contains(&s) => Ok(()),
            Some(s) => Err(format!(
                "{}: \"{}\" is not one of [{}]",
                path,
                s,
                values.join(", ")
            )),
            None => Err(format!("{}: expected enum string", path)),
        },
        Shape::Array(inner) => match value {
            JsonValue::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    validate_at(item, inner, &format!("{}[{}]", path, i))?;
                }
                Ok(())
            }
            _ => Err(format!("{}: expected array", path)),
        },
        Shape::Object(fields) => match value {
            JsonValue::Object(map) => {
                for field in fields {
                    match map.get(field.name) {
                        Some(v) => {
                            validate_at(v, &field.shape, &format!("{}.{}", path, field.name))?
                        }
                        None if field.required => {
                            return Err(format!("{}: missing required field `{}`", path, field.name))
                        }
                        None => {}
                    }
                }
                Ok(())
            }
            _ => Err(format!("{}: expected object", path)),
        },
    }
}
