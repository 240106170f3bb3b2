use serde_json::{Map, Value};

use crate::error::{Result, ToolError};

/// Longest raw-argument prefix echoed back on parse failure.
const PREVIEW_CHARS: usize = 500;

/// Parse a raw argument string against a declared parameter schema.
///
/// The raw string comes straight from the provider stream: usually a JSON
/// object, sometimes empty (no-argument tools). Primitive values are coerced
/// to the declared type ("5" → 5, 5 → "5", "true" → true); missing optional
/// parameters become `null`; a missing required parameter is an error.
///
/// Errors here fail the individual tool call, never the turn.
pub fn parse_arguments(schema: &Value, raw: &str) -> Result<Value> {
    let trimmed = raw.trim();
    let parsed: Value = if trimmed.is_empty() {
        Value::Object(Map::new())
    } else {
        serde_json::from_str(trimmed).map_err(|_| ToolError::MalformedArguments {
            preview: preview(raw),
        })?
    };

    let Value::Object(mut obj) = parsed else {
        return Err(ToolError::NotAnObject {
            got: type_name(&parsed).to_string(),
        });
    };

    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();
    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    for (name, prop) in &properties {
        let declared = prop.get("type").and_then(|t| t.as_str()).unwrap_or("");
        match obj.get(name) {
            Some(value) if !value.is_null() => {
                let coerced = coerce(value.clone(), declared);
                obj.insert(name.clone(), coerced);
            }
            _ if required.contains(&name.as_str()) => {
                return Err(ToolError::MissingRequired { name: name.clone() });
            }
            _ => {
                obj.insert(name.clone(), Value::Null);
            }
        }
    }

    Ok(Value::Object(obj))
}

/// Best-effort primitive coercion toward the declared schema type.
/// Values that cannot be coerced pass through unchanged; the tool body
/// reports its own error in that case.
fn coerce(value: Value, declared: &str) -> Value {
    match declared {
        "string" => match value {
            Value::Number(n) => Value::String(n.to_string()),
            Value::Bool(b) => Value::String(b.to_string()),
            other => other,
        },
        "integer" => match value {
            Value::String(s) => match s.trim().parse::<i64>() {
                Ok(i) => Value::from(i),
                Err(_) => Value::String(s),
            },
            other => other,
        },
        "number" => match value {
            Value::String(s) => match s.trim().parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                Some(n) => Value::Number(n),
                None => Value::String(s),
            },
            other => other,
        },
        "boolean" => match value {
            Value::String(s) => match s.trim() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::String(s),
            },
            other => other,
        },
        _ => value,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn preview(raw: &str) -> String {
    raw.chars().take(PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "count": { "type": "integer" },
                "label": { "type": "string" },
                "force": { "type": "boolean" }
            },
            "required": ["count"]
        })
    }

    #[test]
    fn empty_arguments_become_empty_object() {
        let args = parse_arguments(&json!({"type": "object"}), "").unwrap();
        assert_eq!(args, json!({}));
    }

    #[test]
    fn primitives_are_coerced() {
        let args =
            parse_arguments(&schema(), r#"{"count":"5","label":7,"force":"true"}"#).unwrap();
        assert_eq!(args["count"], json!(5));
        assert_eq!(args["label"], json!("7"));
        assert_eq!(args["force"], json!(true));
    }

    #[test]
    fn missing_optional_is_null() {
        let args = parse_arguments(&schema(), r#"{"count":1}"#).unwrap();
        assert_eq!(args["label"], Value::Null);
        assert_eq!(args["force"], Value::Null);
    }

    #[test]
    fn missing_required_is_an_error() {
        let err = parse_arguments(&schema(), r#"{"label":"x"}"#).unwrap_err();
        assert!(matches!(err, ToolError::MissingRequired { ref name } if name == "count"));
    }

    #[test]
    fn malformed_json_carries_a_preview() {
        let err = parse_arguments(&schema(), "{not json").unwrap_err();
        match err {
            ToolError::MalformedArguments { preview } => assert_eq!(preview, "{not json"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_object_arguments_are_rejected() {
        let err = parse_arguments(&schema(), "[1,2]").unwrap_err();
        assert!(matches!(err, ToolError::NotAnObject { .. }));
    }
}
