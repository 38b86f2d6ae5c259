//! Response schemas for constrained JSON generation.

use schemars::JsonSchema;
use serde_json::Value;

/// Keys the Gemini `responseSchema` subset rejects.
const UNSUPPORTED_KEYS: &[&str] = &["$schema", "title", "definitions", "additionalProperties"];

/// Build a `responseSchema` value for `T`.
///
/// schemars emits JSON Schema; Gemini accepts an OpenAPI subset, so meta keys
/// are stripped recursively.
pub fn response_schema<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    let mut value = serde_json::to_value(schema).unwrap_or(Value::Null);
    strip_unsupported(&mut value);
    value
}

fn strip_unsupported(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for key in UNSUPPORTED_KEYS {
                map.remove(*key);
            }
            for (key, child) in map.iter_mut() {
                match child {
                    // Property names are user fields, not schema keywords.
                    Value::Object(props) if key == "properties" => {
                        props.values_mut().for_each(strip_unsupported)
                    }
                    _ => strip_unsupported(child),
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_unsupported),
        _ => {}
    }
}
