//! 工具参数 JSON Schema：生成与校验
//!
//! 每个工具的参数以带 `JsonSchema` 的结构体声明，由 schemars 生成 schema 绑定给 LLM；
//! 调用前按 schema 检查必填字段与基础类型。

use schemars::{schema_for, JsonSchema};
use serde_json::{json, Value};

/// 由参数结构体生成 parameters schema（去掉 `$schema` 与 `title`）
pub fn args_schema<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    let mut value = serde_json::to_value(&schema).unwrap_or_else(|_| json!({"type": "object"}));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    value
}

/// 注册时检查：schema 必须描述一个 object
pub fn check_schema(schema: &Value) -> Result<(), String> {
    match schema.get("type").and_then(Value::as_str) {
        Some("object") => Ok(()),
        Some(other) => Err(format!("parameters must be an object schema, got '{}'", other)),
        None => Err("parameters schema has no type".to_string()),
    }
}

/// 调用时检查：args 是对象、必填字段齐全、已声明字段的基础类型匹配
pub fn validate_args(schema: &Value, args: &Value) -> Result<(), String> {
    let empty = serde_json::Map::new();
    let obj = match args {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => return Err(format!("arguments must be a JSON object, got {}", other)),
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if obj.get(key).map_or(true, Value::is_null) {
                return Err(format!("missing required argument '{}'", key));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (key, value) in obj {
            let Some(expected) = properties.get(key).and_then(|p| p.get("type")) else {
                continue;
            };
            if !type_matches(expected, value) {
                return Err(format!("argument '{}' must be of type {}", key, expected));
            }
        }
    }

    Ok(())
}

fn type_matches(expected: &Value, value: &Value) -> bool {
    match expected {
        Value::String(t) => primitive_matches(t, value),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| primitive_matches(t, value)),
        _ => true,
    }
}

fn primitive_matches(t: &str, value: &Value) -> bool {
    match t {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}
