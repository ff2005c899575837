//! Conversions between `serde_json::Value` and `cursor_wire::Value`. Tool
//! schemas and MCP arguments arrive and leave this crate as JSON; the wire
//! only understands its own `Value` shape, so every boundary crosses here.

use cursor_wire::Value as WireValue;
use serde_json::Value as JsonValue;
use serde_json::Number;

pub fn json_to_wire(v: &JsonValue) -> WireValue {
    match v {
        JsonValue::Null => WireValue::Null,
        JsonValue::Bool(b) => WireValue::Bool(*b),
        JsonValue::Number(n) => WireValue::Number(n.as_f64().unwrap_or(0.0)),
        JsonValue::String(s) => WireValue::String(s.clone()),
        JsonValue::Array(items) => WireValue::List(items.iter().map(json_to_wire).collect()),
        JsonValue::Object(map) => {
            WireValue::Object(map.iter().map(|(k, v)| (k.clone(), json_to_wire(v))).collect())
        }
    }
}

pub fn wire_to_json(v: &WireValue) -> JsonValue {
    match v {
        WireValue::Null => JsonValue::Null,
        WireValue::Bool(b) => JsonValue::Bool(*b),
        WireValue::Number(n) => Number::from_f64(*n).map(JsonValue::Number).unwrap_or(JsonValue::Null),
        WireValue::String(s) => JsonValue::String(s.clone()),
        WireValue::List(items) => JsonValue::Array(items.iter().map(wire_to_json).collect()),
        WireValue::Object(entries) => {
            JsonValue::Object(entries.iter().map(|(k, v)| (k.clone(), wire_to_json(v))).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn round_trips_a_tool_schema_shape() {
        let schema = json!({
            "type": "object",
            "properties": {
                "command": {"type": "string"},
                "timeout": {"type": "number", "default": 30},
            },
            "required": ["command"],
        });
        let wire = json_to_wire(&schema);
        let back = wire_to_json(&wire);
        assert_eq!(back, schema);
    }
}
