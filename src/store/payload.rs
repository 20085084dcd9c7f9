//! Conversions between JSON metadata and Qdrant payload values

use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{ListValue, PointId, Struct, Value as QdrantValue};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Convert a JSON metadata map to a Qdrant payload map
pub fn json_map_to_payload(map: &Map<String, Value>) -> HashMap<String, QdrantValue> {
    map.iter()
        .map(|(k, v)| (k.clone(), qdrant_value_from_json(v)))
        .collect()
}

/// Convert a Qdrant payload map back into JSON metadata
pub fn payload_to_json_map(payload: HashMap<String, QdrantValue>) -> Map<String, Value> {
    payload
        .into_iter()
        .map(|(k, v)| (k, json_from_qdrant_value(v)))
        .collect()
}

pub fn qdrant_value_from_json(value: &Value) -> QdrantValue {
    let kind = match value {
        Value::Null => Kind::NullValue(0),
        Value::Bool(b) => Kind::BoolValue(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Kind::IntegerValue(i)
            } else {
                Kind::DoubleValue(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => Kind::StringValue(s.clone()),
        Value::Array(items) => Kind::ListValue(ListValue {
            values: items.iter().map(qdrant_value_from_json).collect(),
        }),
        Value::Object(map) => Kind::StructValue(Struct {
            fields: map
                .iter()
                .map(|(k, v)| (k.clone(), qdrant_value_from_json(v)))
                .collect(),
        }),
    };
    QdrantValue { kind: Some(kind) }
}

pub fn json_from_qdrant_value(v: QdrantValue) -> Value {
    match v.kind {
        Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => Value::Array(
            list.values.into_iter().map(json_from_qdrant_value).collect(),
        ),
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, json_from_qdrant_value(v)))
                .collect(),
        ),
        None => Value::Null,
    }
}

/// Convert a PointId to its string form
pub fn point_id_to_string(id: Option<PointId>) -> String {
    use qdrant_client::qdrant::point_id::PointIdOptions;
    match id {
        Some(PointId {
            point_id_options: Some(PointIdOptions::Uuid(uuid)),
        }) => uuid,
        Some(PointId {
            point_id_options: Some(PointIdOptions::Num(num)),
        }) => num.to_string(),
        _ => String::new(),
    }
}
