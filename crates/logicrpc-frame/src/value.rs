//! Conversions between msgpack payloads and JSON.
//!
//! JSON only appears at the edges: schema checks, typed decoding and CLI
//! input/output. [`to_json`] is lossy for the types JSON lacks. Binary
//! becomes an array of byte values, ext becomes
//! `{"ext_type": n, "data": [...]}`, and non-string map keys are rendered
//! as their JSON text.

use rmpv::Value;
use serde_json::{Map, Number, Value as Json};

use crate::envelope::Payload;

/// Render a payload as JSON.
pub fn to_json(value: &Payload) -> Json {
    match value {
        Value::Nil => Json::Null,
        Value::Boolean(b) => Json::Bool(*b),
        Value::Integer(n) => match (n.as_u64(), n.as_i64()) {
            (Some(u), _) => Json::from(u),
            (None, Some(i)) => Json::from(i),
            (None, None) => Json::Null,
        },
        Value::F32(f) => float(f64::from(*f)),
        Value::F64(f) => float(*f),
        Value::String(s) => Json::String(match s.as_str() {
            Some(text) => text.to_owned(),
            None => String::from_utf8_lossy(s.as_bytes()).into_owned(),
        }),
        Value::Binary(bytes) => bytes_json(bytes),
        Value::Array(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Map(entries) => Json::Object(
            entries
                .iter()
                .map(|(key, value)| (key_text(key), to_json(value)))
                .collect::<Map<_, _>>(),
        ),
        Value::Ext(tag, data) => {
            let mut ext = Map::new();
            ext.insert("ext_type".into(), Json::from(*tag));
            ext.insert("data".into(), bytes_json(data));
            Json::Object(ext)
        }
    }
}

/// Build a payload from JSON. Numbers keep their integer or float kind.
pub fn from_json(value: &Json) -> Payload {
    match value {
        Json::Null => Value::Nil,
        Json::Bool(b) => Value::Boolean(*b),
        Json::Number(n) => match (n.as_u64(), n.as_i64()) {
            (Some(u), _) => Value::from(u),
            (None, Some(i)) => Value::from(i),
            (None, None) => Value::F64(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::from(s.as_str()),
        Json::Array(items) => Value::Array(items.iter().map(from_json).collect()),
        Json::Object(map) => Value::Map(
            map.iter()
                .map(|(key, value)| (Value::from(key.as_str()), from_json(value)))
                .collect(),
        ),
    }
}

fn float(f: f64) -> Json {
    Number::from_f64(f).map_or(Json::Null, Json::Number)
}

fn bytes_json(bytes: &[u8]) -> Json {
    Json::Array(bytes.iter().map(|b| Json::from(*b)).collect())
}

fn key_text(key: &Payload) -> String {
    match to_json(key) {
        Json::String(text) => text,
        other => other.to_string(),
    }
}
