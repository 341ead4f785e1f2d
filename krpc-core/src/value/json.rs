//! # JSON <-> Value Bridge
//!
//! Converts typed [`Value`]s to `serde_json::Value` and back, so that tools can show
//! decoded wire values and accept hand-written input.
//!
//! ## Mapping
//!
//! * Integers and floats map to JSON numbers. Non-finite floats use the strings
//!   `"NaN"`, `"Infinity"` and `"-Infinity"`.
//! * `bytes` map to a lowercase hex string.
//! * Remote objects map to `{"service", "class", "id"}`; id `0` or `null` is the null object.
//! * Enumeration values map to their member name (a number is accepted on input).
//! * Lists, sets and tuples map to arrays. Dictionaries with string keys map to objects,
//!   all other dictionaries to arrays of `[key, value]` pairs.
//! * `KRPC.*` messages go through their serde representation.
use super::{EnumValue, Message, Value};
use crate::types::{MessageKind, Type, TypeRegistry, ValueKind};
use serde_json::{Map, Number, json};

#[derive(Debug, thiserror::Error)]
pub enum JsonError {
    #[error("Expected {expected} but found {found}")]
    Mismatch { expected: String, found: String },
    #[error("{value} is out of range for {ty}")]
    OutOfRange { value: String, ty: ValueKind },
    #[error("Invalid hex string: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("Enumeration '{0}' is not registered")]
    UnknownEnumeration(String),
    #[error("'{member}' is not a member of enumeration '{enumeration}'")]
    UnknownMember { enumeration: String, member: String },
    #[error("Tuple expects {expected} elements but found {actual}")]
    TupleArity { expected: usize, actual: usize },
    #[error("Message does not match its schema: {0}")]
    Message(#[from] serde_json::Error),
}

/// Converts a value into its JSON form.
pub fn to_json(value: &Value) -> Result<serde_json::Value, JsonError> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Double(v) => float_to_json(*v),
        Value::Float(v) => float_to_json(f64::from(*v)),
        Value::SInt32(v) => json!(v),
        Value::SInt64(v) => json!(v),
        Value::UInt32(v) => json!(v),
        Value::UInt64(v) => json!(v),
        Value::Bool(v) => json!(v),
        Value::String(v) => json!(v),
        Value::Bytes(v) => json!(hex::encode(v)),
        Value::Message(message) => match message {
            Message::Request(m) => serde_json::to_value(m)?,
            Message::Response(m) => serde_json::to_value(m)?,
            Message::StreamMessage(m) => serde_json::to_value(m)?,
            Message::Services(m) => serde_json::to_value(m)?,
            Message::Status(m) => serde_json::to_value(m)?,
        },
        Value::Object(obj) => json!({
            "service": obj.service(),
            "class": obj.class(),
            "id": obj.id(),
        }),
        Value::Enum(e) => json!(e.name),
        Value::List(items) | Value::Set(items) | Value::Tuple(items) => {
            serde_json::Value::Array(items.iter().map(to_json).collect::<Result<_, _>>()?)
        }
        Value::Dictionary(entries) => {
            if entries.iter().all(|(k, _)| matches!(k, Value::String(_))) {
                let mut map = Map::new();
                for (key, value) in entries {
                    if let Value::String(key) = key {
                        map.insert(key.clone(), to_json(value)?);
                    }
                }
                serde_json::Value::Object(map)
            } else {
                let pairs = entries
                    .iter()
                    .map(|(k, v)| Ok(json!([to_json(k)?, to_json(v)?])))
                    .collect::<Result<_, JsonError>>()?;
                serde_json::Value::Array(pairs)
            }
        }
    })
}

/// Builds a value of type `ty` from JSON.
///
/// The registry is needed to bind remote objects and to look up enumeration members.
pub fn from_json(
    registry: &TypeRegistry,
    json: &serde_json::Value,
    ty: &Type,
) -> Result<Value, JsonError> {
    let mismatch = || JsonError::Mismatch {
        expected: ty.to_string(),
        found: json_kind(json).to_string(),
    };

    match ty {
        Type::Value(kind) => scalar_from_json(json, *kind).ok_or_else(mismatch)?,
        Type::Message(kind) => {
            let json = json.clone();
            Ok(Value::Message(match kind {
                MessageKind::Request => Message::Request(serde_json::from_value(json)?),
                MessageKind::Response => Message::Response(serde_json::from_value(json)?),
                MessageKind::StreamMessage => {
                    Message::StreamMessage(serde_json::from_value(json)?)
                }
                MessageKind::Services => Message::Services(serde_json::from_value(json)?),
                MessageKind::Status => Message::Status(serde_json::from_value(json)?),
            }))
        }
        Type::Class { service, name } => {
            let id = match json {
                serde_json::Value::Null => 0,
                serde_json::Value::Number(n) => n.as_u64().ok_or_else(mismatch)?,
                serde_json::Value::Object(map) => map
                    .get("id")
                    .and_then(serde_json::Value::as_u64)
                    .ok_or_else(mismatch)?,
                _ => return Err(mismatch()),
            };
            Ok(registry
                .remote_object(service, name, id)
                .map_or(Value::Null, Value::Object))
        }
        Type::Enum { service, name } => {
            let enumeration = registry
                .enumeration(service, name)
                .ok_or_else(|| JsonError::UnknownEnumeration(format!("{service}.{name}")))?;
            let member = match json {
                serde_json::Value::String(s) => enumeration.by_name(s),
                serde_json::Value::Number(n) => n
                    .as_i64()
                    .and_then(|v| i32::try_from(v).ok())
                    .and_then(|v| enumeration.by_value(v)),
                _ => return Err(mismatch()),
            }
            .ok_or_else(|| JsonError::UnknownMember {
                enumeration: format!("{service}.{name}"),
                member: json.to_string(),
            })?;
            Ok(Value::Enum(EnumValue {
                service: service.clone(),
                enumeration: name.clone(),
                name: member.name.clone(),
                value: member.value,
            }))
        }
        Type::List(elem) | Type::Set(elem) => {
            let items = match json {
                serde_json::Value::Null => return Ok(Value::Null),
                serde_json::Value::Array(items) => items
                    .iter()
                    .map(|item| from_json(registry, item, elem))
                    .collect::<Result<Vec<_>, _>>()?,
                _ => return Err(mismatch()),
            };
            Ok(match ty {
                Type::Set(_) => Value::Set(items),
                _ => Value::List(items),
            })
        }
        Type::Tuple(elems) => {
            let items = json.as_array().ok_or_else(mismatch)?;
            if items.len() != elems.len() {
                return Err(JsonError::TupleArity {
                    expected: elems.len(),
                    actual: items.len(),
                });
            }
            let values = items
                .iter()
                .zip(elems)
                .map(|(item, elem)| from_json(registry, item, elem))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Tuple(values))
        }
        Type::Dictionary(key_ty, value_ty) => {
            let entries = match json {
                serde_json::Value::Null => return Ok(Value::Null),
                serde_json::Value::Object(map) => map
                    .iter()
                    .map(|(k, v)| {
                        let key = object_key(registry, k, key_ty)?;
                        Ok((key, from_json(registry, v, value_ty)?))
                    })
                    .collect::<Result<Vec<_>, JsonError>>()?,
                serde_json::Value::Array(pairs) => pairs
                    .iter()
                    .map(|pair| match pair.as_array().map(Vec::as_slice) {
                        Some([k, v]) => Ok((
                            from_json(registry, k, key_ty)?,
                            from_json(registry, v, value_ty)?,
                        )),
                        _ => Err(mismatch()),
                    })
                    .collect::<Result<Vec<_>, JsonError>>()?,
                _ => return Err(mismatch()),
            };
            Ok(Value::Dictionary(entries))
        }
    }
}

/// Object keys are always strings in JSON; non-string key types are parsed from them.
fn object_key(registry: &TypeRegistry, key: &str, ty: &Type) -> Result<Value, JsonError> {
    match ty {
        Type::Value(ValueKind::String) => Ok(Value::String(key.to_string())),
        Type::Enum { .. } => from_json(registry, &json!(key), ty),
        _ => {
            let parsed = serde_json::from_str(key).map_err(|_| JsonError::Mismatch {
                expected: ty.to_string(),
                found: format!("key '{key}'"),
            })?;
            from_json(registry, &parsed, ty)
        }
    }
}

/// `None` means the JSON shape does not fit the kind at all.
fn scalar_from_json(json: &serde_json::Value, kind: ValueKind) -> Option<Result<Value, JsonError>> {
    let out_of_range = |value: &Number| JsonError::OutOfRange {
        value: value.to_string(),
        ty: kind,
    };

    let value = match (kind, json) {
        (ValueKind::Double, _) => Ok(Value::Double(float_from_json(json)?)),
        (ValueKind::Float, _) => Ok(Value::Float(float_from_json(json)? as f32)),
        (ValueKind::SInt32, serde_json::Value::Number(n)) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(Value::SInt32)
            .ok_or_else(|| out_of_range(n)),
        (ValueKind::SInt64, serde_json::Value::Number(n)) => {
            n.as_i64().map(Value::SInt64).ok_or_else(|| out_of_range(n))
        }
        (ValueKind::UInt32, serde_json::Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(Value::UInt32)
            .ok_or_else(|| out_of_range(n)),
        (ValueKind::UInt64, serde_json::Value::Number(n)) => {
            n.as_u64().map(Value::UInt64).ok_or_else(|| out_of_range(n))
        }
        (ValueKind::Bool, serde_json::Value::Bool(b)) => Ok(Value::Bool(*b)),
        (ValueKind::String, serde_json::Value::String(s)) => Ok(Value::String(s.clone())),
        (ValueKind::Bytes, serde_json::Value::String(s)) => hex::decode(s)
            .map(Value::Bytes)
            .map_err(JsonError::from),
        _ => return None,
    };
    Some(value)
}

fn float_to_json(v: f64) -> serde_json::Value {
    match Number::from_f64(v) {
        Some(n) => serde_json::Value::Number(n),
        None if v.is_nan() => json!("NaN"),
        None if v > 0.0 => json!("Infinity"),
        None => json!("-Infinity"),
    }
}

fn float_from_json(json: &serde_json::Value) -> Option<f64> {
    match json {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            _ => None,
        },
        _ => None,
    }
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
