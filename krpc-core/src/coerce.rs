//! # Value Coercion
//!
//! Reshapes a caller-supplied [`Value`] into the exact shape a parameter [`Type`]
//! requires, before anything is encoded or sent.
//!
//! Rules, in order:
//!
//! 1. The value already has the target shape: returned unchanged.
//! 2. A null value for a `Class` target stays null (the null object).
//! 3. A remote object from another registry, naming the same service and class, is
//!    re-bound to the target registry. This is the only way a handle crosses
//!    connections.
//! 4. Lists, sets and tuples convert into one another element by element; a tuple
//!    target also requires the exact arity. Dictionaries coerce keys and values.
//! 5. Numeric values convert between numeric kinds when the result fits. Floats are
//!    truncated toward zero. `bool` is never treated as a number.
use crate::types::{Type, TypeRegistry, ValueKind};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot coerce a {value} to {target}")]
pub struct CoercionError {
    pub value: &'static str,
    pub target: String,
}

impl TypeRegistry {
    /// Coerces `value` into the shape of `target`, binding objects to this registry.
    pub fn coerce(&self, value: Value, target: &Type) -> Result<Value, CoercionError> {
        coerce(self, value, target)
    }
}

pub fn coerce(registry: &TypeRegistry, value: Value, target: &Type) -> Result<Value, CoercionError> {
    let error = |value: &Value| CoercionError {
        value: value.kind_name(),
        target: target.to_string(),
    };

    match target {
        Type::Value(kind) => {
            if scalar_kind(&value) == Some(*kind) {
                return Ok(value);
            }
            convert_number(&value, *kind).ok_or_else(|| error(&value))
        }
        Type::Message(kind) => match value {
            Value::Message(ref message) if message.kind() == *kind => Ok(value),
            _ => Err(error(&value)),
        },
        Type::Class { service, name } => match value {
            Value::Null => Ok(value),
            Value::Object(ref obj) if obj.service() == service && obj.class() == name => {
                if obj.registry() == registry.id() {
                    Ok(value)
                } else {
                    Ok(Value::Object(obj.rebind(registry.id())))
                }
            }
            _ => Err(error(&value)),
        },
        Type::Enum { service, name } => match value {
            Value::Enum(ref e) if &e.service == service && &e.enumeration == name => Ok(value),
            _ => Err(error(&value)),
        },
        Type::List(elem) | Type::Set(elem) => {
            let items = match value {
                Value::List(items) | Value::Set(items) | Value::Tuple(items) => items,
                other => return Err(error(&other)),
            };
            let items = items
                .into_iter()
                .map(|item| coerce(registry, item, elem))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(match target {
                Type::Set(_) => Value::Set(items),
                _ => Value::List(items),
            })
        }
        Type::Tuple(elems) => {
            let items = match value {
                Value::List(items) | Value::Set(items) | Value::Tuple(items)
                    if items.len() == elems.len() =>
                {
                    items
                }
                other => return Err(error(&other)),
            };
            let items = items
                .into_iter()
                .zip(elems)
                .map(|(item, elem)| coerce(registry, item, elem))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Tuple(items))
        }
        Type::Dictionary(key_ty, value_ty) => {
            let entries = match value {
                Value::Dictionary(entries) => entries,
                other => return Err(error(&other)),
            };
            let entries = entries
                .into_iter()
                .map(|(k, v)| Ok((coerce(registry, k, key_ty)?, coerce(registry, v, value_ty)?)))
                .collect::<Result<Vec<_>, CoercionError>>()?;
            Ok(Value::Dictionary(entries))
        }
    }
}

fn scalar_kind(value: &Value) -> Option<ValueKind> {
    Some(match value {
        Value::Double(_) => ValueKind::Double,
        Value::Float(_) => ValueKind::Float,
        Value::SInt32(_) => ValueKind::SInt32,
        Value::SInt64(_) => ValueKind::SInt64,
        Value::UInt32(_) => ValueKind::UInt32,
        Value::UInt64(_) => ValueKind::UInt64,
        Value::Bool(_) => ValueKind::Bool,
        Value::String(_) => ValueKind::String,
        Value::Bytes(_) => ValueKind::Bytes,
        _ => return None,
    })
}

enum Number {
    Integer(i128),
    Real(f64),
}

fn convert_number(value: &Value, kind: ValueKind) -> Option<Value> {
    let number = match *value {
        Value::SInt32(v) => Number::Integer(v.into()),
        Value::SInt64(v) => Number::Integer(v.into()),
        Value::UInt32(v) => Number::Integer(v.into()),
        Value::UInt64(v) => Number::Integer(v.into()),
        Value::Double(v) => Number::Real(v),
        Value::Float(v) => Number::Real(v.into()),
        _ => return None,
    };

    let integer = match number {
        Number::Integer(i) => i,
        Number::Real(f) if f.is_finite() => f.trunc() as i128,
        Number::Real(_) => match kind {
            ValueKind::Double | ValueKind::Float => 0,
            _ => return None,
        },
    };

    match kind {
        ValueKind::Double => Some(Value::Double(match number {
            Number::Integer(i) => i as f64,
            Number::Real(f) => f,
        })),
        ValueKind::Float => Some(Value::Float(match number {
            Number::Integer(i) => i as f32,
            Number::Real(f) => f as f32,
        })),
        ValueKind::SInt32 => i32::try_from(integer).ok().map(Value::SInt32),
        ValueKind::SInt64 => i64::try_from(integer).ok().map(Value::SInt64),
        ValueKind::UInt32 => u32::try_from(integer).ok().map(Value::UInt32),
        ValueKind::UInt64 => u64::try_from(integer).ok().map(Value::UInt64),
        ValueKind::Bool | ValueKind::String | ValueKind::Bytes => None,
    }
}
