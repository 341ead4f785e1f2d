//! # Wire Codec
//!
//! Encodes and decodes [`Value`]s against a known [`Type`].
//!
//! * Integers are varints; signed kinds are zig-zag mapped first.
//! * `double`/`float` are fixed-width little-endian IEEE-754.
//! * `string`/`bytes` are a varint length followed by the raw bytes.
//! * Classes are the `uint64` object id, `0` being the null object.
//! * Enumerations are the `sint32` member value.
//! * Collections are carried in the [`schema`] envelopes: each item is encoded on its
//!   own and stored as a nested byte string. Sets never carry the same item twice.
//!
//! Objects and enumeration values only encode as the class or enumeration they
//! belong to.
//!
//! Decoding is strict: a scalar must consume the whole buffer, and integers must fit
//! the declared width.
//!
//! ## Absent collections
//!
//! A single `0x00` byte is the encoding of an absent collection. It decodes, like the
//! empty buffer, to an empty list, set or dictionary. A tuple has a fixed arity and
//! cannot be empty, so for tuples both decode to [`Value::Null`].
mod wire;

pub use wire::{decode_guid, zigzag_decode32, zigzag_decode64, zigzag_encode32, zigzag_encode64};

use crate::schema;
use crate::types::{MessageKind, Type, TypeRegistry, ValueKind};
use crate::value::{EnumValue, Message, Value};
use prost::Message as _;

/// The encoding of an absent collection.
pub const ABSENT_COLLECTION: &[u8] = &[0x00];

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Unexpected end of buffer")]
    Truncated,
    #[error("Malformed varint")]
    MalformedVarint,
    #[error("Size prefix of {size} bytes exceeds the {remaining} remaining bytes")]
    SizeExceedsBuffer { size: u64, remaining: usize },
    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),
    #[error("{value} does not fit in {ty}")]
    Overflow { value: u64, ty: ValueKind },
    #[error("String is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("Cannot encode a {value} as {ty}")]
    TypeMismatch { value: &'static str, ty: String },
    #[error("Tuple expects {expected} elements but found {actual}")]
    TupleArity { expected: usize, actual: usize },
    #[error(transparent)]
    InvalidEnumValue(#[from] InvalidEnumValue),
    #[error("Enumeration '{0}' is not registered")]
    UnknownEnumeration(String),
    #[error("A GUID is 16 bytes long, got {0}")]
    InvalidGuid(usize),
    #[error("Malformed message: {0}")]
    Message(#[from] prost::DecodeError),
}

/// A decoded integer that is not a member of its enumeration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{value} is not a value of enumeration {service}.{enumeration}")]
pub struct InvalidEnumValue {
    pub service: String,
    pub enumeration: String,
    pub value: i32,
}

/// Encodes `value` as type `ty`.
pub fn encode(value: &Value, ty: &Type) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    encode_into(value, ty, &mut buf)?;
    Ok(buf)
}

fn encode_into(value: &Value, ty: &Type, buf: &mut Vec<u8>) -> Result<(), CodecError> {
    let mismatch = || CodecError::TypeMismatch {
        value: value.kind_name(),
        ty: ty.to_string(),
    };

    match (ty, value) {
        (Type::Value(kind), _) => encode_scalar(value, *kind, buf).ok_or_else(mismatch)?,
        (Type::Message(kind), Value::Message(message)) if message.kind() == *kind => {
            match message {
                Message::Request(m) => m.encode_raw(buf),
                Message::Response(m) => m.encode_raw(buf),
                Message::StreamMessage(m) => m.encode_raw(buf),
                Message::Services(m) => m.encode_raw(buf),
                Message::Status(m) => m.encode_raw(buf),
            }
        }
        (Type::Class { .. }, Value::Null) => wire::encode_varint(0, buf),
        (Type::Class { service, name }, Value::Object(obj))
            if obj.service() == service && obj.class() == name =>
        {
            wire::encode_varint(obj.id(), buf)
        }
        (Type::Enum { service, name }, Value::Enum(e))
            if &e.service == service && &e.enumeration == name =>
        {
            encode_sint32(e.value, buf)
        }
        (ty, Value::Null) if ty.is_collection() => buf.extend_from_slice(ABSENT_COLLECTION),
        (Type::List(elem), _) => {
            let items = value.as_sequence().ok_or_else(mismatch)?;
            schema::List {
                items: encode_items(items.iter().map(|item| (item, &**elem)))?,
            }
            .encode_raw(buf);
        }
        (Type::Set(elem), _) => {
            let items = value.as_sequence().ok_or_else(mismatch)?;
            let mut encoded: Vec<Vec<u8>> = Vec::with_capacity(items.len());
            for item in encode_items(items.iter().map(|item| (item, &**elem)))? {
                if !encoded.contains(&item) {
                    encoded.push(item);
                }
            }
            schema::Set { items: encoded }.encode_raw(buf);
        }
        (Type::Tuple(elems), _) => {
            let items = value.as_sequence().ok_or_else(mismatch)?;
            if items.len() != elems.len() {
                return Err(CodecError::TupleArity {
                    expected: elems.len(),
                    actual: items.len(),
                });
            }
            schema::Tuple {
                items: encode_items(items.iter().zip(elems.iter().map(|e| &**e)))?,
            }
            .encode_raw(buf);
        }
        (Type::Dictionary(key_ty, value_ty), Value::Dictionary(entries)) => {
            let mut sorted: Vec<_> = entries.iter().collect();
            sorted.sort_by(|(a, _), (b, _)| a.key_cmp(b));

            let entries = sorted
                .into_iter()
                .map(|(k, v)| {
                    Ok(schema::DictionaryEntry {
                        key: encode(k, key_ty)?,
                        value: encode(v, value_ty)?,
                    })
                })
                .collect::<Result<_, CodecError>>()?;
            schema::Dictionary { entries }.encode_raw(buf);
        }
        _ => return Err(mismatch()),
    }
    Ok(())
}

fn encode_items<'a>(
    items: impl Iterator<Item = (&'a Value, &'a Type)>,
) -> Result<Vec<Vec<u8>>, CodecError> {
    items.map(|(item, ty)| encode(item, ty)).collect()
}

fn encode_sint32(value: i32, buf: &mut Vec<u8>) {
    wire::encode_varint(u64::from(wire::zigzag_encode32(value)), buf);
}

/// `None` when the value does not have the exact shape of `kind`.
fn encode_scalar(value: &Value, kind: ValueKind, buf: &mut Vec<u8>) -> Option<()> {
    match (kind, value) {
        (ValueKind::Double, Value::Double(v)) => wire::encode_double(*v, buf),
        (ValueKind::Float, Value::Float(v)) => wire::encode_float(*v, buf),
        (ValueKind::SInt32, Value::SInt32(v)) => encode_sint32(*v, buf),
        (ValueKind::SInt64, Value::SInt64(v)) => {
            wire::encode_varint(wire::zigzag_encode64(*v), buf)
        }
        (ValueKind::UInt32, Value::UInt32(v)) => wire::encode_varint(u64::from(*v), buf),
        (ValueKind::UInt64, Value::UInt64(v)) => wire::encode_varint(*v, buf),
        (ValueKind::Bool, Value::Bool(v)) => wire::encode_varint(u64::from(*v), buf),
        (ValueKind::String, Value::String(v)) => wire::encode_length_delimited(v.as_bytes(), buf),
        (ValueKind::Bytes, Value::Bytes(v)) => wire::encode_length_delimited(v, buf),
        _ => return None,
    }
    Some(())
}

/// Decodes `data` as type `ty`.
///
/// The registry binds decoded remote objects to the connection and supplies the
/// value tables of enumerations.
pub fn decode(registry: &TypeRegistry, data: &[u8], ty: &Type) -> Result<Value, CodecError> {
    match ty {
        Type::Value(kind) => {
            let mut buf = data;
            let value = decode_scalar(&mut buf, *kind)?;
            finish(buf)?;
            Ok(value)
        }
        Type::Message(kind) => Ok(Value::Message(match kind {
            MessageKind::Request => Message::Request(schema::Request::decode(data)?),
            MessageKind::Response => Message::Response(schema::Response::decode(data)?),
            MessageKind::StreamMessage => {
                Message::StreamMessage(schema::StreamMessage::decode(data)?)
            }
            MessageKind::Services => Message::Services(schema::Services::decode(data)?),
            MessageKind::Status => Message::Status(schema::Status::decode(data)?),
        })),
        Type::Class { service, name } => {
            let id = decode_u64(data)?;
            Ok(registry
                .remote_object(service, name, id)
                .map_or(Value::Null, Value::Object))
        }
        Type::Enum { service, name } => {
            let value = decode_sint32(data)?;
            let enumeration = registry
                .enumeration(service, name)
                .ok_or_else(|| CodecError::UnknownEnumeration(format!("{service}.{name}")))?;
            let member = enumeration
                .by_value(value)
                .ok_or_else(|| InvalidEnumValue {
                    service: service.clone(),
                    enumeration: name.clone(),
                    value,
                })?;
            Ok(Value::Enum(EnumValue {
                service: service.clone(),
                enumeration: name.clone(),
                name: member.name.clone(),
                value,
            }))
        }
        Type::List(elem) => {
            if is_absent(data) {
                return Ok(Value::List(Vec::new()));
            }
            let list = schema::List::decode(data)?;
            Ok(Value::List(decode_items(registry, &list.items, elem)?))
        }
        Type::Set(elem) => {
            if is_absent(data) {
                return Ok(Value::Set(Vec::new()));
            }
            let set = schema::Set::decode(data)?;
            let mut items: Vec<Value> = Vec::with_capacity(set.items.len());
            for item in decode_items(registry, &set.items, elem)? {
                if !items.contains(&item) {
                    items.push(item);
                }
            }
            Ok(Value::Set(items))
        }
        Type::Tuple(elems) => {
            if is_absent(data) {
                return Ok(Value::Null);
            }
            let tuple = schema::Tuple::decode(data)?;
            if tuple.items.len() != elems.len() {
                return Err(CodecError::TupleArity {
                    expected: elems.len(),
                    actual: tuple.items.len(),
                });
            }
            let items = tuple
                .items
                .iter()
                .zip(elems)
                .map(|(item, ty)| decode(registry, item, ty))
                .collect::<Result<_, _>>()?;
            Ok(Value::Tuple(items))
        }
        Type::Dictionary(key_ty, value_ty) => {
            if is_absent(data) {
                return Ok(Value::Dictionary(Vec::new()));
            }
            let dictionary = schema::Dictionary::decode(data)?;
            let entries = dictionary
                .entries
                .iter()
                .map(|entry| {
                    Ok((
                        decode(registry, &entry.key, key_ty)?,
                        decode(registry, &entry.value, value_ty)?,
                    ))
                })
                .collect::<Result<_, CodecError>>()?;
            Ok(Value::Dictionary(entries))
        }
    }
}

fn decode_items(
    registry: &TypeRegistry,
    items: &[Vec<u8>],
    ty: &Type,
) -> Result<Vec<Value>, CodecError> {
    items.iter().map(|item| decode(registry, item, ty)).collect()
}

fn decode_scalar(buf: &mut &[u8], kind: ValueKind) -> Result<Value, CodecError> {
    let narrow = |value: u64| {
        u32::try_from(value).map_err(|_| CodecError::Overflow { value, ty: kind })
    };

    Ok(match kind {
        ValueKind::Double => Value::Double(wire::decode_double(buf)?),
        ValueKind::Float => Value::Float(wire::decode_float(buf)?),
        ValueKind::SInt32 => Value::SInt32(wire::zigzag_decode32(narrow(wire::decode_varint(buf)?)?)),
        ValueKind::SInt64 => Value::SInt64(wire::zigzag_decode64(wire::decode_varint(buf)?)),
        ValueKind::UInt32 => Value::UInt32(narrow(wire::decode_varint(buf)?)?),
        ValueKind::UInt64 => Value::UInt64(wire::decode_varint(buf)?),
        ValueKind::Bool => match wire::decode_varint(buf)? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            value => return Err(CodecError::Overflow { value, ty: kind }),
        },
        ValueKind::String => {
            let bytes = wire::decode_length_delimited(buf)?;
            Value::String(String::from_utf8(bytes.to_vec())?)
        }
        ValueKind::Bytes => Value::Bytes(wire::decode_length_delimited(buf)?.to_vec()),
    })
}

fn decode_u64(data: &[u8]) -> Result<u64, CodecError> {
    let mut buf = data;
    let value = wire::decode_varint(&mut buf)?;
    finish(buf)?;
    Ok(value)
}

fn decode_sint32(data: &[u8]) -> Result<i32, CodecError> {
    let mut buf = data;
    let value = decode_scalar(&mut buf, ValueKind::SInt32)?;
    finish(buf)?;
    match value {
        Value::SInt32(v) => Ok(v),
        other => Err(CodecError::TypeMismatch {
            value: other.kind_name(),
            ty: ValueKind::SInt32.to_string(),
        }),
    }
}

fn is_absent(data: &[u8]) -> bool {
    data.is_empty() || data == ABSENT_COLLECTION
}

fn finish(rest: &[u8]) -> Result<(), CodecError> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(CodecError::TrailingBytes(rest.len()))
    }
}

/// Encodes a message preceded by its varint length, as used by stream framing.
pub fn encode_delimited(message: &impl prost::Message) -> Vec<u8> {
    message.encode_length_delimited_to_vec()
}

/// Decodes a message preceded by its varint length.
pub fn decode_delimited<M: prost::Message + Default>(data: &[u8]) -> Result<M, CodecError> {
    let mut buf = data;
    let message = wire::decode_length_delimited(&mut buf)?;
    finish(buf)?;
    Ok(M::decode(message)?)
}
