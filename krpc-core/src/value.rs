//! # Typed Values
//!
//! [`Value`] is the dynamic representation of anything the wire codec can carry. The
//! codec produces values from bytes, the coercion layer reshapes caller input into
//! them, and bindings hand them back to the caller.
//!
//! Remote objects are represented by [`RemoteObject`] handles whose identity is the
//! pair (registry, object id), see the type docs for the exact rules.
pub mod json;

use crate::schema;
use crate::types::{MessageKind, RegistryId};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub use json::{JsonError, from_json, to_json};

/// A decoded (or to-be-encoded) protocol value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Absent object or absent collection.
    Null,
    Double(f64),
    Float(f32),
    SInt32(i32),
    SInt64(i64),
    UInt32(u32),
    UInt64(u64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    Message(Message),
    Object(RemoteObject),
    Enum(EnumValue),
    List(Vec<Value>),
    Set(Vec<Value>),
    Tuple(Vec<Value>),
    Dictionary(Vec<(Value, Value)>),
}

impl Value {
    /// Short name of the value's shape, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Double(_) => "double",
            Value::Float(_) => "float",
            Value::SInt32(_) => "sint32",
            Value::SInt64(_) => "sint64",
            Value::UInt32(_) => "uint32",
            Value::UInt64(_) => "uint64",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Message(_) => "message",
            Value::Object(_) => "remote object",
            Value::Enum(_) => "enumeration value",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Tuple(_) => "tuple",
            Value::Dictionary(_) => "dictionary",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&RemoteObject> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// The elements of a list, set or tuple.
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Set(items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// A total order over scalar values, used to sort dictionary keys before encoding.
    ///
    /// Values of different shapes are ordered by shape; composite values compare equal.
    pub(crate) fn key_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Double(a), Value::Double(b)) => a.total_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::SInt32(a), Value::SInt32(b)) => a.cmp(b),
            (Value::SInt64(a), Value::SInt64(b)) => a.cmp(b),
            (Value::UInt32(a), Value::UInt32(b)) => a.cmp(b),
            (Value::UInt64(a), Value::UInt64(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::Object(a), Value::Object(b)) => a.id.cmp(&b.id),
            (Value::Enum(a), Value::Enum(b)) => a.value.cmp(&b.value),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::SInt32(_) | Value::SInt64(_) | Value::UInt32(_) | Value::UInt64(_) => 2,
            Value::Double(_) | Value::Float(_) => 3,
            Value::Enum(_) => 4,
            Value::String(_) => 5,
            Value::Bytes(_) => 6,
            Value::Object(_) => 7,
            _ => 8,
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    };
}

impl_from! {
    f64 => Double,
    f32 => Float,
    i32 => SInt32,
    i64 => SInt64,
    u32 => UInt32,
    u64 => UInt64,
    bool => Bool,
    String => String,
    &str => String,
    Vec<u8> => Bytes,
    Message => Message,
    RemoteObject => Object,
    EnumValue => Enum,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// One of the pre-defined envelope messages a `KRPC.*` descriptor names.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Request(schema::Request),
    Response(schema::Response),
    StreamMessage(schema::StreamMessage),
    Services(schema::Services),
    Status(schema::Status),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Request(_) => MessageKind::Request,
            Message::Response(_) => MessageKind::Response,
            Message::StreamMessage(_) => MessageKind::StreamMessage,
            Message::Services(_) => MessageKind::Services,
            Message::Status(_) => MessageKind::Status,
        }
    }
}

/// A handle to an object that lives on the server.
///
/// Identity is the object id, scoped to the registry (connection) that produced the
/// handle:
///
/// * handles with the same id from the same registry are equal and hash alike;
/// * handles from different registries are never equal and are not ordered
///   (`partial_cmp` returns `None`), even when the ids match.
///
/// The service and class names are descriptive only. Moving a handle to another
/// connection is done explicitly through coercion to a `Class` type.
#[derive(Clone, Debug)]
pub struct RemoteObject {
    registry: RegistryId,
    service: Arc<str>,
    class: Arc<str>,
    id: u64,
}

impl RemoteObject {
    pub(crate) fn new(registry: RegistryId, service: &str, class: &str, id: u64) -> Self {
        Self {
            registry,
            service: service.into(),
            class: class.into(),
            id,
        }
    }

    /// The same object, bound to another registry.
    pub(crate) fn rebind(&self, registry: RegistryId) -> Self {
        Self {
            registry,
            ..self.clone()
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn registry(&self) -> RegistryId {
        self.registry
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn class(&self) -> &str {
        &self.class
    }
}

impl PartialEq for RemoteObject {
    fn eq(&self, other: &Self) -> bool {
        self.registry == other.registry && self.id == other.id
    }
}

impl Eq for RemoteObject {}

impl Hash for RemoteObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for RemoteObject {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        (self.registry == other.registry).then(|| self.id.cmp(&other.id))
    }
}

impl fmt::Display for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}.{} remote object #{}>",
            self.service, self.class, self.id
        )
    }
}

/// A member of a service-defined enumeration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub service: String,
    pub enumeration: String,
    pub name: String,
    pub value: i32,
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.service, self.enumeration, self.name)
    }
}
