//! # Type Algebra
//!
//! Every value that crosses the wire has a [`Type`], described by the server as a
//! textual descriptor such as `sint32`, `Class(SpaceCenter.Vessel)` or
//! `Dictionary(string,List(double))`.
//!
//! The [`TypeRegistry`] turns descriptors into shared [`Type`] instances. It is owned
//! by one connection and guarantees that a descriptor string resolves to a single
//! canonical `Arc<Type>` for the lifetime of that registry:
//!
//! ```rust
//! use krpc_core::types::TypeRegistry;
//! use std::sync::Arc;
//!
//! let registry = TypeRegistry::new();
//! let a = registry.resolve("List(Class(SpaceCenter.Vessel))").unwrap();
//! let b = registry.resolve("List(Class(SpaceCenter.Vessel))").unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//! ```
//!
//! The registry also holds the value tables of service-defined enumerations, which the
//! codec needs to map decoded integers back to named members.
mod parser;

use crate::attributes;
use crate::value::{EnumValue, RemoteObject};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub use parser::DescriptorError;

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one registry (and therefore one connection).
///
/// Remote object handles carry the id of the registry that decoded them, so handles
/// from two connections never compare equal.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct RegistryId(u64);

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "registry-{}", self.0)
    }
}

/// The scalar kinds of the protocol.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum ValueKind {
    Double,
    Float,
    SInt32,
    SInt64,
    UInt32,
    UInt64,
    Bool,
    String,
    Bytes,
}

impl ValueKind {
    pub const ALL: [ValueKind; 9] = [
        ValueKind::Double,
        ValueKind::Float,
        ValueKind::SInt32,
        ValueKind::SInt64,
        ValueKind::UInt32,
        ValueKind::UInt64,
        ValueKind::Bool,
        ValueKind::String,
        ValueKind::Bytes,
    ];

    /// The descriptor keyword of this kind (e.g. `sint32`).
    pub fn keyword(self) -> &'static str {
        match self {
            ValueKind::Double => "double",
            ValueKind::Float => "float",
            ValueKind::SInt32 => "sint32",
            ValueKind::SInt64 => "sint64",
            ValueKind::UInt32 => "uint32",
            ValueKind::UInt64 => "uint64",
            ValueKind::Bool => "bool",
            ValueKind::String => "string",
            ValueKind::Bytes => "bytes",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.keyword() == keyword)
    }

    /// Returns `true` for the six numeric kinds (bool is not numeric).
    pub fn is_numeric(self) -> bool {
        !matches!(self, ValueKind::Bool | ValueKind::String | ValueKind::Bytes)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// The pre-defined envelope messages a descriptor may name directly.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Response,
    StreamMessage,
    Services,
    Status,
}

impl MessageKind {
    pub const ALL: [MessageKind; 5] = [
        MessageKind::Request,
        MessageKind::Response,
        MessageKind::StreamMessage,
        MessageKind::Services,
        MessageKind::Status,
    ];

    /// The fully qualified message name (e.g. `KRPC.Services`).
    pub fn full_name(self) -> &'static str {
        match self {
            MessageKind::Request => "KRPC.Request",
            MessageKind::Response => "KRPC.Response",
            MessageKind::StreamMessage => "KRPC.StreamMessage",
            MessageKind::Services => "KRPC.Services",
            MessageKind::Status => "KRPC.Status",
        }
    }

    /// Looks a name up in the known-message catalog.
    pub fn from_full_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.full_name() == name)
    }
}

/// A parsed type descriptor.
///
/// Child types are shared `Arc`s interned by the same registry, so a `List(T)` holds
/// the canonical instance of `T`.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum Type {
    Value(ValueKind),
    Message(MessageKind),
    Class { service: String, name: String },
    Enum { service: String, name: String },
    List(Arc<Type>),
    Set(Arc<Type>),
    Dictionary(Arc<Type>, Arc<Type>),
    Tuple(Vec<Arc<Type>>),
}

impl Type {
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            Type::List(_) | Type::Set(_) | Type::Dictionary(..) | Type::Tuple(_)
        )
    }
}

/// Formats the type back into its canonical descriptor string.
impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Value(kind) => write!(f, "{kind}"),
            Type::Message(kind) => f.write_str(kind.full_name()),
            Type::Class { service, name } => write!(f, "Class({service}.{name})"),
            Type::Enum { service, name } => write!(f, "Enum({service}.{name})"),
            Type::List(elem) => write!(f, "List({elem})"),
            Type::Set(elem) => write!(f, "Set({elem})"),
            Type::Dictionary(key, value) => write!(f, "Dictionary({key},{value})"),
            Type::Tuple(elems) => {
                f.write_str("Tuple(")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{elem}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// One named member of an [`Enumeration`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumerationMember {
    pub name: String,
    pub value: i32,
    pub documentation: String,
}

/// The value table of a service-defined enumeration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Enumeration {
    pub service: String,
    pub name: String,
    pub documentation: String,
    pub members: Vec<EnumerationMember>,
}

impl Enumeration {
    pub fn by_value(&self, value: i32) -> Option<&EnumerationMember> {
        self.members.iter().find(|m| m.value == value)
    }

    pub fn by_name(&self, name: &str) -> Option<&EnumerationMember> {
        self.members.iter().find(|m| m.name == name)
    }

    /// The member called `name`, as a value ready to be passed to a binding.
    pub fn value(&self, name: &str) -> Option<EnumValue> {
        self.by_name(name).map(|member| EnumValue {
            service: self.service.clone(),
            enumeration: self.name.clone(),
            name: member.name.clone(),
            value: member.value,
        })
    }
}

/// Resolves type descriptors and caches the results for one connection.
///
/// All methods take `&self`; the caches are concurrent maps so a registry can be
/// shared between threads behind an `Arc`.
#[derive(Debug)]
pub struct TypeRegistry {
    id: RegistryId,
    types: DashMap<String, Arc<Type>>,
    enumerations: DashMap<(String, String), Arc<Enumeration>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            id: RegistryId(NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed)),
            types: DashMap::new(),
            enumerations: DashMap::new(),
        }
    }

    pub fn id(&self) -> RegistryId {
        self.id
    }

    /// Resolves a descriptor string into its canonical [`Type`].
    ///
    /// Repeated calls with the same string return the same `Arc`.
    pub fn resolve(&self, descriptor: &str) -> Result<Arc<Type>, DescriptorError> {
        if let Some(cached) = self.types.get(descriptor) {
            return Ok(cached.clone());
        }

        // Parse without holding a map guard: children are resolved recursively.
        let parsed = Arc::new(parser::parse(self, descriptor)?);

        // If another thread raced us, keep the instance that landed first.
        let canonical = self
            .types
            .entry(descriptor.to_string())
            .or_insert(parsed)
            .clone();
        Ok(canonical)
    }

    /// Selects the type of the parameter at `position`.
    ///
    /// The first `ParameterType(<position>).<descriptor>` attribute that resolves wins;
    /// otherwise the declared descriptor is used.
    pub fn parameter_type(
        &self,
        position: usize,
        declared: &str,
        attributes: &[String],
    ) -> Result<Arc<Type>, DescriptorError> {
        attributes::parameter_type_overrides(position, attributes)
            .find_map(|descriptor| self.resolve(descriptor).ok())
            .map_or_else(|| self.resolve(declared), Ok)
    }

    /// Selects the return type, honoring `ReturnType.<descriptor>` overrides.
    pub fn return_type(
        &self,
        declared: &str,
        attributes: &[String],
    ) -> Result<Arc<Type>, DescriptorError> {
        attributes::return_type_overrides(attributes)
            .find_map(|descriptor| self.resolve(descriptor).ok())
            .map_or_else(|| self.resolve(declared), Ok)
    }

    /// Registers (or replaces) the value table of an enumeration.
    pub fn register_enumeration(&self, enumeration: Enumeration) -> Arc<Enumeration> {
        let key = (enumeration.service.clone(), enumeration.name.clone());
        let enumeration = Arc::new(enumeration);
        self.enumerations.insert(key, enumeration.clone());
        enumeration
    }

    pub fn enumeration(&self, service: &str, name: &str) -> Option<Arc<Enumeration>> {
        self.enumerations
            .get(&(service.to_string(), name.to_string()))
            .map(|e| e.clone())
    }

    /// Builds a handle to a server object, bound to this registry.
    ///
    /// Id `0` is the null object and yields `None`.
    pub fn remote_object(&self, service: &str, class: &str, id: u64) -> Option<RemoteObject> {
        (id != 0).then(|| RemoteObject::new(self.id, service, class, id))
    }

    /// Number of distinct descriptor strings resolved so far.
    pub fn cached_types(&self) -> usize {
        self.types.len()
    }
}
