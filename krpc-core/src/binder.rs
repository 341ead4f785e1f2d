//! # Service Binder
//!
//! Turns the metadata of a service (as listed by `KRPC.GetServices`) into a
//! [`Service`]: a table of invocable [`Binding`]s built once per connection.
//!
//! Binding runs in three passes:
//!
//! 1. An empty shell is created for every declared class.
//! 2. Every enumeration is registered with the [`TypeRegistry`] and exposed as a
//!    member.
//! 3. Every procedure is classified from its attributes (see [`attributes::classify`])
//!    and routed to the service's member table or to its class. Property getters and
//!    setters arrive as separate procedures, in any order, and are merged into one
//!    accessor.
//!
//! A procedure that cannot be bound (unknown type descriptor, malformed attribute,
//! undecodable default) is logged and skipped. The rest of the service stays usable.
mod bindings;

pub use bindings::*;

use crate::attributes::{self, AttributeError, MemberKind};
use crate::codec::{self, CodecError};
use crate::schema;
use crate::transport::Transport;
use crate::types::{self, DescriptorError, Type, TypeRegistry, ValueKind};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Name given to the receiver slot of class methods.
const RECEIVER: &str = "self";

#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error(transparent)]
    Attribute(#[from] AttributeError),
    #[error("Invalid type for parameter '{parameter}': {source}")]
    ParameterType {
        parameter: String,
        #[source]
        source: DescriptorError,
    },
    #[error("Invalid return type: {0}")]
    ReturnType(#[source] DescriptorError),
    #[error("Cannot decode the default value of parameter '{parameter}': {source}")]
    DefaultValue {
        parameter: String,
        #[source]
        source: CodecError,
    },
    #[error("Class member '{0}' has no receiver parameter")]
    MissingReceiver(String),
    #[error("'{0}' is already bound as a different kind of member")]
    NameConflict(String),
}

/// Binds every member of `service`.
///
/// The registry receives the service's enumerations; every binding keeps a handle on
/// the registry and on `transport`, through which all calls go.
pub fn bind_service(
    service: &schema::Service,
    registry: &Arc<TypeRegistry>,
    transport: &Arc<dyn Transport>,
) -> Service {
    let mut bound = Service {
        name: service.name.clone(),
        documentation: service.documentation.clone(),
        members: BTreeMap::new(),
        classes: service
            .classes
            .iter()
            .map(|class| {
                let shell = Class::new(&service.name, &class.name, &class.documentation);
                (class.name.clone(), shell)
            })
            .collect(),
    };

    for enumeration in &service.enumerations {
        let registered = registry.register_enumeration(types::Enumeration {
            service: service.name.clone(),
            name: enumeration.name.clone(),
            documentation: enumeration.documentation.clone(),
            members: enumeration
                .values
                .iter()
                .map(|value| types::EnumerationMember {
                    name: value.name.clone(),
                    value: value.value,
                    documentation: value.documentation.clone(),
                })
                .collect(),
        });
        bound
            .members
            .insert(enumeration.name.clone(), Binding::Enumeration(registered));
    }

    let mut skipped = 0;
    for procedure in &service.procedures {
        if let Err(error) = bind_procedure(&mut bound, procedure, registry, transport) {
            skipped += 1;
            warn!(
                service = %service.name,
                procedure = %procedure.name,
                %error,
                "Skipping member that cannot be bound"
            );
        }
    }

    debug!(
        service = %bound.name,
        members = bound.members.len(),
        classes = bound.classes.len(),
        skipped,
        "Bound service"
    );
    bound
}

fn bind_procedure(
    service: &mut Service,
    metadata: &schema::Procedure,
    registry: &Arc<TypeRegistry>,
    transport: &Arc<dyn Transport>,
) -> Result<(), BindError> {
    let kind = attributes::classify(&metadata.attributes)?;
    let procedure = build_procedure(&service.name, metadata, registry, transport)?;

    match kind {
        MemberKind::Procedure => {
            insert_new(&mut service.members, &metadata.name, Binding::Procedure(procedure))
        }
        MemberKind::PropertyGetter(name) => {
            let accessor = property(&mut service.members, name)?;
            accessor.getter = Some(procedure);
            Ok(())
        }
        MemberKind::PropertySetter(name) => {
            let accessor = property(&mut service.members, name)?;
            accessor.setter = Some(procedure);
            Ok(())
        }
        MemberKind::ClassMethod { class, method } => {
            let method_binding = Binding::ClassMethod(into_method(procedure)?);
            let class = class_shell(service, class);
            insert_new(&mut class.members, method, method_binding)
        }
        MemberKind::ClassStaticMethod { class, method } => {
            let class = class_shell(service, class);
            insert_new(
                &mut class.members,
                method,
                Binding::ClassStaticMethod(procedure),
            )
        }
        MemberKind::ClassPropertyGetter { class, property } => {
            let getter = into_method(procedure)?;
            let accessor = class_property(class_shell(service, class), property)?;
            accessor.getter = Some(getter);
            Ok(())
        }
        MemberKind::ClassPropertySetter { class, property } => {
            let setter = into_method(procedure)?;
            let accessor = class_property(class_shell(service, class), property)?;
            accessor.setter = Some(setter);
            Ok(())
        }
    }
}

fn build_procedure(
    service: &str,
    metadata: &schema::Procedure,
    registry: &Arc<TypeRegistry>,
    transport: &Arc<dyn Transport>,
) -> Result<Procedure, BindError> {
    let parameters = metadata
        .parameters
        .iter()
        .enumerate()
        .map(|(position, param)| {
            let ty = registry
                .parameter_type(position, &param.r#type, &metadata.attributes)
                .map_err(|source| BindError::ParameterType {
                    parameter: param.name.clone(),
                    source,
                })?;

            let default = param
                .has_default_value
                .then(|| decode_default(registry, &param.default_value, &ty))
                .transpose()
                .map_err(|source| BindError::DefaultValue {
                    parameter: param.name.clone(),
                    source,
                })?;

            Ok(Parameter {
                name: param.name.clone(),
                ty,
                default,
            })
        })
        .collect::<Result<Vec<_>, BindError>>()?;

    let return_type = metadata
        .has_return_type
        .then(|| registry.return_type(&metadata.return_type, &metadata.attributes))
        .transpose()
        .map_err(BindError::ReturnType)?;

    Ok(Procedure {
        service: service.to_string(),
        name: metadata.name.clone(),
        parameters,
        return_type,
        documentation: metadata.documentation.clone(),
        registry: registry.clone(),
        transport: transport.clone(),
    })
}

/// Enumeration tables may not be registered yet when defaults are decoded, so an
/// enumeration default is kept as its underlying `sint32`.
fn decode_default(
    registry: &TypeRegistry,
    data: &[u8],
    ty: &Type,
) -> Result<crate::value::Value, CodecError> {
    match ty {
        Type::Enum { .. } => codec::decode(registry, data, &Type::Value(ValueKind::SInt32)),
        _ => codec::decode(registry, data, ty),
    }
}

/// Splits the receiver off a class member's parameters.
fn into_method(procedure: Procedure) -> Result<Method, BindError> {
    let Some(first) = procedure.parameters.first() else {
        return Err(BindError::MissingReceiver(procedure.name.clone()));
    };

    let collides = procedure.parameters[1..]
        .iter()
        .any(|param| param.name == RECEIVER);
    let receiver = Parameter {
        name: if collides {
            first.name.clone()
        } else {
            RECEIVER.to_string()
        },
        ..first.clone()
    };

    Ok(Method {
        receiver,
        procedure,
    })
}

fn insert_new(
    members: &mut BTreeMap<String, Binding>,
    name: &str,
    binding: Binding,
) -> Result<(), BindError> {
    if members.contains_key(name) {
        return Err(BindError::NameConflict(name.to_string()));
    }
    members.insert(name.to_string(), binding);
    Ok(())
}

fn property<'a>(
    members: &'a mut BTreeMap<String, Binding>,
    name: &str,
) -> Result<&'a mut Accessor, BindError> {
    let binding = members
        .entry(name.to_string())
        .or_insert_with(|| Binding::Property(Accessor::new(name)));
    match binding {
        Binding::Property(accessor) => Ok(accessor),
        _ => Err(BindError::NameConflict(name.to_string())),
    }
}

fn class_property<'a>(class: &'a mut Class, name: &str) -> Result<&'a mut ClassAccessor, BindError> {
    let binding = class
        .members
        .entry(name.to_string())
        .or_insert_with(|| Binding::ClassProperty(ClassAccessor::new(name)));
    match binding {
        Binding::ClassProperty(accessor) => Ok(accessor),
        _ => Err(BindError::NameConflict(name.to_string())),
    }
}

/// Classes named only by attributes get a shell on first use.
fn class_shell<'a>(service: &'a mut Service, class: &str) -> &'a mut Class {
    let service_name = &service.name;
    service
        .classes
        .entry(class.to_string())
        .or_insert_with(|| Class::new(service_name, class, ""))
}
