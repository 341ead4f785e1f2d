//! The invocable members produced by the binder.
use crate::BoxError;
use crate::codec::{self, CodecError};
use crate::coerce::{CoercionError, coerce};
use crate::schema;
use crate::transport::{Invocation, Transport};
use crate::types::{Enumeration, Type, TypeRegistry};
use crate::value::{RemoteObject, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error(transparent)]
    Coercion(#[from] CoercionError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("Missing argument for parameter '{parameter}' of {procedure}")]
    MissingArgument { procedure: String, parameter: String },
    #[error("{procedure} has no parameter named '{parameter}'")]
    UnknownArgument { procedure: String, parameter: String },
    #[error("Parameter '{parameter}' of {procedure} was given more than once")]
    DuplicateArgument { procedure: String, parameter: String },
    #[error("{procedure} takes at most {expected} arguments but {actual} were given")]
    TooManyArguments {
        procedure: String,
        expected: usize,
        actual: usize,
    },
    #[error("Property '{0}' is write-only")]
    NotReadable(String),
    #[error("Property '{0}' is read-only")]
    NotWritable(String),
    #[error(transparent)]
    Transport(BoxError),
}

impl CallError {
    /// The error returned by the transport, if that is where the call failed.
    pub fn into_transport(self) -> Option<BoxError> {
        match self {
            CallError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

/// A parameter with its resolved type and, when declared, its decoded default.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: Arc<Type>,
    pub default: Option<Value>,
}

/// A callable remote procedure.
#[derive(Clone)]
pub struct Procedure {
    pub(crate) service: String,
    pub(crate) name: String,
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) return_type: Option<Arc<Type>>,
    pub(crate) documentation: String,
    pub(crate) registry: Arc<TypeRegistry>,
    pub(crate) transport: Arc<dyn Transport>,
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure")
            .field("service", &self.service)
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("return_type", &self.return_type)
            .finish_non_exhaustive()
    }
}

impl Procedure {
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The remote procedure name, e.g. `Vessel_get_Name`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn return_type(&self) -> Option<&Arc<Type>> {
        self.return_type.as_ref()
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    /// Calls the procedure with positional arguments.
    ///
    /// Trailing parameters that have a default may be left out.
    pub fn call<I>(&self, args: I) -> Result<Value, CallError>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.invoke(args.into_iter().map(|arg| Some(arg.into())).collect())
    }

    /// Calls the procedure; a `None` slot leaves a defaulted parameter to the server.
    ///
    /// Arguments are coerced and encoded before the transport sees anything, so a
    /// malformed call never reaches the server. Procedures without a return type
    /// yield [`Value::Null`].
    pub fn invoke(&self, args: Vec<Option<Value>>) -> Result<Value, CallError> {
        let call = self.prepare(args)?;
        self.send(&call)
    }

    /// Calls the procedure with positional arguments followed by arguments matched to
    /// parameters by name.
    ///
    /// ```rust,no_run
    /// # use krpc_core::binder::Procedure;
    /// # use krpc_core::value::Value;
    /// # fn run(procedure: &Procedure) -> Result<(), krpc_core::binder::CallError> {
    /// procedure.invoke_named(vec![Some(Value::from("x"))], [("z", Value::from("z"))])?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn invoke_named<I, N>(&self, args: Vec<Option<Value>>, named: I) -> Result<Value, CallError>
    where
        I: IntoIterator<Item = (N, Value)>,
        N: AsRef<str>,
    {
        let call = self.prepare_named(args, named)?;
        self.send(&call)
    }

    /// Builds the invocation [`Procedure::invoke`] would send, without sending it.
    pub fn prepare(&self, args: Vec<Option<Value>>) -> Result<Invocation, CallError> {
        self.prepare_named(args, std::iter::empty::<(&str, Value)>())
    }

    /// Builds the invocation [`Procedure::invoke_named`] would send, without sending it.
    pub fn prepare_named<I, N>(
        &self,
        mut args: Vec<Option<Value>>,
        named: I,
    ) -> Result<Invocation, CallError>
    where
        I: IntoIterator<Item = (N, Value)>,
        N: AsRef<str>,
    {
        if args.len() > self.parameters.len() {
            return Err(CallError::TooManyArguments {
                procedure: self.qualified_name(),
                expected: self.parameters.len(),
                actual: args.len(),
            });
        }
        args.resize_with(self.parameters.len(), || None);

        for (name, value) in named {
            let name = name.as_ref();
            let position = self
                .parameters
                .iter()
                .position(|param| param.name == name)
                .ok_or_else(|| CallError::UnknownArgument {
                    procedure: self.qualified_name(),
                    parameter: name.to_string(),
                })?;
            if args[position].replace(value).is_some() {
                return Err(CallError::DuplicateArgument {
                    procedure: self.qualified_name(),
                    parameter: name.to_string(),
                });
            }
        }

        let mut arguments = Vec::with_capacity(self.parameters.len());

        for (position, (param, arg)) in self.parameters.iter().zip(args).enumerate() {
            match arg {
                Some(value) => {
                    let value = coerce(&self.registry, value, &param.ty)?;
                    arguments.push(schema::Argument {
                        position: position as u32,
                        value: codec::encode(&value, &param.ty)?,
                    });
                }
                None if param.default.is_some() => {}
                None => {
                    return Err(CallError::MissingArgument {
                        procedure: self.qualified_name(),
                        parameter: param.name.clone(),
                    });
                }
            }
        }

        Ok(Invocation {
            service: self.service.clone(),
            procedure: self.name.clone(),
            arguments,
            param_types: self.parameters.iter().map(|p| p.ty.clone()).collect(),
            return_type: self.return_type.clone(),
        })
    }

    fn send(&self, call: &Invocation) -> Result<Value, CallError> {
        debug!(
            service = %call.service,
            procedure = %call.procedure,
            arguments = call.arguments.len(),
            "Invoking remote procedure"
        );

        let data = self
            .transport
            .invoke(call)
            .map_err(CallError::Transport)?;

        match &self.return_type {
            Some(ty) => Ok(codec::decode(&self.registry, &data, ty)?),
            None => Ok(Value::Null),
        }
    }

    fn qualified_name(&self) -> String {
        format!("{}.{}", self.service, self.name)
    }
}

/// A method of a class, called on a remote object.
///
/// The wrapped procedure's first parameter is the object the method is called on.
#[derive(Debug, Clone)]
pub struct Method {
    pub(crate) receiver: Parameter,
    pub(crate) procedure: Procedure,
}

impl Method {
    /// The receiver slot, named `self` unless a declared parameter already uses that name.
    pub fn receiver(&self) -> &Parameter {
        &self.receiver
    }

    /// The declared parameters, without the receiver.
    pub fn parameters(&self) -> &[Parameter] {
        &self.procedure.parameters[1..]
    }

    pub fn procedure(&self) -> &Procedure {
        &self.procedure
    }

    pub fn call<I>(&self, object: &RemoteObject, args: I) -> Result<Value, CallError>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.invoke(object, args.into_iter().map(|arg| Some(arg.into())).collect())
    }

    pub fn invoke(&self, object: &RemoteObject, args: Vec<Option<Value>>) -> Result<Value, CallError> {
        self.procedure.invoke(with_receiver(object, args))
    }

    /// Calls the method with positional arguments followed by named ones. Naming the
    /// receiver is a [`CallError::DuplicateArgument`].
    pub fn invoke_named<I, N>(
        &self,
        object: &RemoteObject,
        args: Vec<Option<Value>>,
        named: I,
    ) -> Result<Value, CallError>
    where
        I: IntoIterator<Item = (N, Value)>,
        N: AsRef<str>,
    {
        self.procedure.invoke_named(with_receiver(object, args), named)
    }

    pub fn prepare(&self, object: &RemoteObject, args: Vec<Option<Value>>) -> Result<Invocation, CallError> {
        self.procedure.prepare(with_receiver(object, args))
    }
}

fn with_receiver(object: &RemoteObject, args: Vec<Option<Value>>) -> Vec<Option<Value>> {
    std::iter::once(Some(Value::Object(object.clone())))
        .chain(args)
        .collect()
}

/// A service-level property. Either half may be missing.
#[derive(Debug, Clone)]
pub struct Accessor {
    pub(crate) name: String,
    pub(crate) getter: Option<Procedure>,
    pub(crate) setter: Option<Procedure>,
}

impl Accessor {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            getter: None,
            setter: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn getter(&self) -> Option<&Procedure> {
        self.getter.as_ref()
    }

    pub fn setter(&self) -> Option<&Procedure> {
        self.setter.as_ref()
    }

    pub fn get(&self) -> Result<Value, CallError> {
        self.readable()?.call(Vec::<Value>::new())
    }

    /// The invocation of the getter, for streaming the property.
    pub fn prepare_get(&self) -> Result<Invocation, CallError> {
        self.readable()?.prepare(Vec::new())
    }

    fn readable(&self) -> Result<&Procedure, CallError> {
        self.getter
            .as_ref()
            .ok_or_else(|| CallError::NotReadable(self.name.clone()))
    }

    pub fn set(&self, value: impl Into<Value>) -> Result<(), CallError> {
        let setter = self
            .setter
            .as_ref()
            .ok_or_else(|| CallError::NotWritable(self.name.clone()))?;
        setter.call([value.into()]).map(|_| ())
    }
}

/// A property of a class, read and written through a remote object.
#[derive(Debug, Clone)]
pub struct ClassAccessor {
    pub(crate) name: String,
    pub(crate) getter: Option<Method>,
    pub(crate) setter: Option<Method>,
}

impl ClassAccessor {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            getter: None,
            setter: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn getter(&self) -> Option<&Method> {
        self.getter.as_ref()
    }

    pub fn setter(&self) -> Option<&Method> {
        self.setter.as_ref()
    }

    pub fn get(&self, object: &RemoteObject) -> Result<Value, CallError> {
        self.readable()?.call(object, Vec::<Value>::new())
    }

    /// The invocation of the getter on `object`, for streaming the property.
    pub fn prepare_get(&self, object: &RemoteObject) -> Result<Invocation, CallError> {
        self.readable()?.prepare(object, Vec::new())
    }

    fn readable(&self) -> Result<&Method, CallError> {
        self.getter
            .as_ref()
            .ok_or_else(|| CallError::NotReadable(self.name.clone()))
    }

    pub fn set(&self, object: &RemoteObject, value: impl Into<Value>) -> Result<(), CallError> {
        let setter = self
            .setter
            .as_ref()
            .ok_or_else(|| CallError::NotWritable(self.name.clone()))?;
        setter.call(object, [value.into()]).map(|_| ())
    }
}

/// One invocable member of a service or class.
#[derive(Debug, Clone)]
pub enum Binding {
    Procedure(Procedure),
    Property(Accessor),
    ClassMethod(Method),
    ClassStaticMethod(Procedure),
    ClassProperty(ClassAccessor),
    Enumeration(Arc<Enumeration>),
}

impl Binding {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Binding::Procedure(_) => "procedure",
            Binding::Property(_) => "property",
            Binding::ClassMethod(_) => "method",
            Binding::ClassStaticMethod(_) => "static method",
            Binding::ClassProperty(_) => "property",
            Binding::Enumeration(_) => "enumeration",
        }
    }
}

/// A service-defined class and its members, keyed by member name.
#[derive(Debug, Clone)]
pub struct Class {
    pub(crate) service: String,
    pub(crate) name: String,
    pub(crate) documentation: String,
    pub(crate) members: BTreeMap<String, Binding>,
}

impl Class {
    pub(crate) fn new(service: &str, name: &str, documentation: &str) -> Self {
        Self {
            service: service.to_string(),
            name: name.to_string(),
            documentation: documentation.to_string(),
            members: BTreeMap::new(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    pub fn members(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.members.iter().map(|(name, binding)| (name.as_str(), binding))
    }

    pub fn member(&self, name: &str) -> Option<&Binding> {
        self.members.get(name)
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        match self.members.get(name)? {
            Binding::ClassMethod(method) => Some(method),
            _ => None,
        }
    }

    pub fn static_method(&self, name: &str) -> Option<&Procedure> {
        match self.members.get(name)? {
            Binding::ClassStaticMethod(procedure) => Some(procedure),
            _ => None,
        }
    }

    pub fn property(&self, name: &str) -> Option<&ClassAccessor> {
        match self.members.get(name)? {
            Binding::ClassProperty(accessor) => Some(accessor),
            _ => None,
        }
    }
}

/// The bound form of one service: a dispatch table of members plus its classes.
#[derive(Debug, Clone)]
pub struct Service {
    pub(crate) name: String,
    pub(crate) documentation: String,
    pub(crate) members: BTreeMap<String, Binding>,
    pub(crate) classes: BTreeMap<String, Class>,
}

impl Service {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    pub fn members(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.members.iter().map(|(name, binding)| (name.as_str(), binding))
    }

    pub fn member(&self, name: &str) -> Option<&Binding> {
        self.members.get(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &Class> {
        self.classes.values()
    }

    pub fn class(&self, name: &str) -> Option<&Class> {
        self.classes.get(name)
    }

    pub fn procedure(&self, name: &str) -> Option<&Procedure> {
        match self.members.get(name)? {
            Binding::Procedure(procedure) => Some(procedure),
            _ => None,
        }
    }

    pub fn property(&self, name: &str) -> Option<&Accessor> {
        match self.members.get(name)? {
            Binding::Property(accessor) => Some(accessor),
            _ => None,
        }
    }

    pub fn enumeration(&self, name: &str) -> Option<&Arc<Enumeration>> {
        match self.members.get(name)? {
            Binding::Enumeration(enumeration) => Some(enumeration),
            _ => None,
        }
    }
}
