//! # kRPC Client
//!
//! A [`Client`] is one connection's view of the server: a [`TypeRegistry`], the
//! transport calls go through, and the bound services.
//!
//! Services are bound exactly once, when the client is built:
//!
//! * [`Client::connect`] asks the server for its service listing (`KRPC.GetServices`).
//! * [`Client::from_services`] binds a listing obtained some other way.
//! * [`Client::offline`] binds a serialized listing against a transport that refuses
//!   every call, which is enough to inspect services, classes and enumerations.
//!
//! Any call with a return value can also be streamed, see [`Client::add_stream`].
//!
//! ```rust,no_run
//! use krpc_core::client::Client;
//! use krpc_core::transport::Invocation;
//! use std::sync::Arc;
//!
//! # fn send(_: &Invocation) -> Result<Vec<u8>, krpc_core::BoxError> { unimplemented!() }
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::connect(Arc::new(send))?;
//! let status = client.get_status()?;
//! println!("Server version {}", status.version);
//!
//! let space_center = client.service("SpaceCenter").expect("service is bound");
//! let vessel = space_center.property("ActiveVessel").expect("property is bound").get()?;
//! println!("Active vessel: {vessel:?}");
//! # Ok(())
//! # }
//! ```
mod offline;
mod streams;

use crate::binder::{self, CallError, Parameter, Procedure, Service};
use crate::schema;
use crate::transport::Transport;
use crate::types::{MessageKind, Type, TypeRegistry};
use crate::value::{Message, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use streams::Streams;

pub use offline::OfflineError;
pub use streams::{Stream, StreamError};

const CORE_SERVICE: &str = "KRPC";

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Failed to retrieve the service listing: {0}")]
    GetServices(#[source] CallError),
    #[error("Unexpected reply to {procedure}: expected {expected}")]
    UnexpectedReply {
        procedure: &'static str,
        expected: &'static str,
    },
}

/// A connection to a kRPC server, with every service bound.
#[derive(Clone)]
pub struct Client {
    registry: Arc<TypeRegistry>,
    transport: Arc<dyn Transport>,
    services: BTreeMap<String, Service>,
    streams: Arc<Streams>,
    offline: bool,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("registry", &self.registry.id())
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .field("offline", &self.offline)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Retrieves the service listing through `transport` and binds it.
    pub fn connect(transport: Arc<dyn Transport>) -> Result<Self, ConnectError> {
        let registry = Arc::new(TypeRegistry::new());
        let get_services = core_procedure(
            &registry,
            &transport,
            "GetServices",
            Vec::new(),
            Some(Type::Message(MessageKind::Services)),
        );

        let services = match get_services.call(Vec::<Value>::new()) {
            Ok(Value::Message(Message::Services(services))) => services,
            Ok(_) => {
                return Err(ConnectError::UnexpectedReply {
                    procedure: "KRPC.GetServices",
                    expected: "KRPC.Services",
                });
            }
            Err(err) => return Err(ConnectError::GetServices(err)),
        };

        Ok(Self::bind(registry, transport, &services))
    }

    /// Binds a service listing obtained elsewhere; calls go through `transport`.
    pub fn from_services(services: &schema::Services, transport: Arc<dyn Transport>) -> Self {
        Self::bind(Arc::new(TypeRegistry::new()), transport, services)
    }

    fn bind(
        registry: Arc<TypeRegistry>,
        transport: Arc<dyn Transport>,
        services: &schema::Services,
    ) -> Self {
        let services = services
            .services
            .iter()
            .map(|service| {
                let bound = binder::bind_service(service, &registry, &transport);
                (service.name.clone(), bound)
            })
            .collect();

        Self {
            registry,
            transport,
            services,
            streams: Arc::new(Streams::default()),
            offline: false,
        }
    }

    /// Calls `KRPC.GetStatus`.
    pub fn get_status(&self) -> Result<schema::Status, CallError> {
        let get_status = core_procedure(
            &self.registry,
            &self.transport,
            "GetStatus",
            Vec::new(),
            Some(Type::Message(MessageKind::Status)),
        );

        match get_status.call(Vec::<Value>::new())? {
            Value::Message(Message::Status(status)) => Ok(status),
            other => Err(crate::codec::CodecError::TypeMismatch {
                value: other.kind_name(),
                ty: MessageKind::Status.full_name().to_string(),
            }
            .into()),
        }
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }
}

/// A procedure of the built-in `KRPC` service, known before any listing is bound.
fn core_procedure(
    registry: &Arc<TypeRegistry>,
    transport: &Arc<dyn Transport>,
    name: &str,
    parameters: Vec<Parameter>,
    returns: Option<Type>,
) -> Procedure {
    Procedure {
        service: CORE_SERVICE.to_string(),
        name: name.to_string(),
        parameters,
        return_type: returns.map(Arc::new),
        documentation: String::new(),
        registry: registry.clone(),
        transport: transport.clone(),
    }
}
