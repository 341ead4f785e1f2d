//! # Transport Seam
//!
//! Bindings never talk to the network themselves. Every call is described by an
//! [`Invocation`] and handed to a [`Transport`], which delivers it to the server and
//! returns the raw bytes of the return value.
//!
//! Any closure with the right signature is a transport:
//!
//! ```rust
//! use krpc_core::transport::{Invocation, Transport};
//!
//! let transport = |call: &Invocation| -> Result<Vec<u8>, krpc_core::BoxError> {
//!     println!("{}.{}", call.service, call.procedure);
//!     Ok(Vec::new())
//! };
//! # fn assert_transport(_: &impl Transport) {}
//! # assert_transport(&transport);
//! ```
use crate::BoxError;
use crate::schema;
use crate::types::Type;
use std::sync::Arc;

/// Delivers invocations to a server.
///
/// Implementations block until the server answers. Errors are passed through to the
/// caller of the binding unchanged.
pub trait Transport: Send + Sync {
    fn invoke(&self, call: &Invocation) -> Result<Vec<u8>, BoxError>;
}

impl<F> Transport for F
where
    F: Fn(&Invocation) -> Result<Vec<u8>, BoxError> + Send + Sync,
{
    fn invoke(&self, call: &Invocation) -> Result<Vec<u8>, BoxError> {
        self(call)
    }
}

/// One remote procedure call, with its arguments already encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub service: String,
    pub procedure: String,
    /// Encoded arguments tagged with their parameter position. Parameters left to
    /// their server-side default are absent.
    pub arguments: Vec<schema::Argument>,
    /// The type of every declared parameter, indexed by position.
    pub param_types: Vec<Arc<Type>>,
    pub return_type: Option<Arc<Type>>,
}

impl Invocation {
    /// The `KRPC.Request` message carrying this invocation.
    pub fn to_request(&self) -> schema::Request {
        schema::Request {
            service: self.service.clone(),
            procedure: self.procedure.clone(),
            arguments: self.arguments.clone(),
        }
    }

    /// The encoded argument at `position`, if one was sent.
    pub fn argument(&self, position: u32) -> Option<&[u8]> {
        self.arguments
            .iter()
            .find(|arg| arg.position == position)
            .map(|arg| arg.value.as_slice())
    }
}

/// An error reported by the server in a `KRPC.Response`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Server error: {0}")]
pub struct RpcError(pub String);

/// Extracts the return value bytes from a response.
///
/// A response without a return value yields an empty buffer.
pub fn unwrap_response(response: schema::Response) -> Result<Vec<u8>, RpcError> {
    if response.has_error {
        return Err(RpcError(response.error));
    }
    Ok(response.return_value)
}

/// Returned by [`Disconnected`] for every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Client is offline, remote procedures cannot be invoked")]
pub struct NotConnected;

/// A transport that refuses every call, for clients used only for introspection.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disconnected;

impl Transport for Disconnected {
    fn invoke(&self, _call: &Invocation) -> Result<Vec<u8>, BoxError> {
        Err(Box::new(NotConnected))
    }
}
