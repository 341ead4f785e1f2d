//! # Streams
//!
//! A stream asks the server to evaluate one invocation on every update and push the
//! result to the client. `KRPC.AddStream` registers the request and returns its id.
//! Results then arrive as `KRPC.StreamMessage`s on the stream connection, which the
//! transport owns: it hands every message it reads to [`Client::update_streams`].
//!
//! The server answers the same request with the same id. Handles sharing an id share
//! their latest result, and the stream is removed from the server when the last of
//! them is removed.
use super::{Client, core_procedure};
use crate::binder::{CallError, Parameter, Procedure};
use crate::codec::{self, CodecError};
use crate::schema;
use crate::transport::{Invocation, RpcError, unwrap_response};
use crate::types::{MessageKind, Type, TypeRegistry, ValueKind};
use crate::value::{Message, Value};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("{0} has no return value and cannot be streamed")]
    NoReturnValue(String),
    #[error("Stream {0} has been removed")]
    Removed(u32),
    #[error("Stream {0} has not received a value yet")]
    Pending(u32),
    #[error("Unexpected reply to KRPC.AddStream: expected a uint32 id")]
    UnexpectedReply,
    #[error(transparent)]
    Call(#[from] CallError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

struct Slot {
    handles: usize,
    latest: Option<schema::Response>,
}

/// The open streams of one connection, keyed by stream id.
#[derive(Default)]
pub(crate) struct Streams {
    slots: DashMap<u32, Slot>,
}

impl Streams {
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

/// A handle on one stream. Dropping it removes the stream.
pub struct Stream {
    id: u32,
    call: Invocation,
    return_type: Arc<Type>,
    registry: Arc<TypeRegistry>,
    streams: Arc<Streams>,
    remove_stream: Procedure,
    removed: AtomicBool,
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id)
            .field("service", &self.call.service)
            .field("procedure", &self.call.procedure)
            .field("removed", &self.removed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Registers `call` as a stream with the server.
    ///
    /// `call` comes from one of the `prepare` methods of a binding. Calls without a
    /// return value, such as property setters, cannot be streamed and are rejected
    /// before anything is sent.
    pub fn add_stream(&self, call: Invocation) -> Result<Stream, StreamError> {
        let return_type = call
            .return_type
            .clone()
            .ok_or_else(|| StreamError::NoReturnValue(format!("{}.{}", call.service, call.procedure)))?;

        let add_stream = core_procedure(
            &self.registry,
            &self.transport,
            "AddStream",
            vec![parameter("request", Type::Message(MessageKind::Request))],
            Some(Type::Value(ValueKind::UInt32)),
        );
        let request = Value::Message(Message::Request(call.to_request()));
        let id = match add_stream.call([request])? {
            Value::UInt32(id) => id,
            _ => return Err(StreamError::UnexpectedReply),
        };

        self.streams
            .slots
            .entry(id)
            .and_modify(|slot| slot.handles += 1)
            .or_insert(Slot {
                handles: 1,
                latest: None,
            });

        debug!(
            id,
            service = %call.service,
            procedure = %call.procedure,
            "Added stream"
        );

        Ok(Stream {
            id,
            call,
            return_type,
            registry: self.registry.clone(),
            streams: self.streams.clone(),
            remove_stream: core_procedure(
                &self.registry,
                &self.transport,
                "RemoveStream",
                vec![parameter("id", Type::Value(ValueKind::UInt32))],
                None,
            ),
            removed: AtomicBool::new(false),
        })
    }

    /// Records the results carried by a `KRPC.StreamMessage`.
    ///
    /// Results for ids with no open stream are ignored.
    pub fn update_streams(&self, message: &schema::StreamMessage) {
        for update in &message.responses {
            let Some(response) = &update.response else {
                continue;
            };
            match self.streams.slots.get_mut(&update.id) {
                Some(mut slot) => slot.latest = Some(response.clone()),
                None => debug!(id = update.id, "Ignoring update for unknown stream"),
            }
        }
    }

    /// Number of distinct streams open on this connection.
    pub fn open_streams(&self) -> usize {
        self.streams.len()
    }
}

impl Stream {
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The invocation the server evaluates for this stream.
    pub fn invocation(&self) -> &Invocation {
        &self.call
    }

    /// The latest result, decoded against the return type of the streamed call.
    ///
    /// An error reported by the server for this stream is returned as
    /// [`StreamError::Rpc`].
    pub fn get(&self) -> Result<Value, StreamError> {
        if self.removed.load(Ordering::Acquire) {
            return Err(StreamError::Removed(self.id));
        }

        let response = self
            .streams
            .slots
            .get(&self.id)
            .ok_or(StreamError::Removed(self.id))?
            .latest
            .clone()
            .ok_or(StreamError::Pending(self.id))?;

        let data = unwrap_response(response)?;
        Ok(codec::decode(&self.registry, &data, &self.return_type)?)
    }

    /// Removes this handle. Removing it again does nothing.
    pub fn remove(&self) -> Result<(), StreamError> {
        if self.removed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let last = match self.streams.slots.entry(self.id) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().handles -= 1;
                if entry.get().handles == 0 {
                    entry.remove();
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(_) => false,
        };

        if last {
            self.remove_stream.call([self.id])?;
            debug!(id = self.id, "Removed stream");
        }
        Ok(())
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        if let Err(err) = self.remove() {
            warn!(id = self.id, error = %err, "Failed to remove stream");
        }
    }
}

fn parameter(name: &str, ty: Type) -> Parameter {
    Parameter {
        name: name.to_string(),
        ty: Arc::new(ty),
        default: None,
    }
}
