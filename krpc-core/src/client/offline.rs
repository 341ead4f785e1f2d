//! # Offline Client
//!
//! A client built from a serialized `KRPC.Services` message, with no server behind
//! it. Every binding is available for introspection; invoking one fails with
//! [`NotConnected`](crate::transport::NotConnected).
use super::Client;
use crate::schema;
use crate::transport::Disconnected;
use prost::Message;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
#[error("Invalid service listing: {0}")]
pub struct OfflineError(#[from] prost::DecodeError);

impl Client {
    /// Creates a disconnected client from the bytes of a `KRPC.Services` message.
    ///
    /// # Returns
    ///
    /// * `Ok(Client)` - A client whose bindings refuse to be invoked.
    /// * `Err(OfflineError)` - If the bytes are not a valid service listing.
    pub fn offline(listing: &[u8]) -> Result<Self, OfflineError> {
        let services = schema::Services::decode(listing)?;
        let mut client = Self::from_services(&services, Arc::new(Disconnected));
        client.offline = true;
        Ok(client)
    }

    /// Returns `true` if this client was built by [`Client::offline`].
    pub fn is_offline(&self) -> bool {
        self.offline
    }
}
