//! # kRPC Core
//!
//! `krpc-core` is the client-side runtime for kRPC servers. It needs no generated
//! code: everything is driven by the service listing the server publishes.
//!
//! ## Key Components
//!
//! * **[`types`]:** The type algebra. A [`TypeRegistry`](types::TypeRegistry) parses
//!   descriptor strings such as `Dictionary(string,List(double))` into canonical,
//!   shared [`Type`](types::Type)s.
//! * **[`codec`]:** The wire codec, encoding and decoding [`Value`](value::Value)s
//!   against a type, bit-exact with the server.
//! * **[`coerce`]:** Reshapes caller input into the exact type a parameter expects.
//! * **[`binder`]:** Classifies procedures by their [`attributes`] and builds the
//!   invocable bindings (procedures, properties, class methods and properties,
//!   enumerations) of a service.
//! * **[`client`]:** Owns one connection's registry and bound services, and the
//!   streams registered on it.
//!
//! ## Transport
//!
//! This crate does no I/O. Bindings hand every call to a
//! [`Transport`](transport::Transport), implemented by the caller, and block until it
//! returns the encoded result. Transport errors are passed through unchanged.
//!
//! ## Re-exports
//!
//! This crate re-exports `prost` so that consumers encode the [`schema`] messages with
//! a compatible version.
pub mod attributes;
pub mod binder;
pub mod client;
pub mod codec;
pub mod coerce;
pub mod schema;
pub mod transport;
pub mod types;
pub mod value;

// Re-exports
pub use prost;

/// Type alias for the boxed error transports return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
