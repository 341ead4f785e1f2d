//! # kRPC Schema Messages
//!
//! Protobuf messages exchanged with a kRPC server, declared with `prost` derives.
//!
//! Field numbers match the server's `KRPC.proto`, so these types can be used to
//! encode requests and decode responses and service listings byte-for-byte.
//!
//! Besides the request/response envelopes, this module holds the generic
//! collection envelopes ([`List`], [`Set`], [`Tuple`], [`Dictionary`]) that the
//! value codec uses to carry collection items as nested byte strings.
use serde::{Deserialize, Serialize};

/// A single remote procedure call.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Request {
    #[prost(string, tag = "1")]
    pub service: String,
    #[prost(string, tag = "2")]
    pub procedure: String,
    #[prost(message, repeated, tag = "3")]
    pub arguments: Vec<Argument>,
}

/// An encoded argument, tagged with the position of the parameter it fills.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Argument {
    #[prost(uint32, tag = "1")]
    pub position: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Response {
    #[prost(double, tag = "1")]
    pub time: f64,
    #[prost(bool, tag = "2")]
    pub has_error: bool,
    #[prost(string, tag = "3")]
    pub error: String,
    #[prost(bool, tag = "4")]
    pub has_return_value: bool,
    #[prost(bytes = "vec", tag = "5")]
    pub return_value: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamMessage {
    #[prost(message, repeated, tag = "1")]
    pub responses: Vec<StreamResponse>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamResponse {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(message, optional, tag = "2")]
    pub response: Option<Response>,
}

/// The service listing returned by `KRPC.GetServices`.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Services {
    #[prost(message, repeated, tag = "1")]
    pub services: Vec<Service>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub procedures: Vec<Procedure>,
    #[prost(message, repeated, tag = "3")]
    pub classes: Vec<Class>,
    #[prost(message, repeated, tag = "4")]
    pub enumerations: Vec<Enumeration>,
    #[prost(string, tag = "5")]
    pub documentation: String,
}

/// Metadata for one remote procedure.
///
/// `return_type` and every parameter `type` hold textual type descriptors
/// (see [`crate::types`]); `attributes` hold the tags parsed by [`crate::attributes`].
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Procedure {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub parameters: Vec<Parameter>,
    #[prost(bool, tag = "3")]
    pub has_return_type: bool,
    #[prost(string, tag = "4")]
    pub return_type: String,
    #[prost(string, repeated, tag = "5")]
    pub attributes: Vec<String>,
    #[prost(string, tag = "6")]
    pub documentation: String,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameter {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub r#type: String,
    #[prost(bool, tag = "3")]
    pub has_default_value: bool,
    #[prost(bytes = "vec", tag = "4")]
    pub default_value: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Class {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub documentation: String,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Enumeration {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub values: Vec<EnumerationValue>,
    #[prost(string, tag = "3")]
    pub documentation: String,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumerationValue {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(int32, tag = "2")]
    pub value: i32,
    #[prost(string, tag = "3")]
    pub documentation: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct List {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub items: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Set {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub items: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Tuple {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub items: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Dictionary {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<DictionaryEntry>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DictionaryEntry {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

/// Server statistics returned by `KRPC.GetStatus`.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Status {
    #[prost(string, tag = "1")]
    pub version: String,
    #[prost(uint64, tag = "2")]
    pub bytes_read: u64,
    #[prost(uint64, tag = "3")]
    pub bytes_written: u64,
    #[prost(float, tag = "4")]
    pub bytes_read_rate: f32,
    #[prost(float, tag = "5")]
    pub bytes_written_rate: f32,
    #[prost(uint64, tag = "6")]
    pub rpcs_executed: u64,
    #[prost(float, tag = "7")]
    pub rpc_rate: f32,
    #[prost(bool, tag = "8")]
    pub one_rpc_per_update: bool,
    #[prost(uint32, tag = "9")]
    pub max_time_per_update: u32,
    #[prost(bool, tag = "10")]
    pub adaptive_rate_control: bool,
    #[prost(bool, tag = "11")]
    pub blocking_recv: bool,
    #[prost(uint32, tag = "12")]
    pub recv_timeout: u32,
    #[prost(float, tag = "13")]
    pub time_per_rpc_update: f32,
    #[prost(float, tag = "14")]
    pub poll_time_per_rpc_update: f32,
    #[prost(float, tag = "15")]
    pub exec_time_per_rpc_update: f32,
    #[prost(uint32, tag = "16")]
    pub stream_rpcs: u32,
    #[prost(uint64, tag = "17")]
    pub stream_rpcs_executed: u64,
    #[prost(float, tag = "18")]
    pub stream_rpc_rate: f32,
    #[prost(float, tag = "19")]
    pub time_per_stream_update: f32,
}
