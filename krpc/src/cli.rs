//! # CLI
//!
//! This module defines the command-line interface of `krpc` using `clap`.
//!
//! It is responsible for parsing user input and validating what can be validated
//! without a service listing (hex payloads, JSON bodies).
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "krpc", version, about = "Offline kRPC inspection tool")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decode a wire value and print it as JSON
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// krpc decode 'List(sint32)' 0a01020a01040a0106
    /// krpc decode 'Enum(SpaceCenter.VesselSituation)' 06 --services services.bin
    /// ```
    Decode {
        /// Type descriptor (e.g. Dictionary(string,uint32))
        #[arg(value_name = "TYPE")]
        ty: String,
        /// Hex encoded payload, may be empty
        #[arg(value_parser = parse_hex, default_value = "")]
        data: Hex,
        /// Serialized KRPC.Services listing, needed to resolve enumerations
        #[arg(long)]
        services: Option<PathBuf>,
    },

    /// Encode a JSON value and print the wire bytes as hex
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// krpc encode 'Dictionary(string,uint32)' '{"foo": 42, "bar": 365}'
    /// ```
    Encode {
        /// Type descriptor (e.g. Tuple(double,bool))
        #[arg(value_name = "TYPE")]
        ty: String,
        /// JSON value
        #[arg(value_parser = parse_json)]
        value: serde_json::Value,
        /// Serialized KRPC.Services listing, needed to resolve enumerations
        #[arg(long)]
        services: Option<PathBuf>,
    },

    /// Describe the services of a serialized KRPC.Services listing
    Describe {
        /// Path to the listing (the return value of KRPC.GetServices)
        services: PathBuf,
        /// Print the bindings of one service instead of the service list
        service: Option<String>,
    },

    /// Format a 16 byte GUID in its canonical textual form
    Guid {
        /// Hex encoded GUID bytes
        #[arg(value_parser = parse_hex)]
        data: Hex,
    },
}

/// Bytes given on the command line as a hex string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hex(pub Vec<u8>);

fn parse_hex(value: &str) -> Result<Hex, String> {
    let value = value.trim();
    let value = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(value)
        .map(Hex)
        .map_err(|e| format!("Invalid hex: {e}"))
}

fn parse_json(value: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(value).map_err(|e| format!("Invalid JSON: {e}"))
}
