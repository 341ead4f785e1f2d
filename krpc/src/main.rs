//! # kRPC CLI Entry Point
//!
//! An offline companion to `krpc-core`. It never talks to a server:
//!
//! 1. **Initialization**: Parses command-line arguments using [`cli::Cli`] and installs
//!    the log subscriber (`RUST_LOG`, default `warn`).
//! 2. **Introspection**: Loads a serialized `KRPC.Services` listing when one is given,
//!    binding it through an offline `krpc_core` client.
//! 3. **Execution**: Encodes or decodes wire values, or describes the bound services.
//! 4. **Presentation**: Formats the result, or the error, for the terminal.

mod cli;
mod formatter;

use anyhow::{Context, anyhow};
use clap::Parser;
use cli::{Cli, Commands};
use formatter::{FormattedString, Guid, HexString, ServiceList};
use krpc_core::client::Client;
use krpc_core::codec;
use krpc_core::types::TypeRegistry;
use krpc_core::value;
use std::path::Path;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();

    let result = match args.command {
        Commands::Decode { ty, data, services } => decode(&ty, &data.0, services.as_deref()),
        Commands::Encode {
            ty,
            value,
            services,
        } => encode(&ty, &value, services.as_deref()),
        Commands::Describe { services, service } => describe(&services, service.as_deref()),
        Commands::Guid { data } => guid(&data.0),
    };

    match result {
        Ok(output) => println!("{output}"),
        Err(err) => {
            eprintln!("{}", FormattedString::from(err));
            process::exit(1);
        }
    }
}

fn decode(ty: &str, data: &[u8], services: Option<&Path>) -> anyhow::Result<FormattedString> {
    let registry = registry(services)?;
    let ty = registry
        .resolve(ty)
        .context("Failed to parse the type descriptor")?;

    let value = codec::decode(&registry, data, &ty)
        .with_context(|| format!("Failed to decode the payload as {ty}"))?;
    let json = value::to_json(&value).context("Failed to render the value as JSON")?;

    Ok(FormattedString::from(json))
}

fn encode(
    ty: &str,
    json: &serde_json::Value,
    services: Option<&Path>,
) -> anyhow::Result<FormattedString> {
    let registry = registry(services)?;
    let ty = registry
        .resolve(ty)
        .context("Failed to parse the type descriptor")?;

    let value = value::from_json(&registry, json, &ty)
        .with_context(|| format!("The JSON value does not fit {ty}"))?;
    let data = codec::encode(&value, &ty).with_context(|| format!("Failed to encode as {ty}"))?;

    Ok(FormattedString::from(HexString(data)))
}

fn describe(services: &Path, service: Option<&str>) -> anyhow::Result<FormattedString> {
    let client = load(services)?;

    match service {
        None => Ok(FormattedString::from(ServiceList(client.services().collect()))),
        Some(name) => client
            .service(name)
            .map(FormattedString::from)
            .ok_or_else(|| anyhow!("Service '{name}' is not in the listing")),
    }
}

fn guid(data: &[u8]) -> anyhow::Result<FormattedString> {
    let guid = codec::decode_guid(data).context("Failed to format the GUID")?;
    Ok(FormattedString::from(Guid(guid)))
}

/// The registry values are resolved against: the offline client's when a listing is
/// given, so that its enumerations are known, otherwise a fresh one.
fn registry(services: Option<&Path>) -> anyhow::Result<Arc<TypeRegistry>> {
    match services {
        Some(path) => Ok(load(path)?.registry().clone()),
        None => Ok(Arc::new(TypeRegistry::new())),
    }
}

fn load(path: &Path) -> anyhow::Result<Client> {
    let listing =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let client = Client::offline(&listing)
        .with_context(|| format!("{} is not a KRPC.Services message", path.display()))?;

    tracing::debug!(
        path = %path.display(),
        services = client.services().count(),
        "Loaded service listing"
    );

    Ok(client)
}
