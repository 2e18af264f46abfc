//! # atvproto
//!
//! A pure Rust client library for Apple TV discovery, pairing, and metadata
//! protocols: mDNS discovery across five service types, `MediaRemote`
//! pair-setup/pair-verify (HomeKit SRP + Ed25519 + `ChaCha20Poly1305`), and a
//! DAAP/DMAP metadata requester, composed behind a single capability-routed
//! device facade.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), atvproto::error::AtvError> {
//! let devices = atvproto::scan(Duration::from_secs(5), None, None, None).await?;
//! for config in &devices {
//!     println!("{:?}: {} services", config.all_identifiers, config.services.len());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Device aggregation: merges service records into unified device configs.
pub mod aggregator;
/// Device discovery (multicast mDNS and directed unicast).
pub mod discovery;
/// Top-level error type.
pub mod error;
/// Protocol-agnostic device facade.
pub mod facade;
/// Wire protocols: crypto primitives, pairing, DMAP, DAAP.
pub mod protocol;
/// Core data types: configuration, service records, credentials.
pub mod types;

use std::net::Ipv4Addr;
use std::time::Duration;

pub use error::AtvError;
pub use facade::DeviceFacade;
pub use protocol::pairing::PairingHandler;
pub use types::{AirPlayConfig, AirPlayConfigBuilder, Credentials, DeviceConfig, LoginId, ProtocolKind, ServiceRecord};

/// Scan the network for devices, returning every one found.
///
/// Builds a directed unicast scanner when `hosts` is given (for networks
/// that don't forward multicast traffic), otherwise a multicast scanner.
/// `identifier`, if given, lets a multicast scan return as soon as a
/// matching, `ready` device is seen. `protocol`, if given, restricts which
/// service types are registered to those protocols only.
///
/// # Errors
///
/// Returns [`AtvError::Discovery`] if the mDNS daemon cannot be created, or
/// [`AtvError::Io`] if a unicast query socket cannot be bound.
pub async fn scan(
    scan_timeout: Duration,
    identifier: Option<&str>,
    protocol: Option<&[ProtocolKind]>,
    hosts: Option<&[Ipv4Addr]>,
) -> Result<Vec<DeviceConfig>, AtvError> {
    let devices = discovery::scan(scan_timeout, identifier, protocol, hosts).await?;
    Ok(devices.into_values().collect())
}

/// Build and connect a [`DeviceFacade`] for `config`, driving each of its
/// services' `setup` operation (looked up via
/// [`discovery::protocol_ops`]) and then [`DeviceFacade::connect`].
///
/// # Errors
///
/// Returns [`AtvError::NoService`] if `config` has no services,
/// [`AtvError::DeviceIdMissing`] if none carry an identifier, or whatever
/// error the first failing service's `setup`/connect action returns.
pub async fn connect(config: &DeviceConfig) -> Result<DeviceFacade, AtvError> {
    if config.services.is_empty() {
        return Err(AtvError::NoService);
    }
    if !config.ready() {
        return Err(AtvError::DeviceIdMissing);
    }

    let mut entries = Vec::with_capacity(config.services.len());
    for service in &config.services {
        let ops = discovery::protocol_ops(service.protocol);
        entries.push((ops.setup)(service)?);
    }

    let mut facade = DeviceFacade::new(entries);
    facade.connect().await?;
    Ok(facade)
}

/// Start a pairing attempt against `config`'s service for `protocol`.
///
/// # Errors
///
/// Returns [`AtvError::NoService`] if `config` has no service for
/// `protocol`, or an error from that protocol's `pair` operation — every
/// protocol but MRP currently reports
/// [`PairingError::NotSupported`](crate::protocol::pairing::PairingError::NotSupported),
/// since this crate implements no other pairing state machine.
pub fn pair(config: &DeviceConfig, protocol: ProtocolKind) -> Result<PairingHandler, AtvError> {
    let service = config.service(protocol).ok_or(AtvError::NoService)?;
    (discovery::protocol_ops(protocol).pair)(service)
}
