//! Device discovery: multicast mDNS browsing and directed unicast queries,
//! both converging on the same aggregated [`DeviceConfig`] map.

mod dns;
mod multicast;
mod parser;
mod registry;
mod unicast;

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::error::AtvError;
use crate::types::{DeviceConfig, ProtocolKind};

pub use registry::{ProtocolOps, ServiceTypeEntry, protocol_ops};

/// Scan the network for devices, for `scan_timeout`, returning every device
/// found, keyed by a stable identifier.
///
/// Builds a directed unicast scanner when `hosts` is given (for networks
/// that don't forward multicast traffic), otherwise a multicast scanner.
/// `identifier`, if given, lets a multicast scan return as soon as a
/// matching, `ready` device is seen rather than waiting out the full
/// timeout. `protocol`, if given, restricts the service types registered
/// to those protocols' only; every known protocol is scanned when omitted.
///
/// # Errors
///
/// See [`multicast::discover`] and [`unicast::discover`].
pub async fn scan(
    scan_timeout: Duration,
    identifier: Option<&str>,
    protocol: Option<&[ProtocolKind]>,
    hosts: Option<&[Ipv4Addr]>,
) -> Result<HashMap<String, DeviceConfig>, AtvError> {
    match hosts {
        Some(hosts) => unicast::discover(hosts, scan_timeout, protocol).await,
        None => multicast::discover(scan_timeout, identifier, protocol).await,
    }
}
