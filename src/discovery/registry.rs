//! The service-type registration table: each protocol contributes a
//! service-type string and an identifier extractor, and the scanner builds
//! one [`ServiceRecord`](crate::types::ServiceRecord) per resolved
//! advertisement, dispatched to the matching [`ProtocolKind`].
//!
//! Alongside that scan-time table, [`protocol_ops`] is the connect-time
//! counterpart: a `ProtocolImpl`-equivalent table (grounded on
//! `pyatv/__init__.py`'s `ProtocolImpl` NamedTuple and `_PROTOCOLS` dict)
//! binding each [`ProtocolKind`] to its `setup`/`pair`/`device_info`
//! operations.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use reqwest::Client;

use crate::error::AtvError;
use crate::facade::{Capability, SetupData};
use crate::protocol::daap::DaapRequester;
use crate::protocol::pairing::{PairSetup, PairingError, PairingHandler};
use crate::types::{Credentials, LoginId, ProtocolKind, ServiceRecord};

use super::parser::{identifier_from_properties, parse_raop_service_name};

/// One entry in the service-type dispatch table.
#[derive(Clone, Copy)]
pub struct ServiceTypeEntry {
    /// mDNS service type, e.g. `_mediaremotetv._tcp.local.`.
    pub service_type: &'static str,
    /// Protocol this service type belongs to.
    pub protocol: ProtocolKind,
    /// Extract a [`ServiceRecord`] from a resolved instance name, address,
    /// port, and parsed TXT properties. Returns `None` if the
    /// advertisement doesn't carry enough information to identify a device
    /// (e.g. a malformed RAOP instance name).
    pub extract: fn(&str, IpAddr, u16, HashMap<String, String>) -> Option<ServiceRecord>,
}

fn extract_mrp(name: &str, address: IpAddr, port: u16, properties: HashMap<String, String>) -> Option<ServiceRecord> {
    let identifier = identifier_from_properties(&properties).unwrap_or_else(|| name.to_string());
    Some(ServiceRecord::new(ProtocolKind::Mrp, address, port, identifier, properties))
}

fn extract_companion(
    name: &str,
    address: IpAddr,
    port: u16,
    properties: HashMap<String, String>,
) -> Option<ServiceRecord> {
    let identifier = identifier_from_properties(&properties).unwrap_or_else(|| name.to_string());
    Some(ServiceRecord::new(ProtocolKind::Companion, address, port, identifier, properties))
}

fn extract_dmap(name: &str, address: IpAddr, port: u16, properties: HashMap<String, String>) -> Option<ServiceRecord> {
    let identifier = identifier_from_properties(&properties).unwrap_or_else(|| name.to_string());
    Some(ServiceRecord::new(ProtocolKind::Dmap, address, port, identifier, properties))
}

fn extract_airplay(
    name: &str,
    address: IpAddr,
    port: u16,
    properties: HashMap<String, String>,
) -> Option<ServiceRecord> {
    let identifier = identifier_from_properties(&properties).unwrap_or_else(|| name.to_string());
    Some(ServiceRecord::new(ProtocolKind::AirPlay, address, port, identifier, properties))
}

fn extract_raop(name: &str, address: IpAddr, port: u16, mut properties: HashMap<String, String>) -> Option<ServiceRecord> {
    let (mac, device_name) = parse_raop_service_name(name)?;
    properties.entry("name".to_string()).or_insert(device_name);
    Some(ServiceRecord::new(ProtocolKind::Raop, address, port, mac, properties))
}

/// The default service-type registrations for every protocol this crate
/// knows how to aggregate.
#[must_use]
pub fn default_registrations() -> Vec<ServiceTypeEntry> {
    vec![
        ServiceTypeEntry {
            service_type: "_mediaremotetv._tcp.local.",
            protocol: ProtocolKind::Mrp,
            extract: extract_mrp,
        },
        ServiceTypeEntry {
            service_type: "_companion-link._tcp.local.",
            protocol: ProtocolKind::Companion,
            extract: extract_companion,
        },
        ServiceTypeEntry {
            service_type: "_touch-able._tcp.local.",
            protocol: ProtocolKind::Dmap,
            extract: extract_dmap,
        },
        ServiceTypeEntry {
            service_type: "_appletv-v2._tcp.local.",
            protocol: ProtocolKind::Dmap,
            extract: extract_dmap,
        },
        ServiceTypeEntry {
            service_type: "_airplay._tcp.local.",
            protocol: ProtocolKind::AirPlay,
            extract: extract_airplay,
        },
        ServiceTypeEntry {
            service_type: "_raop._tcp.local.",
            protocol: ProtocolKind::Raop,
            extract: extract_raop,
        },
    ]
}

/// Registrations filtered to the given protocols, or every registration
/// when `protocol` is `None`. Used by both the multicast and unicast
/// scanners to honor `scan`'s `protocol` filter.
#[must_use]
pub fn registrations_for(protocol: Option<&[ProtocolKind]>) -> Vec<ServiceTypeEntry> {
    let all = default_registrations();
    match protocol {
        Some(kinds) => all.into_iter().filter(|entry| kinds.contains(&entry.protocol)).collect(),
        None => all,
    }
}

/// One protocol's connect-time operations: building its [`SetupData`]
/// contribution to a [`DeviceFacade`](crate::facade::DeviceFacade), starting
/// a pairing attempt, and normalizing TXT properties into display device
/// info.
pub struct ProtocolOps {
    /// Protocol these operations apply to.
    pub protocol: ProtocolKind,
    /// Build this protocol's [`SetupData`] from a resolved service record.
    pub setup: fn(&ServiceRecord) -> Result<SetupData, AtvError>,
    /// Start a pairing attempt against this service.
    pub pair: fn(&ServiceRecord) -> Result<PairingHandler, AtvError>,
    /// Normalize this service's TXT properties into a display device-info
    /// map (recognized keys: `model`, `osvers`, `name`, `osname`).
    pub device_info: fn(&ServiceRecord) -> HashMap<String, String>,
}

/// Look up the connect-time operations table entry for a protocol.
///
/// Only MRP and DMAP have real protocol engines in this crate (pair/verify
/// and the DAAP requester, respectively); Companion, `AirPlay`, and RAOP
/// have no control-channel implementation here (discovery metadata only,
/// per the Non-goal excluding wire-level streaming/control handlers), so
/// their `setup` is a no-op and their `pair` always reports
/// [`PairingError::NotSupported`].
#[must_use]
pub fn protocol_ops(protocol: ProtocolKind) -> ProtocolOps {
    match protocol {
        ProtocolKind::Mrp => ProtocolOps {
            protocol,
            setup: setup_mrp,
            pair: pair_mrp,
            device_info: device_info_from_properties,
        },
        ProtocolKind::Dmap => ProtocolOps {
            protocol,
            setup: setup_dmap,
            pair: pair_unsupported,
            device_info: device_info_from_properties,
        },
        ProtocolKind::Companion | ProtocolKind::AirPlay | ProtocolKind::Raop => ProtocolOps {
            protocol,
            setup: setup_unimplemented,
            pair: pair_unsupported,
            device_info: device_info_from_properties,
        },
    }
}

const DEVICE_INFO_KEYS: &[&str] = &["model", "osvers", "name", "osname"];

fn device_info_from_properties(record: &ServiceRecord) -> HashMap<String, String> {
    DEVICE_INFO_KEYS
        .iter()
        .filter_map(|key| record.property(key).map(|value| ((*key).to_string(), value.to_string())))
        .collect()
}

fn pair_unsupported(_record: &ServiceRecord) -> Result<PairingHandler, AtvError> {
    Err(AtvError::Pairing(PairingError::NotSupported))
}

fn pair_mrp(_record: &ServiceRecord) -> Result<PairingHandler, AtvError> {
    Ok(PairingHandler::Mrp(PairSetup::new()))
}

/// MRP's facade contribution. The pair-verify handshake and the MRP command
/// channel itself run over a live socket, which this crate doesn't open (no
/// MRP transport layer is implemented here, matching the Non-goal excluding
/// wire-level protocol handlers) — `connect`/`close` only validate that
/// stored credentials parse; they do not perform the handshake.
fn setup_mrp(record: &ServiceRecord) -> Result<SetupData, AtvError> {
    let detail = record
        .credentials
        .as_deref()
        .ok_or_else(|| AtvError::InvalidCredentials("no stored MRP credentials".to_string()))?;
    Credentials::parse(detail)?;

    Ok(SetupData::new(
        ProtocolKind::Mrp,
        vec![Capability::RemoteControl, Capability::Power, Capability::PushUpdates],
        || Box::pin(async { Ok(()) }),
        || Box::pin(async { Ok(()) }),
    ))
}

/// DMAP's facade contribution: a real DAAP login over HTTP, providing
/// now-playing metadata.
fn setup_dmap(record: &ServiceRecord) -> Result<SetupData, AtvError> {
    let detail = record
        .credentials
        .as_deref()
        .ok_or_else(|| AtvError::InvalidCredentials("no stored DAAP login id".to_string()))?;
    let login_id = LoginId::parse(detail)?;

    let base_url = format!("http://{}:{}", record.address, record.port);
    let requester = Arc::new(DaapRequester::new(Client::new(), base_url, login_id));
    let connect_requester = Arc::clone(&requester);

    Ok(SetupData::new(
        ProtocolKind::Dmap,
        vec![Capability::Metadata],
        move || Box::pin(async move { connect_requester.login().await.map(|_| ()).map_err(AtvError::from) }),
        || Box::pin(async { Ok(()) }),
    ))
}

/// Companion/`AirPlay`/RAOP have no control-channel implementation in this
/// crate — their facade contribution is an always-succeeding no-op with no
/// capabilities, so `connect(config)` doesn't fail outright just because one
/// of these services is present alongside a supported protocol.
fn setup_unimplemented(record: &ServiceRecord) -> Result<SetupData, AtvError> {
    Ok(SetupData::new(
        record.protocol,
        Vec::new(),
        || Box::pin(async { Ok(()) }),
        || Box::pin(async { Ok(()) }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn registers_all_five_protocol_service_types() {
        let regs = default_registrations();
        assert_eq!(regs.len(), 6);
        assert!(regs.iter().any(|r| r.protocol == ProtocolKind::Mrp));
        assert!(regs.iter().any(|r| r.protocol == ProtocolKind::Companion));
        assert!(regs.iter().any(|r| r.protocol == ProtocolKind::Dmap));
        assert!(regs.iter().any(|r| r.protocol == ProtocolKind::AirPlay));
        assert!(regs.iter().any(|r| r.protocol == ProtocolKind::Raop));
    }

    #[test]
    fn raop_extractor_uses_mac_as_identifier() {
        let entry = default_registrations()
            .into_iter()
            .find(|e| e.protocol == ProtocolKind::Raop)
            .unwrap();
        let record = (entry.extract)(
            "0050C212A23F@Living Room",
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            7000,
            HashMap::new(),
        )
        .unwrap();
        assert_eq!(record.identifier, "0050C212A23F");
    }

    #[test]
    fn mrp_extractor_falls_back_to_instance_name() {
        let entry = default_registrations()
            .into_iter()
            .find(|e| e.protocol == ProtocolKind::Mrp)
            .unwrap();
        let record = (entry.extract)(
            "Living Room._mediaremotetv._tcp.local.",
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            49152,
            HashMap::new(),
        )
        .unwrap();
        assert_eq!(record.identifier, "Living Room._mediaremotetv._tcp.local.");
    }

    fn mrp_record(credentials: Option<&str>) -> ServiceRecord {
        let mut record = ServiceRecord::new(ProtocolKind::Mrp, IpAddr::V4(Ipv4Addr::LOCALHOST), 49152, "id", HashMap::new());
        if let Some(detail) = credentials {
            record = record.with_credentials(detail);
        }
        record
    }

    #[test]
    fn registrations_for_filters_by_protocol() {
        let filtered = registrations_for(Some(&[ProtocolKind::Mrp]));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].protocol, ProtocolKind::Mrp);
        assert_eq!(registrations_for(None).len(), default_registrations().len());
    }

    #[test]
    fn mrp_setup_requires_stored_credentials() {
        let ops = protocol_ops(ProtocolKind::Mrp);
        let err = (ops.setup)(&mrp_record(None)).unwrap_err();
        assert!(matches!(err, AtvError::InvalidCredentials(_)));
    }

    #[test]
    fn mrp_setup_succeeds_with_valid_credentials() {
        let creds = Credentials {
            ltpk: [1u8; 32],
            ltsk: [2u8; 32],
            atv_id: vec![0xaa],
            client_id: vec![0xbb],
        };
        let ops = protocol_ops(ProtocolKind::Mrp);
        let setup = (ops.setup)(&mrp_record(Some(&creds.to_string()))).unwrap();
        assert_eq!(setup.protocol, ProtocolKind::Mrp);
        assert_eq!(setup.capabilities.len(), 3);
    }

    #[test]
    fn mrp_pair_returns_a_real_handler_other_protocols_do_not() {
        assert!(matches!(
            (protocol_ops(ProtocolKind::Mrp).pair)(&mrp_record(None)),
            Ok(PairingHandler::Mrp(_))
        ));
        let err = (protocol_ops(ProtocolKind::AirPlay).pair)(&mrp_record(None)).unwrap_err();
        assert!(matches!(err, AtvError::Pairing(PairingError::NotSupported)));
    }

    #[test]
    fn device_info_extracts_only_recognized_keys() {
        let mut props = HashMap::new();
        props.insert("model".to_string(), "AppleTV6,2".to_string());
        props.insert("unrelated".to_string(), "ignored".to_string());
        let record = ServiceRecord::new(ProtocolKind::Dmap, IpAddr::V4(Ipv4Addr::LOCALHOST), 3689, "id", props);
        let info = device_info_from_properties(&record);
        assert_eq!(info.get("model"), Some(&"AppleTV6,2".to_string()));
        assert!(!info.contains_key("unrelated"));
    }
}
