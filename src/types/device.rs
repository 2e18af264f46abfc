//! Service records and aggregated device configurations

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

/// The protocol a [`ServiceRecord`] was discovered under.
///
/// Ordering matches the facade's routing priority (highest first): MRP >
/// Companion > DMAP > AirPlay > RAOP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtocolKind {
    /// `MediaRemote` pairing/verify protocol.
    Mrp,
    /// Auxiliary paired-device protocol (app launch, HID input).
    Companion,
    /// Digital Media/Audio Access Protocol.
    Dmap,
    /// `AirPlay` mirroring/streaming control.
    AirPlay,
    /// Remote Audio Output Protocol (`AirPlay` 1 audio).
    Raop,
}

impl ProtocolKind {
    /// Facade routing priority: lower value wins when more than one
    /// protocol offers the same capability.
    #[must_use]
    pub fn priority(self) -> u8 {
        match self {
            Self::Mrp => 0,
            Self::Companion => 1,
            Self::Dmap => 2,
            Self::AirPlay => 3,
            Self::Raop => 4,
        }
    }
}

/// One discovered service for a device: protocol, address, and the raw TXT
/// properties the mDNS response carried.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRecord {
    /// Which protocol this record was discovered for.
    pub protocol: ProtocolKind,
    /// Resolved host address.
    pub address: IpAddr,
    /// Service port.
    pub port: u16,
    /// Stable per-protocol identifier (MAC-like or UUID-like). May be empty
    /// if the service did not advertise one.
    pub identifier: String,
    /// Case-insensitive TXT record properties (keys are lowercased).
    pub properties: HashMap<String, String>,
    /// Stored pairing credentials for this service (MRP's `Credentials`
    /// string, or DMAP's login-id), if any have been recorded for it. Not
    /// populated by discovery — set via [`Self::with_credentials`] once a
    /// pairing attempt has completed.
    pub credentials: Option<String>,
}

impl ServiceRecord {
    /// Create a new service record, lowercasing property keys as they are
    /// inserted (properties are defined case-insensitively, §3 of the spec).
    #[must_use]
    pub fn new(
        protocol: ProtocolKind,
        address: IpAddr,
        port: u16,
        identifier: impl Into<String>,
        properties: HashMap<String, String>,
    ) -> Self {
        let properties = properties
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Self {
            protocol,
            address,
            port,
            identifier: identifier.into(),
            properties,
            credentials: None,
        }
    }

    /// Attach stored pairing credentials, consumed by the protocol
    /// registry's `setup` operation when building a [`DeviceFacade`](crate::facade::DeviceFacade).
    #[must_use]
    pub fn with_credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    /// Look up a property, case-insensitively.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(&key.to_lowercase()).map(String::as_str)
    }
}

/// Aggregation of one or more service records for the same physical device.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceConfig {
    /// All service records contributed for this device.
    pub services: Vec<ServiceRecord>,
    /// Union of every record's non-empty identifier (lowercased).
    pub all_identifiers: HashSet<String>,
}

impl DeviceConfig {
    /// Build a config from a single service record.
    #[must_use]
    pub fn from_record(record: ServiceRecord) -> Self {
        let mut config = Self::default();
        config.merge(record);
        config
    }

    /// Merge another record into this device, recomputing `all_identifiers`.
    pub fn merge(&mut self, record: ServiceRecord) {
        if !record.identifier.is_empty() {
            self.all_identifiers.insert(record.identifier.to_lowercase());
        }
        self.services.push(record);
    }

    /// A device is ready iff it has at least one service record with a
    /// non-empty identifier.
    #[must_use]
    pub fn ready(&self) -> bool {
        self.services.iter().any(|s| !s.identifier.is_empty())
    }

    /// All service records for a given protocol kind.
    pub fn services_for(&self, protocol: ProtocolKind) -> impl Iterator<Item = &ServiceRecord> {
        self.services.iter().filter(move |s| s.protocol == protocol)
    }

    /// First service record for a given protocol kind, if any.
    #[must_use]
    pub fn service(&self, protocol: ProtocolKind) -> Option<&ServiceRecord> {
        self.services_for(protocol).next()
    }

    /// A representative host address for the device (address of the first
    /// service record).
    #[must_use]
    pub fn primary_address(&self) -> Option<IpAddr> {
        self.services.first().map(|s| s.address)
    }

    /// Whether this config passes the scan filter: ready, and (if an
    /// identifier filter is given) that identifier is present.
    #[must_use]
    pub fn matches_filter(&self, identifier: Option<&str>) -> bool {
        if !self.ready() {
            return false;
        }
        match identifier {
            Some(id) => self.all_identifiers.contains(&id.to_lowercase()),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))
    }

    #[test]
    fn ready_requires_nonempty_identifier() {
        let record = ServiceRecord::new(ProtocolKind::Dmap, addr(), 3689, "", HashMap::new());
        let config = DeviceConfig::from_record(record);
        assert!(!config.ready());
    }

    #[test]
    fn merge_unions_identifiers() {
        let a = ServiceRecord::new(ProtocolKind::Dmap, addr(), 3689, "AABBCC", HashMap::new());
        let b = ServiceRecord::new(ProtocolKind::Mrp, addr(), 49152, "DDEEFF", HashMap::new());
        let mut config = DeviceConfig::from_record(a);
        config.merge(b);
        assert_eq!(config.all_identifiers.len(), 2);
        assert!(config.all_identifiers.contains("aabbcc"));
        assert!(config.all_identifiers.contains("ddeeff"));
    }

    #[test]
    fn filter_checks_identifier_membership() {
        let record = ServiceRecord::new(ProtocolKind::Dmap, addr(), 3689, "AABBCC", HashMap::new());
        let config = DeviceConfig::from_record(record);
        assert!(config.matches_filter(Some("aabbcc")));
        assert!(config.matches_filter(Some("AABBCC")));
        assert!(!config.matches_filter(Some("000000")));
        assert!(config.matches_filter(None));
    }

    #[test]
    fn property_lookup_is_case_insensitive() {
        let mut props = HashMap::new();
        props.insert("DeviceID".to_string(), "AA:BB:CC".to_string());
        let record = ServiceRecord::new(ProtocolKind::AirPlay, addr(), 7000, "id", props);
        assert_eq!(record.property("deviceid"), Some("AA:BB:CC"));
        assert_eq!(record.property("DEVICEID"), Some("AA:BB:CC"));
    }
}
