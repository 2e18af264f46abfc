//! Unicast mDNS scanning: send directed `PTR` queries to specific hosts
//! instead of relying on multicast discovery.
//!
//! Grounded on pyatv's `UnicastMdnsScanner` (`pyatv/support/mdns.py`), which
//! exists because some networks (VPNs, certain access points) don't forward
//! multicast traffic but will still answer a unicast query sent straight to
//! a known host's mDNS responder on port 5353.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::aggregator;
use crate::error::AtvError;
use crate::types::{DeviceConfig, ProtocolKind, ServiceRecord};

use super::dns::{self, Record};
use super::registry::{self, ServiceTypeEntry};

const MDNS_PORT: u16 = 5353;
const QUERY_BUFFER: usize = 4096;

/// Query each host in `hosts` directly for every registered service type,
/// returning aggregated device configs keyed by a stable identifier.
///
/// Unlike [`super::multicast::discover`], this never listens for
/// unsolicited advertisements — every record returned was a direct answer
/// to one of our queries. If `protocol` is given, only service types
/// belonging to one of those protocols are queried.
///
/// # Errors
///
/// Returns [`AtvError::Io`] if a socket cannot be bound.
pub async fn discover(
    hosts: &[Ipv4Addr],
    scan_timeout: Duration,
    protocol: Option<&[ProtocolKind]>,
) -> Result<HashMap<String, DeviceConfig>, AtvError> {
    let mut records = Vec::new();
    let registrations = registry::registrations_for(protocol);

    for &host in hosts {
        for entry in &registrations {
            match timeout(scan_timeout, query_host(host, entry)).await {
                Ok(Ok(mut found)) => records.append(&mut found),
                Ok(Err(_)) | Err(_) => continue,
            }
        }
    }

    Ok(aggregator::aggregate(records))
}

async fn query_host(host: Ipv4Addr, entry: &ServiceTypeEntry) -> Result<Vec<ServiceRecord>, AtvError> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    let transaction_id = u16::from(host.octets()[3]).wrapping_add(entry.service_type.len() as u16);
    let query = dns::build_ptr_query(transaction_id, entry.service_type);

    let destination = SocketAddr::new(IpAddr::V4(host), MDNS_PORT);
    socket.send_to(&query, destination).await?;

    let mut buf = vec![0u8; QUERY_BUFFER];
    let len = socket.recv(&mut buf).await?;
    let records = dns::parse_records(&buf[..len]);

    Ok(build_service_records(host, entry, &records))
}

fn build_service_records(host: Ipv4Addr, entry: &ServiceTypeEntry, records: &[Record]) -> Vec<ServiceRecord> {
    let instance_names: Vec<&str> = records
        .iter()
        .filter_map(|r| match r {
            Record::Ptr { instance_name } => Some(instance_name.as_str()),
            _ => None,
        })
        .collect();

    if instance_names.is_empty() {
        return Vec::new();
    }

    let port = records
        .iter()
        .find_map(|r| match r {
            Record::Srv { port, .. } => Some(*port),
            _ => None,
        })
        .unwrap_or(0);

    let txt_entries: Vec<String> = records
        .iter()
        .flat_map(|r| match r {
            Record::Txt { entries } => entries.clone(),
            _ => Vec::new(),
        })
        .collect();
    let properties = super::parser::parse_txt_records(&txt_entries);

    instance_names
        .into_iter()
        .filter_map(|name| (entry.extract)(name, IpAddr::V4(host), port, properties.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_service_records_is_empty_without_a_ptr_answer() {
        let entry = registry::default_registrations()
            .into_iter()
            .find(|e| e.protocol == crate::types::ProtocolKind::Mrp)
            .unwrap();
        let records = vec![Record::Txt { entries: vec!["deviceid=abc".to_string()] }];
        assert!(build_service_records(Ipv4Addr::LOCALHOST, &entry, &records).is_empty());
    }

    #[test]
    fn build_service_records_uses_srv_port_and_txt_properties() {
        let entry = registry::default_registrations()
            .into_iter()
            .find(|e| e.protocol == crate::types::ProtocolKind::Mrp)
            .unwrap();
        let records = vec![
            Record::Ptr { instance_name: "Living Room._mediaremotetv._tcp.local.".to_string() },
            Record::Srv { port: 49152, target: "host.local.".to_string() },
            Record::Txt { entries: vec!["deviceid=AA:BB:CC".to_string()] },
        ];
        let out = build_service_records(Ipv4Addr::new(10, 0, 0, 5), &entry, &records);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].port, 49152);
        assert_eq!(out[0].identifier, "AA:BB:CC");
    }

    #[test]
    fn build_service_records_rejects_raop_without_mac_prefixed_name() {
        let entry = registry::default_registrations()
            .into_iter()
            .find(|e| e.protocol == crate::types::ProtocolKind::Raop)
            .unwrap();
        let records = vec![Record::Ptr { instance_name: "not-a-mac@Room._raop._tcp.local.".to_string() }];
        assert!(build_service_records(Ipv4Addr::LOCALHOST, &entry, &records).is_empty());
    }
}
