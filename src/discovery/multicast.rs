//! Multicast mDNS scanning: join the multicast group, issue one `PTR`
//! browse per registered service type, and collect resolved records for
//! the scan's duration.
//!
//! Grounded on the teacher's `discovery::browser::DeviceBrowser`, which
//! already wrapped `mdns-sd` for a single hardcoded service type; this
//! generalizes it to the full [`registry::default_registrations`] table
//! and returns aggregated [`DeviceConfig`]s rather than a raw event stream.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::timeout;

use crate::aggregator;
use crate::error::AtvError;
use crate::types::{DeviceConfig, ProtocolKind, ServiceRecord};

use super::parser::parse_txt_records;
use super::registry::{self, ServiceTypeEntry};

/// Scan all registered mDNS service types for `timeout`, returning
/// aggregated device configs keyed by a stable identifier.
///
/// If `identifier` is given, the scan may return as soon as a matching,
/// `ready` device has a record for every registered service type observed
/// so far for that device — it does not wait out the full timeout once
/// satisfied. If `protocol` is given, only service types belonging to one
/// of those protocols are browsed.
///
/// # Errors
///
/// Returns [`AtvError::Discovery`] if the mDNS daemon cannot be created or
/// a browse call fails, or [`AtvError::Cancelled`] if the scan never
/// produces output before `timeout` (not itself an error condition for an
/// empty network, but surfaced when the daemon itself stalls).
pub async fn discover(
    scan_timeout: Duration,
    identifier: Option<&str>,
    protocol: Option<&[ProtocolKind]>,
) -> Result<HashMap<String, DeviceConfig>, AtvError> {
    let mdns = mdns_sd::ServiceDaemon::new()
        .map_err(|e| AtvError::Discovery(format!("failed to create mDNS daemon: {e}")))?;

    let registrations = registry::registrations_for(protocol);
    let mut receivers = Vec::with_capacity(registrations.len());
    for entry in registrations {
        let receiver = mdns
            .browse(entry.service_type)
            .map_err(|e| AtvError::Discovery(format!("failed to browse {}: {e}", entry.service_type)))?;
        receivers.push((entry, receiver));
    }

    let mut records: Vec<ServiceRecord> = Vec::new();
    let deadline = timeout(scan_timeout, async {
        loop {
            for (entry, receiver) in &receivers {
                while let Ok(event) = receiver.try_recv() {
                    if let Some(record) = resolve_event(entry, event) {
                        records.push(record);
                    }
                }
            }

            if let Some(id) = identifier {
                let aggregated = aggregator::aggregate(records.clone());
                if aggregated.values().any(|d| d.matches_filter(Some(id))) {
                    break;
                }
            }

            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;

    // A timeout here just means the scan ran its full course, or the
    // identifier was never seen; both end with whatever we've collected.
    let _ = deadline;

    for (entry, _) in &receivers {
        let _ = mdns.stop_browse(entry.service_type);
    }
    let _ = mdns.shutdown();

    Ok(aggregator::aggregate(records))
}

fn resolve_event(entry: &ServiceTypeEntry, event: mdns_sd::ServiceEvent) -> Option<ServiceRecord> {
    let mdns_sd::ServiceEvent::ServiceResolved(info) = event else {
        return None;
    };

    let name = info.get_fullname();
    let txt_strings: Vec<String> = info
        .get_properties()
        .iter()
        .map(|prop| format!("{}={}", prop.key(), prop.val_str()))
        .collect();
    let properties = parse_txt_records(&txt_strings);
    let address = info.get_addresses().iter().next().copied()?;

    (entry.extract)(name, address, info.get_port(), properties)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProtocolKind;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn registry_entries_cover_expected_protocols() {
        let regs = registry::default_registrations();
        let protocols: Vec<ProtocolKind> = regs.iter().map(|e| e.protocol).collect();
        assert!(protocols.contains(&ProtocolKind::Mrp));
        assert!(protocols.contains(&ProtocolKind::Raop));
    }

    #[test]
    fn resolve_event_ignores_removal_events() {
        let entry = registry::default_registrations()[0];
        let event = mdns_sd::ServiceEvent::ServiceRemoved(
            entry.service_type.to_string(),
            "gone._mediaremotetv._tcp.local.".to_string(),
        );
        assert!(resolve_event(&entry, event).is_none());
    }

    #[test]
    fn extract_fn_pointers_are_stable_across_calls() {
        // Regression guard: fn pointers stored in `ServiceTypeEntry` must be
        // Copy so the registry can be rebuilt per-scan without re-parsing.
        let regs1 = registry::default_registrations();
        let regs2 = registry::default_registrations();
        assert_eq!(regs1.len(), regs2.len());
        let addr = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let out1 = (regs1[0].extract)("x._mediaremotetv._tcp.local.", addr, 1, HashMap::new());
        let out2 = (regs2[0].extract)("x._mediaremotetv._tcp.local.", addr, 1, HashMap::new());
        assert_eq!(out1, out2);
    }
}
