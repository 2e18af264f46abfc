//! Device aggregator: merges service records discovered across several
//! mDNS service types into unified [`DeviceConfig`]s, keyed by a stable
//! identifier.

use std::collections::HashMap;

use crate::types::{DeviceConfig, ServiceRecord};

/// Group service records into device configs.
///
/// Two records belong to the same device if either holds:
/// 1. their identifiers overlap after lowercasing, or
/// 2. they share a host address and one record's properties name the
///    other's identifier.
///
/// The returned map is keyed by the lexicographically smallest identifier
/// in each device's `all_identifiers` set, giving a stable, deterministic
/// key independent of record arrival order.
#[must_use]
pub fn aggregate(records: Vec<ServiceRecord>) -> HashMap<String, DeviceConfig> {
    let mut configs: Vec<DeviceConfig> = Vec::new();

    'records: for record in records {
        for config in &mut configs {
            if belongs_to(config, &record) {
                config.merge(record);
                continue 'records;
            }
        }
        configs.push(DeviceConfig::from_record(record));
    }

    configs
        .into_iter()
        .filter_map(|config| {
            let key = config.all_identifiers.iter().min().cloned()?;
            Some((key, config))
        })
        .collect()
}

fn belongs_to(config: &DeviceConfig, record: &ServiceRecord) -> bool {
    let record_id = record.identifier.to_lowercase();
    if !record_id.is_empty() && config.all_identifiers.contains(&record_id) {
        return true;
    }

    config.services.iter().any(|existing| {
        existing.address == record.address
            && (existing
                .properties
                .values()
                .any(|v| !record_id.is_empty() && v.eq_ignore_ascii_case(&record_id))
                || (!existing.identifier.is_empty()
                    && record
                        .properties
                        .values()
                        .any(|v| v.eq_ignore_ascii_case(&existing.identifier))))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProtocolKind;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn same_identifier_across_service_types_merges_into_one_device() {
        let mrp = ServiceRecord::new(ProtocolKind::Mrp, addr(5), 49152, "AABBCC", HashMap::new());
        let dmap = ServiceRecord::new(ProtocolKind::Dmap, addr(5), 3689, "aabbcc", HashMap::new());

        let devices = aggregate(vec![mrp, dmap]);
        assert_eq!(devices.len(), 1);
        let device = devices.values().next().unwrap();
        assert_eq!(device.services.len(), 2);
        assert_eq!(device.all_identifiers.len(), 1);
    }

    #[test]
    fn distinct_identifiers_on_different_hosts_stay_separate() {
        let a = ServiceRecord::new(ProtocolKind::Mrp, addr(5), 49152, "AAAAAA", HashMap::new());
        let b = ServiceRecord::new(ProtocolKind::Mrp, addr(6), 49152, "BBBBBB", HashMap::new());

        let devices = aggregate(vec![a, b]);
        assert_eq!(devices.len(), 2);
    }

    #[test]
    fn same_host_cross_referencing_properties_merges() {
        let mut dmap_props = HashMap::new();
        dmap_props.insert("mrpid".to_string(), "mrp-identifier".to_string());

        let dmap = ServiceRecord::new(ProtocolKind::Dmap, addr(7), 3689, "dmap-identifier", dmap_props);
        let mrp = ServiceRecord::new(ProtocolKind::Mrp, addr(7), 49152, "mrp-identifier", HashMap::new());

        let devices = aggregate(vec![dmap, mrp]);
        assert_eq!(devices.len(), 1);
        let device = devices.values().next().unwrap();
        assert_eq!(device.all_identifiers.len(), 2);
    }

    #[test]
    fn no_records_is_empty() {
        assert!(aggregate(Vec::new()).is_empty());
    }
}
