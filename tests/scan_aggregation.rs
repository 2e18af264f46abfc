//! Crate-level coverage for S6: two service records for the same host,
//! discovered under different mDNS service types, must aggregate into a
//! single device config whose `all_identifiers` unions both records'.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};

use atvproto::aggregator::aggregate;
use atvproto::types::{ProtocolKind, ServiceRecord};

#[test]
fn two_service_types_on_one_host_merge_into_one_device() {
    let host = IpAddr::V4(Ipv4Addr::new(10, 0, 1, 20));

    let mrp = ServiceRecord::new(ProtocolKind::Mrp, host, 49152, "AABBCCDDEEFF", HashMap::new());
    let dmap = ServiceRecord::new(ProtocolKind::Dmap, host, 3689, "aabbccddeeff", HashMap::new());

    let devices = aggregate(vec![mrp, dmap]);

    assert_eq!(devices.len(), 1);
    let device = devices.values().next().unwrap();
    assert_eq!(device.services.len(), 2);
    assert_eq!(device.all_identifiers.len(), 1);
    assert!(device.all_identifiers.contains("aabbccddeeff"));
}

#[test]
fn unrelated_hosts_never_merge() {
    let a = ServiceRecord::new(
        ProtocolKind::AirPlay,
        IpAddr::V4(Ipv4Addr::new(10, 0, 1, 21)),
        7000,
        "111111111111",
        HashMap::new(),
    );
    let b = ServiceRecord::new(
        ProtocolKind::Raop,
        IpAddr::V4(Ipv4Addr::new(10, 0, 1, 22)),
        7000,
        "222222222222",
        HashMap::new(),
    );

    let devices = aggregate(vec![a, b]);
    assert_eq!(devices.len(), 2);
}
