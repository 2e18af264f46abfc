//! TXT record parsing shared across service-type handlers.

use std::collections::HashMap;

/// Parse `key=value` TXT record strings into a map.
#[must_use]
pub fn parse_txt_records(records: &[String]) -> HashMap<String, String> {
    records
        .iter()
        .filter_map(|record| {
            let mut parts = record.splitn(2, '=');
            let key = parts.next()?.to_string();
            let value = parts.next().unwrap_or("").to_string();
            Some((key, value))
        })
        .collect()
}

/// Extract a device identifier from TXT properties, trying the keys each
/// protocol's discovery advertisement is known to carry, in order.
#[must_use]
pub fn identifier_from_properties(properties: &HashMap<String, String>) -> Option<String> {
    const KEYS: &[&str] = &["deviceid", "pk", "uniqueidentifier", "hg"];
    KEYS.iter().find_map(|key| properties.get(*key).cloned())
}

/// RAOP service instance names encode the identifier as a MAC address:
/// `{MAC_ADDRESS}@{DEVICE_NAME}`, e.g. `0050C212A23F@Living Room`.
#[must_use]
pub fn parse_raop_service_name(name: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = name.splitn(2, '@').collect();
    if parts.len() != 2 {
        return None;
    }
    let mac = parts[0].to_uppercase();
    if mac.len() == 12 && mac.chars().all(|c| c.is_ascii_hexdigit()) {
        Some((mac, parts[1].to_string()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_txt_records() {
        let records = vec!["deviceid=AA:BB:CC".to_string(), "flags=0x4".to_string()];
        let parsed = parse_txt_records(&records);
        assert_eq!(parsed.get("deviceid"), Some(&"AA:BB:CC".to_string()));
        assert_eq!(parsed.get("flags"), Some(&"0x4".to_string()));
    }

    #[test]
    fn identifier_prefers_deviceid_over_pk() {
        let mut props = HashMap::new();
        props.insert("pk".to_string(), "fallback".to_string());
        props.insert("deviceid".to_string(), "primary".to_string());
        assert_eq!(identifier_from_properties(&props), Some("primary".to_string()));
    }

    #[test]
    fn raop_service_name_splits_mac_and_device_name() {
        let parsed = parse_raop_service_name("0050C212A23F@Living Room");
        assert_eq!(parsed, Some(("0050C212A23F".to_string(), "Living Room".to_string())));
    }

    #[test]
    fn raop_service_name_rejects_malformed_mac() {
        assert_eq!(parse_raop_service_name("not-a-mac@Room"), None);
    }
}
