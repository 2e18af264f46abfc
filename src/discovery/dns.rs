//! Minimal DNS-SD message codec used by the unicast scanner.
//!
//! Only the subset needed to issue a `PTR` query and walk `PTR`/`SRV`/`TXT`/
//! `A` answers is implemented; this is not a general-purpose DNS library
//! (explicitly out of scope).

use std::net::Ipv4Addr;

const TYPE_A: u16 = 1;
const TYPE_PTR: u16 = 12;
const TYPE_TXT: u16 = 16;
const TYPE_SRV: u16 = 33;
const CLASS_IN: u16 = 1;

/// Build a standard DNS query packet asking for the `PTR` records of
/// `service_type` (e.g. `_mediaremotetv._tcp.local.`).
#[must_use]
pub fn build_ptr_query(transaction_id: u16, service_type: &str) -> Vec<u8> {
    let mut packet = Vec::with_capacity(64);
    packet.extend_from_slice(&transaction_id.to_be_bytes());
    packet.extend_from_slice(&0u16.to_be_bytes()); // flags: standard query
    packet.extend_from_slice(&1u16.to_be_bytes()); // qdcount
    packet.extend_from_slice(&[0, 0, 0, 0, 0, 0]); // an/ns/arcount

    encode_name(&mut packet, service_type);
    packet.extend_from_slice(&TYPE_PTR.to_be_bytes());
    packet.extend_from_slice(&CLASS_IN.to_be_bytes());

    packet
}

fn encode_name(out: &mut Vec<u8>, name: &str) {
    for label in name.trim_end_matches('.').split('.') {
        #[allow(clippy::cast_possible_truncation)]
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0);
}

/// One decoded resource record relevant to discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// `PTR` record: service type -> instance name.
    Ptr { instance_name: String },
    /// `SRV` record: instance name -> (port, target host).
    Srv { port: u16, target: String },
    /// `TXT` record: instance name -> raw `key=value` strings.
    Txt { entries: Vec<String> },
    /// `A` record: host name -> IPv4 address.
    A { address: Ipv4Addr },
}

/// Parse all answer/additional records out of a DNS response packet.
///
/// Unsupported record types are skipped. Malformed records are dropped
/// rather than aborting the whole parse, since a single bad record
/// shouldn't blind the scanner to the rest of a response.
#[must_use]
pub fn parse_records(data: &[u8]) -> Vec<Record> {
    let Some(header) = data.get(..12) else {
        return Vec::new();
    };
    let answer_count = u16::from_be_bytes([header[6], header[7]]) as usize;
    let authority_count = u16::from_be_bytes([header[8], header[9]]) as usize;
    let additional_count = u16::from_be_bytes([header[10], header[11]]) as usize;
    let question_count = u16::from_be_bytes([header[4], header[5]]) as usize;

    let mut pos = 12;
    for _ in 0..question_count {
        let Some(next) = skip_name(data, pos) else {
            return Vec::new();
        };
        pos = next + 4; // qtype + qclass
    }

    let mut records = Vec::new();
    let total_records = answer_count + authority_count + additional_count;
    for _ in 0..total_records {
        match parse_record(data, pos) {
            Some((record, next)) => {
                if let Some(record) = record {
                    records.push(record);
                }
                pos = next;
            }
            None => break,
        }
    }
    records
}

fn parse_record(data: &[u8], pos: usize) -> Option<(Option<Record>, usize)> {
    let (_name, pos) = decode_name(data, pos)?;
    let rtype = u16::from_be_bytes([*data.get(pos)?, *data.get(pos + 1)?]);
    let rdlength = u16::from_be_bytes([*data.get(pos + 8)?, *data.get(pos + 9)?]) as usize;
    let rdata_start = pos + 10;
    let rdata_end = rdata_start.checked_add(rdlength)?;
    let rdata = data.get(rdata_start..rdata_end)?;

    let record = match rtype {
        TYPE_PTR => decode_name(data, rdata_start)
            .map(|(name, _)| Record::Ptr { instance_name: name }),
        TYPE_SRV if rdata.len() >= 6 => {
            let port = u16::from_be_bytes([rdata[4], rdata[5]]);
            decode_name(data, rdata_start + 6).map(|(target, _)| Record::Srv { port, target })
        }
        TYPE_TXT => Some(Record::Txt { entries: decode_txt(rdata) }),
        TYPE_A if rdata.len() == 4 => {
            Some(Record::A { address: Ipv4Addr::new(rdata[0], rdata[1], rdata[2], rdata[3]) })
        }
        _ => None,
    };

    Some((record, rdata_end))
}

fn decode_txt(rdata: &[u8]) -> Vec<String> {
    let mut entries = Vec::new();
    let mut pos = 0;
    while pos < rdata.len() {
        let len = rdata[pos] as usize;
        pos += 1;
        let Some(chunk) = rdata.get(pos..pos + len) else {
            break;
        };
        if !chunk.is_empty() {
            entries.push(String::from_utf8_lossy(chunk).to_string());
        }
        pos += len;
    }
    entries
}

/// Decode a (possibly compressed) DNS name starting at `pos`, returning the
/// dotted name and the offset immediately after the name's encoding in the
/// original buffer (not following any compression pointer).
fn decode_name(data: &[u8], pos: usize) -> Option<(String, usize)> {
    let mut labels = Vec::new();
    let mut cursor = pos;
    let mut end_of_name = None;
    let mut hops = 0;

    loop {
        hops += 1;
        if hops > 128 {
            return None; // guard against pointer loops
        }
        let len = *data.get(cursor)?;
        if len == 0 {
            if end_of_name.is_none() {
                end_of_name = Some(cursor + 1);
            }
            break;
        }
        if len & 0xC0 == 0xC0 {
            let lo = *data.get(cursor + 1)?;
            let pointer = (((len & 0x3F) as usize) << 8) | lo as usize;
            if end_of_name.is_none() {
                end_of_name = Some(cursor + 2);
            }
            cursor = pointer;
            continue;
        }
        let len = len as usize;
        let label = data.get(cursor + 1..cursor + 1 + len)?;
        labels.push(String::from_utf8_lossy(label).to_string());
        cursor += 1 + len;
    }

    Some((labels.join("."), end_of_name?))
}

fn skip_name(data: &[u8], pos: usize) -> Option<usize> {
    decode_name(data, pos).map(|(_, next)| next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ptr_query_ends_with_question_type_and_class() {
        let packet = build_ptr_query(0x1234, "_raop._tcp.local.");
        assert_eq!(&packet[0..2], &[0x12, 0x34]);
        let tail = &packet[packet.len() - 4..];
        assert_eq!(tail, &[0, TYPE_PTR as u8, 0, CLASS_IN as u8]);
    }

    #[test]
    fn decode_name_follows_compression_pointer() {
        // "local." stored once at offset 12, then a name at offset 20 that
        // points back to it after one literal label.
        let mut data = vec![0u8; 12];
        data.extend_from_slice(b"\x05local\x00"); // offset 12: "local."
        data.extend_from_slice(b"\x04_tcp"); // offset 20: label "_tcp"
        data.push(0xC0);
        data.push(12); // pointer back to offset 12

        let (name, _) = decode_name(&data, 20).unwrap();
        assert_eq!(name, "_tcp.local");
    }

    #[test]
    fn parse_records_handles_truncated_header() {
        assert_eq!(parse_records(&[1, 2, 3]), Vec::new());
    }

    #[test]
    fn decode_txt_splits_length_prefixed_entries() {
        let rdata = b"\x0ddeviceid=1234\x06flags=1";
        let entries = decode_txt(rdata);
        assert_eq!(entries, vec!["deviceid=1234".to_string(), "flags=1".to_string()]);
    }
}
