//! DMAP (Digital Media Access Protocol) binary tree codec.
//!
//! Wire framing is a 4-byte ASCII tag followed by a 4-byte big-endian
//! length, recursively: a tag is either a container (its payload is itself
//! a sequence of tag records) or a leaf (its payload is a typed value -
//! signed/unsigned integer of width 1/2/4/8, a UTF-8 string, a date encoded
//! as seconds-since-epoch in a `u32`, or raw bytes for anything unknown).

mod encoder;
mod tags;

pub use encoder::{DmapEncoder, DmapTag};
pub use tags::DmapType;

use std::collections::HashMap;

/// DMAP decode errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DmapError {
    /// A 4-byte tag contained non-ASCII bytes.
    #[error("tag is not valid ASCII: {0:?}")]
    InvalidTag([u8; 4]),

    /// The buffer ended before a tag's declared length could be read.
    #[error("unexpected end of data while reading tag {0:?}")]
    UnexpectedEnd(String),

    /// A leaf value's byte width didn't match any recognized integer size.
    #[error("invalid integer width {0} for tag {1:?}")]
    InvalidIntWidth(usize, String),

    /// A string leaf's bytes were not valid UTF-8.
    #[error("invalid UTF-8 in string tag {0:?}")]
    InvalidString(String),
}

/// One decoded DMAP node: either a typed leaf value or a nested container.
#[derive(Debug, Clone, PartialEq)]
pub enum DmapNode {
    /// Signed integer leaf (1/2/4/8-byte wire width, widened to `i64`).
    Int(i64),
    /// Unsigned integer leaf (1/2/4/8-byte wire width, widened to `u64`).
    UInt(u64),
    /// UTF-8 string leaf.
    String(String),
    /// Date leaf: seconds since the Unix epoch.
    Date(u32),
    /// Raw bytes, used for any tag whose type is unknown or declared `Raw`.
    Raw(Vec<u8>),
    /// Nested container: an ordered list of (tag, node) pairs. Order is
    /// preserved and duplicate tags are kept as separate entries, matching
    /// how DMAP listings repeat `mlit` for each row.
    Container(Vec<(String, DmapNode)>),
}

impl DmapNode {
    /// View this node as a string, if it is a string leaf.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// View this node as a signed integer, widening unsigned/date leaves.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::UInt(n) => i64::try_from(*n).ok(),
            Self::Date(n) => Some(i64::from(*n)),
            _ => None,
        }
    }

    /// View this node as a container's children.
    #[must_use]
    pub fn children(&self) -> Option<&[(String, DmapNode)]> {
        match self {
            Self::Container(items) => Some(items),
            _ => None,
        }
    }

    /// Find the first direct child with the given tag.
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&DmapNode> {
        self.children()?
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, node)| node)
    }

    /// Walk a path of tags through nested containers, returning the first
    /// match at the end of the path (mirrors `pyatv`'s `parser.first`).
    #[must_use]
    pub fn first(&self, path: &[&str]) -> Option<&DmapNode> {
        let mut current = self;
        for tag in path {
            current = current.get(tag)?;
        }
        Some(current)
    }

    /// Pretty-print the tree for debug logging, one line per node, child
    /// tags indented two spaces per nesting level.
    #[must_use]
    pub fn pprint(&self) -> String {
        let mut out = String::new();
        self.pprint_into(&mut out, 0);
        out
    }

    fn pprint_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        match self {
            Self::Container(items) => {
                for (tag, node) in items {
                    match node {
                        Self::Container(_) => {
                            out.push_str(&format!("{indent}{tag}:\n"));
                            node.pprint_into(out, depth + 1);
                        }
                        other => {
                            out.push_str(&format!("{indent}{tag}: {other:?}\n"));
                        }
                    }
                }
            }
            other => out.push_str(&format!("{indent}{other:?}\n")),
        }
    }
}

/// Decode a DMAP byte stream into a synthetic top-level container of all
/// records found at depth 0.
///
/// # Errors
///
/// Returns [`DmapError`] if a tag isn't ASCII, a declared length runs past
/// the end of the buffer, or a leaf's bytes don't match its declared type.
pub fn decode(data: &[u8]) -> Result<DmapNode, DmapError> {
    let items = decode_records(data)?;
    Ok(DmapNode::Container(items))
}

fn decode_records(data: &[u8]) -> Result<Vec<(String, DmapNode)>, DmapError> {
    let mut items = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        if pos + 8 > data.len() {
            return Err(DmapError::UnexpectedEnd("<truncated header>".to_string()));
        }

        let tag_bytes: [u8; 4] = data[pos..pos + 4].try_into().unwrap();
        let tag = std::str::from_utf8(&tag_bytes)
            .map_err(|_| DmapError::InvalidTag(tag_bytes))?
            .to_string();
        let len = u32::from_be_bytes(data[pos + 4..pos + 8].try_into().unwrap()) as usize;
        pos += 8;

        if pos + len > data.len() {
            return Err(DmapError::UnexpectedEnd(tag));
        }
        let payload = &data[pos..pos + len];
        pos += len;

        let node = decode_leaf_or_container(&tag, payload)?;
        items.push((tag, node));
    }

    Ok(items)
}

fn decode_leaf_or_container(tag: &str, payload: &[u8]) -> Result<DmapNode, DmapError> {
    match tags::type_of(tag) {
        DmapType::Container => {
            // A container whose payload doesn't itself parse as nested
            // records (e.g. zero-length) decodes to an empty container.
            let items = decode_records(payload)?;
            Ok(DmapNode::Container(items))
        }
        DmapType::Int => decode_int(tag, payload).map(DmapNode::Int),
        DmapType::UInt => decode_uint(tag, payload).map(DmapNode::UInt),
        DmapType::String => std::str::from_utf8(payload)
            .map(|s| DmapNode::String(s.to_string()))
            .map_err(|_| DmapError::InvalidString(tag.to_string())),
        DmapType::Date => {
            let bytes: [u8; 4] = payload
                .try_into()
                .map_err(|_| DmapError::InvalidIntWidth(payload.len(), tag.to_string()))?;
            Ok(DmapNode::Date(u32::from_be_bytes(bytes)))
        }
        DmapType::Raw => {
            tracing::debug!(tag, len = payload.len(), "unknown DMAP tag, preserving as raw bytes");
            Ok(DmapNode::Raw(payload.to_vec()))
        }
    }
}

fn decode_int(tag: &str, payload: &[u8]) -> Result<i64, DmapError> {
    match payload.len() {
        1 => Ok(i64::from(payload[0] as i8)),
        2 => Ok(i64::from(i16::from_be_bytes(payload.try_into().unwrap()))),
        4 => Ok(i64::from(i32::from_be_bytes(payload.try_into().unwrap()))),
        8 => Ok(i64::from_be_bytes(payload.try_into().unwrap())),
        n => Err(DmapError::InvalidIntWidth(n, tag.to_string())),
    }
}

fn decode_uint(tag: &str, payload: &[u8]) -> Result<u64, DmapError> {
    match payload.len() {
        1 => Ok(u64::from(payload[0])),
        2 => Ok(u64::from(u16::from_be_bytes(payload.try_into().unwrap()))),
        4 => Ok(u64::from(u32::from_be_bytes(payload.try_into().unwrap()))),
        8 => Ok(u64::from_be_bytes(payload.try_into().unwrap())),
        n => Err(DmapError::InvalidIntWidth(n, tag.to_string())),
    }
}

/// Flatten a decoded tree into a `tag -> display string` map, matching the
/// teacher's original debug-oriented flat decode. Kept for logging call
/// sites that only want a quick human-readable dump.
#[must_use]
pub fn flatten_to_strings(node: &DmapNode) -> HashMap<String, String> {
    let mut out = HashMap::new();
    if let Some(items) = node.children() {
        for (tag, child) in items {
            let rendered = match child {
                DmapNode::String(s) => s.clone(),
                DmapNode::Int(n) => n.to_string(),
                DmapNode::UInt(n) => n.to_string(),
                DmapNode::Date(n) => n.to_string(),
                DmapNode::Raw(bytes) => format!("{bytes:02x?}"),
                DmapNode::Container(_) => continue,
            };
            out.insert(tag.clone(), rendered);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_flat_string_and_int_leaves() {
        let mut encoder = DmapEncoder::new();
        encoder.string(DmapTag::ItemName, "Hello");
        encoder.int(DmapTag::SongTime, 12345);
        let bytes = encoder.finish();

        let tree = decode(&bytes).unwrap();
        assert_eq!(tree.get("minm").and_then(DmapNode::as_str), Some("Hello"));
        assert_eq!(tree.get("astm").and_then(DmapNode::as_i64), Some(12345));
    }

    #[test]
    fn decodes_nested_container_listing() {
        let mut inner = DmapEncoder::new();
        inner.string(DmapTag::ItemName, "Track One");
        let mut item = DmapEncoder::new();
        item.encode_tag(
            DmapTag::ListingItem,
            &crate::protocol::dmap::encoder::DmapValue::Raw(inner.finish()),
        );
        let mut listing = DmapEncoder::new();
        listing.encode_tag(
            DmapTag::Listing,
            &crate::protocol::dmap::encoder::DmapValue::Raw(item.finish()),
        );

        let tree = decode(&listing.finish()).unwrap();
        let title = tree.first(&["mlcl", "mlit", "minm"]).and_then(DmapNode::as_str);
        assert_eq!(title, Some("Track One"));
    }

    #[test]
    fn rejects_truncated_length_prefix() {
        let bytes = b"minm\x00\x00\x00\x10short";
        let err = decode(bytes).unwrap_err();
        assert!(matches!(err, DmapError::UnexpectedEnd(_)));
    }

    #[test]
    fn rejects_non_ascii_tag() {
        let mut bytes = vec![0xff, 0xfe, 0xfd, 0xfc];
        bytes.extend_from_slice(&0u32.to_be_bytes());
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, DmapError::InvalidTag(_)));
    }
}
