//! Stored pairing credentials, wire-formatted as a colon-separated hex string.

use std::fmt;

use crate::error::AtvError;

/// Long-term pairing credentials produced by a successful MRP pair-setup.
///
/// Serializes to and parses from exactly four colon-separated lowercase-hex
/// fields: `ltpk:ltsk:atv_id:client_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Device's long-term Ed25519 public key.
    pub ltpk: [u8; 32],
    /// Our long-term Ed25519 signing seed.
    pub ltsk: [u8; 32],
    /// Device identifier, as returned during pair-setup.
    pub atv_id: Vec<u8>,
    /// Our pairing identifier (the `pairing_id` generated at pair-setup time).
    pub client_id: Vec<u8>,
}

impl Credentials {
    /// Parse the four-field colon-separated hex representation.
    ///
    /// # Errors
    /// Returns [`AtvError::InvalidCredentials`] unless the string splits into
    /// exactly four fields and the key fields decode to 32 bytes each.
    pub fn parse(detail: &str) -> Result<Self, AtvError> {
        let parts: Vec<&str> = detail.split(':').collect();
        if parts.len() != 4 {
            return Err(AtvError::InvalidCredentials(format!(
                "expected 4 colon-separated fields, got {}",
                parts.len()
            )));
        }
        let ltpk = decode_fixed(parts[0])?;
        let ltsk = decode_fixed(parts[1])?;
        let atv_id = decode_hex(parts[2])?;
        let client_id = decode_hex(parts[3])?;
        Ok(Self {
            ltpk,
            ltsk,
            atv_id,
            client_id,
        })
    }
}

fn decode_hex(field: &str) -> Result<Vec<u8>, AtvError> {
    hex::decode(field).map_err(|e| AtvError::InvalidCredentials(e.to_string()))
}

fn decode_fixed(field: &str) -> Result<[u8; 32], AtvError> {
    let bytes = decode_hex(field)?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| AtvError::InvalidCredentials(format!("expected 32 bytes, got {}", bytes.len())))
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            hex::encode(self.ltpk),
            hex::encode(self.ltsk),
            hex::encode(&self.atv_id),
            hex::encode(&self.client_id)
        )
    }
}

/// A login identifier accepted by the DAAP requester: either a `0x`-prefixed
/// 16 hex digit pairing-guid, or a dash-separated `hsgid` UUID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginId {
    /// `0x` + 16 hex digits, the pairing-guid form used after MRP pairing.
    PairingGuid(String),
    /// Bare UUID form (`hsgid`), used by legacy un-paired DAAP logins.
    HomeSharingId(String),
}

impl LoginId {
    /// Classify a raw login-id string, rejecting anything matching neither
    /// accepted form.
    ///
    /// # Errors
    /// Returns [`AtvError::InvalidCredentials`] if `raw` matches neither the
    /// pairing-guid nor hsgid shape.
    pub fn parse(raw: &str) -> Result<Self, AtvError> {
        if let Some(digits) = raw.strip_prefix("0x") {
            if digits.len() == 16 && digits.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Ok(Self::PairingGuid(raw.to_string()));
            }
        }
        if is_hsgid(raw) {
            return Ok(Self::HomeSharingId(raw.to_string()));
        }
        Err(AtvError::InvalidCredentials(format!(
            "login id matches neither pairing-guid nor hsgid form: {raw}"
        )))
    }

    /// The literal string as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::PairingGuid(s) | Self::HomeSharingId(s) => s.as_str(),
        }
    }
}

fn is_hsgid(raw: &str) -> bool {
    let segments: Vec<&str> = raw.split('-').collect();
    let expected = [8, 4, 4, 4, 12];
    if segments.len() != expected.len() {
        return false;
    }
    segments
        .iter()
        .zip(expected)
        .all(|(seg, len)| seg.len() == len && seg.bytes().all(|b| b.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        let creds = Credentials {
            ltpk: [1u8; 32],
            ltsk: [2u8; 32],
            atv_id: vec![0xaa, 0xbb],
            client_id: vec![0xcc, 0xdd, 0xee],
        };
        let rendered = creds.to_string();
        let parsed = Credentials::parse(&rendered).unwrap();
        assert_eq!(creds, parsed);
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(Credentials::parse("aa:bb:cc").is_err());
        assert!(Credentials::parse("aa:bb:cc:dd:ee").is_err());
    }

    #[test]
    fn login_id_accepts_pairing_guid() {
        let id = LoginId::parse("0x1234567890abcdef").unwrap();
        assert_eq!(id, LoginId::PairingGuid("0x1234567890abcdef".to_string()));
    }

    #[test]
    fn login_id_accepts_hsgid() {
        let id = LoginId::parse("12345678-1234-1234-1234-123456789012").unwrap();
        assert!(matches!(id, LoginId::HomeSharingId(_)));
    }

    #[test]
    fn login_id_rejects_garbage() {
        assert!(LoginId::parse("not-a-valid-id").is_err());
        assert!(LoginId::parse("0xnothex_______").is_err());
    }
}
