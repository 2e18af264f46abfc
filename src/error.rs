//! Top-level error type

use crate::protocol::crypto::CryptoError;
use crate::protocol::daap::DaapError;
use crate::protocol::dmap::DmapError;
use crate::protocol::pairing::{PairingError, TlvError};

/// Main error type for Apple TV protocol operations.
#[derive(Debug, thiserror::Error)]
pub enum AtvError {
    /// The device configuration has no service for the requested protocol.
    #[error("no service available for requested protocol")]
    NoService,

    /// The device configuration has services but no usable identifier.
    #[error("device configuration is missing an identifier")]
    DeviceIdMissing,

    /// A `Credentials` string was malformed, or a DAAP login-id matched
    /// neither the pairing-guid nor the hsgid form.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// SRP proof mismatch, Ed25519/signature verification failure, AEAD tag
    /// failure, or a DAAP re-login retry that was exhausted.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A DAAP `mediakind` value fell outside the fixed set of known kinds.
    #[error("unknown media kind: {0}")]
    UnknownMediaKind(i64),

    /// A DAAP `playstatus` value fell outside the fixed set of known states.
    #[error("unknown play state: {0}")]
    UnknownPlayState(i64),

    /// The facade has no protocol registered that provides the requested
    /// capability.
    #[error("capability not supported by any connected protocol: {0:?}")]
    NotSupported(crate::facade::Capability),

    /// Device discovery failed (mDNS daemon/socket error).
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// The discovery or connect operation was cancelled or timed out.
    #[error("operation cancelled or timed out")]
    Cancelled,

    /// A lower-level cryptographic primitive failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// TLV8 encode/decode error.
    #[error(transparent)]
    Tlv(#[from] TlvError),

    /// MRP pair-setup/pair-verify state machine error.
    #[error(transparent)]
    Pairing(#[from] PairingError),

    /// DMAP binary decode error.
    #[error(transparent)]
    Dmap(#[from] DmapError),

    /// DAAP session-level failure (login exhausted its retry, etc).
    #[error(transparent)]
    Daap(#[from] DaapError),

    /// Underlying HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error (sockets, storage).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AtvError>;
