//! Pair-Verify - fast re-authentication using stored long-term keys
//!
//! Used after an initial Pair-Setup to establish a fresh session without
//! requiring PIN entry again.

use super::tlv::{TlvDecoder, TlvEncoder, TlvType, errors};
use super::{PairingError, PairingState, PairingStepResult, SessionKeys};
use crate::protocol::crypto::{
    ChaCha20Poly1305Cipher, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature, HkdfSha512, Nonce,
    X25519KeyPair, X25519PublicKey,
};

fn padded_nonce(tag: &[u8; 8]) -> Result<Nonce, PairingError> {
    let mut bytes = [0u8; 12];
    bytes[4..].copy_from_slice(tag);
    Ok(Nonce::from_bytes(&bytes)?)
}

/// Pair-Verify session
pub struct PairVerify {
    state: PairingState,
    /// Our long-term Ed25519 secret key bytes.
    our_secret_key: [u8; 32],
    /// Our pairing identifier, sent to the device in M3.
    our_identifier: Vec<u8>,
    /// The device identifier pinned at pair-setup time; M2's identifier must
    /// match this exactly.
    expected_device_identifier: Vec<u8>,
    /// Device's stored long-term public key.
    device_ltpk: Ed25519PublicKey,
    /// Ephemeral X25519 key pair for this session.
    ephemeral_keypair: X25519KeyPair,
    /// Device's ephemeral public key.
    device_ephemeral: Option<X25519PublicKey>,
    /// Shared secret from the ephemeral exchange.
    shared_secret: Option<[u8; 32]>,
    /// Session encryption key derived from the shared secret.
    session_key: Option<[u8; 32]>,
    /// Final session keys (stored after completion).
    final_session_keys: Option<SessionKeys>,
}

impl PairVerify {
    /// Create a new Pair-Verify session with stored long-term keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the device long-term public key is malformed.
    pub fn new(
        our_secret_key: [u8; 32],
        our_identifier: Vec<u8>,
        expected_device_identifier: Vec<u8>,
        device_ltpk: &[u8],
    ) -> Result<Self, PairingError> {
        let device_ltpk = Ed25519PublicKey::from_bytes(device_ltpk)?;
        let ephemeral_keypair = X25519KeyPair::generate();

        Ok(Self {
            state: PairingState::Init,
            our_secret_key,
            our_identifier,
            expected_device_identifier,
            device_ltpk,
            ephemeral_keypair,
            device_ephemeral: None,
            shared_secret: None,
            session_key: None,
            final_session_keys: None,
        })
    }

    /// Start verification - returns M1 message.
    ///
    /// # Errors
    ///
    /// Returns an error if state is invalid.
    pub fn start(&mut self) -> Result<Vec<u8>, PairingError> {
        if self.state != PairingState::Init {
            return Err(PairingError::InvalidState {
                expected: "Init".to_string(),
                actual: format!("{:?}", self.state),
            });
        }

        let m1 = TlvEncoder::new()
            .add_state(1)
            .add(
                TlvType::PublicKey,
                self.ephemeral_keypair.public_key().as_bytes(),
            )
            .build();

        self.state = PairingState::WaitingResponse;
        Ok(m1)
    }

    /// Process M2 and generate M3.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is malformed, the device's signature
    /// fails to verify, or the device reports an error.
    pub fn process_m2(&mut self, data: &[u8]) -> Result<PairingStepResult, PairingError> {
        let tlv = TlvDecoder::decode(data)?;

        if let Some(error) = tlv.get_error() {
            self.state = PairingState::Failed;
            return Err(PairingError::DeviceError { code: error });
        }

        let state = tlv.get_state()?;
        if state != 2 {
            return Err(PairingError::InvalidState {
                expected: "2".to_string(),
                actual: state.to_string(),
            });
        }

        let device_ephemeral_bytes = tlv.get_required(TlvType::PublicKey)?;
        let encrypted_data = tlv.get_required(TlvType::EncryptedData)?;

        let device_ephemeral = X25519PublicKey::from_bytes(device_ephemeral_bytes)?;
        let shared = self.ephemeral_keypair.diffie_hellman(&device_ephemeral);

        let hkdf = HkdfSha512::new(Some(b"Pair-Verify-Encrypt-Salt"), shared.as_bytes());
        let session_key = hkdf.expand_fixed::<32>(b"Pair-Verify-Encrypt-Info")?;

        let cipher = ChaCha20Poly1305Cipher::new(&session_key)?;
        let decrypted = cipher.decrypt(&padded_nonce(b"PV-Msg02")?, encrypted_data)?;

        let device_tlv = TlvDecoder::decode(&decrypted)?;
        let device_identifier = device_tlv.get_required(TlvType::Identifier)?;
        let device_signature = device_tlv.get_required(TlvType::Signature)?;

        if device_identifier != self.expected_device_identifier.as_slice() {
            return Err(PairingError::AuthenticationFailed(
                "device identifier does not match stored credentials".to_string(),
            ));
        }

        let mut verify_data = Vec::with_capacity(64 + device_identifier.len());
        verify_data.extend_from_slice(device_ephemeral_bytes);
        verify_data.extend_from_slice(device_identifier);
        verify_data.extend_from_slice(self.ephemeral_keypair.public_key().as_bytes());

        let signature = Ed25519Signature::from_bytes(device_signature)?;
        self.device_ltpk.verify(&verify_data, &signature)?;

        let mut sign_data = Vec::with_capacity(64 + self.our_identifier.len());
        sign_data.extend_from_slice(self.ephemeral_keypair.public_key().as_bytes());
        sign_data.extend_from_slice(&self.our_identifier);
        sign_data.extend_from_slice(device_ephemeral_bytes);

        let our_keypair = Ed25519KeyPair::from_bytes(&self.our_secret_key)?;
        let our_signature = our_keypair.sign(&sign_data);

        let inner_tlv = TlvEncoder::new()
            .add(TlvType::Identifier, &self.our_identifier)
            .add(TlvType::Signature, &our_signature.to_bytes())
            .build();

        let encrypted = cipher.encrypt(&padded_nonce(b"PV-Msg03")?, &inner_tlv)?;

        let m3 = TlvEncoder::new()
            .add_state(3)
            .add(TlvType::EncryptedData, &encrypted)
            .build();

        self.device_ephemeral = Some(device_ephemeral);
        self.shared_secret = Some(*shared.as_bytes());
        self.session_key = Some(session_key);
        self.state = PairingState::Verifying;

        Ok(PairingStepResult::SendData(m3))
    }

    /// Process M4 - completes verification, deriving the final MRP session
    /// keys under the `MediaRemote-Salt` domain-separation labels.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is malformed or the device reports an
    /// error.
    pub fn process_m4(&mut self, data: &[u8]) -> Result<PairingStepResult, PairingError> {
        let tlv = TlvDecoder::decode(data)?;

        if let Some(error) = tlv.get_error() {
            self.state = PairingState::Failed;
            if error == errors::AUTHENTICATION {
                return Err(PairingError::SignatureVerificationFailed);
            }
            return Err(PairingError::DeviceError { code: error });
        }

        let state = tlv.get_state()?;
        if state != 4 {
            return Err(PairingError::InvalidState {
                expected: "4".to_string(),
                actual: state.to_string(),
            });
        }

        let shared_secret = self.shared_secret.as_ref().ok_or(PairingError::InvalidState {
            expected: "shared_secret".to_string(),
            actual: "none".to_string(),
        })?;

        let hkdf = HkdfSha512::new(Some(b"MediaRemote-Salt"), shared_secret);
        let encrypt_key = hkdf.expand_fixed::<32>(b"MediaRemote-Write-Encryption-Key")?;
        let decrypt_key = hkdf.expand_fixed::<32>(b"MediaRemote-Read-Encryption-Key")?;

        let session_keys = SessionKeys {
            encrypt_key,
            decrypt_key,
            encrypt_nonce: 0,
            decrypt_nonce: 0,
        };

        self.final_session_keys = Some(session_keys.clone());
        self.state = PairingState::Complete;

        Ok(PairingStepResult::Complete(session_keys))
    }

    /// Drive the pairing state machine with received data.
    ///
    /// # Errors
    ///
    /// Returns an error if processing fails or the state transition is
    /// invalid for the data given.
    pub fn step(&mut self, data: Option<&[u8]>) -> Result<PairingStepResult, PairingError> {
        match self.state {
            PairingState::Init => {
                let m1 = self.start()?;
                Ok(PairingStepResult::SendData(m1))
            }
            PairingState::WaitingResponse => {
                let data = data.ok_or(PairingError::InvalidState {
                    expected: "data".to_string(),
                    actual: "none".to_string(),
                })?;
                self.process_m2(data)
            }
            PairingState::Verifying => {
                let data = data.ok_or(PairingError::InvalidState {
                    expected: "data".to_string(),
                    actual: "none".to_string(),
                })?;
                self.process_m4(data)
            }
            PairingState::Complete => Ok(PairingStepResult::Complete(
                self.final_session_keys
                    .clone()
                    .expect("Complete state always has final session keys"),
            )),
            PairingState::Failed => Err(PairingError::InvalidState {
                expected: "not failed".to_string(),
                actual: "Failed".to_string(),
            }),
            _ => Ok(PairingStepResult::NeedData),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_emits_state_one_with_ephemeral_key() {
        let device_keypair = Ed25519KeyPair::generate();
        let mut verify = PairVerify::new(
            [7u8; 32],
            b"client".to_vec(),
            b"device".to_vec(),
            device_keypair.public_key().as_bytes(),
        )
        .unwrap();
        let m1 = verify.start().unwrap();
        let tlv = TlvDecoder::decode(&m1).unwrap();
        assert_eq!(tlv.get_state().unwrap(), 1);
        assert!(tlv.get(TlvType::PublicKey).is_some());
    }

    #[test]
    fn start_twice_is_rejected() {
        let device_keypair = Ed25519KeyPair::generate();
        let mut verify = PairVerify::new(
            [7u8; 32],
            b"client".to_vec(),
            b"device".to_vec(),
            device_keypair.public_key().as_bytes(),
        )
        .unwrap();
        verify.start().unwrap();
        assert!(verify.start().is_err());
    }
}
