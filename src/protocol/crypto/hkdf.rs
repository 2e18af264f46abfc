use super::CryptoError;
use hkdf::Hkdf;
use sha2::Sha512;

/// HKDF-SHA512 for key derivation
pub struct HkdfSha512 {
    hkdf: Hkdf<Sha512>,
}

impl HkdfSha512 {
    /// Create HKDF instance from input key material
    ///
    /// # Arguments
    /// * `salt` - Optional salt (can be None or empty)
    /// * `ikm` - Input key material
    pub fn new(salt: Option<&[u8]>, ikm: &[u8]) -> Self {
        let hkdf = Hkdf::<Sha512>::new(salt, ikm);
        Self { hkdf }
    }

    /// Expand to derive output key material
    ///
    /// # Arguments
    /// * `info` - Context/application-specific info
    /// * `length` - Desired output length
    pub fn expand(&self, info: &[u8], length: usize) -> Result<Vec<u8>, CryptoError> {
        let mut okm = vec![0u8; length];
        self.hkdf
            .expand(info, &mut okm)
            .map_err(|_| CryptoError::KeyDerivationFailed("HKDF expand failed".into()))?;
        Ok(okm)
    }

    /// Expand into fixed-size array
    pub fn expand_fixed<const N: usize>(&self, info: &[u8]) -> Result<[u8; N], CryptoError> {
        let mut okm = [0u8; N];
        self.hkdf
            .expand(info, &mut okm)
            .map_err(|_| CryptoError::KeyDerivationFailed("HKDF expand failed".into()))?;
        Ok(okm)
    }
}

/// Convenience function for one-shot key derivation
pub fn derive_key(
    salt: Option<&[u8]>,
    ikm: &[u8],
    info: &[u8],
    length: usize,
) -> Result<Vec<u8>, CryptoError> {
    HkdfSha512::new(salt, ikm).expand(info, length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_fixed_is_deterministic() {
        let hkdf = HkdfSha512::new(Some(b"some-salt"), b"shared-secret");
        let a: [u8; 32] = hkdf.expand_fixed(b"MediaRemote-Write-Encryption-Key").unwrap();
        let b: [u8; 32] = hkdf.expand_fixed(b"MediaRemote-Write-Encryption-Key").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_info_yields_different_keys() {
        let hkdf = HkdfSha512::new(Some(b"MediaRemote-Salt"), b"shared-secret");
        let write: [u8; 32] = hkdf.expand_fixed(b"MediaRemote-Write-Encryption-Key").unwrap();
        let read: [u8; 32] = hkdf.expand_fixed(b"MediaRemote-Read-Encryption-Key").unwrap();
        assert_ne!(write, read);
    }
}
