use std::fmt;

use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::hashes::sha3_256;

/// Public key tagged with the algorithm that produced it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    algorithm: String,
    bytes: Vec<u8>,
}

impl PublicKey {
    pub fn new(algorithm: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            algorithm: algorithm.into(),
            bytes,
        }
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    /// First eight bytes of SHA3-256 over the encoding, hex encoded.
    pub fn fingerprint(&self) -> String {
        hex::encode(&sha3_256(&self.bytes)[..8])
    }

    pub(crate) fn expect_algorithm(&self, algorithm: &str) -> Result<(), CryptoError> {
        expect_algorithm(&self.algorithm, algorithm)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("algorithm", &self.algorithm)
            .field("len", &self.bytes.len())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Private key with its matching public key. The secret encoding is wiped on drop.
#[derive(Clone)]
pub struct PrivateKey {
    algorithm: String,
    bytes: Zeroizing<Vec<u8>>,
    public: PublicKey,
}

impl PrivateKey {
    pub fn new(algorithm: impl Into<String>, bytes: Vec<u8>, public: PublicKey) -> Self {
        Self {
            algorithm: algorithm.into(),
            bytes: Zeroizing::new(bytes),
            public,
        }
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        self.bytes.clone()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub(crate) fn expect_algorithm(&self, algorithm: &str) -> Result<(), CryptoError> {
        expect_algorithm(&self.algorithm, algorithm)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("algorithm", &self.algorithm)
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

fn expect_algorithm(actual: &str, expected: &str) -> Result<(), CryptoError> {
    if actual != expected {
        return Err(CryptoError::InvalidKeyMaterial(format!(
            "{actual} key used with {expected}"
        )));
    }
    Ok(())
}
