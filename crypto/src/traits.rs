use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::keys::{PrivateKey, PublicKey};

/// Randomness source accepted by KEM operations.
pub trait SecureRng: RngCore + CryptoRng {}

impl<T: RngCore + CryptoRng + ?Sized> SecureRng for T {}

/// Shared secret produced by encapsulation, wiped on drop.
pub type SharedSecret = Zeroizing<Vec<u8>>;

/// Static description of a KEM algorithm.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KemParameters {
    pub name: String,
    pub shared_secret_len: usize,
    pub public_key_len: usize,
    pub private_key_len: usize,
    pub ciphertext_len: usize,
}

/// Operations every key encapsulation mechanism exposes to the handshake.
///
/// Implementations are used as trait objects and must be stateless beyond
/// their algorithm identity, so a single instance may serve many sessions.
pub trait Kem: Send + Sync {
    fn setup(&self) -> KemParameters;

    fn name(&self) -> String {
        self.setup().name
    }

    fn generate_key_pair(
        &self,
        params: &KemParameters,
        rng: &mut dyn SecureRng,
    ) -> Result<(PublicKey, PrivateKey), CryptoError>;

    fn encapsulate(
        &self,
        public_key: &PublicKey,
        rng: &mut dyn SecureRng,
    ) -> Result<(Vec<u8>, SharedSecret), CryptoError>;

    fn decapsulate(
        &self,
        private_key: &PrivateKey,
        ciphertext: &[u8],
    ) -> Result<SharedSecret, CryptoError>;

    fn parse_public_key(&self, bytes: &[u8]) -> Result<PublicKey, CryptoError>;

    fn parse_private_key(&self, bytes: &[u8]) -> Result<PrivateKey, CryptoError>;
}

/// Rejects parameter sets that were produced by a different algorithm.
pub(crate) fn check_parameters(expected: &str, params: &KemParameters) -> Result<(), CryptoError> {
    if params.name != expected {
        return Err(CryptoError::InvalidKeyMaterial(format!(
            "parameters for {} passed to {}",
            params.name, expected
        )));
    }
    Ok(())
}
