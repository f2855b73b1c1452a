//! Post-handshake state shared by the client and server engines

use crypto::{DerivedKey, SymmetricCipher};
use zeroize::Zeroizing;

use crate::error::{HandshakeError, Result};
use crate::types::SessionState;

/// Record protection available once a session is established.
///
/// Both [`TimkeClient`](crate::TimkeClient) and [`TimkeServer`](crate::TimkeServer)
/// implement this, which lets [`SecureChannel`](crate::SecureChannel) carry either role.
pub trait SessionCipher: Send {
    fn state(&self) -> SessionState;

    /// Seal under K_main. Fails with `InvalidState` unless established.
    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Open under K_main. A failure moves the session to `Failed`.
    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Copy of K_main, or `None` before establishment.
    fn session_key(&self) -> Option<Zeroizing<Vec<u8>>>;
}

/// K_main, held only while established.
pub(crate) struct Established {
    k_main: DerivedKey,
}

impl Established {
    pub(crate) fn new(k_main: DerivedKey) -> Self {
        Self { k_main }
    }

    pub(crate) fn seal(
        &self,
        cipher: &dyn SymmetricCipher,
        plaintext: &[u8],
    ) -> std::result::Result<Vec<u8>, HandshakeError> {
        cipher
            .seal(&self.k_main[..], plaintext)
            .map_err(HandshakeError::SealFailed)
    }

    pub(crate) fn open(
        &self,
        cipher: &dyn SymmetricCipher,
        ciphertext: &[u8],
    ) -> std::result::Result<Vec<u8>, HandshakeError> {
        cipher
            .open(&self.k_main[..], ciphertext)
            .map_err(HandshakeError::UnsealFailed)
    }

    pub(crate) fn key_copy(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.k_main.to_vec())
    }
}

/// Open an optional stage payload; an empty field means no data was sent.
pub(crate) fn open_optional(
    cipher: &dyn SymmetricCipher,
    key: &[u8],
    sealed: &[u8],
) -> std::result::Result<Vec<u8>, HandshakeError> {
    if sealed.is_empty() {
        return Ok(Vec::new());
    }
    cipher.open(key, sealed).map_err(HandshakeError::UnsealFailed)
}

/// Seal an optional stage payload; `None` produces an empty field.
pub(crate) fn seal_optional(
    cipher: &dyn SymmetricCipher,
    key: &[u8],
    plaintext: Option<&[u8]>,
) -> std::result::Result<Vec<u8>, HandshakeError> {
    match plaintext {
        Some(data) => cipher.seal(key, data).map_err(HandshakeError::SealFailed),
        None => Ok(Vec::new()),
    }
}
