//! Symmetric sealing for stage payloads.

use aead::consts::U12;
use aead::{Aead, AeadCore, KeyInit, Nonce};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm};
use rand::rngs::OsRng;
use rand_core::RngCore;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::hashes::sha256;

pub const AES_GCM_NONCE_LEN: usize = 12;

type Aes192Gcm = AesGcm<Aes192, U12>;

/// Authenticated encryption under a caller-supplied key.
///
/// The handshake treats plaintexts as opaque and never reuses a key across
/// stages, so implementations only need to be IND-CCA secure per call.
pub trait SymmetricCipher: Send + Sync {
    fn seal(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    fn open(&self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// AES-GCM with a random 12-byte nonce prepended to each ciphertext.
///
/// Keys of 16, 24 or 32 bytes select AES-128, AES-192 or AES-256 directly;
/// any other length is hashed with SHA-256 and used as an AES-256 key.
#[derive(Clone, Copy, Debug, Default)]
pub struct AesGcmCipher;

impl AesGcmCipher {
    pub fn new() -> Self {
        Self
    }
}

fn seal_with<C>(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    C: KeyInit + Aead + AeadCore<NonceSize = U12>,
{
    let cipher = C::new_from_slice(key).map_err(|_| CryptoError::EncryptionFailed)?;
    let mut nonce = [0u8; AES_GCM_NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    let sealed = cipher
        .encrypt(Nonce::<C>::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;
    let mut out = Vec::with_capacity(AES_GCM_NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

fn open_with<C>(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    C: KeyInit + Aead + AeadCore<NonceSize = U12>,
{
    let cipher = C::new_from_slice(key).map_err(|_| CryptoError::DecryptionFailed)?;
    let (nonce, body) = ciphertext.split_at(AES_GCM_NONCE_LEN);
    cipher
        .decrypt(Nonce::<C>::from_slice(nonce), body)
        .map_err(|_| CryptoError::DecryptionFailed)
}

impl SymmetricCipher for AesGcmCipher {
    fn seal(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match key.len() {
            16 => seal_with::<Aes128Gcm>(key, plaintext),
            24 => seal_with::<Aes192Gcm>(key, plaintext),
            32 => seal_with::<Aes256Gcm>(key, plaintext),
            _ => {
                let normalized = Zeroizing::new(sha256(key));
                seal_with::<Aes256Gcm>(&normalized[..], plaintext)
            }
        }
    }

    fn open(&self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < AES_GCM_NONCE_LEN {
            return Err(CryptoError::InvalidCiphertext);
        }
        match key.len() {
            16 => open_with::<Aes128Gcm>(key, ciphertext),
            24 => open_with::<Aes192Gcm>(key, ciphertext),
            32 => open_with::<Aes256Gcm>(key, ciphertext),
            _ => {
                let normalized = Zeroizing::new(sha256(key));
                open_with::<Aes256Gcm>(&normalized[..], ciphertext)
            }
        }
    }
}
