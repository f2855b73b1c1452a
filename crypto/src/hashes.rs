use sha2::Sha256;
use sha3::digest::Digest;
use sha3::{Sha3_256, Sha3_512};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Domain tag prefixed to every H1 invocation.
pub const H1_DOMAIN: &[u8] = b"TIMKE-H1";
/// Domain tag prefixed to every H2 invocation.
pub const H2_DOMAIN: &[u8] = b"TIMKE-H2";

/// Output length of H1 and H2.
pub const DERIVED_KEY_LEN: usize = 64;

/// A 64-byte stage key, wiped on drop.
pub type DerivedKey = Zeroizing<[u8; DERIVED_KEY_LEN]>;

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn sha3_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA3-256 over the concatenation of `parts`.
pub fn sha3_256_parts(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

pub fn sha3_512(data: &[u8]) -> [u8; 64] {
    let mut out = [0u8; 64];
    out.copy_from_slice(&Sha3_512::digest(data));
    out
}

/// SHA3-512 over the concatenation of `parts`.
pub fn sha3_512_parts(parts: &[&[u8]]) -> Zeroizing<[u8; 64]> {
    let mut hasher = Sha3_512::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&hasher.finalize());
    out
}

fn derive(domain: &[u8], inputs: &[&[u8]]) -> Result<DerivedKey, CryptoError> {
    if inputs.iter().any(|input| input.is_empty()) {
        return Err(CryptoError::InvalidInput("key derivation input is empty"));
    }
    let mut hasher = Sha3_512::new();
    hasher.update(domain);
    for input in inputs {
        hasher.update(input);
    }
    let mut out = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
    out.copy_from_slice(&hasher.finalize());
    Ok(out)
}

/// Stage-1 key: `SHA3-512("TIMKE-H1" || server_pk || ciphertext1 || k1)`.
///
/// Inputs are concatenated without length framing, in exactly this order.
pub fn h1(server_pk: &[u8], ciphertext1: &[u8], k1: &[u8]) -> Result<DerivedKey, CryptoError> {
    derive(H1_DOMAIN, &[server_pk, ciphertext1, k1])
}

/// Stage-2 key:
/// `SHA3-512("TIMKE-H2" || server_pk || ephemeral_pk || ciphertext1 || ciphertext2 || k1 || k2)`.
pub fn h2(
    server_pk: &[u8],
    ephemeral_pk: &[u8],
    ciphertext1: &[u8],
    ciphertext2: &[u8],
    k1: &[u8],
    k2: &[u8],
) -> Result<DerivedKey, CryptoError> {
    derive(
        H2_DOMAIN,
        &[server_pk, ephemeral_pk, ciphertext1, ciphertext2, k1, k2],
    )
}
