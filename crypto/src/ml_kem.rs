//! ML-KEM (FIPS 203) adapters for the [`Kem`] capability.
//!
//! ML-KEM decapsulation never fails: a corrupted ciphertext yields a
//! pseudo-random key (implicit rejection). The handshake needs a corrupted
//! ciphertext to surface as an error, so every ciphertext produced here carries
//! a 32-byte confirmation tag
//!
//! ```text
//! tag = SHA3-256("TIMKE-ML-KEM-CONFIRM" || ek || ct || ss)
//! ```
//!
//! which decapsulation recomputes and compares in constant time.
//!
//! Key sizes (bytes):
//!
//! | Level        | Public key | Private key | Ciphertext (with tag) |
//! |--------------|-----------:|------------:|----------------------:|
//! | ML-KEM-512   |        800 |        1632 |                   800 |
//! | ML-KEM-768   |       1184 |        2400 |                  1120 |
//! | ML-KEM-1024  |       1568 |        3168 |                  1600 |

use core::marker::PhantomData;

use ::kem::{Decapsulate, Encapsulate};
use ::ml_kem::kem::{DecapsulationKey, EncapsulationKey};
use ::ml_kem::{EncodedSizeUser, KemCore};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::deterministic::DeterministicRng;
use crate::error::CryptoError;
use crate::hashes::sha3_256_parts;
use crate::keys::{PrivateKey, PublicKey};
use crate::traits::{check_parameters, Kem, KemParameters, SecureRng, SharedSecret};

pub const ML_KEM_SHARED_SECRET_LEN: usize = 32;
pub const ML_KEM_CONFIRM_TAG_LEN: usize = 32;

const CONFIRM_DOMAIN: &[u8] = b"TIMKE-ML-KEM-CONFIRM";
const KEYGEN_DOMAIN: &[u8] = b"TIMKE-ML-KEM-KEYGEN";
const ENCAPS_DOMAIN: &[u8] = b"TIMKE-ML-KEM-ENCAPS";

/// Raw ML-KEM operations for one parameter set.
///
/// All randomness comes from the supplied [`DeterministicRng`], so the same
/// RNG state always yields the same keys and ciphertexts.
pub trait MlKemLevel: Send + Sync + 'static {
    const NAME: &'static str;
    /// Module rank `k`; the encapsulation key sits at offset `384 * k` of the
    /// decapsulation key encoding.
    const RANK: usize;
    const EK_LEN: usize;
    const DK_LEN: usize;
    const CT_LEN: usize;

    fn generate(rng: &mut DeterministicRng) -> (Vec<u8>, Zeroizing<Vec<u8>>);

    fn encapsulate(
        ek: &[u8],
        rng: &mut DeterministicRng,
    ) -> Result<(Vec<u8>, Zeroizing<[u8; ML_KEM_SHARED_SECRET_LEN]>), CryptoError>;

    fn decapsulate(
        dk: &[u8],
        ct: &[u8],
    ) -> Result<Zeroizing<[u8; ML_KEM_SHARED_SECRET_LEN]>, CryptoError>;

    /// Slice the embedded encapsulation key out of a decapsulation key.
    fn ek_from_dk(dk: &[u8]) -> Result<&[u8], CryptoError> {
        if dk.len() != Self::DK_LEN {
            return Err(CryptoError::InvalidLength {
                expected: Self::DK_LEN,
                actual: dk.len(),
            });
        }
        let offset = 384 * Self::RANK;
        Ok(&dk[offset..offset + Self::EK_LEN])
    }
}

macro_rules! ml_kem_level {
    (
        $(#[$meta:meta])*
        $level:ident, $kem:ty, $params:ty, $name:literal,
        rank = $rank:literal, ek = $ek:literal, dk = $dk:literal, ct = $ct:literal
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $level;

        impl MlKemLevel for $level {
            const NAME: &'static str = $name;
            const RANK: usize = $rank;
            const EK_LEN: usize = $ek;
            const DK_LEN: usize = $dk;
            const CT_LEN: usize = $ct;

            fn generate(rng: &mut DeterministicRng) -> (Vec<u8>, Zeroizing<Vec<u8>>) {
                let (dk, ek) = <$kem>::generate(rng);
                let ek_bytes = ek.as_bytes()[..].to_vec();
                let dk_bytes = Zeroizing::new(dk.as_bytes()[..].to_vec());
                (ek_bytes, dk_bytes)
            }

            fn encapsulate(
                ek: &[u8],
                rng: &mut DeterministicRng,
            ) -> Result<(Vec<u8>, Zeroizing<[u8; ML_KEM_SHARED_SECRET_LEN]>), CryptoError> {
                let ek_bytes: [u8; $ek] =
                    ek.try_into().map_err(|_| CryptoError::InvalidLength {
                        expected: $ek,
                        actual: ek.len(),
                    })?;
                let encapsulation_key = EncapsulationKey::<$params>::from_bytes(&ek_bytes.into());
                let (ciphertext, shared) = encapsulation_key.encapsulate(rng).map_err(|e| {
                    CryptoError::EncapsulationFailed(format!("{}: {:?}", $name, e))
                })?;
                let mut secret = Zeroizing::new([0u8; ML_KEM_SHARED_SECRET_LEN]);
                secret.copy_from_slice(&shared[..]);
                Ok((ciphertext[..].to_vec(), secret))
            }

            fn decapsulate(
                dk: &[u8],
                ct: &[u8],
            ) -> Result<Zeroizing<[u8; ML_KEM_SHARED_SECRET_LEN]>, CryptoError> {
                let dk_bytes: Zeroizing<[u8; $dk]> =
                    Zeroizing::new(dk.try_into().map_err(|_| CryptoError::InvalidLength {
                        expected: $dk,
                        actual: dk.len(),
                    })?);
                let ct_bytes: [u8; $ct] =
                    ct.try_into().map_err(|_| CryptoError::DecapsulationFailed)?;
                let decapsulation_key =
                    DecapsulationKey::<$params>::from_bytes(&(*dk_bytes).into());
                let shared = decapsulation_key
                    .decapsulate(&ct_bytes.into())
                    .map_err(|_| CryptoError::DecapsulationFailed)?;
                let mut secret = Zeroizing::new([0u8; ML_KEM_SHARED_SECRET_LEN]);
                secret.copy_from_slice(&shared[..]);
                Ok(secret)
            }
        }
    };
}

ml_kem_level!(
    /// NIST security category 1.
    Level512, ::ml_kem::MlKem512, ::ml_kem::MlKem512Params, "ML-KEM-512",
    rank = 2, ek = 800, dk = 1632, ct = 768
);
ml_kem_level!(
    /// NIST security category 3.
    Level768, ::ml_kem::MlKem768, ::ml_kem::MlKem768Params, "ML-KEM-768",
    rank = 3, ek = 1184, dk = 2400, ct = 1088
);
ml_kem_level!(
    /// NIST security category 5.
    Level1024, ::ml_kem::MlKem1024, ::ml_kem::MlKem1024Params, "ML-KEM-1024",
    rank = 4, ek = 1568, dk = 3168, ct = 1568
);

/// ML-KEM with key confirmation, generic over the parameter set.
pub struct MlKem<L> {
    _level: PhantomData<fn() -> L>,
}

pub type MlKem512 = MlKem<Level512>;
pub type MlKem768 = MlKem<Level768>;
pub type MlKem1024 = MlKem<Level1024>;

impl<L: MlKemLevel> MlKem<L> {
    pub fn new() -> Self {
        Self {
            _level: PhantomData,
        }
    }

    fn confirm_tag(ek: &[u8], ct: &[u8], ss: &[u8]) -> [u8; ML_KEM_CONFIRM_TAG_LEN] {
        sha3_256_parts(&[CONFIRM_DOMAIN, ek, ct, ss])
    }

    fn public_from_bytes(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
        if bytes.len() != L::EK_LEN {
            return Err(CryptoError::InvalidKeyMaterial(format!(
                "{} public key must be {} bytes, got {}",
                L::NAME,
                L::EK_LEN,
                bytes.len()
            )));
        }
        Ok(PublicKey::new(L::NAME, bytes.to_vec()))
    }
}

impl<L: MlKemLevel> Default for MlKem<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: MlKemLevel> Kem for MlKem<L> {
    fn setup(&self) -> KemParameters {
        KemParameters {
            name: L::NAME.to_string(),
            shared_secret_len: ML_KEM_SHARED_SECRET_LEN,
            public_key_len: L::EK_LEN,
            private_key_len: L::DK_LEN,
            ciphertext_len: L::CT_LEN + ML_KEM_CONFIRM_TAG_LEN,
        }
    }

    fn generate_key_pair(
        &self,
        params: &KemParameters,
        rng: &mut dyn SecureRng,
    ) -> Result<(PublicKey, PrivateKey), CryptoError> {
        check_parameters(L::NAME, params)?;
        let mut drng = DeterministicRng::reseeded_from(KEYGEN_DOMAIN, rng);
        let (ek, dk) = L::generate(&mut drng);
        let public = PublicKey::new(L::NAME, ek);
        let private = PrivateKey::new(L::NAME, dk.to_vec(), public.clone());
        Ok((public, private))
    }

    fn encapsulate(
        &self,
        public_key: &PublicKey,
        rng: &mut dyn SecureRng,
    ) -> Result<(Vec<u8>, SharedSecret), CryptoError> {
        public_key.expect_algorithm(L::NAME)?;
        let ek = Self::public_from_bytes(public_key.as_bytes())?;
        let mut drng = DeterministicRng::reseeded_from(ENCAPS_DOMAIN, rng);
        let (mut ct, ss) = L::encapsulate(ek.as_bytes(), &mut drng)?;
        let tag = Self::confirm_tag(ek.as_bytes(), &ct, &ss[..]);
        ct.extend_from_slice(&tag);
        Ok((ct, Zeroizing::new(ss.to_vec())))
    }

    fn decapsulate(
        &self,
        private_key: &PrivateKey,
        ciphertext: &[u8],
    ) -> Result<SharedSecret, CryptoError> {
        private_key.expect_algorithm(L::NAME)?;
        let dk = private_key.as_bytes();
        if dk.len() != L::DK_LEN {
            return Err(CryptoError::InvalidKeyMaterial(format!(
                "{} private key must be {} bytes, got {}",
                L::NAME,
                L::DK_LEN,
                dk.len()
            )));
        }
        if ciphertext.len() != L::CT_LEN + ML_KEM_CONFIRM_TAG_LEN {
            return Err(CryptoError::DecapsulationFailed);
        }
        let (body, tag) = ciphertext.split_at(L::CT_LEN);
        let ss = L::decapsulate(dk, body)?;
        let ek = L::ek_from_dk(dk)?;
        let expected = Self::confirm_tag(ek, body, &ss[..]);
        if !bool::from(expected[..].ct_eq(tag)) {
            return Err(CryptoError::DecapsulationFailed);
        }
        Ok(Zeroizing::new(ss.to_vec()))
    }

    fn parse_public_key(&self, bytes: &[u8]) -> Result<PublicKey, CryptoError> {
        Self::public_from_bytes(bytes)
    }

    fn parse_private_key(&self, bytes: &[u8]) -> Result<PrivateKey, CryptoError> {
        if bytes.len() != L::DK_LEN {
            return Err(CryptoError::InvalidKeyMaterial(format!(
                "{} private key must be {} bytes, got {}",
                L::NAME,
                L::DK_LEN,
                bytes.len()
            )));
        }
        let public = Self::public_from_bytes(L::ek_from_dk(bytes)?)?;
        Ok(PrivateKey::new(L::NAME, bytes.to_vec(), public))
    }
}
