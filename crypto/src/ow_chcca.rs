//! OW-ChCCA: a one-way checkable-CCA KEM from two ML-KEM instances.
//!
//! The public key carries two independent ML-KEM encapsulation keys; the
//! private key keeps the decapsulation key for only one of them (branch `b`).
//! Encapsulation commits to a fresh seed `s` under both keys using coins
//! derived from `s`:
//!
//! ```text
//! (ct_i, ss_i) = ML-KEM.Encaps(ek_i; coins(s, i, H(pk)))
//! pad_i        = s XOR SHA3-256("TIMKE-OWCHCCA-PAD" || i || ss_i || ct_i)
//! C            = ct_0 || pad_0 || ct_1 || pad_1
//! K            = SHA3-512("TIMKE-OWCHCCA-KEY" || s || H(pk) || C)[..KEY_LEN]
//! ```
//!
//! Decapsulation recovers `s` through branch `b`, re-runs the whole
//! encapsulation and accepts only if it reproduces `C` exactly.

use core::marker::PhantomData;

use rand_core::RngCore;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::deterministic::DeterministicRng;
use crate::error::CryptoError;
use crate::hashes::{sha3_256, sha3_256_parts, sha3_512_parts};
use crate::keys::{PrivateKey, PublicKey};
use crate::ml_kem::{Level1024, Level512, Level768, MlKemLevel};
use crate::traits::{check_parameters, Kem, KemParameters, SecureRng, SharedSecret};

const SEED_LEN: usize = 32;

const COINS_DOMAIN: &[u8] = b"TIMKE-OWCHCCA-COINS";
const PAD_DOMAIN: &[u8] = b"TIMKE-OWCHCCA-PAD";
const KEY_DOMAIN: &[u8] = b"TIMKE-OWCHCCA-KEY";
const KEYGEN_DOMAIN: &[u8] = b"TIMKE-OWCHCCA-KEYGEN";

pub trait OwChCcaLevel: Send + Sync + 'static {
    type Inner: MlKemLevel;
    const NAME: &'static str;
    /// Shared-key length in bytes, at most 64.
    const KEY_LEN: usize;
}

macro_rules! ow_chcca_level {
    ($level:ident, $inner:ty, $name:literal, $key_len:literal) => {
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $level;

        impl OwChCcaLevel for $level {
            type Inner = $inner;
            const NAME: &'static str = $name;
            const KEY_LEN: usize = $key_len;
        }
    };
}

ow_chcca_level!(Security16, Level512, "OWChCCA-16", 16);
ow_chcca_level!(Security32, Level768, "OWChCCA-32", 32);
ow_chcca_level!(Security64, Level1024, "OWChCCA-64", 64);

pub struct OwChCca<L> {
    _level: PhantomData<fn() -> L>,
}

pub type OwChCca16 = OwChCca<Security16>;
pub type OwChCca32 = OwChCca<Security32>;
pub type OwChCca64 = OwChCca<Security64>;

impl<L: OwChCcaLevel> OwChCca<L> {
    pub fn new() -> Self {
        Self {
            _level: PhantomData,
        }
    }

    fn public_key_len() -> usize {
        2 * L::Inner::EK_LEN
    }

    fn private_key_len() -> usize {
        1 + L::Inner::DK_LEN + Self::public_key_len()
    }

    fn branch_len() -> usize {
        L::Inner::CT_LEN + SEED_LEN
    }

    fn ciphertext_len() -> usize {
        2 * Self::branch_len()
    }

    fn public_from_bytes(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
        if bytes.len() != Self::public_key_len() {
            return Err(CryptoError::InvalidKeyMaterial(format!(
                "{} public key must be {} bytes, got {}",
                L::NAME,
                Self::public_key_len(),
                bytes.len()
            )));
        }
        Ok(PublicKey::new(L::NAME, bytes.to_vec()))
    }

    fn pad(branch: u8, ss: &[u8], ct: &[u8]) -> [u8; SEED_LEN] {
        sha3_256_parts(&[PAD_DOMAIN, &[branch], ss, ct])
    }

    /// Deterministic encapsulation of `seed` to both halves of `pk`.
    fn encapsulate_seed(pk: &[u8], seed: &[u8; SEED_LEN]) -> Result<Vec<u8>, CryptoError> {
        let pk_hash = sha3_256(pk);
        let (ek0, ek1) = pk.split_at(L::Inner::EK_LEN);
        let mut out = Vec::with_capacity(Self::ciphertext_len());
        for (branch, ek) in [(0u8, ek0), (1u8, ek1)] {
            let coins = Zeroizing::new([&seed[..], &[branch][..], &pk_hash[..]].concat());
            let mut rng = DeterministicRng::with_domain(COINS_DOMAIN, &coins);
            let (ct, ss) = L::Inner::encapsulate(ek, &mut rng)?;
            let mask = Self::pad(branch, &ss[..], &ct);
            out.extend_from_slice(&ct);
            out.extend(seed.iter().zip(mask.iter()).map(|(s, m)| s ^ m));
        }
        Ok(out)
    }

    fn shared_key(seed: &[u8], pk: &[u8], ciphertext: &[u8]) -> SharedSecret {
        let digest = sha3_512_parts(&[KEY_DOMAIN, seed, &sha3_256(pk), ciphertext]);
        Zeroizing::new(digest[..L::KEY_LEN].to_vec())
    }
}

impl<L: OwChCcaLevel> Default for OwChCca<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: OwChCcaLevel> Kem for OwChCca<L> {
    fn setup(&self) -> KemParameters {
        KemParameters {
            name: L::NAME.to_string(),
            shared_secret_len: L::KEY_LEN,
            public_key_len: Self::public_key_len(),
            private_key_len: Self::private_key_len(),
            ciphertext_len: Self::ciphertext_len(),
        }
    }

    fn generate_key_pair(
        &self,
        params: &KemParameters,
        rng: &mut dyn SecureRng,
    ) -> Result<(PublicKey, PrivateKey), CryptoError> {
        check_parameters(L::NAME, params)?;
        let mut drng = DeterministicRng::reseeded_from(KEYGEN_DOMAIN, rng);
        let (ek0, dk0) = L::Inner::generate(&mut drng);
        let (ek1, dk1) = L::Inner::generate(&mut drng);
        let branch = (drng.next_u32() & 1) as u8;
        let kept = if branch == 0 { dk0 } else { dk1 };

        let mut pk = Vec::with_capacity(Self::public_key_len());
        pk.extend_from_slice(&ek0);
        pk.extend_from_slice(&ek1);

        let mut sk = Zeroizing::new(Vec::with_capacity(Self::private_key_len()));
        sk.push(branch);
        sk.extend_from_slice(&kept);
        sk.extend_from_slice(&pk);

        let public = PublicKey::new(L::NAME, pk);
        let private = PrivateKey::new(L::NAME, sk.to_vec(), public.clone());
        Ok((public, private))
    }

    fn encapsulate(
        &self,
        public_key: &PublicKey,
        rng: &mut dyn SecureRng,
    ) -> Result<(Vec<u8>, SharedSecret), CryptoError> {
        public_key.expect_algorithm(L::NAME)?;
        let pk = Self::public_from_bytes(public_key.as_bytes())?;
        let mut seed = Zeroizing::new([0u8; SEED_LEN]);
        rng.fill_bytes(&mut seed[..]);
        let ciphertext = Self::encapsulate_seed(pk.as_bytes(), &seed)?;
        let key = Self::shared_key(&seed[..], pk.as_bytes(), &ciphertext);
        Ok((ciphertext, key))
    }

    fn decapsulate(
        &self,
        private_key: &PrivateKey,
        ciphertext: &[u8],
    ) -> Result<SharedSecret, CryptoError> {
        private_key.expect_algorithm(L::NAME)?;
        if ciphertext.len() != Self::ciphertext_len() {
            return Err(CryptoError::DecapsulationFailed);
        }
        let sk = private_key.as_bytes();
        if sk.len() != Self::private_key_len() {
            return Err(CryptoError::InvalidKeyMaterial(format!(
                "{} private key must be {} bytes",
                L::NAME,
                Self::private_key_len()
            )));
        }
        let branch = sk[0];
        if branch > 1 {
            return Err(CryptoError::InvalidKeyMaterial(format!(
                "{} private key has invalid branch selector",
                L::NAME
            )));
        }
        let dk = &sk[1..1 + L::Inner::DK_LEN];
        let pk = &sk[1 + L::Inner::DK_LEN..];

        let start = usize::from(branch) * Self::branch_len();
        let (ct, masked) =
            ciphertext[start..start + Self::branch_len()].split_at(L::Inner::CT_LEN);
        let ss = L::Inner::decapsulate(dk, ct)?;
        let mask = Self::pad(branch, &ss[..], ct);
        let mut seed = Zeroizing::new([0u8; SEED_LEN]);
        for (out, (m, k)) in seed.iter_mut().zip(masked.iter().zip(mask.iter())) {
            *out = m ^ k;
        }

        let expected = Self::encapsulate_seed(pk, &seed)?;
        if !bool::from(expected[..].ct_eq(ciphertext)) {
            return Err(CryptoError::DecapsulationFailed);
        }
        Ok(Self::shared_key(&seed[..], pk, ciphertext))
    }

    fn parse_public_key(&self, bytes: &[u8]) -> Result<PublicKey, CryptoError> {
        Self::public_from_bytes(bytes)
    }

    fn parse_private_key(&self, bytes: &[u8]) -> Result<PrivateKey, CryptoError> {
        if bytes.len() != Self::private_key_len() {
            return Err(CryptoError::InvalidKeyMaterial(format!(
                "{} private key must be {} bytes, got {}",
                L::NAME,
                Self::private_key_len(),
                bytes.len()
            )));
        }
        if bytes[0] > 1 {
            return Err(CryptoError::InvalidKeyMaterial(format!(
                "{} private key has invalid branch selector",
                L::NAME
            )));
        }
        let public = Self::public_from_bytes(&bytes[1 + L::Inner::DK_LEN..])?;
        Ok(PrivateKey::new(L::NAME, bytes.to_vec(), public))
    }
}
