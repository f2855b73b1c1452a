//! Cryptographic building blocks for the TIMKE handshake.
//!
//! - [`traits::Kem`]: the algorithm-agnostic KEM capability, used as a trait object
//! - [`ml_kem`] and [`ow_chcca`]: the built-in KEM families
//! - [`registry`]: name to constructor mapping, including the process-wide registry
//! - [`hashes::h1`] / [`hashes::h2`]: the two stage-key derivations
//! - [`symmetric::AesGcmCipher`]: payload sealing

pub mod deterministic;
pub mod error;
pub mod hashes;
pub mod keys;
pub mod ml_kem;
pub mod ow_chcca;
pub mod registry;
pub mod symmetric;
pub mod traits;

pub use error::CryptoError;
pub use hashes::{h1, h2, DerivedKey};
pub use keys::{PrivateKey, PublicKey};
pub use registry::{get_kem, global_registry, list_kems, register_kem, KemRegistry};
pub use symmetric::{AesGcmCipher, SymmetricCipher};
pub use traits::{Kem, KemParameters, SecureRng, SharedSecret};
