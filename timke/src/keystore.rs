//! On-disk storage for a server's static KEM1 key pair.
//!
//! Keys are stored as raw bytes: the private key at `path` and the public key
//! at `path.pub`. On Unix the private key file is created with mode 0600.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crypto::{Kem, PrivateKey, PublicKey, SecureRng};
use zeroize::Zeroizing;

use crate::error::Result;

/// Raw-bytes key files for one KEM.
pub struct KeyStore;

impl KeyStore {
    /// Location of the public half for a private key stored at `path`.
    pub fn public_key_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".pub");
        PathBuf::from(name)
    }

    /// Generate a key pair and write both halves, replacing existing files.
    pub fn generate(
        kem: &dyn Kem,
        path: &Path,
        rng: &mut dyn SecureRng,
    ) -> Result<(PublicKey, PrivateKey)> {
        let (public_key, private_key) = kem.generate_key_pair(&kem.setup(), rng)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path)?;
        file.write_all(private_key.as_bytes())?;
        file.sync_all()?;

        let public_path = Self::public_key_path(path);
        fs::write(&public_path, public_key.as_bytes())?;

        tracing::info!(
            path = %path.display(),
            algorithm = %kem.name(),
            fingerprint = %public_key.fingerprint(),
            "Generated static key pair"
        );
        Ok((public_key, private_key))
    }

    pub fn load_private_key(kem: &dyn Kem, path: &Path) -> Result<PrivateKey> {
        let bytes = Zeroizing::new(fs::read(path)?);
        #[cfg(unix)]
        warn_if_permissions_loose(path);
        Ok(kem.parse_private_key(&bytes)?)
    }

    /// Load a public key. `path` names the public key file itself.
    pub fn load_public_key(kem: &dyn Kem, path: &Path) -> Result<PublicKey> {
        let bytes = fs::read(path)?;
        Ok(kem.parse_public_key(&bytes)?)
    }
}

#[cfg(unix)]
fn warn_if_permissions_loose(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(metadata) = fs::metadata(path) {
        let mode = metadata.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            tracing::warn!(
                path = %path.display(),
                mode = format!("{:o}", mode),
                "private key permissions are too open; expected 0600"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TimkeError;
    use crypto::ml_kem::MlKem768;
    use crypto::ow_chcca::OwChCca16;
    use crypto::CryptoError;
    use rand::rngs::OsRng;

    #[test]
    fn test_generate_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys").join("server.key");
        let kem = MlKem768::new();

        let (pk, sk) = KeyStore::generate(&kem, &path, &mut OsRng).unwrap();
        assert!(KeyStore::public_key_path(&path).ends_with("server.key.pub"));

        let loaded_sk = KeyStore::load_private_key(&kem, &path).unwrap();
        let loaded_pk = KeyStore::load_public_key(&kem, &KeyStore::public_key_path(&path)).unwrap();
        assert_eq!(loaded_sk.as_bytes(), sk.as_bytes());
        assert_eq!(loaded_pk, pk);
        assert_eq!(loaded_sk.public_key(), &pk);
    }

    #[cfg(unix)]
    #[test]
    fn test_private_key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.key");
        KeyStore::generate(&OwChCca16::new(), &path, &mut OsRng).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_load_with_wrong_kem_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.key");
        KeyStore::generate(&OwChCca16::new(), &path, &mut OsRng).unwrap();

        let result = KeyStore::load_private_key(&MlKem768::new(), &path);
        assert!(matches!(
            result,
            Err(TimkeError::Crypto(CryptoError::InvalidLength { .. }))
                | Err(TimkeError::Crypto(CryptoError::InvalidKeyMaterial(_)))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = KeyStore::load_public_key(&MlKem768::new(), &dir.path().join("absent.pub"));
        assert!(matches!(result, Err(TimkeError::Io(_))));
    }
}
