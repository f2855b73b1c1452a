//! Name-indexed KEM constructors.
//!
//! The handshake carries algorithm names on the wire and resolves them here.
//! A process-wide registry is created on first use with every built-in
//! algorithm already registered; further registrations are expected at
//! startup (or from tests) and lookups are concurrent thereafter.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::CryptoError;
use crate::ml_kem::{MlKem1024, MlKem512, MlKem768};
use crate::ow_chcca::{OwChCca16, OwChCca32, OwChCca64};
use crate::traits::Kem;

/// Zero-argument constructor producing a fresh KEM instance.
pub type KemConstructor = Arc<dyn Fn() -> Box<dyn Kem> + Send + Sync>;

/// Every algorithm this crate ships.
pub const BUILTIN_KEMS: [&str; 6] = [
    "ML-KEM-512",
    "ML-KEM-768",
    "ML-KEM-1024",
    "OWChCCA-16",
    "OWChCCA-32",
    "OWChCCA-64",
];

#[derive(Default)]
pub struct KemRegistry {
    kems: RwLock<HashMap<String, KemConstructor>>,
}

impl KemRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with [`BUILTIN_KEMS`].
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        register_builtin_kems(&registry);
        registry
    }

    /// Register `constructor` under `name`, replacing any previous entry.
    pub fn register<F>(&self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Box<dyn Kem> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(kem = %name, "registering KEM");
        self.kems.write().insert(name, Arc::new(constructor));
    }

    pub fn get(&self, name: &str) -> Result<Box<dyn Kem>, CryptoError> {
        // Clone the constructor out so user code never runs under the lock.
        let constructor = self
            .kems
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CryptoError::UnsupportedAlgorithm(name.to_string()))?;
        Ok(constructor())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kems.read().contains_key(name)
    }

    /// Registered names in unspecified order.
    pub fn list(&self) -> Vec<String> {
        self.kems.read().keys().cloned().collect()
    }
}

pub fn register_builtin_kems(registry: &KemRegistry) {
    registry.register("ML-KEM-512", || Box::new(MlKem512::new()));
    registry.register("ML-KEM-768", || Box::new(MlKem768::new()));
    registry.register("ML-KEM-1024", || Box::new(MlKem1024::new()));
    registry.register("OWChCCA-16", || Box::new(OwChCca16::new()));
    registry.register("OWChCCA-32", || Box::new(OwChCca32::new()));
    registry.register("OWChCCA-64", || Box::new(OwChCca64::new()));
}

static GLOBAL_REGISTRY: Lazy<KemRegistry> = Lazy::new(KemRegistry::with_builtins);

/// The process-wide registry.
pub fn global_registry() -> &'static KemRegistry {
    &GLOBAL_REGISTRY
}

pub fn register_kem<F>(name: impl Into<String>, constructor: F)
where
    F: Fn() -> Box<dyn Kem> + Send + Sync + 'static,
{
    GLOBAL_REGISTRY.register(name, constructor);
}

pub fn get_kem(name: &str) -> Result<Box<dyn Kem>, CryptoError> {
    GLOBAL_REGISTRY.get(name)
}

pub fn list_kems() -> Vec<String> {
    GLOBAL_REGISTRY.list()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_resolve_to_matching_names() {
        let registry = KemRegistry::with_builtins();
        for name in BUILTIN_KEMS {
            let kem = registry.get(name).unwrap();
            assert_eq!(kem.setup().name, name);
        }
        let mut listed = registry.list();
        listed.sort();
        let mut expected: Vec<String> = BUILTIN_KEMS.iter().map(|s| s.to_string()).collect();
        expected.sort();
        assert_eq!(listed, expected);
    }

    #[test]
    fn unknown_name_is_unsupported() {
        let registry = KemRegistry::new();
        assert!(matches!(
            registry.get("NOPE"),
            Err(CryptoError::UnsupportedAlgorithm(name)) if name == "NOPE"
        ));
    }

    #[test]
    fn last_registration_wins() {
        let registry = KemRegistry::new();
        registry.register("alias", || Box::new(MlKem512::new()));
        registry.register("alias", || Box::new(MlKem1024::new()));
        assert_eq!(registry.get("alias").unwrap().setup().name, "ML-KEM-1024");
        assert_eq!(registry.list(), vec!["alias".to_string()]);
    }

    #[test]
    fn concurrent_lookups() {
        let registry = Arc::new(KemRegistry::with_builtins());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let name = BUILTIN_KEMS[i % BUILTIN_KEMS.len()];
                    registry.get(name).unwrap().setup().name
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), BUILTIN_KEMS[i % BUILTIN_KEMS.len()]);
        }
    }

    #[test]
    fn global_registry_has_builtins() {
        for name in BUILTIN_KEMS {
            assert!(global_registry().contains(name));
        }
        assert!(list_kems().len() >= BUILTIN_KEMS.len());
    }
}
