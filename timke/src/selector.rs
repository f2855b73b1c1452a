//! KEM resolution by wire name, with fixed default fallbacks.

use std::sync::Arc;

use crypto::ml_kem::{MlKem1024, MlKem768};
use crypto::{Kem, KemRegistry};

use crate::error::HandshakeError;

/// Preferred KEM1 algorithms, first registered wins.
pub const DEFAULT_KEM1_CHAIN: [&str; 2] = ["ML-KEM-768", "OWChCCA-32"];
/// Preferred KEM2 algorithms, first registered wins.
pub const DEFAULT_KEM2_CHAIN: [&str; 2] = ["ML-KEM-1024", "OWChCCA-64"];

/// Look up `name` in `registry`.
pub fn select_kem(registry: &KemRegistry, name: &str) -> Result<Arc<dyn Kem>, HandshakeError> {
    if name.is_empty() {
        return Err(HandshakeError::UnsupportedAlgorithm(
            "KEM name not specified".to_string(),
        ));
    }
    registry
        .get(name)
        .map(Arc::from)
        .map_err(HandshakeError::key_material)
}

fn first_registered(registry: &KemRegistry, chain: &[&str]) -> Option<Arc<dyn Kem>> {
    chain
        .iter()
        .find_map(|name| registry.get(name).ok())
        .map(Arc::from)
}

pub fn default_kem1(registry: &KemRegistry) -> Arc<dyn Kem> {
    first_registered(registry, &DEFAULT_KEM1_CHAIN).unwrap_or_else(|| {
        tracing::warn!("no default KEM1 registered, using built-in ML-KEM-768");
        Arc::new(MlKem768::new())
    })
}

pub fn default_kem2(registry: &KemRegistry) -> Arc<dyn Kem> {
    first_registered(registry, &DEFAULT_KEM2_CHAIN).unwrap_or_else(|| {
        tracing::warn!("no default KEM2 registered, using built-in ML-KEM-1024");
        Arc::new(MlKem1024::new())
    })
}

/// Resolve the pair a client declared in its hello.
///
/// When both names are present each is looked up on its own and replaced by
/// the slot default if unknown. When either is missing both defaults apply.
pub fn negotiate(
    registry: &KemRegistry,
    kem1_name: &str,
    kem2_name: &str,
) -> (Arc<dyn Kem>, Arc<dyn Kem>) {
    if kem1_name.is_empty() || kem2_name.is_empty() {
        tracing::warn!(
            kem1 = kem1_name,
            kem2 = kem2_name,
            "client hello did not name both KEMs, using defaults"
        );
        return (default_kem1(registry), default_kem2(registry));
    }
    let kem1 = select_kem(registry, kem1_name).unwrap_or_else(|err| {
        let fallback = default_kem1(registry);
        tracing::warn!(
            requested = kem1_name,
            fallback = %fallback.name(),
            error = %err,
            "unknown KEM1, falling back to default"
        );
        fallback
    });
    let kem2 = select_kem(registry, kem2_name).unwrap_or_else(|err| {
        let fallback = default_kem2(registry);
        tracing::warn!(
            requested = kem2_name,
            fallback = %fallback.name(),
            error = %err,
            "unknown KEM2, falling back to default"
        );
        fallback
    });
    (kem1, kem2)
}
