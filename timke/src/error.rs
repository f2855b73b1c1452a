//! Error types for the TIMKE handshake

use crypto::CryptoError;
use thiserror::Error;

use crate::types::SessionState;

/// Errors that can occur during TIMKE operations
#[derive(Debug, Error)]
pub enum TimkeError {
    /// Cryptographic operation failed outside a handshake step
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Handshake protocol error
    #[error("handshake error: {0}")]
    Handshake(HandshakeError),

    /// Malformed wire message
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// I/O error during communication
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Timeout during operation
    #[error("operation timed out")]
    Timeout,
}

/// Specific handshake errors
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// No KEM is registered under the requested name
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid key material")]
    InvalidKeyMaterial(#[source] CryptoError),

    #[error("encapsulation failed")]
    EncapsulationFailed(#[source] CryptoError),

    #[error("decapsulation failed")]
    DecapsulationFailed(#[source] CryptoError),

    /// Key derivation was handed an empty input
    #[error("invalid key derivation input")]
    InvalidInput(#[source] CryptoError),

    #[error("failed to seal payload")]
    SealFailed(#[source] CryptoError),

    #[error("failed to open payload")]
    UnsealFailed(#[source] CryptoError),

    /// Operation attempted out of order
    #[error("cannot {operation} in state {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// A required message field was empty
    #[error("missing required field: {0}")]
    NilMessage(&'static str),

    /// Connection closed during handshake
    #[error("connection closed during handshake")]
    ConnectionClosed,
}

impl HandshakeError {
    /// Classify a failure from key parsing or algorithm lookup.
    pub(crate) fn key_material(err: CryptoError) -> Self {
        match err {
            CryptoError::UnsupportedAlgorithm(name) => HandshakeError::UnsupportedAlgorithm(name),
            other => HandshakeError::InvalidKeyMaterial(other),
        }
    }

    /// Classify a failure from encapsulation. Key mismatches stay key errors.
    pub(crate) fn encapsulation(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidKeyMaterial(_) => HandshakeError::InvalidKeyMaterial(err),
            other => HandshakeError::EncapsulationFailed(other),
        }
    }

    /// Classify a failure from decapsulation. Key mismatches stay key errors.
    pub(crate) fn decapsulation(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidKeyMaterial(_) => HandshakeError::InvalidKeyMaterial(err),
            other => HandshakeError::DecapsulationFailed(other),
        }
    }
}

impl From<HandshakeError> for TimkeError {
    fn from(e: HandshakeError) -> Self {
        TimkeError::Handshake(e)
    }
}

/// Wire decoding and encoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Fewer bytes remain than a length prefix or declared length requires
    #[error("truncated message: needed {needed} bytes, {remaining} remaining")]
    TruncatedMessage { needed: usize, remaining: usize },

    /// Bytes remain after the last field
    #[error("{0} trailing bytes after message")]
    TrailingData(usize),

    #[error("algorithm name is not valid UTF-8")]
    InvalidAlgorithmName,

    #[error("field of {0} bytes exceeds the 32-bit length prefix")]
    FieldTooLarge(usize),
}

/// Result type for TIMKE operations
pub type Result<T> = std::result::Result<T, TimkeError>;
