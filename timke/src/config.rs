//! Configuration for TIMKE sessions

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crypto::{global_registry, AesGcmCipher, Kem, SymmetricCipher};

use crate::error::{Result, TimkeError};
use crate::selector::{default_kem1, default_kem2, select_kem};

/// Default handshake deadline
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);
/// Default maximum frame size, handshake and application records alike
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Algorithms and limits shared by clients and servers
#[derive(Clone)]
pub struct TimkeConfig {
    /// KEM against the server's static key
    pub kem1: Arc<dyn Kem>,

    /// KEM against the client's ephemeral key
    pub kem2: Arc<dyn Kem>,

    /// Sealing for 0-RTT, stage-2 and application data
    pub cipher: Arc<dyn SymmetricCipher>,

    /// Handshake timeout
    pub handshake_timeout: Duration,

    /// Maximum frame size on the wire
    pub max_message_size: usize,

    /// Whether to log detailed handshake information
    pub verbose_logging: bool,
}

impl TimkeConfig {
    /// Create a new configuration with the default cipher and limits
    pub fn new(kem1: Arc<dyn Kem>, kem2: Arc<dyn Kem>) -> Self {
        Self {
            kem1,
            kem2,
            cipher: Arc::new(AesGcmCipher::new()),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            verbose_logging: false,
        }
    }

    /// Resolve both KEMs by name from the global registry
    pub fn from_names(kem1: &str, kem2: &str) -> Result<Self> {
        let registry = global_registry();
        Ok(Self::new(
            select_kem(registry, kem1)?,
            select_kem(registry, kem2)?,
        ))
    }

    /// Set the handshake timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Replace the payload cipher
    pub fn with_cipher(mut self, cipher: Arc<dyn SymmetricCipher>) -> Self {
        self.cipher = cipher;
        self
    }

    /// Enable verbose logging
    pub fn with_verbose_logging(mut self) -> Self {
        self.verbose_logging = true;
        self
    }

    pub fn kem1_name(&self) -> String {
        self.kem1.name()
    }

    pub fn kem2_name(&self) -> String {
        self.kem2.name()
    }
}

impl Default for TimkeConfig {
    /// ML-KEM-768 for KEM1, ML-KEM-1024 for KEM2, AES-GCM
    fn default() -> Self {
        let registry = global_registry();
        Self::new(default_kem1(registry), default_kem2(registry))
    }
}

impl fmt::Debug for TimkeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimkeConfig")
            .field("kem1", &self.kem1.name())
            .field("kem2", &self.kem2.name())
            .field("handshake_timeout", &self.handshake_timeout)
            .field("max_message_size", &self.max_message_size)
            .field("verbose_logging", &self.verbose_logging)
            .finish_non_exhaustive()
    }
}

/// Builder for TimkeConfig
pub struct TimkeConfigBuilder {
    kem1: Option<String>,
    kem2: Option<String>,
    cipher: Option<Arc<dyn SymmetricCipher>>,
    handshake_timeout: Duration,
    max_message_size: usize,
    verbose_logging: bool,
}

impl Default for TimkeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TimkeConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self {
            kem1: None,
            kem2: None,
            cipher: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            verbose_logging: false,
        }
    }

    /// Name the KEM1 algorithm
    pub fn kem1(mut self, name: impl Into<String>) -> Self {
        self.kem1 = Some(name.into());
        self
    }

    /// Name the KEM2 algorithm
    pub fn kem2(mut self, name: impl Into<String>) -> Self {
        self.kem2 = Some(name.into());
        self
    }

    pub fn cipher(mut self, cipher: Arc<dyn SymmetricCipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// Set the handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set maximum frame size
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Enable verbose logging
    pub fn verbose(mut self) -> Self {
        self.verbose_logging = true;
        self
    }

    /// Build the configuration, resolving unset KEMs to the defaults
    pub fn build(self) -> Result<TimkeConfig> {
        if self.handshake_timeout.is_zero() {
            return Err(TimkeError::InvalidConfig(
                "handshake timeout must be non-zero".to_string(),
            ));
        }
        if self.max_message_size == 0 || self.max_message_size > u32::MAX as usize {
            return Err(TimkeError::InvalidConfig(format!(
                "max message size {} out of range",
                self.max_message_size
            )));
        }

        let registry = global_registry();
        let kem1 = match self.kem1 {
            Some(name) => select_kem(registry, &name)?,
            None => default_kem1(registry),
        };
        let kem2 = match self.kem2 {
            Some(name) => select_kem(registry, &name)?,
            None => default_kem2(registry),
        };

        Ok(TimkeConfig {
            kem1,
            kem2,
            cipher: self.cipher.unwrap_or_else(|| Arc::new(AesGcmCipher::new())),
            handshake_timeout: self.handshake_timeout,
            max_message_size: self.max_message_size,
            verbose_logging: self.verbose_logging,
        })
    }
}
