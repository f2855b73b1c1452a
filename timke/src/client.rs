//! Client side of the TIMKE handshake

use crypto::{h1, h2, PrivateKey, PublicKey, SecureRng, SharedSecret};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::config::TimkeConfig;
use crate::engine::{open_optional, seal_optional, Established, SessionCipher};
use crate::error::{HandshakeError, Result};
use crate::types::{ClientHello, ServerResponse, SessionState, PROTOCOL_ID};

/// Material that exists between sending the hello and receiving the reply.
struct PendingExchange {
    ephemeral_key: PrivateKey,
    ciphertext1: Vec<u8>,
    k1: SharedSecret,
}

enum ClientStage {
    Initial,
    AwaitingServerResponse(PendingExchange),
    Established(Established),
    Failed,
}

/// Client state machine.
///
/// ```text
/// Initial --generate_client_hello--> AwaitingServerResponse
///         --process_server_response--> Established
/// ```
///
/// Any failure moves the session to `Failed`, from which only
/// [`reset`](Self::reset) recovers.
pub struct TimkeClient {
    config: TimkeConfig,
    server_public_key: PublicKey,
    stage: ClientStage,
}

impl TimkeClient {
    /// Create a client for a server whose static KEM1 key is known out of band.
    pub fn new(config: TimkeConfig, server_public_key: PublicKey) -> Result<Self> {
        let kem1 = config.kem1_name();
        if server_public_key.algorithm() != kem1 {
            return Err(HandshakeError::InvalidKeyMaterial(
                crypto::CryptoError::InvalidKeyMaterial(format!(
                    "server key is {}, configured KEM1 is {}",
                    server_public_key.algorithm(),
                    kem1
                )),
            )
            .into());
        }
        Ok(Self {
            config,
            server_public_key,
            stage: ClientStage::Initial,
        })
    }

    pub fn config(&self) -> &TimkeConfig {
        &self.config
    }

    pub fn server_public_key(&self) -> &PublicKey {
        &self.server_public_key
    }

    pub fn state(&self) -> SessionState {
        match self.stage {
            ClientStage::Initial => SessionState::Initial,
            ClientStage::AwaitingServerResponse(_) => SessionState::AwaitingServerResponse,
            ClientStage::Established(_) => SessionState::Established,
            ClientStage::Failed => SessionState::Failed,
        }
    }

    /// Build the first flight, sealing `zero_rtt` under K_tmp when given.
    pub fn generate_client_hello(&mut self, zero_rtt: Option<&[u8]>) -> Result<ClientHello> {
        self.generate_client_hello_with_rng(zero_rtt, &mut OsRng)
    }

    pub fn generate_client_hello_with_rng(
        &mut self,
        zero_rtt: Option<&[u8]>,
        rng: &mut dyn SecureRng,
    ) -> Result<ClientHello> {
        if !matches!(self.stage, ClientStage::Initial) {
            return Err(self.invalid_state("generate client hello"));
        }

        match self.build_client_hello(zero_rtt, rng) {
            Ok((hello, pending)) => {
                if self.config.verbose_logging {
                    tracing::debug!(
                        kem1 = %hello.kem1_name,
                        kem2 = %hello.kem2_name,
                        server_key = %self.server_public_key.fingerprint(),
                        zero_rtt = zero_rtt.is_some(),
                        "Generated ClientHello"
                    );
                }
                self.stage = ClientStage::AwaitingServerResponse(pending);
                Ok(hello)
            }
            Err(e) => Err(self.fail("generate client hello", e)),
        }
    }

    fn build_client_hello(
        &self,
        zero_rtt: Option<&[u8]>,
        rng: &mut dyn SecureRng,
    ) -> std::result::Result<(ClientHello, PendingExchange), HandshakeError> {
        let kem1 = &self.config.kem1;
        let kem2 = &self.config.kem2;

        // Ephemeral KEM2 pair, used once.
        let (ephemeral_pk, ephemeral_key) = kem2
            .generate_key_pair(&kem2.setup(), rng)
            .map_err(HandshakeError::key_material)?;

        let (ciphertext1, k1) = kem1
            .encapsulate(&self.server_public_key, rng)
            .map_err(HandshakeError::encapsulation)?;

        let k_tmp = h1(self.server_public_key.as_bytes(), &ciphertext1, &k1)
            .map_err(HandshakeError::InvalidInput)?;
        let encrypted_payload = seal_optional(self.config.cipher.as_ref(), &k_tmp[..], zero_rtt)?;

        let hello = ClientHello {
            ephemeral_public_key: ephemeral_pk.to_bytes(),
            ciphertext1: ciphertext1.clone(),
            encrypted_payload,
            kem1_name: kem1.name(),
            kem2_name: kem2.name(),
        };
        let pending = PendingExchange {
            ephemeral_key,
            ciphertext1,
            k1,
        };
        Ok((hello, pending))
    }

    /// Consume the server's reply and return the stage-2 plaintext (empty if none).
    pub fn process_server_response(&mut self, response: &ServerResponse) -> Result<Vec<u8>> {
        let pending = match std::mem::replace(&mut self.stage, ClientStage::Failed) {
            ClientStage::AwaitingServerResponse(pending) => pending,
            other => {
                self.stage = other;
                return Err(self.invalid_state("process server response"));
            }
        };

        match self.complete(&pending, response) {
            Ok((established, payload)) => {
                if self.config.verbose_logging {
                    tracing::info!(
                        server_key = %self.server_public_key.fingerprint(),
                        kem1 = %self.config.kem1_name(),
                        kem2 = %self.config.kem2_name(),
                        "{} handshake complete (client)",
                        PROTOCOL_ID
                    );
                }
                self.stage = ClientStage::Established(established);
                Ok(payload)
            }
            Err(e) => Err(self.fail("process server response", e)),
        }
    }

    fn complete(
        &self,
        pending: &PendingExchange,
        response: &ServerResponse,
    ) -> std::result::Result<(Established, Vec<u8>), HandshakeError> {
        if response.ciphertext2.is_empty() {
            return Err(HandshakeError::NilMessage("ciphertext2"));
        }

        let k2 = self
            .config
            .kem2
            .decapsulate(&pending.ephemeral_key, &response.ciphertext2)
            .map_err(HandshakeError::decapsulation)?;

        let k_main = h2(
            self.server_public_key.as_bytes(),
            pending.ephemeral_key.public_key().as_bytes(),
            &pending.ciphertext1,
            &response.ciphertext2,
            &pending.k1,
            &k2,
        )
        .map_err(HandshakeError::InvalidInput)?;

        let payload = open_optional(
            self.config.cipher.as_ref(),
            &k_main[..],
            &response.encrypted_payload,
        )?;
        Ok((Established::new(k_main), payload))
    }

    /// Discard all session material and return to `Initial`.
    pub fn reset(&mut self) {
        self.stage = ClientStage::Initial;
    }

    fn established(&self, operation: &'static str) -> Result<&Established> {
        match &self.stage {
            ClientStage::Established(established) => Ok(established),
            _ => Err(self.invalid_state(operation)),
        }
    }

    fn invalid_state(&self, operation: &'static str) -> crate::error::TimkeError {
        HandshakeError::InvalidState {
            operation,
            state: self.state(),
        }
        .into()
    }

    fn fail(&mut self, operation: &'static str, err: HandshakeError) -> crate::error::TimkeError {
        if self.config.verbose_logging {
            tracing::debug!(operation, error = %err, "client session failed");
        }
        self.stage = ClientStage::Failed;
        err.into()
    }
}

impl SessionCipher for TimkeClient {
    fn state(&self) -> SessionState {
        TimkeClient::state(self)
    }

    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let sealed = self
            .established("encrypt")?
            .seal(self.config.cipher.as_ref(), plaintext);
        sealed.map_err(|e| self.fail("encrypt", e))
    }

    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let opened = self
            .established("decrypt")?
            .open(self.config.cipher.as_ref(), ciphertext);
        opened.map_err(|e| self.fail("decrypt", e))
    }

    fn session_key(&self) -> Option<Zeroizing<Vec<u8>>> {
        match &self.stage {
            ClientStage::Established(established) => Some(established.key_copy()),
            _ => None,
        }
    }
}

impl TimkeClient {
    /// Seal application data under K_main.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        SessionCipher::encrypt(self, plaintext)
    }

    /// Open application data sealed under K_main.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        SessionCipher::decrypt(self, ciphertext)
    }

    /// Copy of K_main, or `None` unless established.
    pub fn session_key(&self) -> Option<Zeroizing<Vec<u8>>> {
        SessionCipher::session_key(self)
    }
}
