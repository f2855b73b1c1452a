//! Server side of the TIMKE handshake

use std::sync::Arc;

use crypto::{global_registry, h1, h2, Kem, KemRegistry, PrivateKey, PublicKey, SecureRng, SharedSecret};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::config::TimkeConfig;
use crate::engine::{open_optional, seal_optional, Established, SessionCipher};
use crate::error::{HandshakeError, Result, TimkeError};
use crate::selector::negotiate;
use crate::types::{ClientHello, ServerResponse, SessionState, PROTOCOL_ID};

/// Material that exists between accepting a hello and sending the reply.
struct PendingResponse {
    kem2: Arc<dyn Kem>,
    ephemeral_public_key: PublicKey,
    ciphertext1: Vec<u8>,
    k1: SharedSecret,
}

enum ServerStage {
    Initial,
    ClientHelloProcessed(PendingResponse),
    Established(Established),
    Failed,
}

/// Server state machine.
///
/// ```text
/// Initial --process_client_hello--> ClientHelloProcessed
///         --generate_server_response--> Established
/// ```
///
/// KEM1 and KEM2 are taken from the names in the client's hello and resolved
/// through the registry; unknown names fall back to the defaults with a
/// warning. The static private key must belong to the negotiated KEM1.
pub struct TimkeServer {
    config: TimkeConfig,
    private_key: PrivateKey,
    /// Scratch registry; `None` resolves through the global one
    registry: Option<Arc<KemRegistry>>,
    stage: ServerStage,
}

impl TimkeServer {
    /// Create a server resolving algorithms through the global registry.
    pub fn new(config: TimkeConfig, private_key: PrivateKey) -> Self {
        Self {
            config,
            private_key,
            registry: None,
            stage: ServerStage::Initial,
        }
    }

    /// Create a server that negotiates against its own registry.
    pub fn with_registry(
        config: TimkeConfig,
        private_key: PrivateKey,
        registry: Arc<KemRegistry>,
    ) -> Self {
        Self {
            registry: Some(registry),
            ..Self::new(config, private_key)
        }
    }

    fn registry(&self) -> &KemRegistry {
        match &self.registry {
            Some(registry) => registry.as_ref(),
            None => global_registry(),
        }
    }

    pub fn config(&self) -> &TimkeConfig {
        &self.config
    }

    pub fn public_key(&self) -> &PublicKey {
        self.private_key.public_key()
    }

    pub fn state(&self) -> SessionState {
        match self.stage {
            ServerStage::Initial => SessionState::Initial,
            ServerStage::ClientHelloProcessed(_) => SessionState::ClientHelloProcessed,
            ServerStage::Established(_) => SessionState::Established,
            ServerStage::Failed => SessionState::Failed,
        }
    }

    /// Accept the first flight and return the 0-RTT plaintext (empty if none).
    pub fn process_client_hello(&mut self, hello: &ClientHello) -> Result<Vec<u8>> {
        if !matches!(self.stage, ServerStage::Initial) {
            return Err(self.invalid_state("process client hello"));
        }

        match self.accept_hello(hello) {
            Ok((pending, zero_rtt)) => {
                if self.config.verbose_logging {
                    tracing::debug!(
                        kem1 = %hello.kem1_name,
                        kem2 = %pending.kem2.name(),
                        server_key = %self.public_key().fingerprint(),
                        zero_rtt_len = zero_rtt.len(),
                        "Processed ClientHello"
                    );
                }
                self.stage = ServerStage::ClientHelloProcessed(pending);
                Ok(zero_rtt)
            }
            Err(e) => Err(self.fail("process client hello", e)),
        }
    }

    fn accept_hello(
        &self,
        hello: &ClientHello,
    ) -> std::result::Result<(PendingResponse, Vec<u8>), HandshakeError> {
        if hello.ephemeral_public_key.is_empty() {
            return Err(HandshakeError::NilMessage("ephemeral public key"));
        }
        if hello.ciphertext1.is_empty() {
            return Err(HandshakeError::NilMessage("ciphertext1"));
        }

        let (kem1, kem2) = negotiate(self.registry(), &hello.kem1_name, &hello.kem2_name);

        let ephemeral_public_key = kem2
            .parse_public_key(&hello.ephemeral_public_key)
            .map_err(HandshakeError::key_material)?;

        let k1 = kem1
            .decapsulate(&self.private_key, &hello.ciphertext1)
            .map_err(HandshakeError::decapsulation)?;

        let k_tmp = h1(self.public_key().as_bytes(), &hello.ciphertext1, &k1)
            .map_err(HandshakeError::InvalidInput)?;
        let zero_rtt = open_optional(
            self.config.cipher.as_ref(),
            &k_tmp[..],
            &hello.encrypted_payload,
        )?;

        let pending = PendingResponse {
            kem2,
            ephemeral_public_key,
            ciphertext1: hello.ciphertext1.clone(),
            k1,
        };
        Ok((pending, zero_rtt))
    }

    /// Build the reply flight, sealing `payload` under K_main when given.
    pub fn generate_server_response(&mut self, payload: Option<&[u8]>) -> Result<ServerResponse> {
        self.generate_server_response_with_rng(payload, &mut OsRng)
    }

    pub fn generate_server_response_with_rng(
        &mut self,
        payload: Option<&[u8]>,
        rng: &mut dyn SecureRng,
    ) -> Result<ServerResponse> {
        let pending = match std::mem::replace(&mut self.stage, ServerStage::Failed) {
            ServerStage::ClientHelloProcessed(pending) => pending,
            other => {
                self.stage = other;
                return Err(self.invalid_state("generate server response"));
            }
        };

        match self.respond(&pending, payload, rng) {
            Ok((established, response)) => {
                if self.config.verbose_logging {
                    tracing::info!(
                        server_key = %self.public_key().fingerprint(),
                        kem2 = %pending.kem2.name(),
                        "{} handshake complete (server)",
                        PROTOCOL_ID
                    );
                }
                self.stage = ServerStage::Established(established);
                Ok(response)
            }
            Err(e) => Err(self.fail("generate server response", e)),
        }
    }

    fn respond(
        &self,
        pending: &PendingResponse,
        payload: Option<&[u8]>,
        rng: &mut dyn SecureRng,
    ) -> std::result::Result<(Established, ServerResponse), HandshakeError> {
        let (ciphertext2, k2) = pending
            .kem2
            .encapsulate(&pending.ephemeral_public_key, rng)
            .map_err(HandshakeError::encapsulation)?;

        let k_main = h2(
            self.public_key().as_bytes(),
            pending.ephemeral_public_key.as_bytes(),
            &pending.ciphertext1,
            &ciphertext2,
            &pending.k1,
            &k2,
        )
        .map_err(HandshakeError::InvalidInput)?;

        let encrypted_payload = seal_optional(self.config.cipher.as_ref(), &k_main[..], payload)?;
        let response = ServerResponse {
            ciphertext2,
            encrypted_payload,
        };
        Ok((Established::new(k_main), response))
    }

    /// Discard all session material and return to `Initial`. The static key is kept.
    pub fn reset(&mut self) {
        self.stage = ServerStage::Initial;
    }

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

    fn established(&self, operation: &'static str) -> Result<&Established> {
        match &self.stage {
            ServerStage::Established(established) => Ok(established),
            _ => Err(self.invalid_state(operation)),
        }
    }

    fn invalid_state(&self, operation: &'static str) -> TimkeError {
        HandshakeError::InvalidState {
            operation,
            state: self.state(),
        }
        .into()
    }

    fn fail(&mut self, operation: &'static str, err: HandshakeError) -> TimkeError {
        if self.config.verbose_logging {
            tracing::debug!(operation, error = %err, "server session failed");
        }
        self.stage = ServerStage::Failed;
        err.into()
    }
}

impl SessionCipher for TimkeServer {
    fn state(&self) -> SessionState {
        TimkeServer::state(self)
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
            ServerStage::Established(established) => Some(established.key_copy()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::TimkeClient;
    use crypto::ml_kem::{MlKem1024, MlKem768};
    use crypto::ow_chcca::OwChCca16;

    fn server_keys(config: &TimkeConfig) -> (PublicKey, PrivateKey) {
        config
            .kem1
            .generate_key_pair(&config.kem1.setup(), &mut OsRng)
            .unwrap()
    }

    fn pair(config: TimkeConfig) -> (TimkeClient, TimkeServer) {
        let (pk, sk) = server_keys(&config);
        let client = TimkeClient::new(config.clone(), pk).unwrap();
        let server = TimkeServer::new(config, sk);
        (client, server)
    }

    #[test]
    fn test_full_handshake() {
        let (mut client, mut server) = pair(TimkeConfig::default());

        let hello = client.generate_client_hello(Some(b"early")).unwrap();
        assert_eq!(client.state(), SessionState::AwaitingServerResponse);

        let zero_rtt = server.process_client_hello(&hello).unwrap();
        assert_eq!(zero_rtt, b"early");
        assert_eq!(server.state(), SessionState::ClientHelloProcessed);
        assert!(server.session_key().is_none());

        let response = server.generate_server_response(Some(b"late")).unwrap();
        assert_eq!(server.state(), SessionState::Established);

        let stage2 = client.process_server_response(&response).unwrap();
        assert_eq!(stage2, b"late");
        assert_eq!(client.state(), SessionState::Established);

        let client_key = client.session_key().unwrap();
        let server_key = server.session_key().unwrap();
        assert_eq!(client_key.len(), 64);
        assert_eq!(&client_key[..], &server_key[..]);
    }

    #[test]
    fn test_response_before_hello_rejected() {
        let (_, mut server) = pair(TimkeConfig::default());
        let result = server.generate_server_response(None);
        assert!(matches!(
            result,
            Err(TimkeError::Handshake(HandshakeError::InvalidState {
                state: SessionState::Initial,
                ..
            }))
        ));
        // Rejection has no side effects.
        assert_eq!(server.state(), SessionState::Initial);
    }

    #[test]
    fn test_empty_fields_are_nil_message() {
        let (mut client, mut server) = pair(TimkeConfig::default());
        let mut hello = client.generate_client_hello(None).unwrap();
        hello.ciphertext1.clear();
        assert!(matches!(
            server.process_client_hello(&hello),
            Err(TimkeError::Handshake(HandshakeError::NilMessage("ciphertext1")))
        ));
        assert_eq!(server.state(), SessionState::Failed);
    }

    #[test]
    fn test_wrong_static_key_fails() {
        let config = TimkeConfig::new(Arc::new(MlKem768::new()), Arc::new(MlKem1024::new()));
        let (pk, _) = server_keys(&config);
        let (_, other_sk) = server_keys(&config);
        let mut client = TimkeClient::new(config.clone(), pk).unwrap();
        let mut server = TimkeServer::new(config, other_sk);

        let hello = client.generate_client_hello(None).unwrap();
        assert!(matches!(
            server.process_client_hello(&hello),
            Err(TimkeError::Handshake(HandshakeError::DecapsulationFailed(_)))
        ));
        assert_eq!(server.state(), SessionState::Failed);
        assert!(matches!(
            server.generate_server_response(None),
            Err(TimkeError::Handshake(HandshakeError::InvalidState {
                state: SessionState::Failed,
                ..
            }))
        ));
    }

    #[test]
    fn test_scratch_registry_resolves_local_names() {
        let config = TimkeConfig::new(Arc::new(OwChCca16::new()), Arc::new(OwChCca16::new()));
        let (pk, sk) = server_keys(&config);
        let registry = Arc::new(KemRegistry::with_builtins());
        registry.register("Local-KEM", || Box::new(OwChCca16::new()));

        let mut client = TimkeClient::new(config.clone(), pk).unwrap();
        let mut server = TimkeServer::with_registry(config, sk, Arc::clone(&registry));

        let mut hello = client.generate_client_hello(Some(b"scratch")).unwrap();
        hello.kem1_name = "Local-KEM".to_string();
        hello.kem2_name = "Local-KEM".to_string();
        assert_eq!(server.process_client_hello(&hello).unwrap(), b"scratch");

        let response = server.generate_server_response(None).unwrap();
        client.process_server_response(&response).unwrap();
        assert_eq!(&client.session_key().unwrap()[..], &server.session_key().unwrap()[..]);

        // The global registry never saw the local name.
        assert!(!global_registry().contains("Local-KEM"));
    }

    #[test]
    fn test_reset_allows_new_run() {
        let (mut client, mut server) = pair(TimkeConfig::default());
        let hello = client.generate_client_hello(None).unwrap();
        server.process_client_hello(&hello).unwrap();
        let first = server.generate_server_response(None).unwrap();
        client.process_server_response(&first).unwrap();
        let first_key = server.session_key().unwrap();

        client.reset();
        server.reset();
        assert_eq!(server.state(), SessionState::Initial);
        assert!(client.session_key().is_none());

        let hello = client.generate_client_hello(None).unwrap();
        server.process_client_hello(&hello).unwrap();
        let second = server.generate_server_response(None).unwrap();
        client.process_server_response(&second).unwrap();
        assert_ne!(&first_key[..], &server.session_key().unwrap()[..]);
    }
}
