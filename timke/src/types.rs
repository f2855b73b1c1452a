//! Protocol messages and session state

use std::fmt;

/// Protocol identifier, used in log fields
pub const PROTOCOL_ID: &str = "TIMKE";

/// First flight: client to server.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientHello {
    /// Client's ephemeral KEM2 public key
    pub ephemeral_public_key: Vec<u8>,
    /// KEM1 ciphertext against the server's static key
    pub ciphertext1: Vec<u8>,
    /// 0-RTT data sealed under K_tmp; empty when absent
    pub encrypted_payload: Vec<u8>,
    pub kem1_name: String,
    pub kem2_name: String,
}

/// Reply flight: server to client.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerResponse {
    /// KEM2 ciphertext against the client's ephemeral key
    pub ciphertext2: Vec<u8>,
    /// Stage-2 data sealed under K_main; empty when absent
    pub encrypted_payload: Vec<u8>,
}

/// Externally visible state of a client or server session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    Initial,
    /// Client has sent its hello
    AwaitingServerResponse,
    /// Server has accepted a hello but not yet replied
    ClientHelloProcessed,
    Established,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Initial => "Initial",
            SessionState::AwaitingServerResponse => "AwaitingServerResponse",
            SessionState::ClientHelloProcessed => "ClientHelloProcessed",
            SessionState::Established => "Established",
            SessionState::Failed => "Failed",
        };
        f.write_str(name)
    }
}
