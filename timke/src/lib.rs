//! TIMKE: Tightly-secure Multi-stage Key Exchange
//!
//! A two-flight authenticated key exchange built from two swappable KEMs and
//! an AEAD. The client knows the server's static KEM1 public key out of band.
//!
//! - KEM1 runs against the server's static key and yields a stage-1 key
//!   `K_tmp` that protects 0-RTT data in the very first message.
//! - KEM2 runs against a fresh client ephemeral key and yields the final
//!   session key `K_main`, which is forward secret.
//!
//! # Protocol Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        TIMKE Handshake                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  Client                                         Server (pkS, skS)│
//! │  (epk, esk) <- KEM2.KeyGen                                       │
//! │  (ct1, K1)  <- KEM1.Encaps(pkS)                                  │
//! │  K_tmp = H1(pkS, ct1, K1)                                        │
//! │           ── ClientHello {epk, ct1, Seal(K_tmp, 0-RTT)} ──►      │
//! │                                     K1 <- KEM1.Decaps(skS, ct1)  │
//! │                                     (ct2, K2) <- KEM2.Encaps(epk)│
//! │  K_main = H2(pkS, epk, ct1, ct2, K1, K2)                         │
//! │           ◄── ServerResponse {ct2, Seal(K_main, payload)} ──     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use timke::{TimkeConfig, TimkeTransport};
//!
//! let transport = TimkeTransport::new(TimkeConfig::default());
//!
//! // Client side: the server's public key is known in advance
//! let (mut channel, greeting) = transport
//!     .upgrade_outbound(stream, server_public_key, Some(b"early data"))
//!     .await?;
//!
//! channel.send(b"Hello, quantum world!").await?;
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod keystore;
pub mod selector;
pub mod server;
pub mod session;
pub mod transport;
pub mod types;

pub use client::TimkeClient;
pub use codec::WireMessage;
pub use config::{TimkeConfig, TimkeConfigBuilder};
pub use engine::SessionCipher;
pub use error::{CodecError, HandshakeError, TimkeError};
pub use keystore::KeyStore;
pub use server::TimkeServer;
pub use session::SecureChannel;
pub use transport::{TimkeTransport, TimkeTransportBuilder};
pub use types::{ClientHello, ServerResponse, SessionState};
