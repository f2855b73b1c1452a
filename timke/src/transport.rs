//! Runs the two-flight TIMKE handshake over an async byte stream

use std::time::Duration;

use crypto::{PrivateKey, PublicKey};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;

use crate::client::TimkeClient;
use crate::codec::WireMessage;
use crate::config::{TimkeConfig, TimkeConfigBuilder};
use crate::error::{HandshakeError, Result, TimkeError};
use crate::server::TimkeServer;
use crate::session::{framed_with_limit, SecureChannel};
use crate::types::{ClientHello, ServerResponse};

/// Establishes [`SecureChannel`]s over arbitrary streams
pub struct TimkeTransport {
    config: TimkeConfig,
}

impl TimkeTransport {
    /// Create a new transport with the given configuration
    pub fn new(config: TimkeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TimkeConfig {
        &self.config
    }

    /// Upgrade a socket as the client.
    ///
    /// Returns the channel and the server's stage-2 payload (empty if none).
    pub async fn upgrade_outbound<S>(
        &self,
        socket: S,
        server_public_key: PublicKey,
        zero_rtt: Option<&[u8]>,
    ) -> Result<(SecureChannel<S>, Vec<u8>)>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let handshake_timeout = self.config.handshake_timeout;
        timeout(
            handshake_timeout,
            self.do_client_handshake(socket, server_public_key, zero_rtt),
        )
        .await
        .map_err(|_| TimkeError::Timeout)?
    }

    /// Upgrade a socket as the server.
    ///
    /// `respond` sees the decrypted 0-RTT data and picks the stage-2 payload.
    /// Returns the channel and the 0-RTT data (empty if none).
    pub async fn upgrade_inbound<S, F>(
        &self,
        socket: S,
        private_key: PrivateKey,
        respond: F,
    ) -> Result<(SecureChannel<S>, Vec<u8>)>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        F: FnOnce(&[u8]) -> Option<Vec<u8>>,
    {
        let handshake_timeout = self.config.handshake_timeout;
        timeout(
            handshake_timeout,
            self.do_server_handshake(socket, private_key, respond),
        )
        .await
        .map_err(|_| TimkeError::Timeout)?
    }

    async fn do_client_handshake<S>(
        &self,
        socket: S,
        server_public_key: PublicKey,
        zero_rtt: Option<&[u8]>,
    ) -> Result<(SecureChannel<S>, Vec<u8>)>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut framed = framed_with_limit(socket, self.config.max_message_size);
        let mut client = TimkeClient::new(self.config.clone(), server_public_key)?;

        // Step 1: Send ClientHello
        let hello = client.generate_client_hello(zero_rtt)?;
        framed.send(hello.encode()?).await?;

        if self.config.verbose_logging {
            tracing::debug!("Sent ClientHello");
        }

        // Step 2: Receive ServerResponse
        let frame = framed
            .next()
            .await
            .ok_or(HandshakeError::ConnectionClosed)??;
        let response = ServerResponse::decode(&frame)?;

        if self.config.verbose_logging {
            tracing::debug!("Received ServerResponse");
        }

        let stage2 = client.process_server_response(&response)?;
        let channel = SecureChannel::from_framed(framed, Box::new(client))?;
        Ok((channel, stage2))
    }

    async fn do_server_handshake<S, F>(
        &self,
        socket: S,
        private_key: PrivateKey,
        respond: F,
    ) -> Result<(SecureChannel<S>, Vec<u8>)>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        F: FnOnce(&[u8]) -> Option<Vec<u8>>,
    {
        let mut framed = framed_with_limit(socket, self.config.max_message_size);
        let mut server = TimkeServer::new(self.config.clone(), private_key);

        // Step 1: Receive ClientHello
        let frame = framed
            .next()
            .await
            .ok_or(HandshakeError::ConnectionClosed)??;
        let hello = ClientHello::decode(&frame)?;

        if self.config.verbose_logging {
            tracing::debug!(kem1 = %hello.kem1_name, kem2 = %hello.kem2_name, "Received ClientHello");
        }

        let zero_rtt = server.process_client_hello(&hello)?;

        // Step 2: Send ServerResponse
        let payload = respond(&zero_rtt);
        let response = server.generate_server_response(payload.as_deref())?;
        framed.send(response.encode()?).await?;

        if self.config.verbose_logging {
            tracing::debug!("Sent ServerResponse");
        }

        let channel = SecureChannel::from_framed(framed, Box::new(server))?;
        Ok((channel, zero_rtt))
    }
}

/// Transport configuration builder
pub struct TimkeTransportBuilder {
    config: TimkeConfigBuilder,
}

impl Default for TimkeTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TimkeTransportBuilder {
    /// Create a new transport builder
    pub fn new() -> Self {
        Self {
            config: TimkeConfigBuilder::new(),
        }
    }

    /// Name the KEM1 algorithm
    pub fn kem1(mut self, name: impl Into<String>) -> Self {
        self.config = self.config.kem1(name);
        self
    }

    /// Name the KEM2 algorithm
    pub fn kem2(mut self, name: impl Into<String>) -> Self {
        self.config = self.config.kem2(name);
        self
    }

    /// Set the handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.handshake_timeout(timeout);
        self
    }

    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config = self.config.max_message_size(size);
        self
    }

    /// Enable verbose logging
    pub fn verbose(mut self) -> Self {
        self.config = self.config.verbose();
        self
    }

    /// Build the transport
    pub fn build(self) -> Result<TimkeTransport> {
        Ok(TimkeTransport::new(self.config.build()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use rand::rngs::OsRng;
    use tokio::io::duplex;
    use tokio::net::{TcpListener, TcpStream};

    fn server_keys(config: &TimkeConfig) -> (PublicKey, PrivateKey) {
        config
            .kem1
            .generate_key_pair(&config.kem1.setup(), &mut OsRng)
            .unwrap()
    }

    #[tokio::test]
    async fn test_transport_upgrade_duplex() {
        let config = TimkeConfig::default();
        let (pk, sk) = server_keys(&config);
        let client_transport = TimkeTransport::new(config.clone());
        let server_transport = TimkeTransport::new(config);

        let (client_stream, server_stream) = duplex(64 * 1024);

        let (client_result, server_result) = tokio::join!(
            client_transport.upgrade_outbound(client_stream, pk, Some(b"early".as_slice())),
            server_transport.upgrade_inbound(server_stream, sk, |early| {
                assert_eq!(early, b"early");
                Some(b"welcome".to_vec())
            })
        );

        let (mut client_channel, stage2) = client_result.unwrap();
        let (mut server_channel, zero_rtt) = server_result.unwrap();
        assert_eq!(stage2, b"welcome");
        assert_eq!(zero_rtt, b"early");

        let message = b"Test message via transport";
        let (send_result, recv_result) =
            tokio::join!(client_channel.send(message), server_channel.recv());
        send_result.unwrap();
        assert_eq!(recv_result.unwrap().unwrap(), message.to_vec());
    }

    #[tokio::test]
    async fn test_transport_upgrade_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let config = TimkeConfig::from_names("OWChCCA-16", "OWChCCA-16").unwrap();
        let (pk, sk) = server_keys(&config);
        let client_transport = TimkeTransport::new(config.clone());
        let server_transport = TimkeTransport::new(config);

        let server_handle = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            server_transport.upgrade_inbound(socket, sk, |_| None).await
        });

        let socket = TcpStream::connect(addr).await.unwrap();
        let (mut client_channel, stage2) = client_transport
            .upgrade_outbound(socket, pk, None)
            .await
            .unwrap();
        let (mut server_channel, zero_rtt) = server_handle.await.unwrap().unwrap();
        assert!(stage2.is_empty());
        assert!(zero_rtt.is_empty());

        client_channel.send(b"ping").await.unwrap();
        assert_eq!(server_channel.recv().await.unwrap().unwrap(), b"ping".to_vec());

        server_channel.send(b"pong").await.unwrap();
        assert_eq!(client_channel.recv().await.unwrap().unwrap(), b"pong".to_vec());
    }

    #[tokio::test]
    async fn test_transport_builder() {
        let transport = TimkeTransportBuilder::new()
            .kem1("OWChCCA-32")
            .kem2("ML-KEM-768")
            .handshake_timeout(Duration::from_secs(10))
            .verbose()
            .build()
            .unwrap();
        assert_eq!(transport.config().kem1_name(), "OWChCCA-32");
        assert_eq!(transport.config().kem2_name(), "ML-KEM-768");

        assert!(TimkeTransportBuilder::new().kem1("unknown").build().is_err());
    }

    #[tokio::test]
    async fn test_garbage_hello_rejected() {
        let config = TimkeConfig::default();
        let (_, sk) = server_keys(&config);
        let transport = TimkeTransport::new(config);
        let (client_stream, server_stream) = duplex(8192);

        let mut raw = framed_with_limit(client_stream, 1024);
        raw.send(Bytes::from_static(&[0, 0, 0, 9, 1])).await.unwrap();

        let result = transport.upgrade_inbound(server_stream, sk, |_| None).await;
        assert!(matches!(
            result,
            Err(TimkeError::Codec(crate::error::CodecError::TruncatedMessage { .. }))
        ));
    }

    #[tokio::test]
    async fn test_transport_timeout() {
        use std::io;
        use std::pin::Pin;
        use std::task::{Context, Poll};

        // A stream that never completes reads (simulates network hang)
        struct HangingStream;

        impl AsyncRead for HangingStream {
            fn poll_read(
                self: Pin<&mut Self>,
                _cx: &mut Context<'_>,
                _buf: &mut tokio::io::ReadBuf<'_>,
            ) -> Poll<io::Result<()>> {
                Poll::Pending
            }
        }

        impl AsyncWrite for HangingStream {
            fn poll_write(
                self: Pin<&mut Self>,
                _cx: &mut Context<'_>,
                buf: &[u8],
            ) -> Poll<io::Result<usize>> {
                Poll::Ready(Ok(buf.len()))
            }

            fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
                Poll::Ready(Ok(()))
            }

            fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
                Poll::Ready(Ok(()))
            }
        }

        let config = TimkeConfig::default().with_timeout(Duration::from_millis(50));
        let (pk, _) = server_keys(&config);
        let transport = TimkeTransport::new(config);

        let result = transport.upgrade_outbound(HangingStream, pk, None).await;
        assert!(matches!(result, Err(TimkeError::Timeout)));
    }
}
