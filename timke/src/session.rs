//! Encrypted channel over an established TIMKE session

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use zeroize::Zeroizing;

use crate::engine::SessionCipher;
use crate::error::{HandshakeError, Result, TimkeError};
use crate::types::SessionState;

pub(crate) fn framed_with_limit<S>(socket: S, max_frame_len: usize) -> Framed<S, LengthDelimitedCodec>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut codec = LengthDelimitedCodec::new();
    codec.set_max_frame_length(max_frame_len);
    Framed::new(socket, codec)
}

/// Length-delimited records sealed under K_main.
///
/// Carries either a client or a server engine; both derive the same key, so
/// records flow in both directions.
pub struct SecureChannel<S> {
    /// The underlying framed stream
    stream: Framed<S, LengthDelimitedCodec>,
    /// Established engine
    engine: Box<dyn SessionCipher>,
    bytes_sent: u64,
    bytes_received: u64,
}

impl<S> SecureChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a socket with an engine that has completed its handshake.
    pub fn new(socket: S, engine: Box<dyn SessionCipher>, max_frame_len: usize) -> Result<Self> {
        Self::from_framed(framed_with_limit(socket, max_frame_len), engine)
    }

    /// Continue on the stream the handshake ran over, keeping any buffered frames.
    pub(crate) fn from_framed(
        stream: Framed<S, LengthDelimitedCodec>,
        engine: Box<dyn SessionCipher>,
    ) -> Result<Self> {
        let state = engine.state();
        if state != SessionState::Established {
            return Err(HandshakeError::InvalidState {
                operation: "open secure channel",
                state,
            }
            .into());
        }
        Ok(Self {
            stream,
            engine,
            bytes_sent: 0,
            bytes_received: 0,
        })
    }

    /// Get bytes sent
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Get bytes received
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn state(&self) -> SessionState {
        self.engine.state()
    }

    /// Copy of K_main
    pub fn session_key(&self) -> Option<Zeroizing<Vec<u8>>> {
        self.engine.session_key()
    }

    /// Send an encrypted message
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        let encrypted = self.engine.encrypt(data)?;
        self.bytes_sent += encrypted.len() as u64;
        self.stream
            .send(Bytes::from(encrypted))
            .await
            .map_err(TimkeError::from)
    }

    /// Receive and decrypt a message. `None` once the peer has closed.
    pub async fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        match self.stream.next().await {
            Some(Ok(frame)) => {
                self.bytes_received += frame.len() as u64;
                let decrypted = self.engine.decrypt(&frame)?;
                Ok(Some(decrypted))
            }
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Close the channel gracefully
    pub async fn close(mut self) -> Result<()> {
        SinkExt::<Bytes>::close(&mut self.stream)
            .await
            .map_err(TimkeError::from)
    }

    /// Get the underlying stream (consumes the channel)
    pub fn into_inner(self) -> Framed<S, LengthDelimitedCodec> {
        self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::TimkeClient;
    use crate::config::{TimkeConfig, DEFAULT_MAX_MESSAGE_SIZE};
    use crate::server::TimkeServer;
    use rand::rngs::OsRng;
    use tokio::io::duplex;

    fn established_pair() -> (TimkeClient, TimkeServer) {
        let config = TimkeConfig::default();
        let (pk, sk) = config
            .kem1
            .generate_key_pair(&config.kem1.setup(), &mut OsRng)
            .unwrap();
        let mut client = TimkeClient::new(config.clone(), pk).unwrap();
        let mut server = TimkeServer::new(config, sk);

        let hello = client.generate_client_hello(None).unwrap();
        server.process_client_hello(&hello).unwrap();
        let response = server.generate_server_response(None).unwrap();
        client.process_server_response(&response).unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn test_secure_channel_round_trip() {
        let (client, server) = established_pair();
        let (client_stream, server_stream) = duplex(8192);

        let mut client_channel =
            SecureChannel::new(client_stream, Box::new(client), DEFAULT_MAX_MESSAGE_SIZE).unwrap();
        let mut server_channel =
            SecureChannel::new(server_stream, Box::new(server), DEFAULT_MAX_MESSAGE_SIZE).unwrap();

        let message = b"Hello, quantum-secure world!";
        let (send_result, recv_result) =
            tokio::join!(client_channel.send(message), server_channel.recv());
        send_result.unwrap();
        assert_eq!(recv_result.unwrap().unwrap(), message.to_vec());

        let reply = b"Response from server";
        let (send_result, recv_result) =
            tokio::join!(server_channel.send(reply), client_channel.recv());
        send_result.unwrap();
        assert_eq!(recv_result.unwrap().unwrap(), reply.to_vec());

        assert!(client_channel.bytes_sent() > message.len() as u64);
        assert_eq!(client_channel.bytes_sent(), server_channel.bytes_received());
        assert_eq!(
            &client_channel.session_key().unwrap()[..],
            &server_channel.session_key().unwrap()[..]
        );
    }

    #[tokio::test]
    async fn test_channel_requires_established_engine() {
        let config = TimkeConfig::default();
        let (pk, _) = config
            .kem1
            .generate_key_pair(&config.kem1.setup(), &mut OsRng)
            .unwrap();
        let client = TimkeClient::new(config, pk).unwrap();
        let (stream, _peer) = duplex(64);

        let result = SecureChannel::new(stream, Box::new(client), DEFAULT_MAX_MESSAGE_SIZE);
        assert!(matches!(
            result,
            Err(TimkeError::Handshake(HandshakeError::InvalidState {
                state: SessionState::Initial,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn test_recv_after_close_is_none() {
        let (client, server) = established_pair();
        let (client_stream, server_stream) = duplex(8192);

        let client_channel =
            SecureChannel::new(client_stream, Box::new(client), DEFAULT_MAX_MESSAGE_SIZE).unwrap();
        let mut server_channel =
            SecureChannel::new(server_stream, Box::new(server), DEFAULT_MAX_MESSAGE_SIZE).unwrap();

        client_channel.close().await.unwrap();
        assert!(server_channel.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tampered_record_fails_session() {
        let (client, server) = established_pair();
        let (client_stream, server_stream) = duplex(8192);

        let mut raw = framed_with_limit(client_stream, DEFAULT_MAX_MESSAGE_SIZE);
        let mut server_channel =
            SecureChannel::new(server_stream, Box::new(server), DEFAULT_MAX_MESSAGE_SIZE).unwrap();

        let mut client = client;
        let mut record = client.encrypt(b"payload").unwrap();
        let last = record.len() - 1;
        record[last] ^= 0x01;
        raw.send(Bytes::from(record)).await.unwrap();

        assert!(matches!(
            server_channel.recv().await,
            Err(TimkeError::Handshake(HandshakeError::UnsealFailed(_)))
        ));
        assert_eq!(server_channel.state(), SessionState::Failed);
    }
}
