//! Canonical wire encoding of the two handshake messages.
//!
//! Every field is a 4-byte big-endian length followed by that many bytes.
//! Absent optional fields are zero-length.
//!
//! ```text
//! ClientHello    = field(epk) field(ct1) field(payload) field(kem1) field(kem2)
//! ServerResponse = field(ct2) field(payload)
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::CodecError;
use crate::types::{ClientHello, ServerResponse};

const LENGTH_PREFIX: usize = 4;

/// A handshake message with a canonical byte encoding.
pub trait WireMessage: Sized {
    /// Human-readable message name for logs and errors.
    const NAME: &'static str;

    fn encode(&self) -> Result<Bytes, CodecError>;

    fn decode(bytes: &[u8]) -> Result<Self, CodecError>;
}

fn put_field(buf: &mut BytesMut, field: &[u8]) -> Result<(), CodecError> {
    let len = u32::try_from(field.len()).map_err(|_| CodecError::FieldTooLarge(field.len()))?;
    buf.put_u32(len);
    buf.put_slice(field);
    Ok(())
}

struct FieldReader<'a> {
    buf: &'a [u8],
}

impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn field(&mut self) -> Result<&'a [u8], CodecError> {
        if self.buf.remaining() < LENGTH_PREFIX {
            return Err(CodecError::TruncatedMessage {
                needed: LENGTH_PREFIX,
                remaining: self.buf.remaining(),
            });
        }
        let len = self.buf.get_u32() as usize;
        if self.buf.remaining() < len {
            return Err(CodecError::TruncatedMessage {
                needed: len,
                remaining: self.buf.remaining(),
            });
        }
        let (field, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok(field)
    }

    fn name(&mut self) -> Result<String, CodecError> {
        let raw = self.field()?;
        String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidAlgorithmName)
    }

    fn finish(self) -> Result<(), CodecError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(CodecError::TrailingData(self.buf.len()))
        }
    }
}

impl WireMessage for ClientHello {
    const NAME: &'static str = "ClientHello";

    fn encode(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::with_capacity(
            5 * LENGTH_PREFIX
                + self.ephemeral_public_key.len()
                + self.ciphertext1.len()
                + self.encrypted_payload.len()
                + self.kem1_name.len()
                + self.kem2_name.len(),
        );
        put_field(&mut buf, &self.ephemeral_public_key)?;
        put_field(&mut buf, &self.ciphertext1)?;
        put_field(&mut buf, &self.encrypted_payload)?;
        put_field(&mut buf, self.kem1_name.as_bytes())?;
        put_field(&mut buf, self.kem2_name.as_bytes())?;
        Ok(buf.freeze())
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(bytes);
        let ephemeral_public_key = reader.field()?.to_vec();
        let ciphertext1 = reader.field()?.to_vec();
        let encrypted_payload = reader.field()?.to_vec();
        let kem1_name = reader.name()?;
        let kem2_name = reader.name()?;
        reader.finish()?;
        Ok(Self {
            ephemeral_public_key,
            ciphertext1,
            encrypted_payload,
            kem1_name,
            kem2_name,
        })
    }
}

impl WireMessage for ServerResponse {
    const NAME: &'static str = "ServerResponse";

    fn encode(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::with_capacity(
            2 * LENGTH_PREFIX + self.ciphertext2.len() + self.encrypted_payload.len(),
        );
        put_field(&mut buf, &self.ciphertext2)?;
        put_field(&mut buf, &self.encrypted_payload)?;
        Ok(buf.freeze())
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(bytes);
        let ciphertext2 = reader.field()?.to_vec();
        let encrypted_payload = reader.field()?.to_vec();
        reader.finish()?;
        Ok(Self {
            ciphertext2,
            encrypted_payload,
        })
    }
}
