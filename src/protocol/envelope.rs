//! Envelope definitions
//!
//! An envelope is the length-prefixed, type-tagged unit exchanged between
//! endpoints. Its bytes are kept exactly as they travel on the wire.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;

use super::codec::{self, CodecError};
use super::{HEADER_SIZE, MAX_ENVELOPE_SIZE};
use crate::network::SocketId;

/// Fixed-width envelope header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Envelope size in bytes, header included
    pub total_size: u32,
    /// Tag identifying the payload type
    pub type_tag: u64,
}

impl Header {
    /// Parse a header from the front of `bytes`
    ///
    /// Returns `None` if fewer than [`HEADER_SIZE`] bytes are available.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_SIZE {
            return None;
        }

        let mut buf = &bytes[..HEADER_SIZE];
        Some(Self {
            total_size: buf.get_u32(),
            type_tag: buf.get_u64(),
        })
    }

    /// Write the header in wire order
    pub fn write(&self, buf: &mut BytesMut) {
        buf.put_u32(self.total_size);
        buf.put_u64(self.type_tag);
    }

    /// Number of body bytes this header announces
    pub fn body_len(&self) -> usize {
        (self.total_size as usize).saturating_sub(HEADER_SIZE)
    }
}

/// A complete envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    bytes: Bytes,
    received_on: Option<SocketId>,
}

impl Envelope {
    /// Wrap raw wire bytes, checking that the header's size matches them
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<Self, CodecError> {
        let bytes = bytes.into();
        let header = Header::parse(&bytes).ok_or(CodecError::Incomplete(bytes.len()))?;

        if bytes.len() > MAX_ENVELOPE_SIZE {
            return Err(CodecError::MessageTooLarge(bytes.len(), MAX_ENVELOPE_SIZE));
        }

        if header.total_size as usize != bytes.len() {
            return Err(CodecError::SizeMismatch {
                declared: header.total_size,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            bytes,
            received_on: None,
        })
    }

    /// Bytes produced by the encoder, already consistent with their header
    pub(super) fn from_encoded(bytes: Bytes) -> Self {
        Self {
            bytes,
            received_on: None,
        }
    }

    pub(crate) fn with_receiver(mut self, socket: SocketId) -> Self {
        self.received_on = Some(socket);
        self
    }

    /// The parsed header
    pub fn header(&self) -> Header {
        // Every constructor validated at least HEADER_SIZE bytes
        let mut buf = &self.bytes[..HEADER_SIZE];
        Header {
            total_size: buf.get_u32(),
            type_tag: buf.get_u64(),
        }
    }

    pub fn total_size(&self) -> u32 {
        self.header().total_size
    }

    pub fn type_tag(&self) -> u64 {
        self.header().type_tag
    }

    /// Serialized payload bytes
    pub fn body(&self) -> &[u8] {
        &self.bytes[HEADER_SIZE..]
    }

    /// The full envelope as it travels on the wire
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Socket this envelope arrived on, if it was received from a stream
    pub fn received_on(&self) -> Option<SocketId> {
        self.received_on
    }

    /// Whether the type tag matches `T`
    pub fn carries<T: ?Sized>(&self) -> bool {
        self.type_tag() == codec::type_tag::<T>()
    }

    /// Decode the payload as `T`, or `None` if the envelope holds something else
    pub fn decode<T: DeserializeOwned>(&self) -> Option<T> {
        codec::decode_expecting(&self.bytes)
    }

    /// Decode the payload, reporting why it was rejected
    pub fn try_decode<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        codec::try_decode(&self.bytes)
    }
}

impl AsRef<[u8]> for Envelope {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}
