//! Protocol codec for encoding/decoding envelopes
//!
//! Handles payload serialization, type tagging and the size checks that
//! keep a receiver from ever interpreting a foreign or damaged envelope.

use bincode::Options;
use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use super::{Envelope, Header, HEADER_SIZE, MAX_ENVELOPE_SIZE, SIZE_FIELD_LEN};

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Incomplete envelope: {0} bytes is shorter than the header")]
    Incomplete(usize),

    #[error("Size mismatch: header declares {declared} bytes, got {actual}")]
    SizeMismatch { declared: u32, actual: usize },

    #[error("Type tag mismatch: expected {expected:#018x}, found {found:#018x}")]
    TypeMismatch { expected: u64, found: u64 },

    #[error("Envelope too large: {0} bytes (max: {1})")]
    MessageTooLarge(usize, usize),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Body encoding shared by both ends of a connection
fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_big_endian()
        .with_limit(MAX_ENVELOPE_SIZE as u64)
        .reject_trailing_bytes()
}

/// Type tag for `T`: xxh3 of its fully qualified type name
///
/// Both endpoints must name the payload by the same type; `String` and `str`
/// produce different tags.
pub fn type_tag<T: ?Sized>() -> u64 {
    xxhash_rust::xxh3::xxh3_64(std::any::type_name::<T>().as_bytes())
}

/// Encode a payload into an envelope
pub fn encode<T: Serialize + ?Sized>(payload: &T) -> CodecResult<Envelope> {
    let body = wire_options().serialize(payload)?;

    let total_size = HEADER_SIZE + body.len();
    if total_size > MAX_ENVELOPE_SIZE {
        return Err(CodecError::MessageTooLarge(total_size, MAX_ENVELOPE_SIZE));
    }

    let mut buf = BytesMut::with_capacity(total_size);
    Header {
        total_size: total_size as u32,
        type_tag: type_tag::<T>(),
    }
    .write(&mut buf);
    buf.put_slice(&body);

    Ok(Envelope::from_encoded(buf.freeze()))
}

/// Decode `bytes` as one envelope carrying a `T`
pub fn try_decode<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    let header = Header::parse(bytes).ok_or(CodecError::Incomplete(bytes.len()))?;

    if header.total_size as usize != bytes.len() {
        return Err(CodecError::SizeMismatch {
            declared: header.total_size,
            actual: bytes.len(),
        });
    }

    let expected = type_tag::<T>();
    if header.type_tag != expected {
        return Err(CodecError::TypeMismatch {
            expected,
            found: header.type_tag,
        });
    }

    Ok(wire_options().deserialize(&bytes[HEADER_SIZE..])?)
}

/// Decode `bytes` as one envelope carrying a `T`, or `None` on any mismatch
pub fn decode_expecting<T: DeserializeOwned>(bytes: &[u8]) -> Option<T> {
    try_decode(bytes).ok()
}

/// Read the size field from the front of a stream without consuming it
///
/// Returns `None` until at least [`SIZE_FIELD_LEN`] bytes are available.
pub fn peek_size(prefix: &[u8]) -> Option<u32> {
    let field: [u8; SIZE_FIELD_LEN] = prefix.get(..SIZE_FIELD_LEN)?.try_into().ok()?;
    Some(u32::from_be_bytes(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Position {
        x: i32,
        y: i32,
        label: String,
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let original = Position {
            x: 100,
            y: -50,
            label: "cursor".to_string(),
        };
        let envelope = encode(&original).unwrap();

        assert_eq!(envelope.total_size() as usize, envelope.len());
        assert_eq!(decode_expecting::<Position>(envelope.as_bytes()), Some(original));

        let text = "hello".to_string();
        let envelope = encode(&text).unwrap();
        assert_eq!(decode_expecting::<String>(envelope.as_bytes()), Some(text));

        let envelope = encode(&-17i32).unwrap();
        assert_eq!(envelope.len(), HEADER_SIZE + 4);
        assert_eq!(decode_expecting::<i32>(envelope.as_bytes()), Some(-17));
    }

    #[test]
    fn test_type_mismatch_with_equal_lengths() {
        let envelope = encode(&5u32).unwrap();

        assert!(decode_expecting::<i32>(envelope.as_bytes()).is_none());
        assert!(decode_expecting::<f32>(envelope.as_bytes()).is_none());
        assert!(matches!(
            try_decode::<i32>(envelope.as_bytes()),
            Err(CodecError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_body_rejected() {
        let envelope = encode(&Position {
            x: 1,
            y: 2,
            label: "abc".to_string(),
        })
        .unwrap();
        let bytes = envelope.as_bytes();

        for len in 0..bytes.len() {
            assert!(decode_expecting::<Position>(&bytes[..len]).is_none());
        }
    }

    #[test]
    fn test_padded_body_rejected() {
        let envelope = encode(&9u64).unwrap();
        let mut padded = envelope.as_bytes().to_vec();
        padded.extend_from_slice(&[0, 0]);

        assert!(matches!(
            try_decode::<u64>(&padded),
            Err(CodecError::SizeMismatch { declared: 20, actual: 22 })
        ));
    }

    #[test]
    fn test_body_must_match_declared_size() {
        // Header claims the right total, but the body is one byte short of a u64
        let mut bytes = BytesMut::new();
        Header {
            total_size: (HEADER_SIZE + 7) as u32,
            type_tag: type_tag::<u64>(),
        }
        .write(&mut bytes);
        bytes.put_slice(&[0; 7]);
        assert!(decode_expecting::<u64>(&bytes).is_none());

        // ... and one byte longer
        let mut bytes = BytesMut::new();
        Header {
            total_size: (HEADER_SIZE + 9) as u32,
            type_tag: type_tag::<u64>(),
        }
        .write(&mut bytes);
        bytes.put_slice(&[0; 9]);
        assert!(decode_expecting::<u64>(&bytes).is_none());
    }

    #[test]
    fn test_garbled_length_prefix_does_not_allocate() {
        let mut bytes = BytesMut::new();
        Header {
            total_size: (HEADER_SIZE + 8) as u32,
            type_tag: type_tag::<Vec<u8>>(),
        }
        .write(&mut bytes);
        bytes.put_u64(u64::MAX);

        assert!(decode_expecting::<Vec<u8>>(&bytes).is_none());
    }

    #[test]
    fn test_type_tag_is_stable() {
        assert_eq!(type_tag::<Position>(), type_tag::<Position>());
        assert_ne!(type_tag::<String>(), type_tag::<str>());
        assert_ne!(type_tag::<u32>(), type_tag::<i32>());
    }

    #[test]
    fn test_peek_size() {
        let envelope = encode(&[7u8; 10]).unwrap();

        assert_eq!(peek_size(envelope.as_bytes()), Some(22));
        assert_eq!(peek_size(&envelope.as_bytes()[..SIZE_FIELD_LEN]), Some(22));
        assert_eq!(peek_size(&envelope.as_bytes()[..SIZE_FIELD_LEN - 1]), None);
        assert_eq!(peek_size(&[]), None);
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let payload = vec![0u8; MAX_ENVELOPE_SIZE];
        assert!(encode(&payload).is_err());
    }
}
