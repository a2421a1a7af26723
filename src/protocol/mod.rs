//! Protocol module - Defines the envelope wire format
//!
//! Every message travels as one envelope:
//! - 4 bytes total size, header included (big-endian)
//! - 8 bytes type tag (big-endian)
//! - Variable length body (bincode, fixed-width big-endian integers)

mod codec;
mod envelope;
mod message;

pub use codec::*;
pub use envelope::*;
pub use message::*;

/// Default port for framenet endpoints
pub const DEFAULT_PORT: u16 = 24810;

/// Width of the leading size field, the part of the header a stream reader peeks
pub const SIZE_FIELD_LEN: usize = 4;

/// Header size: total_size(4) + type_tag(8) = 12 bytes
pub const HEADER_SIZE: usize = SIZE_FIELD_LEN + 8;

/// Maximum envelope size (10 MB)
pub const MAX_ENVELOPE_SIZE: usize = 10 * 1024 * 1024;

/// Largest payload a single IPv4 UDP datagram can carry
pub const MAX_DATAGRAM_SIZE: usize = 65_507;
