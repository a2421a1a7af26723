//! FrameNet - Typed envelopes over blocking sockets
//!
//! Frames serializable values into length-prefixed, type-tagged envelopes and
//! moves them over TCP streams or UDP datagrams. Sockets never panic on I/O
//! errors; they flip a sticky `valid` flag and keep going.

pub mod config;
pub mod network;
pub mod protocol;

pub use network::{
    Address, Datagram, ReceivedDatagram, ReceivedStreamMessage, Socket, SocketError,
    SocketHealth, SocketId, SocketKind, SocketOptions, SocketResult, StreamMiss,
};
pub use protocol::{decode_expecting, encode, peek_size, type_tag, CodecError, Envelope, Header};
