//! Socket handling for framenet
//!
//! A [`Socket`] owns one OS endpoint and tracks its health with a sticky
//! `valid` flag:
//! - Every OS-level failure clears the flag and is logged
//! - Foreign, damaged or mistyped messages never touch the flag
//! - Once cleared, the flag stays cleared for the socket's lifetime
//!
//! Operations are blocking and never guarded by the flag; an invalid socket
//! still forwards calls to the OS.

use std::fmt;
use std::io::{self, Read, Write};
use std::mem::MaybeUninit;
use std::net::{Shutdown, TcpListener, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use socket2::{Domain, Protocol, SockAddr, Type};
use thiserror::Error;

use super::{Address, AddressError, ReceivedDatagram, ReceivedStreamMessage, StreamMiss};
use crate::protocol::{
    self, CodecError, Envelope, HEADER_SIZE, MAX_DATAGRAM_SIZE, MAX_ENVELOPE_SIZE, SIZE_FIELD_LEN,
};

/// Pending connections a listening socket queues
pub const LISTEN_BACKLOG: i32 = 128;

static NEXT_SOCKET_ID: AtomicU64 = AtomicU64::new(1);

/// Socket errors
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("{op} failed: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{op} failed: socket has no OS handle")]
    NoHandle { op: &'static str },

    /// Timed out or interrupted; the socket stays valid
    #[error("{op} did not complete: {source}")]
    Transient {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Address error: {0}")]
    Address(#[from] AddressError),

    #[error("Protocol error: {0}")]
    Codec(#[from] CodecError),
}

impl SocketError {
    /// Whether the OS rejected the operation (as opposed to the caller's input)
    pub fn is_fault(&self) -> bool {
        matches!(self, SocketError::Io { .. } | SocketError::NoHandle { .. })
    }
}

pub type SocketResult<T> = Result<T, SocketError>;

/// Kind of OS endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketKind {
    /// Connection-oriented byte stream (TCP)
    Stream,
    /// Connectionless, message-atomic (UDP)
    Datagram,
}

/// Process-unique socket identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(u64);

impl SocketId {
    fn next() -> Self {
        Self(NEXT_SOCKET_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A handle for watching a socket's validity from another thread
#[derive(Clone, Debug)]
pub struct SocketHealth {
    id: SocketId,
    valid: Arc<AtomicBool>,
}

impl SocketHealth {
    pub fn id(&self) -> SocketId {
        self.id
    }

    /// Check if the socket has not seen an OS failure yet
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }
}

/// An owned OS endpoint exchanging envelopes
#[derive(Debug)]
pub struct Socket {
    id: SocketId,
    kind: SocketKind,
    /// `None` is the "invalid handle" sentinel
    inner: Option<socket2::Socket>,
    valid: Arc<AtomicBool>,
    max_envelope_size: usize,
}

impl Socket {
    /// Open a new IPv4 endpoint of the given kind
    ///
    /// If the OS refuses, the socket is returned already invalid.
    pub fn new(kind: SocketKind) -> Self {
        let (ty, proto) = match kind {
            SocketKind::Stream => (Type::STREAM, Protocol::TCP),
            SocketKind::Datagram => (Type::DGRAM, Protocol::UDP),
        };

        match socket2::Socket::new(Domain::IPV4, ty, Some(proto)) {
            Ok(inner) => Self::wrap(kind, Some(inner)),
            Err(err) => {
                let socket = Self::wrap(kind, None);
                socket.invalidate("create", &err);
                socket
            }
        }
    }

    /// Take ownership of an existing handle; `None` yields an invalid socket
    pub fn wrap(kind: SocketKind, handle: Option<socket2::Socket>) -> Self {
        Self {
            id: SocketId::next(),
            kind,
            valid: Arc::new(AtomicBool::new(handle.is_some())),
            inner: handle,
            max_envelope_size: MAX_ENVELOPE_SIZE,
        }
    }

    /// Move the handle into a new socket, leaving this one empty
    ///
    /// The emptied socket is invalid and closes nothing when dropped.
    pub fn take(&mut self) -> Socket {
        let empty = Self {
            id: SocketId::next(),
            kind: self.kind,
            inner: None,
            valid: Arc::new(AtomicBool::new(false)),
            max_envelope_size: self.max_envelope_size,
        };
        std::mem::replace(self, empty)
    }

    pub fn id(&self) -> SocketId {
        self.id
    }

    pub fn kind(&self) -> SocketKind {
        self.kind
    }

    /// Check if no OS failure has been seen on this socket
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    pub fn health(&self) -> SocketHealth {
        SocketHealth {
            id: self.id,
            valid: self.valid.clone(),
        }
    }

    pub fn max_envelope_size(&self) -> usize {
        self.max_envelope_size
    }

    /// Largest envelope [`receive`](Self::receive) will allocate for
    pub fn set_max_envelope_size(&mut self, max: usize) {
        self.max_envelope_size = max.clamp(HEADER_SIZE, MAX_ENVELOPE_SIZE);
    }

    /// Borrow the OS handle, e.g. to set options not exposed here
    pub fn as_raw(&self) -> Option<&socket2::Socket> {
        self.inner.as_ref()
    }

    pub fn set_broadcast(&self, enable: bool) -> SocketResult<()> {
        self.os("set_broadcast", |s| s.set_broadcast(enable))
    }

    pub fn set_reusable(&self, enable: bool) -> SocketResult<()> {
        self.os("set_reusable", |s| s.set_reuse_address(enable))
    }

    /// Bound every blocking read; `None` blocks indefinitely
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> SocketResult<()> {
        self.os("set_read_timeout", |s| s.set_read_timeout(timeout))
    }

    /// Bind to a local port and literal IPv4 address
    pub fn bind(&self, port: u16, ip: &str) -> SocketResult<()> {
        let addr = SockAddr::from(Address::new(ip, port).to_socket_addr()?);
        self.os("bind", |s| s.bind(&addr))
    }

    pub fn listen(&self) -> SocketResult<()> {
        self.os("listen", |s| s.listen(LISTEN_BACKLOG))
    }

    pub fn connect(&self, address: &Address) -> SocketResult<()> {
        let addr = SockAddr::from(address.to_socket_addr()?);
        self.os("connect", |s| s.connect(&addr))
    }

    /// Address the OS assigned to this end, or `0.0.0.0:0` on failure
    pub fn local_address(&self) -> Address {
        self.os("local_address", |s| s.local_addr())
            .ok()
            .and_then(|addr| addr.as_socket())
            .map(Address::from)
            .unwrap_or_default()
    }

    /// Address of the connected peer, or `0.0.0.0:0` on failure
    pub fn peer_address(&self) -> Address {
        self.os("peer_address", |s| s.peer_addr())
            .ok()
            .and_then(|addr| addr.as_socket())
            .map(Address::from)
            .unwrap_or_default()
    }

    /// Stop both directions of the connection
    pub fn shutdown(&self) -> SocketResult<()> {
        self.os("shutdown", |s| s.shutdown(Shutdown::Both))
    }

    /// Wait for an inbound connection
    ///
    /// On failure this socket is invalidated and the returned one wraps the
    /// invalid handle.
    pub fn accept(&self) -> Socket {
        match self.os("accept", |s| s.accept()) {
            Ok((inner, peer)) => {
                let mut accepted = Socket::wrap(SocketKind::Stream, Some(inner));
                accepted.max_envelope_size = self.max_envelope_size;
                tracing::debug!(
                    listener = %self.id,
                    socket = %accepted.id,
                    peer = ?peer.as_socket(),
                    "Accepted connection"
                );
                accepted
            }
            Err(_) => Socket::wrap(SocketKind::Stream, None),
        }
    }

    /// Send `payload` as one datagram
    pub fn send_to<T: Serialize + ?Sized>(&self, address: &Address, payload: &T) -> SocketResult<()> {
        let target = SockAddr::from(address.to_socket_addr()?);
        let envelope = protocol::encode(payload)?;

        if envelope.len() > MAX_DATAGRAM_SIZE {
            return Err(CodecError::MessageTooLarge(envelope.len(), MAX_DATAGRAM_SIZE).into());
        }

        self.os("send_to", |s| {
            let sent = s.send_to(envelope.as_bytes(), &target)?;
            if sent == envelope.len() {
                Ok(())
            } else {
                Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("sent {} of {} bytes", sent, envelope.len()),
                ))
            }
        })
    }

    /// Read one datagram and decode it as `T`
    ///
    /// Datagrams of another size or type are dropped without invalidating
    /// the socket; only an OS read failure does that.
    pub fn receive_any<T: DeserializeOwned>(&self) -> ReceivedDatagram<T> {
        let mut buf: Vec<u8> = Vec::with_capacity(MAX_DATAGRAM_SIZE);

        let (len, sender) = match self.os("receive_any", |s| s.recv_from(buf.spare_capacity_mut())) {
            Ok(received) => received,
            Err(_) => return ReceivedDatagram::Nothing,
        };
        // SAFETY: recv_from initialized the first `len` bytes of the spare capacity
        unsafe { buf.set_len(len) };

        let Some(from) = sender.as_socket().map(Address::from) else {
            tracing::debug!(socket = %self.id, "Dropping datagram from a non-IP sender");
            return ReceivedDatagram::Nothing;
        };

        match protocol::try_decode::<T>(&buf) {
            Ok(payload) => ReceivedDatagram::new(from, payload),
            Err(err) => {
                tracing::debug!(socket = %self.id, %from, "Dropping datagram: {}", err);
                ReceivedDatagram::Nothing
            }
        }
    }

    /// Write a whole envelope to the stream
    pub fn send(&self, envelope: &Envelope) -> SocketResult<()> {
        self.os("send", |mut s| s.write_all(envelope.as_bytes()))
    }

    /// Encode `payload` and write it to the stream
    pub fn send_payload<T: Serialize + ?Sized>(&self, payload: &T) -> SocketResult<()> {
        let envelope = protocol::encode(payload)?;
        self.send(&envelope)
    }

    /// Read the next envelope from the stream
    ///
    /// Peeks the size field first, then blocks until exactly that many bytes
    /// have arrived. The returned envelope remembers this socket's id.
    pub fn receive(&self) -> ReceivedStreamMessage {
        let mut prefix = [0u8; SIZE_FIELD_LEN];
        let peeked = match self.os("receive", |s| peek_size_field(s, &mut prefix)) {
            Ok(peeked) => peeked,
            Err(err) if err.is_fault() => return ReceivedStreamMessage::Nothing(StreamMiss::Fault),
            Err(_) => return ReceivedStreamMessage::Nothing(StreamMiss::Pending),
        };

        if peeked == 0 {
            return ReceivedStreamMessage::Nothing(StreamMiss::Closed);
        }

        let Some(declared) = protocol::peek_size(&prefix[..peeked]) else {
            // A waiting peek without a timeout only comes up short at end of stream
            if PEEK_WAITS_FOR_SIZE_FIELD && !self.has_read_timeout() {
                tracing::debug!(socket = %self.id, peeked, "Connection closed inside a size field");
                return ReceivedStreamMessage::Nothing(StreamMiss::Closed);
            }
            tracing::trace!(socket = %self.id, peeked, "Size field not complete yet");
            return ReceivedStreamMessage::Nothing(StreamMiss::Pending);
        };

        let total_size = declared as usize;
        if total_size < HEADER_SIZE || total_size > self.max_envelope_size {
            tracing::debug!(
                socket = %self.id,
                declared,
                max = self.max_envelope_size,
                "Rejecting envelope with an impossible size"
            );
            return ReceivedStreamMessage::Nothing(StreamMiss::Malformed { declared });
        }

        let mut buf = vec![0u8; total_size];
        let complete = self.os("receive", |mut s| match s.read_exact(&mut buf) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
            Err(err) => Err(err),
        });

        match complete {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(socket = %self.id, declared, "Connection closed mid-envelope");
                return ReceivedStreamMessage::Nothing(StreamMiss::Closed);
            }
            Err(err) if err.is_fault() => return ReceivedStreamMessage::Nothing(StreamMiss::Fault),
            Err(_) => return ReceivedStreamMessage::Nothing(StreamMiss::Pending),
        }

        match Envelope::from_bytes(buf) {
            Ok(envelope) => ReceivedStreamMessage::Message(envelope.with_receiver(self.id)),
            Err(err) => {
                tracing::debug!(socket = %self.id, "Dropping envelope: {}", err);
                ReceivedStreamMessage::Nothing(StreamMiss::Malformed { declared })
            }
        }
    }

    fn has_read_timeout(&self) -> bool {
        self.inner
            .as_ref()
            .and_then(|s| s.read_timeout().ok())
            .flatten()
            .is_some()
    }

    /// Run one OS call, invalidating the socket if it fails
    ///
    /// Timeouts and interruptions are reported but leave the socket valid.
    fn os<T>(
        &self,
        op: &'static str,
        call: impl FnOnce(&socket2::Socket) -> io::Result<T>,
    ) -> SocketResult<T> {
        let Some(inner) = self.inner.as_ref() else {
            self.invalidate(op, &"no OS handle");
            return Err(SocketError::NoHandle { op });
        };

        call(inner).map_err(|source| {
            if is_transient(&source) {
                tracing::trace!(socket = %self.id, op, "{}", source);
                SocketError::Transient { op, source }
            } else {
                self.invalidate(op, &source);
                SocketError::Io { op, source }
            }
        })
    }

    fn invalidate(&self, op: &str, reason: &dyn fmt::Display) {
        self.valid.store(false, Ordering::SeqCst);
        tracing::warn!(socket = %self.id, op, "Socket fault: {}", reason);
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            tracing::trace!(socket = %self.id, "Closing socket");
            drop(inner);
        }
    }
}

impl From<TcpStream> for Socket {
    fn from(stream: TcpStream) -> Self {
        Socket::wrap(SocketKind::Stream, Some(stream.into()))
    }
}

impl From<TcpListener> for Socket {
    fn from(listener: TcpListener) -> Self {
        Socket::wrap(SocketKind::Stream, Some(listener.into()))
    }
}

impl From<UdpSocket> for Socket {
    fn from(socket: UdpSocket) -> Self {
        Socket::wrap(SocketKind::Datagram, Some(socket.into()))
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

/// Whether [`peek_size_field`] blocks until the whole field or end of stream
const PEEK_WAITS_FOR_SIZE_FIELD: bool = cfg!(unix);

/// Peek the size field without consuming it
#[cfg(unix)]
fn peek_size_field(s: &socket2::Socket, prefix: &mut [u8; SIZE_FIELD_LEN]) -> io::Result<usize> {
    s.recv_with_flags(as_uninit(prefix), libc::MSG_PEEK | libc::MSG_WAITALL)
}

/// Peek the size field without consuming it
#[cfg(not(unix))]
fn peek_size_field(s: &socket2::Socket, prefix: &mut [u8; SIZE_FIELD_LEN]) -> io::Result<usize> {
    s.peek(as_uninit(prefix))
}

/// View an initialized buffer the way socket2's receive calls expect
fn as_uninit(buf: &mut [u8]) -> &mut [MaybeUninit<u8>] {
    // SAFETY: MaybeUninit<u8> has the layout of u8, and the OS only ever
    // writes initialized bytes into the slice.
    unsafe { &mut *(buf as *mut [u8] as *mut [MaybeUninit<u8>]) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode;
    use std::thread;

    fn loopback(kind: SocketKind) -> (Socket, Address) {
        let socket = Socket::new(kind);
        socket.bind(0, "127.0.0.1").unwrap();
        let address = socket.local_address();
        (socket, address)
    }

    fn listener() -> (Socket, Address) {
        let (socket, address) = loopback(SocketKind::Stream);
        socket.listen().unwrap();
        (socket, address)
    }

    /// A loopback address nothing is listening on
    fn closed_port() -> Address {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = Address::from(listener.local_addr().unwrap());
        drop(listener);
        address
    }

    #[test]
    fn test_datagram_to_self() {
        let (socket, local) = loopback(SocketKind::Datagram);
        assert_eq!(local.ip(), "127.0.0.1");
        assert_ne!(local.port(), 0);

        socket.send_to(&local, &1234i32).unwrap();

        let received = socket.receive_any::<i32>();
        assert_eq!(received, ReceivedDatagram::new(local, 1234));
        assert!(socket.is_valid());
    }

    #[test]
    fn test_foreign_datagrams_leave_socket_valid() {
        let (socket, local) = loopback(SocketKind::Datagram);
        let raw = UdpSocket::bind("127.0.0.1:0").unwrap();

        raw.send_to(b"not an envelope", local.to_socket_addr().unwrap())
            .unwrap();
        assert!(!socket.receive_any::<i32>().is_valid());
        assert!(socket.is_valid());

        // Same length as an i32 envelope, different type tag
        socket.send_to(&local, &77u32).unwrap();
        assert!(!socket.receive_any::<i32>().is_valid());
        assert!(socket.is_valid());

        socket.send_to(&local, &77i32).unwrap();
        assert_eq!(socket.receive_any::<i32>().into_payload(), Some(77));
    }

    #[test]
    fn test_datagram_receive_timeout_is_not_a_fault() {
        let (socket, _) = loopback(SocketKind::Datagram);
        socket
            .set_read_timeout(Some(Duration::from_millis(50)))
            .unwrap();

        assert!(!socket.receive_any::<i32>().is_valid());
        assert!(socket.is_valid());
    }

    #[test]
    fn test_caller_errors_are_not_faults() {
        let (socket, local) = loopback(SocketKind::Datagram);

        let err = socket
            .send_to(&Address::new("not-an-ip", 9), &1u8)
            .unwrap_err();
        assert!(matches!(err, SocketError::Address(_)));
        assert!(!err.is_fault());

        let err = socket.send_to(&local, &vec![0u8; 70_000]).unwrap_err();
        assert!(matches!(err, SocketError::Codec(CodecError::MessageTooLarge(..))));

        assert!(socket.is_valid());
    }

    #[test]
    fn test_stream_envelope() {
        let (listener, address) = listener();
        let client = Socket::new(SocketKind::Stream);
        client.connect(&address).unwrap();
        client.send(&encode(&[7u8; 10]).unwrap()).unwrap();

        let accepted = listener.accept();
        assert!(accepted.is_valid());
        assert_eq!(accepted.peer_address(), client.local_address());

        let received = accepted.receive();
        let envelope = received.envelope().unwrap();
        assert_eq!(envelope.total_size() as usize, 10 + HEADER_SIZE);
        assert_eq!(envelope.received_on(), Some(accepted.id()));
        assert_eq!(envelope.decode::<[u8; 10]>(), Some([7u8; 10]));
    }

    #[test]
    fn test_stream_keeps_envelope_boundaries() {
        let (listener, address) = listener();
        let client = Socket::new(SocketKind::Stream);
        client.connect(&address).unwrap();

        client.send_payload(&"first".to_string()).unwrap();
        client.send_payload(&2u64).unwrap();
        client.send_payload(&"third".to_string()).unwrap();

        let accepted = listener.accept();
        assert_eq!(accepted.receive().decode::<String>().as_deref(), Some("first"));
        assert_eq!(accepted.receive().decode::<u64>(), Some(2));
        assert_eq!(accepted.receive().decode::<String>().as_deref(), Some("third"));
    }

    #[test]
    fn test_stream_closed_mid_envelope() {
        let (listener, address) = listener();

        let mut raw = TcpStream::connect(address.to_socket_addr().unwrap()).unwrap();
        raw.write_all(&22u32.to_be_bytes()).unwrap();
        drop(raw);

        let accepted = listener.accept();
        assert_eq!(
            accepted.receive(),
            ReceivedStreamMessage::Nothing(StreamMiss::Closed)
        );
        assert!(accepted.is_valid());
    }

    #[test]
    fn test_stream_closed_before_envelope() {
        let (listener, address) = listener();
        let client = Socket::new(SocketKind::Stream);
        client.connect(&address).unwrap();
        drop(client);

        let accepted = listener.accept();
        assert_eq!(accepted.receive().miss(), Some(StreamMiss::Closed));
        assert!(accepted.is_valid());
    }

    #[cfg(unix)]
    #[test]
    fn test_stream_closed_inside_size_field() {
        let (listener, address) = listener();

        let mut raw = TcpStream::connect(address.to_socket_addr().unwrap()).unwrap();
        raw.write_all(&[0, 0]).unwrap();
        drop(raw);

        let accepted = listener.accept();
        assert_eq!(accepted.receive().miss(), Some(StreamMiss::Closed));
        assert_eq!(accepted.receive().miss(), Some(StreamMiss::Closed));
        assert!(accepted.is_valid());
    }

    #[test]
    fn test_stream_partial_size_field_is_pending() {
        let (listener, address) = listener();

        let mut raw = TcpStream::connect(address.to_socket_addr().unwrap()).unwrap();
        raw.write_all(&[0, 0]).unwrap();

        let accepted = listener.accept();
        accepted
            .set_read_timeout(Some(Duration::from_millis(100)))
            .unwrap();
        assert_eq!(accepted.receive().miss(), Some(StreamMiss::Pending));
        assert!(accepted.is_valid());

        // The rest of the envelope completes the pending size field
        let envelope = encode(&7u32).unwrap();
        raw.write_all(&envelope.as_bytes()[2..]).unwrap();
        assert_eq!(accepted.receive().decode::<u32>(), Some(7));
    }

    #[test]
    fn test_unconnected_stream_send_is_a_fault() {
        let socket = Socket::new(SocketKind::Stream);

        let err = socket.send_payload(&1u8).unwrap_err();
        assert!(err.is_fault());
        assert!(!socket.is_valid());
    }

    #[test]
    fn test_unconnected_stream_receive_is_a_fault() {
        let socket = Socket::new(SocketKind::Stream);

        assert_eq!(socket.receive().miss(), Some(StreamMiss::Fault));
        assert!(!socket.is_valid());
    }

    #[test]
    fn test_stream_rejects_impossible_sizes() {
        let (mut listener, address) = listener();
        listener.set_max_envelope_size(64);

        let mut raw = TcpStream::connect(address.to_socket_addr().unwrap()).unwrap();
        raw.write_all(&5u32.to_be_bytes()).unwrap();
        let accepted = listener.accept();
        assert_eq!(
            accepted.receive().miss(),
            Some(StreamMiss::Malformed { declared: 5 })
        );

        let mut raw = TcpStream::connect(address.to_socket_addr().unwrap()).unwrap();
        raw.write_all(encode(&vec![0u8; 100]).unwrap().as_bytes()).unwrap();
        let accepted = listener.accept();
        assert_eq!(accepted.max_envelope_size(), 64);
        assert_eq!(
            accepted.receive().miss(),
            Some(StreamMiss::Malformed { declared: 120 })
        );
        assert!(accepted.is_valid());
    }

    #[test]
    fn test_validity_is_sticky() {
        let socket = Socket::new(SocketKind::Stream);
        assert!(socket.is_valid());

        let err = socket.connect(&closed_port()).unwrap_err();
        assert!(err.is_fault());
        assert!(!socket.is_valid());

        let _ = socket.set_reusable(true);
        let _ = socket.bind(0, "127.0.0.1");
        let _ = socket.local_address();
        assert!(!socket.is_valid());
    }

    #[test]
    fn test_failed_accept_invalidates_listener() {
        let socket = Socket::new(SocketKind::Stream);

        let accepted = socket.accept();
        assert!(!socket.is_valid());
        assert!(!accepted.is_valid());
        assert!(accepted.as_raw().is_none());
    }

    #[test]
    fn test_sentinel_handle() {
        let socket = Socket::wrap(SocketKind::Datagram, None);
        assert!(!socket.is_valid());
        assert_eq!(socket.local_address(), Address::default());
        assert!(matches!(
            socket.set_broadcast(true),
            Err(SocketError::NoHandle { op: "set_broadcast" })
        ));
        assert!(!socket.receive_any::<u8>().is_valid());
    }

    #[test]
    fn test_take_moves_ownership() {
        let (mut socket, local) = loopback(SocketKind::Datagram);
        let id = socket.id();

        let moved = socket.take();
        assert_eq!(moved.id(), id);
        assert!(moved.is_valid());
        assert!(!socket.is_valid());
        assert!(socket.as_raw().is_none());
        drop(socket);

        moved.send_to(&local, &5u8).unwrap();
        assert_eq!(moved.receive_any::<u8>().into_payload(), Some(5));
    }

    #[test]
    fn test_health_visible_from_other_thread() {
        let socket = Socket::new(SocketKind::Stream);
        let health = socket.health();
        assert_eq!(health.id(), socket.id());

        let watcher = health.clone();
        assert!(thread::spawn(move || watcher.is_valid()).join().unwrap());

        let _ = socket.connect(&closed_port());
        assert!(!thread::spawn(move || health.is_valid()).join().unwrap());
    }

    #[test]
    fn test_wrap_std_sockets() {
        let raw = UdpSocket::bind("127.0.0.1:0").unwrap();
        let expected = Address::from(raw.local_addr().unwrap());

        let socket = Socket::from(raw);
        assert_eq!(socket.kind(), SocketKind::Datagram);
        assert_eq!(socket.local_address(), expected);
    }
}
