//! Network module - Blocking sockets that exchange envelopes
//!
//! Provides:
//! - Addresses made of literal IP text and a port
//! - Sockets with sticky invalidation instead of panics
//! - Receive results that can say "nothing arrived"

mod address;
mod received;
mod socket;

pub use address::*;
pub use received::*;
pub use socket::*;

use std::time::Duration;

use crate::protocol::MAX_ENVELOPE_SIZE;

/// Option toggles applied to a freshly created socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketOptions {
    /// Allow sending to broadcast addresses (datagram sockets only)
    pub broadcast: bool,
    /// Allow rebinding a recently used local address
    pub reuse_address: bool,
    /// Upper bound for every blocking read
    pub read_timeout: Option<Duration>,
    /// Largest envelope a stream receive will allocate for
    pub max_envelope_size: usize,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            broadcast: false,
            reuse_address: true,
            read_timeout: None,
            max_envelope_size: MAX_ENVELOPE_SIZE,
        }
    }
}

impl SocketOptions {
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn with_broadcast(mut self) -> Self {
        self.broadcast = true;
        self
    }

    /// Apply every option, stopping at the first one the OS rejects
    pub fn apply(&self, socket: &mut Socket) -> SocketResult<()> {
        socket.set_reusable(self.reuse_address)?;

        if socket.kind() == SocketKind::Datagram {
            socket.set_broadcast(self.broadcast)?;
        }

        if self.read_timeout.is_some() {
            socket.set_read_timeout(self.read_timeout)?;
        }

        socket.set_max_envelope_size(self.max_envelope_size);
        Ok(())
    }

    /// Create a socket of `kind` with these options applied
    pub fn open(&self, kind: SocketKind) -> SocketResult<Socket> {
        let mut socket = Socket::new(kind);
        self.apply(&mut socket)?;
        Ok(socket)
    }
}

impl From<&crate::config::NetworkConfig> for SocketOptions {
    fn from(config: &crate::config::NetworkConfig) -> Self {
        Self {
            broadcast: config.broadcast,
            reuse_address: config.reuse_address,
            read_timeout: config.read_timeout_ms.map(Duration::from_millis),
            max_envelope_size: config.max_envelope_size,
        }
    }
}
