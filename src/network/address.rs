//! Endpoint addresses
//!
//! An [`Address`] is literal IP text plus a port. Only literal IPv4 text is
//! turned into an OS address; there is no name resolution here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;
use thiserror::Error;

/// IP text every unspecified address uses
pub const UNSPECIFIED_IP: &str = "0.0.0.0";

/// Address errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Not a literal IPv4 address: {0:?}")]
    InvalidIp(String),

    #[error("IPv6 is not supported: {0}")]
    Ipv6(String),

    #[error("Expected ip:port, got {0:?}")]
    InvalidFormat(String),

    #[error("Invalid port: {0:?}")]
    InvalidPort(String),
}

pub type AddressResult<T> = Result<T, AddressError>;

/// IP text and port of an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    ip: String,
    port: u16,
}

impl Address {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self { ip: ip.into(), port }
    }

    /// `0.0.0.0` on the given port
    pub fn unspecified(port: u16) -> Self {
        Self::new(UNSPECIFIED_IP, port)
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Convert to an OS socket address
    pub fn to_socket_addr(&self) -> AddressResult<SocketAddr> {
        match self.ip.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => Ok(SocketAddr::V4(SocketAddrV4::new(ip, self.port))),
            Ok(IpAddr::V6(_)) => Err(AddressError::Ipv6(self.ip.clone())),
            Err(_) => Err(AddressError::InvalidIp(self.ip.clone())),
        }
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::unspecified(0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> AddressResult<Self> {
        let (ip, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AddressError::InvalidFormat(s.to_string()))?;

        let port = port
            .parse::<u16>()
            .map_err(|_| AddressError::InvalidPort(port.to_string()))?;

        let address = Self::new(ip, port);
        address.to_socket_addr()?;
        Ok(address)
    }
}

impl From<SocketAddrV4> for Address {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl From<(Ipv4Addr, u16)> for Address {
    fn from((ip, port): (Ipv4Addr, u16)) -> Self {
        Self::new(ip.to_string(), port)
    }
}
