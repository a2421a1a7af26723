//! Results of a single receive attempt
//!
//! Both types say "a message arrived" or "nothing arrived this call" without
//! ever needing a placeholder payload.

use serde::de::DeserializeOwned;

use super::Address;
use crate::protocol::Envelope;

/// A typed payload and the address it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Datagram<T> {
    pub from: Address,
    pub payload: T,
}

/// Outcome of [`Socket::receive_any`](super::Socket::receive_any)
#[derive(Debug, Clone, PartialEq)]
pub enum ReceivedDatagram<T> {
    /// A datagram of the expected type arrived
    Message(Datagram<T>),
    /// The read failed, or the datagram was foreign or damaged
    Nothing,
}

impl<T> ReceivedDatagram<T> {
    pub fn new(from: Address, payload: T) -> Self {
        Self::Message(Datagram { from, payload })
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Message(_))
    }

    /// Address of the sender
    pub fn sender(&self) -> Option<&Address> {
        match self {
            Self::Message(datagram) => Some(&datagram.from),
            Self::Nothing => None,
        }
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            Self::Message(datagram) => Some(&datagram.payload),
            Self::Nothing => None,
        }
    }

    pub fn into_payload(self) -> Option<T> {
        self.into_datagram().map(|datagram| datagram.payload)
    }

    pub fn into_datagram(self) -> Option<Datagram<T>> {
        match self {
            Self::Message(datagram) => Some(datagram),
            Self::Nothing => None,
        }
    }
}

impl<T> From<ReceivedDatagram<T>> for Option<Datagram<T>> {
    fn from(received: ReceivedDatagram<T>) -> Self {
        received.into_datagram()
    }
}

/// Why a stream receive produced no envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMiss {
    /// Not enough bytes for a size field yet, or the read timed out
    Pending,
    /// The announced size is below the header size or above the limit
    Malformed { declared: u32 },
    /// The peer closed the connection before a whole envelope arrived
    Closed,
    /// The OS reported an error; the socket is now invalid
    Fault,
}

/// Outcome of [`Socket::receive`](super::Socket::receive)
#[derive(Debug, Clone, PartialEq)]
pub enum ReceivedStreamMessage {
    Message(Envelope),
    Nothing(StreamMiss),
}

impl ReceivedStreamMessage {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Message(_))
    }

    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            Self::Message(envelope) => Some(envelope),
            Self::Nothing(_) => None,
        }
    }

    pub fn into_envelope(self) -> Option<Envelope> {
        match self {
            Self::Message(envelope) => Some(envelope),
            Self::Nothing(_) => None,
        }
    }

    /// Reason nothing was received, if that is the case
    pub fn miss(&self) -> Option<StreamMiss> {
        match self {
            Self::Message(_) => None,
            Self::Nothing(miss) => Some(*miss),
        }
    }

    /// Decode the envelope's payload as `T`
    pub fn decode<T: DeserializeOwned>(&self) -> Option<T> {
        self.envelope().and_then(Envelope::decode::<T>)
    }
}

impl From<Envelope> for ReceivedStreamMessage {
    fn from(envelope: Envelope) -> Self {
        Self::Message(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode;

    /// Deliberately has no `Default`
    #[derive(Debug, PartialEq)]
    struct Token(u32);

    #[test]
    fn test_nothing_needs_no_payload() {
        let received: ReceivedDatagram<Token> = ReceivedDatagram::Nothing;
        assert!(!received.is_valid());
        assert!(received.sender().is_none());
        assert!(received.payload().is_none());
        assert!(received.into_payload().is_none());
    }

    #[test]
    fn test_message_owns_payload() {
        let received = ReceivedDatagram::new(Address::new("127.0.0.1", 9), Token(3));
        assert!(received.is_valid());
        assert_eq!(received.sender(), Some(&Address::new("127.0.0.1", 9)));
        assert_eq!(received.into_payload(), Some(Token(3)));
    }

    #[test]
    fn test_stream_message() {
        let envelope = encode(&"ping".to_string()).unwrap();
        let received = ReceivedStreamMessage::from(envelope.clone());

        assert!(received.is_valid());
        assert_eq!(received.miss(), None);
        assert_eq!(received.decode::<String>().as_deref(), Some("ping"));
        assert!(received.decode::<u32>().is_none());
        assert_eq!(received.into_envelope(), Some(envelope));

        let missed = ReceivedStreamMessage::Nothing(StreamMiss::Closed);
        assert!(!missed.is_valid());
        assert_eq!(missed.miss(), Some(StreamMiss::Closed));
        assert!(missed.envelope().is_none());
    }
}
