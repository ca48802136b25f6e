//! Wire-level status bytes for the challenge-response handshake (§4.5).
//!
//! The receiver replies with exactly one of these bytes. The values are part
//! of the wire protocol and must never change.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("handshake timed out waiting for secret")]
    Timeout,

    #[error("tunnel closed before the handshake completed")]
    Closed,

    #[error("secret did not match")]
    Incorrect,

    #[error("proxy rejected the tunnel (status byte {0:#04x})")]
    Rejected(u8),

    #[error("io error during handshake: {0}")]
    Io(#[from] std::io::Error),
}

/// Response byte the Proxy writes back to the Client after reading `len(secret)`
/// bytes from a freshly accepted tunnel socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandshakeStatus {
    /// Fewer bytes arrived before timeout, or the stream ended early.
    Empty = 0x00,
    /// Bytes read matched `secret` exactly.
    Verified = 0x01,
    /// Bytes read did not match `secret`.
    Incorrect = 0x02,
}

impl HandshakeStatus {
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Empty),
            0x01 => Some(Self::Verified),
            0x02 => Some(Self::Incorrect),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_defined_byte() {
        for status in [
            HandshakeStatus::Empty,
            HandshakeStatus::Verified,
            HandshakeStatus::Incorrect,
        ] {
            assert_eq!(HandshakeStatus::from_byte(status.to_byte()), Some(status));
        }
    }

    #[test]
    fn literal_byte_values_are_preserved() {
        assert_eq!(HandshakeStatus::Empty.to_byte(), 0x00);
        assert_eq!(HandshakeStatus::Verified.to_byte(), 0x01);
        assert_eq!(HandshakeStatus::Incorrect.to_byte(), 0x02);
    }

    #[test]
    fn unknown_byte_does_not_parse() {
        assert_eq!(HandshakeStatus::from_byte(0x7f), None);
    }
}
