//! Error types for pkoc-core

use crate::message::MessageId;
use crate::tlv::Tag;

/// Result type alias for pkoc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// TLV record truncated or its declared length overruns the payload
    #[error("Malformed TLV at offset {offset}: {reason}")]
    MalformedTlv {
        offset: usize,
        reason: String,
    },

    /// Leading byte does not identify the message being decoded
    #[error("Unexpected message identifier: expected {expected}, got 0x{actual:02X}")]
    UnexpectedMessageIdentifier {
        expected: MessageId,
        actual: u8,
    },

    /// Leading byte is not a PKOC message identifier
    #[error("Unknown message identifier: 0x{0:02X}")]
    UnknownMessageIdentifier(u8),

    /// Authentication request header is not 0x00 0x01
    #[error("Unexpected authentication request header: {0:02X?}")]
    UnexpectedHeader([u8; 2]),

    /// Fixed or ranged field has the wrong size
    #[error("Invalid length for {field}: {length} bytes (expected {expected})")]
    InvalidFieldLength {
        field: Tag,
        length: usize,
        expected: &'static str,
    },

    /// Whole message has the wrong total size
    #[error("Invalid message length for {message}: {length} bytes (expected {expected})")]
    InvalidMessageLength {
        message: MessageId,
        length: usize,
        expected: &'static str,
    },

    /// Transport fragment header is truncated or inconsistent
    #[error("Malformed fragment: {0}")]
    MalformedFragment(String),

    /// Fragment would write outside the reassembly buffer
    #[error("Fragment out of bounds: offset {offset} + length {length} exceeds {capacity} bytes")]
    FragmentOutOfBounds {
        offset: usize,
        length: usize,
        capacity: usize,
    },

    /// Credential signature over the transaction identifier does not verify
    #[error("Signature verification failed: {0}")]
    VerificationFailed(String),

    /// Session already has an authentication request in flight
    #[error("Authentication request already in progress for this session")]
    RequestInProgress,

    /// No reassembled response is available on the session
    #[error("No incoming data available for this session")]
    MissingIncomingData,
}

impl Error {
    pub(crate) fn malformed_tlv(offset: usize, reason: impl Into<String>) -> Self {
        Self::MalformedTlv {
            offset,
            reason: reason.into(),
        }
    }

    /// Check if error was caused by bytes received from the reader
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedTlv { .. }
                | Self::UnexpectedMessageIdentifier { .. }
                | Self::UnknownMessageIdentifier(_)
                | Self::UnexpectedHeader(_)
                | Self::InvalidFieldLength { .. }
                | Self::InvalidMessageLength { .. }
                | Self::MalformedFragment(_)
                | Self::FragmentOutOfBounds { .. }
        )
    }
}
