//! PKOC message variants
//!
//! Every PKOC payload starts with a one-byte message identifier followed by
//! a message-specific body, usually a list of TLV records (see [`crate::tlv`]).
//!
//! | Message                      | Direction      | Identifier |
//! |------------------------------|----------------|------------|
//! | [`CardPresentResponse`]        | reader → panel | `0xE0`     |
//! | [`AuthenticationRequest`]      | panel → reader | `0xE1`     |
//! | [`AuthenticationResponse`]     | reader → panel | `0xE2`     |
//! | [`NextTransactionRequest`]     | panel → reader | `0xE3`     |
//! | [`TransactionRefreshResponse`] | reader → panel | `0xE4`     |
//! | [`ReaderErrorResponse`]        | reader → panel | `0xFE`     |

mod authentication_request;
mod authentication_response;
mod card_present;
mod next_transaction;
mod reader_error;
mod transaction_refresh;

use std::fmt;
use std::ops::RangeInclusive;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::tlv::Tag;

pub use authentication_request::AuthenticationRequest;
pub use authentication_response::AuthenticationResponse;
pub use card_present::CardPresentResponse;
pub use next_transaction::NextTransactionRequest;
pub use reader_error::ReaderErrorResponse;
pub use transaction_refresh::TransactionRefreshResponse;

/// PKOC message identifiers
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageId {
    CardPresentResponse = 0xE0,
    AuthenticationRequest = 0xE1,
    AuthenticationResponse = 0xE2,
    NextTransactionRequest = 0xE3,
    TransactionRefreshResponse = 0xE4,
    ReaderErrorResponse = 0xFE,
}

impl MessageId {
    /// Get message name
    pub fn name(self) -> &'static str {
        match self {
            Self::CardPresentResponse => "CardPresentResponse",
            Self::AuthenticationRequest => "AuthenticationRequest",
            Self::AuthenticationResponse => "AuthenticationResponse",
            Self::NextTransactionRequest => "NextTransactionRequest",
            Self::TransactionRefreshResponse => "TransactionRefreshResponse",
            Self::ReaderErrorResponse => "ReaderErrorResponse",
        }
    }

    /// Check if this message is sent by the reader
    pub fn is_reply(self) -> bool {
        !matches!(
            self,
            Self::AuthenticationRequest | Self::NextTransactionRequest
        )
    }
}

impl From<MessageId> for u8 {
    fn from(id: MessageId) -> u8 {
        id as u8
    }
}

impl TryFrom<u8> for MessageId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0xE0 => Ok(Self::CardPresentResponse),
            0xE1 => Ok(Self::AuthenticationRequest),
            0xE2 => Ok(Self::AuthenticationResponse),
            0xE3 => Ok(Self::NextTransactionRequest),
            0xE4 => Ok(Self::TransactionRefreshResponse),
            0xFE => Ok(Self::ReaderErrorResponse),
            _ => Err(Error::UnknownMessageIdentifier(value)),
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}

/// Any PKOC message, dispatched on its identifier byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    CardPresentResponse(CardPresentResponse),
    AuthenticationRequest(AuthenticationRequest),
    AuthenticationResponse(AuthenticationResponse),
    NextTransactionRequest(NextTransactionRequest),
    TransactionRefreshResponse(TransactionRefreshResponse),
    ReaderErrorResponse(ReaderErrorResponse),
}

impl Message {
    /// Decode a complete PKOC payload
    ///
    /// # Examples
    ///
    /// ```
    /// use pkoc_core::{Message, MessageId};
    ///
    /// let message = Message::decode(&[0xFE, 0x02]).unwrap();
    /// assert_eq!(message.id(), MessageId::ReaderErrorResponse);
    /// ```
    pub fn decode(data: &[u8]) -> Result<Self> {
        let first = *data
            .first()
            .ok_or_else(|| Error::malformed_tlv(0, "empty payload"))?;

        Ok(match MessageId::try_from(first)? {
            MessageId::CardPresentResponse => {
                Self::CardPresentResponse(CardPresentResponse::decode(data)?)
            }
            MessageId::AuthenticationRequest => {
                Self::AuthenticationRequest(AuthenticationRequest::decode(data)?)
            }
            MessageId::AuthenticationResponse => {
                Self::AuthenticationResponse(AuthenticationResponse::decode(data)?)
            }
            MessageId::NextTransactionRequest => {
                Self::NextTransactionRequest(NextTransactionRequest::decode(data)?)
            }
            MessageId::TransactionRefreshResponse => {
                Self::TransactionRefreshResponse(TransactionRefreshResponse::decode(data)?)
            }
            MessageId::ReaderErrorResponse => {
                Self::ReaderErrorResponse(ReaderErrorResponse::decode(data)?)
            }
        })
    }

    /// Encode to a complete PKOC payload
    pub fn encode(&self) -> Bytes {
        match self {
            Self::CardPresentResponse(m) => m.encode(),
            Self::AuthenticationRequest(m) => m.encode(),
            Self::AuthenticationResponse(m) => m.encode(),
            Self::NextTransactionRequest(m) => m.encode(),
            Self::TransactionRefreshResponse(m) => m.encode(),
            Self::ReaderErrorResponse(m) => m.encode(),
        }
    }

    pub fn id(&self) -> MessageId {
        match self {
            Self::CardPresentResponse(_) => MessageId::CardPresentResponse,
            Self::AuthenticationRequest(_) => MessageId::AuthenticationRequest,
            Self::AuthenticationResponse(_) => MessageId::AuthenticationResponse,
            Self::NextTransactionRequest(_) => MessageId::NextTransactionRequest,
            Self::TransactionRefreshResponse(_) => MessageId::TransactionRefreshResponse,
            Self::ReaderErrorResponse(_) => MessageId::ReaderErrorResponse,
        }
    }
}

/// Check the leading identifier byte and the minimum total length
fn expect_identifier(data: &[u8], expected: MessageId, min_len: usize) -> Result<()> {
    match data.first() {
        Some(&actual) if actual != u8::from(expected) => {
            Err(Error::UnexpectedMessageIdentifier { expected, actual })
        }
        _ if data.len() < min_len => Err(Error::InvalidMessageLength {
            message: expected,
            length: data.len(),
            expected: "more bytes",
        }),
        _ => Ok(()),
    }
}

fn check_length(
    field: Tag,
    value: &[u8],
    allowed: RangeInclusive<usize>,
    expected: &'static str,
) -> Result<()> {
    if allowed.contains(&value.len()) {
        Ok(())
    } else {
        Err(Error::InvalidFieldLength {
            field,
            length: value.len(),
            expected,
        })
    }
}

fn fixed<const N: usize>(field: Tag, value: &[u8], expected: &'static str) -> Result<[u8; N]> {
    value.try_into().map_err(|_| Error::InvalidFieldLength {
        field,
        length: value.len(),
        expected,
    })
}

/// Treat an empty optional byte field as absent
fn present(value: Option<Bytes>) -> Option<Bytes> {
    value.filter(|v| !v.is_empty())
}

/// Error values are one code byte, or the ISO 7816 code plus a status word
fn check_error_value(value: &[u8]) -> Result<()> {
    let valid = match value {
        [_] => true,
        [code, _, _] => *code == crate::constants::ReaderErrorCode::Iso7816Status as u8,
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidFieldLength {
            field: Tag::Error,
            length: value.len(),
            expected: "1, or 3 for an ISO 7816 status",
        })
    }
}
