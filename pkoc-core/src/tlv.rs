//! PKOC Tag-Length-Value records
//!
//! # Framing
//!
//! ```text
//! ┌─────────┬──────────┬──────────────┐
//! │   Tag   │  Length  │    Value     │
//! │ 1 byte  │  1 byte  │ Length bytes │
//! └─────────┴──────────┴──────────────┘
//! ```
//!
//! Two tags do not follow the default framing:
//!
//! - `TransactionSequence` has no length byte and always exactly one value byte.
//! - `Error` has no length byte. Its value is one error code byte, except for
//!   the ISO 7816 status code which is followed by a 2-byte status word.
//!
//! An empty value is never written: [`encode`] omits the whole record, which
//! is how optional fields disappear from the wire.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::ReaderErrorCode;
use crate::error::{Error, Result};

/// TLV tags used by PKOC messages
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    TransactionIdentifier,
    ReaderIdentifier,
    PublicKey,
    ProtocolVersion,
    DigitalSignature,
    Error,
    CardPresentPayload,
    TransactionSequence,
    /// Tag not defined by PKOC; decoded with default framing and skipped
    Unknown(u8),
}

impl Tag {
    /// Get tag name
    pub fn name(self) -> &'static str {
        match self {
            Self::TransactionIdentifier => "TransactionIdentifier",
            Self::ReaderIdentifier => "ReaderIdentifier",
            Self::PublicKey => "PublicKey",
            Self::ProtocolVersion => "ProtocolVersion",
            Self::DigitalSignature => "DigitalSignature",
            Self::Error => "Error",
            Self::CardPresentPayload => "CardPresentPayload",
            Self::TransactionSequence => "TransactionSequence",
            Self::Unknown(_) => "Unknown",
        }
    }
}

impl From<u8> for Tag {
    fn from(value: u8) -> Self {
        match value {
            0x4C => Self::TransactionIdentifier,
            0x4D => Self::ReaderIdentifier,
            0x5A => Self::PublicKey,
            0x5C => Self::ProtocolVersion,
            0x9E => Self::DigitalSignature,
            0xFB => Self::Error,
            0xFC => Self::CardPresentPayload,
            0xFD => Self::TransactionSequence,
            other => Self::Unknown(other),
        }
    }
}

impl From<Tag> for u8 {
    fn from(tag: Tag) -> u8 {
        match tag {
            Tag::TransactionIdentifier => 0x4C,
            Tag::ReaderIdentifier => 0x4D,
            Tag::PublicKey => 0x5A,
            Tag::ProtocolVersion => 0x5C,
            Tag::DigitalSignature => 0x9E,
            Tag::Error => 0xFB,
            Tag::CardPresentPayload => 0xFC,
            Tag::TransactionSequence => 0xFD,
            Tag::Unknown(other) => other,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), u8::from(*self))
    }
}

/// A single decoded TLV record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    pub tag: Tag,
    pub value: Bytes,
}

/// Decode one record starting at `offset`
///
/// Returns the record and the number of bytes it occupied on the wire.
///
/// # Errors
///
/// Returns [`Error::MalformedTlv`] if fewer than 2 bytes remain or the
/// declared length runs past the end of `payload`.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use pkoc_core::tlv::{self, Tag};
///
/// let payload = Bytes::from_static(&[0xFB, 0x01, 0x90, 0x00]);
/// let (record, consumed) = tlv::decode(&payload, 0).unwrap();
///
/// assert_eq!(record.tag, Tag::Error);
/// assert_eq!(record.value.as_ref(), &[0x01, 0x90, 0x00]);
/// assert_eq!(consumed, 4);
/// ```
pub fn decode(payload: &Bytes, offset: usize) -> Result<(Tlv, usize)> {
    let remaining = payload.len().saturating_sub(offset);
    if remaining < 2 {
        return Err(Error::malformed_tlv(
            offset,
            format!("need at least 2 bytes, {} remaining", remaining),
        ));
    }

    let tag = Tag::from(payload[offset]);
    let first = offset + 1;

    let (value, consumed) = match tag {
        Tag::TransactionSequence => (payload.slice(first..first + 1), 2),
        Tag::Error => {
            if payload[first] == ReaderErrorCode::Iso7816Status as u8 && remaining >= 4 {
                (payload.slice(first..first + 3), 4)
            } else {
                (payload.slice(first..first + 1), 2)
            }
        }
        _ => {
            let length = payload[first] as usize;
            if remaining < length + 2 {
                return Err(Error::malformed_tlv(
                    offset,
                    format!(
                        "{} declares {} value bytes, {} available",
                        tag,
                        length,
                        remaining - 2
                    ),
                ));
            }
            (payload.slice(first + 1..first + 1 + length), length + 2)
        }
    };

    Ok((Tlv { tag, value }, consumed))
}

/// Decode every record in `payload[offset..]`
pub fn decode_all(payload: &Bytes, mut offset: usize) -> Result<Vec<Tlv>> {
    let mut records = Vec::new();
    while offset < payload.len() {
        let (record, consumed) = decode(payload, offset)?;
        offset += consumed;
        records.push(record);
    }
    Ok(records)
}

/// Append a record to `buf`
///
/// Nothing is written when `value` is empty. `include_length` must be
/// `false` for the tags without a length byte (`TransactionSequence`,
/// `Error`).
///
/// # Panics
///
/// Panics if `value` is longer than 255 bytes, the most a length byte can
/// describe. Message constructors bound every field below that.
pub fn encode(buf: &mut BytesMut, tag: Tag, value: &[u8], include_length: bool) {
    if value.is_empty() {
        return;
    }

    assert!(
        value.len() <= u8::MAX as usize,
        "{} value of {} bytes does not fit a TLV record",
        tag,
        value.len()
    );

    buf.put_u8(tag.into());
    if include_length {
        buf.put_u8(value.len() as u8);
    }
    buf.put_slice(value);
}
