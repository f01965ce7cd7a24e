//! Card present response (0xE0)
//!
//! ```text
//! ┌──────┬──────┬────────┬──────────────────────────────────────────┐
//! │ 0xE0 │ 0xFC │ Length │ ProtocolVersions, Error, TransactionId,  │
//! │      │      │        │ TransactionSequence (inner TLV records)  │
//! └──────┴──────┴────────┴──────────────────────────────────────────┘
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::{MessageId, check_error_value, present};
use crate::constants::{ReaderError, ReaderErrorCode};
use crate::error::{Error, Result};
use crate::tlv::{self, Tag};

/// Sent unsolicited by the reader when a PKOC credential enters the field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardPresentResponse {
    protocol_versions: Bytes,
    error: Option<Bytes>,
    transaction_identifier: Option<Bytes>,
    transaction_sequence: Option<u8>,
}

impl CardPresentResponse {
    /// Create a card present response
    ///
    /// Protocol versions are kept in descending byte order, the order in
    /// which they are written to the wire.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFieldLength`] for a malformed error value or
    /// when the records do not fit the one-byte container length.
    pub fn new(
        protocol_versions: impl Into<Bytes>,
        error: Option<Bytes>,
        transaction_identifier: Option<Bytes>,
        transaction_sequence: Option<u8>,
    ) -> Result<Self> {
        let mut versions = protocol_versions.into().to_vec();
        versions.sort_unstable_by(|a, b| b.cmp(a));

        let error = present(error);
        if let Some(error) = &error {
            check_error_value(error)?;
        }

        let response = Self {
            protocol_versions: Bytes::from(versions),
            error,
            transaction_identifier: present(transaction_identifier),
            transaction_sequence,
        };

        // A bare ISO status code would swallow the records written after it
        if response.error.as_deref() == Some(&[ReaderErrorCode::Iso7816Status as u8][..])
            && (response.transaction_identifier.is_some() || response.transaction_sequence.is_some())
        {
            return Err(Error::InvalidFieldLength {
                field: Tag::Error,
                length: 1,
                expected: "3 for an ISO 7816 status followed by other records",
            });
        }

        let inner = response.inner_len();
        if inner > u8::MAX as usize {
            return Err(Error::InvalidFieldLength {
                field: Tag::CardPresentPayload,
                length: inner,
                expected: "at most 255",
            });
        }

        Ok(response)
    }

    pub fn protocol_versions(&self) -> &Bytes {
        &self.protocol_versions
    }

    pub fn error(&self) -> Option<&Bytes> {
        self.error.as_ref()
    }

    /// Decoded error, if the reader reported one
    pub fn reader_error(&self) -> Option<ReaderError> {
        self.error.as_deref().and_then(ReaderError::from_bytes)
    }

    pub fn error_code(&self) -> Option<ReaderErrorCode> {
        self.reader_error().and_then(|e| e.known_code())
    }

    pub fn transaction_identifier(&self) -> Option<&Bytes> {
        self.transaction_identifier.as_ref()
    }

    pub fn transaction_sequence(&self) -> Option<u8> {
        self.transaction_sequence
    }

    fn inner_len(&self) -> usize {
        let record = |value: &[u8], header: usize| {
            if value.is_empty() { 0 } else { value.len() + header }
        };

        record(&self.protocol_versions[..], 2)
            + self.error.as_deref().map_or(0, |e| record(e, 1))
            + self.transaction_identifier.as_deref().map_or(0, |t| record(t, 2))
            + self.transaction_sequence.map_or(0, |_| 2)
    }

    /// Encode to wire format
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(3 + self.inner_len());

        buf.put_u8(MessageId::CardPresentResponse.into());
        buf.put_u8(Tag::CardPresentPayload.into());
        // Patched once the inner records are written
        buf.put_u8(0);

        tlv::encode(&mut buf, Tag::ProtocolVersion, &self.protocol_versions, true);
        if let Some(error) = &self.error {
            tlv::encode(&mut buf, Tag::Error, error, false);
        }
        if let Some(transaction_identifier) = &self.transaction_identifier {
            tlv::encode(&mut buf, Tag::TransactionIdentifier, transaction_identifier, true);
        }
        if let Some(sequence) = self.transaction_sequence {
            tlv::encode(&mut buf, Tag::TransactionSequence, &[sequence], false);
        }

        buf[2] = (buf.len() - 3) as u8;
        buf.freeze()
    }

    /// Decode from wire format
    ///
    /// # Errors
    ///
    /// - [`Error::UnexpectedMessageIdentifier`] if the payload is not a card present response
    /// - [`Error::MalformedTlv`] if the 0xFC container or an inner record is malformed
    pub fn decode(data: &[u8]) -> Result<Self> {
        super::expect_identifier(data, MessageId::CardPresentResponse, 2)?;

        let payload = Bytes::copy_from_slice(data);
        if Tag::from(payload[1]) != Tag::CardPresentPayload {
            return Err(Error::malformed_tlv(
                1,
                format!("expected {} container, got 0x{:02X}", Tag::CardPresentPayload, payload[1]),
            ));
        }

        let (container, _) = tlv::decode(&payload, 1)?;

        let mut protocol_versions = Bytes::new();
        let mut error = None;
        let mut transaction_identifier = None;
        let mut transaction_sequence = None;

        for record in tlv::decode_all(&container.value, 0)? {
            match record.tag {
                Tag::ProtocolVersion => protocol_versions = record.value,
                Tag::Error => error = Some(record.value),
                Tag::TransactionIdentifier => transaction_identifier = Some(record.value),
                Tag::TransactionSequence => transaction_sequence = record.value.first().copied(),
                _ => {}
            }
        }

        Self::new(protocol_versions, error, transaction_identifier, transaction_sequence)
    }
}
