//! Authentication request (0xE1)

use bytes::{BufMut, Bytes, BytesMut};

use super::{MessageId, check_length, fixed, present};
use crate::constants::{AUTHENTICATION_REQUEST_HEADER, READER_IDENTIFIER_LEN};
use crate::error::{Error, Result};
use crate::tlv::{self, Tag};

/// Challenge sent by the panel: the credential must sign the transaction
/// identifier with its private key
///
/// # Structure
///
/// ```text
/// ┌──────┬───────────┬─────────────────┬──────────────────┬──────────────────┬─────────────────┐
/// │ 0xE1 │ 0x00 0x01 │ ProtocolVersion │ ReaderIdentifier │ TransactionId    │ TransactionSeq  │
/// │      │           │ 5C 02 ..        │ 4D 20 ..         │ 4C 10-41 .. (opt)│ FD .. (opt)     │
/// └──────┴───────────┴─────────────────┴──────────────────┴──────────────────┴─────────────────┘
/// ```
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use pkoc_core::AuthenticationRequest;
///
/// let request = AuthenticationRequest::new(
///     [0x01, 0x00],
///     [0xAA; 32],
///     Some(Bytes::from_static(&[0x55; 16])),
///     Some(0),
/// )
/// .unwrap();
///
/// let decoded = AuthenticationRequest::decode(&request.encode()).unwrap();
/// assert_eq!(decoded, request);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationRequest {
    protocol_version: [u8; 2],
    reader_identifier: [u8; READER_IDENTIFIER_LEN],
    transaction_identifier: Option<Bytes>,
    transaction_sequence: Option<u8>,
}

impl AuthenticationRequest {
    /// Create an authentication request
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFieldLength`] if the transaction identifier is
    /// present but not 16 to 65 bytes long.
    pub fn new(
        protocol_version: [u8; 2],
        reader_identifier: [u8; READER_IDENTIFIER_LEN],
        transaction_identifier: Option<Bytes>,
        transaction_sequence: Option<u8>,
    ) -> Result<Self> {
        let transaction_identifier = present(transaction_identifier);
        if let Some(id) = &transaction_identifier {
            check_length(Tag::TransactionIdentifier, id, 16..=65, "16 to 65")?;
        }

        Ok(Self {
            protocol_version,
            reader_identifier,
            transaction_identifier,
            transaction_sequence,
        })
    }

    pub fn protocol_version(&self) -> [u8; 2] {
        self.protocol_version
    }

    pub fn reader_identifier(&self) -> &[u8; READER_IDENTIFIER_LEN] {
        &self.reader_identifier
    }

    pub fn transaction_identifier(&self) -> Option<&Bytes> {
        self.transaction_identifier.as_ref()
    }

    pub fn transaction_sequence(&self) -> Option<u8> {
        self.transaction_sequence
    }

    /// Encode to wire format
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(3 + 4 + 34 + 67 + 2);

        buf.put_u8(MessageId::AuthenticationRequest.into());
        buf.put_slice(&AUTHENTICATION_REQUEST_HEADER);

        tlv::encode(&mut buf, Tag::ProtocolVersion, &self.protocol_version, true);
        tlv::encode(&mut buf, Tag::ReaderIdentifier, &self.reader_identifier, true);
        if let Some(id) = &self.transaction_identifier {
            tlv::encode(&mut buf, Tag::TransactionIdentifier, id, true);
        }
        if let Some(sequence) = self.transaction_sequence {
            tlv::encode(&mut buf, Tag::TransactionSequence, &[sequence], false);
        }

        buf.freeze()
    }

    /// Decode from wire format
    ///
    /// # Errors
    ///
    /// - [`Error::UnexpectedMessageIdentifier`] if the payload is not an authentication request
    /// - [`Error::UnexpectedHeader`] if the two header bytes are not `00 01`
    /// - [`Error::InvalidFieldLength`] if a required field is missing or has the wrong size
    pub fn decode(data: &[u8]) -> Result<Self> {
        super::expect_identifier(data, MessageId::AuthenticationRequest, 3)?;

        let header = [data[1], data[2]];
        if header != AUTHENTICATION_REQUEST_HEADER {
            return Err(Error::UnexpectedHeader(header));
        }

        let payload = Bytes::copy_from_slice(data);

        let mut protocol_version = Bytes::new();
        let mut reader_identifier = Bytes::new();
        let mut transaction_identifier = None;
        let mut transaction_sequence = None;

        for record in tlv::decode_all(&payload, 3)? {
            match record.tag {
                Tag::ProtocolVersion => protocol_version = record.value,
                Tag::ReaderIdentifier => reader_identifier = record.value,
                Tag::TransactionIdentifier => transaction_identifier = Some(record.value),
                Tag::TransactionSequence => transaction_sequence = record.value.first().copied(),
                _ => {}
            }
        }

        Self::new(
            fixed(Tag::ProtocolVersion, &protocol_version, "2")?,
            fixed(Tag::ReaderIdentifier, &reader_identifier, "32")?,
            transaction_identifier,
            transaction_sequence,
        )
    }
}
