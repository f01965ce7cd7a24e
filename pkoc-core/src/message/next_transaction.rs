//! Next transaction request (0xE3)

use bytes::{BufMut, Bytes, BytesMut};

use super::{MessageId, check_length};
use crate::error::Result;
use crate::tlv::{self, Tag};

/// Asks the reader to move on to a new transaction
///
/// ```text
/// ┌──────┬──────────────────┬────────────────┐
/// │ 0xE3 │ TransactionId    │ TransactionSeq │
/// │      │ 4C 10-42 ..      │ FD .. (opt)    │
/// └──────┴──────────────────┴────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextTransactionRequest {
    transaction_identifier: Bytes,
    transaction_sequence: Option<u8>,
}

impl NextTransactionRequest {
    /// Create a next transaction request
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFieldLength`](crate::Error::InvalidFieldLength)
    /// if the transaction identifier is not 16 to 66 bytes long.
    pub fn new(transaction_identifier: Bytes, transaction_sequence: Option<u8>) -> Result<Self> {
        check_length(
            Tag::TransactionIdentifier,
            &transaction_identifier,
            16..=66,
            "16 to 66",
        )?;

        Ok(Self {
            transaction_identifier,
            transaction_sequence,
        })
    }

    pub fn transaction_identifier(&self) -> &Bytes {
        &self.transaction_identifier
    }

    pub fn transaction_sequence(&self) -> Option<u8> {
        self.transaction_sequence
    }

    /// Encode to wire format
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + 2 + self.transaction_identifier.len() + 2);

        buf.put_u8(MessageId::NextTransactionRequest.into());
        tlv::encode(&mut buf, Tag::TransactionIdentifier, &self.transaction_identifier, true);
        if let Some(sequence) = self.transaction_sequence {
            tlv::encode(&mut buf, Tag::TransactionSequence, &[sequence], false);
        }

        buf.freeze()
    }

    /// Decode from wire format
    pub fn decode(data: &[u8]) -> Result<Self> {
        super::expect_identifier(data, MessageId::NextTransactionRequest, 1)?;

        let payload = Bytes::copy_from_slice(data);

        let mut transaction_identifier = Bytes::new();
        let mut transaction_sequence = None;

        for record in tlv::decode_all(&payload, 1)? {
            match record.tag {
                Tag::TransactionIdentifier => transaction_identifier = record.value,
                Tag::TransactionSequence => transaction_sequence = record.value.first().copied(),
                _ => {}
            }
        }

        Self::new(transaction_identifier, transaction_sequence)
    }
}
