//! Transaction refresh response (0xE4)

use bytes::Bytes;

use super::MessageId;
use crate::error::{Error, Result};

/// Reader asks the panel to start a new transaction; carries no fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionRefreshResponse;

impl TransactionRefreshResponse {
    pub fn encode(&self) -> Bytes {
        Bytes::from_static(&[MessageId::TransactionRefreshResponse as u8])
    }

    /// Decode from wire format
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMessageLength`] if anything follows the identifier.
    pub fn decode(data: &[u8]) -> Result<Self> {
        super::expect_identifier(data, MessageId::TransactionRefreshResponse, 1)?;

        if data.len() != 1 {
            return Err(Error::InvalidMessageLength {
                message: MessageId::TransactionRefreshResponse,
                length: data.len(),
                expected: "exactly 1",
            });
        }

        Ok(Self)
    }
}
