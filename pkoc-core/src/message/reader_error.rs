//! Reader error response (0xFE)
//!
//! Unlike the other messages the body is not TLV encoded: every byte after
//! the identifier is the error value.

use bytes::{BufMut, Bytes, BytesMut};

use super::MessageId;
use crate::constants::{ReaderError, ReaderErrorCode};
use crate::error::{Error, Result};
use crate::tlv::Tag;

/// Error reported by the reader outside of a card transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderErrorResponse {
    error: Bytes,
}

impl ReaderErrorResponse {
    /// Create a reader error response
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFieldLength`] if `error` is empty.
    pub fn new(error: impl Into<Bytes>) -> Result<Self> {
        let error = error.into();
        if error.is_empty() {
            return Err(Error::InvalidFieldLength {
                field: Tag::Error,
                length: 0,
                expected: "at least 1",
            });
        }
        Ok(Self { error })
    }

    /// Raw error bytes
    pub fn error(&self) -> &Bytes {
        &self.error
    }

    pub fn reader_error(&self) -> Option<ReaderError> {
        ReaderError::from_bytes(&self.error)
    }

    pub fn error_code(&self) -> Option<ReaderErrorCode> {
        self.reader_error().and_then(|e| e.known_code())
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + self.error.len());
        buf.put_u8(MessageId::ReaderErrorResponse.into());
        buf.put_slice(&self.error);
        buf.freeze()
    }

    /// Decode from wire format
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMessageLength`] when no error byte follows the identifier.
    pub fn decode(data: &[u8]) -> Result<Self> {
        super::expect_identifier(data, MessageId::ReaderErrorResponse, 2)?;
        Self::new(Bytes::copy_from_slice(&data[1..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_single_code() {
        let actual = ReaderErrorResponse::decode(&[0xFE, 0x02]).unwrap();

        assert_eq!(actual.error().as_ref(), &[0x02]);
        assert_eq!(actual.error_code(), Some(ReaderErrorCode::TimeoutAccessingCard));
    }

    #[test]
    fn test_decode_iso_status() {
        let actual = ReaderErrorResponse::decode(&[0xFE, 0x01, 0x90, 0x00]).unwrap();

        assert_eq!(actual.error().as_ref(), &[0x01, 0x90, 0x00]);
        assert_eq!(actual.reader_error().unwrap().status_word, Some([0x90, 0x00]));
    }

    #[test]
    fn test_decode_too_short() {
        assert!(matches!(
            ReaderErrorResponse::decode(&[0xFE]),
            Err(Error::InvalidMessageLength { length: 1, .. })
        ));
    }

    #[test]
    fn test_decode_unknown_code_kept_raw() {
        let actual = ReaderErrorResponse::decode(&[0xFE, 0x42, 0x01]).unwrap();
        assert_eq!(actual.error_code(), None);
        assert_eq!(actual.encode().as_ref(), &[0xFE, 0x42, 0x01]);
    }

    #[test]
    fn test_round_trip() {
        let response = ReaderErrorResponse::new(vec![0x07]).unwrap();
        assert_eq!(response.encode().as_ref(), &[0xFE, 0x07]);
        assert_eq!(ReaderErrorResponse::decode(&response.encode()).unwrap(), response);
    }
}
