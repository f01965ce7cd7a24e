//! Authentication response (0xE2)

use bytes::{BufMut, Bytes, BytesMut};

use super::{MessageId, check_error_value, check_length, fixed, present};
use crate::constants::{PUBLIC_KEY_LEN, ReaderError, ReaderErrorCode, SIGNATURE_LEN};
use crate::error::{Error, Result};
use crate::signature;
use crate::tlv::{self, Tag};

/// Credential's answer to an [`AuthenticationRequest`](super::AuthenticationRequest)
///
/// # Structure
///
/// ```text
/// ┌──────┬────────────┬──────────────────┬──────────────────┬────────────────┬─────────────┐
/// │ 0xE2 │ PublicKey  │ DigitalSignature │ TransactionId    │ TransactionSeq │ Error       │
/// │      │ 5A 41 ..   │ 9E 40 ..         │ 4C 10-41 .. (opt)│ FD .. (opt)    │ FB .. (opt) │
/// └──────┴────────────┴──────────────────┴──────────────────┴────────────────┴─────────────┘
/// ```
///
/// Readers usually leave the transaction identifier out. The panel then
/// fills in the nonce it sent, see [`with_transaction_identifier`](Self::with_transaction_identifier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResponse {
    public_key: [u8; PUBLIC_KEY_LEN],
    digital_signature: [u8; SIGNATURE_LEN],
    transaction_identifier: Option<Bytes>,
    transaction_sequence: Option<u8>,
    error: Option<Bytes>,
}

impl AuthenticationResponse {
    /// Create an authentication response
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFieldLength`] for a transaction identifier
    /// outside 16 to 65 bytes or a malformed error value.
    pub fn new(
        public_key: [u8; PUBLIC_KEY_LEN],
        digital_signature: [u8; SIGNATURE_LEN],
        transaction_identifier: Option<Bytes>,
        transaction_sequence: Option<u8>,
        error: Option<Bytes>,
    ) -> Result<Self> {
        let transaction_identifier = present(transaction_identifier);
        if let Some(id) = &transaction_identifier {
            check_length(Tag::TransactionIdentifier, id, 16..=65, "16 to 65")?;
        }

        let error = present(error);
        if let Some(error) = &error {
            check_error_value(error)?;
        }

        Ok(Self {
            public_key,
            digital_signature,
            transaction_identifier,
            transaction_sequence,
            error,
        })
    }

    /// Replace the transaction identifier
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFieldLength`] if `transaction_identifier` is
    /// not 16 to 65 bytes long.
    pub fn with_transaction_identifier(mut self, transaction_identifier: Bytes) -> Result<Self> {
        check_length(
            Tag::TransactionIdentifier,
            &transaction_identifier,
            16..=65,
            "16 to 65",
        )?;
        self.transaction_identifier = Some(transaction_identifier);
        Ok(self)
    }

    /// Uncompressed SEC1 public key of the credential
    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.public_key
    }

    pub fn digital_signature(&self) -> &[u8; SIGNATURE_LEN] {
        &self.digital_signature
    }

    pub fn transaction_identifier(&self) -> Option<&Bytes> {
        self.transaction_identifier.as_ref()
    }

    pub fn transaction_sequence(&self) -> Option<u8> {
        self.transaction_sequence
    }

    pub fn error(&self) -> Option<&Bytes> {
        self.error.as_ref()
    }

    pub fn reader_error(&self) -> Option<ReaderError> {
        self.error.as_deref().and_then(ReaderError::from_bytes)
    }

    pub fn error_code(&self) -> Option<ReaderErrorCode> {
        self.reader_error().and_then(|e| e.known_code())
    }

    /// Check the signature over the transaction identifier
    pub fn is_valid_signature(&self) -> bool {
        self.verify().is_ok()
    }

    /// Verify that the credential signed the transaction identifier
    ///
    /// # Errors
    ///
    /// Returns [`Error::VerificationFailed`] if there is no transaction
    /// identifier or the signature does not match the public key.
    pub fn verify(&self) -> Result<()> {
        let message = self.transaction_identifier.as_ref().ok_or_else(|| {
            Error::VerificationFailed("no transaction identifier to verify".into())
        })?;

        if signature::verify(message, &self.public_key, &self.digital_signature) {
            Ok(())
        } else {
            Err(Error::VerificationFailed(format!(
                "signature does not match public key {}",
                hex::encode(&self.public_key[1..9])
            )))
        }
    }

    /// Encode to wire format
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + 67 + 66 + 67 + 2 + 4);

        buf.put_u8(MessageId::AuthenticationResponse.into());

        tlv::encode(&mut buf, Tag::PublicKey, &self.public_key, true);
        tlv::encode(&mut buf, Tag::DigitalSignature, &self.digital_signature, true);
        if let Some(id) = &self.transaction_identifier {
            tlv::encode(&mut buf, Tag::TransactionIdentifier, id, true);
        }
        if let Some(sequence) = self.transaction_sequence {
            tlv::encode(&mut buf, Tag::TransactionSequence, &[sequence], false);
        }
        if let Some(error) = &self.error {
            tlv::encode(&mut buf, Tag::Error, error, false);
        }

        buf.freeze()
    }

    /// Decode from wire format
    ///
    /// # Errors
    ///
    /// - [`Error::UnexpectedMessageIdentifier`] if the payload is not an authentication response
    /// - [`Error::InvalidFieldLength`] if the public key or signature is missing or has the wrong size
    /// - [`Error::MalformedTlv`] if a record is truncated
    pub fn decode(data: &[u8]) -> Result<Self> {
        super::expect_identifier(data, MessageId::AuthenticationResponse, 1)?;

        let payload = Bytes::copy_from_slice(data);

        let mut public_key = Bytes::new();
        let mut digital_signature = Bytes::new();
        let mut transaction_identifier = None;
        let mut transaction_sequence = None;
        let mut error = None;

        for record in tlv::decode_all(&payload, 1)? {
            match record.tag {
                Tag::PublicKey => public_key = record.value,
                Tag::DigitalSignature => digital_signature = record.value,
                Tag::TransactionIdentifier => transaction_identifier = Some(record.value),
                Tag::TransactionSequence => transaction_sequence = record.value.first().copied(),
                Tag::Error => error = Some(record.value),
                _ => {}
            }
        }

        Self::new(
            fixed(Tag::PublicKey, &public_key, "65")?,
            fixed(Tag::DigitalSignature, &digital_signature, "64")?,
            transaction_identifier,
            transaction_sequence,
            error,
        )
    }
}
