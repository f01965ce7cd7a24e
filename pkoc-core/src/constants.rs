//! Protocol constants

use std::time::Duration;

/// Protocol version offered in authentication requests
pub const PROTOCOL_VERSION: [u8; 2] = [0x01, 0x00];

/// Fixed header following the authentication request identifier
pub const AUTHENTICATION_REQUEST_HEADER: [u8; 2] = [0x00, 0x01];

/// Reader identifier length
pub const READER_IDENTIFIER_LEN: usize = 32;

/// Transaction identifier (nonce) length generated by the panel
pub const NONCE_LEN: usize = 16;

/// Uncompressed SEC1 P-256 public key length (0x04 || X || Y)
pub const PUBLIC_KEY_LEN: usize = 65;

/// Raw r || s P-256 signature length
pub const SIGNATURE_LEN: usize = 64;

/// Default maximum fragment size for commands sent to the reader
pub const DEFAULT_MAX_FRAGMENT_SEND_SIZE: u16 = 128;

/// Default receive buffer size requested from the reader
pub const DEFAULT_MAX_RECEIVE_SIZE: u16 = 1024;

/// Default time allowed for a card read to complete
pub const DEFAULT_CARD_READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Error codes carried by the Error TLV and reader error responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReaderErrorCode {
    NoError = 0x00,
    /// Followed by a 2-byte ISO 7816 status word
    Iso7816Status = 0x01,
    TimeoutAccessingCard = 0x02,
    Reserved = 0x03,
    MissingTlv = 0x04,
    TlvOutOfBounds = 0x05,
    MissingData = 0x06,
    InvalidData = 0x07,
    MultipartOutOfSequence = 0x08,
    MultipartOutOfBounds = 0x09,
}

impl ReaderErrorCode {
    /// Get code name
    pub fn name(self) -> &'static str {
        match self {
            Self::NoError => "no error",
            Self::Iso7816Status => "ISO 7816 status",
            Self::TimeoutAccessingCard => "timeout accessing card",
            Self::Reserved => "reserved",
            Self::MissingTlv => "missing TLV in data",
            Self::TlvOutOfBounds => "TLV out of bounds",
            Self::MissingData => "missing data to complete request",
            Self::InvalidData => "invalid data",
            Self::MultipartOutOfSequence => "multipart out of sequence",
            Self::MultipartOutOfBounds => "multipart out of bounds",
        }
    }
}

impl From<ReaderErrorCode> for u8 {
    fn from(code: ReaderErrorCode) -> u8 {
        code as u8
    }
}

impl TryFrom<u8> for ReaderErrorCode {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        match value {
            0x00 => Ok(Self::NoError),
            0x01 => Ok(Self::Iso7816Status),
            0x02 => Ok(Self::TimeoutAccessingCard),
            0x03 => Ok(Self::Reserved),
            0x04 => Ok(Self::MissingTlv),
            0x05 => Ok(Self::TlvOutOfBounds),
            0x06 => Ok(Self::MissingData),
            0x07 => Ok(Self::InvalidData),
            0x08 => Ok(Self::MultipartOutOfSequence),
            0x09 => Ok(Self::MultipartOutOfBounds),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for ReaderErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}

/// Decoded view of an error value (1 byte code, or ISO status code + status word)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderError {
    /// Raw error code byte
    pub code: u8,

    /// ISO 7816 status word (SW1 SW2) when `code` is the ISO status code
    pub status_word: Option<[u8; 2]>,
}

impl ReaderError {
    /// Interpret raw error bytes; `None` when empty
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&code, rest) = bytes.split_first()?;
        let status_word = match rest {
            [sw1, sw2, ..] if code == ReaderErrorCode::Iso7816Status as u8 => Some([*sw1, *sw2]),
            _ => None,
        };
        Some(Self { code, status_word })
    }

    /// Known error code, if any
    pub fn known_code(&self) -> Option<ReaderErrorCode> {
        ReaderErrorCode::try_from(self.code).ok()
    }
}
