//! Manufacturer-specific vendor codes

use std::fmt;

use crate::error::{Error, Result};

/// 3-byte OSDP manufacturer code carried by every manufacturer-specific
/// command and reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VendorCode([u8; 3]);

impl VendorCode {
    /// Vendor code under which PKOC messages are tunneled
    pub const PKOC: VendorCode = VendorCode([0x1A, 0x90, 0x21]);

    pub const fn new(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }

    pub fn is_pkoc(&self) -> bool {
        *self == Self::PKOC
    }
}

impl TryFrom<&[u8]> for VendorCode {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self> {
        let bytes: [u8; 3] = value.try_into().map_err(|_| Error::Validation {
            kind: "vendor code",
            reason: format!("expected 3 bytes, got {}", value.len()),
        })?;
        Ok(Self(bytes))
    }
}

impl From<VendorCode> for [u8; 3] {
    fn from(code: VendorCode) -> [u8; 3] {
        code.0
    }
}

impl fmt::Display for VendorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}{:02X}", self.0[0], self.0[1], self.0[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_code_from_slice() {
        let code = VendorCode::try_from(&[0x1A, 0x90, 0x21][..]).unwrap();
        assert!(code.is_pkoc());
        assert_eq!(code.to_string(), "1A9021");
    }

    #[test]
    fn test_vendor_code_wrong_size() {
        assert_eq!(
            VendorCode::try_from(&[0x1A, 0x90][..]).unwrap_err().to_string(),
            "Invalid vendor code: expected 3 bytes, got 2"
        );
        assert!(VendorCode::try_from(&[0x1A, 0x90, 0x21, 0x00][..]).is_err());
    }

    #[test]
    fn test_other_vendor_is_not_pkoc() {
        assert!(!VendorCode::new([0x00, 0x00, 0x01]).is_pkoc());
    }
}
