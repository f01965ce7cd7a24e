//! Credential signature verification
//!
//! A PKOC credential proves possession of its private key by signing the
//! transaction identifier chosen by the panel. The key is a SEC1 uncompressed
//! P-256 point (`0x04 || X || Y`) and the signature is the raw `r || s` pair,
//! computed over the SHA-256 digest of the message.

use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use tracing::trace;

/// Verify an ECDSA P-256 / SHA-256 signature
///
/// Returns `false` for a bad signature as well as for a key or signature
/// that cannot be parsed.
///
/// # Examples
///
/// ```
/// use pkoc_core::signature;
///
/// assert!(!signature::verify(b"nonce", &[0x04; 65], &[0x00; 64]));
/// ```
pub fn verify(message: &[u8], public_key: &[u8], signature: &[u8]) -> bool {
    let key = match VerifyingKey::from_sec1_bytes(public_key) {
        Ok(key) => key,
        Err(e) => {
            trace!("Rejecting public key {:02X?}: {}", public_key, e);
            return false;
        }
    };

    let signature = match Signature::from_slice(signature) {
        Ok(signature) => signature,
        Err(e) => {
            trace!("Rejecting signature {:02X?}: {}", signature, e);
            return false;
        }
    };

    key.verify(message, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBLIC_KEY: &str = "040ec5d87dc39d14a2c5480686da860c82b16be0b6903b525f84848b79fd463e32\
        bbda1f0252c33503c5287035e6eac55d138d0650dcfb5281d59a9cf4124d2831";
    const SIGNATURE: &str = "b98613070c78010b04ed306d143f94ee6dc4eca2585b621405731fb3a53cd877\
        a21685de18435da7cbcc38f1d926300a454efee3594cec5effe28c7feac03d7d";
    const MESSAGE: &str = "6fcf5012b224043b09350a4fc5e56a8f";

    fn fixture() -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        (
            hex::decode(MESSAGE).unwrap(),
            hex::decode(PUBLIC_KEY).unwrap(),
            hex::decode(SIGNATURE).unwrap(),
        )
    }

    #[test]
    fn test_verify_valid() {
        let (message, key, signature) = fixture();
        assert!(verify(&message, &key, &signature));
    }

    #[test]
    fn test_verify_mutated_message() {
        let (message, key, signature) = fixture();
        for i in 0..message.len() {
            let mut mutated = message.clone();
            mutated[i] ^= 0x01;
            assert!(!verify(&mutated, &key, &signature), "message byte {}", i);
        }
    }

    #[test]
    fn test_verify_mutated_signature() {
        let (message, key, signature) = fixture();
        for i in 0..signature.len() {
            let mut mutated = signature.clone();
            mutated[i] ^= 0x01;
            assert!(!verify(&message, &key, &mutated), "signature byte {}", i);
        }
    }

    #[test]
    fn test_verify_mutated_public_key() {
        let (message, key, signature) = fixture();
        // Flipping a coordinate bit either leaves the curve or yields another key
        for i in 1..key.len() {
            let mut mutated = key.clone();
            mutated[i] ^= 0x01;
            assert!(!verify(&message, &mutated, &signature), "key byte {}", i);
        }
    }

    #[test]
    fn test_verify_malformed_inputs() {
        let (message, key, signature) = fixture();

        assert!(!verify(&message, &key[..64], &signature));
        assert!(!verify(&message, &[], &signature));
        assert!(!verify(&message, &key, &signature[..63]));
        assert!(!verify(&message, &key, &[0u8; 64]));
    }
}
