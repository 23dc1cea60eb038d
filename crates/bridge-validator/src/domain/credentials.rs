//! # Relay Credentials
//!
//! The relay's own provider-network identity. Callers never see it; it is
//! only used to sign outbound peer calls and weight submissions.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::entities::{SignedSubmission, WeightSubmission};
use super::errors::{BridgeError, BridgeResult};
use super::value_objects::PeerId;

type HmacSha256 = Hmac<Sha256>;

/// Relay hotkey plus signing secret.
#[derive(Clone)]
pub struct RelayCredentials {
    hotkey: PeerId,
    secret: [u8; 32],
}

impl RelayCredentials {
    /// Create credentials from raw parts.
    pub fn new(hotkey: PeerId, secret: [u8; 32]) -> Self {
        Self { hotkey, secret }
    }

    /// Create credentials from a hex-encoded 32-byte secret.
    pub fn from_hex(hotkey: PeerId, secret_hex: &str) -> BridgeResult<Self> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|e| BridgeError::Configuration(format!("relay secret is not hex: {e}")))?;
        let secret: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            BridgeError::Configuration(format!("relay secret must be 32 bytes, got {}", v.len()))
        })?;
        Ok(Self::new(hotkey, secret))
    }

    /// Relay hotkey.
    pub fn hotkey(&self) -> &PeerId {
        &self.hotkey
    }

    /// Hex HMAC-SHA256 of `message`.
    pub fn sign(&self, message: &[u8]) -> String {
        hex::encode(self.mac(message).finalize().into_bytes())
    }

    /// Constant-time check of a hex signature produced by [`sign`](Self::sign).
    pub fn verify(&self, message: &[u8], signature_hex: &str) -> bool {
        let Ok(signature) = hex::decode(signature_hex) else {
            return false;
        };
        self.mac(message).verify_slice(&signature).is_ok()
    }

    /// Sign a weight submission over its digest.
    pub fn sign_submission(&self, submission: WeightSubmission) -> SignedSubmission {
        let digest = submission.digest();
        SignedSubmission {
            signature: self.sign(&digest),
            digest: hex::encode(digest),
            signer: self.hotkey.clone(),
            submission,
        }
    }

    fn mac(&self, message: &[u8]) -> HmacSha256 {
        // HMAC accepts keys of any length
        let mut mac = match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC key length is unrestricted"),
        };
        mac.update(message);
        mac
    }
}

impl fmt::Debug for RelayCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayCredentials")
            .field("hotkey", &self.hotkey)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WeightEntry;

    fn creds() -> RelayCredentials {
        RelayCredentials::new(PeerId::from("5Relay"), [7u8; 32])
    }

    #[test]
    fn test_sign_and_verify() {
        let c = creds();
        let sig = c.sign(b"payload");
        assert!(c.verify(b"payload", &sig));
        assert!(!c.verify(b"tampered", &sig));
        assert!(!c.verify(b"payload", "not-hex"));
    }

    #[test]
    fn test_from_hex_validates_length() {
        assert!(RelayCredentials::from_hex(PeerId::from("r"), &"ab".repeat(32)).is_ok());
        assert!(RelayCredentials::from_hex(PeerId::from("r"), "abcd").is_err());
        assert!(RelayCredentials::from_hex(PeerId::from("r"), "zz").is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let dbg = format!("{:?}", creds());
        assert!(dbg.contains("redacted"));
        assert!(!dbg.contains("7, 7"));
    }

    #[test]
    fn test_sign_submission() {
        let sub = WeightSubmission::new(
            3,
            9,
            vec![WeightEntry {
                peer: PeerId::from("a"),
                accumulated_score: 1.0,
                weight: 1.0,
            }],
        );
        let c = creds();
        let signed = c.sign_submission(sub.clone());
        assert_eq!(signed.digest, hex::encode(sub.digest()));
        assert!(c.verify(&sub.digest(), &signed.signature));
        assert_eq!(signed.signer.as_str(), "5Relay");
    }
}
