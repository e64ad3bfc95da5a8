//! HMAC signing and constant-time verification over raw bytes.
//!
//! Used both to authenticate inbound webhooks and to sign outbound API
//! requests for providers that require it.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};

use crate::{ProviderError, Result};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Digest algorithms accepted for webhook signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
  Sha256,
  Sha512,
}

impl DigestAlgorithm {
  /// Parse the algorithm-name header value used by digest-header providers,
  /// e.g. `HMAC_SHA256_HEX`.
  pub fn from_header(value: &str) -> Option<Self> {
    match value.trim() {
      "HMAC_SHA256_HEX" => Some(Self::Sha256),
      "HMAC_SHA512_HEX" => Some(Self::Sha512),
      _ => None,
    }
  }

  pub fn header_value(self) -> &'static str {
    match self {
      Self::Sha256 => "HMAC_SHA256_HEX",
      Self::Sha512 => "HMAC_SHA512_HEX",
    }
  }
}

/// A shared secret able to produce and check hex-encoded HMAC digests.
#[derive(Clone)]
pub struct HmacKey {
  secret: Vec<u8>,
}

impl fmt::Debug for HmacKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("HmacKey(<redacted>)")
  }
}

impl HmacKey {
  pub fn new(secret: impl Into<Vec<u8>>) -> Self { Self { secret: secret.into() } }

  /// Lowercase hex HMAC of `message`.
  pub fn sign_hex(&self, algorithm: DigestAlgorithm, message: &[u8]) -> Result<String> {
    let digest = match algorithm {
      DigestAlgorithm::Sha256 => {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
          .map_err(|e| ProviderError::Config(e.to_string()))?;
        mac.update(message);
        mac.finalize().into_bytes().to_vec()
      }
      DigestAlgorithm::Sha512 => {
        let mut mac = HmacSha512::new_from_slice(&self.secret)
          .map_err(|e| ProviderError::Config(e.to_string()))?;
        mac.update(message);
        mac.finalize().into_bytes().to_vec()
      }
    };
    Ok(hex::encode(digest))
  }

  /// Check a hex digest (either case) against `message`. The comparison is
  /// constant-time; malformed hex simply fails.
  pub fn verify_hex(
    &self,
    algorithm: DigestAlgorithm,
    message: &[u8],
    provided_hex: &str,
  ) -> bool {
    let Ok(provided) = hex::decode(provided_hex.trim()) else {
      return false;
    };
    match algorithm {
      DigestAlgorithm::Sha256 => match HmacSha256::new_from_slice(&self.secret) {
        Ok(mut mac) => {
          mac.update(message);
          mac.verify_slice(&provided).is_ok()
        }
        Err(_) => false,
      },
      DigestAlgorithm::Sha512 => match HmacSha512::new_from_slice(&self.secret) {
        Ok(mut mac) => {
          mac.update(message);
          mac.verify_slice(&provided).is_ok()
        }
        Err(_) => false,
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const BODY: &[u8] = br#"{"applicantId":"5f1","type":"applicantReviewed"}"#;

  fn key() -> HmacKey { HmacKey::new("webhook-secret") }

  #[test]
  fn known_vector_sha256() {
    // RFC 4231 test case 2.
    let key = HmacKey::new("Jefe");
    let sig = key
      .sign_hex(DigestAlgorithm::Sha256, b"what do ya want for nothing?")
      .unwrap();
    assert_eq!(
      sig,
      "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
    );
  }

  #[test]
  fn valid_signature_verifies_in_either_case() {
    for alg in [DigestAlgorithm::Sha256, DigestAlgorithm::Sha512] {
      let sig = key().sign_hex(alg, BODY).unwrap();
      assert!(key().verify_hex(alg, BODY, &sig));
      assert!(key().verify_hex(alg, BODY, &sig.to_uppercase()));
    }
  }

  #[test]
  fn every_single_byte_tamper_fails() {
    let sig = key().sign_hex(DigestAlgorithm::Sha256, BODY).unwrap();
    for i in 0..BODY.len() {
      let mut tampered = BODY.to_vec();
      tampered[i] ^= 0x01;
      assert!(
        !key().verify_hex(DigestAlgorithm::Sha256, &tampered, &sig),
        "tampered byte {i} verified"
      );
    }
  }

  #[test]
  fn wrong_secret_algorithm_or_encoding_fails() {
    let sig = key().sign_hex(DigestAlgorithm::Sha256, BODY).unwrap();
    assert!(!HmacKey::new("other").verify_hex(DigestAlgorithm::Sha256, BODY, &sig));
    assert!(!key().verify_hex(DigestAlgorithm::Sha512, BODY, &sig));
    assert!(!key().verify_hex(DigestAlgorithm::Sha256, BODY, "not-hex"));
    assert!(!key().verify_hex(DigestAlgorithm::Sha256, BODY, &sig[..32]));
    assert!(!key().verify_hex(DigestAlgorithm::Sha256, BODY, ""));
  }

  #[test]
  fn algorithm_header_values() {
    assert_eq!(
      DigestAlgorithm::from_header("HMAC_SHA512_HEX"),
      Some(DigestAlgorithm::Sha512)
    );
    assert_eq!(DigestAlgorithm::from_header("HMAC_SHA1_HEX"), None);
    assert_eq!(DigestAlgorithm::Sha256.header_value(), "HMAC_SHA256_HEX");
  }
}
