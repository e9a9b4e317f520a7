//! HMAC-SHA256 signatures over ticket payloads.
//!
//! The payload is canonicalized with the JSON Canonicalization Scheme
//! (RFC 8785) before hashing, so any signer holding the same key produces the
//! same bytes regardless of field order in memory or on the wire.
//!
//! The key is a server-side secret. Scanners send the QR string to the
//! validating service; they never hold the key.

use crate::types::{SignedQrData, TicketPayload};
use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Errors raised while signing or verifying.
///
/// A signature that simply does not match is not an error; see
/// [`TicketSigner::verify`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// The signing key is empty.
    #[error("signing key must not be empty")]
    EmptyKey,

    /// The payload could not be canonicalized.
    #[error("ticket payload could not be canonicalized: {0}")]
    MalformedPayload(String),
}

/// Shared secret for ticket signatures.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::EmptyKey`] if `bytes` is empty.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, SignatureError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(SignatureError::EmptyKey);
        }
        Ok(Self(bytes))
    }

    /// Creates a key from a configured secret string.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::EmptyKey`] if `secret` is empty.
    pub fn from_secret(secret: &str) -> Result<Self, SignatureError> {
        Self::new(secret.as_bytes())
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Returns the RFC 8785 canonical JSON bytes of a payload.
///
/// # Errors
///
/// Returns [`SignatureError::MalformedPayload`] if serialization fails.
pub fn canonical_payload(payload: &TicketPayload) -> Result<Vec<u8>, SignatureError> {
    serde_jcs::to_vec(payload).map_err(|e| SignatureError::MalformedPayload(e.to_string()))
}

/// Signs and verifies ticket payloads with one shared key.
#[derive(Clone, Debug)]
pub struct TicketSigner {
    key: SigningKey,
}

impl TicketSigner {
    /// Creates a signer for the given key
    #[must_use]
    pub const fn new(key: SigningKey) -> Self {
        Self { key }
    }

    fn digest(&self, payload: &TicketPayload) -> Result<Vec<u8>, SignatureError> {
        let canonical = canonical_payload(payload)?;
        // HMAC accepts keys of any length; SigningKey already rejects empty ones.
        let mut mac =
            HmacSha256::new_from_slice(&self.key.0).map_err(|_| SignatureError::EmptyKey)?;
        mac.update(&canonical);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Computes the lowercase hex signature of a payload.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::MalformedPayload`] if the payload cannot be
    /// canonicalized.
    pub fn sign(&self, payload: &TicketPayload) -> Result<String, SignatureError> {
        Ok(hex::encode(self.digest(payload)?))
    }

    /// Checks a hex signature against a payload in constant time.
    ///
    /// Returns `Ok(false)` for any mismatch, including signatures that are not
    /// valid hex or have the wrong length.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::MalformedPayload`] if the payload cannot be
    /// canonicalized.
    pub fn verify(&self, payload: &TicketPayload, signature: &str) -> Result<bool, SignatureError> {
        let expected = self.digest(payload)?;
        let Ok(supplied) = hex::decode(signature) else {
            return Ok(false);
        };
        if supplied.len() != expected.len() {
            return Ok(false);
        }
        Ok(constant_time_eq(&expected, &supplied))
    }

    /// Signs a payload and bundles it with its signature.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::MalformedPayload`] if the payload cannot be
    /// canonicalized.
    pub fn sign_payload(&self, payload: TicketPayload) -> Result<SignedQrData, SignatureError> {
        let signature = self.sign(&payload)?;
        Ok(SignedQrData { payload, signature })
    }

    /// Verifies a decoded QR bundle.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::MalformedPayload`] if the payload cannot be
    /// canonicalized.
    pub fn verify_signed(&self, data: &SignedQrData) -> Result<bool, SignatureError> {
        self.verify(&data.payload, &data.signature)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{EventId, TicketId, TicketType, UserId};

    fn payload() -> TicketPayload {
        TicketPayload {
            ticket_id: TicketId::new(),
            event_id: EventId::new(),
            event_name: "Warehouse Night".to_string(),
            buyer_id: UserId::new(),
            buyer_name: "Sam Rivera".to_string(),
            ticket_type: TicketType::Secure,
            quantity: 2,
            purchase_date: "2025-01-01T00:00:00+00:00".to_string(),
            timestamp: 1_735_689_600_000,
            version: "2.0".to_string(),
        }
    }

    fn signer(secret: &str) -> TicketSigner {
        TicketSigner::new(SigningKey::from_secret(secret).unwrap())
    }

    #[test]
    fn test_sign_is_deterministic() {
        let payload = payload();
        let signer = signer("door-secret");
        let first = signer.sign(&payload).unwrap();
        let second = signer.sign(&payload).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_verify_round_trip() {
        let payload = payload();
        let signer = signer("door-secret");
        let signature = signer.sign(&payload).unwrap();
        assert!(signer.verify(&payload, &signature).unwrap());
    }

    #[test]
    fn test_tampered_quantity_fails() {
        let payload = payload();
        let signer = signer("door-secret");
        let signature = signer.sign(&payload).unwrap();

        let mut tampered = payload;
        tampered.quantity = 10;
        assert!(!signer.verify(&tampered, &signature).unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let payload = payload();
        let forged = signer("someone-else").sign(&payload).unwrap();
        assert!(!signer("door-secret").verify(&payload, &forged).unwrap());
    }

    #[test]
    fn test_garbage_signature_is_mismatch_not_error() {
        let payload = payload();
        let signer = signer("door-secret");
        assert_eq!(signer.verify(&payload, "not-hex"), Ok(false));
        assert_eq!(signer.verify(&payload, "abcd"), Ok(false));
        assert_eq!(signer.verify(&payload, ""), Ok(false));
    }

    #[test]
    fn test_canonical_form_sorts_keys() {
        let canonical = String::from_utf8(canonical_payload(&payload()).unwrap()).unwrap();
        assert!(canonical.starts_with("{\"buyerId\":"));
        assert!(canonical.ends_with("\"version\":\"2.0\"}"));
        assert!(!canonical.contains(": "));
    }

    #[test]
    fn test_empty_key_rejected() {
        assert_eq!(SigningKey::from_secret("").unwrap_err(), SignatureError::EmptyKey);
    }

    #[test]
    fn test_key_debug_is_redacted() {
        let key = SigningKey::from_secret("door-secret").unwrap();
        assert!(!format!("{key:?}").contains("door-secret"));
    }
}
