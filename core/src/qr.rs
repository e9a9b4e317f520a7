//! QR transport codec.
//!
//! A QR code carries `base64(JSON(SignedQrData))`: standard alphabet, padded.
//! This string is the one format shared bit-for-bit between ticket issuance
//! and door scanners.

use crate::types::SignedQrData;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::time::Duration;
use thiserror::Error;

/// The only payload version scanners accept
pub const SUPPORTED_QR_VERSION: &str = "2.0";

/// Replay window for a QR payload (48 hours)
pub const DEFAULT_MAX_QR_AGE: Duration = Duration::from_secs(48 * 60 * 60);

/// QR codec errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QrError {
    /// The string is not base64, not JSON, or lacks required fields
    #[error("malformed QR payload: {reason}")]
    Malformed {
        /// What failed
        reason: String,
    },

    /// The signed data could not be serialized
    #[error("QR payload serialization failed: {0}")]
    Serialization(String),
}

/// Encodes and decodes QR transport strings and applies the version and
/// replay-window checks.
#[derive(Clone, Copy, Debug)]
pub struct QrCodec {
    max_age_ms: i64,
}

impl QrCodec {
    /// Creates a codec with the given replay window
    #[must_use]
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age_ms: i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// Replay window in milliseconds
    #[must_use]
    pub const fn max_age_ms(&self) -> i64 {
        self.max_age_ms
    }

    /// Serializes signed data into a QR transport string.
    ///
    /// # Errors
    ///
    /// Returns [`QrError::Serialization`] if JSON serialization fails.
    pub fn encode(&self, data: &SignedQrData) -> Result<String, QrError> {
        let json = serde_json::to_vec(data).map_err(|e| QrError::Serialization(e.to_string()))?;
        Ok(STANDARD.encode(json))
    }

    /// Parses a QR transport string.
    ///
    /// # Errors
    ///
    /// Returns [`QrError::Malformed`] if the string is not base64, the bytes
    /// are not JSON, or a required field is missing or mistyped.
    pub fn decode(&self, encoded: &str) -> Result<SignedQrData, QrError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| QrError::Malformed {
                reason: format!("invalid base64: {e}"),
            })?;
        serde_json::from_slice(&bytes).map_err(|e| QrError::Malformed {
            reason: format!("invalid ticket JSON: {e}"),
        })
    }

    /// Whether the payload version is the supported one.
    #[must_use]
    pub fn check_version(&self, data: &SignedQrData) -> bool {
        data.payload.version == SUPPORTED_QR_VERSION
    }

    /// Whether the payload is still inside the replay window at `now_ms`.
    ///
    /// A payload exactly `max_age` old is still accepted.
    #[must_use]
    pub const fn check_expiry(&self, data: &SignedQrData, now_ms: i64) -> bool {
        now_ms.saturating_sub(data.payload.timestamp) <= self.max_age_ms
    }
}

impl Default for QrCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QR_AGE)
    }
}
