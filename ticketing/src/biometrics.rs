//! Biometric capture and comparison.
//!
//! Matching itself is an external capability. The platform only stores a
//! template reference at purchase and asks for a yes/no answer at the door.

use async_trait::async_trait;
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Raw capture from a door scanner or the buyer's device
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BiometricSample {
    data: Vec<u8>,
}

impl BiometricSample {
    /// Wraps captured bytes
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    /// Captured bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Template reference stored on a secure ticket for this sample
    #[must_use]
    pub fn template(&self) -> String {
        hex::encode(Sha256::digest(&self.data))
    }
}

/// Biometric collaborator errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BiometricError {
    /// No capture device or matching service available
    #[error("Biometric service unavailable: {0}")]
    Unavailable(String),

    /// The capture could not be used
    #[error("Biometric capture failed: {0}")]
    CaptureFailed(String),
}

/// Biometric matching capability
#[async_trait]
pub trait BiometricMatcher: Send + Sync {
    /// Capture a fresh sample
    ///
    /// # Errors
    ///
    /// Returns error if no sample can be captured.
    async fn capture(&self) -> Result<BiometricSample, BiometricError>;

    /// Compare a captured sample against an enrolled template
    ///
    /// # Errors
    ///
    /// Returns error if the matching service cannot answer.
    async fn compare(&self, template: &str, sample: &BiometricSample) -> Result<bool, BiometricError>;
}

/// Stand-in matcher that answers yes with a fixed probability
#[derive(Clone, Copy, Debug)]
pub struct SimulatedBiometrics {
    match_probability: f64,
}

impl SimulatedBiometrics {
    /// Creates a matcher; the probability is clamped to `0.0..=1.0`
    #[must_use]
    pub fn new(match_probability: f64) -> Self {
        let match_probability = if match_probability.is_nan() {
            0.0
        } else {
            match_probability.clamp(0.0, 1.0)
        };
        Self { match_probability }
    }

    /// Configured match probability
    #[must_use]
    pub const fn match_probability(&self) -> f64 {
        self.match_probability
    }
}

impl Default for SimulatedBiometrics {
    fn default() -> Self {
        Self::new(0.95)
    }
}

#[async_trait]
impl BiometricMatcher for SimulatedBiometrics {
    async fn capture(&self) -> Result<BiometricSample, BiometricError> {
        let bytes: [u8; 32] = rand::thread_rng().r#gen();
        Ok(BiometricSample::new(bytes.to_vec()))
    }

    async fn compare(&self, template: &str, sample: &BiometricSample) -> Result<bool, BiometricError> {
        let matched = rand::thread_rng().gen_bool(self.match_probability);
        tracing::debug!(
            template_len = template.len(),
            sample_len = sample.as_bytes().len(),
            matched,
            "Simulated biometric comparison"
        );
        Ok(matched)
    }
}

/// Deterministic matcher for tests and demos
#[derive(Clone, Debug)]
pub struct FixedBiometrics {
    answer: Result<bool, BiometricError>,
}

impl FixedBiometrics {
    /// Every comparison matches
    #[must_use]
    pub const fn matching() -> Self {
        Self { answer: Ok(true) }
    }

    /// Every comparison fails
    #[must_use]
    pub const fn mismatching() -> Self {
        Self { answer: Ok(false) }
    }

    /// Every call errors
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            answer: Err(BiometricError::Unavailable("matcher offline".to_string())),
        }
    }
}

#[async_trait]
impl BiometricMatcher for FixedBiometrics {
    async fn capture(&self) -> Result<BiometricSample, BiometricError> {
        self.answer.clone()?;
        Ok(BiometricSample::new(b"fixed-sample".to_vec()))
    }

    async fn compare(&self, _template: &str, _sample: &BiometricSample) -> Result<bool, BiometricError> {
        self.answer.clone()
    }
}
