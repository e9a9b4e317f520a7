//! Configuration management for NightPass.
//!
//! Loads configuration from environment variables with sensible defaults.

use nightpass_core::{
    BasisPoints, PricingError, PricingPolicy, QrCodec, SignatureError, SigningKey,
    pricing::{DEFAULT_COMMISSION_RATE, DEFAULT_SECURE_PREMIUM},
    qr::DEFAULT_MAX_QR_AGE,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Secret used when `TICKET_SIGNING_SECRET` is not set. Development only.
pub const DEV_SIGNING_SECRET: &str = "nightpass-development-secret";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// QR signing configuration
    pub signing: SigningConfig,
    /// Pricing configuration
    pub pricing: PricingConfig,
    /// Biometric matcher configuration
    pub biometrics: BiometricConfig,
    /// Payment gateway configuration
    pub payment: PaymentConfig,
    /// Observability configuration
    pub server: ServerConfig,
}

/// QR signing configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    /// HMAC secret shared by every scanner
    pub secret: String,
    /// Whether `secret` is the development fallback
    pub using_dev_secret: bool,
    /// Maximum QR age in seconds
    pub qr_max_age_secs: u64,
}

impl std::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningConfig")
            .field("secret", &"<redacted>")
            .field("using_dev_secret", &self.using_dev_secret)
            .field("qr_max_age_secs", &self.qr_max_age_secs)
            .finish()
    }
}

/// Pricing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Platform commission in basis points (default: 500 = 5%)
    pub commission_rate_bps: u32,
    /// Secure ticket multiplier in basis points (default: 15000 = 1.5x)
    pub secure_premium_bps: u32,
}

/// Biometric matcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiometricConfig {
    /// Probability the simulated matcher reports a match
    pub match_probability: f64,
}

/// Payment gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Simulated gateway latency in milliseconds
    pub latency_ms: u64,
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Metrics server host (for Prometheus scraping)
    pub metrics_host: String,
    /// Metrics server port
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unparseable values fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let secret = env::var("TICKET_SIGNING_SECRET").ok().filter(|s| !s.is_empty());
        let using_dev_secret = secret.is_none();

        Self {
            signing: SigningConfig {
                secret: secret.unwrap_or_else(|| DEV_SIGNING_SECRET.to_string()),
                using_dev_secret,
                qr_max_age_secs: env::var("QR_MAX_AGE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_MAX_QR_AGE.as_secs()),
            },
            pricing: PricingConfig {
                commission_rate_bps: env::var("COMMISSION_RATE_BPS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_COMMISSION_RATE.value()),
                secure_premium_bps: env::var("SECURE_PREMIUM_BPS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SECURE_PREMIUM.value()),
            },
            biometrics: BiometricConfig {
                match_probability: env::var("BIOMETRIC_MATCH_PROBABILITY")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0.95),
            },
            payment: PaymentConfig {
                latency_ms: env::var("PAYMENT_LATENCY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
            },
            server: ServerConfig {
                log_level: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "info".to_string()),
                metrics_host: env::var("METRICS_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                metrics_port: env::var("METRICS_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(9090),
            },
        }
    }

    /// Signing key built from the configured secret
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::EmptyKey`] if the secret is empty.
    pub fn signing_key(&self) -> Result<SigningKey, SignatureError> {
        SigningKey::from_secret(&self.signing.secret)
    }

    /// QR codec with the configured replay window
    #[must_use]
    pub fn qr_codec(&self) -> QrCodec {
        QrCodec::new(Duration::from_secs(self.signing.qr_max_age_secs))
    }

    /// Pricing policy with the configured rates
    ///
    /// # Errors
    ///
    /// Returns [`PricingError`] if a configured rate is out of range.
    pub fn pricing_policy(&self) -> Result<PricingPolicy, PricingError> {
        PricingPolicy::new(
            BasisPoints::new(self.pricing.commission_rate_bps),
            BasisPoints::new(self.pricing.secure_premium_bps),
        )
    }

    /// Metrics listener address
    #[must_use]
    pub fn metrics_addr(&self) -> String {
        format!("{}:{}", self.server.metrics_host, self.server.metrics_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            signing: SigningConfig {
                secret: DEV_SIGNING_SECRET.to_string(),
                using_dev_secret: true,
                qr_max_age_secs: DEFAULT_MAX_QR_AGE.as_secs(),
            },
            pricing: PricingConfig {
                commission_rate_bps: DEFAULT_COMMISSION_RATE.value(),
                secure_premium_bps: DEFAULT_SECURE_PREMIUM.value(),
            },
            biometrics: BiometricConfig {
                match_probability: 0.95,
            },
            payment: PaymentConfig { latency_ms: 0 },
            server: ServerConfig {
                log_level: "info".to_string(),
                metrics_host: "0.0.0.0".to_string(),
                metrics_port: 9090,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_build_components() {
        let config = Config::default();

        assert!(config.signing.using_dev_secret);
        assert_eq!(config.qr_codec().max_age_ms(), 48 * 60 * 60 * 1000);
        assert_eq!(config.pricing_policy().unwrap(), PricingPolicy::default());
        assert!(config.signing_key().is_ok());
        assert_eq!(config.metrics_addr(), "0.0.0.0:9090");
    }

    #[test]
    fn test_out_of_range_commission_is_rejected() {
        let mut config = Config::default();
        config.pricing.commission_rate_bps = 20_000;
        assert!(config.pricing_policy().is_err());
    }

    #[test]
    fn test_secret_is_redacted() {
        let config = Config::default();
        assert!(!format!("{config:?}").contains(DEV_SIGNING_SECRET));
    }
}
