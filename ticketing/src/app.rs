//! Application wiring.
//!
//! Builds the signer, codec, pricing policy and collaborators once and hands
//! the same instances to the ticket service and the door validator.
//!
//! # Example
//!
//! ```rust,ignore
//! let app = NightPass::builder()
//!     .with_config(Config::from_env())
//!     .with_biometrics(Arc::new(SimulatedBiometrics::new(0.95)))
//!     .build()?;
//!
//! let ticket = app.service().purchase(request).await?;
//! let outcome = app.validator().validate(&ticket.qr_code, &sample, staff_id, None).await;
//! ```

use crate::biometrics::{BiometricMatcher, SimulatedBiometrics};
use crate::config::Config;
use crate::effects::EffectRunner;
use crate::payment_gateway::{MockPaymentGateway, PaymentGateway};
use crate::sales::SalesLedger;
use crate::service::TicketService;
use crate::store::{InMemoryTicketStore, TicketStore};
use crate::validation::ValidationOrchestrator;
use nightpass_core::environment::{Clock, SystemClock};
use nightpass_core::{LifecycleEnvironment, PricingError, SignatureError, TicketSigner};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors building the application
#[derive(Debug, Error)]
pub enum BuildError {
    /// The signing secret is unusable
    #[error("Invalid signing configuration: {0}")]
    Signing(#[from] SignatureError),

    /// The pricing rates are out of range
    #[error("Invalid pricing configuration: {0}")]
    Pricing(#[from] PricingError),
}

/// Builder for a fully wired [`NightPass`].
///
/// Every collaborator is optional; anything not supplied falls back to the
/// in-process default (in-memory store, mock gateway, simulated biometrics,
/// wall clock).
#[derive(Default)]
pub struct NightPassBuilder {
    config: Option<Config>,
    clock: Option<Arc<dyn Clock>>,
    store: Option<Arc<dyn TicketStore>>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    biometrics: Option<Arc<dyn BiometricMatcher>>,
}

impl NightPassBuilder {
    /// Set application configuration.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the clock used for timestamps and QR expiry.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the ticket store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn TicketStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the payment gateway.
    #[must_use]
    pub fn with_payment_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Set the biometric matcher.
    #[must_use]
    pub fn with_biometrics(mut self, biometrics: Arc<dyn BiometricMatcher>) -> Self {
        self.biometrics = Some(biometrics);
        self
    }

    /// Wire everything together.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] if the signing secret is empty or a pricing
    /// rate is out of range.
    pub fn build(self) -> Result<NightPass, BuildError> {
        let config = self.config.unwrap_or_default();
        if config.signing.using_dev_secret {
            tracing::warn!("TICKET_SIGNING_SECRET not set, using the development secret");
        }

        let signer = Arc::new(TicketSigner::new(config.signing_key()?));
        let codec = Arc::new(config.qr_codec());
        let pricing = config.pricing_policy()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryTicketStore::new()));
        let gateway = self.gateway.unwrap_or_else(|| {
            Arc::new(MockPaymentGateway::with_latency(Duration::from_millis(
                config.payment.latency_ms,
            )))
        });
        let biometrics = self.biometrics.unwrap_or_else(|| {
            Arc::new(SimulatedBiometrics::new(config.biometrics.match_probability))
        });
        let ledger = Arc::new(SalesLedger::new());
        let env = LifecycleEnvironment::new(clock);

        let service = TicketService::new(
            signer.clone(),
            codec.clone(),
            pricing,
            store.clone(),
            gateway.clone(),
            biometrics.clone(),
            ledger.clone(),
            env.clone(),
        );
        let validator = ValidationOrchestrator::new(
            signer,
            codec,
            store.clone(),
            biometrics,
            EffectRunner::new(store.clone(), gateway, ledger.clone()),
            env,
        );

        tracing::info!(
            commission_bps = config.pricing.commission_rate_bps,
            secure_premium_bps = config.pricing.secure_premium_bps,
            qr_max_age_secs = config.signing.qr_max_age_secs,
            "NightPass initialized"
        );

        Ok(NightPass {
            service,
            validator,
            store,
            ledger,
        })
    }
}

/// The wired application
#[derive(Clone)]
pub struct NightPass {
    service: TicketService,
    validator: ValidationOrchestrator,
    store: Arc<dyn TicketStore>,
    ledger: Arc<SalesLedger>,
}

impl NightPass {
    /// Start building an application
    #[must_use]
    pub fn builder() -> NightPassBuilder {
        NightPassBuilder::default()
    }

    /// Build with every default collaborator
    ///
    /// # Errors
    ///
    /// See [`NightPassBuilder::build`].
    pub fn from_config(config: Config) -> Result<Self, BuildError> {
        Self::builder().with_config(config).build()
    }

    /// Purchase and lifecycle operations
    #[must_use]
    pub const fn service(&self) -> &TicketService {
        &self.service
    }

    /// Door validation
    #[must_use]
    pub const fn validator(&self) -> &ValidationOrchestrator {
        &self.validator
    }

    /// Ticket store
    #[must_use]
    pub fn store(&self) -> Arc<dyn TicketStore> {
        self.store.clone()
    }

    /// Sales ledger
    #[must_use]
    pub fn ledger(&self) -> Arc<SalesLedger> {
        self.ledger.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_build() {
        assert!(NightPass::from_config(Config::default()).is_ok());
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        let mut config = Config::default();
        config.signing.secret = String::new();
        config.signing.using_dev_secret = false;

        assert!(matches!(
            NightPass::from_config(config),
            Err(BuildError::Signing(SignatureError::EmptyKey))
        ));
    }
}
