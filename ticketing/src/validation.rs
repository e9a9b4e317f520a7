//! Door validation.
//!
//! A scan runs through these checks in order and stops at the first failure:
//!
//! ```text
//! decode → version → signature → expiry → lookup → active → biometric → used
//! ```
//!
//! The first four never touch the store, so forged or stale codes cost
//! nothing but CPU. A biometric mismatch, or a matcher that cannot answer,
//! is recorded on the ticket, which stays active. Every failure comes back as a [`ValidationOutcome`]; nothing
//! escapes as an error.

use crate::biometrics::{BiometricMatcher, BiometricSample};
use crate::effects::EffectRunner;
use crate::metrics;
use crate::store::{StoreError, TicketStore};
use nightpass_core::reducer::Reducer;
use nightpass_core::{
    LifecycleEnvironment, LifecycleError, QrCodec, Ticket, TicketAction, TicketId, TicketLifecycle,
    TicketSigner, TicketStatus, UserId, ValidationId,
};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Attempts at writing a scan before giving up on a contended ticket.
///
/// A conflict means another scan was written, so a scan only loses as many
/// times as there are scanners racing it.
const MAX_WRITE_ATTEMPTS: usize = 64;

// ============================================================================
// Errors
// ============================================================================

/// Why a scan did not admit the holder
///
/// The display text of each variant is the reason shown at the door.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The scanned string is not a QR payload
    #[error("Invalid QR code format")]
    MalformedPayload(String),

    /// The payload is from an unsupported format version
    #[error("Incompatible QR code version")]
    VersionMismatch {
        /// Version found in the payload
        found: String,
    },

    /// The signature does not match the payload
    #[error("Invalid QR code signature - ticket may be forged")]
    SignatureInvalid,

    /// The payload is older than the replay window
    #[error("QR code has expired")]
    Expired,

    /// No ticket with the payload's ID
    #[error("Ticket not found")]
    NotFound(TicketId),

    /// The ticket is not active
    #[error("Ticket is {status}")]
    InvalidTransition {
        /// Current status
        status: TicketStatus,
    },

    /// The holder does not match the enrolled biometric
    #[error("Biometric verification failed")]
    BiometricMismatch,

    /// A collaborator failed; the detail is logged, not shown
    #[error("Validation error occurred")]
    CollaboratorFailure(String),
}

impl ValidationError {
    /// Short label for metrics
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MalformedPayload(_) => "malformed",
            Self::VersionMismatch { .. } => "version_mismatch",
            Self::SignatureInvalid => "signature_invalid",
            Self::Expired => "expired",
            Self::NotFound(_) => "not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::BiometricMismatch => "biometric_mismatch",
            Self::CollaboratorFailure(_) => "collaborator_failure",
        }
    }
}

impl From<LifecycleError> for ValidationError {
    fn from(error: LifecycleError) -> Self {
        match error {
            LifecycleError::InvalidTransition { status } => Self::InvalidTransition { status },
        }
    }
}

impl From<StoreError> for ValidationError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::CollaboratorFailure(other.to_string()),
        }
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Result of one scan
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// Whether the holder was admitted
    pub success: bool,
    /// Reason shown at the door when not admitted
    pub reason: Option<String>,
    /// The ticket as stored after the scan, when the scan reached it
    pub ticket: Option<Ticket>,
    /// Typed failure
    pub error: Option<ValidationError>,
}

impl ValidationOutcome {
    fn granted(ticket: Ticket) -> Self {
        Self {
            success: true,
            reason: None,
            ticket: Some(ticket),
            error: None,
        }
    }

    fn denied(error: ValidationError, ticket: Option<Ticket>) -> Self {
        Self {
            success: false,
            reason: Some(error.to_string()),
            ticket,
            error: Some(error),
        }
    }
}

struct Denial {
    error: ValidationError,
    ticket: Option<Ticket>,
}

impl From<ValidationError> for Denial {
    fn from(error: ValidationError) -> Self {
        Self {
            error,
            ticket: None,
        }
    }
}

impl From<LifecycleError> for Denial {
    fn from(error: LifecycleError) -> Self {
        ValidationError::from(error).into()
    }
}

impl From<StoreError> for Denial {
    fn from(error: StoreError) -> Self {
        ValidationError::from(error).into()
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Validates scanned tickets at the door
#[derive(Clone)]
pub struct ValidationOrchestrator {
    signer: Arc<TicketSigner>,
    codec: Arc<QrCodec>,
    store: Arc<dyn TicketStore>,
    biometrics: Arc<dyn BiometricMatcher>,
    effects: EffectRunner,
    env: LifecycleEnvironment,
}

impl ValidationOrchestrator {
    /// Creates a new `ValidationOrchestrator`
    #[must_use]
    pub fn new(
        signer: Arc<TicketSigner>,
        codec: Arc<QrCodec>,
        store: Arc<dyn TicketStore>,
        biometrics: Arc<dyn BiometricMatcher>,
        effects: EffectRunner,
        env: LifecycleEnvironment,
    ) -> Self {
        Self {
            signer,
            codec,
            store,
            biometrics,
            effects,
            env,
        }
    }

    /// Validate a scanned QR string.
    ///
    /// `sample` is the biometric capture taken at the door; it is only
    /// compared for secure tickets.
    pub async fn validate(
        &self,
        qr: &str,
        sample: &BiometricSample,
        validator: UserId,
        location: Option<String>,
    ) -> ValidationOutcome {
        let started = Instant::now();
        let result = self.check(qr, sample, validator, location).await;
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(ticket) => {
                metrics::record_validation_granted(elapsed);
                tracing::info!(
                    ticket_id = %ticket.id,
                    event_id = %ticket.event_id,
                    validator = %validator,
                    quantity = ticket.quantity,
                    "Entry granted"
                );
                ValidationOutcome::granted(ticket)
            }
            Err(Denial { error, ticket }) => {
                metrics::record_validation_denied(error.kind(), elapsed);
                match &error {
                    ValidationError::CollaboratorFailure(detail) => {
                        tracing::error!(validator = %validator, error = %detail, "Validation failed");
                    }
                    other => {
                        tracing::warn!(
                            validator = %validator,
                            ticket_id = ?ticket.as_ref().map(|t| t.id),
                            reason = %other,
                            "Entry denied"
                        );
                    }
                }
                ValidationOutcome::denied(error, ticket)
            }
        }
    }

    async fn check(
        &self,
        qr: &str,
        sample: &BiometricSample,
        validator: UserId,
        location: Option<String>,
    ) -> Result<Ticket, Denial> {
        let data = self
            .codec
            .decode(qr)
            .map_err(|e| ValidationError::MalformedPayload(e.to_string()))?;

        if !self.codec.check_version(&data) {
            return Err(ValidationError::VersionMismatch {
                found: data.payload.version,
            }
            .into());
        }

        match self.signer.verify_signed(&data) {
            Ok(true) => {}
            Ok(false) => return Err(ValidationError::SignatureInvalid.into()),
            Err(e) => return Err(ValidationError::MalformedPayload(e.to_string()).into()),
        }

        if !self.codec.check_expiry(&data, self.env.clock.now_millis()) {
            return Err(ValidationError::Expired.into());
        }

        let ticket_id = data.payload.ticket_id;
        let mut ticket = self.store.get(ticket_id).await?;
        TicketLifecycle::ensure_active(&ticket)?;

        // Regular tickets carry no template and are admitted without a match
        let (biometric_match, refusal) = if ticket.ticket_type.requires_biometric() {
            match self.compare_biometric(&ticket, sample).await {
                Ok(true) => (true, None),
                Ok(false) => (false, Some(ValidationError::BiometricMismatch)),
                Err(e) => (false, Some(e)),
            }
        } else {
            (false, None)
        };
        let validation_id = ValidationId::new();

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let action = match &refusal {
                None => TicketAction::GrantEntry {
                    validation_id,
                    validated_by: validator,
                    biometric_match,
                    location: location.clone(),
                },
                Some(error) => TicketAction::DenyEntry {
                    validation_id,
                    validated_by: validator,
                    biometric_match,
                    location: location.clone(),
                    reason: error.to_string(),
                },
            };

            let mut next = ticket.clone();
            let effects = TicketLifecycle.reduce(&mut next, action, &self.env)?;

            match self.effects.run(&ticket, &next, &effects).await {
                Ok(_) => {
                    return match refusal {
                        None => Ok(next),
                        Some(error) => Err(Denial {
                            error,
                            ticket: Some(next),
                        }),
                    };
                }
                Err(e) if e.is_conflict() && attempt < MAX_WRITE_ATTEMPTS => {
                    tracing::debug!(ticket_id = %ticket_id, attempt, "Ticket changed during validation, reloading");
                    ticket = self.store.get(ticket_id).await?;
                }
                Err(e) => return Err(ValidationError::CollaboratorFailure(e.to_string()).into()),
            }
        }

        Err(ValidationError::CollaboratorFailure(format!(
            "ticket {ticket_id} still contended after {MAX_WRITE_ATTEMPTS} attempts"
        ))
        .into())
    }

    async fn compare_biometric(
        &self,
        ticket: &Ticket,
        sample: &BiometricSample,
    ) -> Result<bool, ValidationError> {
        let Some(template) = ticket.biometric_template.as_deref() else {
            tracing::warn!(ticket_id = %ticket.id, "Secure ticket has no enrolled biometric template");
            return Ok(false);
        };

        self.biometrics
            .compare(template, sample)
            .await
            .map_err(|e| ValidationError::CollaboratorFailure(e.to_string()))
    }
}
