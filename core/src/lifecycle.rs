//! Ticket lifecycle reducer.
//!
//! ```text
//!              GrantEntry ──► used
//!             ┌ Cancel ─────► cancelled   (refund + revenue reversal)
//!   active ───┼ Refund ─────► refunded    (refund + revenue reversal)
//!             └ Expire ─────► expired
//!   active ── DenyEntry / ReissueQr ──► active
//! ```
//!
//! Every state other than `active` is terminal. The reducer mutates the ticket
//! and describes the side effects the caller must carry out; it performs no
//! I/O itself.

use crate::environment::Clock;
use crate::reducer::Reducer;
use crate::types::{
    EventId, Money, Ticket, TicketStatus, TicketValidation, UserId, ValidationId,
};
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Actions
// ============================================================================

/// Commands accepted by the ticket lifecycle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketAction {
    /// Admit the holder: active → used
    GrantEntry {
        /// Validation record ID
        validation_id: ValidationId,
        /// Door operator
        validated_by: UserId,
        /// Whether a biometric comparison ran and matched
        biometric_match: bool,
        /// Scanner location
        location: Option<String>,
    },

    /// Record a refused scan; the ticket stays active
    DenyEntry {
        /// Validation record ID
        validation_id: ValidationId,
        /// Door operator
        validated_by: UserId,
        /// Whether a biometric comparison ran and matched
        biometric_match: bool,
        /// Scanner location
        location: Option<String>,
        /// Why entry was refused
        reason: String,
    },

    /// Owner or operator cancellation: active → cancelled
    Cancel {
        /// Cancellation reason
        reason: String,
    },

    /// After-the-fact reversal: active → refunded
    Refund {
        /// Refund reason
        reason: String,
    },

    /// The event is over: active → expired
    Expire,

    /// Replace the QR code of an active ticket
    ReissueQr {
        /// Freshly encoded QR string
        qr_code: String,
    },
}

impl TicketAction {
    /// Short name for logs and metrics
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GrantEntry { .. } => "grant_entry",
            Self::DenyEntry { .. } => "deny_entry",
            Self::Cancel { .. } => "cancel",
            Self::Refund { .. } => "refund",
            Self::Expire => "expire",
            Self::ReissueQr { .. } => "reissue_qr",
        }
    }
}

// ============================================================================
// Effects
// ============================================================================

/// Side effects a lifecycle transition requires, in execution order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TicketEffect {
    /// Return the purchase amount through the payment gateway
    RefundPayment {
        /// Amount to return
        amount: Money,
        /// Gateway reference of the original charge
        payment_reference: Option<String>,
    },

    /// Take the sale back out of the event's revenue
    ReverseRevenue {
        /// Event
        event_id: EventId,
        /// Admissions reversed
        quantity: u32,
        /// Total reversed
        total: Money,
        /// Platform share reversed
        app_commission: Money,
        /// Venue share reversed
        venue_revenue: Money,
    },

    /// Count admissions at the door
    RecordCheckIn {
        /// Event
        event_id: EventId,
        /// Admissions
        quantity: u32,
    },

    /// Write the updated ticket back to the store
    Persist,
}

// ============================================================================
// Errors
// ============================================================================

/// Lifecycle errors
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    /// The ticket is not active
    #[error("Ticket is {status}")]
    InvalidTransition {
        /// Status the ticket is in
        status: TicketStatus,
    },
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the lifecycle reducer
#[derive(Clone)]
pub struct LifecycleEnvironment {
    /// Clock for transition and validation timestamps
    pub clock: Arc<dyn Clock>,
}

impl LifecycleEnvironment {
    /// Creates a new `LifecycleEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for a single ticket's lifecycle
#[derive(Clone, Copy, Debug, Default)]
pub struct TicketLifecycle;

impl TicketLifecycle {
    /// Creates a new `TicketLifecycle`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Fails unless the ticket is active.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] carrying the current status.
    pub const fn ensure_active(ticket: &Ticket) -> Result<(), LifecycleError> {
        match ticket.status {
            TicketStatus::Active => Ok(()),
            status => Err(LifecycleError::InvalidTransition { status }),
        }
    }

    fn close(ticket: &mut Ticket, status: TicketStatus, reason: Option<String>, env: &LifecycleEnvironment) {
        ticket.status = status;
        ticket.status_changed_at = Some(env.clock.now());
        ticket.status_reason = reason;
    }

    fn reversal_effects(ticket: &Ticket) -> SmallVec<[TicketEffect; 4]> {
        smallvec![
            TicketEffect::RefundPayment {
                amount: ticket.total_amount,
                payment_reference: ticket.payment_reference.clone(),
            },
            TicketEffect::ReverseRevenue {
                event_id: ticket.event_id,
                quantity: ticket.quantity,
                total: ticket.total_amount,
                app_commission: ticket.app_commission,
                venue_revenue: ticket.venue_revenue,
            },
            TicketEffect::Persist,
        ]
    }
}

impl Reducer for TicketLifecycle {
    type State = Ticket;
    type Action = TicketAction;
    type Effect = TicketEffect;
    type Error = LifecycleError;
    type Environment = LifecycleEnvironment;

    fn reduce(
        &self,
        ticket: &mut Ticket,
        action: TicketAction,
        env: &LifecycleEnvironment,
    ) -> Result<SmallVec<[TicketEffect; 4]>, LifecycleError> {
        Self::ensure_active(ticket)?;

        match action {
            TicketAction::GrantEntry {
                validation_id,
                validated_by,
                biometric_match,
                location,
            } => {
                let now = env.clock.now();
                ticket.validation_history.push(TicketValidation {
                    id: validation_id,
                    ticket_id: ticket.id,
                    validated_at: now,
                    validated_by,
                    biometric_match,
                    entry_granted: true,
                    location,
                    reason: None,
                });
                ticket.status = TicketStatus::Used;
                ticket.status_changed_at = Some(now);
                ticket.status_reason = None;

                Ok(smallvec![
                    TicketEffect::RecordCheckIn {
                        event_id: ticket.event_id,
                        quantity: ticket.quantity,
                    },
                    TicketEffect::Persist,
                ])
            }

            TicketAction::DenyEntry {
                validation_id,
                validated_by,
                biometric_match,
                location,
                reason,
            } => {
                ticket.validation_history.push(TicketValidation {
                    id: validation_id,
                    ticket_id: ticket.id,
                    validated_at: env.clock.now(),
                    validated_by,
                    biometric_match,
                    entry_granted: false,
                    location,
                    reason: Some(reason),
                });
                Ok(smallvec![TicketEffect::Persist])
            }

            TicketAction::Cancel { reason } => {
                Self::close(ticket, TicketStatus::Cancelled, Some(reason), env);
                Ok(Self::reversal_effects(ticket))
            }

            TicketAction::Refund { reason } => {
                Self::close(ticket, TicketStatus::Refunded, Some(reason), env);
                Ok(Self::reversal_effects(ticket))
            }

            TicketAction::Expire => {
                Self::close(ticket, TicketStatus::Expired, None, env);
                Ok(smallvec![TicketEffect::Persist])
            }

            TicketAction::ReissueQr { qr_code } => {
                ticket.qr_code = qr_code;
                Ok(smallvec![TicketEffect::Persist])
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::environment::SystemClock;
    use crate::types::{TicketId, TicketType};
    use chrono::Utc;

    fn env() -> LifecycleEnvironment {
        LifecycleEnvironment::new(Arc::new(SystemClock))
    }

    fn active_ticket() -> Ticket {
        Ticket {
            id: TicketId::new(),
            event_id: EventId::new(),
            event_name: "Basement Techno".to_string(),
            buyer_id: UserId::new(),
            buyer_name: "Lee Park".to_string(),
            buyer_email: "lee@example.com".to_string(),
            quantity: 1,
            ticket_type: TicketType::Regular,
            unit_price: Money::from_units(10_000),
            total_amount: Money::from_units(10_000),
            app_commission: Money::from_units(500),
            venue_revenue: Money::from_units(9_500),
            purchase_date: Utc::now(),
            qr_code: String::new(),
            status: TicketStatus::Active,
            payment_reference: Some("txn_1".to_string()),
            biometric_template: None,
            status_changed_at: None,
            status_reason: None,
            validation_history: Vec::new(),
        }
    }

    #[test]
    fn test_deny_keeps_ticket_active() {
        let mut ticket = active_ticket();
        let effects = TicketLifecycle
            .reduce(
                &mut ticket,
                TicketAction::DenyEntry {
                    validation_id: ValidationId::new(),
                    validated_by: UserId::new(),
                    biometric_match: false,
                    location: None,
                    reason: "Biometric verification failed".to_string(),
                },
                &env(),
            )
            .unwrap();

        assert_eq!(ticket.status, TicketStatus::Active);
        assert_eq!(ticket.denied_attempts(), 1);
        assert_eq!(effects.as_slice(), &[TicketEffect::Persist]);
    }

    #[test]
    fn test_expire_has_no_money_effects() {
        let mut ticket = active_ticket();
        let effects = TicketLifecycle
            .reduce(&mut ticket, TicketAction::Expire, &env())
            .unwrap();
        assert_eq!(ticket.status, TicketStatus::Expired);
        assert!(ticket.status_changed_at.is_some());
        assert_eq!(effects.as_slice(), &[TicketEffect::Persist]);
    }

    #[test]
    fn test_terminal_ticket_is_untouched() {
        let mut ticket = active_ticket();
        ticket.status = TicketStatus::Refunded;
        let before = ticket.clone();

        let err = TicketLifecycle
            .reduce(
                &mut ticket,
                TicketAction::ReissueQr {
                    qr_code: "new".to_string(),
                },
                &env(),
            )
            .unwrap_err();

        assert_eq!(err.to_string(), "Ticket is refunded");
        assert_eq!(ticket, before);
    }
}
