//! Executes the side effects a lifecycle transition returns.
//!
//! Effects run in phases regardless of the order they were returned in:
//!
//! 1. persistence: the new ticket is written with a compare-and-set against
//!    the ticket it was derived from,
//! 2. money: gateway refunds; a failed refund puts the previous ticket back,
//! 3. bookkeeping: ledger reversals and check-ins.
//!
//! Winning the write is what entitles a transition to move money, so a
//! cancel that races a door scan either refunds a ticket nobody can use or
//! refunds nothing.

use crate::metrics;
use crate::payment_gateway::{PaymentGateway, PaymentGatewayError};
use crate::sales::{SaleAmounts, SalesLedger};
use crate::store::{Revision, StoreError, TicketStore};
use nightpass_core::{Money, Ticket, TicketEffect};
use std::sync::Arc;
use thiserror::Error;

/// Effect execution errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EffectError {
    /// The gateway refused the refund
    #[error("Refund failed: {0}")]
    Refund(#[from] PaymentGatewayError),

    /// A paid ticket has no charge to refund against
    #[error("No payment reference to refund {amount} against")]
    MissingPaymentReference {
        /// Amount that should have been refunded
        amount: Money,
    },

    /// Writing the ticket failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EffectError {
    /// Whether another writer changed the ticket first
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(StoreError::Conflict { .. }))
    }
}

/// What the money phase did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EffectReport {
    /// Gateway reference of the refund, if one was issued
    pub refund_id: Option<String>,
}

struct Refund<'a> {
    amount: Money,
    reference: &'a str,
}

/// Runs lifecycle effects against the collaborators
#[derive(Clone)]
pub struct EffectRunner {
    store: Arc<dyn TicketStore>,
    gateway: Arc<dyn PaymentGateway>,
    ledger: Arc<SalesLedger>,
}

impl EffectRunner {
    /// Creates a new `EffectRunner`
    #[must_use]
    pub fn new(
        store: Arc<dyn TicketStore>,
        gateway: Arc<dyn PaymentGateway>,
        ledger: Arc<SalesLedger>,
    ) -> Self {
        Self {
            store,
            gateway,
            ledger,
        }
    }

    /// Run `effects` that turned `previous` into `next`.
    ///
    /// `previous` must be the ticket as it was loaded from the store.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::Store`] if the write failed or lost a race (no
    /// money moves), and [`EffectError::Refund`] or
    /// [`EffectError::MissingPaymentReference`] if money could not be
    /// returned (the store is left holding `previous`).
    pub async fn run(
        &self,
        previous: &Ticket,
        next: &Ticket,
        effects: &[TicketEffect],
    ) -> Result<EffectReport, EffectError> {
        let refunds = pending_refunds(effects)?;

        if effects.contains(&TicketEffect::Persist) {
            self.store.update_if(next, Revision::of(previous)).await?;
        }

        let mut report = EffectReport::default();
        for refund in refunds {
            match self.gateway.refund(refund.reference, refund.amount).await {
                Ok(refund_id) => {
                    metrics::record_refund(refund.amount);
                    report.refund_id = Some(refund_id);
                }
                Err(e) => {
                    self.restore(previous, next).await;
                    return Err(e.into());
                }
            }
        }

        if next.status != previous.status {
            metrics::record_transition(next.status);
        }

        for effect in effects {
            match effect {
                TicketEffect::ReverseRevenue {
                    event_id,
                    quantity,
                    total,
                    app_commission,
                    venue_revenue,
                } => {
                    self.ledger
                        .record_reversal(
                            *event_id,
                            SaleAmounts {
                                quantity: *quantity,
                                total: *total,
                                app_commission: *app_commission,
                                venue_revenue: *venue_revenue,
                            },
                        )
                        .await;
                }
                TicketEffect::RecordCheckIn { event_id, quantity } => {
                    self.ledger.record_check_in(*event_id, *quantity).await;
                }
                TicketEffect::RefundPayment { .. } | TicketEffect::Persist => {}
            }
        }

        Ok(report)
    }

    /// Put `previous` back after a refund failed.
    ///
    /// `next` is terminal whenever a refund is due, and terminal tickets are
    /// never written again, so this write only fails on a backend error.
    async fn restore(&self, previous: &Ticket, next: &Ticket) {
        if let Err(e) = self.store.update_if(previous, Revision::of(next)).await {
            tracing::error!(
                ticket_id = %next.id,
                status = %next.status,
                error = %e,
                "Refund failed and ticket could not be restored"
            );
        }
    }
}

fn pending_refunds(effects: &[TicketEffect]) -> Result<Vec<Refund<'_>>, EffectError> {
    let mut refunds = Vec::new();
    for effect in effects {
        if let TicketEffect::RefundPayment {
            amount,
            payment_reference,
        } = effect
        {
            if amount.is_zero() {
                continue;
            }
            let reference = payment_reference
                .as_deref()
                .ok_or(EffectError::MissingPaymentReference { amount: *amount })?;
            refunds.push(Refund {
                amount: *amount,
                reference,
            });
        }
    }
    Ok(refunds)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::payment_gateway::{GatewayFuture, MockPaymentGateway, PaymentTransaction};
    use crate::store::InMemoryTicketStore;
    use chrono::Utc;
    use nightpass_core::{EventId, PaymentMethod, TicketId, TicketStatus, TicketType, UserId};

    struct DecliningGateway;

    impl PaymentGateway for DecliningGateway {
        fn charge(&self, _amount: Money, _method: PaymentMethod) -> GatewayFuture<PaymentTransaction> {
            Box::pin(async { Err(PaymentGatewayError::Timeout) })
        }

        fn refund(&self, _transaction_id: &str, _amount: Money) -> GatewayFuture<String> {
            Box::pin(async { Err(PaymentGatewayError::Timeout) })
        }
    }

    fn ticket() -> Ticket {
        Ticket {
            id: TicketId::new(),
            event_id: EventId::new(),
            event_name: "Rooftop Disco".to_string(),
            buyer_id: UserId::new(),
            buyer_name: "Alex Moreno".to_string(),
            buyer_email: "alex@example.com".to_string(),
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

    fn cancel_effects(t: &Ticket) -> Vec<TicketEffect> {
        vec![
            TicketEffect::RefundPayment {
                amount: t.total_amount,
                payment_reference: t.payment_reference.clone(),
            },
            TicketEffect::ReverseRevenue {
                event_id: t.event_id,
                quantity: t.quantity,
                total: t.total_amount,
                app_commission: t.app_commission,
                venue_revenue: t.venue_revenue,
            },
            TicketEffect::Persist,
        ]
    }

    #[tokio::test]
    async fn test_refund_failure_restores_previous_ticket() {
        let store = Arc::new(InMemoryTicketStore::new());
        let ledger = Arc::new(SalesLedger::new());
        let runner = EffectRunner::new(store.clone(), Arc::new(DecliningGateway), ledger.clone());

        let original = ticket();
        store.save(&original).await.unwrap();
        let mut cancelled = original.clone();
        cancelled.status = TicketStatus::Cancelled;

        let err = runner
            .run(&original, &cancelled, &cancel_effects(&original))
            .await
            .unwrap_err();

        assert_eq!(err, EffectError::Refund(PaymentGatewayError::Timeout));
        assert_eq!(store.get(original.id).await.unwrap(), original);
        assert_eq!(ledger.summary(original.event_id).await.refunded_tickets, 0);
    }

    #[tokio::test]
    async fn test_cancel_refunds_persists_and_reverses() {
        let store = Arc::new(InMemoryTicketStore::new());
        let ledger = Arc::new(SalesLedger::new());
        let runner = EffectRunner::new(store.clone(), MockPaymentGateway::shared(), ledger.clone());

        let original = ticket();
        store.save(&original).await.unwrap();
        let mut cancelled = original.clone();
        cancelled.status = TicketStatus::Cancelled;

        let report = runner
            .run(&original, &cancelled, &cancel_effects(&original))
            .await
            .unwrap();

        assert!(report.refund_id.is_some());
        assert_eq!(store.get(original.id).await.unwrap().status, TicketStatus::Cancelled);
        assert_eq!(ledger.summary(original.event_id).await.refunded_amount, Money::from_units(10_000));
    }

    #[tokio::test]
    async fn test_missing_reference_blocks_paid_refund() {
        let store = Arc::new(InMemoryTicketStore::new());
        let runner = EffectRunner::new(store, MockPaymentGateway::shared(), Arc::new(SalesLedger::new()));
        let mut t = ticket();
        t.payment_reference = None;

        let err = runner
            .run(&t, &t, &cancel_effects(&t))
            .await
            .unwrap_err();

        assert!(matches!(err, EffectError::MissingPaymentReference { .. }));
    }

    #[tokio::test]
    async fn test_stale_write_is_a_conflict() {
        let store = Arc::new(InMemoryTicketStore::new());
        let runner = EffectRunner::new(store.clone(), MockPaymentGateway::shared(), Arc::new(SalesLedger::new()));
        let original = ticket();
        store.save(&original).await.unwrap();

        let mut stale = original.clone();
        stale.status = TicketStatus::Used;
        let err = runner
            .run(&stale, &original, &[TicketEffect::Persist])
            .await
            .unwrap_err();

        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_lost_write_moves_no_money() {
        let store = Arc::new(InMemoryTicketStore::new());
        let ledger = Arc::new(SalesLedger::new());
        let runner = EffectRunner::new(store.clone(), Arc::new(DecliningGateway), ledger.clone());

        let original = ticket();
        let mut used = original.clone();
        used.status = TicketStatus::Used;
        store.save(&used).await.unwrap();

        let mut cancelled = original.clone();
        cancelled.status = TicketStatus::Cancelled;
        let err = runner
            .run(&original, &cancelled, &cancel_effects(&original))
            .await
            .unwrap_err();

        // A refund attempt would have surfaced as `EffectError::Refund`
        assert!(err.is_conflict());
        assert_eq!(store.get(original.id).await.unwrap().status, TicketStatus::Used);
        assert_eq!(ledger.summary(original.event_id).await.refunded_tickets, 0);
    }
}
