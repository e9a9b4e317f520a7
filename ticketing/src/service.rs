//! Ticket purchase and lifecycle operations.
//!
//! Purchase runs price → hold capacity → charge → enrol biometric → sign →
//! encode → save → confirm the hold. A failure after the charge refunds the
//! buyer before the error is returned.

use crate::biometrics::{BiometricError, BiometricMatcher};
use crate::effects::{EffectError, EffectRunner};
use crate::metrics;
use crate::payment_gateway::{PaymentGateway, PaymentGatewayError, PaymentTransaction};
use crate::sales::{SaleAmounts, SalesLedger, SalesSummary};
use crate::store::{StoreError, TicketStore};
use nightpass_core::reducer::Reducer;
use nightpass_core::{
    Buyer, EventId, EventListing, LifecycleEnvironment, LifecycleError, PaymentMethod,
    PriceBreakdown, PricingError, PricingPolicy, QrCodec, QrError, SignatureError, Ticket,
    TicketAction, TicketId, TicketLifecycle, TicketSigner, TicketStatus, TicketType,
    TicketValidation, UserId,
};
use std::sync::Arc;
use thiserror::Error;

/// A buyer's order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PurchaseRequest {
    /// Event being attended
    pub event: EventListing,
    /// Who pays and attends
    pub buyer: Buyer,
    /// Regular or secure
    pub ticket_type: TicketType,
    /// Admissions on one ticket
    pub quantity: u32,
    /// How the buyer pays
    pub payment_method: PaymentMethod,
}

/// Ticket service errors
#[derive(Debug, Error)]
pub enum TicketServiceError {
    /// The order could not be priced
    #[error("Pricing failed: {0}")]
    Pricing(#[from] PricingError),

    /// Not enough admissions left
    #[error("Event {event_id} sold out: requested {requested}, {remaining} remaining")]
    SoldOut {
        /// Event
        event_id: EventId,
        /// Admissions requested
        requested: u32,
        /// Admissions still available
        remaining: u64,
    },

    /// The charge was refused
    #[error("Payment declined: {0}")]
    PaymentDeclined(#[from] PaymentGatewayError),

    /// Enrolling the buyer's biometric failed
    #[error(transparent)]
    Biometric(#[from] BiometricError),

    /// Signing the QR payload failed
    #[error("Ticket signing failed: {0}")]
    Signature(#[from] SignatureError),

    /// Encoding the QR payload failed
    #[error("QR encoding failed: {0}")]
    Qr(#[from] QrError),

    /// The ticket store failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The ticket is not in a state that allows the operation
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// A transition's side effects failed
    #[error(transparent)]
    Effect(#[from] EffectError),
}

/// Purchase and lifecycle operations over the ticket store
#[derive(Clone)]
pub struct TicketService {
    signer: Arc<TicketSigner>,
    codec: Arc<QrCodec>,
    pricing: PricingPolicy,
    store: Arc<dyn TicketStore>,
    gateway: Arc<dyn PaymentGateway>,
    biometrics: Arc<dyn BiometricMatcher>,
    ledger: Arc<SalesLedger>,
    effects: EffectRunner,
    env: LifecycleEnvironment,
}

impl TicketService {
    /// Creates a new `TicketService`
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        signer: Arc<TicketSigner>,
        codec: Arc<QrCodec>,
        pricing: PricingPolicy,
        store: Arc<dyn TicketStore>,
        gateway: Arc<dyn PaymentGateway>,
        biometrics: Arc<dyn BiometricMatcher>,
        ledger: Arc<SalesLedger>,
        env: LifecycleEnvironment,
    ) -> Self {
        let effects = EffectRunner::new(store.clone(), gateway.clone(), ledger.clone());
        Self {
            signer,
            codec,
            pricing,
            store,
            gateway,
            biometrics,
            ledger,
            effects,
            env,
        }
    }

    // ========================================================================
    // Purchase
    // ========================================================================

    /// Buy a ticket.
    ///
    /// # Errors
    ///
    /// Returns [`TicketServiceError::SoldOut`] if the event is at capacity,
    /// [`TicketServiceError::PaymentDeclined`] if the charge fails, and the
    /// matching variant if any later step fails (the charge is then refunded).
    pub async fn purchase(&self, request: PurchaseRequest) -> Result<Ticket, TicketServiceError> {
        let price = self
            .pricing
            .price(request.event.base_price, request.ticket_type, request.quantity)?;

        let event_id = request.event.id;
        let quantity = request.quantity;
        self.ledger
            .try_hold(event_id, quantity, request.event.capacity)
            .await
            .map_err(|remaining| TicketServiceError::SoldOut {
                event_id,
                requested: quantity,
                remaining,
            })?;

        let result = self.charge_and_issue(request, price).await;

        match result {
            Ok(ticket) => {
                self.ledger
                    .confirm_hold(
                        event_id,
                        SaleAmounts {
                            quantity,
                            total: ticket.total_amount,
                            app_commission: ticket.app_commission,
                            venue_revenue: ticket.venue_revenue,
                        },
                    )
                    .await;
                metrics::record_ticket_issued(ticket.ticket_type, ticket.total_amount, ticket.app_commission);
                tracing::info!(
                    ticket_id = %ticket.id,
                    event_id = %ticket.event_id,
                    buyer_id = %ticket.buyer_id,
                    ticket_type = ticket.ticket_type.as_str(),
                    quantity = ticket.quantity,
                    total = ticket.total_amount.units(),
                    "Ticket issued"
                );
                Ok(ticket)
            }
            Err(e) => {
                self.ledger.release_hold(event_id, quantity).await;
                tracing::warn!(event_id = %event_id, error = %e, "Purchase failed");
                Err(e)
            }
        }
    }

    async fn charge_and_issue(
        &self,
        request: PurchaseRequest,
        price: PriceBreakdown,
    ) -> Result<Ticket, TicketServiceError> {
        let transaction = self
            .gateway
            .charge(price.total_price, request.payment_method.clone())
            .await?;

        match self.issue(request, price, &transaction).await {
            Ok(ticket) => Ok(ticket),
            Err(e) => {
                self.compensate(&transaction).await;
                Err(e)
            }
        }
    }

    async fn issue(
        &self,
        request: PurchaseRequest,
        price: PriceBreakdown,
        transaction: &PaymentTransaction,
    ) -> Result<Ticket, TicketServiceError> {
        let biometric_template = if request.ticket_type.requires_biometric() {
            Some(self.biometrics.capture().await?.template())
        } else {
            None
        };

        let now = self.env.clock.now();
        let mut ticket = Ticket {
            id: TicketId::new(),
            event_id: request.event.id,
            event_name: request.event.name,
            buyer_id: request.buyer.id,
            buyer_name: request.buyer.name,
            buyer_email: request.buyer.email,
            quantity: request.quantity,
            ticket_type: request.ticket_type,
            unit_price: price.unit_price,
            total_amount: price.total_price,
            app_commission: price.app_commission,
            venue_revenue: price.venue_revenue,
            purchase_date: now,
            qr_code: String::new(),
            status: TicketStatus::Active,
            payment_reference: Some(transaction.transaction_id.clone()),
            biometric_template,
            status_changed_at: None,
            status_reason: None,
            validation_history: Vec::new(),
        };
        ticket.qr_code = self.encode_qr(&ticket)?;

        self.store.save(&ticket).await?;
        Ok(ticket)
    }

    async fn compensate(&self, transaction: &PaymentTransaction) {
        match self
            .gateway
            .refund(&transaction.transaction_id, transaction.amount)
            .await
        {
            Ok(refund_id) => {
                metrics::record_refund(transaction.amount);
                tracing::warn!(
                    transaction_id = %transaction.transaction_id,
                    refund_id = %refund_id,
                    "Refunded charge for failed purchase"
                );
            }
            Err(e) => {
                tracing::error!(
                    transaction_id = %transaction.transaction_id,
                    amount = transaction.amount.units(),
                    error = %e,
                    "Could not refund charge for failed purchase"
                );
            }
        }
    }

    fn encode_qr(&self, ticket: &Ticket) -> Result<String, TicketServiceError> {
        let signed = self
            .signer
            .sign_payload(ticket.payload(self.env.clock.now_millis()))?;
        Ok(self.codec.encode(&signed)?)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Cancel an active ticket and refund the buyer.
    ///
    /// # Errors
    ///
    /// Returns [`TicketServiceError::Lifecycle`] if the ticket is not active
    /// and [`TicketServiceError::Effect`] if the ticket changed underneath
    /// (nothing is refunded) or the refund fails (the ticket stays active).
    pub async fn cancel(&self, ticket_id: TicketId, reason: impl Into<String>) -> Result<Ticket, TicketServiceError> {
        self.transition(ticket_id, TicketAction::Cancel { reason: reason.into() })
            .await
    }

    /// Refund an active ticket.
    ///
    /// # Errors
    ///
    /// Same as [`TicketService::cancel`].
    pub async fn refund(&self, ticket_id: TicketId, reason: impl Into<String>) -> Result<Ticket, TicketServiceError> {
        self.transition(ticket_id, TicketAction::Refund { reason: reason.into() })
            .await
    }

    /// Expire every active ticket of an event; returns how many changed.
    ///
    /// Tickets that leave `active` concurrently are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`TicketServiceError::Store`] if the tickets cannot be listed.
    pub async fn expire_event(&self, event_id: EventId) -> Result<usize, TicketServiceError> {
        let tickets = self.store.list_by_event(event_id).await?;
        let mut expired = 0;

        for ticket in tickets.into_iter().filter(Ticket::is_active) {
            match self.transition(ticket.id, TicketAction::Expire).await {
                Ok(_) => expired += 1,
                Err(TicketServiceError::Lifecycle(_)) => {}
                Err(TicketServiceError::Effect(e)) if e.is_conflict() => {
                    tracing::debug!(ticket_id = %ticket.id, "Ticket changed while expiring, skipped");
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(event_id = %event_id, expired, "Event tickets expired");
        Ok(expired)
    }

    /// Issue a fresh QR code for an active ticket.
    ///
    /// # Errors
    ///
    /// Returns [`TicketServiceError::Lifecycle`] if the ticket is not active.
    pub async fn refresh_qr(&self, ticket_id: TicketId) -> Result<Ticket, TicketServiceError> {
        let ticket = self.store.get(ticket_id).await?;
        TicketLifecycle::ensure_active(&ticket)?;
        let qr_code = self.encode_qr(&ticket)?;
        self.apply(ticket, TicketAction::ReissueQr { qr_code }).await
    }

    async fn transition(&self, ticket_id: TicketId, action: TicketAction) -> Result<Ticket, TicketServiceError> {
        let ticket = self.store.get(ticket_id).await?;
        self.apply(ticket, action).await
    }

    async fn apply(&self, previous: Ticket, action: TicketAction) -> Result<Ticket, TicketServiceError> {
        let name = action.name();
        let mut ticket = previous.clone();
        let effects = TicketLifecycle.reduce(&mut ticket, action, &self.env)?;
        let report = self.effects.run(&previous, &ticket, &effects).await?;

        tracing::info!(
            ticket_id = %ticket.id,
            action = name,
            status = %ticket.status,
            refund_id = report.refund_id.as_deref(),
            "Ticket updated"
        );
        Ok(ticket)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Load a ticket
    ///
    /// # Errors
    ///
    /// Returns [`TicketServiceError::Store`] if the ticket does not exist.
    pub async fn ticket(&self, ticket_id: TicketId) -> Result<Ticket, TicketServiceError> {
        Ok(self.store.get(ticket_id).await?)
    }

    /// Every ticket a buyer holds, newest first
    ///
    /// # Errors
    ///
    /// Returns [`TicketServiceError::Store`] on store failure.
    pub async fn tickets_for_buyer(&self, buyer_id: UserId) -> Result<Vec<Ticket>, TicketServiceError> {
        Ok(self.store.list_by_buyer(buyer_id).await?)
    }

    /// Every scan recorded on a ticket, oldest first
    ///
    /// # Errors
    ///
    /// Returns [`TicketServiceError::Store`] if the ticket does not exist.
    pub async fn validation_history(&self, ticket_id: TicketId) -> Result<Vec<TicketValidation>, TicketServiceError> {
        Ok(self.store.get(ticket_id).await?.validation_history)
    }

    /// Sales totals for an event
    pub async fn sales_summary(&self, event_id: EventId) -> SalesSummary {
        self.ledger.summary(event_id).await
    }
}
