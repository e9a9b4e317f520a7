//! Per-event sales ledger.
//!
//! Read model of what an event has sold, what was handed back and how many
//! admissions came through the door. Fed by the ticket service; never the
//! source of truth for a ticket.
//!
//! Capacity is enforced here. A purchase first holds its admissions, then
//! either confirms the hold as a sale or releases it, so two buyers racing
//! for the last spot cannot both be charged.

use nightpass_core::{EventId, Money};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Running totals for one event
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSummary {
    /// Admissions currently sold (reversals subtracted)
    pub tickets_sold: u64,
    /// Admissions held by purchases still in flight
    pub held: u64,
    /// Gross sales currently held
    pub gross: Money,
    /// Platform share of `gross`
    pub app_commission: Money,
    /// Venue share of `gross`
    pub venue_revenue: Money,
    /// Admissions handed back
    pub refunded_tickets: u64,
    /// Money handed back
    pub refunded_amount: Money,
    /// Admissions through the door
    pub checked_in: u64,
}

impl SalesSummary {
    /// Whether `gross == app_commission + venue_revenue`
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.app_commission.checked_add(self.venue_revenue) == Some(self.gross)
    }

    fn committed(&self) -> u64 {
        self.tickets_sold.saturating_add(self.held)
    }
}

/// The money side of one sale
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SaleAmounts {
    /// Admissions
    pub quantity: u32,
    /// Total charged
    pub total: Money,
    /// Platform share
    pub app_commission: Money,
    /// Venue share
    pub venue_revenue: Money,
}

/// Sales ledger keyed by event
#[derive(Debug, Default)]
pub struct SalesLedger {
    events: RwLock<HashMap<EventId, SalesSummary>>,
}

impl SalesLedger {
    /// Creates an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve admissions for a purchase in flight.
    ///
    /// # Errors
    ///
    /// Returns the number of admissions still available if `quantity` does
    /// not fit under `capacity`.
    pub async fn try_hold(
        &self,
        event_id: EventId,
        quantity: u32,
        capacity: Option<u32>,
    ) -> Result<(), u64> {
        let mut events = self.events.write().await;
        let summary = events.entry(event_id).or_default();

        if let Some(capacity) = capacity {
            let remaining = u64::from(capacity).saturating_sub(summary.committed());
            if u64::from(quantity) > remaining {
                return Err(remaining);
            }
        }

        summary.held = summary.held.saturating_add(u64::from(quantity));
        Ok(())
    }

    /// Drop a hold whose purchase failed
    pub async fn release_hold(&self, event_id: EventId, quantity: u32) {
        let mut events = self.events.write().await;
        let summary = events.entry(event_id).or_default();
        summary.held = summary.held.saturating_sub(u64::from(quantity));
    }

    /// Turn a hold into a completed sale
    pub async fn confirm_hold(&self, event_id: EventId, sale: SaleAmounts) {
        let mut events = self.events.write().await;
        let summary = events.entry(event_id).or_default();
        summary.held = summary.held.saturating_sub(u64::from(sale.quantity));
        summary.tickets_sold = summary.tickets_sold.saturating_add(u64::from(sale.quantity));
        summary.gross = summary.gross.saturating_add(sale.total);
        summary.app_commission = summary.app_commission.saturating_add(sale.app_commission);
        summary.venue_revenue = summary.venue_revenue.saturating_add(sale.venue_revenue);
    }

    /// Take a cancelled or refunded purchase back out
    pub async fn record_reversal(&self, event_id: EventId, sale: SaleAmounts) {
        let mut events = self.events.write().await;
        let summary = events.entry(event_id).or_default();
        summary.tickets_sold = summary.tickets_sold.saturating_sub(u64::from(sale.quantity));
        summary.gross = summary.gross.saturating_sub(sale.total);
        summary.app_commission = summary.app_commission.saturating_sub(sale.app_commission);
        summary.venue_revenue = summary.venue_revenue.saturating_sub(sale.venue_revenue);
        summary.refunded_tickets = summary.refunded_tickets.saturating_add(u64::from(sale.quantity));
        summary.refunded_amount = summary.refunded_amount.saturating_add(sale.total);
    }

    /// Count admissions at the door
    pub async fn record_check_in(&self, event_id: EventId, quantity: u32) {
        let mut events = self.events.write().await;
        let summary = events.entry(event_id).or_default();
        summary.checked_in = summary.checked_in.saturating_add(u64::from(quantity));
    }

    /// Totals for an event (zeros if nothing was sold)
    pub async fn summary(&self, event_id: EventId) -> SalesSummary {
        self.events
            .read()
            .await
            .get(&event_id)
            .copied()
            .unwrap_or_default()
    }
}
