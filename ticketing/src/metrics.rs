//! Business metrics for NightPass.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `nightpass_tickets_issued_total{ticket_type}` - Tickets sold by type
//! - `nightpass_validations_total{outcome}` - Door scans, granted or denied
//! - `nightpass_validation_denials_total{reason}` - Denied scans by reason
//! - `nightpass_ticket_transitions_total{status}` - Lifecycle transitions by target status
//! - `nightpass_revenue_total` - Gross sales in currency units
//! - `nightpass_commission_total` - Platform commission in currency units
//! - `nightpass_refunds_total` - Money handed back in currency units
//!
//! ## Histograms
//! - `nightpass_validation_duration_seconds` - Time to validate one scan

use metrics::{describe_counter, describe_histogram};
use nightpass_core::{Money, TicketStatus, TicketType};

/// Initialize and register all business metrics descriptions.
///
/// This should be called once at application startup, before any metrics are recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "nightpass_tickets_issued_total",
        "Total number of tickets issued by ticket type (regular, secure)"
    );
    describe_counter!(
        "nightpass_validations_total",
        "Total number of door validations by outcome (granted, denied)"
    );
    describe_counter!(
        "nightpass_validation_denials_total",
        "Total number of denied validations by reason"
    );
    describe_histogram!(
        "nightpass_validation_duration_seconds",
        "Time taken to validate a scanned ticket"
    );

    describe_counter!(
        "nightpass_ticket_transitions_total",
        "Total number of ticket status transitions by target status"
    );

    describe_counter!("nightpass_revenue_total", "Gross ticket sales in currency units");
    describe_counter!(
        "nightpass_commission_total",
        "Platform commission retained in currency units"
    );
    describe_counter!("nightpass_refunds_total", "Refunds issued in currency units");

    tracing::info!("Business metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record a completed purchase.
pub fn record_ticket_issued(ticket_type: TicketType, total: Money, commission: Money) {
    metrics::counter!("nightpass_tickets_issued_total", "ticket_type" => ticket_type.as_str()).increment(1);
    metrics::counter!("nightpass_revenue_total").increment(total.units());
    metrics::counter!("nightpass_commission_total").increment(commission.units());
    tracing::debug!(
        ticket_type = ticket_type.as_str(),
        total = total.units(),
        "Recorded ticket_issued metric"
    );
}

/// Record a granted entry.
///
/// # Arguments
///
/// * `duration_secs` - Time spent validating the scan
pub fn record_validation_granted(duration_secs: f64) {
    metrics::counter!("nightpass_validations_total", "outcome" => "granted").increment(1);
    metrics::histogram!("nightpass_validation_duration_seconds").record(duration_secs);
    tracing::debug!(duration_secs, "Recorded validation_granted metric");
}

/// Record a denied entry.
///
/// # Arguments
///
/// * `reason` - Low-cardinality denial kind
/// * `duration_secs` - Time spent validating the scan
pub fn record_validation_denied(reason: &'static str, duration_secs: f64) {
    metrics::counter!("nightpass_validations_total", "outcome" => "denied").increment(1);
    metrics::counter!("nightpass_validation_denials_total", "reason" => reason).increment(1);
    metrics::histogram!("nightpass_validation_duration_seconds").record(duration_secs);
    tracing::debug!(reason, duration_secs, "Recorded validation_denied metric");
}

/// Record a ticket leaving `active`.
pub fn record_transition(status: TicketStatus) {
    metrics::counter!("nightpass_ticket_transitions_total", "status" => status.as_str()).increment(1);
    tracing::debug!(status = status.as_str(), "Recorded ticket_transition metric");
}

/// Record money handed back to a buyer.
pub fn record_refund(amount: Money) {
    metrics::counter!("nightpass_refunds_total").increment(amount.units());
    tracing::debug!(amount = amount.units(), "Recorded refund metric");
}
