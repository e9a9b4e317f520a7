//! Payment gateway for ticket charges and refunds.
//!
//! Abstraction over payment processors (Stripe, `PayPal`, Apple Pay, ...). The
//! mock gateway approves everything and is what development and tests run on.

use nightpass_core::{Money, PaymentMethod};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Payment gateway result
pub type GatewayResult<T> = Result<T, PaymentGatewayError>;

/// Boxed gateway future
pub type GatewayFuture<T> = Pin<Box<dyn Future<Output = GatewayResult<T>> + Send>>;

/// Payment gateway error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentGatewayError {
    /// Card declined
    CardDeclined {
        /// Decline reason
        reason: String,
    },
    /// Insufficient funds
    InsufficientFunds,
    /// Invalid payment method
    InvalidPaymentMethod {
        /// Invalid reason
        reason: String,
    },
    /// Refund references a charge the gateway does not know
    UnknownTransaction {
        /// Transaction reference
        transaction_id: String,
    },
    /// Gateway timeout
    Timeout,
    /// Other error
    Other {
        /// Error message
        message: String,
    },
}

impl std::fmt::Display for PaymentGatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CardDeclined { reason } => write!(f, "Card declined: {reason}"),
            Self::InsufficientFunds => write!(f, "Insufficient funds"),
            Self::InvalidPaymentMethod { reason } => write!(f, "Invalid payment method: {reason}"),
            Self::UnknownTransaction { transaction_id } => {
                write!(f, "Unknown transaction: {transaction_id}")
            }
            Self::Timeout => write!(f, "Gateway timeout"),
            Self::Other { message } => write!(f, "Payment error: {message}"),
        }
    }
}

impl std::error::Error for PaymentGatewayError {}

/// A completed charge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentTransaction {
    /// Gateway transaction reference
    pub transaction_id: String,
    /// Amount charged
    pub amount: Money,
    /// Payment method used
    pub payment_method: PaymentMethod,
}

/// Payment gateway trait
pub trait PaymentGateway: Send + Sync {
    /// Charge the buyer
    ///
    /// # Errors
    ///
    /// Returns error if the charge is declined or the gateway fails
    fn charge(&self, amount: Money, payment_method: PaymentMethod) -> GatewayFuture<PaymentTransaction>;

    /// Return money for an earlier charge; yields the refund reference
    ///
    /// # Errors
    ///
    /// Returns error if the refund fails
    fn refund(&self, transaction_id: &str, amount: Money) -> GatewayFuture<String>;
}

/// Mock payment gateway (always succeeds)
#[derive(Clone, Debug, Default)]
pub struct MockPaymentGateway {
    latency: Duration,
}

impl MockPaymentGateway {
    /// Creates a mock gateway that answers immediately
    #[must_use]
    pub const fn new() -> Self {
        Self {
            latency: Duration::ZERO,
        }
    }

    /// Creates a mock gateway that simulates network delay
    #[must_use]
    pub const fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared() -> Arc<dyn PaymentGateway> {
        Arc::new(Self::new())
    }
}

impl PaymentGateway for MockPaymentGateway {
    fn charge(&self, amount: Money, payment_method: PaymentMethod) -> GatewayFuture<PaymentTransaction> {
        let latency = self.latency;
        Box::pin(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }

            let transaction_id = format!("mock_txn_{}", uuid::Uuid::new_v4());

            tracing::info!(
                amount = amount.units(),
                transaction_id = %transaction_id,
                "Mock payment processed successfully"
            );

            Ok(PaymentTransaction {
                transaction_id,
                amount,
                payment_method,
            })
        })
    }

    fn refund(&self, transaction_id: &str, amount: Money) -> GatewayFuture<String> {
        let transaction_id = transaction_id.to_string();
        let latency = self.latency;
        Box::pin(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }

            let refund_id = format!("mock_refund_{}", uuid::Uuid::new_v4());

            tracing::info!(
                transaction_id = %transaction_id,
                amount = amount.units(),
                refund_id = %refund_id,
                "Mock refund processed successfully"
            );

            Ok(refund_id)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_charge_success() {
        let gateway = MockPaymentGateway::new();
        let amount = Money::from_units(60_000);
        let payment_method = PaymentMethod::CreditCard {
            last_four: "4242".to_string(),
        };

        let transaction = gateway.charge(amount, payment_method.clone()).await.unwrap();

        assert_eq!(transaction.amount, amount);
        assert_eq!(transaction.payment_method, payment_method);
        assert!(transaction.transaction_id.starts_with("mock_txn_"));
    }

    #[tokio::test]
    async fn test_mock_refund_success() {
        let gateway = MockPaymentGateway::with_latency(Duration::from_millis(1));

        let refund_id = gateway.refund("txn_123", Money::from_units(100)).await.unwrap();

        assert!(refund_id.starts_with("mock_refund_"));
    }
}
