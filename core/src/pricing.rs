//! Ticket pricing and the commission/payout split.
//!
//! ```text
//! unit_price     = round(base_price × premium(ticket_type))
//! total          = unit_price × quantity
//! app_commission = round(total × commission_rate)
//! venue_revenue  = total − app_commission
//! ```
//!
//! Rounding is half-up to whole units. Because the venue share is the
//! remainder, `app_commission + venue_revenue == total` always holds exactly.

use crate::types::{BasisPoints, Money, TicketType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default platform commission (5%)
pub const DEFAULT_COMMISSION_RATE: BasisPoints = BasisPoints::new(500);

/// Default secure-ticket premium (1.5x)
pub const DEFAULT_SECURE_PREMIUM: BasisPoints = BasisPoints::new(15_000);

/// Pricing errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// Quantity must be at least one
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// Commission rate above 100%
    #[error("commission rate {0} exceeds 100%")]
    InvalidRate(BasisPoints),

    /// Secure premium below 1x
    #[error("secure premium {0} is below 100%")]
    InvalidPremium(BasisPoints),

    /// Amount does not fit
    #[error("price calculation overflowed")]
    Overflow,
}

/// Price of a purchase and how it splits between platform and venue
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    /// Price per admission
    pub unit_price: Money,
    /// `unit_price × quantity`
    pub total_price: Money,
    /// Platform share
    pub app_commission: Money,
    /// Venue share
    pub venue_revenue: Money,
}

/// Commission rate and ticket-type premiums
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    commission_rate: BasisPoints,
    secure_premium: BasisPoints,
}

impl PricingPolicy {
    /// Creates a policy.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::InvalidRate`] if the commission exceeds 100%
    /// and [`PricingError::InvalidPremium`] if the secure premium is below 1x.
    pub const fn new(
        commission_rate: BasisPoints,
        secure_premium: BasisPoints,
    ) -> Result<Self, PricingError> {
        if commission_rate.value() > BasisPoints::ONE.value() {
            return Err(PricingError::InvalidRate(commission_rate));
        }
        if secure_premium.value() < BasisPoints::ONE.value() {
            return Err(PricingError::InvalidPremium(secure_premium));
        }
        Ok(Self {
            commission_rate,
            secure_premium,
        })
    }

    /// Platform commission rate
    #[must_use]
    pub const fn commission_rate(&self) -> BasisPoints {
        self.commission_rate
    }

    /// Multiplier applied to the base price for a ticket type
    #[must_use]
    pub const fn premium(&self, ticket_type: TicketType) -> BasisPoints {
        match ticket_type {
            TicketType::Regular => BasisPoints::ONE,
            TicketType::Secure => self.secure_premium,
        }
    }

    /// Splits an already-computed total into commission and venue revenue.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Overflow`] if the commission does not fit.
    pub fn split(&self, total: Money) -> Result<(Money, Money), PricingError> {
        let commission = total
            .checked_scale(self.commission_rate)
            .ok_or(PricingError::Overflow)?;
        // commission <= total because the rate is at most 100%
        let venue = total.checked_sub(commission).ok_or(PricingError::Overflow)?;
        Ok((commission, venue))
    }

    /// Prices a purchase.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::InvalidQuantity`] for a zero quantity and
    /// [`PricingError::Overflow`] if any amount does not fit.
    pub fn price(
        &self,
        base_price: Money,
        ticket_type: TicketType,
        quantity: u32,
    ) -> Result<PriceBreakdown, PricingError> {
        if quantity == 0 {
            return Err(PricingError::InvalidQuantity);
        }
        let unit_price = base_price
            .checked_scale(self.premium(ticket_type))
            .ok_or(PricingError::Overflow)?;
        let total_price = unit_price
            .checked_multiply(quantity)
            .ok_or(PricingError::Overflow)?;
        let (app_commission, venue_revenue) = self.split(total_price)?;

        Ok(PriceBreakdown {
            unit_price,
            total_price,
            app_commission,
            venue_revenue,
        })
    }
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            commission_rate: DEFAULT_COMMISSION_RATE,
            secure_premium: DEFAULT_SECURE_PREMIUM,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_secure_scenario() {
        let price = PricingPolicy::default()
            .price(Money::from_units(20_000), TicketType::Secure, 2)
            .unwrap();
        assert_eq!(price.unit_price, Money::from_units(30_000));
        assert_eq!(price.total_price, Money::from_units(60_000));
        assert_eq!(price.app_commission, Money::from_units(3_000));
        assert_eq!(price.venue_revenue, Money::from_units(57_000));
    }

    #[test]
    fn test_regular_has_no_premium() {
        let price = PricingPolicy::default()
            .price(Money::from_units(15_000), TicketType::Regular, 3)
            .unwrap();
        assert_eq!(price.unit_price, Money::from_units(15_000));
        assert_eq!(price.total_price, Money::from_units(45_000));
        assert_eq!(price.app_commission, Money::from_units(2_250));
        assert_eq!(price.venue_revenue, Money::from_units(42_750));
    }

    #[test]
    fn test_commission_rounds_half_up() {
        // 5% of 30 = 1.5 -> 2
        let price = PricingPolicy::default()
            .price(Money::from_units(30), TicketType::Regular, 1)
            .unwrap();
        assert_eq!(price.app_commission, Money::from_units(2));
        assert_eq!(price.venue_revenue, Money::from_units(28));
    }

    #[test]
    fn test_free_event() {
        let price = PricingPolicy::default()
            .price(Money::ZERO, TicketType::Secure, 4)
            .unwrap();
        assert!(price.total_price.is_zero());
        assert!(price.app_commission.is_zero());
        assert!(price.venue_revenue.is_zero());
    }

    #[test]
    fn test_zero_quantity_rejected() {
        assert_eq!(
            PricingPolicy::default().price(Money::from_units(100), TicketType::Regular, 0),
            Err(PricingError::InvalidQuantity)
        );
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert_eq!(
            PricingPolicy::default().price(Money::from_units(u64::MAX), TicketType::Regular, 2),
            Err(PricingError::Overflow)
        );
    }

    #[test]
    fn test_policy_bounds() {
        assert_eq!(
            PricingPolicy::new(BasisPoints::new(10_001), DEFAULT_SECURE_PREMIUM),
            Err(PricingError::InvalidRate(BasisPoints::new(10_001)))
        );
        assert_eq!(
            PricingPolicy::new(DEFAULT_COMMISSION_RATE, BasisPoints::new(9_999)),
            Err(PricingError::InvalidPremium(BasisPoints::new(9_999)))
        );
        assert!(PricingPolicy::new(BasisPoints::ONE, BasisPoints::ONE).is_ok());
    }

    proptest! {
        #[test]
        fn prop_commission_conservation(
            base in 0u64..10_000_000,
            quantity in 1u32..50,
            secure in any::<bool>(),
            rate in 0u32..=10_000,
        ) {
            let policy = PricingPolicy::new(BasisPoints::new(rate), DEFAULT_SECURE_PREMIUM).unwrap();
            let ticket_type = if secure { TicketType::Secure } else { TicketType::Regular };
            let price = policy.price(Money::from_units(base), ticket_type, quantity).unwrap();

            prop_assert_eq!(
                price.app_commission.checked_add(price.venue_revenue),
                Some(price.total_price)
            );
            prop_assert_eq!(
                price.unit_price.checked_multiply(quantity),
                Some(price.total_price)
            );
        }
    }
}
