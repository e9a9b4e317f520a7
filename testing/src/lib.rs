//! # NightPass Testing
//!
//! Testing utilities and helpers for NightPass.
//!
//! This crate provides:
//! - Deterministic clocks (`FixedClock`, `MockClock`)
//! - `ReducerTest`, a Given-When-Then harness for reducers
//! - Ticket and payload fixtures with valid signatures
//! - proptest strategies for payloads
//!
//! ## Example
//!
//! ```ignore
//! use nightpass_testing::{fixtures, test_clock};
//!
//! let signer = fixtures::test_signer();
//! let mut ticket = fixtures::TicketBuilder::new().secure().build();
//! let qr = fixtures::issue_qr(&signer, &QrCodec::default(), &mut ticket, test_clock().now_millis());
//! ```

pub mod reducer_test;

pub use reducer_test::{ReducerTest, assertions};

use chrono::{DateTime, Utc};
use nightpass_core::environment::Clock;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use chrono::Duration;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use nightpass_testing::mocks::FixedClock;
    /// use nightpass_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when a test advances it
    ///
    /// Clones share the same time, so a test can keep a handle while the
    /// system under test holds another.
    #[derive(Debug, Clone)]
    pub struct MockClock {
        millis: Arc<AtomicI64>,
    }

    impl MockClock {
        /// Create a clock starting at the given time
        #[must_use]
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                millis: Arc::new(AtomicI64::new(start.timestamp_millis())),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: Duration) {
            self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
        }

        /// Jump to an absolute time
        pub fn set(&self, to: DateTime<Utc>) {
            self.millis.store(to.timestamp_millis(), Ordering::SeqCst);
        }
    }

    impl Clock for MockClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Ticket fixtures
pub mod fixtures {
    use chrono::{DateTime, Utc};
    use nightpass_core::environment::Clock;
    use nightpass_core::{
        EventId, Money, PricingPolicy, QrCodec, SigningKey, Ticket, TicketPayload, TicketSigner,
        TicketStatus, TicketType, UserId,
    };

    /// Signing secret used throughout the test suites
    pub const TEST_SECRET: &str = "nightpass-test-secret";

    /// Signer over [`TEST_SECRET`]
    #[must_use]
    pub fn test_signer() -> TicketSigner {
        signer_with(TEST_SECRET)
    }

    /// Signer over an arbitrary secret
    ///
    /// # Panics
    ///
    /// Panics if `secret` is empty.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn signer_with(secret: &str) -> TicketSigner {
        TicketSigner::new(SigningKey::from_secret(secret).expect("test secret must not be empty"))
    }

    /// The payload a ticket's QR code should carry
    #[must_use]
    pub fn payload_for(ticket: &Ticket, timestamp_ms: i64) -> TicketPayload {
        ticket.payload(timestamp_ms)
    }

    /// Signs and encodes a QR for `ticket`, stores it on the ticket and returns it
    ///
    /// # Panics
    ///
    /// Panics if signing or encoding fails, which a well-formed ticket never causes.
    #[allow(clippy::expect_used)]
    pub fn issue_qr(
        signer: &TicketSigner,
        codec: &QrCodec,
        ticket: &mut Ticket,
        timestamp_ms: i64,
    ) -> String {
        let signed = signer
            .sign_payload(payload_for(ticket, timestamp_ms))
            .expect("fixture payload should sign");
        let qr = codec.encode(&signed).expect("fixture payload should encode");
        ticket.qr_code.clone_from(&qr);
        qr
    }

    /// Builder for tickets in any state
    #[derive(Clone, Debug)]
    pub struct TicketBuilder {
        ticket_type: TicketType,
        quantity: u32,
        base_price: Money,
        status: TicketStatus,
        event_id: EventId,
        buyer_id: UserId,
        purchase_date: DateTime<Utc>,
        biometric_template: Option<String>,
    }

    impl TicketBuilder {
        /// Regular ticket, one admission, base price 10 000, active
        #[must_use]
        pub fn new() -> Self {
            Self {
                ticket_type: TicketType::Regular,
                quantity: 1,
                base_price: Money::from_units(10_000),
                status: TicketStatus::Active,
                event_id: EventId::new(),
                buyer_id: UserId::new(),
                purchase_date: super::mocks::test_clock().now(),
                biometric_template: None,
            }
        }

        /// Secure ticket with an enrolled template
        #[must_use]
        pub fn secure(mut self) -> Self {
            self.ticket_type = TicketType::Secure;
            self.biometric_template = Some("template-fixture".to_string());
            self
        }

        /// Number of admissions
        #[must_use]
        pub fn quantity(mut self, quantity: u32) -> Self {
            self.quantity = quantity;
            self
        }

        /// Base price before the ticket-type premium
        #[must_use]
        pub fn base_price(mut self, base_price: Money) -> Self {
            self.base_price = base_price;
            self
        }

        /// Starting status
        #[must_use]
        pub fn status(mut self, status: TicketStatus) -> Self {
            self.status = status;
            self
        }

        /// Event the ticket belongs to
        #[must_use]
        pub fn event(mut self, event_id: EventId) -> Self {
            self.event_id = event_id;
            self
        }

        /// Ticket holder
        #[must_use]
        pub fn buyer(mut self, buyer_id: UserId) -> Self {
            self.buyer_id = buyer_id;
            self
        }

        /// Enrolled biometric template
        #[must_use]
        pub fn biometric_template(mut self, template: impl Into<String>) -> Self {
            self.biometric_template = Some(template.into());
            self
        }

        /// Build the ticket, priced with the default policy
        ///
        /// # Panics
        ///
        /// Panics if the configured price overflows.
        #[must_use]
        #[allow(clippy::expect_used)]
        pub fn build(self) -> Ticket {
            let price = PricingPolicy::default()
                .price(self.base_price, self.ticket_type, self.quantity)
                .expect("fixture price should not overflow");

            Ticket {
                id: nightpass_core::TicketId::new(),
                event_id: self.event_id,
                event_name: "Friday Late Session".to_string(),
                buyer_id: self.buyer_id,
                buyer_name: "Jordan Ellis".to_string(),
                buyer_email: "jordan@example.com".to_string(),
                quantity: self.quantity,
                ticket_type: self.ticket_type,
                unit_price: price.unit_price,
                total_amount: price.total_price,
                app_commission: price.app_commission,
                venue_revenue: price.venue_revenue,
                purchase_date: self.purchase_date,
                qr_code: String::new(),
                status: self.status,
                payment_reference: Some("mock_txn_fixture".to_string()),
                biometric_template: self.biometric_template,
                status_changed_at: None,
                status_reason: None,
                validation_history: Vec::new(),
            }
        }
    }

    impl Default for TicketBuilder {
        fn default() -> Self {
            Self::new()
        }
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use nightpass_core::{
        EventId, SUPPORTED_QR_VERSION, TicketId, TicketPayload, TicketType, UserId,
    };
    use proptest::prelude::*;
    use uuid::Uuid;

    fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<u128>().prop_map(Uuid::from_u128)
    }

    /// Strategy for ticket types
    pub fn arb_ticket_type() -> impl Strategy<Value = TicketType> {
        prop_oneof![Just(TicketType::Regular), Just(TicketType::Secure)]
    }

    /// Strategy for well-formed payloads of the supported version
    pub fn arb_payload() -> impl Strategy<Value = TicketPayload> {
        (
            (arb_uuid(), arb_uuid(), arb_uuid()),
            "[A-Za-z0-9 '&-]{1,40}",
            "[A-Za-z ]{1,30}",
            arb_ticket_type(),
            1u32..20,
            0i64..4_102_444_800_000,
        )
            .prop_map(
                |((ticket, event, buyer), event_name, buyer_name, ticket_type, quantity, timestamp)| {
                    TicketPayload {
                        ticket_id: TicketId::from_uuid(ticket),
                        event_id: EventId::from_uuid(event),
                        event_name,
                        buyer_id: UserId::from_uuid(buyer),
                        buyer_name,
                        ticket_type,
                        quantity,
                        purchase_date: "2025-01-01T00:00:00+00:00".to_string(),
                        timestamp,
                        version: SUPPORTED_QR_VERSION.to_string(),
                    }
                },
            )
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, MockClock, test_clock};
