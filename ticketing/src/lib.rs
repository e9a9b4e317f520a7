//! NightPass ticketing - ticket sales and door validation for nightlife venues
//!
//! Builds on the pure rules in `nightpass-core` and adds the parts that talk
//! to the outside world:
//!
//! - **Purchase**: price, charge, enrol a biometric for secure tickets, sign
//!   and encode the QR payload, store the ticket
//! - **Validation**: the ordered door checks, with denials recorded on the
//!   ticket and racing scanners admitted exactly once
//! - **Lifecycle**: cancel, refund and expire, with refunds through the
//!   payment gateway and reversals in the sales ledger
//!
//! # Architecture
//!
//! ```text
//!                 ┌────────────────────┐     ┌────────────────────────┐
//!  buyer ───────► │   TicketService    │     │ ValidationOrchestrator │ ◄─── scanner
//!                 └────────────────────┘     └────────────────────────┘
//!                       │        │                 │        │
//!        PaymentGateway │        └── EffectRunner ─┘        │ BiometricMatcher
//!                       ▼                 │                 ▼
//!                                 ┌───────┴───────┐
//!                                 │  TicketStore  │  SalesLedger
//!                                 └───────────────┘
//! ```
//!
//! State changes go through `TicketLifecycle`; the `EffectRunner` carries out
//! the refunds, writes and ledger updates it asks for.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod biometrics;
pub mod config;
pub mod effects;
pub mod metrics;
pub mod payment_gateway;
pub mod sales;
pub mod service;
pub mod store;
pub mod validation;

pub use app::{BuildError, NightPass, NightPassBuilder};
pub use biometrics::{BiometricError, BiometricMatcher, BiometricSample, FixedBiometrics, SimulatedBiometrics};
pub use config::Config;
pub use effects::{EffectError, EffectRunner};
pub use payment_gateway::{MockPaymentGateway, PaymentGateway, PaymentGatewayError, PaymentTransaction};
pub use sales::{SalesLedger, SalesSummary};
pub use service::{PurchaseRequest, TicketService, TicketServiceError};
pub use store::{InMemoryTicketStore, Revision, StoreError, TicketStore};
pub use validation::{ValidationError, ValidationOrchestrator, ValidationOutcome};
