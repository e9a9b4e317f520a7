//! # NightPass Core
//!
//! Deterministic ticket rules for the NightPass venue ticketing platform.
//!
//! This crate has no I/O. It provides:
//!
//! - **Signature**: HMAC-SHA256 over the canonical ticket payload
//! - **QR codec**: the `base64(JSON)` transport string, version and replay checks
//! - **Pricing**: unit price, total, commission and venue payout
//! - **Lifecycle**: the ticket status reducer and the side effects each
//!   transition requires
//!
//! ## Data flow
//!
//! ```text
//! purchase ─► TicketPayload ─► TicketSigner::sign ─► QrCodec::encode ─► ticket.qr_code
//!
//! scan ─► QrCodec::decode ─► check_version ─► TicketSigner::verify ─► check_expiry
//!      ─► (store lookup, biometric) ─► TicketLifecycle::reduce ─► effects
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod lifecycle;
pub mod pricing;
pub mod qr;
pub mod signature;
pub mod types;

pub use lifecycle::{LifecycleEnvironment, LifecycleError, TicketAction, TicketEffect, TicketLifecycle};
pub use pricing::{PriceBreakdown, PricingError, PricingPolicy};
pub use qr::{QrCodec, QrError, SUPPORTED_QR_VERSION};
pub use signature::{SignatureError, SigningKey, TicketSigner};
pub use types::*;

/// Reducer module - the shape of state transitions
///
/// Reducers are pure functions: `(State, Action, Environment) → Result<Effects, Error>`.
/// They validate the action, update state in place and return descriptions of
/// the side effects to run. A rejected action leaves state untouched.
pub mod reducer {
    use smallvec::SmallVec;

    /// The Reducer trait
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for TicketLifecycle {
    ///     type State = Ticket;
    ///     type Action = TicketAction;
    ///     type Effect = TicketEffect;
    ///     type Error = LifecycleError;
    ///     type Environment = LifecycleEnvironment;
    ///
    ///     fn reduce(&self, ticket: &mut Ticket, action: TicketAction, env: &LifecycleEnvironment)
    ///         -> Result<SmallVec<[TicketEffect; 4]>, LifecycleError> {
    ///         // Business logic here
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// Side effect descriptions this reducer emits
        type Effect;

        /// Rejection reason for an action
        type Error;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// # Errors
        ///
        /// Returns `Self::Error` if the action is not allowed in the current
        /// state; state must then be left unchanged.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<SmallVec<[Self::Effect; 4]>, Self::Error>;
    }
}

/// Environment module - dependency injection traits
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;

        /// Current time in milliseconds since the Unix epoch
        fn now_millis(&self) -> i64 {
            self.now().timestamp_millis()
        }
    }

    /// Wall clock
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
