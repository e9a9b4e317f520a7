//! Domain types for NightPass tickets.
//!
//! Identifiers, money, the signed QR payload and the ticket entity with its
//! append-only validation history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a ticket
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(Uuid);

impl TicketId {
    /// Creates a new random `TicketId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `TicketId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a venue event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a user (buyer, venue owner or door operator)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random `UserId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `UserId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a validation attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationId(Uuid);

impl ValidationId {
    /// Creates a new random `ValidationId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ValidationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ValidationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money and rates
// ============================================================================

/// Amount in whole currency units (the smallest unit the platform displays).
///
/// All arithmetic is checked; there is no fractional part to drift.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from whole units
    #[must_use]
    pub const fn from_units(units: u64) -> Self {
        Self(units)
    }

    /// Returns the amount in whole units
    #[must_use]
    pub const fn units(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Subtracts two amounts (returns None if result would be negative)
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        if self.0 >= other.0 {
            Some(Self(self.0 - other.0))
        } else {
            None
        }
    }

    /// Adds, clamping at the maximum
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Subtracts, clamping at zero
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Multiplies by a quantity with overflow checking
    #[must_use]
    pub const fn checked_multiply(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Scales by a rate, rounding half up to the nearest unit.
    ///
    /// Returns `None` if the result does not fit in a `u64`.
    #[must_use]
    pub fn checked_scale(self, rate: BasisPoints) -> Option<Self> {
        let scaled = u128::from(self.0) * u128::from(rate.value());
        let rounded = (scaled + u128::from(BasisPoints::HALF_UNIT)) / u128::from(BasisPoints::ONE.value());
        u64::try_from(rounded).ok().map(Self)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A rate expressed in hundredths of a percent (500 = 5%, 15 000 = 1.5x).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BasisPoints(u32);

impl BasisPoints {
    /// 100% (a multiplier of 1)
    pub const ONE: Self = Self(10_000);

    const HALF_UNIT: u32 = 5_000;

    /// Creates a rate from basis points
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw basis points
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for BasisPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Ticket classification
// ============================================================================

/// Ticket type; secure tickets carry a price premium and a biometric check at the door
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketType {
    /// Plain QR entry
    Regular,
    /// QR entry plus biometric match
    Secure,
}

impl TicketType {
    /// Wire name of the ticket type
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Secure => "secure",
        }
    }

    /// Whether entry requires a biometric match
    #[must_use]
    pub const fn requires_biometric(&self) -> bool {
        matches!(self, Self::Secure)
    }
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticket status
///
/// `Active` is the only non-terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    /// Purchased and not yet used
    Active,
    /// Entry granted
    Used,
    /// Cancelled by an operator or owner (payment refunded)
    Cancelled,
    /// Reversed after the fact
    Refunded,
    /// Event is over
    Expired,
}

impl TicketStatus {
    /// Wire name of the status
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Used => "used",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
            Self::Expired => "expired",
        }
    }

    /// No transition leaves a terminal state
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment method used at purchase
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Credit card
    CreditCard {
        /// Last four digits
        last_four: String,
    },
    /// Debit card
    DebitCard {
        /// Last four digits
        last_four: String,
    },
    /// Digital wallet (Apple Pay, Google Pay, ...)
    Wallet {
        /// Wallet provider name
        provider: String,
    },
}

// ============================================================================
// QR payload
// ============================================================================

/// The signed content of a ticket QR code.
///
/// Field names are the camelCase wire names scanners exchange. Changing any
/// field after signing invalidates the signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketPayload {
    /// Ticket this payload admits
    pub ticket_id: TicketId,
    /// Event the ticket is for
    pub event_id: EventId,
    /// Event display name
    pub event_name: String,
    /// Ticket holder
    pub buyer_id: UserId,
    /// Ticket holder display name
    pub buyer_name: String,
    /// Ticket type
    pub ticket_type: TicketType,
    /// Number of admissions
    pub quantity: u32,
    /// Purchase instant as an RFC 3339 string
    pub purchase_date: String,
    /// Payload creation instant, milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Payload format version
    pub version: String,
}

/// A payload together with its hex HMAC signature
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedQrData {
    /// Signed fields
    #[serde(flatten)]
    pub payload: TicketPayload,
    /// Lowercase hex HMAC-SHA256 of the canonical payload
    pub signature: String,
}

// ============================================================================
// Entities
// ============================================================================

/// One scan of a ticket at the door, granted or denied
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketValidation {
    /// Validation ID
    pub id: ValidationId,
    /// Ticket scanned
    pub ticket_id: TicketId,
    /// When the scan was evaluated
    pub validated_at: DateTime<Utc>,
    /// Door operator
    pub validated_by: UserId,
    /// Whether a biometric comparison ran and matched
    pub biometric_match: bool,
    /// Whether entry was granted
    pub entry_granted: bool,
    /// Door or venue location, when the scanner reports one
    pub location: Option<String>,
    /// Denial reason
    pub reason: Option<String>,
}

/// A purchased ticket
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket ID
    pub id: TicketId,
    /// Event ID
    pub event_id: EventId,
    /// Event display name
    pub event_name: String,
    /// Buyer ID
    pub buyer_id: UserId,
    /// Buyer display name
    pub buyer_name: String,
    /// Buyer email
    pub buyer_email: String,
    /// Number of admissions
    pub quantity: u32,
    /// Ticket type
    pub ticket_type: TicketType,
    /// Price per admission
    pub unit_price: Money,
    /// Total charged
    pub total_amount: Money,
    /// Platform share of the total
    pub app_commission: Money,
    /// Venue share of the total
    pub venue_revenue: Money,
    /// When the ticket was bought
    pub purchase_date: DateTime<Utc>,
    /// Encoded `SignedQrData`
    pub qr_code: String,
    /// Current status
    pub status: TicketStatus,
    /// Gateway transaction reference of the purchase charge
    pub payment_reference: Option<String>,
    /// Enrolled biometric template (secure tickets)
    pub biometric_template: Option<String>,
    /// When the ticket left `Active`
    pub status_changed_at: Option<DateTime<Utc>>,
    /// Why the ticket left `Active`
    pub status_reason: Option<String>,
    /// Every scan that reached this ticket while it was active, oldest first
    pub validation_history: Vec<TicketValidation>,
}

impl Ticket {
    /// Whether the ticket still admits entry
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, TicketStatus::Active)
    }

    /// Number of denied scans recorded
    #[must_use]
    pub fn denied_attempts(&self) -> usize {
        self.validation_history
            .iter()
            .filter(|v| !v.entry_granted)
            .count()
    }

    /// The payload this ticket's QR code carries, stamped at `timestamp_ms`
    #[must_use]
    pub fn payload(&self, timestamp_ms: i64) -> TicketPayload {
        TicketPayload {
            ticket_id: self.id,
            event_id: self.event_id,
            event_name: self.event_name.clone(),
            buyer_id: self.buyer_id,
            buyer_name: self.buyer_name.clone(),
            ticket_type: self.ticket_type,
            quantity: self.quantity,
            purchase_date: self.purchase_date.to_rfc3339(),
            timestamp: timestamp_ms,
            version: crate::qr::SUPPORTED_QR_VERSION.to_string(),
        }
    }
}

/// The slice of a venue event the purchase flow needs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventListing {
    /// Event ID
    pub id: EventId,
    /// Display name
    pub name: String,
    /// Venue display name
    pub venue_name: String,
    /// Entry fee for a regular admission
    pub base_price: Money,
    /// Doors open
    pub starts_at: DateTime<Utc>,
    /// Maximum admissions, if limited
    pub capacity: Option<u32>,
}

/// Ticket buyer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    /// User ID
    pub id: UserId,
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
}
