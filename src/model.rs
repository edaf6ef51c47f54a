use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, UTC. The only instant type used for overlap math.
pub type Ms = i64;

pub const HOUR_MS: Ms = 3_600_000;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Regular,
    Deep,
    MoveInOut,
    Office,
    PostConstruction,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 5] = [
        ServiceKind::Regular,
        ServiceKind::Deep,
        ServiceKind::MoveInOut,
        ServiceKind::Office,
        ServiceKind::PostConstruction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Regular => "regular",
            ServiceKind::Deep => "deep",
            ServiceKind::MoveInOut => "move_in_out",
            ServiceKind::Office => "office",
            ServiceKind::PostConstruction => "post_construction",
        }
    }
}

impl FromStr for ServiceKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownVariant { kind: "service kind", value: s.to_string() })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    PaymentPending,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::InProgress,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::PaymentPending,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::PaymentPending => "payment_pending",
        }
    }

    /// Completed and cancelled bookings are closed: their slot is released
    /// and their scheduling fields are frozen.
    pub fn is_closed(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Whether a booking in this status holds its provider's time slot.
    pub fn occupies_slot(&self) -> bool {
        !self.is_closed()
    }
}

impl FromStr for BookingStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownVariant { kind: "booking status", value: s.to_string() })
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownVariant { kind: "payment status", value: s.to_string() })
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub date: NaiveDate,
    /// Local wall-clock start, `HH:MM`.
    pub start_time: String,
    pub duration_hours: u32,
    /// Always recomputed from `start_time + duration_hours`; input values are ignored.
    #[serde(default)]
    pub end_time: Option<String>,
}

impl Schedule {
    pub fn start(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(&self.start_time, TIME_FORMAT).ok()
    }

    /// Absolute `[start, end)` on `date`. `None` if `start_time` does not parse
    /// or the duration is zero.
    pub fn span(&self) -> Option<Span> {
        if self.duration_hours == 0 {
            return None;
        }
        let start = self.date.and_time(self.start()?).and_utc().timestamp_millis();
        Some(Span::new(start, start + Ms::from(self.duration_hours) * HOUR_MS))
    }

    /// Same date, start and duration. `end_time` is derived, so it is not compared.
    pub fn same_slot(&self, other: &Schedule) -> bool {
        self.date == other.date
            && self.start_time == other.start_time
            && self.duration_hours == other.duration_hours
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointKind {
    Point,
}

/// GeoJSON-style point; `coordinates` is `[lng, lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: PointKind,
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { kind: PointKind::Point, coordinates: [lng, lat] }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    /// Derived from `lat`/`lng`; never trusted from input.
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub base_amount: f64,
    #[serde(default)]
    pub extra_charges: f64,
    #[serde(default)]
    pub discount: f64,
    pub total_amount: f64,
}

impl Pricing {
    pub fn expected_total(&self) -> f64 {
        self.base_amount + self.extra_charges - self.discount
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub score: u8,
    #[serde(default)]
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A booking, persisted or not. Drafts and stored bookings share one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub customer_ref: Ulid,
    pub provider_ref: Ulid,
    pub service_kind: ServiceKind,
    pub schedule: Schedule,
    pub address: Address,
    pub pricing: Pricing,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub rating: Option<Rating>,
    #[serde(default)]
    pub rescheduled_from: Option<Ulid>,
}

/// An unpersisted candidate booking submitted for admission.
pub type BookingDraft = Booking;

impl Booking {
    pub fn span(&self) -> Option<Span> {
        self.schedule.span()
    }

    pub fn partition(&self) -> PartitionKey {
        PartitionKey { provider: self.provider_ref, date: self.schedule.date }
    }
}

/// Storage partition for the atomic admission unit: one provider, one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub provider: Ulid,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Ulid,
    pub name: String,
}

/// A cleaner. Both flags are read-only inputs to admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: Ulid,
    pub name: String,
    pub is_verified: bool,
    pub is_available: bool,
}

impl Provider {
    /// Verified and currently taking work.
    pub fn is_eligible(&self) -> bool {
        self.is_verified && self.is_available
    }
}

/// Ledger events, one per WAL record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    CustomerRegistered {
        id: Ulid,
        name: String,
    },
    ProviderRegistered {
        id: Ulid,
        name: String,
        is_verified: bool,
        is_available: bool,
    },
    ProviderFlagsChanged {
        id: Ulid,
        is_verified: bool,
        is_available: bool,
    },
    BookingAdmitted {
        booking: Booking,
    },
    BookingRevised {
        booking: Booking,
    },
}

impl Event {
    /// Provider whose notification channel receives this event.
    pub fn provider_id(&self) -> Option<Ulid> {
        match self {
            Event::CustomerRegistered { .. } => None,
            Event::ProviderRegistered { id, .. } | Event::ProviderFlagsChanged { id, .. } => Some(*id),
            Event::BookingAdmitted { booking } | Event::BookingRevised { booking } => {
                Some(booking.provider_ref)
            }
        }
    }
}
