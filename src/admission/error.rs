use chrono::NaiveDate;
use serde::Serialize;
use ulid::Ulid;

use crate::model::{BookingStatus, PaymentStatus};

/// Pipeline stage that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fields,
    Geo,
    References,
    Pricing,
    Status,
    Conflict,
    Storage,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fields => "fields",
            Stage::Geo => "geo",
            Stage::References => "references",
            Stage::Pricing => "pricing",
            Stage::Status => "status",
            Stage::Conflict => "conflict",
            Stage::Storage => "storage",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid {field}: {reason}")]
    InvalidField {
        stage: Stage,
        field: &'static str,
        reason: String,
    },
    #[error("{field} references unknown entity {id}")]
    ReferenceNotFound { field: &'static str, id: Ulid },
    #[error("provider {0} is not verified")]
    ProviderUnverified(Ulid),
    #[error("provider {0} is not accepting bookings")]
    ProviderUnavailable(Ulid),
    #[error("{field} must be non-negative, got {value}")]
    InvalidAmount { field: &'static str, value: f64 },
    #[error("total amount {actual} does not match base + extras - discount = {expected}")]
    PricingMismatch { expected: f64, actual: f64 },
    #[error("rating can only be set on a completed booking (status is {status})")]
    RatingNotAllowed { status: BookingStatus },
    #[error("status payment_pending requires payment status pending, got {payment_status}")]
    InconsistentPaymentState { payment_status: PaymentStatus },
    #[error("cannot schedule on {date}: date is in the past")]
    PastSchedulingDate { date: NaiveDate },
    #[error("booking {id} is {status}; its schedule and provider are frozen")]
    ImmutableSchedule { id: Ulid, status: BookingStatus },
    #[error("provider is already booked from {start_time} for {duration_hours}h")]
    SchedulingConflict {
        booking_id: Ulid,
        start_time: String,
        duration_hours: u32,
    },
    #[error("slot was taken concurrently: provider is booked from {start_time} for {duration_hours}h")]
    ConcurrentConflict {
        booking_id: Ulid,
        start_time: String,
        duration_hours: u32,
    },
    #[error("booking {0} already exists")]
    DuplicateBooking(Ulid),
    #[error("storage error: {0}")]
    Storage(String),
}

impl ValidationError {
    pub fn stage(&self) -> Stage {
        match self {
            ValidationError::InvalidField { stage, .. } => *stage,
            ValidationError::ReferenceNotFound { .. }
            | ValidationError::ProviderUnverified(_)
            | ValidationError::ProviderUnavailable(_) => Stage::References,
            ValidationError::InvalidAmount { .. } | ValidationError::PricingMismatch { .. } => {
                Stage::Pricing
            }
            ValidationError::RatingNotAllowed { .. }
            | ValidationError::InconsistentPaymentState { .. }
            | ValidationError::PastSchedulingDate { .. }
            | ValidationError::ImmutableSchedule { .. } => Stage::Status,
            ValidationError::SchedulingConflict { .. } => Stage::Conflict,
            ValidationError::ConcurrentConflict { .. }
            | ValidationError::DuplicateBooking(_)
            | ValidationError::Storage(_) => Stage::Storage,
        }
    }

    /// Draft field the failure is attributed to, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ValidationError::InvalidField { field, .. }
            | ValidationError::ReferenceNotFound { field, .. }
            | ValidationError::InvalidAmount { field, .. } => Some(*field),
            ValidationError::ProviderUnverified(_) | ValidationError::ProviderUnavailable(_) => {
                Some("provider_ref")
            }
            ValidationError::PricingMismatch { .. } => Some("pricing.total_amount"),
            ValidationError::RatingNotAllowed { .. } => Some("rating"),
            ValidationError::InconsistentPaymentState { .. } => Some("payment_status"),
            ValidationError::PastSchedulingDate { .. } => Some("schedule.date"),
            ValidationError::ImmutableSchedule { .. }
            | ValidationError::SchedulingConflict { .. }
            | ValidationError::ConcurrentConflict { .. } => Some("schedule"),
            ValidationError::DuplicateBooking(_) => Some("id"),
            ValidationError::Storage(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::InvalidField { .. } => "invalid_field",
            ValidationError::ReferenceNotFound { .. } => "reference_not_found",
            ValidationError::ProviderUnverified(_) => "provider_unverified",
            ValidationError::ProviderUnavailable(_) => "provider_unavailable",
            ValidationError::InvalidAmount { .. } => "invalid_amount",
            ValidationError::PricingMismatch { .. } => "pricing_mismatch",
            ValidationError::RatingNotAllowed { .. } => "rating_not_allowed",
            ValidationError::InconsistentPaymentState { .. } => "inconsistent_payment_state",
            ValidationError::PastSchedulingDate { .. } => "past_scheduling_date",
            ValidationError::ImmutableSchedule { .. } => "immutable_schedule",
            ValidationError::SchedulingConflict { .. } => "scheduling_conflict",
            ValidationError::ConcurrentConflict { .. } => "concurrent_conflict",
            ValidationError::DuplicateBooking(_) => "duplicate_booking",
            ValidationError::Storage(_) => "storage",
        }
    }

    /// The slot is taken. Callers should offer the customer another interval;
    /// a lost commit race is handled the same as a pre-check conflict.
    pub fn is_slot_conflict(&self) -> bool {
        matches!(
            self,
            ValidationError::SchedulingConflict { .. } | ValidationError::ConcurrentConflict { .. }
        )
    }
}

impl From<std::io::Error> for ValidationError {
    fn from(e: std::io::Error) -> Self {
        ValidationError::Storage(e.to_string())
    }
}

/// Flat, serializable view of a failure for collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub stage: Stage,
    pub field: Option<&'static str>,
    pub kind: &'static str,
    pub message: String,
    pub retry_with_new_slot: bool,
}

impl From<&ValidationError> for ErrorReport {
    fn from(e: &ValidationError) -> Self {
        Self {
            stage: e.stage(),
            field: e.field(),
            kind: e.kind(),
            message: e.to_string(),
            retry_with_new_slot: e.is_slot_conflict(),
        }
    }
}
