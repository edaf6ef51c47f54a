use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::*;

use super::ValidationError;

/// Non-fatal findings surfaced to the operator alongside an admitted booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionWarning {
    /// Work is done but payment is still open; settled manually.
    CompletedAwaitingPayment,
}

/// Invariants on the resulting state. `prior` is the stored booking when
/// revising an existing one.
pub fn check_status(
    draft: &BookingDraft,
    prior: Option<&Booking>,
    today: NaiveDate,
) -> Result<Vec<AdmissionWarning>, ValidationError> {
    if draft.rating.is_some() && draft.status != BookingStatus::Completed {
        return Err(ValidationError::RatingNotAllowed { status: draft.status });
    }

    if draft.status == BookingStatus::PaymentPending && draft.payment_status != PaymentStatus::Pending {
        return Err(ValidationError::InconsistentPaymentState {
            payment_status: draft.payment_status,
        });
    }

    if draft.schedule.date < today && !draft.status.is_closed() {
        return Err(ValidationError::PastSchedulingDate { date: draft.schedule.date });
    }

    if let Some(prior) = prior
        && prior.status.is_closed()
        && (prior.provider_ref != draft.provider_ref || !prior.schedule.same_slot(&draft.schedule))
    {
        return Err(ValidationError::ImmutableSchedule { id: prior.id, status: prior.status });
    }

    let mut warnings = Vec::new();
    if draft.status == BookingStatus::Completed && draft.payment_status == PaymentStatus::Pending {
        warn!(booking = %draft.id, "booking completed with payment still pending");
        warnings.push(AdmissionWarning::CompletedAwaitingPayment);
    }
    Ok(warnings)
}
