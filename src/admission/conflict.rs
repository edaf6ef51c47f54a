use tracing::debug;
use ulid::Ulid;

use crate::directory::Directory;
use crate::model::*;

use super::{Stage, ValidationError};

/// Fine filter: first slot-holding booking, other than `exclude`, whose
/// `[start, end)` overlaps `span`. Abutting intervals do not conflict.
pub fn find_conflict<'a>(
    span: &Span,
    exclude: Ulid,
    candidates: impl IntoIterator<Item = &'a Booking>,
) -> Option<&'a Booking> {
    candidates
        .into_iter()
        .filter(|b| b.id != exclude && b.status.occupies_slot())
        .find(|b| b.span().is_some_and(|other| other.overlaps(span)))
}

pub(crate) fn slot_clash(other: &Booking, concurrent: bool) -> ValidationError {
    let booking_id = other.id;
    let start_time = other.schedule.start_time.clone();
    let duration_hours = other.schedule.duration_hours;
    if concurrent {
        ValidationError::ConcurrentConflict { booking_id, start_time, duration_hours }
    } else {
        ValidationError::SchedulingConflict { booking_id, start_time, duration_hours }
    }
}

/// Whether the draft needs an overlap check at all.
pub fn needs_check(draft: &BookingDraft, prior: Option<&Booking>) -> bool {
    if draft.status == BookingStatus::Cancelled {
        return false;
    }
    match prior {
        // Unchanged slot that was already held: nothing new to verify.
        Some(prior) => {
            !(prior.status.occupies_slot()
                && prior.provider_ref == draft.provider_ref
                && prior.schedule.same_slot(&draft.schedule))
        }
        None => true,
    }
}

/// Coarse query for the provider's slot-holding bookings on the draft's
/// date, then the fine overlap filter. Reports the first clash found as
/// `SchedulingConflict`.
pub async fn check_conflict(
    draft: &BookingDraft,
    prior: Option<&Booking>,
    directory: &dyn Directory,
) -> Result<(), ValidationError> {
    if !needs_check(draft, prior) {
        debug!(booking = %draft.id, status = %draft.status, "conflict check skipped");
        return Ok(());
    }

    let span = draft.span().ok_or_else(|| ValidationError::InvalidField {
        stage: Stage::Conflict,
        field: "schedule",
        reason: "schedule has no valid interval".into(),
    })?;

    let same_day = directory
        .active_bookings_on(draft.provider_ref, draft.schedule.date, draft.id)
        .await?;

    match find_conflict(&span, draft.id, &same_day) {
        Some(other) => {
            debug!(booking = %draft.id, conflicting = %other.id, "slot taken");
            Err(slot_clash(other, false))
        }
        None => Ok(()),
    }
}
