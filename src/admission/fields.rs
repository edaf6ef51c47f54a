use chrono::{Duration, NaiveTime, Timelike};

use crate::limits::*;
use crate::model::*;

use super::{Stage, ValidationError};

fn invalid(field: &'static str, reason: String) -> ValidationError {
    ValidationError::InvalidField { stage: Stage::Fields, field, reason }
}

const SECONDS_PER_DAY: u32 = 24 * 3600;

/// `start + hours` in the `HH:MM` form. An end at exactly 24:00 renders as
/// `00:00`.
pub fn derive_end_time(start: NaiveTime, hours: u32) -> String {
    let (end, _) = start.overflowing_add_signed(Duration::hours(i64::from(hours)));
    end.format(TIME_FORMAT).to_string()
}

/// Field-level constraints, then recompute `schedule.end_time`.
pub fn check_fields(draft: &mut BookingDraft) -> Result<(), ValidationError> {
    let schedule = &draft.schedule;
    let start = schedule.start().ok_or_else(|| {
        invalid("schedule.start_time", format!("expected HH:MM, got {:?}", schedule.start_time))
    })?;
    if !(MIN_DURATION_HOURS..=MAX_DURATION_HOURS).contains(&schedule.duration_hours) {
        return Err(invalid(
            "schedule.duration_hours",
            format!(
                "must be between {MIN_DURATION_HOURS} and {MAX_DURATION_HOURS}, got {}",
                schedule.duration_hours
            ),
        ));
    }

    // Conflicts are detected and committed per calendar day, so a booking
    // must not spill into the next one.
    if start.num_seconds_from_midnight() + schedule.duration_hours * 3600 > SECONDS_PER_DAY {
        return Err(invalid(
            "schedule.duration_hours",
            format!(
                "{}h from {} runs past midnight",
                schedule.duration_hours, schedule.start_time
            ),
        ));
    }

    if let Some(rating) = &draft.rating {
        if !(MIN_RATING_SCORE..=MAX_RATING_SCORE).contains(&rating.score) {
            return Err(invalid(
                "rating.score",
                format!("must be between {MIN_RATING_SCORE} and {MAX_RATING_SCORE}, got {}", rating.score),
            ));
        }
        if rating.review.as_ref().is_some_and(|r| r.len() > MAX_REVIEW_LEN) {
            return Err(invalid("rating.review", "review too long".into()));
        }
    }

    let end = derive_end_time(start, draft.schedule.duration_hours);
    draft.schedule.end_time = Some(end);
    Ok(())
}
