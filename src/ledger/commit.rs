use dashmap::mapref::entry::Entry;
use tokio::sync::OwnedRwLockWriteGuard;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::admission::{
    find_conflict, needs_check, slot_clash, AdmitMode, Stage, ValidatedBooking, ValidationError,
};
use crate::model::*;
use crate::observability;

use super::{DaySchedule, Ledger};

type DayGuard = OwnedRwLockWriteGuard<DaySchedule>;

/// Write locks held for one revision.
enum Locked {
    Same(DayGuard),
    Split { old: DayGuard, new: DayGuard },
}

fn no_interval() -> ValidationError {
    ValidationError::InvalidField {
        stage: Stage::Storage,
        field: "schedule",
        reason: "schedule has no valid interval".into(),
    }
}

/// Fine overlap filter re-run under the partition write lock. A hit here
/// means another commit won the slot after this draft's pre-check.
fn recheck(day: &DaySchedule, booking: &Booking) -> Result<(), ValidationError> {
    let span = booking.span().ok_or_else(no_interval)?;
    match find_conflict(&span, booking.id, day.overlapping(&span)) {
        Some(other) => {
            metrics::counter!(observability::CONCURRENT_CONFLICTS_TOTAL).increment(1);
            warn!(booking = %booking.id, conflicting = %other.id, "lost commit race for slot");
            Err(slot_clash(other, true))
        }
        None => Ok(()),
    }
}

impl Ledger {
    /// Store an admitted booking. Serialized per `(provider, date)`
    /// partition; the overlap check is repeated under the lock so two
    /// admissions racing for one slot cannot both land.
    pub async fn commit(&self, validated: &ValidatedBooking) -> Result<(), ValidationError> {
        let _gate = self.gate.read().await;
        let booking = &validated.booking;
        match validated.mode {
            AdmitMode::Create => self.insert_new(booking).await?,
            AdmitMode::Update => self.revise(booking).await?,
        }
        let mode = match validated.mode {
            AdmitMode::Create => "create",
            AdmitMode::Update => "update",
        };
        metrics::counter!(observability::COMMITS_TOTAL, "mode" => mode).increment(1);
        metrics::gauge!(observability::BOOKINGS_STORED).set(self.booking_index.len() as f64);
        Ok(())
    }

    async fn insert_new(&self, booking: &Booking) -> Result<(), ValidationError> {
        let key = booking.partition();
        let span = booking.span().ok_or_else(no_interval)?;
        let day = self.day(key);
        let mut guard = day.write().await;

        if needs_check(booking, None) {
            recheck(&guard, booking)?;
        }

        match self.booking_index.entry(booking.id) {
            Entry::Occupied(_) => return Err(ValidationError::DuplicateBooking(booking.id)),
            Entry::Vacant(slot) => {
                slot.insert(key);
            }
        }

        let event = Event::BookingAdmitted { booking: booking.clone() };
        if let Err(e) = self.wal_append(&event).await {
            self.booking_index.remove(&booking.id);
            return Err(e);
        }
        guard.insert(span, booking.clone());
        drop(guard);

        info!(booking = %booking.id, provider = %booking.provider_ref, date = %booking.schedule.date, "booking committed");
        self.publish(&event);
        Ok(())
    }

    /// Lock the partition currently holding `id` and the one `target` names,
    /// in ascending key order. Retries if the booking moves while waiting.
    async fn lock_for_revision(
        &self,
        id: Ulid,
        target: PartitionKey,
    ) -> Result<(PartitionKey, Locked), ValidationError> {
        loop {
            let current = self
                .partition_of(id)
                .ok_or(ValidationError::ReferenceNotFound { field: "id", id })?;

            let locked = if current == target {
                Locked::Same(self.day(target).write_owned().await)
            } else {
                let (first, second) = if current < target { (current, target) } else { (target, current) };
                let a = self.day(first).write_owned().await;
                let b = self.day(second).write_owned().await;
                if first == current {
                    Locked::Split { old: a, new: b }
                } else {
                    Locked::Split { old: b, new: a }
                }
            };

            if self.partition_of(id) == Some(current) {
                return Ok((current, locked));
            }
            debug!(booking = %id, "booking moved while locking, retrying");
        }
    }

    async fn revise(&self, booking: &Booking) -> Result<(), ValidationError> {
        let target = booking.partition();
        let span = booking.span().ok_or_else(no_interval)?;
        let (current, mut locked) = self.lock_for_revision(booking.id, target).await?;

        let stored = match &locked {
            Locked::Same(day) => day.get(booking.id),
            Locked::Split { old, .. } => old.get(booking.id),
        }
        .cloned()
        .ok_or(ValidationError::ReferenceNotFound { field: "id", id: booking.id })?;

        // The stored booking may have been closed since the pre-check.
        if stored.status.is_closed()
            && (stored.provider_ref != booking.provider_ref
                || !stored.schedule.same_slot(&booking.schedule))
        {
            return Err(ValidationError::ImmutableSchedule { id: stored.id, status: stored.status });
        }

        if needs_check(booking, Some(&stored)) {
            match &locked {
                Locked::Same(day) => recheck(day, booking)?,
                Locked::Split { new, .. } => recheck(new, booking)?,
            }
        }

        let event = Event::BookingRevised { booking: booking.clone() };
        self.wal_append(&event).await?;

        match &mut locked {
            Locked::Same(day) => {
                day.remove(booking.id);
                day.insert(span, booking.clone());
            }
            Locked::Split { old, new } => {
                old.remove(booking.id);
                new.insert(span, booking.clone());
                self.booking_index.insert(booking.id, target);
            }
        }
        drop(locked);

        info!(booking = %booking.id, status = %booking.status, "booking revised");
        self.publish(&event);
        if current.provider != target.provider {
            self.notify.send(current.provider, &event);
        }
        Ok(())
    }
}
