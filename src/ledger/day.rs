use ulid::Ulid;

use crate::model::{Booking, Span};

/// All bookings of one provider on one calendar day, sorted by start.
#[derive(Debug, Default)]
pub struct DaySchedule {
    entries: Vec<(Span, Booking)>,
}

impl DaySchedule {
    /// Insert keeping start order; equal starts keep arrival order.
    pub fn insert(&mut self, span: Span, booking: Booking) {
        let pos = self.entries.partition_point(|(s, _)| s.start <= span.start);
        self.entries.insert(pos, (span, booking));
    }

    /// Linear in the day's bookings, which stay few.
    pub fn remove(&mut self, id: Ulid) -> Option<Booking> {
        let pos = self.entries.iter().position(|(_, b)| b.id == id)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn get(&self, id: Ulid) -> Option<&Booking> {
        self.bookings().find(|b| b.id == id)
    }

    pub fn bookings(&self) -> impl Iterator<Item = &Booking> {
        self.entries.iter().map(|(_, b)| b)
    }

    /// Bookings whose stored span overlaps `query`. Binary search skips
    /// everything starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Booking> {
        let right_bound = self.entries.partition_point(|(s, _)| s.start < query.end);
        self.entries[..right_bound]
            .iter()
            .filter(move |(s, _)| s.end > query.start)
            .map(|(_, b)| b)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
