//! Reference storage collaborator: an in-memory, WAL-backed store of
//! customers, providers and bookings, partitioned by `(provider, date)`.

mod commit;
mod day;
mod writer;
#[cfg(test)]
mod tests;

pub use day::DaySchedule;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::admission::{Stage, ValidationError};
use crate::directory::Directory;
use crate::limits::*;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

use writer::WalCommand;

pub type SharedDay = Arc<RwLock<DaySchedule>>;

pub struct Ledger {
    customers: DashMap<Ulid, Customer>,
    providers: DashMap<Ulid, Provider>,
    days: DashMap<PartitionKey, SharedDay>,
    /// Reverse lookup: booking id → partition holding it.
    booking_index: DashMap<Ulid, PartitionKey>,
    wal_tx: Option<mpsc::Sender<WalCommand>>,
    /// Mutations hold this shared, compaction exclusively, so a snapshot never
    /// misses a write that is already in the log. Always taken before any
    /// partition lock.
    gate: RwLock<()>,
    pub notify: Arc<NotifyHub>,
}

fn check_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() || name.len() > MAX_NAME_LEN {
        return Err(ValidationError::InvalidField {
            stage: Stage::Fields,
            field: "name",
            reason: format!("must be 1..={MAX_NAME_LEN} bytes"),
        });
    }
    Ok(())
}

fn writer_gone() -> ValidationError {
    ValidationError::Storage("WAL writer shut down".into())
}

impl Ledger {
    fn with_writer(notify: Arc<NotifyHub>, wal_tx: Option<mpsc::Sender<WalCommand>>) -> Self {
        Self {
            customers: DashMap::new(),
            providers: DashMap::new(),
            days: DashMap::new(),
            booking_index: DashMap::new(),
            wal_tx,
            gate: RwLock::new(()),
            notify,
        }
    }

    /// Memory-only ledger; nothing survives the process.
    pub fn ephemeral(notify: Arc<NotifyHub>) -> Self {
        Self::with_writer(notify, None)
    }

    /// Replay the log at `wal_path` and start its writer. Must be called
    /// inside a tokio runtime.
    pub fn open(wal_path: &Path, notify: Arc<NotifyHub>) -> std::io::Result<Self> {
        let replay = Wal::replay(wal_path)?;
        if replay.discarded_tail {
            warn!(path = %wal_path.display(), valid_len = replay.valid_len, "truncating torn or corrupt WAL tail");
            Wal::truncate(wal_path, replay.valid_len)?;
        }
        let wal = Wal::open(wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(WAL_CHANNEL_CAPACITY);
        tokio::spawn(writer::run_writer(wal, wal_rx));

        let ledger = Self::with_writer(notify, Some(wal_tx));
        let replayed = replay.events.len();
        ledger.restore(replay.events);
        info!(
            events = replayed,
            customers = ledger.customers.len(),
            providers = ledger.providers.len(),
            bookings = ledger.booking_index.len(),
            "ledger restored"
        );
        Ok(ledger)
    }

    /// Rebuild state from replayed events. The ledger is not shared yet, so
    /// partitions are assembled unlocked and wrapped at the end.
    fn restore(&self, events: Vec<Event>) {
        let mut days: HashMap<PartitionKey, DaySchedule> = HashMap::new();
        for event in events {
            match event {
                Event::CustomerRegistered { id, name } => {
                    self.customers.insert(id, Customer { id, name });
                }
                Event::ProviderRegistered { id, name, is_verified, is_available } => {
                    self.providers.insert(id, Provider { id, name, is_verified, is_available });
                }
                Event::ProviderFlagsChanged { id, is_verified, is_available } => {
                    if let Some(mut p) = self.providers.get_mut(&id) {
                        p.is_verified = is_verified;
                        p.is_available = is_available;
                    }
                }
                Event::BookingAdmitted { booking } | Event::BookingRevised { booking } => {
                    if let Some((_, old)) = self.booking_index.remove(&booking.id)
                        && let Some(day) = days.get_mut(&old)
                    {
                        day.remove(booking.id);
                    }
                    let Some(span) = booking.span() else {
                        warn!(booking = %booking.id, "skipping replayed booking without a valid schedule");
                        continue;
                    };
                    let key = booking.partition();
                    self.booking_index.insert(booking.id, key);
                    days.entry(key).or_default().insert(span, booking);
                }
            }
        }
        for (key, day) in days {
            self.days.insert(key, Arc::new(RwLock::new(day)));
        }
        metrics::gauge!(crate::observability::BOOKINGS_STORED).set(self.booking_index.len() as f64);
    }

    /// Send to the group-commit writer and wait until the record is durable.
    async fn wal_append(&self, event: &Event) -> Result<(), ValidationError> {
        let Some(tx) = &self.wal_tx else { return Ok(()) };
        let (response, rx) = oneshot::channel();
        tx.send(WalCommand::Append { event: event.clone(), response })
            .await
            .map_err(|_| writer_gone())?;
        rx.await.map_err(|_| writer_gone())??;
        Ok(())
    }

    fn publish(&self, event: &Event) {
        if let Some(provider) = event.provider_id() {
            self.notify.send(provider, event);
        }
    }

    /// Get or create the partition for `key`.
    fn day(&self, key: PartitionKey) -> SharedDay {
        self.days.entry(key).or_default().value().clone()
    }

    fn existing_day(&self, key: &PartitionKey) -> Option<SharedDay> {
        self.days.get(key).map(|e| e.value().clone())
    }

    fn partition_of(&self, id: Ulid) -> Option<PartitionKey> {
        self.booking_index.get(&id).map(|e| *e.value())
    }

    /// Bookings across all partitions, closed ones included.
    pub fn booking_count(&self) -> usize {
        self.booking_index.len()
    }

    /// Number of `(provider, date)` partitions currently allocated.
    pub fn partition_count(&self) -> usize {
        self.days.len()
    }

    /// Drop partitions left empty by failed commits or by bookings moving
    /// away. Caller must hold the gate exclusively, so no mutation can be
    /// holding a partition it is about to fill.
    fn prune_empty_days(&self) {
        let before = self.days.len();
        self.days
            .retain(|_, day| day.try_read().map_or(true, |guard| !guard.is_empty()));
        let pruned = before - self.days.len();
        if pruned > 0 {
            debug!(pruned, "dropped empty partitions");
        }
    }

    // ── Registration ─────────────────────────────────────────

    /// Register a customer, or rename an existing one.
    pub async fn upsert_customer(&self, id: Ulid, name: String) -> Result<(), ValidationError> {
        check_name(&name)?;
        let _gate = self.gate.read().await;
        let event = Event::CustomerRegistered { id, name: name.clone() };
        self.wal_append(&event).await?;
        self.customers.insert(id, Customer { id, name });
        Ok(())
    }

    /// Register a provider, or replace its name and flags.
    pub async fn upsert_provider(&self, provider: Provider) -> Result<(), ValidationError> {
        check_name(&provider.name)?;
        let _gate = self.gate.read().await;
        let event = Event::ProviderRegistered {
            id: provider.id,
            name: provider.name.clone(),
            is_verified: provider.is_verified,
            is_available: provider.is_available,
        };
        self.wal_append(&event).await?;
        self.providers.insert(provider.id, provider);
        self.publish(&event);
        Ok(())
    }

    /// Update verification and availability. Existing bookings are not
    /// re-checked; the flags only gate future admissions.
    pub async fn set_provider_flags(
        &self,
        id: Ulid,
        is_verified: bool,
        is_available: bool,
    ) -> Result<Provider, ValidationError> {
        if !self.providers.contains_key(&id) {
            return Err(ValidationError::ReferenceNotFound { field: "provider_ref", id });
        }
        let _gate = self.gate.read().await;
        let event = Event::ProviderFlagsChanged { id, is_verified, is_available };
        self.wal_append(&event).await?;
        let updated = self.providers.get_mut(&id).map(|mut p| {
            p.is_verified = is_verified;
            p.is_available = is_available;
            p.clone()
        });
        self.publish(&event);
        updated.ok_or(ValidationError::ReferenceNotFound { field: "provider_ref", id })
    }

    // ── Compaction ───────────────────────────────────────────

    /// Minimal event list that recreates the current state.
    pub async fn snapshot(&self) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .customers
            .iter()
            .map(|c| Event::CustomerRegistered { id: c.id, name: c.name.clone() })
            .collect();
        events.extend(self.providers.iter().map(|p| Event::ProviderRegistered {
            id: p.id,
            name: p.name.clone(),
            is_verified: p.is_verified,
            is_available: p.is_available,
        }));

        let days: Vec<SharedDay> = self.days.iter().map(|e| e.value().clone()).collect();
        for day in days {
            let guard = day.read().await;
            events.extend(guard.bookings().map(|b| Event::BookingAdmitted { booking: b.clone() }));
        }
        events
    }

    /// Drop empty partitions and rewrite the log as a snapshot. The log
    /// rewrite is skipped for an ephemeral ledger.
    pub async fn compact(&self) -> Result<(), ValidationError> {
        let _gate = self.gate.write().await;
        self.prune_empty_days();
        let Some(tx) = &self.wal_tx else { return Ok(()) };
        let snapshot = self.snapshot().await;
        let size = snapshot.len();
        let (response, rx) = oneshot::channel();
        tx.send(WalCommand::Compact { snapshot, response })
            .await
            .map_err(|_| writer_gone())?;
        rx.await.map_err(|_| writer_gone())??;
        info!(events = size, "ledger compacted");
        Ok(())
    }

    /// Records written since the log was last compacted. Always 0 when
    /// ephemeral.
    pub async fn appends_since_compact(&self) -> Result<u64, ValidationError> {
        let Some(tx) = &self.wal_tx else { return Ok(0) };
        let (response, rx) = oneshot::channel();
        tx.send(WalCommand::AppendsSinceCompact { response })
            .await
            .map_err(|_| writer_gone())?;
        rx.await.map_err(|_| writer_gone())
    }
}

#[async_trait]
impl Directory for Ledger {
    async fn customer(&self, id: Ulid) -> Result<Option<Customer>, ValidationError> {
        Ok(self.customers.get(&id).map(|c| c.value().clone()))
    }

    async fn provider(&self, id: Ulid) -> Result<Option<Provider>, ValidationError> {
        Ok(self.providers.get(&id).map(|p| p.value().clone()))
    }

    async fn booking(&self, id: Ulid) -> Result<Option<Booking>, ValidationError> {
        loop {
            let Some(key) = self.partition_of(id) else { return Ok(None) };
            let Some(day) = self.existing_day(&key) else { return Ok(None) };
            let guard = day.read().await;
            if let Some(b) = guard.get(id) {
                return Ok(Some(b.clone()));
            }
            // Moved to another partition while we waited for the lock.
            if self.partition_of(id) == Some(key) {
                return Ok(None);
            }
        }
    }

    async fn active_bookings_on(
        &self,
        provider: Ulid,
        date: NaiveDate,
        exclude: Ulid,
    ) -> Result<Vec<Booking>, ValidationError> {
        let Some(day) = self.existing_day(&PartitionKey { provider, date }) else {
            return Ok(Vec::new());
        };
        let guard = day.read().await;
        Ok(guard
            .bookings()
            .filter(|b| b.id != exclude && b.status.occupies_slot())
            .cloned()
            .collect())
    }
}
