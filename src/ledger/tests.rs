use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use ulid::Ulid;

use super::*;
use crate::admission::tests::draft;
use crate::admission::{AdmitMode, ValidatedBooking, ValidationError};

fn validated(booking: Booking, mode: AdmitMode) -> ValidatedBooking {
    ValidatedBooking { booking, warnings: Vec::new(), mode }
}

fn at(provider: Ulid, start: &str, hours: u32) -> Booking {
    let mut b = draft();
    b.id = Ulid::new();
    b.provider_ref = provider;
    b.schedule.start_time = start.into();
    b.schedule.duration_hours = hours;
    b
}

fn wal_path() -> PathBuf {
    let dir = std::env::temp_dir().join("slotguard_test_ledger");
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(format!("{}.wal", Ulid::new()))
}

fn ephemeral() -> Ledger {
    Ledger::ephemeral(Arc::new(NotifyHub::new()))
}

#[tokio::test]
async fn committed_booking_is_visible() {
    let ledger = ephemeral();
    let b = draft();
    ledger.commit(&validated(b.clone(), AdmitMode::Create)).await.unwrap();

    assert_eq!(ledger.booking(b.id).await.unwrap(), Some(b.clone()));
    let same_day = ledger
        .active_bookings_on(b.provider_ref, b.schedule.date, Ulid::new())
        .await
        .unwrap();
    assert_eq!(same_day.len(), 1);
    let excluded = ledger.active_bookings_on(b.provider_ref, b.schedule.date, b.id).await.unwrap();
    assert!(excluded.is_empty());
    assert_eq!(ledger.booking_count(), 1);
}

#[tokio::test]
async fn duplicate_id_rejected() {
    let ledger = ephemeral();
    let b = draft();
    ledger.commit(&validated(b.clone(), AdmitMode::Create)).await.unwrap();

    let mut again = b.clone();
    again.schedule.start_time = "18:00".into();
    let err = ledger.commit(&validated(again, AdmitMode::Create)).await.unwrap_err();
    assert_eq!(err, ValidationError::DuplicateBooking(b.id));
    assert_eq!(ledger.booking_count(), 1);
}

#[tokio::test]
async fn overlap_at_commit_is_concurrent_conflict() {
    let ledger = ephemeral();
    let provider = Ulid::new();
    let first = at(provider, "10:00", 2);
    ledger.commit(&validated(first.clone(), AdmitMode::Create)).await.unwrap();

    let err = ledger
        .commit(&validated(at(provider, "11:00", 1), AdmitMode::Create))
        .await
        .unwrap_err();
    assert!(matches!(err, ValidationError::ConcurrentConflict { booking_id, .. } if booking_id == first.id));
    assert!(err.is_slot_conflict());

    // Abutting is fine.
    ledger.commit(&validated(at(provider, "12:00", 1), AdmitMode::Create)).await.unwrap();
}

#[tokio::test]
async fn closed_bookings_release_the_slot() {
    let ledger = ephemeral();
    let provider = Ulid::new();
    let mut cancelled = at(provider, "10:00", 2);
    cancelled.status = BookingStatus::Cancelled;
    ledger.commit(&validated(cancelled, AdmitMode::Create)).await.unwrap();

    ledger.commit(&validated(at(provider, "10:00", 2), AdmitMode::Create)).await.unwrap();
    assert_eq!(ledger.booking_count(), 2);
}

#[tokio::test]
async fn revise_moves_between_partitions() {
    let ledger = ephemeral();
    let b = draft();
    ledger.commit(&validated(b.clone(), AdmitMode::Create)).await.unwrap();

    let mut moved = b.clone();
    moved.schedule.date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
    moved.provider_ref = Ulid::new();
    ledger.commit(&validated(moved.clone(), AdmitMode::Update)).await.unwrap();

    assert_eq!(ledger.booking(b.id).await.unwrap(), Some(moved.clone()));
    let old_day = ledger.active_bookings_on(b.provider_ref, b.schedule.date, Ulid::new()).await.unwrap();
    assert!(old_day.is_empty());
    let new_day = ledger
        .active_bookings_on(moved.provider_ref, moved.schedule.date, Ulid::new())
        .await
        .unwrap();
    assert_eq!(new_day.len(), 1);
    assert_eq!(ledger.booking_count(), 1);
}

#[tokio::test]
async fn revise_in_place_does_not_self_conflict() {
    let ledger = ephemeral();
    let b = draft();
    ledger.commit(&validated(b.clone(), AdmitMode::Create)).await.unwrap();

    let mut longer = b.clone();
    longer.schedule.duration_hours = 3;
    ledger.commit(&validated(longer.clone(), AdmitMode::Update)).await.unwrap();
    assert_eq!(ledger.booking(b.id).await.unwrap(), Some(longer));
}

#[tokio::test]
async fn revise_into_taken_slot_conflicts() {
    let ledger = ephemeral();
    let provider = Ulid::new();
    let morning = at(provider, "08:00", 2);
    let noon = at(provider, "12:00", 2);
    ledger.commit(&validated(morning.clone(), AdmitMode::Create)).await.unwrap();
    ledger.commit(&validated(noon.clone(), AdmitMode::Create)).await.unwrap();

    let mut clash = noon.clone();
    clash.schedule.start_time = "09:00".into();
    let err = ledger.commit(&validated(clash, AdmitMode::Update)).await.unwrap_err();
    assert!(matches!(err, ValidationError::ConcurrentConflict { booking_id, .. } if booking_id == morning.id));
    assert_eq!(ledger.booking(noon.id).await.unwrap(), Some(noon));
}

#[tokio::test]
async fn revise_closed_booking_schedule_is_immutable() {
    let ledger = ephemeral();
    let mut b = draft();
    b.status = BookingStatus::Completed;
    b.payment_status = PaymentStatus::Paid;
    ledger.commit(&validated(b.clone(), AdmitMode::Create)).await.unwrap();

    let mut moved = b.clone();
    moved.schedule.start_time = "15:00".into();
    let err = ledger.commit(&validated(moved, AdmitMode::Update)).await.unwrap_err();
    assert_eq!(err, ValidationError::ImmutableSchedule { id: b.id, status: BookingStatus::Completed });
}

#[tokio::test]
async fn revise_unknown_booking() {
    let ledger = ephemeral();
    let b = draft();
    let err = ledger.commit(&validated(b.clone(), AdmitMode::Update)).await.unwrap_err();
    assert_eq!(err, ValidationError::ReferenceNotFound { field: "id", id: b.id });
}

#[tokio::test]
async fn registration_rules() {
    let ledger = ephemeral();
    let err = ledger.upsert_customer(Ulid::new(), "x".repeat(MAX_NAME_LEN + 1)).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_field");
    let err = ledger.upsert_customer(Ulid::new(), "  ".into()).await.unwrap_err();
    assert_eq!(err.field(), Some("name"));

    let missing = Ulid::new();
    let err = ledger.set_provider_flags(missing, true, true).await.unwrap_err();
    assert_eq!(err, ValidationError::ReferenceNotFound { field: "provider_ref", id: missing });

    let id = Ulid::new();
    ledger
        .upsert_provider(Provider { id, name: "Ania".into(), is_verified: false, is_available: true })
        .await
        .unwrap();
    let updated = ledger.set_provider_flags(id, true, false).await.unwrap();
    assert!(updated.is_verified && !updated.is_available);
    assert_eq!(ledger.provider(id).await.unwrap(), Some(updated));
}

#[tokio::test]
async fn commits_are_broadcast_to_the_provider() {
    let ledger = ephemeral();
    let b = draft();
    let mut rx = ledger.notify.subscribe(b.provider_ref);
    ledger.commit(&validated(b.clone(), AdmitMode::Create)).await.unwrap();

    assert_eq!(rx.recv().await.unwrap(), Event::BookingAdmitted { booking: b });
}

#[tokio::test]
async fn moving_provider_notifies_both() {
    let ledger = ephemeral();
    let b = draft();
    ledger.commit(&validated(b.clone(), AdmitMode::Create)).await.unwrap();

    let mut moved = b.clone();
    moved.provider_ref = Ulid::new();
    let mut old_rx = ledger.notify.subscribe(b.provider_ref);
    let mut new_rx = ledger.notify.subscribe(moved.provider_ref);
    ledger.commit(&validated(moved.clone(), AdmitMode::Update)).await.unwrap();

    let expected = Event::BookingRevised { booking: moved };
    assert_eq!(old_rx.recv().await.unwrap(), expected);
    assert_eq!(new_rx.recv().await.unwrap(), expected);
}

#[tokio::test]
async fn state_survives_reopen() {
    let path = wal_path();
    let b = draft();
    let mut revised = b.clone();
    revised.schedule.date = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
    {
        let ledger = Ledger::open(&path, Arc::new(NotifyHub::new())).unwrap();
        ledger.upsert_customer(b.customer_ref, "Ola".into()).await.unwrap();
        ledger
            .upsert_provider(Provider {
                id: b.provider_ref,
                name: "Ania".into(),
                is_verified: true,
                is_available: true,
            })
            .await
            .unwrap();
        ledger.set_provider_flags(b.provider_ref, true, false).await.unwrap();
        ledger.commit(&validated(b.clone(), AdmitMode::Create)).await.unwrap();
        ledger.commit(&validated(revised.clone(), AdmitMode::Update)).await.unwrap();
        assert_eq!(ledger.appends_since_compact().await.unwrap(), 5);
    }

    let ledger = Ledger::open(&path, Arc::new(NotifyHub::new())).unwrap();
    assert_eq!(ledger.customer(b.customer_ref).await.unwrap().unwrap().name, "Ola");
    assert!(!ledger.provider(b.provider_ref).await.unwrap().unwrap().is_available);
    assert_eq!(ledger.booking(b.id).await.unwrap(), Some(revised));
    let old_day = ledger.active_bookings_on(b.provider_ref, b.schedule.date, Ulid::new()).await.unwrap();
    assert!(old_day.is_empty());
    assert_eq!(ledger.booking_count(), 1);
}

#[tokio::test]
async fn compaction_preserves_state() {
    let path = wal_path();
    let provider = Ulid::new();
    let bookings: Vec<Booking> = ["08:00", "10:00", "12:00", "14:00"]
        .iter()
        .map(|start| at(provider, start, 2))
        .collect();
    {
        let ledger = Ledger::open(&path, Arc::new(NotifyHub::new())).unwrap();
        for b in &bookings {
            ledger.commit(&validated(b.clone(), AdmitMode::Create)).await.unwrap();
        }
        for b in &bookings {
            let mut paid = b.clone();
            paid.payment_status = PaymentStatus::Paid;
            ledger.commit(&validated(paid, AdmitMode::Update)).await.unwrap();
        }
        let before = std::fs::metadata(&path).unwrap().len();
        ledger.compact().await.unwrap();
        assert_eq!(ledger.appends_since_compact().await.unwrap(), 0);
        assert!(std::fs::metadata(&path).unwrap().len() < before);
    }

    let ledger = Ledger::open(&path, Arc::new(NotifyHub::new())).unwrap();
    assert_eq!(ledger.booking_count(), bookings.len());
    for b in &bookings {
        let stored = ledger.booking(b.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
    }
}

#[tokio::test]
async fn ephemeral_compaction_is_noop() {
    let ledger = ephemeral();
    ledger.compact().await.unwrap();
    assert_eq!(ledger.appends_since_compact().await.unwrap(), 0);
}

#[tokio::test]
async fn compaction_drops_empty_partitions() {
    let ledger = ephemeral();
    let b = draft();
    ledger.commit(&validated(b.clone(), AdmitMode::Create)).await.unwrap();

    // A rejected duplicate on another date still allocates that partition.
    let mut elsewhere = b.clone();
    elsewhere.schedule.date = NaiveDate::from_ymd_opt(2025, 6, 9).unwrap();
    let err = ledger.commit(&validated(elsewhere, AdmitMode::Create)).await.unwrap_err();
    assert_eq!(err, ValidationError::DuplicateBooking(b.id));

    // Moving the booking empties its original partition.
    let mut moved = b.clone();
    moved.schedule.date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
    ledger.commit(&validated(moved.clone(), AdmitMode::Update)).await.unwrap();
    assert_eq!(ledger.partition_count(), 3);

    ledger.compact().await.unwrap();
    assert_eq!(ledger.partition_count(), 1);
    assert_eq!(ledger.booking(b.id).await.unwrap(), Some(moved.clone()));

    // A pruned partition is recreated on demand.
    ledger.commit(&validated(at(b.provider_ref, "10:00", 2), AdmitMode::Create)).await.unwrap();
    assert_eq!(ledger.partition_count(), 2);
}

#[tokio::test]
async fn commits_after_a_torn_tail_survive_reopen() {
    let path = wal_path();
    let first = draft();
    {
        let ledger = Ledger::open(&path, Arc::new(NotifyHub::new())).unwrap();
        ledger.commit(&validated(first.clone(), AdmitMode::Create)).await.unwrap();
    }
    // Half-written record, as left by a crash mid-append.
    {
        use std::io::Write;
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(&[0xff, 0x00, 0x00, 0x00, 0xde, 0xad]).unwrap();
    }

    let second = at(first.provider_ref, "15:00", 1);
    {
        let ledger = Ledger::open(&path, Arc::new(NotifyHub::new())).unwrap();
        assert_eq!(ledger.booking_count(), 1);
        ledger.commit(&validated(second.clone(), AdmitMode::Create)).await.unwrap();
    }

    let ledger = Ledger::open(&path, Arc::new(NotifyHub::new())).unwrap();
    assert_eq!(ledger.booking_count(), 2);
    assert_eq!(ledger.booking(second.id).await.unwrap(), Some(second));
}
