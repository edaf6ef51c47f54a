use async_trait::async_trait;
use chrono::NaiveDate;
use ulid::Ulid;

use crate::admission::ValidationError;
use crate::model::{Booking, Customer, Provider};

/// Read side of the storage collaborator, as seen by the admission pipeline.
/// Every call may suspend on I/O; none of them mutate.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn customer(&self, id: Ulid) -> Result<Option<Customer>, ValidationError>;

    async fn provider(&self, id: Ulid) -> Result<Option<Provider>, ValidationError>;

    async fn booking(&self, id: Ulid) -> Result<Option<Booking>, ValidationError>;

    /// Coarse conflict filter: bookings of `provider` on `date` that still hold
    /// their slot (not cancelled, not completed), minus `exclude`.
    async fn active_bookings_on(
        &self,
        provider: Ulid,
        date: NaiveDate,
        exclude: Ulid,
    ) -> Result<Vec<Booking>, ValidationError>;
}
