//! Booking admission: the fixed chain of derivations and checks a draft passes
//! through before it may be stored.
//!
//! Fields → Geo → References → Pricing → Status → Conflict. The first failure
//! aborts the run and is returned unchanged.

mod conflict;
mod error;
mod fields;
mod geo;
mod pricing;
mod references;
mod status;

pub use conflict::{find_conflict, needs_check};
pub(crate) use conflict::slot_clash;
pub use error::{ErrorReport, Stage, ValidationError};
pub use fields::derive_end_time;
pub use geo::derive_location;
pub use pricing::check_pricing;
pub use status::{AdmissionWarning, check_status};

use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::directory::Directory;
use crate::model::*;
use crate::observability;

/// Source of "today" for the past-date rule.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Clock pinned to one date.
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmitMode {
    Create,
    Update,
}

/// A draft that passed every stage, with derived fields filled in. Only
/// [`Admission::admit`] produces one, so anything handed to
/// `Ledger::commit` has been through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedBooking {
    pub(crate) booking: Booking,
    pub(crate) warnings: Vec<AdmissionWarning>,
    pub(crate) mode: AdmitMode,
}

impl ValidatedBooking {
    pub fn booking(&self) -> &Booking {
        &self.booking
    }

    pub fn warnings(&self) -> &[AdmissionWarning] {
        &self.warnings
    }

    pub fn mode(&self) -> AdmitMode {
        self.mode
    }
}

pub struct Admission {
    directory: Arc<dyn Directory>,
    clock: Arc<dyn Clock>,
}

impl Admission {
    /// Pipeline reading through `directory`, dated by the system clock.
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self {
            directory,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the source of "today" used by the past-date rule.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Decide whether `draft` may be stored. Pure with respect to everything
    /// but the draft: the directory is only read.
    pub async fn admit(
        &self,
        draft: BookingDraft,
        mode: AdmitMode,
    ) -> Result<ValidatedBooking, ValidationError> {
        let started = Instant::now();
        let id = draft.id;
        let result = self.run(draft, mode).await;
        metrics::histogram!(observability::ADMISSION_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(v) => {
                metrics::counter!(observability::ADMISSIONS_TOTAL, "outcome" => "admitted", "stage" => "none")
                    .increment(1);
                debug!(booking = %id, warnings = v.warnings.len(), "draft admitted");
            }
            Err(e) => {
                metrics::counter!(
                    observability::ADMISSIONS_TOTAL,
                    "outcome" => "rejected",
                    "stage" => e.stage().as_str()
                )
                .increment(1);
                debug!(booking = %id, stage = e.stage().as_str(), kind = e.kind(), "draft rejected: {e}");
            }
        }
        result
    }

    async fn run(
        &self,
        mut draft: BookingDraft,
        mode: AdmitMode,
    ) -> Result<ValidatedBooking, ValidationError> {
        let directory = self.directory.as_ref();

        fields::check_fields(&mut draft)?;
        geo::apply(&mut draft.address)?;
        let prior = references::check_references(&draft, mode, directory).await?;
        pricing::check_pricing(&draft.pricing)?;
        let warnings = status::check_status(&draft, prior.as_ref(), self.clock.today())?;
        conflict::check_conflict(&draft, prior.as_ref(), directory).await?;

        Ok(ValidatedBooking { booking: draft, warnings, mode })
    }
}
