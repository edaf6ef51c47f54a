use std::sync::Arc;

use tracing::info;

use crate::admission::{AdmitMode, Admission, Clock, ValidatedBooking, ValidationError};
use crate::ledger::Ledger;
use crate::model::BookingDraft;

/// Admission plus storage: the entry point collaborators call.
pub struct BookingService {
    admission: Admission,
    ledger: Arc<Ledger>,
}

impl BookingService {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self {
            admission: Admission::new(ledger.clone()),
            ledger,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.admission = self.admission.with_clock(clock);
        self
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Run the pipeline without storing anything.
    pub async fn admit(
        &self,
        draft: BookingDraft,
        mode: AdmitMode,
    ) -> Result<ValidatedBooking, ValidationError> {
        self.admission.admit(draft, mode).await
    }

    /// Admit, then commit. A slot lost between the two surfaces as
    /// `ConcurrentConflict`.
    pub async fn submit(
        &self,
        draft: BookingDraft,
        mode: AdmitMode,
    ) -> Result<ValidatedBooking, ValidationError> {
        let validated = self.admission.admit(draft, mode).await?;
        self.ledger.commit(&validated).await?;
        info!(
            booking = %validated.booking().id,
            mode = ?validated.mode(),
            warnings = validated.warnings().len(),
            "booking stored"
        );
        Ok(validated)
    }
}
