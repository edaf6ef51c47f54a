use tracing::debug;

use crate::directory::Directory;
use crate::model::*;

use super::{AdmitMode, ValidationError};

/// Resolve every pointer on the draft. Returns the stored booking being
/// revised in update mode.
pub async fn check_references(
    draft: &BookingDraft,
    mode: AdmitMode,
    directory: &dyn Directory,
) -> Result<Option<Booking>, ValidationError> {
    let prior = match mode {
        AdmitMode::Create => None,
        AdmitMode::Update => Some(
            directory
                .booking(draft.id)
                .await?
                .ok_or(ValidationError::ReferenceNotFound { field: "id", id: draft.id })?,
        ),
    };

    directory
        .customer(draft.customer_ref)
        .await?
        .ok_or(ValidationError::ReferenceNotFound { field: "customer_ref", id: draft.customer_ref })?;

    let provider = directory
        .provider(draft.provider_ref)
        .await?
        .ok_or(ValidationError::ReferenceNotFound { field: "provider_ref", id: draft.provider_ref })?;

    // A cancellation must never be blocked by the provider's current state.
    if draft.status == BookingStatus::Cancelled {
        debug!(booking = %draft.id, "cancelled draft, skipping provider eligibility");
    } else if !provider.is_eligible() {
        return Err(if provider.is_verified {
            ValidationError::ProviderUnavailable(provider.id)
        } else {
            ValidationError::ProviderUnverified(provider.id)
        });
    }

    if let Some(previous) = draft.rescheduled_from {
        directory
            .booking(previous)
            .await?
            .ok_or(ValidationError::ReferenceNotFound { field: "rescheduled_from", id: previous })?;
    }

    Ok(prior)
}
