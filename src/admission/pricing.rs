use crate::limits::PRICING_TOLERANCE;
use crate::model::Pricing;

use super::ValidationError;

/// Amounts must be finite and non-negative, and the total must equal
/// `base + extras - discount` within [`PRICING_TOLERANCE`]. A discount larger
/// than the subtotal is allowed as long as the total matches.
pub fn check_pricing(pricing: &Pricing) -> Result<(), ValidationError> {
    for (field, value) in [
        ("pricing.base_amount", pricing.base_amount),
        ("pricing.extra_charges", pricing.extra_charges),
        ("pricing.discount", pricing.discount),
    ] {
        // NaN fails too
        if !(value >= 0.0 && value.is_finite()) {
            return Err(ValidationError::InvalidAmount { field, value });
        }
    }

    let expected = pricing.expected_total();
    if !((expected - pricing.total_amount).abs() <= PRICING_TOLERANCE) {
        return Err(ValidationError::PricingMismatch {
            expected,
            actual: pricing.total_amount,
        });
    }
    Ok(())
}
