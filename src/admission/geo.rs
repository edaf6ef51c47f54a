use crate::limits::{LAT_RANGE, LNG_RANGE};
use crate::model::{Address, GeoPoint};

use super::{Stage, ValidationError};

/// Point for a coordinate pair. Both must be present and finite, otherwise
/// there is no point. Total and idempotent.
pub fn derive_location(lat: Option<f64>, lng: Option<f64>) -> Option<GeoPoint> {
    match (lat, lng) {
        (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => Some(GeoPoint::new(lng, lat)),
        _ => None,
    }
}

fn check_range(field: &'static str, value: Option<f64>, (min, max): (f64, f64)) -> Result<(), ValidationError> {
    match value {
        Some(v) if v.is_finite() && !(min..=max).contains(&v) => Err(ValidationError::InvalidField {
            stage: Stage::Geo,
            field,
            reason: format!("{v} outside [{min}, {max}]"),
        }),
        _ => Ok(()),
    }
}

/// Range-check the raw coordinates and overwrite `location` from them.
/// Any previously derived point is replaced, never kept stale.
pub fn apply(address: &mut Address) -> Result<(), ValidationError> {
    check_range("address.lat", address.lat, LAT_RANGE)?;
    check_range("address.lng", address.lng, LNG_RANGE)?;
    address.location = derive_location(address.lat, address.lng);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(lat: Option<f64>, lng: Option<f64>) -> Address {
        Address {
            street: "ul. Floriańska 3".into(),
            city: "Kraków".into(),
            state: "małopolskie".into(),
            postal_code: "31-019".into(),
            lat,
            lng,
            location: None,
        }
    }

    #[test]
    fn coordinates_are_lng_then_lat() {
        let mut a = address(Some(50.0619), Some(19.9368));
        apply(&mut a).unwrap();
        let p = a.location.unwrap();
        assert_eq!(p.coordinates, [19.9368, 50.0619]);
    }

    #[test]
    fn clearing_one_coordinate_clears_point() {
        let mut a = address(Some(50.0), Some(19.0));
        apply(&mut a).unwrap();
        assert!(a.location.is_some());

        a.lng = None;
        apply(&mut a).unwrap();
        assert!(a.location.is_none());

        let mut b = address(None, Some(19.0));
        b.location = Some(GeoPoint::new(1.0, 2.0)); // stale input
        apply(&mut b).unwrap();
        assert!(b.location.is_none());
    }

    #[test]
    fn derivation_is_idempotent() {
        let mut a = address(Some(-33.8688), Some(151.2093));
        apply(&mut a).unwrap();
        let first = a.location;
        apply(&mut a).unwrap();
        assert_eq!(a.location, first);
    }

    #[test]
    fn non_finite_counts_as_absent() {
        assert!(derive_location(Some(f64::NAN), Some(10.0)).is_none());
        assert!(derive_location(Some(10.0), Some(f64::INFINITY)).is_none());
    }

    #[test]
    fn out_of_range_rejected() {
        let mut a = address(Some(91.0), Some(0.0));
        let err = apply(&mut a).unwrap_err();
        assert_eq!(err.field(), Some("address.lat"));
        assert_eq!(err.stage(), Stage::Geo);

        let mut b = address(Some(0.0), Some(-180.5));
        assert_eq!(apply(&mut b).unwrap_err().field(), Some("address.lng"));

        let mut edge = address(Some(-90.0), Some(180.0));
        assert!(apply(&mut edge).is_ok());
    }
}
