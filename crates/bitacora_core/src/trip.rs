//! crates/bitacora_core/src/trip.rs
//!
//! Local validation of a trip's delivery address, run before the address
//! advisory is asked and before a trip is saved.

use crate::domain::TripDetails;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn zip_regex() -> &'static Regex {
    static ZIP: OnceLock<Regex> = OnceLock::new();
    // `\d` would also accept non-ASCII digits.
    ZIP.get_or_init(|| Regex::new(r"^[0-9]{5}$").expect("static zip pattern"))
}

/// Field name to message, for inline display next to each input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Dirección inválida: {}", .0.keys().cloned().collect::<Vec<_>>().join(", "))]
pub struct AddressErrors(pub BTreeMap<&'static str, &'static str>);

pub fn validate_address(trip: &TripDetails) -> Result<(), AddressErrors> {
    let mut errors = BTreeMap::new();
    if trip.street.trim().chars().count() < 3 {
        errors.insert("street", "Mínimo 3 letras");
    }
    if trip.number.trim().is_empty() {
        errors.insert("number", "Requerido");
    }
    if trip.neighborhood.trim().chars().count() < 3 {
        errors.insert("neighborhood", "Requerido");
    }
    if !zip_regex().is_match(&trip.zip) {
        errors.insert("zip", "5 dígitos");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AddressErrors(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip() -> TripDetails {
        TripDetails {
            street: "Av. Constitución".to_string(),
            number: "1200".to_string(),
            neighborhood: "Centro".to_string(),
            zip: "64000".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_a_complete_address() {
        assert_eq!(validate_address(&trip()), Ok(()));
        assert_eq!(trip().address_line(), "Av. Constitución 1200, Centro, CP 64000");
    }

    #[test]
    fn zip_must_be_exactly_five_digits() {
        for zip in ["6400", "640000", "64a00", " 64000", "", "٦٤٠٠٠", "６４０００"] {
            let err = validate_address(&TripDetails {
                zip: zip.to_string(),
                ..trip()
            })
            .unwrap_err();
            assert_eq!(err.0.get("zip"), Some(&"5 dígitos"), "zip {:?}", zip);
        }
    }

    #[test]
    fn reports_every_missing_field() {
        let err = validate_address(&TripDetails::default()).unwrap_err();
        let fields: Vec<_> = err.0.keys().copied().collect();
        assert_eq!(fields, vec!["neighborhood", "number", "street", "zip"]);
    }
}
