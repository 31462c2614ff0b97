//! Seed batch identifier derivation
//!
//! Batch identifiers have the form `{YYYY}-{MM}-{crop code}-{variety}`,
//! e.g. `2023-09-SB-TIWALA_6`.

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use crate::models::Crop;
use crate::validation::parse_date;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchIdError {
    #[error("invalid harvest date: '{0}'")]
    InvalidDate(String),
}

/// Two-letter crop code. Unknown crops use their first two letters.
pub fn crop_abbreviation(crop: &str) -> String {
    match Crop::from_name(crop) {
        Some(crop) => crop.abbreviation().to_string(),
        None => crop.trim().chars().take(2).collect::<String>().to_uppercase(),
    }
}

/// Variety segment: whitespace runs become `_`, letters are uppercased
pub fn normalize_variety(variety: &str) -> String {
    variety.split_whitespace().collect::<Vec<_>>().join("_").to_uppercase()
}

pub fn derive_batch_id(harvest_date: NaiveDate, crop: &str, variety: &str) -> String {
    format!(
        "{}-{:02}-{}-{}",
        harvest_date.year(),
        harvest_date.month(),
        crop_abbreviation(crop),
        normalize_variety(variety)
    )
}

/// Same as [`derive_batch_id`] for a date still in text form
pub fn derive_batch_id_from_str(
    harvest_date: &str,
    crop: &str,
    variety: &str,
) -> Result<String, BatchIdError> {
    let date = parse_date(harvest_date)
        .ok_or_else(|| BatchIdError::InvalidDate(harvest_date.to_string()))?;
    Ok(derive_batch_id(date, crop, variety))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_derive_known_crop() {
        let date = NaiveDate::from_ymd_opt(2023, 9, 20).unwrap();
        assert_eq!(derive_batch_id(date, "Soybean", "Tiwala 6"), "2023-09-SB-TIWALA_6");
        assert_eq!(derive_batch_id(date, "Mungbean", "Pag-asa 19"), "2023-09-MB-PAG-ASA_19");
        assert_eq!(derive_batch_id(date, "Peanut", "NSIC Pn 15"), "2023-09-PN-NSIC_PN_15");
    }

    #[test]
    fn test_unknown_crop_falls_back_to_prefix() {
        assert_eq!(crop_abbreviation("corn"), "CO");
        assert_eq!(crop_abbreviation("x"), "X");
        assert_eq!(crop_abbreviation("soybean"), "SB");
    }

    #[test]
    fn test_variety_whitespace_runs_collapse() {
        assert_eq!(normalize_variety("Tiwala   6"), "TIWALA_6");
        assert_eq!(normalize_variety(" tiwala\t6 "), "TIWALA_6");
    }

    #[test]
    fn test_from_str_rejects_malformed_date() {
        assert_eq!(
            derive_batch_id_from_str("2023-09-20", "Soybean", "Tiwala 6").unwrap(),
            "2023-09-SB-TIWALA_6"
        );
        assert_eq!(
            derive_batch_id_from_str("09/20/2023", "Soybean", "Tiwala 6").unwrap(),
            "2023-09-SB-TIWALA_6"
        );
        assert!(matches!(
            derive_batch_id_from_str("2023-13-40", "Soybean", "Tiwala 6"),
            Err(BatchIdError::InvalidDate(_))
        ));
    }

    proptest! {
        #[test]
        fn test_derived_id_shape(
            year in 2000..2100i32,
            month in 1..=12u32,
            day in 1..=28u32,
            variety in "[A-Za-z0-9]{1,8}( [A-Za-z0-9]{1,8}){0,2}",
        ) {
            let date = NaiveDate::from_ymd_opt(year, month, day).unwrap();
            let id = derive_batch_id(date, "Mungbean", &variety);
            let expected_prefix = format!("{}-{:02}-MB-", year, month);
            prop_assert!(id.starts_with(&expected_prefix));
            prop_assert!(!id.contains(' '));
            prop_assert_eq!(id.to_uppercase(), id.clone());
        }
    }
}
