//! Validation utilities for the Verdex seed ledger
//!
//! Creation inputs are validated field by field and every problem is
//! reported, so forms and the bulk importer can show all of them at once.

use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;

use crate::models::{
    reject_foreign, Classification, Crop, DistributionDraft, DistributionMode, HarvestBatchDraft,
    NewDistribution, NewHarvestBatch, Recipient,
};
use crate::types::FieldError;

// ============================================================================
// Scalar Validations
// ============================================================================

/// Parse a calendar date in `YYYY-MM-DD`, `MM/DD/YYYY` or RFC 3339 form
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// A distribution or harvest quantity must be a positive number of kilograms
pub fn validate_quantity(quantity: Option<Decimal>) -> Result<Decimal, FieldError> {
    match quantity {
        None => Err(FieldError::missing("quantity")),
        Some(q) if q <= Decimal::ZERO => Err(FieldError::new(
            "quantity",
            "quantity must be greater than 0",
        )),
        Some(q) => Ok(q),
    }
}

/// Germination is a percentage
pub fn validate_germination(germination: Decimal) -> Result<(), FieldError> {
    if germination < Decimal::ZERO || germination > Decimal::from(100) {
        return Err(FieldError::new(
            "germination",
            "germination must be between 0 and 100",
        ));
    }
    Ok(())
}

pub fn validate_lot_area(area: Decimal) -> Result<(), FieldError> {
    if area < Decimal::ZERO {
        return Err(FieldError::new("totalLotArea", "totalLotArea cannot be negative"));
    }
    Ok(())
}

// ============================================================================
// Record Validations
// ============================================================================

fn required_text(errors: &mut Vec<FieldError>, field: &str, value: &Option<String>) -> Option<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Some(v.to_string()),
        _ => {
            errors.push(FieldError::missing(field));
            None
        }
    }
}

fn required_date(errors: &mut Vec<FieldError>, field: &str, value: &Option<String>) -> Option<NaiveDate> {
    let raw = required_text(errors, field, value)?;
    let date = parse_date(&raw);
    if date.is_none() {
        errors.push(FieldError::new(field, format!("invalid date '{}'", raw)));
    }
    date
}

fn required_decimal(errors: &mut Vec<FieldError>, field: &str, value: Option<Decimal>) -> Option<Decimal> {
    if value.is_none() {
        errors.push(FieldError::missing(field));
    }
    value
}

/// Validate a new harvest batch, collecting every field error
pub fn validate_new_harvest(input: &NewHarvestBatch) -> Result<HarvestBatchDraft, Vec<FieldError>> {
    let mut errors = Vec::new();

    let crop = required_text(&mut errors, "crop", &input.crop).and_then(|name| {
        let crop = Crop::from_name(&name);
        if crop.is_none() {
            errors.push(FieldError::new("crop", format!("unknown crop '{}'", name)));
        }
        crop
    });
    let variety = required_text(&mut errors, "variety", &input.variety);
    let classification =
        required_text(&mut errors, "classification", &input.classification).and_then(|name| {
            let class = Classification::from_name(&name);
            if class.is_none() {
                errors.push(FieldError::new(
                    "classification",
                    format!("unknown classification '{}'", name),
                ));
            }
            class
        });
    let date_planted = required_date(&mut errors, "datePlanted", &input.date_planted);
    let date_harvested = required_date(&mut errors, "dateHarvested", &input.date_harvested);
    let area = required_text(&mut errors, "area", &input.area);

    let total_lot_area = required_decimal(&mut errors, "totalLotArea", input.total_lot_area);
    if let Some(Err(e)) = total_lot_area.map(validate_lot_area) {
        errors.push(e);
    }
    let germination = required_decimal(&mut errors, "germination", input.germination);
    if let Some(Err(e)) = germination.map(validate_germination) {
        errors.push(e);
    }
    let in_quantity = required_decimal(&mut errors, "inQuantity", input.in_quantity);
    if in_quantity.is_some_and(|q| q <= Decimal::ZERO) {
        errors.push(FieldError::new("inQuantity", "inQuantity must be greater than 0"));
    }

    let seed_batch_id = input
        .seed_batch_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string);

    match (
        crop,
        variety,
        classification,
        date_planted,
        date_harvested,
        area,
        total_lot_area,
        germination,
        in_quantity,
    ) {
        (
            Some(crop),
            Some(variety),
            Some(classification),
            Some(date_planted),
            Some(date_harvested),
            Some(area),
            Some(total_lot_area),
            Some(germination),
            Some(in_quantity),
        ) if errors.is_empty() => Ok(HarvestBatchDraft {
            seed_batch_id,
            crop,
            variety,
            classification,
            date_planted,
            date_harvested,
            area,
            total_lot_area,
            germination,
            in_quantity,
            remarks: input.remarks.clone().unwrap_or_default(),
        }),
        _ => Err(errors),
    }
}

/// Validate the descriptive fields of a new distribution.
///
/// The quantity is carried through unchecked; it is validated against the
/// batch inside the ledger transaction.
pub fn validate_new_distribution(input: &NewDistribution) -> Result<DistributionDraft, Vec<FieldError>> {
    let mut errors = Vec::new();

    let date = required_date(&mut errors, "date", &input.date);
    let seed_batch_id = required_text(&mut errors, "seedBatchId", &input.seed_batch_id);
    let mode = required_text(&mut errors, "mode", &input.mode).and_then(|name| {
        let mode = DistributionMode::from_name(&name);
        if mode.is_none() {
            errors.push(FieldError::new("mode", format!("unknown mode '{}'", name)));
        }
        mode
    });

    let recipient = match mode {
        Some(DistributionMode::Exportation) => {
            let recipient_name = required_text(&mut errors, "recipientName", &input.recipient_name);
            let affiliation = required_text(&mut errors, "affiliation", &input.affiliation);
            reject_foreign(&mut errors, DistributionMode::Exportation, "requestedBy", &input.requested_by);
            reject_foreign(&mut errors, DistributionMode::Exportation, "area", &input.area);
            match (recipient_name, affiliation) {
                (Some(recipient_name), Some(affiliation)) => Some(Recipient::Exportation {
                    recipient_name,
                    affiliation,
                    contact_number: input
                        .contact_number
                        .as_deref()
                        .map(str::trim)
                        .unwrap_or_default()
                        .to_string(),
                }),
                _ => None,
            }
        }
        Some(DistributionMode::Breeding) => {
            let requested_by = required_text(&mut errors, "requestedBy", &input.requested_by);
            let area = required_text(&mut errors, "area", &input.area);
            reject_foreign(&mut errors, DistributionMode::Breeding, "recipientName", &input.recipient_name);
            reject_foreign(&mut errors, DistributionMode::Breeding, "affiliation", &input.affiliation);
            reject_foreign(&mut errors, DistributionMode::Breeding, "contactNumber", &input.contact_number);
            match (requested_by, area) {
                (Some(requested_by), Some(area)) => Some(Recipient::Breeding { requested_by, area }),
                _ => None,
            }
        }
        None => None,
    };

    match (date, seed_batch_id, recipient) {
        (Some(date), Some(seed_batch_id), Some(recipient)) if errors.is_empty() => {
            Ok(DistributionDraft {
                date,
                seed_batch_id,
                quantity: input.quantity,
                purpose: input.purpose.as_deref().map(str::trim).unwrap_or_default().to_string(),
                recipient,
                remarks: input.remarks.clone().unwrap_or_default(),
            })
        }
        _ => Err(errors),
    }
}

// ============================================================================
// Import Normalisation
// ============================================================================

/// Capitalise the first letter of each word and lowercase the rest
pub fn capitalize_words(value: &str) -> String {
    value
        .to_lowercase()
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
