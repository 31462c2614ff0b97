//! Seed distribution models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::FieldError;
use crate::validation::{parse_date, validate_quantity};

/// Distribution sub-type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionMode {
    /// Seed leaving the unit for an external recipient
    Exportation,
    /// Seed drawn for internal breeding work
    Breeding,
}

impl DistributionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionMode::Exportation => "exportation",
            DistributionMode::Breeding => "breeding",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "exportation" => Some(DistributionMode::Exportation),
            "breeding" => Some(DistributionMode::Breeding),
            _ => None,
        }
    }
}

impl std::fmt::Display for DistributionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mode-specific fields of a distribution, tagged by `mode` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Recipient {
    #[serde(rename_all = "camelCase")]
    Exportation {
        recipient_name: String,
        affiliation: String,
        #[serde(default)]
        contact_number: String,
    },
    #[serde(rename_all = "camelCase")]
    Breeding { requested_by: String, area: String },
}

impl Recipient {
    pub fn mode(&self) -> DistributionMode {
        match self {
            Recipient::Exportation { .. } => DistributionMode::Exportation,
            Recipient::Breeding { .. } => DistributionMode::Breeding,
        }
    }
}

/// One outflow of seed from a harvest batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub id: Uuid,
    pub date: Option<NaiveDate>,
    /// Business key of the batch the seed was drawn from
    pub seed_batch_id: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub purpose: String,
    #[serde(flatten)]
    pub recipient: Recipient,
    #[serde(default)]
    pub remarks: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Distribution {
    pub fn mode(&self) -> DistributionMode {
        self.recipient.mode()
    }
}

/// Raw input for recording a distribution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDistribution {
    pub date: Option<String>,
    pub seed_batch_id: Option<String>,
    pub quantity: Option<Decimal>,
    pub purpose: Option<String>,
    pub mode: Option<String>,
    pub recipient_name: Option<String>,
    pub affiliation: Option<String>,
    pub contact_number: Option<String>,
    pub requested_by: Option<String>,
    pub area: Option<String>,
    pub remarks: Option<String>,
}

/// A distribution input that passed field validation.
///
/// The quantity is checked inside the ledger transaction, after the batch
/// has been resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionDraft {
    pub date: NaiveDate,
    pub seed_batch_id: String,
    pub quantity: Option<Decimal>,
    pub purpose: String,
    pub recipient: Recipient,
    pub remarks: String,
}

impl DistributionDraft {
    pub fn into_distribution(
        self,
        id: Uuid,
        quantity: Decimal,
        created_by: &str,
        created_at: DateTime<Utc>,
    ) -> Distribution {
        Distribution {
            id,
            date: Some(self.date),
            seed_batch_id: self.seed_batch_id,
            quantity,
            purpose: self.purpose,
            recipient: self.recipient,
            remarks: self.remarks,
            created_by: created_by.to_string(),
            created_at,
        }
    }
}

/// Partial update of a distribution. The batch reference and mode are fixed
/// at creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionPatch {
    pub date: Option<String>,
    pub quantity: Option<Decimal>,
    pub purpose: Option<String>,
    pub mode: Option<String>,
    pub recipient_name: Option<String>,
    pub affiliation: Option<String>,
    pub contact_number: Option<String>,
    pub requested_by: Option<String>,
    pub area: Option<String>,
    pub remarks: Option<String>,
}

impl DistributionPatch {
    /// Apply the patch to a copy of `current`, preserving absent fields
    pub fn apply_to(&self, current: &Distribution) -> Result<Distribution, Vec<FieldError>> {
        let mut errors = Vec::new();
        let mut next = current.clone();

        if let Some(raw) = &self.mode {
            match DistributionMode::from_name(raw) {
                Some(mode) if mode == current.mode() => {}
                Some(mode) => errors.push(FieldError::new(
                    "mode",
                    format!("cannot change a {} distribution to {}", current.mode(), mode),
                )),
                None => errors.push(FieldError::new("mode", format!("unknown mode '{}'", raw))),
            }
        }
        if let Some(raw) = &self.date {
            match parse_date(raw) {
                Some(date) => next.date = Some(date),
                None => errors.push(FieldError::new("date", format!("invalid date '{}'", raw))),
            }
        }
        if self.quantity.is_some() {
            match validate_quantity(self.quantity) {
                Ok(quantity) => next.quantity = quantity,
                Err(e) => errors.push(e),
            }
        }
        if let Some(purpose) = &self.purpose {
            next.purpose = purpose.trim().to_string();
        }
        if let Some(remarks) = &self.remarks {
            next.remarks = remarks.clone();
        }

        match &mut next.recipient {
            Recipient::Exportation {
                recipient_name,
                affiliation,
                contact_number,
            } => {
                patch_required(&mut errors, "recipientName", &self.recipient_name, recipient_name);
                patch_required(&mut errors, "affiliation", &self.affiliation, affiliation);
                if let Some(contact) = &self.contact_number {
                    *contact_number = contact.trim().to_string();
                }
                reject_foreign(&mut errors, DistributionMode::Exportation, "requestedBy", &self.requested_by);
                reject_foreign(&mut errors, DistributionMode::Exportation, "area", &self.area);
            }
            Recipient::Breeding { requested_by, area } => {
                patch_required(&mut errors, "requestedBy", &self.requested_by, requested_by);
                patch_required(&mut errors, "area", &self.area, area);
                reject_foreign(&mut errors, DistributionMode::Breeding, "recipientName", &self.recipient_name);
                reject_foreign(&mut errors, DistributionMode::Breeding, "affiliation", &self.affiliation);
                reject_foreign(&mut errors, DistributionMode::Breeding, "contactNumber", &self.contact_number);
            }
        }

        if errors.is_empty() {
            Ok(next)
        } else {
            Err(errors)
        }
    }
}

fn patch_required(
    errors: &mut Vec<FieldError>,
    field: &str,
    value: &Option<String>,
    target: &mut String,
) {
    if let Some(value) = value {
        if value.trim().is_empty() {
            errors.push(FieldError::new(field, format!("{} cannot be empty", field)));
        } else {
            *target = value.trim().to_string();
        }
    }
}

/// Fields of the other mode are accepted only when blank.
pub(crate) fn reject_foreign(
    errors: &mut Vec<FieldError>,
    mode: DistributionMode,
    field: &str,
    value: &Option<String>,
) {
    if value.as_deref().is_some_and(|v| !v.trim().is_empty()) {
        errors.push(FieldError::new(
            field,
            format!("{} does not apply to {} distributions", field, mode),
        ));
    }
}
