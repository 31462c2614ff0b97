//! Harvest batch models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::LogEntry;
use crate::batch_id::derive_batch_id;
use crate::types::FieldError;
use crate::validation::{parse_date, validate_germination, validate_lot_area};

/// Crops tracked by the research unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Crop {
    Soybean,
    Mungbean,
    Peanut,
}

impl Crop {
    pub const ALL: [Crop; 3] = [Crop::Soybean, Crop::Mungbean, Crop::Peanut];

    pub fn as_str(&self) -> &'static str {
        match self {
            Crop::Soybean => "Soybean",
            Crop::Mungbean => "Mungbean",
            Crop::Peanut => "Peanut",
        }
    }

    /// Two-letter code used in seed batch identifiers
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Crop::Soybean => "SB",
            Crop::Mungbean => "MB",
            Crop::Peanut => "PN",
        }
    }

    /// Case-insensitive lookup by display name
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|crop| crop.as_str().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for Crop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seed class in the certification chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Nucleus,
    Breeder,
    Foundation,
    Registered,
    Certified,
}

impl Classification {
    pub const ALL: [Classification; 5] = [
        Classification::Nucleus,
        Classification::Breeder,
        Classification::Foundation,
        Classification::Registered,
        Classification::Certified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Nucleus => "Nucleus",
            Classification::Breeder => "Breeder",
            Classification::Foundation => "Foundation",
            Classification::Registered => "Registered",
            Classification::Certified => "Certified",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|class| class.as_str().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Availability state of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BatchStatus {
    #[default]
    Active,
    Depleted,
    /// Manually shelved; shown to staff as "Storage"
    #[serde(alias = "Storage")]
    Archived,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Active => "Active",
            BatchStatus::Depleted => "Depleted",
            BatchStatus::Archived => "Archived",
        }
    }

    /// Label shown in the inventory views
    pub fn label(&self) -> &'static str {
        match self {
            BatchStatus::Archived => "Storage",
            other => other.as_str(),
        }
    }

    pub fn is_archival(&self) -> bool {
        matches!(self, BatchStatus::Archived)
    }

    /// Status after a balance change. Archival states are never overwritten.
    pub fn recompute(self, balance: Decimal) -> Self {
        if self.is_archival() {
            self
        } else if balance > Decimal::ZERO {
            BatchStatus::Active
        } else {
            BatchStatus::Depleted
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One harvested lot of seed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestBatch {
    pub id: Uuid,
    /// Business key, e.g. "2023-09-SB-TIWALA_6"
    pub seed_batch_id: String,
    pub crop: Crop,
    pub variety: String,
    pub classification: Classification,
    pub date_planted: Option<NaiveDate>,
    pub date_harvested: Option<NaiveDate>,
    pub area: String,
    pub total_lot_area: Decimal,
    /// Germination rate in percent
    pub germination: Decimal,
    pub in_quantity: Decimal,
    pub out_quantity: Decimal,
    pub balance: Decimal,
    pub status: BatchStatus,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    #[serde(default)]
    pub remarks: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl HarvestBatch {
    /// Position of the audit entry written for a distribution
    pub fn log_index(&self, distribution_id: Uuid) -> Option<usize> {
        self.logs
            .iter()
            .position(|log| log.distribution_id == distribution_id)
    }

    pub fn log_for(&self, distribution_id: Uuid) -> Option<&LogEntry> {
        self.logs
            .iter()
            .find(|log| log.distribution_id == distribution_id)
    }

    /// `balance == inQuantity - outQuantity`
    pub fn is_balanced(&self) -> bool {
        self.balance == self.in_quantity - self.out_quantity
    }

    /// Sum of outflow magnitudes recorded in the audit log
    pub fn logged_outflow(&self) -> Decimal {
        self.logs.iter().map(LogEntry::outflow).sum()
    }
}

/// Raw input for recording a new harvest batch
///
/// Every field is optional so that validation can report all missing
/// fields at once instead of failing on the first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHarvestBatch {
    /// Derived from harvest date, crop and variety when absent
    pub seed_batch_id: Option<String>,
    pub crop: Option<String>,
    pub variety: Option<String>,
    pub classification: Option<String>,
    pub date_planted: Option<String>,
    pub date_harvested: Option<String>,
    pub area: Option<String>,
    pub total_lot_area: Option<Decimal>,
    pub germination: Option<Decimal>,
    pub in_quantity: Option<Decimal>,
    pub remarks: Option<String>,
}

/// A harvest batch input that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestBatchDraft {
    pub seed_batch_id: Option<String>,
    pub crop: Crop,
    pub variety: String,
    pub classification: Classification,
    pub date_planted: NaiveDate,
    pub date_harvested: NaiveDate,
    pub area: String,
    pub total_lot_area: Decimal,
    pub germination: Decimal,
    pub in_quantity: Decimal,
    pub remarks: String,
}

impl HarvestBatchDraft {
    /// Business key the batch will be stored under
    pub fn seed_batch_id(&self) -> String {
        match &self.seed_batch_id {
            Some(id) => id.clone(),
            None => derive_batch_id(self.date_harvested, self.crop.as_str(), &self.variety),
        }
    }

    /// Materialize the stored record with a full balance and empty log
    pub fn into_batch(self, id: Uuid, created_by: &str, created_at: DateTime<Utc>) -> HarvestBatch {
        let seed_batch_id = self.seed_batch_id();
        HarvestBatch {
            id,
            seed_batch_id,
            crop: self.crop,
            variety: self.variety,
            classification: self.classification,
            date_planted: Some(self.date_planted),
            date_harvested: Some(self.date_harvested),
            area: self.area,
            total_lot_area: self.total_lot_area,
            germination: self.germination,
            in_quantity: self.in_quantity,
            out_quantity: Decimal::ZERO,
            balance: self.in_quantity,
            status: BatchStatus::Active,
            logs: Vec::new(),
            remarks: self.remarks,
            created_by: created_by.to_string(),
            created_at,
        }
    }
}

/// Partial update of a harvest batch
///
/// `in_quantity`, `out_quantity` and `balance` form the bulk-correction
/// path; they are normally owned by distribution operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestBatchPatch {
    pub seed_batch_id: Option<String>,
    pub crop: Option<String>,
    pub variety: Option<String>,
    pub classification: Option<String>,
    pub date_planted: Option<String>,
    pub date_harvested: Option<String>,
    pub area: Option<String>,
    pub total_lot_area: Option<Decimal>,
    pub germination: Option<Decimal>,
    pub remarks: Option<String>,
    pub status: Option<BatchStatus>,
    pub in_quantity: Option<Decimal>,
    pub out_quantity: Option<Decimal>,
    pub balance: Option<Decimal>,
}

impl HarvestBatchPatch {
    /// New business key, if the patch changes it
    pub fn renamed_seed_batch_id(&self, current: &str) -> Option<String> {
        self.seed_batch_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty() && *id != current)
            .map(str::to_string)
    }

    pub fn corrects_quantities(&self) -> bool {
        self.in_quantity.is_some() || self.out_quantity.is_some() || self.balance.is_some()
    }

    /// Apply the patch to a copy of `batch`, preserving absent fields
    pub fn apply_to(&self, batch: &HarvestBatch) -> Result<HarvestBatch, Vec<FieldError>> {
        let mut errors = Vec::new();
        let mut next = batch.clone();

        if let Some(id) = &self.seed_batch_id {
            let id = id.trim();
            if id.is_empty() {
                errors.push(FieldError::new("seedBatchId", "seedBatchId cannot be empty"));
            } else {
                next.seed_batch_id = id.to_string();
            }
        }
        if let Some(crop) = &self.crop {
            match Crop::from_name(crop) {
                Some(crop) => next.crop = crop,
                None => errors.push(FieldError::new("crop", format!("unknown crop '{}'", crop))),
            }
        }
        if let Some(variety) = &self.variety {
            if variety.trim().is_empty() {
                errors.push(FieldError::new("variety", "variety cannot be empty"));
            } else {
                next.variety = variety.trim().to_string();
            }
        }
        if let Some(class) = &self.classification {
            match Classification::from_name(class) {
                Some(class) => next.classification = class,
                None => errors.push(FieldError::new(
                    "classification",
                    format!("unknown classification '{}'", class),
                )),
            }
        }
        if let Some(raw) = &self.date_planted {
            match parse_date(raw) {
                Some(date) => next.date_planted = Some(date),
                None => errors.push(FieldError::new("datePlanted", format!("invalid date '{}'", raw))),
            }
        }
        if let Some(raw) = &self.date_harvested {
            match parse_date(raw) {
                Some(date) => next.date_harvested = Some(date),
                None => errors.push(FieldError::new(
                    "dateHarvested",
                    format!("invalid date '{}'", raw),
                )),
            }
        }
        if let Some(area) = &self.area {
            next.area = area.trim().to_string();
        }
        if let Some(lot_area) = self.total_lot_area {
            match validate_lot_area(lot_area) {
                Ok(()) => next.total_lot_area = lot_area,
                Err(e) => errors.push(e),
            }
        }
        if let Some(germination) = self.germination {
            match validate_germination(germination) {
                Ok(()) => next.germination = germination,
                Err(e) => errors.push(e),
            }
        }
        if let Some(remarks) = &self.remarks {
            next.remarks = remarks.clone();
        }
        if let Some(status) = self.status {
            next.status = status;
        }

        if self.corrects_quantities() {
            self.correct_quantities(&mut next, &mut errors);
        }

        if errors.is_empty() {
            Ok(next)
        } else {
            Err(errors)
        }
    }

    /// Re-establish `balance == inQuantity - outQuantity` from whichever
    /// figures the patch supplied.
    fn correct_quantities(&self, next: &mut HarvestBatch, errors: &mut Vec<FieldError>) {
        let in_quantity = self.in_quantity.unwrap_or(next.in_quantity);
        let (out_quantity, balance) = match (self.out_quantity, self.balance) {
            (Some(out), Some(balance)) => {
                if in_quantity - out != balance {
                    errors.push(FieldError::new(
                        "balance",
                        "balance must equal inQuantity - outQuantity",
                    ));
                    return;
                }
                (out, balance)
            }
            (Some(out), None) => (out, in_quantity - out),
            (None, Some(balance)) => (in_quantity - balance, balance),
            (None, None) => (next.out_quantity, in_quantity - next.out_quantity),
        };

        if in_quantity <= Decimal::ZERO {
            errors.push(FieldError::new("inQuantity", "inQuantity must be greater than 0"));
        }
        if out_quantity < Decimal::ZERO {
            errors.push(FieldError::new("outQuantity", "outQuantity cannot be negative"));
        }
        if balance < Decimal::ZERO {
            errors.push(FieldError::new("balance", "balance cannot be negative"));
        }

        next.in_quantity = in_quantity;
        next.out_quantity = out_quantity;
        next.balance = balance;
        if self.status.is_none() {
            next.status = next.status.recompute(balance);
        }
    }
}
