//! Dashboard and report view models

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::HarvestBatch;

/// Headline figures for the dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Sum of balances across all batches
    pub total_seeds: Decimal,
    pub recent_harvest: Option<HarvestBatch>,
    pub most_abundant_crop: Option<String>,
    pub crop_quantities: BTreeMap<String, Decimal>,
}

/// Balance held for one crop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropTotal {
    pub crop: String,
    pub total: Decimal,
}

/// One calendar-month bucket of a trend chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTotal {
    /// Short month name, e.g. "Sep"
    pub month: String,
    pub total: Decimal,
}
