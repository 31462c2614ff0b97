//! Bulk import of spreadsheet rows
//!
//! Rows arrive already parsed into creation payloads. Each row goes through
//! the normal create operation on its own, so one bad row never blocks the
//! rest of the sheet.

use serde::Serialize;
use shared::{capitalize_words, NewDistribution, NewHarvestBatch};

use super::{DistributionService, HarvestService};

/// A row that could not be imported
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    /// Zero-based position in the submitted sheet
    pub row: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: Vec<SkippedRow>,
}

impl ImportSummary {
    fn skip(&mut self, row: usize, error: String) {
        tracing::warn!(row, %error, "import row skipped");
        self.skipped.push(SkippedRow { row, error });
    }
}

fn capitalized(value: &Option<String>) -> Option<String> {
    value.as_deref().map(capitalize_words)
}

/// Spreadsheet casing normalised the way the data-entry sheets expect
pub fn normalize_harvest_row(row: NewHarvestBatch) -> NewHarvestBatch {
    NewHarvestBatch {
        crop: capitalized(&row.crop),
        variety: capitalized(&row.variety),
        classification: capitalized(&row.classification),
        area: capitalized(&row.area),
        remarks: capitalized(&row.remarks),
        ..row
    }
}

pub fn normalize_distribution_row(row: NewDistribution) -> NewDistribution {
    NewDistribution {
        mode: row.mode.as_deref().map(|m| m.trim().to_lowercase()),
        area: capitalized(&row.area),
        remarks: capitalized(&row.remarks),
        ..row
    }
}

pub struct ImportService {
    harvests: HarvestService,
    distributions: DistributionService,
}

impl ImportService {
    pub fn new(harvests: HarvestService, distributions: DistributionService) -> Self {
        Self {
            harvests,
            distributions,
        }
    }

    pub async fn import_harvests(&self, rows: Vec<NewHarvestBatch>, created_by: &str) -> ImportSummary {
        let mut summary = ImportSummary::default();
        for (index, row) in rows.into_iter().enumerate() {
            match self
                .harvests
                .create_harvest_batch(normalize_harvest_row(row), created_by)
                .await
            {
                Ok(_) => summary.imported += 1,
                Err(e) => summary.skip(index, e.to_string()),
            }
        }
        tracing::info!(
            imported = summary.imported,
            skipped = summary.skipped.len(),
            "harvest import finished"
        );
        summary
    }

    pub async fn import_distributions(
        &self,
        rows: Vec<NewDistribution>,
        created_by: &str,
    ) -> ImportSummary {
        let mut summary = ImportSummary::default();
        for (index, row) in rows.into_iter().enumerate() {
            match self
                .distributions
                .create_distribution(normalize_distribution_row(row), created_by)
                .await
            {
                Ok(_) => summary.imported += 1,
                Err(e) => summary.skip(index, e.to_string()),
            }
        }
        tracing::info!(
            imported = summary.imported,
            skipped = summary.skipped.len(),
            "distribution import finished"
        );
        summary
    }
}
