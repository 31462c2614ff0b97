//! Dashboard figures and trend charts
//!
//! The aggregations are plain functions over a snapshot of the ledger.
//! Records missing the date or crop a figure needs are left out of that
//! figure.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{CropTotal, DashboardStats, Distribution, HarvestBatch, MonthlyTotal};

use super::ledger::{check_ledger, LedgerViolation};
use crate::error::AppResult;
use crate::store::{BatchFilter, DistributionFilter, LedgerStore};

pub const DEFAULT_RECENT_LIMIT: usize = 5;

/// Trend charts look back this many calendar months from today
pub const TREND_WINDOW_MONTHS: u32 = 6;

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn month_name(date: NaiveDate) -> &'static str {
    MONTH_NAMES[date.month0() as usize]
}

pub fn dashboard_stats(batches: &[HarvestBatch]) -> DashboardStats {
    let total_seeds = batches.iter().map(|b| b.balance).sum();

    let recent_harvest = batches
        .iter()
        .filter(|b| b.date_harvested.is_some())
        .max_by_key(|b| b.date_harvested)
        .cloned();

    let mut crop_quantities: BTreeMap<String, Decimal> = BTreeMap::new();
    for batch in batches {
        *crop_quantities.entry(batch.crop.to_string()).or_default() += batch.balance;
    }

    // Only a crop with stock on hand can be the most abundant
    let mut most_abundant_crop = None;
    let mut max_quantity = Decimal::ZERO;
    for (crop, quantity) in &crop_quantities {
        if *quantity > max_quantity {
            most_abundant_crop = Some(crop.clone());
            max_quantity = *quantity;
        }
    }

    DashboardStats {
        total_seeds,
        recent_harvest,
        most_abundant_crop,
        crop_quantities,
    }
}

/// Balance per crop, in the order crops first appear in `batches`
pub fn crop_stats(batches: &[HarvestBatch]) -> Vec<CropTotal> {
    let mut totals: Vec<CropTotal> = Vec::new();
    for batch in batches {
        let crop = batch.crop.to_string();
        match totals.iter_mut().find(|t| t.crop == crop) {
            Some(total) => total.total += batch.balance,
            None => totals.push(CropTotal {
                crop,
                total: batch.balance,
            }),
        }
    }
    totals
}

/// Sum `(date, quantity)` points into month buckets, oldest month first.
/// Points outside `[today - 6 months, today]` are ignored.
fn monthly_totals(points: impl Iterator<Item = (NaiveDate, Decimal)>, today: NaiveDate) -> Vec<MonthlyTotal> {
    let window_start = today
        .checked_sub_months(Months::new(TREND_WINDOW_MONTHS))
        .unwrap_or(NaiveDate::MIN);

    let mut points: Vec<(NaiveDate, Decimal)> = points
        .filter(|(date, _)| *date >= window_start && *date <= today)
        .collect();
    points.sort_by_key(|(date, _)| *date);

    let mut buckets: Vec<((i32, u32), MonthlyTotal)> = Vec::new();
    for (date, quantity) in points {
        let key = (date.year(), date.month());
        match buckets.last_mut() {
            Some((last, total)) if *last == key => total.total += quantity,
            _ => buckets.push((
                key,
                MonthlyTotal {
                    month: month_name(date).to_string(),
                    total: quantity,
                },
            )),
        }
    }
    buckets.into_iter().map(|(_, total)| total).collect()
}

/// Harvested quantity per month over the trailing window
pub fn harvest_trends(batches: &[HarvestBatch], today: NaiveDate) -> Vec<MonthlyTotal> {
    monthly_totals(
        batches
            .iter()
            .filter_map(|b| b.date_harvested.map(|date| (date, b.in_quantity))),
        today,
    )
}

/// Distributed quantity per month over the trailing window
pub fn distribution_trends(distributions: &[Distribution], today: NaiveDate) -> Vec<MonthlyTotal> {
    monthly_totals(
        distributions
            .iter()
            .filter_map(|d| d.date.map(|date| (date, d.quantity))),
        today,
    )
}

/// Latest batches and distributions for the dashboard feed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    pub harvests: Vec<HarvestBatch>,
    pub distributions: Vec<Distribution>,
}

/// Read-side service assembling reports from a store snapshot
#[derive(Clone)]
pub struct ReportingService {
    store: Arc<dyn LedgerStore>,
}

impl ReportingService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    async fn batches(&self) -> AppResult<Vec<HarvestBatch>> {
        Ok(self.store.list_batches(&BatchFilter::default()).await?)
    }

    async fn distributions(&self) -> AppResult<Vec<Distribution>> {
        Ok(self.store.list_distributions(&DistributionFilter::default()).await?)
    }

    pub async fn dashboard_stats(&self) -> AppResult<DashboardStats> {
        Ok(dashboard_stats(&self.batches().await?))
    }

    pub async fn crop_stats(&self) -> AppResult<Vec<CropTotal>> {
        Ok(crop_stats(&self.batches().await?))
    }

    pub async fn harvest_trends(&self, today: NaiveDate) -> AppResult<Vec<MonthlyTotal>> {
        Ok(harvest_trends(&self.batches().await?, today))
    }

    pub async fn distribution_trends(&self, today: NaiveDate) -> AppResult<Vec<MonthlyTotal>> {
        Ok(distribution_trends(&self.distributions().await?, today))
    }

    /// Newest batches by creation time and newest distributions by date
    pub async fn recent_activity(&self, limit: usize) -> AppResult<RecentActivity> {
        let mut harvests = self.batches().await?;
        harvests.truncate(limit);
        let mut distributions = self.distributions().await?;
        distributions.truncate(limit);
        Ok(RecentActivity {
            harvests,
            distributions,
        })
    }

    /// Cross-record consistency audit over the whole ledger
    pub async fn consistency(&self) -> AppResult<Vec<LedgerViolation>> {
        let batches = self.batches().await?;
        let distributions = self.distributions().await?;
        let violations = check_ledger(&batches, &distributions);
        if !violations.is_empty() {
            tracing::error!(count = violations.len(), "ledger consistency check failed");
        }
        Ok(violations)
    }
}
