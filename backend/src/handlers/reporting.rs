//! Reporting handlers for the dashboard

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use shared::{CropTotal, DashboardStats, MonthlyTotal};

use crate::error::AppResult;
use crate::services::reporting::{RecentActivity, ReportingService, DEFAULT_RECENT_LIMIT};
use crate::services::LedgerViolation;
use crate::AppState;

#[derive(Deserialize)]
pub struct TrendQuery {
    /// Window end; defaults to the current UTC date
    pub today: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

fn service(state: &AppState) -> ReportingService {
    ReportingService::new(state.store.clone())
}

fn today(query: &TrendQuery) -> NaiveDate {
    query.today.unwrap_or_else(|| Utc::now().date_naive())
}

pub async fn get_dashboard(State(state): State<AppState>) -> AppResult<Json<DashboardStats>> {
    Ok(Json(service(&state).dashboard_stats().await?))
}

pub async fn get_crop_stats(State(state): State<AppState>) -> AppResult<Json<Vec<CropTotal>>> {
    Ok(Json(service(&state).crop_stats().await?))
}

pub async fn get_harvest_trends(
    State(state): State<AppState>,
    Query(query): Query<TrendQuery>,
) -> AppResult<Json<Vec<MonthlyTotal>>> {
    Ok(Json(service(&state).harvest_trends(today(&query)).await?))
}

pub async fn get_distribution_trends(
    State(state): State<AppState>,
    Query(query): Query<TrendQuery>,
) -> AppResult<Json<Vec<MonthlyTotal>>> {
    Ok(Json(service(&state).distribution_trends(today(&query)).await?))
}

pub async fn get_recent_activity(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> AppResult<Json<RecentActivity>> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    Ok(Json(service(&state).recent_activity(limit).await?))
}

/// Cross-record consistency audit; an empty list means the ledger is sound
pub async fn get_consistency_report(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<LedgerViolation>>> {
    Ok(Json(service(&state).consistency().await?))
}
