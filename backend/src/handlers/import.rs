//! Bulk import handlers

use axum::{extract::State, Extension, Json};
use shared::{NewDistribution, NewHarvestBatch};

use crate::middleware::AuthUser;
use crate::services::{DistributionService, HarvestService, ImportService, ImportSummary};
use crate::AppState;

fn service(state: &AppState) -> ImportService {
    let txn = state.transaction_config();
    ImportService::new(
        HarvestService::new(state.store.clone(), txn.clone()),
        DistributionService::new(state.store.clone(), txn),
    )
}

/// Import harvest rows; failed rows are reported, not fatal
pub async fn import_harvests(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(rows): Json<Vec<NewHarvestBatch>>,
) -> Json<ImportSummary> {
    Json(service(&state).import_harvests(rows, user.created_by()).await)
}

pub async fn import_distributions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(rows): Json<Vec<NewDistribution>>,
) -> Json<ImportSummary> {
    Json(service(&state).import_distributions(rows, user.created_by()).await)
}
