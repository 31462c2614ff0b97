//! Harvest batch HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use shared::{BatchStatus, Crop, HarvestBatchPatch, NewHarvestBatch};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::HarvestService;
use crate::store::BatchFilter;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HarvestQuery {
    pub crop: Option<String>,
    pub status: Option<String>,
}

impl HarvestQuery {
    fn into_filter(self) -> AppResult<BatchFilter> {
        let crop = match self.crop.as_deref() {
            Some(name) => Some(
                Crop::from_name(name)
                    .ok_or_else(|| AppError::validation("crop", format!("unknown crop '{}'", name)))?,
            ),
            None => None,
        };
        let status = match self.status.as_deref() {
            Some(name) => Some(parse_status(name)?),
            None => None,
        };
        Ok(BatchFilter { crop, status })
    }
}

fn parse_status(name: &str) -> AppResult<BatchStatus> {
    match name.trim().to_ascii_lowercase().as_str() {
        "active" => Ok(BatchStatus::Active),
        "depleted" => Ok(BatchStatus::Depleted),
        "archived" | "storage" => Ok(BatchStatus::Archived),
        _ => Err(AppError::validation("status", format!("unknown status '{}'", name))),
    }
}

fn service(state: &AppState) -> HarvestService {
    HarvestService::new(state.store.clone(), state.transaction_config())
}

/// List harvest batches, newest first
pub async fn list_harvests(
    State(state): State<AppState>,
    Query(query): Query<HarvestQuery>,
) -> AppResult<impl IntoResponse> {
    let filter = query.into_filter()?;
    let harvests = service(&state).list_harvest_batches(&filter).await?;
    Ok(Json(serde_json::json!({ "harvests": harvests })))
}

/// Record a new harvest batch
pub async fn create_harvest(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<NewHarvestBatch>,
) -> AppResult<impl IntoResponse> {
    let batch = service(&state)
        .create_harvest_batch(input, user.created_by())
        .await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

pub async fn get_harvest(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let batch = service(&state).get_harvest_batch(id).await?;
    Ok(Json(batch))
}

/// Update a harvest batch
pub async fn update_harvest(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<HarvestBatchPatch>,
) -> AppResult<impl IntoResponse> {
    let batch = service(&state).update_harvest_batch(id, patch).await?;
    Ok(Json(batch))
}

/// Delete a harvest batch and its distributions
pub async fn delete_harvest(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let deletion = service(&state).delete_harvest_batch(id).await?;
    Ok(Json(deletion))
}

/// Fetch a batch by its seed batch id; `null` when there is none
pub async fn get_harvest_by_batch_id(
    State(state): State<AppState>,
    Path(seed_batch_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let batch = service(&state).fetch_batch_by_seed_batch_id(&seed_batch_id).await?;
    Ok(Json(batch))
}
