//! Distribution HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use shared::{DistributionMode, DistributionPatch, NewDistribution};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::DistributionService;
use crate::store::DistributionFilter;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionQuery {
    pub seed_batch_id: Option<String>,
    pub mode: Option<String>,
}

fn service(state: &AppState) -> DistributionService {
    DistributionService::new(state.store.clone(), state.transaction_config())
}

/// List distributions, newest first by date
pub async fn list_distributions(
    State(state): State<AppState>,
    Query(query): Query<DistributionQuery>,
) -> AppResult<impl IntoResponse> {
    let mode = match query.mode.as_deref() {
        Some(name) => Some(
            DistributionMode::from_name(name)
                .ok_or_else(|| AppError::validation("mode", format!("unknown mode '{}'", name)))?,
        ),
        None => None,
    };
    let filter = DistributionFilter {
        seed_batch_id: query.seed_batch_id,
        mode,
    };
    let distributions = service(&state).list_distributions(&filter).await?;
    Ok(Json(serde_json::json!({ "distributions": distributions })))
}

/// Record a distribution against its batch
pub async fn create_distribution(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<NewDistribution>,
) -> AppResult<impl IntoResponse> {
    let distribution = service(&state)
        .create_distribution(input, user.created_by())
        .await?;
    Ok((StatusCode::CREATED, Json(distribution)))
}

pub async fn get_distribution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let distribution = service(&state).get_distribution(id).await?;
    Ok(Json(distribution))
}

pub async fn update_distribution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<DistributionPatch>,
) -> AppResult<impl IntoResponse> {
    let distribution = service(&state).update_distribution(id, patch).await?;
    Ok(Json(distribution))
}

pub async fn delete_distribution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let deletion = service(&state).delete_distribution(id).await?;
    Ok(Json(deletion))
}
