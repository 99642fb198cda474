//! Farm management HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::error::AppResult;
use crate::services::farm::{
    CreateFarmInput, CreatedFarm, FarmService, FarmWithCrops, ListFarmsQuery, UpdateFarmInput,
};
use crate::AppState;

/// Create a new farm, optionally with crop sub-records
pub async fn create_farm(
    State(state): State<AppState>,
    Json(input): Json<CreateFarmInput>,
) -> AppResult<(StatusCode, Json<CreatedFarm>)> {
    let service = FarmService::new(state.db.clone());
    let created = service.create_farm(input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// List farms with pagination and optional land area / crop type filters
pub async fn list_farms(
    State(state): State<AppState>,
    Query(query): Query<ListFarmsQuery>,
) -> AppResult<Json<Vec<FarmWithCrops>>> {
    let service = FarmService::new(state.db.clone());
    let farms = service.list_farms(query).await?;
    Ok(Json(farms))
}

/// Get a farm by id with its crops
pub async fn get_farm(
    State(state): State<AppState>,
    Path(farm_id): Path<String>,
) -> AppResult<Json<FarmWithCrops>> {
    let service = FarmService::new(state.db.clone());
    let farm = service.get_farm(&farm_id).await?;
    Ok(Json(farm))
}

/// Apply a sparse update to a farm
pub async fn update_farm(
    State(state): State<AppState>,
    Path(farm_id): Path<String>,
    Json(input): Json<UpdateFarmInput>,
) -> AppResult<Json<FarmWithCrops>> {
    let service = FarmService::new(state.db.clone());
    let farm = service.update_farm(&farm_id, input).await?;
    Ok(Json(farm))
}

/// Delete a farm. Its crops are left behind.
pub async fn delete_farm(
    State(state): State<AppState>,
    Path(farm_id): Path<String>,
) -> AppResult<StatusCode> {
    let service = FarmService::new(state.db.clone());
    service.delete_farm(&farm_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
