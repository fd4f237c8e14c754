// libs/availability-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{
    CreateWindowRequest, UpdateWindowRequest, SlotQuery, AvailabilityError,
};
use crate::services::{SlotGeneratorService, WindowManagementService};

fn map_error(e: AvailabilityError) -> AppError {
    match e {
        AvailabilityError::WindowNotFound => {
            AppError::NotFound("Availability window not found".to_string())
        }
        AvailabilityError::ValidationError(msg) => AppError::ValidationError(msg),
        AvailabilityError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn create_window(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CreateWindowRequest>,
) -> Result<Json<Value>, AppError> {
    let service = WindowManagementService::new(&state);

    let window = service.create_window(doctor_id, request, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "window": window,
        "message": "Availability window created"
    })))
}

#[axum::debug_handler]
pub async fn list_windows(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = WindowManagementService::new(&state);

    let windows = service.list_windows(doctor_id, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "windows": windows
    })))
}

#[axum::debug_handler]
pub async fn update_window(
    State(state): State<Arc<AppConfig>>,
    Path(window_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<UpdateWindowRequest>,
) -> Result<Json<Value>, AppError> {
    let service = WindowManagementService::new(&state);

    let window = service.update_window(window_id, request, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "window": window,
        "message": "Availability window updated"
    })))
}

#[axum::debug_handler]
pub async fn deactivate_window(
    State(state): State<Arc<AppConfig>>,
    Path(window_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = WindowManagementService::new(&state);

    service.deactivate_window(window_id, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Availability window deactivated"
    })))
}

/// Slot calendar for one doctor and date. Always 200: an empty list is the
/// normal rendering for "no availability" and for store failures alike.
#[axum::debug_handler]
pub async fn get_slots(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = SlotGeneratorService::new(&state);

    let slots = service.generate_slots(doctor_id, query.date, auth.token()).await;

    Ok(Json(json!({
        "success": true,
        "date": query.date,
        "slots": slots
    })))
}
