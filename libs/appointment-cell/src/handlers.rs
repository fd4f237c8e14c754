// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use serde_json::{json, Value};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{
    BookAppointmentRequest, BookingOutcome, BookingRejection, CancelAppointmentRequest,
    ConfirmAppointmentRequest, DoctorAppointmentsQuery, RejectAppointmentRequest,
    RejectionReason, SchedulingError,
};
use crate::services::{AppointmentLifecycleService, BookingService};

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct ConflictCheckQuery {
    pub doctor_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
}

fn map_error(e: SchedulingError) -> AppError {
    match e {
        SchedulingError::NotFound => {
            AppError::NotFound("Appointment not found".to_string())
        }
        SchedulingError::ValidationError(msg) => AppError::ValidationError(msg),
        SchedulingError::InvalidStatusTransition(status) => {
            AppError::BadRequest(format!("Appointment cannot be modified in current status: {}", status))
        }
        SchedulingError::CancellationWindowClosed => {
            AppError::BadRequest("Only future appointments can be cancelled".to_string())
        }
        SchedulingError::SlotTaken => {
            AppError::Conflict("The requested slot was just taken".to_string())
        }
        SchedulingError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn rejection_response(rejection: BookingRejection) -> (StatusCode, Json<Value>) {
    let status = match rejection.reason {
        RejectionReason::OutsideAvailability => StatusCode::UNPROCESSABLE_ENTITY,
        RejectionReason::SlotConflict => StatusCode::CONFLICT,
    };

    (status, Json(json!({
        "success": false,
        "rejection": rejection
    })))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = BookingService::new(&state);

    let outcome = service.book(request, auth.token()).await
        .map_err(map_error)?;

    match outcome {
        BookingOutcome::Booked(appointment) => Ok((
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "appointment": appointment,
                "message": "Appointment requested, awaiting doctor confirmation"
            })),
        )),
        BookingOutcome::Rejected(rejection) => Ok(rejection_response(rejection)),
    }
}

/// Dry-run booking decision. Read-only: callers use this to validate a slot
/// right before submitting the actual booking.
#[axum::debug_handler]
pub async fn check_conflicts(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<ConflictCheckQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&state);

    let decision = service.check(
        query.doctor_id,
        query.scheduled_at,
        query.duration_minutes,
        auth.token(),
    ).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "result": decision
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&state);

    let appointment = service.get_appointment(appointment_id, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DoctorAppointmentsQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&state);

    let appointments = service
        .list_doctor_appointments(doctor_id, query.from, query.to, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments
    })))
}

// ==============================================================================
// LIFECYCLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<ConfirmAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentLifecycleService::new(&state);

    let appointment = service.confirm(appointment_id, request.notes, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment confirmed"
    })))
}

#[axum::debug_handler]
pub async fn reject_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<RejectAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentLifecycleService::new(&state);

    let appointment = service.reject(appointment_id, request.reason, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment rejected"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentLifecycleService::new(&state);

    let appointment = service.cancel(appointment_id, request.notes, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}
