// libs/availability-cell/src/services/windows.rs
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::postgrest::PostgrestClient;

use crate::models::{
    AvailabilityWindow, CreateWindowRequest, UpdateWindowRequest, AvailabilityError,
};
use crate::repository::AvailabilityRepository;

/// Doctor-facing management of recurring weekly windows. Validation happens
/// here, before anything reaches the store.
pub struct WindowManagementService {
    repository: AvailabilityRepository,
}

impl WindowManagementService {
    pub fn new(config: &AppConfig) -> Self {
        let store = Arc::new(PostgrestClient::new(config));
        Self {
            repository: AvailabilityRepository::new(store),
        }
    }

    pub async fn create_window(
        &self,
        doctor_id: Uuid,
        request: CreateWindowRequest,
        auth_token: &str,
    ) -> Result<AvailabilityWindow, AvailabilityError> {
        debug!("Creating availability window for doctor {}", doctor_id);

        validate_weekday(request.weekday)?;
        validate_time_range(request.start_time, request.end_time)?;
        validate_slot_duration(request.slot_duration_minutes)?;

        self.repository.insert(doctor_id, &request, auth_token).await
    }

    pub async fn update_window(
        &self,
        window_id: Uuid,
        request: UpdateWindowRequest,
        auth_token: &str,
    ) -> Result<AvailabilityWindow, AvailabilityError> {
        debug!("Updating availability window {}", window_id);

        let current = self.repository.find_by_id(window_id, auth_token).await?;

        let start = request.start_time.unwrap_or(current.start_time);
        let end = request.end_time.unwrap_or(current.end_time);
        validate_time_range(start, end)?;

        if let Some(duration) = request.slot_duration_minutes {
            validate_slot_duration(duration)?;
        }

        self.repository.update(window_id, &request, auth_token).await
    }

    pub async fn list_windows(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        self.repository.find_by_doctor(doctor_id, auth_token).await
    }

    pub async fn deactivate_window(
        &self,
        window_id: Uuid,
        auth_token: &str,
    ) -> Result<(), AvailabilityError> {
        // Surface a 404 rather than silently patching nothing
        self.repository.find_by_id(window_id, auth_token).await?;
        self.repository.deactivate(window_id, auth_token).await
    }
}

pub fn validate_weekday(weekday: i32) -> Result<(), AvailabilityError> {
    if !(0..=6).contains(&weekday) {
        return Err(AvailabilityError::ValidationError(
            "Weekday must be between 0 (Sunday) and 6 (Saturday)".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_time_range(
    start: chrono::NaiveTime,
    end: chrono::NaiveTime,
) -> Result<(), AvailabilityError> {
    if start >= end {
        return Err(AvailabilityError::ValidationError(
            "Start time must be before end time".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_slot_duration(minutes: i32) -> Result<(), AvailabilityError> {
    if minutes <= 0 {
        return Err(AvailabilityError::ValidationError(
            "Slot duration must be positive".to_string(),
        ));
    }
    Ok(())
}
