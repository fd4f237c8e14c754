// libs/availability-cell/src/repository.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_database::postgrest::PostgrestClient;

use crate::models::{
    AvailabilityWindow, BookedInterval, CreateWindowRequest, UpdateWindowRequest,
    AvailabilityError,
};

/// Cap on how many appointment rows a single calendar query will pull back.
pub const BUSY_FETCH_LIMIT: usize = 200;

pub struct AvailabilityRepository {
    store: Arc<PostgrestClient>,
}

impl AvailabilityRepository {
    pub fn new(store: Arc<PostgrestClient>) -> Self {
        Self { store }
    }

    /// Active windows for one weekday, ordered by start time.
    pub async fn find_active_by_doctor_and_weekday(
        &self,
        doctor_id: Uuid,
        weekday: i32,
        auth_token: &str,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        let path = format!(
            "/rest/v1/availability_windows?doctor_id=eq.{}&weekday=eq.{}&is_active=eq.true&order=start_time.asc",
            doctor_id, weekday
        );

        let result: Vec<Value> = self.store.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AvailabilityError::DatabaseError(e.to_string()))?;

        parse_rows(result)
    }

    /// All of a doctor's windows (active and soft-deleted), weekday order.
    pub async fn find_by_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        let path = format!(
            "/rest/v1/availability_windows?doctor_id=eq.{}&order=weekday.asc,start_time.asc",
            doctor_id
        );

        let result: Vec<Value> = self.store.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AvailabilityError::DatabaseError(e.to_string()))?;

        parse_rows(result)
    }

    pub async fn find_by_id(
        &self,
        window_id: Uuid,
        auth_token: &str,
    ) -> Result<AvailabilityWindow, AvailabilityError> {
        let path = format!("/rest/v1/availability_windows?id=eq.{}", window_id);

        let result: Vec<Value> = self.store.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AvailabilityError::DatabaseError(e.to_string()))?;

        let mut windows: Vec<AvailabilityWindow> = parse_rows(result)?;
        windows.pop().ok_or(AvailabilityError::WindowNotFound)
    }

    pub async fn insert(
        &self,
        doctor_id: Uuid,
        request: &CreateWindowRequest,
        auth_token: &str,
    ) -> Result<AvailabilityWindow, AvailabilityError> {
        debug!("Creating availability window for doctor {}", doctor_id);

        let window_data = json!({
            "doctor_id": doctor_id,
            "weekday": request.weekday,
            "start_time": request.start_time.format("%H:%M").to_string(),
            "end_time": request.end_time.format("%H:%M").to_string(),
            "slot_duration_minutes": request.slot_duration_minutes,
            "is_active": true,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.store.request_with_headers(
            Method::POST,
            "/rest/v1/availability_windows",
            Some(auth_token),
            Some(window_data),
            Some(headers),
        ).await.map_err(|e| AvailabilityError::DatabaseError(e.to_string()))?;

        let mut windows: Vec<AvailabilityWindow> = parse_rows(result)?;
        windows.pop().ok_or_else(|| {
            AvailabilityError::DatabaseError("Failed to create availability window".to_string())
        })
    }

    pub async fn update(
        &self,
        window_id: Uuid,
        request: &UpdateWindowRequest,
        auth_token: &str,
    ) -> Result<AvailabilityWindow, AvailabilityError> {
        debug!("Updating availability window {}", window_id);

        let mut update_data = serde_json::Map::new();

        if let Some(start_time) = request.start_time {
            update_data.insert("start_time".to_string(), json!(start_time.format("%H:%M").to_string()));
        }
        if let Some(end_time) = request.end_time {
            update_data.insert("end_time".to_string(), json!(end_time.format("%H:%M").to_string()));
        }
        if let Some(duration) = request.slot_duration_minutes {
            update_data.insert("slot_duration_minutes".to_string(), json!(duration));
        }
        if let Some(is_active) = request.is_active {
            update_data.insert("is_active".to_string(), json!(is_active));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/availability_windows?id=eq.{}", window_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.store.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(headers),
        ).await.map_err(|e| AvailabilityError::DatabaseError(e.to_string()))?;

        let mut windows: Vec<AvailabilityWindow> = parse_rows(result)?;
        windows.pop().ok_or(AvailabilityError::WindowNotFound)
    }

    /// Soft delete. The row stays behind for audit; the engine filters on
    /// `is_active` everywhere it reads.
    pub async fn deactivate(
        &self,
        window_id: Uuid,
        auth_token: &str,
    ) -> Result<(), AvailabilityError> {
        debug!("Deactivating availability window {}", window_id);

        let path = format!("/rest/v1/availability_windows?id=eq.{}", window_id);
        let update_data = json!({
            "is_active": false,
            "updated_at": Utc::now().to_rfc3339()
        });

        let _: Vec<Value> = self.store.request(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(update_data),
        ).await.map_err(|e| AvailabilityError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Occupying appointment intervals for a doctor inside a time range.
    /// Statuses that free the slot are filtered out by the store; the fetch
    /// is capped so a pathological calendar cannot blow up a request.
    pub async fn find_busy_intervals(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<BookedInterval>, AvailabilityError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&scheduled_at=gte.{}&scheduled_at=lte.{}&status=in.(pending,confirmed)&select=id,scheduled_at,duration_minutes&order=scheduled_at.asc&limit={}",
            doctor_id,
            from.to_rfc3339(),
            to.to_rfc3339(),
            BUSY_FETCH_LIMIT
        );

        let result: Vec<Value> = self.store.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AvailabilityError::DatabaseError(e.to_string()))?;

        parse_rows(result)
    }
}

fn parse_rows<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, AvailabilityError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| AvailabilityError::DatabaseError(format!("Failed to parse rows: {}", e)))
}
