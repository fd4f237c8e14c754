// libs/appointment-cell/src/repository.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::postgrest::PostgrestClient;
use shared_utils::time::{day_bounds, intervals_overlap};

use crate::models::{Appointment, SchedulingError};

/// Cap on how many appointment rows a single range query will pull back.
pub const APPOINTMENT_FETCH_LIMIT: usize = 200;

pub struct AppointmentRepository {
    store: Arc<PostgrestClient>,
    lock_timeout_seconds: u64,
}

impl AppointmentRepository {
    pub fn new(store: Arc<PostgrestClient>, lock_timeout_seconds: u64) -> Self {
        Self { store, lock_timeout_seconds }
    }

    pub async fn find_by_id(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);

        let result: Vec<Value> = self.store.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let mut appointments: Vec<Appointment> = parse_rows(result)?;
        appointments.pop().ok_or(SchedulingError::NotFound)
    }

    /// Appointments whose status still occupies the doctor's calendar,
    /// bounded to the given range and capped.
    pub async fn find_occupying_by_doctor_and_range(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&scheduled_at=gte.{}&scheduled_at=lte.{}&status=in.(pending,confirmed)&order=scheduled_at.asc&limit={}",
            doctor_id,
            from.to_rfc3339(),
            to.to_rfc3339(),
            APPOINTMENT_FETCH_LIMIT
        );

        let result: Vec<Value> = self.store.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        parse_rows(result)
    }

    /// Any-status listing for dashboards and history views.
    pub async fn find_by_doctor_and_range(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&scheduled_at=gte.{}&scheduled_at=lte.{}&order=scheduled_at.asc&limit={}",
            doctor_id,
            from.to_rfc3339(),
            to.to_rfc3339(),
            APPOINTMENT_FETCH_LIMIT
        );

        let result: Vec<Value> = self.store.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        parse_rows(result)
    }

    pub async fn insert(
        &self,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let body = serde_json::to_value(appointment)
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.store.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            Some(auth_token),
            Some(body),
            Some(headers),
        ).await.map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let mut appointments: Vec<Appointment> = parse_rows(result)?;
        appointments.pop().ok_or_else(|| {
            SchedulingError::DatabaseError("Appointment insert returned no row".to_string())
        })
    }

    /// Partial status update (confirm/reject/cancel patches).
    pub async fn apply_status_patch(
        &self,
        appointment_id: Uuid,
        patch: Value,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.store.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(patch),
            Some(headers),
        ).await.map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let mut appointments: Vec<Appointment> = parse_rows(result)?;
        appointments.pop().ok_or(SchedulingError::NotFound)
    }

    // ==============================================================================
    // RESERVE: THE PERSISTENCE-LEVEL BOOKING GUARD
    // ==============================================================================

    /// Insert a pending appointment under a per-doctor advisory lock.
    ///
    /// The in-memory conflict check and the insert are not atomic; two
    /// requests can both pass the check. The lock row (unique `lock_key`)
    /// serializes booking attempts per doctor, and the conflict check is
    /// re-run under the lock before the insert.
    pub async fn reserve(
        &self,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let lock_key = format!("doctor_{}", appointment.doctor_id);

        let lock_acquired = self.acquire_scheduling_lock(&lock_key, appointment.doctor_id).await?;
        if !lock_acquired {
            warn!("Could not acquire scheduling lock for doctor {}", appointment.doctor_id);
            return Err(SchedulingError::SlotTaken);
        }

        let result = self.reserve_under_lock(appointment, auth_token).await;

        // Lock release is best-effort; an expired lock is cleaned up by the
        // next contender.
        if let Err(e) = self.release_scheduling_lock(&lock_key).await {
            warn!("Failed to release scheduling lock {}: {}", lock_key, e);
        }

        result
    }

    async fn reserve_under_lock(
        &self,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let (from, to) = day_bounds(appointment.scheduled_at.date_naive());
        let existing = self.find_occupying_by_doctor_and_range(
            appointment.doctor_id,
            from,
            to,
            auth_token,
        ).await?;

        let start = appointment.scheduled_at;
        let end = appointment.scheduled_end();
        let conflict = existing.iter()
            .filter(|apt| apt.id != appointment.id)
            .any(|apt| intervals_overlap(start, end, apt.scheduled_at, apt.scheduled_end()));

        if conflict {
            debug!("Reservation lost the race for doctor {} at {}", appointment.doctor_id, start);
            return Err(SchedulingError::SlotTaken);
        }

        self.insert(appointment, auth_token).await
    }

    async fn acquire_scheduling_lock(
        &self,
        lock_key: &str,
        doctor_id: Uuid,
    ) -> Result<bool, SchedulingError> {
        match self.try_insert_lock(lock_key, doctor_id).await {
            Ok(()) => {
                debug!("Scheduling lock acquired: {}", lock_key);
                Ok(true)
            }
            Err(_) => {
                // Lock row exists; if its holder died it may be expired
                if self.cleanup_expired_lock(lock_key).await? {
                    match self.try_insert_lock(lock_key, doctor_id).await {
                        Ok(()) => {
                            debug!("Scheduling lock acquired after cleanup: {}", lock_key);
                            Ok(true)
                        }
                        Err(_) => Ok(false),
                    }
                } else {
                    Ok(false)
                }
            }
        }
    }

    async fn try_insert_lock(&self, lock_key: &str, doctor_id: Uuid) -> anyhow::Result<()> {
        let lock_data = json!({
            "lock_key": lock_key,
            "doctor_id": doctor_id,
            "acquired_at": Utc::now().to_rfc3339(),
            "expires_at": (Utc::now() + Duration::seconds(self.lock_timeout_seconds as i64)).to_rfc3339(),
            "process_id": format!("scheduler_{}", Uuid::new_v4())
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let _: Vec<Value> = self.store.request_with_headers(
            Method::POST,
            "/rest/v1/scheduling_locks",
            None,
            Some(lock_data),
            Some(headers),
        ).await?;

        Ok(())
    }

    async fn release_scheduling_lock(&self, lock_key: &str) -> Result<(), SchedulingError> {
        let _: Value = self.store.request(
            Method::DELETE,
            &format!("/rest/v1/scheduling_locks?lock_key=eq.{}", lock_key),
            None,
            None,
        ).await.map_err(|e| SchedulingError::DatabaseError(format!("Lock release failed: {}", e)))?;

        debug!("Scheduling lock released: {}", lock_key);
        Ok(())
    }

    /// Returns true when an expired lock row was deleted and acquisition is
    /// worth retrying.
    async fn cleanup_expired_lock(&self, lock_key: &str) -> Result<bool, SchedulingError> {
        let response: Value = self.store.request(
            Method::GET,
            &format!("/rest/v1/scheduling_locks?lock_key=eq.{}&select=*", lock_key),
            None,
            None,
        ).await.map_err(|e| SchedulingError::DatabaseError(format!("Lock check failed: {}", e)))?;

        if let Some(locks) = response.as_array() {
            if let Some(lock) = locks.first() {
                if let Some(expires_at_str) = lock.get("expires_at").and_then(|v| v.as_str()) {
                    if let Ok(expires_at) = DateTime::parse_from_rfc3339(expires_at_str) {
                        if expires_at.with_timezone(&Utc) < Utc::now() {
                            self.release_scheduling_lock(lock_key).await?;
                            return Ok(true);
                        }
                    }
                }
            }
        }

        Ok(false)
    }
}

fn parse_rows<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, SchedulingError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse appointments: {}", e)))
}
