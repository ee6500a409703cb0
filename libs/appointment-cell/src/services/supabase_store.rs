use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use doctor_cell::TimeRange;
use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentError};
use crate::services::store::AppointmentStore;

const TABLE: &str = "appointments";

/// Appointments persisted in the `appointments` table. Rows are only ever
/// inserted or patched.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn select(&self, filters: &[String]) -> Result<Vec<Appointment>, AppointmentError> {
        self.supabase
            .select(TABLE, filters)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    async fn write(
        &self,
        method: Method,
        filters: &[String],
        appointment: &Appointment,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let body: Value = serde_json::to_value(appointment)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to encode appointment: {}", e)))?;

        let rows: Vec<Appointment> = self
            .supabase
            .write(method, TABLE, filters, body)
            .await
            .map_err(|e| {
                error!("Failed to write appointment {}: {}", appointment.id, e);
                AppointmentError::DatabaseError(e.to_string())
            })?;

        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        debug!("Fetching appointment: {}", id);
        Ok(self.select(&[format!("id=eq.{}", id)]).await?.into_iter().next())
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        self.write(Method::POST, &[], &appointment)
            .await?
            .ok_or_else(|| AppointmentError::DatabaseError(format!("Appointment {} was not stored", appointment.id)))
    }

    async fn update(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        self.write(Method::PATCH, &[format!("id=eq.{}", appointment.id)], &appointment)
            .await?
            .ok_or(AppointmentError::NotFound(appointment.id))
    }

    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        window: &TimeRange,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let start = window.start_time.to_rfc3339();
        let end = window.end_time.to_rfc3339();

        let appointments = self
            .select(&[
                format!("doctor_id=eq.{}", doctor_id),
                format!("appointment_date_time=lt.{}", urlencoding::encode(&end)),
                format!("end_date_time=gt.{}", urlencoding::encode(&start)),
                "order=appointment_date_time.asc".to_string(),
            ])
            .await?;

        Ok(appointments
            .into_iter()
            .filter(|a| a.doctor_id == doctor_id && a.slot().overlaps(window))
            .collect())
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        self.select(&[
            format!("patient_id=eq.{}", patient_id),
            "order=appointment_date_time.asc".to_string(),
        ])
        .await
    }
}
