use async_trait::async_trait;
use chrono_tz::Tz;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{DoctorSchedule, ScheduleError, TimeRange, UnavailableRange, WeeklyScheduleEntry};
use crate::services::schedule::ScheduleStore;

#[derive(Debug, Deserialize)]
struct DoctorRow {
    id: Uuid,
    timezone: Option<String>,
}

/// Reads schedules from the `doctors`, `doctor_weekly_schedules` and
/// `doctor_unavailability` tables.
pub struct SupabaseScheduleStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseScheduleStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl ScheduleStore for SupabaseScheduleStore {
    async fn get_doctor_schedule(&self, doctor_id: Uuid) -> Result<Option<DoctorSchedule>, ScheduleError> {
        debug!("Fetching schedule for doctor: {}", doctor_id);

        let doctors: Vec<DoctorRow> = self
            .supabase
            .select(
                "doctors",
                &[format!("id=eq.{}", doctor_id), "select=id,timezone".to_string()],
            )
            .await
            .map_err(|e| ScheduleError::Database(e.to_string()))?;

        let Some(doctor) = doctors.into_iter().next() else {
            return Ok(None);
        };

        let timezone: Tz = match doctor.timezone.as_deref() {
            None | Some("") => Tz::UTC,
            Some(name) => name.parse().map_err(|_| {
                ScheduleError::InvalidSchedule(format!("Unknown timezone '{}' for doctor {}", name, doctor.id))
            })?,
        };

        let rows: Vec<WeeklyScheduleEntry> = self
            .supabase
            .select(
                "doctor_weekly_schedules",
                &[format!("doctor_id=eq.{}", doctor_id), "order=day_of_week.asc".to_string()],
            )
            .await
            .map_err(|e| ScheduleError::Database(e.to_string()))?;

        let mut schedule = DoctorSchedule::new(doctor.id, timezone);
        for entry in rows {
            if let Err(e) = entry.validate() {
                warn!("Skipping invalid schedule entry for doctor {}: {}", doctor_id, e);
                continue;
            }
            if schedule.entry_for_day(entry.day_of_week).is_some() {
                warn!("Duplicate schedule entry for doctor {} on day {}, keeping the first", doctor_id, entry.day_of_week);
                continue;
            }
            schedule.weekly.push(entry);
        }

        Ok(Some(schedule))
    }

    async fn get_unavailable_ranges(
        &self,
        doctor_id: Uuid,
        window: &TimeRange,
    ) -> Result<Vec<UnavailableRange>, ScheduleError> {
        let start = window.start_time.to_rfc3339();
        let end = window.end_time.to_rfc3339();

        let ranges: Vec<UnavailableRange> = self
            .supabase
            .select(
                "doctor_unavailability",
                &[
                    format!("doctor_id=eq.{}", doctor_id),
                    format!("start_date_time=lt.{}", urlencoding::encode(&end)),
                    format!("end_date_time=gt.{}", urlencoding::encode(&start)),
                    "order=start_date_time.asc".to_string(),
                ],
            )
            .await
            .map_err(|e| ScheduleError::Database(e.to_string()))?;

        Ok(ranges
            .into_iter()
            .filter(|range| range.doctor_id == doctor_id && range.range().overlaps(window))
            .collect())
    }
}
