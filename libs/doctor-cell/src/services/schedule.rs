use async_trait::async_trait;
use chrono_tz::Tz;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{DoctorSchedule, ScheduleError, TimeRange, UnavailableRange, WeeklyScheduleEntry};

/// Read interface onto schedules owned by doctor profile management.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// `None` means the doctor is unknown.
    async fn get_doctor_schedule(&self, doctor_id: Uuid) -> Result<Option<DoctorSchedule>, ScheduleError>;

    /// Unavailable ranges overlapping `window`.
    async fn get_unavailable_ranges(
        &self,
        doctor_id: Uuid,
        window: &TimeRange,
    ) -> Result<Vec<UnavailableRange>, ScheduleError>;
}

#[derive(Default)]
pub struct InMemoryScheduleStore {
    schedules: RwLock<HashMap<Uuid, DoctorSchedule>>,
    unavailable: RwLock<HashMap<Uuid, Vec<UnavailableRange>>>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a doctor with no working days, keeping an existing schedule's entries.
    pub async fn upsert_doctor(&self, doctor_id: Uuid, timezone: Tz) {
        let mut schedules = self.schedules.write().await;
        schedules
            .entry(doctor_id)
            .and_modify(|schedule| schedule.timezone = timezone)
            .or_insert_with(|| DoctorSchedule::new(doctor_id, timezone));
    }

    /// Replace the entry for the entry's weekday.
    pub async fn set_entry(&self, doctor_id: Uuid, entry: WeeklyScheduleEntry) -> Result<(), ScheduleError> {
        entry.validate()?;

        let mut schedules = self.schedules.write().await;
        let schedule = schedules
            .get_mut(&doctor_id)
            .ok_or(ScheduleError::DoctorNotFound(doctor_id))?;

        schedule.weekly.retain(|existing| existing.day_of_week != entry.day_of_week);
        debug!("Setting schedule for doctor {} on day {}", doctor_id, entry.day_of_week);
        schedule.weekly.push(entry);
        schedule.weekly.sort_by_key(|e| e.day_of_week);

        Ok(())
    }

    pub async fn clear_entry(&self, doctor_id: Uuid, day_of_week: u8) -> Result<(), ScheduleError> {
        let mut schedules = self.schedules.write().await;
        let schedule = schedules
            .get_mut(&doctor_id)
            .ok_or(ScheduleError::DoctorNotFound(doctor_id))?;
        schedule.weekly.retain(|existing| existing.day_of_week != day_of_week);
        Ok(())
    }

    pub async fn add_unavailable_range(&self, range: UnavailableRange) -> Result<(), ScheduleError> {
        TimeRange::try_new(range.start_date_time, range.end_date_time)?;

        if !self.schedules.read().await.contains_key(&range.doctor_id) {
            return Err(ScheduleError::DoctorNotFound(range.doctor_id));
        }

        let mut unavailable = self.unavailable.write().await;
        unavailable.entry(range.doctor_id).or_default().push(range);
        Ok(())
    }

    /// Ranges are never edited in place, only removed and re-added.
    pub async fn remove_unavailable_range(&self, doctor_id: Uuid, range_id: Uuid) -> bool {
        let mut unavailable = self.unavailable.write().await;
        match unavailable.get_mut(&doctor_id) {
            Some(ranges) => {
                let before = ranges.len();
                ranges.retain(|range| range.id != range_id);
                ranges.len() != before
            }
            None => false,
        }
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn get_doctor_schedule(&self, doctor_id: Uuid) -> Result<Option<DoctorSchedule>, ScheduleError> {
        Ok(self.schedules.read().await.get(&doctor_id).cloned())
    }

    async fn get_unavailable_ranges(
        &self,
        doctor_id: Uuid,
        window: &TimeRange,
    ) -> Result<Vec<UnavailableRange>, ScheduleError> {
        let unavailable = self.unavailable.read().await;
        Ok(unavailable
            .get(&doctor_id)
            .map(|ranges| {
                ranges
                    .iter()
                    .filter(|range| range.range().overlaps(window))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
