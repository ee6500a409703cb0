use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use doctor_cell::{Exclusion, ScheduleStore, SlotCalculator, TimeRange};

use crate::models::{AppointmentError, ConflictCheckResponse};
use crate::services::store::AppointmentStore;

/// Re-runs the slot exclusion rules against one exact interval using fresh reads.
#[derive(Clone)]
pub struct ConflictDetectionService {
    schedules: Arc<dyn ScheduleStore>,
    appointments: Arc<dyn AppointmentStore>,
}

impl ConflictDetectionService {
    pub fn new(schedules: Arc<dyn ScheduleStore>, appointments: Arc<dyn AppointmentStore>) -> Self {
        Self { schedules, appointments }
    }

    /// The rule that keeps `interval` from being bookable for the doctor,
    /// ignoring `exclude_appointment_id` (the appointment being moved).
    pub async fn find_exclusion(
        &self,
        doctor_id: Uuid,
        interval: &TimeRange,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Option<Exclusion>, AppointmentError> {
        let schedule = self
            .schedules
            .get_doctor_schedule(doctor_id)
            .await?
            .ok_or(AppointmentError::DoctorNotFound(doctor_id))?;

        let unavailable = self.schedules.get_unavailable_ranges(doctor_id, interval).await?;

        let mut bookings = self.appointments.list_for_doctor(doctor_id, interval).await?;
        if let Some(excluded) = exclude_appointment_id {
            bookings.retain(|appointment| appointment.id != excluded);
        }

        let exclusion = SlotCalculator::check_interval(&schedule, &unavailable, &bookings, interval);
        if let Some(reason) = &exclusion {
            debug!("Interval {} for doctor {} excluded: {}", interval, doctor_id, reason);
        }

        Ok(exclusion)
    }

    /// Check for appointment conflicts for a doctor at a specific time.
    /// Unavailability notes are only reported with `include_private_reasons`.
    pub async fn check_interval(
        &self,
        doctor_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
        include_private_reasons: bool,
    ) -> Result<ConflictCheckResponse, AppointmentError> {
        debug!("Checking conflicts for doctor {} from {} to {}", doctor_id, start_time, end_time);

        let interval = TimeRange::try_new(start_time, end_time)?;
        let exclusion = self.find_exclusion(doctor_id, &interval, exclude_appointment_id).await?;

        if exclusion.is_some() {
            warn!("Conflict detected for doctor {} at {}", doctor_id, interval);
        }

        Ok(ConflictCheckResponse {
            has_conflict: exclusion.is_some(),
            reason: exclusion.map(|e| {
                if include_private_reasons {
                    e.to_string()
                } else {
                    e.redacted().to_string()
                }
            }),
        })
    }
}
