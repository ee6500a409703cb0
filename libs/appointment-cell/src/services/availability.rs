use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use doctor_cell::{ScheduleStore, Slot, SlotCalculator};

use crate::models::AppointmentError;
use crate::services::store::AppointmentStore;

/// Read-only availability queries. Takes no locks; a stale answer only
/// risks a rejected booking later.
pub struct AvailabilityService {
    schedules: Arc<dyn ScheduleStore>,
    appointments: Arc<dyn AppointmentStore>,
}

impl AvailabilityService {
    pub fn new(schedules: Arc<dyn ScheduleStore>, appointments: Arc<dyn AppointmentStore>) -> Self {
        Self { schedules, appointments }
    }

    /// Free slots for `date`, a calendar day in the doctor's zone.
    #[instrument(skip(self))]
    pub async fn available_slots(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<Slot>, AppointmentError> {
        let schedule = self
            .schedules
            .get_doctor_schedule(doctor_id)
            .await?
            .ok_or(AppointmentError::DoctorNotFound(doctor_id))?;

        let day = schedule.day_bounds(date)?;
        let unavailable = self.schedules.get_unavailable_ranges(doctor_id, &day).await?;
        let bookings = self.appointments.list_for_doctor(doctor_id, &day).await?;

        let slots = SlotCalculator::compute_available_slots(&schedule, &unavailable, &bookings, date);
        debug!("{} free slots for doctor {} on {}", slots.len(), doctor_id, date);

        Ok(slots)
    }
}
