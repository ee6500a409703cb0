// libs/appointment-cell/src/services/booking.rs
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::{ScheduleStore, TimeRange};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, BookingRules,
    CancelledBy, RescheduleAppointmentRequest,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::notification::{AppointmentEvent, AppointmentNotifier};
use crate::services::store::AppointmentStore;

/// Commits bookings against freshly re-validated availability.
///
/// Every mutation takes the doctor's lock, re-reads schedule, unavailability
/// and appointments, re-checks the exact interval and only then writes. Work
/// for different doctors runs concurrently. Conflicts are returned to the
/// caller and never retried here.
pub struct BookingCoordinator {
    appointments: Arc<dyn AppointmentStore>,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
    notifier: Arc<dyn AppointmentNotifier>,
    rules: BookingRules,
    doctor_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl BookingCoordinator {
    pub fn new(
        schedules: Arc<dyn ScheduleStore>,
        appointments: Arc<dyn AppointmentStore>,
        notifier: Arc<dyn AppointmentNotifier>,
        rules: BookingRules,
    ) -> Self {
        Self {
            conflict_service: ConflictDetectionService::new(schedules, Arc::clone(&appointments)),
            lifecycle_service: AppointmentLifecycleService::new(),
            appointments,
            notifier,
            rules,
            doctor_locks: DashMap::new(),
        }
    }

    fn doctor_lock(&self, doctor_id: Uuid) -> Arc<Mutex<()>> {
        self.doctor_locks.entry(doctor_id).or_default().clone()
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.appointments
            .get(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound(appointment_id))
    }

    async fn ensure_free(
        &self,
        doctor_id: Uuid,
        interval: &TimeRange,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        match self
            .conflict_service
            .find_exclusion(doctor_id, interval, exclude_appointment_id)
            .await?
        {
            Some(exclusion) => {
                warn!("Slot {} for doctor {} rejected: {}", interval, doctor_id, exclusion);
                Err(AppointmentError::SlotConflict(exclusion.redacted().to_string()))
            }
            None => Ok(()),
        }
    }

    #[instrument(skip(self, request), fields(doctor_id = %request.doctor_id, patient_id = %request.patient_id))]
    pub async fn book(&self, request: BookAppointmentRequest) -> Result<Appointment, AppointmentError> {
        let slot = request.slot();
        self.rules.validate_slot(&slot, Utc::now())?;

        let appointment = {
            let lock = self.doctor_lock(request.doctor_id);
            let _guard = lock.lock().await;

            self.ensure_free(request.doctor_id, &slot, None).await?;

            let notes = request
                .reason
                .map(|reason| reason.trim().to_string())
                .filter(|reason| !reason.is_empty());

            self.appointments
                .insert(Appointment::scheduled(
                    request.doctor_id,
                    request.patient_id,
                    slot,
                    request.appointment_type,
                    notes,
                ))
                .await?
        };

        info!("Appointment {} booked with doctor {} at {}", appointment.id, appointment.doctor_id, slot);
        self.notifier.notify(AppointmentEvent::Booked { appointment: appointment.clone() });

        Ok(appointment)
    }

    /// Moves the appointment in place: same id, status back to `scheduled`.
    /// On any failure the stored appointment is left as it was.
    #[instrument(skip(self, request))]
    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let doctor_id = self.load(appointment_id).await?.doctor_id;

        let lock = self.doctor_lock(doctor_id);
        let guard = lock.lock().await;

        let current = self.load(appointment_id).await?;
        self.lifecycle_service
            .validate_status_transition(&current.status, &AppointmentStatus::Scheduled)?;

        let slot = request.slot_for(current.duration())?;
        self.rules.validate_slot(&slot, Utc::now())?;

        self.ensure_free(doctor_id, &slot, Some(appointment_id)).await?;

        let previous = current.slot();
        let mut moved = current;
        moved.appointment_date_time = slot.start_time;
        moved.end_date_time = slot.end_time;
        moved.status = AppointmentStatus::Scheduled;
        moved.reschedule_count += 1;
        moved.updated_at = Utc::now();

        let moved = self.appointments.update(moved).await?;
        drop(guard);

        info!("Appointment {} rescheduled from {} to {}", appointment_id, previous, slot);
        self.notifier.notify(AppointmentEvent::Rescheduled {
            appointment: moved.clone(),
            previous,
        });

        Ok(moved)
    }

    #[instrument(skip(self, reason))]
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        reason: &str,
        cancelled_by: CancelledBy,
    ) -> Result<Appointment, AppointmentError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppointmentError::ValidationError(
                "A cancellation reason is required".to_string(),
            ));
        }

        let doctor_id = self.load(appointment_id).await?.doctor_id;

        let lock = self.doctor_lock(doctor_id);
        let guard = lock.lock().await;

        let mut appointment = self.load(appointment_id).await?;
        self.lifecycle_service
            .validate_requested_transition(&appointment.status, &AppointmentStatus::Cancelled)?;

        appointment.status = AppointmentStatus::Cancelled;
        appointment.cancellation_reason = Some(reason.to_string());
        appointment.cancelled_by = Some(cancelled_by);
        appointment.updated_at = Utc::now();

        let appointment = self.appointments.update(appointment).await?;
        drop(guard);

        info!("Appointment {} cancelled by {:?}", appointment_id, cancelled_by);
        self.notifier.notify(AppointmentEvent::Cancelled { appointment: appointment.clone() });

        Ok(appointment)
    }

    /// Confirm, complete, no-show or cancel. Cancelling needs a reason.
    #[instrument(skip(self, reason))]
    pub async fn transition(
        &self,
        appointment_id: Uuid,
        to: AppointmentStatus,
        reason: Option<String>,
        actor: CancelledBy,
    ) -> Result<Appointment, AppointmentError> {
        if to == AppointmentStatus::Cancelled {
            return self
                .cancel(appointment_id, reason.as_deref().unwrap_or_default(), actor)
                .await;
        }

        let doctor_id = self.load(appointment_id).await?.doctor_id;

        let lock = self.doctor_lock(doctor_id);
        let guard = lock.lock().await;

        let mut appointment = self.load(appointment_id).await?;
        let from = appointment.status;
        self.lifecycle_service.validate_requested_transition(&from, &to)?;

        appointment.status = to;
        appointment.updated_at = Utc::now();

        let appointment = self.appointments.update(appointment).await?;
        drop(guard);

        info!("Appointment {} moved from {} to {}", appointment_id, from, to);
        self.notifier.notify(AppointmentEvent::StatusChanged {
            appointment: appointment.clone(),
            from,
        });

        Ok(appointment)
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.load(appointment_id).await
    }

    pub async fn allowed_transitions(&self, appointment_id: Uuid) -> Result<Vec<AppointmentStatus>, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        Ok(self.lifecycle_service.get_valid_transitions(&appointment.status))
    }

    pub async fn list_doctor_appointments(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let window = TimeRange::try_new(from, to)?;
        debug!("Listing appointments for doctor {} in {}", doctor_id, window);
        self.appointments.list_for_doctor(doctor_id, &window).await
    }

    pub async fn list_patient_appointments(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Listing appointments for patient {}", patient_id);
        self.appointments.list_for_patient(patient_id).await
    }
}
