use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use doctor_cell::TimeRange;

use crate::models::{Appointment, AppointmentError};

/// Persistence for appointments. Rows are never deleted.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError>;

    /// Replaces the stored row with the same id.
    async fn update(&self, appointment: Appointment) -> Result<Appointment, AppointmentError>;

    /// Appointments of any status overlapping `window`, ordered by start time.
    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        window: &TimeRange,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    /// Every appointment of the patient, ordered by start time.
    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError>;
}

#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.sort_by_key(|a| (a.appointment_date_time, a.created_at));
    appointments
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.write().await;
        if appointments.contains_key(&appointment.id) {
            return Err(AppointmentError::DatabaseError(format!(
                "Appointment {} already exists",
                appointment.id
            )));
        }
        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.write().await;
        match appointments.get_mut(&appointment.id) {
            Some(existing) => {
                *existing = appointment.clone();
                Ok(appointment)
            }
            None => Err(AppointmentError::NotFound(appointment.id)),
        }
    }

    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        window: &TimeRange,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = self.appointments.read().await;
        Ok(sorted(
            appointments
                .values()
                .filter(|a| a.doctor_id == doctor_id && a.slot().overlaps(window))
                .cloned()
                .collect(),
        ))
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = self.appointments.read().await;
        Ok(sorted(
            appointments
                .values()
                .filter(|a| a.patient_id == patient_id)
                .cloned()
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentStatus, AppointmentType};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 7, h, m, 0).unwrap()
    }

    fn appointment(doctor_id: Uuid, patient_id: Uuid, h: u32) -> Appointment {
        Appointment::scheduled(
            doctor_id,
            patient_id,
            TimeRange::new(at(h, 0), at(h, 30)),
            AppointmentType::GeneralConsultation,
            None,
        )
    }

    #[tokio::test]
    async fn test_insert_get_update() {
        let store = InMemoryAppointmentStore::new();
        let saved = store.insert(appointment(Uuid::new_v4(), Uuid::new_v4(), 10)).await.unwrap();

        assert!(matches!(
            store.insert(saved.clone()).await,
            Err(AppointmentError::DatabaseError(_))
        ));

        let mut changed = saved.clone();
        changed.status = AppointmentStatus::Confirmed;
        store.update(changed).await.unwrap();
        assert_eq!(
            store.get(saved.id).await.unwrap().unwrap().status,
            AppointmentStatus::Confirmed
        );

        let unknown = appointment(Uuid::new_v4(), Uuid::new_v4(), 11);
        assert_eq!(
            store.update(unknown.clone()).await,
            Err(AppointmentError::NotFound(unknown.id))
        );
    }

    #[tokio::test]
    async fn test_listings_are_filtered_and_ordered() {
        let store = InMemoryAppointmentStore::new();
        let doctor_id = Uuid::new_v4();
        let patient_id = Uuid::new_v4();

        store.insert(appointment(doctor_id, patient_id, 14)).await.unwrap();
        store.insert(appointment(doctor_id, Uuid::new_v4(), 9)).await.unwrap();
        store.insert(appointment(Uuid::new_v4(), patient_id, 11)).await.unwrap();

        let morning = TimeRange::new(at(0, 0), at(12, 0));
        let listed = store.list_for_doctor(doctor_id, &morning).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].appointment_date_time, at(9, 0));

        let day = TimeRange::new(at(0, 0), at(23, 0));
        let listed = store.list_for_doctor(doctor_id, &day).await.unwrap();
        assert_eq!(listed.iter().map(|a| a.appointment_date_time).collect::<Vec<_>>(), vec![at(9, 0), at(14, 0)]);

        let listed = store.list_for_patient(patient_id).await.unwrap();
        assert_eq!(listed.iter().map(|a| a.appointment_date_time).collect::<Vec<_>>(), vec![at(11, 0), at(14, 0)]);
    }
}
