#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use appointment_cell::models::{AppointmentType, BookAppointmentRequest, BookingRules};
use appointment_cell::services::{BookingCoordinator, BroadcastNotifier, InMemoryAppointmentStore};
use doctor_cell::{InMemoryScheduleStore, WeeklyScheduleEntry};

/// Monday 2030-01-07.
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
}

pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 7, h, m, 0).unwrap()
}

pub fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Mon 09:00-17:00, lunch 12:00-13:00, 30 minute slots.
pub fn monday_entry() -> WeeklyScheduleEntry {
    WeeklyScheduleEntry {
        day_of_week: 1,
        start_time: t(9, 0),
        end_time: t(17, 0),
        break_start: Some(t(12, 0)),
        break_end: Some(t(13, 0)),
        slot_duration_minutes: 30,
    }
}

pub async fn schedule_store_with_doctor(doctor_id: Uuid) -> Arc<InMemoryScheduleStore> {
    let schedules = Arc::new(InMemoryScheduleStore::new());
    schedules.upsert_doctor(doctor_id, chrono_tz::UTC).await;
    schedules.set_entry(doctor_id, monday_entry()).await.unwrap();
    schedules
}

pub struct Fixture {
    pub doctor_id: Uuid,
    pub schedules: Arc<InMemoryScheduleStore>,
    pub appointments: Arc<InMemoryAppointmentStore>,
    pub notifier: Arc<BroadcastNotifier>,
    pub coordinator: Arc<BookingCoordinator>,
}

impl Fixture {
    pub async fn new() -> Self {
        let doctor_id = Uuid::new_v4();
        let schedules = schedule_store_with_doctor(doctor_id).await;
        let appointments = Arc::new(InMemoryAppointmentStore::new());
        let notifier = Arc::new(BroadcastNotifier::new(64));

        let coordinator = Arc::new(BookingCoordinator::new(
            schedules.clone(),
            appointments.clone(),
            notifier.clone(),
            BookingRules::default(),
        ));

        Self { doctor_id, schedules, appointments, notifier, coordinator }
    }

    pub fn request(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> BookAppointmentRequest {
        BookAppointmentRequest {
            doctor_id: self.doctor_id,
            patient_id: Uuid::new_v4(),
            start_time: start,
            end_time: end,
            appointment_type: AppointmentType::GeneralConsultation,
            reason: Some("Persistent cough".to_string()),
        }
    }
}
