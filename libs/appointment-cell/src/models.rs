// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use doctor_cell::{Occupancy, ScheduleError, TimeRange};
use shared_config::AppConfig;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date_time: DateTime<Utc>,
    pub end_date_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub appointment_type: AppointmentType,
    pub patient_notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<CancelledBy>,
    pub reschedule_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// A freshly booked appointment in the initial state.
    pub fn scheduled(
        doctor_id: Uuid,
        patient_id: Uuid,
        slot: TimeRange,
        appointment_type: AppointmentType,
        patient_notes: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id,
            appointment_date_time: slot.start_time,
            end_date_time: slot.end_time,
            status: AppointmentStatus::Scheduled,
            appointment_type,
            patient_notes,
            cancellation_reason: None,
            cancelled_by: None,
            reschedule_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn slot(&self) -> TimeRange {
        TimeRange::new(self.appointment_date_time, self.end_date_time)
    }

    pub fn duration(&self) -> Duration {
        self.end_date_time - self.appointment_date_time
    }
}

impl Occupancy for Appointment {
    fn occupied_range(&self) -> TimeRange {
        self.slot()
    }

    fn blocks_availability(&self) -> bool {
        self.status.blocks_availability()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }

    pub fn blocks_availability(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    #[serde(alias = "initial", alias = "new_patient")]
    InitialConsultation,

    #[serde(alias = "follow_up_consultation", alias = "followup")]
    FollowUp,

    #[serde(alias = "telehealth_checkin", alias = "virtual")]
    Telehealth,

    #[serde(alias = "emergency")]
    Urgent,

    #[default]
    #[serde(alias = "consultation", alias = "general")]
    GeneralConsultation,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::InitialConsultation => write!(f, "initial_consultation"),
            AppointmentType::FollowUp => write!(f, "follow_up"),
            AppointmentType::Telehealth => write!(f, "telehealth"),
            AppointmentType::Urgent => write!(f, "urgent"),
            AppointmentType::GeneralConsultation => write!(f, "general_consultation"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Patient,
    Doctor,
    System,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub appointment_type: AppointmentType,
    pub reason: Option<String>,
}

impl BookAppointmentRequest {
    pub fn slot(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }
}

/// The duration is fixed at booking. `new_end_time` is optional and, when
/// sent, must keep that duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_start_time: DateTime<Utc>,
    pub new_end_time: Option<DateTime<Utc>>,
}

impl RescheduleAppointmentRequest {
    /// The new interval for an appointment lasting `duration`.
    pub fn slot_for(&self, duration: Duration) -> Result<TimeRange, AppointmentError> {
        let end_time = self
            .new_start_time
            .checked_add_signed(duration)
            .ok_or_else(|| AppointmentError::ValidationError("new_start_time is out of range".to_string()))?;

        if let Some(requested_end) = self.new_end_time {
            if requested_end != end_time {
                return Err(AppointmentError::ValidationError(format!(
                    "Rescheduling cannot change the appointment duration of {} minutes",
                    duration.num_minutes()
                )));
            }
        }

        Ok(TimeRange::new(self.new_start_time, end_time))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionAppointmentRequest {
    pub status: AppointmentStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub reason: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Appointment not found: {0}")]
    NotFound(Uuid),

    #[error("Doctor not found: {0}")]
    DoctorNotFound(Uuid),

    #[error("Slot not available: {0}")]
    SlotConflict(String),

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<ScheduleError> for AppointmentError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::DoctorNotFound(id) => AppointmentError::DoctorNotFound(id),
            ScheduleError::InvalidRange(msg) => AppointmentError::ValidationError(msg),
            ScheduleError::InvalidSchedule(msg) | ScheduleError::Database(msg) => {
                AppointmentError::DatabaseError(msg)
            }
        }
    }
}

// ==============================================================================
// VALIDATION RULES
// ==============================================================================

#[derive(Debug, Clone)]
pub struct BookingRules {
    pub min_duration_minutes: i64,
    pub max_duration_minutes: i64,
    pub allow_past_bookings: bool,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            min_duration_minutes: 5,
            max_duration_minutes: 240,
            allow_past_bookings: false,
        }
    }
}

impl BookingRules {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            min_duration_minutes: config.min_appointment_minutes,
            max_duration_minutes: config.max_appointment_minutes,
            allow_past_bookings: config.allow_past_bookings,
        }
    }

    /// Shape checks on a requested interval; availability is checked separately.
    pub fn validate_slot(&self, slot: &TimeRange, now: DateTime<Utc>) -> Result<(), AppointmentError> {
        if slot.end_time <= slot.start_time {
            return Err(AppointmentError::ValidationError(
                "end_time must be after start_time".to_string(),
            ));
        }

        let minutes = slot.duration().num_minutes();
        if minutes < self.min_duration_minutes || minutes > self.max_duration_minutes {
            return Err(AppointmentError::ValidationError(format!(
                "Appointment must last between {} and {} minutes, got {}",
                self.min_duration_minutes, self.max_duration_minutes, minutes
            )));
        }

        if !self.allow_past_bookings && slot.start_time < now {
            return Err(AppointmentError::ValidationError(
                "Cannot book an appointment in the past".to_string(),
            ));
        }

        Ok(())
    }
}
