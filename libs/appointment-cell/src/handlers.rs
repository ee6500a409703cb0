// libs/appointment-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest,
    CancelAppointmentRequest, CancelledBy, RescheduleAppointmentRequest,
    TransitionAppointmentRequest,
};
use crate::state::AppointmentState;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct DoctorAppointmentsQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ConflictCheckQuery {
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub exclude_appointment_id: Option<Uuid>,
}

// ==============================================================================
// ERROR MAPPING AND AUTHORIZATION
// ==============================================================================

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::NotFound(_) | AppointmentError::DoctorNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            AppointmentError::SlotConflict(msg) => AppError::SlotConflict(msg),
            AppointmentError::InvalidTransition { .. } => AppError::InvalidTransition(err.to_string()),
            AppointmentError::Unauthorized => AppError::Forbidden(err.to_string()),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

/// Patients and doctors may only touch appointments they are party to.
fn authorize_appointment(user: &User, appointment: &Appointment) -> Result<(), AppointmentError> {
    let allowed = match user.role() {
        Role::Admin => true,
        Role::Doctor => user.is(appointment.doctor_id),
        Role::Patient => user.is(appointment.patient_id),
    };

    if allowed {
        Ok(())
    } else {
        Err(AppointmentError::Unauthorized)
    }
}

fn actor_of(user: &User) -> CancelledBy {
    match user.role() {
        Role::Patient => CancelledBy::Patient,
        Role::Doctor => CancelledBy::Doctor,
        Role::Admin => CancelledBy::System,
    }
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

pub async fn get_availability(
    State(state): State<AppointmentState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let date = NaiveDate::parse_from_str(&query.date, "%Y-%m-%d")
        .map_err(|_| AppError::ValidationError(format!("Invalid date '{}', expected YYYY-MM-DD", query.date)))?;

    let slots = state.availability.available_slots(doctor_id, date).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": date,
        "available_slots": slots,
        "total_slots": slots.len()
    })))
}

// ==============================================================================
// BOOKING AND MUTATIONS
// ==============================================================================

pub async fn book_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    // Patients book for themselves, doctors into their own calendar.
    let allowed = match user.role() {
        Role::Admin => true,
        Role::Doctor => user.is(request.doctor_id),
        Role::Patient => user.is(request.patient_id),
    };
    if !allowed {
        return Err(AppError::Forbidden("Not authorized to book this appointment".to_string()));
    }

    let appointment = state.coordinator.book(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment,
            "message": "Appointment booked successfully"
        })),
    ))
}

pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.coordinator.get_appointment(appointment_id).await?;
    authorize_appointment(&user, &appointment)?;

    Ok(Json(json!(appointment)))
}

pub async fn get_allowed_transitions(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.coordinator.get_appointment(appointment_id).await?;
    authorize_appointment(&user, &appointment)?;

    let transitions = state.coordinator.allowed_transitions(appointment_id).await?;

    Ok(Json(json!({
        "appointment_id": appointment_id,
        "status": appointment.status,
        "allowed_transitions": transitions
    })))
}

pub async fn reschedule_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.coordinator.get_appointment(appointment_id).await?;
    authorize_appointment(&user, &appointment)?;

    let appointment = state.coordinator.reschedule(appointment_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment rescheduled successfully"
    })))
}

pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.coordinator.get_appointment(appointment_id).await?;
    authorize_appointment(&user, &appointment)?;

    let appointment = state
        .coordinator
        .cancel(appointment_id, &request.reason, actor_of(&user))
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled successfully"
    })))
}

pub async fn transition_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<TransitionAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.coordinator.get_appointment(appointment_id).await?;
    authorize_appointment(&user, &appointment)?;

    let clinical = matches!(
        request.status,
        AppointmentStatus::Confirmed | AppointmentStatus::Completed | AppointmentStatus::NoShow
    );
    if clinical && user.role() == Role::Patient {
        return Err(AppError::Forbidden(format!(
            "Only the doctor can mark an appointment as {}",
            request.status
        )));
    }

    let appointment = state
        .coordinator
        .transition(appointment_id, request.status, request.reason, actor_of(&user))
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

// ==============================================================================
// LISTINGS
// ==============================================================================

pub async fn get_doctor_appointments(
    State(state): State<AppointmentState>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Query(query): Query<DoctorAppointmentsQuery>,
) -> Result<Json<Value>, AppError> {
    let allowed = match user.role() {
        Role::Admin => true,
        Role::Doctor => user.is(doctor_id),
        Role::Patient => false,
    };
    if !allowed {
        return Err(AppError::Forbidden("Not authorized to view this doctor's appointments".to_string()));
    }

    let appointments = state
        .coordinator
        .list_doctor_appointments(doctor_id, query.from, query.to)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

pub async fn get_patient_appointments(
    State(state): State<AppointmentState>,
    Path(patient_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if user.role() == Role::Patient && !user.is(patient_id) {
        return Err(AppError::Forbidden("Not authorized to view these appointments".to_string()));
    }

    let mut appointments = state.coordinator.list_patient_appointments(patient_id).await?;
    if user.role() == Role::Doctor {
        appointments.retain(|appointment| user.is(appointment.doctor_id));
    }

    Ok(Json(json!({
        "patient_id": patient_id,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

// ==============================================================================
// UTILITIES
// ==============================================================================

/// Anyone signed in may check an interval; only the doctor and admins see
/// the doctor's unavailability notes.
pub async fn check_appointment_conflicts(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Query(query): Query<ConflictCheckQuery>,
) -> Result<Json<Value>, AppError> {
    let include_private_reasons = user.role() == Role::Admin || user.is(query.doctor_id);

    let response = state
        .conflicts
        .check_interval(
            query.doctor_id,
            query.start_time,
            query.end_time,
            query.exclude_appointment_id,
            include_private_reasons,
        )
        .await?;

    Ok(Json(json!(response)))
}
