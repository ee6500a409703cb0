use axum::{routing::get, Router};

use appointment_cell::{appointment_routes, availability_routes, AppointmentState};

pub fn create_router(state: AppointmentState) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/doctors", availability_routes(state.clone()))
        .nest("/appointments", appointment_routes(state))
}
