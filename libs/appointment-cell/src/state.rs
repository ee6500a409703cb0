use std::sync::Arc;

use doctor_cell::ScheduleStore;
use shared_config::AppConfig;

use crate::models::BookingRules;
use crate::services::{
    AppointmentNotifier, AppointmentStore, AvailabilityService, BookingCoordinator,
    ConflictDetectionService,
};

/// Shared handler state. The coordinator is built once so its per-doctor
/// locks cover every request.
#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub coordinator: Arc<BookingCoordinator>,
    pub availability: Arc<AvailabilityService>,
    pub conflicts: Arc<ConflictDetectionService>,
}

impl AppointmentState {
    pub fn new(
        config: Arc<AppConfig>,
        schedules: Arc<dyn ScheduleStore>,
        appointments: Arc<dyn AppointmentStore>,
        notifier: Arc<dyn AppointmentNotifier>,
    ) -> Self {
        let coordinator = BookingCoordinator::new(
            Arc::clone(&schedules),
            Arc::clone(&appointments),
            notifier,
            BookingRules::from_config(&config),
        );

        Self {
            availability: Arc::new(AvailabilityService::new(Arc::clone(&schedules), Arc::clone(&appointments))),
            conflicts: Arc::new(ConflictDetectionService::new(schedules, appointments)),
            coordinator: Arc::new(coordinator),
            config,
        }
    }
}
