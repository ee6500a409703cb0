pub mod availability;
pub mod booking;
pub mod conflict;
pub mod lifecycle;
pub mod notification;
pub mod store;
pub mod supabase_store;

pub use availability::AvailabilityService;
pub use booking::BookingCoordinator;
pub use conflict::ConflictDetectionService;
pub use lifecycle::AppointmentLifecycleService;
pub use notification::{AppointmentEvent, AppointmentNotifier, BroadcastNotifier, CompositeNotifier, WebhookNotifier};
pub use store::{AppointmentStore, InMemoryAppointmentStore};
pub use supabase_store::SupabaseAppointmentStore;
