pub mod schedule;
pub mod slots;
pub mod supabase_schedule;

pub use schedule::{InMemoryScheduleStore, ScheduleStore};
pub use slots::{Exclusion, Occupancy, SlotCalculator};
pub use supabase_schedule::SupabaseScheduleStore;
