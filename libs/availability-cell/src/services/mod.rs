pub mod availability;
pub mod slots;
pub mod supabase_store;

pub use availability::{AvailabilityService, AvailabilityStore, InMemoryAvailabilityStore};
pub use slots::SlotGenerator;
pub use supabase_store::SupabaseAvailabilityStore;
