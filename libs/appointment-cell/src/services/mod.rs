pub mod booking;
pub mod conflict;
pub mod context;
pub mod lifecycle;
pub mod notification;
pub mod query;
pub mod repository;
pub mod reschedule;
pub mod slots;
pub mod supabase_repository;
pub mod sweeper;

pub use booking::BookingService;
pub use conflict::ConflictArbiter;
pub use context::{SchedulingContext, SchedulingSettings};
pub use lifecycle::{AppointmentLifecycleService, TransitionOutcome};
pub use notification::{
    BroadcastNotificationSink, CompositeNotificationSink, NotificationSink, TracingNotificationSink,
};
pub use query::QueryService;
pub use repository::{AppointmentRepository, InMemoryAppointmentRepository, RepositoryError};
pub use reschedule::RescheduleCoordinator;
pub use slots::SlotQueryService;
pub use supabase_repository::SupabaseAppointmentRepository;
pub use sweeper::{LifecycleSweeper, SweepReport};
