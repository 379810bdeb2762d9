// libs/appointment-cell/src/services/context.rs
use std::sync::Arc;

use availability_cell::services::AvailabilityStore;
use shared_config::{AppConfig, SlotPolicy};
use shared_utils::clock::SharedClock;

use crate::services::conflict::ConflictArbiter;
use crate::services::notification::NotificationSink;
use crate::services::repository::AppointmentRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulingSettings {
    pub policy: SlotPolicy,
    pub max_advance_booking_days: u32,
    pub max_write_retries: u32,
}

impl SchedulingSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            policy: config.scheduling_policy(),
            max_advance_booking_days: config.max_advance_booking_days,
            max_write_retries: config.max_write_retries.max(1),
        }
    }
}

impl Default for SchedulingSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Collaborators shared by every appointment service.
#[derive(Clone)]
pub struct SchedulingContext {
    pub repository: Arc<dyn AppointmentRepository>,
    pub availability: Arc<dyn AvailabilityStore>,
    pub arbiter: Arc<ConflictArbiter>,
    pub notifier: Arc<dyn NotificationSink>,
    pub clock: SharedClock,
    pub settings: SchedulingSettings,
}

impl SchedulingContext {
    pub fn new(
        repository: Arc<dyn AppointmentRepository>,
        availability: Arc<dyn AvailabilityStore>,
        notifier: Arc<dyn NotificationSink>,
        clock: SharedClock,
        settings: SchedulingSettings,
    ) -> Self {
        Self {
            repository,
            availability,
            arbiter: Arc::new(ConflictArbiter::new()),
            notifier,
            clock,
            settings,
        }
    }
}
