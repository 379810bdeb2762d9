// libs/appointment-cell/src/services/sweeper.rs
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::models::{AppointmentError, AppointmentStatus, Transition};
use crate::services::booking::BookingService;
use crate::services::context::SchedulingContext;
use crate::services::lifecycle::AppointmentLifecycleService;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub completed: usize,
    pub expired: usize,
    pub failed: usize,
    pub pruned_locks: usize,
}

/// Background maintenance: completes elapsed confirmed appointments and expires
/// pending requests whose start passed unconfirmed. Runs every change through
/// the booking state machine as the system actor.
pub struct LifecycleSweeper {
    ctx: SchedulingContext,
    booking: Arc<BookingService>,
    period: Duration,
    expire_pending: bool,
    is_shutdown: RwLock<bool>,
}

impl LifecycleSweeper {
    pub fn new(ctx: SchedulingContext, booking: Arc<BookingService>, period: Duration, expire_pending: bool) -> Self {
        Self {
            ctx,
            booking,
            period: period.max(Duration::from_millis(1)),
            expire_pending,
            is_shutdown: RwLock::new(false),
        }
    }

    pub async fn sweep_once(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let now = self.ctx.clock.now();

        let candidates = match self
            .ctx
            .repository
            .list_with_status(&[AppointmentStatus::Pending, AppointmentStatus::Confirmed])
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                error!("Lifecycle sweep could not list appointments: {}", e);
                report.failed += 1;
                return report;
            }
        };

        for appointment in candidates {
            let transition = match AppointmentLifecycleService::due_transition(&appointment, now) {
                Some(Transition::Expire) if !self.expire_pending => continue,
                Some(transition) => transition,
                None => continue,
            };

            match self.booking.apply_due(appointment.id, transition).await {
                Ok(None) => {
                    debug!("Appointment {} changed before the sweep reached it", appointment.id);
                }
                Ok(Some(_)) if transition == Transition::Complete => report.completed += 1,
                Ok(Some(_)) => report.expired += 1,
                // Moved out from under the sweep; the next run sees the new state
                Err(AppointmentError::InvalidStateTransition { .. }) => {}
                Err(e) => {
                    error!("Lifecycle sweep failed to {} appointment {}: {}", transition, appointment.id, e);
                    report.failed += 1;
                }
            }
        }

        report.pruned_locks = self.ctx.arbiter.prune_idle();

        if report.completed + report.expired + report.failed > 0 {
            info!(
                "Lifecycle sweep: {} completed, {} expired, {} failed",
                report.completed, report.expired, report.failed
            );
        }
        report
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(&self) {
        info!("Lifecycle sweeper started, period {:?}", self.period);

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if *self.is_shutdown.read().await {
                debug!("Lifecycle sweeper received shutdown signal");
                break;
            }

            self.sweep_once().await;
        }

        info!("Lifecycle sweeper stopped");
    }

    /// Stop after the current tick.
    pub async fn shutdown(&self) {
        *self.is_shutdown.write().await = true;
    }
}
