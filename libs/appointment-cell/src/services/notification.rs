// libs/appointment-cell/src/services/notification.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{AppointmentEvent, AppointmentNotification};

/// Receives every committed appointment state change.
///
/// Delivery is best effort: a sink reports its own failures and never fails the
/// operation that triggered it.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, appointment_id: Uuid, event: AppointmentEvent);
}

/// Writes each event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotificationSink;

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn notify(&self, appointment_id: Uuid, event: AppointmentEvent) {
        info!(appointment_id = %appointment_id, event = ?event, "Appointment event");
    }
}

pub type NotificationSender = broadcast::Sender<AppointmentNotification>;
pub type NotificationReceiver = broadcast::Receiver<AppointmentNotification>;

/// Fans events out to in-process subscribers (push instead of polling).
pub struct BroadcastNotificationSink {
    sender: NotificationSender,
}

impl BroadcastNotificationSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> NotificationReceiver {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotificationSink {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl NotificationSink for BroadcastNotificationSink {
    async fn notify(&self, appointment_id: Uuid, event: AppointmentEvent) {
        let notification = AppointmentNotification {
            appointment_id,
            event,
            at: Utc::now(),
        };

        match self.sender.send(notification) {
            Ok(receivers) => debug!("Broadcast appointment {} event to {} subscribers", appointment_id, receivers),
            Err(_) => debug!("No subscribers for appointment {} event", appointment_id),
        }
    }
}

#[derive(Default)]
pub struct CompositeNotificationSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl CompositeNotificationSink {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }

    pub fn with(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl NotificationSink for CompositeNotificationSink {
    async fn notify(&self, appointment_id: Uuid, event: AppointmentEvent) {
        for sink in &self.sinks {
            sink.notify(appointment_id, event.clone()).await;
        }
    }
}
