// libs/appointment-cell/src/services/conflict.rs
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::models::Appointment;

type ArbiterKey = (Uuid, NaiveDate);

/// Held while a booking or reschedule reads and writes one practitioner's day.
pub struct DayGuard {
    key: ArbiterKey,
    _guard: OwnedMutexGuard<()>,
}

impl DayGuard {
    pub fn date(&self) -> NaiveDate {
        self.key.1
    }
}

/// Serializes slot-claiming work per `(practitioner, date)`.
///
/// Different practitioners and different days never contend. Reads do not go
/// through the arbiter.
#[derive(Default)]
pub struct ConflictArbiter {
    locks: DashMap<ArbiterKey, Arc<Mutex<()>>>,
}

impl ConflictArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, practitioner_id: Uuid, date: NaiveDate) -> DayGuard {
        let key = (practitioner_id, date);
        // Clone out of the map so no shard lock is held across the await
        let mutex = Arc::clone(self.locks.entry(key).or_default().value());

        debug!("Waiting for arbiter lock on practitioner {} for {}", practitioner_id, date);
        DayGuard {
            key,
            _guard: mutex.lock_owned().await,
        }
    }

    /// Lock two days of one practitioner, always in date order, so that opposite
    /// moves between the same two days cannot deadlock.
    pub async fn lock_pair(&self, practitioner_id: Uuid, a: NaiveDate, b: NaiveDate) -> Vec<DayGuard> {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };

        let mut guards = vec![self.lock(practitioner_id, first).await];
        if second != first {
            guards.push(self.lock(practitioner_id, second).await);
        }
        guards
    }

    /// Drop lock entries nobody holds or waits on. Returns how many were removed.
    pub fn prune_idle(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        let removed = before.saturating_sub(self.locks.len());
        if removed > 0 {
            debug!("Pruned {} idle arbiter locks", removed);
        }
        removed
    }

    pub fn tracked_keys(&self) -> usize {
        self.locks.len()
    }
}

/// Active appointments in `existing` that overlap `candidate`.
pub fn find_conflicts<'a>(candidate: &Appointment, existing: &'a [Appointment]) -> Vec<&'a Appointment> {
    existing.iter().filter(|other| other.conflicts_with(candidate)).collect()
}
