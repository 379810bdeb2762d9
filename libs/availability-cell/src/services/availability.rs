// libs/availability-cell/src/services/availability.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc, Weekday};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::{Actor, ActorRole};

use crate::models::{AvailabilityError, AvailabilityRule, OpenInterval, RuleScope};

/// Storage for recurring weekly rules and date-specific overrides.
///
/// Implementations keep at most one rule per `(practitioner, scope)`.
#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    /// Insert, or replace the intervals of the rule already holding this scope.
    async fn upsert_rule(&self, rule: AvailabilityRule) -> Result<AvailabilityRule, AvailabilityError>;

    async fn remove_rule(&self, practitioner_id: Uuid, rule_id: Uuid) -> Result<(), AvailabilityError>;

    async fn rule_for_scope(
        &self,
        practitioner_id: Uuid,
        scope: RuleScope,
    ) -> Result<Option<AvailabilityRule>, AvailabilityError>;

    /// All rules of a practitioner, weekly rules Monday-first, then overrides by date.
    async fn list_rules(&self, practitioner_id: Uuid) -> Result<Vec<AvailabilityRule>, AvailabilityError>;

    /// Effective open intervals for `date`. An override replaces the weekly rule entirely,
    /// including an empty override meaning "closed".
    async fn rules_for(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<OpenInterval>, AvailabilityError> {
        if let Some(override_rule) = self.rule_for_scope(practitioner_id, RuleScope::Date(date)).await? {
            debug!("Override in effect for practitioner {} on {}", practitioner_id, date);
            return Ok(override_rule.intervals);
        }

        Ok(self
            .rule_for_scope(practitioner_id, RuleScope::Weekly(date.weekday()))
            .await?
            .map(|rule| rule.intervals)
            .unwrap_or_default())
    }

    async fn has_rules(&self, practitioner_id: Uuid) -> Result<bool, AvailabilityError> {
        Ok(!self.list_rules(practitioner_id).await?.is_empty())
    }
}

/// Check that intervals are well formed and return them sorted by start.
pub fn validate_intervals(
    mut intervals: Vec<OpenInterval>,
    allow_empty: bool,
) -> Result<Vec<OpenInterval>, AvailabilityError> {
    if intervals.is_empty() && !allow_empty {
        return Err(AvailabilityError::Validation(
            "A weekly rule needs at least one open interval".to_string(),
        ));
    }

    if let Some(bad) = intervals.iter().find(|i| i.start >= i.end) {
        return Err(AvailabilityError::Validation(format!(
            "Interval start {} must be before end {}",
            bad.start, bad.end
        )));
    }

    intervals.sort_by_key(|i| (i.start, i.end));

    if let Some(pair) = intervals.windows(2).find(|pair| pair[0].overlaps(&pair[1])) {
        return Err(AvailabilityError::Validation(format!(
            "Intervals {}-{} and {}-{} overlap",
            pair[0].start, pair[0].end, pair[1].start, pair[1].end
        )));
    }

    Ok(intervals)
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

#[derive(Default)]
pub struct InMemoryAvailabilityStore {
    rules: RwLock<HashMap<Uuid, Vec<AvailabilityRule>>>,
}

impl InMemoryAvailabilityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AvailabilityStore for InMemoryAvailabilityStore {
    async fn upsert_rule(&self, rule: AvailabilityRule) -> Result<AvailabilityRule, AvailabilityError> {
        let mut rules = self.rules.write().await;
        let entries = rules.entry(rule.practitioner_id).or_default();

        if let Some(existing) = entries.iter_mut().find(|r| r.scope == rule.scope) {
            existing.intervals = rule.intervals;
            existing.updated_at = Utc::now();
            return Ok(existing.clone());
        }

        entries.push(rule.clone());
        Ok(rule)
    }

    async fn remove_rule(&self, practitioner_id: Uuid, rule_id: Uuid) -> Result<(), AvailabilityError> {
        let mut rules = self.rules.write().await;
        let entries = rules.entry(practitioner_id).or_default();
        let before = entries.len();
        entries.retain(|r| r.id != rule_id);

        if entries.len() == before {
            return Err(AvailabilityError::NotFound(format!("Availability rule {} not found", rule_id)));
        }
        Ok(())
    }

    async fn rule_for_scope(
        &self,
        practitioner_id: Uuid,
        scope: RuleScope,
    ) -> Result<Option<AvailabilityRule>, AvailabilityError> {
        let rules = self.rules.read().await;
        Ok(rules
            .get(&practitioner_id)
            .and_then(|entries| entries.iter().find(|r| r.scope == scope))
            .cloned())
    }

    async fn list_rules(&self, practitioner_id: Uuid) -> Result<Vec<AvailabilityRule>, AvailabilityError> {
        let rules = self.rules.read().await;
        let mut listed = rules.get(&practitioner_id).cloned().unwrap_or_default();
        listed.sort_by_key(AvailabilityRule::listing_key);
        Ok(listed)
    }
}

// ==============================================================================
// ACTOR-AWARE SERVICE
// ==============================================================================

/// Rule management on behalf of an authenticated practitioner.
pub struct AvailabilityService {
    store: Arc<dyn AvailabilityStore>,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn AvailabilityStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn AvailabilityStore> {
        Arc::clone(&self.store)
    }

    pub async fn put_weekly_rule(
        &self,
        actor: &Actor,
        weekday: Weekday,
        intervals: Vec<OpenInterval>,
    ) -> Result<AvailabilityRule, AvailabilityError> {
        let practitioner_id = Self::require_practitioner(actor)?;
        let intervals = validate_intervals(intervals, false)?;

        let rule = self
            .store
            .upsert_rule(AvailabilityRule::new(practitioner_id, RuleScope::Weekly(weekday), intervals))
            .await?;

        info!("Weekly rule for {:?} saved for practitioner {}", weekday, practitioner_id);
        Ok(rule)
    }

    /// An override with no intervals closes the practitioner for that date.
    pub async fn put_date_override(
        &self,
        actor: &Actor,
        date: NaiveDate,
        intervals: Vec<OpenInterval>,
    ) -> Result<AvailabilityRule, AvailabilityError> {
        let practitioner_id = Self::require_practitioner(actor)?;
        let intervals = validate_intervals(intervals, true)?;

        let rule = self
            .store
            .upsert_rule(AvailabilityRule::new(practitioner_id, RuleScope::Date(date), intervals))
            .await?;

        info!("Override for {} saved for practitioner {}", date, practitioner_id);
        Ok(rule)
    }

    pub async fn remove_rule(&self, actor: &Actor, rule_id: Uuid) -> Result<(), AvailabilityError> {
        let practitioner_id = Self::require_practitioner(actor)?;
        self.store.remove_rule(practitioner_id, rule_id).await?;
        info!("Availability rule {} removed by practitioner {}", rule_id, practitioner_id);
        Ok(())
    }

    pub async fn list_rules(&self, practitioner_id: Uuid) -> Result<Vec<AvailabilityRule>, AvailabilityError> {
        self.store.list_rules(practitioner_id).await
    }

    pub async fn open_intervals(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<OpenInterval>, AvailabilityError> {
        if !self.store.has_rules(practitioner_id).await? {
            return Err(AvailabilityError::NotFound(format!(
                "Practitioner {} has no availability",
                practitioner_id
            )));
        }
        self.store.rules_for(practitioner_id, date).await
    }

    fn require_practitioner(actor: &Actor) -> Result<Uuid, AvailabilityError> {
        if actor.role != ActorRole::Practitioner {
            warn!("Actor {} with role {} tried to edit availability", actor.id, actor.role);
            return Err(AvailabilityError::Forbidden(
                "Only practitioners can edit availability".to_string(),
            ));
        }
        Ok(actor.id)
    }
}
