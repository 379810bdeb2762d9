// libs/availability-cell/src/services/supabase_store.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::{AvailabilityError, AvailabilityRule, OpenInterval, RuleKind, RuleScope};
use crate::services::availability::AvailabilityStore;

const RULES_PATH: &str = "/rest/v1/availability_rules";

/// Row shape of the `availability_rules` table. Weekdays use ISO numbering (1 = Monday).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityRuleRow {
    pub id: Uuid,
    pub practitioner_id: Uuid,
    pub weekday: Option<u8>,
    pub specific_date: Option<NaiveDate>,
    pub kind: RuleKind,
    pub intervals: Vec<OpenInterval>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&AvailabilityRule> for AvailabilityRuleRow {
    fn from(rule: &AvailabilityRule) -> Self {
        let (weekday, specific_date) = match rule.scope {
            RuleScope::Weekly(day) => (Some(day.number_from_monday() as u8), None),
            RuleScope::Date(date) => (None, Some(date)),
        };

        Self {
            id: rule.id,
            practitioner_id: rule.practitioner_id,
            weekday,
            specific_date,
            kind: rule.kind,
            intervals: rule.intervals.clone(),
            created_at: rule.created_at,
            updated_at: rule.updated_at,
        }
    }
}

impl TryFrom<AvailabilityRuleRow> for AvailabilityRule {
    type Error = AvailabilityError;

    fn try_from(row: AvailabilityRuleRow) -> Result<Self, Self::Error> {
        let scope = match (row.weekday, row.specific_date) {
            (Some(day), None) => RuleScope::Weekly(iso_weekday(day).ok_or_else(|| {
                AvailabilityError::Storage(format!("Rule {} has invalid weekday {}", row.id, day))
            })?),
            (None, Some(date)) => RuleScope::Date(date),
            _ => {
                return Err(AvailabilityError::Storage(format!(
                    "Rule {} must have exactly one of weekday or specific_date",
                    row.id
                )))
            }
        };

        Ok(Self {
            id: row.id,
            practitioner_id: row.practitioner_id,
            scope,
            kind: scope.kind(),
            intervals: row.intervals,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn iso_weekday(day: u8) -> Option<Weekday> {
    match day {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}

fn scope_filter(scope: RuleScope) -> String {
    match scope {
        RuleScope::Weekly(day) => format!("weekday=eq.{}", day.number_from_monday()),
        RuleScope::Date(date) => format!("specific_date=eq.{}", date),
    }
}

pub struct SupabaseAvailabilityStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAvailabilityStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn decode(rows: Vec<AvailabilityRuleRow>) -> Result<Vec<AvailabilityRule>, AvailabilityError> {
        rows.into_iter().map(AvailabilityRule::try_from).collect()
    }
}

#[async_trait]
impl AvailabilityStore for SupabaseAvailabilityStore {
    async fn upsert_rule(&self, rule: AvailabilityRule) -> Result<AvailabilityRule, AvailabilityError> {
        if let Some(existing) = self.rule_for_scope(rule.practitioner_id, rule.scope).await? {
            debug!("Replacing intervals of availability rule {}", existing.id);

            let path = format!("{}?id=eq.{}", RULES_PATH, existing.id);
            let rows: Vec<AvailabilityRuleRow> = self
                .supabase
                .request_with_headers(
                    Method::PATCH,
                    &path,
                    None,
                    Some(json!({
                        "intervals": rule.intervals,
                        "updated_at": Utc::now().to_rfc3339(),
                    })),
                    Some(SupabaseClient::return_representation()),
                )
                .await?;

            return Self::decode(rows)?
                .into_iter()
                .next()
                .ok_or_else(|| AvailabilityError::Storage("Failed to update availability rule".to_string()));
        }

        let body = serde_json::to_value(AvailabilityRuleRow::from(&rule))
            .map_err(|e| AvailabilityError::Storage(e.to_string()))?;

        let rows: Vec<AvailabilityRuleRow> = self
            .supabase
            .request_with_headers(
                Method::POST,
                RULES_PATH,
                None,
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        Self::decode(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| AvailabilityError::Storage("Failed to create availability rule".to_string()))
    }

    async fn remove_rule(&self, practitioner_id: Uuid, rule_id: Uuid) -> Result<(), AvailabilityError> {
        let path = format!("{}?id=eq.{}&practitioner_id=eq.{}", RULES_PATH, rule_id, practitioner_id);
        let removed: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::DELETE,
                &path,
                None,
                None,
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        if removed.is_empty() {
            return Err(AvailabilityError::NotFound(format!("Availability rule {} not found", rule_id)));
        }
        Ok(())
    }

    async fn rule_for_scope(
        &self,
        practitioner_id: Uuid,
        scope: RuleScope,
    ) -> Result<Option<AvailabilityRule>, AvailabilityError> {
        let path = format!(
            "{}?practitioner_id=eq.{}&{}&limit=1",
            RULES_PATH,
            practitioner_id,
            scope_filter(scope)
        );
        let rows: Vec<AvailabilityRuleRow> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(Self::decode(rows)?.into_iter().next())
    }

    async fn list_rules(&self, practitioner_id: Uuid) -> Result<Vec<AvailabilityRule>, AvailabilityError> {
        let path = format!("{}?practitioner_id=eq.{}", RULES_PATH, practitioner_id);
        let rows: Vec<AvailabilityRuleRow> = self.supabase.request(Method::GET, &path, None, None).await?;

        let mut rules = Self::decode(rows)?;
        rules.sort_by_key(AvailabilityRule::listing_key);
        Ok(rules)
    }

    async fn rules_for(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<OpenInterval>, AvailabilityError> {
        // One round trip for both candidate rules
        let path = format!(
            "{}?practitioner_id=eq.{}&or=(specific_date.eq.{},weekday.eq.{})",
            RULES_PATH,
            practitioner_id,
            date,
            date.weekday().number_from_monday()
        );
        let rows: Vec<AvailabilityRuleRow> = self.supabase.request(Method::GET, &path, None, None).await?;
        let rules = Self::decode(rows)?;

        let chosen = rules
            .iter()
            .find(|r| r.scope == RuleScope::Date(date))
            .or_else(|| rules.iter().find(|r| r.scope == RuleScope::Weekly(date.weekday())));

        Ok(chosen.map(|r| r.intervals.clone()).unwrap_or_default())
    }
}
