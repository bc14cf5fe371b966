//! Tenant, automation rule, and template repository for `SQLite` persistence.

use std::collections::HashMap;
use std::sync::Arc;

use crate::models::automation::{AutomationRule, MessageTemplate, TriggerEvent};
use crate::models::property::{Property, WhatsappConfig};
use crate::{AppError, Result};

use super::db::Database;

/// Repository for tenant-scoped configuration records.
#[derive(Clone)]
pub struct PropertyRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct PropertyRow {
    id: String,
    name: String,
    timezone: Option<String>,
    whatsapp_enabled: i64,
    whatsapp_api_url: Option<String>,
    whatsapp_token: Option<String>,
}

impl PropertyRow {
    fn into_property(self) -> Property {
        let whatsapp_config = match (self.whatsapp_api_url, self.whatsapp_token) {
            (Some(api_url), Some(token)) => Some(WhatsappConfig { api_url, token }),
            _ => None,
        };
        Property {
            id: self.id,
            name: self.name,
            timezone: self.timezone,
            whatsapp_enabled: self.whatsapp_enabled != 0,
            whatsapp_config,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    property_id: String,
    trigger: String,
    active: i64,
    template_id: String,
    delay_minutes: i64,
}

impl RuleRow {
    fn into_rule(self) -> Result<AutomationRule> {
        let trigger = TriggerEvent::parse(&self.trigger)
            .ok_or_else(|| AppError::Db(format!("invalid trigger: {}", self.trigger)))?;
        Ok(AutomationRule {
            property_id: self.property_id,
            trigger,
            active: self.active != 0,
            template_id: self.template_id,
            delay_minutes: self.delay_minutes,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TemplateRow {
    id: String,
    property_id: String,
    name: String,
    body: String,
}

impl From<TemplateRow> for MessageTemplate {
    fn from(row: TemplateRow) -> Self {
        Self {
            id: row.id,
            property_id: row.property_id,
            name: row.name,
            body: row.body,
        }
    }
}

impl PropertyRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert or replace a tenant record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    pub async fn upsert(&self, property: &Property) -> Result<()> {
        let (api_url, token) = property
            .whatsapp_config
            .as_ref()
            .map_or((None, None), |cfg| (Some(&cfg.api_url), Some(&cfg.token)));

        sqlx::query(
            "INSERT INTO property (id, name, timezone, whatsapp_enabled, whatsapp_api_url, whatsapp_token)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, timezone = excluded.timezone,
                whatsapp_enabled = excluded.whatsapp_enabled,
                whatsapp_api_url = excluded.whatsapp_api_url,
                whatsapp_token = excluded.whatsapp_token",
        )
        .bind(&property.id)
        .bind(&property.name)
        .bind(&property.timezone)
        .bind(i64::from(property.whatsapp_enabled))
        .bind(api_url)
        .bind(token)
        .execute(self.db.as_ref())
        .await?;

        Ok(())
    }

    /// Retrieve a tenant by id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get(&self, id: &str) -> Result<Option<Property>> {
        let row: Option<PropertyRow> = sqlx::query_as("SELECT * FROM property WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        Ok(row.map(PropertyRow::into_property))
    }

    /// List every tenant.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Property>> {
        let rows: Vec<PropertyRow> = sqlx::query_as("SELECT * FROM property ORDER BY id")
            .fetch_all(self.db.as_ref())
            .await?;

        Ok(rows.into_iter().map(PropertyRow::into_property).collect())
    }

    /// Insert or replace an automation rule.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    pub async fn upsert_rule(&self, rule: &AutomationRule) -> Result<()> {
        sqlx::query(
            "INSERT INTO automation_rule (property_id, trigger, active, template_id, delay_minutes)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(property_id, trigger) DO UPDATE SET active = excluded.active,
                template_id = excluded.template_id, delay_minutes = excluded.delay_minutes",
        )
        .bind(&rule.property_id)
        .bind(rule.trigger.as_str())
        .bind(i64::from(rule.active))
        .bind(&rule.template_id)
        .bind(rule.delay_minutes)
        .execute(self.db.as_ref())
        .await?;

        Ok(())
    }

    /// Active rules of a tenant keyed by trigger.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails or a row is malformed.
    pub async fn active_rules(
        &self,
        property_id: &str,
    ) -> Result<HashMap<TriggerEvent, AutomationRule>> {
        let rows: Vec<RuleRow> = sqlx::query_as(
            "SELECT * FROM automation_rule WHERE property_id = ?1 AND active = 1",
        )
        .bind(property_id)
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter()
            .map(|row| row.into_rule().map(|rule| (rule.trigger, rule)))
            .collect()
    }

    /// Insert or replace a message template.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    pub async fn upsert_template(&self, template: &MessageTemplate) -> Result<()> {
        sqlx::query(
            "INSERT INTO message_template (id, property_id, name, body) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(property_id, id) DO UPDATE SET name = excluded.name, body = excluded.body",
        )
        .bind(&template.id)
        .bind(&template.property_id)
        .bind(&template.name)
        .bind(&template.body)
        .execute(self.db.as_ref())
        .await?;

        Ok(())
    }

    /// Templates of a tenant keyed by id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn templates(&self, property_id: &str) -> Result<HashMap<String, MessageTemplate>> {
        let rows: Vec<TemplateRow> =
            sqlx::query_as("SELECT * FROM message_template WHERE property_id = ?1")
                .bind(property_id)
                .fetch_all(self.db.as_ref())
                .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.id.clone(), MessageTemplate::from(row)))
            .collect())
    }
}
