//! Tenant (property) model and its messaging configuration.

use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// Gateway endpoint and credential for one tenant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WhatsappConfig {
    /// Gateway base URL.
    pub api_url: String,
    /// Tenant token sent as `x-api-key`.
    pub token: String,
}

/// An isolated customer instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Property {
    /// Unique record identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// IANA zone for civil-time trigger math.
    pub timezone: Option<String>,
    /// Master switch for outbound delivery.
    pub whatsapp_enabled: bool,
    /// Gateway settings, if configured.
    pub whatsapp_config: Option<WhatsappConfig>,
}

impl Property {
    /// Gateway settings usable for delivery.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if messaging is disabled or the settings
    /// are missing or blank.
    pub fn delivery_config(&self) -> Result<&WhatsappConfig> {
        if !self.whatsapp_enabled {
            return Err(AppError::Config(format!(
                "whatsapp disabled for property {}",
                self.id
            )));
        }
        match &self.whatsapp_config {
            Some(cfg) if !cfg.api_url.trim().is_empty() && !cfg.token.trim().is_empty() => Ok(cfg),
            _ => Err(AppError::Config(format!(
                "whatsapp not configured for property {}",
                self.id
            ))),
        }
    }
}
