// Feature Flag Domain Model

use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The closed set of flags known to the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKey {
    DemoModeEnabled,
    AiSummaryEnabled,
    BillingPacketEnabled,
    NewRiskEngineEnabled,
    ShortcutsEnabled,
    OtelVerboseEnabled,
    QueueProcessingEnabled,
}

impl FlagKey {
    pub const ALL: [FlagKey; 7] = [
        FlagKey::DemoModeEnabled,
        FlagKey::AiSummaryEnabled,
        FlagKey::BillingPacketEnabled,
        FlagKey::NewRiskEngineEnabled,
        FlagKey::ShortcutsEnabled,
        FlagKey::OtelVerboseEnabled,
        FlagKey::QueueProcessingEnabled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlagKey::DemoModeEnabled => "demo_mode_enabled",
            FlagKey::AiSummaryEnabled => "ai_summary_enabled",
            FlagKey::BillingPacketEnabled => "billing_packet_enabled",
            FlagKey::NewRiskEngineEnabled => "new_risk_engine_enabled",
            FlagKey::ShortcutsEnabled => "shortcuts_enabled",
            FlagKey::OtelVerboseEnabled => "otel_verbose_enabled",
            FlagKey::QueueProcessingEnabled => "queue_processing_enabled",
        }
    }

    /// Catalog entry for this key
    pub fn definition(&self) -> FlagDefinition {
        let (default_value, description) = match self {
            FlagKey::DemoModeEnabled => (
                false,
                "Enable demo mode with sandbox tenant and guided scenarios",
            ),
            FlagKey::AiSummaryEnabled => (true, "Enable AI summary generation for projects"),
            FlagKey::BillingPacketEnabled => (true, "Enable billing packet generation"),
            FlagKey::NewRiskEngineEnabled => {
                (false, "Enable the new risk detection engine (v2)")
            }
            FlagKey::ShortcutsEnabled => (true, "Enable keyboard shortcuts globally"),
            FlagKey::OtelVerboseEnabled => {
                (false, "Enable verbose OpenTelemetry span attributes")
            }
            FlagKey::QueueProcessingEnabled => (true, "Enable background job queue processing"),
        };
        FlagDefinition {
            key: *self,
            default_value,
            description,
        }
    }

    /// Name of the environment variable overriding this flag
    pub fn env_var(&self) -> String {
        env_var_for(self.as_str())
    }
}

/// `FLAG_<KEY>` for any flag-like key, catalog or not
pub fn env_var_for(key: &str) -> String {
    format!("FLAG_{}", key.to_uppercase())
}

impl std::fmt::Display for FlagKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlagKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FlagKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DomainError::UnknownFlag(s.to_string()))
    }
}

/// Static flag metadata, immutable once defined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagDefinition {
    pub key: FlagKey,
    pub default_value: bool,
    pub description: &'static str,
}

/// Per-request evaluation context, never persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagContext {
    pub organization_id: Option<String>,
    pub user_id: Option<String>,
    pub role: Option<String>,
    pub plan: Option<String>,
    pub environment: Option<String>,
}

impl FlagContext {
    /// Context for an acting user inside a tenant
    pub fn for_actor(
        organization_id: impl Into<String>,
        user_id: impl Into<String>,
        role: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            organization_id: Some(organization_id.into()),
            user_id: Some(user_id.into()),
            role: Some(role.into()),
            plan: None,
            environment: Some(environment.into()),
        }
    }

    pub fn with_plan(mut self, plan: impl Into<String>) -> Self {
        self.plan = Some(plan.into());
        self
    }
}
