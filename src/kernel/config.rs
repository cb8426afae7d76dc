use serde::{Deserialize, Serialize};
use std::path::Path;

use super::rating::VitalName;
use super::source::SignalKind;
use crate::error::{AgentError, Result};

/// Resolved agent configuration. Every option except the endpoint has a default,
/// so a partial JSON object deserializes into a complete record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub backend_url: String,
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "enabled")]
    pub auto_start: bool,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub user: UserConfig,
    #[serde(default)]
    pub user_actions: UserActionsConfig,
    #[serde(default)]
    pub console_logs: ConsoleLogsConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub privacy: PrivacyConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

/// Per-signal toggles. Each gates whether the matching source is subscribed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetricsConfig {
    pub web_vitals: bool,
    pub page_speed: bool,
    pub page_views: bool,
    pub engagement: bool,
    pub errors: bool,
    pub network_errors: bool,
    pub resource_performance: bool,
    pub user_actions: bool,
    pub console_logs: bool,
    pub long_tasks: bool,
    pub csp_violations: bool,
    pub enabled_vitals: Vec<VitalName>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            web_vitals: true,
            page_speed: true,
            page_views: true,
            engagement: true,
            errors: true,
            network_errors: true,
            resource_performance: false,
            user_actions: false,
            console_logs: false,
            long_tasks: false,
            csp_violations: false,
            enabled_vitals: VitalName::CORE.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserConfig {
    pub enable_user_tracking: bool,
    pub user_id_storage_key: String,
    /// Accepted for compatibility; session ids are never persisted.
    pub session_id_storage_key: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            enable_user_tracking: true,
            user_id_storage_key: "rum_user_id".to_string(),
            session_id_storage_key: "rum_session_id".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserActionsConfig {
    pub track_clicks: bool,
    pub track_form_inputs: bool,
    pub track_rage_clicks: bool,
    pub rage_click_threshold: usize,
    pub rage_click_time_window: u64,
}

impl Default for UserActionsConfig {
    fn default() -> Self {
        Self {
            track_clicks: true,
            track_form_inputs: true,
            track_rage_clicks: true,
            rage_click_threshold: 3,
            rage_click_time_window: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConsoleLogsConfig {
    pub capture_log: bool,
    pub capture_info: bool,
    pub capture_warn: bool,
    pub capture_error: bool,
    pub capture_debug: bool,
    pub max_message_length: usize,
}

impl Default for ConsoleLogsConfig {
    fn default() -> Self {
        Self {
            capture_log: false,
            capture_info: false,
            capture_warn: true,
            capture_error: true,
            capture_debug: false,
            max_message_length: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SamplingConfig {
    pub sample_rate: f64,
    /// Reserved for a future throttling gate.
    pub throttle_ms: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_rate: 1.0,
            throttle_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrivacyConfig {
    pub mask_user_data: bool,
    /// Reserved; not enforced by the agent.
    pub allowed_domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeliveryConfig {
    /// Live queue cap. Oldest events are dropped past it; `None` means unbounded.
    pub max_queued_events: Option<usize>,
    /// Request timeout applied by the HTTP transport.
    pub request_timeout_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_queued_events: Some(10_000),
            request_timeout_ms: 10_000,
        }
    }
}

fn default_flush_interval_ms() -> u64 {
    5000
}

fn default_batch_size() -> usize {
    50
}

fn enabled() -> bool {
    true
}

impl AgentConfig {
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into(),
            flush_interval_ms: default_flush_interval_ms(),
            batch_size: default_batch_size(),
            debug: false,
            auto_start: true,
            metrics: MetricsConfig::default(),
            user: UserConfig::default(),
            user_actions: UserActionsConfig::default(),
            console_logs: ConsoleLogsConfig::default(),
            sampling: SamplingConfig::default(),
            privacy: PrivacyConfig::default(),
            delivery: DeliveryConfig::default(),
        }
    }

    /// Resolve a partial JSON configuration. A missing `backendUrl` is rejected here
    /// instead of surfacing later as a transport failure on every flush.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| AgentError::Config(e.to_string()))?;
        Ok(config.normalized())
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| AgentError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// Clamp values that must be positive.
    pub fn normalized(mut self) -> Self {
        self.batch_size = self.batch_size.max(1);
        self.flush_interval_ms = self.flush_interval_ms.max(1);
        self.user_actions.rage_click_threshold = self.user_actions.rage_click_threshold.max(1);
        self.user_actions.rage_click_time_window = self.user_actions.rage_click_time_window.max(1);
        self.sampling.sample_rate = self.sampling.sample_rate.clamp(0.0, 1.0);
        self
    }

    pub fn is_enabled(&self, kind: SignalKind) -> bool {
        let m = &self.metrics;
        match kind {
            SignalKind::WebVitals => m.web_vitals,
            SignalKind::Errors => m.errors,
            SignalKind::NetworkErrors => m.network_errors,
            SignalKind::Engagement => m.engagement,
            SignalKind::ResourceTiming => m.resource_performance,
            SignalKind::UserActions => m.user_actions,
            SignalKind::ConsoleLogs => m.console_logs,
            SignalKind::LongTasks => m.long_tasks,
            SignalKind::CspViolations => m.csp_violations,
        }
    }
}
