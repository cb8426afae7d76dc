use serde::{Deserialize, Serialize};

use super::breadcrumbs::Breadcrumb;
use super::rating::{Rating, VitalName};

// Wire layout: {"type": <tag>, "timestamp", "sessionId", "userId", "pageUrl",
// "userAgent"?, "data": {..}}. The tag/data pair comes from the flattened payload.

/// An immutable event record. Only the queue holding it is ever mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(flatten)]
    payload: Payload,
    timestamp: u64,
    session_id: String,
    user_id: String,
    page_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_agent: Option<String>,
}

impl Envelope {
    pub(crate) fn new(payload: Payload, context: EnvelopeContext) -> Self {
        Self {
            payload,
            timestamp: context.timestamp,
            session_id: context.session_id,
            user_id: context.user_id,
            page_url: context.page_url,
            user_agent: context.user_agent,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }
}

/// Common fields stamped onto every envelope at construction.
#[derive(Debug, Clone)]
pub(crate) struct EnvelopeContext {
    pub timestamp: u64,
    pub session_id: String,
    pub user_id: String,
    pub page_url: String,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    WebVital,
    Error,
    NetworkError,
    PageView,
    PageSpeed,
    Engagement,
    ResourcePerformance,
    UserAction,
    ConsoleLog,
    LongTask,
    CspViolation,
    CustomEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Payload {
    WebVital(VitalMeasurement),
    Error(ScriptError),
    NetworkError(NetworkError),
    PageView(PageView),
    PageSpeed(PageSpeed),
    Engagement(Engagement),
    ResourcePerformance(ResourcePerformance),
    UserAction(UserAction),
    ConsoleLog(ConsoleLog),
    LongTask(LongTask),
    CspViolation(CspViolation),
    CustomEvent(CustomEvent),
}

impl Payload {
    pub fn kind(&self) -> EventKind {
        match self {
            Payload::WebVital(_) => EventKind::WebVital,
            Payload::Error(_) => EventKind::Error,
            Payload::NetworkError(_) => EventKind::NetworkError,
            Payload::PageView(_) => EventKind::PageView,
            Payload::PageSpeed(_) => EventKind::PageSpeed,
            Payload::Engagement(_) => EventKind::Engagement,
            Payload::ResourcePerformance(_) => EventKind::ResourcePerformance,
            Payload::UserAction(_) => EventKind::UserAction,
            Payload::ConsoleLog(_) => EventKind::ConsoleLog,
            Payload::LongTask(_) => EventKind::LongTask,
            Payload::CspViolation(_) => EventKind::CspViolation,
            Payload::CustomEvent(_) => EventKind::CustomEvent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalMeasurement {
    pub name: VitalName,
    pub value: f64,
    pub rating: Rating,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colno: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    pub error_type: ScriptErrorType,
    pub severity: Severity,
    pub breadcrumbs: Vec<Breadcrumb>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScriptErrorType {
    Javascript,
    UnhandledRejection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Keyword heuristic over the error message.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("critical") || lower.contains("fatal") {
            Severity::Critical
        } else if lower.contains("error") || lower.contains("failed") {
            Severity::High
        } else if lower.contains("warning") || lower.contains("deprecated") {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkError {
    pub url: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub message: String,
    pub duration: f64,
    pub error_type: NetworkErrorType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NetworkErrorType {
    Timeout,
    Failed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView {
    pub page_path: String,
    pub page_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_page: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSpeed {
    pub load_time: f64,
    pub dom_content_loaded: f64,
    pub dom_interactive: f64,
    pub resource_load_time: f64,
    pub first_paint: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engagement {
    pub time_on_page: u64,
    pub scroll_depth: u8,
    pub interaction_count: u64,
    pub exit_type: ExitType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExitType {
    Navigation,
    Close,
    Refresh,
    Timeout,
}

impl ExitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitType::Navigation => "navigation",
            ExitType::Close => "close",
            ExitType::Refresh => "refresh",
            ExitType::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePerformance {
    pub url: String,
    pub resource_type: ResourceType,
    pub duration: f64,
    pub transfer_size: u64,
    pub encoded_body_size: u64,
    pub decoded_body_size: u64,
    pub start_time: f64,
    pub dns_time: f64,
    pub tcp_time: f64,
    pub request_time: f64,
    pub response_time: f64,
    pub cache_hit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Script,
    Stylesheet,
    Image,
    Fetch,
    Xmlhttprequest,
    Other,
}

impl ResourceType {
    pub fn from_initiator(initiator: &str) -> Self {
        match initiator {
            "script" => ResourceType::Script,
            "link" | "css" => ResourceType::Stylesheet,
            "img" => ResourceType::Image,
            "fetch" => ResourceType::Fetch,
            "xmlhttprequest" => ResourceType::Xmlhttprequest,
            _ => ResourceType::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAction {
    pub action_type: ActionType,
    pub target_element: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    Click,
    Input,
    Submit,
    RageClick,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleLog {
    pub level: LogLevel,
    pub message: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Log => "log",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Debug => "debug",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongTask {
    pub duration: f64,
    pub start_time: f64,
    pub attribution: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CspViolation {
    #[serde(rename = "blockedURI")]
    pub blocked_uri: String,
    pub violated_directive: String,
    pub effective_directive: String,
    pub original_policy: String,
    pub disposition: String,
    pub status_code: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomEvent {
    pub event_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}
