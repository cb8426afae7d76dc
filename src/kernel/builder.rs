use std::sync::Arc;

use super::breadcrumbs::{Breadcrumb, BreadcrumbBuffer, BreadcrumbCategory};
use super::event::*;
use super::host::{HostContext, NavigationTiming};
use super::identity::Identity;
use super::interaction::RageClick;
use super::rating::{self, VitalName};
use super::source::{ElementInfo, ErrorReport, NetworkFailure, ResourceEntry};

pub const MASKED_VALUE: &str = "[MASKED]";
const MAX_INPUT_VALUE_CHARS: usize = 50;
const MAX_LOG_ARGS: usize = 5;
const MAX_LOG_BREADCRUMB_CHARS: usize = 100;

/// Composes envelopes from raw signals: identity, timing and page context are
/// stamped here, and the breadcrumb trail is kept up to date.
pub struct EventBuilder {
    host: Arc<dyn HostContext>,
    identity: Identity,
    breadcrumbs: BreadcrumbBuffer,
    previous_page: Option<String>,
}

impl EventBuilder {
    pub fn new(host: Arc<dyn HostContext>, identity: Identity) -> Self {
        Self {
            host,
            identity,
            breadcrumbs: BreadcrumbBuffer::new(),
            previous_page: None,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }

    pub fn now_ms(&self) -> u64 {
        self.host.now_ms()
    }

    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        self.breadcrumbs.snapshot()
    }

    pub fn record_breadcrumb(
        &mut self,
        category: BreadcrumbCategory,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) {
        let now = self.host.now_ms();
        self.breadcrumbs.record(now, category, message, data);
    }

    fn envelope(&self, payload: Payload) -> Envelope {
        let page = self.host.page();
        Envelope::new(
            payload,
            EnvelopeContext {
                timestamp: self.host.now_ms(),
                session_id: self.identity.session_id.clone(),
                user_id: self.identity.user_id.clone(),
                page_url: page.url,
                user_agent: self.host.user_agent(),
            },
        )
    }

    pub fn web_vital(&mut self, name: VitalName, value: f64, navigation_type: Option<String>) -> Envelope {
        let navigation_type = navigation_type.or_else(|| self.host.navigation_type());
        self.envelope(Payload::WebVital(VitalMeasurement {
            name,
            value,
            rating: rating::classify(name.as_str(), value),
            navigation_type,
        }))
    }

    /// The breadcrumb trail is copied into the envelope before the error itself is
    /// recorded as a breadcrumb.
    pub fn script_error(&mut self, report: ErrorReport) -> Envelope {
        let envelope = self.envelope(Payload::Error(ScriptError {
            severity: Severity::classify(&report.message),
            message: report.message.clone(),
            source: report.source,
            lineno: report.lineno,
            colno: report.colno,
            stack: report.stack,
            error_type: ScriptErrorType::Javascript,
            breadcrumbs: self.breadcrumbs.snapshot(),
        }));
        self.record_breadcrumb(BreadcrumbCategory::Custom, format!("Error: {}", report.message), None);
        envelope
    }

    pub fn unhandled_rejection(&mut self, message: String, stack: Option<String>) -> Envelope {
        let envelope = self.envelope(Payload::Error(ScriptError {
            message: message.clone(),
            source: None,
            lineno: None,
            colno: None,
            stack,
            error_type: ScriptErrorType::UnhandledRejection,
            severity: Severity::High,
            breadcrumbs: self.breadcrumbs.snapshot(),
        }));
        self.record_breadcrumb(
            BreadcrumbCategory::Custom,
            format!("Unhandled rejection: {}", message),
            None,
        );
        envelope
    }

    pub fn network_error(&mut self, failure: NetworkFailure) -> Envelope {
        self.record_breadcrumb(
            BreadcrumbCategory::Transport,
            format!("{} {} failed: {}", failure.method, failure.url, failure.message),
            None,
        );
        self.envelope(Payload::NetworkError(NetworkError {
            url: failure.url,
            method: failure.method,
            status_code: failure.status_code,
            message: failure.message,
            duration: failure.duration_ms,
            error_type: failure.error_type,
        }))
    }

    pub fn page_view(&mut self) -> Envelope {
        let page = self.host.page();
        let envelope = self.envelope(Payload::PageView(PageView {
            page_path: page.path.clone(),
            page_title: page.title,
            referrer: page.referrer.filter(|r| !r.is_empty()),
            previous_page: self.previous_page.clone().filter(|p| !p.is_empty()),
        }));
        self.record_breadcrumb(
            BreadcrumbCategory::Navigation,
            format!("Viewed page: {}", page.path),
            None,
        );
        self.previous_page = Some(page.path);
        envelope
    }

    /// `None` while the load event has not completed.
    pub fn page_speed(&mut self, timing: NavigationTiming) -> Option<Envelope> {
        if timing.load_event_end <= 0.0 {
            return None;
        }
        let since_fetch = |mark: f64| (mark - timing.fetch_start).max(0.0);
        let speed = PageSpeed {
            load_time: since_fetch(timing.load_event_end),
            dom_content_loaded: since_fetch(timing.dom_content_loaded_end),
            dom_interactive: since_fetch(timing.dom_interactive),
            resource_load_time: (timing.load_event_end - timing.response_end).max(0.0),
            first_paint: since_fetch(timing.dom_content_loaded_start),
        };
        self.record_breadcrumb(
            BreadcrumbCategory::Custom,
            format!("Page speed: {:.0}ms", speed.load_time),
            None,
        );
        Some(self.envelope(Payload::PageSpeed(speed)))
    }

    pub fn engagement(
        &mut self,
        time_on_page: u64,
        scroll_depth: f64,
        interaction_count: u64,
        exit_type: ExitType,
    ) -> Envelope {
        self.record_breadcrumb(
            BreadcrumbCategory::Custom,
            format!("Page exit: {}, Time: {}ms", exit_type.as_str(), time_on_page),
            None,
        );
        self.envelope(Payload::Engagement(Engagement {
            time_on_page,
            scroll_depth: scroll_depth.round().clamp(0.0, 100.0) as u8,
            interaction_count,
            exit_type,
        }))
    }

    pub fn resource(&mut self, entry: ResourceEntry) -> Envelope {
        self.envelope(Payload::ResourcePerformance(ResourcePerformance {
            resource_type: ResourceType::from_initiator(&entry.initiator_type),
            cache_hit: entry.transfer_size == 0 && entry.decoded_body_size > 0,
            url: entry.url,
            duration: entry.duration,
            transfer_size: entry.transfer_size,
            encoded_body_size: entry.encoded_body_size,
            decoded_body_size: entry.decoded_body_size,
            start_time: entry.start_time,
            dns_time: entry.dns_time,
            tcp_time: entry.tcp_time,
            request_time: entry.request_time,
            response_time: entry.response_time,
        }))
    }

    pub fn click(&mut self, element: ElementInfo) -> Envelope {
        self.record_breadcrumb(
            BreadcrumbCategory::Interaction,
            format!("Clicked: {}", non_empty_or(&element.tag_name, "unknown")),
            None,
        );
        self.user_action(ActionType::Click, element, None)
    }

    pub fn input(&mut self, element: ElementInfo, value: &str, masked: bool) -> Envelope {
        let value = if masked {
            MASKED_VALUE.to_string()
        } else {
            truncate_chars(value, MAX_INPUT_VALUE_CHARS)
        };
        self.user_action(ActionType::Input, element, Some(value))
    }

    pub fn submit(&mut self, element: ElementInfo) -> Envelope {
        self.record_breadcrumb(
            BreadcrumbCategory::Interaction,
            format!("Form submitted: {}", element.tag_name),
            None,
        );
        self.user_action(ActionType::Submit, element, None)
    }

    pub fn rage_click(&mut self, rage: RageClick) -> Envelope {
        self.record_breadcrumb(
            BreadcrumbCategory::Interaction,
            format!("Rage click detected on: {}", rage.element),
            None,
        );
        self.user_action(
            ActionType::RageClick,
            ElementInfo::tag(rage.element),
            Some(rage.count.to_string()),
        )
    }

    fn user_action(&self, action_type: ActionType, element: ElementInfo, value: Option<String>) -> Envelope {
        self.envelope(Payload::UserAction(UserAction {
            action_type,
            target_element: element.tag_name,
            target_text: element.text.map(|t| truncate_chars(&t, MAX_INPUT_VALUE_CHARS)),
            target_id: element.id.filter(|s| !s.is_empty()),
            target_class: element.class_name.filter(|s| !s.is_empty()),
            x_path: element.x_path,
            value,
        }))
    }

    pub fn console_log(&mut self, level: LogLevel, args: Vec<String>, max_message_length: usize) -> Envelope {
        let message = truncate_chars(&args.join(" "), max_message_length);
        self.record_breadcrumb(
            BreadcrumbCategory::Log,
            format!(
                "Console {}: {}",
                level.as_str(),
                truncate_chars(&message, MAX_LOG_BREADCRUMB_CHARS)
            ),
            None,
        );
        self.envelope(Payload::ConsoleLog(ConsoleLog {
            level,
            message,
            args: args.into_iter().take(MAX_LOG_ARGS).collect(),
        }))
    }

    pub fn long_task(&mut self, duration: f64, start_time: f64, attribution: Option<String>) -> Envelope {
        self.record_breadcrumb(
            BreadcrumbCategory::Custom,
            format!("Long task: {:.0}ms", duration),
            None,
        );
        self.envelope(Payload::LongTask(LongTask {
            duration,
            start_time,
            attribution: attribution.unwrap_or_else(|| "unknown".to_string()),
        }))
    }

    pub fn policy_violation(&mut self, violation: CspViolation) -> Envelope {
        self.record_breadcrumb(
            BreadcrumbCategory::Custom,
            format!("CSP violation: {}", violation.violated_directive),
            None,
        );
        self.envelope(Payload::CspViolation(violation))
    }

    pub fn custom(
        &mut self,
        event_name: &str,
        properties: Option<serde_json::Value>,
        value: Option<f64>,
    ) -> Envelope {
        let envelope = self.envelope(Payload::CustomEvent(CustomEvent {
            event_name: event_name.to_string(),
            properties,
            value,
        }));
        self.record_breadcrumb(
            BreadcrumbCategory::Custom,
            format!("Custom event: {}", event_name),
            None,
        );
        envelope
    }
}

fn non_empty_or<'a>(s: &'a str, fallback: &'a str) -> &'a str {
    if s.is_empty() {
        fallback
    } else {
        s
    }
}

/// Truncate on char boundaries.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
