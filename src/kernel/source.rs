//! Observation seam.
//!
//! Raw observation mechanisms live outside the agent. They hand already-extracted
//! measurements to the agent as [`Signal`]s through an [`ObservationSource`]
//! subscription. Instead of patching shared logging or HTTP functions in place,
//! the embedding application installs the explicit decorators in this module.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use super::event::{CspViolation, LogLevel, NetworkErrorType};
use super::rating::VitalName;
use crate::error::AgentError;

/// One observation kind per per-signal toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalKind {
    WebVitals,
    Errors,
    NetworkErrors,
    Engagement,
    ResourceTiming,
    UserActions,
    ConsoleLogs,
    LongTasks,
    CspViolations,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElementInfo {
    pub tag_name: String,
    pub text: Option<String>,
    pub id: Option<String>,
    pub class_name: Option<String>,
    pub x_path: Option<String>,
}

impl ElementInfo {
    pub fn tag(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            ..Self::default()
        }
    }

    /// Key used to group repeated interactions.
    pub fn identifier(&self) -> &str {
        &self.tag_name
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ErrorReport {
    pub message: String,
    pub source: Option<String>,
    pub lineno: Option<u32>,
    pub colno: Option<u32>,
    pub stack: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkFailure {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub status_code: Option<u16>,
    pub message: String,
    pub duration_ms: f64,
    pub error_type: NetworkErrorType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourceEntry {
    pub url: String,
    pub initiator_type: String,
    pub duration: f64,
    pub transfer_size: u64,
    pub encoded_body_size: u64,
    pub decoded_body_size: u64,
    pub start_time: f64,
    pub dns_time: f64,
    pub tcp_time: f64,
    pub request_time: f64,
    pub response_time: f64,
}

/// A primitive measurement delivered by an observation source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Signal {
    WebVital {
        name: VitalName,
        value: f64,
        #[serde(default)]
        navigation_type: Option<String>,
    },
    ScriptError(ErrorReport),
    UnhandledRejection {
        message: String,
        #[serde(default)]
        stack: Option<String>,
    },
    NetworkFailure(NetworkFailure),
    /// Click, keydown or touch anywhere on the page; counts toward engagement.
    Interaction,
    /// Counts as an interaction and raises the max scroll depth.
    Scroll {
        depth_percent: f64,
    },
    PageHidden,
    PageUnload,
    ResourceTiming(ResourceEntry),
    Click(ElementInfo),
    Input {
        element: ElementInfo,
        value: String,
        #[serde(default)]
        sensitive: bool,
    },
    Submit(ElementInfo),
    Log {
        level: LogLevel,
        args: Vec<String>,
    },
    LongTask {
        duration: f64,
        start_time: f64,
        #[serde(default)]
        attribution: Option<String>,
    },
    PolicyViolation(CspViolation),
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::WebVital { .. } => SignalKind::WebVitals,
            Signal::ScriptError(_) | Signal::UnhandledRejection { .. } => SignalKind::Errors,
            Signal::NetworkFailure(_) => SignalKind::NetworkErrors,
            Signal::Interaction | Signal::Scroll { .. } | Signal::PageHidden | Signal::PageUnload => {
                SignalKind::Engagement
            }
            Signal::ResourceTiming(_) => SignalKind::ResourceTiming,
            Signal::Click(_) | Signal::Input { .. } | Signal::Submit(_) => SignalKind::UserActions,
            Signal::Log { .. } => SignalKind::ConsoleLogs,
            Signal::LongTask { .. } => SignalKind::LongTasks,
            Signal::PolicyViolation(_) => SignalKind::CspViolations,
        }
    }
}

pub type SignalSink = Arc<dyn Fn(Signal) + Send + Sync>;

/// Capability interface for one observation kind.
pub trait ObservationSource: Send + Sync {
    fn kind(&self) -> SignalKind;

    /// Start delivering signals to `sink`. Sources the host cannot support return
    /// `AgentError::ObservationUnavailable`.
    fn subscribe(&self, sink: SignalSink) -> Result<Subscription, AgentError>;
}

/// Active registration with a source. Unsubscribes when dropped.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[derive(Default)]
struct ChannelState {
    next_id: u64,
    sinks: Vec<(u64, SignalSink)>,
}

/// Push-style source: the embedding application (or a decorator) emits signals,
/// and they reach whoever is subscribed. Signals emitted with no subscriber are
/// dropped.
#[derive(Clone)]
pub struct SignalChannel {
    kind: SignalKind,
    state: Arc<Mutex<ChannelState>>,
}

impl SignalChannel {
    pub fn new(kind: SignalKind) -> Self {
        Self {
            kind,
            state: Arc::new(Mutex::new(ChannelState::default())),
        }
    }

    /// Returns whether the signal reached at least one subscriber.
    pub fn emit(&self, signal: Signal) -> bool {
        if signal.kind() != self.kind {
            debug!(expected = ?self.kind, got = ?signal.kind(), "signal kind mismatch, dropped");
            return false;
        }
        // Sinks re-enter the agent; never call them under the channel lock.
        let sinks: Vec<SignalSink> = self
            .state
            .lock()
            .sinks
            .iter()
            .map(|(_, sink)| sink.clone())
            .collect();
        for sink in &sinks {
            sink(signal.clone());
        }
        !sinks.is_empty()
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().sinks.len()
    }
}

impl ObservationSource for SignalChannel {
    fn kind(&self) -> SignalKind {
        self.kind
    }

    fn subscribe(&self, sink: SignalSink) -> Result<Subscription, AgentError> {
        let id = {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.sinks.push((id, sink));
            id
        };
        let state = Arc::clone(&self.state);
        Ok(Subscription::new(move || {
            state.lock().sinks.retain(|(sink_id, _)| *sink_id != id);
        }))
    }
}

/// Decorate a logging function so every call is also captured as a log signal.
pub fn wrap_logger<F>(channel: SignalChannel, inner: F) -> impl Fn(LogLevel, &[String])
where
    F: Fn(LogLevel, &[String]),
{
    move |level, args| {
        inner(level, args);
        channel.emit(Signal::Log {
            level,
            args: args.to_vec(),
        });
    }
}

/// Decorator for outgoing requests of the embedding application. Failed calls and
/// error statuses are reported as network-failure signals; the result is passed
/// through untouched.
#[derive(Clone)]
pub struct NetworkMonitor {
    channel: SignalChannel,
}

impl NetworkMonitor {
    pub fn new() -> Self {
        Self {
            channel: SignalChannel::new(SignalKind::NetworkErrors),
        }
    }

    pub fn channel(&self) -> &SignalChannel {
        &self.channel
    }

    pub async fn track<Fut, E>(&self, method: &str, url: &str, request: Fut) -> Result<u16, E>
    where
        Fut: Future<Output = Result<u16, E>>,
        E: Display,
    {
        let started = tokio::time::Instant::now();
        let result = request.await;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        let failure = match &result {
            Ok(status) if *status >= 400 => {
                let reason = reqwest::StatusCode::from_u16(*status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("");
                Some(NetworkFailure {
                    url: url.to_string(),
                    method: method.to_string(),
                    status_code: Some(*status),
                    message: format!("HTTP {}: {}", status, reason),
                    duration_ms,
                    error_type: NetworkErrorType::Failed,
                })
            }
            Ok(_) => None,
            Err(e) => {
                let message = e.to_string();
                Some(NetworkFailure {
                    url: url.to_string(),
                    method: method.to_string(),
                    status_code: None,
                    error_type: classify_failure(&message),
                    message,
                    duration_ms,
                })
            }
        };

        if let Some(failure) = failure {
            self.channel.emit(Signal::NetworkFailure(failure));
        }
        result
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_failure(message: &str) -> NetworkErrorType {
    let lower = message.to_lowercase();
    if lower.contains("abort") {
        NetworkErrorType::Aborted
    } else if lower.contains("timeout") || lower.contains("timed out") {
        NetworkErrorType::Timeout
    } else {
        NetworkErrorType::Failed
    }
}
