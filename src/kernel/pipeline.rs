use tracing::{debug, trace};

use super::breadcrumbs::BreadcrumbCategory;
use super::builder::EventBuilder;
use super::config::AgentConfig;
use super::event::{Envelope, ExitType, LogLevel};
use super::interaction::RageClickDetector;
use super::queue::{Batch, DeliveryOutcome, EventQueue, FlushTrigger};
use super::sampling::Sampler;
use super::source::Signal;
use super::stats::AgentStats;

/// Long tasks at or below this duration are not reported.
pub const LONG_TASK_THRESHOLD_MS: f64 = 50.0;

#[derive(Debug, Default)]
struct EngagementState {
    page_loaded_at: u64,
    interaction_count: u64,
    max_scroll_depth: f64,
}

/// Signal-to-envelope pipeline plus the queue. Performs no I/O: every method
/// returns the batch to deliver, if any, and the driver executes it.
pub struct AgentCore {
    config: AgentConfig,
    builder: EventBuilder,
    detector: RageClickDetector,
    sampler: Sampler,
    queue: EventQueue,
    engagement: EngagementState,
    sampled_out: u64,
}

impl AgentCore {
    pub fn new(config: AgentConfig, builder: EventBuilder, sampler: Sampler) -> Self {
        let detector = RageClickDetector::new(
            config.user_actions.rage_click_threshold,
            config.user_actions.rage_click_time_window,
        );
        let queue = EventQueue::new(config.batch_size, config.delivery.max_queued_events);
        let engagement = EngagementState {
            page_loaded_at: builder.now_ms(),
            ..EngagementState::default()
        };
        Self {
            config,
            builder,
            detector,
            sampler,
            queue,
            engagement,
            sampled_out: 0,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn builder(&self) -> &EventBuilder {
        &self.builder
    }

    pub fn builder_mut(&mut self) -> &mut EventBuilder {
        &mut self.builder
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn detector(&self) -> &RageClickDetector {
        &self.detector
    }

    pub fn stats(&self) -> AgentStats {
        AgentStats::compute(
            self.queue.counters(),
            self.sampled_out,
            self.queue.len(),
            self.queue.is_flushing(),
        )
    }

    pub fn enqueue(&mut self, envelope: Envelope) -> Option<Batch> {
        trace!(kind = ?envelope.kind(), "event enqueued");
        self.queue.push(envelope)
    }

    pub fn begin_flush(&mut self, trigger: FlushTrigger) -> Option<Batch> {
        self.queue.begin_flush(trigger)
    }

    pub fn complete_flush(&mut self, batch: Batch, outcome: DeliveryOutcome) {
        self.queue.complete(batch, outcome)
    }

    /// Page view and page speed captured on start. Returns any batch the size
    /// trigger produced along the way.
    pub fn capture_initial_page(&mut self, navigation: Option<super::host::NavigationTiming>) -> Vec<Batch> {
        let mut batches = Vec::new();
        if self.config.metrics.page_views {
            let envelope = self.builder.page_view();
            batches.extend(self.enqueue(envelope));
        }
        if self.config.metrics.page_speed {
            match navigation.and_then(|timing| self.builder.page_speed(timing)) {
                Some(envelope) => batches.extend(self.enqueue(envelope)),
                None => debug!("page speed metrics not ready yet, skipping"),
            }
        }
        batches
    }

    pub fn page_view(&mut self) -> Option<Batch> {
        let envelope = self.builder.page_view();
        self.enqueue(envelope)
    }

    pub fn engagement(&mut self, exit_type: ExitType) -> Option<Batch> {
        let time_on_page = self
            .builder
            .now_ms()
            .saturating_sub(self.engagement.page_loaded_at);
        let envelope = self.builder.engagement(
            time_on_page,
            self.engagement.max_scroll_depth,
            self.engagement.interaction_count,
            exit_type,
        );
        self.enqueue(envelope)
    }

    pub fn custom_event(
        &mut self,
        name: &str,
        properties: Option<serde_json::Value>,
        value: Option<f64>,
    ) -> Option<Batch> {
        let envelope = self.builder.custom(name, properties, value);
        self.enqueue(envelope)
    }

    /// Route one signal. Returns the batch to deliver when the size trigger fired;
    /// a rage click can add a second envelope but the in-flight guard keeps it to
    /// at most one batch.
    pub fn ingest(&mut self, signal: Signal) -> Option<Batch> {
        match signal {
            Signal::WebVital {
                name,
                value,
                navigation_type,
            } => {
                if !self.config.metrics.enabled_vitals.contains(&name) {
                    trace!(vital = name.as_str(), "vital not enabled, ignored");
                    return None;
                }
                if !self.sampler.should_emit(self.config.sampling.sample_rate) {
                    self.sampled_out += 1;
                    trace!(vital = name.as_str(), "vital sampled out");
                    return None;
                }
                let envelope = self.builder.web_vital(name, value, navigation_type);
                self.enqueue(envelope)
            }
            Signal::ScriptError(report) => {
                let envelope = self.builder.script_error(report);
                self.enqueue(envelope)
            }
            Signal::UnhandledRejection { message, stack } => {
                let envelope = self.builder.unhandled_rejection(message, stack);
                self.enqueue(envelope)
            }
            Signal::NetworkFailure(failure) => {
                let envelope = self.builder.network_error(failure);
                self.enqueue(envelope)
            }
            Signal::Interaction => {
                self.engagement.interaction_count += 1;
                None
            }
            Signal::Scroll { depth_percent } => {
                self.engagement.interaction_count += 1;
                let depth = depth_percent.clamp(0.0, 100.0);
                if depth > self.engagement.max_scroll_depth {
                    self.engagement.max_scroll_depth = depth;
                }
                None
            }
            Signal::PageHidden => self.engagement(ExitType::Navigation),
            Signal::PageUnload => self.engagement(ExitType::Close),
            Signal::ResourceTiming(entry) => {
                let envelope = self.builder.resource(entry);
                self.enqueue(envelope)
            }
            Signal::Click(element) => {
                if !self.config.user_actions.track_clicks {
                    return None;
                }
                let identifier = element.identifier().to_string();
                let envelope = self.builder.click(element);
                let mut batch = self.enqueue(envelope);

                if self.config.user_actions.track_rage_clicks && !identifier.is_empty() {
                    let now = self.builder.now_ms();
                    if let Some(rage) = self.detector.observe(&identifier, now) {
                        debug!(element = %rage.element, count = rage.count, "rage click detected");
                        let envelope = self.builder.rage_click(rage);
                        let rage_batch = self.enqueue(envelope);
                        batch = batch.or(rage_batch);
                    }
                }
                batch
            }
            Signal::Input {
                element,
                value,
                sensitive,
            } => {
                if !self.config.user_actions.track_form_inputs {
                    return None;
                }
                let masked = sensitive || self.config.privacy.mask_user_data;
                let envelope = self.builder.input(element, &value, masked);
                self.enqueue(envelope)
            }
            Signal::Submit(element) => {
                if !self.config.user_actions.track_form_inputs {
                    return None;
                }
                let envelope = self.builder.submit(element);
                self.enqueue(envelope)
            }
            Signal::Log { level, args } => {
                if !self.captures(level) {
                    return None;
                }
                let max = self.config.console_logs.max_message_length;
                let envelope = self.builder.console_log(level, args, max);
                self.enqueue(envelope)
            }
            Signal::LongTask {
                duration,
                start_time,
                attribution,
            } => {
                if duration <= LONG_TASK_THRESHOLD_MS {
                    return None;
                }
                let envelope = self.builder.long_task(duration, start_time, attribution);
                self.enqueue(envelope)
            }
            Signal::PolicyViolation(violation) => {
                let envelope = self.builder.policy_violation(violation);
                self.enqueue(envelope)
            }
        }
    }

    fn captures(&self, level: LogLevel) -> bool {
        let c = &self.config.console_logs;
        match level {
            LogLevel::Log => c.capture_log,
            LogLevel::Info => c.capture_info,
            LogLevel::Warn => c.capture_warn,
            LogLevel::Error => c.capture_error,
            LogLevel::Debug => c.capture_debug,
        }
    }

    pub fn record_breadcrumb(
        &mut self,
        category: BreadcrumbCategory,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) {
        self.builder.record_breadcrumb(category, message, data);
    }
}
