use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::breadcrumbs::{Breadcrumb, BreadcrumbCategory};
use super::builder::EventBuilder;
use super::config::AgentConfig;
use super::delivery::{DeliveryManager, Transport};
use super::event::ExitType;
use super::host::{HostContext, PageContext, SystemHost};
use super::identity::Identity;
use super::pipeline::AgentCore;
use super::queue::{Batch, DeliveryOutcome, FlushTrigger};
use super::sampling::Sampler;
use super::source::{ObservationSource, Signal, SignalSink, Subscription};
use super::stats::AgentStats;
use crate::error::{AgentError, Result};
use crate::services::http::HttpTransport;

/// Result of an explicit [`Agent::flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing queued.
    Empty,
    /// Another flush holds the in-flight guard.
    InFlight,
    Delivered(usize),
    /// The batch was put back at the front of the queue.
    Failed(usize),
}

#[derive(Default)]
struct Lifecycle {
    running: bool,
    subscriptions: Vec<Subscription>,
    timer: Option<CancellationToken>,
    /// `stop()` found a batch in flight; the final flush runs when it completes.
    shutdown_pending: bool,
}

struct Shared {
    config: AgentConfig,
    core: Mutex<AgentCore>,
    lifecycle: Mutex<Lifecycle>,
    host: Arc<dyn HostContext>,
    delivery: DeliveryManager,
    sources: Vec<Arc<dyn ObservationSource>>,
    runtime: Handle,
    /// Bumped after every completed flush.
    completions: watch::Sender<u64>,
}

impl Shared {
    fn handle_signal(self: &Arc<Self>, signal: Signal) {
        let batch = self.core.lock().ingest(signal);
        if let Some(batch) = batch {
            self.dispatch(batch);
        }
    }

    fn flush_now(self: &Arc<Self>, trigger: FlushTrigger) -> bool {
        let batch = self.core.lock().begin_flush(trigger);
        match batch {
            Some(batch) => {
                self.dispatch(batch);
                true
            }
            None => false,
        }
    }

    /// Run the transport call off the caller's path. The batch is already out of
    /// the live queue and the in-flight guard is held until `finish`.
    fn dispatch(self: &Arc<Self>, batch: Batch) -> JoinHandle<DeliveryOutcome> {
        debug!(batch = batch.id(), events = batch.len(), trigger = ?batch.trigger(), "flushing events");
        let shared = Arc::clone(self);
        self.runtime.spawn(async move {
            let outcome = shared.delivery.deliver(&batch).await;
            shared.finish(batch, outcome);
            outcome
        })
    }

    fn finish(self: &Arc<Self>, batch: Batch, outcome: DeliveryOutcome) {
        let shutdown = {
            let mut lifecycle = self.lifecycle.lock();
            let mut core = self.core.lock();
            if !lifecycle.running {
                debug!(batch = batch.id(), ?outcome, "flush completed after stop");
            }
            core.complete_flush(batch, outcome);
            if !lifecycle.running && std::mem::take(&mut lifecycle.shutdown_pending) {
                core.begin_flush(FlushTrigger::Shutdown)
            } else {
                None
            }
        };
        self.completions.send_modify(|n| *n += 1);
        if let Some(batch) = shutdown {
            self.dispatch(batch);
        }
    }

    fn sink(self: &Arc<Self>) -> SignalSink {
        let weak: Weak<Shared> = Arc::downgrade(self);
        Arc::new(move |signal| {
            if let Some(shared) = weak.upgrade() {
                shared.handle_signal(signal);
            }
        })
    }

    fn spawn_timer(self: &Arc<Self>) -> CancellationToken {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let weak = Arc::downgrade(self);
        let period = Duration::from_millis(self.config.flush_interval_ms);

        self.runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(shared) = weak.upgrade() else { break };
                        shared.flush_now(FlushTrigger::Timer);
                    }
                }
            }
        });
        token
    }
}

/// Lifecycle controller. Cheap to clone; clones share one agent instance.
#[derive(Clone)]
pub struct Agent {
    shared: Arc<Shared>,
}

impl Agent {
    pub fn builder(config: AgentConfig) -> AgentBuilder {
        AgentBuilder::new(config)
    }

    /// Idempotent. Captures the initial page view / page speed, subscribes to every
    /// enabled source and starts the periodic flush timer.
    pub fn start(&self) {
        let shared = &self.shared;
        let mut lifecycle = shared.lifecycle.lock();
        if lifecycle.running {
            debug!("agent already running");
            return;
        }
        lifecycle.running = true;
        lifecycle.shutdown_pending = false;
        if shared.config.debug {
            info!(endpoint = %shared.config.backend_url, "starting RUM monitoring");
        }

        let navigation = shared.host.navigation_timing();
        let batches = shared.core.lock().capture_initial_page(navigation);
        for batch in batches {
            shared.dispatch(batch);
        }

        for source in &shared.sources {
            let kind = source.kind();
            if !shared.config.is_enabled(kind) {
                continue;
            }
            match source.subscribe(shared.sink()) {
                Ok(subscription) => {
                    debug!(?kind, "observation source subscribed");
                    lifecycle.subscriptions.push(subscription);
                }
                Err(e) => debug!(?kind, error = %e, "observation source not wired"),
            }
        }

        lifecycle.timer = Some(shared.spawn_timer());
    }

    /// Idempotent. Cancels the timer, unsubscribes, records the final engagement
    /// and issues a last flush without waiting for it. When a batch is already in
    /// flight the last flush is deferred until that batch completes.
    pub fn stop(&self) {
        let shared = &self.shared;
        let batches: Vec<Batch> = {
            let mut lifecycle = shared.lifecycle.lock();
            if !lifecycle.running {
                return;
            }
            lifecycle.running = false;
            if let Some(timer) = lifecycle.timer.take() {
                timer.cancel();
            }
            if shared.config.debug {
                info!("stopping RUM monitoring");
            }
            for subscription in std::mem::take(&mut lifecycle.subscriptions) {
                subscription.unsubscribe();
            }

            let mut core = shared.core.lock();
            let mut batches = Vec::new();
            if shared.config.metrics.engagement {
                batches.extend(core.engagement(ExitType::Close));
            }
            match core.begin_flush(FlushTrigger::Shutdown) {
                Some(batch) => batches.push(batch),
                None if core.queue().is_flushing() => {
                    debug!(queued = core.queue().len(), "final flush deferred behind in-flight batch");
                    lifecycle.shutdown_pending = true;
                }
                None => {}
            }
            batches
        };
        for batch in batches {
            shared.dispatch(batch);
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.lifecycle.lock().running
    }

    /// Feed a signal directly, bypassing source subscriptions. Signals of a kind
    /// disabled in `metrics` are dropped, as they would be with no subscription.
    pub fn ingest(&self, signal: Signal) {
        let kind = signal.kind();
        if !self.shared.config.is_enabled(kind) {
            trace!(?kind, "signal kind not enabled, ignored");
            return;
        }
        self.shared.handle_signal(signal);
    }

    pub fn track_custom_event(
        &self,
        name: &str,
        properties: Option<serde_json::Value>,
        value: Option<f64>,
    ) {
        let batch = self.shared.core.lock().custom_event(name, properties, value);
        if let Some(batch) = batch {
            self.shared.dispatch(batch);
        }
        debug!(event = name, "custom event tracked");
    }

    /// Page view for the current host page, e.g. after client-side navigation.
    pub fn track_page_view(&self) {
        let batch = self.shared.core.lock().page_view();
        if let Some(batch) = batch {
            self.shared.dispatch(batch);
        }
    }

    pub fn record_breadcrumb(
        &self,
        category: BreadcrumbCategory,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) {
        self.shared.core.lock().record_breadcrumb(category, message, data);
    }

    pub fn set_user(&self, user_id: &str, properties: Option<serde_json::Value>) {
        let shared = &self.shared;
        shared.core.lock().builder_mut().identity_mut().set_user(
            &shared.config.user,
            shared.host.storage(),
            user_id,
            properties.as_ref(),
        );
        debug!(user_id, "user set");
    }

    /// Explicit flush that waits for the transport result.
    pub async fn flush(&self) -> FlushOutcome {
        let (batch, flushing) = {
            let mut core = self.shared.core.lock();
            let batch = core.begin_flush(FlushTrigger::Manual);
            let flushing = core.queue().is_flushing();
            (batch, flushing)
        };
        let Some(batch) = batch else {
            return if flushing {
                FlushOutcome::InFlight
            } else {
                FlushOutcome::Empty
            };
        };

        let count = batch.len();
        match self.shared.dispatch(batch).await {
            Ok(DeliveryOutcome::Delivered) => FlushOutcome::Delivered(count),
            Ok(DeliveryOutcome::Failed) => FlushOutcome::Failed(count),
            Err(e) => {
                warn!(error = %e, "flush task did not complete");
                FlushOutcome::Failed(count)
            }
        }
    }

    /// Wait until no flush is in flight.
    pub async fn settle(&self) {
        let mut completions = self.shared.completions.subscribe();
        loop {
            if !self.shared.core.lock().queue().is_flushing() {
                return;
            }
            if completions.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn stats(&self) -> AgentStats {
        self.shared.core.lock().stats()
    }

    pub fn queue_len(&self) -> usize {
        self.shared.core.lock().queue().len()
    }

    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        self.shared.core.lock().builder().breadcrumbs()
    }

    pub fn session_id(&self) -> String {
        self.shared.core.lock().builder().identity().session_id.clone()
    }

    pub fn user_id(&self) -> String {
        self.shared.core.lock().builder().identity().user_id.clone()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.shared.config
    }
}

pub struct AgentBuilder {
    config: AgentConfig,
    host: Option<Arc<dyn HostContext>>,
    transport: Option<Arc<dyn Transport>>,
    sources: Vec<Arc<dyn ObservationSource>>,
    sampler: Option<Sampler>,
}

impl AgentBuilder {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config: config.normalized(),
            host: None,
            transport: None,
            sources: Vec::new(),
            sampler: None,
        }
    }

    pub fn host(mut self, host: Arc<dyn HostContext>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn source(mut self, source: Arc<dyn ObservationSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn sampler(mut self, sampler: Sampler) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Must be called inside a tokio runtime. Starts the agent when `autoStart`
    /// is set.
    pub fn build(self) -> Result<Agent> {
        let runtime = Handle::try_current().map_err(|_| AgentError::NoRuntime)?;
        let config = self.config;

        let host = self
            .host
            .unwrap_or_else(|| Arc::new(SystemHost::new(PageContext::default())));
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(Duration::from_millis(
                config.delivery.request_timeout_ms,
            ))?),
        };

        let identity = Identity::resolve(&config.user, host.storage(), host.now_ms());
        let builder = EventBuilder::new(Arc::clone(&host), identity);
        let core = AgentCore::new(
            config.clone(),
            builder,
            self.sampler.unwrap_or_default(),
        );
        let (completions, _) = watch::channel(0);

        let agent = Agent {
            shared: Arc::new(Shared {
                delivery: DeliveryManager::new(transport, config.backend_url.clone()),
                config,
                core: Mutex::new(core),
                lifecycle: Mutex::new(Lifecycle::default()),
                host,
                sources: self.sources,
                runtime,
                completions,
            }),
        };

        if agent.shared.config.debug {
            info!(
                session_id = %agent.session_id(),
                user_id = %agent.user_id(),
                "RUM agent initialized"
            );
        }
        if agent.shared.config.auto_start {
            agent.start();
        }
        Ok(agent)
    }
}
