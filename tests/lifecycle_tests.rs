mod common;

use common::{build_agent, event_names, quiet_config, FakeHost, RecordingTransport};
use rum_agent::kernel::host::NavigationTiming;
use rum_agent::kernel::rating::VitalName;
use rum_agent::kernel::source::{SignalSink, Subscription};
use rum_agent::{Agent, AgentError, ObservationSource, Signal, SignalChannel, SignalKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn vital(value: f64) -> Signal {
    Signal::WebVital {
        name: VitalName::Lcp,
        value,
        navigation_type: None,
    }
}

/// A source the host cannot provide.
struct UnsupportedSource {
    attempts: AtomicUsize,
}

impl ObservationSource for UnsupportedSource {
    fn kind(&self) -> SignalKind {
        SignalKind::LongTasks
    }

    fn subscribe(&self, _sink: SignalSink) -> Result<Subscription, AgentError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AgentError::ObservationUnavailable {
            kind: SignalKind::LongTasks,
            reason: "longtask entries not supported".to_string(),
        })
    }
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let vitals = SignalChannel::new(SignalKind::WebVitals);
    let transport = RecordingTransport::new();
    let agent = Agent::builder(quiet_config())
        .host(Arc::new(FakeHost::new()))
        .transport(transport.clone())
        .source(Arc::new(vitals.clone()))
        .build()
        .unwrap();

    agent.start();
    agent.start();
    assert!(agent.is_running());
    assert_eq!(vitals.subscriber_count(), 1, "Second start must not subscribe again");

    vitals.emit(vital(1200.0));
    assert_eq!(agent.queue_len(), 1, "One signal, one envelope");
}

#[tokio::test]
async fn test_stop_unsubscribes_and_is_idempotent() {
    let vitals = SignalChannel::new(SignalKind::WebVitals);
    let agent = Agent::builder(quiet_config())
        .host(Arc::new(FakeHost::new()))
        .transport(RecordingTransport::new())
        .source(Arc::new(vitals.clone()))
        .build()
        .unwrap();

    agent.start();
    agent.stop();
    agent.stop();
    assert!(!agent.is_running());
    assert_eq!(vitals.subscriber_count(), 0);
    assert!(!vitals.emit(vital(1200.0)), "Nobody listens after stop");

    // Restart wires everything again
    agent.start();
    assert_eq!(vitals.subscriber_count(), 1);
    assert!(vitals.emit(vital(1200.0)));
}

#[tokio::test]
async fn test_disabled_and_unavailable_sources_are_skipped() {
    let vitals = SignalChannel::new(SignalKind::WebVitals);
    let logs = SignalChannel::new(SignalKind::ConsoleLogs);
    let unsupported = Arc::new(UnsupportedSource {
        attempts: AtomicUsize::new(0),
    });

    let mut config = quiet_config();
    config.metrics.long_tasks = true;
    let agent = Agent::builder(config)
        .host(Arc::new(FakeHost::new()))
        .transport(RecordingTransport::new())
        .source(Arc::new(vitals.clone()))
        .source(Arc::new(logs.clone()))
        .source(unsupported.clone())
        .build()
        .unwrap();

    agent.start();
    assert_eq!(unsupported.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(logs.subscriber_count(), 0, "Console capture is disabled by default");
    assert_eq!(vitals.subscriber_count(), 1, "Unavailable sources do not block the rest");
    assert!(agent.is_running());
}

#[tokio::test]
async fn test_auto_start_captures_initial_page() {
    let transport = RecordingTransport::new();
    let host = Arc::new(FakeHost::new().with_navigation(NavigationTiming {
        fetch_start: 10.0,
        request_start: 20.0,
        response_start: 80.0,
        response_end: 120.0,
        dom_interactive: 400.0,
        dom_content_loaded_start: 420.0,
        dom_content_loaded_end: 450.0,
        load_event_end: 900.0,
    }));
    let mut config = quiet_config();
    config.auto_start = true;
    config.metrics.page_views = true;
    config.metrics.page_speed = true;

    let agent = build_agent(config, host, transport.clone());
    assert!(agent.is_running());
    agent.flush().await;

    let page_view = &transport.delivered_of_type("pageView")[0];
    assert_eq!(page_view["data"]["pagePath"], "/cart");
    assert_eq!(page_view["data"]["pageTitle"], "Cart");

    let speed = &transport.delivered_of_type("pageSpeed")[0];
    assert_eq!(speed["data"]["loadTime"], 890.0);
    assert_eq!(speed["data"]["domContentLoaded"], 440.0);
    assert_eq!(speed["data"]["resourceLoadTime"], 780.0);
}

#[tokio::test]
async fn test_page_speed_skipped_before_load() {
    let transport = RecordingTransport::new();
    let host = Arc::new(FakeHost::new().with_navigation(NavigationTiming::default()));
    let mut config = quiet_config();
    config.metrics.page_speed = true;

    let agent = build_agent(config, host, transport.clone());
    agent.start();
    agent.flush().await;
    assert!(transport.delivered_of_type("pageSpeed").is_empty());
}

#[tokio::test]
async fn test_stop_flushes_with_final_engagement() {
    let engagement = SignalChannel::new(SignalKind::Engagement);
    let transport = RecordingTransport::new();
    let host = Arc::new(FakeHost::new());
    let mut config = quiet_config();
    config.metrics.engagement = true;

    let agent = Agent::builder(config)
        .host(host.clone())
        .transport(transport.clone())
        .source(Arc::new(engagement.clone()))
        .build()
        .unwrap();
    agent.start();

    agent.track_custom_event("A", None, None);
    engagement.emit(Signal::Interaction);
    engagement.emit(Signal::Interaction);
    engagement.emit(Signal::Scroll { depth_percent: 40.0 });
    engagement.emit(Signal::Scroll { depth_percent: 72.6 });
    engagement.emit(Signal::Scroll { depth_percent: 10.0 });
    host.advance(12_000);

    agent.stop();
    agent.settle().await;

    let delivered = transport.delivered();
    assert_eq!(delivered.len(), 2, "Final flush carries everything queued");
    assert_eq!(event_names(&delivered), ["A"]);
    let exit = &transport.delivered_of_type("engagement")[0];
    assert_eq!(exit["data"]["exitType"], "close");
    assert_eq!(exit["data"]["timeOnPage"], 12_000);
    assert_eq!(exit["data"]["scrollDepth"], 73, "Max depth, rounded");
    assert_eq!(exit["data"]["interactionCount"], 5, "Scrolls count as interactions");

    let crumbs = agent.breadcrumbs();
    assert_eq!(crumbs.last().unwrap().message, "Page exit: close, Time: 12000ms");
}

#[tokio::test]
async fn test_stop_while_flushing_still_sends_the_rest() {
    let transport = RecordingTransport::new();
    let mut config = quiet_config();
    config.batch_size = 1;
    let agent = build_agent(config, Arc::new(FakeHost::new()), transport.clone());
    agent.start();

    // 1. A leaves on the size trigger; B queues behind it
    agent.track_custom_event("A", None, None);
    agent.track_custom_event("B", None, None);
    assert_eq!(agent.queue_len(), 1);

    // 2. Stop cannot flush yet; the final flush follows A's completion
    agent.stop();
    agent.settle().await;

    assert!(!agent.is_running());
    assert_eq!(event_names(&transport.delivered()), ["A", "B"]);
    assert_eq!(agent.queue_len(), 0);
    assert_eq!(transport.attempts().len(), 2);
}

#[tokio::test]
async fn test_deferred_final_flush_carries_failed_batch_and_engagement() {
    let transport = RecordingTransport::new();
    let mut config = quiet_config();
    config.batch_size = 1;
    config.metrics.engagement = true;
    let agent = build_agent(config, Arc::new(FakeHost::new()), transport.clone());
    agent.start();

    transport.respond(Err("connection reset"));
    agent.track_custom_event("A", None, None);
    agent.stop();
    agent.settle().await;

    let attempts = transport.attempts();
    assert_eq!(attempts.len(), 2, "One failed attempt, one final flush");
    assert_eq!(attempts[1].len(), 2);
    assert_eq!(attempts[1][0]["data"]["eventName"], "A", "Failed batch goes first");
    assert_eq!(attempts[1][1]["type"], "engagement");
    assert_eq!(agent.queue_len(), 0);
}

#[tokio::test]
async fn test_restart_after_deferred_stop_resumes_normally() {
    let transport = RecordingTransport::new();
    let mut config = quiet_config();
    config.batch_size = 1;
    let agent = build_agent(config, Arc::new(FakeHost::new()), transport.clone());
    agent.start();

    agent.track_custom_event("A", None, None);
    agent.track_custom_event("B", None, None);
    agent.stop();
    agent.start();
    agent.settle().await;

    // Running again: B waits for the next trigger instead of a shutdown flush
    assert_eq!(event_names(&transport.delivered()), ["A"]);
    assert_eq!(agent.queue_len(), 1);
    assert_eq!(agent.flush().await, rum_agent::FlushOutcome::Delivered(1));
}

#[tokio::test]
async fn test_page_hidden_reports_navigation_exit() {
    let transport = RecordingTransport::new();
    let mut config = quiet_config();
    config.metrics.engagement = true;
    let agent = build_agent(config, Arc::new(FakeHost::new()), transport.clone());

    agent.ingest(Signal::PageHidden);
    agent.flush().await;

    let exit = &transport.delivered_of_type("engagement")[0];
    assert_eq!(exit["data"]["exitType"], "navigation");
}

#[tokio::test]
async fn test_track_page_view_links_previous_page() {
    let transport = RecordingTransport::new();
    let host = Arc::new(FakeHost::new());
    let agent = build_agent(quiet_config(), host.clone(), transport.clone());

    agent.track_page_view();
    host.navigate("https://shop.example/checkout", "/checkout");
    agent.track_page_view();
    agent.flush().await;

    let views = transport.delivered_of_type("pageView");
    assert_eq!(views.len(), 2);
    assert!(views[0]["data"].get("previousPage").is_none());
    assert_eq!(views[1]["data"]["previousPage"], "/cart");
    assert_eq!(views[1]["pageUrl"], "https://shop.example/checkout");
}

#[test]
fn test_build_requires_runtime() {
    let result = Agent::builder(quiet_config())
        .transport(RecordingTransport::new())
        .build();
    assert!(matches!(result, Err(AgentError::NoRuntime)));
}

#[tokio::test]
async fn test_dropped_agent_stops_delivering_signals() {
    let vitals = SignalChannel::new(SignalKind::WebVitals);
    {
        let agent = Agent::builder(quiet_config())
            .host(Arc::new(FakeHost::new()))
            .transport(RecordingTransport::new())
            .source(Arc::new(vitals.clone()))
            .build()
            .unwrap();
        agent.start();
        agent.stop();
    }
    assert_eq!(vitals.subscriber_count(), 0);
    assert!(!vitals.emit(vital(100.0)));
}
