#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rum_agent::kernel::host::{HostContext, KeyValueStorage, MemoryStorage, NavigationTiming, PageContext};
use rum_agent::kernel::sampling::Sampler;
use rum_agent::{Agent, AgentConfig, StorageError, Transport, TransportError};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const ENDPOINT: &str = "https://rum.example.test/collect";

/// Host with a hand-driven clock.
pub struct FakeHost {
    now: AtomicU64,
    page: Mutex<PageContext>,
    navigation: Mutex<Option<NavigationTiming>>,
    storage: Option<Box<dyn KeyValueStorage>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            now: AtomicU64::new(1_700_000_000_000),
            page: Mutex::new(PageContext {
                url: "https://shop.example/cart".to_string(),
                path: "/cart".to_string(),
                title: "Cart".to_string(),
                referrer: None,
            }),
            navigation: Mutex::new(None),
            storage: Some(Box::new(MemoryStorage::new())),
        }
    }

    pub fn with_storage(mut self, storage: impl KeyValueStorage + 'static) -> Self {
        self.storage = Some(Box::new(storage));
        self
    }

    pub fn without_storage(mut self) -> Self {
        self.storage = None;
        self
    }

    pub fn with_navigation(self, timing: NavigationTiming) -> Self {
        *self.navigation.lock() = Some(timing);
        self
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn navigate(&self, url: &str, path: &str) {
        let mut page = self.page.lock();
        page.url = url.to_string();
        page.path = path.to_string();
    }
}

impl HostContext for FakeHost {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn page(&self) -> PageContext {
        self.page.lock().clone()
    }

    fn user_agent(&self) -> Option<String> {
        Some("test-agent/1.0".to_string())
    }

    fn navigation_timing(&self) -> Option<NavigationTiming> {
        *self.navigation.lock()
    }

    fn storage(&self) -> Option<&dyn KeyValueStorage> {
        self.storage.as_deref()
    }
}

/// Storage whose every call fails, like a browser with storage disabled.
pub struct BrokenStorage;

impl KeyValueStorage for BrokenStorage {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }
}

/// Storage shared between agent instances in one test.
#[derive(Clone, Default)]
pub struct SharedStorage(pub Arc<MemoryStorage>);

impl KeyValueStorage for SharedStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.0.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.0.set(key, value)
    }
}

/// Records every POST. Responses come from a script, then default to 200.
#[derive(Default)]
pub struct RecordingTransport {
    script: Mutex<VecDeque<Result<u16, String>>>,
    attempts: Mutex<Vec<Vec<Value>>>,
    delivered: Mutex<Vec<Value>>,
    endpoints: Mutex<Vec<String>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, response: Result<u16, &str>) {
        self.script
            .lock()
            .push_back(response.map_err(|e| e.to_string()));
    }

    /// Every attempted batch, in call order.
    pub fn attempts(&self) -> Vec<Vec<Value>> {
        self.attempts.lock().clone()
    }

    /// Every event of every successful batch, in delivery order.
    pub fn delivered(&self) -> Vec<Value> {
        self.delivered.lock().clone()
    }

    pub fn delivered_of_type(&self, event_type: &str) -> Vec<Value> {
        self.delivered()
            .into_iter()
            .filter(|e| e["type"] == event_type)
            .collect()
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.endpoints.lock().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post(&self, endpoint: &str, body: String) -> Result<u16, TransportError> {
        let events: Vec<Value> = serde_json::from_str(&body)?;
        self.endpoints.lock().push(endpoint.to_string());
        self.attempts.lock().push(events.clone());

        let response = self.script.lock().pop_front().unwrap_or(Ok(200));
        match response {
            Ok(status) => {
                if (200..300).contains(&status) {
                    self.delivered.lock().extend(events);
                }
                Ok(status)
            }
            Err(message) => Err(TransportError::Request(message)),
        }
    }
}

/// Config that does nothing on its own: no auto start, no initial page capture,
/// a batch size and flush interval large enough to stay out of the way.
pub fn quiet_config() -> AgentConfig {
    let mut config = AgentConfig::new(ENDPOINT);
    config.auto_start = false;
    config.batch_size = 1_000;
    config.flush_interval_ms = 3_600_000;
    config.metrics.page_views = false;
    config.metrics.page_speed = false;
    config.metrics.engagement = false;
    config
}

pub fn build_agent(config: AgentConfig, host: Arc<FakeHost>, transport: Arc<RecordingTransport>) -> Agent {
    Agent::builder(config)
        .host(host)
        .transport(transport)
        .sampler(Sampler::seeded(7))
        .build()
        .expect("agent builds inside a runtime")
}

/// Custom event names of a list of wire events.
pub fn event_names(events: &[Value]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| e["data"]["eventName"].as_str().map(str::to_string))
        .collect()
}
