//! Host environment seam.
//!
//! Everything the agent would otherwise read from ambient globals (page location,
//! document title, wall clock, durable storage) is reached through a single
//! [`HostContext`] handed to the agent at construction. Tests supply a fake; a
//! non-browser host supplies [`SystemHost`].

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::error::StorageError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContext {
    pub url: String,
    pub path: String,
    pub title: String,
    pub referrer: Option<String>,
}

/// Navigation timing marks, in ms relative to navigation start.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NavigationTiming {
    pub fetch_start: f64,
    pub request_start: f64,
    pub response_start: f64,
    pub response_end: f64,
    pub dom_interactive: f64,
    pub dom_content_loaded_start: f64,
    pub dom_content_loaded_end: f64,
    pub load_event_end: f64,
}

pub trait HostContext: Send + Sync {
    /// Wall clock, epoch milliseconds.
    fn now_ms(&self) -> u64;

    fn page(&self) -> PageContext;

    fn user_agent(&self) -> Option<String> {
        None
    }

    /// `None` until the page has finished loading.
    fn navigation_timing(&self) -> Option<NavigationTiming> {
        None
    }

    fn navigation_type(&self) -> Option<String> {
        None
    }

    /// Durable storage; absent in restricted hosts.
    fn storage(&self) -> Option<&dyn KeyValueStorage> {
        None
    }
}

/// Key/value storage that may fail at any call.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-memory implementation of the key/value store.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// File-based implementation of the key/value store. The whole map is written
/// back as JSON on every `set`.
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Open and load any existing content. A missing file is an empty store.
    pub fn open(path: PathBuf) -> Result<Self, StorageError> {
        let store = Self::new(path);
        store.load()?;
        Ok(store)
    }

    fn load(&self) -> Result<(), StorageError> {
        if !self.path.exists() {
            return Ok(());
        }
        let content = fs::read_to_string(&self.path)?;
        let loaded: HashMap<String, String> = serde_json::from_str(&content)?;
        *self.entries.lock() = loaded;
        Ok(())
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }
}

/// Host for processes outside a browser: a fixed page context, the system clock
/// and optional storage.
pub struct SystemHost {
    page: PageContext,
    user_agent: Option<String>,
    storage: Option<Box<dyn KeyValueStorage>>,
}

impl SystemHost {
    pub fn new(page: PageContext) -> Self {
        Self {
            page,
            user_agent: None,
            storage: None,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_storage(mut self, storage: impl KeyValueStorage + 'static) -> Self {
        self.storage = Some(Box::new(storage));
        self
    }
}

impl HostContext for SystemHost {
    fn now_ms(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
    }

    fn page(&self) -> PageContext {
        self.page.clone()
    }

    fn user_agent(&self) -> Option<String> {
        self.user_agent.clone()
    }

    fn storage(&self) -> Option<&dyn KeyValueStorage> {
        self.storage.as_deref()
    }
}
