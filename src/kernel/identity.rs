use tracing::{debug, warn};
use uuid::Uuid;

use super::config::UserConfig;
use super::host::KeyValueStorage;
use crate::error::StorageError;

pub const ANONYMOUS_USER: &str = "anonymous";

/// User and session identifiers stamped on every envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub session_id: String,
}

impl Identity {
    /// Resolve identity for a new agent instance. The user id is read from storage
    /// or created there; any storage failure degrades to a non-persisted id. The
    /// session id is fresh on every call.
    pub fn resolve(config: &UserConfig, storage: Option<&dyn KeyValueStorage>, now_ms: u64) -> Self {
        let user_id = if !config.enable_user_tracking {
            ANONYMOUS_USER.to_string()
        } else {
            match load_or_create_user(&config.user_id_storage_key, storage, now_ms) {
                Ok(id) => id,
                Err(e) => {
                    warn!(error = %e, "user id storage unavailable, using ephemeral id");
                    generate_id("user", now_ms)
                }
            }
        };

        Self {
            user_id,
            session_id: generate_id("session", now_ms),
        }
    }

    /// Explicit identity change. Persisted when tracking is enabled; storage
    /// failures are logged and otherwise ignored.
    pub fn set_user(
        &mut self,
        config: &UserConfig,
        storage: Option<&dyn KeyValueStorage>,
        user_id: &str,
        properties: Option<&serde_json::Value>,
    ) {
        self.user_id = user_id.to_string();
        if !config.enable_user_tracking {
            return;
        }
        if let Err(e) = persist_user(&config.user_id_storage_key, storage, user_id, properties) {
            warn!(error = %e, "failed to persist user");
        }
    }
}

fn load_or_create_user(
    key: &str,
    storage: Option<&dyn KeyValueStorage>,
    now_ms: u64,
) -> Result<String, StorageError> {
    let storage = storage.ok_or(StorageError::Unavailable)?;
    if let Some(existing) = storage.get(key)?.filter(|id| !id.is_empty()) {
        debug!(user_id = %existing, "loaded persisted user id");
        return Ok(existing);
    }
    let id = generate_id("user", now_ms);
    storage.set(key, &id)?;
    Ok(id)
}

fn persist_user(
    key: &str,
    storage: Option<&dyn KeyValueStorage>,
    user_id: &str,
    properties: Option<&serde_json::Value>,
) -> Result<(), StorageError> {
    let storage = storage.ok_or(StorageError::Unavailable)?;
    storage.set(key, user_id)?;
    if let Some(props) = properties {
        storage.set(&format!("{}_props", key), &serde_json::to_string(props)?)?;
    }
    Ok(())
}

/// `<prefix>-<epoch ms>-<9 random chars>`
pub fn generate_id(prefix: &str, now_ms: u64) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", prefix, now_ms, &random[..9])
}
