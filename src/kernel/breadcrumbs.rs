use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const MAX_BREADCRUMBS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BreadcrumbCategory {
    Navigation,
    Interaction,
    Log,
    Transport,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub timestamp: u64,
    #[serde(rename = "type")]
    pub category: BreadcrumbCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Fixed-capacity trail of recent context, oldest first.
#[derive(Debug)]
pub struct BreadcrumbBuffer {
    buffer: VecDeque<Breadcrumb>,
}

impl BreadcrumbBuffer {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(MAX_BREADCRUMBS),
        }
    }

    pub fn record(
        &mut self,
        timestamp: u64,
        category: BreadcrumbCategory,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) {
        if self.buffer.len() >= MAX_BREADCRUMBS {
            self.buffer.pop_front();
        }
        self.buffer.push_back(Breadcrumb {
            timestamp,
            category,
            message: message.into(),
            data,
        });
    }

    /// Owned copy; later records never alter a snapshot already taken.
    pub fn snapshot(&self) -> Vec<Breadcrumb> {
        self.buffer.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for BreadcrumbBuffer {
    fn default() -> Self {
        Self::new()
    }
}
