use std::collections::BTreeMap;
use std::sync::Arc;

use crate::protocol::{Request, Response};

/// Business-logic capability consumed by the dispatcher. Handlers run on the
/// blocking pool and may perform blocking I/O; failures are returned, never
/// allowed to take the connection down.
pub trait CommandHandler: Send + Sync {
    fn execute(&self, request: &Request) -> anyhow::Result<Response>;

    /// One-line usage text shown by `help`.
    fn description(&self) -> &str;
}

/// Name → handler table, built once at startup and shared read-only.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: BTreeMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// `(name, description)` pairs in name order.
    pub fn descriptions(&self) -> Vec<(String, String)> {
        self.handlers
            .iter()
            .map(|(name, h)| (name.clone(), h.description().to_string()))
            .collect()
    }
}
