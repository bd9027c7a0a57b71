mod properties;

pub use properties::{Database, OrmProperties};

use dashmap::DashMap;
use std::env;
use std::sync::Arc;

/// Configuration service
///
/// A flat key/value snapshot of external configuration. Process environment
/// variables are loaded on construction; explicit `set` calls take precedence
/// since they land later.
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    pub fn new() -> Self {
        let service = Self::default();
        for (key, value) in env::vars() {
            service.set(&key, &value);
        }
        service
    }

    /// An empty source, with nothing inherited from the environment.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }
}
