//! Shared state for the web surface

use std::sync::Arc;
use std::time::Instant;

use crate::config::AppConfig;
use crate::detector::Dispatcher;

pub type SharedState = Arc<AppState>;

/// One dispatcher for the whole process; its counters are atomic
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub config: AppConfig,
    started_at: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            config,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
