use std::sync::Arc;
use std::time::{Duration, Instant};

use calmerge_core::CalendarEngine;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    engine: Arc<CalendarEngine>,
    started: Instant,
}

impl AppState {
    pub fn new(engine: Arc<CalendarEngine>) -> Self {
        AppState {
            engine,
            started: Instant::now(),
        }
    }

    pub fn engine(&self) -> &CalendarEngine {
        &self.engine
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}
