//! Shared application state.

use std::sync::Arc;

use pipeline::{EventBus, MemoryStore, Runner};

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Drives bot runs; owns the event bus.
    pub runner: Runner,

    /// Bot and listing storage (shared with the runner).
    pub store: Arc<MemoryStore>,
}

impl AppState {
    pub fn new(runner: Runner, store: Arc<MemoryStore>) -> Self {
        Self { runner, store }
    }

    /// The bus run telemetry flows through.
    pub fn bus(&self) -> &EventBus {
        self.runner.bus()
    }
}
