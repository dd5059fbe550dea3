//! Shared helpers for correlation integration tests

#![allow(dead_code)]

use jrmsg_core::{Response, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Collects every outcome delivered to the callbacks it hands out
#[derive(Clone, Default)]
pub struct Recorder {
    outcomes: Arc<Mutex<Vec<Result<Response>>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback that appends its outcome to this recorder
    pub fn callback(&self) -> impl FnOnce(Result<Response>) + Send + 'static {
        let outcomes = self.outcomes.clone();
        move |outcome| outcomes.lock().push(outcome)
    }

    pub fn outcomes(&self) -> Vec<Result<Response>> {
        self.outcomes.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.outcomes.lock().len()
    }
}

/// Let spawned timer tasks run (time auto-advances when paused)
pub async fn advance(ms: u64) {
    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
}
