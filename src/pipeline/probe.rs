//! Stage boundary observer.
//!
//! A [`StageProbe`] attached to a request as an extension records the order
//! in which stages saw that request. Production requests carry no probe and
//! pay only an extension lookup; tests attach one to assert ordering.

use std::sync::{Arc, Mutex};

use axum::extract::Request;

use crate::pipeline::Stage;

/// Records stage entries for a single request.
#[derive(Debug, Clone, Default)]
pub struct StageProbe {
    entries: Arc<Mutex<Vec<Stage>>>,
}

impl StageProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages seen so far, in entry order.
    pub fn entries(&self) -> Vec<Stage> {
        self.entries.lock().expect("probe mutex poisoned").clone()
    }

    fn record(&self, stage: Stage) {
        self.entries.lock().expect("probe mutex poisoned").push(stage);
    }
}

/// Record `stage` against the request's probe, if one is attached.
pub(crate) fn mark(request: &Request, stage: Stage) {
    if let Some(probe) = request.extensions().get::<StageProbe>() {
        probe.record(stage);
    }
}
