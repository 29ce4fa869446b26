//! Progress handler trait and events

use crate::pipeline::{DeployState, DeploymentMode};
use std::time::Duration;

/// Events emitted while an attempt moves through its states
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Attempt started
    Started {
        app_name: String,
        mode: DeploymentMode,
    },

    /// A state's work began
    PhaseStarted { state: DeployState },

    /// A state's work finished
    PhaseComplete {
        state: DeployState,
        duration: Duration,
    },

    /// An optional state did not apply to this attempt
    PhaseSkipped { state: DeployState },

    /// The attempt switched credential mode
    ModeDowngraded {
        from: DeploymentMode,
        to: DeploymentMode,
    },

    /// Attempt reached DONE
    Completed { warnings: usize, total_time: Duration },

    /// Attempt reached FAILED
    Failed { state: DeployState, error: String },
}

/// Receives progress events during an attempt
pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// Handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}
