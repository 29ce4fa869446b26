//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, error, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { app_name, mode } => {
                info!(app = %app_name, mode = %mode, "Starting deployment");
            }
            ProgressEvent::PhaseStarted { state } => {
                info!(phase = %state, "Phase started");
            }
            ProgressEvent::PhaseComplete { state, duration } => {
                debug!(
                    phase = %state,
                    duration_ms = duration.as_millis(),
                    "Phase complete"
                );
            }
            ProgressEvent::PhaseSkipped { state } => {
                debug!(phase = %state, "Phase skipped");
            }
            ProgressEvent::ModeDowngraded { from, to } => {
                warn!(from = %from, to = %to, "Deployment mode downgraded");
            }
            ProgressEvent::Completed {
                warnings,
                total_time,
            } => {
                info!(
                    warnings,
                    total_time_ms = total_time.as_millis(),
                    "Deployment complete"
                );
            }
            ProgressEvent::Failed { state, error } => {
                error!(phase = %state, error = %error, "Deployment failed");
            }
        }
    }
}
