//! CREATE_OR_UPDATE_APP: make sure the platform application exists
//!
//! Looked up by name first, so re-running against an existing app is a no-op.

use crate::error::DeployError;
use crate::pipeline::context::DeployContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use crate::pipeline::state::DeployState;
use async_trait::async_trait;
use tracing::info;

pub struct CreateOrUpdateAppPhase;

#[async_trait]
impl WorkflowPhase for CreateOrUpdateAppPhase {
    fn state(&self) -> DeployState {
        DeployState::CreateOrUpdateApp
    }

    async fn execute(&self, context: &mut DeployContext) -> Result<(), DeployError> {
        let app = context.attempt.app_name();
        let credential = context.attempt.credential();

        let apps = context
            .platform
            .list_apps(credential)
            .await
            .map_err(DeployError::Deploy)?;

        if apps.iter().any(|existing| existing == app) {
            info!(app = %app, "Application exists, updating");
            return Ok(());
        }

        context
            .platform
            .create_app(app, credential)
            .await
            .map_err(DeployError::Deploy)?;
        info!(app = %app, "Created application");
        Ok(())
    }
}
