//! DEPLOY: remote build and release, streamed

use crate::error::DeployError;
use crate::pipeline::context::DeployContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use crate::pipeline::state::DeployState;
use async_trait::async_trait;

pub struct DeployPhase;

#[async_trait]
impl WorkflowPhase for DeployPhase {
    fn state(&self) -> DeployState {
        DeployState::Deploy
    }

    async fn execute(&self, context: &mut DeployContext) -> Result<(), DeployError> {
        context
            .platform
            .deploy(
                context.workspace.path(),
                context.attempt.app_name(),
                context.attempt.credential(),
            )
            .await
            .map_err(DeployError::Deploy)
    }
}
