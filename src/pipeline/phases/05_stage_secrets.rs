//! STAGE_SECRETS: set every secret through the platform before deploying
//!
//! Any single failure aborts the attempt.

use crate::error::DeployError;
use crate::pipeline::context::DeployContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use crate::pipeline::state::DeployState;
use async_trait::async_trait;
use tracing::info;

pub struct StageSecretsPhase;

#[async_trait]
impl WorkflowPhase for StageSecretsPhase {
    fn state(&self) -> DeployState {
        DeployState::StageSecrets
    }

    fn applies(&self, context: &DeployContext) -> bool {
        !context.env.secrets.is_empty()
    }

    async fn execute(&self, context: &mut DeployContext) -> Result<(), DeployError> {
        let app = context.attempt.app_name();
        let credential = context.attempt.credential();

        for entry in &context.env.secrets {
            context
                .platform
                .set_secret(app, &entry.key, &entry.value, credential)
                .await
                .map_err(|source| DeployError::SecretStaging {
                    key: entry.key.clone(),
                    source,
                })?;
            info!(app = %app, key = %entry.key, "Staged secret");
        }
        Ok(())
    }
}
