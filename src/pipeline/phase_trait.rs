use super::context::DeployContext;
use super::state::DeployState;
use crate::error::DeployError;
use async_trait::async_trait;

/// One state's worth of work
#[async_trait]
pub trait WorkflowPhase: Send + Sync {
    /// State the attempt enters before `execute` runs
    fn state(&self) -> DeployState;

    /// Optional states return `false` to be skipped for this attempt
    fn applies(&self, _context: &DeployContext) -> bool {
        true
    }

    async fn execute(&self, context: &mut DeployContext) -> Result<(), DeployError>;
}
