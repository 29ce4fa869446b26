//! BUILD_IMAGE: build the service image from the workspace
//!
//! The platform builds remotely at deploy time; this local build catches a broken
//! descriptor or dependency set before anything is created on the platform. The tag is
//! fixed per app, so a rebuild replaces the previous image instead of adding one.

use crate::error::DeployError;
use crate::pipeline::context::DeployContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use crate::pipeline::state::DeployState;
use async_trait::async_trait;
use tracing::info;

const LOCAL_TAG: &str = "local";

/// `getmethatdawg/<app>:local`
pub fn image_tag(app_name: &str) -> String {
    format!("getmethatdawg/{}:{}", app_name, LOCAL_TAG)
}

pub struct BuildImagePhase;

#[async_trait]
impl WorkflowPhase for BuildImagePhase {
    fn state(&self) -> DeployState {
        DeployState::BuildImage
    }

    async fn execute(&self, context: &mut DeployContext) -> Result<(), DeployError> {
        let tag = image_tag(context.app_name());
        info!(engine = %context.engine.name(), tag = %tag, "Building service image");
        context
            .engine
            .build(context.workspace.path(), &tag)
            .await
            .map_err(DeployError::Build)?;
        context.image_tag = Some(tag);
        Ok(())
    }
}
