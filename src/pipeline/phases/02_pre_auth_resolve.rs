//! PRE_AUTH_RESOLVE: obtain the deployment credential from a builder image
//!
//! The first configured image that is present locally or can be pulled is run with the
//! workspace bound in, and writes its encrypted token there. When no image is available
//! the attempt downgrades to regular mode; that is the only fallback in the pipeline.

use crate::credential::{DeployCredential, CREDENTIAL_FILE};
use crate::error::DeployError;
use crate::pipeline::context::DeployContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use crate::pipeline::state::{DeployState, DeploymentMode};
use crate::platform::{ContainerEngine, VolumeBinding, EXPORT_CREDENTIAL, WORKSPACE_MOUNT};
use async_trait::async_trait;
use tracing::{debug, info};

/// First image in `candidates` that is local or pullable
pub async fn locate_image(engine: &dyn ContainerEngine, candidates: &[String]) -> Option<String> {
    for image in candidates {
        match engine.image_exists(image).await {
            Ok(true) => {
                debug!(image = %image, "Found pre-authenticated image locally");
                return Some(image.clone());
            }
            Ok(false) => {}
            Err(e) => debug!(image = %image, error = %e, "Image inspection failed"),
        }
        match engine.pull(image).await {
            Ok(true) => {
                info!(image = %image, "Pulled pre-authenticated image");
                return Some(image.clone());
            }
            Ok(false) => debug!(image = %image, "Image not available from registry"),
            Err(e) => debug!(image = %image, error = %e, "Image pull failed"),
        }
    }
    None
}

pub struct PreAuthResolvePhase;

#[async_trait]
impl WorkflowPhase for PreAuthResolvePhase {
    fn state(&self) -> DeployState {
        DeployState::PreAuthResolve
    }

    fn applies(&self, context: &DeployContext) -> bool {
        context.attempt.mode() == DeploymentMode::PreAuth
    }

    async fn execute(&self, context: &mut DeployContext) -> Result<(), DeployError> {
        let Some(image) =
            locate_image(context.engine.as_ref(), &context.config.preauth_images).await
        else {
            info!(
                tried = context.config.preauth_images.len(),
                "No pre-authenticated image available"
            );
            return context.attempt.downgrade_to_regular();
        };

        let binding = VolumeBinding::new(context.workspace.path(), WORKSPACE_MOUNT);
        let args = vec![
            EXPORT_CREDENTIAL.to_string(),
            format!("{}/{}", WORKSPACE_MOUNT, CREDENTIAL_FILE),
        ];
        context
            .engine
            .run(&image, &[binding], &args)
            .await
            .map_err(DeployError::Build)?;

        let path = context.workspace.join(CREDENTIAL_FILE);
        let read = std::fs::read_to_string(&path);
        // Remove before decrypting so the ciphertext never outlives this step.
        let removed = std::fs::remove_file(&path);
        let ciphertext = read.map_err(|e| DeployError::workspace(&path, e))?;
        removed.map_err(|e| DeployError::workspace(&path, e))?;

        let credential =
            DeployCredential::from_ciphertext(&ciphertext, &context.config.credential_passphrase)?;
        info!(image = %image, "Resolved deployment credential");
        context.attempt.set_credential(credential);
        Ok(())
    }
}
