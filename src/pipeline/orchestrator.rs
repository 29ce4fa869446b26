use super::context::{DeployContext, DeployRequest};
use super::phase_trait::WorkflowPhase;
use super::phases::build_image::{self, BuildImagePhase};
use super::phases::{
    analyze::AnalyzePhase, create_or_update_app::CreateOrUpdateAppPhase, deploy::DeployPhase,
    pre_auth_resolve::PreAuthResolvePhase, stage_secrets::StageSecretsPhase, verify::VerifyPhase,
};
use super::report::DeploymentReport;
use super::state::{DeployState, DeploymentMode};
use crate::assembler::Workspace;
use crate::config::DeployConfig;
use crate::error::DeployError;
use crate::platform::{ContainerEngine, DeploymentPlatform};
use crate::progress::{NoOpHandler, ProgressEvent, ProgressHandler};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Drives one attempt through the state machine
///
/// The attempt workspace is created when [`DeployOrchestrator::deploy`] starts and is
/// owned by the returned future, so it is removed on success, on error, and when the
/// future is dropped before completion. The local image is removed once the attempt
/// ends; after a dropped future, callers use [`DeployOrchestrator::discard_local_image`].
pub struct DeployOrchestrator {
    config: DeployConfig,
    engine: Arc<dyn ContainerEngine>,
    platform: Arc<dyn DeploymentPlatform>,
    progress: Arc<dyn ProgressHandler>,
    workspace_root: Option<PathBuf>,
}

impl DeployOrchestrator {
    pub fn new(
        config: DeployConfig,
        engine: Arc<dyn ContainerEngine>,
        platform: Arc<dyn DeploymentPlatform>,
    ) -> Self {
        Self {
            config,
            engine,
            platform,
            progress: Arc::new(NoOpHandler),
            workspace_root: None,
        }
    }

    pub fn with_progress(mut self, handler: Arc<dyn ProgressHandler>) -> Self {
        self.progress = handler;
        self
    }

    /// Creates attempt workspaces under `dir` instead of the system temp dir
    pub fn with_workspace_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(dir.into());
        self
    }

    fn phases() -> Vec<Box<dyn WorkflowPhase>> {
        vec![
            Box::new(AnalyzePhase),
            Box::new(PreAuthResolvePhase),
            Box::new(BuildImagePhase),
            Box::new(CreateOrUpdateAppPhase),
            Box::new(StageSecretsPhase),
            Box::new(DeployPhase),
            Box::new(VerifyPhase),
        ]
    }

    fn create_workspace(&self) -> Result<Workspace, DeployError> {
        let root = self
            .workspace_root
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        Workspace::create_in(&root).map_err(|e| DeployError::workspace(root, e))
    }

    pub async fn deploy(&self, request: DeployRequest) -> Result<DeploymentReport, DeployError> {
        let start = Instant::now();
        let workspace = self.create_workspace()?;
        let mut context = DeployContext::new(
            request,
            self.config.clone(),
            self.engine.clone(),
            self.platform.clone(),
            workspace,
        );

        info!(
            app = %context.app_name(),
            source = %context.request.source_file.display(),
            workspace = %context.workspace.path().display(),
            "Starting deployment attempt"
        );
        self.progress.on_progress(&ProgressEvent::Started {
            app_name: context.app_name().to_string(),
            mode: context.attempt.mode(),
        });

        let outcome = self.run_phases(&mut context).await;
        if let Some(tag) = context.image_tag.take() {
            self.remove_image(&tag).await;
        }
        outcome?;

        context.attempt.transition(DeployState::Done)?;
        self.progress.on_progress(&ProgressEvent::Completed {
            warnings: context.warnings.len(),
            total_time: start.elapsed(),
        });

        Ok(DeploymentReport {
            app_name: context.app_name().to_string(),
            url: context.url.take(),
            endpoints: std::mem::take(&mut context.endpoints),
            warnings: std::mem::take(&mut context.warnings),
            mode: context.attempt.mode(),
            fallback_taken: context.attempt.fallback_taken(),
            states: context.attempt.history().to_vec(),
        })
    }

    async fn run_phases(&self, context: &mut DeployContext) -> Result<(), DeployError> {
        for phase in Self::phases() {
            let state = phase.state();
            if !phase.applies(context) {
                self.progress
                    .on_progress(&ProgressEvent::PhaseSkipped { state });
                continue;
            }

            if let Err(e) = self.run_phase(phase.as_ref(), context).await {
                let failed_in = context.attempt.state();
                context.attempt.fail();
                self.progress.on_progress(&ProgressEvent::Failed {
                    state: failed_in,
                    error: e.to_string(),
                });
                return Err(e);
            }
        }
        Ok(())
    }

    /// Removes the local image an interrupted attempt for `app_name` may have built
    ///
    /// A dropped [`DeployOrchestrator::deploy`] future cannot run async cleanup itself.
    pub async fn discard_local_image(&self, app_name: &str) {
        self.remove_image(&build_image::image_tag(app_name)).await;
    }

    async fn remove_image(&self, tag: &str) {
        match self.engine.remove_image(tag).await {
            Ok(()) => debug!(tag = %tag, "Removed local image"),
            Err(e) => warn!(tag = %tag, error = %e, "Could not remove local image"),
        }
    }

    async fn run_phase(
        &self,
        phase: &dyn WorkflowPhase,
        context: &mut DeployContext,
    ) -> Result<(), DeployError> {
        let state = phase.state();
        context.attempt.transition(state)?;
        self.progress
            .on_progress(&ProgressEvent::PhaseStarted { state });

        let mode_before = context.attempt.mode();
        let phase_start = Instant::now();
        phase.execute(context).await?;

        if context.attempt.mode() != mode_before {
            self.progress.on_progress(&ProgressEvent::ModeDowngraded {
                from: mode_before,
                to: DeploymentMode::Regular,
            });
        }
        self.progress.on_progress(&ProgressEvent::PhaseComplete {
            state,
            duration: phase_start.elapsed(),
        });
        debug!(phase = %state, "Phase complete");
        Ok(())
    }
}
