//! Per-attempt state shared by the phases

use super::report::VerifyWarning;
use super::state::DeploymentAttempt;
use crate::assembler::{BuildArtifactSet, Workspace};
use crate::config::DeployConfig;
use crate::discovery::{DiscoveryMode, EndpointDescriptor};
use crate::env::EnvBuckets;
use crate::platform::{ContainerEngine, DeploymentPlatform};
use std::path::PathBuf;
use std::sync::Arc;

/// What the caller asked to deploy
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub source_file: PathBuf,
    pub discovery_mode: DiscoveryMode,
    /// Already normalized and validated
    pub app_name: String,
    /// Alternate dependency manifest
    pub requirements: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

impl DeployRequest {
    pub fn new(source_file: impl Into<PathBuf>, app_name: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            discovery_mode: DiscoveryMode::default(),
            app_name: app_name.into(),
            requirements: None,
            env_file: None,
        }
    }
}

/// Everything one attempt owns
///
/// Dropping the context removes the workspace, so every way out of an attempt cleans up.
pub struct DeployContext {
    pub request: DeployRequest,
    pub config: DeployConfig,
    pub engine: Arc<dyn ContainerEngine>,
    pub platform: Arc<dyn DeploymentPlatform>,
    pub workspace: Workspace,
    pub attempt: DeploymentAttempt,

    pub endpoints: Vec<EndpointDescriptor>,
    pub env: EnvBuckets,
    pub artifacts: Option<BuildArtifactSet>,
    /// Set once the local build succeeded; removed when the attempt ends
    pub image_tag: Option<String>,
    pub url: Option<String>,
    pub warnings: Vec<VerifyWarning>,
}

impl DeployContext {
    pub fn new(
        request: DeployRequest,
        config: DeployConfig,
        engine: Arc<dyn ContainerEngine>,
        platform: Arc<dyn DeploymentPlatform>,
        workspace: Workspace,
    ) -> Self {
        let attempt = DeploymentAttempt::new(request.app_name.clone(), config.mode);
        Self {
            request,
            config,
            engine,
            platform,
            workspace,
            attempt,
            endpoints: Vec::new(),
            env: EnvBuckets::default(),
            artifacts: None,
            image_tag: None,
            url: None,
            warnings: Vec::new(),
        }
    }

    pub fn app_name(&self) -> &str {
        self.attempt.app_name()
    }
}
