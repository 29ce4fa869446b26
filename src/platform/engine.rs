//! Container engine seam

use super::process::{self, ProcessError, ProcessSpec, StdoutMode};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Container path the attempt workspace is bound to
pub const WORKSPACE_MOUNT: &str = "/workspace";

/// Command a pre-authenticated builder image accepts to write its encrypted token
pub const EXPORT_CREDENTIAL: &str = "export-credential";

/// Host directory bound into a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeBinding {
    pub host: PathBuf,
    pub container: String,
}

impl VolumeBinding {
    pub fn new(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
        }
    }

    fn as_arg(&self) -> String {
        format!("{}:{}", self.host.display(), self.container)
    }
}

/// Operations the orchestrator needs from a container engine
///
/// Every call blocks the attempt until the engine exits; output is streamed meanwhile.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Builds `context_dir/Dockerfile` into `tag`
    async fn build(&self, context_dir: &Path, tag: &str) -> Result<(), ProcessError>;

    /// Runs `image` to completion with the given bindings and arguments
    async fn run(
        &self,
        image: &str,
        volumes: &[VolumeBinding],
        args: &[String],
    ) -> Result<(), ProcessError>;

    /// Whether `image` is present locally
    async fn image_exists(&self, image: &str) -> Result<bool, ProcessError>;

    /// Tries to pull `image`; `Ok(false)` when the registry does not have it
    async fn pull(&self, image: &str) -> Result<bool, ProcessError>;

    /// Deletes a locally built image
    async fn remove_image(&self, image: &str) -> Result<(), ProcessError>;

    fn name(&self) -> &str;
}

/// Docker (or a CLI-compatible engine such as podman)
#[derive(Debug, Clone)]
pub struct DockerCli {
    bin: String,
}

impl DockerCli {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    fn command(&self) -> ProcessSpec {
        ProcessSpec::new(self.bin.clone())
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[async_trait]
impl ContainerEngine for DockerCli {
    async fn build(&self, context_dir: &Path, tag: &str) -> Result<(), ProcessError> {
        info!(tag = %tag, context = %context_dir.display(), "Building container image");
        let spec = self
            .command()
            .args(["build", "--tag", tag, "--file"])
            .arg(context_dir.join("Dockerfile").display().to_string())
            .arg(context_dir.display().to_string());
        process::run_checked(&spec, StdoutMode::Forward).await?;
        Ok(())
    }

    async fn run(
        &self,
        image: &str,
        volumes: &[VolumeBinding],
        args: &[String],
    ) -> Result<(), ProcessError> {
        let mut spec = self.command().args(["run", "--rm"]);
        for volume in volumes {
            spec = spec.arg("--volume").arg(volume.as_arg());
        }
        let spec = spec.arg(image).args(args.iter().cloned());
        process::run_checked(&spec, StdoutMode::Forward).await?;
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> Result<bool, ProcessError> {
        let spec = self.command().args(["image", "inspect", image]).quiet();
        let output = process::run(&spec, StdoutMode::Discard).await?;
        debug!(image = %image, present = output.success, "Inspected image");
        Ok(output.success)
    }

    async fn pull(&self, image: &str) -> Result<bool, ProcessError> {
        info!(image = %image, "Pulling image");
        let spec = self.command().args(["pull", image]).quiet();
        let output = process::run(&spec, StdoutMode::Forward).await?;
        if !output.success {
            debug!(image = %image, stderr = %output.stderr_tail, "Pull failed");
        }
        Ok(output.success)
    }

    async fn remove_image(&self, image: &str) -> Result<(), ProcessError> {
        debug!(image = %image, "Removing image");
        let spec = self.command().args(["image", "rm", "--force", image]).quiet();
        process::run_checked(&spec, StdoutMode::Discard).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.bin
    }
}
