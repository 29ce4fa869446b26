//! In-memory collaborators for tests
//!
//! Both fakes record every call so tests can assert on ordering and arguments without
//! a container engine or platform account.

use super::engine::{ContainerEngine, VolumeBinding, EXPORT_CREDENTIAL, WORKSPACE_MOUNT};
use super::fly::DeploymentPlatform;
use super::process::ProcessError;
use crate::credential::DeployCredential;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Build { context_dir: PathBuf, tag: String },
    Run { image: String, args: Vec<String> },
    ImageExists(String),
    Pull(String),
    RemoveImage(String),
}

#[derive(Default)]
pub struct MockContainerEngine {
    local_images: Mutex<HashSet<String>>,
    pullable_images: HashSet<String>,
    build_failure: Option<String>,
    hang_on_build: bool,
    credential_ciphertext: Option<String>,
    calls: Mutex<Vec<EngineCall>>,
}

impl MockContainerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local_image(self, image: &str) -> Self {
        self.local_images.lock().unwrap().insert(image.to_string());
        self
    }

    pub fn with_pullable_image(mut self, image: &str) -> Self {
        self.pullable_images.insert(image.to_string());
        self
    }

    /// Builds exit non-zero with `stderr` as the tool's output
    pub fn failing_build(mut self, stderr: &str) -> Self {
        self.build_failure = Some(stderr.to_string());
        self
    }

    /// Builds never finish; used to exercise cancellation
    pub fn hanging_build(mut self) -> Self {
        self.hang_on_build = true;
        self
    }

    /// `export-credential` runs write `ciphertext` into the bound workspace
    pub fn exporting_credential(mut self, ciphertext: &str) -> Self {
        self.credential_ciphertext = Some(ciphertext.to_string());
        self
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Images removed so far, in order
    pub fn removed_images(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::RemoveImage(image) => Some(image),
                _ => None,
            })
            .collect()
    }

    pub fn build_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, EngineCall::Build { .. }))
            .count()
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn failure(command: String, stderr: &str) -> ProcessError {
        ProcessError::Failed {
            command,
            code: Some(1),
            stderr_tail: stderr.to_string(),
        }
    }
}

#[async_trait]
impl ContainerEngine for MockContainerEngine {
    async fn build(&self, context_dir: &Path, tag: &str) -> Result<(), ProcessError> {
        self.record(EngineCall::Build {
            context_dir: context_dir.to_path_buf(),
            tag: tag.to_string(),
        });
        if self.hang_on_build {
            std::future::pending::<()>().await;
        }
        match &self.build_failure {
            Some(stderr) => Err(Self::failure(format!("mock build --tag {}", tag), stderr)),
            None => Ok(()),
        }
    }

    async fn run(
        &self,
        image: &str,
        volumes: &[VolumeBinding],
        args: &[String],
    ) -> Result<(), ProcessError> {
        self.record(EngineCall::Run {
            image: image.to_string(),
            args: args.to_vec(),
        });

        let command = format!("mock run {}", image);
        if args.first().map(String::as_str) != Some(EXPORT_CREDENTIAL) {
            return Ok(());
        }
        let Some(ciphertext) = &self.credential_ciphertext else {
            return Err(Self::failure(command, "no credential baked into image"));
        };
        let target = args
            .get(1)
            .and_then(|p| p.strip_prefix(WORKSPACE_MOUNT))
            .map(|p| p.trim_start_matches('/'));
        let host_dir = volumes
            .iter()
            .find(|v| v.container == WORKSPACE_MOUNT)
            .map(|v| v.host.clone());

        match (host_dir, target) {
            (Some(dir), Some(name)) => std::fs::write(dir.join(name), ciphertext)
                .map_err(|source| ProcessError::Io { command, source }),
            _ => Err(Self::failure(command, "workspace is not mounted")),
        }
    }

    async fn image_exists(&self, image: &str) -> Result<bool, ProcessError> {
        self.record(EngineCall::ImageExists(image.to_string()));
        Ok(self.local_images.lock().unwrap().contains(image))
    }

    async fn pull(&self, image: &str) -> Result<bool, ProcessError> {
        self.record(EngineCall::Pull(image.to_string()));
        let available = self.pullable_images.contains(image);
        if available {
            self.local_images.lock().unwrap().insert(image.to_string());
        }
        Ok(available)
    }

    async fn remove_image(&self, image: &str) -> Result<(), ProcessError> {
        self.record(EngineCall::RemoveImage(image.to_string()));
        self.local_images.lock().unwrap().remove(image);
        Ok(())
    }

    fn name(&self) -> &str {
        "mock-engine"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    ListApps,
    CreateApp(String),
    SetSecret { app: String, key: String },
    ListSecrets(String),
    Deploy {
        app: String,
        workspace: PathBuf,
        /// File names present in the workspace when the deploy started
        files: Vec<String>,
    },
    Hostname(String),
}

#[derive(Default)]
pub struct MockPlatform {
    apps: Mutex<HashSet<String>>,
    staged: Mutex<Vec<(String, String)>>,
    tokens: Mutex<Vec<String>>,
    failing_secret: Option<String>,
    unreported_secret: Option<String>,
    fail_deploy: bool,
    fail_hostname: bool,
    calls: Mutex<Vec<PlatformCall>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing_app(self, app: &str) -> Self {
        self.apps.lock().unwrap().insert(app.to_string());
        self
    }

    /// Setting `key` fails
    pub fn failing_secret(mut self, key: &str) -> Self {
        self.failing_secret = Some(key.to_string());
        self
    }

    /// `key` is accepted but never shows up in `list_secrets`
    pub fn dropping_secret(mut self, key: &str) -> Self {
        self.unreported_secret = Some(key.to_string());
        self
    }

    pub fn failing_deploy(mut self) -> Self {
        self.fail_deploy = true;
        self
    }

    pub fn failing_hostname(mut self) -> Self {
        self.fail_hostname = true;
        self
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn create_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, PlatformCall::CreateApp(_)))
            .count()
    }

    /// Secrets accepted so far, as `(key, value)`
    pub fn staged_secrets(&self) -> Vec<(String, String)> {
        self.staged.lock().unwrap().clone()
    }

    /// Tokens presented by pre-authenticated calls
    pub fn tokens_seen(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    fn record(&self, call: PlatformCall, credential: Option<&DeployCredential>) {
        if let Some(credential) = credential {
            self.tokens
                .lock()
                .unwrap()
                .push(credential.expose().to_string());
        }
        self.calls.lock().unwrap().push(call);
    }

    fn failure(command: String, stderr: &str) -> ProcessError {
        ProcessError::Failed {
            command,
            code: Some(1),
            stderr_tail: stderr.to_string(),
        }
    }
}

#[async_trait]
impl DeploymentPlatform for MockPlatform {
    async fn list_apps(
        &self,
        credential: Option<&DeployCredential>,
    ) -> Result<Vec<String>, ProcessError> {
        self.record(PlatformCall::ListApps, credential);
        let mut apps: Vec<String> = self.apps.lock().unwrap().iter().cloned().collect();
        apps.sort();
        Ok(apps)
    }

    async fn create_app(
        &self,
        app: &str,
        credential: Option<&DeployCredential>,
    ) -> Result<(), ProcessError> {
        self.record(PlatformCall::CreateApp(app.to_string()), credential);
        if !self.apps.lock().unwrap().insert(app.to_string()) {
            return Err(Self::failure(
                format!("mock apps create {}", app),
                "app name already taken",
            ));
        }
        Ok(())
    }

    async fn set_secret(
        &self,
        app: &str,
        key: &str,
        value: &str,
        credential: Option<&DeployCredential>,
    ) -> Result<(), ProcessError> {
        self.record(
            PlatformCall::SetSecret {
                app: app.to_string(),
                key: key.to_string(),
            },
            credential,
        );
        if self.failing_secret.as_deref() == Some(key) {
            return Err(Self::failure(
                format!("mock secrets import --app {}", app),
                "secret rejected",
            ));
        }
        self.staged
            .lock()
            .unwrap()
            .push((key.to_string(), value.to_string()));
        Ok(())
    }

    async fn list_secrets(
        &self,
        app: &str,
        credential: Option<&DeployCredential>,
    ) -> Result<Vec<String>, ProcessError> {
        self.record(PlatformCall::ListSecrets(app.to_string()), credential);
        Ok(self
            .staged
            .lock()
            .unwrap()
            .iter()
            .map(|(key, _)| key.clone())
            .filter(|key| self.unreported_secret.as_deref() != Some(key.as_str()))
            .collect())
    }

    async fn deploy(
        &self,
        workspace: &Path,
        app: &str,
        credential: Option<&DeployCredential>,
    ) -> Result<(), ProcessError> {
        let mut files: Vec<String> = std::fs::read_dir(workspace)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        files.sort();
        self.record(
            PlatformCall::Deploy {
                app: app.to_string(),
                workspace: workspace.to_path_buf(),
                files,
            },
            credential,
        );
        if self.fail_deploy {
            return Err(Self::failure(
                format!("mock deploy --app {}", app),
                "Error: failed to fetch an image or build from source",
            ));
        }
        Ok(())
    }

    async fn hostname(
        &self,
        app: &str,
        credential: Option<&DeployCredential>,
    ) -> Result<String, ProcessError> {
        self.record(PlatformCall::Hostname(app.to_string()), credential);
        if self.fail_hostname {
            return Err(ProcessError::UnexpectedOutput {
                command: format!("mock status --app {}", app),
                message: "status output has no hostname".to_string(),
            });
        }
        Ok(format!("{}.fly.dev", app))
    }
}
