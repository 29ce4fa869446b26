//! Artifact assembly
//!
//! Turns discovery output, the classified environment and the user's manifest into the
//! files a deployment needs. Secret values reach exactly one artifact, the staging
//! script, and only when there are secrets to stage.

pub mod dockerfile;
pub mod fly_toml;
pub mod requirements;
pub mod secrets_script;
pub mod workspace;

use crate::discovery::{DiscoveryError, EndpointDescriptor};
use crate::env::EnvBuckets;
use crate::generator::{self, WrapperOptions, MODULE_FILE, WRAPPER_FILE};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub use dockerfile::{DOCKERFILE, DOCKERIGNORE};
pub use fly_toml::{FlyConfig, FLY_TOML};
pub use requirements::MANIFEST_FILE;
pub use secrets_script::SECRETS_SCRIPT;
pub use workspace::Workspace;

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Failed to prepare service code: {0}")]
    Generate(#[from] DiscoveryError),

    #[error("Failed to render fly.toml: {0}")]
    Descriptor(#[from] toml::ser::Error),

    #[error("Failed to read dependency manifest {path}: {source}")]
    ManifestRead { path: PathBuf, source: io::Error },

    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Knobs that shape the artifacts but not their contents' meaning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyOptions {
    pub region: String,
    pub port: u16,
    pub base_image: String,
    /// Platform CLI used in the staging script
    pub flyctl: String,
}

/// Everything one attempt needs to build and deploy
pub struct AssemblyInput<'a> {
    pub app_name: &'a str,
    pub endpoints: &'a [EndpointDescriptor],
    pub source: &'a str,
    pub env: &'a EnvBuckets,
    /// Contents of the user's `requirements.txt`, if one was found
    pub user_manifest: Option<&'a str>,
    pub options: &'a AssemblyOptions,
}

#[derive(Clone, PartialEq, Eq)]
pub struct BuildArtifactSet {
    pub wrapper: String,
    pub module: String,
    pub manifest: String,
    pub dockerfile: String,
    pub dockerignore: String,
    pub fly_toml: String,
    pub secrets_script: Option<String>,
}

impl std::fmt::Debug for BuildArtifactSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildArtifactSet")
            .field("files", &self.file_names())
            .finish()
    }
}

impl BuildArtifactSet {
    /// Non-secret artifacts paired with their fixed file names
    pub fn public_files(&self) -> Vec<(&'static str, &str)> {
        vec![
            (WRAPPER_FILE, self.wrapper.as_str()),
            (MODULE_FILE, self.module.as_str()),
            (MANIFEST_FILE, self.manifest.as_str()),
            (DOCKERFILE, self.dockerfile.as_str()),
            (DOCKERIGNORE, self.dockerignore.as_str()),
            (FLY_TOML, self.fly_toml.as_str()),
        ]
    }

    pub fn file_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.public_files().into_iter().map(|(n, _)| n).collect();
        if self.secrets_script.is_some() {
            names.push(SECRETS_SCRIPT);
        }
        names
    }

    /// Writes every artifact, the staging script included, into the attempt workspace
    pub fn write_to_workspace(&self, workspace: &Workspace) -> Result<Vec<PathBuf>, AssemblyError> {
        let mut written = write_public(self, workspace.path())?;
        if let Some(script) = &self.secrets_script {
            let path = workspace.join(SECRETS_SCRIPT);
            workspace
                .write_private_executable(SECRETS_SCRIPT, script)
                .map_err(|source| AssemblyError::Write { path: path.clone(), source })?;
            written.push(path);
        }
        info!(
            workspace = %workspace.path().display(),
            files = written.len(),
            "Wrote build artifacts"
        );
        Ok(written)
    }

    /// Writes only the non-secret artifacts into a retained directory
    pub fn write_public_to(&self, dir: &Path) -> Result<Vec<PathBuf>, AssemblyError> {
        std::fs::create_dir_all(dir).map_err(|source| AssemblyError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
        write_public(self, dir)
    }
}

fn write_public(artifacts: &BuildArtifactSet, dir: &Path) -> Result<Vec<PathBuf>, AssemblyError> {
    artifacts
        .public_files()
        .into_iter()
        .map(|(name, contents)| {
            let path = dir.join(name);
            workspace::write_with_mode(&path, contents, 0o644)
                .map_err(|source| AssemblyError::Write { path, source })
        })
        .collect()
}

/// Reads the user's manifest if one exists at the located path
pub fn read_manifest(
    explicit: Option<&Path>,
    source_file: &Path,
) -> Result<Option<String>, AssemblyError> {
    let Some(path) = requirements::locate_manifest(explicit, source_file) else {
        debug!("No user requirements.txt found, using default manifest");
        return Ok(None);
    };
    let text = std::fs::read_to_string(&path)
        .map_err(|source| AssemblyError::ManifestRead { path: path.clone(), source })?;
    info!(path = %path.display(), "Using user dependency manifest");
    Ok(Some(text))
}

/// Produces the artifact set in memory
pub fn assemble(input: &AssemblyInput<'_>) -> Result<BuildArtifactSet, AssemblyError> {
    let observability = input.env.observability_enabled();
    let generated = generator::generate(
        input.endpoints,
        input.source,
        &WrapperOptions {
            service_name: input.app_name.to_string(),
            port: input.options.port,
            observability,
        },
    )?;

    let manifest = requirements::merge(input.user_manifest, observability);
    let dockerfile = dockerfile::render(&input.options.base_image, input.options.port);
    let fly_toml = FlyConfig::new(
        input.app_name,
        &input.options.region,
        input.options.port,
        &input.env.plain,
    )
    .render()?;
    let secrets_script =
        secrets_script::render(&input.options.flyctl, input.app_name, &input.env.secrets);

    debug!(
        app = %input.app_name,
        observability,
        secrets = input.env.secrets.len(),
        "Assembled build artifacts"
    );

    Ok(BuildArtifactSet {
        wrapper: generated.wrapper,
        module: generated.module,
        manifest,
        dockerfile,
        dockerignore: dockerfile::render_ignore(),
        fly_toml,
        secrets_script,
    })
}
