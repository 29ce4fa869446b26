//! Fatal failures of a deployment attempt
//!
//! Each variant aborts the attempt in the state where it happened. A non-fatal verify
//! problem is a [`crate::pipeline::VerifyWarning`] in the report instead, and an
//! unavailable pre-authenticated image is a mode downgrade, not an error.

use crate::assembler::AssemblyError;
use crate::credential::DecryptionError;
use crate::discovery::DiscoveryError;
use crate::env::EnvLoadError;
use crate::platform::ProcessError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    EnvParse(#[from] EnvLoadError),

    #[error(transparent)]
    Decryption(#[from] DecryptionError),

    #[error("Container build failed: {0}")]
    Build(#[source] ProcessError),

    #[error("Failed to stage secret {key}: {source}")]
    SecretStaging { key: String, source: ProcessError },

    #[error("Deployment failed: {0}")]
    Deploy(#[source] ProcessError),

    #[error("Workspace error at {path}: {source}")]
    Workspace { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),
}

impl DeployError {
    pub(crate) fn workspace(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Workspace {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_error_surfaces_engine_output() {
        let err = DeployError::Build(ProcessError::Failed {
            command: "docker build --tag t .".to_string(),
            code: Some(1),
            stderr_tail: "ERROR: failed to solve: python:3.11-slim: not found".to_string(),
        });
        let message = err.to_string();
        assert!(message.starts_with("Container build failed:"));
        assert!(message.contains("failed to solve"));
        assert!(message.contains("code 1"));
    }

    #[test]
    fn test_secret_staging_names_key() {
        let err = DeployError::SecretStaging {
            key: "OPENAI_API_KEY".to_string(),
            source: ProcessError::Failed {
                command: "flyctl secrets import".to_string(),
                code: Some(1),
                stderr_tail: String::new(),
            },
        };
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
