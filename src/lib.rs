//! getmethatdawg - turn a plain Python source file into a deployed HTTP service
//!
//! The library discovers the functions a Python file exposes, generates a Flask
//! service around them, assembles the container and platform descriptors, and drives a
//! deployment attempt through an explicit state machine against a container engine and
//! a remote deployment platform.
//!
//! # Example Usage
//!
//! ```no_run
//! use getmethatdawg::{DeployConfig, DeployOrchestrator, DeployRequest, DockerCli, FlyCli};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), getmethatdawg::DeployError> {
//! let config = DeployConfig::default();
//! let engine = Arc::new(DockerCli::new(config.docker_bin.clone()));
//! let platform = Arc::new(FlyCli::new(config.flyctl_bin.clone(), config.org.clone()));
//!
//! let report = DeployOrchestrator::new(config, engine, platform)
//!     .deploy(DeployRequest::new("agent.py", "agent"))
//!     .await?;
//! println!("{:?}", report.url);
//! # Ok(())
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`discovery`]: endpoint discovery from Python source
//! - [`env`]: `.env` parsing and secret classification
//! - [`generator`]: generated Flask service
//! - [`assembler`]: build artifacts and the attempt workspace
//! - [`credential`]: token codec for pre-authenticated builder images
//! - [`platform`]: container engine and deployment platform seams
//! - [`pipeline`]: the deployment state machine

pub mod assembler;
pub mod cli;
pub mod config;
pub mod credential;
pub mod discovery;
pub mod env;
pub mod error;
pub mod generator;
pub mod pipeline;
pub mod platform;
pub mod progress;
pub mod util;

pub use assembler::{BuildArtifactSet, Workspace};
pub use config::{ConfigError, DeployConfig};
pub use credential::{DecryptionError, DeployCredential};
pub use discovery::{discover, DiscoveryError, DiscoveryMode, EndpointDescriptor, HttpMethod};
pub use env::{EnvBuckets, EnvParseError};
pub use error::DeployError;
pub use pipeline::{
    DeployOrchestrator, DeployRequest, DeployState, DeploymentMode, DeploymentReport,
    VerifyWarning,
};
pub use platform::{ContainerEngine, DeploymentPlatform, DockerCli, FlyCli};
pub use util::{init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "getmethatdawg");
    }
}
