//! External collaborators: the container engine and the deployment platform
//!
//! Both are driven through their command-line clients. Every call blocks the attempt
//! until the child exits while its output is streamed through.

pub mod engine;
pub mod fly;
pub mod mock;
pub mod process;

pub use engine::{ContainerEngine, DockerCli, VolumeBinding, EXPORT_CREDENTIAL, WORKSPACE_MOUNT};
pub use fly::{DeploymentPlatform, FlyCli, TOKEN_ENV};
pub use mock::{EngineCall, MockContainerEngine, MockPlatform, PlatformCall};
pub use process::{ProcessError, ProcessOutput, ProcessSpec, StdoutMode};
