//! Deployment orchestrator
//!
//! A small state machine drives analysis, optional credential resolution, the local
//! image build, app creation, secret staging, the remote deploy and verification.

pub mod context;
pub mod orchestrator;
pub mod phase_trait;
pub mod phases;
pub mod report;
pub mod state;

pub use context::{DeployContext, DeployRequest};
pub use orchestrator::DeployOrchestrator;
pub use phase_trait::WorkflowPhase;
pub use phases::analyze::{prepare, PreparedService};
pub use report::{DeploymentReport, VerifyWarning};
pub use state::{DeployState, DeploymentAttempt, DeploymentMode};
