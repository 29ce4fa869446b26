//! ANALYZE: discovery, classification and artifact assembly
//!
//! Nothing here talks to the engine or the platform, so a failure leaves no trace.

use crate::assembler::{self, AssemblyInput, BuildArtifactSet};
use crate::config::DeployConfig;
use crate::discovery::{self, DiscoveryError, EndpointDescriptor};
use crate::env::{self, EnvBuckets};
use crate::error::DeployError;
use crate::pipeline::context::{DeployContext, DeployRequest};
use crate::pipeline::phase_trait::WorkflowPhase;
use crate::pipeline::state::DeployState;
use async_trait::async_trait;
use tracing::info;

/// Discovery output plus the artifacts built from it
#[derive(Debug)]
pub struct PreparedService {
    pub endpoints: Vec<EndpointDescriptor>,
    pub env: EnvBuckets,
    pub artifacts: BuildArtifactSet,
}

/// Reads the source, discovers endpoints, classifies the environment and assembles
/// every artifact in memory
pub fn prepare(request: &DeployRequest, config: &DeployConfig) -> Result<PreparedService, DeployError> {
    let source = std::fs::read_to_string(&request.source_file).map_err(|source| {
        DiscoveryError::Read {
            path: request.source_file.clone(),
            source,
        }
    })?;

    let endpoints = discovery::discover(&source, request.discovery_mode)?;
    let env = env::load_for_source(request.env_file.as_deref(), &request.source_file)?;
    let manifest =
        assembler::read_manifest(request.requirements.as_deref(), &request.source_file)?;

    let options = config.assembly_options();
    let artifacts = assembler::assemble(&AssemblyInput {
        app_name: &request.app_name,
        endpoints: &endpoints,
        source: &source,
        env: &env,
        user_manifest: manifest.as_deref(),
        options: &options,
    })?;

    info!(
        endpoints = endpoints.len(),
        secrets = env.secrets.len(),
        plain = env.plain.len(),
        "Analysis complete"
    );

    Ok(PreparedService {
        endpoints,
        env,
        artifacts,
    })
}

pub struct AnalyzePhase;

#[async_trait]
impl WorkflowPhase for AnalyzePhase {
    fn state(&self) -> DeployState {
        DeployState::Analyze
    }

    async fn execute(&self, context: &mut DeployContext) -> Result<(), DeployError> {
        let prepared = prepare(&context.request, &context.config)?;
        prepared.artifacts.write_to_workspace(&context.workspace)?;

        context.endpoints = prepared.endpoints;
        context.env = prepared.env;
        context.artifacts = Some(prepared.artifacts);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{DiscoveryMode, HttpMethod};
    use tempfile::TempDir;

    fn request(dir: &TempDir, source: &str) -> DeployRequest {
        let path = dir.path().join("agent.py");
        std::fs::write(&path, source).unwrap();
        let mut request = DeployRequest::new(path, "agent");
        request.discovery_mode = DiscoveryMode::AutoDetect;
        request
    }

    #[test]
    fn test_prepare_reads_env_beside_source() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env"), "OPENAI_API_KEY=sk-1\nDEBUG=1\n").unwrap();
        let request = request(&dir, "def list_items():\n    return []\n");

        let prepared = prepare(&request, &DeployConfig::default()).unwrap();
        assert_eq!(prepared.endpoints.len(), 1);
        assert_eq!(prepared.endpoints[0].http_method, HttpMethod::Get);
        assert_eq!(prepared.env.secret_keys(), vec!["OPENAI_API_KEY"]);
        assert!(prepared.artifacts.secrets_script.is_some());
    }

    #[test]
    fn test_prepare_missing_source() {
        let dir = TempDir::new().unwrap();
        let request = DeployRequest::new(dir.path().join("missing.py"), "agent");
        let err = prepare(&request, &DeployConfig::default()).unwrap_err();
        assert!(matches!(err, DeployError::Discovery(DiscoveryError::Read { .. })));
    }

    #[test]
    fn test_prepare_bad_env_line() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env"), "NOT A PAIR\n").unwrap();
        let request = request(&dir, "def f(x: int):\n    return x\n");
        let err = prepare(&request, &DeployConfig::default()).unwrap_err();
        assert!(matches!(err, DeployError::EnvParse(_)));
    }
}
