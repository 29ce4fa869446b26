//! Deployment orchestrator integration tests
//!
//! Drives whole attempts against the recording fakes and checks:
//! - State sequence and collaborator call order
//! - The one-shot pre-authenticated fallback
//! - Fatal failures and non-fatal verify warnings
//! - Workspace removal on success, failure and cancellation

use getmethatdawg::credential::{encrypt, CREDENTIAL_FILE};
use getmethatdawg::platform::{EngineCall, MockContainerEngine, MockPlatform, PlatformCall};
use getmethatdawg::{
    DeployConfig, DeployError, DeployOrchestrator, DeployRequest, DeployState, DeploymentMode,
    DiscoveryMode,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const PASSPHRASE: &str = "integration-passphrase";
const BUILDER_IMAGE: &str = "builder:authenticated";

const AGENT_SOURCE: &str = r#"def hello(name: str = "World"):
    return {"message": f"Hello, {name}!"}


def summarize(text: str, max_words: int = 50):
    return {"summary": " ".join(text.split()[:max_words])}
"#;

/// A source directory plus a separate root that attempt workspaces are created under
struct Fixture {
    source_dir: TempDir,
    workspace_root: TempDir,
}

impl Fixture {
    fn new(source: &str, env: Option<&str>) -> Self {
        let source_dir = TempDir::new().unwrap();
        fs::write(source_dir.path().join("agent.py"), source).unwrap();
        if let Some(env) = env {
            fs::write(source_dir.path().join(".env"), env).unwrap();
        }
        Self {
            source_dir,
            workspace_root: TempDir::new().unwrap(),
        }
    }

    fn source_file(&self) -> PathBuf {
        self.source_dir.path().join("agent.py")
    }

    fn request(&self) -> DeployRequest {
        let mut request = DeployRequest::new(self.source_file(), "agent");
        request.discovery_mode = DiscoveryMode::AutoDetect;
        request
    }

    fn orchestrator(
        &self,
        mode: DeploymentMode,
        engine: &Arc<MockContainerEngine>,
        platform: &Arc<MockPlatform>,
    ) -> DeployOrchestrator {
        DeployOrchestrator::new(config(mode), engine.clone(), platform.clone())
            .with_workspace_root(self.workspace_root.path())
    }

    fn leftover_workspaces(&self) -> usize {
        fs::read_dir(self.workspace_root.path()).unwrap().count()
    }
}

fn config(mode: DeploymentMode) -> DeployConfig {
    DeployConfig {
        mode,
        preauth_images: vec![BUILDER_IMAGE.to_string()],
        credential_passphrase: PASSPHRASE.to_string(),
        ..DeployConfig::default()
    }
}

fn deployed_files(platform: &MockPlatform) -> Vec<String> {
    platform
        .calls()
        .into_iter()
        .find_map(|call| match call {
            PlatformCall::Deploy { files, .. } => Some(files),
            _ => None,
        })
        .expect("deploy was called")
}

fn deploy_called(platform: &MockPlatform) -> bool {
    platform
        .calls()
        .iter()
        .any(|c| matches!(c, PlatformCall::Deploy { .. }))
}

#[tokio::test]
async fn test_regular_deploy_runs_every_phase_in_order() {
    let fixture = Fixture::new(AGENT_SOURCE, Some("OPENAI_API_KEY=sk-live-1\nDEBUG=true\n"));
    let engine = Arc::new(MockContainerEngine::new());
    let platform = Arc::new(MockPlatform::new());

    let report = fixture
        .orchestrator(DeploymentMode::Regular, &engine, &platform)
        .deploy(fixture.request())
        .await
        .unwrap();

    assert_eq!(
        report.states,
        vec![
            DeployState::Start,
            DeployState::Analyze,
            DeployState::BuildImage,
            DeployState::CreateOrUpdateApp,
            DeployState::StageSecrets,
            DeployState::Deploy,
            DeployState::Verify,
            DeployState::Done,
        ]
    );
    assert_eq!(report.url.as_deref(), Some("https://agent.fly.dev"));
    assert_eq!(report.mode, DeploymentMode::Regular);
    assert!(!report.fallback_taken);
    assert!(!report.has_warnings());
    assert_eq!(report.endpoints.len(), 2);

    let calls = platform.calls();
    assert_eq!(calls[0], PlatformCall::ListApps);
    assert_eq!(calls[1], PlatformCall::CreateApp("agent".to_string()));
    assert_eq!(
        calls[2],
        PlatformCall::SetSecret {
            app: "agent".to_string(),
            key: "OPENAI_API_KEY".to_string(),
        }
    );
    assert!(matches!(calls[3], PlatformCall::Deploy { .. }));
    assert_eq!(calls[4], PlatformCall::Hostname("agent".to_string()));
    assert_eq!(calls[5], PlatformCall::ListSecrets("agent".to_string()));

    assert_eq!(
        platform.staged_secrets(),
        vec![("OPENAI_API_KEY".to_string(), "sk-live-1".to_string())]
    );
    assert!(platform.tokens_seen().is_empty());

    let files = deployed_files(&platform);
    for expected in ["Dockerfile", "fly.toml", "flask_app.py", "user_module.py", "requirements.txt"] {
        assert!(files.iter().any(|f| f == expected), "missing {}", expected);
    }

    assert_eq!(engine.build_count(), 1);
    match &engine.calls()[0] {
        EngineCall::Build { tag, .. } => assert_eq!(tag, "getmethatdawg/agent:local"),
        other => panic!("Expected a build, got {:?}", other),
    }
    assert_eq!(engine.removed_images(), vec!["getmethatdawg/agent:local"]);

    assert_eq!(fixture.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_no_secrets_skips_staging() {
    let fixture = Fixture::new(AGENT_SOURCE, Some("DEBUG=true\n"));
    let engine = Arc::new(MockContainerEngine::new());
    let platform = Arc::new(MockPlatform::new());

    let report = fixture
        .orchestrator(DeploymentMode::Regular, &engine, &platform)
        .deploy(fixture.request())
        .await
        .unwrap();

    assert!(!report.states.contains(&DeployState::StageSecrets));
    assert!(!platform
        .calls()
        .iter()
        .any(|c| matches!(c, PlatformCall::SetSecret { .. } | PlatformCall::ListSecrets(_))));
    assert!(!deployed_files(&platform).contains(&"deploy-with-secrets.sh".to_string()));
}

#[tokio::test]
async fn test_pre_auth_falls_back_once_when_no_image() {
    let fixture = Fixture::new(AGENT_SOURCE, None);
    let engine = Arc::new(MockContainerEngine::new());
    let platform = Arc::new(MockPlatform::new());

    let report = fixture
        .orchestrator(DeploymentMode::PreAuth, &engine, &platform)
        .deploy(fixture.request())
        .await
        .unwrap();

    assert_eq!(report.mode, DeploymentMode::Regular);
    assert!(report.fallback_taken);
    assert_eq!(
        report
            .states
            .iter()
            .filter(|s| **s == DeployState::PreAuthResolve)
            .count(),
        1
    );
    let calls = engine.calls();
    assert_eq!(calls[0], EngineCall::ImageExists(BUILDER_IMAGE.to_string()));
    assert_eq!(calls[1], EngineCall::Pull(BUILDER_IMAGE.to_string()));
    assert!(!calls.iter().any(|c| matches!(c, EngineCall::Run { .. })));
    assert_eq!(engine.build_count(), 1);
    assert!(platform.tokens_seen().is_empty());
    assert!(deploy_called(&platform));
    assert_eq!(fixture.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_pre_auth_credential_reaches_platform() {
    let fixture = Fixture::new(AGENT_SOURCE, Some("OPENAI_API_KEY=sk-live-1\n"));
    let ciphertext = encrypt(b"fo1_integration_token", PASSPHRASE).unwrap();
    let engine = Arc::new(
        MockContainerEngine::new()
            .with_pullable_image(BUILDER_IMAGE)
            .exporting_credential(&ciphertext),
    );
    let platform = Arc::new(MockPlatform::new());

    let report = fixture
        .orchestrator(DeploymentMode::PreAuth, &engine, &platform)
        .deploy(fixture.request())
        .await
        .unwrap();

    assert_eq!(report.mode, DeploymentMode::PreAuth);
    assert!(!report.fallback_taken);
    assert!(report.states.contains(&DeployState::PreAuthResolve));

    let tokens = platform.tokens_seen();
    assert_eq!(tokens.len(), platform.calls().len());
    assert!(tokens.iter().all(|t| t == "fo1_integration_token"));

    assert!(!deployed_files(&platform).contains(&CREDENTIAL_FILE.to_string()));
    assert_eq!(fixture.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_wrong_passphrase_is_fatal() {
    let fixture = Fixture::new(AGENT_SOURCE, None);
    let ciphertext = encrypt(b"fo1_integration_token", "some-other-passphrase").unwrap();
    let engine = Arc::new(
        MockContainerEngine::new()
            .with_local_image(BUILDER_IMAGE)
            .exporting_credential(&ciphertext),
    );
    let platform = Arc::new(MockPlatform::new());

    let err = fixture
        .orchestrator(DeploymentMode::PreAuth, &engine, &platform)
        .deploy(fixture.request())
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::Decryption(_)));
    assert_eq!(engine.build_count(), 0);
    assert!(platform.calls().is_empty());
    assert_eq!(fixture.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_secret_staging_failure_stops_before_deploy() {
    let fixture = Fixture::new(
        AGENT_SOURCE,
        Some("OPENAI_API_KEY=sk-live-1\nSTRIPE_SECRET=sk-2\n"),
    );
    let engine = Arc::new(MockContainerEngine::new());
    let platform = Arc::new(MockPlatform::new().failing_secret("OPENAI_API_KEY"));

    let err = fixture
        .orchestrator(DeploymentMode::Regular, &engine, &platform)
        .deploy(fixture.request())
        .await
        .unwrap_err();

    match err {
        DeployError::SecretStaging { key, .. } => assert_eq!(key, "OPENAI_API_KEY"),
        other => panic!("Expected SecretStaging, got {:?}", other),
    }
    assert!(!deploy_called(&platform));
    assert!(platform.staged_secrets().is_empty());
    assert_eq!(fixture.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_existing_app_is_not_recreated() {
    let fixture = Fixture::new(AGENT_SOURCE, None);
    let engine = Arc::new(MockContainerEngine::new());
    let platform = Arc::new(MockPlatform::new().with_existing_app("agent"));

    fixture
        .orchestrator(DeploymentMode::Regular, &engine, &platform)
        .deploy(fixture.request())
        .await
        .unwrap();

    assert_eq!(platform.create_count(), 0);
    assert!(deploy_called(&platform));
}

#[tokio::test]
async fn test_unresolved_url_is_a_warning() {
    let fixture = Fixture::new(AGENT_SOURCE, None);
    let engine = Arc::new(MockContainerEngine::new());
    let platform = Arc::new(MockPlatform::new().failing_hostname());

    let report = fixture
        .orchestrator(DeploymentMode::Regular, &engine, &platform)
        .deploy(fixture.request())
        .await
        .unwrap();

    assert!(report.url.is_none());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].message.contains("public URL"));
    assert_eq!(report.states.last(), Some(&DeployState::Done));
}

#[tokio::test]
async fn test_unreported_secret_is_a_warning() {
    let fixture = Fixture::new(AGENT_SOURCE, Some("OPENAI_API_KEY=sk-live-1\n"));
    let engine = Arc::new(MockContainerEngine::new());
    let platform = Arc::new(MockPlatform::new().dropping_secret("OPENAI_API_KEY"));

    let report = fixture
        .orchestrator(DeploymentMode::Regular, &engine, &platform)
        .deploy(fixture.request())
        .await
        .unwrap();

    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].message.contains("OPENAI_API_KEY"));
    assert!(!report.warnings[0].message.contains("sk-live-1"));
}

#[tokio::test]
async fn test_build_failure_surfaces_engine_output() {
    let fixture = Fixture::new(AGENT_SOURCE, None);
    let engine = Arc::new(
        MockContainerEngine::new().failing_build("ERROR: failed to solve: python:3.11-slim"),
    );
    let platform = Arc::new(MockPlatform::new());

    let err = fixture
        .orchestrator(DeploymentMode::Regular, &engine, &platform)
        .deploy(fixture.request())
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::Build(_)));
    assert!(err.to_string().contains("failed to solve"));
    assert!(platform.calls().is_empty());
    assert!(engine.removed_images().is_empty());
    assert_eq!(fixture.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_deploy_failure_skips_verify() {
    let fixture = Fixture::new(AGENT_SOURCE, None);
    let engine = Arc::new(MockContainerEngine::new());
    let platform = Arc::new(MockPlatform::new().failing_deploy());

    let err = fixture
        .orchestrator(DeploymentMode::Regular, &engine, &platform)
        .deploy(fixture.request())
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::Deploy(_)));
    assert!(!platform
        .calls()
        .iter()
        .any(|c| matches!(c, PlatformCall::Hostname(_))));
    assert_eq!(engine.removed_images(), vec!["getmethatdawg/agent:local"]);
    assert_eq!(fixture.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_explicit_mode_without_markers_fails_discovery() {
    let fixture = Fixture::new(AGENT_SOURCE, None);
    let engine = Arc::new(MockContainerEngine::new());
    let platform = Arc::new(MockPlatform::new());

    let mut request = fixture.request();
    request.discovery_mode = DiscoveryMode::Explicit;
    let err = fixture
        .orchestrator(DeploymentMode::Regular, &engine, &platform)
        .deploy(request)
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::Discovery(_)));
    assert!(engine.calls().is_empty());
    assert!(platform.calls().is_empty());
    assert_eq!(fixture.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_explicit_markers_deploy() {
    let source = r#"import getmethatdawg


@getmethatdawg.expose(method="POST", path="/chat")
def chat(message: str):
    return {"reply": message}


def helper():
    return 1
"#;
    let fixture = Fixture::new(source, None);
    let engine = Arc::new(MockContainerEngine::new());
    let platform = Arc::new(MockPlatform::new());

    let mut request = fixture.request();
    request.discovery_mode = DiscoveryMode::Explicit;
    let report = fixture
        .orchestrator(DeploymentMode::Regular, &engine, &platform)
        .deploy(request)
        .await
        .unwrap();

    assert_eq!(report.endpoints.len(), 1);
    assert_eq!(report.endpoints[0].path, "/chat");
}

#[tokio::test]
async fn test_cancelled_attempt_removes_workspace() {
    let fixture = Fixture::new(AGENT_SOURCE, None);
    let engine = Arc::new(MockContainerEngine::new().hanging_build());
    let platform = Arc::new(MockPlatform::new());
    let orchestrator = fixture.orchestrator(DeploymentMode::Regular, &engine, &platform);

    let outcome = tokio::time::timeout(
        Duration::from_millis(200),
        orchestrator.deploy(fixture.request()),
    )
    .await;

    assert!(outcome.is_err(), "hanging build should not complete");
    assert_eq!(engine.build_count(), 1);
    assert_eq!(fixture.leftover_workspaces(), 0);
    assert!(platform.calls().is_empty());
}
