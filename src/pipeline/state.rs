//! Attempt state machine
//!
//! ```text
//! START -> ANALYZE -> [PRE_AUTH_RESOLVE] -> BUILD_IMAGE -> CREATE_OR_UPDATE_APP
//!       -> [STAGE_SECRETS] -> DEPLOY -> VERIFY -> DONE
//! ```
//!
//! `FAILED` is reachable from every non-terminal state. The only mode change is the
//! one-shot downgrade from pre-authenticated to regular.

use crate::credential::DeployCredential;
use crate::error::DeployError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeployState {
    Start,
    Analyze,
    PreAuthResolve,
    BuildImage,
    CreateOrUpdateApp,
    StageSecrets,
    Deploy,
    Verify,
    Done,
    Failed,
}

impl DeployState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployState::Start => "START",
            DeployState::Analyze => "ANALYZE",
            DeployState::PreAuthResolve => "PRE_AUTH_RESOLVE",
            DeployState::BuildImage => "BUILD_IMAGE",
            DeployState::CreateOrUpdateApp => "CREATE_OR_UPDATE_APP",
            DeployState::StageSecrets => "STAGE_SECRETS",
            DeployState::Deploy => "DEPLOY",
            DeployState::Verify => "VERIFY",
            DeployState::Done => "DONE",
            DeployState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeployState::Done | DeployState::Failed)
    }

    pub fn can_transition_to(&self, next: DeployState) -> bool {
        use DeployState::*;

        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Start, Analyze)
                | (Analyze, PreAuthResolve)
                | (Analyze, BuildImage)
                | (PreAuthResolve, BuildImage)
                | (BuildImage, CreateOrUpdateApp)
                | (CreateOrUpdateApp, StageSecrets)
                | (CreateOrUpdateApp, Deploy)
                | (StageSecrets, Deploy)
                | (Deploy, Verify)
                | (Verify, Done)
        )
    }
}

impl fmt::Display for DeployState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the platform credential comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentMode {
    /// The platform CLI's own login
    #[default]
    Regular,
    /// A token exported from a pre-built builder image
    PreAuth,
}

impl DeploymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentMode::Regular => "regular",
            DeploymentMode::PreAuth => "pre-auth",
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "regular" => Ok(DeploymentMode::Regular),
            "pre-auth" | "preauth" | "pre_auth" | "authenticated" => Ok(DeploymentMode::PreAuth),
            other => Err(format!(
                "Invalid deployment mode: {}. Valid options: regular, pre-auth",
                other
            )),
        }
    }
}

/// One `deploy` invocation, owned by the orchestrator and never persisted
#[derive(Debug)]
pub struct DeploymentAttempt {
    mode: DeploymentMode,
    app_name: String,
    state: DeployState,
    credential: Option<DeployCredential>,
    history: Vec<DeployState>,
    fallback_taken: bool,
}

impl DeploymentAttempt {
    pub fn new(app_name: impl Into<String>, mode: DeploymentMode) -> Self {
        Self {
            mode,
            app_name: app_name.into(),
            state: DeployState::Start,
            credential: None,
            history: vec![DeployState::Start],
            fallback_taken: false,
        }
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn state(&self) -> DeployState {
        self.state
    }

    /// Every state entered so far, in order
    pub fn history(&self) -> &[DeployState] {
        &self.history
    }

    pub fn fallback_taken(&self) -> bool {
        self.fallback_taken
    }

    pub fn credential(&self) -> Option<&DeployCredential> {
        self.credential.as_ref()
    }

    pub fn set_credential(&mut self, credential: DeployCredential) {
        self.credential = Some(credential);
    }

    pub fn transition(&mut self, next: DeployState) -> Result<(), DeployError> {
        if !self.state.can_transition_to(next) {
            return Err(DeployError::InvalidTransition(format!(
                "{} -> {}",
                self.state, next
            )));
        }
        debug!(from = %self.state, to = %next, "State transition");
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Moves to `FAILED` unless the attempt already ended
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = DeployState::Failed;
            self.history.push(DeployState::Failed);
        }
    }

    /// Switches a pre-authenticated attempt to regular mode, at most once
    pub fn downgrade_to_regular(&mut self) -> Result<(), DeployError> {
        if self.mode != DeploymentMode::PreAuth || self.fallback_taken {
            return Err(DeployError::InvalidTransition(format!(
                "mode {} -> {} in {}",
                self.mode,
                DeploymentMode::Regular,
                self.state
            )));
        }
        warn!(
            app = %self.app_name,
            state = %self.state,
            "Pre-authenticated image unavailable, falling back to regular mode"
        );
        self.mode = DeploymentMode::Regular;
        self.credential = None;
        self.fallback_taken = true;
        Ok(())
    }
}
