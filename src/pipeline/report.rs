//! Outcome of a successful attempt

use super::state::{DeployState, DeploymentMode};
use crate::discovery::{EndpointDescriptor, HttpMethod};
use serde::Serialize;
use std::fmt;

/// A verify-time problem that does not undo a successful deploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyWarning {
    pub message: String,
}

impl VerifyWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for VerifyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    pub app_name: String,
    /// Public base URL; `None` when verification could not resolve it
    pub url: Option<String>,
    pub endpoints: Vec<EndpointDescriptor>,
    pub warnings: Vec<VerifyWarning>,
    /// Mode the attempt finished in
    pub mode: DeploymentMode,
    pub fallback_taken: bool,
    pub states: Vec<DeployState>,
}

impl DeploymentReport {
    /// Full URL of every endpoint, or just its path when the base URL is unknown
    pub fn endpoint_urls(&self) -> Vec<(HttpMethod, String)> {
        let base = self.url.as_deref().unwrap_or("").trim_end_matches('/');
        self.endpoints
            .iter()
            .map(|e| (e.http_method, format!("{}{}", base, e.path)))
            .collect()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
