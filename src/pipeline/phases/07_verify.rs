//! VERIFY: resolve the public URL and check staged secrets
//!
//! Never fails the attempt; problems become warnings in the report.

use crate::error::DeployError;
use crate::pipeline::context::DeployContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use crate::pipeline::report::VerifyWarning;
use crate::pipeline::state::DeployState;
use async_trait::async_trait;
use tracing::{info, warn};

pub struct VerifyPhase;

#[async_trait]
impl WorkflowPhase for VerifyPhase {
    fn state(&self) -> DeployState {
        DeployState::Verify
    }

    async fn execute(&self, context: &mut DeployContext) -> Result<(), DeployError> {
        let app = context.attempt.app_name().to_string();
        let mut warnings = Vec::new();

        match context
            .platform
            .hostname(&app, context.attempt.credential())
            .await
        {
            Ok(hostname) => {
                let url = format!("https://{}", hostname);
                for endpoint in &context.endpoints {
                    info!(
                        method = %endpoint.http_method,
                        url = %format!("{}{}", url, endpoint.path),
                        "Endpoint live"
                    );
                }
                context.url = Some(url);
            }
            Err(e) => warnings.push(VerifyWarning::new(format!(
                "Could not resolve the public URL of {}: {}",
                app, e
            ))),
        }

        if !context.env.secrets.is_empty() {
            match context
                .platform
                .list_secrets(&app, context.attempt.credential())
                .await
            {
                Ok(reported) => {
                    for key in context.env.secret_keys() {
                        if !reported.iter().any(|r| r == key) {
                            warnings.push(VerifyWarning::new(format!(
                                "Secret {} was staged but the platform does not report it",
                                key
                            )));
                        }
                    }
                }
                Err(e) => warnings.push(VerifyWarning::new(format!(
                    "Could not list secrets of {}: {}",
                    app, e
                ))),
            }
        }

        for warning in &warnings {
            warn!(app = %app, "{}", warning);
        }
        context.warnings.extend(warnings);
        Ok(())
    }
}
