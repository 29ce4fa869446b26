//! Remote deployment platform seam

use super::process::{self, ProcessError, ProcessSpec, StdoutMode};
use crate::assembler::FLY_TOML;
use crate::credential::DeployCredential;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// Environment variable the platform CLI reads its token from
pub const TOKEN_ENV: &str = "FLY_API_TOKEN";

/// Operations the orchestrator needs from the platform
///
/// `credential` is `Some` in pre-authenticated mode; otherwise the CLI's own login is used.
#[async_trait]
pub trait DeploymentPlatform: Send + Sync {
    async fn list_apps(&self, credential: Option<&DeployCredential>)
        -> Result<Vec<String>, ProcessError>;

    async fn create_app(
        &self,
        app: &str,
        credential: Option<&DeployCredential>,
    ) -> Result<(), ProcessError>;

    /// Stages one secret; it takes effect with the next deploy
    async fn set_secret(
        &self,
        app: &str,
        key: &str,
        value: &str,
        credential: Option<&DeployCredential>,
    ) -> Result<(), ProcessError>;

    /// Names of the secrets the platform holds for `app`
    async fn list_secrets(
        &self,
        app: &str,
        credential: Option<&DeployCredential>,
    ) -> Result<Vec<String>, ProcessError>;

    /// Remote build and deploy from the descriptor in `workspace`; output is streamed
    async fn deploy(
        &self,
        workspace: &Path,
        app: &str,
        credential: Option<&DeployCredential>,
    ) -> Result<(), ProcessError>;

    /// Public hostname of `app`
    async fn hostname(
        &self,
        app: &str,
        credential: Option<&DeployCredential>,
    ) -> Result<String, ProcessError>;
}

/// The `flyctl` command-line client
#[derive(Debug, Clone)]
pub struct FlyCli {
    bin: String,
    org: Option<String>,
}

impl FlyCli {
    pub fn new(bin: impl Into<String>, org: Option<String>) -> Self {
        Self {
            bin: bin.into(),
            org,
        }
    }

    fn command(&self, credential: Option<&DeployCredential>) -> ProcessSpec {
        let spec = ProcessSpec::new(self.bin.clone());
        match credential {
            Some(credential) => spec.env(TOKEN_ENV, credential.expose()),
            None => spec,
        }
    }

    async fn json(&self, spec: ProcessSpec) -> Result<Value, ProcessError> {
        let spec = spec.quiet();
        let output = process::run_checked(&spec, StdoutMode::Capture).await?;
        parse_json(&spec.display(), &output.stdout)
    }
}

fn parse_json(command: &str, stdout: &str) -> Result<Value, ProcessError> {
    serde_json::from_str(stdout.trim()).map_err(|e| ProcessError::UnexpectedOutput {
        command: command.to_string(),
        message: e.to_string(),
    })
}

/// Reads `Name`/`name` fields out of a JSON array of objects
pub fn names_from_json(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    item.get("Name")
                        .or_else(|| item.get("name"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Formats one `secrets import` line; multi-line values use the triple-quote form
///
/// The triple-quote form has no escape, so a multi-line value that contains `"""` or
/// ends in `"` cannot be staged intact and is rejected. The value never appears in the
/// error.
pub fn secret_import_line(key: &str, value: &str) -> Result<String, ProcessError> {
    if !value.contains('\n') {
        return Ok(format!("{}={}\n", key, value));
    }
    if value.contains("\"\"\"") || value.ends_with('"') {
        return Err(ProcessError::InvalidInput {
            command: "secrets import".to_string(),
            message: format!(
                "multi-line value of {} contains a triple quote or ends in a quote",
                key
            ),
        });
    }
    Ok(format!("{}=\"\"\"{}\"\"\"\n", key, value))
}

#[async_trait]
impl DeploymentPlatform for FlyCli {
    async fn list_apps(
        &self,
        credential: Option<&DeployCredential>,
    ) -> Result<Vec<String>, ProcessError> {
        let value = self
            .json(self.command(credential).args(["apps", "list", "--json"]))
            .await?;
        Ok(names_from_json(&value))
    }

    async fn create_app(
        &self,
        app: &str,
        credential: Option<&DeployCredential>,
    ) -> Result<(), ProcessError> {
        info!(app = %app, "Creating application");
        let mut spec = self.command(credential).args(["apps", "create", app]);
        if let Some(org) = &self.org {
            spec = spec.args(["--org", org.as_str()]);
        }
        process::run_checked(&spec, StdoutMode::Forward).await?;
        Ok(())
    }

    async fn set_secret(
        &self,
        app: &str,
        key: &str,
        value: &str,
        credential: Option<&DeployCredential>,
    ) -> Result<(), ProcessError> {
        // Values go through stdin so they never show up in a process listing.
        let spec = self
            .command(credential)
            .args(["secrets", "import", "--stage", "--app", app])
            .stdin(secret_import_line(key, value)?);
        process::run_checked(&spec, StdoutMode::Forward).await?;
        Ok(())
    }

    async fn list_secrets(
        &self,
        app: &str,
        credential: Option<&DeployCredential>,
    ) -> Result<Vec<String>, ProcessError> {
        let value = self
            .json(
                self.command(credential)
                    .args(["secrets", "list", "--app", app, "--json"]),
            )
            .await?;
        Ok(names_from_json(&value))
    }

    async fn deploy(
        &self,
        workspace: &Path,
        app: &str,
        credential: Option<&DeployCredential>,
    ) -> Result<(), ProcessError> {
        info!(app = %app, workspace = %workspace.display(), "Deploying");
        let spec = self
            .command(credential)
            .args(["deploy", "--config", FLY_TOML, "--app", app, "--remote-only"])
            .current_dir(workspace);
        process::run_checked(&spec, StdoutMode::Forward).await?;
        Ok(())
    }

    async fn hostname(
        &self,
        app: &str,
        credential: Option<&DeployCredential>,
    ) -> Result<String, ProcessError> {
        let spec = self
            .command(credential)
            .args(["status", "--app", app, "--json"]);
        let command = spec.display();
        let value = self.json(spec).await?;
        value
            .get("Hostname")
            .or_else(|| value.get("hostname"))
            .and_then(Value::as_str)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ProcessError::UnexpectedOutput {
                command,
                message: "status output has no hostname".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_names_from_json() {
        let value = json!([{"Name": "a", "Status": "deployed"}, {"name": "b"}, {"other": 1}]);
        assert_eq!(names_from_json(&value), vec!["a", "b"]);
        assert!(names_from_json(&json!({"not": "array"})).is_empty());
    }

    #[test]
    fn test_secret_import_line() {
        assert_eq!(secret_import_line("KEY", "v=1").unwrap(), "KEY=v=1\n");
        assert_eq!(
            secret_import_line("PEM", "line1\nline2").unwrap(),
            "PEM=\"\"\"line1\nline2\"\"\"\n"
        );
        assert_eq!(
            secret_import_line("QUOTED", "say \"\"\"hi\"\"\"").unwrap(),
            "QUOTED=say \"\"\"hi\"\"\"\n"
        );
    }

    #[test]
    fn test_multiline_value_with_triple_quote_is_rejected() {
        for value in ["a\n\"\"\"b", "a\nb\""] {
            let err = secret_import_line("PEM", value).unwrap_err();
            assert!(matches!(err, ProcessError::InvalidInput { .. }));
            assert!(err.to_string().contains("PEM"));
            assert!(!err.to_string().contains("a\n"));
        }
    }

    #[tokio::test]
    async fn test_unrepresentable_secret_never_reaches_flyctl() {
        let cli = FlyCli::new("no-such-flyctl-4821", None);
        let err = cli
            .set_secret("demo", "PEM", "line1\n\"\"\"line2", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::InvalidInput { .. }));
    }

    #[test]
    fn test_credential_travels_in_env() {
        let cli = FlyCli::new("flyctl", None);
        let credential = DeployCredential::new("fo1_token".to_string());
        let spec = cli.command(Some(&credential)).arg("deploy");
        assert_eq!(spec.arguments(), ["deploy".to_string()]);
        assert!(!spec.display().contains("fo1_token"));
    }
}
