//! Configuration management for getmethatdawg
//!
//! Settings are loaded from environment variables with sensible defaults. Command-line
//! flags override individual values after loading.
//!
//! # Environment Variables
//!
//! - `GETMETHATDAWG_MODE`: Deployment mode (regular|pre-auth) - default: "regular"
//! - `GETMETHATDAWG_REGION`: Platform primary region - default: "iad"
//! - `GETMETHATDAWG_PORT`: Port the generated service listens on - default: "5000"
//! - `GETMETHATDAWG_PYTHON_IMAGE`: Base image of the container descriptor - default: "python:3.11-slim"
//! - `GETMETHATDAWG_PREAUTH_IMAGES`: Comma-separated pre-authenticated builder images, tried in order
//! - `GETMETHATDAWG_CREDENTIAL_PASSPHRASE`: Passphrase for the credential codec
//! - `GETMETHATDAWG_DOCKER_BIN`: Container engine executable - default: "docker"
//! - `GETMETHATDAWG_FLYCTL_BIN`: Platform CLI executable - default: "flyctl"
//! - `GETMETHATDAWG_ORG`: Platform organization used when creating apps - optional
//! - `GETMETHATDAWG_LOG_LEVEL`: Logging level - default: "info"
//!
//! # Example
//!
//! ```no_run
//! use getmethatdawg::DeployConfig;
//!
//! let mut config = DeployConfig::default();
//! config.region = "fra".to_string();
//! config.validate().expect("Invalid configuration");
//! ```

use crate::assembler::AssemblyOptions;
use crate::credential::DEFAULT_PASSPHRASE;
use crate::pipeline::DeploymentMode;
use regex::Regex;
use std::env;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_REGION: &str = "iad";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_PYTHON_IMAGE: &str = "python:3.11-slim";
const DEFAULT_PREAUTH_IMAGES: &str =
    "ghcr.io/dwij1704/getmethatdawg-builder:authenticated,getmethatdawg/builder:authenticated";
const DEFAULT_DOCKER_BIN: &str = "docker";
const DEFAULT_FLYCTL_BIN: &str = "flyctl";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// Failed to parse configuration value
    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

#[derive(Clone)]
pub struct DeployConfig {
    pub mode: DeploymentMode,
    pub region: String,
    pub port: u16,
    pub python_image: String,
    /// Tried in order during pre-authenticated resolution
    pub preauth_images: Vec<String>,
    pub credential_passphrase: String,
    pub docker_bin: String,
    pub flyctl_bin: String,
    pub org: Option<String>,
    pub log_level: String,
}

impl Default for DeployConfig {
    /// Reads `GETMETHATDAWG_*` variables, falling back to defaults for anything unset
    /// or unparseable
    fn default() -> Self {
        let mode = env::var("GETMETHATDAWG_MODE")
            .ok()
            .and_then(|v| v.parse::<DeploymentMode>().ok())
            .unwrap_or_default();

        let region = env::var("GETMETHATDAWG_REGION")
            .map(|v| v.trim().to_lowercase())
            .unwrap_or_else(|_| DEFAULT_REGION.to_string());

        let port = env::var("GETMETHATDAWG_PORT")
            .ok()
            .and_then(|v| v.trim().parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let python_image = env::var("GETMETHATDAWG_PYTHON_IMAGE")
            .unwrap_or_else(|_| DEFAULT_PYTHON_IMAGE.to_string());

        let preauth_images = parse_image_list(
            &env::var("GETMETHATDAWG_PREAUTH_IMAGES")
                .unwrap_or_else(|_| DEFAULT_PREAUTH_IMAGES.to_string()),
        );

        let credential_passphrase = env::var("GETMETHATDAWG_CREDENTIAL_PASSPHRASE")
            .unwrap_or_else(|_| DEFAULT_PASSPHRASE.to_string());

        let docker_bin =
            env::var("GETMETHATDAWG_DOCKER_BIN").unwrap_or_else(|_| DEFAULT_DOCKER_BIN.to_string());
        let flyctl_bin =
            env::var("GETMETHATDAWG_FLYCTL_BIN").unwrap_or_else(|_| DEFAULT_FLYCTL_BIN.to_string());

        let org = env::var("GETMETHATDAWG_ORG")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let log_level = env::var("GETMETHATDAWG_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        Self {
            mode,
            region,
            port,
            python_image,
            preauth_images,
            credential_passphrase,
            docker_bin,
            flyctl_bin,
            org,
            log_level,
        }
    }
}

fn parse_image_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl DeployConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` naming the first bad value
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ValidationFailed(
                "Port must be between 1 and 65535".to_string(),
            ));
        }

        if self.region.is_empty() || !self.region.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid region: '{}'. Expected a platform region code such as iad or fra",
                self.region
            )));
        }

        if self.python_image.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Python base image cannot be empty".to_string(),
            ));
        }

        if self.mode == DeploymentMode::PreAuth && self.preauth_images.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Pre-authenticated mode needs at least one image in GETMETHATDAWG_PREAUTH_IMAGES"
                    .to_string(),
            ));
        }

        if self.credential_passphrase.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Credential passphrase cannot be empty".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn assembly_options(&self) -> AssemblyOptions {
        AssemblyOptions {
            region: self.region.clone(),
            port: self.port,
            base_image: self.python_image.clone(),
            flyctl: self.flyctl_bin.clone(),
        }
    }
}

impl fmt::Debug for DeployConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployConfig")
            .field("mode", &self.mode)
            .field("region", &self.region)
            .field("port", &self.port)
            .field("python_image", &self.python_image)
            .field("preauth_images", &self.preauth_images)
            .field("credential_passphrase", &"<redacted>")
            .field("docker_bin", &self.docker_bin)
            .field("flyctl_bin", &self.flyctl_bin)
            .field("org", &self.org)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl fmt::Display for DeployConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "getmethatdawg Configuration:")?;
        writeln!(f, "  Mode: {}", self.mode)?;
        writeln!(f, "  Region: {}", self.region)?;
        writeln!(f, "  Port: {}", self.port)?;
        writeln!(f, "  Python Image: {}", self.python_image)?;
        writeln!(f, "  Pre-auth Images: {}", self.preauth_images.join(", "))?;
        writeln!(f, "  Container Engine: {}", self.docker_bin)?;
        writeln!(f, "  Platform CLI: {}", self.flyctl_bin)?;
        if let Some(ref org) = self.org {
            writeln!(f, "  Organization: {}", org)?;
        }
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}

fn app_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9-]{1,62}$").expect("valid app name regex"))
}

/// Lowercases and replaces `_` and whitespace with `-`
pub fn normalize_app_name(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            '_' | ' ' | '\t' => '-',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Picks the application name: the override if given, else the source file's stem
///
/// # Errors
///
/// Returns `ConfigError::ValidationFailed` when the normalized name is not a valid
/// platform application name
pub fn resolve_app_name(name: Option<&str>, source_file: &Path) -> Result<String, ConfigError> {
    let raw = match name {
        Some(name) => name.to_string(),
        None => source_file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| ConfigError::ParseError {
                field: "app name".to_string(),
                error: format!("cannot derive a name from {}", source_file.display()),
            })?,
    };

    let normalized = normalize_app_name(&raw);
    if !app_name_pattern().is_match(&normalized) {
        return Err(ConfigError::ValidationFailed(format!(
            "Invalid app name: '{}'. Use 2-63 characters: lowercase letters, digits and '-', starting with a letter or digit",
            normalized
        )));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::path::PathBuf;
    use yare::parameterized;

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn unset(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    const ALL_VARS: &[&str] = &[
        "GETMETHATDAWG_MODE",
        "GETMETHATDAWG_REGION",
        "GETMETHATDAWG_PORT",
        "GETMETHATDAWG_PYTHON_IMAGE",
        "GETMETHATDAWG_PREAUTH_IMAGES",
        "GETMETHATDAWG_CREDENTIAL_PASSPHRASE",
        "GETMETHATDAWG_DOCKER_BIN",
        "GETMETHATDAWG_FLYCTL_BIN",
        "GETMETHATDAWG_ORG",
        "GETMETHATDAWG_LOG_LEVEL",
    ];

    fn clear_all() -> Vec<EnvGuard> {
        ALL_VARS.iter().map(|k| EnvGuard::unset(k)).collect()
    }

    #[test]
    #[serial]
    fn test_default_configuration() {
        let _guards = clear_all();

        let config = DeployConfig::default();

        assert_eq!(config.mode, DeploymentMode::Regular);
        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.python_image, DEFAULT_PYTHON_IMAGE);
        assert_eq!(config.preauth_images.len(), 2);
        assert_eq!(config.credential_passphrase, DEFAULT_PASSPHRASE);
        assert_eq!(config.docker_bin, "docker");
        assert_eq!(config.flyctl_bin, "flyctl");
        assert!(config.org.is_none());
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let _cleared = clear_all();
        let _guards = vec![
            EnvGuard::set("GETMETHATDAWG_MODE", "pre-auth"),
            EnvGuard::set("GETMETHATDAWG_REGION", "FRA"),
            EnvGuard::set("GETMETHATDAWG_PORT", "8080"),
            EnvGuard::set("GETMETHATDAWG_PREAUTH_IMAGES", " a:1 , ,b:2 "),
            EnvGuard::set("GETMETHATDAWG_FLYCTL_BIN", "fly"),
            EnvGuard::set("GETMETHATDAWG_ORG", "personal"),
            EnvGuard::set("GETMETHATDAWG_LOG_LEVEL", "DEBUG"),
        ];

        let config = DeployConfig::default();

        assert_eq!(config.mode, DeploymentMode::PreAuth);
        assert_eq!(config.region, "fra");
        assert_eq!(config.port, 8080);
        assert_eq!(config.preauth_images, vec!["a:1", "b:2"]);
        assert_eq!(config.flyctl_bin, "fly");
        assert_eq!(config.org.as_deref(), Some("personal"));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    #[serial]
    fn test_unparseable_values_fall_back() {
        let _cleared = clear_all();
        let _guards = vec![
            EnvGuard::set("GETMETHATDAWG_MODE", "sideways"),
            EnvGuard::set("GETMETHATDAWG_PORT", "99999"),
        ];

        let config = DeployConfig::default();
        assert_eq!(config.mode, DeploymentMode::Regular);
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    #[serial]
    fn test_validation_rejects_bad_values() {
        let _cleared = clear_all();

        let mut config = DeployConfig::default();
        config.port = 0;
        assert!(config.validate().is_err());

        let mut config = DeployConfig::default();
        config.region = "us east".to_string();
        assert!(config.validate().is_err());

        let mut config = DeployConfig::default();
        config.mode = DeploymentMode::PreAuth;
        config.preauth_images.clear();
        assert!(config.validate().is_err());

        let mut config = DeployConfig::default();
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_debug_and_display_hide_passphrase() {
        let _cleared = clear_all();
        let _guard = EnvGuard::set("GETMETHATDAWG_CREDENTIAL_PASSPHRASE", "hunter2-passphrase");

        let config = DeployConfig::default();
        assert!(!format!("{:?}", config).contains("hunter2-passphrase"));
        let display = format!("{}", config);
        assert!(display.contains("getmethatdawg Configuration:"));
        assert!(!display.contains("hunter2-passphrase"));
    }

    #[parameterized(
        from_stem = { None, "/src/my_agent.py", "my-agent" },
        override_name = { Some("Demo_App"), "/src/agent.py", "demo-app" },
        digits = { None, "/src/agent2.py", "agent2" },
    )]
    fn test_resolve_app_name(name: Option<&str>, source: &str, expected: &str) {
        assert_eq!(
            resolve_app_name(name, &PathBuf::from(source)).unwrap(),
            expected
        );
    }

    #[parameterized(
        too_short = { "a" },
        leading_dash = { "-agent" },
        bad_char = { "agent.v2" },
    )]
    fn test_resolve_app_name_invalid(name: &str) {
        assert!(resolve_app_name(Some(name), Path::new("/src/x.py")).is_err());
    }
}
