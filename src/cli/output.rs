//! Output formatting for command results
//!
//! Human output mirrors what a user reads after a deploy; JSON is for scripts.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::discovery::EndpointDescriptor;
use crate::pipeline::DeploymentReport;

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// Human-readable formatted text
    Human,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_endpoints(&self, endpoints: &[EndpointDescriptor]) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(endpoints)
                .context("Failed to serialize endpoints to JSON"),
            OutputFormat::Human => Ok(self.format_endpoints_human(endpoints)),
        }
    }

    pub fn format_report(&self, report: &DeploymentReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report)
                .context("Failed to serialize deployment report to JSON"),
            OutputFormat::Human => Ok(self.format_report_human(report)),
        }
    }

    fn format_endpoints_human(&self, endpoints: &[EndpointDescriptor]) -> String {
        let mut output = format!("Discovered {} endpoint(s)\n{}\n", endpoints.len(), RULE);

        for endpoint in endpoints {
            output.push_str(&format!(
                "{:<6} {}  \u{2192} {}{}()\n",
                endpoint.http_method.as_str(),
                endpoint.path,
                if endpoint.is_async { "async " } else { "" },
                endpoint.function_name
            ));
            for (i, param) in endpoint.parameters.iter().enumerate() {
                let connector = if i + 1 == endpoint.parameters.len() {
                    "\u{2514}"
                } else {
                    "\u{251C}"
                };
                let default = match (&param.default_value, param.has_default) {
                    (Some(value), _) => format!(" = {}", value),
                    (None, true) => " (optional)".to_string(),
                    (None, false) => String::new(),
                };
                output.push_str(&format!(
                    "       {}\u{2500} {}: {}{}\n",
                    connector, param.name, param.declared_type, default
                ));
            }
        }

        output
    }

    fn format_report_human(&self, report: &DeploymentReport) -> String {
        let mut output = String::new();

        if report.has_warnings() {
            output.push_str("\u{26A0} Deployed with warnings\n");
        } else {
            output.push_str("\u{2713} Deployed\n");
        }
        output.push_str(RULE);
        output.push_str("\n\n");

        output.push_str(&format!("App:   {}\n", report.app_name));
        output.push_str(&format!(
            "URL:   {}\n",
            report.url.as_deref().unwrap_or("(unresolved)")
        ));
        output.push_str(&format!("Mode:  {}", report.mode));
        if report.fallback_taken {
            output.push_str(" (fell back from pre-auth)");
        }
        output.push_str("\n\nEndpoints:\n");

        let urls = report.endpoint_urls();
        for (i, (method, url)) in urls.iter().enumerate() {
            let connector = if i + 1 == urls.len() { "\u{2514}" } else { "\u{251C}" };
            output.push_str(&format!("{}\u{2500} {:<6} {}\n", connector, method.as_str(), url));
        }

        if report.has_warnings() {
            output.push_str("\nWarnings:\n");
            for warning in &report.warnings {
                output.push_str(&format!("  \u{26A0} {}\n", warning));
            }
        }

        output
    }
}

/// Summary printed after `build` writes its files
pub fn format_build_summary(dir: &Path, written: &[PathBuf], secret_keys: &[&str]) -> String {
    let mut output = format!("\u{2713} Deployment files written to {}\n{}\n", dir.display(), RULE);
    for path in written {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        output.push_str(&format!("  {}\n", name));
    }
    if !secret_keys.is_empty() {
        output.push_str(&format!(
            "\nSecrets to set with `flyctl secrets set` before deploying: {}\n",
            secret_keys.join(", ")
        ));
    }
    output
}
