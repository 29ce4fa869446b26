//! Subcommand handlers
//!
//! Each handler returns the process exit code; `main` exits with it.

use super::commands::{BuildArgs, DeployArgs, EncryptTokenArgs, EndpointsArgs, SourceArgs};
use super::output::{format_build_summary, OutputFormat, OutputFormatter};
use crate::config::{resolve_app_name, DeployConfig};
use crate::credential;
use crate::discovery::{self, DiscoveryMode};
use crate::pipeline::{prepare, DeployOrchestrator, DeployRequest, DeploymentMode};
use crate::platform::{DockerCli, FlyCli};
use crate::progress::LoggingHandler;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Exit code used when the user interrupts a deploy (SIGINT)
pub const EXIT_INTERRUPTED: i32 = 130;
/// Exit code used when the deploy is terminated (SIGTERM)
pub const EXIT_TERMINATED: i32 = 143;
/// Exit code used when the controlling terminal goes away (SIGHUP)
pub const EXIT_HANGUP: i32 = 129;

/// Signals that abort a deploy
///
/// Handlers are installed before the attempt starts so that no signal in the window
/// before the first poll falls through to the default action and skips cleanup.
struct Interrupts {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    hangup: tokio::signal::unix::Signal,
}

impl Interrupts {
    #[cfg(unix)]
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    #[cfg(not(unix))]
    fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Waits for the next interrupt and returns its name and exit code
    #[cfg(unix)]
    async fn recv(&mut self) -> (&'static str, i32) {
        tokio::select! {
            _ = self.interrupt.recv() => ("SIGINT", EXIT_INTERRUPTED),
            _ = self.terminate.recv() => ("SIGTERM", EXIT_TERMINATED),
            _ = self.hangup.recv() => ("SIGHUP", EXIT_HANGUP),
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> (&'static str, i32) {
        let _ = tokio::signal::ctrl_c().await;
        ("SIGINT", EXIT_INTERRUPTED)
    }
}

fn request_from(
    source: &SourceArgs,
    name: Option<&str>,
    requirements: Option<&std::path::PathBuf>,
    env_file: Option<&std::path::PathBuf>,
) -> Result<DeployRequest> {
    if !source.source.is_file() {
        anyhow::bail!("Source file does not exist: {}", source.source.display());
    }
    let app_name = resolve_app_name(name, &source.source)
        .context("Could not determine the application name")?;

    let mut request = DeployRequest::new(&source.source, app_name);
    request.discovery_mode = DiscoveryMode::from_auto_detect(source.auto_detect);
    request.requirements = requirements.cloned();
    request.env_file = env_file.cloned();
    Ok(request)
}

fn deploy_config(args: &DeployArgs) -> Result<DeployConfig> {
    let mut config = DeployConfig::default();
    if let Some(region) = &args.region {
        config.region = region.trim().to_lowercase();
    }
    if args.pre_auth {
        config.mode = DeploymentMode::PreAuth;
    }
    config.validate().context("Configuration error")?;
    debug!(config = %config, "Resolved configuration");
    Ok(config)
}

pub async fn handle_deploy(args: &DeployArgs, quiet: bool) -> i32 {
    let prepared = deploy_config(args).and_then(|config| {
        let request = request_from(
            &args.source,
            args.name.as_deref(),
            args.requirements.as_ref(),
            args.env_file.as_ref(),
        )?;
        Ok((config, request))
    });
    let (config, request) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            error!("{:#}", e);
            return 1;
        }
    };

    let mut interrupts = match Interrupts::install() {
        Ok(interrupts) => interrupts,
        Err(e) => {
            error!("Failed to install signal handlers: {}", e);
            return 1;
        }
    };

    let engine = Arc::new(DockerCli::new(config.docker_bin.clone()));
    let platform = Arc::new(FlyCli::new(config.flyctl_bin.clone(), config.org.clone()));
    let orchestrator =
        DeployOrchestrator::new(config, engine, platform).with_progress(Arc::new(LoggingHandler));

    info!(app = %request.app_name, "Deploying {}", request.source_file.display());
    let app_name = request.app_name.clone();

    // Dropping the deploy future on interrupt removes the workspace and kills children.
    let result = tokio::select! {
        result = orchestrator.deploy(request) => result,
        (signal, code) = interrupts.recv() => {
            orchestrator.discard_local_image(&app_name).await;
            error!(signal, "Interrupted; deployment aborted and workspace removed");
            return code;
        }
    };

    match result {
        Ok(report) => {
            if !quiet {
                match OutputFormatter::new(OutputFormat::Human).format_report(&report) {
                    Ok(text) => println!("{}", text),
                    Err(e) => {
                        error!("{:#}", e);
                        return 1;
                    }
                }
            }
            0
        }
        Err(e) => {
            error!("Deployment failed: {}", e);
            1
        }
    }
}

pub async fn handle_build(args: &BuildArgs, quiet: bool) -> i32 {
    match run_build(args) {
        Ok(summary) => {
            if !quiet {
                println!("{}", summary);
            }
            0
        }
        Err(e) => {
            error!("{:#}", e);
            1
        }
    }
}

fn run_build(args: &BuildArgs) -> Result<String> {
    let config = DeployConfig::default();
    config.validate().context("Configuration error")?;

    let request = request_from(
        &args.source,
        args.name.as_deref(),
        args.requirements.as_ref(),
        args.env_file.as_ref(),
    )?;
    let prepared = prepare(&request, &config).context("Failed to generate the service")?;

    let written = prepared
        .artifacts
        .write_public_to(&args.output_dir)
        .context("Failed to write deployment files")?;

    info!(
        files = written.len(),
        endpoints = prepared.endpoints.len(),
        "Deployment files generated"
    );
    Ok(format_build_summary(
        &args.output_dir,
        &written,
        &prepared.env.secret_keys(),
    ))
}

pub async fn handle_endpoints(args: &EndpointsArgs) -> i32 {
    let mode = DiscoveryMode::from_auto_detect(args.source.auto_detect);
    let result = discovery::discover_file(&args.source.source, mode)
        .context("Endpoint discovery failed")
        .and_then(|endpoints| OutputFormatter::new(args.format.into()).format_endpoints(&endpoints));

    match result {
        Ok(text) => {
            println!("{}", text);
            0
        }
        Err(e) => {
            error!("{:#}", e);
            1
        }
    }
}

pub async fn handle_encrypt_token(args: &EncryptTokenArgs) -> i32 {
    let config = DeployConfig::default();
    match credential::encrypt(args.token.trim().as_bytes(), &config.credential_passphrase) {
        Ok(ciphertext) => {
            println!("{}", ciphertext);
            eprintln!(
                "\nBake it into the builder image with:\n  docker build --build-arg ENCRYPTED_TOKEN={} ...",
                ciphertext
            );
            0
        }
        Err(e) => {
            error!("{}", e);
            1
        }
    }
}
