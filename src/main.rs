use getmethatdawg::cli::commands::{CliArgs, Commands};
use getmethatdawg::cli::handlers::{
    handle_build, handle_deploy, handle_encrypt_token, handle_endpoints,
};
use getmethatdawg::util::logging::{init_logging, LoggingConfig};
use getmethatdawg::{NAME, VERSION};

use clap::Parser;
use std::process;
use tracing::debug;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging(LoggingConfig::from_args(
        args.log_level.as_deref(),
        args.verbose,
        args.quiet,
    ));

    debug!("{} v{} starting", NAME, VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Deploy(deploy_args) => handle_deploy(deploy_args, args.quiet).await,
        Commands::Build(build_args) => handle_build(build_args, args.quiet).await,
        Commands::Endpoints(endpoints_args) => handle_endpoints(endpoints_args).await,
        Commands::EncryptToken(encrypt_args) => handle_encrypt_token(encrypt_args).await,
    };

    process::exit(exit_code);
}
