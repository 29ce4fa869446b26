use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Turn a plain Python file into a deployed HTTP service
#[derive(Parser, Debug)]
#[command(
    name = "getmethatdawg",
    about = "Turn a plain Python file into a deployed HTTP service",
    version,
    author,
    long_about = "getmethatdawg discovers the functions in a Python source file, wraps them in a \
                  generated Flask service, builds a container image and deploys it to Fly.io. \
                  Configuration from .env is split into platform secrets and plain \
                  environment variables."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Build and deploy a Python file as an HTTP service",
        long_about = "Discovers endpoints, builds the service image, stages secrets and deploys \
                      to Fly.io. The temporary workspace is removed on every exit path, \
                      including Ctrl-C.\n\n\
                      Examples:\n  \
                      getmethatdawg deploy agent.py\n  \
                      getmethatdawg deploy agent.py --auto-detect --name my-agent\n  \
                      getmethatdawg deploy agent.py --pre-auth --region fra"
    )]
    Deploy(DeployArgs),

    #[command(
        about = "Generate deployment files without deploying",
        long_about = "Writes the generated service, dependency manifest, Dockerfile and fly.toml \
                      into a directory. Secret values are never written there.\n\n\
                      Examples:\n  \
                      getmethatdawg build agent.py --output-dir out/"
    )]
    Build(BuildArgs),

    #[command(
        about = "List the endpoints discovered in a Python file",
        long_about = "Examples:\n  \
                      getmethatdawg endpoints agent.py --auto-detect\n  \
                      getmethatdawg endpoints agent.py --format json"
    )]
    Endpoints(EndpointsArgs),

    #[command(
        about = "Encrypt a platform token for a pre-authenticated builder image",
        long_about = "Prints the ciphertext to bake into a builder image. The encryption keeps \
                      the token out of plaintext image layers; it does not protect it from \
                      anyone with a shell inside the container."
    )]
    EncryptToken(EncryptTokenArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct SourceArgs {
    #[arg(value_name = "SOURCE", help = "Python source file")]
    pub source: PathBuf,

    #[arg(
        long,
        help = "Expose every public top-level function instead of only @getmethatdawg.expose markers"
    )]
    pub auto_detect: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct DeployArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(short = 'n', long, value_name = "NAME", help = "Application name (defaults to the file name)")]
    pub name: Option<String>,

    #[arg(short = 'r', long, value_name = "REGION", help = "Platform primary region")]
    pub region: Option<String>,

    #[arg(long, value_name = "FILE", help = "Dependency manifest to use instead of requirements.txt beside the source")]
    pub requirements: Option<PathBuf>,

    #[arg(long, help = "Use the credential baked into a pre-authenticated builder image")]
    pub pre_auth: bool,

    #[arg(long, value_name = "FILE", help = "Environment file (defaults to .env beside the source)")]
    pub env_file: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(short = 'o', long, value_name = "DIR", help = "Directory to write the deployment files into")]
    pub output_dir: PathBuf,

    #[arg(short = 'n', long, value_name = "NAME", help = "Application name (defaults to the file name)")]
    pub name: Option<String>,

    #[arg(long, value_name = "FILE", help = "Dependency manifest to use instead of requirements.txt beside the source")]
    pub requirements: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Environment file (defaults to .env beside the source)")]
    pub env_file: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct EndpointsArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct EncryptTokenArgs {
    #[arg(value_name = "TOKEN", help = "Platform API token")]
    pub token: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_default_deploy_args() {
        let args = CliArgs::parse_from(["getmethatdawg", "deploy", "agent.py"]);
        match args.command {
            Commands::Deploy(deploy_args) => {
                assert_eq!(deploy_args.source.source, PathBuf::from("agent.py"));
                assert!(!deploy_args.source.auto_detect);
                assert!(!deploy_args.pre_auth);
                assert!(deploy_args.name.is_none());
                assert!(deploy_args.region.is_none());
                assert!(deploy_args.requirements.is_none());
                assert!(deploy_args.env_file.is_none());
            }
            _ => panic!("Expected Deploy command"),
        }
    }

    #[test]
    fn test_deploy_with_options() {
        let args = CliArgs::parse_from([
            "getmethatdawg",
            "deploy",
            "agent.py",
            "--auto-detect",
            "--name",
            "my-agent",
            "--region",
            "fra",
            "--requirements",
            "reqs.txt",
            "--pre-auth",
            "--env-file",
            "prod.env",
        ]);
        match args.command {
            Commands::Deploy(deploy_args) => {
                assert!(deploy_args.source.auto_detect);
                assert_eq!(deploy_args.name.as_deref(), Some("my-agent"));
                assert_eq!(deploy_args.region.as_deref(), Some("fra"));
                assert_eq!(deploy_args.requirements, Some(PathBuf::from("reqs.txt")));
                assert!(deploy_args.pre_auth);
                assert_eq!(deploy_args.env_file, Some(PathBuf::from("prod.env")));
            }
            _ => panic!("Expected Deploy command"),
        }
    }

    #[test]
    fn test_build_requires_output_dir() {
        assert!(CliArgs::try_parse_from(["getmethatdawg", "build", "agent.py"]).is_err());

        let args =
            CliArgs::parse_from(["getmethatdawg", "build", "agent.py", "--output-dir", "out"]);
        match args.command {
            Commands::Build(build_args) => {
                assert_eq!(build_args.output_dir, PathBuf::from("out"));
            }
            _ => panic!("Expected Build command"),
        }
    }

    #[test]
    fn test_endpoints_format() {
        let args = CliArgs::parse_from([
            "getmethatdawg",
            "endpoints",
            "agent.py",
            "--format",
            "json",
        ]);
        match args.command {
            Commands::Endpoints(endpoints_args) => {
                assert_eq!(endpoints_args.format, OutputFormatArg::Json);
            }
            _ => panic!("Expected Endpoints command"),
        }
    }

    #[test]
    fn test_encrypt_token() {
        let args = CliArgs::parse_from(["getmethatdawg", "encrypt-token", "fo1_abc"]);
        match args.command {
            Commands::EncryptToken(encrypt_args) => assert_eq!(encrypt_args.token, "fo1_abc"),
            _ => panic!("Expected EncryptToken command"),
        }
    }

    #[test]
    fn test_no_decrypt_command() {
        assert!(CliArgs::try_parse_from(["getmethatdawg", "decrypt-token", "x"]).is_err());
    }

    #[test]
    fn test_global_flags() {
        let args = CliArgs::parse_from(["getmethatdawg", "-v", "endpoints", "a.py"]);
        assert!(args.verbose);
        assert!(!args.quiet);

        let args = CliArgs::parse_from(["getmethatdawg", "endpoints", "a.py", "-q"]);
        assert!(args.quiet);

        let args =
            CliArgs::parse_from(["getmethatdawg", "--log-level", "debug", "endpoints", "a.py"]);
        assert_eq!(args.log_level, Some("debug".to_string()));

        assert!(CliArgs::try_parse_from(["getmethatdawg", "-v", "-q", "endpoints", "a.py"]).is_err());
    }
}
