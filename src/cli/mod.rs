pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{BuildArgs, CliArgs, Commands, DeployArgs, EncryptTokenArgs, EndpointsArgs};
pub use output::{OutputFormat, OutputFormatter};
