//! Configuration, output and progress reporting for the `aws-cli-oidc` binary.

pub mod config;
pub mod output;
pub mod progress;

pub use config::CliConfig;
pub use output::Shell;
