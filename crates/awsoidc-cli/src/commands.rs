//! CLI command definitions.

use awsoidc_auth::CredentialRequest;
use clap::{Args, Subcommand};

#[derive(Subcommand)]
pub enum Commands {
    /// Get AWS credentials and print them as shell exports or JSON
    GetCred(GetCredArgs),

    /// Interactive setup of an OIDC provider
    Setup,

    /// Remove a role's credential from the OS secret store
    ClearSecret {
        /// OIDC provider name
        #[arg(short, long)]
        provider: Option<String>,

        /// IAM role ARN (defaults to the provider's default role)
        #[arg(short, long)]
        role: Option<String>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args, Debug, Clone)]
pub struct GetCredArgs {
    /// OIDC provider name
    #[arg(short, long)]
    pub provider: Option<String>,

    /// IAM role ARN to assume
    #[arg(short, long)]
    pub role: Option<String>,

    /// Maximum session duration in seconds [900-43200]
    #[arg(short = 'd', long = "max-duration")]
    pub max_duration: Option<i64>,

    /// Reuse and save credentials in the OS secret store
    #[arg(short = 's', long)]
    pub use_secret: bool,

    /// Log in again even if a stored credential is still valid
    #[arg(long)]
    pub refresh: bool,

    /// Print credentials as JSON (credential_process format)
    #[arg(short, long)]
    pub json: bool,

    /// Seconds to wait for the browser login to finish
    #[arg(long, default_value_t = 300)]
    pub timeout: u64,
}

impl GetCredArgs {
    pub fn credential_request(&self) -> CredentialRequest {
        CredentialRequest {
            role_arn: self.role.clone(),
            max_session_duration_seconds: self.max_duration,
            reuse_cached: self.use_secret && !self.refresh,
            persist: self.use_secret,
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show configured providers
    Show {
        /// Only show this provider
        #[arg(short, long)]
        provider: Option<String>,
    },

    /// Print the configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: Commands,
    }

    fn get_cred(args: &[&str]) -> GetCredArgs {
        let argv = ["aws-cli-oidc", "get-cred"].iter().chain(args);
        match TestCli::try_parse_from(argv).unwrap().command {
            Commands::GetCred(args) => args,
            _ => panic!("expected get-cred"),
        }
    }

    #[test]
    fn use_secret_reuses_and_persists() {
        let request = get_cred(&["-p", "corp", "-s"]).credential_request();
        assert!(request.reuse_cached);
        assert!(request.persist);
    }

    #[test]
    fn refresh_skips_reuse_but_still_persists() {
        let request = get_cred(&["-s", "--refresh"]).credential_request();
        assert!(!request.reuse_cached);
        assert!(request.persist);
    }

    #[test]
    fn defaults() {
        let args = get_cred(&[]);
        assert_eq!(args.timeout, 300);
        assert!(!args.json);

        let request = args.credential_request();
        assert!(!request.reuse_cached && !request.persist);
        assert_eq!(request.role_arn, None);
    }

    #[test]
    fn role_and_duration() {
        let request = get_cred(&["-r", "arn:aws:iam::123456789012:role/dev", "-d", "7200", "-j"])
            .credential_request();
        assert_eq!(request.role_arn.as_deref(), Some("arn:aws:iam::123456789012:role/dev"));
        assert_eq!(request.max_session_duration_seconds, Some(7200));
    }
}
