//! Command handlers.

use crate::commands::GetCredArgs;
use awsoidc_auth::{
    CredentialBroker, CredentialSource, FlowOptions, StsConfig, StsExchanger, StsIdentityChecker,
    SystemBrowser,
};
use awsoidc_cli::CliConfig;
use awsoidc_cli::output::{self, Shell};
use awsoidc_cli::progress::{self, PromptingBrowser};
use awsoidc_core::config::{MAX_SESSION_DURATION_SECONDS, MIN_SESSION_DURATION_SECONDS};
use awsoidc_core::ports::CredentialStore;
use awsoidc_core::{ProviderConfig, RoleArn};
use awsoidc_secrets::KeyringStore;
use console::style;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

type HandlerResult = Result<(), Box<dyn std::error::Error>>;

/// Obtain credentials and print them to stdout.
pub async fn get_cred(config: &CliConfig, args: &GetCredArgs) -> HandlerResult {
    let (name, provider) = config.select_provider(args.provider.as_deref())?;
    debug!(provider = name, "Using OIDC provider");

    let role = provider.resolve_role(args.role.as_deref())?;
    let sts = StsConfig::from_env().for_partition(role.partition());
    let broker = CredentialBroker::new(
        provider.clone(),
        Arc::new(StsExchanger::new(sts.clone())),
        Arc::new(StsIdentityChecker::new(sts)),
        Arc::new(KeyringStore::new()),
    )
    .with_browser(Arc::new(PromptingBrowser::new(SystemBrowser)))
    .with_flow_options(FlowOptions {
        login_timeout: Duration::from_secs(args.timeout),
        ..Default::default()
    })
    .with_progress(progress::stderr_sink());

    let obtained = broker.obtain(&args.credential_request()).await?;
    if obtained.source == CredentialSource::Cached {
        eprintln!(
            "{} Using stored credential for {}",
            style("✓").green(),
            style(&obtained.role_arn).bold()
        );
    }

    if args.json {
        println!("{}", output::json(&obtained.credential)?);
    } else {
        eprintln!();
        print!("{}", output::exports(&obtained.credential, Shell::current()));
    }
    Ok(())
}

/// Interactive provider setup.
pub fn setup() -> HandlerResult {
    use dialoguer::Input;

    let name: String = Input::new()
        .with_prompt("OIDC provider name")
        .validate_with(|s: &String| required(s))
        .interact_text()?;
    let metadata_url: String = Input::new()
        .with_prompt(
            "OIDC provider metadata URL (https://your-oidc-provider/.well-known/openid-configuration)",
        )
        .validate_with(|s: &String| required(s))
        .interact_text()?;
    let client_id: String = Input::new()
        .with_prompt("Client ID which is registered in the OIDC provider")
        .validate_with(|s: &String| required(s))
        .interact_text()?;
    let client_secret: String = Input::new()
        .with_prompt("Client secret which is registered in the OIDC provider (Default: none)")
        .allow_empty(true)
        .interact_text()?;
    let max_duration: String = Input::new()
        .with_prompt("The max session duration, in seconds, of the role session [900-43200]")
        .default("3600".to_string())
        .validate_with(|s: &String| validate_duration(s))
        .interact_text()?;
    let default_role: String = Input::new()
        .with_prompt(
            "The default IAM Role ARN when you have multiple roles, as \
             arn:aws:iam::<account-id>:role/<role-name> (Default: none)",
        )
        .allow_empty(true)
        .validate_with(|s: &String| validate_optional_role(s))
        .interact_text()?;
    let session_name: String = Input::new()
        .with_prompt("AWS federation roleSessionName")
        .validate_with(|s: &String| required(s))
        .interact_text()?;

    let provider = ProviderConfig {
        metadata_url: metadata_url.trim().to_string(),
        client_id: client_id.trim().to_string(),
        client_secret: non_empty(client_secret),
        max_session_duration_seconds: max_duration.trim().parse().ok(),
        default_role_arn: non_empty(default_role),
        role_session_name: non_empty(session_name),
    };

    let mut config = CliConfig::load()?;
    config.set_provider(name.trim(), provider);
    let path = config.save()?;

    eprintln!("{} Saved {}", style("✓").green(), path.display());
    Ok(())
}

/// Remove a stored credential.
pub async fn clear_secret(
    config: &CliConfig,
    provider: Option<&str>,
    role: Option<&str>,
) -> HandlerResult {
    let (_, provider) = config.select_provider(provider)?;
    let role_arn = provider.resolve_role(role)?;

    let store = KeyringStore::new();
    if store.delete(&role_arn).await? {
        eprintln!(
            "{} Removed stored credential for {}",
            style("✓").green(),
            style(&role_arn).bold()
        );
    } else {
        eprintln!(
            "{} No stored credential for {}",
            style("!").yellow(),
            style(&role_arn).bold()
        );
    }
    Ok(())
}

/// Show configuration with the client secret masked.
pub fn show_config(config: &CliConfig, provider: Option<&str>) -> HandlerResult {
    let mut shown = CliConfig::default();
    for (name, entry) in &config.providers {
        if provider.is_some_and(|p| p != name.as_str()) {
            continue;
        }
        let mut entry = entry.clone();
        if entry.client_secret.is_some() {
            entry.client_secret = Some("***".to_string());
        }
        shown.set_provider(name.clone(), entry);
    }

    if let Some(name) = provider
        && shown.providers.is_empty()
    {
        return Err(format!("OIDC provider {name:?} is not configured").into());
    }

    if shown.providers.is_empty() {
        println!("{} No OIDC provider configured", style("i").blue());
    } else {
        print!("{}", serde_yaml::to_string(&shown)?);
    }
    if let Ok(path) = CliConfig::config_path() {
        eprintln!("\nConfig file: {}", path.display());
    }
    Ok(())
}

pub fn show_config_path() -> HandlerResult {
    println!("{}", CliConfig::config_path()?.display());
    Ok(())
}

fn non_empty(value: String) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn required(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err("Input is required".to_string())
    } else {
        Ok(())
    }
}

fn validate_duration(value: &str) -> Result<(), String> {
    match value.trim().parse::<i64>() {
        Ok(secs) if (MIN_SESSION_DURATION_SECONDS..=MAX_SESSION_DURATION_SECONDS).contains(&secs) => {
            Ok(())
        }
        _ => Err("Input must be 900-43200".to_string()),
    }
}

fn validate_optional_role(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Ok(());
    }
    RoleArn::parse(value)
        .map(|_| ())
        .map_err(|_| "Input must be IAM Role ARN".to_string())
}
