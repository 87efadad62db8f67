//! CLI configuration management.

use awsoidc_core::{Error, ProviderConfig, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Overrides the configuration directory.
pub const CONFIG_DIR_ENV: &str = "AWS_CLI_OIDC_CONFIG";
pub const CONFIG_FILE_NAME: &str = "config.yaml";
const DEFAULT_DIR_NAME: &str = ".aws-cli-oidc";

/// All configured providers, keyed by the name given during `setup`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CliConfig {
    pub providers: BTreeMap<String, ProviderConfig>,
}

impl CliConfig {
    /// `$AWS_CLI_OIDC_CONFIG`, else `~/.aws-cli-oidc`.
    pub fn config_dir() -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        let dirs = directories::BaseDirs::new().ok_or_else(|| {
            Error::Configuration("could not determine the home directory".to_string())
        })?;
        Ok(dirs.home_dir().join(DEFAULT_DIR_NAME))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// A missing or empty file is an empty configuration.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(config_file_error(path, err)),
        };
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|e| config_file_error(path, e))
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            create_private_dir(parent)?;
        }
        let content = serde_yaml::to_string(self).map_err(|e| config_file_error(path, e))?;
        write_private_file(path, content.as_bytes())
    }

    /// Pick a provider by name, or the only one when no name is given.
    pub fn select_provider(&self, name: Option<&str>) -> Result<(&str, &ProviderConfig)> {
        match name {
            Some(name) => self
                .providers
                .get_key_value(name)
                .map(|(k, v)| (k.as_str(), v))
                .ok_or_else(|| {
                    Error::Configuration(format!(
                        "OIDC provider {name:?} is not configured; run `aws-cli-oidc setup`"
                    ))
                }),
            None => {
                let mut providers = self.providers.iter();
                match (providers.next(), providers.next()) {
                    (Some((k, v)), None) => Ok((k.as_str(), v)),
                    (None, _) => Err(Error::Configuration(
                        "no OIDC provider is configured; run `aws-cli-oidc setup`".to_string(),
                    )),
                    (Some(_), Some(_)) => Err(Error::Configuration(
                        "several OIDC providers are configured; choose one with --provider"
                            .to_string(),
                    )),
                }
            }
        }
    }

    pub fn set_provider(&mut self, name: impl Into<String>, provider: ProviderConfig) {
        self.providers.insert(name.into(), provider);
    }
}

fn config_file_error(path: &Path, err: impl std::fmt::Display) -> Error {
    Error::ConfigFile {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    Ok(())
}

/// The file may hold `client_secret`, so it is owner-only.
#[cfg(unix)]
fn write_private_file(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation.
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(content)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private_file(path: &Path, content: &[u8]) -> Result<()> {
    std::fs::write(path, content)?;
    Ok(())
}
