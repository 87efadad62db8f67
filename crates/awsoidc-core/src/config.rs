//! Provider configuration and role identifiers.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Duration used when neither the caller nor the config specify one.
pub const DEFAULT_SESSION_DURATION_SECONDS: i64 = 3600;
/// Lower bound STS accepts for `DurationSeconds`.
pub const MIN_SESSION_DURATION_SECONDS: i64 = 900;
/// Upper bound STS accepts for `DurationSeconds`.
pub const MAX_SESSION_DURATION_SECONDS: i64 = 43200;

/// Configuration for one OIDC provider.
///
/// Serialized keys match the `config.yaml` written by `setup`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "oidc_provider_metadata_url")]
    pub metadata_url: String,
    pub client_id: String,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_secret: Option<String>,
    #[serde(
        default,
        deserialize_with = "lossy_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_session_duration_seconds: Option<i64>,
    #[serde(
        rename = "default_iam_role_arn",
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_role_arn: Option<String>,
    #[serde(
        rename = "aws_federation_role_session_name",
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub role_session_name: Option<String>,
}

impl ProviderConfig {
    /// Check the fields every login needs, before any network activity.
    ///
    /// Out-of-range durations are not rejected here; they are clamped when
    /// the federation call is built.
    pub fn validate(&self) -> Result<()> {
        if self.metadata_url.trim().is_empty() {
            return Err(Error::Configuration(
                "oidc_provider_metadata_url is not set".to_string(),
            ));
        }
        if self.client_id.trim().is_empty() {
            return Err(Error::Configuration("client_id is not set".to_string()));
        }
        Ok(())
    }

    /// Resolve the target role from an explicit value or the configured default.
    pub fn resolve_role(&self, explicit: Option<&str>) -> Result<RoleArn> {
        let candidate = explicit
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or(self.default_role_arn.as_deref())
            .ok_or_else(|| {
                Error::Configuration(
                    "no IAM role given and default_iam_role_arn is not configured".to_string(),
                )
            })?;
        RoleArn::parse(candidate)
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("metadata_url", &self.metadata_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field(
                "max_session_duration_seconds",
                &self.max_session_duration_seconds,
            )
            .field("default_role_arn", &self.default_role_arn)
            .field("role_session_name", &self.role_session_name)
            .finish()
    }
}

/// A validated IAM role ARN: `arn:<partition>:iam::<account>:role/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoleArn(String);

impl RoleArn {
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let parts: Vec<&str> = value.split(':').collect();
        let valid = parts.len() == 6
            && parts[0] == "arn"
            && parts[1].starts_with("aws")
            && parts[2] == "iam"
            && parts[3].is_empty()
            && parts[4].len() == 12
            && parts[4].bytes().all(|b| b.is_ascii_digit())
            && parts[5].strip_prefix("role/").is_some_and(|name| !name.is_empty());
        if valid {
            Ok(Self(value.to_string()))
        } else {
            Err(Error::Configuration(format!(
                "{value:?} is not an IAM Role ARN (arn:aws:iam::<account-id>:role/<role-name>)"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn account_id(&self) -> &str {
        self.0.split(':').nth(4).unwrap_or_default()
    }

    /// `aws`, `aws-cn`, `aws-us-gov`, ...
    pub fn partition(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or_default()
    }
}

impl fmt::Display for RoleArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of resolving the session duration for a federation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionDuration {
    pub seconds: i64,
    /// The out-of-range value that was clamped, if any.
    pub clamped_from: Option<i64>,
}

/// Pick the caller's value if positive, else the configured one, else the default,
/// then clamp into the range STS accepts.
pub fn resolve_session_duration(requested: Option<i64>, configured: Option<i64>) -> SessionDuration {
    let wanted = requested
        .filter(|s| *s > 0)
        .or(configured.filter(|s| *s > 0))
        .unwrap_or(DEFAULT_SESSION_DURATION_SECONDS);
    let seconds = wanted.clamp(MIN_SESSION_DURATION_SECONDS, MAX_SESSION_DURATION_SECONDS);
    SessionDuration {
        seconds,
        clamped_from: (seconds != wanted).then_some(wanted),
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LossySeconds {
    Number(i64),
    Text(String),
}

/// `setup` historically wrote the duration as a string; accept both forms.
fn lossy_seconds<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<LossySeconds>::deserialize(deserializer)? {
        Some(LossySeconds::Number(n)) => Some(n),
        Some(LossySeconds::Text(s)) => s.trim().parse::<i64>().ok(),
        None => None,
    })
}
