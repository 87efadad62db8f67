//! Temporary AWS credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Schema version written alongside serialized credentials.
pub const CREDENTIAL_SCHEMA_VERSION: u32 = 1;

/// Short-lived credentials issued by STS for an assumed role.
///
/// Field names match the JSON shape the CLI prints and stores in the
/// secret store, so entries written by older releases still parse.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryCredential {
    #[serde(rename = "AWSAccessKey")]
    pub access_key: String,
    #[serde(rename = "AWSSecretKey")]
    pub secret_key: String,
    #[serde(rename = "AWSSessionToken")]
    pub session_token: String,
    #[serde(rename = "Expiration", default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
    #[serde(rename = "Version", default)]
    pub version: u32,
}

impl TemporaryCredential {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        session_token: impl Into<String>,
        expiration: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token: session_token.into(),
            expiration,
            version: CREDENTIAL_SCHEMA_VERSION,
        }
    }

    /// True when the expiration is known and not after `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|exp| exp <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl fmt::Debug for TemporaryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporaryCredential")
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .field("session_token", &"***")
            .field("expiration", &self.expiration)
            .field("version", &self.version)
            .finish()
    }
}
