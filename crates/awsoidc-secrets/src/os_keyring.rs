//! OS secret store backed by the `keyring` crate.
//!
//! Entries live under service `aws-cli-oidc` with the role ARN as account
//! name; the password is the credential serialized as JSON.

use async_trait::async_trait;
use awsoidc_core::ports::CredentialStore;
use awsoidc_core::{Error, Result, RoleArn, TemporaryCredential};
use tracing::debug;

pub const SERVICE_NAME: &str = "aws-cli-oidc";

pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(service: &str, role_arn: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(service, role_arn).map_err(store_error)
    }

    /// Platform keyrings block; keep them off the async workers.
    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(String) -> Result<T> + Send + 'static,
    {
        let service = self.service.clone();
        tokio::task::spawn_blocking(move || op(service))
            .await
            .map_err(|e| Error::Internal(format!("secret store task failed: {e}")))?
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

fn store_error(err: keyring::Error) -> Error {
    Error::SecretStore(err.to_string())
}

#[async_trait]
impl CredentialStore for KeyringStore {
    async fn get(&self, role_arn: &RoleArn) -> Result<Option<TemporaryCredential>> {
        let account = role_arn.as_str().to_string();
        let secret = self
            .blocking(move |service| match Self::entry(&service, &account)?.get_password() {
                Ok(secret) => Ok(Some(secret)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(err) => Err(store_error(err)),
            })
            .await?;

        let Some(secret) = secret else {
            debug!(role_arn = %role_arn, "No credential in OS secret store");
            return Ok(None);
        };
        let credential = serde_json::from_str(&secret)
            .map_err(|e| Error::SecretStore(format!("stored credential is not valid JSON: {e}")))?;
        Ok(Some(credential))
    }

    async fn put(&self, role_arn: &RoleArn, credential: &TemporaryCredential) -> Result<()> {
        let account = role_arn.as_str().to_string();
        let secret = serde_json::to_string(credential)?;
        self.blocking(move |service| {
            Self::entry(&service, &account)?
                .set_password(&secret)
                .map_err(store_error)
        })
        .await?;

        debug!(role_arn = %role_arn, "Credential saved in OS secret store");
        Ok(())
    }

    async fn delete(&self, role_arn: &RoleArn) -> Result<bool> {
        let account = role_arn.as_str().to_string();
        self.blocking(move |service| match Self::entry(&service, &account)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(store_error(err)),
        })
        .await
    }

    fn name(&self) -> &str {
        "os-keyring"
    }
}
