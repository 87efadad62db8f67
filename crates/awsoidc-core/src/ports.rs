//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the login flow and the
//! external services it depends on: STS and the OS secret store.

use crate::config::RoleArn;
use crate::credentials::TemporaryCredential;
use crate::Result;
use async_trait::async_trait;
use std::fmt;

/// Input to a federation call.
#[derive(Clone)]
pub struct FederationRequest {
    pub identity_token: String,
    pub role_arn: RoleArn,
    pub session_name: String,
    pub duration_seconds: i64,
}

impl fmt::Debug for FederationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FederationRequest")
            .field("identity_token", &"***")
            .field("role_arn", &self.role_arn)
            .field("session_name", &self.session_name)
            .field("duration_seconds", &self.duration_seconds)
            .finish()
    }
}

/// Trades an OIDC identity token for temporary credentials.
#[async_trait]
pub trait CredentialExchanger: Send + Sync {
    async fn exchange(&self, request: &FederationRequest) -> Result<TemporaryCredential>;
}

/// Checks whether temporary credentials are still accepted by the cloud provider.
#[async_trait]
pub trait IdentityChecker: Send + Sync {
    /// `Ok(())` when the provider accepts the credential as a caller identity.
    async fn check(&self, credential: &TemporaryCredential) -> Result<()>;
}

/// Persists one credential per role.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Get the stored credential for a role, if any.
    async fn get(&self, role_arn: &RoleArn) -> Result<Option<TemporaryCredential>>;

    /// Store (or replace) the credential for a role.
    async fn put(&self, role_arn: &RoleArn, credential: &TemporaryCredential) -> Result<()>;

    /// Remove the stored credential. Returns whether one existed.
    async fn delete(&self, role_arn: &RoleArn) -> Result<bool>;

    /// Store name for logging.
    fn name(&self) -> &str;
}
