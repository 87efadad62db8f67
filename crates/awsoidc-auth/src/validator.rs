//! Cached credential validation.

use awsoidc_core::TemporaryCredential;
use awsoidc_core::ports::IdentityChecker;
use std::sync::Arc;
use tracing::debug;

/// Decides whether a cached credential can be reused.
///
/// Validation never fails: anything the checker rejects, for whatever
/// reason, simply counts as invalid.
#[derive(Clone)]
pub struct CredentialValidator {
    checker: Arc<dyn IdentityChecker>,
}

impl CredentialValidator {
    pub fn new(checker: Arc<dyn IdentityChecker>) -> Self {
        Self { checker }
    }

    pub async fn is_valid(&self, credential: Option<&TemporaryCredential>) -> bool {
        let Some(credential) = credential else {
            return false;
        };

        if credential.is_expired() {
            debug!(expiration = ?credential.expiration, "Cached credential has expired");
            return false;
        }

        match self.checker.check(credential).await {
            Ok(()) => true,
            Err(err) => {
                debug!(error = %err, "Identity check rejected cached credential");
                false
            }
        }
    }
}
