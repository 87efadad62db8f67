//! Integration test infrastructure for aws-cli-oidc.
//!
//! Provides a fake OIDC provider on wiremock, a browser that follows the
//! redirect itself, and in-process fakes for the STS collaborators.
//!
//! # Usage
//!
//! ```ignore
//! use awsoidc_tests::{CallbackBrowser, FakeProvider};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let provider = FakeProvider::start().await;
//!     let browser = CallbackBrowser::with_code("ABC123");
//!     // Build a CredentialBroker against provider.config(), browser, ...
//! }
//! ```

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,awsoidc_auth=debug,awsoidc_tests=debug")),
        )
        .with_test_writer()
        .try_init();
}
