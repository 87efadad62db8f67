//! OIDC login and AWS credential federation for aws-cli-oidc.
//!
//! This crate drives the interactive authorization code flow (PKCE,
//! loopback redirect listener, system browser), exchanges the code for an
//! identity token, and federates that token into temporary AWS credentials.

pub mod broker;
pub mod browser;
pub mod flow;
pub mod jwt;
pub mod listener;
pub mod oidc;
pub mod pkce;
pub mod providers;
pub mod token;
pub mod validator;

pub use broker::{
    CredentialBroker, CredentialRequest, CredentialSource, ObtainedCredential, ProgressEvent,
    ProgressSink,
};
pub use browser::{BrowserLauncher, SystemBrowser};
pub use flow::{
    AuthorizationCodeFlow, AuthorizationGrant, AuthorizationRequest, FlowOptions, LoginOutcome,
};
pub use jwt::IdentityClaims;
pub use listener::{AuthorizationResult, CallbackOutcome, PendingCallback, RedirectListener};
pub use oidc::{OidcClient, OidcDiscoveryDocument};
pub use pkce::PkcePair;
pub use providers::aws::{StsConfig, StsExchanger, StsIdentityChecker};
pub use token::{TokenResponse, exchange_authorization_code};
pub use validator::CredentialValidator;
