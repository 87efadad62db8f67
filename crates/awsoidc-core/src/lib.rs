//! aws-cli-oidc Core
//!
//! Core domain types, traits, and error handling for aws-cli-oidc.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used by the auth flow, the secret stores, and the CLI.

pub mod config;
pub mod credentials;
pub mod error;
pub mod ports;

pub use config::{ProviderConfig, RoleArn};
pub use credentials::TemporaryCredential;
pub use error::{Error, ErrorKind, Result};
