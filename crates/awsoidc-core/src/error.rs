//! Error types for aws-cli-oidc.

use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid config file {path}: {reason}")]
    ConfigFile { path: String, reason: String },

    // Transport errors
    #[error(
        "Cannot start local http server to handle login redirect: {addr} is already in use \
         (another login may still be running, or another program holds the port)"
    )]
    ListenerPortInUse { addr: SocketAddr },

    #[error("Cannot start local http server to handle login redirect on {addr}: {reason}")]
    ListenerBind { addr: SocketAddr, reason: String },

    #[error("Login failed, can't retrieve authorization code: cannot open browser ({0})")]
    BrowserLaunch(String),

    #[error("HTTP request failed during {stage}: {reason}")]
    Http { stage: &'static str, reason: String },

    #[error("OIDC provider discovery failed: {0}")]
    Discovery(String),

    // Protocol errors
    #[error("Failed to turn code into token, error: {error} error_description: {description}")]
    TokenEndpoint {
        status: u16,
        error: String,
        description: String,
    },

    #[error("Failed to turn code into token (HTTP status {status})")]
    TokenExchangeFailed { status: u16 },

    #[error("Token response did not contain an id_token")]
    MissingIdToken,

    #[error("Login failed, can't retrieve authorization code{}", denial_detail(.error, .description))]
    LoginDenied {
        error: Option<String>,
        description: Option<String>,
    },

    #[error("Login failed, can't retrieve authorization code: no redirect received within {secs}s")]
    LoginTimedOut { secs: u64 },

    #[error("Identity token rejected: {0}")]
    InvalidIdentityToken(String),

    #[error("Role not permitted: {0}")]
    RoleNotPermitted(String),

    #[error("Session duration out of allowed range: {0}")]
    SessionDurationOutOfRange(String),

    #[error("Failed to get aws credentials with OIDC: {0}")]
    CredentialExchange(String),

    // Infrastructure errors
    #[error("Cannot generate OAuth2 PKCE code verifier: {0}")]
    Randomness(String),

    #[error("Secret store error: {0}")]
    SecretStore(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad class of an [`Error`], used for user-facing hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Transport,
    Protocol,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_) | Error::ConfigFile { .. } => ErrorKind::Configuration,
            Error::ListenerPortInUse { .. }
            | Error::ListenerBind { .. }
            | Error::BrowserLaunch(_)
            | Error::Http { .. }
            | Error::Discovery(_) => ErrorKind::Transport,
            Error::TokenEndpoint { .. }
            | Error::TokenExchangeFailed { .. }
            | Error::MissingIdToken
            | Error::LoginDenied { .. }
            | Error::LoginTimedOut { .. }
            | Error::InvalidIdentityToken(_)
            | Error::RoleNotPermitted(_)
            | Error::SessionDurationOutOfRange(_)
            | Error::CredentialExchange(_) => ErrorKind::Protocol,
            Error::Randomness(_)
            | Error::SecretStore(_)
            | Error::Serialization(_)
            | Error::Io(_)
            | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn http(stage: &'static str, err: impl std::fmt::Display) -> Self {
        Error::Http {
            stage,
            reason: err.to_string(),
        }
    }
}

fn denial_detail(error: &Option<String>, description: &Option<String>) -> String {
    match (error, description) {
        (Some(e), Some(d)) => format!(", error: {e} error_description: {d}"),
        (Some(e), None) => format!(", error: {e}"),
        (None, Some(d)) => format!(", error_description: {d}"),
        (None, None) => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
