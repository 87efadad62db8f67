//! Test fixtures.

use awsoidc_core::{ProviderConfig, RoleArn, TemporaryCredential};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};

pub const CLIENT_ID: &str = "aws-cli";
pub const ROLE_ARN: &str = "arn:aws:iam::123456789012:role/developer";

pub fn role_arn() -> RoleArn {
    RoleArn::parse(ROLE_ARN).expect("fixture role ARN is valid")
}

/// Provider pointing at a metadata URL, with the fixture role as default.
pub fn provider_config(metadata_url: impl Into<String>) -> ProviderConfig {
    ProviderConfig {
        metadata_url: metadata_url.into(),
        client_id: CLIENT_ID.to_string(),
        default_role_arn: Some(ROLE_ARN.to_string()),
        ..Default::default()
    }
}

/// Unsigned compact JWT carrying the given claims.
pub fn identity_token(claims: serde_json::Value) -> String {
    format!(
        "{}.{}.unsigned",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

pub fn alice_identity_token() -> String {
    identity_token(serde_json::json!({
        "iss": "https://idp.example.com",
        "sub": "00u1a2b3c4",
        "aud": CLIENT_ID,
        "exp": (Utc::now() + Duration::minutes(5)).timestamp(),
        "email": "alice@example.com",
    }))
}

pub struct CredentialFixture;

impl CredentialFixture {
    pub fn expiring_in(duration: Duration) -> TemporaryCredential {
        TemporaryCredential::new(
            "ASIACACHEDEXAMPLE",
            "cached-secret",
            "cached-session",
            Some(Utc::now() + duration),
        )
    }

    pub fn valid() -> TemporaryCredential {
        Self::expiring_in(Duration::hours(1))
    }

    pub fn expired() -> TemporaryCredential {
        Self::expiring_in(Duration::hours(-1))
    }

    pub fn fresh() -> TemporaryCredential {
        TemporaryCredential::new(
            "ASIAFRESHEXAMPLE",
            "fresh-secret",
            "fresh-session",
            Some(Utc::now() + Duration::hours(1)),
        )
    }
}
