//! OIDC provider discovery.

use awsoidc_core::{Error, ProviderConfig, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

/// The subset of the OIDC discovery document this tool reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcDiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub jwks_uri: Option<String>,
    #[serde(default)]
    pub response_types_supported: Vec<String>,
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
}

impl OidcDiscoveryDocument {
    /// Providers that omit the field are assumed to accept S256.
    pub fn supports_s256(&self) -> bool {
        self.code_challenge_methods_supported.is_empty()
            || self
                .code_challenge_methods_supported
                .iter()
                .any(|m| m == "S256")
    }
}

/// Read-only login context: provider endpoints plus client credentials.
#[derive(Clone)]
pub struct OidcClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: Option<String>,
    authorization_endpoint: Url,
    token_endpoint: Url,
}

impl OidcClient {
    /// Build a client from already known endpoints.
    pub fn from_endpoints(
        http: reqwest::Client,
        client_id: impl Into<String>,
        client_secret: Option<String>,
        authorization_endpoint: &str,
        token_endpoint: &str,
    ) -> Result<Self> {
        Ok(Self {
            http,
            client_id: client_id.into(),
            client_secret,
            authorization_endpoint: parse_endpoint("authorization_endpoint", authorization_endpoint)?,
            token_endpoint: parse_endpoint("token_endpoint", token_endpoint)?,
        })
    }

    /// Fetch the provider metadata document and build a client from it.
    pub async fn discover(http: reqwest::Client, config: &ProviderConfig) -> Result<Self> {
        debug!(metadata_url = %config.metadata_url, "Fetching OIDC provider metadata");

        let response = http
            .get(config.metadata_url.trim())
            .send()
            .await
            .map_err(|e| Error::http("provider discovery", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Discovery(format!(
                "{} returned HTTP status {}",
                config.metadata_url,
                status.as_u16()
            )));
        }

        let document: OidcDiscoveryDocument = response
            .json()
            .await
            .map_err(|e| Error::Discovery(format!("invalid metadata document: {e}")))?;

        if !document.supports_s256() {
            warn!(
                issuer = %document.issuer,
                methods = ?document.code_challenge_methods_supported,
                "Provider does not advertise S256 PKCE support"
            );
        }

        Self::from_endpoints(
            http,
            config.client_id.trim(),
            config.client_secret.clone(),
            &document.authorization_endpoint,
            &document.token_endpoint,
        )
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref()
    }

    pub fn authorization_endpoint(&self) -> &Url {
        &self.authorization_endpoint
    }

    pub fn token_endpoint(&self) -> &Url {
        &self.token_endpoint
    }
}

fn parse_endpoint(name: &str, value: &str) -> Result<Url> {
    Url::parse(value.trim()).map_err(|e| Error::Discovery(format!("invalid {name} {value:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_document_defaults() {
        let doc: OidcDiscoveryDocument = serde_json::from_str(
            r#"{
                "issuer": "https://idp.example.com",
                "authorization_endpoint": "https://idp.example.com/authorize",
                "token_endpoint": "https://idp.example.com/token"
            }"#,
        )
        .unwrap();

        assert!(doc.supports_s256());
        assert!(doc.jwks_uri.is_none());
    }

    #[test]
    fn detects_missing_s256() {
        let doc: OidcDiscoveryDocument = serde_json::from_str(
            r#"{
                "issuer": "https://idp.example.com",
                "authorization_endpoint": "https://idp.example.com/authorize",
                "token_endpoint": "https://idp.example.com/token",
                "code_challenge_methods_supported": ["plain"]
            }"#,
        )
        .unwrap();

        assert!(!doc.supports_s256());
    }

    #[test]
    fn rejects_relative_endpoints() {
        let err = OidcClient::from_endpoints(
            reqwest::Client::new(),
            "cli",
            None,
            "/authorize",
            "https://idp.example.com/token",
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::Discovery(_)));
    }
}
