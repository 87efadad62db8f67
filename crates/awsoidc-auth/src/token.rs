//! Authorization code to identity token exchange.

use crate::flow::AuthorizationGrant;
use crate::oidc::OidcClient;
use awsoidc_core::{Error, Result};
use serde::Deserialize;
use std::fmt;
use tracing::{debug, trace};

/// Successful token endpoint response. Only `id_token` is used downstream.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub id_token: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("id_token", &"***")
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(Deserialize)]
struct RawTokenResponse {
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct TokenErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Redeem an authorization code at the provider's token endpoint.
///
/// Codes are single use, so a failed exchange is never retried.
pub async fn exchange_authorization_code(
    client: &OidcClient,
    grant: &AuthorizationGrant,
) -> Result<TokenResponse> {
    let mut form: Vec<(&str, &str)> = vec![
        ("grant_type", "authorization_code"),
        ("code", grant.code.as_str()),
        ("code_verifier", grant.code_verifier.as_str()),
        ("redirect_uri", grant.redirect_uri.as_str()),
        ("client_id", client.client_id()),
    ];
    if let Some(secret) = client.client_secret() {
        form.push(("client_secret", secret));
    }

    trace!(params = ?form, "code2token params");
    debug!(token_endpoint = %client.token_endpoint(), "Exchanging authorization code");

    let response = client
        .http()
        .post(client.token_endpoint().clone())
        .header(reqwest::header::ACCEPT, "application/json")
        .form(&form)
        .send()
        .await
        .map_err(|e| Error::http("token exchange", e))?;

    let status = response.status().as_u16();
    let body = response
        .bytes()
        .await
        .map_err(|e| Error::http("token exchange", e))?;

    if status != 200 {
        return Err(token_error(status, &body));
    }

    let raw: RawTokenResponse = serde_json::from_slice(&body)
        .map_err(|e| Error::Serialization(format!("invalid token response: {e}")))?;
    let id_token = raw
        .id_token
        .filter(|t| !t.is_empty())
        .ok_or(Error::MissingIdToken)?;

    Ok(TokenResponse {
        id_token,
        access_token: raw.access_token,
        token_type: raw.token_type,
        expires_in: raw.expires_in,
    })
}

fn token_error(status: u16, body: &[u8]) -> Error {
    match serde_json::from_slice::<TokenErrorBody>(body) {
        Ok(parsed) if parsed.error.is_some() || parsed.error_description.is_some() => {
            Error::TokenEndpoint {
                status,
                error: parsed.error.unwrap_or_default(),
                description: parsed.error_description.unwrap_or_default(),
            }
        }
        _ => Error::TokenExchangeFailed { status },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_is_parsed() {
        let err = token_error(
            400,
            br#"{"error":"invalid_grant","error_description":"code expired"}"#,
        );
        assert_eq!(
            err.to_string(),
            "Failed to turn code into token, error: invalid_grant error_description: code expired"
        );
    }

    #[test]
    fn unparseable_error_body_keeps_status() {
        let err = token_error(502, b"<html>bad gateway</html>");
        assert!(matches!(err, Error::TokenExchangeFailed { status: 502 }));

        let err = token_error(500, b"{}");
        assert!(matches!(err, Error::TokenExchangeFailed { status: 500 }));
    }

    #[test]
    fn debug_hides_tokens() {
        let response = TokenResponse {
            id_token: "header.payload.sig".to_string(),
            access_token: Some("opaque".to_string()),
            token_type: Some("Bearer".to_string()),
            expires_in: Some(300),
        };
        let rendered = format!("{response:?}");
        assert!(!rendered.contains("payload"));
        assert!(!rendered.contains("opaque"));
    }
}
