//! Unverified identity token claims.
//!
//! The signature is verified by STS when the token is federated; the claims
//! read here only feed log fields and the default role session name.

use awsoidc_core::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Deserializer};

/// Session name used when neither config nor claims provide one.
pub const FALLBACK_SESSION_NAME: &str = "aws-cli-oidc";

/// STS limit for `RoleSessionName`.
const MAX_SESSION_NAME_LENGTH: usize = 64;
const MIN_SESSION_NAME_LENGTH: usize = 2;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityClaims {
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default, deserialize_with = "audience")]
    pub aud: Vec<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
}

impl IdentityClaims {
    /// Decode the payload segment of a compact JWS without checking it.
    pub fn decode_unverified(token: &str) -> Result<Self> {
        let mut segments = token.split('.');
        let payload = match (segments.next(), segments.next(), segments.next()) {
            (Some(_), Some(payload), Some(_)) => payload,
            _ => {
                return Err(Error::InvalidIdentityToken(
                    "id_token is not a compact JWT".to_string(),
                ));
            }
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| Error::InvalidIdentityToken(format!("invalid id_token payload: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::InvalidIdentityToken(format!("invalid id_token claims: {e}")))
    }

    /// Session name derived from `email`, then `preferred_username`, then `sub`.
    pub fn session_name(&self) -> Option<String> {
        [&self.email, &self.preferred_username, &self.sub]
            .into_iter()
            .flatten()
            .find_map(|candidate| sanitize_session_name(candidate))
    }
}

/// Restrict to the characters STS accepts (`[\w+=,.@-]`) and its length limit.
pub fn sanitize_session_name(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || "_+=,.@-".contains(*c))
        .take(MAX_SESSION_NAME_LENGTH)
        .collect();
    (cleaned.len() >= MIN_SESSION_NAME_LENGTH).then_some(cleaned)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

fn audience<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Audience>::deserialize(deserializer)? {
        Some(Audience::One(aud)) => vec![aud],
        Some(Audience::Many(aud)) => aud,
        None => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(claims: &str) -> String {
        format!(
            "{}.{}.signature",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#),
            URL_SAFE_NO_PAD.encode(claims.as_bytes())
        )
    }

    #[test]
    fn decodes_claims_without_verification() {
        let claims = IdentityClaims::decode_unverified(&token(
            r#"{"iss":"https://idp.example.com","sub":"1234","aud":"cli","exp":1700000000,"email":"alice@example.com"}"#,
        ))
        .unwrap();

        assert_eq!(claims.iss.as_deref(), Some("https://idp.example.com"));
        assert_eq!(claims.aud, vec!["cli".to_string()]);
        assert_eq!(claims.exp, Some(1_700_000_000));
        assert_eq!(claims.session_name().as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn audience_may_be_a_list() {
        let claims =
            IdentityClaims::decode_unverified(&token(r#"{"sub":"u","aud":["a","b"]}"#)).unwrap();
        assert_eq!(claims.aud.len(), 2);
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(IdentityClaims::decode_unverified("not-a-jwt").is_err());
        assert!(IdentityClaims::decode_unverified("a.!!!.c").is_err());
    }

    #[test]
    fn session_name_falls_back_to_subject() {
        let claims = IdentityClaims {
            sub: Some("auth0|5f1c 9e".to_string()),
            ..Default::default()
        };
        assert_eq!(claims.session_name().as_deref(), Some("auth05f19e"));
        assert_eq!(IdentityClaims::default().session_name(), None);
    }

    #[test]
    fn sanitizes_and_truncates() {
        assert_eq!(
            sanitize_session_name("John Doe <john@example.com>").as_deref(),
            Some("JohnDoejohn@example.com")
        );
        assert_eq!(sanitize_session_name(&"x".repeat(100)).unwrap().len(), 64);
        assert_eq!(sanitize_session_name("!"), None);
    }
}
