//! Test helper functions and utilities.

use crate::fixtures::provider_config;
use async_trait::async_trait;
use awsoidc_auth::{BrowserLauncher, FlowOptions, ProgressEvent, ProgressSink};
use awsoidc_core::ports::{CredentialExchanger, CredentialStore, FederationRequest, IdentityChecker};
use awsoidc_core::{Error, ProviderConfig, Result, RoleArn, TemporaryCredential};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Flow options for tests: ephemeral port, short timeout.
pub fn test_flow_options() -> FlowOptions {
    FlowOptions {
        listen_addr: "127.0.0.1:0".parse().expect("valid socket address"),
        login_timeout: Duration::from_secs(10),
    }
}

/// PKCE challenges that went out in authorization requests.
#[derive(Debug, Clone, Default)]
pub struct IssuedChallenges(Arc<Mutex<Vec<String>>>);

impl IssuedChallenges {
    pub fn record(&self, challenge: impl Into<String>) {
        self.0.lock().unwrap().push(challenge.into());
    }

    pub fn contains(&self, challenge: &str) -> bool {
        self.0.lock().unwrap().iter().any(|c| c == challenge)
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A browser stand-in that completes the login by requesting the
/// redirect URI itself.
pub struct CallbackBrowser {
    query: String,
    challenges: IssuedChallenges,
    launches: AtomicUsize,
}

impl CallbackBrowser {
    pub fn with_code(code: &str) -> Self {
        Self::with_query(format!("?code={code}"))
    }

    pub fn denying(error: &str, description: &str) -> Self {
        Self::with_query(format!("?error={error}&error_description={description}"))
    }

    fn with_query(query: String) -> Self {
        Self {
            query,
            challenges: IssuedChallenges::default(),
            launches: AtomicUsize::new(0),
        }
    }

    /// Share challenge bookkeeping with a [`PkceTokenResponder`].
    pub fn recording_into(mut self, challenges: IssuedChallenges) -> Self {
        self.challenges = challenges;
        self
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

impl BrowserLauncher for CallbackBrowser {
    fn open(&self, url: &str) -> io::Result<()> {
        self.launches.fetch_add(1, Ordering::SeqCst);

        let url = Url::parse(url).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
        };
        if let Some(challenge) = param("code_challenge") {
            self.challenges.record(challenge);
        }
        let redirect = param("redirect_uri")
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no redirect_uri"))?;

        let target = format!("{}{}", redirect.replace("localhost", "127.0.0.1"), self.query);
        tokio::spawn(async move {
            if let Err(err) = reqwest::get(&target).await {
                tracing::warn!(error = %err, "Redirect request failed");
            }
        });
        Ok(())
    }
}

/// Token endpoint that only issues tokens for a verifier matching one of
/// the issued challenges, like a real provider would.
pub struct PkceTokenResponder {
    challenges: IssuedChallenges,
    id_token: String,
}

impl PkceTokenResponder {
    pub fn new(challenges: IssuedChallenges, id_token: impl Into<String>) -> Self {
        Self {
            challenges,
            id_token: id_token.into(),
        }
    }
}

impl Respond for PkceTokenResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let form: Vec<(String, String)> = url::form_urlencoded::parse(&request.body)
            .into_owned()
            .collect();
        let field = |name: &str| {
            form.iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };

        let verified = field("grant_type") == Some("authorization_code")
            && field("code").is_some()
            && field("code_verifier").is_some_and(|verifier| {
                let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
                self.challenges.contains(&challenge)
            });

        if verified {
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id_token": self.id_token,
                "access_token": "opaque-access-token",
                "token_type": "Bearer",
                "expires_in": 300,
            }))
        } else {
            ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "PKCE verification failed",
            }))
        }
    }
}

/// A wiremock OIDC provider with discovery and a PKCE-checking token endpoint.
pub struct FakeProvider {
    pub server: MockServer,
    pub challenges: IssuedChallenges,
}

impl FakeProvider {
    /// Start the server with the discovery document mounted.
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let uri = server.uri();
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "issuer": uri,
                "authorization_endpoint": format!("{uri}/authorize"),
                "token_endpoint": format!("{uri}/token"),
                "jwks_uri": format!("{uri}/jwks"),
                "response_types_supported": ["code"],
                "code_challenge_methods_supported": ["S256"],
            })))
            .mount(&server)
            .await;

        Self {
            server,
            challenges: IssuedChallenges::default(),
        }
    }

    pub fn metadata_url(&self) -> String {
        format!("{}/.well-known/openid-configuration", self.server.uri())
    }

    pub fn config(&self) -> ProviderConfig {
        provider_config(self.metadata_url())
    }

    /// Mount the token endpoint, expecting exactly `times` exchanges.
    pub async fn expect_token_exchanges(&self, id_token: &str, times: u64) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(PkceTokenResponder::new(self.challenges.clone(), id_token))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// A browser that records its challenges for this provider.
    pub fn browser(&self, code: &str) -> CallbackBrowser {
        CallbackBrowser::with_code(code).recording_into(self.challenges.clone())
    }

    pub async fn token_requests(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == "/token")
            .count()
    }
}

/// Credential exchanger returning a fixed credential and recording requests.
pub struct FakeExchanger {
    credential: TemporaryCredential,
    requests: Mutex<Vec<FederationRequest>>,
}

impl FakeExchanger {
    pub fn returning(credential: TemporaryCredential) -> Self {
        Self {
            credential,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<FederationRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CredentialExchanger for FakeExchanger {
    async fn exchange(&self, request: &FederationRequest) -> Result<TemporaryCredential> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.credential.clone())
    }
}

/// Identity checker with a fixed verdict.
pub struct FakeChecker {
    accept: bool,
    calls: AtomicUsize,
}

impl FakeChecker {
    pub fn accepting() -> Self {
        Self {
            accept: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            accept: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityChecker for FakeChecker {
    async fn check(&self, _credential: &TemporaryCredential) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.accept {
            Ok(())
        } else {
            Err(Error::CredentialExchange(
                "ExpiredToken: The security token included in the request is expired".to_string(),
            ))
        }
    }
}

/// A store whose writes always fail.
pub struct ReadOnlyStore;

#[async_trait]
impl CredentialStore for ReadOnlyStore {
    async fn get(&self, _role_arn: &RoleArn) -> Result<Option<TemporaryCredential>> {
        Ok(None)
    }

    async fn put(&self, _role_arn: &RoleArn, _credential: &TemporaryCredential) -> Result<()> {
        Err(Error::SecretStore("keychain is locked".to_string()))
    }

    async fn delete(&self, _role_arn: &RoleArn) -> Result<bool> {
        Ok(false)
    }

    fn name(&self) -> &str {
        "read-only"
    }
}

/// Collects progress events in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingProgress(Arc<Mutex<Vec<ProgressEvent>>>);

impl RecordingProgress {
    pub fn sink(&self) -> ProgressSink {
        let events = self.0.clone();
        Arc::new(move |event: &ProgressEvent| events.lock().unwrap().push(event.clone()))
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.0.lock().unwrap().clone()
    }
}
