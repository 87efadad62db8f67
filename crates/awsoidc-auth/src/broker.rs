//! Reuse-or-refresh decision for temporary credentials.
//!
//! The broker owns the whole `get-cred` sequence: resolve the role, try the
//! secret store, and otherwise run a login, redeem the code, federate the
//! identity token and optionally persist the result.

use crate::browser::{BrowserLauncher, SystemBrowser};
use crate::flow::{AuthorizationCodeFlow, FlowOptions};
use crate::jwt::{FALLBACK_SESSION_NAME, IdentityClaims, sanitize_session_name};
use crate::oidc::OidcClient;
use crate::token::exchange_authorization_code;
use crate::validator::CredentialValidator;
use awsoidc_core::config::resolve_session_duration;
use awsoidc_core::ports::{CredentialExchanger, CredentialStore, FederationRequest, IdentityChecker};
use awsoidc_core::{ProviderConfig, Result, RoleArn, TemporaryCredential};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct CredentialRequest {
    /// Overrides `default_iam_role_arn`.
    pub role_arn: Option<String>,
    /// Overrides `max_session_duration_seconds` when positive.
    pub max_session_duration_seconds: Option<i64>,
    /// Try the secret store before logging in.
    pub reuse_cached: bool,
    /// Save a freshly issued credential in the secret store.
    pub persist: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Cached,
    Fresh,
}

#[derive(Debug, Clone)]
pub struct ObtainedCredential {
    pub role_arn: RoleArn,
    pub credential: TemporaryCredential,
    pub source: CredentialSource,
    pub persisted: bool,
}

/// User-facing milestones, reported as they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    CachedCredentialInvalid,
    LoginSucceeded,
    CredentialPersisted { store: String },
}

pub type ProgressSink = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

pub struct CredentialBroker {
    config: ProviderConfig,
    exchanger: Arc<dyn CredentialExchanger>,
    validator: CredentialValidator,
    store: Arc<dyn CredentialStore>,
    browser: Arc<dyn BrowserLauncher>,
    flow_options: FlowOptions,
    http: reqwest::Client,
    progress: Option<ProgressSink>,
}

impl CredentialBroker {
    pub fn new(
        config: ProviderConfig,
        exchanger: Arc<dyn CredentialExchanger>,
        checker: Arc<dyn IdentityChecker>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            config,
            exchanger,
            validator: CredentialValidator::new(checker),
            store,
            browser: Arc::new(SystemBrowser),
            flow_options: FlowOptions::default(),
            http: reqwest::Client::new(),
            progress: None,
        }
    }

    pub fn with_browser(mut self, browser: Arc<dyn BrowserLauncher>) -> Self {
        self.browser = browser;
        self
    }

    pub fn with_flow_options(mut self, options: FlowOptions) -> Self {
        self.flow_options = options;
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub async fn obtain(&self, request: &CredentialRequest) -> Result<ObtainedCredential> {
        // Everything that can be rejected locally is checked before any I/O.
        self.config.validate()?;
        let role_arn = self.config.resolve_role(request.role_arn.as_deref())?;
        debug!(role_arn = %role_arn, reuse_cached = request.reuse_cached, persist = request.persist, "Obtaining credentials");

        if request.reuse_cached
            && let Some(credential) = self.cached(&role_arn).await
        {
            if self.validator.is_valid(Some(&credential)).await {
                info!(role_arn = %role_arn, store = self.store.name(), "Reusing cached credential");
                return Ok(ObtainedCredential {
                    role_arn,
                    credential,
                    source: CredentialSource::Cached,
                    persisted: false,
                });
            }
            self.report(ProgressEvent::CachedCredentialInvalid);
        }

        let credential = self.login_and_federate(&role_arn, request).await?;

        let persisted = request.persist && self.persist(&role_arn, &credential).await;

        Ok(ObtainedCredential {
            role_arn,
            credential,
            source: CredentialSource::Fresh,
            persisted,
        })
    }

    async fn cached(&self, role_arn: &RoleArn) -> Option<TemporaryCredential> {
        match self.store.get(role_arn).await {
            Ok(credential) => credential,
            Err(err) => {
                warn!(role_arn = %role_arn, store = self.store.name(), error = %err, "Cannot read cached credential");
                None
            }
        }
    }

    async fn login_and_federate(
        &self,
        role_arn: &RoleArn,
        request: &CredentialRequest,
    ) -> Result<TemporaryCredential> {
        let client = OidcClient::discover(self.http.clone(), &self.config).await?;
        let grant = AuthorizationCodeFlow::new(&client, self.browser.as_ref(), &self.flow_options)
            .run()
            .await?;
        let tokens = exchange_authorization_code(&client, &grant).await?;
        self.report(ProgressEvent::LoginSucceeded);

        let claims = match IdentityClaims::decode_unverified(&tokens.id_token) {
            Ok(claims) => {
                debug!(iss = ?claims.iss, sub = ?claims.sub, exp = ?claims.exp, "Identity token received");
                claims
            }
            Err(err) => {
                debug!(error = %err, "Cannot read identity token claims");
                IdentityClaims::default()
            }
        };

        let duration = resolve_session_duration(
            request.max_session_duration_seconds,
            self.config.max_session_duration_seconds,
        );
        if let Some(wanted) = duration.clamped_from {
            warn!(
                requested = wanted,
                using = duration.seconds,
                "Session duration out of range [900, 43200]; clamping"
            );
        }

        let session_name = self
            .config
            .role_session_name
            .as_deref()
            .and_then(sanitize_session_name)
            .or_else(|| claims.session_name())
            .unwrap_or_else(|| FALLBACK_SESSION_NAME.to_string());

        self.exchanger
            .exchange(&FederationRequest {
                identity_token: tokens.id_token,
                role_arn: role_arn.clone(),
                session_name,
                duration_seconds: duration.seconds,
            })
            .await
    }

    /// A credential that cannot be saved is still returned to the caller.
    async fn persist(&self, role_arn: &RoleArn, credential: &TemporaryCredential) -> bool {
        match self.store.put(role_arn, credential).await {
            Ok(()) => {
                self.report(ProgressEvent::CredentialPersisted {
                    store: self.store.name().to_string(),
                });
                true
            }
            Err(err) => {
                warn!(role_arn = %role_arn, store = self.store.name(), error = %err, "Cannot save credential");
                false
            }
        }
    }

    fn report(&self, event: ProgressEvent) {
        if let Some(sink) = &self.progress {
            sink(&event);
        }
    }
}
