//! Interactive authorization code flow with PKCE.
//!
//! One call to [`AuthorizationCodeFlow::authorize`] is one login attempt:
//! a fresh PKCE pair, a freshly bound redirect listener, one browser launch
//! and one bounded wait. Nothing is retried.

use crate::browser::BrowserLauncher;
use crate::listener::{CallbackOutcome, DEFAULT_LISTEN_ADDR, RedirectListener};
use crate::oidc::OidcClient;
use crate::pkce::PkcePair;
use awsoidc_core::{Error, Result};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default time the user has to finish logging in.
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

const SCOPE: &str = "openid";
const RESPONSE_TYPE: &str = "code";

#[derive(Debug, Clone)]
pub struct FlowOptions {
    pub listen_addr: SocketAddr,
    pub login_timeout: Duration,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR,
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
        }
    }
}

/// The authorization request sent through the browser.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    endpoint: Url,
    client_id: String,
    redirect_uri: String,
    code_challenge: String,
    code_challenge_method: &'static str,
}

impl AuthorizationRequest {
    pub fn new(endpoint: &Url, client_id: &str, redirect_uri: &str, pkce: &PkcePair) -> Self {
        Self {
            endpoint: endpoint.clone(),
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            code_challenge: pkce.challenge().to_string(),
            code_challenge_method: pkce.method(),
        }
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// The full URL to open, with the request encoded in the query string.
    pub fn url(&self) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", RESPONSE_TYPE)
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("code_challenge", &self.code_challenge)
            .append_pair("code_challenge_method", self.code_challenge_method)
            .append_pair("scope", SCOPE);
        url
    }
}

/// An authorization code together with the verifier and redirect URI of
/// the attempt that produced it. The token exchange accepts nothing else.
#[derive(Clone)]
pub struct AuthorizationGrant {
    pub code: String,
    pub code_verifier: String,
    pub redirect_uri: String,
}

impl fmt::Debug for AuthorizationGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationGrant")
            .field("code", &"***")
            .field("code_verifier", &"***")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// How a login attempt ended.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Authorized(AuthorizationGrant),
    /// The redirect arrived without a code.
    Denied {
        error: Option<String>,
        description: Option<String>,
    },
    BrowserUnavailable(String),
    TimedOut,
}

pub struct AuthorizationCodeFlow<'a> {
    client: &'a OidcClient,
    browser: &'a dyn BrowserLauncher,
    options: &'a FlowOptions,
}

impl<'a> AuthorizationCodeFlow<'a> {
    pub fn new(
        client: &'a OidcClient,
        browser: &'a dyn BrowserLauncher,
        options: &'a FlowOptions,
    ) -> Self {
        Self {
            client,
            browser,
            options,
        }
    }

    /// Run one login attempt and report how it ended.
    ///
    /// Errors are reserved for local failures (randomness, binding the
    /// listener); everything the user or provider does is an outcome.
    pub async fn authorize(&self) -> Result<LoginOutcome> {
        let pkce = PkcePair::generate()?;

        let listener = RedirectListener::bind(self.options.listen_addr).await?;
        let request = AuthorizationRequest::new(
            self.client.authorization_endpoint(),
            self.client.client_id(),
            &listener.redirect_uri(),
            &pkce,
        );
        let url = request.url();
        let pending = listener.start();

        debug!(
            redirect_uri = %request.redirect_uri(),
            authorization_endpoint = %self.client.authorization_endpoint(),
            "Launching browser for login"
        );

        if let Err(err) = self.browser.open(url.as_str()) {
            warn!(error = %err, "Cannot open browser");
            pending.shutdown().await;
            return Ok(LoginOutcome::BrowserUnavailable(err.to_string()));
        }

        let outcome = match pending.wait(self.options.login_timeout).await {
            CallbackOutcome::Received(result) => match result.code {
                Some(code) => {
                    info!("Authorization code received");
                    LoginOutcome::Authorized(AuthorizationGrant {
                        code,
                        code_verifier: pkce.verifier().to_string(),
                        redirect_uri: request.redirect_uri().to_string(),
                    })
                }
                None => LoginOutcome::Denied {
                    error: result.error,
                    description: result.error_description,
                },
            },
            CallbackOutcome::TimedOut => LoginOutcome::TimedOut,
            CallbackOutcome::Closed => LoginOutcome::Denied {
                error: None,
                description: None,
            },
        };
        Ok(outcome)
    }

    /// Run one login attempt and turn anything but a code into an error.
    pub async fn run(&self) -> Result<AuthorizationGrant> {
        match self.authorize().await? {
            LoginOutcome::Authorized(grant) => Ok(grant),
            LoginOutcome::Denied { error, description } => {
                Err(Error::LoginDenied { error, description })
            }
            LoginOutcome::BrowserUnavailable(reason) => Err(Error::BrowserLaunch(reason)),
            LoginOutcome::TimedOut => Err(Error::LoginTimedOut {
                secs: self.options.login_timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;

    /// Follows the authorization URL's redirect_uri with a fixed query.
    struct RedirectingBrowser {
        query: &'static str,
        opened: Mutex<Vec<String>>,
    }

    impl RedirectingBrowser {
        fn new(query: &'static str) -> Self {
            Self {
                query,
                opened: Mutex::new(Vec::new()),
            }
        }
    }

    impl BrowserLauncher for RedirectingBrowser {
        fn open(&self, url: &str) -> io::Result<()> {
            self.opened.lock().unwrap().push(url.to_string());
            let url = Url::parse(url).unwrap();
            let redirect = url
                .query_pairs()
                .find(|(k, _)| k == "redirect_uri")
                .map(|(_, v)| v.into_owned())
                .unwrap();
            let target = format!(
                "{}{}",
                redirect.replace("localhost", "127.0.0.1"),
                self.query
            );
            tokio::spawn(async move {
                let _ = reqwest::get(target).await;
            });
            Ok(())
        }
    }

    struct BrokenBrowser;

    impl BrowserLauncher for BrokenBrowser {
        fn open(&self, _url: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::NotFound, "no browser"))
        }
    }

    fn client() -> OidcClient {
        OidcClient::from_endpoints(
            reqwest::Client::new(),
            "cli",
            None,
            "https://idp.example.com/authorize",
            "https://idp.example.com/token",
        )
        .unwrap()
    }

    fn options(timeout: Duration) -> FlowOptions {
        FlowOptions {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            login_timeout: timeout,
        }
    }

    #[test]
    fn authorization_url_carries_pkce_parameters() {
        let pkce = PkcePair::generate().unwrap();
        let endpoint = Url::parse("https://idp.example.com/authorize").unwrap();
        let request =
            AuthorizationRequest::new(&endpoint, "cli", "http://localhost:8118/", &pkce);

        let url = request.url();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("response_type"), Some("code"));
        assert_eq!(get("client_id"), Some("cli"));
        assert_eq!(get("redirect_uri"), Some("http://localhost:8118/"));
        assert_eq!(get("code_challenge"), Some(pkce.challenge()));
        assert_eq!(get("code_challenge_method"), Some("S256"));
        assert_eq!(get("scope"), Some("openid"));
    }

    #[tokio::test]
    async fn grant_carries_the_attempts_verifier() {
        let client = client();
        let browser = RedirectingBrowser::new("?code=ABC123");
        let options = options(Duration::from_secs(5));

        let grant = AuthorizationCodeFlow::new(&client, &browser, &options)
            .run()
            .await
            .unwrap();

        assert_eq!(grant.code, "ABC123");
        let opened = browser.opened.lock().unwrap();
        let url = Url::parse(&opened[0]).unwrap();
        let challenge = url
            .query_pairs()
            .find(|(k, _)| k == "code_challenge")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert_eq!(challenge, crate::pkce::code_challenge_s256(&grant.code_verifier));
        assert!(url.as_str().contains(&urlencode(&grant.redirect_uri)));
    }

    fn urlencode(value: &str) -> String {
        url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
    }

    #[tokio::test]
    async fn redirect_without_code_is_denied() {
        let client = client();
        let browser = RedirectingBrowser::new("?error=access_denied&error_description=nope");
        let options = options(Duration::from_secs(5));

        let err = AuthorizationCodeFlow::new(&client, &browser, &options)
            .run()
            .await
            .unwrap_err();

        match &err {
            Error::LoginDenied { error, description } => {
                assert_eq!(error.as_deref(), Some("access_denied"));
                assert_eq!(description.as_deref(), Some("nope"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(
            err.to_string()
                .starts_with("Login failed, can't retrieve authorization code")
        );
    }

    #[tokio::test]
    async fn browser_failure_ends_attempt_and_frees_port() {
        let client = client();
        let listener = RedirectListener::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = listener.local_addr();
        drop(listener);

        let options = FlowOptions {
            listen_addr: addr,
            login_timeout: Duration::from_secs(30),
        };
        let outcome = AuthorizationCodeFlow::new(&client, &BrokenBrowser, &options)
            .authorize()
            .await
            .unwrap();
        assert!(matches!(outcome, LoginOutcome::BrowserUnavailable(_)));

        RedirectListener::bind(addr).await.unwrap();
    }

    #[tokio::test]
    async fn no_redirect_times_out() {
        struct SilentBrowser;
        impl BrowserLauncher for SilentBrowser {
            fn open(&self, _url: &str) -> io::Result<()> {
                Ok(())
            }
        }

        let client = client();
        let options = options(Duration::from_millis(100));
        let err = AuthorizationCodeFlow::new(&client, &SilentBrowser, &options)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LoginTimedOut { .. }));
    }
}
