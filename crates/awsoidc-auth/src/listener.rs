//! One-shot loopback listener for the OAuth redirect.
//!
//! The listener is bound before the browser is opened so the redirect URI
//! always names a port that is already accepting connections. Each instance
//! owns its handler state; the first `GET /` delivers its result through a
//! oneshot channel and the server is shut down right after.

use awsoidc_core::{Error, Result};
use axum::Router;
use axum::extract::{RawQuery, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Address the redirect URI registered with the provider points at.
pub const DEFAULT_LISTEN_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST), 8118);

/// Time given to the browser to read the result page before shutdown starts.
const RESPONSE_GRACE: Duration = Duration::from_millis(100);

/// Upper bound on graceful shutdown; the server task is aborted after it.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Query parameters of the redirect callback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationResult {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl AuthorizationResult {
    /// Parse a raw query string. The first occurrence of a key wins and
    /// empty values count as absent.
    pub fn from_query(query: Option<&str>) -> Self {
        let mut result = Self::default();
        let Some(query) = query else {
            return result;
        };

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let slot = match &*key {
                "code" => &mut result.code,
                "error" => &mut result.error,
                "error_description" => &mut result.error_description,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.to_string());
            }
        }
        result
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

/// How a wait on the redirect ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Received(AuthorizationResult),
    TimedOut,
    /// The server stopped before any callback arrived.
    Closed,
}

/// A bound, not yet serving, redirect listener.
#[derive(Debug)]
pub struct RedirectListener {
    listener: TcpListener,
    addr: SocketAddr,
}

impl RedirectListener {
    /// Bind the loopback address. Fails fast if the port is already held.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(err) if err.kind() == ErrorKind::AddrInUse => {
                return Err(Error::ListenerPortInUse { addr });
            }
            Err(err) => {
                return Err(Error::ListenerBind {
                    addr,
                    reason: err.to_string(),
                });
            }
        };
        let addr = listener.local_addr().map_err(|e| Error::ListenerBind {
            addr,
            reason: e.to_string(),
        })?;

        debug!(%addr, "Redirect listener bound");
        Ok(Self { listener, addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Redirect URI for the bound port.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/", self.addr.port())
    }

    /// Start serving on a background task.
    pub fn start(self) -> PendingCallback {
        let (result_tx, result_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let state = CallbackState {
            slot: Arc::new(Mutex::new(Some(result_tx))),
        };
        let app = Router::new()
            .route("/", get(handle_callback))
            .with_state(state);

        let addr = self.addr;
        let listener = self.listener;
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(err) = server.await {
                warn!(%addr, error = %err, "Redirect listener stopped with an error");
            }
            debug!(%addr, "Redirect listener stopped");
        });

        PendingCallback {
            addr,
            result_rx,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }
}

/// A serving listener waiting for its single callback.
///
/// Dropping it without calling [`wait`](Self::wait) or
/// [`shutdown`](Self::shutdown) still stops the server and frees the port.
#[derive(Debug)]
pub struct PendingCallback {
    addr: SocketAddr,
    result_rx: oneshot::Receiver<AuthorizationResult>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PendingCallback {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the callback, then shut the server down.
    ///
    /// The port is released by the time this returns.
    pub async fn wait(mut self, timeout: Duration) -> CallbackOutcome {
        let outcome = match tokio::time::timeout(timeout, &mut self.result_rx).await {
            Ok(Ok(result)) => {
                tokio::time::sleep(RESPONSE_GRACE).await;
                CallbackOutcome::Received(result)
            }
            Ok(Err(_)) => CallbackOutcome::Closed,
            Err(_) => {
                debug!(addr = %self.addr, ?timeout, "No redirect received before timeout");
                CallbackOutcome::TimedOut
            }
        };
        self.stop().await;
        outcome
    }

    /// Stop serving without waiting for a callback.
    pub async fn shutdown(mut self) {
        self.stop().await;
    }

    async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(mut task) = self.task.take()
            && tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await.is_err()
        {
            warn!(addr = %self.addr, "Redirect listener did not stop in time; aborting");
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for PendingCallback {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[derive(Clone)]
struct CallbackState {
    slot: Arc<Mutex<Option<oneshot::Sender<AuthorizationResult>>>>,
}

async fn handle_callback(
    State(state): State<CallbackState>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let result = AuthorizationResult::from_query(query.as_deref());
    let page = render_page(result.code.is_some());

    if let Some(error) = &result.error {
        debug!(
            error = %error,
            description = result.error_description.as_deref().unwrap_or_default(),
            "Provider redirected with an error"
        );
    }

    let sender = state.slot.lock().ok().and_then(|mut slot| slot.take());
    match sender {
        Some(tx) => {
            if tx.send(result).is_err() {
                debug!("Redirect arrived after the login attempt ended");
            }
        }
        None => debug!("Ignoring repeated redirect callback"),
    }

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, "no-store"),
            (header::PRAGMA, "no-cache"),
        ],
        page,
    )
}

fn render_page(success: bool) -> String {
    let message = if success {
        "Login successful"
    } else {
        "Login failed"
    };
    format!("<!DOCTYPE html>\n<html>\n<body>\n{message}\n</body>\n</html>\n")
}
