//! Reuse-or-refresh behaviour of the credential broker.

use awsoidc_auth::{
    CredentialBroker, CredentialRequest, CredentialSource, FlowOptions, ProgressEvent,
    RedirectListener,
};
use awsoidc_core::ports::CredentialStore;
use awsoidc_core::{Error, ProviderConfig, TemporaryCredential};
use awsoidc_secrets::MemoryStore;
use awsoidc_tests::*;
use std::sync::Arc;

struct Harness {
    provider: FakeProvider,
    browser: Arc<CallbackBrowser>,
    exchanger: Arc<FakeExchanger>,
    checker: Arc<FakeChecker>,
    store: Arc<MemoryStore>,
    progress: RecordingProgress,
}

impl Harness {
    async fn new(checker: FakeChecker) -> Self {
        init_test_logging();
        let provider = FakeProvider::start().await;
        let browser = Arc::new(provider.browser("ABC123"));
        Self {
            provider,
            browser,
            exchanger: Arc::new(FakeExchanger::returning(CredentialFixture::fresh())),
            checker: Arc::new(checker),
            store: Arc::new(MemoryStore::new()),
            progress: RecordingProgress::default(),
        }
    }

    fn broker(&self) -> CredentialBroker {
        self.broker_with(self.provider.config())
    }

    fn broker_with(&self, config: ProviderConfig) -> CredentialBroker {
        CredentialBroker::new(
            config,
            self.exchanger.clone(),
            self.checker.clone(),
            self.store.clone(),
        )
        .with_browser(self.browser.clone())
        .with_flow_options(test_flow_options())
        .with_progress(self.progress.sink())
    }

    async fn seed(&self, credential: &TemporaryCredential) {
        self.store.put(&role_arn(), credential).await.unwrap();
    }
}

fn use_secret() -> CredentialRequest {
    CredentialRequest {
        reuse_cached: true,
        persist: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_valid_cached_credential_skips_login() {
    let h = Harness::new(FakeChecker::accepting()).await;
    h.provider.expect_token_exchanges("unused", 0).await;
    let cached = CredentialFixture::valid();
    h.seed(&cached).await;

    let obtained = h.broker().obtain(&use_secret()).await.unwrap();

    assert_eq!(obtained.source, CredentialSource::Cached);
    assert_eq!(obtained.credential, cached);
    assert_eq!(h.browser.launches(), 0);
    assert_eq!(h.provider.token_requests().await, 0);
    assert_eq!(h.exchanger.calls(), 0);
    assert_eq!(h.checker.calls(), 1);
}

#[tokio::test]
async fn test_fresh_login_persists_before_returning() {
    let h = Harness::new(FakeChecker::accepting()).await;
    let id_token = alice_identity_token();
    h.provider.expect_token_exchanges(&id_token, 1).await;

    let obtained = h.broker().obtain(&use_secret()).await.unwrap();

    assert_eq!(obtained.source, CredentialSource::Fresh);
    assert!(obtained.persisted);
    assert_eq!(obtained.credential.access_key, "ASIAFRESHEXAMPLE");
    assert_eq!(
        h.store.get(&role_arn()).await.unwrap(),
        Some(obtained.credential.clone())
    );
    assert_eq!(h.browser.launches(), 1);
    assert_eq!(h.provider.challenges.len(), 1);

    let request = h.exchanger.last_request().unwrap();
    assert_eq!(request.identity_token, id_token);
    assert_eq!(request.role_arn, role_arn());
    assert_eq!(request.session_name, "alice@example.com");
    assert_eq!(request.duration_seconds, 3600);
}

#[tokio::test]
async fn test_rejected_cache_runs_one_login() {
    let h = Harness::new(FakeChecker::rejecting()).await;
    h.provider
        .expect_token_exchanges(&alice_identity_token(), 1)
        .await;
    h.seed(&CredentialFixture::valid()).await;

    let obtained = h.broker().obtain(&use_secret()).await.unwrap();

    assert_eq!(obtained.source, CredentialSource::Fresh);
    assert_eq!(h.checker.calls(), 1);
    assert_eq!(h.browser.launches(), 1);
    assert_eq!(h.exchanger.calls(), 1);
    assert_eq!(
        h.progress.events(),
        vec![
            ProgressEvent::CachedCredentialInvalid,
            ProgressEvent::LoginSucceeded,
            ProgressEvent::CredentialPersisted {
                store: "memory".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_expired_cache_is_not_checked_remotely() {
    let h = Harness::new(FakeChecker::accepting()).await;
    h.provider
        .expect_token_exchanges(&alice_identity_token(), 1)
        .await;
    h.seed(&CredentialFixture::expired()).await;

    let obtained = h.broker().obtain(&use_secret()).await.unwrap();

    assert_eq!(obtained.source, CredentialSource::Fresh);
    assert_eq!(h.checker.calls(), 0);
}

#[tokio::test]
async fn test_refresh_ignores_cache_but_still_persists() {
    let h = Harness::new(FakeChecker::accepting()).await;
    h.provider
        .expect_token_exchanges(&alice_identity_token(), 1)
        .await;
    h.seed(&CredentialFixture::valid()).await;

    let obtained = h
        .broker()
        .obtain(&CredentialRequest {
            reuse_cached: false,
            persist: true,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(obtained.source, CredentialSource::Fresh);
    assert!(obtained.persisted);
    assert_eq!(h.checker.calls(), 0);
    assert_eq!(
        h.store.get(&role_arn()).await.unwrap().unwrap().access_key,
        CredentialFixture::fresh().access_key
    );
}

#[tokio::test]
async fn test_without_secret_store_nothing_is_saved() {
    let h = Harness::new(FakeChecker::accepting()).await;
    h.provider
        .expect_token_exchanges(&alice_identity_token(), 1)
        .await;
    let cached = CredentialFixture::valid();
    h.seed(&cached).await;

    let obtained = h.broker().obtain(&CredentialRequest::default()).await.unwrap();

    assert_eq!(obtained.source, CredentialSource::Fresh);
    assert!(!obtained.persisted);
    assert_eq!(h.checker.calls(), 0);
    assert_eq!(h.store.get(&role_arn()).await.unwrap(), Some(cached));
}

#[tokio::test]
async fn test_configured_session_name_and_clamped_duration() {
    let h = Harness::new(FakeChecker::accepting()).await;
    h.provider
        .expect_token_exchanges(&alice_identity_token(), 2)
        .await;

    let mut config = h.provider.config();
    config.role_session_name = Some("ci-bot".to_string());
    config.max_session_duration_seconds = Some(100_000);

    h.broker_with(config.clone())
        .obtain(&CredentialRequest::default())
        .await
        .unwrap();
    let request = h.exchanger.last_request().unwrap();
    assert_eq!(request.session_name, "ci-bot");
    assert_eq!(request.duration_seconds, 43200);

    h.broker_with(config)
        .obtain(&CredentialRequest {
            max_session_duration_seconds: Some(60),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(h.exchanger.last_request().unwrap().duration_seconds, 900);
}

#[tokio::test]
async fn test_store_write_failure_still_returns_credential() {
    init_test_logging();
    let provider = FakeProvider::start().await;
    provider
        .expect_token_exchanges(&alice_identity_token(), 1)
        .await;

    let obtained = CredentialBroker::new(
        provider.config(),
        Arc::new(FakeExchanger::returning(CredentialFixture::fresh())),
        Arc::new(FakeChecker::accepting()),
        Arc::new(ReadOnlyStore),
    )
    .with_browser(Arc::new(provider.browser("ABC123")))
    .with_flow_options(test_flow_options())
    .obtain(&use_secret())
    .await
    .unwrap();

    assert_eq!(obtained.source, CredentialSource::Fresh);
    assert!(!obtained.persisted);
}

#[tokio::test]
async fn test_denied_login_stops_before_exchange() {
    init_test_logging();
    let provider = FakeProvider::start().await;
    provider.expect_token_exchanges("unused", 0).await;
    let exchanger = Arc::new(FakeExchanger::returning(CredentialFixture::fresh()));

    let err = CredentialBroker::new(
        provider.config(),
        exchanger.clone(),
        Arc::new(FakeChecker::accepting()),
        Arc::new(MemoryStore::new()),
    )
    .with_browser(Arc::new(CallbackBrowser::denying("access_denied", "user+cancelled")))
    .with_flow_options(test_flow_options())
    .obtain(&CredentialRequest::default())
    .await
    .unwrap_err();

    match err {
        Error::LoginDenied { error, description } => {
            assert_eq!(error.as_deref(), Some("access_denied"));
            assert_eq!(description.as_deref(), Some("user cancelled"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(exchanger.calls(), 0);
}

#[tokio::test]
async fn test_busy_redirect_port_fails_fast() {
    let h = Harness::new(FakeChecker::accepting()).await;
    h.provider.expect_token_exchanges("unused", 0).await;

    let held = RedirectListener::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let err = h
        .broker()
        .with_flow_options(FlowOptions {
            listen_addr: held.local_addr(),
            ..test_flow_options()
        })
        .obtain(&CredentialRequest::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ListenerPortInUse { .. }));
    assert_eq!(h.browser.launches(), 0);
}
