//! Integration tests for `SessionManager` and `AuthorizedClient`.
//!
//! The server is a scripted transport: each test supplies a handler that
//! maps a request to a response, and every request is logged so tests can
//! assert on bearer headers, retries, and how many times a route was hit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::join_all;
use matchpoint_protocol::{ApiEnvelope, TokenPair, UserRecord};
use matchpoint_session::{
    AuthMode, KeyValueStore, MemoryStore, ProfileImage, ProfileUpdate, RegistrationOutcome,
    RegistrationProfile, SessionConfig, SessionError, SessionManager, StoreError, TokenVault,
    VerifyOutcome,
};
use matchpoint_transport::{
    ApiRequest, ApiResponse, Body, HttpTransport, Method, Route, TransportError,
};
use serde_json::{Value, json};
use tokio::sync::Notify;

// =========================================================================
// Scripted transport and helpers
// =========================================================================

type Reply = Result<ApiResponse, TransportError>;
type Handler = dyn Fn(&ApiRequest) -> Reply + Send + Sync;

struct ScriptedTransport {
    handler: Box<Handler>,
    log: Mutex<Vec<ApiRequest>>,
    held: Mutex<Option<(Route, Arc<Notify>)>>,
}

impl ScriptedTransport {
    fn new(handler: impl Fn(&ApiRequest) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            log: Mutex::new(Vec::new()),
            held: Mutex::new(None),
        })
    }

    /// Requests to `route` wait, after being logged, until the returned
    /// handle is notified.
    fn hold(&self, route: Route) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        *self.held.lock().unwrap() = Some((route, Arc::clone(&release)));
        release
    }

    fn requests(&self) -> Vec<ApiRequest> {
        self.log.lock().unwrap().clone()
    }

    fn hits(&self, route: &Route) -> usize {
        self.requests().iter().filter(|r| &r.route == route).count()
    }
}

impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Reply {
        self.log.lock().unwrap().push(request.clone());
        let release = match &*self.held.lock().unwrap() {
            Some((route, release)) if *route == request.route => Some(Arc::clone(release)),
            _ => None,
        };
        if let Some(release) = release {
            release.notified().await;
        }
        // Suspend like a real network call so concurrent callers interleave.
        tokio::task::yield_now().await;
        (self.handler)(request)
    }
}

type Manager = SessionManager<Arc<ScriptedTransport>, Arc<MemoryStore>, Arc<MemoryStore>>;

struct Harness {
    transport: Arc<ScriptedTransport>,
    secure: Arc<MemoryStore>,
    session: Arc<MemoryStore>,
    manager: Manager,
}

impl Harness {
    fn new(handler: impl Fn(&ApiRequest) -> Reply + Send + Sync + 'static) -> Self {
        Self::with_stores(
            handler,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    /// A fresh manager over existing stores: a process restart.
    fn with_stores(
        handler: impl Fn(&ApiRequest) -> Reply + Send + Sync + 'static,
        secure: Arc<MemoryStore>,
        session: Arc<MemoryStore>,
    ) -> Self {
        let transport = ScriptedTransport::new(handler);
        let manager = SessionManager::new(
            Arc::clone(&transport),
            Arc::clone(&secure),
            Arc::clone(&session),
            SessionConfig::default(),
        );
        Self {
            transport,
            secure,
            session,
            manager,
        }
    }

    fn vault(&self) -> TokenVault<Arc<MemoryStore>, Arc<MemoryStore>> {
        TokenVault::new(Arc::clone(&self.secure), Arc::clone(&self.session))
    }

    async fn stores_are_empty(&self) -> bool {
        self.secure.is_empty().await && self.session.is_empty().await
    }
}

fn envelope(status: u16, env: ApiEnvelope) -> Reply {
    Ok(ApiResponse::new(status, serde_json::to_value(env).unwrap()))
}

fn ok(data: Value) -> Reply {
    envelope(200, ApiEnvelope::ok(data))
}

fn fail(status: u16, message: &str) -> Reply {
    envelope(status, ApiEnvelope::failure(message))
}

fn login_data(access: &str, refresh: &str) -> Value {
    json!({
        "accessToken": access,
        "refreshToken": refresh,
        "player": { "id": "p1", "name": "Ada", "email": "ada@example.com" }
    })
}

fn player() -> Value {
    json!({ "id": "p1", "name": "Ada", "email": "ada@example.com" })
}

/// Login issues `acc-1`/`ref-1`; a refresh issues `acc-2`/`ref-2`;
/// `GET /tournaments/{id}` accepts only `acc-2`.
fn refreshing_server(req: &ApiRequest) -> Reply {
    match (&req.method, &req.route) {
        (Method::Post, Route::Login) => ok(login_data("acc-1", "ref-1")),
        (Method::Post, Route::RefreshToken) => ok(json!({
            "accessToken": "acc-2",
            "refreshToken": "ref-2"
        })),
        (Method::Get, Route::Tournament(_)) => match req.bearer.as_deref() {
            Some("acc-2") => ok(json!({ "id": "t1" })),
            _ => fail(401, "jwt expired"),
        },
        _ => fail(404, "not found"),
    }
}

fn tournament(id: &str) -> ApiRequest {
    ApiRequest::get(Route::Tournament(id.into()))
}

// =========================================================================
// restore_session()
// =========================================================================

#[tokio::test]
async fn test_restore_session_second_call_is_noop() {
    let h = Harness::new(|_| fail(500, "unused"));
    h.vault()
        .save_tokens(&TokenPair::new("acc", Some("ref".into())), true)
        .await
        .unwrap();
    h.vault()
        .save_user(&UserRecord::from_payload(&player()).unwrap())
        .await
        .unwrap();

    let first = h.manager.restore_session().await.unwrap();
    let after_first = h.manager.snapshot();

    // Wipe the stores: a real second restore would now find nothing.
    h.vault().clear().await.unwrap();
    let second = h.manager.restore_session().await.unwrap();

    assert_eq!(first, AuthMode::Authenticated);
    assert_eq!(second, AuthMode::Authenticated);
    assert_eq!(h.manager.snapshot(), after_first);
    assert!(!after_first.is_loading);
    assert!(h.transport.requests().is_empty(), "cached user, no fetch");
}

#[tokio::test]
async fn test_restore_session_empty_stores_is_unauthenticated() {
    let h = Harness::new(|_| fail(500, "unused"));

    let mode = h.manager.restore_session().await.unwrap();

    assert_eq!(mode, AuthMode::Unauthenticated);
    let s = h.manager.snapshot();
    assert!(s.access_token.is_none());
    assert!(!s.is_loading);
}

#[tokio::test]
async fn test_restore_session_without_cached_user_fetches_it() {
    let h = Harness::new(|req| match req.route {
        Route::CurrentUser if req.bearer.as_deref() == Some("acc") => ok(player()),
        _ => fail(404, "not found"),
    });
    h.vault()
        .save_tokens(&TokenPair::new("acc", Some("ref".into())), false)
        .await
        .unwrap();

    let mode = h.manager.restore_session().await.unwrap();

    assert_eq!(mode, AuthMode::Authenticated);
    let user = h.manager.snapshot().current_user.unwrap();
    assert_eq!(user.id, "p1");
    assert_eq!(h.vault().load_user().await.unwrap(), Some(user));
}

#[tokio::test]
async fn test_restore_session_rejected_token_fails_closed() {
    let h = Harness::new(|_| fail(401, "jwt expired"));
    h.vault()
        .save_tokens(&TokenPair::new("stale", Some("ref".into())), true)
        .await
        .unwrap();

    let mode = h.manager.restore_session().await.unwrap();

    assert_eq!(mode, AuthMode::Unauthenticated);
    assert!(h.manager.snapshot().access_token.is_none());
    assert!(h.stores_are_empty().await);
}

#[tokio::test]
async fn test_restore_session_network_failure_fails_closed() {
    let h = Harness::new(|_| Err(TransportError::Timeout));
    h.vault()
        .save_tokens(&TokenPair::new("acc", None), true)
        .await
        .unwrap();

    let mode = h.manager.restore_session().await.unwrap();

    assert_eq!(mode, AuthMode::Unauthenticated);
    assert!(h.stores_are_empty().await);
}

#[tokio::test]
async fn test_restore_session_oddly_typed_user_fields_keep_session() {
    let h = Harness::new(|req| match req.route {
        Route::CurrentUser => ok(json!({
            "id": "p1",
            "name": "Ada",
            "username": 7,
            "isApproved": "true"
        })),
        _ => fail(404, "not found"),
    });
    h.vault()
        .save_tokens(&TokenPair::new("acc", Some("ref".into())), true)
        .await
        .unwrap();

    let mode = h.manager.restore_session().await.unwrap();

    assert_eq!(mode, AuthMode::Authenticated);
    let user = h.manager.snapshot().current_user.unwrap();
    assert_eq!(user.display_name(), Some("Ada"));
    assert_eq!(user.extra.get("isApproved"), Some(&json!("true")));
    assert_eq!(
        h.secure.get("accessToken").await.unwrap().as_deref(),
        Some("acc")
    );
    assert_eq!(h.vault().load_user().await.unwrap(), Some(user));
}

#[tokio::test]
async fn test_restore_session_concurrent_call_waits_for_first() {
    let h = Harness::new(|req| match req.route {
        Route::CurrentUser => ok(player()),
        _ => fail(404, "not found"),
    });
    h.vault()
        .save_tokens(&TokenPair::new("acc", Some("ref".into())), true)
        .await
        .unwrap();

    let results = join_all([h.manager.restore_session(), h.manager.restore_session()]).await;

    for result in results {
        assert_eq!(result.unwrap(), AuthMode::Authenticated);
    }
    assert_eq!(h.transport.hits(&Route::CurrentUser), 1);
    assert!(!h.manager.snapshot().is_loading);
}

// =========================================================================
// Token round-trip
// =========================================================================

#[tokio::test]
async fn test_login_then_restore_round_trips_tokens_for_both_stores() {
    for remember_me in [true, false] {
        let first = Harness::new(|req| match req.route {
            Route::Login => ok(login_data("acc-rt", "ref-rt")),
            _ => fail(404, "not found"),
        });
        first
            .manager
            .login_with_credentials("ada@example.com", "pw", remember_me)
            .await
            .unwrap();
        assert_eq!(first.secure.is_empty().await, !remember_me);

        let restarted = Harness::with_stores(
            |_| fail(500, "unused"),
            Arc::clone(&first.secure),
            Arc::clone(&first.session),
        );
        let mode = restarted.manager.restore_session().await.unwrap();

        let s = restarted.manager.snapshot();
        assert_eq!(mode, AuthMode::Authenticated, "remember_me = {remember_me}");
        assert_eq!(s.access_token.as_deref(), Some("acc-rt"));
        assert_eq!(s.refresh_token.as_deref(), Some("ref-rt"));
        assert_eq!(s.current_user.unwrap().id, "p1");
    }
}

// =========================================================================
// login_with_credentials()
// =========================================================================

#[tokio::test]
async fn test_login_success_sets_state_before_returning() {
    let h = Harness::new(|req| match req.route {
        Route::Login => ok(login_data("acc-1", "ref-1")),
        _ => fail(404, "not found"),
    });

    let outcome = h
        .manager
        .login_with_credentials("ada@example.com", "pw", true)
        .await
        .unwrap();

    assert!(outcome.persisted);
    assert_eq!(outcome.user.unwrap().display_name(), Some("Ada"));
    let s = h.manager.snapshot();
    assert_eq!(s.access_token.as_deref(), Some("acc-1"));
    assert_eq!(s.mode(), AuthMode::Authenticated);
    assert!(!s.is_loading);
    assert!(s.last_error.is_none());

    let login = &h.transport.requests()[0];
    assert!(login.bearer.is_none());
    assert_eq!(
        login.body,
        Body::Json(json!({ "email": "ada@example.com", "password": "pw" }))
    );
}

#[tokio::test]
async fn test_login_rejected_sets_last_error_and_keeps_tokens_untouched() {
    let h = Harness::new(|_| fail(401, "Invalid email or password"));

    let err = h
        .manager
        .login_with_credentials("ada@example.com", "wrong", false)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Invalid email or password");
    assert_eq!(err.status(), Some(401));
    let s = h.manager.snapshot();
    assert_eq!(s.last_error.as_deref(), Some("Invalid email or password"));
    assert!(s.access_token.is_none());
    assert_eq!(h.transport.hits(&Route::RefreshToken), 0);
}

#[tokio::test]
async fn test_login_success_false_envelope_uses_fallback_message() {
    let h = Harness::new(|_| envelope(200, ApiEnvelope::default()));

    let err = h
        .manager
        .login_with_credentials("a@b.c", "pw", false)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Login failed");
}

#[tokio::test]
async fn test_login_network_failure_reports_connection_message() {
    let h = Harness::new(|_| Err(TransportError::Network("connection refused".into())));

    let err = h
        .manager
        .login_with_credentials("a@b.c", "pw", false)
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Network(_)));
    assert_eq!(
        h.manager.snapshot().last_error.as_deref(),
        Some("No response from server. Please check your connection.")
    );
}

#[tokio::test]
async fn test_login_without_user_backfills_from_current_user() {
    let h = Harness::new(|req| match req.route {
        Route::Login => ok(json!({ "accessToken": "acc", "refreshToken": "ref" })),
        Route::CurrentUser => ok(json!({ "user": player() })),
        _ => fail(404, "not found"),
    });

    let outcome = h
        .manager
        .login_with_credentials("a@b.c", "pw", false)
        .await
        .unwrap();

    assert_eq!(outcome.user.unwrap().id, "p1");
    assert_eq!(h.manager.snapshot().current_user.unwrap().id, "p1");
    let fetch = h
        .transport
        .requests()
        .into_iter()
        .find(|r| r.route == Route::CurrentUser)
        .unwrap();
    assert_eq!(fetch.bearer.as_deref(), Some("acc"));
}

#[tokio::test]
async fn test_login_oddly_typed_user_field_still_yields_user() {
    let h = Harness::new(|req| match req.route {
        Route::Login => ok(json!({
            "accessToken": "acc",
            "refreshToken": "ref",
            "player": { "id": "p1", "name": { "first": "Ada" }, "isApproved": 1 }
        })),
        _ => fail(404, "not found"),
    });

    let outcome = h
        .manager
        .login_with_credentials("ada@example.com", "pw", false)
        .await
        .unwrap();

    let user = outcome.user.unwrap();
    assert_eq!(user.id, "p1");
    assert_eq!(user.name, None);
    assert_eq!(user.extra.get("name"), Some(&json!({ "first": "Ada" })));
    assert_eq!(h.transport.hits(&Route::CurrentUser), 0);
}

#[tokio::test]
async fn test_login_concurrent_second_call_is_rejected() {
    let h = Harness::new(|req| match req.route {
        Route::Login => ok(login_data("acc", "ref")),
        _ => fail(404, "not found"),
    });

    let results = join_all([
        h.manager.login_with_credentials("a@b.c", "pw", false),
        h.manager.login_with_credentials("a@b.c", "pw", false),
    ])
    .await;

    assert!(results[0].is_ok());
    assert!(matches!(
        results[1],
        Err(SessionError::OperationInProgress(_))
    ));
    assert_eq!(h.transport.hits(&Route::Login), 1);
    assert!(!h.manager.snapshot().is_loading);
}

/// A store whose writes always fail.
struct ReadOnlyStore;

impl KeyValueStore for ReadOnlyStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("read-only")))
    }

    async fn remove(&self, _key: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_login_storage_failure_still_signs_in_but_reports_not_persisted() {
    let transport = ScriptedTransport::new(|req| match req.route {
        Route::Login => ok(login_data("acc", "ref")),
        _ => fail(404, "not found"),
    });
    let manager = SessionManager::new(
        transport,
        ReadOnlyStore,
        MemoryStore::new(),
        SessionConfig::default(),
    );

    let outcome = manager
        .login_with_credentials("a@b.c", "pw", true)
        .await
        .unwrap();

    assert!(!outcome.persisted);
    assert!(manager.is_authenticated());
}

// =========================================================================
// AuthorizedClient: refresh-then-retry
// =========================================================================

#[tokio::test]
async fn test_send_401_refreshes_and_retries_with_new_token() {
    let h = Harness::new(refreshing_server);
    h.manager
        .login_with_credentials("a@b.c", "pw", true)
        .await
        .unwrap();

    let response = h.manager.client().send(tournament("t1")).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body["data"]["id"], "t1");

    let calls: Vec<_> = h
        .transport
        .requests()
        .into_iter()
        .filter(|r| matches!(r.route, Route::Tournament(_)))
        .collect();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].bearer.as_deref(), Some("acc-1"));
    assert!(!calls[0].is_retry);
    assert_eq!(calls[1].bearer.as_deref(), Some("acc-2"));
    assert!(calls[1].is_retry);

    let s = h.manager.snapshot();
    assert_eq!(s.access_token.as_deref(), Some("acc-2"));
    assert_eq!(s.refresh_token.as_deref(), Some("ref-2"));
    assert_eq!(
        h.vault().load_tokens().await.unwrap(),
        Some(TokenPair::new("acc-2", Some("ref-2".into())))
    );
    assert!(h.session.get("accessToken").await.unwrap().is_none());
}

#[tokio::test]
async fn test_send_refresh_request_carries_refresh_token_without_bearer() {
    let h = Harness::new(refreshing_server);
    h.manager
        .login_with_credentials("a@b.c", "pw", false)
        .await
        .unwrap();

    h.manager.client().send(tournament("t1")).await.unwrap();

    let refresh = h
        .transport
        .requests()
        .into_iter()
        .find(|r| r.route == Route::RefreshToken)
        .unwrap();
    assert!(refresh.bearer.is_none());
    assert_eq!(refresh.body, Body::Json(json!({ "refreshToken": "ref-1" })));
}

#[tokio::test]
async fn test_send_retry_that_401s_again_is_not_refreshed_twice() {
    let h = Harness::new(|req| match req.route {
        Route::Login => ok(login_data("acc-1", "ref-1")),
        Route::RefreshToken => ok(json!({ "accessToken": "acc-2" })),
        _ => fail(401, "still no"),
    });
    h.manager
        .login_with_credentials("a@b.c", "pw", false)
        .await
        .unwrap();

    let response = h.manager.client().send(tournament("t1")).await.unwrap();

    assert_eq!(response.status, 401);
    assert_eq!(h.transport.hits(&Route::RefreshToken), 1);
    // A refresh without a new refresh token keeps the old one.
    assert_eq!(
        h.manager.snapshot().refresh_token.as_deref(),
        Some("ref-1")
    );
}

#[tokio::test]
async fn test_send_concurrent_401s_share_one_refresh() {
    let h = Harness::new(refreshing_server);
    h.manager
        .login_with_credentials("a@b.c", "pw", true)
        .await
        .unwrap();
    let client = h.manager.client();

    let responses = join_all((0..4).map(|i| client.send(tournament(&format!("t{i}"))))).await;

    assert!(responses.iter().all(|r| r.as_ref().unwrap().status == 200));
    assert_eq!(h.transport.hits(&Route::RefreshToken), 1);
    assert_eq!(
        h.manager.snapshot().access_token.as_deref(),
        Some("acc-2")
    );
}

// =========================================================================
// AuthorizedClient: failures clear the session
// =========================================================================

#[tokio::test]
async fn test_send_refresh_failure_clears_session_fully() {
    let h = Harness::new(|req| match req.route {
        Route::Login => ok(login_data("acc-1", "ref-1")),
        Route::RefreshToken => fail(401, "refresh token revoked"),
        _ => fail(401, "jwt expired"),
    });
    h.manager
        .login_with_credentials("a@b.c", "pw", true)
        .await
        .unwrap();

    let response = h.manager.client().send(tournament("t1")).await.unwrap();

    assert_eq!(response.status, 401, "original 401 is passed through");
    let s = h.manager.snapshot();
    assert!(s.access_token.is_none());
    assert!(s.refresh_token.is_none());
    assert!(s.current_user.is_none());
    assert!(!s.guest_mode);
    assert!(h.stores_are_empty().await);
}

#[tokio::test]
async fn test_send_refresh_success_false_clears_session() {
    let h = Harness::new(|req| match req.route {
        Route::Login => ok(login_data("acc-1", "ref-1")),
        Route::RefreshToken => envelope(200, ApiEnvelope::failure("nope")),
        _ => fail(401, "jwt expired"),
    });
    h.manager
        .login_with_credentials("a@b.c", "pw", false)
        .await
        .unwrap();

    h.manager.client().send(tournament("t1")).await.unwrap();

    assert_eq!(h.manager.snapshot().mode(), AuthMode::Unauthenticated);
    assert!(h.stores_are_empty().await);
}

#[tokio::test]
async fn test_send_refresh_network_failure_clears_session() {
    let h = Harness::new(|req| match req.route {
        Route::Login => ok(login_data("acc-1", "ref-1")),
        Route::RefreshToken => Err(TransportError::Timeout),
        _ => fail(401, "jwt expired"),
    });
    h.manager
        .login_with_credentials("a@b.c", "pw", false)
        .await
        .unwrap();

    let response = h.manager.client().send(tournament("t1")).await.unwrap();

    assert_eq!(response.status, 401);
    assert!(!h.manager.is_authenticated());
}

#[tokio::test]
async fn test_send_401_without_refresh_token_clears_session() {
    let h = Harness::new(|req| match req.route {
        Route::Login => ok(json!({ "accessToken": "acc", "player": player() })),
        _ => fail(401, "jwt expired"),
    });
    h.manager
        .login_with_credentials("a@b.c", "pw", false)
        .await
        .unwrap();

    h.manager.client().send(tournament("t1")).await.unwrap();

    assert_eq!(h.transport.hits(&Route::RefreshToken), 0);
    assert!(h.manager.snapshot().current_user.is_none());
    assert!(h.stores_are_empty().await);
}

#[tokio::test]
async fn test_send_network_failure_keeps_session() {
    let h = Harness::new(|req| match req.route {
        Route::Login => ok(login_data("acc", "ref")),
        _ => Err(TransportError::Network("unreachable".into())),
    });
    h.manager
        .login_with_credentials("a@b.c", "pw", false)
        .await
        .unwrap();

    let result = h.manager.client().send(tournament("t1")).await;

    assert!(matches!(result, Err(SessionError::Network(_))));
    assert!(h.manager.is_authenticated());
}

/// Signs in as `acc-old`/`ref-old`, sends a protected request that gets a
/// `401`, and lands a fresh login while the refresh call is in flight.
async fn login_lands_during_refresh(refresh_reply: fn() -> Reply) -> (Harness, ApiResponse) {
    let h = Harness::new(move |req| match req.route {
        Route::Login => ok(login_data("acc-new", "ref-new")),
        Route::RefreshToken => refresh_reply(),
        Route::Tournament(_) if req.bearer.as_deref() == Some("acc-new") => {
            ok(json!({ "id": "t1" }))
        }
        Route::Tournament(_) => fail(401, "jwt expired"),
        _ => fail(404, "not found"),
    });
    h.vault()
        .save_tokens(&TokenPair::new("acc-old", Some("ref-old".into())), true)
        .await
        .unwrap();
    h.vault()
        .save_user(&UserRecord::from_payload(&player()).unwrap())
        .await
        .unwrap();
    h.manager.restore_session().await.unwrap();

    let release = h.transport.hold(Route::RefreshToken);
    let client = h.manager.client();
    let login = async {
        while h.transport.hits(&Route::RefreshToken) == 0 {
            tokio::task::yield_now().await;
        }
        h.manager
            .login_with_credentials("ada@example.com", "pw", true)
            .await
            .unwrap();
        release.notify_one();
    };

    let (response, ()) = tokio::join!(client.send(tournament("t1")), login);
    (h, response.unwrap())
}

#[tokio::test]
async fn test_refresh_failure_after_new_login_keeps_new_session() {
    let (h, response) = login_lands_during_refresh(|| fail(401, "refresh token revoked")).await;

    assert_eq!(response.status, 200);
    assert_eq!(
        h.manager.snapshot().access_token.as_deref(),
        Some("acc-new")
    );
    assert_eq!(
        h.vault().load_tokens().await.unwrap(),
        Some(TokenPair::new("acc-new", Some("ref-new".into())))
    );
}

#[tokio::test]
async fn test_refresh_success_after_new_login_does_not_overwrite_it() {
    let (h, response) = login_lands_during_refresh(|| {
        ok(json!({ "accessToken": "acc-refreshed", "refreshToken": "ref-refreshed" }))
    })
    .await;

    assert_eq!(response.status, 200);
    let s = h.manager.snapshot();
    assert_eq!(s.access_token.as_deref(), Some("acc-new"));
    assert_eq!(s.refresh_token.as_deref(), Some("ref-new"));
    assert_eq!(
        h.vault().load_tokens().await.unwrap(),
        Some(TokenPair::new("acc-new", Some("ref-new".into())))
    );
}

// =========================================================================
// AuthorizedClient: public routes
// =========================================================================

#[tokio::test]
async fn test_send_public_route_gets_no_bearer_and_no_refresh() {
    // Only a login carrying credentials succeeds; everything else is a 401.
    let h = Harness::new(|req| match (&req.method, &req.route, &req.body) {
        (Method::Post, Route::Login, Body::Json(_)) => ok(login_data("acc", "ref")),
        _ => fail(401, "nope"),
    });
    h.manager
        .login_with_credentials("a@b.c", "pw", true)
        .await
        .unwrap();
    let client = h.manager.client();

    let login = client.send(ApiRequest::post(Route::Login)).await.unwrap();
    let listing = client.send(ApiRequest::get(Route::Tournaments)).await.unwrap();
    let register = client.send(ApiRequest::post(Route::Register)).await.unwrap();

    assert_eq!(login.status, 401);
    assert_eq!(listing.status, 401);
    assert_eq!(register.status, 401);
    assert!(h.transport.requests().iter().all(|r| r.bearer.is_none()));
    assert_eq!(h.transport.hits(&Route::RefreshToken), 0);
    assert!(h.manager.is_authenticated(), "public 401s never clear");
}

#[tokio::test]
async fn test_send_protected_tournament_write_gets_bearer() {
    let h = Harness::new(|req| match req.route {
        Route::Login => ok(login_data("acc", "ref")),
        _ => ok(json!({})),
    });
    h.manager
        .login_with_credentials("a@b.c", "pw", false)
        .await
        .unwrap();

    h.manager
        .client()
        .send(ApiRequest::post(Route::Tournaments).json(json!({ "name": "Cup" })))
        .await
        .unwrap();

    let create = h.transport.requests().pop().unwrap();
    assert_eq!(create.bearer.as_deref(), Some("acc"));
}

// =========================================================================
// Guest mode
// =========================================================================

#[tokio::test]
async fn test_continue_as_guest_then_login_switches_modes() {
    let h = Harness::new(|req| match req.route {
        Route::Login => ok(login_data("acc", "ref")),
        _ => fail(404, "not found"),
    });

    let guest = h.manager.continue_as_guest().await.unwrap();
    let s = h.manager.snapshot();
    assert!(guest.is_guest);
    assert_eq!(guest.id, "guest");
    assert!(s.access_token.is_none());
    assert!(s.guest_mode);
    assert_eq!(s.mode(), AuthMode::Guest);
    assert!(s.has_app_access());
    assert!(!s.is_authenticated());
    assert_eq!(h.vault().load_user().await.unwrap(), Some(guest));

    h.manager
        .login_with_credentials("a@b.c", "pw", false)
        .await
        .unwrap();
    let s = h.manager.snapshot();
    assert!(!s.guest_mode);
    assert!(s.access_token.is_some());
    assert_eq!(s.mode(), AuthMode::Authenticated);
}

#[tokio::test]
async fn test_continue_as_guest_drops_persisted_tokens_without_server_call() {
    let h = Harness::new(|req| match req.route {
        Route::Login => ok(login_data("acc", "ref")),
        _ => fail(500, "unexpected"),
    });
    h.manager
        .login_with_credentials("a@b.c", "pw", true)
        .await
        .unwrap();

    h.manager.continue_as_guest().await.unwrap();

    assert_eq!(h.vault().load_tokens().await.unwrap(), None);
    assert_eq!(h.transport.hits(&Route::Logout), 0);
}

#[tokio::test]
async fn test_update_profile_as_guest_is_unauthenticated() {
    let h = Harness::new(|_| fail(500, "unexpected"));
    h.manager.continue_as_guest().await.unwrap();

    let err = h
        .manager
        .update_profile(ProfileUpdate::new().with_name("Bob"), None)
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Unauthenticated));
    assert!(h.transport.requests().is_empty());
}

#[tokio::test]
async fn test_send_401_as_guest_keeps_guest_mode() {
    let h = Harness::new(|req| match req.route {
        Route::Tournament(_) => fail(401, "login required"),
        _ => fail(500, "unexpected"),
    });
    let guest = h.manager.continue_as_guest().await.unwrap();

    let response = h.manager.client().send(tournament("t1")).await.unwrap();

    assert_eq!(response.status, 401);
    let s = h.manager.snapshot();
    assert!(s.guest_mode);
    assert_eq!(s.current_user.as_ref(), Some(&guest));
    assert_eq!(h.vault().load_user().await.unwrap(), Some(guest));
    assert_eq!(h.transport.hits(&Route::RefreshToken), 0);
}

// =========================================================================
// register_with_otp()
// =========================================================================

fn profile() -> RegistrationProfile {
    RegistrationProfile::new("new@example.com", "pw", "New", "newbie")
}

#[tokio::test]
async fn test_register_202_requires_verification() {
    let h = Harness::new(|_| {
        envelope(
            202,
            ApiEnvelope {
                success: true,
                message: Some("OTP sent".into()),
                ..ApiEnvelope::default()
            },
        )
    });

    let outcome = h.manager.register_with_otp(profile(), None).await.unwrap();

    assert_eq!(
        outcome,
        RegistrationOutcome::VerificationRequired {
            email: "new@example.com".into()
        }
    );
    assert!(h.manager.snapshot().access_token.is_none());

    let req = &h.transport.requests()[0];
    assert_eq!(req.route, Route::Register);
    assert_eq!(req.timeout, Some(Duration::from_secs(30)));
    let Body::Json(body) = &req.body else {
        panic!("expected a JSON body, got {:?}", req.body);
    };
    assert_eq!(body["email"], "new@example.com");
    assert_eq!(body["uid"].as_str().unwrap().len(), 32);
}

#[tokio::test]
async fn test_register_201_with_tokens_auto_logs_in_to_session_store() {
    let h = Harness::new(|_| {
        envelope(
            201,
            ApiEnvelope::ok(json!({
                "accessToken": "acc-new",
                "refreshToken": "ref-new",
                "user": { "id": "u9", "name": "New" }
            })),
        )
    });

    let outcome = h.manager.register_with_otp(profile(), None).await.unwrap();

    let RegistrationOutcome::AutoLogin(login) = outcome else {
        panic!("expected auto-login, got {outcome:?}");
    };
    assert_eq!(login.user.unwrap().id, "u9");
    let s = h.manager.snapshot();
    assert_eq!(s.access_token.as_deref(), Some("acc-new"));
    assert_eq!(s.refresh_token.as_deref(), Some("ref-new"));
    assert!(h.secure.is_empty().await);
}

#[tokio::test]
async fn test_register_409_unverified_resumes_verification() {
    let h = Harness::new(|_| {
        Ok(ApiResponse::new(
            409,
            json!({
                "success": false,
                "message": "Account exists but is not verified",
                "data": { "requiresVerification": true }
            }),
        ))
    });

    let outcome = h.manager.register_with_otp(profile(), None).await.unwrap();

    assert!(outcome.requires_verification());
    assert!(h.manager.snapshot().last_error.is_none());
}

#[tokio::test]
async fn test_register_409_verified_is_already_registered() {
    let h = Harness::new(|_| fail(409, "Email already registered"));

    let err = h
        .manager
        .register_with_otp(profile(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::AlreadyRegistered));
    assert!(h.manager.snapshot().last_error.unwrap().contains("log in"));
}

#[tokio::test]
async fn test_register_400_passes_server_message_through() {
    let h = Harness::new(|_| fail(400, "Username taken"));

    let err = h
        .manager
        .register_with_otp(profile(), None)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Username taken");
}

#[tokio::test]
async fn test_register_with_image_sends_multipart() {
    let h = Harness::new(|_| envelope(202, ApiEnvelope::ok(json!({}))));
    let image = ProfileImage::new("me.jpg", "image/jpeg", vec![0xff, 0xd8]);

    h.manager
        .register_with_otp(profile().with_uid("fixed-uid"), Some(image))
        .await
        .unwrap();

    let req = &h.transport.requests()[0];
    let Body::Multipart { fields, file } = &req.body else {
        panic!("expected multipart, got {:?}", req.body);
    };
    assert!(fields.contains(&("uid".to_string(), "fixed-uid".to_string())));
    assert_eq!(file.as_ref().unwrap().field, "profileImage");
}

// =========================================================================
// verify_otp() / resend_otp()
// =========================================================================

#[tokio::test]
async fn test_verify_otp_404_is_registration_expired() {
    let h = Harness::new(|_| fail(404, "Registration not found"));

    let err = h
        .manager
        .verify_otp("new@example.com", "123456", false)
        .await
        .unwrap_err();

    assert!(err.is_expired());
    assert!(
        h.manager
            .snapshot()
            .last_error
            .unwrap()
            .contains("start registration again")
    );
}

#[tokio::test]
async fn test_verify_otp_with_tokens_logs_in() {
    let h = Harness::new(|req| {
        assert_eq!(
            req.body,
            Body::Json(json!({ "email": "new@example.com", "otp": "123456" }))
        );
        ok(json!({
            "tokens": { "accessToken": "acc", "refreshToken": "ref" },
            "player": { "id": "p7" }
        }))
    });

    let outcome = h
        .manager
        .verify_otp("new@example.com", "123456", true)
        .await
        .unwrap();

    let VerifyOutcome::LoggedIn(login) = outcome else {
        panic!("expected login, got {outcome:?}");
    };
    assert_eq!(login.user.unwrap().id, "p7");
    assert_eq!(
        h.secure.get("accessToken").await.unwrap().as_deref(),
        Some("acc")
    );
}

#[tokio::test]
async fn test_verify_otp_without_tokens_is_verified_only() {
    let h = Harness::new(|_| {
        envelope(
            200,
            ApiEnvelope {
                success: true,
                message: Some("Email verified".into()),
                ..ApiEnvelope::default()
            },
        )
    });

    let outcome = h
        .manager
        .verify_otp("new@example.com", "123456", false)
        .await
        .unwrap();

    assert_eq!(outcome, VerifyOutcome::Verified { user: None });
    assert_eq!(h.manager.snapshot().mode(), AuthMode::Unauthenticated);
}

#[tokio::test]
async fn test_resend_otp_returns_envelope_and_failure_sets_last_error() {
    let h = Harness::new(|req| match &req.body {
        Body::Json(body) if body["email"] == "ok@example.com" => envelope(
            200,
            ApiEnvelope {
                success: true,
                message: Some("OTP resent".into()),
                ..ApiEnvelope::default()
            },
        ),
        _ => fail(429, "Too many requests"),
    });

    let env = h.manager.resend_otp("ok@example.com").await.unwrap();
    assert_eq!(env.message.as_deref(), Some("OTP resent"));

    h.manager.resend_otp("spam@example.com").await.unwrap_err();
    assert_eq!(
        h.manager.snapshot().last_error.as_deref(),
        Some("Too many requests")
    );
}

#[tokio::test]
async fn test_resend_otp_success_clears_earlier_last_error() {
    let h = Harness::new(|req| match req.route {
        Route::Login => fail(401, "Invalid email or password"),
        Route::ResendOtp => ok(Value::Null),
        _ => fail(404, "not found"),
    });
    h.manager
        .login_with_credentials("ada@example.com", "wrong", false)
        .await
        .unwrap_err();
    assert_eq!(
        h.manager.snapshot().last_error.as_deref(),
        Some("Invalid email or password")
    );

    h.manager.resend_otp("ada@example.com").await.unwrap();

    assert_eq!(h.manager.snapshot().last_error, None);
}

// =========================================================================
// logout()
// =========================================================================

#[tokio::test]
async fn test_logout_clears_everything_even_when_server_is_unreachable() {
    let h = Harness::new(|req| match req.route {
        Route::Login => ok(login_data("acc", "ref")),
        _ => Err(TransportError::Network("offline".into())),
    });
    h.manager
        .login_with_credentials("a@b.c", "pw", true)
        .await
        .unwrap();

    h.manager.logout().await;

    let s = h.manager.snapshot();
    assert!(s.access_token.is_none());
    assert!(s.refresh_token.is_none());
    assert!(s.current_user.is_none());
    assert!(!s.guest_mode);
    assert!(!s.is_loading);
    assert!(h.stores_are_empty().await);

    let logout = h.transport.requests().pop().unwrap();
    assert_eq!(logout.route, Route::Logout);
    assert_eq!(logout.bearer.as_deref(), Some("acc"));
}

#[tokio::test]
async fn test_logout_from_guest_mode_leaves_guest_mode() {
    let h = Harness::new(|_| fail(500, "unexpected"));
    h.manager.continue_as_guest().await.unwrap();

    h.manager.logout().await;

    let s = h.manager.snapshot();
    assert!(!s.guest_mode);
    assert_eq!(s.mode(), AuthMode::Unauthenticated);
    assert!(h.stores_are_empty().await);
    assert!(h.transport.requests().is_empty(), "no token, no server call");
}

// =========================================================================
// fetch_current_user() / update_profile()
// =========================================================================

#[tokio::test]
async fn test_fetch_current_user_401_clears_session() {
    let h = Harness::new(|req| match req.route {
        Route::Login => ok(login_data("acc", "ref")),
        _ => fail(401, "jwt expired"),
    });
    h.manager
        .login_with_credentials("a@b.c", "pw", false)
        .await
        .unwrap();

    let user = h.manager.fetch_current_user().await.unwrap();

    assert!(user.is_none());
    assert!(!h.manager.is_authenticated());
    assert_eq!(h.transport.hits(&Route::RefreshToken), 0);
}

#[tokio::test]
async fn test_update_profile_sends_explicit_bearer_and_overwrites_user() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let h = Harness::new(move |req| match req.route {
        Route::Login => ok(login_data("acc", "ref")),
        Route::UpdateProfile => {
            seen.fetch_add(1, Ordering::SeqCst);
            ok(json!({ "user": { "id": "p1", "name": "Ada L." } }))
        }
        _ => fail(404, "not found"),
    });
    h.manager
        .login_with_credentials("a@b.c", "pw", false)
        .await
        .unwrap();

    let user = h
        .manager
        .update_profile(ProfileUpdate::new().with_name("Ada L."), None)
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(user.display_name(), Some("Ada L."));
    assert_eq!(
        h.manager.snapshot().display_name(),
        Some("Ada L.")
    );
    let put = h.transport.requests().pop().unwrap();
    assert_eq!(put.method, Method::Put);
    assert_eq!(put.bearer.as_deref(), Some("acc"));
    assert_eq!(put.body, Body::Json(json!({ "name": "Ada L." })));
}
