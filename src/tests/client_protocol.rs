//! Protocol tests for the authenticated client
//!
//! These drive the 401/refresh ordering contract, the retry policy and the
//! bootstrap path against the scripted transport.

use reqwest::Method;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::auth::AuthService;
use crate::client::ApiClient;
use crate::error::ParqError;
use crate::jwt;
use crate::session::{AuthState, Session};
use crate::store::TokenStore;
use crate::tests::mocks::{ok_json, respond, MockTransport};
use crate::tests::utils::{
    client_with, session_with_pair, stored_session_with_pair, token_expiring_in,
};

async fn get_sensor(client: &ApiClient) -> crate::error::Result<serde_json::Value> {
    client.request(Method::GET, "/sensor/", None::<&()>).await
}

#[tokio::test]
async fn concurrent_401s_share_one_refresh() {
    let session = session_with_pair(900, 86_400);
    let old_access = session.access_token().unwrap();
    let new_access = token_expiring_in(900);

    let transport = Arc::new(MockTransport::new());
    {
        let old = old_access.clone();
        transport.on_with_delay("/sensor/", Duration::from_millis(30), move |req, _| {
            if req.bearer.as_deref() == Some(old.as_str()) {
                respond(401, r#"{"detail":"token expired"}"#)
            } else {
                respond(200, "[]")
            }
        });
    }
    {
        let new = new_access.clone();
        transport.on_with_delay("/auth/refresh/", Duration::from_millis(50), move |_, _| {
            ok_json(json!({ "access": new }))
        });
    }

    let client = client_with(transport.clone(), session.clone());

    let mut handles = Vec::new();
    for _ in 0..5 {
        let client = client.clone();
        handles.push(tokio::spawn(async move { get_sensor(&client).await }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    // Exactly one refresh reached the server for all five 401 observers
    assert_eq!(transport.count_matching("/auth/refresh/"), 1);
    assert_eq!(session.access_token().unwrap(), new_access);

    // Every request was retried with the refreshed token
    let retried = transport
        .calls()
        .iter()
        .filter(|c| {
            c.url.contains("/sensor/") && c.bearer.as_deref() == Some(new_access.as_str())
        })
        .count();
    assert_eq!(retried, 5);
}

#[tokio::test]
async fn recovered_request_is_retried_exactly_once() {
    let session = session_with_pair(900, 86_400);
    let old_access = session.access_token().unwrap();
    let new_access = token_expiring_in(900);

    let transport = Arc::new(MockTransport::new());
    {
        let old = old_access.clone();
        transport.on("/sensor/", move |req, _| {
            if req.bearer.as_deref() == Some(old.as_str()) {
                respond(401, "")
            } else {
                respond(200, r#"[{"reference":"A-01","name":"Spot A-01",
                    "is_lock":false,"is_occupied":false,"is_blocker_raised":false,
                    "latitude1":43.2,"latitude2":43.2,"latitude3":43.2,"latitude4":43.2,
                    "longitude1":76.9,"longitude2":76.9,"longitude3":76.9,"longitude4":76.9}]"#)
            }
        });
    }
    {
        let new = new_access.clone();
        transport.on("/auth/refresh/", move |_, _| ok_json(json!({ "access": new })));
    }

    let client = client_with(transport.clone(), session);
    let spots: Vec<parq_protocol::ParkingSpot> = client
        .request(Method::GET, "/sensor/", None::<&()>)
        .await
        .unwrap();

    assert_eq!(spots.len(), 1);
    assert_eq!(transport.count_matching("/sensor/"), 2);
    assert_eq!(transport.count_matching("/auth/refresh/"), 1);
}

#[tokio::test]
async fn rejected_refresh_clears_session_and_skips_network_afterwards() {
    let dir = tempfile::tempdir().unwrap();
    let session = stored_session_with_pair(dir.path(), 900, 86_400);

    let transport = Arc::new(MockTransport::new());
    transport.on("/sensor/", |_, _| respond(401, r#"{"detail":"expired"}"#));
    transport.on("/auth/refresh/", |_, _| {
        respond(401, r#"{"detail":"refresh invalid"}"#)
    });

    let client = client_with(transport.clone(), session.clone());

    let err = get_sensor(&client).await.unwrap_err();
    assert!(err.is_auth_error());

    // Both tokens are gone, in memory and on disk
    assert!(!session.is_authenticated());
    assert!(session.load_stored().is_none());
    assert!(TokenStore::new(dir.path().join("session.json"))
        .unwrap()
        .get()
        .is_none());
    assert_eq!(transport.count_matching("/auth/refresh/"), 1);

    // A follow-up request fails before touching the network
    let calls_before = transport.calls().len();
    let err = get_sensor(&client).await.unwrap_err();
    assert!(err.is_auth_error());
    assert_eq!(transport.calls().len(), calls_before);
}

#[tokio::test]
async fn missing_refresh_token_fails_without_refresh_call() {
    let session = Arc::new(Session::new(None, None));
    let transport = Arc::new(MockTransport::new());
    let client = client_with(transport.clone(), session);

    let err = get_sensor(&client).await.unwrap_err();
    assert!(err.is_auth_error());
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn transient_refresh_failure_keeps_credentials() {
    let session = session_with_pair(900, 86_400);
    let old_access = session.access_token().unwrap();

    let transport = Arc::new(MockTransport::new());
    {
        let old = old_access.clone();
        transport.on("/sensor/", move |req, _| {
            if req.bearer.as_deref() == Some(old.as_str()) {
                respond(401, "")
            } else {
                respond(200, "[]")
            }
        });
    }
    transport.on("/auth/refresh/", |_, _| {
        Err(ParqError::offline("connection refused"))
    });

    let client = client_with(transport.clone(), session.clone());

    let err = get_sensor(&client).await.unwrap_err();
    assert!(err.is_network_error());

    // Credentials survive so a later request can retry the refresh
    assert!(session.is_authenticated());
    assert_eq!(session.access_token().unwrap(), old_access);
    // The refresh call itself was retried to its bound
    assert_eq!(transport.count_matching("/auth/refresh/"), 3);
    assert_eq!(transport.count_matching("/sensor/"), 1);
}

#[tokio::test]
async fn transient_refresh_status_retries_then_succeeds() {
    let session = session_with_pair(900, 86_400);
    let old_access = session.access_token().unwrap();
    let new_access = token_expiring_in(900);

    let transport = Arc::new(MockTransport::new());
    {
        let old = old_access.clone();
        transport.on("/sensor/", move |req, _| {
            if req.bearer.as_deref() == Some(old.as_str()) {
                respond(401, "")
            } else {
                respond(200, "[]")
            }
        });
    }
    {
        let new = new_access.clone();
        transport.on("/auth/refresh/", move |_, index| {
            if index < 2 {
                respond(503, r#"{"detail":"maintenance"}"#)
            } else {
                ok_json(json!({ "access": new }))
            }
        });
    }

    let client = client_with(transport.clone(), session.clone());

    assert!(get_sensor(&client).await.is_ok());
    assert_eq!(transport.count_matching("/auth/refresh/"), 3);
    assert_eq!(session.access_token().unwrap(), new_access);
}

#[tokio::test]
async fn network_failures_retry_to_the_bound_with_growing_delays() {
    let session = session_with_pair(900, 86_400);
    let transport = Arc::new(MockTransport::new());
    transport.on("/sensor/", |_, _| Err(ParqError::offline("connection refused")));

    let client = client_with(transport.clone(), session);

    let err = get_sensor(&client).await.unwrap_err();
    assert!(err.is_network_error());
    assert!(err.connection_hint().is_some());

    // Exactly max_attempts transport calls, with strictly increasing gaps
    let instants = transport.instants_matching("/sensor/");
    assert_eq!(instants.len(), 3);
    let first_gap = instants[1] - instants[0];
    let second_gap = instants[2] - instants[1];
    assert!(first_gap >= Duration::from_millis(30));
    assert!(second_gap > first_gap);
}

#[tokio::test]
async fn rotated_refresh_token_is_adopted_and_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let session = stored_session_with_pair(dir.path(), 900, 86_400);
    let old_access = session.access_token().unwrap();
    let new_access = token_expiring_in(900);
    let rotated_refresh = token_expiring_in(172_800);

    let transport = Arc::new(MockTransport::new());
    {
        let old = old_access.clone();
        transport.on("/sensor/", move |req, _| {
            if req.bearer.as_deref() == Some(old.as_str()) {
                respond(401, "")
            } else {
                respond(200, "[]")
            }
        });
    }
    {
        let (new, rotated) = (new_access.clone(), rotated_refresh.clone());
        transport.on("/auth/refresh/", move |_, _| {
            ok_json(json!({ "access": new, "refresh": rotated }))
        });
    }

    let client = client_with(transport, session.clone());
    get_sensor(&client).await.unwrap();

    assert_eq!(session.refresh_token().unwrap(), rotated_refresh);
    let stored = session.load_stored().unwrap();
    assert_eq!(stored.access_token, new_access);
    assert_eq!(stored.refresh_token, rotated_refresh);
}

#[tokio::test]
async fn scheduled_refresh_fires_before_expiry() {
    // Access token expires in 3s; with a 2s lead the refresh fires at ~1s
    let session = session_with_pair(3, 86_400);
    let access = session.access_token().unwrap();
    let new_access = token_expiring_in(900);

    let transport = Arc::new(MockTransport::new());
    {
        let new = new_access.clone();
        transport.on("/auth/refresh/", move |_, _| ok_json(json!({ "access": new })));
    }

    let client = client_with(transport.clone(), session.clone());
    let armed_at = Instant::now();
    client.schedule_refresh(&access);

    tokio::time::sleep(Duration::from_millis(2000)).await;

    let instants = transport.instants_matching("/auth/refresh/");
    assert_eq!(instants.len(), 1);
    let fired_after = instants[0] - armed_at;
    assert!(
        fired_after >= Duration::from_millis(700) && fired_after <= Duration::from_millis(1800),
        "refresh fired after {:?}",
        fired_after
    );

    // The token was renewed in the background, before expiry
    assert_eq!(session.access_token().unwrap(), new_access);
}

#[tokio::test]
async fn login_roundtrip_persists_tokens_and_logout_clears_them() {
    let dir = tempfile::tempdir().unwrap();
    let store = TokenStore::new(dir.path().join("session.json")).unwrap();
    let session = Arc::new(Session::new(Some(store), None));

    let access = token_expiring_in(900);
    let refresh = token_expiring_in(86_400);

    let transport = Arc::new(MockTransport::new());
    {
        let (a, r) = (access.clone(), refresh.clone());
        transport.on("/auth/login/", move |_, _| {
            ok_json(json!({ "access": a, "refresh": r }))
        });
    }
    transport.on("/auth/me/", |req, _| {
        assert!(req.bearer.is_some());
        ok_json(json!({ "id": 7, "username": "ayan", "email": "ayan@parq.kz" }))
    });
    transport.on("/auth/logout/", |_, _| ok_json(json!({})));

    let client = client_with(transport.clone(), session.clone());
    let service = AuthService::new(client);

    let user = service.login("ayan".into(), "hunter2".into()).await.unwrap();
    assert_eq!(user.username, "ayan");

    // Stored tokens decode to the claims that were issued
    let stored = session.load_stored().unwrap();
    assert_eq!(stored.access_token, access);
    assert_eq!(stored.refresh_token, refresh);
    assert_eq!(
        stored.access_expires_at,
        jwt::expires_at(&access).unwrap()
    );

    service.logout().await.unwrap();
    assert!(!session.is_authenticated());
    assert!(session.user().is_none());
    assert!(session.load_stored().is_none());
    assert!(!dir.path().join("session.json").exists());
}

#[tokio::test]
async fn bootstrap_refreshes_expired_access_before_user_lookup() {
    let dir = tempfile::tempdir().unwrap();
    // Persist a pair whose access token is already stale
    drop(stored_session_with_pair(dir.path(), -10, 86_400));

    let new_access = token_expiring_in(900);
    let transport = Arc::new(MockTransport::new());
    {
        let new = new_access.clone();
        transport.on("/auth/refresh/", move |_, _| ok_json(json!({ "access": new })));
    }
    {
        let new = new_access.clone();
        transport.on("/auth/me/", move |req, _| {
            assert_eq!(req.bearer.as_deref(), Some(new.as_str()));
            ok_json(json!({ "id": 7, "username": "ayan", "email": "ayan@parq.kz" }))
        });
    }

    let store = TokenStore::new(dir.path().join("session.json")).unwrap();
    let session = Arc::new(Session::new(Some(store), None));
    let client = client_with(transport.clone(), session.clone());

    assert_eq!(session.state(), AuthState::Unknown);
    let state = client.initialize().await;

    assert_eq!(state, AuthState::Authenticated);
    assert!(session.is_ready());
    assert_eq!(session.user().unwrap().username, "ayan");
    assert_eq!(session.access_token().unwrap(), new_access);
    assert_eq!(transport.count_matching("/auth/refresh/"), 1);
}

#[tokio::test]
async fn bootstrap_failure_clears_credentials() {
    let dir = tempfile::tempdir().unwrap();
    drop(stored_session_with_pair(dir.path(), 900, 86_400));

    let transport = Arc::new(MockTransport::new());
    transport.on("/auth/me/", |_, _| respond(500, r#"{"detail":"boom"}"#));

    let store = TokenStore::new(dir.path().join("session.json")).unwrap();
    let session = Arc::new(Session::new(Some(store), None));
    let client = client_with(transport, session.clone());

    let state = client.initialize().await;

    assert_eq!(state, AuthState::Anonymous);
    assert!(session.is_ready());
    assert!(!session.is_authenticated());
    assert!(session.load_stored().is_none());
}

#[tokio::test]
async fn bootstrap_with_no_stored_record_is_anonymous_without_network() {
    let transport = Arc::new(MockTransport::new());
    let session = Arc::new(Session::new(None, None));
    let client = client_with(transport.clone(), session.clone());

    let state = client.initialize().await;

    assert_eq!(state, AuthState::Anonymous);
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn business_errors_pass_through_with_server_detail() {
    let session = session_with_pair(900, 86_400);
    let transport = Arc::new(MockTransport::new());
    transport.on("/parking/reservations/", |_, _| {
        respond(400, r#"{"detail":"End time must be after start time"}"#)
    });

    let client = client_with(transport.clone(), session);
    let err = client
        .request::<serde_json::Value, serde_json::Value>(
            Method::POST,
            "/parking/reservations/",
            Some(&json!({"parking_spot":"A-01"})),
        )
        .await
        .unwrap_err();

    match err {
        ParqError::Api { status, message, .. } => {
            assert_eq!(status, 400);
            assert_eq!(message, "End time must be after start time");
        }
        other => panic!("expected API error, got {}", other),
    }
    // 4xx business errors are never retried
    assert_eq!(transport.count_matching("/parking/reservations/"), 1);
}
