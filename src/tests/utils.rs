//! Test fixtures: tokens, configs, sessions and clients

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parq_protocol::Claims;

use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::jwt;
use crate::session::Session;
use crate::store::TokenStore;
use crate::tests::mocks::MockTransport;

/// An unsigned JWT expiring the given number of seconds from now
///
/// Each call embeds a distinct `iat` nonce so two tokens minted in the same
/// wall-clock second are still byte-distinct, the way a real issuer's tokens
/// always differ. `exp` is left exactly at `now + secs` so expiry-driven
/// timing is unchanged.
pub fn token_expiring_in(secs: i64) -> String {
    static NONCE: AtomicI64 = AtomicI64::new(0);
    let now = Utc::now().timestamp();
    let nonce = NONCE.fetch_add(1, Ordering::Relaxed);
    jwt::encode_unsigned(&Claims {
        sub: Some("7".into()),
        exp: now + secs,
        iat: Some(now - nonce),
    })
}

/// Client config pointed at the mock transport, with fast retries
pub fn test_config() -> ClientConfig {
    ClientConfig {
        base_url: "http://mock.parq.test/api".to_string(),
        timeout: 5,
        max_attempts: 3,
        backoff_base_ms: 30,
        refresh_lead_secs: 2,
        ..Default::default()
    }
}

/// A session holding a valid pair (no persistence)
pub fn session_with_pair(access_secs: i64, refresh_secs: i64) -> Arc<Session> {
    let session = Session::new(None, None);
    session
        .install_pair(token_expiring_in(access_secs), token_expiring_in(refresh_secs))
        .expect("test tokens decode");
    Arc::new(session)
}

/// A session backed by a token store under the given directory
pub fn stored_session_with_pair(
    dir: &std::path::Path,
    access_secs: i64,
    refresh_secs: i64,
) -> Arc<Session> {
    let store = TokenStore::new(dir.join("session.json")).unwrap();
    let session = Session::new(Some(store), None);
    session
        .install_pair(token_expiring_in(access_secs), token_expiring_in(refresh_secs))
        .expect("test tokens decode");
    Arc::new(session)
}

/// An API client wired to the mock transport
pub fn client_with(transport: Arc<MockTransport>, session: Arc<Session>) -> ApiClient {
    ApiClient::with_transport(test_config(), transport, session)
}
