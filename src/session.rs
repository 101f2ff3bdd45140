//! Session state for the authenticated client
//!
//! Owns the token pair, the cached user projection and the readiness flag,
//! plus the synchronization primitives behind the single-flight refresh.
//! All locks here are released before any await point; the async refresh
//! gate is the only lock held across network calls, which is exactly what
//! makes concurrent 401 observers queue on one refresh.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use parq_protocol::User;

use crate::error::Result;
use crate::jwt;
use crate::store::{RedirectStore, RedirectWindow, StoredSession, TokenStore};

/// Readiness of the session after startup
///
/// `Unknown` means bootstrap has not finished yet; consumers should not
/// treat it as unauthenticated (that is what causes premature login
/// redirects during startup).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unknown,
    Anonymous,
    Authenticated,
}

/// In-memory token pair with decoded expiries
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access: String,
    pub refresh: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Outcome bookkeeping for the single-flight refresh
///
/// `epoch` counts completed refresh cycles. A caller that queued behind an
/// in-progress refresh compares its entry epoch against the current one and
/// adopts the recorded outcome instead of issuing another refresh call.
#[derive(Debug, Default)]
pub(crate) struct RefreshCell {
    pub epoch: u64,
    pub outcome: Option<Result<String>>,
}

/// Shared mutable session state
#[derive(Debug)]
pub struct Session {
    tokens: RwLock<Option<TokenSet>>,
    user: RwLock<Option<User>>,
    state: RwLock<AuthState>,
    store: Option<Mutex<TokenStore>>,
    redirect_store: Option<RedirectStore>,
    redirect_window: Mutex<RedirectWindow>,
    pub(crate) refresh_gate: tokio::sync::Mutex<()>,
    pub(crate) refresh_cell: Mutex<RefreshCell>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
    redirecting: AtomicBool,
}

impl Session {
    pub fn new(store: Option<TokenStore>, redirect_store: Option<RedirectStore>) -> Self {
        let redirect_window = redirect_store
            .as_ref()
            .map(|s| s.load())
            .unwrap_or_default();

        Self {
            tokens: RwLock::new(None),
            user: RwLock::new(None),
            state: RwLock::new(AuthState::Unknown),
            store: store.map(Mutex::new),
            redirect_store,
            redirect_window: Mutex::new(redirect_window),
            refresh_gate: tokio::sync::Mutex::new(()),
            refresh_cell: Mutex::new(RefreshCell::default()),
            refresh_task: Mutex::new(None),
            redirecting: AtomicBool::new(false),
        }
    }

    // --- Accessors ---

    pub fn access_token(&self) -> Option<String> {
        self.tokens.read().unwrap().as_ref().map(|t| t.access.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.tokens.read().unwrap().as_ref().map(|t| t.refresh.clone())
    }

    pub fn token_set(&self) -> Option<TokenSet> {
        self.tokens.read().unwrap().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.user.read().unwrap().clone()
    }

    pub fn set_user(&self, user: Option<User>) {
        *self.user.write().unwrap() = user;
    }

    pub fn state(&self) -> AuthState {
        *self.state.read().unwrap()
    }

    pub fn set_state(&self, state: AuthState) {
        *self.state.write().unwrap() = state;
    }

    pub fn is_ready(&self) -> bool {
        self.state() != AuthState::Unknown
    }

    /// A session is authenticated only while it holds the full pair
    pub fn is_authenticated(&self) -> bool {
        let tokens = self.tokens.read().unwrap();
        tokens
            .as_ref()
            .map(|t| !t.access.is_empty() && !t.refresh.is_empty())
            .unwrap_or(false)
    }

    // --- Token lifecycle ---

    /// Install a freshly issued pair (login/registration) and persist it
    pub fn install_pair(&self, access: String, refresh: String) -> Result<()> {
        let set = TokenSet {
            access_expires_at: jwt::expires_at(&access)?,
            refresh_expires_at: jwt::expires_at(&refresh)?,
            access,
            refresh,
        };
        *self.tokens.write().unwrap() = Some(set);
        self.redirecting.store(false, Ordering::SeqCst);
        self.set_state(AuthState::Authenticated);
        self.persist(true)
    }

    /// Adopt a stored record into memory without re-persisting it
    pub fn adopt_stored(&self, stored: &StoredSession) {
        *self.tokens.write().unwrap() = Some(TokenSet {
            access: stored.access_token.clone(),
            refresh: stored.refresh_token.clone(),
            access_expires_at: stored.access_expires_at,
            refresh_expires_at: stored.refresh_expires_at,
        });
    }

    /// Apply a refresh result: new access token, optionally a rotated
    /// refresh token
    pub fn renew(&self, access: String, rotated_refresh: Option<String>) -> Result<()> {
        let access_expires_at = jwt::expires_at(&access)?;
        {
            let mut tokens = self.tokens.write().unwrap();
            match tokens.as_mut() {
                Some(set) => {
                    set.access = access;
                    set.access_expires_at = access_expires_at;
                    if let Some(refresh) = rotated_refresh {
                        set.refresh_expires_at =
                            jwt::expires_at(&refresh).unwrap_or(set.refresh_expires_at);
                        set.refresh = refresh;
                    }
                }
                None => {
                    return Err(crate::error::ParqError::session_not_found(
                        "Refresh completed with no session to renew",
                    ))
                }
            }
        }
        self.persist(false)
    }

    /// Drop all credentials and cached user state, in memory and on disk
    pub fn clear(&self) {
        *self.tokens.write().unwrap() = None;
        self.set_user(None);
        self.set_state(AuthState::Anonymous);
        self.cancel_scheduled_refresh();
        if let Some(store) = &self.store {
            let _ = store.lock().unwrap().remove();
        }
    }

    /// Load the stored record, if one exists and is still usable
    pub fn load_stored(&self) -> Option<StoredSession> {
        self.store.as_ref().and_then(|s| s.lock().unwrap().get())
    }

    /// Whether a stored access-token record exists (the route guard's
    /// cookie-presence check; validity is deliberately not examined)
    pub fn has_stored_access(&self) -> bool {
        self.load_stored().is_some()
    }

    fn persist(&self, fresh: bool) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let Some(set) = self.token_set() else {
            return Ok(());
        };

        let now = Utc::now();
        let mut store = store.lock().unwrap();
        let created_at = if fresh {
            now
        } else {
            store.get().map(|s| s.created_at).unwrap_or(now)
        };
        store.put(StoredSession {
            access_token: set.access,
            refresh_token: set.refresh,
            access_expires_at: set.access_expires_at,
            refresh_expires_at: set.refresh_expires_at,
            created_at,
            updated_at: now,
        })
    }

    // --- Scheduled refresh task ---

    /// Replace the background refresh task, aborting any previous one
    ///
    /// The renewal path replaces the handle from within the old task; the
    /// abort only lands at an await point, so the caller must not await
    /// between this call and task exit.
    pub fn set_refresh_task(&self, handle: JoinHandle<()>) {
        let mut slot = self.refresh_task.lock().unwrap();
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        *slot = Some(handle);
    }

    pub fn cancel_scheduled_refresh(&self) {
        if let Some(handle) = self.refresh_task.lock().unwrap().take() {
            handle.abort();
        }
    }

    // --- Redirect dispatch ---

    /// Claim the right to dispatch the login redirect
    ///
    /// Only the first of a burst of failing requests wins; the flag is
    /// rearmed when a new pair is installed.
    pub fn begin_redirect(&self) -> bool {
        !self.redirecting.swap(true, Ordering::SeqCst)
    }

    /// Consult the rolling redirect-loop counter
    pub fn should_redirect_to_login(&self) -> bool {
        let mut window = self.redirect_window.lock().unwrap();
        let decision = window.should_redirect(Utc::now());
        if let Some(store) = &self.redirect_store {
            let _ = store.save(&window);
        }
        decision
    }

    pub fn reset_redirect_window(&self) {
        let mut window = self.redirect_window.lock().unwrap();
        window.reset();
        if let Some(store) = &self.redirect_store {
            let _ = store.save(&window);
        }
    }

    /// Snapshot the current refresh epoch (see `RefreshCell`)
    pub(crate) fn refresh_epoch(&self) -> u64 {
        self.refresh_cell.lock().unwrap().epoch
    }

    /// Record a completed refresh cycle's outcome
    pub(crate) fn complete_refresh(&self, outcome: Result<String>) {
        let mut cell = self.refresh_cell.lock().unwrap();
        cell.epoch += 1;
        cell.outcome = Some(outcome);
    }

    /// Outcome of the cycle that completed after the given epoch, if any
    pub(crate) fn adopted_outcome(&self, entry_epoch: u64) -> Option<Result<String>> {
        let cell = self.refresh_cell.lock().unwrap();
        if cell.epoch > entry_epoch {
            cell.outcome.clone()
        } else {
            None
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(handle) = self.refresh_task.lock().unwrap().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parq_protocol::Claims;

    fn token(exp_offset_secs: i64) -> String {
        let exp = Utc::now().timestamp() + exp_offset_secs;
        crate::jwt::encode_unsigned(&Claims {
            sub: Some("1".into()),
            exp,
            iat: Some(exp - 900),
        })
    }

    #[test]
    fn install_pair_makes_session_authenticated() {
        let session = Session::new(None, None);
        assert!(!session.is_authenticated());

        session
            .install_pair(token(900), token(86_400))
            .unwrap();

        assert!(session.is_authenticated());
        assert_eq!(session.state(), AuthState::Authenticated);
    }

    #[test]
    fn clear_drops_everything() {
        let session = Session::new(None, None);
        session.install_pair(token(900), token(86_400)).unwrap();
        session.set_user(Some(User {
            id: 1,
            username: "ayan".into(),
            email: "a@b.kz".into(),
            car_number: None,
            car_model: None,
            avatar_url: None,
        }));

        session.clear();

        assert!(!session.is_authenticated());
        assert!(session.user().is_none());
        assert!(session.access_token().is_none());
        assert_eq!(session.state(), AuthState::Anonymous);
    }

    #[test]
    fn renew_replaces_access_and_optionally_refresh() {
        let session = Session::new(None, None);
        session.install_pair(token(900), token(86_400)).unwrap();
        let old_refresh = session.refresh_token().unwrap();

        let new_access = token(1800);
        session.renew(new_access.clone(), None).unwrap();
        assert_eq!(session.access_token().unwrap(), new_access);
        assert_eq!(session.refresh_token().unwrap(), old_refresh);

        let rotated = token(172_800);
        session.renew(token(1800), Some(rotated.clone())).unwrap();
        assert_eq!(session.refresh_token().unwrap(), rotated);
    }

    #[test]
    fn redirect_claim_is_single_shot_until_reinstall() {
        let session = Session::new(None, None);
        assert!(session.begin_redirect());
        assert!(!session.begin_redirect());

        session.install_pair(token(900), token(86_400)).unwrap();
        assert!(session.begin_redirect());
    }

    #[test]
    fn refresh_epoch_adoption() {
        let session = Session::new(None, None);
        let entry = session.refresh_epoch();
        assert!(session.adopted_outcome(entry).is_none());

        session.complete_refresh(Ok("tok".into()));
        match session.adopted_outcome(entry) {
            Some(Ok(tok)) => assert_eq!(tok, "tok"),
            other => panic!("expected adopted token, got {:?}", other.map(|r| r.is_ok())),
        }

        // A caller entering after completion starts a fresh cycle
        let late_entry = session.refresh_epoch();
        assert!(session.adopted_outcome(late_entry).is_none());
    }
}
