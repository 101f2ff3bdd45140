//! Durable credential storage
//!
//! The CLI analog of the browser's token cookies: a JSON record under the
//! user data dir holding the token pair with expiries matching the embedded
//! claims, plus the short-lived redirect-loop counter kept in a sidecar
//! file next to it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ParqError, Result};

/// Stored session record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredSession {
    /// Max-age semantics: the record is only usable while the refresh token
    /// is still alive
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.refresh_expires_at > now
    }
}

/// Token storage manager
#[derive(Debug)]
pub struct TokenStore {
    path: PathBuf,
    session: Option<StoredSession>,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let mut store = Self {
            path: path.into(),
            session: None,
        };
        store.load()?;
        Ok(store)
    }

    /// Current record, dropping any whose refresh token has expired
    pub fn get(&self) -> Option<StoredSession> {
        self.session
            .clone()
            .filter(|s| s.is_usable(Utc::now()))
    }

    pub fn has_session(&self) -> bool {
        self.get().is_some()
    }

    pub fn put(&mut self, session: StoredSession) -> Result<()> {
        self.session = Some(session);
        self.save()
    }

    pub fn remove(&mut self) -> Result<()> {
        self.session = None;
        if self.path.exists() {
            fs::remove_file(&self.path)
                .map_err(|e| ParqError::store_write(format!("Failed to remove session: {}", e)))?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&mut self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| ParqError::store_read(format!("Failed to read session: {}", e)))?;

        if content.trim().is_empty() {
            return Ok(());
        }

        self.session = serde_json::from_str(&content)
            .map_err(|e| ParqError::store_read(format!("Failed to parse session: {}", e)))?;

        Ok(())
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ParqError::store_write(format!("Failed to create storage directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(&self.session)
            .map_err(|e| ParqError::store_write(format!("Failed to serialize session: {}", e)))?;

        fs::write(&self.path, content)
            .map_err(|e| ParqError::store_write(format!("Failed to write session: {}", e)))?;

        Ok(())
    }
}

/// Rolling redirect-loop counter
///
/// Counts auth-triggered redirects inside a short window. Once the maximum
/// is reached the next request is let through and the counter resets, which
/// breaks login bounce loops caused by transiently failing token validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectWindow {
    events: Vec<DateTime<Utc>>,
    window_secs: i64,
    max_redirects: usize,
}

impl Default for RedirectWindow {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            window_secs: 60,
            max_redirects: 3,
        }
    }
}

impl RedirectWindow {
    pub fn new(window_secs: i64, max_redirects: usize) -> Self {
        Self {
            events: Vec::new(),
            window_secs,
            max_redirects,
        }
    }

    /// Decide whether the caller should be redirected to login now
    ///
    /// Returns `true` (and records the event) while the window has capacity;
    /// returns `false` and resets once the maximum has been reached.
    pub fn should_redirect(&mut self, now: DateTime<Utc>) -> bool {
        let cutoff = now - Duration::seconds(self.window_secs);
        self.events.retain(|&t| t > cutoff);

        if self.events.len() >= self.max_redirects {
            self.events.clear();
            return false;
        }

        self.events.push(now);
        true
    }

    pub fn reset(&mut self) {
        self.events.clear();
    }
}

/// Persistence wrapper for the redirect counter (the analog of the
/// short-lived counter cookie)
#[derive(Debug)]
pub struct RedirectStore {
    path: PathBuf,
}

impl RedirectStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> RedirectWindow {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, window: &RedirectWindow) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ParqError::store_write(format!("Failed to create storage directory: {}", e))
            })?;
        }
        let content = serde_json::to_string(window)
            .map_err(|e| ParqError::store_write(format!("Failed to serialize counter: {}", e)))?;
        fs::write(&self.path, content)
            .map_err(|e| ParqError::store_write(format!("Failed to write counter: {}", e)))?;
        Ok(())
    }
}
