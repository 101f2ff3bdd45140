//! Account operations for the parq SDK
//!
//! Login, registration, logout and profile management on top of the
//! authenticated client. Token handling is fully owned by `ApiClient`;
//! this service only orchestrates the account endpoints around it.

use reqwest::Method;
use std::path::Path;
use validator::Validate;

use parq_protocol::{
    LoginRequest, LogoutRequest, ProfileUpdate, RegisterRequest, TokenPair, User,
};

use crate::client::{ApiClient, FilePart, MultipartBody};
use crate::error::{ParqError, Result};
use crate::session::AuthState;

const LOGIN_ENDPOINT: &str = "/auth/login/";
const REGISTER_ENDPOINT: &str = "/auth/register/";
const LOGOUT_ENDPOINT: &str = "/auth/logout/";
const ME_ENDPOINT: &str = "/auth/me/";
const PROFILE_UPDATE_ENDPOINT: &str = "/auth/profile/update/";

/// Aggregated state for the `status` command
#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub version: String,
    pub authenticated: bool,
    pub username: Option<String>,
    pub email: Option<String>,
    pub server_connected: bool,
    pub server_status_msg: String,
}

/// Authentication service
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Sign in with credentials, establish the session and load the user
    pub async fn login(&self, username: String, password: String) -> Result<User> {
        let request = LoginRequest { username, password };
        request.validate()?;

        let pair: TokenPair = self
            .client
            .base()
            .request(Method::POST, LOGIN_ENDPOINT, Some(&request))
            .await
            .map_err(|e| match e {
                ParqError::Api { status: 400 | 401, .. } => {
                    ParqError::authentication("Invalid credentials")
                }
                other => other,
            })?;

        let session = self.client.session();
        session.install_pair(pair.access.clone(), pair.refresh)?;
        self.client.schedule_refresh(&pair.access);

        let user: User = self.client.request(Method::GET, ME_ENDPOINT, None::<&()>).await?;
        session.set_user(Some(user.clone()));
        session.set_state(AuthState::Authenticated);
        session.reset_redirect_window();

        Ok(user)
    }

    /// Create an account, then sign in with the same credentials
    pub async fn register(&self, request: RegisterRequest) -> Result<User> {
        request.validate()?;

        let _: serde_json::Value = self
            .client
            .base()
            .request(Method::POST, REGISTER_ENDPOINT, Some(&request))
            .await?;

        self.login(request.username, request.password).await
    }

    /// Sign out: blacklist the refresh token server-side (best effort),
    /// then drop every stored credential
    pub async fn logout(&self) -> Result<()> {
        let session = self.client.session();

        if let Some(refresh) = session.refresh_token() {
            let request = LogoutRequest { refresh };
            let result: Result<serde_json::Value> = self
                .client
                .request(Method::POST, LOGOUT_ENDPOINT, Some(&request))
                .await;
            if let Err(e) = result {
                tracing::debug!(error = %e, "server-side logout failed; clearing locally");
            }
        }

        session.clear();
        session.reset_redirect_window();
        Ok(())
    }

    /// Fetch the current user and refresh the cached projection
    pub async fn me(&self) -> Result<User> {
        let user: User = self.client.request(Method::GET, ME_ENDPOINT, None::<&()>).await?;
        self.client.session().set_user(Some(user.clone()));
        Ok(user)
    }

    /// Update the profile; the optional avatar travels as a multipart file
    pub async fn update_profile(
        &self,
        update: ProfileUpdate,
        avatar: Option<&Path>,
    ) -> Result<User> {
        update.validate()?;

        let file = match avatar {
            Some(path) => Some(read_avatar(path).await?),
            None => None,
        };

        let body = MultipartBody {
            fields: vec![
                ("username".to_string(), update.username),
                ("email".to_string(), update.email),
                ("car_number".to_string(), update.car_number),
                ("car_model".to_string(), update.car_model),
            ],
            file,
        };

        let user: User = self
            .client
            .request_multipart(Method::PATCH, PROFILE_UPDATE_ENDPOINT, body)
            .await?;

        self.client.session().set_user(Some(user.clone()));
        Ok(user)
    }

    /// Gather the status card: session state plus server reachability
    pub async fn status(&self) -> StatusInfo {
        let state = self.client.initialize().await;
        let user = self.client.session().user();

        let (server_connected, server_status_msg) = match self.probe_server().await {
            Ok(()) => (true, String::new()),
            Err(e) => (false, e.connection_hint().unwrap_or("unreachable").to_string()),
        };

        StatusInfo {
            version: crate::version::CURRENT_VERSION.to_string(),
            authenticated: state == AuthState::Authenticated,
            username: user.as_ref().map(|u| u.username.clone()),
            email: user.as_ref().map(|u| u.email.clone()),
            server_connected,
            server_status_msg,
        }
    }

    /// Any HTTP response counts as reachable, whatever the status
    async fn probe_server(&self) -> Result<()> {
        use crate::client::{ApiRequest, RequestBody};

        let request = ApiRequest {
            method: Method::GET,
            url: self.client.config().endpoint_url("/subscriptions/plans/"),
            bearer: None,
            body: RequestBody::Empty,
        };
        self.client.base().send_with_retry(request, false).await?;
        Ok(())
    }
}

async fn read_avatar(path: &Path) -> Result<FilePart> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ParqError::io("Avatar read", format!("{}: {}", path.display(), e)))?;

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("avatar")
        .to_string();

    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    };

    Ok(FilePart {
        name: "avatar".to_string(),
        filename,
        mime: mime.to_string(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_avatar_classifies_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("me.png");
        tokio::fs::write(&path, b"not-really-a-png").await.unwrap();

        let part = read_avatar(&path).await.unwrap();
        assert_eq!(part.name, "avatar");
        assert_eq!(part.filename, "me.png");
        assert_eq!(part.mime, "image/png");
        assert_eq!(part.bytes, b"not-really-a-png");
    }

    #[tokio::test]
    async fn read_avatar_missing_file_errors() {
        assert!(read_avatar(Path::new("/nonexistent/avatar.jpg")).await.is_err());
    }
}
