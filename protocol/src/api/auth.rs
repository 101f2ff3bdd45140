//! Authentication API DTOs
//!
//! Data transfer objects for the auth endpoints: login, registration,
//! token refresh, logout and profile management.

use serde::{Deserialize, Serialize};
use validator::Validate;

pub use crate::common::{Claims, TokenPair, User};

// ============================================================================
// Login / registration DTOs
// ============================================================================

/// Credentials login request for POST /api/auth/login/
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 150))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Login response: a full token pair
pub type LoginResponse = TokenPair;

/// Account registration request for POST /api/auth/register/
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 150))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(max = 16))]
    pub car_number: String,
    #[validate(length(max = 64))]
    pub car_model: String,
}

// ============================================================================
// Token refresh / logout DTOs
// ============================================================================

/// Refresh access token request for POST /api/auth/refresh/
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 10))]
    pub refresh: String,
}

/// Refresh response
///
/// The backend always returns a new access token and may rotate the refresh
/// token alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Logout request for POST /api/auth/logout/ (refresh-token blacklisting)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutRequest {
    pub refresh: String,
}

// ============================================================================
// Profile DTOs
// ============================================================================

/// Profile update fields for PATCH /api/auth/profile/update/
///
/// Sent as a multipart form; the optional avatar file travels as a separate
/// part next to these text fields.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 150))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 16))]
    pub car_number: String,
    #[validate(length(max = 64))]
    pub car_model: String,
}
