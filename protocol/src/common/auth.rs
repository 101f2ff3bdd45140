//! Authentication-related common types

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Claims embedded in the backend's JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID as string)
    #[serde(default)]
    pub sub: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    #[serde(default)]
    pub iat: Option<i64>,
}

impl Claims {
    /// Expiry as a UTC instant
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_else(|| DateTime::<Utc>::MIN_UTC)
    }
}

/// Access/refresh token pair as issued by login and registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Current-user projection returned by the whoami endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub car_number: Option<String>,
    #[serde(default)]
    pub car_model: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_expiry_roundtrip() {
        let claims = Claims {
            sub: Some("17".into()),
            exp: 1_700_000_000,
            iat: Some(1_699_999_100),
        };
        assert_eq!(claims.expires_at().timestamp(), 1_700_000_000);
    }

    #[test]
    fn user_optional_profile_fields() {
        let user: User =
            serde_json::from_str(r#"{"id":1,"username":"ayan","email":"a@b.kz"}"#).unwrap();
        assert!(user.car_number.is_none());
        assert!(user.avatar_url.is_none());
    }
}
