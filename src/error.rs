//! Unified error handling for the parq CLI and SDK
//!
//! This module provides a single error system with:
//! - Unique error codes for debugging and documentation
//! - Structured error information with context
//! - Convenient constructor methods
//! - Automatic conversions from common error types

use std::fmt;
use thiserror::Error;

/// Unified Result type for all parq operations
pub type Result<T> = std::result::Result<T, ParqError>;

/// Error codes for parq operations
///
/// Each error has a unique code in the format `PXXX` where:
/// - P1XX: Authentication and session errors
/// - P2XX: Network and API errors
/// - P3XX: Storage and I/O errors
/// - P4XX: Configuration errors
/// - P5XX: Validation and input errors
/// - P9XX: Internal errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Authentication (P1XX)
    /// P101: Authentication failed
    AuthenticationFailed,
    /// P102: Token expired
    TokenExpired,
    /// P103: Refresh token rejected
    RefreshRejected,
    /// P104: Session not established
    SessionNotFound,

    // Network (P2XX)
    /// P201: HTTP request failed
    HttpError,
    /// P202: Connection timeout
    ConnectionTimeout,
    /// P203: Connection refused / host unreachable
    Offline,
    /// P204: API returned error response
    ApiError,
    /// P205: Invalid API response format
    InvalidResponse,

    // Storage/IO (P3XX)
    /// P301: Token store read error
    StoreReadError,
    /// P302: Token store write error
    StoreWriteError,
    /// P303: File error
    FileError,

    // Configuration (P4XX)
    /// P401: Configuration error
    ConfigError,
    /// P402: Invalid endpoint URL
    InvalidEndpoint,

    // Validation (P5XX)
    /// P501: Invalid input
    InvalidInput,
    /// P502: Validation failed
    ValidationFailed,

    // Internal (P9XX)
    /// P901: Internal error
    InternalError,
    /// P902: Serialization error
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code
    pub fn code(&self) -> u16 {
        match self {
            // Authentication (P1XX)
            ErrorCode::AuthenticationFailed => 101,
            ErrorCode::TokenExpired => 102,
            ErrorCode::RefreshRejected => 103,
            ErrorCode::SessionNotFound => 104,

            // Network (P2XX)
            ErrorCode::HttpError => 201,
            ErrorCode::ConnectionTimeout => 202,
            ErrorCode::Offline => 203,
            ErrorCode::ApiError => 204,
            ErrorCode::InvalidResponse => 205,

            // Storage/IO (P3XX)
            ErrorCode::StoreReadError => 301,
            ErrorCode::StoreWriteError => 302,
            ErrorCode::FileError => 303,

            // Configuration (P4XX)
            ErrorCode::ConfigError => 401,
            ErrorCode::InvalidEndpoint => 402,

            // Validation (P5XX)
            ErrorCode::InvalidInput => 501,
            ErrorCode::ValidationFailed => 502,

            // Internal (P9XX)
            ErrorCode::InternalError => 901,
            ErrorCode::SerializationError => 902,
        }
    }

    /// Get the string code (e.g., "P101")
    pub fn as_str(&self) -> String {
        format!("P{}", self.code())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.code())
    }
}

/// Main error type for all parq operations
#[derive(Error, Debug)]
pub enum ParqError {
    // ==================== Authentication Errors (P1XX) ====================
    /// Authentication failed: no usable credential pair, or the refresh
    /// endpoint rejected the refresh token
    #[error("[{code}] Authentication failed: {message}")]
    Authentication {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ==================== Network Errors (P2XX) ====================
    /// No HTTP response received (offline, DNS, timeout, reset)
    #[error("[{code}] Network error: {message}")]
    Network {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// HTTP error status passed through from the backend
    #[error("[{code}] API error ({status}): {message}")]
    Api {
        code: ErrorCode,
        status: u16,
        message: String,
    },

    // ==================== Storage/IO Errors (P3XX) ====================
    /// Token store or file error
    #[error("[{code}] {context}: {message}")]
    Io {
        code: ErrorCode,
        context: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // ==================== Configuration Errors (P4XX) ====================
    /// Configuration error
    #[error("[{code}] Configuration error: {message}")]
    Config {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<config::ConfigError>,
    },

    // ==================== Validation Errors (P5XX) ====================
    /// Caller-facing validation error
    #[error("[{code}] Validation error: {message}")]
    Validation {
        code: ErrorCode,
        message: String,
        field: Option<String>,
    },

    /// Invalid input error
    #[error("[{code}] Invalid input: {message}")]
    InvalidInput { code: ErrorCode, message: String },

    // ==================== Internal Errors (P9XX) ====================
    /// Internal/unexpected error
    #[error("[{code}] Internal error: {message}")]
    Internal { code: ErrorCode, message: String },

    /// JSON serialization error
    #[error("[{code}] Serialization error: {message}")]
    Serialization {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

// ==================== Constructor Methods ====================

impl ParqError {
    // --- Authentication ---

    /// Create authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            code: ErrorCode::AuthenticationFailed,
            message: message.into(),
            source: None,
        }
    }

    /// Create token expired error
    pub fn token_expired(message: impl Into<String>) -> Self {
        Self::Authentication {
            code: ErrorCode::TokenExpired,
            message: message.into(),
            source: None,
        }
    }

    /// Create refresh-rejected error (refresh endpoint returned 401)
    pub fn refresh_rejected(message: impl Into<String>) -> Self {
        Self::Authentication {
            code: ErrorCode::RefreshRejected,
            message: message.into(),
            source: None,
        }
    }

    /// Create session-not-found error
    pub fn session_not_found(message: impl Into<String>) -> Self {
        Self::Authentication {
            code: ErrorCode::SessionNotFound,
            message: message.into(),
            source: None,
        }
    }

    // --- Network ---

    /// Create network error from message
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            code: ErrorCode::HttpError,
            message: message.into(),
            source: None,
        }
    }

    /// Create offline (connection refused / unreachable) error
    pub fn offline(message: impl Into<String>) -> Self {
        Self::Network {
            code: ErrorCode::Offline,
            message: message.into(),
            source: None,
        }
    }

    /// Create timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Network {
            code: ErrorCode::ConnectionTimeout,
            message: message.into(),
            source: None,
        }
    }

    /// Create network error from reqwest error, classified by cause
    pub fn network_from_reqwest(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            ErrorCode::ConnectionTimeout
        } else if err.is_connect() {
            ErrorCode::Offline
        } else {
            ErrorCode::HttpError
        };

        Self::Network {
            code,
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create API error
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            code: ErrorCode::ApiError,
            status,
            message: message.into(),
        }
    }

    /// Create invalid response error
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::Api {
            code: ErrorCode::InvalidResponse,
            status: 0,
            message: message.into(),
        }
    }

    // --- Storage/IO ---

    /// Create IO error with context
    pub fn io(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Io {
            code: ErrorCode::FileError,
            context: context.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create store read error
    pub fn store_read(message: impl Into<String>) -> Self {
        Self::Io {
            code: ErrorCode::StoreReadError,
            context: "Token store".to_string(),
            message: message.into(),
            source: None,
        }
    }

    /// Create store write error
    pub fn store_write(message: impl Into<String>) -> Self {
        Self::Io {
            code: ErrorCode::StoreWriteError,
            context: "Token store".to_string(),
            message: message.into(),
            source: None,
        }
    }

    // --- Configuration ---

    /// Create configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::ConfigError,
            message: message.into(),
            source: None,
        }
    }

    /// Create invalid endpoint error
    pub fn invalid_endpoint(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::InvalidEndpoint,
            message: message.into(),
            source: None,
        }
    }

    // --- Validation ---

    /// Create validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
            field: None,
        }
    }

    /// Create validation error with field
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            code: ErrorCode::InvalidInput,
            message: message.into(),
        }
    }

    // --- Internal ---

    /// Create internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: ErrorCode::InternalError,
            message: message.into(),
        }
    }

    /// Create serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            code: ErrorCode::SerializationError,
            message: message.into(),
            source: None,
        }
    }

    // --- Utility Methods ---

    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Authentication { code, .. } => *code,
            Self::Network { code, .. } => *code,
            Self::Api { code, .. } => *code,
            Self::Io { code, .. } => *code,
            Self::Config { code, .. } => *code,
            Self::Validation { code, .. } => *code,
            Self::InvalidInput { code, .. } => *code,
            Self::Internal { code, .. } => *code,
            Self::Serialization { code, .. } => *code,
        }
    }

    /// Check if this is an authentication error
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Check if this is a network error (no response received)
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Check if this error is worth retrying
    ///
    /// Network failures are always retryable. API statuses 429 and 5xx are
    /// retryable only in contexts that opt in (the token-refresh call);
    /// business-endpoint callers treat them as terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. }
                | Self::Api { status: 429, .. }
                | Self::Api { status: 500, .. }
                | Self::Api { status: 502, .. }
                | Self::Api { status: 503, .. }
                | Self::Api { status: 504, .. }
        )
    }

    /// User-readable guidance for network failures
    pub fn connection_hint(&self) -> Option<&'static str> {
        match self {
            Self::Network { code, .. } => Some(match code {
                ErrorCode::ConnectionTimeout => "The server took too long to respond. Check your connection and try again.",
                ErrorCode::Offline => "Could not reach the server. Check your internet connection.",
                _ => "A network error occurred. Check your connection and try again.",
            }),
            _ => None,
        }
    }
}

// ==================== From Implementations ====================

impl From<std::io::Error> for ParqError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            code: ErrorCode::FileError,
            context: "IO operation".to_string(),
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for ParqError {
    fn from(err: reqwest::Error) -> Self {
        Self::network_from_reqwest(err)
    }
}

impl From<serde_json::Error> for ParqError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            code: ErrorCode::SerializationError,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<config::ConfigError> for ParqError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config {
            code: ErrorCode::ConfigError,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<dialoguer::Error> for ParqError {
    fn from(err: dialoguer::Error) -> Self {
        Self::Internal {
            code: ErrorCode::InternalError,
            message: format!("Prompt error: {}", err),
        }
    }
}

impl From<validator::ValidationErrors> for ParqError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation {
            code: ErrorCode::ValidationFailed,
            message: err.to_string(),
            field: None,
        }
    }
}

// Manual Clone implementation that drops non-cloneable sources
impl Clone for ParqError {
    fn clone(&self) -> Self {
        match self {
            Self::Authentication { code, message, source: _ } => Self::Authentication {
                code: *code,
                message: message.clone(),
                source: None,
            },
            Self::Network { code, message, source: _ } => Self::Network {
                code: *code,
                message: message.clone(),
                source: None,
            },
            Self::Api { code, status, message } => Self::Api {
                code: *code,
                status: *status,
                message: message.clone(),
            },
            Self::Io { code, context, message, source: _ } => Self::Io {
                code: *code,
                context: context.clone(),
                message: message.clone(),
                source: None,
            },
            Self::Config { code, message, source: _ } => Self::Config {
                code: *code,
                message: message.clone(),
                source: None,
            },
            Self::Validation { code, message, field } => Self::Validation {
                code: *code,
                message: message.clone(),
                field: field.clone(),
            },
            Self::InvalidInput { code, message } => Self::InvalidInput {
                code: *code,
                message: message.clone(),
            },
            Self::Internal { code, message } => Self::Internal {
                code: *code,
                message: message.clone(),
            },
            Self::Serialization { code, message, source: _ } => Self::Serialization {
                code: *code,
                message: message.clone(),
                source: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCode::AuthenticationFailed.code(), 101);
        assert_eq!(ErrorCode::HttpError.code(), 201);
        assert_eq!(ErrorCode::StoreReadError.code(), 301);
        assert_eq!(ErrorCode::ConfigError.code(), 401);
    }

    #[test]
    fn test_error_code_string() {
        assert_eq!(ErrorCode::AuthenticationFailed.as_str(), "P101");
        assert_eq!(ErrorCode::Offline.as_str(), "P203");
    }

    #[test]
    fn test_error_display() {
        let err = ParqError::authentication("Invalid credentials");
        assert!(err.to_string().contains("P101"));
        assert!(err.to_string().contains("Invalid credentials"));
    }

    #[test]
    fn test_error_is_retryable() {
        assert!(ParqError::timeout("slow").is_retryable());
        assert!(ParqError::api(503, "unavailable").is_retryable());
        assert!(ParqError::api(429, "slow down").is_retryable());
        assert!(!ParqError::api(400, "bad times").is_retryable());
        assert!(!ParqError::authentication("nope").is_retryable());
    }

    #[test]
    fn test_connection_hint_classification() {
        assert!(ParqError::timeout("t").connection_hint().unwrap().contains("too long"));
        assert!(ParqError::offline("o").connection_hint().unwrap().contains("internet"));
        assert!(ParqError::api(500, "e").connection_hint().is_none());
    }
}
