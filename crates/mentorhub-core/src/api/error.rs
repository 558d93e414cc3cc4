use serde::Deserialize;
use thiserror::Error;

/// Error code the backend puts in a 401 body when the access token expired.
pub const TOKEN_EXPIRED_CODE: &str = "token.expired";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - session is no longer valid")]
    Unauthorized,

    /// Raised instead of tearing down the session when no navigation is
    /// possible (server-rendering context). Callers should redirect to sign-in.
    #[error("Authentication token error - sign in again")]
    AuthToken,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Credential storage error: {0}")]
    Storage(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error payload shape used by the backend: `{ message?, code? }`.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl ErrorBody {
    /// Parse a response body, tolerating empty or non-JSON bodies.
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    pub fn is_token_expired(&self) -> bool {
        self.code.as_deref() == Some(TOKEN_EXPIRED_CODE)
    }
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Map a non-success status to an error. Prefers the backend's `message`
    /// field over the raw body when one is present.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let detail = ErrorBody::parse(body)
            .message
            .unwrap_or_else(|| Self::truncate_body(body));
        match status.as_u16() {
            400 | 422 => ApiError::Validation(detail),
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(detail),
            404 => ApiError::NotFound(detail),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(detail),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, detail)),
        }
    }

    /// True for failures that mean the session cannot be used any more.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized | ApiError::AuthToken | ApiError::RefreshFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_error_body_detects_expired_token() {
        let body = ErrorBody::parse(r#"{"code":"token.expired","message":"Token expired."}"#);
        assert!(body.is_token_expired());

        let body = ErrorBody::parse(r#"{"message":"Session revoked."}"#);
        assert!(!body.is_token_expired());

        // Non-JSON bodies are not an error, just empty
        let body = ErrorBody::parse("<html>bad gateway</html>");
        assert!(body.code.is_none());
        assert!(body.message.is_none());
    }

    #[test]
    fn test_from_status_prefers_message() {
        let err = ApiError::from_status(StatusCode::BAD_REQUEST, r#"{"message":"Validation error."}"#);
        assert!(matches!(err, ApiError::Validation(ref m) if m == "Validation error."));

        let err = ApiError::from_status(StatusCode::NOT_FOUND, "missing");
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "missing"));

        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, ""),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, ""),
            ApiError::ServerError(_)
        ));
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.contains("truncated"));

        assert_eq!(ApiError::truncate_body("short"), "short");
    }

    #[test]
    fn test_auth_failure_classification() {
        assert!(ApiError::Unauthorized.is_auth_failure());
        assert!(ApiError::AuthToken.is_auth_failure());
        assert!(ApiError::RefreshFailed("x".into()).is_auth_failure());
        assert!(!ApiError::RateLimited.is_auth_failure());
    }
}
