pub mod health;
pub mod history;
pub mod login;
pub mod logout;
pub mod otp;
pub mod signup;

// common functions for the handlers
use axum::{
    Json,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{SET_COOKIE, USER_AGENT},
    },
    response::{IntoResponse, Response},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use super::{AppState, session::session_cookie};
use crate::risk::{AuthError, Environment, Identity, device};

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
}

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
            score: None,
        }),
    )
        .into_response()
}

/// Map an attempt failure to its HTTP status. Only a block discloses the score.
pub(crate) fn auth_error_response(err: &AuthError) -> Response {
    let status = match err {
        AuthError::InvalidCredentials | AuthError::IdentityUnknown => StatusCode::UNAUTHORIZED,
        AuthError::RiskBlocked { .. } => StatusCode::FORBIDDEN,
        AuthError::LedgerUnavailable(_) | AuthError::DirectoryUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    let body = match err {
        AuthError::RiskBlocked { score } => ErrorBody {
            error: err.to_string(),
            score: Some(*score),
        },
        // Do not tell callers whether the identity exists.
        AuthError::IdentityUnknown => ErrorBody {
            error: AuthError::InvalidCredentials.to_string(),
            score: None,
        },
        AuthError::LedgerUnavailable(_) | AuthError::DirectoryUnavailable(_) => ErrorBody {
            error: "Service unavailable".to_string(),
            score: None,
        },
        AuthError::InvalidCredentials => ErrorBody {
            error: err.to_string(),
            score: None,
        },
    };
    (status, Json(body)).into_response()
}

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Normalize and validate an email into an identity.
pub(crate) fn identity_from_email(email: &str) -> Option<Identity> {
    let normalized = normalize_email(email);
    valid_email(&normalized).then(|| Identity::new(normalized))
}

/// Resolve where the request came from and what it came from.
pub(crate) async fn request_environment(state: &AppState, headers: &HeaderMap) -> Environment {
    let origin = state.geo().resolve(headers).await;
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    Environment::new(
        origin.network_address,
        device::signature(user_agent),
        origin.location,
    )
}

/// Create a session for `identity` and return the `Set-Cookie` header map.
pub(crate) fn start_session(
    state: &AppState,
    identity: &Identity,
) -> Result<HeaderMap, Response> {
    let token = state.sessions().create(identity).map_err(|err| {
        error!("Failed to create session: {err}");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session")
    })?;
    let cookie: HeaderValue = session_cookie(state.config(), &token).map_err(|err| {
        error!("Failed to build session cookie: {err}");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session")
    })?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    Ok(headers)
}
