//! Password sign-in with risk evaluation.
//!
//! Flow Overview:
//! 1) Validate the payload and normalize the email into an identity.
//! 2) Resolve the request origin and derive the device signature.
//! 3) Run the attempt on a blocking thread (argon2 verification).
//! 4) Allowed and flagged attempts get a session cookie; flagged ones carry a
//!    warning. Blocked attempts get 403 with the score.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::ToSchema;

use super::{
    ErrorBody, auth_error_response, error_response, identity_from_email, request_environment,
    start_session,
};
use crate::{
    api::AppState,
    risk::{Admission, AuthError},
};

#[derive(ToSchema, Deserialize)]
pub struct LoginRequest {
    email: String,
    #[schema(value_type = String, format = Password)]
    password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    pub identity: String,
    pub score: u8,
    pub level: String,
    pub decision: String,
    pub factors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<&Admission> for LoginResponse {
    fn from(admission: &Admission) -> Self {
        Self {
            identity: admission.identity.to_string(),
            score: admission.score,
            level: admission.level.to_string(),
            decision: admission.decision.to_string(),
            factors: admission
                .factors
                .iter()
                .map(|factor| factor.description().to_string())
                .collect(),
            warning: admission.warning().map(str::to_string),
        }
    }
}

#[utoipa::path(
    post,
    path= "/v1/auth/login",
    request_body = LoginRequest,
    responses (
        (status = 200, description = "Sign-in allowed; flagged sign-ins carry a warning", body = LoginResponse),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 403, description = "Sign-in blocked due to high risk", body = ErrorBody),
        (status = 503, description = "Attempt history or directory unavailable", body = ErrorBody),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "Missing payload");
    };

    let Some(identity) = identity_from_email(&request.email) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid email");
    };
    let secret = SecretString::from(request.password);

    let environment = request_environment(&state, &headers).await;

    let worker = Arc::clone(&state);
    let attempt_identity = identity.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        worker
            .authenticator()
            .attempt(&attempt_identity, &secret, environment)
    })
    .await;

    let admission: Result<Admission, AuthError> = match outcome {
        Ok(result) => result,
        Err(err) => {
            error!("Login task failed: {err}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to sign in");
        }
    };

    let admission = match admission {
        Ok(admission) => admission,
        Err(err) => return auth_error_response(&err),
    };

    let headers = match start_session(&state, &admission.identity) {
        Ok(headers) => headers,
        Err(response) => return response,
    };

    (StatusCode::OK, headers, Json(LoginResponse::from(&admission))).into_response()
}
