//! Account registration. Signup never writes to the attempt ledger.

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;

use super::{ErrorBody, error_response, identity_from_email, start_session};
use crate::{api::AppState, risk::DirectoryError};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_NAME_LENGTH: usize = 128;

#[derive(ToSchema, Deserialize)]
pub struct SignupRequest {
    email: String,
    name: String,
    #[schema(value_type = String, format = Password)]
    password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SignupResponse {
    pub identity: String,
    pub name: String,
}

#[utoipa::path(
    post,
    path= "/v1/auth/signup",
    request_body = SignupRequest,
    responses (
        (status = 201, description = "Account created and session started", body = SignupResponse),
        (status = 400, description = "Invalid email, name or password", body = ErrorBody),
        (status = 409, description = "Identity already registered", body = ErrorBody),
        (status = 503, description = "Credential directory unavailable", body = ErrorBody),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn signup(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<SignupRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "Missing payload");
    };

    let Some(identity) = identity_from_email(&request.email) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid email");
    };

    let name = request.name.trim().to_string();
    if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
        return error_response(StatusCode::BAD_REQUEST, "Invalid name");
    }

    if request.password.chars().count() < MIN_PASSWORD_LENGTH {
        return error_response(StatusCode::BAD_REQUEST, "Invalid password");
    }
    let secret = SecretString::from(request.password);

    // argon2 hashing is CPU bound.
    let worker = Arc::clone(&state);
    let registered = {
        let identity = identity.clone();
        let name = name.clone();
        tokio::task::spawn_blocking(move || {
            worker
                .authenticator()
                .directory()
                .register(&identity, &name, &secret)
        })
        .await
    };

    match registered {
        Ok(Ok(())) => {}
        Ok(Err(DirectoryError::IdentityExists)) => {
            info!(identity = %identity, "signup for existing identity");
            return error_response(StatusCode::CONFLICT, "Identity already registered");
        }
        Ok(Err(DirectoryError::Unavailable(reason))) => {
            error!("Credential directory unavailable: {reason}");
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Service unavailable");
        }
        Ok(Err(err)) => {
            error!("Failed to register identity: {err}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to register");
        }
        Err(err) => {
            error!("Signup task failed: {err}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to register");
        }
    }

    info!(identity = %identity, "identity registered");

    let headers = match start_session(&state, &identity) {
        Ok(headers) => headers,
        Err(response) => return response,
    };

    (
        StatusCode::CREATED,
        headers,
        Json(SignupResponse {
            identity: identity.to_string(),
            name,
        }),
    )
        .into_response()
}
