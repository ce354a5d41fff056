//! One-time code sign-in: request a code, then redeem it.
//!
//! Requesting a code always answers 202 so callers cannot probe which emails
//! are registered. Redeeming a code signs the identity in through
//! `Authenticator::recover`, which records the sign-in with score 0.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

use super::{
    ErrorBody, auth_error_response, error_response, identity_from_email, request_environment,
    start_session,
};
use crate::api::{
    AppState,
    handlers::login::LoginResponse,
    notify::{Delivery, Notification},
};

#[derive(ToSchema, Deserialize, Debug)]
pub struct OtpRequest {
    email: String,
}

#[derive(ToSchema, Deserialize)]
pub struct OtpVerifyRequest {
    email: String,
    code: String,
}

#[utoipa::path(
    post,
    path= "/v1/auth/otp",
    request_body = OtpRequest,
    responses (
        (status = 202, description = "If the identity exists, a code was sent"),
        (status = 400, description = "Missing payload", body = ErrorBody),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn send_code(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<OtpRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "Missing payload");
    };

    let Some(identity) = identity_from_email(&request.email) else {
        debug!("otp requested for malformed email");
        return StatusCode::ACCEPTED.into_response();
    };

    match state.authenticator().directory().contains(&identity) {
        Ok(true) => {}
        Ok(false) => {
            debug!(identity = %identity, "otp requested for unknown identity");
            return StatusCode::ACCEPTED.into_response();
        }
        Err(err) => {
            error!("Credential directory unavailable: {err}");
            return StatusCode::ACCEPTED.into_response();
        }
    }

    let code = state.otp().issue(&identity);
    let payload = Notification::SignInCode {
        code,
        ttl_seconds: state.config().otp_ttl_seconds(),
    };
    match state.notifier().send(&identity, &payload) {
        Delivery::Delivered => info!(identity = %identity, "sign-in code sent"),
        Delivery::Failed(reason) => warn!(identity = %identity, "sign-in code not sent: {reason}"),
    }

    StatusCode::ACCEPTED.into_response()
}

#[utoipa::path(
    post,
    path= "/v1/auth/otp/verify",
    request_body = OtpVerifyRequest,
    responses (
        (status = 200, description = "Code accepted and session started", body = LoginResponse),
        (status = 400, description = "Missing, expired or wrong code", body = ErrorBody),
        (status = 503, description = "Attempt history unavailable", body = ErrorBody),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn verify_code(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<OtpVerifyRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "Missing payload");
    };

    let Some(identity) = identity_from_email(&request.email) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid email");
    };

    if let Err(err) = state.otp().redeem(&identity, request.code.trim()) {
        info!(identity = %identity, "sign-in code rejected: {err}");
        return error_response(StatusCode::BAD_REQUEST, "Invalid or expired code");
    }

    let environment = request_environment(&state, &headers).await;
    let admission = match state.authenticator().recover(&identity, environment) {
        Ok(admission) => admission,
        Err(err) => return auth_error_response(&err),
    };

    let headers = match start_session(&state, &admission.identity) {
        Ok(headers) => headers,
        Err(response) => return response,
    };

    (StatusCode::OK, headers, Json(LoginResponse::from(&admission))).into_response()
}
