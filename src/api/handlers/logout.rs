use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error, instrument};

use crate::api::{
    AppState,
    session::{clear_session_cookie, extract_session_token},
};

#[utoipa::path(
    post,
    path= "/v1/auth/logout",
    responses (
        (status = 204, description = "Session revoked and cookie cleared"),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn logout(headers: HeaderMap, state: Extension<Arc<AppState>>) -> Response {
    if let Some(token) = extract_session_token(&headers) {
        state.sessions().revoke(&token);
        debug!("session revoked");
    }

    let mut response_headers = HeaderMap::new();
    match clear_session_cookie(state.config()) {
        Ok(cookie) => {
            response_headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build logout cookie: {err}"),
    }

    (StatusCode::NO_CONTENT, response_headers).into_response()
}
