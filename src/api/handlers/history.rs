//! Sign-in history for the authenticated identity, most recent first.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use super::{ErrorBody, auth_error_response, error_response};
use crate::{
    api::{AppState, session::extract_session_token},
    risk::HistoryItem,
};

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: u64,
    pub timestamp: String,
    pub network_address: String,
    pub device: String,
    pub location: String,
    pub score: u8,
    pub level: String,
    pub decision: String,
}

impl From<HistoryItem> for HistoryEntry {
    fn from(item: HistoryItem) -> Self {
        let HistoryItem { entry, level } = item;
        Self {
            id: entry.id.get(),
            timestamp: entry.attributes.timestamp.to_rfc3339(),
            network_address: entry.attributes.network_address,
            device: entry.attributes.device,
            location: entry.attributes.location,
            score: entry.score,
            level: level.to_string(),
            decision: entry.decision.to_string(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HistoryResponse {
    pub identity: String,
    /// Score of the most recent sign-in, if any.
    pub latest_score: Option<u8>,
    pub latest_level: Option<String>,
    pub entries: Vec<HistoryEntry>,
}

#[utoipa::path(
    get,
    path= "/v1/me/history",
    responses (
        (status = 200, description = "Sign-in history, most recent first", body = HistoryResponse),
        (status = 401, description = "No valid session", body = ErrorBody),
        (status = 503, description = "Attempt history unavailable", body = ErrorBody),
    ),
    tag= "riskgate"
)]
#[instrument(skip_all)]
pub async fn history(headers: HeaderMap, state: Extension<Arc<AppState>>) -> Response {
    let Some(session) = extract_session_token(&headers)
        .and_then(|token| state.sessions().lookup(&token))
    else {
        debug!("history requested without a valid session");
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    };

    let items = match state.authenticator().history(&session.identity) {
        Ok(items) => items,
        Err(err) => return auth_error_response(&err),
    };

    let entries: Vec<HistoryEntry> = items.into_iter().map(HistoryEntry::from).collect();
    let latest = entries.first();

    Json(HistoryResponse {
        identity: session.identity.to_string(),
        latest_score: latest.map(|entry| entry.score),
        latest_level: latest.map(|entry| entry.level.clone()),
        entries,
    })
    .into_response()
}
