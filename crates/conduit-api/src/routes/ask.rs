use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use conduit::prelude::CancellationToken;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
}

/// Ask the agent on behalf of the caller identified by the bearer token
pub async fn ask(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AskRequest>,
) -> ApiResult<Json<AskResponse>> {
    let caller_token = bearer_token(&headers)
        .ok_or(ApiError::MissingBearer)?
        .to_string();

    let question = if req.question.trim().is_empty() {
        state.default_question().to_string()
    } else {
        req.question
    };

    // Fires if this handler is dropped (client gone, layer timeout); the
    // task then stops early and still deletes its thread.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let agent = state.agent.clone();
    let answer = tokio::spawn(async move {
        agent
            .ask_with_cancellation(&caller_token, &question, &cancel)
            .await
    })
    .await
    .map_err(|e| {
        tracing::error!("Ask task failed: {}", e);
        ApiError::Internal
    })??;

    Ok(Json(AskResponse { answer }))
}

/// Token from `Authorization: Bearer <token>`
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token)
}
