// src/handlers/chat.rs
// Thin HTTP layer: deserialize, delegate to the chat services, convert
// errors to status codes, and feed the side-channel error log on failure.
use crate::chat::{overview, service};
use crate::error::ChatError;
use crate::middleware::auth::{auth_middleware, BearerToken};
use crate::models::auth::Claims;
use crate::services::error_log;
use crate::AppState;
use axum::{
    extract::{Extension, Query},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

pub fn chat_routes() -> Router {
    Router::new()
        .route("/api/chat", post(send_message).get(get_chat))
        .route("/api/chat/edit-prompt", post(edit_prompt))
        .route("/api/chat/regenerate", post(regenerate))
        .route("/api/chat/overview", get(get_overview))
        .route("/api/chat/title", post(edit_title))
        .route("/api/chat/delete", post(delete_chat))
        .layer(axum::middleware::from_fn(auth_middleware))
}

async fn send_message(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Extension(token): Extension<BearerToken>,
    Json(request): Json<service::SendMessageRequest>,
) -> Result<Json<service::ChatResponse>, ChatError> {
    match service::send_message(&state.db_pool, &claims.sub, &request).await {
        Ok(response) => Ok(Json(response)),
        Err(error) => {
            let parameters = json!({
                "chat_id": request.chat_id,
                "provider": request.provider,
                "model": request.model,
            });
            error_log::record_failure(&state.db_pool, &claims.sub, "chat_send", parameters, Some(&token.0), &error)
                .await;
            Err(error)
        }
    }
}

async fn edit_prompt(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Extension(token): Extension<BearerToken>,
    Json(request): Json<service::EditPromptRequest>,
) -> Result<Json<service::EditPromptResponse>, ChatError> {
    match service::edit_prompt(&state.db_pool, &claims.sub, &request).await {
        Ok(response) => Ok(Json(response)),
        Err(error) => {
            let parameters = json!({
                "chat_id": request.chat_id,
                "conversation_id": request.conversation_id,
            });
            error_log::record_failure(&state.db_pool, &claims.sub, "chat_edit_prompt", parameters, Some(&token.0), &error)
                .await;
            Err(error)
        }
    }
}

async fn regenerate(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Extension(token): Extension<BearerToken>,
    Json(request): Json<service::RegenerateRequest>,
) -> Result<Json<service::RegenerateResponse>, ChatError> {
    match service::regenerate(&state.db_pool, &claims.sub, &request).await {
        Ok(response) => Ok(Json(response)),
        Err(error) => {
            let parameters = json!({
                "chat_id": request.chat_id,
                "conversation_id": request.conversation_id,
            });
            error_log::record_failure(&state.db_pool, &claims.sub, "chat_regenerate", parameters, Some(&token.0), &error)
                .await;
            Err(error)
        }
    }
}

async fn get_overview(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Extension(token): Extension<BearerToken>,
) -> Result<Json<overview::OverviewResponse>, ChatError> {
    match overview::overview(&state.db_pool, &claims.sub).await {
        Ok(response) => Ok(Json(response)),
        Err(error) => {
            error_log::record_failure(&state.db_pool, &claims.sub, "chat_overview", json!({}), Some(&token.0), &error)
                .await;
            Err(error)
        }
    }
}

#[derive(Debug, Deserialize)]
struct GetChatQuery {
    chat_id: Option<Uuid>,
    timestamp: Option<String>,
}

async fn get_chat(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Extension(token): Extension<BearerToken>,
    Query(query): Query<GetChatQuery>,
) -> Result<Json<overview::GetChatResponse>, ChatError> {
    let result = get_chat_inner(&state, &claims.sub, &query).await;
    match result {
        Ok(response) => Ok(Json(response)),
        Err(error) => {
            let parameters = json!({
                "chat_id": query.chat_id,
                "timestamp": query.timestamp,
            });
            error_log::record_failure(&state.db_pool, &claims.sub, "chat_get", parameters, Some(&token.0), &error)
                .await;
            Err(error)
        }
    }
}

async fn get_chat_inner(
    state: &AppState,
    user_id: &str,
    query: &GetChatQuery,
) -> Result<overview::GetChatResponse, ChatError> {
    let chat_id = query.chat_id.ok_or(ChatError::MissingField("chat_id"))?;
    let before = match &query.timestamp {
        Some(raw) => Some(parse_timestamp(raw)?),
        None => None,
    };
    overview::get_chat(&state.db_pool, user_id, chat_id, before).await
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ChatError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ChatError::InvalidField("timestamp"))
}

async fn edit_title(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Extension(token): Extension<BearerToken>,
    Json(request): Json<overview::EditTitleRequest>,
) -> Result<Json<overview::EditTitleResponse>, ChatError> {
    match overview::edit_title(&state.db_pool, &claims.sub, &request).await {
        Ok(response) => Ok(Json(response)),
        Err(error) => {
            let parameters = json!({"chat_id": request.chat_id});
            error_log::record_failure(&state.db_pool, &claims.sub, "chat_title", parameters, Some(&token.0), &error)
                .await;
            Err(error)
        }
    }
}

async fn delete_chat(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Extension(token): Extension<BearerToken>,
    Json(request): Json<overview::DeleteChatRequest>,
) -> Result<Json<overview::DeleteChatResponse>, ChatError> {
    match overview::delete_chat(&state.db_pool, &claims.sub, &request).await {
        Ok(response) => Ok(Json(response)),
        Err(error) => {
            let parameters = json!({"chat_id": request.chat_id});
            error_log::record_failure(&state.db_pool, &claims.sub, "chat_delete", parameters, Some(&token.0), &error)
                .await;
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_accepts_rfc3339() {
        let parsed = parse_timestamp("2025-03-10T12:00:00Z").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-03-10T12:00:00+00:00");
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(matches!(parse_timestamp("not-a-date"), Err(ChatError::InvalidField("timestamp"))));
    }
}
