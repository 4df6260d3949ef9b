// src/error.rs
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Every failure a chat request can surface. Variants map to an HTTP status
/// class: input faults before any external call, the credit gate after a
/// cheap read, upstream/persistence faults only after real work happened.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0} is missing in the request")]
    MissingField(&'static str),

    #[error("invalid {0} in the request")]
    InvalidField(&'static str),

    #[error("the {provider} provider or {model} model doesn't exist")]
    UnsupportedModel { provider: String, model: String },

    #[error("chat is invalid (or) already deleted")]
    ChatNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("recent conversation id mismatch")]
    ConversationMismatch,

    #[error("regenerate limit reached for this conversation")]
    RegenerateLimit,

    #[error("insufficient credits to process the request")]
    InsufficientCredits,

    #[error("AI request failed: {0}")]
    UpstreamRequestFailed(String),

    #[error("no pricing configured for model: {0}")]
    UnknownModel(String),

    #[error("persistence operation failed: {0}")]
    PersistenceFailed(String),

    #[error("configuration unavailable: {0}")]
    Config(String),
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::MissingField(_) | ChatError::InvalidField(_) => StatusCode::BAD_REQUEST,
            ChatError::UnsupportedModel { .. } => StatusCode::BAD_REQUEST,
            ChatError::RegenerateLimit => StatusCode::BAD_REQUEST,
            ChatError::ChatNotFound | ChatError::UserNotFound => StatusCode::NOT_FOUND,
            ChatError::ConversationMismatch => StatusCode::CONFLICT,
            ChatError::InsufficientCredits => StatusCode::FORBIDDEN,
            ChatError::UpstreamRequestFailed(_) => StatusCode::BAD_GATEWAY,
            ChatError::UnknownModel(_) | ChatError::PersistenceFailed(_) | ChatError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn is_server_fault(&self) -> bool {
        self.status().is_server_error()
    }
}

impl From<sqlx::Error> for ChatError {
    fn from(err: sqlx::Error) -> Self {
        ChatError::PersistenceFailed(err.to_string())
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert_eq!(ChatError::MissingField("text").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ChatError::UnsupportedModel { provider: "OPENAI".into(), model: "gpt-5".into() }.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ChatError::ChatNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ChatError::ConversationMismatch.status(), StatusCode::CONFLICT);
        assert_eq!(ChatError::InsufficientCredits.status(), StatusCode::FORBIDDEN);
        assert_eq!(ChatError::UpstreamRequestFailed("boom".into()).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ChatError::PersistenceFailed("down".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ChatError::UnknownModel("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_server_fault_partition() {
        assert!(ChatError::UpstreamRequestFailed("timeout".into()).is_server_fault());
        assert!(ChatError::PersistenceFailed("down".into()).is_server_fault());
        assert!(!ChatError::MissingField("text").is_server_fault());
        assert!(!ChatError::InsufficientCredits.is_server_fault());
    }
}
