// src/services/error_log.rs
// Side-channel error log for offline diagnosis. Best-effort: a failure to
// record never masks the error being recorded.
use serde_json::Value;
use sqlx::PgPool;

use crate::error::ChatError;

const TOKEN_REFERENCE_LEN: usize = 12;

pub async fn record_failure(
    pool: &PgPool,
    user_id: &str,
    path: &str,
    parameters: Value,
    token: Option<&str>,
    error: &ChatError,
) {
    if error.is_server_fault() {
        tracing::error!(path = path, user_id = user_id, "request failed: {}", error);
    } else {
        tracing::warn!(path = path, user_id = user_id, "request rejected: {}", error);
    }

    let token_reference = token.map(truncate_token).unwrap_or_else(|| "missing token".to_string());

    let result = sqlx::query(
        "INSERT INTO error_logs (user_id, path, parameters, jwt_token, error_message)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(user_id)
    .bind(path)
    .bind(sqlx::types::Json(parameters))
    .bind(token_reference)
    .bind(error.to_string())
    .execute(pool)
    .await;

    if let Err(e) = result {
        tracing::error!("failed to record error log entry: {}", e);
    }
}

/// Only a short prefix of the credential is ever persisted.
fn truncate_token(token: &str) -> String {
    if token.chars().count() <= TOKEN_REFERENCE_LEN {
        return token.to_string();
    }
    let prefix: String = token.chars().take(TOKEN_REFERENCE_LEN).collect();
    format!("{}…", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_tokens_are_truncated() {
        let token = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.payload.signature";
        let reference = truncate_token(token);
        assert_eq!(reference, "eyJhbGciOiJI…");
    }

    #[test]
    fn test_short_tokens_pass_through() {
        assert_eq!(truncate_token("abc"), "abc");
    }
}
