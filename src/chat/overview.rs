// src/chat/overview.rs
// Read-side endpoints around the chat list: the overview screen, paginated
// history for one chat, title rename, and soft delete.
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::chat::service::{required_id, required_text};
use crate::chat::store::{self, ChatSummary, ConversationPageRow};
use crate::config::{self, ModelConfig};
use crate::error::ChatError;

const PAGE_SIZE: usize = 5;
const MAX_TITLE_CHARS: usize = 280;

#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    pub success: bool,
    pub message: String,
    pub user_credits: Decimal,
    pub providers: Vec<ProviderSummary>,
    pub chat_history: ChatHistory,
}

/// The catalog as shown to clients: no keys or endpoints, just what a user
/// can pick from.
#[derive(Debug, Serialize)]
pub struct ProviderSummary {
    pub name: String,
    pub icon: String,
    pub models: Vec<ModelConfig>,
}

#[derive(Debug, Serialize)]
pub struct ChatHistory {
    pub today_chats: Vec<ChatOverview>,
    pub previous_day_chats: Vec<ChatOverview>,
    pub other_chats: Vec<ChatOverview>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatOverview {
    pub chat_id: Uuid,
    pub title: String,
    pub model: String,
    pub provider: String,
    pub model_name: String,
    pub updated_at: DateTime<Utc>,
}

pub async fn overview(pool: &PgPool, user_id: &str) -> Result<OverviewResponse, ChatError> {
    let config = config::fetch_secret()?;
    let account = store::user_credits(pool, user_id).await?;
    let chats = store::list_chats(pool, user_id).await?;

    let models: Vec<ModelConfig> = config.providers.iter().flat_map(|p| p.models.clone()).collect();
    let chat_history = group_chat_history(chats, &models, Utc::now());
    let providers = config
        .providers
        .iter()
        .map(|p| ProviderSummary {
            name: p.name.clone(),
            icon: p.icon.clone(),
            models: p.models.clone(),
        })
        .collect();

    Ok(OverviewResponse {
        success: true,
        message: "User overview data retrieved successfully".to_string(),
        user_credits: account.credits,
        providers,
        chat_history,
    })
}

/// Buckets chats into today / yesterday / older, newest first, and resolves
/// each model id to its display name.
fn group_chat_history(
    mut chats: Vec<ChatSummary>,
    models: &[ModelConfig],
    now: DateTime<Utc>,
) -> ChatHistory {
    chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    let yesterday = now - Duration::days(1);

    let mut history = ChatHistory {
        today_chats: Vec::new(),
        previous_day_chats: Vec::new(),
        other_chats: Vec::new(),
    };
    for chat in chats {
        let model_name = models
            .iter()
            .find(|m| m.model == chat.model)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| chat.model.clone());
        let updated_at = chat.updated_at;
        let entry = ChatOverview {
            chat_id: chat.chat_id,
            title: chat.title,
            model: chat.model,
            provider: chat.provider,
            model_name,
            updated_at,
        };
        if updated_at.date_naive() == now.date_naive() {
            history.today_chats.push(entry);
        } else if updated_at.date_naive() == yesterday.date_naive() {
            history.previous_day_chats.push(entry);
        } else {
            history.other_chats.push(entry);
        }
    }
    history
}

#[derive(Debug, Serialize)]
pub struct GetChatResponse {
    pub success: bool,
    pub message: String,
    pub chat_id: Uuid,
    pub provider: String,
    pub model: String,
    pub previous_history: Vec<ConversationPage>,
    pub next_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ConversationPage {
    pub conversation_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub messages: serde_json::Value,
}

pub async fn get_chat(
    pool: &PgPool,
    user_id: &str,
    chat_id: Uuid,
    before: Option<DateTime<Utc>>,
) -> Result<GetChatResponse, ChatError> {
    let before = before.unwrap_or_else(Utc::now);
    let mut rows =
        store::conversation_page(pool, user_id, chat_id, before, (PAGE_SIZE + 1) as i32).await?;
    if rows.is_empty() {
        return Err(ChatError::ChatNotFound);
    }

    let next_timestamp = page_cursor(&mut rows, PAGE_SIZE);
    let provider = rows[0].provider.clone();
    let model = rows[0].model.clone();
    let previous_history = rows
        .into_iter()
        .map(|row| ConversationPage {
            conversation_id: row.conversation_id,
            created_at: row.conversation_created_at,
            messages: row.message_data.0,
        })
        .collect();

    Ok(GetChatResponse {
        success: true,
        message: "Successfully retrieved chat history".to_string(),
        chat_id,
        provider,
        model,
        previous_history,
        next_timestamp,
    })
}

/// One row past the page size is fetched as a probe; when present, the page
/// is truncated and the cursor points at its last visible row.
fn page_cursor(rows: &mut Vec<ConversationPageRow>, limit: usize) -> Option<DateTime<Utc>> {
    if rows.len() > limit {
        let next = rows[limit - 1].conversation_created_at;
        rows.truncate(limit);
        Some(next)
    } else {
        None
    }
}

#[derive(Debug, Deserialize)]
pub struct EditTitleRequest {
    pub chat_id: Option<Uuid>,
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EditTitleResponse {
    pub success: bool,
    pub message: String,
    pub chat_id: Uuid,
    pub title: String,
}

pub async fn edit_title(
    pool: &PgPool,
    user_id: &str,
    request: &EditTitleRequest,
) -> Result<EditTitleResponse, ChatError> {
    store::user_credits(pool, user_id).await?;
    let chat_id = required_id(request.chat_id, "chat_id")?;
    let title = required_text(&request.title, "title")?;
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ChatError::InvalidField("title"));
    }

    let chat = store::fetch_chat(pool, chat_id, user_id).await?;
    store::update_chat_title(pool, chat.chat_id, title).await?;

    Ok(EditTitleResponse {
        success: true,
        message: "Chat Title Updated Successfully.".to_string(),
        chat_id: chat.chat_id,
        title: title.to_string(),
    })
}

#[derive(Debug, Deserialize)]
pub struct DeleteChatRequest {
    pub chat_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct DeleteChatResponse {
    pub success: bool,
    pub message: String,
    pub chat_id: Uuid,
}

pub async fn delete_chat(
    pool: &PgPool,
    user_id: &str,
    request: &DeleteChatRequest,
) -> Result<DeleteChatResponse, ChatError> {
    store::user_credits(pool, user_id).await?;
    let chat_id = required_id(request.chat_id, "chat_id")?;

    let chat = store::fetch_chat(pool, chat_id, user_id).await?;
    store::soft_delete_chat(pool, chat.chat_id).await?;

    Ok(DeleteChatResponse {
        success: true,
        message: "Chat successfully deleted.".to_string(),
        chat_id: chat.chat_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn summary(title: &str, updated_at: DateTime<Utc>) -> ChatSummary {
        ChatSummary {
            chat_id: Uuid::new_v4(),
            title: title.to_string(),
            model: "gpt-4o-mini".to_string(),
            provider: "OpenAI".to_string(),
            updated_at,
        }
    }

    #[test]
    fn test_group_chat_history_buckets_by_day() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap();
        let chats = vec![
            summary("old", now - Duration::days(9)),
            summary("today", now - Duration::hours(2)),
            summary("yesterday", now - Duration::days(1)),
        ];
        let models = vec![ModelConfig {
            name: "GPT-4o mini".to_string(),
            provider: "OpenAI".to_string(),
            model: "gpt-4o-mini".to_string(),
            min_credits: Decimal::ZERO,
        }];

        let history = group_chat_history(chats, &models, now);
        assert_eq!(history.today_chats.len(), 1);
        assert_eq!(history.today_chats[0].title, "today");
        assert_eq!(history.today_chats[0].model_name, "GPT-4o mini");
        assert_eq!(history.previous_day_chats.len(), 1);
        assert_eq!(history.previous_day_chats[0].title, "yesterday");
        assert_eq!(history.other_chats.len(), 1);
        assert_eq!(history.other_chats[0].title, "old");
    }

    #[test]
    fn test_group_chat_history_unknown_model_keeps_raw_id() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap();
        let history = group_chat_history(vec![summary("a", now)], &[], now);
        assert_eq!(history.today_chats[0].model_name, "gpt-4o-mini");
    }

    fn page_row(created_at: DateTime<Utc>) -> ConversationPageRow {
        ConversationPageRow {
            conversation_id: Uuid::new_v4(),
            conversation_created_at: created_at,
            model: "gpt-4o-mini".to_string(),
            provider: "OpenAI".to_string(),
            message_data: sqlx::types::Json(serde_json::json!([])),
        }
    }

    #[test]
    fn test_page_cursor_absent_on_short_page() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap();
        let mut rows: Vec<_> = (0..3).map(|i| page_row(now - Duration::minutes(i))).collect();
        assert_eq!(page_cursor(&mut rows, 5), None);
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_page_cursor_truncates_probe_row() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap();
        let mut rows: Vec<_> = (0..6).map(|i| page_row(now - Duration::minutes(i))).collect();
        let cursor = page_cursor(&mut rows, 5);
        assert_eq!(rows.len(), 5);
        assert_eq!(cursor, Some(rows[4].conversation_created_at));
    }
}
