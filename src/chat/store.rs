// src/chat/store.rs
// Read and write surface against the relational store. Every multi-row
// mutation goes through one of the four stored operations so it commits
// atomically; this module never opens its own transactions.
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::ChatError;
use crate::models::chat::{Chat, Message, Turn, UserCredits};

/// Most recent conversation for a chat, joined with its owning chat row.
/// The single source of truth for "current tip".
#[derive(Debug, FromRow)]
pub struct ConversationTip {
    pub conversation_id: Uuid,
    pub chat_id: Uuid,
    pub provider: String,
    pub model: String,
}

#[derive(Debug)]
pub struct StartChatArgs<'a> {
    pub user_id: &'a str,
    pub title: &'a str,
    pub user_message: &'a str,
    pub assistant_message: &'a str,
    pub credits_used: Decimal,
    pub ai_cost: Decimal,
    pub model: &'a str,
    pub provider: &'a str,
    pub tokens_consumed: i64,
}

#[derive(Debug)]
pub struct ContinueChatArgs<'a> {
    pub chat_id: Uuid,
    pub user_message: &'a str,
    pub assistant_message: &'a str,
    pub credits_used: Decimal,
    pub ai_cost: Decimal,
    pub tokens_consumed: i64,
}

#[derive(Debug)]
pub struct EditChatArgs<'a> {
    pub conversation_id: Uuid,
    pub user_message: &'a str,
    pub assistant_message: &'a str,
    pub credits_used: Decimal,
    pub ai_cost: Decimal,
    pub tokens_consumed: i64,
}

#[derive(Debug)]
pub struct RegenerateArgs<'a> {
    pub conversation_id: Uuid,
    pub assistant_message: &'a str,
    pub credits_used: Decimal,
    pub ai_cost: Decimal,
    pub tokens_consumed: i64,
}

#[derive(Debug, FromRow)]
pub struct ChatSummary {
    pub chat_id: Uuid,
    pub title: String,
    pub model: String,
    pub provider: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct ConversationPageRow {
    pub conversation_id: Uuid,
    pub conversation_created_at: DateTime<Utc>,
    pub model: String,
    pub provider: String,
    pub message_data: sqlx::types::Json<serde_json::Value>,
}

pub async fn user_credits(pool: &PgPool, user_id: &str) -> Result<UserCredits, ChatError> {
    sqlx::query_as::<_, UserCredits>(
        "SELECT user_id, credits FROM user_chat_credits WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(ChatError::UserNotFound)
}

/// Ownership-scoped chat lookup. Soft-deleted chats are invisible here.
pub async fn fetch_chat(pool: &PgPool, chat_id: Uuid, user_id: &str) -> Result<Chat, ChatError> {
    sqlx::query_as::<_, Chat>(
        "SELECT chat_id, user_id, title, provider, model, credits_used, ai_cost, total_tokens,
                previous_conversation, is_deleted, created_at, updated_at
         FROM chats
         WHERE chat_id = $1 AND user_id = $2 AND is_deleted = FALSE",
    )
    .bind(chat_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(ChatError::ChatNotFound)
}

pub async fn latest_conversation(
    pool: &PgPool,
    chat_id: Uuid,
    user_id: &str,
) -> Result<ConversationTip, ChatError> {
    sqlx::query_as::<_, ConversationTip>(
        "SELECT c.conversation_id, c.chat_id, ch.provider, ch.model
         FROM conversations c
         JOIN chats ch ON ch.chat_id = c.chat_id
         WHERE c.chat_id = $1 AND ch.user_id = $2 AND ch.is_deleted = FALSE
         ORDER BY c.created_at DESC
         LIMIT 1",
    )
    .bind(chat_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(ChatError::ChatNotFound)
}

pub async fn conversation_messages(
    pool: &PgPool,
    conversation_id: Uuid,
) -> Result<Vec<Message>, ChatError> {
    let messages = sqlx::query_as::<_, Message>(
        "SELECT message_id, conversation_id, chat_id, sender_role, message, created_at
         FROM messages
         WHERE conversation_id = $1
         ORDER BY created_at ASC",
    )
    .bind(conversation_id)
    .fetch_all(pool)
    .await?;

    Ok(messages)
}

/// Prior-turn history for an edit or regeneration, excluding the node being
/// replaced and every previously superseded branch.
pub async fn previous_messages_for_edit(
    pool: &PgPool,
    chat_id: Uuid,
    excluded_conversation_id: Uuid,
) -> Result<Vec<Turn>, ChatError> {
    let rows = sqlx::query_as::<_, (Uuid, sqlx::types::Json<Vec<Turn>>)>(
        "SELECT p_conversation_id, p_messages FROM fetch_previous_messages_for_edit($1, $2)",
    )
    .bind(chat_id)
    .bind(excluded_conversation_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().flat_map(|(_, messages)| messages.0).collect())
}

pub async fn start_chat(pool: &PgPool, args: &StartChatArgs<'_>) -> Result<(Uuid, Uuid), ChatError> {
    let row = sqlx::query_as::<_, (Uuid, Uuid)>(
        "SELECT inserted_chat_id, inserted_conversation_id
         FROM start_chat($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(args.user_id)
    .bind(args.title)
    .bind(args.credits_used)
    .bind(args.ai_cost)
    .bind(args.user_message)
    .bind(args.assistant_message)
    .bind(args.model)
    .bind(args.provider)
    .bind(args.tokens_consumed)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn continue_chat(pool: &PgPool, args: &ContinueChatArgs<'_>) -> Result<Uuid, ChatError> {
    let row = sqlx::query_as::<_, (Uuid,)>(
        "SELECT inserted_conversation_id FROM continue_chat($1, $2, $3, $4, $5, $6)",
    )
    .bind(args.chat_id)
    .bind(args.user_message)
    .bind(args.assistant_message)
    .bind(args.credits_used)
    .bind(args.ai_cost)
    .bind(args.tokens_consumed)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

pub async fn edit_chat(pool: &PgPool, args: &EditChatArgs<'_>) -> Result<Uuid, ChatError> {
    let row = sqlx::query_as::<_, (Uuid,)>(
        "SELECT new_conversation_id FROM edit_chat($1, $2, $3, $4, $5, $6)",
    )
    .bind(args.conversation_id)
    .bind(args.user_message)
    .bind(args.assistant_message)
    .bind(args.credits_used)
    .bind(args.ai_cost)
    .bind(args.tokens_consumed)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

pub async fn regenerate_assistant_message(
    pool: &PgPool,
    args: &RegenerateArgs<'_>,
) -> Result<(), ChatError> {
    sqlx::query("SELECT regenerate_assistant_message($1, $2, $3, $4, $5)")
        .bind(args.conversation_id)
        .bind(args.assistant_message)
        .bind(args.ai_cost)
        .bind(args.credits_used)
        .bind(args.tokens_consumed)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn update_chat_title(pool: &PgPool, chat_id: Uuid, title: &str) -> Result<(), ChatError> {
    sqlx::query("UPDATE chats SET title = $1, updated_at = NOW() WHERE chat_id = $2")
        .bind(title)
        .bind(chat_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn soft_delete_chat(pool: &PgPool, chat_id: Uuid) -> Result<(), ChatError> {
    sqlx::query("UPDATE chats SET is_deleted = TRUE, updated_at = NOW() WHERE chat_id = $1")
        .bind(chat_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn list_chats(pool: &PgPool, user_id: &str) -> Result<Vec<ChatSummary>, ChatError> {
    let chats = sqlx::query_as::<_, ChatSummary>(
        "SELECT chat_id, title, model, provider, updated_at
         FROM chats
         WHERE user_id = $1 AND is_deleted = FALSE",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(chats)
}

pub async fn conversation_page(
    pool: &PgPool,
    user_id: &str,
    chat_id: Uuid,
    before: DateTime<Utc>,
    limit: i32,
) -> Result<Vec<ConversationPageRow>, ChatError> {
    let rows = sqlx::query_as::<_, ConversationPageRow>(
        "SELECT conversation_id, conversation_created_at, model, provider, message_data
         FROM fetch_conversation_messages($1, $2, $3, $4)",
    )
    .bind(user_id)
    .bind(chat_id)
    .bind(limit)
    .bind(before)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
