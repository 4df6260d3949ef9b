// src/models/chat.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One role-tagged turn as stored in a chat's running history snapshot and
/// as sent to the providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: String,
    pub message: String,
}

#[derive(Debug, FromRow)]
pub struct Chat {
    pub chat_id: Uuid,
    pub user_id: String,
    pub title: String,
    pub provider: String,
    pub model: String,
    pub credits_used: Decimal,
    pub ai_cost: Decimal,
    pub total_tokens: Option<i64>,
    pub previous_conversation: sqlx::types::Json<Vec<Turn>>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct Message {
    pub message_id: Uuid,
    pub conversation_id: Uuid,
    pub chat_id: Uuid,
    pub sender_role: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct UserCredits {
    pub user_id: String,
    pub credits: Decimal,
}
