// src/chat/service.rs
// The request flows. Each one is a strict sequence: config read, ownership
// and input checks, credit floor, provider call, billing, debit, then the
// atomic content write. The debit always lands before the content write.
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::chat::store::{self, ContinueChatArgs, EditChatArgs, RegenerateArgs, StartChatArgs};
use crate::config::{self, ChatConfig};
use crate::error::ChatError;
use crate::models::chat::Turn;
use crate::providers::{self, Completion, CompletionRequest};
use crate::services::{credits, pricing};
use crate::services::pricing::CostBreakdown;

const MAX_TITLE_CHARS: usize = 280;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub chat_id: Option<Uuid>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub message: String,
    pub chat_id: Uuid,
    pub conversation_id: Uuid,
    pub generated_text: String,
    pub credits_utilised: Decimal,
    pub provider: String,
    pub model: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct EditPromptRequest {
    pub chat_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EditPromptResponse {
    pub success: bool,
    pub message: String,
    pub chat_id: Uuid,
    pub generated_text: String,
    pub credits_utilised: Decimal,
    pub provider: String,
    pub model: String,
    pub new_conversation_id: Uuid,
    pub edited_conversation_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RegenerateRequest {
    pub chat_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct RegenerateResponse {
    pub success: bool,
    pub message: String,
    pub chat_id: Uuid,
    pub conversation_id: Uuid,
    pub generated_text: String,
    pub credits_utilised: Decimal,
    pub provider: String,
    pub model: String,
}

struct CompletionOutcome {
    completion: Completion,
    cost: CostBreakdown,
    tokens_consumed: i64,
}

/// Send a message: starts a chat when no chat_id is supplied, otherwise
/// continues the existing one. Provider and model are pinned to the chat row
/// once it exists; the caller cannot change them mid-chat.
pub async fn send_message(
    pool: &PgPool,
    user_id: &str,
    request: &SendMessageRequest,
) -> Result<ChatResponse, ChatError> {
    let config = config::fetch_secret()?;
    let account = store::user_credits(pool, user_id).await?;
    let text = required_text(&request.text, "text")?;

    let existing = match request.chat_id {
        Some(chat_id) => Some(store::fetch_chat(pool, chat_id, user_id).await?),
        None => None,
    };
    let (provider_name, model) = match &existing {
        Some(chat) => (chat.provider.clone(), chat.model.clone()),
        None => {
            let provider = required_text(&request.provider, "provider")?.to_string();
            let model = required_text(&request.model, "model")?.to_string();
            if !config.is_model_allowed(&provider, &model) {
                return Err(ChatError::UnsupportedModel { provider, model });
            }
            (provider, model)
        }
    };
    let history: &[Turn] = existing
        .as_ref()
        .map(|chat| chat.previous_conversation.0.as_slice())
        .unwrap_or(&[]);

    let outcome =
        run_completion(&config, &provider_name, &model, account.credits, history, text, false).await?;

    let title = match &existing {
        Some(chat) => chat.title.clone(),
        None => truncate_title(text),
    };

    credits::debit_credits(pool, user_id, account.credits, outcome.cost.credits_utilised).await?;

    let (chat_id, conversation_id) = match &existing {
        None => {
            store::start_chat(
                pool,
                &StartChatArgs {
                    user_id,
                    title: &title,
                    user_message: text,
                    assistant_message: &outcome.completion.generated_text,
                    credits_used: outcome.cost.credits_utilised,
                    ai_cost: outcome.cost.ai_cost,
                    model: &model,
                    provider: &provider_name,
                    tokens_consumed: outcome.tokens_consumed,
                },
            )
            .await?
        }
        Some(chat) => {
            let conversation_id = store::continue_chat(
                pool,
                &ContinueChatArgs {
                    chat_id: chat.chat_id,
                    user_message: text,
                    assistant_message: &outcome.completion.generated_text,
                    credits_used: outcome.cost.credits_utilised,
                    ai_cost: outcome.cost.ai_cost,
                    tokens_consumed: outcome.tokens_consumed,
                },
            )
            .await?;
            (chat.chat_id, conversation_id)
        }
    };

    Ok(ChatResponse {
        success: true,
        message: "Success".to_string(),
        chat_id,
        conversation_id,
        generated_text: outcome.completion.generated_text,
        credits_utilised: outcome.cost.credits_utilised,
        provider: provider_name,
        model,
        title,
    })
}

/// Revise an earlier prompt. The superseded conversation stays untouched;
/// a new node is appended pointing back at it, so the client can show the
/// branch lineage.
pub async fn edit_prompt(
    pool: &PgPool,
    user_id: &str,
    request: &EditPromptRequest,
) -> Result<EditPromptResponse, ChatError> {
    let config = config::fetch_secret()?;
    let account = store::user_credits(pool, user_id).await?;
    let chat_id = required_id(request.chat_id, "chat_id")?;
    let conversation_id = required_id(request.conversation_id, "conversation_id")?;
    let text = required_text(&request.text, "text")?;

    let tip = store::latest_conversation(pool, chat_id, user_id).await?;
    ensure_model_allowed(&config, &tip.provider, &tip.model)?;
    // Optimistic-concurrency check: only the current tip may be edited.
    if tip.conversation_id != conversation_id {
        return Err(ChatError::ConversationMismatch);
    }

    let history = store::previous_messages_for_edit(pool, chat_id, conversation_id).await?;
    let outcome =
        run_completion(&config, &tip.provider, &tip.model, account.credits, &history, text, false).await?;

    credits::debit_credits(pool, user_id, account.credits, outcome.cost.credits_utilised).await?;

    let new_conversation_id = store::edit_chat(
        pool,
        &EditChatArgs {
            conversation_id,
            user_message: text,
            assistant_message: &outcome.completion.generated_text,
            credits_used: outcome.cost.credits_utilised,
            ai_cost: outcome.cost.ai_cost,
            tokens_consumed: outcome.tokens_consumed,
        },
    )
    .await?;

    Ok(EditPromptResponse {
        success: true,
        message: "Success".to_string(),
        chat_id: tip.chat_id,
        generated_text: outcome.completion.generated_text,
        credits_utilised: outcome.cost.credits_utilised,
        provider: tip.provider,
        model: tip.model,
        new_conversation_id,
        edited_conversation_id: conversation_id,
    })
}

/// Redo the assistant half of the most recent round. Reuses the stored user
/// message, sets the regeneration penalty, and overwrites the conversation
/// in place; no new id is created.
pub async fn regenerate(
    pool: &PgPool,
    user_id: &str,
    request: &RegenerateRequest,
) -> Result<RegenerateResponse, ChatError> {
    let config = config::fetch_secret()?;
    let account = store::user_credits(pool, user_id).await?;
    let chat_id = required_id(request.chat_id, "chat_id")?;
    let conversation_id = required_id(request.conversation_id, "conversation_id")?;

    let tip = store::latest_conversation(pool, chat_id, user_id).await?;
    ensure_model_allowed(&config, &tip.provider, &tip.model)?;
    if tip.conversation_id != conversation_id {
        return Err(ChatError::ConversationMismatch);
    }

    let messages = store::conversation_messages(pool, tip.conversation_id).await?;
    // A plain round holds exactly a user and an assistant message; more means
    // this turn was already regenerated.
    if messages.len() > 2 {
        return Err(ChatError::RegenerateLimit);
    }
    let user_message = messages
        .iter()
        .find(|m| m.sender_role == "user")
        .map(|m| m.message.clone())
        .ok_or(ChatError::ChatNotFound)?;

    let history = store::previous_messages_for_edit(pool, chat_id, tip.conversation_id).await?;
    let outcome = run_completion(
        &config,
        &tip.provider,
        &tip.model,
        account.credits,
        &history,
        &user_message,
        true,
    )
    .await?;

    credits::debit_credits(pool, user_id, account.credits, outcome.cost.credits_utilised).await?;

    store::regenerate_assistant_message(
        pool,
        &RegenerateArgs {
            conversation_id: tip.conversation_id,
            assistant_message: &outcome.completion.generated_text,
            credits_used: outcome.cost.credits_utilised,
            ai_cost: outcome.cost.ai_cost,
            tokens_consumed: outcome.tokens_consumed,
        },
    )
    .await?;

    Ok(RegenerateResponse {
        success: true,
        message: "Success".to_string(),
        chat_id: tip.chat_id,
        conversation_id: tip.conversation_id,
        generated_text: outcome.completion.generated_text,
        credits_utilised: outcome.cost.credits_utilised,
        provider: tip.provider,
        model: tip.model,
    })
}

/// Catalog lookup, credit floor, provider call, billing — shared by every
/// flow. The floor gates entry only; the charge itself may overdraw.
async fn run_completion(
    config: &ChatConfig,
    provider_name: &str,
    model: &str,
    balance: Decimal,
    history: &[Turn],
    text: &str,
    regenerate: bool,
) -> Result<CompletionOutcome, ChatError> {
    let provider = config.provider(provider_name).ok_or_else(|| ChatError::UnsupportedModel {
        provider: provider_name.to_string(),
        model: model.to_string(),
    })?;
    let model_config = provider.model(model).ok_or_else(|| ChatError::UnsupportedModel {
        provider: provider_name.to_string(),
        model: model.to_string(),
    })?;

    credits::check_credits(balance, model_config.min_credits)?;

    let request = CompletionRequest {
        model,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        history,
        text,
        regenerate,
    };
    let completion = providers::dispatch(provider, &request)
        .await
        .map_err(|e| ChatError::UpstreamRequestFailed(e.to_string()))?;

    let cost = pricing::bill_completion(
        model,
        completion.input_units,
        completion.output_units,
        provider.id.is_reseller(),
        config.cost_factor,
    )?;
    let tokens_consumed = i64::from(completion.input_units) + i64::from(completion.output_units);

    tracing::info!(
        provider = provider_name,
        model = model,
        input_units = completion.input_units,
        output_units = completion.output_units,
        "completion billed at {} credits",
        cost.credits_utilised
    );

    Ok(CompletionOutcome { completion, cost, tokens_consumed })
}

fn ensure_model_allowed(config: &ChatConfig, provider: &str, model: &str) -> Result<(), ChatError> {
    if !config.is_model_allowed(provider, model) {
        return Err(ChatError::UnsupportedModel {
            provider: provider.to_string(),
            model: model.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn required_text<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, ChatError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(ChatError::MissingField(field))
}

pub(crate) fn required_id(value: Option<Uuid>, field: &'static str) -> Result<Uuid, ChatError> {
    value.ok_or(ChatError::MissingField(field))
}

/// A new chat is titled with its first message, capped at 280 characters.
fn truncate_title(text: &str) -> String {
    if text.chars().count() > MAX_TITLE_CHARS {
        text.chars().take(MAX_TITLE_CHARS).collect()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_becomes_the_title_unchanged() {
        assert_eq!(truncate_title("hi"), "hi");
    }

    #[test]
    fn test_long_titles_are_capped_at_280_chars() {
        let text = "x".repeat(500);
        let title = truncate_title(&text);
        assert_eq!(title.chars().count(), 280);
        assert!(text.starts_with(&title));
    }

    #[test]
    fn test_required_text_rejects_missing_and_empty() {
        assert!(matches!(required_text(&None, "text"), Err(ChatError::MissingField("text"))));
        assert!(matches!(
            required_text(&Some(String::new()), "text"),
            Err(ChatError::MissingField("text"))
        ));
        assert_eq!(required_text(&Some("hi".into()), "text").unwrap(), "hi");
    }

    #[test]
    fn test_required_id_rejects_missing() {
        assert!(matches!(
            required_id(None, "conversation_id"),
            Err(ChatError::MissingField("conversation_id"))
        ));
        let id = Uuid::new_v4();
        assert_eq!(required_id(Some(id), "conversation_id").unwrap(), id);
    }
}
