//! Property assistant endpoints: system prompts, conversations and
//! message exchange with the model.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    ai::{contents_from_messages, ChatSession, Content},
    db::{Message, PropertyWithRelations, Role, Sender},
    error::{is_unique_violation, AppError},
    state::AppState,
};

use super::current_user;

const DEFAULT_CONVERSATION_TITLE: &str = "Property Analysis Chat";

const WELCOME_MESSAGE: &str = "Hello! I'm your EstateFlow property assistant. \
I have an overview of all current listings and I'm happy to help you compare \
properties, narrow down your search or talk through pricing. What are you \
looking for?";

/// A message annotated with its position in the conversation, computed
/// from creation order at read time.
#[derive(Debug, Serialize)]
pub struct IndexedMessage {
    #[serde(flatten)]
    pub message: Message,
    pub index: usize,
}

fn indexed(messages: Vec<Message>) -> Vec<IndexedMessage> {
    messages
        .into_iter()
        .enumerate()
        .map(|(index, message)| IndexedMessage { message, index })
        .collect()
}

/// GET /api/ai/system-prompt
pub async fn get_system_prompt(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = current_user(&state, &headers).await?;

    let prompt = state
        .db
        .get_default_system_prompt(user.role.default_prompt_name())
        .await?
        .ok_or_else(|| AppError::NotFound("Default system prompt not found".to_string()))?;

    Ok(Json(serde_json::json!({
        "message": "System prompt retrieved successfully",
        "prompt": prompt,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSystemPromptRequest {
    pub name: String,
    pub new_content: String,
}

/// PUT /api/ai/system-prompt (admin only)
pub async fn update_system_prompt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdateSystemPromptRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = current_user(&state, &headers).await?;

    if user.role != Role::Admin {
        return Err(AppError::Forbidden(
            "Only admins can update system prompts".to_string(),
        ));
    }
    if req.name.is_empty() || req.new_content.is_empty() {
        return Err(AppError::BadRequest(
            "Missing required fields: name or newContent".to_string(),
        ));
    }

    let prompt = state
        .db
        .update_system_prompt(&req.name, &req.new_content)
        .await?
        .ok_or_else(|| AppError::NotFound("System prompt not found".to_string()))?;

    tracing::info!("System prompt '{}' updated by {}", req.name, user.id);

    Ok(Json(serde_json::json!({
        "message": "System prompt updated successfully",
        "prompt": prompt,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub title: Option<String>,
}

/// POST /api/ai/conversations
///
/// Seeds the conversation with the role-appropriate system prompt plus a
/// summary of every current listing, hidden from the user, and a visible
/// welcome message. The model session opens with exactly that exchange.
pub async fn create_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let user = current_user(&state, &headers).await?;

    let prompt = state
        .db
        .get_default_system_prompt(user.role.default_prompt_name())
        .await?
        .ok_or_else(|| AppError::NotFound("Default system prompt not found".to_string()))?;

    let properties = state.db.list_properties().await?;
    if properties.is_empty() {
        return Err(AppError::NotFound(
            "No properties found for analysis".to_string(),
        ));
    }

    let seed_content = format!(
        "{}\n\n### Available Properties:\n{}",
        prompt.content,
        build_property_summary(&properties)
    );

    let title = req
        .title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_CONVERSATION_TITLE.to_string());

    let (conversation, seed, welcome) = state
        .db
        .create_conversation(&user.id, &prompt.id, &title, &seed_content, WELCOME_MESSAGE)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("User already has an active conversation".to_string())
            } else {
                AppError::from(e)
            }
        })?;

    // Open the model session with the seed exchange so the first user
    // message doesn't need a history replay.
    let slot = state.chat_sessions.slot(&conversation.id);
    *slot.session.lock().await = Some(ChatSession::from_contents(vec![
        Content::user(seed.content.clone()),
        Content::model(welcome.content.clone()),
    ]));

    tracing::info!(
        "Created conversation {} for user {}",
        conversation.id,
        user.id
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Conversation created with property analysis",
            "conversation": conversation,
            "initialMessage": seed,
            "welcomeMessage": welcome,
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

/// POST /api/ai/conversations/messages
pub async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = current_user(&state, &headers).await?;

    if req.message.is_empty() {
        return Err(AppError::BadRequest(
            "Missing required field: message".to_string(),
        ));
    }

    let conversation = state
        .db
        .get_active_conversation(&user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("No active conversation found".to_string()))?;

    let user_message = state
        .db
        .insert_message(&conversation.id, Sender::User, &req.message, true)
        .await?;

    // The slot mutex serializes concurrent sends on the same conversation;
    // everything from session rebuild to reply persistence runs under it.
    let slot = state.chat_sessions.slot(&conversation.id);
    let mut session_guard = slot.session.lock().await;

    let mut session = match session_guard.take() {
        Some(session) => session,
        None => {
            // No live session (restart or eviction): rebuild the model
            // context from persisted history, excluding the message we
            // just inserted.
            let history: Vec<Message> = state
                .db
                .get_messages(&conversation.id)
                .await?
                .into_iter()
                .filter(|m| m.id != user_message.id)
                .collect();
            tracing::debug!(
                "Rebuilding model session for conversation {} from {} messages",
                conversation.id,
                history.len()
            );
            ChatSession::from_contents(contents_from_messages(&history))
        }
    };

    let result = state.ai.send(&mut session, &req.message).await;
    // Keep the session cached whether or not the model call succeeded;
    // a failed call leaves its history unchanged.
    *session_guard = Some(session);
    drop(session_guard);
    let reply = result?;

    let ai_message = state
        .db
        .insert_message(&conversation.id, Sender::Ai, &reply, true)
        .await?;
    state.db.touch_conversation(&conversation.id).await?;

    // Annotate both messages with their read-time position
    let all = state.db.get_messages(&conversation.id).await?;
    let position = |id: &str| all.iter().position(|m| m.id == id).unwrap_or(all.len());
    let user_index = position(&user_message.id);
    let ai_index = position(&ai_message.id);

    let user_payload = IndexedMessage {
        message: user_message,
        index: user_index,
    };
    let ai_payload = IndexedMessage {
        message: ai_message,
        index: ai_index,
    };

    Ok(Json(serde_json::json!({
        "message": "Message sent successfully",
        "userMessage": user_payload,
        "aiResponse": ai_payload,
    })))
}

/// GET /api/ai/conversations/history
pub async fn get_conversation_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = current_user(&state, &headers).await?;

    let conversation = state
        .db
        .get_active_conversation(&user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("No active conversation found".to_string()))?;

    let messages = state.db.get_messages(&conversation.id).await?;
    Ok(Json(serde_json::json!({ "messages": indexed(messages) })))
}

/// GET /api/ai/conversations/visible-history
pub async fn get_visible_conversation_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = current_user(&state, &headers).await?;

    let conversation = state
        .db
        .get_active_conversation(&user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("No active conversation found".to_string()))?;

    let messages = state.db.get_visible_messages(&conversation.id).await?;
    Ok(Json(serde_json::json!({ "messages": indexed(messages) })))
}

/// Textual listing snapshot embedded into a conversation's hidden seed
/// message.
fn build_property_summary(properties: &[PropertyWithRelations]) -> String {
    properties
        .iter()
        .map(|entry| {
            let p = &entry.property;
            let pricing = if entry.pricing_history.is_empty() {
                "None".to_string()
            } else {
                entry
                    .pricing_history
                    .iter()
                    .map(|ph| format!("{} {} on {}", ph.price, ph.currency, ph.effective_date))
                    .collect::<Vec<_>>()
                    .join(", ")
            };

            format!(
                "- ID: {}\n  Title: {}\n  Type: {}\n  Transaction: {}\n  Price: {} {}\n  Size: {}\n  Rooms: {}\n  Address: {}\n  Status: {}\n  Is Verified: {}\n  Images: {} images\n  Pricing History: {}",
                p.id,
                p.title,
                p.property_type.as_str(),
                p.transaction_type.as_str(),
                p.price,
                p.currency,
                p.size
                    .map(|s| format!("{} sqm", s))
                    .unwrap_or_else(|| "Unknown".to_string()),
                p.rooms
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "Unknown".to_string()),
                p.address,
                p.status.as_str(),
                if p.is_verified { "Yes" } else { "No" },
                entry.images.len(),
                pricing,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        PricingHistory, Property, PropertyStatus, PropertyType, TransactionType,
    };

    fn sample_entry() -> PropertyWithRelations {
        let property = Property {
            id: "prop-1".to_string(),
            owner_id: "owner-1".to_string(),
            is_verified: true,
            title: "Modern Downtown Apartment".to_string(),
            description: None,
            property_type: PropertyType::Apartment,
            transaction_type: TransactionType::Sale,
            price: 280000.0,
            currency: "USD".to_string(),
            size: Some(85.0),
            rooms: Some(2),
            address: "Main Street 1".to_string(),
            status: PropertyStatus::Active,
            document_url: None,
            verification_comments: None,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        };
        PropertyWithRelations {
            property,
            images: Vec::new(),
            views: Vec::new(),
            pricing_history: vec![PricingHistory {
                id: "ph-1".to_string(),
                property_id: "prop-1".to_string(),
                price: 280000.0,
                currency: "USD".to_string(),
                effective_date: "2024-01-01T00:00:00Z".to_string(),
            }],
        }
    }

    #[test]
    fn test_property_summary_contains_key_fields() {
        let summary = build_property_summary(&[sample_entry()]);
        assert!(summary.contains("ID: prop-1"));
        assert!(summary.contains("Type: apartment"));
        assert!(summary.contains("Transaction: sale"));
        assert!(summary.contains("Price: 280000 USD"));
        assert!(summary.contains("Size: 85 sqm"));
        assert!(summary.contains("Is Verified: Yes"));
        assert!(summary.contains("Images: 0 images"));
        assert!(summary.contains("280000 USD on 2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_indexed_messages_are_sequential() {
        let make = |content: &str| Message {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: "c".to_string(),
            sender: Sender::User,
            content: content.to_string(),
            token_count: None,
            is_visible: true,
            property_id: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        let annotated = indexed(vec![make("a"), make("b"), make("c")]);
        assert_eq!(
            annotated.iter().map(|m| m.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );

        let json = serde_json::to_value(&annotated[1]).unwrap();
        assert_eq!(json["index"], 1);
        assert_eq!(json["content"], "b");
    }
}
