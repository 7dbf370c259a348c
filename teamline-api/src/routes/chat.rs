/// Chat assistant endpoints
///
/// `POST /api/v1/chat/sessions`       — create a session
/// `GET /api/v1/chat/sessions`        — list the caller's sessions
/// `GET /api/v1/chat/sessions/:id`    — one session with its messages
/// `DELETE /api/v1/chat/sessions/:id` — delete a session
/// `POST /api/v1/chat/messages`       — send a message, get the reply
///
/// Sessions are strictly per-user: another user's session id behaves
/// like a missing one. Sending into no session creates one implicitly.
///
/// A send persists the user message, replays the whole session history
/// oldest-first to the generation API together with the fixed system
/// instruction, persists the reply, and bumps the session timestamp.
/// If the upstream call fails the user message stays, no assistant row
/// is written, and the caller gets a 502 — there is no retry.

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use teamline_shared::assistant::{ChatTurn, TurnRole, SYSTEM_INSTRUCTION};
use teamline_shared::auth::middleware::AuthContext;
use teamline_shared::models::chat_message::{ChatMessage, ChatRole};
use teamline_shared::models::chat_session::ChatSession;

/// Create session request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateSessionRequest {
    /// Optional display name; defaults to a timestamped one
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
}

/// Send message request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendMessageRequest {
    /// Target session; a new one is created when absent
    pub session_id: Option<Uuid>,

    #[validate(length(min = 1, max = 20000))]
    pub message: String,
}

/// Session response
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Present on single-session responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<MessageResponse>>,
}

impl SessionResponse {
    fn from_session(session: ChatSession, messages: Option<Vec<ChatMessage>>) -> Self {
        Self {
            id: session.id,
            name: session.name,
            created_at: session.created_at,
            updated_at: session.updated_at,
            messages: messages
                .map(|list| list.into_iter().map(MessageResponse::from).collect()),
        }
    }
}

/// Message response
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<ChatMessage> for MessageResponse {
    fn from(message: ChatMessage) -> Self {
        Self {
            id: message.id,
            session_id: message.session_id,
            role: message.role,
            content: message.content,
            created_at: message.created_at,
        }
    }
}

fn default_session_name() -> String {
    format!("Chat {}", Utc::now().format("%Y-%m-%d %H:%M"))
}

/// Maps the stored log into the generation API's role vocabulary
///
/// Everything that is not the user — assistant replies, system notes —
/// replays as `model`.
fn replay_history(messages: &[ChatMessage]) -> Vec<ChatTurn> {
    messages
        .iter()
        .map(|message| ChatTurn {
            role: match message.role {
                ChatRole::User => TurnRole::User,
                ChatRole::Assistant | ChatRole::System => TurnRole::Model,
            },
            text: message.content.clone(),
        })
        .collect()
}

/// Creates a session
pub async fn create_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    request.validate()?;

    let name = request.name.unwrap_or_else(default_session_name);
    let session = ChatSession::create(&state.db, auth.user_id, &name).await?;

    tracing::info!(session_id = %session.id, user_id = %auth.user_id, "Chat session created");

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse::from_session(session, Some(Vec::new()))),
    ))
}

/// Lists the caller's sessions, most recently active first
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<SessionResponse>>> {
    let sessions = ChatSession::list_by_user(&state.db, auth.user_id).await?;

    Ok(Json(
        sessions
            .into_iter()
            .map(|session| SessionResponse::from_session(session, None))
            .collect(),
    ))
}

/// Fetches one session with its ordered message log
pub async fn get_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionResponse>> {
    let session = ChatSession::find_for_user(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Chat session not found: {}", id)))?;

    let messages = ChatMessage::list_by_session(&state.db, id).await?;
    Ok(Json(SessionResponse::from_session(session, Some(messages))))
}

/// Deletes one of the caller's sessions
pub async fn delete_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let deleted = ChatSession::delete_for_user(&state.db, id, auth.user_id).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("Chat session not found: {}", id)));
    }

    tracing::info!(session_id = %id, "Chat session deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Sends a message and returns the assistant's reply
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<Json<MessageResponse>> {
    request.validate()?;

    let session = match request.session_id {
        Some(id) => ChatSession::find_for_user(&state.db, id, auth.user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Chat session not found: {}", id)))?,
        None => ChatSession::create(&state.db, auth.user_id, &default_session_name()).await?,
    };

    ChatMessage::create(&state.db, session.id, ChatRole::User, &request.message).await?;

    // Full history, user message included, oldest first.
    let history = ChatMessage::list_by_session(&state.db, session.id).await?;
    let turns = replay_history(&history);

    let reply = state.assistant.generate(&turns, SYSTEM_INSTRUCTION).await?;

    let assistant_message =
        ChatMessage::create(&state.db, session.id, ChatRole::Assistant, &reply).await?;
    ChatSession::touch(&state.db, session.id).await?;

    tracing::info!(
        session_id = %session.id,
        turns = history.len(),
        "Assistant reply recorded"
    );

    Ok(Json(assistant_message.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(role: ChatRole, content: &str) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_send_message_request_validation() {
        let valid = SendMessageRequest {
            session_id: None,
            message: "How should I prioritize this sprint?".to_string(),
        };
        assert!(valid.validate().is_ok());

        let empty = SendMessageRequest {
            session_id: None,
            message: String::new(),
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_replay_history_role_mapping() {
        let history = vec![
            message(ChatRole::User, "hello"),
            message(ChatRole::Assistant, "hi"),
            message(ChatRole::System, "note"),
        ];

        let turns = replay_history(&history);

        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(turns[1].role, TurnRole::Model);
        assert_eq!(turns[2].role, TurnRole::Model);
        assert_eq!(turns[0].text, "hello");
    }

    #[test]
    fn test_default_session_name_is_timestamped() {
        let name = default_session_name();
        assert!(name.starts_with("Chat "));
    }

    #[test]
    fn test_session_listing_omits_messages() {
        let session = ChatSession {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Chat".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(SessionResponse::from_session(session, None)).unwrap();
        assert!(json.get("messages").is_none());
    }
}
