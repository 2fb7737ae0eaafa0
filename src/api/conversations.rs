use super::{ApiResult, AppState};
use crate::conversations::{ConversationView, MessageView, DEFAULT_MESSAGE_LIMIT};
use crate::database::models::ConversationRecord;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::stream::Stream;
use futures_util::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;

#[derive(Debug, Deserialize)]
pub(crate) struct ResolveRequest {
    user_id: String,
    other_user_id: String,
}

pub(crate) async fn resolve_conversation(
    State(state): State<AppState>,
    Json(payload): Json<ResolveRequest>,
) -> ApiResult<ConversationRecord> {
    let conversation = state
        .conversations
        .resolve(&payload.user_id, &payload.other_user_id)?;
    Ok(Json(conversation))
}

pub(crate) async fn list_conversations(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<ConversationView>> {
    let conversations = state.conversations.conversations_of(&id)?;
    Ok(Json(conversations))
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagesQuery {
    #[serde(default)]
    limit: Option<usize>,
}

pub(crate) async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<Vec<MessageView>> {
    let limit = query.limit.unwrap_or(DEFAULT_MESSAGE_LIMIT);
    let messages = state.conversations.messages(&id, limit)?;
    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SendMessageRequest {
    user_id: String,
    content: String,
}

pub(crate) async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<SendMessageRequest>,
) -> ApiResult<MessageView> {
    let message = state
        .conversations
        .send_message(&id, &payload.user_id, &payload.content)
        .await?;
    Ok(Json(message))
}

/// Live message feed for a conversation as server-sent events. The stream
/// starts at subscription time; history comes from the messages endpoint.
pub(crate) async fn conversation_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, super::ApiError> {
    let subscription = state.conversations.subscribe(&id).await?;
    let stream = subscription.into_stream().filter_map(|envelope| async move {
        match Event::default().json_data(&envelope) {
            Ok(event) => Some(Ok::<_, Infallible>(event)),
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize event");
                None
            }
        }
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
