use super::{ApiResult, AppState};
use crate::notifications::NotificationView;
use crate::realtime::user_topic;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::stream::Stream;
use futures_util::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;

pub(crate) async fn list_notifications(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<NotificationView>> {
    let notifications = state.notifications.list_for(&id)?;
    Ok(Json(notifications))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActorBody {
    user_id: String,
}

pub(crate) async fn mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ActorBody>,
) -> ApiResult<NotificationView> {
    let updated = state.notifications.mark_read(&id, &payload.user_id)?;
    Ok(Json(updated))
}

/// Live notification feed for a user as server-sent events.
pub(crate) async fn notification_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.realtime.subscribe(&user_topic(&id)).await;
    let stream = subscription.into_stream().filter_map(|envelope| async move {
        match Event::default().json_data(&envelope) {
            Ok(event) => Some(Ok::<_, Infallible>(event)),
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize event");
                None
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
