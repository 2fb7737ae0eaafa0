use super::{ApiResult, AppState};
use crate::database::models::FriendshipRecord;
use crate::friendships::{FriendView, PendingRequestView};
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct FriendRequestBody {
    user_id: String,
    friend_id: String,
}

pub(crate) async fn request_friendship(
    State(state): State<AppState>,
    Json(payload): Json<FriendRequestBody>,
) -> ApiResult<FriendshipRecord> {
    let record = state
        .friendships
        .request(&payload.user_id, &payload.friend_id)
        .await?;
    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActorBody {
    user_id: String,
}

pub(crate) async fn accept_friendship(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ActorBody>,
) -> ApiResult<FriendshipRecord> {
    let record = state.friendships.accept(&id, &payload.user_id).await?;
    Ok(Json(record))
}

pub(crate) async fn remove_friendship(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ActorBody>,
) -> ApiResult<serde_json::Value> {
    state.friendships.remove(&id, &payload.user_id)?;
    Ok(Json(serde_json::json!({ "removed": true })))
}

pub(crate) async fn list_friends(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<FriendView>> {
    let friends = state.friendships.friends_of(&id)?;
    Ok(Json(friends))
}

pub(crate) async fn list_pending(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<PendingRequestView>> {
    let pending = state.friendships.pending_for(&id)?;
    Ok(Json(pending))
}
