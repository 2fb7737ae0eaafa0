use super::{bounded, read_upload, ApiError, ApiResult, AppState};
use crate::feed::{CommentView, NewPost, PostView, DEFAULT_FEED_LIMIT};
use crate::media::MediaKind;
use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct FeedQuery {
    #[serde(default)]
    limit: Option<usize>,
}

pub(crate) async fn list_feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> ApiResult<Vec<PostView>> {
    let limit = query.limit.unwrap_or(DEFAULT_FEED_LIMIT);
    let posts = state.feed.feed(limit)?;
    Ok(Json(posts))
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatePostRequest {
    user_id: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    media_url: Option<String>,
}

pub(crate) async fn create_post(
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> ApiResult<PostView> {
    let post = state.feed.create_post(
        &payload.user_id,
        NewPost {
            content: payload.content,
            media_url: payload.media_url,
        },
    )?;
    Ok(Json(post))
}

#[derive(Debug, Serialize)]
pub(crate) struct MediaUrlResponse {
    pub media_url: String,
}

/// Uploads post media ahead of post creation and returns the URL to embed.
pub(crate) async fn upload_post_media(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<MediaUrlResponse> {
    let (file, _) = read_upload(multipart).await?;
    let media_url = bounded(state.config.store_timeout, async {
        state
            .media
            .store_media(MediaKind::Post, file.into_media_upload())
            .await
            .map_err(ApiError::from)
    })
    .await?;
    Ok(Json(MediaUrlResponse { media_url }))
}

pub(crate) async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PostView> {
    let post = state.feed.get_post(&id)?;
    Ok(Json(post))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActorRequest {
    user_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LikeResponse {
    pub liked: bool,
}

pub(crate) async fn like_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ActorRequest>,
) -> ApiResult<LikeResponse> {
    let liked = state.feed.like(&id, &payload.user_id)?;
    Ok(Json(LikeResponse { liked }))
}

pub(crate) async fn unlike_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ActorRequest>,
) -> ApiResult<LikeResponse> {
    state.feed.unlike(&id, &payload.user_id)?;
    Ok(Json(LikeResponse { liked: false }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateCommentRequest {
    user_id: String,
    content: String,
    #[serde(default)]
    parent_comment_id: Option<String>,
}

pub(crate) async fn create_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<CreateCommentRequest>,
) -> ApiResult<CommentView> {
    let comment = state.feed.comment(
        &id,
        &payload.user_id,
        &payload.content,
        payload.parent_comment_id.as_deref(),
    )?;
    Ok(Json(comment))
}
