use super::{bounded, read_upload, ApiError, ApiResult, AppState};
use crate::database::models::StoryRecord;
use crate::media::MediaKind;
use crate::stories::{default_ttl, StoryView};
use axum::extract::{Multipart, State};
use axum::Json;

pub(crate) async fn list_stories(State(state): State<AppState>) -> ApiResult<Vec<StoryView>> {
    let stories = state.stories.list_active()?;
    Ok(Json(stories))
}

/// Multipart upload: one file field plus a `user_id` text field. The media
/// lands in the story bucket and the story row points at its public URL.
pub(crate) async fn create_story(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<StoryRecord> {
    let (file, fields) = read_upload(multipart).await?;
    let user_id = fields
        .get("user_id")
        .ok_or_else(|| ApiError::BadRequest("missing user_id field".into()))?
        .clone();

    let media_url = bounded(state.config.store_timeout, async {
        state
            .media
            .store_media(MediaKind::Story, file.into_media_upload())
            .await
            .map_err(ApiError::from)
    })
    .await?;

    let story = state.stories.create(&user_id, &media_url, default_ttl())?;
    Ok(Json(story))
}
