use super::{bounded, read_upload, ApiError, ApiResult, AppState};
use crate::database::models::ProfileRecord;
use crate::profiles::ProfileUpdate;
use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

pub(crate) async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ProfileRecord> {
    let profile = state.profiles.get(&id)?;
    Ok(Json(profile))
}

pub(crate) async fn upsert_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ProfileUpdate>,
) -> ApiResult<ProfileRecord> {
    let profile = state.profiles.upsert_profile(&id, payload)?;
    Ok(Json(profile))
}

#[derive(Debug, Serialize)]
pub(crate) struct MediaUrlResponse {
    pub url: String,
}

pub(crate) async fn upload_avatar(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult<MediaUrlResponse> {
    let (file, _) = read_upload(multipart).await?;
    let url = bounded(state.config.store_timeout, async {
        state
            .profiles
            .set_avatar(&id, file.into_media_upload())
            .await
            .map_err(ApiError::from)
    })
    .await?;
    Ok(Json(MediaUrlResponse { url }))
}

pub(crate) async fn upload_cover(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult<MediaUrlResponse> {
    let (file, _) = read_upload(multipart).await?;
    let url = bounded(state.config.store_timeout, async {
        state
            .profiles
            .set_cover(&id, file.into_media_upload())
            .await
            .map_err(ApiError::from)
    })
    .await?;
    Ok(Json(MediaUrlResponse { url }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerificationRequest {
    acting_user_id: String,
    verified: bool,
}

pub(crate) async fn set_verification(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<VerificationRequest>,
) -> ApiResult<serde_json::Value> {
    state
        .profiles
        .set_verified(&payload.acting_user_id, &id, payload.verified)
        .await?;
    Ok(Json(serde_json::json!({ "verified": payload.verified })))
}
