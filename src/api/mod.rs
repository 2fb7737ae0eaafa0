mod conversations;
mod feed;
mod friendships;
mod media;
mod notifications;
mod profiles;
mod stories;

use crate::config::CuraConfig;
use crate::conversations::ConversationService;
use crate::database::Database;
use crate::error::CoreError;
use crate::feed::FeedService;
use crate::friendships::FriendshipService;
use crate::media::{MediaService, MediaUpload};
use crate::notifications::NotificationService;
use crate::profiles::ProfileService;
use crate::realtime::FanoutRouter;
use crate::storage::ObjectStore;
use crate::stories::StoryService;
use anyhow::Result;
use axum::extract::multipart::Multipart;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: CuraConfig,
    pub database: Database,
    pub realtime: FanoutRouter,
    pub feed: FeedService,
    pub friendships: FriendshipService,
    pub conversations: ConversationService,
    pub stories: StoryService,
    pub notifications: NotificationService,
    pub profiles: ProfileService,
    pub media: MediaService,
    pub store: ObjectStore,
}

pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Conflict(String),
    NotFound(String),
    Unavailable(String),
    Internal(anyhow::Error),
}

impl ApiError {
    fn into_response_parts(self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse { message: msg }),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, ErrorResponse { message: msg }),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse { message: msg }),
            ApiError::Unavailable(msg) => {
                tracing::warn!(%msg, "backing store unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse {
                        message: "service temporarily unavailable".into(),
                    },
                )
            }
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        message: "internal server error".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.into_response_parts();
        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => ApiError::BadRequest(msg),
            CoreError::Conflict(msg) => ApiError::Conflict(msg),
            CoreError::NotFound(msg) => ApiError::NotFound(msg),
            CoreError::Unavailable(msg) => ApiError::Unavailable(msg),
            CoreError::Internal(msg) => ApiError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

/// Caps a store-touching future at the configured timeout so one stuck
/// operation cannot pin a request forever.
pub(crate) async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::Unavailable("operation timed out".into())),
    }
}

pub(crate) struct UploadField {
    pub file_name: String,
    pub mime: String,
    pub data: Vec<u8>,
}

impl UploadField {
    pub fn into_media_upload(self) -> MediaUpload {
        MediaUpload {
            file_name: self.file_name,
            mime: self.mime,
            data: self.data,
        }
    }
}

/// Drains a multipart body into the single expected file field plus any
/// text fields alongside it.
pub(crate) async fn read_upload(
    mut multipart: Multipart,
) -> Result<(UploadField, HashMap<String, String>), ApiError> {
    let mut file: Option<UploadField> = None;
    let mut fields = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(format!("invalid multipart body: {err}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if field.file_name().is_some() {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let mime = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|err| ApiError::BadRequest(format!("failed to read upload: {err}")))?;
            file = Some(UploadField {
                file_name,
                mime,
                data: data.to_vec(),
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|err| ApiError::BadRequest(format!("invalid form field: {err}")))?;
            fields.insert(name, value);
        }
    }

    let file = file.ok_or_else(|| ApiError::BadRequest("missing file field".into()))?;
    Ok((file, fields))
}

pub fn build_state(config: CuraConfig, database: Database) -> AppState {
    let realtime = FanoutRouter::new();
    let store = ObjectStore::new(&config.paths.media_dir);
    let media = MediaService::new(store.clone());
    let notifications = NotificationService::new(database.clone(), realtime.clone());
    let profiles = ProfileService::new(
        database.clone(),
        media.clone(),
        notifications.clone(),
        config.clone(),
    );
    AppState {
        feed: FeedService::new(database.clone()),
        friendships: FriendshipService::new(database.clone(), notifications.clone()),
        conversations: ConversationService::new(database.clone(), realtime.clone()),
        stories: StoryService::new(database.clone()),
        notifications,
        profiles,
        media,
        store,
        realtime,
        database,
        config,
    }
}

pub fn router(state: AppState) -> Router {
    let max_body = state.config.max_body_bytes as usize;
    Router::new()
        .route("/health", get(health_handler))
        .route("/posts", get(feed::list_feed).post(feed::create_post))
        .route("/posts/media", post(feed::upload_post_media))
        .route("/posts/:id", get(feed::get_post))
        .route("/posts/:id/like", post(feed::like_post))
        .route("/posts/:id/unlike", post(feed::unlike_post))
        .route("/posts/:id/comments", post(feed::create_comment))
        .route("/stories", get(stories::list_stories).post(stories::create_story))
        .route("/friendships", post(friendships::request_friendship))
        .route("/friendships/:id/accept", post(friendships::accept_friendship))
        .route("/friendships/:id", delete(friendships::remove_friendship))
        .route("/users/:id/friends", get(friendships::list_friends))
        .route("/users/:id/friend-requests", get(friendships::list_pending))
        .route("/conversations", post(conversations::resolve_conversation))
        .route("/users/:id/conversations", get(conversations::list_conversations))
        .route("/conversations/:id/messages", get(conversations::list_messages).post(conversations::send_message))
        .route("/conversations/:id/events", get(conversations::conversation_events))
        .route("/users/:id/notifications", get(notifications::list_notifications))
        .route("/users/:id/events", get(notifications::notification_events))
        .route("/notifications/:id/read", post(notifications::mark_notification_read))
        .route("/profiles/:id", get(profiles::get_profile).put(profiles::upsert_profile))
        .route("/profiles/:id/avatar", post(profiles::upload_avatar))
        .route("/profiles/:id/cover", post(profiles::upload_cover))
        .route("/profiles/:id/verification", put(profiles::set_verification))
        .route("/media/:bucket/:key", get(media::serve_media))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn health_handler() -> ApiResult<serde_json::Value> {
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

pub async fn serve_http(config: CuraConfig, database: Database) -> Result<()> {
    let state = build_state(config.clone(), database);
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(?addr, "HTTP server listening");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
