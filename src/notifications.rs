//! Persistent notifications plus live delivery to the recipient's topic.

use crate::database::models::NotificationRecord;
use crate::database::repositories::NotificationRepository;
use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::realtime::{user_topic, EventEnvelope, EventPayload, FanoutRouter};
use crate::utils::now_utc_iso;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationView {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub created_at: String,
}

impl From<NotificationRecord> for NotificationView {
    fn from(record: NotificationRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            kind: record.kind,
            title: record.title,
            body: record.body,
            read: record.read,
            created_at: record.created_at,
        }
    }
}

#[derive(Clone)]
pub struct NotificationService {
    database: Database,
    router: FanoutRouter,
}

impl NotificationService {
    pub fn new(database: Database, router: FanoutRouter) -> Self {
        Self { database, router }
    }

    /// Persists a notification, then publishes it to the recipient's topic.
    /// The write is the source of truth; a missed live event is still
    /// visible on the next list.
    pub async fn notify(
        &self,
        user_id: &str,
        kind: &str,
        title: &str,
        body: &str,
    ) -> CoreResult<NotificationView> {
        let record = NotificationRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind: kind.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            read: false,
            created_at: now_utc_iso(),
        };
        self.database
            .with_repositories(|repos| repos.notifications().create(&record))?;

        let view = NotificationView::from(record);
        self.router
            .publish(EventEnvelope::new(
                user_topic(user_id),
                EventPayload::NotificationCreated(view.clone()),
            ))
            .await;
        Ok(view)
    }

    pub fn list_for(&self, user_id: &str) -> CoreResult<Vec<NotificationView>> {
        let records = self
            .database
            .read_with_retry(|repos| repos.notifications().list_for(user_id))?;
        Ok(records.into_iter().map(NotificationView::from).collect())
    }

    /// Only the recipient may mark a notification read.
    pub fn mark_read(&self, id: &str, acting_user: &str) -> CoreResult<NotificationView> {
        self.database.with_repositories(|repos| {
            let record = repos
                .notifications()
                .get(id)?
                .ok_or_else(|| CoreError::not_found(format!("notification {id} not found")))?;
            if record.user_id != acting_user {
                return Err(CoreError::validation(
                    "only the recipient can mark a notification read",
                ));
            }
            repos.notifications().mark_read(id)?;
            Ok(NotificationView {
                read: true,
                ..NotificationView::from(record)
            })
        })
    }
}
