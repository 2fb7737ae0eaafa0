//! Ephemeral stories. Rows outlive their expiry; listing filters them out.

use crate::database::models::StoryRecord;
use crate::database::repositories::StoryRepository;
use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::profiles::{resolve_identities, AuthorIdentity};
use crate::utils::now_utc_iso;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub fn default_ttl() -> Duration {
    Duration::hours(24)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryView {
    pub id: String,
    pub author: AuthorIdentity,
    pub media_url: String,
    pub created_at: String,
    pub expires_at: String,
}

#[derive(Clone)]
pub struct StoryService {
    database: Database,
}

impl StoryService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn create(&self, user_id: &str, media_url: &str, ttl: Duration) -> CoreResult<StoryRecord> {
        if media_url.trim().is_empty() {
            return Err(CoreError::validation("a story needs media"));
        }
        let now = Utc::now();
        let record = StoryRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            media_url: media_url.to_string(),
            created_at: now.to_rfc3339(),
            expires_at: (now + ttl).to_rfc3339(),
        };
        self.database
            .with_repositories(|repos| repos.stories().create(&record))?;
        Ok(record)
    }

    /// Unexpired stories, newest first.
    pub fn list_active(&self) -> CoreResult<Vec<StoryView>> {
        self.list_active_at(&now_utc_iso())
    }

    pub fn list_active_at(&self, now: &str) -> CoreResult<Vec<StoryView>> {
        self.database.read_with_retry(|repos| {
            let records = repos.stories().list_active(now)?;
            let author_ids: Vec<&str> =
                records.iter().map(|record| record.user_id.as_str()).collect();
            let identities = resolve_identities(&repos, author_ids.iter().copied())?;

            Ok(records
                .into_iter()
                .map(|record| {
                    let author = identities
                        .get(&record.user_id)
                        .cloned()
                        .unwrap_or_else(|| AuthorIdentity::placeholder(&record.user_id));
                    StoryView {
                        id: record.id,
                        author,
                        media_url: record.media_url,
                        created_at: record.created_at,
                        expires_at: record.expires_at,
                    }
                })
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> StoryService {
        StoryService::new(Database::open_in_memory().expect("db"))
    }

    #[test]
    fn story_requires_media() {
        let stories = service();
        let err = stories.create("alice", "  ", default_ttl()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn story_is_visible_until_expiry() {
        let stories = service();
        let record = stories
            .create("alice", "/media/story-media/trip.jpg", default_ttl())
            .unwrap();

        let created = chrono::DateTime::parse_from_rfc3339(&record.created_at).unwrap();
        let just_before = (created + Duration::hours(23) + Duration::minutes(59)).to_rfc3339();
        let just_after = (created + Duration::hours(24) + Duration::seconds(1)).to_rfc3339();

        let visible = stories.list_active_at(&just_before).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, record.id);

        let gone = stories.list_active_at(&just_after).unwrap();
        assert!(gone.is_empty());
    }

    #[test]
    fn active_stories_are_newest_first() {
        let stories = service();
        stories
            .create("alice", "/media/story-media/a.jpg", default_ttl())
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let newest = stories
            .create("bob", "/media/story-media/b.jpg", default_ttl())
            .unwrap();

        let listed = stories.list_active().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newest.id);
        assert_eq!(listed[1].author.display_name, "unknown user");
    }

    #[test]
    fn custom_ttl_is_respected() {
        let stories = service();
        let record = stories
            .create("alice", "/media/story-media/a.jpg", Duration::minutes(10))
            .unwrap();
        let created = chrono::DateTime::parse_from_rfc3339(&record.created_at).unwrap();
        let expires = chrono::DateTime::parse_from_rfc3339(&record.expires_at).unwrap();
        assert_eq!(expires - created, Duration::minutes(10));
    }
}
