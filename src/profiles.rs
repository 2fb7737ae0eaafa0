//! Profile management and author identity resolution for hydrated views.

use crate::config::CuraConfig;
use crate::database::models::ProfileRecord;
use crate::database::repositories::{ProfileRepository, SqliteRepositories};
use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::media::{MediaKind, MediaService, MediaUpload};
use crate::notifications::NotificationService;
use crate::utils::now_utc_iso;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Compact author descriptor embedded in feed, story and friendship views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorIdentity {
    pub user_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub is_verified: bool,
}

impl AuthorIdentity {
    /// Stand-in for authors whose profile row is missing. Content never
    /// disappears just because its author has no profile yet.
    pub fn placeholder(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            display_name: "unknown user".to_string(),
            avatar_url: None,
            is_verified: false,
        }
    }
}

impl From<ProfileRecord> for AuthorIdentity {
    fn from(record: ProfileRecord) -> Self {
        Self {
            user_id: record.user_id,
            display_name: record.display_name,
            avatar_url: record.avatar_url,
            is_verified: record.is_verified,
        }
    }
}

/// Resolves every distinct id in `user_ids` with one batched lookup,
/// substituting placeholders for the ids that have no profile.
pub(crate) fn resolve_identities<'a, I>(
    repos: &SqliteRepositories<'_>,
    user_ids: I,
) -> CoreResult<HashMap<String, AuthorIdentity>>
where
    I: IntoIterator<Item = &'a str>,
{
    let distinct: BTreeSet<&str> = user_ids.into_iter().collect();
    let ids: Vec<String> = distinct.iter().map(|id| id.to_string()).collect();
    let mut found = repos.profiles().get_many(&ids)?;

    let mut identities = HashMap::with_capacity(ids.len());
    for id in ids {
        let identity = match found.remove(&id) {
            Some(record) => AuthorIdentity::from(record),
            None => {
                tracing::warn!(user_id = %id, "no profile for author, using placeholder");
                AuthorIdentity::placeholder(&id)
            }
        };
        identities.insert(id, identity);
    }
    Ok(identities)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: String,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Clone)]
pub struct ProfileService {
    database: Database,
    media: MediaService,
    notifications: NotificationService,
    config: CuraConfig,
}

impl ProfileService {
    pub fn new(
        database: Database,
        media: MediaService,
        notifications: NotificationService,
        config: CuraConfig,
    ) -> Self {
        Self {
            database,
            media,
            notifications,
            config,
        }
    }

    pub fn upsert_profile(&self, user_id: &str, update: ProfileUpdate) -> CoreResult<ProfileRecord> {
        let name = update.display_name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("display name must not be empty"));
        }
        self.database.with_repositories(|repos| {
            let existing = repos.profiles().get(user_id)?;
            let record = ProfileRecord {
                user_id: user_id.to_string(),
                display_name: name.to_string(),
                bio: update.bio.clone(),
                avatar_url: existing.as_ref().and_then(|p| p.avatar_url.clone()),
                cover_url: existing.as_ref().and_then(|p| p.cover_url.clone()),
                is_verified: existing.as_ref().map(|p| p.is_verified).unwrap_or(false),
                created_at: existing
                    .map(|p| p.created_at)
                    .unwrap_or_else(now_utc_iso),
            };
            repos.profiles().upsert(&record)?;
            Ok(record)
        })
    }

    pub fn get(&self, user_id: &str) -> CoreResult<ProfileRecord> {
        self.database
            .read_with_retry(|repos| repos.profiles().get(user_id))?
            .ok_or_else(|| CoreError::not_found(format!("profile {user_id} not found")))
    }

    pub async fn set_avatar(&self, user_id: &str, upload: MediaUpload) -> CoreResult<String> {
        let url = self.media.store_media(MediaKind::Avatar, upload).await?;
        self.set_media_url(user_id, &url, MediaKind::Avatar)?;
        Ok(url)
    }

    pub async fn set_cover(&self, user_id: &str, upload: MediaUpload) -> CoreResult<String> {
        let url = self.media.store_media(MediaKind::Cover, upload).await?;
        self.set_media_url(user_id, &url, MediaKind::Cover)?;
        Ok(url)
    }

    fn set_media_url(&self, user_id: &str, url: &str, kind: MediaKind) -> CoreResult<()> {
        let changed = self.database.with_repositories(|repos| match kind {
            MediaKind::Avatar => repos.profiles().set_avatar_url(user_id, url),
            MediaKind::Cover => repos.profiles().set_cover_url(user_id, url),
            _ => Err(CoreError::internal("unsupported profile media kind")),
        })?;
        if changed == 0 {
            return Err(CoreError::not_found(format!("profile {user_id} not found")));
        }
        Ok(())
    }

    /// Toggles the verification badge. Restricted to configured admins;
    /// granting it notifies the newly verified user.
    pub async fn set_verified(
        &self,
        acting_user: &str,
        user_id: &str,
        verified: bool,
    ) -> CoreResult<()> {
        if !self.config.is_admin(acting_user) {
            return Err(CoreError::validation(
                "only administrators can change verification",
            ));
        }
        let changed = self.database.with_repositories(|repos| {
            repos.profiles().set_verified(user_id, verified)
        })?;
        if changed == 0 {
            return Err(CoreError::not_found(format!("profile {user_id} not found")));
        }
        if verified {
            self.notifications
                .notify(
                    user_id,
                    "verification",
                    "Account verified",
                    "Your account has been verified",
                )
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::FanoutRouter;
    use crate::storage::ObjectStore;

    fn service(admins: &[&str]) -> (ProfileService, NotificationService, tempfile::TempDir) {
        let database = Database::open_in_memory().expect("db");
        let dir = tempfile::tempdir().expect("tempdir");
        let media = MediaService::new(ObjectStore::new(dir.path()));
        let notifications = NotificationService::new(database.clone(), FanoutRouter::new());
        let mut config = CuraConfig::from_base_dir(dir.path()).expect("config");
        config.admin_ids = admins.iter().map(|id| id.to_string()).collect();
        let profiles = ProfileService::new(database, media, notifications.clone(), config);
        (profiles, notifications, dir)
    }

    #[test]
    fn upsert_preserves_media_and_verification() {
        let (profiles, _, _dir) = service(&[]);
        profiles
            .upsert_profile(
                "alice",
                ProfileUpdate {
                    display_name: "Alice".into(),
                    bio: None,
                },
            )
            .unwrap();

        let created_at = profiles.get("alice").unwrap().created_at;

        profiles
            .upsert_profile(
                "alice",
                ProfileUpdate {
                    display_name: "Alice A.".into(),
                    bio: Some("travel".into()),
                },
            )
            .unwrap();

        let fetched = profiles.get("alice").unwrap();
        assert_eq!(fetched.display_name, "Alice A.");
        assert_eq!(fetched.bio.as_deref(), Some("travel"));
        assert_eq!(fetched.created_at, created_at);
    }

    #[test]
    fn empty_display_name_is_rejected() {
        let (profiles, _, _dir) = service(&[]);
        let err = profiles
            .upsert_profile(
                "alice",
                ProfileUpdate {
                    display_name: "   ".into(),
                    bio: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn verification_is_admin_only_and_notifies() {
        let (profiles, notifications, _dir) = service(&["root"]);
        profiles
            .upsert_profile(
                "alice",
                ProfileUpdate {
                    display_name: "Alice".into(),
                    bio: None,
                },
            )
            .unwrap();

        let err = profiles.set_verified("alice", "alice", true).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        profiles.set_verified("root", "alice", true).await.unwrap();
        assert!(profiles.get("alice").unwrap().is_verified);

        let delivered = notifications.list_for("alice").unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].kind, "verification");
    }

    #[tokio::test]
    async fn revoking_verification_does_not_notify() {
        let (profiles, notifications, _dir) = service(&["root"]);
        profiles
            .upsert_profile(
                "alice",
                ProfileUpdate {
                    display_name: "Alice".into(),
                    bio: None,
                },
            )
            .unwrap();
        profiles.set_verified("root", "alice", true).await.unwrap();
        profiles.set_verified("root", "alice", false).await.unwrap();

        assert!(!profiles.get("alice").unwrap().is_verified);
        assert_eq!(notifications.list_for("alice").unwrap().len(), 1);
    }

    #[test]
    fn identity_resolution_fills_placeholders() {
        let (profiles, _, _dir) = service(&[]);
        profiles
            .upsert_profile(
                "alice",
                ProfileUpdate {
                    display_name: "Alice".into(),
                    bio: None,
                },
            )
            .unwrap();

        let identities = profiles
            .database
            .with_repositories(|repos| resolve_identities(&repos, ["alice", "ghost", "alice"]))
            .unwrap();
        assert_eq!(identities.len(), 2);
        assert_eq!(identities["alice"].display_name, "Alice");
        assert_eq!(identities["ghost"].display_name, "unknown user");
    }
}
