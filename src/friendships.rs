//! Friendship requests and the accepted-friends graph.

use crate::database::models::FriendshipRecord;
use crate::database::repositories::FriendshipRepository;
use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::notifications::NotificationService;
use crate::profiles::{resolve_identities, AuthorIdentity};
use crate::utils::{canonical_pair_key, now_utc_iso};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_ACCEPTED: &str = "accepted";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendView {
    pub friendship_id: String,
    pub friend: AuthorIdentity,
    pub since: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRequestView {
    pub friendship_id: String,
    pub requester: AuthorIdentity,
    pub created_at: String,
}

#[derive(Clone)]
pub struct FriendshipService {
    database: Database,
    notifications: NotificationService,
}

impl FriendshipService {
    pub fn new(database: Database, notifications: NotificationService) -> Self {
        Self {
            database,
            notifications,
        }
    }

    /// Creates a pending request and notifies the addressee. At most one
    /// friendship row exists per pair, in either direction and any status.
    pub async fn request(
        &self,
        requester: &str,
        addressee: &str,
    ) -> CoreResult<FriendshipRecord> {
        if requester == addressee {
            return Err(CoreError::validation("cannot befriend yourself"));
        }
        let record = FriendshipRecord {
            id: Uuid::new_v4().to_string(),
            user_id: requester.to_string(),
            friend_id: addressee.to_string(),
            pair_key: canonical_pair_key(requester, addressee),
            status: STATUS_PENDING.to_string(),
            created_at: now_utc_iso(),
        };
        let requester_name = self.database.with_repositories(|repos| {
            if let Err(err) = repos.friendships().create(&record) {
                if !err.is_conflict() {
                    return Err(err);
                }
                // The pair key collided; report which state blocks the request.
                let existing = repos.friendships().get_by_pair_key(&record.pair_key)?;
                let message = match existing {
                    Some(row) if row.status == STATUS_ACCEPTED => "users are already friends",
                    _ => "a friend request is already pending for this pair",
                };
                return Err(CoreError::conflict(message));
            }
            let identities = resolve_identities(&repos, [requester])?;
            Ok(identities
                .get(requester)
                .map(|identity| identity.display_name.clone())
                .unwrap_or_else(|| "unknown user".to_string()))
        })?;

        self.notifications
            .notify(
                addressee,
                "friend_request",
                "New friend request",
                &format!("{requester_name} sent you a friend request"),
            )
            .await?;
        Ok(record)
    }

    /// Only the addressee of a pending request may accept it.
    pub async fn accept(&self, friendship_id: &str, acting_user: &str) -> CoreResult<FriendshipRecord> {
        let (record, acceptor_name) = self.database.with_repositories(|repos| {
            let record = repos.friendships().get(friendship_id)?.ok_or_else(|| {
                CoreError::not_found(format!("friendship {friendship_id} not found"))
            })?;
            if record.friend_id != acting_user {
                return Err(CoreError::validation(
                    "only the addressee can accept a friend request",
                ));
            }
            if record.status != STATUS_PENDING {
                return Err(CoreError::conflict("friend request is not pending"));
            }
            repos
                .friendships()
                .update_status(friendship_id, STATUS_ACCEPTED)?;
            let identities = resolve_identities(&repos, [acting_user])?;
            let name = identities
                .get(acting_user)
                .map(|identity| identity.display_name.clone())
                .unwrap_or_else(|| "unknown user".to_string());
            Ok((
                FriendshipRecord {
                    status: STATUS_ACCEPTED.to_string(),
                    ..record
                },
                name,
            ))
        })?;

        self.notifications
            .notify(
                &record.user_id,
                "friend_accept",
                "Friend request accepted",
                &format!("{acceptor_name} accepted your friend request"),
            )
            .await?;
        Ok(record)
    }

    /// Either party can remove the friendship (or withdraw a pending
    /// request); the row is deleted so the pair can start over later.
    pub fn remove(&self, friendship_id: &str, acting_user: &str) -> CoreResult<()> {
        self.database.with_repositories(|repos| {
            let record = repos.friendships().get(friendship_id)?.ok_or_else(|| {
                CoreError::not_found(format!("friendship {friendship_id} not found"))
            })?;
            if record.user_id != acting_user && record.friend_id != acting_user {
                return Err(CoreError::validation(
                    "only a participant can remove a friendship",
                ));
            }
            repos.friendships().delete(friendship_id)?;
            Ok(())
        })
    }

    pub fn friends_of(&self, user_id: &str) -> CoreResult<Vec<FriendView>> {
        self.database.read_with_retry(|repos| {
            let records = repos.friendships().list_accepted_for(user_id)?;
            let counterpart_ids: Vec<&str> = records
                .iter()
                .map(|record| counterpart(record, user_id))
                .collect();
            let identities = resolve_identities(&repos, counterpart_ids.iter().copied())?;

            Ok(records
                .iter()
                .map(|record| {
                    let other = counterpart(record, user_id);
                    FriendView {
                        friendship_id: record.id.clone(),
                        friend: identities
                            .get(other)
                            .cloned()
                            .unwrap_or_else(|| AuthorIdentity::placeholder(other)),
                        since: record.created_at.clone(),
                    }
                })
                .collect())
        })
    }

    pub fn pending_for(&self, user_id: &str) -> CoreResult<Vec<PendingRequestView>> {
        self.database.read_with_retry(|repos| {
            let records = repos.friendships().list_pending_for(user_id)?;
            let requester_ids: Vec<&str> =
                records.iter().map(|record| record.user_id.as_str()).collect();
            let identities = resolve_identities(&repos, requester_ids.iter().copied())?;

            Ok(records
                .iter()
                .map(|record| PendingRequestView {
                    friendship_id: record.id.clone(),
                    requester: identities
                        .get(&record.user_id)
                        .cloned()
                        .unwrap_or_else(|| AuthorIdentity::placeholder(&record.user_id)),
                    created_at: record.created_at.clone(),
                })
                .collect())
        })
    }
}

fn counterpart<'a>(record: &'a FriendshipRecord, user_id: &str) -> &'a str {
    if record.user_id == user_id {
        &record.friend_id
    } else {
        &record.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaService;
    use crate::profiles::{ProfileService, ProfileUpdate};
    use crate::realtime::FanoutRouter;
    use crate::storage::ObjectStore;

    fn setup() -> (FriendshipService, NotificationService, tempfile::TempDir) {
        let database = Database::open_in_memory().expect("db");
        let dir = tempfile::tempdir().expect("tempdir");
        let notifications = NotificationService::new(database.clone(), FanoutRouter::new());
        let profiles = ProfileService::new(
            database.clone(),
            MediaService::new(ObjectStore::new(dir.path())),
            notifications.clone(),
            crate::config::CuraConfig::from_base_dir(dir.path()).expect("config"),
        );
        for (id, name) in [("alice", "Alice"), ("bob", "Bob")] {
            profiles
                .upsert_profile(
                    id,
                    ProfileUpdate {
                        display_name: name.into(),
                        bio: None,
                    },
                )
                .unwrap();
        }
        (
            FriendshipService::new(database, notifications.clone()),
            notifications,
            dir,
        )
    }

    #[tokio::test]
    async fn request_notifies_addressee() {
        let (friendships, notifications, _dir) = setup();
        friendships.request("alice", "bob").await.unwrap();

        let delivered = notifications.list_for("bob").unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].kind, "friend_request");
        assert!(delivered[0].body.contains("Alice"));
    }

    #[tokio::test]
    async fn duplicate_request_conflicts_in_both_directions() {
        let (friendships, _, _dir) = setup();
        friendships.request("alice", "bob").await.unwrap();

        let same = friendships.request("alice", "bob").await.unwrap_err();
        match same {
            CoreError::Conflict(msg) => assert!(msg.contains("pending"), "{msg}"),
            other => panic!("expected conflict, got {other:?}"),
        }

        let reversed = friendships.request("bob", "alice").await.unwrap_err();
        assert!(matches!(reversed, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn rerequesting_established_friendship_reports_it() {
        let (friendships, _, _dir) = setup();
        let pending = friendships.request("alice", "bob").await.unwrap();
        friendships.accept(&pending.id, "bob").await.unwrap();

        let err = friendships.request("bob", "alice").await.unwrap_err();
        match err {
            CoreError::Conflict(msg) => assert!(msg.contains("already friends"), "{msg}"),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn self_request_is_rejected() {
        let (friendships, _, _dir) = setup();
        let err = friendships.request("alice", "alice").await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn accept_is_addressee_only() {
        let (friendships, notifications, _dir) = setup();
        let pending = friendships.request("alice", "bob").await.unwrap();

        let err = friendships.accept(&pending.id, "alice").await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let accepted = friendships.accept(&pending.id, "bob").await.unwrap();
        assert_eq!(accepted.status, STATUS_ACCEPTED);

        let again = friendships.accept(&pending.id, "bob").await.unwrap_err();
        assert!(matches!(again, CoreError::Conflict(_)));

        let delivered = notifications.list_for("alice").unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].kind, "friend_accept");
    }

    #[tokio::test]
    async fn friends_list_shows_counterpart_for_both_sides() {
        let (friendships, _, _dir) = setup();
        let pending = friendships.request("alice", "bob").await.unwrap();
        friendships.accept(&pending.id, "bob").await.unwrap();

        let for_alice = friendships.friends_of("alice").unwrap();
        assert_eq!(for_alice.len(), 1);
        assert_eq!(for_alice[0].friend.user_id, "bob");

        let for_bob = friendships.friends_of("bob").unwrap();
        assert_eq!(for_bob.len(), 1);
        assert_eq!(for_bob[0].friend.user_id, "alice");
    }

    #[tokio::test]
    async fn removal_frees_the_pair() {
        let (friendships, _, _dir) = setup();
        let pending = friendships.request("alice", "bob").await.unwrap();

        let outsider = friendships.remove(&pending.id, "mallory").unwrap_err();
        assert!(matches!(outsider, CoreError::Validation(_)));

        friendships.remove(&pending.id, "bob").unwrap();
        assert!(friendships.pending_for("bob").unwrap().is_empty());

        // The pair can start over after removal.
        friendships.request("bob", "alice").await.unwrap();
    }
}
