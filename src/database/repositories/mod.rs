mod comments;
mod conversations;
mod friendships;
mod likes;
mod messages;
mod notifications;
mod posts;
mod profiles;
mod stories;

use super::models::{
    CommentRecord, ConversationRecord, FriendshipRecord, LikeRecord, MessageRecord,
    NotificationRecord, PostRecord, ProfileRecord, StoryRecord,
};
use crate::error::CoreResult;
use rusqlite::Connection;
use std::collections::HashMap;

pub trait ProfileRepository {
    fn upsert(&self, record: &ProfileRecord) -> CoreResult<()>;
    fn get(&self, user_id: &str) -> CoreResult<Option<ProfileRecord>>;
    /// Returns the subset of `user_ids` that exist, keyed by user id.
    fn get_many(&self, user_ids: &[String]) -> CoreResult<HashMap<String, ProfileRecord>>;
    fn set_verified(&self, user_id: &str, verified: bool) -> CoreResult<usize>;
    fn set_avatar_url(&self, user_id: &str, url: &str) -> CoreResult<usize>;
    fn set_cover_url(&self, user_id: &str, url: &str) -> CoreResult<usize>;
}

pub trait PostRepository {
    fn create(&self, record: &PostRecord) -> CoreResult<()>;
    fn get(&self, id: &str) -> CoreResult<Option<PostRecord>>;
    fn list_recent(&self, limit: usize) -> CoreResult<Vec<PostRecord>>;
}

pub trait LikeRepository {
    /// Returns false when the user already liked the post.
    fn add(&self, record: &LikeRecord) -> CoreResult<bool>;
    fn remove(&self, post_id: &str, user_id: &str) -> CoreResult<usize>;
    fn list_for_posts(&self, post_ids: &[String]) -> CoreResult<Vec<LikeRecord>>;
}

pub trait CommentRepository {
    fn create(&self, record: &CommentRecord) -> CoreResult<()>;
    fn get(&self, id: &str) -> CoreResult<Option<CommentRecord>>;
    fn list_for_posts(&self, post_ids: &[String]) -> CoreResult<Vec<CommentRecord>>;
}

pub trait StoryRepository {
    fn create(&self, record: &StoryRecord) -> CoreResult<()>;
    /// Stories whose expiry is strictly after `now`, newest first.
    fn list_active(&self, now: &str) -> CoreResult<Vec<StoryRecord>>;
}

pub trait FriendshipRepository {
    fn create(&self, record: &FriendshipRecord) -> CoreResult<()>;
    fn get(&self, id: &str) -> CoreResult<Option<FriendshipRecord>>;
    fn get_by_pair_key(&self, pair_key: &str) -> CoreResult<Option<FriendshipRecord>>;
    fn update_status(&self, id: &str, status: &str) -> CoreResult<usize>;
    fn delete(&self, id: &str) -> CoreResult<usize>;
    fn list_accepted_for(&self, user_id: &str) -> CoreResult<Vec<FriendshipRecord>>;
    /// Pending requests where `user_id` is the addressee.
    fn list_pending_for(&self, user_id: &str) -> CoreResult<Vec<FriendshipRecord>>;
}

pub trait ConversationRepository {
    /// No-op when a conversation with the same id already exists.
    fn insert_ignore(&self, record: &ConversationRecord) -> CoreResult<()>;
    fn get(&self, id: &str) -> CoreResult<Option<ConversationRecord>>;
    fn list_for(&self, user_id: &str) -> CoreResult<Vec<ConversationRecord>>;
}

pub trait MessageRepository {
    fn create(&self, record: &MessageRecord) -> CoreResult<()>;
    fn list_for_conversation(&self, conversation_id: &str, limit: usize)
        -> CoreResult<Vec<MessageRecord>>;
    fn last_for_conversation(&self, conversation_id: &str) -> CoreResult<Option<MessageRecord>>;
}

pub trait NotificationRepository {
    fn create(&self, record: &NotificationRecord) -> CoreResult<()>;
    fn get(&self, id: &str) -> CoreResult<Option<NotificationRecord>>;
    fn list_for(&self, user_id: &str) -> CoreResult<Vec<NotificationRecord>>;
    fn mark_read(&self, id: &str) -> CoreResult<usize>;
}

pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn profiles(&self) -> impl ProfileRepository + '_ {
        profiles::SqliteProfileRepository { conn: self.conn }
    }

    pub fn posts(&self) -> impl PostRepository + '_ {
        posts::SqlitePostRepository { conn: self.conn }
    }

    pub fn likes(&self) -> impl LikeRepository + '_ {
        likes::SqliteLikeRepository { conn: self.conn }
    }

    pub fn comments(&self) -> impl CommentRepository + '_ {
        comments::SqliteCommentRepository { conn: self.conn }
    }

    pub fn stories(&self) -> impl StoryRepository + '_ {
        stories::SqliteStoryRepository { conn: self.conn }
    }

    pub fn friendships(&self) -> impl FriendshipRepository + '_ {
        friendships::SqliteFriendshipRepository { conn: self.conn }
    }

    pub fn conversations(&self) -> impl ConversationRepository + '_ {
        conversations::SqliteConversationRepository { conn: self.conn }
    }

    pub fn messages(&self) -> impl MessageRepository + '_ {
        messages::SqliteMessageRepository { conn: self.conn }
    }

    pub fn notifications(&self) -> impl NotificationRepository + '_ {
        notifications::SqliteNotificationRepository { conn: self.conn }
    }
}
