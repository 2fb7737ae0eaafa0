//! Feed content: posts with hydrated likes and threaded comments.

use crate::database::models::{CommentRecord, LikeRecord, PostRecord};
use crate::database::repositories::{
    CommentRepository, LikeRepository, PostRepository, SqliteRepositories,
};
use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::profiles::{resolve_identities, AuthorIdentity};
use crate::utils::now_utc_iso;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_FEED_LIMIT: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    pub id: String,
    pub author: AuthorIdentity,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub created_at: String,
    pub like_count: usize,
    pub liked_by: Vec<String>,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    pub id: String,
    pub post_id: String,
    pub author: AuthorIdentity,
    pub content: String,
    pub created_at: String,
    pub replies: Vec<CommentView>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
}

#[derive(Clone)]
pub struct FeedService {
    database: Database,
}

impl FeedService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// A post needs text, media, or both.
    pub fn create_post(&self, user_id: &str, new_post: NewPost) -> CoreResult<PostView> {
        let content = new_post
            .content
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        if content.is_none() && new_post.media_url.is_none() {
            return Err(CoreError::validation("a post needs text or media"));
        }
        let record = PostRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            content,
            media_url: new_post.media_url,
            created_at: now_utc_iso(),
        };
        self.database.with_repositories(|repos| {
            repos.posts().create(&record)?;
            let views = hydrate(&repos, vec![record.clone()])?;
            views
                .into_iter()
                .next()
                .ok_or_else(|| CoreError::internal("created post missing from hydration"))
        })
    }

    /// Newest posts first, fully hydrated.
    pub fn feed(&self, limit: usize) -> CoreResult<Vec<PostView>> {
        self.database.read_with_retry(|repos| {
            let records = repos.posts().list_recent(limit)?;
            hydrate(&repos, records)
        })
    }

    pub fn get_post(&self, post_id: &str) -> CoreResult<PostView> {
        self.database.read_with_retry(|repos| {
            let record = repos
                .posts()
                .get(post_id)?
                .ok_or_else(|| CoreError::not_found(format!("post {post_id} not found")))?;
            let views = hydrate(&repos, vec![record])?;
            views
                .into_iter()
                .next()
                .ok_or_else(|| CoreError::internal("post missing from hydration"))
        })
    }

    /// Returns true when a new like was recorded, false when the user had
    /// already liked the post.
    pub fn like(&self, post_id: &str, user_id: &str) -> CoreResult<bool> {
        self.database.with_repositories(|repos| {
            if repos.posts().get(post_id)?.is_none() {
                return Err(CoreError::not_found(format!("post {post_id} not found")));
            }
            repos.likes().add(&LikeRecord {
                id: Uuid::new_v4().to_string(),
                post_id: post_id.to_string(),
                user_id: user_id.to_string(),
                created_at: now_utc_iso(),
            })
        })
    }

    /// Removing an absent like is a no-op.
    pub fn unlike(&self, post_id: &str, user_id: &str) -> CoreResult<()> {
        self.database.with_repositories(|repos| {
            if repos.posts().get(post_id)?.is_none() {
                return Err(CoreError::not_found(format!("post {post_id} not found")));
            }
            repos.likes().remove(post_id, user_id)?;
            Ok(())
        })
    }

    /// Adds a comment, or a reply when `parent_comment_id` is set. Reply
    /// nesting stops at one level: a reply's parent must itself be a
    /// top-level comment on the same post.
    pub fn comment(
        &self,
        post_id: &str,
        user_id: &str,
        content: &str,
        parent_comment_id: Option<&str>,
    ) -> CoreResult<CommentView> {
        let content = content.trim();
        if content.is_empty() {
            return Err(CoreError::validation("comment must not be empty"));
        }
        self.database.with_repositories(|repos| {
            if repos.posts().get(post_id)?.is_none() {
                return Err(CoreError::not_found(format!("post {post_id} not found")));
            }
            if let Some(parent_id) = parent_comment_id {
                let parent = repos.comments().get(parent_id)?.ok_or_else(|| {
                    CoreError::not_found(format!("comment {parent_id} not found"))
                })?;
                if parent.post_id != post_id {
                    return Err(CoreError::validation(
                        "parent comment belongs to a different post",
                    ));
                }
                if parent.parent_comment_id.is_some() {
                    return Err(CoreError::validation("replies to replies are not allowed"));
                }
            }
            let record = CommentRecord {
                id: Uuid::new_v4().to_string(),
                post_id: post_id.to_string(),
                user_id: user_id.to_string(),
                parent_comment_id: parent_comment_id.map(str::to_string),
                content: content.to_string(),
                created_at: now_utc_iso(),
            };
            repos.comments().create(&record)?;

            let identities = resolve_identities(&repos, [record.user_id.as_str()])?;
            let author = identities
                .get(&record.user_id)
                .cloned()
                .unwrap_or_else(|| AuthorIdentity::placeholder(&record.user_id));
            Ok(CommentView {
                id: record.id,
                post_id: record.post_id,
                author,
                content: record.content,
                created_at: record.created_at,
                replies: Vec::new(),
            })
        })
    }
}

/// Attaches likes, comment trees and author identities to a page of posts
/// with one batched query per concern.
fn hydrate(repos: &SqliteRepositories<'_>, posts: Vec<PostRecord>) -> CoreResult<Vec<PostView>> {
    let post_ids: Vec<String> = posts.iter().map(|post| post.id.clone()).collect();
    let likes = repos.likes().list_for_posts(&post_ids)?;
    let comments = repos.comments().list_for_posts(&post_ids)?;

    let author_ids = posts
        .iter()
        .map(|post| post.user_id.as_str())
        .chain(comments.iter().map(|comment| comment.user_id.as_str()));
    let identities = resolve_identities(repos, author_ids)?;
    let identity_of = |user_id: &str| {
        identities
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| AuthorIdentity::placeholder(user_id))
    };

    let mut views = Vec::with_capacity(posts.len());
    for post in posts {
        let liked_by: Vec<String> = likes
            .iter()
            .filter(|like| like.post_id == post.id)
            .map(|like| like.user_id.clone())
            .collect();

        // Comments arrive ordered by creation time, so parents are built
        // before the replies that point at them.
        let mut top_level: Vec<CommentView> = Vec::new();
        for comment in comments.iter().filter(|c| c.post_id == post.id) {
            let view = CommentView {
                id: comment.id.clone(),
                post_id: comment.post_id.clone(),
                author: identity_of(&comment.user_id),
                content: comment.content.clone(),
                created_at: comment.created_at.clone(),
                replies: Vec::new(),
            };
            match &comment.parent_comment_id {
                None => top_level.push(view),
                Some(parent_id) => {
                    if let Some(parent) = top_level.iter_mut().find(|c| &c.id == parent_id) {
                        parent.replies.push(view);
                    } else {
                        tracing::warn!(comment_id = %comment.id, %parent_id, "reply without parent, promoting to top level");
                        top_level.push(view);
                    }
                }
            }
        }

        views.push(PostView {
            id: post.id,
            author: identity_of(&post.user_id),
            content: post.content,
            media_url: post.media_url,
            created_at: post.created_at,
            like_count: liked_by.len(),
            liked_by,
            comments: top_level,
        });
    }
    Ok(views)
}
