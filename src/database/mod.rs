pub mod models;
pub mod repositories;

use crate::config::CuraPaths;
use crate::error::{CoreError, CoreResult};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const READ_RETRIES: u32 = 3;

pub(crate) const MIGRATIONS: &str = r#"
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS profiles (
        user_id TEXT PRIMARY KEY,
        display_name TEXT NOT NULL,
        avatar_url TEXT,
        cover_url TEXT,
        bio TEXT,
        is_verified INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS posts (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        content TEXT,
        media_url TEXT,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at);

    CREATE TABLE IF NOT EXISTS likes (
        id TEXT PRIMARY KEY,
        post_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (post_id, user_id),
        FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_likes_post ON likes(post_id);

    CREATE TABLE IF NOT EXISTS comments (
        id TEXT PRIMARY KEY,
        post_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        parent_comment_id TEXT,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
        FOREIGN KEY (parent_comment_id) REFERENCES comments(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at);

    CREATE TABLE IF NOT EXISTS stories (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        media_url TEXT NOT NULL,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_stories_expires ON stories(expires_at);

    CREATE TABLE IF NOT EXISTS friendships (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        friend_id TEXT NOT NULL,
        pair_key TEXT NOT NULL UNIQUE,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        participant1_id TEXT NOT NULL,
        participant2_id TEXT NOT NULL,
        pair_key TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL,
        sender_id TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, created_at);

    CREATE TABLE IF NOT EXISTS notifications (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        title TEXT NOT NULL,
        body TEXT NOT NULL,
        read INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, created_at);
"#;

/// Handle on the relational store. The connection is shared behind a mutex;
/// every operation runs as a single statement or batch so the store's own
/// constraints (pair keys, like uniqueness) decide races, not this process.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn connect(paths: &CuraPaths) -> CoreResult<Self> {
        std::fs::create_dir_all(&paths.data_dir)
            .map_err(|err| CoreError::unavailable(format!("failed to create data dir: {err}")))?;
        let conn = Connection::open(&paths.db_path)?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Opens an in-memory store with migrations applied. Test helper.
    pub fn open_in_memory() -> CoreResult<Self> {
        let db = Self::from_connection(Connection::open_in_memory()?);
        db.ensure_migrations()?;
        Ok(db)
    }

    pub fn ensure_migrations(&self) -> CoreResult<()> {
        self.with_conn(|conn| {
            conn.execute_batch(MIGRATIONS)?;
            Ok(())
        })
    }

    pub fn with_repositories<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(repositories::SqliteRepositories<'_>) -> CoreResult<T>,
    {
        self.with_conn(|conn| {
            let repos = repositories::SqliteRepositories::new(conn);
            f(repos)
        })
    }

    /// Like [`Self::with_repositories`] but retries transient busy failures
    /// with a short backoff. Only safe for idempotent reads; writes are
    /// never retried automatically. The backoff sleeps on the calling
    /// thread (worst case 150 ms total), so callers on an async runtime
    /// should treat this like any other blocking store call.
    pub fn read_with_retry<T, F>(&self, mut f: F) -> CoreResult<T>
    where
        F: FnMut(repositories::SqliteRepositories<'_>) -> CoreResult<T>,
    {
        let mut attempt = 0;
        loop {
            match self.with_repositories(&mut f) {
                Err(CoreError::Unavailable(msg)) if attempt < READ_RETRIES => {
                    attempt += 1;
                    tracing::warn!(attempt, %msg, "store busy, retrying read");
                    std::thread::sleep(Duration::from_millis(25 * u64::from(attempt)));
                }
                other => return other,
            }
        }
    }

    fn with_conn<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&Connection) -> CoreResult<T>,
    {
        let guard = self
            .conn
            .lock()
            .map_err(|_| CoreError::internal("database mutex poisoned"))?;
        f(&guard)
    }
}
