use crate::database::models::PostRecord;
use crate::error::CoreResult;
use rusqlite::{params, Connection, Row};

pub(super) struct SqlitePostRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<PostRecord> {
    Ok(PostRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        media_url: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl<'conn> super::PostRepository for SqlitePostRepository<'conn> {
    fn create(&self, record: &PostRecord) -> CoreResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO posts (id, user_id, content, media_url, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.id,
                record.user_id,
                record.content,
                record.media_url,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> CoreResult<Option<PostRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, content, media_url, created_at FROM posts WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], read_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn list_recent(&self, limit: usize) -> CoreResult<Vec<PostRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, content, media_url, created_at
            FROM posts
            ORDER BY created_at DESC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt.query_map(params![limit as i64], read_row)?;

        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }
}
