use crate::database::models::CommentRecord;
use crate::error::CoreResult;
use rusqlite::{params, params_from_iter, Connection, Row};

pub(super) struct SqliteCommentRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<CommentRecord> {
    Ok(CommentRecord {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user_id: row.get(2)?,
        parent_comment_id: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl<'conn> super::CommentRepository for SqliteCommentRepository<'conn> {
    fn create(&self, record: &CommentRecord) -> CoreResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO comments (id, post_id, user_id, parent_comment_id, content, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.id,
                record.post_id,
                record.user_id,
                record.parent_comment_id,
                record.content,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> CoreResult<Option<CommentRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, post_id, user_id, parent_comment_id, content, created_at
            FROM comments
            WHERE id = ?1
            "#,
        )?;
        let mut rows = stmt.query_map(params![id], read_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn list_for_posts(&self, post_ids: &[String]) -> CoreResult<Vec<CommentRecord>> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = (1..=post_ids.len())
            .map(|n| format!("?{n}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT id, post_id, user_id, parent_comment_id, content, created_at
            FROM comments
            WHERE post_id IN ({placeholders})
            ORDER BY created_at ASC
            "#
        ))?;
        let rows = stmt.query_map(params_from_iter(post_ids.iter()), read_row)?;

        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }
}
