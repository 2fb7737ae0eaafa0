use crate::database::models::LikeRecord;
use crate::error::CoreResult;
use rusqlite::{params, params_from_iter, Connection, Row};

pub(super) struct SqliteLikeRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<LikeRecord> {
    Ok(LikeRecord {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

impl<'conn> super::LikeRepository for SqliteLikeRepository<'conn> {
    fn add(&self, record: &LikeRecord) -> CoreResult<bool> {
        // The (post_id, user_id) constraint makes duplicates a no-op.
        let changed = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO likes (id, post_id, user_id, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![record.id, record.post_id, record.user_id, record.created_at],
        )?;
        Ok(changed > 0)
    }

    fn remove(&self, post_id: &str, user_id: &str) -> CoreResult<usize> {
        let changed = self.conn.execute(
            "DELETE FROM likes WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
        )?;
        Ok(changed)
    }

    fn list_for_posts(&self, post_ids: &[String]) -> CoreResult<Vec<LikeRecord>> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = (1..=post_ids.len())
            .map(|n| format!("?{n}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT id, post_id, user_id, created_at
            FROM likes
            WHERE post_id IN ({placeholders})
            ORDER BY created_at ASC
            "#
        ))?;
        let rows = stmt.query_map(params_from_iter(post_ids.iter()), read_row)?;

        let mut likes = Vec::new();
        for row in rows {
            likes.push(row?);
        }
        Ok(likes)
    }
}
