use crate::database::models::StoryRecord;
use crate::error::CoreResult;
use rusqlite::{params, Connection, Row};

pub(super) struct SqliteStoryRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<StoryRecord> {
    Ok(StoryRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        media_url: row.get(2)?,
        created_at: row.get(3)?,
        expires_at: row.get(4)?,
    })
}

impl<'conn> super::StoryRepository for SqliteStoryRepository<'conn> {
    fn create(&self, record: &StoryRecord) -> CoreResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO stories (id, user_id, media_url, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.id,
                record.user_id,
                record.media_url,
                record.created_at,
                record.expires_at,
            ],
        )?;
        Ok(())
    }

    fn list_active(&self, now: &str) -> CoreResult<Vec<StoryRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, media_url, created_at, expires_at
            FROM stories
            WHERE expires_at > ?1
            ORDER BY created_at DESC
            "#,
        )?;
        let rows = stmt.query_map(params![now], read_row)?;

        let mut stories = Vec::new();
        for row in rows {
            stories.push(row?);
        }
        Ok(stories)
    }
}
