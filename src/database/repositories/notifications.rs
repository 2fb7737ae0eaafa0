use crate::database::models::NotificationRecord;
use crate::error::CoreResult;
use rusqlite::{params, Connection, Row};

pub(super) struct SqliteNotificationRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<NotificationRecord> {
    Ok(NotificationRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        read: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
    })
}

impl<'conn> super::NotificationRepository for SqliteNotificationRepository<'conn> {
    fn create(&self, record: &NotificationRecord) -> CoreResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO notifications (id, user_id, kind, title, body, read, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                record.id,
                record.user_id,
                record.kind,
                record.title,
                record.body,
                record.read as i64,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> CoreResult<Option<NotificationRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, kind, title, body, read, created_at
            FROM notifications
            WHERE id = ?1
            "#,
        )?;
        let mut rows = stmt.query_map(params![id], read_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn list_for(&self, user_id: &str) -> CoreResult<Vec<NotificationRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, kind, title, body, read, created_at
            FROM notifications
            WHERE user_id = ?1
            ORDER BY created_at DESC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id], read_row)?;

        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?);
        }
        Ok(notifications)
    }

    fn mark_read(&self, id: &str) -> CoreResult<usize> {
        let changed = self.conn.execute(
            "UPDATE notifications SET read = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(changed)
    }
}
