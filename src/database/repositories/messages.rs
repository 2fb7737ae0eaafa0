use crate::database::models::MessageRecord;
use crate::error::CoreResult;
use rusqlite::{params, Connection, Row};

pub(super) struct SqliteMessageRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<MessageRecord> {
    Ok(MessageRecord {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl<'conn> super::MessageRepository for SqliteMessageRepository<'conn> {
    fn create(&self, record: &MessageRecord) -> CoreResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO messages (id, conversation_id, sender_id, content, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.id,
                record.conversation_id,
                record.sender_id,
                record.content,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn list_for_conversation(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> CoreResult<Vec<MessageRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, conversation_id, sender_id, content, created_at
            FROM messages
            WHERE conversation_id = ?1
            ORDER BY created_at ASC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![conversation_id, limit as i64], read_row)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    fn last_for_conversation(&self, conversation_id: &str) -> CoreResult<Option<MessageRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, conversation_id, sender_id, content, created_at
            FROM messages
            WHERE conversation_id = ?1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )?;
        let mut rows = stmt.query_map(params![conversation_id], read_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }
}
