use crate::database::models::ConversationRecord;
use crate::error::CoreResult;
use rusqlite::{params, Connection, Row};

pub(super) struct SqliteConversationRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<ConversationRecord> {
    Ok(ConversationRecord {
        id: row.get(0)?,
        participant1_id: row.get(1)?,
        participant2_id: row.get(2)?,
        pair_key: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl<'conn> super::ConversationRepository for SqliteConversationRepository<'conn> {
    fn insert_ignore(&self, record: &ConversationRecord) -> CoreResult<()> {
        // Conversation ids are derived from the pair, so concurrent resolves
        // insert the same row and all but the first are ignored.
        self.conn.execute(
            r#"
            INSERT OR IGNORE INTO conversations (id, participant1_id, participant2_id, pair_key, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.id,
                record.participant1_id,
                record.participant2_id,
                record.pair_key,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> CoreResult<Option<ConversationRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, participant1_id, participant2_id, pair_key, created_at
            FROM conversations
            WHERE id = ?1
            "#,
        )?;
        let mut rows = stmt.query_map(params![id], read_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn list_for(&self, user_id: &str) -> CoreResult<Vec<ConversationRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, participant1_id, participant2_id, pair_key, created_at
            FROM conversations
            WHERE participant1_id = ?1 OR participant2_id = ?1
            ORDER BY created_at DESC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id], read_row)?;

        let mut conversations = Vec::new();
        for row in rows {
            conversations.push(row?);
        }
        Ok(conversations)
    }
}
