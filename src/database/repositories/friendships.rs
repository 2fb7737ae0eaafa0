use crate::database::models::FriendshipRecord;
use crate::error::CoreResult;
use rusqlite::{params, Connection, Row};

pub(super) struct SqliteFriendshipRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<FriendshipRecord> {
    Ok(FriendshipRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        friend_id: row.get(2)?,
        pair_key: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
    })
}

const COLUMNS: &str = "id, user_id, friend_id, pair_key, status, created_at";

impl<'conn> super::FriendshipRepository for SqliteFriendshipRepository<'conn> {
    fn create(&self, record: &FriendshipRecord) -> CoreResult<()> {
        // Plain insert so a duplicate pair surfaces as a constraint failure.
        self.conn.execute(
            r#"
            INSERT INTO friendships (id, user_id, friend_id, pair_key, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.id,
                record.user_id,
                record.friend_id,
                record.pair_key,
                record.status,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> CoreResult<Option<FriendshipRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COLUMNS} FROM friendships WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], read_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn get_by_pair_key(&self, pair_key: &str) -> CoreResult<Option<FriendshipRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM friendships WHERE pair_key = ?1"
        ))?;
        let mut rows = stmt.query_map(params![pair_key], read_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn update_status(&self, id: &str, status: &str) -> CoreResult<usize> {
        let changed = self.conn.execute(
            "UPDATE friendships SET status = ?2 WHERE id = ?1",
            params![id, status],
        )?;
        Ok(changed)
    }

    fn delete(&self, id: &str) -> CoreResult<usize> {
        let changed = self
            .conn
            .execute("DELETE FROM friendships WHERE id = ?1", params![id])?;
        Ok(changed)
    }

    fn list_accepted_for(&self, user_id: &str) -> CoreResult<Vec<FriendshipRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {COLUMNS}
            FROM friendships
            WHERE status = 'accepted' AND (user_id = ?1 OR friend_id = ?1)
            ORDER BY created_at DESC
            "#
        ))?;
        let rows = stmt.query_map(params![user_id], read_row)?;

        let mut friendships = Vec::new();
        for row in rows {
            friendships.push(row?);
        }
        Ok(friendships)
    }

    fn list_pending_for(&self, user_id: &str) -> CoreResult<Vec<FriendshipRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {COLUMNS}
            FROM friendships
            WHERE status = 'pending' AND friend_id = ?1
            ORDER BY created_at DESC
            "#
        ))?;
        let rows = stmt.query_map(params![user_id], read_row)?;

        let mut friendships = Vec::new();
        for row in rows {
            friendships.push(row?);
        }
        Ok(friendships)
    }
}
