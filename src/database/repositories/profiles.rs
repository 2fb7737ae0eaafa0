use crate::database::models::ProfileRecord;
use crate::error::CoreResult;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::HashMap;

pub(super) struct SqliteProfileRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<ProfileRecord> {
    Ok(ProfileRecord {
        user_id: row.get(0)?,
        display_name: row.get(1)?,
        avatar_url: row.get(2)?,
        cover_url: row.get(3)?,
        bio: row.get(4)?,
        is_verified: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
    })
}

const COLUMNS: &str = "user_id, display_name, avatar_url, cover_url, bio, is_verified, created_at";

impl<'conn> super::ProfileRepository for SqliteProfileRepository<'conn> {
    fn upsert(&self, record: &ProfileRecord) -> CoreResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO profiles (user_id, display_name, avatar_url, cover_url, bio, is_verified, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(user_id) DO UPDATE SET
                display_name = excluded.display_name,
                avatar_url = excluded.avatar_url,
                cover_url = excluded.cover_url,
                bio = excluded.bio
            "#,
            params![
                record.user_id,
                record.display_name,
                record.avatar_url,
                record.cover_url,
                record.bio,
                record.is_verified as i64,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, user_id: &str) -> CoreResult<Option<ProfileRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COLUMNS} FROM profiles WHERE user_id = ?1"))?;
        let mut rows = stmt.query_map(params![user_id], read_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn get_many(&self, user_ids: &[String]) -> CoreResult<HashMap<String, ProfileRecord>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = (1..=user_ids.len())
            .map(|n| format!("?{n}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM profiles WHERE user_id IN ({placeholders})"
        ))?;
        let rows = stmt.query_map(params_from_iter(user_ids.iter()), read_row)?;

        let mut found = HashMap::new();
        for row in rows {
            let record = row?;
            found.insert(record.user_id.clone(), record);
        }
        Ok(found)
    }

    fn set_verified(&self, user_id: &str, verified: bool) -> CoreResult<usize> {
        let changed = self.conn.execute(
            "UPDATE profiles SET is_verified = ?2 WHERE user_id = ?1",
            params![user_id, verified as i64],
        )?;
        Ok(changed)
    }

    fn set_avatar_url(&self, user_id: &str, url: &str) -> CoreResult<usize> {
        let changed = self.conn.execute(
            "UPDATE profiles SET avatar_url = ?2 WHERE user_id = ?1",
            params![user_id, url],
        )?;
        Ok(changed)
    }

    fn set_cover_url(&self, user_id: &str, url: &str) -> CoreResult<usize> {
        let changed = self.conn.execute(
            "UPDATE profiles SET cover_url = ?2 WHERE user_id = ?1",
            params![user_id, url],
        )?;
        Ok(changed)
    }
}
