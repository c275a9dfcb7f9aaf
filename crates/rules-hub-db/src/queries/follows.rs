use anyhow::Result;
use rusqlite::Connection;

use crate::Database;
use crate::models::ProfileSummaryRow;

impl Database {
    // -- Follows --

    /// Returns true if a new edge was created, false if it already existed.
    pub fn follow(&self, follower_id: &str, following_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO user_follows (follower_id, following_id) VALUES (?1, ?2)",
                [follower_id, following_id],
            )?;
            Ok(inserted == 1)
        })
    }

    /// Returns true if an edge was removed.
    pub fn unfollow(&self, follower_id: &str, following_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM user_follows WHERE follower_id = ?1 AND following_id = ?2",
                [follower_id, following_id],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn is_following(&self, follower_id: &str, following_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM user_follows WHERE follower_id = ?1 AND following_id = ?2)",
                [follower_id, following_id],
                |row| row.get(0),
            )?)
        })
    }

    /// Profiles of users following `user_id`, most recent first.
    pub fn list_followers(&self, user_id: &str) -> Result<Vec<ProfileSummaryRow>> {
        self.with_conn(|conn| {
            query_summaries(
                conn,
                "SELECT p.user_id, p.username, p.display_name
                 FROM user_follows f
                 JOIN user_profiles p ON p.user_id = f.follower_id
                 WHERE f.following_id = ?1
                 ORDER BY f.created_at DESC, f.rowid DESC",
                user_id,
            )
        })
    }

    /// Profiles `user_id` follows, most recent first.
    pub fn list_following(&self, user_id: &str) -> Result<Vec<ProfileSummaryRow>> {
        self.with_conn(|conn| {
            query_summaries(
                conn,
                "SELECT p.user_id, p.username, p.display_name
                 FROM user_follows f
                 JOIN user_profiles p ON p.user_id = f.following_id
                 WHERE f.follower_id = ?1
                 ORDER BY f.created_at DESC, f.rowid DESC",
                user_id,
            )
        })
    }
}

fn query_summaries(conn: &Connection, sql: &str, user_id: &str) -> Result<Vec<ProfileSummaryRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([user_id], |row| {
            Ok(ProfileSummaryRow {
                user_id: row.get(0)?,
                username: row.get(1)?,
                display_name: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
