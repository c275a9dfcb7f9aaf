use anyhow::Result;
use rusqlite::{Connection, Row};

use super::OptionalExt;
use crate::Database;
use crate::models::{ProfileChanges, ProfileRow};

// Follower counts come from correlated subqueries so a profile is one round trip
const PROFILE_SELECT: &str = "
    SELECT p.user_id, p.username, p.display_name, p.bio, p.website, p.github, p.twitter,
           p.is_public,
           (SELECT COUNT(*) FROM user_follows f WHERE f.following_id = p.user_id),
           (SELECT COUNT(*) FROM user_follows f WHERE f.follower_id = p.user_id),
           p.created_at, p.updated_at
    FROM user_profiles p";

impl Database {
    // -- Profiles --

    pub fn get_profile_by_user_id(&self, user_id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| query_profile(conn, "p.user_id", user_id))
    }

    pub fn get_profile_by_username(&self, username: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| query_profile(conn, "p.username", username))
    }

    pub fn update_profile(&self, user_id: &str, changes: &ProfileChanges) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE user_profiles
                 SET username = ?2, display_name = ?3, bio = ?4, website = ?5,
                     github = ?6, twitter = ?7, is_public = ?8,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE user_id = ?1",
                rusqlite::params![
                    user_id,
                    changes.username,
                    changes.display_name,
                    changes.bio,
                    changes.website,
                    changes.github,
                    changes.twitter,
                    changes.is_public,
                ],
            )?;
            Ok(updated)
        })
    }

    /// Whether `username` belongs to any profile other than `except_user`'s.
    pub fn username_taken(&self, username: &str, except_user: Option<&str>) -> Result<bool> {
        self.with_conn(|conn| {
            let taken: bool = conn.query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM user_profiles
                     WHERE username = ?1 AND (?2 IS NULL OR user_id <> ?2)
                 )",
                rusqlite::params![username, except_user],
                |row| row.get(0),
            )?;
            Ok(taken)
        })
    }
}

fn query_profile(conn: &Connection, column: &str, value: &str) -> Result<Option<ProfileRow>> {
    let sql = format!("{PROFILE_SELECT} WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([value], map_profile).optional()?;
    Ok(row)
}

fn map_profile(row: &Row<'_>) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        user_id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        bio: row.get(3)?,
        website: row.get(4)?,
        github: row.get(5)?,
        twitter: row.get(6)?,
        is_public: row.get(7)?,
        followers: row.get(8)?,
        following: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::models::ProfileChanges;
    use crate::queries::testing::{db, seed_user};

    #[test]
    fn username_taken_ignores_own_profile() {
        let db = db();
        seed_user(&db, "alice");

        assert!(db.username_taken("alice", None).unwrap());
        assert!(!db.username_taken("alice", Some("alice")).unwrap());
        assert!(!db.username_taken("carol", None).unwrap());
    }

    #[test]
    fn update_profile_overwrites_fields() {
        let db = db();
        seed_user(&db, "alice");

        let changes = ProfileChanges {
            username: "alice2".into(),
            display_name: Some("Alice".into()),
            bio: None,
            website: None,
            github: Some("alice-gh".into()),
            twitter: None,
            is_public: false,
        };
        assert_eq!(db.update_profile("alice", &changes).unwrap(), 1);

        let profile = db.get_profile_by_username("alice2").unwrap().unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("Alice"));
        assert_eq!(profile.github.as_deref(), Some("alice-gh"));
        assert!(!profile.is_public);
        assert!(db.get_profile_by_username("alice").unwrap().is_none());
    }
}
