use anyhow::Result;
use rusqlite::{Connection, Row};

use super::OptionalExt;
use crate::Database;
use crate::models::{UserListRow, UserRow};

const USER_COLUMNS: &str =
    "id, email, password, role, invite_token, created_at, last_sign_in_at";

impl Database {
    // -- Users --

    /// Create an active account and its profile in one transaction.
    pub fn create_account(
        &self,
        id: &str,
        email: &str,
        password_hash: &str,
        role: &str,
        username: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO users (id, email, password, role) VALUES (?1, ?2, ?3, ?4)",
                (id, email, password_hash, role),
            )?;
            tx.execute(
                "INSERT INTO user_profiles (user_id, username) VALUES (?1, ?2)",
                (id, username),
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Create a pending account that can only be activated with `invite_token`.
    pub fn create_invited_user(
        &self,
        id: &str,
        email: &str,
        role: &str,
        invite_token: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, role, invite_token) VALUES (?1, ?2, ?3, ?4)",
                (id, email, role, invite_token),
            )?;
            Ok(())
        })
    }

    /// Set the password of an invited account, consume its token and create the profile.
    pub fn accept_invite(&self, id: &str, password_hash: &str, username: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "UPDATE users
                 SET password = ?2, invite_token = NULL,
                     last_sign_in_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                (id, password_hash),
            )?;
            tx.execute(
                "INSERT INTO user_profiles (user_id, username) VALUES (?1, ?2)",
                (id, username),
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_invite_token(&self, token: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "invite_token", token))
    }

    pub fn touch_last_sign_in(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET last_sign_in_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?1",
                [id],
            )?;
            Ok(())
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserListRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.email, u.role, p.username, u.password IS NULL,
                        u.created_at, u.last_sign_in_at
                 FROM users u
                 LEFT JOIN user_profiles p ON p.user_id = u.id
                 ORDER BY u.created_at DESC, u.rowid DESC",
            )?;

            let rows = stmt
                .query_map([], |row| {
                    Ok(UserListRow {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        role: row.get(2)?,
                        username: row.get(3)?,
                        pending_invite: row.get(4)?,
                        created_at: row.get(5)?,
                        last_sign_in_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Returns the number of rows changed (0 when the user does not exist).
    pub fn update_user_role(&self, id: &str, role: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute("UPDATE users SET role = ?2 WHERE id = ?1", (id, role))?)
        })
    }

    /// Deletes the account; profile, follows, likes and notifications cascade
    /// and the user's rules lose their owner.
    pub fn delete_user(&self, id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])?))
    }

    /// Every registered user id except `excluded`.
    pub fn list_user_ids_except(&self, excluded: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM users WHERE id <> ?1")?;
            let ids = stmt
                .query_map([excluded], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([value], map_user).optional()?;
    Ok(row)
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        role: row.get(3)?,
        invite_token: row.get(4)?,
        created_at: row.get(5)?,
        last_sign_in_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::queries::testing::{db, seed_user};
    use crate::unique_violation;

    #[test]
    fn create_account_creates_profile() {
        let db = db();
        seed_user(&db, "alice");

        let user = db.get_user_by_email("alice@example.com").unwrap().unwrap();
        assert_eq!(user.id, "alice");
        assert_eq!(user.role, "user");
        assert!(db.get_profile_by_user_id("alice").unwrap().is_some());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db = db();
        seed_user(&db, "alice");

        let err = db
            .create_account("other", "alice@example.com", "hash", "user", "other")
            .unwrap_err();
        assert_eq!(unique_violation(&err).as_deref(), Some("users.email"));
        // The transaction rolled back, so no stray profile remains
        assert!(db.get_profile_by_username("other").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_names_profile_column() {
        let db = db();
        seed_user(&db, "alice");

        let err = db
            .create_account("other", "other@example.com", "hash", "user", "alice")
            .unwrap_err();
        assert_eq!(unique_violation(&err).as_deref(), Some("user_profiles.username"));
        assert!(db.get_user_by_email("other@example.com").unwrap().is_none());

        let not_unique = db.with_conn(|conn| Ok(conn.execute_batch("SELECT * FROM nope")?));
        assert_eq!(unique_violation(&not_unique.unwrap_err()), None);
    }

    #[test]
    fn invite_then_accept() {
        let db = db();
        db.create_invited_user("bob", "bob@example.com", "admin", "tok").unwrap();

        let pending = db.get_user_by_invite_token("tok").unwrap().unwrap();
        assert!(pending.password.is_none());
        assert!(db.list_users().unwrap()[0].pending_invite);

        db.accept_invite("bob", "hash", "bobby").unwrap();
        let active = db.get_user_by_id("bob").unwrap().unwrap();
        assert_eq!(active.password.as_deref(), Some("hash"));
        assert!(active.invite_token.is_none());
        assert!(db.get_user_by_invite_token("tok").unwrap().is_none());
        assert!(!db.list_users().unwrap()[0].pending_invite);
    }

    #[test]
    fn list_user_ids_except_skips_excluded() {
        let db = db();
        for id in ["a", "b", "c"] {
            seed_user(&db, id);
        }
        let mut ids = db.list_user_ids_except("b").unwrap();
        ids.sort();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn update_role_reports_missing_user() {
        let db = db();
        seed_user(&db, "a");
        assert_eq!(db.update_user_role("a", "admin").unwrap(), 1);
        assert_eq!(db.update_user_role("nobody", "admin").unwrap(), 0);
    }
}
