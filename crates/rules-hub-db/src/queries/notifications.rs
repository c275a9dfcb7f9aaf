use anyhow::Result;
use tracing::warn;

use super::is_missing_table_error;
use crate::Database;
use crate::models::{NewNotification, NotificationRow};

impl Database {
    // -- Notifications --

    pub fn insert_notification(&self, n: &NewNotification<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, user_id, type, title, message, data)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                [n.id, n.user_id, n.kind, n.title, n.message, n.data],
            )?;
            Ok(())
        })
    }

    pub fn list_notifications(
        &self,
        user_id: &str,
        unread_only: bool,
        limit: u32,
    ) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, type, title, message, data, read, created_at
                 FROM notifications
                 WHERE user_id = ?1 AND (?2 = 0 OR read = 0)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![user_id, unread_only, limit], |row| {
                    Ok(NotificationRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        kind: row.get(2)?,
                        title: row.get(3)?,
                        message: row.get(4)?,
                        data: row.get(5)?,
                        read: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Unread notifications of `user_id`. A store without the notifications
    /// table reports zero instead of failing.
    pub fn unread_count(&self, user_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
                [user_id],
                |row| row.get(0),
            );
            match result {
                Ok(count) => Ok(count),
                Err(e) if is_missing_table_error(&e) => {
                    warn!("notifications table missing, reporting 0 unread");
                    Ok(0)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Scoped to the recipient; returns rows changed.
    pub fn mark_read(&self, id: &str, user_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
                [id, user_id],
            )?)
        })
    }

    pub fn mark_all_read(&self, user_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
                [user_id],
            )?)
        })
    }

    pub fn delete_notification(&self, id: &str, user_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2",
                [id, user_id],
            )?)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::is_missing_table;
    use crate::models::NewNotification;
    use crate::queries::testing::{db, seed_user};

    fn notify(db: &crate::Database, id: &str, user: &str) {
        db.insert_notification(&NewNotification {
            id,
            user_id: user,
            kind: "new_rule",
            title: "New rule",
            message: "hello",
            data: "{}",
        })
        .unwrap();
    }

    #[test]
    fn mark_read_is_scoped_to_one_row() {
        let db = db();
        seed_user(&db, "alice");
        seed_user(&db, "bob");
        notify(&db, "n1", "alice");
        notify(&db, "n2", "alice");
        notify(&db, "n3", "bob");

        assert_eq!(db.mark_read("n1", "bob").unwrap(), 0);
        assert_eq!(db.mark_read("n1", "alice").unwrap(), 1);
        assert_eq!(db.unread_count("alice").unwrap(), 1);
        assert_eq!(db.unread_count("bob").unwrap(), 1);

        let unread = db.list_notifications("alice", true, 50).unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, "n2");
        assert_eq!(db.list_notifications("alice", false, 50).unwrap().len(), 2);
    }

    #[test]
    fn mark_all_and_delete() {
        let db = db();
        seed_user(&db, "alice");
        notify(&db, "n1", "alice");
        notify(&db, "n2", "alice");

        assert_eq!(db.mark_all_read("alice").unwrap(), 2);
        assert_eq!(db.mark_all_read("alice").unwrap(), 0);
        assert_eq!(db.delete_notification("n1", "alice").unwrap(), 1);
        assert_eq!(db.list_notifications("alice", false, 50).unwrap().len(), 1);
    }

    #[test]
    fn unread_count_without_table_is_zero() {
        let db = db();
        db.with_conn_mut(|conn| Ok(conn.execute_batch("DROP TABLE notifications")?))
            .unwrap();

        assert_eq!(db.unread_count("alice").unwrap(), 0);

        let err = db
            .insert_notification(&NewNotification {
                id: "n1",
                user_id: "alice",
                kind: "new_rule",
                title: "t",
                message: "m",
                data: "{}",
            })
            .unwrap_err();
        assert!(is_missing_table(&err));
    }
}
