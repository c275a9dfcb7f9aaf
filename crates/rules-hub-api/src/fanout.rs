//! Best-effort notification delivery. Nothing in here can fail the request
//! that triggered it: every error is logged and dropped.

use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use rules_hub_db::models::NewNotification;
use rules_hub_db::{Database, is_missing_table};
use rules_hub_types::models::{NotificationKind, Rule};

use crate::auth::AppState;
use crate::blocking;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub sent: usize,
    pub failed: usize,
}

/// Tell every registered user except the author about a newly published rule.
pub async fn notify_new_rule(state: &AppState, rule: &Rule) {
    let state = state.clone();
    let rule = rule.clone();
    let rule_id = rule.id;

    match blocking(move || fan_out_new_rule(&state.db, &rule)).await {
        Ok(Ok(report)) => info!(
            "Fan-out for rule {}: {} sent, {} failed",
            rule_id, report.sent, report.failed
        ),
        Ok(Err(e)) if is_missing_table(&e) => {
            warn!("Skipping fan-out for rule {}: notifications table missing", rule_id)
        }
        Ok(Err(e)) => warn!("Fan-out for rule {} aborted: {:#}", rule_id, e),
        Err(e) => warn!("Fan-out for rule {} did not run: {}", rule_id, e),
    }
}

/// One independent insert per recipient; a failed row does not stop the rest.
///
/// The inserts run one at a time, not concurrently: every store write goes
/// through the single connection lock, so parallel tasks would only queue on it.
pub fn fan_out_new_rule(db: &Database, rule: &Rule) -> anyhow::Result<FanoutReport> {
    let recipients = db.list_user_ids_except(&rule.created_by.to_string())?;

    let author = rule.author_username.as_deref().unwrap_or("Someone");
    let title = "New rule published";
    let message = format!("{} published \"{}\"", author, rule.name);
    let data = json!({
        "rule_id": rule.id,
        "rule_name": rule.name,
        "author_id": rule.created_by,
        "author_username": rule.author_username,
    })
    .to_string();

    let mut report = FanoutReport::default();
    for recipient in &recipients {
        let id = Uuid::new_v4().to_string();
        let result = db.insert_notification(&NewNotification {
            id: &id,
            user_id: recipient,
            kind: NotificationKind::NewRule.as_str(),
            title,
            message: &message,
            data: &data,
        });

        match result {
            Ok(()) => report.sent += 1,
            // Every remaining insert would fail the same way
            Err(e) if is_missing_table(&e) => return Err(e),
            Err(e) => {
                warn!("Notification for {} about rule {} failed: {:#}", recipient, rule.id, e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Tell `followed_id` that `follower_username` started following them.
pub async fn notify_new_follower(
    state: &AppState,
    follower_id: Uuid,
    follower_username: String,
    followed_id: Uuid,
) {
    let state = state.clone();
    let result = blocking(move || {
        let id = Uuid::new_v4().to_string();
        let message = format!("{follower_username} started following you");
        let data = json!({
            "follower_id": follower_id,
            "follower_username": follower_username,
        })
        .to_string();

        state.db.insert_notification(&NewNotification {
            id: &id,
            user_id: &followed_id.to_string(),
            kind: NotificationKind::NewFollower.as_str(),
            title: "New follower",
            message: &message,
            data: &data,
        })
    })
    .await;

    match result {
        Ok(Ok(())) => debug!("Follow notification sent to {}", followed_id),
        Ok(Err(e)) => warn!("Follow notification to {} failed: {:#}", followed_id, e),
        Err(e) => warn!("Follow notification to {} did not run: {}", followed_id, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rule_by(author: Uuid) -> Rule {
        Rule {
            id: Uuid::new_v4(),
            name: "Prefer iterators".into(),
            description: String::new(),
            pattern: "**/*.rs".into(),
            rule_content: "Use iterators.".into(),
            tags: vec![],
            category: None,
            framework: None,
            downloads: 0,
            likes: 0,
            created_by: author,
            author_username: Some("author".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn seed(db: &Database, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        db.create_account(&id.to_string(), &format!("{name}@example.com"), "h", "user", name)
            .unwrap();
        id
    }

    #[test]
    fn skips_author_and_reaches_everyone_else() {
        let db = Database::open_in_memory().unwrap();
        let author = seed(&db, "author");
        let readers: Vec<Uuid> = ["ann", "ben", "cat"].iter().map(|n| seed(&db, n)).collect();

        let report = fan_out_new_rule(&db, &rule_by(author)).unwrap();
        assert_eq!(report, FanoutReport { sent: 3, failed: 0 });

        assert_eq!(db.unread_count(&author.to_string()).unwrap(), 0);
        for reader in readers {
            let rows = db.list_notifications(&reader.to_string(), false, 10).unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].kind, "new_rule");
            assert!(rows[0].message.contains("Prefer iterators"));
        }
    }

    #[test]
    fn one_rejected_recipient_does_not_stop_the_rest() {
        let db = Database::open_in_memory().unwrap();
        let author = seed(&db, "author");
        let readers: Vec<Uuid> = ["ann", "ben", "cat", "dan"]
            .iter()
            .map(|n| seed(&db, n))
            .collect();
        let rejected = readers[1];
        let trigger = format!(
            "CREATE TRIGGER reject_one BEFORE INSERT ON notifications \
             WHEN NEW.user_id = '{rejected}' \
             BEGIN SELECT RAISE(ABORT, 'recipient rejected'); END;"
        );
        db.with_conn_mut(|conn| Ok(conn.execute_batch(&trigger)?)).unwrap();

        let report = fan_out_new_rule(&db, &rule_by(author)).unwrap();
        assert_eq!(report, FanoutReport { sent: 3, failed: 1 });

        for reader in readers {
            let rows = db.list_notifications(&reader.to_string(), false, 10).unwrap();
            let expected = if reader == rejected { 0 } else { 1 };
            assert_eq!(rows.len(), expected, "inbox of {reader}");
        }
    }

    #[test]
    fn missing_table_aborts_without_panicking() {
        let db = Database::open_in_memory().unwrap();
        let author = seed(&db, "author");
        seed(&db, "reader");
        db.with_conn_mut(|conn| Ok(conn.execute_batch("DROP TABLE notifications")?))
            .unwrap();

        let err = fan_out_new_rule(&db, &rule_by(author)).unwrap_err();
        assert!(is_missing_table(&err));
    }
}
