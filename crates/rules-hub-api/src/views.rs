//! Row to API model conversion. Corrupt columns are logged and replaced with
//! defaults rather than failing the whole response.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use rules_hub_db::models::{NotificationRow, ProfileRow, ProfileSummaryRow, RuleRow, UserListRow};
use rules_hub_types::models::{
    AccountStatus, AdminUser, Notification, ProfileSummary, Role, Rule, UserProfile,
};

pub(crate) fn parse_uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

pub(crate) fn parse_time(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by SQLite's datetime('now') carry no timezone
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub(crate) fn parse_role(raw: &str) -> Role {
    raw.parse().unwrap_or_else(|e| {
        warn!("{}; treating account as a regular user", e);
        Role::User
    })
}

pub(crate) fn rule(row: RuleRow) -> Rule {
    let tags = serde_json::from_str(&row.tags).unwrap_or_else(|e| {
        warn!("Corrupt tags on rule '{}': {}", row.id, e);
        Vec::new()
    });
    Rule {
        id: parse_uuid(&row.id, "rule id"),
        name: row.name,
        description: row.description,
        pattern: row.pattern,
        rule_content: row.rule_content,
        tags,
        category: row.category,
        framework: row.framework,
        downloads: row.downloads,
        likes: row.likes,
        created_by: parse_uuid(&row.created_by, "rule owner"),
        author_username: row.author_username,
        created_at: parse_time(&row.created_at),
        updated_at: parse_time(&row.updated_at),
    }
}

pub(crate) fn profile(row: ProfileRow) -> UserProfile {
    UserProfile {
        user_id: parse_uuid(&row.user_id, "profile user_id"),
        username: row.username,
        display_name: row.display_name,
        bio: row.bio,
        website: row.website,
        github: row.github,
        twitter: row.twitter,
        is_public: row.is_public,
        followers: row.followers,
        following: row.following,
        created_at: parse_time(&row.created_at),
        updated_at: parse_time(&row.updated_at),
    }
}

pub(crate) fn summary(row: ProfileSummaryRow) -> ProfileSummary {
    ProfileSummary {
        user_id: parse_uuid(&row.user_id, "profile user_id"),
        username: row.username,
        display_name: row.display_name,
    }
}

pub(crate) fn notification(row: NotificationRow) -> Notification {
    let data = serde_json::from_str(&row.data).unwrap_or_else(|e| {
        warn!("Corrupt data on notification '{}': {}", row.id, e);
        serde_json::Value::Null
    });

    Notification {
        id: parse_uuid(&row.id, "notification id"),
        kind: row.kind,
        title: row.title,
        message: row.message,
        data,
        read: row.read,
        created_at: parse_time(&row.created_at),
    }
}

pub(crate) fn admin_user(row: UserListRow) -> AdminUser {
    AdminUser {
        id: parse_uuid(&row.id, "user id"),
        email: row.email,
        role: parse_role(&row.role),
        username: row.username,
        status: if row.pending_invite {
            AccountStatus::Invited
        } else {
            AccountStatus::Active
        },
        created_at: parse_time(&row.created_at),
        last_sign_in_at: row.last_sign_in_at.as_deref().map(parse_time),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_timestamp_styles() {
        let rfc = parse_time("2026-03-01T10:20:30.123Z");
        assert_eq!(rfc.timestamp_subsec_millis(), 123);

        let naive = parse_time("2026-03-01 10:20:30");
        assert_eq!(naive.timestamp(), rfc.timestamp());

        assert_eq!(parse_time("yesterday"), DateTime::<Utc>::default());
    }

    #[test]
    fn unknown_role_degrades_to_user() {
        assert_eq!(parse_role("admin"), Role::Admin);
        assert_eq!(parse_role("superuser"), Role::User);
    }
}
