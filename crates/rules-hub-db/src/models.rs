//! Database row types. These map directly to SQLite rows and stay distinct
//! from the rules-hub-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub email: String,
    /// `None` while an invitation is pending.
    pub password: Option<String>,
    pub role: String,
    pub invite_token: Option<String>,
    pub created_at: String,
    pub last_sign_in_at: Option<String>,
}

/// User joined with its profile username, for the admin listing.
pub struct UserListRow {
    pub id: String,
    pub email: String,
    pub role: String,
    pub username: Option<String>,
    pub pending_invite: bool,
    pub created_at: String,
    pub last_sign_in_at: Option<String>,
}

pub struct ProfileRow {
    pub user_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub github: Option<String>,
    pub twitter: Option<String>,
    pub is_public: bool,
    pub followers: i64,
    pub following: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Editable profile columns, written as a whole.
pub struct ProfileChanges {
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub github: Option<String>,
    pub twitter: Option<String>,
    pub is_public: bool,
}

pub struct ProfileSummaryRow {
    pub user_id: String,
    pub username: String,
    pub display_name: Option<String>,
}

pub struct RuleRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub pattern: String,
    pub rule_content: String,
    /// JSON array of strings.
    pub tags: String,
    pub category: Option<String>,
    pub framework: Option<String>,
    pub downloads: i64,
    pub likes: i64,
    /// Always set: every rule read skips orphaned rows.
    pub created_by: String,
    pub author_username: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Content columns of a rule, used for both insert and full-row update.
pub struct RuleFields {
    pub name: String,
    pub description: String,
    pub pattern: String,
    pub rule_content: String,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub framework: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RuleSort {
    #[default]
    Newest,
    Downloads,
    Likes,
    Name,
}

#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub framework: Option<String>,
    pub tag: Option<String>,
    pub created_by: Option<String>,
    /// Restrict to authors followed by this user.
    pub followed_by: Option<String>,
    pub sort: RuleSort,
    pub limit: u32,
    pub offset: u32,
}

pub struct NewNotification<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub kind: &'a str,
    pub title: &'a str,
    pub message: &'a str,
    /// Serialized JSON payload.
    pub data: &'a str,
}

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub data: String,
    pub read: bool,
    pub created_at: String,
}

pub struct StatsRow {
    pub total_rules: i64,
    pub total_users: i64,
    pub total_downloads: i64,
    pub total_likes: i64,
    pub categories: Vec<(String, i64)>,
}
