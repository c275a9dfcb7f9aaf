use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Role, Rule, UserProfile};

// -- JWT Claims --

/// Bearer token claims. The role is deliberately absent: it is read from the
/// store on each privileged request so that role changes apply immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Envelope --

/// Success envelope wrapping every non-error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcceptInviteRequest {
    pub token: String,
    pub password: String,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub token: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub profile: Option<UserProfile>,
}

// -- Rules --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRuleRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub pattern: Option<String>,
    pub rule_content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub framework: Option<String>,
}

/// Partial update. Absent fields are left untouched; an empty `category` or
/// `framework` clears it.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRuleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub pattern: Option<String>,
    pub rule_content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub category: Option<String>,
    pub framework: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RuleListResponse {
    pub rules: Vec<Rule>,
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DownloadResponse {
    pub rule_id: Uuid,
    pub downloads: i64,
    pub rule_content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub likes: i64,
}

// -- Profiles --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub github: Option<String>,
    pub twitter: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsernameAvailability {
    pub username: String,
    pub available: bool,
}

// -- Follows --

#[derive(Debug, Serialize, Deserialize)]
pub struct FollowStatus {
    pub following: bool,
}

// -- Notifications --

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCount {
    pub count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatedCount {
    pub updated: usize,
}

// -- Admin --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InviteUserRequest {
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InviteUserResponse {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    /// Handed to the invitee out of band; redeemed at `/auth/accept-invite`.
    pub invite_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedCount {
    pub deleted: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoleChanged {
    pub user_id: Uuid,
    pub role: Role,
}
