use std::sync::Arc;

use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use rules_hub_db::Database;
use rules_hub_types::api::{
    AcceptInviteRequest, AuthResponse, Claims, LoginRequest, MeResponse, RegisterRequest,
};
use rules_hub_types::models::Role;

use crate::config::HubConfig;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::validation::{normalize_email, normalize_username, validate_password};
use crate::{blocking, ok, run_db, run_db_unique, views};

const EMAIL_TAKEN: &str = "An account with this email already exists";
pub(crate) const USERNAME_TAKEN: &str = "Username is already taken";

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub config: HubConfig,
}

impl AppStateInner {
    pub fn new(db: Database, config: HubConfig) -> AppState {
        Arc::new(Self { db, config })
    }
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    let email = normalize_email(&req.email)?;
    validate_password(&req.password)?;
    let username = normalize_username(&req.username)?;

    let lookup = email.clone();
    if run_db(&state, move |db| db.get_user_by_email(&lookup)).await?.is_some() {
        return Err(ApiError::Conflict(EMAIL_TAKEN.into()));
    }
    ensure_username_free(&state, &username).await?;

    let password = req.password;
    let password_hash = blocking(move || hash_password(&password)).await??;

    let role = if state.config.is_admin_email(&email) {
        Role::Admin
    } else {
        Role::User
    };
    let user_id = Uuid::new_v4();

    let (id, e, u) = (user_id.to_string(), email.clone(), username.clone());
    // A concurrent registration can still win the race past the checks above
    run_db_unique(
        &state,
        move |db| db.create_account(&id, &e, &password_hash, role.as_str(), &u),
        account_conflict,
    )
    .await?;

    let token = create_token(&state.config, user_id, &email)?;
    info!("Registered {} as {} ({})", email, username, role);

    Ok((
        StatusCode::CREATED,
        ok(AuthResponse {
            user_id,
            token,
            role,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    let user = run_db(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Pending invitations have no password yet
    let stored = user.password.clone().ok_or(ApiError::Unauthorized)?;
    let password = req.password;
    if !blocking(move || verify_password(&password, &stored)).await? {
        return Err(ApiError::Unauthorized);
    }

    let user_id = stored_user_id(&user.id)?;

    let id = user.id.clone();
    run_db(&state, move |db| db.touch_last_sign_in(&id)).await?;

    let token = create_token(&state.config, user_id, &user.email)?;

    Ok(ok(AuthResponse {
        user_id,
        token,
        role: views::parse_role(&user.role),
    }))
}

/// Activate an invited account: set its password, claim a username, sign in.
pub async fn accept_invite(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<AcceptInviteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_password(&req.password)?;
    let username = normalize_username(&req.username)?;

    let token = req.token.trim().to_string();
    let user = run_db(&state, move |db| db.get_user_by_invite_token(&token))
        .await?
        .ok_or_else(|| ApiError::not_found("Invitation not found or already used"))?;

    ensure_username_free(&state, &username).await?;

    let password = req.password;
    let password_hash = blocking(move || hash_password(&password)).await??;

    let (id, u) = (user.id.clone(), username.clone());
    run_db_unique(
        &state,
        move |db| db.accept_invite(&id, &password_hash, &u),
        account_conflict,
    )
    .await?;

    let user_id = stored_user_id(&user.id)?;
    let token = create_token(&state.config, user_id, &user.email)?;
    info!("Invitation for {} accepted as {}", user.email, username);

    Ok(ok(AuthResponse {
        user_id,
        token,
        role: views::parse_role(&user.role),
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let id = claims.sub.to_string();
    let (user, profile) = run_db(&state, move |db| {
        Ok((db.get_user_by_id(&id)?, db.get_profile_by_user_id(&id)?))
    })
    .await?;
    let user = user.ok_or(ApiError::Unauthorized)?;

    Ok(ok(MeResponse {
        user_id: claims.sub,
        email: user.email,
        role: views::parse_role(&user.role),
        profile: profile.map(views::profile),
    }))
}

async fn ensure_username_free(state: &AppState, username: &str) -> Result<(), ApiError> {
    let u = username.to_string();
    if run_db(state, move |db| db.username_taken(&u, None)).await? {
        return Err(ApiError::Conflict(USERNAME_TAKEN.into()));
    }
    Ok(())
}

/// Conflict for a UNIQUE violation while creating an account or its profile.
pub(crate) fn account_conflict(column: &str) -> ApiError {
    if column == "users.email" {
        ApiError::Conflict(EMAIL_TAKEN.into())
    } else {
        ApiError::Conflict(USERNAME_TAKEN.into())
    }
}

/// A token is only ever issued for a well-formed stored id.
fn stored_user_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::Internal(format!("corrupt user id '{raw}'")))
}

/// Hash with Argon2id and a fresh salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

/// False for a wrong password and for an unparsable stored hash.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub fn create_token(config: &HubConfig, user_id: Uuid, email: &str) -> Result<String, ApiError> {
    let expires_at = chrono::Utc::now() + chrono::Duration::days(config.token_ttl_days);
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: expires_at.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token encoding failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[tokio::test]
    async fn lost_insert_race_is_a_conflict() {
        let state = AppStateInner::new(Database::open_in_memory().unwrap(), HubConfig::default());
        state
            .db
            .create_account("a", "a@example.com", "h", "user", "alice")
            .unwrap();

        let err = run_db_unique(
            &state,
            |db| db.create_account("b", "a@example.com", "h", "user", "bob"),
            account_conflict,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ref m) if m == EMAIL_TAKEN));

        let err = run_db_unique(
            &state,
            |db| db.create_account("c", "c@example.com", "h", "user", "alice"),
            account_conflict,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ref m) if m == USERNAME_TAKEN));
    }

    #[test]
    fn corrupt_stored_id_is_internal() {
        assert!(matches!(stored_user_id("not-a-uuid"), Err(ApiError::Internal(_))));
        let id = Uuid::new_v4();
        assert_eq!(stored_user_id(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn token_decodes_with_same_secret() {
        let config = HubConfig::default();
        let user_id = Uuid::new_v4();
        let token = create_token(&config, user_id, "a@example.com").unwrap();

        let claims = crate::middleware::decode_token(&config.jwt_secret, &token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "a@example.com");
        assert!(crate::middleware::decode_token("other-secret", &token).is_none());
    }
}
