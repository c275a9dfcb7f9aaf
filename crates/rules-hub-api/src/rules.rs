use axum::{
    Extension,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::headers::{HeaderMapExt, UserAgent};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use rules_hub_db::models::{RuleFields, RuleFilter, RuleRow, RuleSort};
use rules_hub_types::api::{
    Claims, CreateRuleRequest, DeletedCount, DownloadResponse, LikeResponse, RuleListResponse,
    UpdateRuleRequest,
};
use rules_hub_types::models::Rule;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::validation::{
    MAX_DESCRIPTION_LEN, MAX_LABEL_LEN, MAX_RULE_CONTENT_LEN, MAX_RULE_NAME_LEN, bounded_text,
    normalize_pattern, normalize_tags, optional_text, required_text,
};
use crate::{fanout, ok, run_db, views};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

const NOT_OWNED: &str = "Rule not found or you do not have permission to modify it";

#[derive(Debug, Default, Deserialize)]
pub struct RuleQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub framework: Option<String>,
    pub tag: Option<String>,
    pub created_by: Option<String>,
    /// `newest` (default), `popular`, `likes` or `name`.
    pub sort: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl RuleQuery {
    fn into_filter(self) -> Result<RuleFilter, ApiError> {
        let sort = match non_blank(self.sort).as_deref() {
            None | Some("newest") => RuleSort::Newest,
            Some("popular") | Some("downloads") => RuleSort::Downloads,
            Some("likes") => RuleSort::Likes,
            Some("name") => RuleSort::Name,
            Some(other) => return Err(ApiError::bad_request(format!("Unknown sort '{other}'"))),
        };

        let created_by = match non_blank(self.created_by) {
            Some(raw) => Some(
                raw.parse::<Uuid>()
                    .map_err(|_| ApiError::bad_request("created_by must be a user id"))?
                    .to_string(),
            ),
            None => None,
        };

        Ok(RuleFilter {
            search: non_blank(self.q),
            category: non_blank(self.category),
            framework: non_blank(self.framework),
            tag: non_blank(self.tag).map(|t| t.to_lowercase()),
            created_by,
            followed_by: None,
            sort,
            limit: self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            offset: self.offset.unwrap_or(0),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// GET /rules: public listing; rules without an owner never appear.
pub async fn list_rules(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RuleQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.into_filter()?;
    Ok(ok(fetch_page(&state, filter).await?))
}

/// GET /feed: rules by the authors the caller follows.
pub async fn feed(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiQuery(query): ApiQuery<RuleQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mut filter = query.into_filter()?;
    filter.followed_by = Some(claims.sub.to_string());
    Ok(ok(fetch_page(&state, filter).await?))
}

async fn fetch_page(state: &AppState, filter: RuleFilter) -> Result<RuleListResponse, ApiError> {
    let (limit, offset) = (filter.limit, filter.offset);
    let (rows, total) = run_db(state, move |db| db.list_public_rules(&filter)).await?;

    Ok(RuleListResponse {
        rules: rows.into_iter().map(views::rule).collect(),
        total,
        limit,
        offset,
    })
}

pub async fn get_rule(
    State(state): State<AppState>,
    ApiPath(rule_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let rule = load_public(&state, rule_id).await?;
    Ok(ok(views::rule(rule)))
}

pub async fn create_rule(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateRuleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = RuleFields {
        name: required_text("name", &req.name, MAX_RULE_NAME_LEN)?,
        description: bounded_text("description", &req.description, MAX_DESCRIPTION_LEN)?,
        pattern: normalize_pattern(req.pattern.as_deref())?,
        rule_content: required_text("rule_content", &req.rule_content, MAX_RULE_CONTENT_LEN)?,
        tags: normalize_tags(&req.tags)?,
        category: optional_text("category", req.category.as_deref(), MAX_LABEL_LEN)?,
        framework: optional_text("framework", req.framework.as_deref(), MAX_LABEL_LEN)?,
    };

    let rule_id = Uuid::new_v4();
    let (id, owner) = (rule_id.to_string(), claims.sub.to_string());
    let row = run_db(&state, move |db| {
        db.insert_rule(&id, &owner, &fields)?;
        db.get_public_rule(&id)
    })
    .await?
    .ok_or_else(|| ApiError::Internal(format!("rule {rule_id} vanished after insert")))?;

    let rule = views::rule(row);
    info!("Rule {} '{}' created by {}", rule.id, rule.name, claims.sub);

    fanout::notify_new_rule(&state, &rule).await;

    Ok((StatusCode::CREATED, ok(rule)))
}

pub async fn update_rule(
    State(state): State<AppState>,
    ApiPath(rule_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateRuleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let existing = load_owned(&state, rule_id, claims.sub).await?;
    let fields = merge_update(existing, req)?;

    let (id, owner) = (rule_id.to_string(), claims.sub.to_string());
    let row = run_db(&state, move |db| {
        if db.update_rule(&id, &owner, &fields)? == 0 {
            return Ok(None);
        }
        db.get_rule_owned(&id, &owner)
    })
    .await?
    .ok_or_else(|| ApiError::not_found(NOT_OWNED))?;

    Ok(ok(views::rule(row)))
}

pub async fn delete_rule(
    State(state): State<AppState>,
    ApiPath(rule_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    load_owned(&state, rule_id, claims.sub).await?;

    let (id, owner) = (rule_id.to_string(), claims.sub.to_string());
    let deleted = run_db(&state, move |db| db.delete_rule_owned(&id, &owner)).await?;
    if deleted == 0 {
        return Err(ApiError::not_found(NOT_OWNED));
    }

    info!("Rule {} deleted by {}", rule_id, claims.sub);
    Ok(ok(DeletedCount { deleted }))
}

/// POST /rules/{id}/download: logs the download and returns the rule content.
pub async fn download_rule(
    State(state): State<AppState>,
    ApiPath(rule_id): ApiPath<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user_agent = headers.typed_get::<UserAgent>().map(|ua| ua.as_str().to_string());
    let ip_address = client_ip(&headers);

    let (download_id, id) = (Uuid::new_v4().to_string(), rule_id.to_string());
    let (downloads, rule_content) = run_db(&state, move |db| {
        db.record_download(&download_id, &id, user_agent.as_deref(), ip_address.as_deref())
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Rule not found"))?;

    Ok(ok(DownloadResponse {
        rule_id,
        downloads,
        rule_content,
    }))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    ApiPath(rule_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (id, user) = (rule_id.to_string(), claims.sub.to_string());
    let (liked, likes) = run_db(&state, move |db| db.toggle_like(&id, &user))
        .await?
        .ok_or_else(|| ApiError::not_found("Rule not found"))?;

    Ok(ok(LikeResponse { liked, likes }))
}

async fn load_public(state: &AppState, rule_id: Uuid) -> Result<RuleRow, ApiError> {
    let id = rule_id.to_string();
    run_db(state, move |db| db.get_public_rule(&id))
        .await?
        .ok_or_else(|| ApiError::not_found("Rule not found"))
}

/// Ownership guard: a rule the caller does not own is reported exactly like a missing one.
async fn load_owned(state: &AppState, rule_id: Uuid, caller: Uuid) -> Result<RuleRow, ApiError> {
    let (id, owner) = (rule_id.to_string(), caller.to_string());
    run_db(state, move |db| db.get_rule_owned(&id, &owner))
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_OWNED))
}

fn merge_update(existing: RuleRow, req: UpdateRuleRequest) -> Result<RuleFields, ApiError> {
    let current: Rule = views::rule(existing);

    Ok(RuleFields {
        name: match req.name {
            Some(name) => required_text("name", &name, MAX_RULE_NAME_LEN)?,
            None => current.name,
        },
        description: match req.description {
            Some(d) => bounded_text("description", &d, MAX_DESCRIPTION_LEN)?,
            None => current.description,
        },
        pattern: match req.pattern {
            Some(p) => normalize_pattern(Some(&p))?,
            None => current.pattern,
        },
        rule_content: match req.rule_content {
            Some(c) => required_text("rule_content", &c, MAX_RULE_CONTENT_LEN)?,
            None => current.rule_content,
        },
        tags: match req.tags {
            Some(tags) => normalize_tags(&tags)?,
            None => current.tags,
        },
        category: match req.category {
            Some(c) => optional_text("category", Some(&c), MAX_LABEL_LEN)?,
            None => current.category,
        },
        framework: match req.framework {
            Some(f) => optional_text("framework", Some(&f), MAX_LABEL_LEN)?,
            None => current.framework,
        },
    })
}

/// First hop of `X-Forwarded-For`, else `X-Real-IP`.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
        .map(str::to_string)
}
