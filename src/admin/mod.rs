//! Staff-only surface: dashboard counts, user listing, submission
//! moderation and the media asset registry.

use axum::{
    Json,
    extract::{Path, Query},
};
use chrono::{NaiveDateTime, Utc};
use diesel::{dsl::count_star, insert_into, prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::{Role, User},
    schema::{media_assets, submissions, tournaments, users},
    state::Conn,
    tournaments::submissions::set_submission_lock,
    util_resp::{ApiError, CreatedResult, JsonResult, created, ok},
};

pub const MEDIA_KINDS: [&str; 2] = ["audio", "image"];

#[derive(Debug, Queryable, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAsset {
    pub id: String,
    pub kind: String,
    pub storage_key: String,
    pub mime: String,
    pub size_bytes: i64,
    pub duration_sec: Option<f64>,
    pub created_at: NaiveDateTime,
}

/// Roles are stored as a JSON array in a text column, so role membership
/// checks match on the quoted role name.
fn role_pattern(role: Role) -> String {
    format!("%\"{}\"%", role.as_str())
}

pub async fn dashboard(user: User, mut conn: Conn) -> JsonResult {
    user.require_staff()?;

    let total_users: i64 =
        users::table.select(count_star()).first(&mut *conn)?;
    let artists: i64 = users::table
        .filter(users::roles.like(role_pattern(Role::Artist)))
        .select(count_star())
        .first(&mut *conn)?;
    let staff: i64 = users::table
        .filter(
            users::roles
                .like(role_pattern(Role::Admin))
                .or(users::roles.like(role_pattern(Role::Moderator))),
        )
        .select(count_star())
        .first(&mut *conn)?;

    let total_tournaments: i64 =
        tournaments::table.select(count_star()).first(&mut *conn)?;
    let active: i64 = tournaments::table
        .filter(tournaments::status.eq("active"))
        .select(count_star())
        .first(&mut *conn)?;
    let finished: i64 = tournaments::table
        .filter(tournaments::status.eq("finished"))
        .select(count_star())
        .first(&mut *conn)?;

    let total_submissions: i64 =
        submissions::table.select(count_star()).first(&mut *conn)?;
    let submitted: i64 = submissions::table
        .filter(submissions::status.eq("submitted"))
        .select(count_star())
        .first(&mut *conn)?;
    let locked: i64 = submissions::table
        .filter(submissions::status.eq("locked"))
        .select(count_star())
        .first(&mut *conn)?;
    let disqualified: i64 = submissions::table
        .filter(submissions::status.eq("disqualified"))
        .select(count_star())
        .first(&mut *conn)?;

    let total_media: i64 =
        media_assets::table.select(count_star()).first(&mut *conn)?;
    let audio: i64 = media_assets::table
        .filter(media_assets::kind.eq("audio"))
        .select(count_star())
        .first(&mut *conn)?;
    let image: i64 = media_assets::table
        .filter(media_assets::kind.eq("image"))
        .select(count_star())
        .first(&mut *conn)?;

    ok(json!({
        "users": { "total": total_users, "staff": staff, "artists": artists },
        "tournaments": {
            "total": total_tournaments,
            "active": active,
            "finished": finished,
        },
        "submissions": {
            "total": total_submissions,
            "submitted": submitted,
            "locked": locked,
            "disqualified": disqualified,
        },
        "media": { "total": total_media, "audio": audio, "image": image },
    }))
}

pub async fn list_users(user: User, mut conn: Conn) -> JsonResult {
    user.require_any_role(&[Role::Admin])?;
    let all = users::table
        .order_by(users::created_at.asc())
        .load::<User>(&mut *conn)?;
    let views: Vec<_> = all.iter().map(User::to_view).collect();
    ok(json!({ "users": views }))
}

#[derive(Deserialize)]
pub struct ModerationBody {
    pub locked: bool,
    #[serde(default)]
    pub status: Option<String>,
}

pub async fn moderate_submission(
    Path(submission_id): Path<String>,
    user: User,
    mut conn: Conn,
    Json(body): Json<ModerationBody>,
) -> JsonResult {
    user.require_staff()?;
    let submission = set_submission_lock(
        &mut conn,
        &submission_id,
        body.locked,
        body.status.as_deref(),
    )?;
    ok(json!({ "submission": submission }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMediaAssetBody {
    pub kind: String,
    pub storage_key: String,
    pub mime: String,
    pub size_bytes: i64,
    #[serde(default)]
    pub duration_sec: Option<f64>,
}

pub async fn create_media_asset(
    user: User,
    mut conn: Conn,
    Json(body): Json<CreateMediaAssetBody>,
) -> CreatedResult {
    user.require_staff()?;

    if !MEDIA_KINDS.contains(&body.kind.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "Unsupported media kind: {}",
            body.kind
        )));
    }
    if body.storage_key.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "storageKey is required".to_string(),
        ));
    }
    if body.size_bytes < 0 {
        return Err(ApiError::BadRequest(
            "sizeBytes must not be negative".to_string(),
        ));
    }
    // Duration only makes sense for audio; image assets never carry one.
    let duration_sec = match body.kind.as_str() {
        "audio" => Some(body.duration_sec.ok_or_else(|| {
            ApiError::BadRequest(
                "durationSec is required for audio assets".to_string(),
            )
        })?),
        _ => None,
    };

    let asset_id = Uuid::now_v7().to_string();
    insert_into(media_assets::table)
        .values((
            media_assets::id.eq(&asset_id),
            media_assets::kind.eq(&body.kind),
            media_assets::storage_key.eq(&body.storage_key),
            media_assets::mime.eq(&body.mime),
            media_assets::size_bytes.eq(body.size_bytes),
            media_assets::duration_sec.eq(duration_sec),
            media_assets::created_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut *conn)?;

    let asset = media_assets::table
        .filter(media_assets::id.eq(&asset_id))
        .first::<MediaAsset>(&mut *conn)?;
    created(json!({ "mediaAsset": asset }))
}

#[derive(Deserialize)]
pub struct MediaAssetFilter {
    #[serde(default)]
    pub kind: Option<String>,
}

pub async fn list_media_assets(
    Query(filter): Query<MediaAssetFilter>,
    user: User,
    mut conn: Conn,
) -> JsonResult {
    user.require_staff()?;

    let mut query = media_assets::table.into_boxed();
    if let Some(kind) = &filter.kind {
        if !MEDIA_KINDS.contains(&kind.as_str()) {
            return Err(ApiError::BadRequest(format!(
                "Unsupported media kind: {kind}"
            )));
        }
        query = query.filter(media_assets::kind.eq(kind.clone()));
    }
    let assets = query
        .order_by(media_assets::created_at.asc())
        .load::<MediaAsset>(&mut *conn)?;
    ok(json!({ "mediaAssets": assets }))
}
