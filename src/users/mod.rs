//! User-facing account endpoints: the current user, user lookup, role
//! administration and the artist profile upsert.

use axum::{Json, extract::Path};
use chrono::Utc;
use diesel::{
    connection::LoadConnection, insert_into, prelude::*, sqlite::Sqlite,
    update,
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    auth::{Role, User},
    schema::{artist_profiles, users},
    state::Conn,
    util_resp::{ApiError, ApiResult, JsonResult, ok},
};

#[derive(Debug, Queryable)]
pub struct ArtistProfile {
    pub user_id: String,
    pub avatar_key: Option<String>,
    pub bio: Option<String>,
    pub socials: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistProfileView {
    pub user_id: String,
    pub avatar_key: Option<String>,
    pub bio: Option<String>,
    pub socials: Value,
}

impl ArtistProfile {
    pub fn fetch(
        user_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> ApiResult<Self> {
        artist_profiles::table
            .filter(artist_profiles::user_id.eq(user_id))
            .first::<ArtistProfile>(conn)
            .optional()?
            .ok_or(ApiError::NotFound)
    }

    pub fn to_view(&self) -> ArtistProfileView {
        ArtistProfileView {
            user_id: self.user_id.clone(),
            avatar_key: self.avatar_key.clone(),
            bio: self.bio.clone(),
            socials: serde_json::from_str(&self.socials)
                .unwrap_or_else(|_| json!({})),
        }
    }
}

pub async fn me(user: User) -> JsonResult {
    ok(json!({ "user": user.to_view() }))
}

/// A user may look at their own record; staff may look at anyone's.
fn assert_self_or_staff(user: &User, user_id: &str) -> ApiResult<()> {
    if user.id == user_id || user.is_staff() {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

pub async fn get_user(
    Path(user_id): Path<String>,
    user: User,
    mut conn: Conn,
) -> JsonResult {
    assert_self_or_staff(&user, &user_id)?;
    let target = User::fetch(&user_id, &mut *conn)?;
    ok(json!({ "user": target.to_view() }))
}

#[derive(Deserialize)]
pub struct RolesBody {
    pub roles: Vec<String>,
}

fn store_roles(
    conn: &mut impl LoadConnection<Backend = Sqlite>,
    user_id: &str,
    roles: &[Role],
) -> ApiResult<User> {
    let encoded = serde_json::to_string(roles).map_err(|e| {
        tracing::error!("failed to serialize roles: {e}");
        ApiError::Internal
    })?;
    update(users::table.filter(users::id.eq(user_id)))
        .set((
            users::roles.eq(encoded),
            users::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;
    User::fetch(user_id, conn)
}

pub async fn add_roles(
    Path(user_id): Path<String>,
    user: User,
    mut conn: Conn,
    Json(body): Json<RolesBody>,
) -> JsonResult {
    user.require_any_role(&[Role::Admin])?;
    let added = Role::parse_all(&body.roles)?;
    let target = User::fetch(&user_id, &mut *conn)?;
    let merged: Vec<Role> = target
        .roles()
        .into_iter()
        .chain(added)
        .unique()
        .collect();
    let updated = store_roles(&mut *conn, &user_id, &merged)?;
    ok(json!({ "user": updated.to_view() }))
}

pub async fn replace_roles(
    Path(user_id): Path<String>,
    user: User,
    mut conn: Conn,
    Json(body): Json<RolesBody>,
) -> JsonResult {
    user.require_any_role(&[Role::Admin])?;
    let roles = Role::parse_all(&body.roles)?;
    if roles.is_empty() {
        return Err(ApiError::BadRequest(
            "roles must not be empty".to_string(),
        ));
    }
    User::fetch(&user_id, &mut *conn)?;
    let updated = store_roles(&mut *conn, &user_id, &roles)?;
    ok(json!({ "user": updated.to_view() }))
}

pub async fn get_artist_profile(
    Path(user_id): Path<String>,
    user: User,
    mut conn: Conn,
) -> JsonResult {
    assert_self_or_staff(&user, &user_id)?;
    let profile = ArtistProfile::fetch(&user_id, &mut *conn)?;
    ok(json!({ "artistProfile": profile.to_view() }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistProfileBody {
    #[serde(default)]
    pub avatar_key: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub socials: Option<indexmap::IndexMap<String, String>>,
}

pub async fn put_artist_profile(
    Path(user_id): Path<String>,
    user: User,
    mut conn: Conn,
    Json(body): Json<ArtistProfileBody>,
) -> JsonResult {
    assert_self_or_staff(&user, &user_id)?;
    User::fetch(&user_id, &mut *conn)?;

    let socials = body.socials.unwrap_or_default();
    let socials_json = serde_json::to_string(&socials).map_err(|e| {
        tracing::error!("failed to serialize socials: {e}");
        ApiError::Internal
    })?;

    insert_into(artist_profiles::table)
        .values((
            artist_profiles::user_id.eq(&user_id),
            artist_profiles::avatar_key.eq(&body.avatar_key),
            artist_profiles::bio.eq(&body.bio),
            artist_profiles::socials.eq(&socials_json),
        ))
        .on_conflict(artist_profiles::user_id)
        .do_update()
        .set((
            artist_profiles::avatar_key.eq(&body.avatar_key),
            artist_profiles::bio.eq(&body.bio),
            artist_profiles::socials.eq(&socials_json),
        ))
        .execute(&mut *conn)?;

    let profile = ArtistProfile::fetch(&user_id, &mut *conn)?;
    ok(json!({ "artistProfile": profile.to_view() }))
}
