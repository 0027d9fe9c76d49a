use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::Json;
use chrono::Utc;
use diesel::{insert_into, prelude::*};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::{Role, User},
    schema::users,
    state::Conn,
    util_resp::{ApiError, CreatedResult, created},
    validation::{is_valid_display_name, is_valid_email, is_valid_password},
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
    pub email: String,
    pub password: String,
    pub display_name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

pub async fn register(
    mut conn: Conn,
    Json(body): Json<RegisterBody>,
) -> CreatedResult {
    let email = body.email.trim().to_lowercase();

    is_valid_email(&email).map_err(ApiError::BadRequest)?;
    is_valid_password(&body.password).map_err(ApiError::BadRequest)?;
    is_valid_display_name(&body.display_name)
        .map_err(ApiError::BadRequest)?;

    let mut roles = Role::parse_all(&body.roles)?;
    if roles.is_empty() {
        roles.push(Role::Listener);
    }

    let existing = users::table
        .filter(users::email.eq(&email))
        .first::<User>(&mut *conn)
        .optional()?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(body.password.as_bytes(), &salt)
        .map_err(|err| {
            tracing::error!(error = %err, "password hashing failed");
            ApiError::Internal
        })?
        .to_string();

    let user_id = Uuid::now_v7().to_string();
    let now = Utc::now().naive_utc();

    // The unique index on email backstops the existence check above.
    insert_into(users::table)
        .values((
            users::id.eq(&user_id),
            users::email.eq(&email),
            users::display_name.eq(body.display_name.trim()),
            users::password_hash.eq(&password_hash),
            users::roles.eq(serde_json::to_string(&roles).map_err(|err| {
                tracing::error!(error = %err, "role serialization failed");
                ApiError::Internal
            })?),
            users::created_at.eq(now),
            users::updated_at.eq(now),
        ))
        .execute(&mut *conn)
        .map_err(|err| {
            ApiError::from(err).on_conflict("Email already registered")
        })?;

    let user = User::fetch(&user_id, &mut *conn)?;
    created(json!({ "user": user.to_view() }))
}
