use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::Json;
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    auth::{User, set_login_cookie},
    state::Conn,
    util_resp::{ApiError, ApiResult},
};

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

/// Verifies credentials and sets the private session cookie. Unknown
/// email and wrong password are indistinguishable to the caller.
pub async fn login(
    mut conn: Conn,
    jar: PrivateCookieJar,
    Json(body): Json<LoginBody>,
) -> ApiResult<(PrivateCookieJar, Json<Value>)> {
    let user = User::fetch_by_email(&body.email, &mut *conn)?
        .ok_or(ApiError::Unauthorized)?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| ApiError::Internal)?;
    Argon2::default()
        .verify_password(body.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let jar = set_login_cookie(user.id.clone(), jar);

    Ok((jar, Json(json!({ "user": user.to_view() }))))
}
