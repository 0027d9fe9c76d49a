use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, Key},
};
use chrono::{Days, NaiveDateTime, Utc};
use diesel::{
    connection::LoadConnection, prelude::*, sqlite::Sqlite,
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    schema::users,
    state::{Conn, DbPool},
    util_resp::{ApiError, ApiResult},
};

pub mod login;
pub mod register;

pub const LOGIN_COOKIE: &str = "cypher_session";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Moderator,
    Judge,
    Artist,
    Listener,
}

/// Roles exempt from visibility redaction.
pub const STAFF_ROLES: [Role; 2] = [Role::Admin, Role::Moderator];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Moderator => "moderator",
            Role::Judge => "judge",
            Role::Artist => "artist",
            Role::Listener => "listener",
        }
    }

    pub fn parse(raw: &str) -> Option<Role> {
        match raw {
            "admin" => Some(Role::Admin),
            "moderator" => Some(Role::Moderator),
            "judge" => Some(Role::Judge),
            "artist" => Some(Role::Artist),
            "listener" => Some(Role::Listener),
            _ => None,
        }
    }

    /// Parses a role list from a request payload, trimming and
    /// de-duplicating while preserving order.
    pub fn parse_all(raw: &[String]) -> ApiResult<Vec<Role>> {
        raw.iter()
            .map(|role| role.trim())
            .unique()
            .map(|role| {
                Role::parse(role).ok_or_else(|| {
                    ApiError::BadRequest(format!("Unsupported role: {role}"))
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Queryable)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    roles: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// The public shape of a user. The password hash never leaves the model.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub roles: Vec<Role>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    pub fn fetch(
        user_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> ApiResult<Self> {
        users::table
            .filter(users::id.eq(user_id))
            .first::<User>(conn)
            .optional()?
            .ok_or(ApiError::NotFound)
    }

    /// Emails are stored lowercased, so the lookup lowercases too.
    pub fn fetch_by_email(
        email: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> ApiResult<Option<Self>> {
        Ok(users::table
            .filter(users::email.eq(email.trim().to_lowercase()))
            .first::<User>(conn)
            .optional()?)
    }

    pub fn roles(&self) -> Vec<Role> {
        serde_json::from_str(&self.roles).unwrap_or_default()
    }

    pub fn is_staff(&self) -> bool {
        self.roles().iter().any(|role| STAFF_ROLES.contains(role))
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        let own = self.roles();
        roles.iter().any(|role| own.contains(role))
    }

    pub fn require_any_role(&self, roles: &[Role]) -> ApiResult<()> {
        if self.has_any_role(roles) {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }

    pub fn require_staff(&self) -> ApiResult<()> {
        self.require_any_role(&STAFF_ROLES)
    }

    pub fn to_view(&self) -> UserView {
        UserView {
            id: self.id.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            roles: self.roles(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct LoginSession {
    id: String,
    expiry: NaiveDateTime,
}

#[async_trait]
impl<S> FromRequestParts<S> for User
where
    S: Send + Sync,
    DbPool: FromRef<S>,
    Key: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let jar = PrivateCookieJar::<Key>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Unauthorized)?;

        let cookie = jar.get(LOGIN_COOKIE).ok_or(ApiError::Unauthorized)?;

        let session =
            match serde_json::from_str::<LoginSession>(cookie.value()) {
                Ok(session) if Utc::now().naive_utc() < session.expiry => {
                    session
                }
                _ => return Err(ApiError::Unauthorized),
            };

        let mut conn = Conn::from_request_parts(parts, state).await?;

        users::table
            .filter(users::id.eq(&session.id))
            .first::<User>(&mut *conn)
            .optional()?
            .ok_or(ApiError::Unauthorized)
    }
}

pub fn set_login_cookie(
    user_id: String,
    jar: PrivateCookieJar,
) -> PrivateCookieJar {
    let session = LoginSession {
        id: user_id,
        expiry: Utc::now()
            .naive_utc()
            .checked_add_days(Days::new(7))
            .expect("session expiry overflowed the calendar"),
    };
    let mut cookie = Cookie::new(
        LOGIN_COOKIE,
        serde_json::to_string(&session)
            .expect("login session always serializes"),
    );
    cookie.set_path("/");
    cookie.set_http_only(true);
    jar.add(cookie)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_all_rejects_unknown_roles() {
        let err = Role::parse_all(&["overlord".to_string()]).unwrap_err();
        assert_eq!(
            err,
            ApiError::BadRequest("Unsupported role: overlord".to_string())
        );
    }

    #[test]
    fn parse_all_dedups_preserving_order() {
        let roles = Role::parse_all(&[
            "judge".to_string(),
            "artist".to_string(),
            "judge".to_string(),
        ])
        .unwrap();
        assert_eq!(roles, vec![Role::Judge, Role::Artist]);
    }
}
