//! End-to-end tests that drive the HTTP surface through `axum_test`.
//! Each test builds a fresh in-memory database; the one exception is the
//! concurrent-submit test, which needs a file-backed database so two
//! connections see the same data.

mod rounds;
mod tournaments;

use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum_extra::extract::cookie::Key;
use axum_test::{TestServer, TestServerConfig};
use chrono::Utc;
use diesel::{insert_into, prelude::*};
use diesel_migrations::MigrationHarness;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    MIGRATIONS, config::create_app, schema, state::DbPool, state::build_pool,
};

pub const PASSWORD: &str = "sixteen bars";

pub fn test_pool() -> DbPool {
    let pool = build_pool(":memory:");
    pool.get()
        .unwrap()
        .run_pending_migrations(MIGRATIONS)
        .unwrap();
    pool
}

/// A file-backed pool for tests that need genuine connection
/// concurrency. The directory guard must outlive the pool.
pub fn file_pool() -> (tempfile::TempDir, DbPool) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.sqlite");
    let pool = build_pool(path.to_str().unwrap());
    pool.get()
        .unwrap()
        .run_pending_migrations(MIGRATIONS)
        .unwrap();
    (dir, pool)
}

/// Cookie-saving server, so a login call authenticates what follows.
pub fn server(pool: &DbPool) -> TestServer {
    let app = create_app(pool.clone(), Key::generate());
    let config = TestServerConfig {
        save_cookies: true,
        ..TestServerConfig::default()
    };
    TestServer::new_with_config(app, config).unwrap()
}

pub fn seed_user(
    pool: &DbPool,
    email: &str,
    display_name: &str,
    roles: &[&str],
) -> String {
    let mut conn = pool.get().unwrap();
    let id = Uuid::now_v7().to_string();
    let now = Utc::now().naive_utc();
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(PASSWORD.as_bytes(), &salt)
        .unwrap()
        .to_string();
    insert_into(schema::users::table)
        .values((
            schema::users::id.eq(&id),
            schema::users::email.eq(email),
            schema::users::display_name.eq(display_name),
            schema::users::password_hash.eq(hash),
            schema::users::roles.eq(serde_json::to_string(roles).unwrap()),
            schema::users::created_at.eq(now),
            schema::users::updated_at.eq(now),
        ))
        .execute(&mut conn)
        .unwrap();
    id
}

pub async fn login(server: &TestServer, email: &str) {
    let res = server
        .post("/api/auth/login")
        .json(&json!({ "email": email, "password": PASSWORD }))
        .await;
    assert_eq!(res.status_code(), 200, "login failed: {}", res.text());
}

/// Seeds an active tournament directly, bypassing the staff-only route.
pub fn seed_tournament(pool: &DbPool, title: &str, status: &str) -> String {
    let mut conn = pool.get().unwrap();
    let id = Uuid::now_v7().to_string();
    insert_into(schema::tournaments::table)
        .values((
            schema::tournaments::id.eq(&id),
            schema::tournaments::title.eq(title),
            schema::tournaments::max_bracket_size.eq(128_i64),
            schema::tournaments::status.eq(status),
            schema::tournaments::created_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)
        .unwrap();
    id
}

pub fn seed_participant(
    pool: &DbPool,
    tournament_id: &str,
    user_id: &str,
) -> String {
    let mut conn = pool.get().unwrap();
    let id = Uuid::now_v7().to_string();
    insert_into(schema::tournament_participants::table)
        .values((
            schema::tournament_participants::id.eq(&id),
            schema::tournament_participants::tournament_id.eq(tournament_id),
            schema::tournament_participants::user_id.eq(user_id),
        ))
        .execute(&mut conn)
        .unwrap();
    id
}

/// Creates a round through the API as the given staff member's session.
pub async fn create_round(
    server: &TestServer,
    tournament_id: &str,
    kind: &str,
    number: i64,
    scoring: &str,
    rubric_keys: Option<Vec<&str>>,
) -> Value {
    let mut body = json!({ "kind": kind, "number": number, "scoring": scoring });
    if let Some(keys) = rubric_keys {
        body["rubricKeys"] = json!(keys);
    }
    let res = server
        .post(&format!("/api/tournaments/{tournament_id}/rounds"))
        .json(&body)
        .await;
    assert_eq!(res.status_code(), 201, "round create failed: {}", res.text());
    res.json::<Value>()["round"].clone()
}

pub fn error_message(body: &Value) -> &str {
    body["error"]["message"].as_str().unwrap_or_default()
}
