use std::ops::{Deref, DerefMut};

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::Key;
use diesel::{
    SqliteConnection,
    connection::SimpleConnection,
    r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection},
};

use crate::util_resp::ApiError;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub key: Key,
}

impl FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> DbPool {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Key {
        state.key.clone()
    }
}

/// Applied to every pooled connection. The busy timeout makes a writer
/// queue on SQLite's write lock rather than fail immediately, which the
/// submission lifecycle relies on under concurrent submits.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error>
    for ConnectionSettings
{
    fn on_acquire(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(
            "PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;",
        )
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

pub fn build_pool(database_url: &str) -> DbPool {
    Pool::builder()
        .max_size(if database_url == ":memory:" { 1 } else { 10 })
        .connection_customizer(Box::new(ConnectionSettings))
        .build(ConnectionManager::<SqliteConnection>::new(database_url))
        .expect("failed to build connection pool")
}

/// A pooled database connection, checked out per request. Dropping it
/// returns the connection to the pool on every exit path.
pub struct Conn(PooledConnection<ConnectionManager<SqliteConnection>>);

impl Deref for Conn {
    type Target = PooledConnection<ConnectionManager<SqliteConnection>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Conn {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Conn
where
    S: Send + Sync,
    DbPool: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let pool = DbPool::from_ref(state);
        let conn = tokio::task::spawn_blocking(move || pool.get())
            .await
            .map_err(|_| ApiError::Internal)?
            .map_err(|err| {
                tracing::error!(error = %err, "failed to acquire connection");
                ApiError::Internal
            })?;
        Ok(Conn(conn))
    }
}
