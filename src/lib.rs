use diesel_migrations::{EmbeddedMigrations, embed_migrations};

pub mod admin;
pub mod auth;
pub mod config;
pub mod schema;
pub mod state;
pub mod tournaments;
pub mod users;
pub mod util_resp;
pub mod validation;

#[cfg(test)]
mod test;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();
