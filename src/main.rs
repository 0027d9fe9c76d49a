use axum_extra::extract::cookie::Key;
use clap::Parser;
use cypher::{MIGRATIONS, config::create_app, state::build_pool};
use diesel_migrations::MigrationHarness;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to bind the HTTP server to.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind: String,
    /// SQLite database location.
    #[arg(long, env = "DATABASE_URL", default_value = "cypher.sqlite")]
    database_url: String,
    /// Secret used to derive the cookie signing key. A random key is
    /// generated when absent, which invalidates sessions on restart.
    #[arg(long, env = "SECRET_KEY")]
    secret_key: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().init();

    let args = Args::parse();

    let pool = build_pool(&args.database_url);
    {
        let mut conn = pool.get().expect("failed to obtain a connection");
        conn.run_pending_migrations(MIGRATIONS)
            .expect("failed to run migrations");
    }

    let key = match &args.secret_key {
        Some(secret) => Key::derive_from(secret.as_bytes()),
        None => {
            tracing::warn!(
                "SECRET_KEY not set, generating an ephemeral cookie key"
            );
            Key::generate()
        }
    };

    let app = create_app(pool, key);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .expect("failed to bind");
    tracing::info!("listening on {}", args.bind);
    axum::serve(listener, app).await.expect("server error");
}
